use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info};

use super::{
    error::{PlaybackError, PlaybackResult},
    track::Track,
};

/// Cola FIFO de un guild, con tamaño máximo.
#[derive(Debug, Clone)]
pub struct TrackQueue {
    items: VecDeque<Track>,
    max_size: usize,
}

impl TrackQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    /// Agrega tracks en orden; devuelve cuántos entraron.
    ///
    /// Lo que no cabe se descarta. Si no entra ninguno se reporta `QueueFull`.
    pub fn extend(&mut self, tracks: Vec<Track>) -> PlaybackResult<usize> {
        if tracks.is_empty() {
            return Ok(0);
        }

        let available_space = self.max_size.saturating_sub(self.items.len());
        if available_space == 0 {
            return Err(PlaybackError::QueueFull { max: self.max_size });
        }

        let to_add = tracks.len().min(available_space);
        for track in tracks.into_iter().take(to_add) {
            debug!("➕ Agregado a la cola: {}", track.title());
            self.items.push_back(track);
        }

        Ok(to_add)
    }

    /// Siguiente track (FIFO estricto).
    pub fn pop_front(&mut self) -> Option<Track> {
        let next = self.items.pop_front();
        if let Some(ref track) = next {
            info!("➡️ Siguiente en cola (FIFO): {}", track.title());
        }
        next
    }

    /// Elimina por posición 1-based, conservando el orden del resto.
    pub fn remove_at(&mut self, index: i64) -> PlaybackResult<Track> {
        let len = self.items.len();
        if index <= 0 || index as usize > len {
            return Err(PlaybackError::InvalidIndex { index, len });
        }

        let removed = self
            .items
            .remove(index as usize - 1)
            .ok_or(PlaybackError::InvalidIndex { index, len })?;
        debug!("❌ Track eliminado en posición {}: {}", index, removed.title());
        Ok(removed)
    }

    pub fn last(&self) -> Option<&Track> {
        self.items.back()
    }

    pub fn titles(&self) -> Vec<String> {
        self.items.iter().map(|t| t.title().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn total_duration(&self) -> Duration {
        self.items.iter().filter_map(Track::duration).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> Track {
        Track::new(title, format!("stream://{title}"), format!("https://example.com/{title}"))
    }

    fn queue_of(titles: &[&str]) -> TrackQueue {
        let mut queue = TrackQueue::new(10);
        queue
            .extend(titles.iter().map(|t| track(t)).collect())
            .unwrap();
        queue
    }

    #[test]
    fn keeps_insertion_order_across_calls() {
        let mut queue = queue_of(&["a", "b"]);
        queue.extend(vec![track("c"), track("d")]).unwrap();
        assert_eq!(queue.titles(), vec!["a", "b", "c", "d"]);
        assert_eq!(queue.pop_front().unwrap().title(), "a");
    }

    #[test]
    fn remove_middle_element() {
        let mut queue = queue_of(&["a", "b", "c"]);
        let removed = queue.remove_at(2).unwrap();
        assert_eq!(removed.title(), "b");
        assert_eq!(queue.titles(), vec!["a", "c"]);
    }

    #[test]
    fn remove_out_of_bounds_leaves_queue_untouched() {
        let mut queue = queue_of(&["a", "b", "c"]);
        for index in [0, 4, -1] {
            let err = queue.remove_at(index).unwrap_err();
            assert!(matches!(err, PlaybackError::InvalidIndex { len: 3, .. }));
        }
        assert_eq!(queue.titles(), vec!["a", "b", "c"]);
    }

    #[test]
    fn overflow_is_truncated_then_rejected() {
        let mut queue = TrackQueue::new(3);
        let added = queue
            .extend(vec![track("a"), track("b"), track("c"), track("d")])
            .unwrap();
        assert_eq!(added, 3);
        assert!(matches!(
            queue.extend(vec![track("e")]),
            Err(PlaybackError::QueueFull { max: 3 })
        ));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn total_duration_skips_unknown() {
        let mut queue = TrackQueue::new(5);
        queue
            .extend(vec![
                track("a").with_duration_secs(60),
                track("b"),
                track("c").with_duration_secs(30),
            ])
            .unwrap();
        assert_eq!(queue.total_duration(), Duration::from_secs(90));
    }
}
