use chrono::Utc;
use tracing::debug;

use super::{
    prefetch::{PrefetchSlot, PrefetchTicket},
    queue::TrackQueue,
    track::Track,
    view::{AutoplayFailure, AutoplayFailureKind, GuildDiagnostics, PlaybackView},
};
use crate::config::PlayerSettings;

/// Identifica una llamada concreta a `play` del transporte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayTicket {
    pub generation: u64,
    pub sequence: u64,
}

/// Estado mutable de reproducción de un guild.
///
/// Solo el worker del guild lo toca. `reset` lo devuelve a los valores por
/// defecto en el mismo lugar, sin sacarlo del registro.
#[derive(Debug)]
pub struct GuildPlaybackState {
    pub queue: TrackQueue,
    pub current: Option<Track>,
    pub reference: Option<Track>,
    pub autoplay_cursor: usize,
    pub prefetch: PrefetchSlot,
    pub is_playing: bool,
    pub is_paused: bool,
    pub autoplay_enabled: bool,
    pub volume: u8,
    pub autoplay_misses: u32,
    pub last_autoplay_failure: Option<AutoplayFailure>,
    generation: u64,
    reference_epoch: u64,
    play_sequence: u64,
    settings: PlayerSettings,
}

impl GuildPlaybackState {
    pub fn new(settings: PlayerSettings) -> Self {
        Self {
            queue: TrackQueue::new(settings.max_queue_size),
            current: None,
            reference: None,
            autoplay_cursor: settings.autoplay_start_position,
            prefetch: PrefetchSlot::default(),
            is_playing: false,
            is_paused: false,
            autoplay_enabled: settings.autoplay_enabled,
            volume: settings.default_volume,
            autoplay_misses: 0,
            last_autoplay_failure: None,
            generation: 0,
            reference_epoch: 0,
            play_sequence: 0,
            settings,
        }
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Vuelve a los valores por defecto y abre una nueva generación.
    ///
    /// Cualquier prefetch o callback de la generación anterior queda obsoleto.
    pub fn reset(&mut self) {
        self.prefetch.cancel();
        let generation = self.generation + 1;
        *self = Self::new(self.settings.clone());
        self.generation = generation;
        debug!("♻️ Estado reiniciado (generación {})", generation);
    }

    /// Cambia el track de referencia y reinicia el cursor de autoplay.
    ///
    /// También con la misma canción: volver a pedirla empieza su mix de nuevo.
    pub fn set_reference(&mut self, track: Track) {
        debug!("📌 Nueva referencia de autoplay: {}", track.title());
        self.reference = Some(track);
        self.reference_epoch += 1;
        self.autoplay_cursor = self.settings.autoplay_start_position;
        self.autoplay_misses = 0;
        // lo que hubiera en caché era de la referencia anterior
        self.prefetch.discard_cached();
    }

    pub fn advance_cursor(&mut self) {
        self.autoplay_cursor += 1;
    }

    /// Ticket que debe tener un prefetch para valer ahora mismo.
    pub fn prefetch_ticket(&self) -> PrefetchTicket {
        PrefetchTicket {
            generation: self.generation,
            reference_epoch: self.reference_epoch,
            position: self.autoplay_cursor,
        }
    }

    /// Pone `track` como actual y devuelve el ticket de esta reproducción.
    pub fn begin_play(&mut self, track: Track) -> PlayTicket {
        self.current = Some(track);
        self.is_playing = true;
        self.is_paused = false;
        self.prefetch.set_awaiting(false);
        self.play_sequence += 1;
        PlayTicket {
            generation: self.generation,
            sequence: self.play_sequence,
        }
    }

    /// `true` si el ticket corresponde a la reproducción en curso.
    pub fn is_current_play(&self, ticket: PlayTicket) -> bool {
        self.current.is_some()
            && ticket.generation == self.generation
            && ticket.sequence == self.play_sequence
    }

    /// `true` si no hay nada que un Stop tenga que deshacer.
    pub fn is_pristine(&self) -> bool {
        self.current.is_none()
            && self.queue.is_empty()
            && self.reference.is_none()
            && !self.prefetch.is_in_flight()
            && self.prefetch.cached_title().is_none()
            && self.volume == self.settings.default_volume
            && self.autoplay_enabled == self.settings.autoplay_enabled
    }

    pub fn clear_current(&mut self) {
        self.current = None;
        self.is_playing = false;
        self.is_paused = false;
    }

    pub fn record_autoplay_failure(&mut self, kind: AutoplayFailureKind, position: usize) {
        self.last_autoplay_failure = Some(AutoplayFailure {
            kind,
            position,
            at: Utc::now(),
        });
    }

    pub fn view(&self, channel_name: Option<String>) -> PlaybackView {
        let current = self.current.as_ref();
        PlaybackView {
            current_title: current.map(|t| t.title().to_string()),
            current_page_url: current.map(|t| t.page_url().to_string()),
            current_thumbnail_url: current.and_then(|t| t.thumbnail_url()).map(str::to_string),
            current_duration_secs: current.map_or(0, Track::duration_secs),
            queue_titles: self.queue.titles(),
            queue_duration_secs: self.queue.total_duration().as_secs(),
            is_playing: self.is_playing,
            is_paused: self.is_paused,
            is_autoplaying: current.is_some_and(Track::is_autoplay_generated),
            autoplay_enabled: self.autoplay_enabled,
            volume: self.volume,
            channel_name,
        }
    }

    pub fn diagnostics(&self) -> GuildDiagnostics {
        GuildDiagnostics {
            generation: self.generation,
            reference_title: self.reference.as_ref().map(|t| t.title().to_string()),
            autoplay_cursor: self.autoplay_cursor,
            prefetched_title: self.prefetch.cached_title().map(str::to_string),
            prefetch_in_flight: self.prefetch.is_in_flight(),
            awaiting_autoplay: self.prefetch.is_awaiting(),
            autoplay_misses: self.autoplay_misses,
            last_autoplay_failure: self.last_autoplay_failure.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> Track {
        Track::new(title, format!("stream://{title}"), format!("https://example.com/{title}"))
    }

    #[test]
    fn reset_matches_fresh_state_but_bumps_generation() {
        let settings = PlayerSettings::default();
        let fresh = GuildPlaybackState::new(settings.clone());

        let mut state = GuildPlaybackState::new(settings);
        state.queue.extend(vec![track("a"), track("b")]).unwrap();
        state.set_reference(track("a"));
        state.begin_play(track("a"));
        state.advance_cursor();
        state.volume = 30;
        state.autoplay_enabled = false;

        state.reset();

        assert_eq!(state.view(None), fresh.view(None));
        assert_eq!(state.autoplay_cursor, fresh.autoplay_cursor);
        assert_eq!(state.reference, None);
        assert_eq!(state.generation(), 1);
        assert!(state.is_pristine());
    }

    #[test]
    fn re_adding_the_reference_restarts_the_cursor() {
        let mut state = GuildPlaybackState::new(PlayerSettings::default());
        state.set_reference(track("a"));
        state.advance_cursor();
        state.autoplay_misses = 2;
        let ticket = state.prefetch_ticket();
        state.prefetch.store(ticket, track("a-related"));

        state.set_reference(track("a"));

        assert_eq!(state.autoplay_cursor, 2);
        assert_eq!(state.autoplay_misses, 0);
        assert_eq!(state.prefetch.cached_title(), None);
        assert_ne!(state.prefetch_ticket(), ticket);
    }

    #[test]
    fn new_reference_resets_cursor_and_drops_cache() {
        let mut state = GuildPlaybackState::new(PlayerSettings::default());
        state.set_reference(track("a"));
        state.advance_cursor();
        state.advance_cursor();
        let ticket = state.prefetch_ticket();
        state.prefetch.store(ticket, track("a-related"));

        state.set_reference(track("b"));

        assert_eq!(state.autoplay_cursor, 2);
        assert_eq!(state.prefetch.cached_title(), None);
        assert_ne!(state.prefetch_ticket(), ticket);
    }

    #[test]
    fn play_tickets_go_stale() {
        let mut state = GuildPlaybackState::new(PlayerSettings::default());
        let first = state.begin_play(track("a"));
        let second = state.begin_play(track("b"));
        assert!(!state.is_current_play(first));
        assert!(state.is_current_play(second));

        state.reset();
        assert!(!state.is_current_play(second));
    }
}
