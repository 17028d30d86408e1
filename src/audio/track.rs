use std::time::Duration;

/// Una canción ya resuelta. Inmutable salvo por la marca de autoplay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    title: String,
    stream_uri: String,
    page_url: String,
    thumbnail_url: Option<String>,
    duration_secs: u64,
    autoplay: bool,
}

impl Track {
    pub fn new(title: impl Into<String>, stream_uri: impl Into<String>, page_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            stream_uri: stream_uri.into(),
            page_url: page_url.into(),
            thumbnail_url: None,
            duration_secs: 0,
            autoplay: false,
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn stream_uri(&self) -> &str {
        &self.stream_uri
    }
    pub fn page_url(&self) -> &str {
        &self.page_url
    }
    pub fn thumbnail_url(&self) -> Option<&str> {
        self.thumbnail_url.as_deref()
    }
    /// Duración en segundos; 0 significa desconocida.
    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }
    pub fn duration(&self) -> Option<Duration> {
        (self.duration_secs > 0).then(|| Duration::from_secs(self.duration_secs))
    }
    pub fn is_autoplay_generated(&self) -> bool {
        self.autoplay
    }

    // Builders
    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail_url = Some(thumbnail.into());
        self
    }

    pub fn with_duration_secs(mut self, secs: u64) -> Self {
        self.duration_secs = secs;
        self
    }

    /// Marca el track como elegido por autoplay.
    pub fn into_autoplay(mut self) -> Self {
        self.autoplay = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_duration_is_none() {
        let track = Track::new("A", "stream://a", "https://www.youtube.com/watch?v=a");
        assert_eq!(track.duration(), None);
        assert_eq!(
            track.with_duration_secs(185).duration(),
            Some(Duration::from_secs(185))
        );
    }

    #[test]
    fn autoplay_flag_survives_clone() {
        let track = Track::new("A", "stream://a", "page").into_autoplay();
        assert!(track.clone().is_autoplay_generated());
        assert!(!Track::new("B", "s", "p").is_autoplay_generated());
    }
}
