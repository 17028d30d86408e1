use chrono::{DateTime, Utc};
use serenity::model::id::GuildId;

/// Proyección de solo lectura para la capa de presentación.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaybackView {
    pub current_title: Option<String>,
    pub current_page_url: Option<String>,
    pub current_thumbnail_url: Option<String>,
    /// 0 = desconocida.
    pub current_duration_secs: u64,
    pub queue_titles: Vec<String>,
    /// Suma de las duraciones conocidas de la cola.
    pub queue_duration_secs: u64,
    pub is_playing: bool,
    pub is_paused: bool,
    /// El track actual lo eligió autoplay.
    pub is_autoplaying: bool,
    pub autoplay_enabled: bool,
    pub volume: u8,
    pub channel_name: Option<String>,
}

impl PlaybackView {
    pub fn is_idle(&self) -> bool {
        self.current_title.is_none()
    }
}

/// Por qué falló la última búsqueda de autoplay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoplayFailureKind {
    ResolveFailed,
    NoUsableResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoplayFailure {
    pub kind: AutoplayFailureKind,
    pub position: usize,
    pub at: DateTime<Utc>,
}

/// Estado interno del autoplay, para diagnóstico.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildDiagnostics {
    pub generation: u64,
    pub reference_title: Option<String>,
    pub autoplay_cursor: usize,
    pub prefetched_title: Option<String>,
    pub prefetch_in_flight: bool,
    pub awaiting_autoplay: bool,
    pub autoplay_misses: u32,
    pub last_autoplay_failure: Option<AutoplayFailure>,
}

/// Recibe la vista del guild después de cada cambio de estado.
pub trait PlaybackListener: Send + Sync {
    fn playback_changed(&self, guild_id: GuildId, view: &PlaybackView);
}

/// Listener que no hace nada.
pub struct NoopListener;

impl PlaybackListener for NoopListener {
    fn playback_changed(&self, _guild_id: GuildId, _view: &PlaybackView) {}
}
