pub mod ytdlp;

use async_trait::async_trait;

use crate::audio::{error::ResolveError, track::Track};

pub use ytdlp::YtDlpResolver;

/// Resolvedor de medios: búsquedas, URLs y recomendaciones relacionadas.
///
/// Una respuesta válida sin entradas reproducibles es `Ok(vec![])` / `Ok(None)`,
/// nunca un error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resuelve una URL o texto de búsqueda en cero o más tracks.
    async fn resolve(&self, query: &str) -> Result<Vec<Track>, ResolveError>;

    /// Track en la posición `position` (1-based) de la mezcla de `seed`.
    async fn resolve_related(&self, seed: &Track, position: usize) -> Result<Option<Track>, ResolveError>;
}
