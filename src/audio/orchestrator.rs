use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    error::{PlaybackError, PlaybackResult, ResolveError},
    prefetch::PrefetchScheduler,
    registry::GuildRegistry,
    track::Track,
    view::{GuildDiagnostics, PlaybackListener, PlaybackView},
    worker::{EnqueueOutcome, GuildCommand, JoinOutcome},
};
use crate::{
    config::PlayerSettings,
    sources::MediaResolver,
    voice::{VoiceChannel, VoiceGateway},
};

/// Punto de entrada del núcleo de reproducción.
///
/// Cada operación se envía al worker del guild y espera su respuesta, así que
/// las operaciones de un mismo guild nunca se intercalan y las de guilds
/// distintos corren en paralelo.
pub struct PlaybackOrchestrator {
    registry: GuildRegistry,
    resolver: Arc<dyn MediaResolver>,
    settings: PlayerSettings,
}

impl PlaybackOrchestrator {
    pub fn new(
        gateway: Arc<dyn VoiceGateway>,
        resolver: Arc<dyn MediaResolver>,
        listener: Arc<dyn PlaybackListener>,
        settings: PlayerSettings,
    ) -> Self {
        let scheduler = PrefetchScheduler::new(resolver.clone(), settings.resolver_timeout);
        Self {
            registry: GuildRegistry::new(gateway, scheduler, listener, settings.clone()),
            resolver,
            settings,
        }
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    /// Agrega tracks al final de la cola y arranca si el guild estaba libre.
    pub async fn enqueue(&self, guild_id: GuildId, tracks: Vec<Track>) -> PlaybackResult<EnqueueOutcome> {
        self.registry
            .handle(guild_id)
            .request(|reply| GuildCommand::Enqueue { tracks, reply })
            .await?
    }

    /// Resuelve `query` fuera del worker y encola el resultado.
    pub async fn play_query(&self, guild_id: GuildId, query: &str) -> PlaybackResult<EnqueueOutcome> {
        info!("🔍 Guild {}: resolviendo '{}'", guild_id, query);

        let resolved = match tokio::time::timeout(self.settings.resolver_timeout, self.resolver.resolve(query)).await {
            Ok(result) => result,
            Err(_) => Err(ResolveError::Timeout(self.settings.resolver_timeout)),
        };

        let tracks = resolved.map_err(|source| {
            warn!("❌ Guild {}: no se pudo resolver '{}': {}", guild_id, query, source);
            PlaybackError::ResolveFailed {
                query: query.to_string(),
                source,
            }
        })?;

        let tracks: Vec<Track> = tracks
            .into_iter()
            .take(self.settings.max_playlist_size)
            .collect();
        if tracks.is_empty() {
            info!("🚫 Guild {}: '{}' no tiene resultados reproducibles", guild_id, query);
            return Err(PlaybackError::NoUsableResult {
                query: query.to_string(),
            });
        }

        self.enqueue(guild_id, tracks).await
    }

    pub async fn play_next(&self, guild_id: GuildId) -> PlaybackResult<()> {
        self.registry
            .handle(guild_id)
            .request(|reply| GuildCommand::PlayNext { reply })
            .await
    }

    /// Marca el track actual como terminado y avanza.
    ///
    /// El transporte reporta sus propios finales por el worker; esto es para
    /// quien necesite forzarlo desde fuera. Si el stream sigue sonando solo se
    /// detiene, y el avance llega con su callback.
    pub async fn handle_finished(&self, guild_id: GuildId, error: Option<String>) -> PlaybackResult<()> {
        self.registry
            .handle(guild_id)
            .request(|reply| GuildCommand::Finished {
                ticket: None,
                error,
                reply: Some(reply),
            })
            .await
    }

    /// Detiene el track actual; el siguiente arranca cuando el transporte avisa el fin.
    pub async fn skip(&self, guild_id: GuildId) -> PlaybackResult<bool> {
        self.registry
            .handle(guild_id)
            .request(|reply| GuildCommand::Skip { reply })
            .await
    }

    /// Elimina la canción en la posición `index` (1-based) de la cola.
    pub async fn remove_at(&self, guild_id: GuildId, index: i64) -> PlaybackResult<Track> {
        self.registry
            .handle(guild_id)
            .request(|reply| GuildCommand::RemoveAt { index, reply })
            .await?
    }

    /// Desconecta y reinicia el guild. Devuelve `false` si ya estaba detenido.
    pub async fn stop(&self, guild_id: GuildId) -> PlaybackResult<bool> {
        self.registry
            .handle(guild_id)
            .request(|reply| GuildCommand::Stop { reply })
            .await
    }

    pub async fn join(&self, guild_id: GuildId, channel: VoiceChannel) -> PlaybackResult<JoinOutcome> {
        self.registry
            .handle(guild_id)
            .request(|reply| GuildCommand::Join { channel, reply })
            .await?
    }

    pub async fn set_autoplay(&self, guild_id: GuildId, enabled: bool) -> PlaybackResult<()> {
        self.registry
            .handle(guild_id)
            .request(|reply| GuildCommand::SetAutoplay { enabled, reply })
            .await
    }

    /// Volumen entre 0 y 100; fuera de rango se rechaza sin tocar el estado.
    pub async fn set_volume(&self, guild_id: GuildId, percent: i64) -> PlaybackResult<()> {
        self.registry
            .handle(guild_id)
            .request(|reply| GuildCommand::SetVolume { percent, reply })
            .await?
    }

    /// Devuelve `true` si el estado de pausa cambió.
    pub async fn set_paused(&self, guild_id: GuildId, paused: bool) -> PlaybackResult<bool> {
        self.registry
            .handle(guild_id)
            .request(|reply| GuildCommand::SetPaused { paused, reply })
            .await
    }

    /// Pide el candidato de autoplay para la referencia actual.
    ///
    /// Devuelve `false` si no se lanzó nada (sin referencia, ya en caché o
    /// con otra búsqueda en curso).
    pub async fn prefetch(&self, guild_id: GuildId) -> PlaybackResult<bool> {
        self.registry
            .handle(guild_id)
            .request(|reply| GuildCommand::Prefetch { reply })
            .await
    }

    pub async fn snapshot(&self, guild_id: GuildId) -> PlaybackResult<PlaybackView> {
        self.registry
            .handle(guild_id)
            .request(|reply| GuildCommand::Snapshot { reply })
            .await
    }

    pub async fn diagnostics(&self, guild_id: GuildId) -> PlaybackResult<GuildDiagnostics> {
        self.registry
            .handle(guild_id)
            .request(|reply| GuildCommand::Diagnostics { reply })
            .await
    }
}
