use dashmap::{mapref::entry::Entry, DashMap};
use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use super::{
    error::{PlaybackError, PlaybackResult},
    prefetch::PrefetchScheduler,
    view::PlaybackListener,
    worker::{GuildCommand, GuildWorker},
};
use crate::{config::PlayerSettings, voice::VoiceGateway};

/// Buzón de comandos del worker de un guild.
#[derive(Clone)]
pub(crate) struct GuildHandle {
    tx: mpsc::UnboundedSender<GuildCommand>,
}

impl GuildHandle {
    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Envía un comando y espera la respuesta del worker.
    pub(crate) async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> GuildCommand,
    ) -> PlaybackResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .map_err(|_| PlaybackError::GuildUnavailable)?;
        rx.await.map_err(|_| PlaybackError::GuildUnavailable)
    }
}

/// Un worker por guild, creado en el primer uso y nunca eliminado.
///
/// Stop reinicia el estado dentro del worker; la entrada del mapa sigue
/// siendo la misma durante toda la vida del proceso. Solo se reemplaza si el
/// worker anterior murió.
pub struct GuildRegistry {
    handles: DashMap<GuildId, GuildHandle>,
    gateway: Arc<dyn VoiceGateway>,
    scheduler: PrefetchScheduler,
    listener: Arc<dyn PlaybackListener>,
    settings: PlayerSettings,
}

impl GuildRegistry {
    pub fn new(
        gateway: Arc<dyn VoiceGateway>,
        scheduler: PrefetchScheduler,
        listener: Arc<dyn PlaybackListener>,
        settings: PlayerSettings,
    ) -> Self {
        Self {
            handles: DashMap::new(),
            gateway,
            scheduler,
            listener,
            settings,
        }
    }

    pub(crate) fn handle(&self, guild_id: GuildId) -> GuildHandle {
        if let Some(handle) = self.handles.get(&guild_id) {
            if !handle.is_closed() {
                return handle.value().clone();
            }
        }

        // El entry bloquea el shard: dos primeros usos simultáneos crean un solo worker
        match self.handles.entry(guild_id) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_closed() {
                    warn!("♻️ Worker de guild {} caído, se crea uno nuevo", guild_id);
                    entry.insert(self.spawn_worker(guild_id));
                }
                entry.get().clone()
            }
            Entry::Vacant(entry) => entry.insert(self.spawn_worker(guild_id)).value().clone(),
        }
    }

    pub fn guild_count(&self) -> usize {
        self.handles.len()
    }

    fn spawn_worker(&self, guild_id: GuildId) -> GuildHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = GuildWorker::new(
            guild_id,
            self.settings.clone(),
            self.gateway.transport_for(guild_id),
            self.scheduler.clone(),
            self.listener.clone(),
            tx.downgrade(),
            rx,
        );
        tokio::spawn(worker.run());
        info!("🆕 Estado de reproducción creado para guild {}", guild_id);
        GuildHandle { tx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        test_support::{FakeGateway, ScriptedResolver},
        view::NoopListener,
    };
    use std::time::Duration;

    fn registry() -> Arc<GuildRegistry> {
        Arc::new(GuildRegistry::new(
            Arc::new(FakeGateway::default()),
            PrefetchScheduler::new(ScriptedResolver::new(), Duration::from_secs(1)),
            Arc::new(NoopListener),
            PlayerSettings::default(),
        ))
    }

    #[tokio::test]
    async fn concurrent_first_use_creates_one_entry() {
        let registry = registry();
        let guild = GuildId::new(7);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .handle(guild)
                        .request(|reply| GuildCommand::Diagnostics { reply })
                        .await
                        .unwrap()
                        .generation
                })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap(), 0);
        }

        assert_eq!(registry.guild_count(), 1);
    }

    #[tokio::test]
    async fn guilds_get_separate_workers() {
        let registry = registry();
        let a = registry.handle(GuildId::new(1));
        let b = registry.handle(GuildId::new(2));

        a.request(|reply| GuildCommand::Stop { reply }).await.unwrap();
        a.request(|reply| GuildCommand::SetVolume { percent: 10, reply })
            .await
            .unwrap()
            .unwrap();

        let view = b.request(|reply| GuildCommand::Snapshot { reply }).await.unwrap();
        assert_eq!(view.volume, 100);
        assert_eq!(registry.guild_count(), 2);
    }
}
