//! # Bot Module
//!
//! Discord front end for Mixtape.
//!
//! This module contains:
//! - Slash command registration ([`commands`])
//! - Command and button dispatch into the playback core ([`handlers`])
//! - Event handling (ready, interactions, voice state updates)
//!
//! ## Architecture
//!
//! [`MixtapeBot`] implements Serenity's [`EventHandler`]. It owns no playback
//! state of its own: every command is forwarded to the shared
//! [`PlaybackOrchestrator`], and the live "now playing" message is maintained
//! by the [`NowPlayingBoard`] the orchestrator notifies.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mixtape::bot::MixtapeBot;
//! use mixtape::config::Config;
//! # use std::sync::Arc;
//! # fn example(orchestrator: Arc<mixtape::audio::PlaybackOrchestrator>, board: mixtape::ui::NowPlayingBoard) -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let bot = MixtapeBot::new(config, orchestrator, board);
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{audio::PlaybackOrchestrator, config::Config, ui::NowPlayingBoard};

/// Manejador de eventos de Discord.
pub struct MixtapeBot {
    config: Arc<Config>,
    /// Núcleo de reproducción compartido por todos los guilds
    pub orchestrator: Arc<PlaybackOrchestrator>,
    /// Tablero "reproduciendo ahora" de cada guild
    pub board: NowPlayingBoard,
}

impl MixtapeBot {
    pub fn new(config: Config, orchestrator: Arc<PlaybackOrchestrator>, board: NowPlayingBoard) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator,
            board,
        }
    }

    /// Registers slash commands with Discord.
    ///
    /// Commands are registered per guild when `GUILD_ID` is set (fast
    /// propagation, useful for development) and globally otherwise.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");
        info!("🔧 Application ID: {}", self.config.application_id);

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await.map_err(|e| {
                    error!("❌ Error registrando comandos de guild: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for MixtapeBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    /// Slash commands and board buttons. Errors are logged; the user sees
    /// Discord's "interaction failed" message.
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command_interaction) => {
                if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                    error!("Error manejando comando: {:?}", e);
                }
            }
            Interaction::Component(component_interaction) => {
                if let Err(e) = handlers::handle_component(&ctx, component_interaction, self).await {
                    error!("Error manejando componente: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// If the bot itself was removed from its voice channel the guild is
    /// stopped, same as `/stop`.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id {
            return;
        }

        let was_connected = old.as_ref().and_then(|state| state.channel_id).is_some();
        if !was_connected || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            return;
        };

        info!("🔌 Bot desconectado del canal de voz en guild {}", guild_id);
        match self.orchestrator.stop(guild_id).await {
            Ok(true) => info!("⏹️ Reproducción detenida en guild {} tras la desconexión", guild_id),
            Ok(false) => {}
            Err(e) => error!("Error al detener reproducción: {:?}", e),
        }
    }
}
