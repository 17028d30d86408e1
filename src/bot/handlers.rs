use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::{CommandInteraction, ComponentInteraction},
        id::{GuildId, UserId},
    },
    prelude::Context,
};
use tracing::info;

use crate::{
    audio::{EnqueueOutcome, JoinOutcome, PlaybackError, PlaybackView},
    bot::MixtapeBot,
    ui::{
        buttons::{self, PlayerButton},
        embeds,
    },
    voice::VoiceChannel,
};

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &MixtapeBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "join" => handle_join(ctx, &command, bot, guild_id).await,
        "play" => handle_play(ctx, &command, bot, guild_id).await,
        "nowplaying" => handle_nowplaying(ctx, &command, bot, guild_id).await,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await,
        "volume" => handle_volume(ctx, &command, bot, guild_id).await,
        "stop" => handle_stop(ctx, &command, bot, guild_id).await,
        "pause" => handle_pause(ctx, &command, bot, guild_id, true).await,
        "resume" => handle_pause(ctx, &command, bot, guild_id, false).await,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await,
        "remove" => handle_remove(ctx, &command, bot, guild_id).await,
        "autoplay" => handle_autoplay(ctx, &command, bot, guild_id).await,
        "diagnostics" => handle_diagnostics(ctx, &command, bot, guild_id).await,
        _ => reply(ctx, &command, embeds::error_embed("Comando no reconocido"), true).await,
    }
}

/// Maneja los botones del tablero
pub async fn handle_component(ctx: &Context, component: ComponentInteraction, bot: &MixtapeBot) -> Result<()> {
    let guild_id = component
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Componente usado fuera de un servidor"))?;

    info!(
        "🔘 Botón {} presionado por {} en guild {}",
        component.data.custom_id, component.user.name, guild_id
    );

    let Some(button) = PlayerButton::from_custom_id(&component.data.custom_id) else {
        component
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content("❌ Acción no reconocida")
                        .ephemeral(true),
                ),
            )
            .await?;
        return Ok(());
    };

    let orchestrator = &bot.orchestrator;
    match button {
        PlayerButton::PlayPause => {
            let view = orchestrator.snapshot(guild_id).await?;
            orchestrator.set_paused(guild_id, !view.is_paused).await?;
        }
        PlayerButton::Skip => {
            orchestrator.skip(guild_id).await?;
        }
        PlayerButton::Stop => {
            orchestrator.stop(guild_id).await?;
        }
    }

    // El tablero se actualiza solo con el nuevo estado
    component
        .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
        .await?;

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_join(ctx: &Context, command: &CommandInteraction, bot: &MixtapeBot, guild_id: GuildId) -> Result<()> {
    let Some(channel) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return reply(ctx, command, not_in_voice(), true).await;
    };
    let name = channel.name.clone();

    let embed = match bot.orchestrator.join(guild_id, channel).await {
        Ok(JoinOutcome::Joined) => {
            bot.board.bind(guild_id, command.channel_id);
            embeds::success_embed("Conectado", &format!("🔊 Entré a **{}**", name))
        }
        Ok(JoinOutcome::Moved) => embeds::success_embed("Movido", &format!("🔀 Ahora estoy en **{}**", name)),
        Ok(JoinOutcome::AlreadyConnected) => {
            embeds::success_embed("Conectado", &format!("Ya estoy en **{}**", name))
        }
        Err(e) => embeds::error_embed(&playback_error_message(&e)),
    };

    reply(ctx, command, embed, false).await
}

async fn handle_play(ctx: &Context, command: &CommandInteraction, bot: &MixtapeBot, guild_id: GuildId) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    // Verificar que el usuario esté en un canal de voz
    let Some(channel) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return reply(ctx, command, not_in_voice(), true).await;
    };

    // Defer la respuesta ya que la búsqueda puede tardar
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let orchestrator = &bot.orchestrator;
    let embed = match orchestrator.join(guild_id, channel).await {
        Err(e) => embeds::error_embed(&playback_error_message(&e)),
        Ok(_) => {
            bot.board.bind(guild_id, command.channel_id);
            match orchestrator.play_query(guild_id, &query).await {
                Ok(outcome) => {
                    let view = orchestrator.snapshot(guild_id).await?;
                    let title = first_added_title(&view, &outcome).unwrap_or(query);
                    embeds::enqueued_embed(&outcome, &title)
                }
                Err(e) => embeds::error_embed(&playback_error_message(&e)),
            }
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

async fn handle_nowplaying(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MixtapeBot,
    guild_id: GuildId,
) -> Result<()> {
    bot.board.bind(guild_id, command.channel_id);
    let view = bot.orchestrator.snapshot(guild_id).await?;

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::now_playing_embed(&view))
                    .components(buttons::player_controls(&view)),
            ),
        )
        .await?;

    Ok(())
}

async fn handle_skip(ctx: &Context, command: &CommandInteraction, bot: &MixtapeBot, guild_id: GuildId) -> Result<()> {
    let embed = if bot.orchestrator.skip(guild_id).await? {
        embeds::success_embed("Saltada", "⏭️ Pasando a la siguiente")
    } else {
        embeds::error_embed("No hay nada sonando")
    };
    reply(ctx, command, embed, false).await
}

async fn handle_volume(ctx: &Context, command: &CommandInteraction, bot: &MixtapeBot, guild_id: GuildId) -> Result<()> {
    let level = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "level")
        .and_then(|opt| opt.value.as_i64())
        .ok_or_else(|| anyhow::anyhow!("Volumen no proporcionado"))?;

    match bot.orchestrator.set_volume(guild_id, level).await {
        Ok(()) => {
            let embed = embeds::success_embed("Volumen", &format!("🔊 Volumen al {}%", level));
            reply(ctx, command, embed, false).await
        }
        Err(e) => reply(ctx, command, embeds::error_embed(&playback_error_message(&e)), true).await,
    }
}

async fn handle_stop(ctx: &Context, command: &CommandInteraction, bot: &MixtapeBot, guild_id: GuildId) -> Result<()> {
    let embed = if bot.orchestrator.stop(guild_id).await? {
        embeds::success_embed("Detenido", "⏹️ Cola vaciada y canal abandonado")
    } else {
        embeds::error_embed("No había nada que detener")
    };
    reply(ctx, command, embed, false).await
}

async fn handle_pause(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MixtapeBot,
    guild_id: GuildId,
    paused: bool,
) -> Result<()> {
    let changed = bot.orchestrator.set_paused(guild_id, paused).await?;

    let embed = match (changed, paused) {
        (true, true) => embeds::success_embed("Pausado", "⏸️ Reproducción en pausa"),
        (true, false) => embeds::success_embed("Reanudado", "▶️ Reproducción reanudada"),
        (false, true) => embeds::error_embed("No hay nada sonando para pausar"),
        (false, false) => embeds::error_embed("No hay nada en pausa"),
    };
    reply(ctx, command, embed, false).await
}

async fn handle_queue(ctx: &Context, command: &CommandInteraction, bot: &MixtapeBot, guild_id: GuildId) -> Result<()> {
    let view = bot.orchestrator.snapshot(guild_id).await?;
    reply(ctx, command, embeds::queue_embed(&view), false).await
}

async fn handle_remove(ctx: &Context, command: &CommandInteraction, bot: &MixtapeBot, guild_id: GuildId) -> Result<()> {
    let position = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "position")
        .and_then(|opt| opt.value.as_i64())
        .ok_or_else(|| anyhow::anyhow!("Posición no proporcionada"))?;

    match bot.orchestrator.remove_at(guild_id, position).await {
        Ok(track) => {
            let embed = embeds::success_embed("Quitada", &format!("🗑️ **{}**", track.title()));
            reply(ctx, command, embed, false).await
        }
        Err(e) => reply(ctx, command, embeds::error_embed(&playback_error_message(&e)), true).await,
    }
}

async fn handle_autoplay(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MixtapeBot,
    guild_id: GuildId,
) -> Result<()> {
    let enabled = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "enabled")
        .and_then(|opt| opt.value.as_bool())
        .ok_or_else(|| anyhow::anyhow!("Opción enabled no proporcionada"))?;

    bot.orchestrator.set_autoplay(guild_id, enabled).await?;

    let embed = if enabled {
        embeds::success_embed("Autoplay", "🤖 Autoplay activado")
    } else {
        embeds::success_embed("Autoplay", "🤖 Autoplay desactivado")
    };
    reply(ctx, command, embed, false).await
}

async fn handle_diagnostics(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MixtapeBot,
    guild_id: GuildId,
) -> Result<()> {
    let diagnostics = bot.orchestrator.diagnostics(guild_id).await?;
    reply(ctx, command, embeds::diagnostics_embed(&diagnostics), true).await
}

// Utilidades

async fn reply(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed, ephemeral: bool) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

fn not_in_voice() -> CreateEmbed {
    embeds::error_embed("Debes estar en un canal de voz")
}

/// Canal de voz del usuario según la caché del guild.
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<VoiceChannel> {
    let guild = ctx.cache.guild(guild_id)?;
    let channel_id = guild.voice_states.get(&user_id)?.channel_id?;
    let name = guild
        .channels
        .get(&channel_id)
        .map_or_else(|| channel_id.to_string(), |channel| channel.name.clone());
    Some(VoiceChannel::new(channel_id, name))
}

/// Título de la primera canción que acaba de entrar.
fn first_added_title(view: &PlaybackView, outcome: &EnqueueOutcome) -> Option<String> {
    if outcome.started {
        return view.current_title.clone();
    }
    let index = view.queue_titles.len().checked_sub(outcome.added)?;
    view.queue_titles.get(index).cloned()
}

fn playback_error_message(error: &PlaybackError) -> String {
    match error {
        PlaybackError::ResolveFailed { query, .. } => {
            format!("⚠️ No pude buscar `{}`. Inténtalo de nuevo en un momento.", query)
        }
        PlaybackError::NoUsableResult { query } => {
            format!("🔍 No encontré nada reproducible para `{}`.", query)
        }
        PlaybackError::InvalidIndex { .. } | PlaybackError::InvalidVolume(_) | PlaybackError::QueueFull { .. } => {
            error.to_string()
        }
        other => format!("🔇 {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ResolveError;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn view_with(current: Option<&str>, queue: &[&str]) -> PlaybackView {
        PlaybackView {
            current_title: current.map(str::to_string),
            queue_titles: queue.iter().map(|t| t.to_string()).collect(),
            ..PlaybackView::default()
        }
    }

    #[test]
    fn first_title_is_the_current_track_when_playback_started() {
        let view = view_with(Some("Song A"), &["Song B"]);
        let outcome = EnqueueOutcome { added: 2, started: true, queue_len: 1 };
        assert_eq!(first_added_title(&view, &outcome).as_deref(), Some("Song A"));
    }

    #[test]
    fn first_title_counts_back_from_the_end_of_the_queue() {
        let view = view_with(Some("Old"), &["Queued", "New 1", "New 2"]);
        let outcome = EnqueueOutcome { added: 2, started: false, queue_len: 3 };
        assert_eq!(first_added_title(&view, &outcome).as_deref(), Some("New 1"));
    }

    #[test]
    fn resolver_failures_read_differently_from_empty_results() {
        let failed = PlaybackError::ResolveFailed {
            query: "lofi".into(),
            source: ResolveError::Timeout(Duration::from_secs(45)),
        };
        let empty = PlaybackError::NoUsableResult { query: "lofi".into() };

        assert!(playback_error_message(&failed).starts_with("⚠️"));
        assert!(playback_error_message(&empty).starts_with("🔍"));
        assert_eq!(
            playback_error_message(&PlaybackError::InvalidVolume(150)),
            "volumen 150 fuera de rango (0-100)"
        );
    }
}
