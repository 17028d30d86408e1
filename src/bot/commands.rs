use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

fn all_commands() -> Vec<CreateCommand> {
    vec![
        join_command(),
        play_command(),
        nowplaying_command(),
        skip_command(),
        volume_command(),
        stop_command(),
        pause_command(),
        resume_command(),
        queue_command(),
        remove_command(),
        autoplay_command(),
        diagnostics_command(),
    ]
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

// Comandos de reproducción

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Conecta el bot a tu canal de voz")
}

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una canción o playlist")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL o término de búsqueda",
            )
            .required(true),
        )
}

fn nowplaying_command() -> CreateCommand {
    CreateCommand::new("nowplaying").description("Muestra el tablero de la canción actual")
}

// Comandos de control

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Salta a la siguiente canción")
}

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Ajusta el volumen")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "level", "Volumen (0-100)")
                .required(true),
        )
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la reproducción, limpia la cola y sale del canal")
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la reproducción actual")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la reproducción pausada")
}

// Comandos de cola

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Muestra la cola de reproducción")
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Quita una canción de la cola")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "position",
                "Posición en la cola (empieza en 1)",
            )
            .required(true),
        )
}

fn autoplay_command() -> CreateCommand {
    CreateCommand::new("autoplay")
        .description("Activa o desactiva la reproducción automática")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Boolean, "enabled", "Activar autoplay")
                .required(true),
        )
}

fn diagnostics_command() -> CreateCommand {
    CreateCommand::new("diagnostics").description("Estado interno del autoplay en este servidor")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_one_definition_per_command() {
        assert_eq!(all_commands().len(), 12);
    }
}
