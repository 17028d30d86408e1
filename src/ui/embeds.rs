use serenity::{
    builder::{CreateEmbed, CreateEmbedFooter},
    model::Timestamp,
};
use std::time::Duration;

use crate::audio::{EnqueueOutcome, GuildDiagnostics, PlaybackView};

/// Colores de los embeds
pub mod colors {
    use serenity::model::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(240, 71, 71);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(250, 166, 26);
    pub const INFO_BLUE: Colour = Colour::from_rgb(114, 137, 218);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(155, 89, 182);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(153, 170, 181);
}

pub const STANDARD_FOOTER: &str = "🎵 Mixtape";

/// Canciones de la cola que se muestran en el tablero.
const BOARD_QUEUE_PREVIEW: usize = 5;

/// Canciones por página en `/queue`.
const QUEUE_PAGE: usize = 15;

fn footer() -> CreateEmbedFooter {
    CreateEmbedFooter::new(STANDARD_FOOTER)
}

/// Embed del tablero "reproduciendo ahora".
pub fn now_playing_embed(view: &PlaybackView) -> CreateEmbed {
    let Some(title) = &view.current_title else {
        return idle_embed(view);
    };

    let (heading, color) = if view.is_paused {
        ("⏸️ En Pausa", colors::WARNING_ORANGE)
    } else {
        ("🎵 Reproduciendo Ahora", colors::MUSIC_PURPLE)
    };

    let mut description = format!("**{}**", title);
    if view.is_autoplaying {
        description.push_str("\n🤖 Elegida por autoplay");
    }

    let mut embed = CreateEmbed::default()
        .title(heading)
        .description(description)
        .color(color)
        .field("⏱️ Duración", duration_label(view.current_duration_secs), true)
        .field("🔊 Volumen", format!("{}%", view.volume), true)
        .field("🤖 Autoplay", on_off(view.autoplay_enabled), true);

    if let Some(channel) = &view.channel_name {
        embed = embed.field("📻 Canal", channel, true);
    }

    if !view.queue_titles.is_empty() {
        embed = embed.field(
            format!("📋 A continuación ({})", view.queue_titles.len()),
            queue_lines(&view.queue_titles, BOARD_QUEUE_PREVIEW),
            false,
        );
    }

    if let Some(url) = &view.current_page_url {
        embed = embed.url(url);
    }
    if let Some(thumbnail) = &view.current_thumbnail_url {
        embed = embed.thumbnail(thumbnail);
    }

    embed.timestamp(Timestamp::now()).footer(footer())
}

/// Nada sonando: o inactivo en el canal, o detenido y desconectado.
fn idle_embed(view: &PlaybackView) -> CreateEmbed {
    match &view.channel_name {
        Some(channel) => CreateEmbed::default()
            .title("💤 Nada en reproducción")
            .description(format!(
                "Sigo en **{}**. Usa `/play` para poner música.",
                channel
            ))
            .color(colors::NEUTRAL_GRAY)
            .field("🤖 Autoplay", on_off(view.autoplay_enabled), true)
            .timestamp(Timestamp::now())
            .footer(footer()),
        None => stopped_embed(),
    }
}

pub fn stopped_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("⏹️ Reproducción detenida")
        .description("La cola se vació y me desconecté del canal de voz.")
        .color(colors::NEUTRAL_GRAY)
        .timestamp(Timestamp::now())
        .footer(footer())
}

/// Embed de `/queue`.
pub fn queue_embed(view: &PlaybackView) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if let Some(title) = &view.current_title {
        embed = embed.field("🎵 Sonando", title, false);
    }

    let description = if view.queue_titles.is_empty() {
        "La cola está vacía. Usa `/play` para agregar canciones.".to_string()
    } else {
        queue_lines(&view.queue_titles, QUEUE_PAGE)
    };

    embed
        .description(description)
        .field("Total", view.queue_titles.len().to_string(), true)
        .field(
            "⏱️ Duración",
            format_duration(Duration::from_secs(view.queue_duration_secs)),
            true,
        )
        .field("🤖 Autoplay", on_off(view.autoplay_enabled), true)
        .timestamp(Timestamp::now())
        .footer(footer())
}

/// Respuesta de `/play`.
pub fn enqueued_embed(outcome: &EnqueueOutcome, first_title: &str) -> CreateEmbed {
    let title = if outcome.started {
        "▶️ Reproduciendo"
    } else {
        "✅ Agregado a la cola"
    };

    let description = if outcome.added == 1 {
        format!("**{}**", first_title)
    } else {
        format!("**{}** y {} más", first_title, outcome.added.saturating_sub(1))
    };

    CreateEmbed::default()
        .title(title)
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .field("📋 En cola", outcome.queue_len.to_string(), true)
        .timestamp(Timestamp::now())
        .footer(footer())
}

pub fn diagnostics_embed(diagnostics: &GuildDiagnostics) -> CreateEmbed {
    let failure = diagnostics
        .last_autoplay_failure
        .as_ref()
        .map_or("ninguno".to_string(), |failure| {
            format!(
                "{:?} en posición {} ({})",
                failure.kind,
                failure.position,
                failure.at.format("%H:%M:%S UTC")
            )
        });

    CreateEmbed::default()
        .title("🩺 Diagnóstico de autoplay")
        .color(colors::NEUTRAL_GRAY)
        .field(
            "Referencia",
            diagnostics.reference_title.as_deref().unwrap_or("ninguna"),
            false,
        )
        .field("Cursor", diagnostics.autoplay_cursor.to_string(), true)
        .field("Generación", diagnostics.generation.to_string(), true)
        .field("Fallos seguidos", diagnostics.autoplay_misses.to_string(), true)
        .field(
            "Precargada",
            diagnostics.prefetched_title.as_deref().unwrap_or("ninguna"),
            false,
        )
        .field("Búsqueda en curso", yes_no(diagnostics.prefetch_in_flight), true)
        .field("Esperando autoplay", yes_no(diagnostics.awaiting_autoplay), true)
        .field("Último fallo", failure, false)
        .timestamp(Timestamp::now())
        .footer(footer())
}

pub fn success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .footer(footer())
}

pub fn error_embed(description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("❌ Error")
        .description(description)
        .color(colors::ERROR_RED)
        .footer(footer())
}

/// Lista numerada (1-based, igual que `/remove`) con el resto resumido.
pub fn queue_lines(titles: &[String], limit: usize) -> String {
    let mut lines: Vec<String> = titles
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, title)| format!("`{}.` {}", i + 1, title))
        .collect();

    if titles.len() > limit {
        lines.push(format!("*... y {} más*", titles.len() - limit));
    }

    lines.join("\n")
}

/// Formatea duración en formato legible
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

fn duration_label(secs: u64) -> String {
    if secs == 0 {
        "🔴 En vivo / desconocida".to_string()
    } else {
        format_duration(Duration::from_secs(secs))
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "Activado"
    } else {
        "Desactivado"
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "sí"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00");
        assert_eq!(format_duration(Duration::from_secs(185)), "3:05");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
        assert_eq!(duration_label(0), "🔴 En vivo / desconocida");
    }

    #[test]
    fn queue_lines_are_numbered_from_one() {
        let titles: Vec<String> = ["A", "B", "C"].iter().map(|t| t.to_string()).collect();
        assert_eq!(queue_lines(&titles, 5), "`1.` A\n`2.` B\n`3.` C");
    }

    #[test]
    fn queue_lines_summarize_the_rest() {
        let titles: Vec<String> = (1..=8).map(|i| format!("Canción {}", i)).collect();
        let text = queue_lines(&titles, 5);
        assert_eq!(text.lines().count(), 6);
        assert!(text.ends_with("*... y 3 más*"));
    }

    #[test]
    fn empty_queue_renders_nothing() {
        assert_eq!(queue_lines(&[], 5), "");
    }
}
