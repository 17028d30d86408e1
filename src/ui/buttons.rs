use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

use crate::audio::PlaybackView;

/// IDs personalizados para los botones
pub mod button_ids {
    pub const PLAY_PAUSE: &str = "music_play_pause";
    pub const SKIP: &str = "music_skip";
    pub const STOP: &str = "music_stop";
}

/// Acción de un botón del tablero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerButton {
    PlayPause,
    Skip,
    Stop,
}

impl PlayerButton {
    pub fn from_custom_id(custom_id: &str) -> Option<Self> {
        match custom_id {
            button_ids::PLAY_PAUSE => Some(Self::PlayPause),
            button_ids::SKIP => Some(Self::Skip),
            button_ids::STOP => Some(Self::Stop),
            _ => None,
        }
    }
}

/// Controles del reproductor; sin botones cuando no suena nada.
pub fn player_controls(view: &PlaybackView) -> Vec<CreateActionRow> {
    if view.is_idle() {
        return Vec::new();
    }

    let (play_pause_emoji, play_pause_style) = if view.is_paused {
        ('▶', ButtonStyle::Success)
    } else {
        ('⏸', ButtonStyle::Primary)
    };

    let play_pause_btn = CreateButton::new(button_ids::PLAY_PAUSE)
        .emoji(play_pause_emoji)
        .style(play_pause_style);

    let skip_btn = CreateButton::new(button_ids::SKIP)
        .emoji('⏭')
        .style(ButtonStyle::Secondary);

    let stop_btn = CreateButton::new(button_ids::STOP)
        .emoji('⏹')
        .style(ButtonStyle::Danger);

    vec![CreateActionRow::Buttons(vec![play_pause_btn, skip_btn, stop_btn])]
}
