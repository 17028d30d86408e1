//! # Voice Module
//!
//! Voice transport abstraction used by the playback core.
//!
//! The core never talks to Songbird directly: it drives a [`VoiceTransport`]
//! per guild, obtained from a [`VoiceGateway`]. The transport reports the end
//! of every `play` call exactly once through the [`FinishedCallback`] it was
//! handed, with `Some(error)` if the stream failed.
//!
//! [`songbird`] contains the production implementation.

pub mod songbird;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;

use crate::audio::{error::TransportError, track::Track};

pub use self::songbird::{SongbirdGateway, SongbirdTransport};

/// Se invoca una sola vez cuando termina el track (con error si falló).
pub type FinishedCallback = Box<dyn FnOnce(Option<String>) + Send + 'static>;

/// Canal de voz con su nombre legible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceChannel {
    pub id: ChannelId,
    pub name: String,
}

impl VoiceChannel {
    pub fn new(id: ChannelId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Sesión de voz de un guild.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(&self, channel: &VoiceChannel) -> Result<(), TransportError>;

    async fn move_to(&self, channel: &VoiceChannel) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    fn current_channel(&self) -> Option<VoiceChannel>;

    /// Empieza a reproducir `track`; `on_finished` se llama al terminar.
    async fn play(&self, track: &Track, on_finished: FinishedCallback) -> Result<(), TransportError>;

    /// Detiene el track actual. Dispara el callback de fin de forma asíncrona.
    async fn stop(&self);

    async fn pause(&self);

    async fn resume(&self);

    fn is_playing(&self) -> bool;

    fn is_paused(&self) -> bool;

    /// Volumen lineal entre 0.0 y 1.0.
    async fn set_volume(&self, ratio: f32);
}

/// Entrega el transporte de cada guild.
pub trait VoiceGateway: Send + Sync {
    fn transport_for(&self, guild_id: GuildId) -> Arc<dyn VoiceTransport>;
}
