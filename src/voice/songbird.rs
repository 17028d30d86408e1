use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use songbird::{
    error::ControlError,
    input::{HttpRequest, Input, YoutubeDl},
    tracks::{PlayMode, TrackHandle},
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::{FinishedCallback, VoiceChannel, VoiceGateway, VoiceTransport};
use crate::audio::{error::TransportError, track::Track};

/// Extensiones que se reproducen por HTTP sin pasar por yt-dlp.
const DIRECT_MEDIA_EXTENSIONS: &[&str] = &["mp3", "ogg", "opus", "flac", "wav", "m4a", "aac", "mp4"];

/// Entrega un [`SongbirdTransport`] por guild, reutilizándolo entre llamadas.
pub struct SongbirdGateway {
    songbird: Arc<Songbird>,
    http: reqwest::Client,
    transports: DashMap<GuildId, Arc<SongbirdTransport>>,
}

impl SongbirdGateway {
    pub fn new(songbird: Arc<Songbird>, http: reqwest::Client) -> Self {
        Self {
            songbird,
            http,
            transports: DashMap::new(),
        }
    }
}

impl VoiceGateway for SongbirdGateway {
    fn transport_for(&self, guild_id: GuildId) -> Arc<dyn VoiceTransport> {
        self.transports
            .entry(guild_id)
            .or_insert_with(|| {
                Arc::new(SongbirdTransport::new(
                    guild_id,
                    self.songbird.clone(),
                    self.http.clone(),
                ))
            })
            .value()
            .clone()
    }
}

#[derive(Default)]
struct ActiveTrack {
    handle: Option<TrackHandle>,
    paused: bool,
    sequence: u64,
}

/// Transporte de voz sobre la llamada de Songbird de un guild.
pub struct SongbirdTransport {
    guild_id: GuildId,
    songbird: Arc<Songbird>,
    http: reqwest::Client,
    channel: Mutex<Option<VoiceChannel>>,
    active: Arc<Mutex<ActiveTrack>>,
}

impl SongbirdTransport {
    pub fn new(guild_id: GuildId, songbird: Arc<Songbird>, http: reqwest::Client) -> Self {
        Self {
            guild_id,
            songbird,
            http,
            channel: Mutex::new(None),
            active: Arc::new(Mutex::new(ActiveTrack::default())),
        }
    }

    fn input_for(&self, track: &Track) -> Input {
        let uri = track.stream_uri();
        if is_direct_media(uri) {
            debug!("🌐 Stream HTTP directo: {}", uri);
            HttpRequest::new(self.http.clone(), uri.to_string()).into()
        } else {
            // yt-dlp obtiene la URL fresca al empezar a reproducir
            YoutubeDl::new(self.http.clone(), uri.to_string()).into()
        }
    }

    fn current_handle(&self) -> Option<TrackHandle> {
        self.active.lock().handle.clone()
    }

    async fn join(&self, channel: &VoiceChannel) -> Result<(), TransportError> {
        self.songbird
            .join(self.guild_id, channel.id)
            .await
            .map_err(|e| TransportError::Join(e.to_string()))?;
        *self.channel.lock() = Some(channel.clone());
        Ok(())
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn connect(&self, channel: &VoiceChannel) -> Result<(), TransportError> {
        self.join(channel).await?;
        info!("🔊 Conectado a {} en guild {}", channel.name, self.guild_id);
        Ok(())
    }

    async fn move_to(&self, channel: &VoiceChannel) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        // Songbird mueve la llamada existente si ya hay una
        self.join(channel).await?;
        info!("🔀 Movido a {} en guild {}", channel.name, self.guild_id);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if let Some(handle) = self.current_handle() {
            log_control_error(self.guild_id, "detener", handle.stop());
        }
        *self.channel.lock() = None;

        if self.songbird.get(self.guild_id).is_some() {
            self.songbird
                .remove(self.guild_id)
                .await
                .map_err(|e| TransportError::Control(e.to_string()))?;
        }

        info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.channel.lock().is_some() && self.songbird.get(self.guild_id).is_some()
    }

    fn current_channel(&self) -> Option<VoiceChannel> {
        self.channel.lock().clone()
    }

    async fn play(&self, track: &Track, on_finished: FinishedCallback) -> Result<(), TransportError> {
        let call = self
            .songbird
            .get(self.guild_id)
            .ok_or(TransportError::NotConnected)?;

        let input = self.input_for(track);
        let handle = {
            let mut call = call.lock().await;
            call.play_input(input)
        };

        let sequence = {
            let mut active = self.active.lock();
            active.sequence += 1;
            active.sequence
        };
        let notifier = TrackEndNotifier {
            guild_id: self.guild_id,
            sequence,
            active: self.active.clone(),
            on_finished: Arc::new(Mutex::new(Some(on_finished))),
        };
        handle
            .add_event(Event::Track(TrackEvent::End), notifier.clone())
            .map_err(|e| TransportError::Control(e.to_string()))?;
        handle
            .add_event(Event::Track(TrackEvent::Error), notifier)
            .map_err(|e| TransportError::Control(e.to_string()))?;

        let mut active = self.active.lock();
        if active.sequence == sequence {
            active.handle = Some(handle);
            active.paused = false;
        }
        Ok(())
    }

    async fn stop(&self) {
        if let Some(handle) = self.current_handle() {
            log_control_error(self.guild_id, "detener", handle.stop());
        }
    }

    async fn pause(&self) {
        if let Some(handle) = self.current_handle() {
            if log_control_error(self.guild_id, "pausar", handle.pause()) {
                self.active.lock().paused = true;
            }
        }
    }

    async fn resume(&self) {
        if let Some(handle) = self.current_handle() {
            if log_control_error(self.guild_id, "reanudar", handle.play()) {
                self.active.lock().paused = false;
            }
        }
    }

    fn is_playing(&self) -> bool {
        let active = self.active.lock();
        active.handle.is_some() && !active.paused
    }

    fn is_paused(&self) -> bool {
        let active = self.active.lock();
        active.handle.is_some() && active.paused
    }

    async fn set_volume(&self, ratio: f32) {
        if let Some(handle) = self.current_handle() {
            let result = handle.set_volume(ratio.clamp(0.0, 1.0));
            log_control_error(self.guild_id, "cambiar el volumen de", result);
        }
    }
}

/// Un track que ya terminó también rechaza órdenes: se registra y sigue.
fn log_control_error(guild_id: GuildId, action: &str, result: Result<(), ControlError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("⚠️ No se pudo {} el track en guild {}: {}", action, guild_id, e);
            false
        }
    }
}

/// Avisa una sola vez el fin (o error) de un track concreto.
#[derive(Clone)]
struct TrackEndNotifier {
    guild_id: GuildId,
    sequence: u64,
    active: Arc<Mutex<ActiveTrack>>,
    on_finished: Arc<Mutex<Option<FinishedCallback>>>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = match ctx {
            EventContext::Track(tracks) => tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(format!("{:?}", e)),
                _ => None,
            }),
            _ => None,
        };

        {
            let mut active = self.active.lock();
            if active.sequence == self.sequence {
                active.handle = None;
                active.paused = false;
            }
        }

        // End y Error pueden llegar los dos; solo el primero avisa
        let callback = self.on_finished.lock().take();
        if let Some(callback) = callback {
            debug!("🏁 Track terminado en guild {}", self.guild_id);
            callback(error);
        }

        Some(Event::Cancel)
    }
}

/// `true` si la URI apunta a un archivo de audio servible por HTTP.
fn is_direct_media(uri: &str) -> bool {
    let Ok(url) = Url::parse(uri) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    url.path_segments()
        .and_then(|segments| segments.last())
        .and_then(|file| file.rsplit_once('.'))
        .is_some_and(|(_, ext)| DIRECT_MEDIA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_errors_are_reported() {
        let guild_id = GuildId::new(42);
        assert!(log_control_error(guild_id, "detener", Ok(())));
        assert!(!log_control_error(guild_id, "detener", Err(ControlError::Finished)));
    }

    #[test]
    fn direct_media_by_extension() {
        assert!(is_direct_media("https://cdn.example.com/music/track.MP3"));
        assert!(is_direct_media("http://radio.example.com/live.ogg?token=abc"));
        assert!(!is_direct_media("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(!is_direct_media("https://soundcloud.com/artist/song"));
        assert!(!is_direct_media("ytsearch1:daft punk"));
    }
}
