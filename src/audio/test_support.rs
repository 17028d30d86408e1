//! Fakes for exercising the playback core without Discord or yt-dlp.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};
use tokio::sync::Semaphore;

use super::{
    error::{ResolveError, TransportError},
    track::Track,
    view::{PlaybackListener, PlaybackView},
};
use crate::{
    sources::MediaResolver,
    voice::{FinishedCallback, VoiceChannel, VoiceGateway, VoiceTransport},
};

pub(crate) fn track(title: &str) -> Track {
    Track::new(
        title,
        format!("stream://{title}"),
        format!("https://www.youtube.com/watch?v={title}"),
    )
}

pub(crate) fn channel(id: u64, name: &str) -> VoiceChannel {
    VoiceChannel::new(ChannelId::new(id), name)
}

/// Espera hasta que `check` se cumpla (o falla a los 2 s).
pub(crate) async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("la condición no se cumplió a tiempo");
}

#[derive(Default)]
struct TransportState {
    channel: Option<VoiceChannel>,
    plays: Vec<String>,
    callback: Option<FinishedCallback>,
    playing: bool,
    paused: bool,
    volume: Option<f32>,
    stops: usize,
    fail_next_play: Option<TransportError>,
    fail_next_connect: Option<TransportError>,
}

/// Transporte en memoria: guarda el callback para terminar el track a mano.
#[derive(Default)]
pub(crate) struct FakeTransport {
    state: Mutex<TransportState>,
}

impl FakeTransport {
    pub(crate) fn connected_to(channel: VoiceChannel) -> Self {
        let transport = Self::default();
        transport.state.lock().channel = Some(channel);
        transport
    }

    pub(crate) fn plays(&self) -> Vec<String> {
        self.state.lock().plays.clone()
    }

    pub(crate) fn stops(&self) -> usize {
        self.state.lock().stops
    }

    pub(crate) fn volume(&self) -> Option<f32> {
        self.state.lock().volume
    }

    /// Se queda con el callback del track actual, como si llegara tarde.
    pub(crate) fn take_callback(&self) -> Option<FinishedCallback> {
        self.state.lock().callback.take()
    }

    pub(crate) fn fail_next_play(&self, error: TransportError) {
        self.state.lock().fail_next_play = Some(error);
    }

    pub(crate) fn fail_next_connect(&self, error: TransportError) {
        self.state.lock().fail_next_connect = Some(error);
    }

    /// Corta la conexión sin avisar a nadie.
    pub(crate) fn drop_connection(&self) {
        let mut state = self.state.lock();
        state.channel = None;
        state.callback = None;
        state.playing = false;
    }

    /// Termina el track actual como lo haría el driver de voz.
    pub(crate) fn finish(&self, error: Option<&str>) {
        let callback = {
            let mut state = self.state.lock();
            state.playing = false;
            state.paused = false;
            state.callback.take()
        };
        if let Some(callback) = callback {
            callback(error.map(str::to_string));
        }
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn connect(&self, channel: &VoiceChannel) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_next_connect.take() {
            return Err(error);
        }
        state.channel = Some(channel.clone());
        Ok(())
    }

    async fn move_to(&self, channel: &VoiceChannel) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.channel.is_none() {
            return Err(TransportError::NotConnected);
        }
        state.channel = Some(channel.clone());
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.state.lock().channel = None;
        self.finish(None);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().channel.is_some()
    }

    fn current_channel(&self) -> Option<VoiceChannel> {
        self.state.lock().channel.clone()
    }

    async fn play(&self, track: &Track, on_finished: FinishedCallback) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_next_play.take() {
            return Err(error);
        }
        if state.channel.is_none() {
            return Err(TransportError::NotConnected);
        }
        state.plays.push(track.title().to_string());
        state.callback = Some(on_finished);
        state.playing = true;
        state.paused = false;
        Ok(())
    }

    async fn stop(&self) {
        self.state.lock().stops += 1;
        self.finish(None);
    }

    async fn pause(&self) {
        self.state.lock().paused = true;
    }

    async fn resume(&self) {
        self.state.lock().paused = false;
    }

    fn is_playing(&self) -> bool {
        let state = self.state.lock();
        state.playing && !state.paused
    }

    fn is_paused(&self) -> bool {
        let state = self.state.lock();
        state.playing && state.paused
    }

    async fn set_volume(&self, ratio: f32) {
        self.state.lock().volume = Some(ratio);
    }
}

/// Un [`FakeTransport`] por guild, conectado a "General" al crearse.
#[derive(Default)]
pub(crate) struct FakeGateway {
    transports: Mutex<HashMap<GuildId, Arc<FakeTransport>>>,
}

impl FakeGateway {
    pub(crate) fn transport(&self, guild_id: GuildId) -> Arc<FakeTransport> {
        self.transports
            .lock()
            .entry(guild_id)
            .or_insert_with(|| Arc::new(FakeTransport::connected_to(channel(1, "General"))))
            .clone()
    }
}

impl VoiceGateway for FakeGateway {
    fn transport_for(&self, guild_id: GuildId) -> Arc<dyn VoiceTransport> {
        self.transport(guild_id)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Scripted {
    Empty,
    Fail,
}

/// Resolvedor con respuestas programadas.
///
/// Por defecto la posición `n` de la mezcla de "X" es "X mix #n". En modo
/// `gated` cada búsqueda relacionada espera un permiso de [`release`](Self::release).
pub(crate) struct ScriptedResolver {
    gate: Option<Semaphore>,
    related_calls: Mutex<Vec<(String, usize)>>,
    related: Mutex<HashMap<usize, Scripted>>,
    queries: Mutex<HashMap<String, Vec<Track>>>,
}

impl ScriptedResolver {
    fn build(gate: Option<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            gate,
            related_calls: Mutex::new(Vec::new()),
            related: Mutex::new(HashMap::new()),
            queries: Mutex::new(HashMap::new()),
        })
    }

    pub(crate) fn new() -> Arc<Self> {
        Self::build(None)
    }

    pub(crate) fn gated() -> Arc<Self> {
        Self::build(Some(Semaphore::new(0)))
    }

    pub(crate) fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub(crate) fn script_related(&self, position: usize, answer: Scripted) {
        self.related.lock().insert(position, answer);
    }

    pub(crate) fn script_query(&self, query: &str, tracks: Vec<Track>) {
        self.queries.lock().insert(query.to_string(), tracks);
    }

    pub(crate) fn related_calls(&self) -> Vec<(String, usize)> {
        self.related_calls.lock().clone()
    }

    pub(crate) async fn wait_for_calls(&self, count: usize) {
        eventually(move || async move { self.related_calls.lock().len() >= count }).await;
    }
}

#[async_trait]
impl MediaResolver for ScriptedResolver {
    async fn resolve(&self, query: &str) -> Result<Vec<Track>, ResolveError> {
        Ok(self.queries.lock().get(query).cloned().unwrap_or_default())
    }

    async fn resolve_related(&self, seed: &Track, position: usize) -> Result<Option<Track>, ResolveError> {
        self.related_calls
            .lock()
            .push((seed.title().to_string(), position));

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("semáforo cerrado").forget();
        }

        let scripted = self.related.lock().get(&position).copied();
        match scripted {
            Some(Scripted::Empty) => Ok(None),
            Some(Scripted::Fail) => Err(ResolveError::Process("yt-dlp salió con código 1".into())),
            None => Ok(Some(track(&format!("{} mix #{}", seed.title(), position)))),
        }
    }
}

/// Guarda cada vista notificada.
#[derive(Default)]
pub(crate) struct RecordingListener {
    views: Mutex<Vec<(GuildId, PlaybackView)>>,
}

impl RecordingListener {
    pub(crate) fn count(&self) -> usize {
        self.views.lock().len()
    }

    pub(crate) fn last(&self) -> Option<PlaybackView> {
        self.views.lock().last().map(|(_, view)| view.clone())
    }
}

impl PlaybackListener for RecordingListener {
    fn playback_changed(&self, guild_id: GuildId, view: &PlaybackView) {
        self.views.lock().push((guild_id, view.clone()));
    }
}
