//! Per-guild playback worker.
//!
//! Each guild gets one tokio task that exclusively owns its
//! [`GuildPlaybackState`]. User commands, transport "finished" callbacks and
//! prefetch completions all arrive as [`GuildCommand`]s on the same channel, so
//! every transition for a guild runs to completion before the next one starts
//! and a callback can never re-enter a transition that is still running.
//!
//! ## PlayNext
//!
//! `PlayNext` is a loop over [`NextStep`]:
//!
//! - **Play**: the front of the queue (or a cached autoplay candidate) becomes
//!   current. A transport error drops the track and the loop continues.
//! - **AwaitAutoplay**: nothing cached, so the lookup for the cursor position is
//!   launched through the prefetch slot and the worker goes back to serving
//!   commands. The completion resumes `PlayNext` if the guild is still waiting.
//! - **Idle**: nothing left to play.

use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::{
    error::{PlaybackError, PlaybackResult, TransportError},
    prefetch::{PrefetchOutcome, PrefetchScheduler, PrefetchTicket},
    state::{GuildPlaybackState, PlayTicket},
    track::Track,
    view::{AutoplayFailureKind, GuildDiagnostics, PlaybackListener, PlaybackView},
};
use crate::{
    config::PlayerSettings,
    voice::{FinishedCallback, VoiceChannel, VoiceTransport},
};

/// Resultado de agregar canciones a la cola.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueOutcome {
    /// Cuántas entraron (el resto no cabía).
    pub added: usize,
    /// La reproducción arrancó con esta llamada.
    pub started: bool,
    pub queue_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    Moved,
    AlreadyConnected,
}

pub(crate) enum GuildCommand {
    Enqueue {
        tracks: Vec<Track>,
        reply: oneshot::Sender<PlaybackResult<EnqueueOutcome>>,
    },
    PlayNext {
        reply: oneshot::Sender<()>,
    },
    Finished {
        /// `None` cuando lo pide un llamador externo y no el transporte.
        ticket: Option<PlayTicket>,
        error: Option<String>,
        reply: Option<oneshot::Sender<()>>,
    },
    Skip {
        reply: oneshot::Sender<bool>,
    },
    RemoveAt {
        index: i64,
        reply: oneshot::Sender<PlaybackResult<Track>>,
    },
    Stop {
        reply: oneshot::Sender<bool>,
    },
    Join {
        channel: VoiceChannel,
        reply: oneshot::Sender<PlaybackResult<JoinOutcome>>,
    },
    SetAutoplay {
        enabled: bool,
        reply: oneshot::Sender<()>,
    },
    SetVolume {
        percent: i64,
        reply: oneshot::Sender<PlaybackResult<()>>,
    },
    SetPaused {
        paused: bool,
        reply: oneshot::Sender<bool>,
    },
    Prefetch {
        reply: oneshot::Sender<bool>,
    },
    PrefetchFinished {
        ticket: PrefetchTicket,
        outcome: PrefetchOutcome,
    },
    Snapshot {
        reply: oneshot::Sender<PlaybackView>,
    },
    Diagnostics {
        reply: oneshot::Sender<GuildDiagnostics>,
    },
}

enum NextStep {
    Play(Track),
    AwaitAutoplay,
    Idle,
}

pub(crate) struct GuildWorker {
    guild_id: GuildId,
    state: GuildPlaybackState,
    transport: Arc<dyn VoiceTransport>,
    scheduler: PrefetchScheduler,
    listener: Arc<dyn PlaybackListener>,
    // Débil: los callbacks pendientes no deben mantener vivo al worker
    events: mpsc::WeakUnboundedSender<GuildCommand>,
    commands: mpsc::UnboundedReceiver<GuildCommand>,
}

impl GuildWorker {
    pub(crate) fn new(
        guild_id: GuildId,
        settings: PlayerSettings,
        transport: Arc<dyn VoiceTransport>,
        scheduler: PrefetchScheduler,
        listener: Arc<dyn PlaybackListener>,
        events: mpsc::WeakUnboundedSender<GuildCommand>,
        commands: mpsc::UnboundedReceiver<GuildCommand>,
    ) -> Self {
        Self {
            guild_id,
            state: GuildPlaybackState::new(settings),
            transport,
            scheduler,
            listener,
            events,
            commands,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("🎛️ Worker de reproducción iniciado para guild {}", self.guild_id);

        while let Some(command) = self.commands.recv().await {
            self.handle(command).await;
        }

        self.state.prefetch.cancel();
        debug!("🎛️ Worker de guild {} finalizado", self.guild_id);
    }

    async fn handle(&mut self, command: GuildCommand) {
        // Si quien pidió algo ya no espera la respuesta, se ignora el envío
        match command {
            GuildCommand::Enqueue { tracks, reply } => {
                let _ = reply.send(self.enqueue(tracks).await);
            }
            GuildCommand::PlayNext { reply } => {
                self.play_next().await;
                let _ = reply.send(());
            }
            GuildCommand::Finished {
                ticket,
                error,
                reply,
            } => {
                self.finished(ticket, error).await;
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
            }
            GuildCommand::Skip { reply } => {
                let _ = reply.send(self.skip().await);
            }
            GuildCommand::RemoveAt { index, reply } => {
                let _ = reply.send(self.remove_at(index));
            }
            GuildCommand::Stop { reply } => {
                let _ = reply.send(self.stop().await);
            }
            GuildCommand::Join { channel, reply } => {
                let _ = reply.send(self.join(channel).await);
            }
            GuildCommand::SetAutoplay { enabled, reply } => {
                self.set_autoplay(enabled);
                let _ = reply.send(());
            }
            GuildCommand::SetVolume { percent, reply } => {
                let _ = reply.send(self.set_volume(percent).await);
            }
            GuildCommand::SetPaused { paused, reply } => {
                let _ = reply.send(self.set_paused(paused).await);
            }
            GuildCommand::Prefetch { reply } => {
                let _ = reply.send(self.launch_prefetch());
            }
            GuildCommand::PrefetchFinished { ticket, outcome } => {
                self.prefetch_finished(ticket, outcome).await;
            }
            GuildCommand::Snapshot { reply } => {
                let _ = reply.send(self.view());
            }
            GuildCommand::Diagnostics { reply } => {
                let _ = reply.send(self.state.diagnostics());
            }
        }
    }

    async fn enqueue(&mut self, tracks: Vec<Track>) -> PlaybackResult<EnqueueOutcome> {
        let added = self.state.queue.extend(tracks)?;

        if added > 0 {
            info!("📝 Guild {}: {} canciones agregadas a la cola", self.guild_id, added);
            if let Some(last) = self
                .state
                .queue
                .last()
                .filter(|t| !t.is_autoplay_generated())
                .cloned()
            {
                self.state.set_reference(last);
            }
        }

        let was_idle = self.state.current.is_none();
        if was_idle && !self.transport.is_paused() {
            self.play_next().await;
        } else if added > 0 {
            self.notify();
        }

        Ok(EnqueueOutcome {
            added,
            started: was_idle && self.state.current.is_some(),
            queue_len: self.state.queue.len(),
        })
    }

    async fn play_next(&mut self) {
        if self.state.current.is_some() {
            debug!("🎵 Guild {}: ya hay un track sonando, PlayNext ignorado", self.guild_id);
            return;
        }
        if !self.transport.is_connected() {
            debug!("🔇 Guild {} sin conexión de voz, PlayNext ignorado", self.guild_id);
            return;
        }

        loop {
            match self.next_step() {
                NextStep::Play(track) => match self.start(track).await {
                    Ok(()) => {
                        self.notify();
                        return;
                    }
                    Err(TransportError::NotConnected) => {
                        debug!("🔇 Guild {} perdió la conexión de voz al reproducir", self.guild_id);
                        self.state.clear_current();
                        return;
                    }
                    Err(e) => {
                        warn!("⚠️ Guild {}: no se pudo reproducir, se salta: {}", self.guild_id, e);
                        self.state.clear_current();
                    }
                },
                NextStep::AwaitAutoplay => {
                    debug!(
                        "⏳ Guild {}: esperando autoplay en posición {}",
                        self.guild_id, self.state.autoplay_cursor
                    );
                    return;
                }
                NextStep::Idle => {
                    self.go_idle();
                    return;
                }
            }
        }
    }

    fn next_step(&mut self) -> NextStep {
        if let Some(track) = self.state.queue.pop_front() {
            if !track.is_autoplay_generated() {
                self.state.set_reference(track.clone());
            }
            return NextStep::Play(track);
        }

        if !self.state.autoplay_enabled || self.state.reference.is_none() {
            return NextStep::Idle;
        }

        let ticket = self.state.prefetch_ticket();
        if let Some(candidate) = self.state.prefetch.take_matching(ticket) {
            info!(
                "✨ Guild {}: autoplay desde caché (posición {}): {}",
                self.guild_id,
                ticket.position,
                candidate.title()
            );
            self.state.advance_cursor();
            return NextStep::Play(candidate);
        }

        if self.state.autoplay_misses >= self.state.settings().autoplay_skip_limit {
            info!(
                "🛑 Guild {}: {} posiciones de autoplay sin resultado, se detiene",
                self.guild_id, self.state.autoplay_misses
            );
            return NextStep::Idle;
        }

        self.state.prefetch.set_awaiting(true);
        self.launch_prefetch();
        NextStep::AwaitAutoplay
    }

    /// Pone `track` como actual y se lo entrega al transporte.
    async fn start(&mut self, track: Track) -> Result<(), TransportError> {
        let ticket = self.state.begin_play(track.clone());
        self.launch_prefetch();

        let events = self.events.clone();
        let on_finished: FinishedCallback = Box::new(move |error| {
            if let Some(tx) = events.upgrade() {
                let _ = tx.send(GuildCommand::Finished {
                    ticket: Some(ticket),
                    error,
                    reply: None,
                });
            }
        });

        self.transport.play(&track, on_finished).await?;
        self.transport.set_volume(self.volume_ratio()).await;

        info!("🎵 Guild {}: reproduciendo {}", self.guild_id, track.title());
        Ok(())
    }

    async fn finished(&mut self, ticket: Option<PlayTicket>, error: Option<String>) {
        match ticket {
            Some(ticket) if !self.state.is_current_play(ticket) => {
                debug!("🗑️ Guild {}: fin de track obsoleto ignorado ({:?})", self.guild_id, ticket);
                return;
            }
            Some(_) => {}
            None => {
                // El stream sigue vivo: se corta y se avanza con su propio callback
                let active = self.transport.is_playing() || self.transport.is_paused();
                if self.state.current.is_some() && active {
                    debug!("⏹️ Guild {}: fin externo, deteniendo el track en curso", self.guild_id);
                    self.transport.stop().await;
                    return;
                }
            }
        }

        if let Some(error) = error {
            warn!("⚠️ Guild {}: el track terminó con error: {}", self.guild_id, error);
        }
        if let Some(track) = &self.state.current {
            debug!("🏁 Guild {}: terminó {}", self.guild_id, track.title());
        }

        self.state.clear_current();
        self.play_next().await;
    }

    async fn skip(&mut self) -> bool {
        let active = self.transport.is_playing() || self.transport.is_paused();
        if self.state.current.is_none() || !active {
            return false;
        }

        info!("⏭️ Guild {}: canción saltada", self.guild_id);
        // El fin llega por el callback del transporte, que dispara PlayNext
        self.transport.stop().await;
        true
    }

    fn remove_at(&mut self, index: i64) -> PlaybackResult<Track> {
        let removed = self.state.queue.remove_at(index)?;
        self.notify();
        Ok(removed)
    }

    async fn stop(&mut self) -> bool {
        let connected = self.transport.is_connected();
        if connected {
            if let Err(e) = self.transport.disconnect().await {
                warn!("⚠️ Guild {}: error al desconectar: {}", self.guild_id, e);
            }
        }

        let dirty = !self.state.is_pristine();
        if dirty {
            self.state.reset();
        }

        if connected || dirty {
            info!("⏹️ Guild {}: reproducción detenida", self.guild_id);
            self.notify();
            true
        } else {
            false
        }
    }

    async fn join(&mut self, channel: VoiceChannel) -> PlaybackResult<JoinOutcome> {
        let current = self
            .transport
            .current_channel()
            .filter(|_| self.transport.is_connected());

        let outcome = match current {
            Some(existing) if existing.id == channel.id => return Ok(JoinOutcome::AlreadyConnected),
            Some(_) => {
                self.transport.move_to(&channel).await.map_err(disconnected)?;
                JoinOutcome::Moved
            }
            None => {
                self.transport.connect(&channel).await.map_err(disconnected)?;
                JoinOutcome::Joined
            }
        };

        info!("🔊 Guild {}: {:?} a {}", self.guild_id, outcome, channel.name);
        self.notify();
        Ok(outcome)
    }

    fn set_autoplay(&mut self, enabled: bool) {
        self.state.autoplay_enabled = enabled;
        info!("🔁 Guild {}: autoplay {}", self.guild_id, if enabled { "activado" } else { "desactivado" });

        if !enabled && self.state.prefetch.is_awaiting() {
            self.go_idle();
            return;
        }
        if enabled && self.state.current.is_some() {
            self.launch_prefetch();
        }
        self.notify();
    }

    async fn set_volume(&mut self, percent: i64) -> PlaybackResult<()> {
        let volume = u8::try_from(percent)
            .ok()
            .filter(|v| *v <= 100)
            .ok_or(PlaybackError::InvalidVolume(percent))?;

        self.state.volume = volume;
        if self.state.current.is_some() {
            self.transport.set_volume(self.volume_ratio()).await;
        }

        debug!("🔊 Guild {}: volumen {}%", self.guild_id, volume);
        self.notify();
        Ok(())
    }

    async fn set_paused(&mut self, paused: bool) -> bool {
        if self.state.current.is_none() || self.state.is_paused == paused {
            return false;
        }

        if paused {
            self.transport.pause().await;
            info!("⏸️ Guild {}: reproducción pausada", self.guild_id);
        } else {
            self.transport.resume().await;
            info!("▶️ Guild {}: reproducción reanudada", self.guild_id);
        }
        self.state.is_paused = paused;
        self.state.is_playing = !paused;
        self.notify();
        true
    }

    /// Lanza la búsqueda del candidato para la posición actual del cursor.
    ///
    /// No hace nada sin referencia, con autoplay apagado, si el candidato ya
    /// está en caché o si hay otra búsqueda en curso.
    fn launch_prefetch(&mut self) -> bool {
        if !self.state.autoplay_enabled {
            return false;
        }
        let Some(seed) = self.state.reference.clone() else {
            return false;
        };
        let ticket = self.state.prefetch_ticket();
        if self.state.prefetch.has_candidate_for(ticket) {
            return false;
        }

        let events = self.events.clone();
        self.scheduler
            .schedule(&mut self.state.prefetch, seed, ticket, move |ticket, outcome| {
                if let Some(tx) = events.upgrade() {
                    let _ = tx.send(GuildCommand::PrefetchFinished { ticket, outcome });
                }
            })
    }

    async fn prefetch_finished(&mut self, ticket: PrefetchTicket, outcome: PrefetchOutcome) {
        if !self.state.prefetch.finish(ticket) {
            debug!("🗑️ Guild {}: prefetch cancelado ignorado ({:?})", self.guild_id, ticket);
            return;
        }

        if ticket != self.state.prefetch_ticket() {
            debug!(
                "🗑️ Guild {}: prefetch obsoleto descartado ({}, {:?})",
                self.guild_id,
                outcome.kind(),
                ticket
            );
            // La referencia o el cursor cambiaron mientras tanto
            if self.state.current.is_some() || self.state.prefetch.is_awaiting() {
                self.launch_prefetch();
            }
            return;
        }

        let awaiting = self.state.prefetch.is_awaiting();
        match outcome {
            PrefetchOutcome::Found(track) => {
                debug!(
                    "📦 Guild {}: candidato de autoplay listo (posición {}): {}",
                    self.guild_id,
                    ticket.position,
                    track.title()
                );
                self.state.autoplay_misses = 0;
                self.state.prefetch.store(ticket, track);
                if awaiting {
                    self.state.prefetch.set_awaiting(false);
                    self.play_next().await;
                }
            }
            PrefetchOutcome::Empty => {
                info!(
                    "🚫 Guild {}: sin resultado reproducible en la posición {}",
                    self.guild_id, ticket.position
                );
                self.state
                    .record_autoplay_failure(AutoplayFailureKind::NoUsableResult, ticket.position);
                self.state.autoplay_misses += 1;

                if self.state.autoplay_misses < self.state.settings().autoplay_skip_limit {
                    self.state.advance_cursor();
                    self.launch_prefetch();
                } else if awaiting {
                    self.go_idle();
                }
            }
            PrefetchOutcome::Failed(error) => {
                warn!(
                    "❌ Guild {}: búsqueda de autoplay falló en la posición {}: {}",
                    self.guild_id, ticket.position, error
                );
                self.state
                    .record_autoplay_failure(AutoplayFailureKind::ResolveFailed, ticket.position);
                if awaiting {
                    self.go_idle();
                }
            }
        }
    }

    fn go_idle(&mut self) {
        self.state.clear_current();
        self.state.prefetch.set_awaiting(false);
        info!("💤 Guild {}: nada más para reproducir", self.guild_id);
        self.notify();
    }

    fn volume_ratio(&self) -> f32 {
        f32::from(self.state.volume) / 100.0
    }

    fn view(&self) -> PlaybackView {
        let channel_name = self
            .transport
            .current_channel()
            .filter(|_| self.transport.is_connected())
            .map(|c| c.name);
        self.state.view(channel_name)
    }

    fn notify(&self) {
        self.listener.playback_changed(self.guild_id, &self.view());
    }
}

/// La sesión se cayó a mitad de la operación.
fn disconnected(error: TransportError) -> PlaybackError {
    match error {
        TransportError::NotConnected => PlaybackError::TransportDisconnected,
        other => PlaybackError::Transport(other),
    }
}
