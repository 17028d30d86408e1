//! Autoplay prefetch scheduler.
//!
//! Resolves the next autoplay candidate while the current track is still
//! playing, so the queue can be refilled instantly when it runs dry.
//!
//! The slot lives inside the guild state and is only touched by the guild
//! worker, which makes the single-flight check-then-set atomic with respect to
//! every other command for that guild. The resolver call itself runs in a
//! spawned task; its completion is reported back to the worker together with
//! the [`PrefetchTicket`] it was launched with, and the worker discards results
//! whose ticket no longer matches the guild (stopped, or new reference track).

use std::{sync::Arc, time::Duration};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::{error::ResolveError, track::Track};
use crate::sources::MediaResolver;

/// Identifica para qué estado del guild se lanzó una búsqueda.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchTicket {
    /// Generación del guild (se incrementa en cada Stop).
    pub generation: u64,
    /// Época del track de referencia (se incrementa al cambiarlo).
    pub reference_epoch: u64,
    /// Posición pedida en la mezcla.
    pub position: usize,
}

#[derive(Debug)]
pub enum PrefetchOutcome {
    Found(Track),
    /// Respuesta válida sin nada reproducible.
    Empty,
    Failed(ResolveError),
}

impl PrefetchOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            PrefetchOutcome::Found(_) => "found",
            PrefetchOutcome::Empty => "no_usable_result",
            PrefetchOutcome::Failed(_) => "resolve_failed",
        }
    }
}

#[derive(Debug)]
struct InFlight {
    ticket: PrefetchTicket,
    abort: Option<AbortHandle>,
}

/// Caché de un candidato más la guarda de vuelo único.
#[derive(Debug, Default)]
pub struct PrefetchSlot {
    cached: Option<(PrefetchTicket, Track)>,
    in_flight: Option<InFlight>,
    awaiting: bool,
}

impl PrefetchSlot {
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Reserva el slot. Devuelve `false` si ya hay una búsqueda en curso.
    pub fn begin(&mut self, ticket: PrefetchTicket) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        self.in_flight = Some(InFlight {
            ticket,
            abort: None,
        });
        true
    }

    fn attach(&mut self, abort: AbortHandle) {
        if let Some(flight) = self.in_flight.as_mut() {
            flight.abort = Some(abort);
        }
    }

    /// Libera el slot si `ticket` es la búsqueda en curso.
    pub fn finish(&mut self, ticket: PrefetchTicket) -> bool {
        match &self.in_flight {
            Some(flight) if flight.ticket == ticket => {
                self.in_flight = None;
                true
            }
            _ => false,
        }
    }

    pub fn store(&mut self, ticket: PrefetchTicket, track: Track) {
        self.cached = Some((ticket, track));
    }

    /// Consume el candidato si fue buscado para `expected`.
    pub fn take_matching(&mut self, expected: PrefetchTicket) -> Option<Track> {
        match self.cached.take() {
            Some((ticket, track)) if ticket == expected => Some(track),
            Some((ticket, track)) => {
                debug!(
                    "🗑️ Candidato en caché obsoleto descartado: {} ({:?})",
                    track.title(),
                    ticket
                );
                None
            }
            None => None,
        }
    }

    /// Hay un candidato en caché buscado para `ticket`.
    pub fn has_candidate_for(&self, ticket: PrefetchTicket) -> bool {
        matches!(&self.cached, Some((cached, _)) if *cached == ticket)
    }

    pub fn cached_title(&self) -> Option<&str> {
        self.cached.as_ref().map(|(_, track)| track.title())
    }

    pub fn discard_cached(&mut self) {
        self.cached = None;
    }

    /// `PlayNext` espera el resultado para seguir reproduciendo.
    pub fn is_awaiting(&self) -> bool {
        self.awaiting
    }

    pub fn set_awaiting(&mut self, awaiting: bool) {
        self.awaiting = awaiting;
    }

    /// Aborta la búsqueda en curso y vacía el slot.
    pub fn cancel(&mut self) {
        if let Some(flight) = self.in_flight.take() {
            if let Some(abort) = flight.abort {
                abort.abort();
            }
        }
        self.cached = None;
        self.awaiting = false;
    }
}

/// Lanza búsquedas de autoplay fuera del worker del guild.
#[derive(Clone)]
pub struct PrefetchScheduler {
    resolver: Arc<dyn MediaResolver>,
    timeout: Duration,
}

impl PrefetchScheduler {
    pub fn new(resolver: Arc<dyn MediaResolver>, timeout: Duration) -> Self {
        Self { resolver, timeout }
    }

    /// Inicia una búsqueda si el slot está libre; `on_done` recibe el resultado.
    ///
    /// Devuelve `false` sin hacer nada si ya hay otra en curso.
    pub fn schedule<F>(&self, slot: &mut PrefetchSlot, seed: Track, ticket: PrefetchTicket, on_done: F) -> bool
    where
        F: FnOnce(PrefetchTicket, PrefetchOutcome) + Send + 'static,
    {
        if !slot.begin(ticket) {
            debug!(
                "⏳ Prefetch ya en curso, se ignora la posición {} de '{}'",
                ticket.position,
                seed.title()
            );
            return false;
        }

        info!(
            "🔮 Prefetch de autoplay: '{}' posición {}",
            seed.title(),
            ticket.position
        );

        let resolver = self.resolver.clone();
        let timeout = self.timeout;
        let task = tokio::spawn(async move {
            // Tarea interna para que un pánico del resolvedor no deje el slot ocupado
            let lookup = tokio::spawn(Self::lookup(resolver, seed, ticket.position, timeout));
            let outcome = match lookup.await {
                Ok(outcome) => outcome,
                Err(e) => PrefetchOutcome::Failed(ResolveError::Protocol(format!(
                    "la tarea de prefetch terminó inesperadamente: {}",
                    e
                ))),
            };
            on_done(ticket, outcome);
        });
        slot.attach(task.abort_handle());

        true
    }

    async fn lookup(
        resolver: Arc<dyn MediaResolver>,
        seed: Track,
        position: usize,
        timeout: Duration,
    ) -> PrefetchOutcome {
        match tokio::time::timeout(timeout, resolver.resolve_related(&seed, position)).await {
            Ok(Ok(Some(track))) => PrefetchOutcome::Found(track.into_autoplay()),
            Ok(Ok(None)) => PrefetchOutcome::Empty,
            Ok(Err(e)) => {
                warn!("❌ Prefetch de '{}' posición {} falló: {}", seed.title(), position, e);
                PrefetchOutcome::Failed(e)
            }
            Err(_) => PrefetchOutcome::Failed(ResolveError::Timeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::test_support::ScriptedResolver;
    use tokio::sync::mpsc;

    fn ticket(position: usize) -> PrefetchTicket {
        PrefetchTicket {
            generation: 0,
            reference_epoch: 1,
            position,
        }
    }

    fn seed() -> Track {
        Track::new("Seed", "stream://seed", "https://www.youtube.com/watch?v=seed")
    }

    #[test]
    fn slot_is_single_flight() {
        let mut slot = PrefetchSlot::default();
        assert!(slot.begin(ticket(2)));
        assert!(!slot.begin(ticket(3)));
        assert!(!slot.finish(ticket(3)));
        assert!(slot.finish(ticket(2)));
        assert!(slot.begin(ticket(3)));
    }

    #[test]
    fn cached_candidate_only_matches_its_ticket() {
        let mut slot = PrefetchSlot::default();
        slot.store(ticket(2), seed());
        assert_eq!(slot.take_matching(ticket(3)), None);
        // el candidato obsoleto se descarta al intentar consumirlo
        assert_eq!(slot.cached_title(), None);

        slot.store(ticket(2), seed());
        assert_eq!(slot.take_matching(ticket(2)).map(|t| t.title().to_string()), Some("Seed".into()));
    }

    #[tokio::test]
    async fn second_schedule_while_outstanding_issues_one_lookup() {
        let resolver = ScriptedResolver::gated();
        let scheduler = PrefetchScheduler::new(resolver.clone(), Duration::from_secs(5));
        let mut slot = PrefetchSlot::default();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let tx1 = tx.clone();
        assert!(scheduler.schedule(&mut slot, seed(), ticket(2), move |t, o| {
            let _ = tx1.send((t, o));
        }));
        assert!(!scheduler.schedule(&mut slot, seed(), ticket(2), move |t, o| {
            let _ = tx.send((t, o));
        }));

        resolver.wait_for_calls(1).await;
        resolver.release(10);

        let (done, outcome) = rx.recv().await.unwrap();
        assert_eq!(done, ticket(2));
        match outcome {
            PrefetchOutcome::Found(track) => {
                assert!(track.is_autoplay_generated());
                assert_eq!(track.title(), "Seed mix #2");
            }
            other => panic!("resultado inesperado: {:?}", other),
        }
        assert_eq!(resolver.related_calls().len(), 1);
    }

    #[tokio::test]
    async fn slow_lookup_times_out() {
        let resolver = ScriptedResolver::gated();
        let scheduler = PrefetchScheduler::new(resolver.clone(), Duration::from_millis(20));
        let mut slot = PrefetchSlot::default();
        let (tx, mut rx) = mpsc::unbounded_channel();

        scheduler.schedule(&mut slot, seed(), ticket(2), move |t, o| {
            let _ = tx.send((t, o));
        });

        let (_, outcome) = rx.recv().await.unwrap();
        assert!(matches!(outcome, PrefetchOutcome::Failed(ResolveError::Timeout(_))));
    }

    #[tokio::test]
    async fn cancel_aborts_and_frees_the_slot() {
        let resolver = ScriptedResolver::gated();
        let scheduler = PrefetchScheduler::new(resolver.clone(), Duration::from_secs(5));
        let mut slot = PrefetchSlot::default();
        let (tx, mut rx) = mpsc::unbounded_channel::<(PrefetchTicket, PrefetchOutcome)>();

        scheduler.schedule(&mut slot, seed(), ticket(2), move |t, o| {
            let _ = tx.send((t, o));
        });
        slot.set_awaiting(true);
        slot.cancel();

        assert!(!slot.is_in_flight());
        assert!(!slot.is_awaiting());
        resolver.release(10);
        // la tarea abortada nunca entrega resultado
        assert!(rx.recv().await.is_none());
    }
}
