//! # Audio Module
//!
//! Per-guild playback core: queue, current track, autoplay and the prefetch
//! of the next autoplay candidate.
//!
//! ## Architecture
//!
//! ### [`orchestrator`] - Playback Orchestrator
//! - Public entry point used by the bot layer
//! - Resolves user queries outside the guild's exclusive section
//! - Forwards every operation to the guild worker and awaits its reply
//!
//! ### [`registry`] - Guild Registry
//! - One worker per guild, created lazily on first use
//! - Entries are never removed; Stop resets the state in place
//!
//! ### [`worker`] - Guild Worker
//! - Tokio task that exclusively owns the [`state::GuildPlaybackState`]
//! - Serializes user commands, transport callbacks and prefetch completions
//! - Runs the `PlayNext` decision loop
//!
//! ### [`prefetch`] - Autoplay Prefetch Scheduler
//! - Single-flight related-track lookup per guild
//! - Stale results are discarded by ticket (generation, reference, position)
//!
//! ### [`queue`] / [`track`] / [`view`]
//! - FIFO queue with a size bound
//! - Immutable resolved track
//! - Read-only projections for presentation and diagnostics
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use mixtape::audio::PlaybackOrchestrator;
//! use serenity::all::GuildId;
//!
//! # async fn example(orchestrator: PlaybackOrchestrator) -> anyhow::Result<()> {
//! let guild_id = GuildId::new(123456789);
//!
//! orchestrator.play_query(guild_id, "daft punk around the world").await?;
//! orchestrator.set_volume(guild_id, 60).await?;
//! orchestrator.skip(guild_id).await?;
//!
//! let view = orchestrator.snapshot(guild_id).await?;
//! println!("{:?}", view.current_title);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod orchestrator;
pub mod prefetch;
pub mod queue;
pub mod registry;
pub mod state;
pub mod track;
pub mod view;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{PlaybackError, PlaybackResult, ResolveError, TransportError};
pub use orchestrator::PlaybackOrchestrator;
pub use track::Track;
pub use view::{GuildDiagnostics, NoopListener, PlaybackListener, PlaybackView};
pub use worker::{EnqueueOutcome, JoinOutcome};
