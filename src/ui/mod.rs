//! # UI Module
//!
//! Discord presentation of the playback state.
//!
//! - [`embeds`] renders a [`crate::audio::PlaybackView`] as embeds
//! - [`buttons`] holds the player controls shown on the board
//! - [`board`] keeps one live "now playing" message per guild

pub mod board;
pub mod buttons;
pub mod embeds;

pub use board::{BoardPresenter, NowPlayingBoard};
