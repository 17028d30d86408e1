//! Mixtape: a Discord music bot with per-guild queues and prefetched autoplay.

pub mod audio;
pub mod bot;
pub mod config;
pub mod sources;
pub mod ui;
pub mod voice;
