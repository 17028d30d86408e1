use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub default_volume: u8, // 0-100
    pub max_queue_size: usize,
    pub max_playlist_size: usize,

    // Autoplay
    pub enable_autoplay: bool,
    pub autoplay_start_position: usize,
    pub autoplay_skip_limit: u32,

    // Resolvedor
    pub resolver_timeout_secs: u64,
    pub ytdlp_path: String,
}

/// Parámetros del reproductor, sin credenciales de Discord.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSettings {
    pub default_volume: u8,
    pub autoplay_enabled: bool,
    /// Primera posición pedida a la mezcla del track de referencia.
    pub autoplay_start_position: usize,
    /// Posiciones vacías que se saltan seguidas antes de quedar inactivo.
    pub autoplay_skip_limit: u32,
    pub max_queue_size: usize,
    pub max_playlist_size: usize,
    pub resolver_timeout: Duration,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Config::default().player_settings()
    }
}

fn env_or<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()?)
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Audio
            default_volume: env_or("DEFAULT_VOLUME", "100")?,
            max_queue_size: env_or("MAX_QUEUE_SIZE", "500")?,
            max_playlist_size: env_or("MAX_PLAYLIST_SIZE", "100")?,

            // Autoplay (la posición 1 de una mezcla es la propia semilla)
            enable_autoplay: env_or("ENABLE_AUTOPLAY", "true")?,
            autoplay_start_position: env_or("AUTOPLAY_START_POSITION", "2")?,
            autoplay_skip_limit: env_or("AUTOPLAY_SKIP_LIMIT", "3")?,

            // Resolvedor
            resolver_timeout_secs: env_or("RESOLVER_TIMEOUT_SECS", "45")?,
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0 and 100
    /// - Queue and playlist sizes must be greater than 0
    /// - Autoplay positions are 1-based
    /// - Autoplay must be allowed at least one lookup per reference
    /// - The resolver timeout must be non-zero
    pub fn validate(&self) -> Result<()> {
        if self.default_volume > 100 {
            anyhow::bail!("Default volume must be between 0 and 100, got: {}", self.default_volume);
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        if self.autoplay_start_position == 0 {
            anyhow::bail!("Autoplay start position is 1-based, got: 0");
        }

        if self.autoplay_skip_limit == 0 {
            anyhow::bail!("Autoplay skip limit must be greater than 0");
        }

        if self.resolver_timeout_secs == 0 {
            anyhow::bail!("Resolver timeout must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the Discord token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Audio: {}% vol, {} queue, {} playlist\n  \
            Autoplay: enabled={}, start={}, skip limit={}\n  \
            Resolver: {} ({}s timeout)",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.default_volume,
            self.max_queue_size,
            self.max_playlist_size,
            self.enable_autoplay,
            self.autoplay_start_position,
            self.autoplay_skip_limit,
            self.ytdlp_path,
            self.resolver_timeout_secs,
        )
    }

    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            default_volume: self.default_volume,
            autoplay_enabled: self.enable_autoplay,
            autoplay_start_position: self.autoplay_start_position,
            autoplay_skip_limit: self.autoplay_skip_limit,
            max_queue_size: self.max_queue_size,
            max_playlist_size: self.max_playlist_size,
            resolver_timeout: Duration::from_secs(self.resolver_timeout_secs),
        }
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            default_volume: 100,
            max_queue_size: 500,
            max_playlist_size: 100,

            enable_autoplay: true,
            autoplay_start_position: 2,
            autoplay_skip_limit: 3,

            resolver_timeout_secs: 45,
            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}
