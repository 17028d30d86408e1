use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::{sync::Arc, time::Duration};
use tracing::{error, info};

use mixtape::{
    audio::PlaybackOrchestrator,
    bot::MixtapeBot,
    config::Config,
    sources::YtDlpResolver,
    ui::NowPlayingBoard,
    voice::SongbirdGateway,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mixtape=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    // El health check no necesita credenciales de Discord
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    info!("🎵 Iniciando Mixtape v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    let resolver = Arc::new(YtDlpResolver::new(
        config.ytdlp_path.clone(),
        Duration::from_secs(config.resolver_timeout_secs),
    ));
    resolver.verify_dependencies().await?;

    // Voz y núcleo de reproducción
    let songbird = Songbird::serenity();
    let gateway = Arc::new(SongbirdGateway::new(songbird.clone(), reqwest::Client::new()));
    let (board, presenter) = NowPlayingBoard::new();
    let orchestrator = Arc::new(PlaybackOrchestrator::new(
        gateway,
        resolver,
        Arc::new(board.clone()),
        config.player_settings(),
    ));

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let handler = MixtapeBot::new(config.clone(), orchestrator, board);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    tokio::spawn(presenter.run(client.http.clone()));

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check() -> Result<()> {
    dotenvy::dotenv().ok();
    let program = std::env::var("YTDLP_PATH").unwrap_or_else(|_| Config::default().ytdlp_path);

    YtDlpResolver::new(program, Duration::from_secs(15))
        .verify_dependencies()
        .await?;

    println!("OK");
    Ok(())
}
