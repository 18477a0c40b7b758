use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, RwLock};

use serenity::all::GatewayIntents;
use serenity::Client;
use songbird::{SerenityInit, Songbird};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::prelude::*;

use t2sbot::bot::discord::{DiscordPlatform, Handler};
use t2sbot::bot::tts::GoogleTts;
use t2sbot::bot::{BotEvent, Engine, EngineConfig};
use t2sbot::config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    // Dropping the guard flushes the file log; exit by returning from main
    let (non_blocking, _guard) = match file_log_writer(&log_dir) {
        Ok(writer) => writer,
        Err(e) => {
            eprintln!("Failed to open log file in {}: {e}", log_dir.display());
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting t2sbot...");
    match &config_path {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => info!("Loaded config from environment"),
    }
    info!("Language: {}, volume gain: {} dB", config.language_code, config.volume_gain_db);

    let (events_tx, events_rx) = mpsc::unbounded_channel::<BotEvent>();
    let context = Arc::new(RwLock::new(None));
    let songbird = Songbird::serenity();

    // Things we want discord to tell us about.
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = match Client::builder(&config.discord_token, intents)
        .event_handler(Handler::new(events_tx.clone(), context.clone()))
        .register_songbird_with(songbird.clone())
        .await
    {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create Discord client: {e}");
            return ExitCode::FAILURE;
        }
    };

    let platform = Arc::new(DiscordPlatform::new(
        client.http.clone(),
        client.cache.clone(),
        songbird,
        context,
        events_tx,
    ));
    let synthesizer = Arc::new(GoogleTts::new(
        config.tts_endpoint.clone(),
        config.tts_api_key.clone(),
        config.language_code.clone(),
        config.volume_gain_db,
    ));
    let engine = Arc::new(Engine::new(
        EngineConfig {
            language_code: config.language_code.clone(),
            presence_url: config.presence_url.clone(),
            snapshot_path: config.snapshot_path.clone(),
        },
        platform,
        synthesizer,
    ));

    if let Err(e) = engine.restore() {
        error!("Refusing to start: {e}");
        return ExitCode::FAILURE;
    }

    let dispatch = tokio::spawn(engine.clone().run(events_rx));

    let shard_manager = client.shard_manager.clone();
    tokio::select! {
        result = client.start() => {
            if let Err(e) = result {
                error!("Discord client error: {e}");
            }
        }
        _ = shutdown_signal() => {
            info!("Termination signal received");
        }
    }

    // Stop dispatch before the snapshot is written
    dispatch.abort();
    match tokio::time::timeout(config.shutdown_timeout, engine.shutdown()).await {
        Ok(Ok(())) => info!("State saved"),
        Ok(Err(e)) => error!("Failed to save state: {e}"),
        Err(_) => warn!("Shutdown timed out after {:?}", config.shutdown_timeout),
    }
    shard_manager.shutdown_all().await;
    info!("Bye");
    ExitCode::SUCCESS
}

fn file_log_writer(log_dir: &Path) -> std::io::Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("t2sbot.log"))?;
    Ok(tracing_appender::non_blocking(log_file))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
