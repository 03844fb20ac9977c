#![warn(clippy::pedantic)]

mod reporter;

use std::{env::var, process::ExitCode, sync::Arc};

use kestrel_config::{ConfigStore, StoreError};
use kestrel_data::{
    error::ReloadError,
    reporting::{ErrorReporter, TracingReporter},
    Data,
};
use serenity::all::{Client, GatewayIntents, Http};
use tracing_subscriber::EnvFilter;

use reporter::ChannelReporter;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("KESTREL_TOKEN is not set")]
    MissingToken,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Reload(#[from] ReloadError),
    #[error("no commands or events could be loaded")]
    NothingLoaded,
    #[error("client error: {0}")]
    Client(#[from] serenity::Error),
}

enum Stop {
    Interrupted,
    ShutdownCommand,
    ClientExited(Result<(), serenity::Error>),
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let config_dir = var("KESTREL_CONFIG_DIR").unwrap_or_else(|_| "config".to_owned());
    let store = ConfigStore::open(&config_dir);

    let level = store
        .as_ref()
        .map_or_else(|_| "info".to_owned(), |store| store.logging().level);
    init_logging(&level);

    let result = match store {
        Ok(store) => run(Arc::new(store)).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Failed to start: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(store: Arc<ConfigStore>) -> Result<(), StartupError> {
    let token = var("KESTREL_TOKEN").map_err(|_| StartupError::MissingToken)?;
    let http = Arc::new(Http::new(&token));

    let reporter: Arc<dyn ErrorReporter> = match store.logging().error_channel {
        Some(channel) => Arc::new(ChannelReporter::new(Arc::clone(&http), channel)),
        None => Arc::new(TracingReporter),
    };

    let data = Data::new(
        Arc::clone(&store),
        kestrel_commands::catalog(),
        kestrel_events::catalog(),
        reporter,
    );

    let (commands, events) = data.load_all()?;
    if commands.loaded == 0 && events.loaded == 0 {
        return Err(StartupError::NothingLoaded);
    }

    let intents = GatewayIntents::non_privileged()
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS;

    let mut client = Client::builder(&token, intents)
        .event_handler(kestrel_events::Gateway::new(Arc::clone(&data)))
        .await?;

    let shard_manager = Arc::clone(&client.shard_manager);
    let mut runner = tokio::spawn(async move { client.start_autosharded().await });

    let stop = tokio::select! {
        result = &mut runner => match result {
            Ok(result) => Stop::ClientExited(result),
            Err(e) => {
                tracing::error!("Client task failed: {e}");
                Stop::ClientExited(Ok(()))
            }
        },
        _ = tokio::signal::ctrl_c() => Stop::Interrupted,
        () = data.shutdown.notified() => Stop::ShutdownCommand,
    };

    match stop {
        Stop::ClientExited(result) => return result.map_err(StartupError::from),
        Stop::Interrupted if store.settings().undeploy_on_exit => {
            if let Err(e) = kestrel_commands::register::undeploy(&http).await {
                tracing::warn!("Unable to remove slash commands: {e}");
            }
        }
        Stop::Interrupted | Stop::ShutdownCommand => {}
    }

    tracing::info!("Shutting down");
    shard_manager.shutdown_all().await;
    if let Err(e) = runner.await {
        tracing::warn!("Client task failed during shutdown: {e}");
    }

    Ok(())
}
