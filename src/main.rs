//! trmnl-calibre entry point.

use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trmnl_calibre::{
    agent::{self, SyncClient},
    auth,
    config::{Cli, Command, Config},
    server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let mut config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };
    config.apply_overrides(&cli.serve);

    match cli.command {
        Some(Command::Init { force }) => cmd_init(force),
        Some(Command::Token) => cmd_token(),
        Some(Command::Push {
            library,
            url,
            token,
            limit,
        }) => cmd_push(&library, &url, &token, limit).await,
        Some(Command::Serve) | None => cmd_serve(config, config_path).await,
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trmnl_calibre=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Write a default config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());
    println!("\nEdit config.toml to point at your Calibre-web server.");
    println!("For push mode, generate a token with: trmnl-calibre token");

    Ok(())
}

/// Print a new random sync token.
fn cmd_token() -> anyhow::Result<()> {
    println!("{}", auth::generate_token());
    Ok(())
}

/// Push the local Calibre library once.
async fn cmd_push(library: &Path, url: &str, token: &str, limit: usize) -> anyhow::Result<()> {
    let client = SyncClient::new(url, token)?;
    let ack = agent::run(library, &client, limit).await?;

    println!(
        "Synced {} books ({} rated, {}%) as snapshot {}",
        ack.total_books, ack.rated_books, ack.rating_percentage, ack.snapshot_id
    );
    Ok(())
}

/// Start the server.
async fn cmd_serve(config: Config, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let bind = config.server.bind;
    let state = server::AppState::new(config)?;

    tracing::info!(
        bind = %bind,
        mode = state.ingestor.name(),
        data_source = state.ingestor.data_source(),
        config = ?config_path,
        sync_token = state.guard.is_configured(),
        "Starting trmnl-calibre server"
    );

    state.load_initial();

    let cancel = CancellationToken::new();
    let pull_task = state.start_pull_task(cancel.clone());

    let app = server::create_router(state);
    let listener = TcpListener::bind(bind).await?;
    tracing::info!(address = %bind, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    if let Some(task) = pull_task
        && let Err(e) = task.await
    {
        tracing::warn!(error = %e, "Pull task ended abnormally");
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM and cancel background work.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    cancel.cancel();
}
