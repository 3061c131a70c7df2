use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediashelf_server::{
    AppState, create_router,
    infra::{
        config::{Config, ConfigLoad, ConfigLoader, ConfigLoaderOptions},
        scheduler::CacheInvalidationScheduler,
    },
};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "mediashelf-server")]
#[command(about = "Serves media collection pages and keeps their indexes in sync")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Path to a mediashelf.toml file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to a .env file loaded before reading the environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,

    /// Served web root (overrides config)
    #[arg(long, global = true)]
    web_root: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rebuild one collection's index, print the report and exit
    Sync {
        /// Collection identifier, e.g. lsLearns, music, paintings, downloads
        collection: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_runtime_config(&cli.serve)?;

    match cli.command {
        Some(Command::Sync { collection }) => run_sync(config, &collection).await,
        None => run_server(config).await,
    }
}

fn load_runtime_config(args: &ServeArgs) -> anyhow::Result<Config> {
    let ConfigLoad { mut config, warnings } =
        ConfigLoader::with_options(ConfigLoaderOptions {
            config_path: args.config.clone(),
            env_file: args.env_file.clone(),
        })
        .load()
        .context("failed to load configuration")?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }
    if let Some(web_root) = args.web_root.clone() {
        config = config.with_web_root(web_root);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = config.metadata.config_path.as_ref() {
        info!(path = %path.display(), "configuration file loaded");
    }
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    Ok(config)
}

async fn run_sync(mut config: Config, collection: &str) -> anyhow::Result<()> {
    // The process exits right after the run; a detached cover job would be cut short.
    if config.covers.enabled {
        info!("cover generation runs only under the server; skipping");
        config.covers.enabled = false;
    }
    let state = AppState::from_config(config);

    let report = state
        .synchronizer
        .synchronize_named(collection)
        .await
        .with_context(|| format!("synchronization of '{collection}' failed"))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;
    let reload_interval = config.cache.reload_interval;

    let state = AppState::from_config(config);
    info!(
        web_root = %state.config.web_root().display(),
        collections = %state.synchronizer.root().display(),
        "starting mediashelf server"
    );

    let shutdown = CancellationToken::new();
    let scheduler =
        CacheInvalidationScheduler::new(state.cache.clone(), reload_interval)
            .spawn(shutdown.clone());

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
            signal_token.cancel();
        })
        .await
        .context("server error")?;

    shutdown.cancel();
    scheduler.await.context("cache scheduler task panicked")?;
    info!("server stopped");
    Ok(())
}
