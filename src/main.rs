use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod config;
mod error;
mod handlers;
mod models;
mod server;
mod store;
mod watcher;

use cli::{Cli, Commands, ConfigCommands};
use store::{LinkStore, StoreOptions};

// ── Shared application state ───────────────────────────────────────────────

pub struct AppState {
    pub store: Arc<LinkStore>,
    pub config: config::AppConfig,
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present; variables may already be set
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // One-shot commands stay quiet unless RUST_LOG asks otherwise
    let default_filter = if cli.command.is_server() {
        "golink=info,tower_http=info"
    } else {
        "golink=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = config::AppConfig::load(cli.config_dir.clone())?;
    let mut out = std::io::stdout().lock();

    if let Commands::Config { command } = &cli.command {
        return match command {
            ConfigCommands::StorageDir { path } => {
                commands::set_storage_dir(&config, &mut out, path)
            }
            ConfigCommands::View => commands::view_config(&config, &mut out),
        };
    }

    // Only the server lives long enough to benefit from watching the file
    let options = if cli.command.is_server() {
        StoreOptions {
            watch: true,
            settle_delay: config.settle_delay,
        }
    } else {
        StoreOptions::unwatched()
    };
    let store = LinkStore::open(config.links_path(), options).await?;
    tracing::debug!("Using links file {}", store.path().display());

    match cli.command {
        Commands::Add {
            alias,
            url,
            description,
            category,
        } => {
            commands::add(
                &store,
                &mut out,
                &alias,
                &url,
                description.as_deref(),
                category.as_deref(),
            )
            .await
        }
        Commands::List => commands::list(&store, &mut out).await,
        Commands::Open { alias, direct } => commands::open(&store, &mut out, &alias, direct).await,
        Commands::Edit {
            alias,
            url,
            description,
            category,
        } => {
            commands::edit(
                &store,
                &mut out,
                &alias,
                url.as_deref(),
                description.as_deref(),
                category.as_deref(),
            )
            .await
        }
        Commands::Delete { alias } => commands::delete(&store, &mut out, &alias).await,
        Commands::Serve {
            port,
            host,
            not_found,
        } => {
            drop(out);
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(host) = host {
                config.host = host;
            }
            if not_found.is_some() {
                config.not_found_url = not_found;
            }
            commands::ensure_links_file(&store).await?;

            let state = Arc::new(AppState {
                store: store.clone(),
                config,
            });
            let result = server::serve(state).await;
            store.close().await;
            result
        }
        // Handled before the store is opened
        Commands::Config { .. } => Ok(()),
    }
}
