//! flick-server binary.
//!
//! Serves the relationship API over HTTP from a SQLite file. Settings come
//! from `config.toml` (or `--config`) layered under `FLICK_*` variables; see
//! [`ServerConfig::load`].
//!
//! `flick-server --hash-password` reads a password from stdin and prints the
//! PHC string to paste into an account's `password_hash`.

use std::{io::BufRead as _, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use flick_api::{AppState, ServerConfig, auth::hash_password};
use flick_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Flick relationship API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password read from stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  if cli.hash_password {
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let hash = hash_password(line.trim_end_matches(['\n', '\r']))
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
    println!("{hash}");
    return Ok(());
  }

  let cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("loading configuration from {:?}", cli.config))?;
  serve(cfg).await
}

async fn serve(cfg: ServerConfig) -> anyhow::Result<()> {
  if cfg.accounts.is_empty() {
    tracing::warn!("no accounts configured; every caller is anonymous");
  }

  let store_path = cfg.resolved_store_path();
  if let Some(parent) = store_path.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let app = flick_api::router(AppState {
    store:    Arc::new(store),
    accounts: Arc::new(cfg.accounts),
  });

  let address = format!("{}:{}", cfg.host, cfg.port);
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  tracing::info!(%address, store = ?store_path, "serving");

  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down"),
        Err(e) => {
          tracing::warn!(error = %e, "no ctrl-c handler; running until killed");
          std::future::pending::<()>().await;
        }
      }
    })
    .await
    .context("server error")
}
