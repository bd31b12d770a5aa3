//! `flick`: command-line client for Flick likes, saves and subscriptions.
//!
//! # Usage
//!
//! ```text
//! flick --url http://localhost:5232 --user alice --password secret toggle like <video-id>
//! flick --config ~/.config/flick/config.toml status subscribe <channel-id>
//! ```

mod client;
mod output;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::{ApiConfig, HttpStore};
use flick_core::{
  notify::Notifier,
  relation::RelationKind,
  store::{IdentityProvider, RelationStore},
  toggle::{ToggleController, ToggleState},
};
use output::{StderrNotifier, describe};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "flick", about = "Like, save and subscribe from the terminal")]
struct Args {
  /// Path to a TOML config file (url, username, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<std::path::PathBuf>,

  /// Base URL of the flick server (default: http://localhost:5232).
  #[arg(long, env = "FLICK_URL")]
  url: Option<String>,

  /// API username; omit to act anonymously.
  #[arg(long, env = "FLICK_USER")]
  user: Option<String>,

  /// API password (plaintext).
  #[arg(long, env = "FLICK_PASSWORD")]
  password: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show whether you hold a relationship and how many others do.
  Status { kind: RelationKind, target: Uuid },
  /// Flip a relationship (like/unlike, save/unsave, subscribe/unsubscribe).
  Toggle { kind: RelationKind, target: Uuid },
  /// List everything you hold of one kind.
  List { kind: RelationKind },
  /// Show the signed-in account.
  Whoami,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
}

fn api_config(args: &Args) -> Result<ApiConfig> {
  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let pick = |flag: &Option<String>, file: &str| {
    flag
      .clone()
      .or_else(|| (!file.is_empty()).then(|| file.to_owned()))
  };
  Ok(ApiConfig {
    base_url: pick(&args.url, &file_cfg.url)
      .unwrap_or_else(|| "http://localhost:5232".to_string()),
    username: pick(&args.user, &file_cfg.username).unwrap_or_default(),
    password: pick(&args.password, &file_cfg.password).unwrap_or_default(),
  })
}

// ─── Commands ─────────────────────────────────────────────────────────────────

/// Load the pair, then flip it. Returns `None` once the user has been told
/// why nothing changed.
async fn toggle_from_known_state<S, I, N>(
  controller: &ToggleController<S, I, N>,
  target: Uuid,
  kind: RelationKind,
) -> Option<ToggleState>
where
  S: RelationStore,
  I: IdentityProvider,
  N: Notifier,
{
  // Flipping from an unknown state could write the opposite of what the
  // user meant.
  if let Err(e) = controller.initialize(target, kind).await {
    tracing::warn!(%target, %kind, error = %e, "could not read current state");
    eprintln!("Could not read your current {kind} state; nothing was changed");
    return None;
  }
  // On failure the notifier has already told the user what happened.
  controller.toggle(target, kind).await.ok()
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();
  let store = HttpStore::new(api_config(&args)?).context("building HTTP client")?;

  match args.command {
    Command::Status { kind, target } => {
      let controller = ToggleController::new(store.clone(), store);
      // A failed read leaves the pair at its inactive default.
      let state = match controller.initialize(target, kind).await {
        Ok(state) => state,
        Err(_) => controller.state(target, kind).unwrap_or_default(),
      };
      println!("{}", describe(kind, &state));
      Ok(ExitCode::SUCCESS)
    }
    Command::Toggle { kind, target } => {
      let controller =
        ToggleController::with_notifier(store.clone(), store, StderrNotifier);
      Ok(match toggle_from_known_state(&controller, target, kind).await {
        Some(state) => {
          println!("{}", describe(kind, &state));
          ExitCode::SUCCESS
        }
        None => ExitCode::FAILURE,
      })
    }
    Command::List { kind } => {
      let Some(me) = store.me().await.context("resolving account")? else {
        eprintln!("Please sign in to see your {}", output::plural(kind));
        return Ok(ExitCode::FAILURE);
      };
      let relations = store
        .list(me.actor_id, kind)
        .await
        .context("listing relations")?;
      for relation in relations {
        println!(
          "{}  {}",
          relation.key.target_id,
          relation.created_at.format("%Y-%m-%d %H:%M")
        );
      }
      Ok(ExitCode::SUCCESS)
    }
    Command::Whoami => {
      match store.me().await.context("resolving account")? {
        Some(me) => {
          println!("{} ({})", me.profile.username, me.actor_id);
          println!("subscribers: {}", me.profile.subscribers);
          println!("avatar: {}", me.profile.avatar);
        }
        None => println!("anonymous"),
      }
      Ok(ExitCode::SUCCESS)
    }
  }
}
