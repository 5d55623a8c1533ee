use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use newsrant_common::observability::init_logging;
use newsrant_config::{NewsrantConfig, NewsrantConfigLoader};
use std::path::{Path, PathBuf};
use wiring::Wiring;
mod wiring;

const DEFAULT_CONFIG_FILE: &str = "newsrant.yaml";

/// Watch a news homepage, rant about each new story with a local LLM, post it to X.
#[derive(Debug, Parser)]
#[command(name = "newsrant", version, about)]
struct Cli {
    /// Config file (YAML). Defaults to ./newsrant.yaml when present.
    #[arg(long, short, global = true, env = "NEWSRANT_CONFIG")]
    config: Option<PathBuf>,

    /// Log posts instead of sending them to X.
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Poll forever (default).
    Run,
    /// Post about the top homepage story once, ignoring history.
    Once,
    /// Publish a timestamped test post to check credentials.
    TestPost,
}

fn load_config(path: Option<&Path>) -> Result<NewsrantConfig> {
    let loader = match path {
        Some(p) => NewsrantConfigLoader::new().with_file(p),
        None => NewsrantConfigLoader::new().with_optional_file(DEFAULT_CONFIG_FILE),
    };
    loader.load().context("loading configuration")
}

/// Load a `.env` file (./.env and its parents when `path` is None).
///
/// A missing file is normal; any other failure is returned as a message so it can be
/// logged once logging is up.
fn load_env_file(path: Option<&Path>) -> Option<String> {
    let loaded = match path {
        Some(p) => dotenvy::from_path(p),
        None => dotenvy::dotenv().map(|_| ()),
    };
    match loaded {
        Ok(()) => None,
        Err(e) if e.not_found() => None,
        Err(e) => Some(e.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1) .env first so both the config loader and `${VAR}` expansion see it
    let env_file_error = load_env_file(None);
    let cli = Cli::parse();

    // 2) config (env wins), then logging as configured
    let cfg = load_config(cli.config.as_deref())?;
    let log_path = init_logging(wiring::log_config(&cfg.logging)?)?;
    tracing::info!(
        log_file = %log_path.display(),
        dry_run = cli.dry_run,
        "newsrant.start"
    );
    if let Some(error) = env_file_error {
        tracing::warn!(%error, "newsrant.dotenv.unreadable");
    }

    // 3) build components
    let wiring = Wiring::from_config(&cfg, cli.dry_run)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            wiring.prepare_llm().await;
            let mut monitor = wiring.into_monitor();
            tokio::select! {
                _ = monitor.run() => {}
                res = tokio::signal::ctrl_c() => {
                    res.context("listening for ctrl-c")?;
                    tracing::info!("newsrant.shutdown");
                }
            }
        }
        Command::Once => {
            wiring.prepare_llm().await;
            let id = wiring.run_once().await?;
            tracing::info!(post_id = %id, "newsrant.once.done");
        }
        Command::TestPost => {
            let id = wiring.test_post().await?;
            tracing::info!(post_id = %id, "newsrant.test_post.done");
        }
    }
    Ok(())
}
