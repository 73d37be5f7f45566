mod assets;
mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use openlink_server::auth::load_or_create_token;

/// Local sandboxed tool agent and browser chat bridge.
#[derive(Debug, Parser)]
#[command(name = "openlink", version, about)]
struct Cli {
    /// Sandbox root directory (default: current directory).
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Listen port on 127.0.0.1.
    #[arg(long)]
    port: Option<u16>,

    /// Tool execution timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,
}

const DEFAULT_PORT: u16 = 18890;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let file = config::FileConfig::load().unwrap_or_default();

    let root = match cli.dir.or(file.root_dir) {
        Some(dir) => dir,
        None => std::env::current_dir().context("cannot determine working directory")?,
    };
    let root = std::fs::canonicalize(&root)
        .with_context(|| format!("root directory {} does not exist", root.display()))?;

    let token = load_or_create_token().context("failed to load or create auth token")?;

    let config = openlink_types::Config {
        root_dir: root,
        timeout: cli.timeout.or(file.timeout).unwrap_or(DEFAULT_TIMEOUT_SECS),
        port: cli.port.or(file.port).unwrap_or(DEFAULT_PORT),
        token,
        default_prompt: Some(assets::DEFAULT_PROMPT.to_string()),
    };

    openlink_server::serve(config).await?;
    Ok(())
}
