//! # snaprestore
//!
//! Operator entry point for the snapshot restore lifecycle.
//!
//! ## Initialization Sequence
//!
//! 1. **Tracing** - `RUST_LOG` filter, `info` by default
//! 2. **Configuration** - `--config` file, `./snaprestore.toml`, or defaults
//! 3. **SurrealDB Connection** - connect, apply schema, verify health
//! 4. **Command** - run the subcommand and print the result as JSON

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    commands::execute_command(cli.command, &config).await
}

/// Initialize tracing subscriber with environment filter.
///
/// Logs go to stderr so command output on stdout stays parseable.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
