// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Sidecar - local background server for IDE-integrated agents
//!
//! Entry point: loads settings, wires the built-in handlers onto the
//! relay bridge, and keeps reconnecting to the IDE client until killed.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use sidecar::checkpoint::CheckpointService;
use sidecar::config::Settings;
use sidecar::error::Result;
use sidecar::handlers;
use sidecar::relay::RelayBridge;

#[derive(Parser, Debug)]
#[command(name = "sidecar", about = "Local background server for IDE-integrated agents")]
struct Cli {
    /// Relay port the IDE client listens on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to a config file (defaults to the per-user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for shadow checkpoint repositories (overrides config)
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Enable debug diagnostics
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` turns on server diagnostics without requiring target names;
    // `RUST_LOG` still takes precedence
    if cli.verbose > 0 {
        for directive in ["sidecar=debug"] {
            if let Ok(parsed) = directive.parse() {
                env_filter = env_filter.add_directive(parsed);
            }
        }
    }

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let mut settings = match cli.config {
        Some(ref path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if let Some(port) = cli.port {
        settings.relay.port = port;
    }
    if let Some(storage_dir) = cli.storage_dir {
        settings.storage.root = storage_dir;
    }

    let port = settings.relay.port;
    let checkpoints = Arc::new(CheckpointService::new(settings.storage.root.clone()));
    let settings = Arc::new(settings);

    let bridge = RelayBridge::new();
    handlers::register_builtin(&bridge, Arc::clone(&settings), checkpoints).await;
    bridge.connect(port).await;

    tracing::info!("sidecar running, relay target 127.0.0.1:{}", port);

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    bridge.shutdown().await;

    Ok(())
}
