//! tombola-server: TCP bet intake server binary.
//!
//! Thin shell over `tombola-core`: parses the configuration, wires up
//! logging and the SIGINT/SIGTERM handler, and runs one intake round.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use std::sync::Arc;
use tombola_core::server::Server;
use tombola_core::storage::{FixedDraw, MemoryStore};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let config = Config::parse();

    let log_level = if config.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let server_config = config
        .server_config()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;

    info!(
        agencies = server_config.agencies,
        winning_number = %config.winning_number,
        "starting tombola server"
    );

    let store = Arc::new(MemoryStore::new());
    let rule = Arc::new(FixedDraw::new(config.winning_number.clone()));
    let server = Server::bind(&server_config, store, rule).context("bind listener")?;

    // SIGINT/SIGTERM raise the shutdown flag; workers notice it at their
    // next frame boundary and the accept loop within one poll interval.
    let shutdown = server.shutdown_flag();
    ctrlc::set_handler(move || {
        info!("termination signal received");
        shutdown.trigger();
    })
    .context("install signal handler")?;

    let metrics = server.metrics();
    server.run().context("server run")?;

    if !config.no_metrics {
        info!("run metrics:\n{}", metrics.export_text());
    }
    info!("exiting");
    Ok(())
}
