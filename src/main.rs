//! wavesync - live card pages kept in sync with their clients over WebSocket.

#![allow(dead_code)]

mod app;
mod apps;
mod cli;
mod config;
mod core;
mod logger;
mod page;
mod server;
mod session;
mod task;
mod wire;

use std::sync::Arc;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::AppConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = AppConfig::load(&cli)?;
    logger::set_verbose(config.serve.verbose);

    match &cli.command {
        Commands::Serve { .. } => server::serve(apps::demo(), Arc::new(config)),
        Commands::Routes => {
            for route in apps::demo().routes() {
                println!("{route}");
            }
            Ok(())
        }
    }
}
