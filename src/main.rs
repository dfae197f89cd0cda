//! Observable - live preview server for annotated-Markdown sites.

mod cli;
mod compiler;
mod config;
mod core;
mod embed;
mod logger;
mod page;
mod reload;
mod utils;

use std::process::ExitCode;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{ColorChoice, CommandFactory, Parser};
use cli::{Cli, Commands};

fn main() -> Result<ExitCode> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayVersion | ErrorKind::DisplayHelp) => e.exit(),
        Err(e) => {
            eprintln!("{}", e.render());
            eprintln!("{}", Cli::command().render_usage());
            return Ok(ExitCode::FAILURE);
        }
    };

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    match &cli.command {
        Commands::Preview { args } => cli::preview::run(args).map(|()| ExitCode::SUCCESS),
        Commands::Build => unavailable("build"),
        Commands::Auth => unavailable("auth"),
    }
}

fn unavailable(command: &str) -> Result<ExitCode> {
    log!("error"; "`{command}` is unavailable in this binary; use `preview`");
    Ok(ExitCode::FAILURE)
}
