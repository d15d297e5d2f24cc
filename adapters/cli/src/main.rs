#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter for editing and inspecting Highland maps.

mod commands;
mod config;
mod transfer;
mod view;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Erase, Export, Import, New, Paint, Session, Set, Show, Walk};
use config::Config;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Highland map tools
#[derive(Parser)]
#[command(name = "highland")]
#[command(about = "Edit and inspect Highland tile maps", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file, optional
    #[arg(long, global = true, default_value = "highland.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Create a map filled with one ground
    New(New),

    /// Stack a ground on a cell at an elevation
    Paint(Paint),

    /// Repaint the floor of a flat cell
    Set(Set),

    /// Remove the top ground at an elevation
    Erase(Erase),

    /// Print a map
    Show(Show),

    /// Walk a movable across a map
    Walk(Walk),

    /// Print a map as a transfer string
    Export(Export),

    /// Write a map from a transfer string
    Import(Import),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load settings from {}", cli.config.display()))?;
    let session = Session::open(config)?;

    match cli.command {
        Command::New(cmd) => cmd.execute(&session),
        Command::Paint(cmd) => cmd.execute(&session),
        Command::Set(cmd) => cmd.execute(&session),
        Command::Erase(cmd) => cmd.execute(&session),
        Command::Show(cmd) => cmd.execute(&session),
        Command::Walk(cmd) => cmd.execute(&session),
        Command::Export(cmd) => cmd.execute(&session),
        Command::Import(cmd) => cmd.execute(&session),
    }
}

/// Warnings only, unless `RUST_LOG` names its own directives.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse_lossy(directives.unwrap_or_default())
}
