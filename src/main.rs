//! `license-locatr` — resolve a project's declared dependencies to the
//! on-disk locations where their license texts are expected to live.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Load scan config ([`config::load_config`]).
//! 3. Probe which dependency sources apply ([`source::Source::enabled`]).
//! 4. Resolve each enabled source's packages against the installed
//!    environment ([`source::pip`]).
//! 5. Render the requested report ([`report`]).
//! 6. Exit `0` (resolved) or `1` (no source enabled, or resolution failed).

mod cli;
mod config;
mod models;
mod report;
mod shell;
mod source;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use indicatif::ProgressBar;

use cli::{Cli, ReportFormat};
use config::load_config;
use shell::SystemShell;
use source::pip::PipSource;
use source::Source;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Resolve project path
    let path = cli
        .path
        .canonicalize()
        .unwrap_or_else(|_| cli.path.clone());

    let config = load_config(&path, cli.config.as_deref())?;

    // The one implemented source; further ecosystems plug in beside it.
    let shell = SystemShell::new(Duration::from_secs(cli.timeout));
    let pip = PipSource::new(&config, shell);

    if !pip.enabled() {
        eprintln!(
            "No enabled dependency sources found in {}",
            path.display()
        );
        std::process::exit(1);
    }

    let pb = if !cli.quiet {
        let pb = ProgressBar::new_spinner();
        pb.set_message(format!("Resolving {} dependencies...", pip.kind()));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let resolved = pip.dependencies().await;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let deps = resolved?;

    if !cli.quiet {
        eprintln!(
            "  {} {} {} dependencies",
            "→".cyan(),
            pip.kind(),
            deps.len()
        );
    }

    match cli.report {
        ReportFormat::Terminal => {
            report::terminal::render(deps, &path, cli.verbose, cli.quiet)?;
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(deps)?);
        }
    }

    Ok(())
}
