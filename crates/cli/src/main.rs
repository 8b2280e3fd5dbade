//! Filetrigger CLI - ftrig command
//!
//! Starts one trigger, prints every fire and stops on Enter or Ctrl+C.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use trigger_core::{TriggerEvent, TriggerSettings};
use trigger_watcher::{TriggerCallback, TriggerEngine};

mod logging;

/// Filetrigger - run a callback when a file changes or stays quiet too long
#[derive(Parser)]
#[command(name = "ftrig")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Trigger definition, e.g. `./data.txt|Initial|S:30|/tmp,/var/tmp`
    definition: String,

    /// Engine settings (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Name shown in trigger messages
    #[arg(long, default_value = "ftrig")]
    controller: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init(cli.log_file.as_deref())?;

    let settings = match &cli.config {
        Some(path) => {
            let settings = TriggerSettings::load(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?;
            info!("Loaded settings from {}", path.display());
            settings
        }
        None => TriggerSettings::default(),
    };

    let engine = TriggerEngine::builder().settings(settings).build();
    let callback: TriggerCallback = Arc::new(print_fire);

    let started = engine
        .start(&cli.controller, &cli.definition, callback.clone())
        .with_context(|| format!("Failed to start trigger '{}'", cli.definition))?;
    if !started {
        anyhow::bail!("Trigger is already running");
    }

    println!("{}", engine.trigger_info().bold());
    println!("{}", "Press Enter or Ctrl+C to stop".dimmed());

    wait_for_exit().await?;

    engine.stop(&cli.controller, &callback);
    engine.dispose();
    println!("{}", "Trigger stopped".green());
    Ok(())
}

fn print_fire(event: TriggerEvent) {
    let time_str = Local::now().format("%H:%M:%S").to_string();
    println!(
        "{} Trigger fired: {} ({})",
        time_str.dimmed(),
        event.full_path().display().cyan(),
        event.change_info()
    );
}

async fn wait_for_exit() -> Result<()> {
    // A plain thread: a blocked stdin read must not hold up runtime shutdown
    let (tx, rx) = tokio::sync::oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = tx.send(std::io::stdin().read_line(&mut line).map(|_| ()));
    });

    tokio::select! {
        result = rx => {
            result
                .context("Stdin reader went away")?
                .context("Failed to read stdin")?;
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
        }
    }
    Ok(())
}
