mod cli;
mod control;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands, ConfigArgs};
use control::Command;
use photodrop_directory_watcher::{
    ConversionJob, ConversionOutcome, DirectoryWatcher, ExternalConverter, WatcherConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photodrop=info,photodrop_directory_watcher=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch {
            dir,
            disabled,
            config,
        } => {
            let mut config = load_config(&config)?;
            if let Some(dir) = dir {
                config.path = dir;
            }
            if disabled {
                config.enabled = false;
            }
            watch(config).await
        }
        Commands::Convert { file, config } => {
            let config = load_config(&config)?;
            convert(&file, &config).await
        }
    }
}

fn load_config(args: &ConfigArgs) -> Result<WatcherConfig> {
    let mut config = match &args.config {
        Some(file) => WatcherConfig::load(file)
            .with_context(|| format!("failed to load config from {}", file.display()))?,
        None => WatcherConfig::default(),
    };
    if args.keep_original {
        config.delete_original = false;
    }
    Ok(config)
}

async fn watch(config: WatcherConfig) -> Result<()> {
    let converter = Arc::new(ExternalConverter::new(config.converter.clone()));
    if !config.converter.program.exists() {
        warn!(
            "Conversion program {} not found; conversions will fail",
            config.converter.program.display()
        );
    }

    let start_enabled = config.enabled;
    let watcher = DirectoryWatcher::launch(config, converter).await;
    if start_enabled && !watcher.is_running().await {
        warn!("Monitoring could not start; send 'enable' to retry");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("failed to listen for ctrl-c")?;
                info!("Interrupted");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<Command>() {
                    Ok(command) => {
                        if !handle_command(&watcher, command).await? {
                            break;
                        }
                    }
                    Err(e) => warn!("{e}"),
                },
                // Without a control surface, run until interrupted.
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("Failed to read stdin: {e}");
                    stdin_open = false;
                }
            },
        }
    }

    watcher.disable().await;
    Ok(())
}

/// Apply one control command. Returns `false` when the watcher should exit.
async fn handle_command(watcher: &DirectoryWatcher, command: Command) -> Result<bool> {
    match command {
        Command::Enable => report_state(watcher.enable().await),
        Command::Disable => report_state(watcher.set_enabled(false).await),
        Command::Toggle => {
            let running = watcher.is_running().await;
            report_state(watcher.set_enabled(!running).await);
        }
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&watcher.stats().await)?);
        }
        Command::Rescan => match watcher.rescan().await {
            Some(report) => println!(
                "{} new file(s): {} converted, {} failed",
                report.conversions.len(),
                report.succeeded(),
                report.failed()
            ),
            None => println!("rescan skipped"),
        },
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

fn report_state(running: bool) {
    println!("{}", if running { "enabled" } else { "disabled" });
}

async fn convert(file: &Path, config: &WatcherConfig) -> Result<()> {
    if !file.is_file() {
        bail!("not a file: {}", file.display());
    }

    let job = ConversionJob::new(file, &config.target_extension);
    let converter = ExternalConverter::new(config.converter.clone());
    let delete_original = config.delete_original;

    let outcome = tokio::task::spawn_blocking(move || job.run(&converter, delete_original))
        .await
        .context("conversion task failed")?;

    match outcome {
        ConversionOutcome::Converted {
            output,
            source_removed,
        } => {
            if delete_original && !source_removed {
                warn!("{} was converted but not removed", file.display());
            }
            println!("{}", output.display());
            Ok(())
        }
        ConversionOutcome::Failed { reason } => {
            bail!("conversion of {} failed: {reason}", file.display())
        }
    }
}
