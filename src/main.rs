use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use nix::unistd::Uid;
use sdbackup::adapters;
use sdbackup::config::AppConfig;
use sdbackup::context::AppContext;
use sdbackup::core::{
    BlockDevice, Orchestrator, TriggerController, scanner::parse_listing, select_device,
};
use sdbackup::logging::{self, LogConfig};
use serde::Serialize;
use tracing::warn;

#[derive(Parser)]
#[command(name = "sdbackup")]
#[command(about = "Copies camera videos from an SD card to a USB drive at the press of a button", long_about = None)]
struct Cli {
    /// Defaults to `daemon`
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq, Debug)]
enum Commands {
    /// Wait for the trigger button and run a backup on every press
    Daemon,
    /// Run a single backup now and exit
    #[command(short_flag = 'o')]
    Once,
    /// List block devices and the role each would be matched to
    Scan {
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Args, Serialize)]
struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    destination_root: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    verbose: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    simulation: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    json_logs: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Daemon);
    let config = AppConfig::new(Some(&cli.overrides), cli.config.as_deref())?;

    match command {
        Commands::Config => {
            print!("{}", config.to_toml()?);
            return Ok(());
        }
        Commands::Scan { json } => return run_scan(&config, json),
        Commands::Daemon | Commands::Once => {}
    }

    logging::init(LogConfig {
        log_file: Some(config.log_file.clone()),
        print_to_screen: config.print_to_screen,
        json: config.json_logs,
        verbose: config.verbose,
    })?;

    if config.use_sudo && Uid::effective().is_root() {
        warn!("Running as root with use_sudo enabled; sudo is not needed");
    } else if !config.use_sudo && !Uid::effective().is_root() && !config.simulation {
        warn!("Not running as root and use_sudo is disabled; mount will likely fail");
    }

    let hardware = adapters::get_hardware(&config);
    let ctx = AppContext::new(config, hardware.adapter, hardware.light);

    match command {
        Commands::Once => run_once(ctx).await,
        _ => run_daemon(ctx).await.context("Failed to start daemon"),
    }
}

async fn run_daemon(ctx: AppContext) -> Result<()> {
    Orchestrator::new(ctx).start().await
}

/// One run through the same entry point as a button press. There is no exit
/// code contract for partial failures; the log carries the outcome.
async fn run_once(ctx: AppContext) -> Result<()> {
    TriggerController::new(ctx).on_trigger().await;
    Ok(())
}

#[derive(Serialize)]
struct ScanEntry<'a> {
    #[serde(flatten)]
    device: &'a BlockDevice,
    role: Option<&'a str>,
}

fn run_scan(config: &AppConfig, json: bool) -> Result<()> {
    let hardware = adapters::get_hardware(config);
    let listing = hardware
        .adapter
        .list_devices()
        .context("Failed to list block devices")?;

    let devices = parse_listing(&listing)
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to parse device listing")?;

    // The device each role would actually pick: the first match in listing order.
    let selected: Vec<(&str, Option<BlockDevice>)> = [&config.source, &config.destination]
        .into_iter()
        .map(|role| {
            select_device(&listing, &role.size_range()).map(|dev| (role.label.as_str(), dev))
        })
        .collect::<Result<_, _>>()?;

    let role_for = |device: &BlockDevice| {
        selected
            .iter()
            .find(|(_, dev)| dev.as_ref() == Some(device))
            .map(|(label, _)| *label)
    };

    let entries: Vec<ScanEntry> = devices
        .iter()
        .map(|device| ScanEntry {
            device,
            role: role_for(device),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{:<16} {:>16} {:<6} {}",
            entry.device.name,
            entry.device.size_bytes,
            entry.device.kind.as_str(),
            entry.role.unwrap_or("-")
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_runs_daemon() {
        let cli = Cli::try_parse_from(["sdbackup"]).unwrap();
        assert_eq!(cli.command.unwrap_or(Commands::Daemon), Commands::Daemon);
    }

    #[test]
    fn test_short_flag_runs_once() {
        let cli = Cli::try_parse_from(["sdbackup", "-o"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Once));
    }

    #[test]
    fn test_bool_overrides_work_as_bare_flags() {
        let cli = Cli::try_parse_from(["sdbackup", "--verbose", "--simulation", "once"]).unwrap();
        assert_eq!(cli.overrides.verbose, Some(true));
        assert_eq!(cli.overrides.simulation, Some(true));
        assert_eq!(cli.overrides.json_logs, None);

        let cli = Cli::try_parse_from(["sdbackup", "daemon", "--simulation=false"]).unwrap();
        assert_eq!(cli.overrides.simulation, Some(false));
    }

    #[test]
    fn test_overrides_serialize_only_given_values() {
        let cli = Cli::try_parse_from(["sdbackup", "--verbose", "scan"]).unwrap();
        let value = serde_json::to_value(&cli.overrides).unwrap();
        assert_eq!(value, serde_json::json!({ "verbose": true }));
    }
}
