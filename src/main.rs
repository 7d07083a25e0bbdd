//! Trend signal engine - main entry point
//!
//! This binary provides two subcommands:
//! - replay: Feed a CSV bar file through a paper-traded session
//! - show-config: Print the effective configuration and strategy parameters

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "trend-signal-engine")]
#[command(about = "Single-instrument trend signal engine with paper replay", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a CSV bar feed through the engine with paper fills
    Replay {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/ut_trend.json")]
        config: String,

        /// CSV bar file (datetime,open,high,low,close,volume)
        #[arg(short, long)]
        data: String,

        /// Log the strategy status every N bars (0 disables)
        #[arg(long, default_value = "0")]
        status_every: usize,
    },

    /// Print the effective configuration
    ShowConfig {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/ut_trend.json")]
        config: String,
    },
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // Log file naming pattern: {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    // Same format without ANSI colors
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Replay { .. } => "replay",
        Commands::ShowConfig { .. } => "show_config",
    };

    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::Replay {
            config,
            data,
            status_every,
        } => commands::replay::run(config, data, status_every),
        Commands::ShowConfig { config } => commands::show_config::run(config),
    }
}
