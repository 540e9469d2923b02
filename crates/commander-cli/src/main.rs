//! Command-line client for the Commander daemon

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::Level;

mod commands;

#[derive(Parser)]
#[command(name = "commander")]
#[command(about = "Commander client - invoke commands on the Commander daemon")]
#[command(version)]
struct Cli {
    /// Path to the daemon's Unix socket [default: /tmp/commander.sock]
    #[arg(short, long, global = true)]
    socket: Option<PathBuf>,

    /// Client configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(short, long, global = true)]
    timeout: Option<u64>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available commands (default)
    List,

    /// Dispatch a command to the daemon
    Dispatch {
        /// Command identifier, e.g. "echo"
        command: String,

        /// Parameters as a JSON object
        #[arg(short, long, default_value = "{}")]
        params: String,
    },

    /// Show daemon execution statistics
    Status,

    /// Show the schema a command accepts
    Describe {
        /// Command identifier
        command: String,
    },

    /// Read or replace a command's configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the command's current configuration
    Get {
        /// Command identifier
        command: String,
    },

    /// Submit a new configuration
    Set {
        /// Command identifier
        command: String,

        /// Configuration as JSON
        payload: String,
    },
}

/// How results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable tables
    Table,
    /// Pretty-printed JSON
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = commands::client::load_config(cli.config.as_deref(), cli.socket, cli.timeout)?;
    let format = cli.format;
    let command = cli.command.unwrap_or(Commands::List);

    smol::block_on(async move {
        match command {
            Commands::List => commands::list::run(config, format).await,
            Commands::Dispatch { command, params } => {
                commands::dispatch::run(config, format, &command, &params).await
            }
            Commands::Status => commands::status::run(config, format).await,
            Commands::Describe { command } => commands::action::describe(config, &command).await,
            Commands::Config { command } => match command {
                ConfigCommands::Get { command } => {
                    commands::action::get_config(config, &command).await
                }
                ConfigCommands::Set { command, payload } => {
                    commands::action::set_config(config, &command, &payload).await
                }
            },
        }
    })
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}
