//! llll - run MicroPython programs on LEGO hubs via Pybricks
//!
//! Uploads programs with pybricksdev, keeps run logs, detects the hub's
//! hardware into `llll.toml` and checks for firmware updates.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use llll::commands::{self, CommandContext};
use llll::logging;
use llll_common::ProjectContext;
use owo_colors::OwoColorize;

// Version is embedded at build time
const VERSION: &str = env!("LLLL_VERSION");

#[derive(Parser)]
#[command(name = "llll")]
#[command(about = "LEGO lin la loop - run MicroPython programs on LEGO hubs via Pybricks", long_about = None)]
#[command(version = VERSION)]
struct Cli {
    /// Show debug diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project directory (defaults to the current directory)
    #[arg(short = 'C', long = "project-dir", global = true, value_name = "DIR")]
    project_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a workspace (.mcp.json, optionally llll.toml)
    Init {
        /// Detect the hub after initializing
        #[arg(long)]
        detect: bool,

        /// Bluetooth name of the hub to detect
        #[arg(long)]
        hub_name: Option<String>,

        /// Overwrite an existing .mcp.json
        #[arg(long)]
        force: bool,
    },

    /// Run a program on the hub
    Run {
        /// Program path, relative to the project root
        file: PathBuf,

        /// Bluetooth name of the hub (defaults to the configured hub)
        #[arg(long)]
        hub_name: Option<String>,

        /// Seconds to wait before killing the program (defaults to the configured timeout)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Detect the hub and its devices, saving them to llll.toml
    Detect {
        /// Bluetooth name of the hub
        #[arg(long)]
        hub_name: Option<String>,

        /// Seconds to wait for the discovery program
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show the configured hub and devices
    Info,

    /// List .py programs in the project
    Programs {
        /// Directory to search, relative to the project root
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// List run logs, most recent first
    Logs,

    /// Show a run log (the latest if no name is given)
    Log {
        /// Log file name, e.g. hello_20260211_152707.log
        name: Option<String>,
    },

    /// Pybricks firmware updates
    Firmware {
        #[command(subcommand)]
        action: FirmwareAction,
    },
}

#[derive(Subcommand)]
enum FirmwareAction {
    /// Check whether newer firmware is available
    Check {
        /// Installed firmware version (defaults to the one recorded by detect)
        #[arg(long)]
        current: Option<String>,

        /// Hub type, e.g. PrimeHub (defaults to the configured hub)
        #[arg(long)]
        hub_type: Option<String>,
    },

    /// Download the latest firmware for a hub type
    Download {
        /// Hub type, e.g. PrimeHub (defaults to the configured hub)
        #[arg(long)]
        hub_type: Option<String>,

        /// Destination directory (defaults to the project root)
        #[arg(long)]
        dest: Option<PathBuf>,
    },
}

async fn dispatch(cli: Cli) -> Result<bool> {
    let cwd = ProjectContext::from_current_dir().context("Cannot determine current directory")?;
    // The uploader runs inside the project, so the root must not be relative
    let project = match cli.project_dir {
        Some(dir) if dir.is_absolute() => ProjectContext::new(dir),
        Some(dir) => ProjectContext::new(cwd.root().join(dir)),
        None => cwd,
    };
    let ctx = CommandContext::new(project, cli.json);

    match cli.command {
        Commands::Init {
            detect,
            hub_name,
            force,
        } => commands::init(&ctx, detect, hub_name, force).await,
        Commands::Run {
            file,
            hub_name,
            timeout,
        } => commands::run(&ctx, file, hub_name, timeout).await,
        Commands::Detect { hub_name, timeout } => commands::detect(&ctx, hub_name, timeout).await,
        Commands::Info => commands::info(&ctx),
        Commands::Programs { dir } => commands::programs(&ctx, &dir),
        Commands::Logs => commands::logs(&ctx),
        Commands::Log { name } => commands::log(&ctx, name.as_deref()),
        Commands::Firmware { action } => match action {
            FirmwareAction::Check { current, hub_type } => {
                commands::firmware_check(&ctx, current, hub_type.as_deref()).await
            }
            FirmwareAction::Download { hub_type, dest } => {
                commands::firmware_download(&ctx, hub_type.as_deref(), dest).await
            }
        },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match dispatch(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".bright_red(), e);
            ExitCode::FAILURE
        }
    }
}
