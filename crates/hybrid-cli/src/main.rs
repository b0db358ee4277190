//! Hybrid CLI - install and run optional capabilities.
//!
//! Every command opens the home directory, reconciles the installed set
//! from the install log, and then runs installs and invocations as
//! background tasks whose completions are awaited here.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hybrid_capabilities::Category;
use hybrid_config::Preferences;
use hybrid_core::HybridHome;
use hybrid_telemetry::{FileRotation, LogConfig};

mod app;
mod commands;
mod theme;

use app::App;
use commands::{capabilities, install, log, prefs, run, runtime};

/// Hybrid - optional capability installer and runner
#[derive(Parser)]
#[command(name = "hybrid")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Write logs to daily files under the home logs directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered capabilities
    List {
        /// Only show one category (synthesis, tool, transcriber, experimental)
        #[arg(short, long)]
        category: Option<Category>,
    },

    /// Show details for a capability
    Info {
        /// Capability name
        name: String,
    },

    /// Show install state and missing packages for every capability
    Status,

    /// Install the packages a capability needs
    Install {
        /// Capability name
        name: String,
    },

    /// Uninstall a capability, keeping packages other capabilities share
    Uninstall {
        /// Capability name
        name: String,
    },

    /// Invoke a capability
    Run {
        /// Capability name
        name: String,
        /// Input text, or a file path with --file
        input: String,
        /// Treat the input as a file path
        #[arg(short, long)]
        file: bool,
        /// Output path (defaults to a dated path under the output directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Title used in the default output name
        #[arg(short, long)]
        title: Option<String>,
        /// Voice or speaker
        #[arg(long)]
        voice: Option<String>,
        /// Language code
        #[arg(long)]
        lang: Option<String>,
        /// Speaking rate
        #[arg(long)]
        rate: Option<f64>,
        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
        /// Install missing packages first
        #[arg(long)]
        install: bool,
    },

    /// Show the install log
    Log {
        /// Only show the most recent entries
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// View and change preferences
    Prefs {
        #[command(subcommand)]
        command: PrefsCommands,
    },

    /// Manage the numerical runtime
    Runtime {
        #[command(subcommand)]
        command: RuntimeCommands,
    },
}

#[derive(Subcommand)]
enum PrefsCommands {
    /// Show current preferences
    Show,
    /// Set a preference
    Set {
        /// Preference key
        key: String,
        /// New value
        value: String,
    },
}

#[derive(Subcommand)]
enum RuntimeCommands {
    /// Show the installed runtime version
    Status,
    /// Install the runtime matching the detected CUDA toolkit
    Install,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let home = HybridHome::resolve().context("failed to resolve the hybrid home directory")?;
    let preferences = Preferences::load(&home.preferences_path());

    let mut log_config = LogConfig::for_verbosity(cli.verbose, preferences.debug);
    if cli.log_file {
        log_config = log_config.with_file_target(home.logs_dir(), FileRotation::Daily);
    }
    if let Err(e) = hybrid_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    // Preferences never need the package environment.
    if let Commands::Prefs { command } = cli.command {
        return handle_prefs(&home, preferences, command);
    }

    let app = App::open(home, preferences)?;

    match cli.command {
        Commands::List { category } => capabilities::list(&app, category)?,
        Commands::Info { name } => capabilities::info(&app, &name)?,
        Commands::Status => capabilities::status(&app)?,
        Commands::Install { name } => install::install(&app, &name).await?,
        Commands::Uninstall { name } => install::uninstall(&app, &name).await?,
        Commands::Run {
            name,
            input,
            file,
            output,
            title,
            voice,
            lang,
            rate,
            seed,
            install,
        } => {
            let request = run::RunRequest {
                input,
                file,
                output,
                title,
                options: hybrid_capabilities::InvocationOptions {
                    voice,
                    lang,
                    rate,
                    seed,
                },
                install,
            };
            run::run(&app, &name, request).await?;
        },
        Commands::Log { limit } => log::show(&app, limit)?,
        Commands::Runtime { command } => match command {
            RuntimeCommands::Status => runtime::status(&app),
            RuntimeCommands::Install => runtime::install(&app).await?,
        },
        Commands::Prefs { .. } => {},
    }

    Ok(())
}

fn handle_prefs(home: &HybridHome, preferences: Preferences, command: PrefsCommands) -> Result<()> {
    match command {
        PrefsCommands::Show => prefs::show(home, &preferences),
        PrefsCommands::Set { key, value } => prefs::set(home, preferences, &key, &value),
    }
}
