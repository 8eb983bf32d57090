//! pushreg CLI
//!
//! Command-line tools for a persisted pushreg client state directory.
//!
//! # Commands
//!
//! - `inspect` - Display registration state and identity
//! - `preferences` - List declared preferences
//! - `verify` - Check that the stored state is readable and consistent
//! - `reset` - Clear registration and preferences

mod commands;

use clap::{Parser, Subcommand};
use pushreg::DebugLevel;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// pushreg command-line state tools.
#[derive(Parser)]
#[command(name = "pushreg")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the client state directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display registration state and identity
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List declared preferences
    Preferences {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check that the stored state is readable and consistent
    Verify,

    /// Clear registration and preferences
    Reset {
        /// Also forget the device ID
        #[arg(long)]
        all: bool,

        /// Confirm the reset
        #[arg(short, long)]
        yes: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DebugLevel::default().directive()))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("State path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Preferences { format } => {
            let path = cli.path.ok_or("State path required for preferences")?;
            commands::preferences::run(&path, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("State path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Reset { all, yes } => {
            let path = cli.path.ok_or("State path required for reset")?;
            if !yes {
                return Err("Refusing to reset without --yes".into());
            }
            commands::reset::run(&path, all)?;
        }
        Commands::Version => {
            println!("pushreg CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("pushreg client v{}", pushreg::FRAMEWORK_VERSION);
        }
    }

    Ok(())
}
