//! Command line argument parsing
//!
//! Subcommands:
//! - `replay`: Feed a recorded transport event script through a session
//! - `show-config`: Show configuration discovery information and the effective config
//! - `init-config`: Write a default config file to the user's home directory

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "nearby")]
#[command(author = "Nearby Session Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Session event handling for nearby peer-to-peer resource transfers"
)]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Enable verbose (debug) logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay a JSON-lines script of transport events and print application events
    Replay {
        /// Path to the replay script
        script: PathBuf,
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Storage root override
        #[arg(short = 'r', long = "root")]
        root: Option<PathBuf>,
    },
    /// Show configuration discovery information
    ShowConfig {
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
    },
    /// Create a default configuration file in the user's home directory
    InitConfig,
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }
}
