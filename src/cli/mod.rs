//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "msmd",
    version,
    author = "neur0map",
    about = "Two-phase memory-deduplication simulator for virtualized hosts",
    long_about = "msmd simulates modified static memory deduplication: an offline phase clusters \
                  applications by fuzzy-hash similarity and discovers candidate duplicate pages \
                  with a generational search, and an online phase merges duplicate pages across \
                  VM snapshots using the pre-built shared page index."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/msmd/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline over a scenario file
    Run {
        /// Scenario file (JSON) describing applications, pages, and VM snapshots
        scenario: PathBuf,

        /// Seed for the generational search (reproducible runs)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Print the summary as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },

    /// Run the built-in three-application reference scenario
    Demo {
        /// Seed for the generational search (reproducible runs)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Print the summary as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the standard config path)
        file: Option<PathBuf>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
