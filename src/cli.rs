//! Command-line interface for redub
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Redub spoken audio into another language
#[derive(Parser, Debug)]
#[command(
    name = "redub",
    version,
    about = "Redub spoken audio into another language with the original voice"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Redub every audio file under INPUT_DIR into OUTPUT_DIR
    Run {
        /// Directory searched recursively for audio files
        input_dir: PathBuf,

        /// Directory receiving dubbed files, manifest.json and debug output
        output_dir: PathBuf,

        /// Target language label (e.g. "Brazilian Portuguese")
        #[arg(long, short = 't', value_name = "LANGUAGE")]
        target_language: Option<String>,

        /// Process at most N files (already completed files do not count)
        #[arg(long, short = 'n', value_name = "N")]
        limit: Option<usize>,

        /// Keep a copy of every workspace under OUTPUT_DIR/debug
        #[arg(long)]
        debug: bool,

        /// Skip noise suppression
        #[arg(long)]
        no_denoise: bool,
    },

    /// Check external tools and the translation server
    Check,

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration (optionally a single section or key)
    Show {
        /// Section or dotted key (e.g. translation, translation.model)
        key: Option<String>,
    },
    /// Print the configuration file path
    Path,
}
