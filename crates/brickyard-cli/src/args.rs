//! Command-line argument definitions for the Brickyard CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Arguments select the input file, the configuration file,
//! logging verbosity and the [`Command`] to run.

use clap::{Parser, Subcommand};

/// Command-line arguments for the Brickyard model tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input LDraw file
    #[arg(help = "Path to the input .ldr or .mpd file")]
    pub input: String,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Re-synthesize every LSynth block and write the model back out
    Rewrite {
        /// Output file; standard output when omitted
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Count the pieces of the main model and list the missing ones
    Report,

    /// Print the size of a model
    Dimensions {
        /// Model to measure; the main model when omitted
        #[arg(short, long)]
        model: Option<String>,
    },
}
