//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{InspectCommand, PingCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Run and inspect graphk pipelines
#[derive(Debug, Parser, Clone)]
#[command(name = "graphk")]
#[command(version)]
#[command(about = "Run, validate and inspect graphk pipelines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline to completion
    Run(RunCommand),

    /// Validate a pipeline definition
    Validate(ValidateCommand),

    /// Print the descriptor tree of a pipeline
    Inspect(InspectCommand),

    /// Probe every node of a pipeline
    Ping(PingCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
