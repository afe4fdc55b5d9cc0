//! CLI command definitions

use clap::Args;
use serde_json::Value;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Per-run context overrides (key=value, value parsed as JSON when possible)
    #[arg(long, value_parser = parse_key_value)]
    pub var: Vec<(String, String)>,

    /// Seed for random branch selection
    #[arg(long)]
    pub seed: Option<u64>,

    /// Retries per node (overrides the file)
    #[arg(long)]
    pub max_retries: Option<usize>,

    /// Timeout for one node step, in seconds (overrides the file)
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Print the final session snapshot as JSON
    #[arg(long)]
    pub json: bool,
}

/// Validate a pipeline definition
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,
}

/// Print the descriptor tree of a pipeline
#[derive(Debug, Args, Clone)]
pub struct InspectCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,
}

/// Probe every node of a pipeline
#[derive(Debug, Args, Clone)]
pub struct PingCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}

/// Interpret a `--var` value: JSON literals stay typed, anything else is a string
pub fn parse_var_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
