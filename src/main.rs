mod cli;
mod core;
mod execution;
mod tasks;

use anyhow::{Context as _, Result};
use cli::commands::{parse_var_value, InspectCommand, PingCommand, RunCommand, ValidateCommand};
use cli::output::*;
use cli::{Cli, Command};
use crate::core::config::PipelineConfig;
use crate::core::{Node, SessionStatus};
use execution::Runner;
use std::sync::Arc;
use std::time::Duration;
use tasks::TaskRegistry;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Inspect(cmd) => inspect_pipeline(cmd)?,
        Command::Ping(cmd) => ping_pipeline(cmd).await?,
    }

    Ok(())
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;
    let registry = TaskRegistry::with_builtins();
    let pipeline = Arc::new(config.to_pipeline(&registry)?);

    println!("{} Loaded pipeline: {}", INFO, style(pipeline.id()).bold());

    let mut context = config.initial_context();
    for (key, value) in &cmd.var {
        context.set(key.clone(), parse_var_value(value));
        println!(
            "{} Variable override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    let mut runner_config = config.runner_config();
    if let Some(max_retries) = cmd.max_retries {
        runner_config = runner_config.with_max_retries(max_retries);
    }
    if let Some(secs) = cmd.timeout_secs {
        runner_config = runner_config.with_step_timeout(Duration::from_secs(secs));
    }
    if let Some(seed) = cmd.seed {
        runner_config = runner_config.with_seed(seed);
    }

    let runner = Runner::new(runner_config)
        .with_event_handler(|event| println!("{}", format_runner_event(event)));
    let mut session = runner.start(pipeline.clone(), context);

    println!();
    let result = runner.run(&mut session).await;

    if !session.log().is_empty() {
        println!("\n{}", style("Log:").bold());
        for (index, entry) in session.log().iter().enumerate() {
            println!("{}", format_log_entry(index, entry));
        }
    }

    if cmd.json {
        println!("\n{}", serde_json::to_string_pretty(&session.snapshot())?);
    }

    if let Err(err) = &result {
        error!("{}", err);
    }

    match session.status() {
        SessionStatus::Completed => {
            println!(
                "\n{} {} completed {}",
                CHECK,
                style(pipeline.id()).bold(),
                style("successfully").green()
            );
            Ok(())
        }
        status => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(pipeline.id()).bold(),
                format_status(status)
            );
            if let Some(failure) = session.failure() {
                println!("  {}", style(&failure.message).red());
            }
            std::process::exit(1);
        }
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    let registry = TaskRegistry::with_builtins();
    let result = PipelineConfig::from_file(&cmd.file)
        .and_then(|config| config.to_pipeline(&registry).map(|pipeline| (config, pipeline)));

    match result {
        Ok((config, pipeline)) => {
            println!("{} Pipeline definition is valid!", CHECK);
            println!("  Id: {}", style(pipeline.id()).bold());
            if let Some(description) = &config.description {
                println!("  Description: {}", style(description).dim());
            }
            println!("  Members: {}", style(pipeline.len()).cyan());
            println!("  Nodes: {}", style(count_nodes(pipeline.nodes())).cyan());
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

fn inspect_pipeline(cmd: &InspectCommand) -> Result<()> {
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;
    let pipeline = config.to_pipeline(&TaskRegistry::with_builtins())?;
    println!("{}", pipeline.describe().to_json_pretty());
    Ok(())
}

async fn ping_pipeline(cmd: &PingCommand) -> Result<()> {
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;
    let pipeline = config.to_pipeline(&TaskRegistry::with_builtins())?;

    for node in pipeline.nodes() {
        let healthy = node.ping().await;
        println!(
            "{} {} ({})",
            if healthy { CHECK } else { CROSS },
            style(node.id()).bold(),
            node.kind_name()
        );
    }

    if pipeline.ping().await {
        println!("\n{} {} is healthy", CHECK, style(pipeline.id()).bold());
        Ok(())
    } else {
        println!("\n{} {} is unhealthy", CROSS, style(pipeline.id()).bold());
        std::process::exit(1);
    }
}

fn count_nodes(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| 1 + count_nodes(node.children()))
        .sum()
}
