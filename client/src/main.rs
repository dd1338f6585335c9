use anyhow::{Context, Result};
use clap::Parser;
use ocean_cli::catalog;
use ocean_cli::commands::CommandRunner;
use ocean_cli::config::Settings;
use ocean_cli::console::{TerminalPrompt, TerminalReader};
use ocean_cli::dispatcher::{Dispatcher, LoopMode};
use ocean_cli::node::NodeClient;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ocean-cli")]
#[command(about = "Ocean CLI - publish, consume and compute on data assets", long_about = None)]
struct Cli {
    /// Run the given command and exit instead of opening the prompt
    #[arg(long)]
    avoid_loop_run: bool,

    /// Initial command and its arguments, e.g. `getDDO did:op:...`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, stdout carries command output only
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = Settings::from_env().context("Invalid environment")?;
    let registry = catalog::build_registry().context("Invalid command table")?;

    let mode = if cli.avoid_loop_run || settings.avoid_loop_run {
        LoopMode::OneShot
    } else {
        LoopMode::Interactive
    };
    info!("🌊 Ocean CLI using node {}", settings.node_url);

    let node = NodeClient::new(settings.node_url.clone());
    let runner = CommandRunner::new(settings, node, Box::new(TerminalPrompt));
    let reader = TerminalReader::new().context("Cannot open terminal")?;

    let summary = Dispatcher::new(&registry, reader, runner, mode)
        .run(cli.command)
        .await;

    let code = summary.exit_code();
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
