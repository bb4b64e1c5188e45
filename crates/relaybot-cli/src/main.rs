mod cli;
mod console;
mod setup;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use console::ConsoleDelivery;
use relaybot_core::channel::DiscordDelivery;
use relaybot_core::runtime::run_message_loop;
use relaybot_core::{ChatDelivery, RelayConfig};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays a clean transcript.
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => RelayConfig::load_from_path(Some(path.clone())),
        None => RelayConfig::load(),
    };
    config.apply_env_overrides();

    let delivery: Arc<dyn ChatDelivery> = match &cli.discord_token {
        Some(token) => Arc::new(DiscordDelivery::with_token(token)),
        None => {
            std::fs::create_dir_all(&cli.output_dir)?;
            Arc::new(ConsoleDelivery::new(std::io::stdout(), &cli.output_dir))
        }
    };

    let dispatcher = Arc::new(setup::build_dispatcher(&config, delivery));
    let input = console::inbound_stream(BufReader::new(tokio::io::stdin()), &cli.channel, &cli.user);

    run_message_loop(input, dispatcher).await;
    Ok(())
}
