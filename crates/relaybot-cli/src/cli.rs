use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "relaybot")]
#[command(version, about = "RelayBot - chat relay for local completion and image models")]
pub struct Cli {
    /// Config file (defaults to ~/.config/relaybot/config.toml)
    #[arg(long, env = "RELAYBOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Channel id attached to every message read from stdin
    #[arg(long, default_value = "console")]
    pub channel: String,

    /// Display name of the person typing
    #[arg(long, default_value = "You")]
    pub user: String,

    /// Directory where posted images are written
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Post replies to Discord instead of the console (`--channel` must then
    /// be a Discord channel id)
    #[arg(long, env = "DISCORD_BOT_TOKEN", hide_env_values = true)]
    pub discord_token: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
