//! dbot CLI: run a Telegram or VK bot over long polling. Config from env (.env loaded) and
//! optional CLI args. Exits non-zero when the update stream is given up on.

use anyhow::Result;
use clap::Parser;
use dbot_cli::{run_telegram, run_vk, Cli, Commands, Platform};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { platform } => match platform {
            Platform::Telegram { token } => run_telegram(token).await,
            Platform::Vk { token } => run_vk(token).await,
        },
    }
}
