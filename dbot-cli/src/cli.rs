//! CLI parser.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "dbot")]
#[command(about = "Telegram / VK long-poll bot runner", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Poll one platform until stopped (Ctrl+C) or until the update stream is given up on.
    Run {
        #[command(subcommand)]
        platform: Platform,
    },
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Platform {
    /// Telegram Bot API (config from env; token can override BOT_TOKEN).
    Telegram {
        #[arg(short, long)]
        token: Option<String>,
    },
    /// VK Bots Long Poll (config from env; token can override VK_TOKEN).
    Vk {
        #[arg(short, long)]
        token: Option<String>,
    },
}
