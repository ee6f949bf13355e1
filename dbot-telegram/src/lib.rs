//! # dbot-telegram
//!
//! Telegram Bot API client on top of [`dbot_core`]: update types, built-in match rules
//! ([`TelegramEvent`]) and their listener arguments ([`TelegramArgument`]), text-entity extraction,
//! a standalone [`TextMatcher`], the reqwest transport, `getUpdates` polling and env config.
//! [`TelegramBot`] wires all of it behind one handle.

pub mod args;
pub mod bot;
pub mod client;
pub mod config;
pub mod entities;
pub mod rules;
pub mod source;
pub mod text_matcher;
pub mod types;

pub use args::{
    CommandMatch, FileMessage, FileUrlResolver, MediaMatch, MediaPayload, MessageArgs,
    TelegramArgument,
};
pub use bot::TelegramBot;
pub use client::TelegramClient;
pub use config::TelegramConfig;
pub use entities::{extract_entities, first_bot_command, ExtractedEntity};
pub use rules::{builtin_rules, MediaKind, RuleContext, TelegramEvent, TelegramRule};
pub use source::{decode_updates, next_offset, TelegramSource};
pub use text_matcher::{TextMatch, TextMatcher, TextRule};
pub use types::*;
