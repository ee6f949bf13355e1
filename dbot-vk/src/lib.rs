//! # dbot-vk
//!
//! VK community bot client on top of [`dbot_core`]: long-poll event types, built-in match rules
//! ([`VkEvent`]) and listener arguments ([`VkArgument`]) with lazy user lookups, the form-encoded
//! reqwest transport and the Bots Long Poll session source. [`VkBot`] wires them together.

pub mod args;
pub mod bot;
pub mod client;
pub mod config;
pub mod rules;
pub mod source;
pub mod types;
pub mod users;

pub use args::{VkArgument, VkMessageArgs, VkUserEventArgs};
pub use bot::VkBot;
pub use client::VkClient;
pub use config::VkConfig;
pub use rules::{builtin_rules, VkEvent, VkRule};
pub use source::VkSource;
pub use types::{ApiError, ClientInfo, LongPollResponse, LongPollSession, Message, UpdateItem, User};
pub use users::{get_sender, get_user, UserResolver};
