//! # dbot-cli
//!
//! `dbot` binary support: argument parsing and the run loop that wires a platform bot to logging
//! listeners, polls until Ctrl+C, and reports a given-up update stream as an error.

pub mod cli;
pub mod runner;

pub use cli::{Cli, Commands, Platform};
pub use runner::{run_telegram, run_vk, wait_for_shutdown};
