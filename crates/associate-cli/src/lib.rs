//! # associate-cli
//!
//! Command tree for the `associate` binary: migrations, one-shot and live
//! presence queries, and a heartbeat publisher driven from stdin.

pub mod commands;
pub mod output;

pub use commands::{Cli, Commands};
pub use output::OutputFormat;
