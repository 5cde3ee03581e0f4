//! The `homeboard` command-line interface: configuration loading, the
//! Google consent flow and the `serve` entry point.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;

pub use cli::Cli;
pub use error::{CliError, CliResult};
