//! Operator CLI for the occurrence indexing pipeline.

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::run_command;
