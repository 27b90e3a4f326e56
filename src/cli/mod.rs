//! Command-line interface for limatmpl.
//!
//! # Architecture
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`commands`] - Command implementations
//! - [`output`] - Output abstraction used by commands

pub mod args;
pub mod commands;
pub mod output;

pub use args::{Cli, Commands, CopyArgs, ListArgs, ValidateArgs};
pub use commands::{Command, CommandDispatcher, CommandResult};
pub use output::{MockOutput, Output, StdOutput};
