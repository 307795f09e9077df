//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Opens the repository and loads configuration
//! 2. Calls the engine to execute the command
//! 3. Formats and displays output
//!
//! Handlers do NOT perform repository mutations directly. Every handler
//! returns the process exit code.

mod completion;
mod status;
mod upgrade;

// Re-export command functions for testing and direct invocation
pub use completion::completion;
pub use status::status;
pub use upgrade::upgrade;

use crate::cli::args::Command;
use crate::engine::Context;
use anyhow::Result;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<u8> {
    match command {
        Command::Upgrade(args) => upgrade::upgrade(ctx, &args),
        Command::Status => status::status(ctx),
        Command::Completion { shell } => completion::completion(shell),
    }
}
