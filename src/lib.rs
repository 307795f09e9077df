//! scaffold-upgrade - Upgrade a generated project to a newer generator version
//!
//! The project is regenerated from scratch at the target version on a
//! dedicated upgrade branch, and that branch is merged into the project's
//! branch. Hand-written changes survive; where they overlap with generator
//! changes, the developer resolves ordinary merge conflicts once.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Runs the upgrade protocol: Init → Resolving → Checkpointing →
//!   Regenerating → Merging → Reporting
//! - [`core`] - Domain types, generator identity, metadata and configuration
//! - [`git`] - Single interface for all Git operations
//! - [`ui`] - Output and outcome reporting
//!
//! # Correctness Invariants
//!
//! scaffold-upgrade maintains the following invariants:
//!
//! 1. A dirty working tree is refused before anything is touched
//! 2. History is only appended to; the upgrade branch is only ever extended
//! 3. Merge conflicts are surfaced, never resolved or aborted automatically
//! 4. Commit messages follow a fixed contract that other tools rely on

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod ui;
