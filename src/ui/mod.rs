//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//! - [`report`] - Upgrade outcome rendering and exit codes
//!
//! # Design
//!
//! All output goes through this module so verbosity is honored in one place.
//! Rendering is pure; printing is a thin layer on top.

pub mod output;
pub mod report;
