//! core
//!
//! Core domain types, schemas, and configuration for scaffold-upgrade.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, SemanticVersion, TargetVersion
//! - [`generator`] - Generator identity, upgrade branch and commit messages
//! - [`metadata`] - Project metadata schema and storage
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Nothing in here touches the repository

pub mod config;
pub mod generator;
pub mod metadata;
pub mod types;
