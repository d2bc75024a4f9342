//! Lens module
//!
//! This module provides high-level "lens" abstractions that combine business logic
//! with output formatting. Every lens borrows a [`SqlExecutor`](crate::database::SqlExecutor)
//! (or, for packaging, an installer and the Anaconda channel index) and is
//! reusable outside the CLI.
//!
//! | Lens | Purpose | Dependencies |
//! |------|---------|--------------|
//! | `objects` | ownership/provenance check before `drop` | (executor only) |
//! | `StageLens` | list, upload, remove, copy, diff against local tree | md-5 |
//! | `GitLens` | git repository objects | (executor only) |
//! | `NativeAppLens` | bundle, deploy, run and tear down native apps | serde_yaml |
//! | `PackageLens` | Anaconda lookup and package archives | ureq, zip |
//!
//! # Architecture
//!
//! Each lens module exports:
//! - A **Lens struct** (e.g., `GitLens`, `NativeAppLens`) - the main entry point for all operations
//! - **Args structs** - input arguments for lens methods (clap `Args` with the `cli` feature)
//! - **Output types** - return types and typed errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use snowcli::lens::git::{GitLens, GitCreateArgs};
//! use snowcli::lens::nativeapp::{NativeAppLens, NativeAppProject};
//! use snowcli::lens::package::{AnacondaChannel, PackageLens, PipInstaller};
//! ```

// =============================================================================
// Utility module
// =============================================================================
pub mod utils;

// =============================================================================
// Snowflake object lenses
// =============================================================================
pub mod git;
pub mod nativeapp;
pub mod objects;
pub mod stage;

// =============================================================================
// Snowpark packaging
// =============================================================================
pub mod package;
