#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! snowcli - manage Snowflake git repositories, native applications and Snowpark packages
//!
//! snowcli can be used as both a command-line application and a library. All
//! Snowflake access goes through the [`SqlExecutor`] trait, so every manager
//! can be driven by the bundled SQL API connection or by any other executor.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (none) | Lenses, role guard, project files, packaging | `serde_yaml`, `zip`, `md-5` |
//! | `http` | Snowflake SQL API connection, Anaconda channel download | `ureq` |
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | Full CLI binary | All above + `clap`, `indicatif` |
//!
//! ```toml
//! # Library only, bring your own executor
//! snowcli = { version = "0.3", default-features = false }
//!
//! # Library with the SQL API connection
//! snowcli = { version = "0.3", default-features = false, features = ["http"] }
//! ```
//!
//! # Architecture
//!
//! - **[`database`]**: executor seam, SQL API connection, role-scoped execution
//! - **[`lens`]**: high-level operations
//!   - `objects`: ownership-gated drop
//!   - `stage`: stage listing, upload and diff
//!   - `git`: git repository objects
//!   - `nativeapp`: native application bundle/deploy/run/teardown
//!   - `package`: Anaconda lookup and package archives
//! - **[`config`]**: configuration management
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use snowcli::database::{run_as, SqlApiConnection};
//! use snowcli::lens::objects::{verify_and_drop, ObjectKind};
//! use snowcli::SnowcliConfig;
//!
//! let config = SnowcliConfig::new(&None)?;
//! let conn = SqlApiConnection::open(config.connection_settings()?)?;
//!
//! // drops only if `dev_role` owns it, then restores the previous role
//! verify_and_drop(&conn, "my_repo", "dev_role", ObjectKind::Repository)?;
//! ```

pub mod config;
pub mod database;
pub mod lens;

// =============================================================================
// Configuration
// =============================================================================

pub use config::SnowcliConfig;

// =============================================================================
// Database
// =============================================================================

pub use database::{run_as, QueryResult, RoleGuard, SqlExecutor};

#[cfg(feature = "http")]
pub use database::{ConnectionSettings, SqlApiConnection};

// =============================================================================
// Lenses
// =============================================================================

pub use lens::objects::{verify_and_drop, ObjectError, ObjectKind};
pub use lens::utils::OutputFormat;
