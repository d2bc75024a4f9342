//! Database module
//!
//! Everything snowcli sends to Snowflake goes through this module.
//!
//! # Architecture
//!
//! ```text
//! database/
//! └── core/            # Foundation
//!     ├── executor     # SqlExecutor trait and QueryResult rows
//!     ├── connection   # Snowflake SQL API client (feature = "http")
//!     ├── session      # run_as / RoleGuard role scoping
//!     └── identifier   # identifier comparison and literal quoting
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use snowcli::database::{run_as, SqlApiConnection, SqlExecutor};
//!
//! let conn = SqlApiConnection::open(config.connection_settings()?)?;
//! let apps = run_as(&conn, "app_role", || conn.execute("show applications"))?;
//! ```

pub mod core;

pub use self::core::{
    current_role, identifier_matches, name_matches, quote_literal, run_as, use_warehouse,
    QueryResult, Record, RoleGuard, SqlExecutor,
};

#[cfg(feature = "http")]
pub use self::core::{
    parse_use_statement, ConnectionSettings, SessionState, SqlApiConnection, SqlError, TokenType,
    UseStatement,
};
