//! Core database infrastructure
//!
//! This module provides the foundational components every manager builds on:
//! - `SqlExecutor` / `QueryResult`: the statement-in, rows-out seam
//! - `SqlApiConnection`: blocking Snowflake SQL API client (requires `http`)
//! - `run_as` / `RoleGuard`: role-scoped execution with guaranteed restore
//! - identifier helpers for comparing Snowflake object names

#[cfg(feature = "http")]
mod connection;
mod executor;
mod identifier;
#[cfg(test)]
pub(crate) mod scripted;
mod session;

#[cfg(feature = "http")]
pub use connection::{
    parse_use_statement, ConnectionSettings, SessionState, SqlApiConnection, SqlError, TokenType,
    UseStatement,
};
pub use executor::{QueryResult, Record, SqlExecutor};
pub use identifier::{identifier_matches, name_matches, quote_literal};
pub use session::{current_role, run_as, use_warehouse, RoleGuard};
