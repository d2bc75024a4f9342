//! Git repository lens
//!
//! Thin wrapper over Snowflake's `git repository` objects. A repository behaves
//! like a read-only stage, so file listing and copying go through
//! [`StageLens`](crate::lens::stage::StageLens).

use crate::database::{quote_literal, QueryResult, SqlExecutor};
use crate::lens::stage::StageLens;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Default pattern for branch and tag listings (matches everything)
pub const DEFAULT_LIKE_PATTERN: &str = "%%";

// =============================================================================
// Args
// =============================================================================

/// Arguments for creating a git repository object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct GitCreateArgs {
    /// Identifier of the repository object
    pub repository_name: String,

    /// API integration allowing access to the remote
    #[cfg_attr(feature = "cli", clap(long))]
    pub api_integration: String,

    /// Origin URL of the remote repository
    #[cfg_attr(feature = "cli", clap(long))]
    pub url: String,

    /// Secret holding credentials for private repositories
    #[cfg_attr(feature = "cli", clap(long))]
    #[serde(default)]
    pub secret: Option<String>,
}

/// Arguments for branch and tag listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct GitListArgs {
    /// Identifier of the repository object
    pub repository_name: String,

    /// SQL LIKE pattern used to filter names
    #[cfg_attr(feature = "cli", clap(short, long, default_value = DEFAULT_LIKE_PATTERN))]
    #[serde(default = "default_like")]
    pub like: String,
}

fn default_like() -> String {
    DEFAULT_LIKE_PATTERN.to_string()
}

// =============================================================================
// Lens
// =============================================================================

/// Git repository operations
pub struct GitLens<'a> {
    executor: &'a dyn SqlExecutor,
}

impl<'a> GitLens<'a> {
    pub fn new(executor: &'a dyn SqlExecutor) -> Self {
        Self { executor }
    }

    pub fn show_branches(&self, repo_name: &str, like: &str) -> Result<QueryResult> {
        self.executor.execute(&format!(
            "show git branches like '{}' in {}",
            quote_literal(like),
            repo_name
        ))
    }

    pub fn show_tags(&self, repo_name: &str, like: &str) -> Result<QueryResult> {
        self.executor.execute(&format!(
            "show git tags like '{}' in {}",
            quote_literal(like),
            repo_name
        ))
    }

    /// Pull the latest state of the remote into the repository object
    pub fn fetch(&self, repo_name: &str) -> Result<QueryResult> {
        info!("Fetching git repository {}", repo_name);
        self.executor
            .execute(&format!("alter git repository {} fetch", repo_name))
    }

    pub fn create(&self, args: &GitCreateArgs) -> Result<QueryResult> {
        info!("Creating git repository {}", args.repository_name);
        self.executor.execute(&create_statement(args))
    }

    /// List files under `repo/branches/<name>/...` or `repo/tags/<name>/...`
    pub fn list_files(&self, path: &str) -> Result<QueryResult> {
        StageLens::new(self.executor).list_files(path)
    }

    /// Copy files from a repository path to a stage
    pub fn copy(&self, repo_path: &str, destination: &str) -> Result<QueryResult> {
        StageLens::new(self.executor).copy(repo_path, destination)
    }
}

/// `create git repository` statement; one clause per line
pub fn create_statement(args: &GitCreateArgs) -> String {
    let mut query = format!(
        "create git repository {}\napi_integration = {}\norigin = '{}'\n",
        args.repository_name,
        args.api_integration,
        quote_literal(&args.url)
    );
    if let Some(secret) = &args.secret {
        query.push_str(&format!("git_credentials = {}\n", secret));
    }
    query
}

/// Stage part of a path inside a repository:
/// `repo/branches/main/foo/bar` -> `repo/branches/main/`
pub fn get_stage_name_from_path(path: &str) -> String {
    let parts: Vec<String> = Path::new(path.trim_start_matches('@'))
        .components()
        .take(3)
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    format!("{}/", parts.join("/"))
}
