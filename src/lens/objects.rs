//! Managed object ownership checks
//!
//! Objects created by snowcli carry [`SPECIAL_COMMENT`] in their comment field.
//! Before anything is dropped, the object is looked up fresh under the role
//! expected to own it and the drop only goes ahead when exactly one object
//! with that name is visible, its owner is that role and it carries the
//! marker.
//!
//! The comment is free text, so another session can change it between the
//! check and the drop. That window is accepted.

use crate::database::{name_matches, quote_literal, run_as, QueryResult, SqlExecutor};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Marker comment stamped on every object snowcli creates
pub const SPECIAL_COMMENT: &str = "GENERATED_BY_SNOWCLI";

/// Version reported by applications created from loose files on a stage
pub const LOOSE_FILES_MAGIC_VERSION: &str = "UNVERSIONED";

/// Kinds of objects snowcli manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    Application,
    ApplicationPackage,
    Repository,
    Stage,
}

impl ObjectKind {
    /// `show ... like` prefix; the quoted name is appended
    pub fn show_query(&self) -> &'static str {
        match self {
            ObjectKind::Application => "show applications like",
            ObjectKind::ApplicationPackage => "show application packages like",
            ObjectKind::Repository => "show git repositories like",
            ObjectKind::Stage => "show stages like",
        }
    }

    /// `drop ...` prefix; the name is appended
    pub fn drop_query(&self) -> &'static str {
        match self {
            ObjectKind::Application => "drop application",
            ObjectKind::ApplicationPackage => "drop application package",
            ObjectKind::Repository => "drop git repository",
            ObjectKind::Stage => "drop stage",
        }
    }

    /// Lower-case name used in messages
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::Application => "application",
            ObjectKind::ApplicationPackage => "application package",
            ObjectKind::Repository => "git repository",
            ObjectKind::Stage => "stage",
        }
    }

    /// Capitalized name used at the start of messages
    pub fn title(&self) -> &'static str {
        match self {
            ObjectKind::Application => "Application",
            ObjectKind::ApplicationPackage => "Application Package",
            ObjectKind::Repository => "Git Repository",
            ObjectKind::Stage => "Stage",
        }
    }

    pub fn show_statement(&self, name: &str) -> String {
        format!("{} '{}'", self.show_query(), quote_literal(name))
    }

    pub fn drop_statement(&self, name: &str) -> String {
        format!("{} {}", self.drop_query(), name)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Reasons a managed object may not be dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectError {
    /// The owner role sees no object of this kind with this name
    ObjectNotFound {
        kind: ObjectKind,
        name: String,
        role: String,
    },
    /// More than one object matched the name exactly
    AmbiguousObject {
        kind: ObjectKind,
        name: String,
        count: usize,
    },
    /// The object exists but does not carry the snowcli marker
    ProvenanceMismatch { kind: ObjectKind, name: String },
    /// The object is visible to the role but owned by another one
    UnexpectedOwner {
        kind: ObjectKind,
        name: String,
        owner: String,
        role: String,
    },
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectError::ObjectNotFound { kind, name, role } => write!(
                f,
                "Role {} does not own any {} with the name {}!",
                role, kind, name
            ),
            ObjectError::AmbiguousObject { kind, name, count } => write!(
                f,
                "Found {} objects of type {} named {}. Refusing to choose one.",
                count, kind, name
            ),
            ObjectError::ProvenanceMismatch { kind, name } => write!(
                f,
                "{} {} was not created by snowcli. Cannot drop the {}.",
                kind.title(),
                name,
                kind
            ),
            ObjectError::UnexpectedOwner {
                kind,
                name,
                owner,
                role,
            } => write!(
                f,
                "{} {} is owned by role {}, not {}. Cannot drop the {}.",
                kind.title(),
                name,
                owner,
                role,
                kind
            ),
        }
    }
}

impl std::error::Error for ObjectError {}

/// Snapshot of one `show ... like` row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObjectDescriptor {
    pub name: Option<String>,
    pub owner: Option<String>,
    pub comment: Option<String>,
    pub version: Option<String>,
}

impl ObjectDescriptor {
    pub fn has_marker_comment(&self) -> bool {
        self.comment.as_deref() == Some(SPECIAL_COMMENT)
    }

    pub fn is_owned_by(&self, role: &str) -> bool {
        self.owner
            .as_deref()
            .is_some_and(|owner| name_matches(owner, role))
    }

    pub fn is_loose_files_version(&self) -> bool {
        self.version.as_deref() == Some(LOOSE_FILES_MAGIC_VERSION)
    }
}

/// Rows of a `show ... like '<name>'` result that name exactly `name`.
///
/// LIKE treats `_` and `%` as wildcards, so a pattern can also hit
/// neighbouring objects; those are discarded. Rows without a `name` column
/// are kept.
pub fn exact_matches(result: &QueryResult, name: &str) -> Vec<ObjectDescriptor> {
    result
        .records()
        .filter(|r| match r.get("name") {
            Some(row_name) => name_matches(row_name, name),
            None => !r.has_column("name"),
        })
        .map(|r| ObjectDescriptor {
            name: r.get("name").map(|s| s.to_string()),
            owner: r.get("owner").map(|s| s.to_string()),
            comment: r.get("comment").map(|s| s.to_string()),
            version: r.get("version").map(|s| s.to_string()),
        })
        .collect()
}

/// Look up a single object by exact name with the active role.
///
/// Returns `None` when nothing matches and an [`ObjectError::AmbiguousObject`]
/// error when more than one row does.
pub fn find_object(
    executor: &dyn SqlExecutor,
    kind: ObjectKind,
    name: &str,
) -> Result<Option<ObjectDescriptor>> {
    let result = executor.execute(&kind.show_statement(name))?;
    let mut matches = exact_matches(&result, name);
    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.pop()),
        count => Err(ObjectError::AmbiguousObject {
            kind,
            name: name.to_string(),
            count,
        }
        .into()),
    }
}

/// Drop `name` after confirming `owner_role` owns it and snowcli created it.
///
/// Runs entirely under `owner_role`. The show query lists every object the
/// role has privileges on, so the `owner` column is checked as well. Rows
/// without an `owner` column are accepted on visibility alone.
pub fn verify_and_drop(
    executor: &dyn SqlExecutor,
    name: &str,
    owner_role: &str,
    kind: ObjectKind,
) -> Result<()> {
    run_as(executor, owner_role, || {
        let object = find_object(executor, kind, name)?.ok_or_else(|| {
            ObjectError::ObjectNotFound {
                kind,
                name: name.to_string(),
                role: owner_role.to_string(),
            }
        })?;

        if !object.has_marker_comment() {
            return Err(ObjectError::ProvenanceMismatch {
                kind,
                name: name.to_string(),
            }
            .into());
        }

        if let Some(owner) = object.owner.as_deref() {
            if !object.is_owned_by(owner_role) {
                return Err(ObjectError::UnexpectedOwner {
                    kind,
                    name: name.to_string(),
                    owner: owner.to_string(),
                    role: owner_role.to_string(),
                }
                .into());
            }
        }

        info!("Dropping {} {}", kind, name);
        executor.execute(&kind.drop_statement(name))?;
        Ok(())
    })
}
