//! Stage lens
//!
//! Listing, creating, uploading to and pruning internal stages, plus the
//! local-tree/stage diff used by native application deploys.

mod diff;

pub use diff::{
    file_md5, list_local_files, stage_diff, stage_dir_for, stage_files,
    sync_local_diff_with_stage, DiffResult,
};

use crate::database::{QueryResult, SqlExecutor};
use anyhow::Result;
use std::path::Path;
use tracing::info;

/// `put` statement uploading one local file into a stage directory
pub fn put_statement(local: &Path, stage_dir: &str, overwrite: bool) -> String {
    format!(
        "put file://{} @{} auto_compress=false parallel=4 overwrite={}",
        local.display(),
        stage_dir,
        overwrite
    )
}

/// Stage operations
pub struct StageLens<'a> {
    executor: &'a dyn SqlExecutor,
}

impl<'a> StageLens<'a> {
    pub fn new(executor: &'a dyn SqlExecutor) -> Self {
        Self { executor }
    }

    /// List files on a stage (or a path within it)
    pub fn list_files(&self, stage_path: &str) -> Result<QueryResult> {
        self.executor
            .execute(&format!("ls @{}", stage_path.trim_start_matches('@')))
    }

    /// Create a stage unless it already exists
    pub fn create(&self, stage: &str) -> Result<QueryResult> {
        info!("Creating stage {} if it does not exist", stage);
        self.executor
            .execute(&format!("create stage if not exists {}", stage))
    }

    /// Upload one local file into `stage_dir`
    pub fn put(&self, local: &Path, stage_dir: &str, overwrite: bool) -> Result<QueryResult> {
        let local = std::fs::canonicalize(local)?;
        info!("Uploading {} to @{}", local.display(), stage_dir);
        self.executor
            .execute(&put_statement(&local, stage_dir, overwrite))
    }

    /// Remove a file (or prefix) from a stage
    pub fn remove(&self, stage: &str, path: &str) -> Result<QueryResult> {
        self.executor
            .execute(&format!("remove @{}/{}", stage, path))
    }

    /// Copy files between stages (git repository paths included)
    pub fn copy(&self, source: &str, destination: &str) -> Result<QueryResult> {
        self.executor.execute(&format!(
            "copy files into @{} from @{}",
            destination.trim_start_matches('@'),
            source.trim_start_matches('@')
        ))
    }

    pub fn diff(&self, local_root: &Path, stage: &str) -> Result<DiffResult> {
        stage_diff(self.executor, local_root, stage)
    }

    pub fn sync(&self, local_root: &Path, diff: &DiffResult, stage: &str) -> Result<()> {
        sync_local_diff_with_stage(self.executor, local_root, diff, stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::scripted::ScriptedExecutor;

    #[test]
    fn test_stage_statements() {
        let exec = ScriptedExecutor::new();
        let lens = StageLens::new(&exec);
        lens.list_files("@my_stage/dir").unwrap();
        lens.create("db.s.my_stage").unwrap();
        lens.remove("my_stage", "a.py").unwrap();
        lens.copy("@repo/branches/main/", "dest").unwrap();

        assert_eq!(
            exec.calls(),
            vec![
                "ls @my_stage/dir",
                "create stage if not exists db.s.my_stage",
                "remove @my_stage/a.py",
                "copy files into @dest from @repo/branches/main/",
            ]
        );
    }

    #[test]
    fn test_put_statement() {
        assert_eq!(
            put_statement(Path::new("/tmp/pkg.zip"), "stageName/", false),
            "put file:///tmp/pkg.zip @stageName/ auto_compress=false parallel=4 overwrite=false"
        );
    }
}
