//! Local directory vs stage comparison

use crate::database::{QueryResult, SqlExecutor};
use anyhow::{anyhow, Context, Result};
use md5::{Digest, Md5};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Outcome of comparing a local tree with a stage
///
/// All paths are relative to the stage root and use `/` separators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub identical: Vec<String>,
    pub different: Vec<String>,
    pub only_local: Vec<String>,
    pub only_on_stage: Vec<String>,
}

impl DiffResult {
    pub fn has_changes(&self) -> bool {
        !(self.different.is_empty() && self.only_local.is_empty() && self.only_on_stage.is_empty())
    }

    /// Paths that have to be uploaded
    pub fn to_upload(&self) -> impl Iterator<Item = &String> {
        self.different.iter().chain(self.only_local.iter())
    }
}

/// Recursively list regular files under `root` as `/`-separated relative paths
pub fn list_local_files(root: &Path) -> Result<Vec<String>> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<String>) -> Result<()> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Unable to read directory {}", dir.display()))?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                walk(&path, root, out)?;
            } else if file_type.is_file() {
                out.push(relative_path(&path, root)?);
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    if root.exists() {
        walk(root, root, &mut files)?;
    }
    files.sort();
    Ok(files)
}

pub(crate) fn relative_path(path: &Path, root: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| anyhow!("{} is not under {}", path.display(), root.display()))?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    Ok(parts.join("/"))
}

/// Hex md5 of a local file
pub fn file_md5(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Unable to read {}", path.display()))?;
    let mut hasher = Md5::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Map of stage-relative path to md5 from a `list @stage` result.
///
/// Row names start with the (lower-cased) stage name, e.g.
/// `stage/ui/app.py`; that first component is dropped.
pub fn stage_files(result: &QueryResult) -> BTreeMap<String, Option<String>> {
    result
        .records()
        .filter_map(|r| {
            let name = r.get("name")?;
            let path = match name.split_once('/') {
                Some((_, rest)) => rest,
                None => name,
            };
            if path.is_empty() {
                return None;
            }
            Some((path.to_string(), r.get("md5").map(|s| s.to_string())))
        })
        .collect()
}

/// Compare the files under `local_root` with those on `stage`
pub fn stage_diff(
    executor: &dyn SqlExecutor,
    local_root: &Path,
    stage: &str,
) -> Result<DiffResult> {
    let listed = executor.execute(&format!("list @{}", stage))?;
    let mut remote = stage_files(&listed);
    let mut diff = DiffResult::default();

    for path in list_local_files(local_root)? {
        let local_path: PathBuf = local_root.join(&path);
        match remote.remove(&path) {
            Some(remote_md5) => {
                let local_md5 = file_md5(&local_path)?;
                if remote_md5.as_deref() == Some(local_md5.as_str()) {
                    diff.identical.push(path);
                } else {
                    diff.different.push(path);
                }
            }
            None => diff.only_local.push(path),
        }
    }
    diff.only_on_stage = remote.into_keys().collect();
    Ok(diff)
}

/// Stage directory that a relative file path is uploaded into
pub fn stage_dir_for(stage: &str, path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, _)) => format!("{}/{}", stage, dir),
        None => stage.to_string(),
    }
}

/// Apply `diff` to `stage`: remove stale files, upload new and changed ones
pub fn sync_local_diff_with_stage(
    executor: &dyn SqlExecutor,
    local_root: &Path,
    diff: &DiffResult,
    stage: &str,
) -> Result<()> {
    for path in &diff.only_on_stage {
        executor.execute(&format!("remove @{}/{}", stage, path))?;
    }
    for path in diff.to_upload() {
        let local = local_root.join(path);
        let local = std::fs::canonicalize(&local)
            .with_context(|| format!("Unable to resolve {}", local.display()))?;
        executor.execute(&super::put_statement(
            &local,
            &stage_dir_for(stage, path),
            true,
        ))?;
    }
    Ok(())
}
