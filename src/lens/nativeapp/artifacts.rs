//! Copy project artifacts into the deploy root

use super::project::Artifact;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// `*` matches any run of characters, `?` exactly one
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    fn matches(p: &[char], n: &[char]) -> bool {
        match (p.first(), n.first()) {
            (None, None) => true,
            (Some('*'), _) => matches(&p[1..], n) || (!n.is_empty() && matches(p, &n[1..])),
            (Some('?'), Some(_)) => matches(&p[1..], &n[1..]),
            (Some(a), Some(b)) if a == b => matches(&p[1..], &n[1..]),
            _ => false,
        }
    }
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    matches(&p, &n)
}

fn copy_dir(src: &Path, dest: &Path, copied: &mut Vec<PathBuf>) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target, copied)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
            copied.push(target);
        }
    }
    Ok(())
}

fn copy_path(src: &Path, dest: &Path, copied: &mut Vec<PathBuf>) -> Result<()> {
    debug!("copying {} -> {}", src.display(), dest.display());
    if src.is_dir() {
        copy_dir(src, dest, copied)
    } else {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(src, dest)
            .with_context(|| format!("Unable to copy {}", src.display()))?;
        copied.push(dest.to_path_buf());
        Ok(())
    }
}

fn expand(project_root: &Path, src: &str) -> Result<Vec<PathBuf>> {
    let (dir, file_pattern) = match src.rsplit_once('/') {
        Some((dir, pattern)) => (project_root.join(dir), pattern),
        None => (project_root.to_path_buf(), src),
    };

    if !file_pattern.contains('*') && !file_pattern.contains('?') {
        let path = project_root.join(src);
        if !path.exists() {
            return Err(anyhow!("Artifact {} does not exist", src));
        }
        return Ok(vec![path]);
    }

    let mut matched: Vec<PathBuf> = std::fs::read_dir(&dir)
        .with_context(|| format!("Unable to read {}", dir.display()))?
        .filter_map(|e| e.ok())
        .filter(|e| wildcard_match(file_pattern, &e.file_name().to_string_lossy()))
        .map(|e| e.path())
        .collect();
    if matched.is_empty() {
        return Err(anyhow!("Artifact pattern {} matched no files", src));
    }
    matched.sort();
    Ok(matched)
}

/// Recreate `deploy_root` and copy every artifact into it.
///
/// `dest` ending in `/` (or a wildcard `src`) is a directory that receives the
/// matched entries by name; otherwise `dest` is the target path. Without a
/// `dest` the artifact keeps its project-relative path.
pub fn bundle(project_root: &Path, deploy_root: &Path, artifacts: &[Artifact]) -> Result<Vec<PathBuf>> {
    if deploy_root == project_root || !deploy_root.starts_with(project_root) {
        return Err(anyhow!(
            "Deploy root {} must be a directory inside the project",
            deploy_root.display()
        ));
    }
    if deploy_root.exists() {
        std::fs::remove_dir_all(deploy_root)
            .with_context(|| format!("Unable to clean {}", deploy_root.display()))?;
    }
    std::fs::create_dir_all(deploy_root)?;

    let mut copied = Vec::new();
    for artifact in artifacts {
        let src = artifact.src().trim_end_matches('/');
        let sources = expand(project_root, src)?;
        let is_pattern = sources.len() > 1 || src.contains('*') || src.contains('?');

        for source in sources {
            let file_name = source
                .file_name()
                .ok_or_else(|| anyhow!("Invalid artifact path {}", source.display()))?;
            let target = match artifact.dest() {
                Some(dest) if dest.ends_with('/') || is_pattern => {
                    deploy_root.join(dest.trim_end_matches('/')).join(file_name)
                }
                Some(dest) => deploy_root.join(dest),
                None if is_pattern => {
                    let parent = src.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
                    deploy_root.join(parent).join(file_name)
                }
                None => deploy_root.join(src),
            };
            copy_path(&source, &target, &mut copied)?;
        }
    }
    Ok(copied)
}
