//! Installing requirements into a staging directory and reading what landed there

use super::requirement::{normalize_name, Requirement};
use super::PackageError;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Installs a requirement and its dependencies into a target directory
pub trait PackageInstaller {
    fn install(&self, requirement: &Requirement, target: &Path, index_url: Option<&str>)
        -> Result<()>;
}

/// `<python> -m pip install -t <target> <requirement>`
#[derive(Debug, Clone)]
pub struct PipInstaller {
    python: String,
}

impl PipInstaller {
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
        }
    }
}

impl Default for PipInstaller {
    fn default() -> Self {
        Self::new("python3")
    }
}

impl PackageInstaller for PipInstaller {
    fn install(
        &self,
        requirement: &Requirement,
        target: &Path,
        index_url: Option<&str>,
    ) -> Result<()> {
        let mut command = Command::new(&self.python);
        command
            .args(["-m", "pip", "install", "-t"])
            .arg(target)
            .arg(requirement.install_spec());
        if let Some(url) = index_url {
            command.args(["--index-url", url]);
        }
        info!("Installing {} with {} -m pip", requirement, self.python);

        let output = command
            .output()
            .with_context(|| format!("Unable to run {}", self.python))?;
        debug!("pip stdout: {}", String::from_utf8_lossy(&output.stdout));
        if !output.status.success() {
            return Err(PackageError::InstallFailed {
                requirement: requirement.to_string(),
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
        Ok(())
    }
}

// =============================================================================
// Installed distributions
// =============================================================================

/// A `*.dist-info` directory inside the staging directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledDistribution {
    pub name: String,
    pub version: String,
    pub dist_info: PathBuf,
    /// Files listed in `RECORD`, relative to the staging directory
    pub files: Vec<PathBuf>,
    /// `Requires-Dist` entries that apply without extras
    pub requires: Vec<Requirement>,
}

impl InstalledDistribution {
    fn read(dist_info: &Path) -> Result<Self> {
        let dir_name = dist_info
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let stem = dir_name.trim_end_matches(".dist-info");
        let (mut name, version) = match stem.rsplit_once('-') {
            Some((n, v)) => (n.to_string(), v.to_string()),
            None => (stem.to_string(), String::new()),
        };

        let mut requires = vec![];
        let metadata = dist_info.join("METADATA");
        if metadata.is_file() {
            let text = std::fs::read_to_string(&metadata)
                .with_context(|| format!("Unable to read {}", metadata.display()))?;
            for line in text.lines() {
                // headers end at the first blank line
                if line.is_empty() {
                    break;
                }
                if let Some(value) = line.strip_prefix("Name:") {
                    name = value.trim().to_string();
                } else if let Some(value) = line.strip_prefix("Requires-Dist:") {
                    let value = value.trim();
                    if value.contains("extra ==") {
                        continue;
                    }
                    match Requirement::parse(value) {
                        Ok(req) => requires.push(req),
                        Err(e) => debug!("skipping Requires-Dist '{}': {}", value, e),
                    }
                }
            }
        }

        let mut files = vec![];
        let record = dist_info.join("RECORD");
        if record.is_file() {
            let text = std::fs::read_to_string(&record)
                .with_context(|| format!("Unable to read {}", record.display()))?;
            files = text.lines().filter_map(record_path).collect();
        }

        Ok(Self {
            name,
            version,
            dist_info: dist_info.to_path_buf(),
            files,
            requires,
        })
    }

    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Delete the distribution's recorded files and its dist-info directory.
    /// Directories left empty are removed as well.
    pub fn remove(&self, root: &Path) -> Result<()> {
        debug!("removing {} {}", self.name, self.version);
        let mut parents = vec![];
        for file in &self.files {
            let path = root.join(file);
            if path.is_file() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Unable to remove {}", path.display()))?;
            }
            if let Some(parent) = path.parent() {
                parents.push(parent.to_path_buf());
            }
        }
        if self.dist_info.exists() {
            std::fs::remove_dir_all(&self.dist_info)?;
        }
        // deepest first so nested empty directories collapse
        parents.sort_by(|a, b| {
            b.components()
                .count()
                .cmp(&a.components().count())
                .then_with(|| a.cmp(b))
        });
        parents.dedup();
        for dir in parents {
            if dir != root && dir.starts_with(root) && is_empty_dir(&dir) {
                std::fs::remove_dir(&dir)?;
            }
        }
        Ok(())
    }
}

fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

/// First CSV field of a RECORD line. Paths escaping the root (scripts in `../bin`) are skipped.
fn record_path(line: &str) -> Option<PathBuf> {
    let field = match line.strip_prefix('"') {
        Some(quoted) => quoted.split('"').next()?,
        None => line.split(',').next()?,
    };
    if field.is_empty() {
        return None;
    }
    let path = PathBuf::from(field);
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return None;
    }
    Some(path)
}

/// Every distribution installed directly under `root`
pub fn installed_distributions(root: &Path) -> Result<Vec<InstalledDistribution>> {
    let mut dists = vec![];
    for entry in std::fs::read_dir(root)
        .with_context(|| format!("Unable to read {}", root.display()))?
    {
        let entry = entry?;
        let is_dist_info = entry.file_name().to_string_lossy().ends_with(".dist-info");
        if is_dist_info && entry.file_type()?.is_dir() {
            dists.push(InstalledDistribution::read(&entry.path())?);
        }
    }
    dists.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(dists)
}

/// Version clauses each dependency is required with, merged over all installed distributions
pub fn declared_requirements(dists: &[InstalledDistribution]) -> HashMap<String, Requirement> {
    let mut merged: HashMap<String, Requirement> = HashMap::new();
    for req in dists.iter().flat_map(|d| d.requires.iter()) {
        merged
            .entry(req.normalized_name())
            .and_modify(|existing| existing.specifiers.extend(req.specifiers.iter().cloned()))
            .or_insert_with(|| req.clone());
    }
    merged
}
