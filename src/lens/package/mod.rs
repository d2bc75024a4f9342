//! Snowpark package lens
//!
//! Resolves a Python requirement against the Snowflake Anaconda channel and,
//! when the channel cannot provide it, builds a zip archive of the requirement
//! plus its non-channel dependencies that can be uploaded to a stage.
//!
//! Installation goes through a [`PackageInstaller`] into a `.packages`
//! staging directory under the working directory; the staging directory is
//! removed once the lookup or archive is done.

mod anaconda;
mod installer;
mod requirement;

pub use anaconda::{AnacondaChannel, ChannelPackage, SplitRequirements, CHANNEL_DATA_URL};
pub use installer::{
    declared_requirements, installed_distributions, InstalledDistribution, PackageInstaller,
    PipInstaller,
};
pub use requirement::{normalize_name, Requirement, Specifier, Version, VersionOp};

use crate::database::SqlExecutor;
use crate::lens::stage::StageLens;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Staging directory for installed packages, relative to the working directory
pub const STAGING_DIR: &str = ".packages";

/// Extensions of compiled libraries that Snowflake cannot load from a stage
pub const NATIVE_LIBRARY_EXTENSIONS: [&str; 4] = ["so", "pyd", "dll", "dylib"];

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageError {
    /// Dependencies ship compiled libraries and they were not explicitly allowed
    NativeLibraryNotAllowed { dependencies: Vec<String> },
    /// The installer exited with an error
    InstallFailed { requirement: String, details: String },
    /// The requirement string could not be parsed
    InvalidRequirement { requirement: String, reason: String },
}

impl fmt::Display for PackageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageError::NativeLibraryNotAllowed { dependencies } => write!(
                f,
                "Following dependencies utilise native libraries, not supported by Conda: [{}]. \
                 You may still try to create your package with --allow-shared-libraries, but it probably won't work. \
                 You may also request adding the package to Snowflake Conda channel at https://support.anaconda.com/",
                dependencies.join(", ")
            ),
            PackageError::InstallFailed {
                requirement,
                details,
            } => write!(f, "Failed to install {}: {}", requirement, details),
            PackageError::InvalidRequirement {
                requirement,
                reason,
            } => write!(f, "Invalid requirement '{}': {}", requirement, reason),
        }
    }
}

impl std::error::Error for PackageError {}

// =============================================================================
// Args
// =============================================================================

/// Arguments for looking a package up in the Anaconda channel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct PackageLookupArgs {
    /// Requirement to look up, e.g. `numpy>=1.20` or `git+https://...`
    pub name: String,

    /// Install the package to find which dependencies the channel provides
    #[cfg_attr(feature = "cli", clap(short = 'y', long))]
    #[serde(default)]
    pub yes: bool,

    /// Python package index to install from
    #[cfg_attr(feature = "cli", clap(long))]
    #[serde(default)]
    pub index_url: Option<String>,
}

/// Whether compiled libraries may end up in the archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum AllowNativeLibraries {
    Yes,
    #[default]
    No,
}

/// Arguments for building a package archive
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct PackageCreateArgs {
    /// Requirement to package
    pub name: String,

    /// Package every dependency, even those the Anaconda channel provides
    #[cfg_attr(feature = "cli", clap(long))]
    #[serde(default)]
    pub ignore_anaconda: bool,

    /// Accept channel packages regardless of their version
    #[cfg_attr(feature = "cli", clap(long))]
    #[serde(default)]
    pub skip_version_check: bool,

    /// Allow dependencies that ship shared libraries
    #[cfg_attr(feature = "cli", clap(long))]
    #[serde(default)]
    pub allow_shared_libraries: bool,

    /// Same as --allow-shared-libraries when set to yes
    #[cfg_attr(feature = "cli", clap(long, value_enum, default_value = "no"))]
    #[serde(default)]
    pub allow_native_libraries: AllowNativeLibraries,

    /// Python package index to install from
    #[cfg_attr(feature = "cli", clap(long))]
    #[serde(default)]
    pub index_url: Option<String>,

    /// Extra files or directories added at the archive root
    #[cfg_attr(feature = "cli", clap(long))]
    #[serde(default)]
    pub include: Vec<PathBuf>,
}

impl PackageCreateArgs {
    pub fn native_libraries_allowed(&self) -> bool {
        self.allow_shared_libraries || self.allow_native_libraries == AllowNativeLibraries::Yes
    }
}

/// Arguments for uploading an archive to a stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct PackageUploadArgs {
    /// Archive to upload
    #[cfg_attr(feature = "cli", clap(short = 'f', long))]
    pub file: PathBuf,

    /// Target stage, created when missing
    #[cfg_attr(feature = "cli", clap(short = 's', long))]
    pub stage: String,

    /// Replace a file with the same name on the stage
    #[cfg_attr(feature = "cli", clap(short = 'o', long))]
    #[serde(default)]
    pub overwrite: bool,
}

// =============================================================================
// Results
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LookupResult {
    InAnaconda {
        requirement: Requirement,
    },
    NotInAnaconda {
        requirement: Requirement,
        /// Dependencies split by channel availability; empty unless installed
        dependencies: SplitRequirements,
    },
    NothingFound {
        requirement: Requirement,
    },
}

impl LookupResult {
    pub fn message(&self) -> String {
        match self {
            LookupResult::InAnaconda { requirement } => format!(
                "Package {} is available on the Snowflake anaconda channel.",
                requirement
            ),
            LookupResult::NotInAnaconda {
                requirement,
                dependencies,
            } if !dependencies.snowflake.is_empty() => format!(
                "The package {} is supported, but does depend on the following Snowflake supported native libraries. \
                 You should include the following in your packages: [{}]",
                requirement,
                requirement_list(&dependencies.snowflake)
            ),
            LookupResult::NotInAnaconda { requirement, .. } => format!(
                "The package {} is not available on the Snowflake anaconda channel. \
                 You can create a package archive with `snowcli snowpark package create {}`",
                requirement, requirement
            ),
            LookupResult::NothingFound { requirement } => format!(
                "Lookup for package {} resulted in some error. Please check the package name and try again",
                requirement
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CreateOutcome {
    AlreadyAvailable {
        requirement: Requirement,
    },
    Created {
        requirement: Requirement,
        archive: PathBuf,
        /// Channel packages the function or procedure must still declare
        anaconda_dependencies: Vec<Requirement>,
    },
}

impl CreateOutcome {
    pub fn message(&self) -> String {
        match self {
            CreateOutcome::AlreadyAvailable { requirement } => format!(
                "Package {} is already available in Snowflake Anaconda Channel.",
                requirement
            ),
            CreateOutcome::Created {
                archive,
                anaconda_dependencies,
                ..
            } => {
                let name = archive
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                let mut msg = format!(
                    "Package {} created. You can now upload it to a stage (`snowcli snowpark package upload -f {} -s packages`) \
                     and reference it in your procedure or function.",
                    name, name
                );
                if !anaconda_dependencies.is_empty() {
                    msg.push_str(&format!(
                        "\nYou should also include the following packages from the Snowflake Anaconda channel: [{}]",
                        requirement_list(anaconda_dependencies)
                    ));
                }
                msg
            }
        }
    }
}

fn requirement_list(reqs: &[Requirement]) -> String {
    reqs.iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Lens
// =============================================================================

/// Installed dependencies other than the requested one, split by channel availability
struct Classified<'d> {
    split: SplitRequirements,
    provided: Vec<&'d InstalledDistribution>,
}

fn classify<'d>(
    dists: &'d [InstalledDistribution],
    requested: &Requirement,
    channel: Option<&AnacondaChannel>,
    skip_version_check: bool,
) -> Classified<'d> {
    let declared = declared_requirements(dists);
    let mut classified = Classified {
        split: SplitRequirements::default(),
        provided: vec![],
    };
    for dist in dists {
        if dist.normalized_name() == requested.normalized_name() {
            continue;
        }
        let requirement = declared
            .get(&dist.normalized_name())
            .cloned()
            .unwrap_or_else(|| Requirement::named(&dist.name));
        match channel {
            Some(channel) if channel.is_available(&requirement, skip_version_check) => {
                classified.split.snowflake.push(requirement);
                classified.provided.push(dist);
            }
            _ => classified.split.other.push(requirement),
        }
    }
    classified
}

fn is_native_library(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    NATIVE_LIBRARY_EXTENSIONS.iter().any(|ext| {
        name.ends_with(&format!(".{}", ext)) || name.contains(&format!(".{}.", ext))
    })
}

fn walk_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir).with_context(|| format!("Unable to read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            if entry.file_name() == "__pycache__" {
                continue;
            }
            walk_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

/// Archive entry name: forward slashes, relative to `root`
fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("{} is not under {}", path.display(), root.display()))?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

/// Top-level entries in `staging` that contain compiled libraries
fn native_library_owners(staging: &Path, files: &[PathBuf]) -> Result<Vec<String>> {
    let mut owners = vec![];
    for file in files.iter().filter(|f| is_native_library(f)) {
        let name = entry_name(staging, file)?;
        let top = name.split('/').next().unwrap_or(&name).to_string();
        if !owners.contains(&top) {
            owners.push(top);
        }
    }
    owners.sort();
    Ok(owners)
}

/// Zip the staging directory (rooted at its top) plus `include` into `archive`
fn write_archive(staging: &Path, files: &[PathBuf], include: &[PathBuf], archive: &Path) -> Result<()> {
    let file = File::create(archive)
        .with_context(|| format!("Unable to create {}", archive.display()))?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    let mut add = |root: &Path, path: &Path| -> Result<()> {
        let name = entry_name(root, path)?;
        debug!("adding {} to archive", name);
        writer.start_file(name, options)?;
        let mut source = File::open(path)?;
        std::io::copy(&mut source, &mut writer)?;
        Ok(())
    };

    for path in files {
        add(staging, path)?;
    }
    for extra in include {
        let root = extra.parent().unwrap_or(Path::new(""));
        if extra.is_dir() {
            let mut extra_files = vec![];
            walk_files(extra, &mut extra_files)?;
            extra_files.sort();
            for path in extra_files {
                add(root, &path)?;
            }
        } else {
            add(root, extra)
                .with_context(|| format!("Unable to include {}", extra.display()))?;
        }
    }
    writer.finish()?;
    Ok(())
}

/// Package lookup and archive creation
pub struct PackageLens<'a> {
    installer: &'a dyn PackageInstaller,
    channel: &'a AnacondaChannel,
    work_dir: PathBuf,
}

impl<'a> PackageLens<'a> {
    pub fn new(installer: &'a dyn PackageInstaller, channel: &'a AnacondaChannel, work_dir: &Path) -> Self {
        Self {
            installer,
            channel,
            work_dir: work_dir.to_path_buf(),
        }
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.work_dir.join(STAGING_DIR)
    }

    fn prepare_staging(&self) -> Result<PathBuf> {
        let staging = self.staging_dir();
        self.cleanup_staging()?;
        std::fs::create_dir_all(&staging)
            .with_context(|| format!("Unable to create {}", staging.display()))?;
        Ok(staging)
    }

    fn cleanup_staging(&self) -> Result<()> {
        let staging = self.staging_dir();
        if staging.exists() {
            std::fs::remove_dir_all(&staging)
                .with_context(|| format!("Unable to remove {}", staging.display()))?;
        }
        Ok(())
    }

    pub fn lookup(&self, args: &PackageLookupArgs) -> Result<LookupResult> {
        let requirement = Requirement::parse(&args.name)?;
        if self.channel.is_available(&requirement, false) {
            return Ok(LookupResult::InAnaconda { requirement });
        }
        if !args.yes {
            return Ok(LookupResult::NotInAnaconda {
                requirement,
                dependencies: SplitRequirements::default(),
            });
        }

        let staging = self.prepare_staging()?;
        if let Err(e) = self
            .installer
            .install(&requirement, &staging, args.index_url.as_deref())
        {
            warn!("installing {} failed: {:#}", requirement, e);
            self.cleanup_staging()?;
            return Ok(LookupResult::NothingFound { requirement });
        }
        let dists = installed_distributions(&staging)?;
        let split = classify(&dists, &requirement, Some(self.channel), false).split;
        self.cleanup_staging()?;
        Ok(LookupResult::NotInAnaconda {
            requirement,
            dependencies: split,
        })
    }

    pub fn create(&self, args: &PackageCreateArgs) -> Result<CreateOutcome> {
        let requirement = Requirement::parse(&args.name)?;
        if !args.ignore_anaconda && self.channel.is_available(&requirement, args.skip_version_check) {
            return Ok(CreateOutcome::AlreadyAvailable { requirement });
        }

        let staging = self.prepare_staging()?;
        let result = self.build_archive(&requirement, args, &staging);
        self.cleanup_staging()?;
        result
    }

    fn build_archive(&self, requirement: &Requirement, args: &PackageCreateArgs, staging: &Path) -> Result<CreateOutcome> {
        self.installer
            .install(requirement, staging, args.index_url.as_deref())?;
        let dists = installed_distributions(staging)?;

        let channel = (!args.ignore_anaconda).then_some(self.channel);
        let classified = classify(&dists, requirement, channel, args.skip_version_check);
        for dist in &classified.provided {
            info!("{} is provided by the Anaconda channel, leaving it out", dist.name);
            dist.remove(staging)?;
        }

        let mut files = vec![];
        walk_files(staging, &mut files)?;
        files.sort();

        let native = native_library_owners(staging, &files)?;
        if !native.is_empty() {
            if !args.native_libraries_allowed() {
                return Err(PackageError::NativeLibraryNotAllowed {
                    dependencies: native,
                }
                .into());
            }
            warn!("packaging native libraries from {}", native.join(", "));
        }

        let archive = self.work_dir.join(requirement.zip_file_name());
        write_archive(staging, &files, &args.include, &archive)?;
        info!("Created {}", archive.display());

        Ok(CreateOutcome::Created {
            requirement: requirement.clone(),
            archive,
            anaconda_dependencies: classified.split.snowflake,
        })
    }
}

/// Create the stage if needed and upload the archive into its root
pub fn upload(executor: &dyn SqlExecutor, args: &PackageUploadArgs) -> Result<()> {
    let stage = args.stage.trim_start_matches('@');
    let lens = StageLens::new(executor);
    lens.create(stage)?;
    lens.put(&args.file, &format!("{}/", stage), args.overwrite)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::installer::tests::FakeInstaller;
    use super::*;
    use crate::database::core::scripted::ScriptedExecutor;
    use std::collections::BTreeSet;
    use std::io::Read;

    fn channel() -> AnacondaChannel {
        AnacondaChannel::from_packages([
            ("snowflake-connector-python", "3.0.4"),
            ("matplotlib", "3.7.1"),
            ("numpy", "1.24.3"),
        ])
    }

    fn zip_names(path: &Path) -> BTreeSet<String> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    fn july_installer() -> FakeInstaller {
        FakeInstaller::new()
            .with_dist("july", "0.1.3", &["matplotlib", "numpy"], &["july/__init__.py", "july/plot.py"])
            .with_dist("matplotlib", "3.7.1", &["numpy>=1.21"], &["matplotlib/__init__.py"])
            .with_dist("numpy", "1.24.3", &[], &["numpy/__init__.py"])
    }

    #[test]
    fn test_lookup_in_anaconda() {
        let dir = tempfile::tempdir().unwrap();
        let installer = FakeInstaller::new();
        let channel = channel();
        let lens = PackageLens::new(&installer, &channel, dir.path());
        let args = PackageLookupArgs {
            name: "snowflake-connector-python".to_string(),
            yes: true,
            index_url: None,
        };
        let result = lens.lookup(&args).unwrap();
        assert!(matches!(result, LookupResult::InAnaconda { .. }));
        assert_eq!(
            result.message(),
            "Package snowflake-connector-python is available on the Snowflake anaconda channel."
        );
        assert!(installer.installed.borrow().is_empty());
    }

    #[test]
    fn test_lookup_nothing_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut installer = FakeInstaller::new();
        installer.fail = true;
        let channel = channel();
        let lens = PackageLens::new(&installer, &channel, dir.path());
        let args = PackageLookupArgs {
            name: "some-weird-package-we-dont-know".to_string(),
            yes: true,
            index_url: None,
        };
        let result = lens.lookup(&args).unwrap();
        assert!(result
            .message()
            .contains("Lookup for package some-weird-package-we-dont-know resulted in some error."));
        assert!(!lens.staging_dir().exists());
    }

    #[test]
    fn test_lookup_without_install() {
        let dir = tempfile::tempdir().unwrap();
        let installer = july_installer();
        let channel = channel();
        let lens = PackageLens::new(&installer, &channel, dir.path());
        let args = PackageLookupArgs {
            name: "july".to_string(),
            yes: false,
            index_url: None,
        };
        let result = lens.lookup(&args).unwrap();
        assert_eq!(
            result,
            LookupResult::NotInAnaconda {
                requirement: Requirement::named("july"),
                dependencies: SplitRequirements::default(),
            }
        );
        assert!(installer.installed.borrow().is_empty());
    }

    #[test]
    fn test_lookup_with_install() {
        let dir = tempfile::tempdir().unwrap();
        let installer = july_installer();
        let channel = channel();
        let lens = PackageLens::new(&installer, &channel, dir.path());
        let args = PackageLookupArgs {
            name: "july".to_string(),
            yes: true,
            index_url: None,
        };
        let result = lens.lookup(&args).unwrap();
        let LookupResult::NotInAnaconda { dependencies, .. } = &result else {
            panic!("unexpected {:?}", result);
        };
        let names: Vec<_> = dependencies.snowflake.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["matplotlib", "numpy"]);
        assert!(dependencies.other.is_empty());
        assert!(result.message().contains("include the following in your packages: [matplotlib, numpy"));
        assert!(!lens.staging_dir().exists());
    }

    #[test]
    fn test_create_already_available() {
        let dir = tempfile::tempdir().unwrap();
        let installer = FakeInstaller::new();
        let channel = channel();
        let lens = PackageLens::new(&installer, &channel, dir.path());
        let args = PackageCreateArgs {
            name: "matplotlib".to_string(),
            ..Default::default()
        };
        let outcome = lens.create(&args).unwrap();
        assert_eq!(
            outcome.message(),
            "Package matplotlib is already available in Snowflake Anaconda Channel."
        );
        assert!(!dir.path().join("matplotlib.zip").exists());
    }

    #[test]
    fn test_create_leaves_out_anaconda_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let installer = july_installer();
        let channel = channel();
        let lens = PackageLens::new(&installer, &channel, dir.path());
        let args = PackageCreateArgs {
            name: "july".to_string(),
            ..Default::default()
        };
        let outcome = lens.create(&args).unwrap();
        let archive = dir.path().join("july.zip");
        assert!(archive.is_file());
        assert!(outcome.message().starts_with("Package july.zip created. You can now upload it to a stage"));
        assert!(outcome.message().contains("[matplotlib, numpy"));

        let names = zip_names(&archive);
        assert!(names.contains("july/__init__.py"));
        assert!(names.contains("july/plot.py"));
        assert!(names.contains("july-0.1.3.dist-info/RECORD"));
        assert!(!names.iter().any(|n| n.contains("matplotlib")));
        assert!(!names.iter().any(|n| n.starts_with(".packages")));
        assert!(!lens.staging_dir().exists());
    }

    #[test]
    fn test_create_ignore_anaconda() {
        let dir = tempfile::tempdir().unwrap();
        let installer = july_installer();
        let channel = channel();
        let lens = PackageLens::new(&installer, &channel, dir.path());
        let args = PackageCreateArgs {
            name: "july".to_string(),
            ignore_anaconda: true,
            ..Default::default()
        };
        let outcome = lens.create(&args).unwrap();
        let CreateOutcome::Created { anaconda_dependencies, archive, .. } = outcome else {
            panic!("archive expected");
        };
        assert!(anaconda_dependencies.is_empty());
        let names = zip_names(&archive);
        assert!(names.contains("matplotlib/__init__.py"));
        assert!(names.contains("numpy/__init__.py"));
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_create_args_are_non_interactive() {
        use clap::Parser;

        #[derive(Parser)]
        struct Create {
            #[clap(flatten)]
            args: PackageCreateArgs,
        }

        let cmd = Create::try_parse_from(["create", "july", "--ignore-anaconda"]).unwrap();
        assert_eq!(cmd.args.name, "july");
        assert!(cmd.args.ignore_anaconda);
        assert!(Create::try_parse_from(["create", "july", "--yes"]).is_err());

        let dir = tempfile::tempdir().unwrap();
        let installer = july_installer();
        let channel = AnacondaChannel::default();
        let lens = PackageLens::new(&installer, &channel, dir.path());
        lens.create(&cmd.args).unwrap();
        assert!(dir.path().join("july.zip").is_file());
    }

    #[test]
    fn test_create_native_library_gate() {
        let dir = tempfile::tempdir().unwrap();
        let installer = FakeInstaller::new()
            .with_dist("dummy-pkg", "1.0", &["fastlib"], &["dummy_pkg/shrubbery.py"])
            .with_dist("fastlib", "2.0", &[], &["fastlib/__init__.py", "fastlib/_core.cpython-310-x86_64-linux-gnu.so"]);
        let channel = channel();
        let lens = PackageLens::new(&installer, &channel, dir.path());

        let args = PackageCreateArgs {
            name: "dummy-pkg".to_string(),
            ..Default::default()
        };
        let err = lens.create(&args).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PackageError>(),
            Some(&PackageError::NativeLibraryNotAllowed {
                dependencies: vec!["fastlib".to_string()]
            })
        );
        assert!(err.to_string().contains("https://support.anaconda.com/"));
        assert!(!dir.path().join("dummy_pkg.zip").exists());
        assert!(!lens.staging_dir().exists());

        let args = PackageCreateArgs {
            name: "dummy-pkg".to_string(),
            allow_native_libraries: AllowNativeLibraries::Yes,
            ..Default::default()
        };
        lens.create(&args).unwrap();
        let names = zip_names(&dir.path().join("dummy_pkg.zip"));
        assert!(names.contains("dummy_pkg/shrubbery.py"));
        assert!(names.contains("fastlib/_core.cpython-310-x86_64-linux-gnu.so"));
    }

    #[test]
    fn test_create_with_include() {
        let dir = tempfile::tempdir().unwrap();
        let extra = dir.path().join("extra");
        std::fs::create_dir_all(extra.join("conf")).unwrap();
        std::fs::write(extra.join("conf/settings.toml"), "a = 1").unwrap();
        std::fs::write(dir.path().join("LICENSE"), "MIT").unwrap();

        let installer = FakeInstaller::new().with_dist("july", "0.1.3", &[], &["july/__init__.py"]);
        let channel = channel();
        let lens = PackageLens::new(&installer, &channel, dir.path());
        let args = PackageCreateArgs {
            name: "july".to_string(),
            include: vec![dir.path().join("LICENSE"), extra.join("conf")],
            ..Default::default()
        };
        lens.create(&args).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(dir.path().join("july.zip")).unwrap()).unwrap();
        let mut license = String::new();
        archive.by_name("LICENSE").unwrap().read_to_string(&mut license).unwrap();
        assert_eq!(license, "MIT");
        assert!(archive.by_name("conf/settings.toml").is_ok());
    }

    #[test]
    fn test_create_install_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut installer = FakeInstaller::new();
        installer.fail = true;
        let channel = channel();
        let lens = PackageLens::new(&installer, &channel, dir.path());
        let args = PackageCreateArgs {
            name: "july".to_string(),
            ..Default::default()
        };
        let err = lens.create(&args).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PackageError>(),
            Some(PackageError::InstallFailed { .. })
        ));
        assert!(!lens.staging_dir().exists());
    }

    #[test]
    fn test_upload() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("july.zip");
        std::fs::write(&file, "zip").unwrap();
        let exec = ScriptedExecutor::new();
        let args = PackageUploadArgs {
            file: file.clone(),
            stage: "stageName".to_string(),
            overwrite: false,
        };
        upload(&exec, &args).unwrap();

        let abs = std::fs::canonicalize(&file).unwrap();
        assert_eq!(
            exec.calls(),
            vec![
                "create stage if not exists stageName".to_string(),
                format!(
                    "put file://{} @stageName/ auto_compress=false parallel=4 overwrite=false",
                    abs.display()
                ),
            ]
        );
    }

    #[test]
    fn test_native_library_detection() {
        assert!(is_native_library(Path::new("a/_core.so")));
        assert!(is_native_library(Path::new("libs/libgfortran.so.5")));
        assert!(is_native_library(Path::new("x.PYD")));
        assert!(!is_native_library(Path::new("a/solver.py")));
    }
}
