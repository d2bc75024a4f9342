//! Native application project definition (`snowflake.yml`)

use super::NativeAppError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const PROJECT_DEFINITION_FILE: &str = "snowflake.yml";
pub const DEFAULT_SOURCE_STAGE: &str = "app_src.stage";
pub const DEFAULT_DEPLOY_ROOT: &str = "output/deploy";
/// Role used when neither the project nor the connection names one
pub const DEFAULT_ROLE: &str = "accountadmin";

// =============================================================================
// File format
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectDefinitionFile {
    #[serde(default = "default_definition_version")]
    pub definition_version: u32,
    pub native_app: NativeAppDefinition,
}

fn default_definition_version() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct NativeAppDefinition {
    pub name: String,
    #[serde(default)]
    pub source_stage: Option<String>,
    #[serde(default)]
    pub deploy_root: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub package: Option<PackageDefinition>,
    #[serde(default)]
    pub application: Option<ApplicationDefinition>,
}

/// One entry of `artifacts`: either a bare path or a `src`/`dest` mapping
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Artifact {
    Path(String),
    Mapping {
        src: String,
        #[serde(default)]
        dest: Option<String>,
    },
}

impl Artifact {
    pub fn src(&self) -> &str {
        match self {
            Artifact::Path(p) => p,
            Artifact::Mapping { src, .. } => src,
        }
    }

    pub fn dest(&self) -> Option<&str> {
        match self {
            Artifact::Path(_) => None,
            Artifact::Mapping { dest, .. } => dest.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub scripts: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub warehouse: Option<String>,
    #[serde(default)]
    pub debug: Option<bool>,
}

// =============================================================================
// Resolved project
// =============================================================================

/// Connection-level values that fill gaps in the project definition
#[derive(Debug, Clone, Default)]
pub struct ProjectDefaults {
    pub role: Option<String>,
    pub warehouse: Option<String>,
}

/// Project definition with every default applied
#[derive(Debug, Clone, Serialize)]
pub struct NativeAppProject {
    pub project_root: PathBuf,
    pub name: String,
    pub source_stage: String,
    pub deploy_root: PathBuf,
    pub artifacts: Vec<Artifact>,
    pub package_name: String,
    pub package_role: String,
    pub package_scripts: Vec<String>,
    pub app_name: String,
    pub app_role: String,
    pub app_warehouse: Option<String>,
    pub debug_mode: bool,
}

impl NativeAppProject {
    /// Load `snowflake.yml` from `project_root`
    pub fn load(project_root: &Path, defaults: &ProjectDefaults) -> Result<Self> {
        let path = project_root.join(PROJECT_DEFINITION_FILE);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Unable to read project definition {}", path.display()))?;
        Self::from_yaml(project_root, &text, defaults)
    }

    pub fn from_yaml(project_root: &Path, text: &str, defaults: &ProjectDefaults) -> Result<Self> {
        let file: ProjectDefinitionFile = serde_yaml::from_str(text)
            .map_err(|e| NativeAppError::ProjectDefinition(e.to_string()))?;
        if file.definition_version != 1 {
            return Err(NativeAppError::ProjectDefinition(format!(
                "unsupported definition_version {}",
                file.definition_version
            ))
            .into());
        }
        Self::resolve(project_root, file.native_app, defaults)
    }

    fn resolve(
        project_root: &Path,
        def: NativeAppDefinition,
        defaults: &ProjectDefaults,
    ) -> Result<Self> {
        let default_role = defaults
            .role
            .clone()
            .unwrap_or_else(|| DEFAULT_ROLE.to_string());

        let source_stage = def
            .source_stage
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| DEFAULT_SOURCE_STAGE.to_string());
        if source_stage.split('.').count() != 2 {
            return Err(NativeAppError::ProjectDefinition(format!(
                "source_stage must be <schema>.<stage>, got '{}'",
                source_stage
            ))
            .into());
        }

        let deploy_root = project_root.join(
            def.deploy_root
                .as_deref()
                .unwrap_or(DEFAULT_DEPLOY_ROOT),
        );

        let package = def.package.unwrap_or_default();
        let application = def.application.unwrap_or_default();

        Ok(Self {
            project_root: project_root.to_path_buf(),
            package_name: package
                .name
                .unwrap_or_else(|| format!("{}_pkg", def.name)),
            package_role: package.role.unwrap_or_else(|| default_role.clone()),
            package_scripts: package.scripts,
            app_name: application.name.unwrap_or_else(|| def.name.clone()),
            app_role: application.role.unwrap_or(default_role),
            app_warehouse: application.warehouse.or_else(|| defaults.warehouse.clone()),
            debug_mode: application.debug.unwrap_or(true),
            name: def.name,
            source_stage,
            deploy_root,
            artifacts: def.artifacts,
        })
    }

    /// `<package>.<schema>.<stage>`
    pub fn stage_fqn(&self) -> String {
        format!("{}.{}", self.package_name, self.source_stage)
    }

    /// `<package>.<schema>`
    pub fn stage_schema(&self) -> String {
        let schema = self
            .source_stage
            .split('.')
            .next()
            .unwrap_or(&self.source_stage);
        format!("{}.{}", self.package_name, schema)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const MOCK_SNOWFLAKE_YML: &str = r#"definition_version: 1
native_app:
    name: myapp

    source_stage:
        app_src.stage

    artifacts:
        - setup.sql
        - app/README.md
        - src: app/streamlit/*.py
          dest: ui/

    application:
        name: myapp
        role: app_role
        warehouse: app_warehouse
        debug: true

    package:
        name: app_pkg
        scripts:
            - shared_content.sql
"#;

    #[test]
    fn test_load_definition() {
        let project =
            NativeAppProject::from_yaml(Path::new("/proj"), MOCK_SNOWFLAKE_YML, &ProjectDefaults::default())
                .unwrap();
        assert_eq!(project.name, "myapp");
        assert_eq!(project.app_name, "myapp");
        assert_eq!(project.app_role, "app_role");
        assert_eq!(project.app_warehouse.as_deref(), Some("app_warehouse"));
        assert_eq!(project.package_name, "app_pkg");
        assert_eq!(project.package_role, DEFAULT_ROLE);
        assert_eq!(project.package_scripts, vec!["shared_content.sql"]);
        assert_eq!(project.stage_fqn(), "app_pkg.app_src.stage");
        assert_eq!(project.stage_schema(), "app_pkg.app_src");
        assert_eq!(project.deploy_root, Path::new("/proj/output/deploy"));
        assert_eq!(
            project.artifacts[2],
            Artifact::Mapping {
                src: "app/streamlit/*.py".to_string(),
                dest: Some("ui/".to_string()),
            }
        );
        assert!(project.debug_mode);
    }

    #[test]
    fn test_defaults() {
        let yaml = "native_app:\n  name: demo\n";
        let defaults = ProjectDefaults {
            role: Some("dev_role".to_string()),
            warehouse: Some("dev_wh".to_string()),
        };
        let project = NativeAppProject::from_yaml(Path::new("."), yaml, &defaults).unwrap();
        assert_eq!(project.package_name, "demo_pkg");
        assert_eq!(project.app_name, "demo");
        assert_eq!(project.package_role, "dev_role");
        assert_eq!(project.app_role, "dev_role");
        assert_eq!(project.app_warehouse.as_deref(), Some("dev_wh"));
        assert_eq!(project.stage_fqn(), "demo_pkg.app_src.stage");
    }

    #[test]
    fn test_invalid_source_stage() {
        let yaml = "native_app:\n  name: demo\n  source_stage: stage\n";
        let err = NativeAppProject::from_yaml(Path::new("."), yaml, &ProjectDefaults::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NativeAppError>(),
            Some(NativeAppError::ProjectDefinition(_))
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let yaml = "definition_version: 2\nnative_app:\n  name: demo\n";
        assert!(
            NativeAppProject::from_yaml(Path::new("."), yaml, &ProjectDefaults::default()).is_err()
        );
    }
}
