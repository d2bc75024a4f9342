//! Native application lens
//!
//! Drives the loose-file development loop for Snowflake native applications:
//! bundle the project into a deploy root, mirror it onto the package's stage,
//! and create (or recreate) a development application from that stage.
//!
//! Every step runs under the role configured for the object it touches, via
//! [`run_as`], so the caller's session role is unchanged afterwards.
//!
//! # Dev application states
//!
//! | existing application | action |
//! |---|---|
//! | none | create |
//! | snowcli comment, loose-file version, expected owner, stage unchanged | nothing |
//! | snowcli comment, loose-file version, expected owner, stage changed | drop + create |
//! | foreign comment or release version | [`NativeAppError::ApplicationAlreadyExists`] |
//! | unexpected owner | [`NativeAppError::UnexpectedOwner`] |

mod artifacts;
mod project;

pub use artifacts::{bundle, wildcard_match};
pub use project::{
    ApplicationDefinition, Artifact, NativeAppDefinition, NativeAppProject, PackageDefinition,
    ProjectDefaults, ProjectDefinitionFile, DEFAULT_DEPLOY_ROOT, DEFAULT_ROLE,
    DEFAULT_SOURCE_STAGE, PROJECT_DEFINITION_FILE,
};

use crate::database::{run_as, use_warehouse, SqlExecutor};
use crate::lens::objects::{
    find_object, verify_and_drop, ObjectError, ObjectKind, SPECIAL_COMMENT,
};
use crate::lens::stage::{DiffResult, StageLens};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::info;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeAppError {
    /// An application with this name exists but is not a snowcli dev application
    ApplicationAlreadyExists { name: String },
    /// An application package with this name exists but was not created by snowcli
    ApplicationPackageAlreadyExists { name: String },
    /// The application is owned by a role other than the configured one
    UnexpectedOwner {
        name: String,
        expected: String,
        actual: String,
    },
    /// No warehouse configured for the application
    MissingWarehouse { app: String },
    /// `snowflake.yml` could not be interpreted
    ProjectDefinition(String),
}

impl fmt::Display for NativeAppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeAppError::ApplicationAlreadyExists { name } => write!(
                f,
                "An application object (with different owner role or version) with the name {} already exists in your account. Drop it manually or change the application name in snowflake.yml.",
                name
            ),
            NativeAppError::ApplicationPackageAlreadyExists { name } => write!(
                f,
                "An application package with the name {} already exists in your account and was not created by snowcli.",
                name
            ),
            NativeAppError::UnexpectedOwner {
                name,
                expected,
                actual,
            } => write!(
                f,
                "Cannot operate on application {}: owned by {} instead of {}.",
                name, actual, expected
            ),
            NativeAppError::MissingWarehouse { app } => write!(
                f,
                "No warehouse configured for application {}. Set native_app.application.warehouse or a connection warehouse.",
                app
            ),
            NativeAppError::ProjectDefinition(e) => {
                write!(f, "Invalid project definition: {}", e)
            }
        }
    }
}

impl std::error::Error for NativeAppError {}

/// What `create_dev_app` did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DevAppAction {
    Created,
    Recreated,
    Unchanged,
}

impl fmt::Display for DevAppAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DevAppAction::Created => write!(f, "created"),
            DevAppAction::Recreated => write!(f, "recreated"),
            DevAppAction::Unchanged => write!(f, "unchanged"),
        }
    }
}

// =============================================================================
// Args
// =============================================================================

/// Arguments shared by all `app` subcommands
#[derive(Debug, Clone, Default, serde::Deserialize, Serialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct NativeAppArgs {
    /// Directory containing snowflake.yml (defaults to the current directory)
    #[cfg_attr(feature = "cli", clap(short, long))]
    #[serde(default)]
    pub project: Option<PathBuf>,
}

impl NativeAppArgs {
    pub fn project_root(&self) -> Result<PathBuf> {
        match &self.project {
            Some(p) => Ok(p.clone()),
            None => std::env::current_dir().context("Unable to determine current directory"),
        }
    }
}

// =============================================================================
// SQL
// =============================================================================

/// Split a SQL script into statements on `;` outside of quotes
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in script.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == ';' => {
                if !current.trim().is_empty() {
                    statements.push(current.trim().to_string());
                }
                current.clear();
                continue;
            }
            None => {}
        }
        current.push(c);
    }
    if !current.trim().is_empty() {
        statements.push(current.trim().to_string());
    }
    statements
}

// =============================================================================
// Lens
// =============================================================================

/// Native application operations for one project
pub struct NativeAppLens<'a> {
    executor: &'a dyn SqlExecutor,
    project: NativeAppProject,
}

impl<'a> NativeAppLens<'a> {
    pub fn new(executor: &'a dyn SqlExecutor, project: NativeAppProject) -> Self {
        Self { executor, project }
    }

    pub fn project(&self) -> &NativeAppProject {
        &self.project
    }

    pub fn deploy_root(&self) -> &std::path::Path {
        &self.project.deploy_root
    }

    fn create_application_statement(&self) -> String {
        format!(
            "create application {}\n    from application package {}\n    using @{}\n    debug_mode = {}\n    comment = {}",
            self.project.app_name,
            self.project.package_name,
            self.project.stage_fqn(),
            self.project.debug_mode,
            SPECIAL_COMMENT
        )
    }

    fn create_package_statement(&self) -> String {
        format!(
            "create application package {}\n    comment = {}\n    distribution = internal",
            self.project.package_name, SPECIAL_COMMENT
        )
    }

    /// Copy the project's artifacts into the deploy root
    pub fn bundle(&self) -> Result<Vec<PathBuf>> {
        info!("Bundling artifacts into {}", self.project.deploy_root.display());
        bundle(
            &self.project.project_root,
            &self.project.deploy_root,
            &self.project.artifacts,
        )
    }

    /// Create the application package unless snowcli already did.
    ///
    /// Returns `true` when the package was created by this call.
    pub fn create_app_package(&self) -> Result<bool> {
        let executor = self.executor;
        let name = &self.project.package_name;
        run_as(executor, &self.project.package_role, || {
            match find_object(executor, ObjectKind::ApplicationPackage, name)? {
                Some(existing) if existing.has_marker_comment() => {
                    info!("Reusing application package {}", name);
                    Ok(false)
                }
                Some(_) => Err(NativeAppError::ApplicationPackageAlreadyExists {
                    name: name.clone(),
                }
                .into()),
                None => {
                    info!("Creating application package {}", name);
                    executor.execute(&self.create_package_statement())?;
                    Ok(true)
                }
            }
        })
    }

    /// Execute the package's SQL scripts in order under the package role
    pub fn apply_package_scripts(&self) -> Result<()> {
        if self.project.package_scripts.is_empty() {
            return Ok(());
        }

        let mut statements = Vec::new();
        for script in &self.project.package_scripts {
            let path = self.project.project_root.join(script);
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Unable to read package script {}", path.display()))?;
            let text = text
                .replace("{{ package_name }}", &self.project.package_name)
                .replace("{{package_name}}", &self.project.package_name);
            statements.extend(split_statements(&text));
        }

        let executor = self.executor;
        run_as(executor, &self.project.package_role, || {
            for statement in &statements {
                executor.execute(statement)?;
            }
            Ok(())
        })
    }

    /// Make sure the stage exists and mirrors the deploy root
    pub fn sync_deploy_root_with_stage(&self, role: &str) -> Result<DiffResult> {
        let executor = self.executor;
        let stage_fqn = self.project.stage_fqn();
        run_as(executor, role, || {
            executor.execute(&format!(
                "create schema if not exists {}",
                self.project.stage_schema()
            ))?;
            executor.execute(&format!(
                "create stage if not exists {}\n    encryption = (TYPE = 'SNOWFLAKE_SSE')",
                stage_fqn
            ))?;

            let stage = StageLens::new(executor);
            let diff = stage.diff(&self.project.deploy_root, &stage_fqn)?;
            if diff.has_changes() {
                info!(
                    "Syncing {} changed, {} new and {} removed files to @{}",
                    diff.different.len(),
                    diff.only_local.len(),
                    diff.only_on_stage.len(),
                    stage_fqn
                );
                stage.sync(&self.project.deploy_root, &diff, &stage_fqn)?;
            }
            Ok(diff)
        })
    }

    /// Create or refresh the development application from the stage
    pub fn create_dev_app(&self, diff: &DiffResult) -> Result<DevAppAction> {
        let executor = self.executor;
        let app = &self.project.app_name;
        let role = &self.project.app_role;
        let warehouse = self
            .project
            .app_warehouse
            .as_deref()
            .ok_or_else(|| NativeAppError::MissingWarehouse { app: app.clone() })?;

        run_as(executor, role, || {
            use_warehouse(executor, warehouse)?;

            let action = match find_object(executor, ObjectKind::Application, app)? {
                None => DevAppAction::Created,
                Some(existing) => {
                    if !existing.has_marker_comment() || !existing.is_loose_files_version() {
                        return Err(
                            NativeAppError::ApplicationAlreadyExists { name: app.clone() }.into(),
                        );
                    }
                    if !existing.is_owned_by(role) {
                        return Err(NativeAppError::UnexpectedOwner {
                            name: app.clone(),
                            expected: role.clone(),
                            actual: existing.owner.unwrap_or_default(),
                        }
                        .into());
                    }
                    if !diff.has_changes() {
                        info!("Application {} is up to date", app);
                        return Ok(DevAppAction::Unchanged);
                    }
                    info!("Dropping application {} to pick up stage changes", app);
                    executor.execute(&ObjectKind::Application.drop_statement(app))?;
                    DevAppAction::Recreated
                }
            };

            info!("Creating application {}", app);
            executor.execute(&self.create_application_statement())?;
            Ok(action)
        })
    }

    /// Bundle, create the package, run its scripts and sync the stage
    pub fn deploy(&self) -> Result<DiffResult> {
        self.bundle()?;
        self.create_app_package()?;
        self.apply_package_scripts()?;
        self.sync_deploy_root_with_stage(&self.project.package_role)
    }

    /// Deploy, then create or refresh the development application
    pub fn run(&self) -> Result<DevAppAction> {
        let diff = self.deploy()?;
        self.create_dev_app(&diff)
    }

    /// Drop the application and then its package.
    ///
    /// An application that was never created is skipped; anything else that
    /// blocks the drop is returned.
    pub fn teardown(&self) -> Result<()> {
        let app_result = verify_and_drop(
            self.executor,
            &self.project.app_name,
            &self.project.app_role,
            ObjectKind::Application,
        );
        match app_result {
            Ok(()) => {}
            Err(e) => match e.downcast_ref::<ObjectError>() {
                Some(ObjectError::ObjectNotFound { .. }) => {
                    info!("{}; skipping", e);
                }
                _ => return Err(e),
            },
        }

        verify_and_drop(
            self.executor,
            &self.project.package_name,
            &self.project.package_role,
            ObjectKind::ApplicationPackage,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::project::tests::MOCK_SNOWFLAKE_YML;
    use super::*;
    use crate::database::core::scripted::ScriptedExecutor;
    use crate::database::QueryResult;
    use crate::lens::objects::LOOSE_FILES_MAGIC_VERSION;
    use std::path::Path;

    const CREATE_APP: &str = "create application myapp\n    from application package app_pkg\n    using @app_pkg.app_src.stage\n    debug_mode = true\n    comment = GENERATED_BY_SNOWCLI";

    fn project(root: &Path) -> NativeAppProject {
        NativeAppProject::from_yaml(root, MOCK_SNOWFLAKE_YML, &ProjectDefaults::default()).unwrap()
    }

    fn app_row(comment: &str, version: &str, owner: &str) -> QueryResult {
        QueryResult::from_records(&[&[
            ("comment", comment),
            ("version", version),
            ("owner", owner),
        ]])
    }

    /// Executor scripted for `create_dev_app`: current role, use role, use warehouse, show
    fn dev_app_executor(show: QueryResult) -> ScriptedExecutor {
        let exec = ScriptedExecutor::with_current_role("old_role");
        exec.push_empty().push_empty().push(show);
        exec
    }

    fn changed() -> DiffResult {
        DiffResult {
            different: vec!["setup.sql".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_sync_deploy_root_with_stage() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(dir.path());
        std::fs::create_dir_all(&project.deploy_root).unwrap();
        std::fs::write(project.deploy_root.join("setup.sql"), "select 1;").unwrap();

        let exec = ScriptedExecutor::with_current_role("old_role");
        let lens = NativeAppLens::new(&exec, project);
        let diff = lens.sync_deploy_root_with_stage("new_role").unwrap();

        assert_eq!(diff.only_local, vec!["setup.sql"]);
        let calls = exec.calls();
        assert_eq!(calls[0], "select current_role()");
        assert_eq!(calls[1], "use role new_role");
        assert_eq!(calls[2], "create schema if not exists app_pkg.app_src");
        assert_eq!(
            calls[3],
            "create stage if not exists app_pkg.app_src.stage\n    encryption = (TYPE = 'SNOWFLAKE_SSE')"
        );
        assert_eq!(calls[4], "list @app_pkg.app_src.stage");
        assert!(calls[5].starts_with("put file://"));
        assert!(calls[5].contains("@app_pkg.app_src.stage auto_compress=false"));
        assert_eq!(calls[6], "use role old_role");
        assert_eq!(calls.len(), 7);
    }

    #[test]
    fn test_create_dev_app_noop() {
        let exec = dev_app_executor(app_row(SPECIAL_COMMENT, LOOSE_FILES_MAGIC_VERSION, "app_role"));
        let lens = NativeAppLens::new(&exec, project(Path::new(".")));

        let action = lens.create_dev_app(&DiffResult::default()).unwrap();

        assert_eq!(action, DevAppAction::Unchanged);
        assert_eq!(
            exec.calls(),
            vec![
                "select current_role()",
                "use role app_role",
                "use warehouse app_warehouse",
                "show applications like 'myapp'",
                "use role old_role",
            ]
        );
    }

    #[test]
    fn test_create_dev_app_recreate() {
        let exec = dev_app_executor(app_row(SPECIAL_COMMENT, LOOSE_FILES_MAGIC_VERSION, "app_role"));
        let lens = NativeAppLens::new(&exec, project(Path::new(".")));

        let action = lens.create_dev_app(&changed()).unwrap();

        assert_eq!(action, DevAppAction::Recreated);
        assert_eq!(
            exec.calls(),
            vec![
                "select current_role()",
                "use role app_role",
                "use warehouse app_warehouse",
                "show applications like 'myapp'",
                "drop application myapp",
                CREATE_APP,
                "use role old_role",
            ]
        );
    }

    #[test]
    fn test_create_dev_app_create_new() {
        let exec = dev_app_executor(QueryResult::empty());
        let lens = NativeAppLens::new(&exec, project(Path::new(".")));

        let action = lens.create_dev_app(&DiffResult::default()).unwrap();

        assert_eq!(action, DevAppAction::Created);
        assert_eq!(
            exec.calls(),
            vec![
                "select current_role()",
                "use role app_role",
                "use warehouse app_warehouse",
                "show applications like 'myapp'",
                CREATE_APP,
                "use role old_role",
            ]
        );
    }

    #[test]
    fn test_create_dev_app_bad_comment() {
        let exec = dev_app_executor(app_row("bad comment", LOOSE_FILES_MAGIC_VERSION, "app_role"));
        let lens = NativeAppLens::new(&exec, project(Path::new(".")));

        let err = lens.create_dev_app(&changed()).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<NativeAppError>(),
            Some(NativeAppError::ApplicationAlreadyExists { .. })
        ));
        assert_eq!(
            exec.calls(),
            vec![
                "select current_role()",
                "use role app_role",
                "use warehouse app_warehouse",
                "show applications like 'myapp'",
                "use role old_role",
            ]
        );
    }

    #[test]
    fn test_create_dev_app_bad_version() {
        let exec = dev_app_executor(app_row(SPECIAL_COMMENT, "v1", "app_role"));
        let lens = NativeAppLens::new(&exec, project(Path::new(".")));

        let err = lens.create_dev_app(&DiffResult::default()).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<NativeAppError>(),
            Some(NativeAppError::ApplicationAlreadyExists { .. })
        ));
        assert_eq!(exec.calls().len(), 5);
    }

    #[test]
    fn test_create_dev_app_bad_owner() {
        let exec = dev_app_executor(app_row(
            SPECIAL_COMMENT,
            LOOSE_FILES_MAGIC_VERSION,
            "accountadmin_or_something",
        ));
        let lens = NativeAppLens::new(&exec, project(Path::new(".")));

        let err = lens.create_dev_app(&DiffResult::default()).unwrap_err();

        assert_eq!(
            err.downcast_ref::<NativeAppError>(),
            Some(&NativeAppError::UnexpectedOwner {
                name: "myapp".to_string(),
                expected: "app_role".to_string(),
                actual: "accountadmin_or_something".to_string(),
            })
        );
        assert_eq!(
            exec.calls().last().map(String::as_str),
            Some("use role old_role")
        );
    }

    #[test]
    fn test_owner_compared_as_identifier() {
        let exec = dev_app_executor(app_row(SPECIAL_COMMENT, LOOSE_FILES_MAGIC_VERSION, "APP_ROLE"));
        let lens = NativeAppLens::new(&exec, project(Path::new(".")));
        assert_eq!(
            lens.create_dev_app(&DiffResult::default()).unwrap(),
            DevAppAction::Unchanged
        );
    }

    #[test]
    fn test_create_dev_app_requires_warehouse() {
        let yaml = "native_app:\n  name: demo\n";
        let project =
            NativeAppProject::from_yaml(Path::new("."), yaml, &ProjectDefaults::default()).unwrap();
        let exec = ScriptedExecutor::new();
        let lens = NativeAppLens::new(&exec, project);

        let err = lens.create_dev_app(&DiffResult::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NativeAppError>(),
            Some(NativeAppError::MissingWarehouse { .. })
        ));
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn test_create_app_package() {
        let exec = ScriptedExecutor::with_current_role("old_role");
        exec.push_empty().push(QueryResult::empty());
        let lens = NativeAppLens::new(&exec, project(Path::new(".")));

        assert!(lens.create_app_package().unwrap());
        assert_eq!(
            exec.calls(),
            vec![
                "select current_role()",
                "use role accountadmin",
                "show application packages like 'app_pkg'",
                "create application package app_pkg\n    comment = GENERATED_BY_SNOWCLI\n    distribution = internal",
                "use role old_role",
            ]
        );
    }

    #[test]
    fn test_create_app_package_foreign() {
        let exec = ScriptedExecutor::with_current_role("old_role");
        exec.push_empty().push(QueryResult::from_records(&[&[
            ("name", "APP_PKG"),
            ("comment", "someone else's"),
        ]]));
        let lens = NativeAppLens::new(&exec, project(Path::new(".")));

        let err = lens.create_app_package().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NativeAppError>(),
            Some(NativeAppError::ApplicationPackageAlreadyExists { .. })
        ));
    }

    #[test]
    fn test_apply_package_scripts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("shared_content.sql"),
            "create schema if not exists {{ package_name }}.shared;\ngrant usage on schema {{ package_name }}.shared to share in application package {{ package_name }};\n",
        )
        .unwrap();
        let exec = ScriptedExecutor::with_current_role("old_role");
        let lens = NativeAppLens::new(&exec, project(dir.path()));

        lens.apply_package_scripts().unwrap();
        assert_eq!(
            exec.calls(),
            vec![
                "select current_role()",
                "use role accountadmin",
                "create schema if not exists app_pkg.shared",
                "grant usage on schema app_pkg.shared to share in application package app_pkg",
                "use role old_role",
            ]
        );
    }

    #[test]
    fn test_teardown_skips_missing_application() {
        let exec = ScriptedExecutor::with_current_role("old_role");
        exec.push_empty()
            .push(QueryResult::empty())
            .push_empty()
            .push(QueryResult::from_records(&[&[("CURRENT_ROLE()", "old_role")]]))
            .push_empty()
            .push(QueryResult::from_records(&[&[
                ("name", "app_pkg"),
                ("owner", "accountadmin"),
                ("comment", SPECIAL_COMMENT),
            ]]));
        let lens = NativeAppLens::new(&exec, project(Path::new(".")));

        lens.teardown().unwrap();
        let calls = exec.calls();
        assert!(calls.contains(&"show applications like 'myapp'".to_string()));
        assert!(!calls.contains(&"drop application myapp".to_string()));
        assert!(calls.contains(&"drop application package app_pkg".to_string()));
    }

    #[test]
    fn test_split_statements() {
        let statements = split_statements("select 'a;b';\n\nselect 2;  ");
        assert_eq!(statements, vec!["select 'a;b'", "select 2"]);
    }
}
