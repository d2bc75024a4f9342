use super::{connect, print_message};
use anyhow::Result;
use clap::Subcommand;
use snowcli::lens::nativeapp::{bundle, NativeAppArgs, NativeAppLens, NativeAppProject};
use snowcli::lens::utils::OutputFormat;
use snowcli::SnowcliConfig;

/// Native application subcommands
#[derive(Subcommand)]
pub enum AppCommands {
    /// Copy the project's artifacts into the deploy root
    Bundle(NativeAppArgs),

    /// Create the application package and sync the deploy root to its stage
    Deploy(NativeAppArgs),

    /// Deploy, then create or refresh the development application
    Run(NativeAppArgs),

    /// Drop the application and its package
    Teardown(NativeAppArgs),
}

fn load_project(config: &SnowcliConfig, args: &NativeAppArgs) -> Result<NativeAppProject> {
    NativeAppProject::load(&args.project_root()?, &config.project_defaults())
}

pub fn run(config: &SnowcliConfig, commands: AppCommands, output_format: OutputFormat) -> Result<()> {
    let message = match commands {
        AppCommands::Bundle(args) => {
            let project = load_project(config, &args)?;
            let copied = bundle(&project.project_root, &project.deploy_root, &project.artifacts)?;
            format!(
                "Bundled {} files into {}",
                copied.len(),
                project.deploy_root.display()
            )
        }
        AppCommands::Deploy(args) => {
            let project = load_project(config, &args)?;
            let conn = connect(config)?;
            let lens = NativeAppLens::new(&conn, project);
            let diff = lens.deploy()?;
            format!(
                "Deployed to @{}: {} unchanged, {} updated, {} added, {} removed",
                lens.project().stage_fqn(),
                diff.identical.len(),
                diff.different.len(),
                diff.only_local.len(),
                diff.only_on_stage.len()
            )
        }
        AppCommands::Run(args) => {
            let project = load_project(config, &args)?;
            let conn = connect(config)?;
            let lens = NativeAppLens::new(&conn, project);
            let action = lens.run()?;
            format!("Application {} {}.", lens.project().app_name, action)
        }
        AppCommands::Teardown(args) => {
            let project = load_project(config, &args)?;
            let conn = connect(config)?;
            let lens = NativeAppLens::new(&conn, project);
            lens.teardown()?;
            format!(
                "Dropped application {} and application package {}.",
                lens.project().app_name,
                lens.project().package_name
            )
        }
    };

    print_message(&message, output_format)
}
