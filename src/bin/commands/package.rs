use super::{connect, print_message};
use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use snowcli::lens::package::{
    upload, AnacondaChannel, PackageCreateArgs, PackageLens, PackageLookupArgs,
    PackageUploadArgs, PipInstaller,
};
use snowcli::lens::utils::OutputFormat;
use snowcli::SnowcliConfig;
use std::time::Duration;

/// Snowpark subcommands
#[derive(Subcommand)]
pub enum SnowparkCommands {
    /// Look up, package and upload Python dependencies
    Package {
        #[clap(subcommand)]
        commands: PackageCommands,
    },
}

/// `snowpark package` subcommands
#[derive(Subcommand)]
pub enum PackageCommands {
    /// Check whether a package is available in the Snowflake Anaconda channel
    Lookup(PackageLookupArgs),

    /// Build a zip archive of a package and its non-Anaconda dependencies
    Create(PackageCreateArgs),

    /// Upload a package archive to a stage
    Upload(PackageUploadArgs),
}

pub fn run(config: &SnowcliConfig, commands: SnowparkCommands, output_format: OutputFormat) -> Result<()> {
    let SnowparkCommands::Package { commands } = commands;
    match commands {
        PackageCommands::Lookup(args) => run_lookup(config, args, output_format),
        PackageCommands::Create(args) => run_create(config, args, output_format),
        PackageCommands::Upload(args) => {
            let conn = connect(config)?;
            upload(&conn, &args)?;
            print_message(
                &format!(
                    "Package {} uploaded to @{}.",
                    args.file.display(),
                    args.stage.trim_start_matches('@')
                ),
                output_format,
            )
        }
    }
}

fn spinner(message: String) -> indicatif::ProgressBar {
    let pb = indicatif::ProgressBar::new_spinner();
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn print_outcome<T: Serialize>(outcome: &T, message: &str, output_format: OutputFormat) -> Result<()> {
    match output_format {
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(outcome)?),
        format if format.is_json() => println!("{}", serde_json::to_string(outcome)?),
        _ => println!("{}", message),
    }
    Ok(())
}

fn run_lookup(config: &SnowcliConfig, args: PackageLookupArgs, output_format: OutputFormat) -> Result<()> {
    let channel = AnacondaChannel::fetch()?;
    let installer = PipInstaller::new(config.python.as_str());
    let work_dir = std::env::current_dir()?;
    let lens = PackageLens::new(&installer, &channel, &work_dir);

    let pb = args.yes.then(|| spinner(format!("Installing {}...", args.name)));
    let result = lens.lookup(&args);
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let result = result?;
    print_outcome(&result, &result.message(), output_format)
}

fn run_create(config: &SnowcliConfig, args: PackageCreateArgs, output_format: OutputFormat) -> Result<()> {
    let channel = if args.ignore_anaconda {
        AnacondaChannel::default()
    } else {
        AnacondaChannel::fetch()?
    };

    let installer = PipInstaller::new(config.python.as_str());
    let work_dir = std::env::current_dir()?;
    let lens = PackageLens::new(&installer, &channel, &work_dir);

    let pb = spinner(format!("Packaging {}...", args.name));
    let outcome = lens.create(&args);
    pb.finish_and_clear();
    let outcome = outcome?;
    print_outcome(&outcome, &outcome.message(), output_format)
}
