mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::app::AppCommands;
use commands::git::GitCommands;
use commands::package::SnowparkCommands;
use snowcli::{OutputFormat, SnowcliConfig};
use tracing::Level;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.snowcli/config.toml is used
    #[clap(short, long, global = true)]
    config: Option<String>,

    /// Print debug information
    #[clap(long, global = true)]
    debug: bool,

    /// Output format: table, markdown, json, json-pretty, json-line, psv
    #[clap(long, global = true, default_value = "table")]
    format: OutputFormat,

    /// Role to use instead of the configured one
    #[clap(long, global = true)]
    connection_role: Option<String>,

    /// Warehouse to use instead of the configured one
    #[clap(long, global = true)]
    connection_warehouse: Option<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage git repository objects
    Git {
        #[clap(subcommand)]
        commands: GitCommands,
    },

    /// Bundle, deploy, run and tear down native applications
    App {
        #[clap(subcommand)]
        commands: AppCommands,
    },

    /// Snowpark utilities
    Snowpark {
        #[clap(subcommand)]
        commands: SnowparkCommands,
    },

    /// Show the resolved configuration
    Config,
}

fn run(cli: Cli) -> Result<()> {
    let mut config = SnowcliConfig::new(&cli.config)?;
    if let Some(role) = cli.connection_role {
        config.role = Some(role);
    }
    if let Some(warehouse) = cli.connection_warehouse {
        config.warehouse = Some(warehouse);
    }

    match cli.command {
        Commands::Git { commands: git } => commands::git::run(&config, git, cli.format),
        Commands::App { commands: app } => commands::app::run(&config, app, cli.format),
        Commands::Snowpark { commands: snowpark } => {
            commands::package::run(&config, snowpark, cli.format)
        }
        Commands::Config => commands::config::run(&config, cli.format),
    }
}

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            // filter spans/events with level DEBUG or higher.
            .with_max_level(Level::DEBUG)
            .init();
    }

    if let Err(e) = run(cli) {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }
}
