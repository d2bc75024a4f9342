use super::{connect, print_result};
use anyhow::Result;
use clap::Subcommand;
use snowcli::lens::git::{GitCreateArgs, GitLens, GitListArgs};
use snowcli::lens::utils::OutputFormat;
use snowcli::SnowcliConfig;

/// Git repository subcommands
#[derive(Subcommand)]
pub enum GitCommands {
    /// List branches of a repository
    ListBranches(GitListArgs),

    /// List tags of a repository
    ListTags(GitListArgs),

    /// List files under a branch or tag, e.g. @repo/branches/main/
    ListFiles {
        /// Repository path
        #[clap(value_name = "REPOSITORY_PATH")]
        path: String,
    },

    /// Fetch the latest changes from the remote
    Fetch {
        /// Identifier of the repository object
        repository_name: String,
    },

    /// Create a git repository object
    Create(GitCreateArgs),

    /// Copy files from a repository path to a stage
    Copy {
        /// Source path, e.g. @repo/branches/main/src/
        repository_path: String,

        /// Destination stage path
        destination_path: String,
    },
}

pub fn run(config: &SnowcliConfig, commands: GitCommands, output_format: OutputFormat) -> Result<()> {
    let conn = connect(config)?;
    let lens = GitLens::new(&conn);

    let result = match commands {
        GitCommands::ListBranches(args) => lens.show_branches(&args.repository_name, &args.like)?,
        GitCommands::ListTags(args) => lens.show_tags(&args.repository_name, &args.like)?,
        GitCommands::ListFiles { path } => lens.list_files(&path)?,
        GitCommands::Fetch { repository_name } => lens.fetch(&repository_name)?,
        GitCommands::Create(args) => lens.create(&args)?,
        GitCommands::Copy {
            repository_path,
            destination_path,
        } => lens.copy(&repository_path, &destination_path)?,
    };

    print_result(&result, output_format)
}
