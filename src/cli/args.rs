use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "content-validate", version, about = "Content pack validation CLI")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub(crate) verbose: u8,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the rule catalogue over the content repository.
    Validate(ValidateArgs),
    /// List the registered validators.
    List(ListArgs),
    /// Print the structure schema of a content type.
    Schema(SchemaArgs),
}

#[derive(clap::Args)]
pub(crate) struct ValidateArgs {
    /// Validate the files changed against the base revision.
    #[arg(short = 'g', long = "use-git", default_value_t = false, conflicts_with_all = ["file_paths", "all"])]
    pub(crate) use_git: bool,
    /// Validate only these files.
    #[arg(short = 'i', long = "file-paths", value_name = "PATH", num_args = 1.., value_delimiter = ',')]
    pub(crate) file_paths: Vec<PathBuf>,
    /// Validate every content item of the repository.
    #[arg(short = 'a', long = "all", default_value_t = false, conflicts_with = "file_paths")]
    pub(crate) all: bool,
    #[arg(long = "content-root", value_name = "DIR")]
    pub(crate) content_root: Option<PathBuf>,
    /// Base revision for git mode.
    #[arg(long = "base", visible_alias = "prev-ver")]
    pub(crate) base: Option<String>,
    #[arg(long = "staged", default_value_t = false)]
    pub(crate) staged: bool,
    #[arg(long = "committed-only", default_value_t = false)]
    pub(crate) committed_only: bool,
    #[arg(long = "no-docker-checks", default_value_t = false)]
    pub(crate) no_docker_checks: bool,
    #[arg(long = "fix", default_value_t = false)]
    pub(crate) fix: bool,
    /// Comma separated error codes or families to run.
    #[arg(long = "select", value_name = "CODES")]
    pub(crate) select: Option<String>,
    /// Comma separated error codes or families to skip.
    #[arg(long = "ignore", value_name = "CODES")]
    pub(crate) ignore: Option<String>,
    /// Comma separated error codes reported without failing the run.
    #[arg(long = "warning", value_name = "CODES")]
    pub(crate) warning: Option<String>,
    #[arg(short = 'f', long = "format")]
    pub(crate) format: Option<ValidateFormat>,
    #[arg(short = 'w', long = "workers")]
    pub(crate) workers: Option<usize>,
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    pub(crate) quiet: bool,
}

#[derive(clap::Args)]
pub(crate) struct ListArgs {
    /// Comma separated error codes or families to show.
    #[arg(long = "select", value_name = "CODES")]
    pub(crate) select: Option<String>,
    #[arg(short = 'f', long = "format")]
    pub(crate) format: Option<ValidateFormat>,
}

#[derive(clap::Args)]
pub(crate) struct SchemaArgs {
    /// Content type name, such as Integration or AgentixAction.
    #[arg(value_name = "TYPE")]
    pub(crate) content_type: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum ValidateFormat {
    Human,
    Json,
}
