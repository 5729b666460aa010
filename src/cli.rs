//! Command-line surface
//!
//! Options that have an environment fallback declare it with clap's `env`
//! attribute, so "explicit argument beats environment" is decided here and the
//! settings resolver only has to layer the result over the config file.

use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::discovery::ScopeFilter;

#[derive(Parser, Debug)]
#[command(name = "repomirror")]
#[command(about = "Mirror every repository of a GitHub or Bitbucket account into local bare repositories")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mirror the repositories of a GitHub user or organization
    Github(GitHubArgs),

    /// Mirror the repositories of a Bitbucket workspace
    Bitbucket(BitbucketArgs),
}

/// Options shared by every platform
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Local base folder; a subfolder is created for the account
    #[arg(long)]
    pub folder: Option<String>,

    /// Number of repositories synchronized at the same time
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Show what would be cloned or updated without running git
    #[arg(long)]
    pub dry_run: bool,

    /// Keep the token out of clone URLs and rely on git's credential helper
    #[arg(long)]
    pub no_embed_credential: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GitHubArgs {
    /// GitHub username
    #[arg(long, env = "GH_USERNAME")]
    pub username: Option<String>,

    /// GitHub organization name
    #[arg(long, env = "GH_ORG")]
    pub org: Option<String>,

    /// GitHub personal access token
    #[arg(long, env = "GH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Which repositories to mirror
    #[arg(long, value_enum, alias = "repo_type")]
    pub repo_type: Option<ScopeFilter>,

    /// Mirror the user's repositories even when an organization is configured
    #[arg(long)]
    pub user_only: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct BitbucketArgs {
    /// Bitbucket workspace (username or team name)
    #[arg(long, env = "BB_WORKSPACE")]
    pub workspace: Option<String>,

    /// Atlassian account email for API token authentication
    #[arg(long, env = "BB_USER")]
    pub user: Option<String>,

    /// Atlassian API token
    #[arg(long, env = "BB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Clone over SSH
    #[arg(long, conflicts_with = "no_ssh")]
    pub ssh: bool,

    /// Clone over HTTPS even if SSH is the configured default
    #[arg(long)]
    pub no_ssh: bool,

    /// SSH default taken from BB_USE_SSH
    #[arg(long = "ssh-default", env = "BB_USE_SSH", hide = true, value_parser = BoolishValueParser::new())]
    pub ssh_default: Option<bool>,

    #[command(flatten)]
    pub common: CommonArgs,
}
