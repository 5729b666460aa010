//! repomirror - Mirror every repository of a hosting account
//!
//! repomirror lists the repositories of a GitHub user or organization, or of a
//! Bitbucket workspace, and keeps one bare mirror per repository under a local
//! folder: new repositories are cloned with `git clone --mirror`, existing
//! mirrors are refreshed with `git fetch --all --prune`.
//!
//! ## Modules
//!
//! - [`config`]: YAML configuration file with XDG location
//! - [`cli`]: Command-line surface and environment fallbacks
//! - [`settings`]: Resolution of file, environment and arguments into [`Settings`]
//! - [`discovery`]: The [`Platform`] capability and repository descriptors
//! - [`github`] / [`bitbucket`]: Platform implementations
//! - [`git`]: The [`Vcs`] capability and the `git` command-line backend
//! - [`sync`]: Per-repository clone-or-update with bounded concurrency
//! - [`driver`]: Whole-run orchestration and the [`RunSummary`]

pub mod bitbucket;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod git;
pub mod github;
pub mod settings;
pub mod sync;

pub use bitbucket::Bitbucket;
pub use config::Config;
pub use discovery::{Platform, PlatformKind, RepositoryDescriptor, ScopeFilter, Transport, Visibility};
pub use driver::RunSummary;
pub use error::{ConfigError, ListError, VcsError};
pub use git::{GitCli, Vcs};
pub use github::GitHub;
pub use settings::Settings;
pub use sync::{Outcome, SyncEngine, SyncResult};
