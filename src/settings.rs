//! Effective settings for one run
//!
//! Built once from the config file and the parsed command line, then passed by
//! reference to the lister, the synchronizer and the driver.

use std::fmt;
use std::path::PathBuf;

use crate::cli::{BitbucketArgs, CommonArgs, GitHubArgs};
use crate::config::Config;
use crate::discovery::{PlatformKind, ScopeFilter, Transport};
use crate::error::ConfigError;

/// Whose repositories are mirrored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountScope {
    /// A personal GitHub account
    User(String),
    /// A GitHub organization
    Organization(String),
    /// A Bitbucket workspace
    Workspace(String),
}

impl AccountScope {
    /// Name of the per-account folder under the sync folder
    pub fn identifier(&self) -> &str {
        match self {
            AccountScope::User(name)
            | AccountScope::Organization(name)
            | AccountScope::Workspace(name) => name,
        }
    }
}

/// API token, optionally paired with the account it belongs to
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Account name for basic authentication (Bitbucket API tokens)
    pub user: Option<String>,
    pub token: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user", &self.user)
            .field("token", &"***")
            .finish()
    }
}

/// Resolved settings for a run
#[derive(Debug, Clone)]
pub struct Settings {
    pub account: AccountScope,
    pub credential: Option<Credential>,

    /// Visibility filter; `None` when the platform has no such notion
    pub scope: Option<ScopeFilter>,

    /// Directory holding one mirror per repository
    pub destination: PathBuf,

    pub transport: Transport,

    /// Put the token into HTTPS clone URLs
    pub embed_credential: bool,

    pub exclude_patterns: Vec<String>,

    /// Maximum simultaneous VCS subprocesses
    pub max_parallel: usize,

    /// REST API root of the platform
    pub api_url: String,
}

impl Settings {
    /// Resolve GitHub settings: defaults, then config file, then environment and arguments
    pub fn for_github(config: &Config, args: &GitHubArgs) -> Result<Self, ConfigError> {
        let file = &config.github;

        let token = first_present(&args.token, &file.token);
        let username = first_present(&args.username, &file.username);
        let org = if args.user_only {
            None
        } else {
            first_present(&args.org, &file.org)
        };
        let scope = args.repo_type.unwrap_or(file.repo_type);

        let account = match (org, username) {
            (Some(org), _) => AccountScope::Organization(org),
            (None, Some(username)) => AccountScope::User(username),
            (None, None) => {
                return Err(ConfigError::MissingIdentity {
                    platform: PlatformKind::GitHub,
                    hint: "pass --username or --org, or set GH_USERNAME / GH_ORG",
                })
            }
        };

        if token.is_none() && scope.requires_credential() {
            return Err(ConfigError::MissingCredential {
                platform: PlatformKind::GitHub,
                scope: scope.to_string(),
                env_var: "GH_TOKEN",
            });
        }

        let folder = args.common.folder.as_deref().unwrap_or(&file.folder);
        let destination = expand_folder(folder)?.join(account.identifier());

        Ok(Self {
            account,
            credential: token.map(|token| Credential { user: None, token }),
            scope: Some(scope),
            destination,
            transport: Transport::Https,
            embed_credential: embed_credential(config, &args.common),
            exclude_patterns: config.exclude_patterns.clone(),
            max_parallel: max_parallel(config, &args.common)?,
            api_url: file.api_url.clone(),
        })
    }

    /// Resolve Bitbucket settings: defaults, then config file, then environment and arguments
    pub fn for_bitbucket(config: &Config, args: &BitbucketArgs) -> Result<Self, ConfigError> {
        let file = &config.bitbucket;

        let workspace = first_present(&args.workspace, &file.workspace).ok_or(
            ConfigError::MissingIdentity {
                platform: PlatformKind::Bitbucket,
                hint: "pass --workspace or set BB_WORKSPACE",
            },
        )?;
        let token = first_present(&args.token, &file.token);
        let user = first_present(&args.user, &file.user);

        if user.is_some() && token.is_none() {
            tracing::warn!("Bitbucket user is set without a token; listing anonymously");
        }

        let use_ssh = if args.ssh {
            true
        } else if args.no_ssh {
            false
        } else {
            args.ssh_default.unwrap_or(file.use_ssh)
        };

        let account = AccountScope::Workspace(workspace);
        let folder = args.common.folder.as_deref().unwrap_or(&file.folder);
        let destination = expand_folder(folder)?.join(account.identifier());

        Ok(Self {
            account,
            credential: token.map(|token| Credential { user, token }),
            scope: None,
            destination,
            transport: if use_ssh { Transport::Ssh } else { Transport::Https },
            embed_credential: embed_credential(config, &args.common),
            exclude_patterns: config.exclude_patterns.clone(),
            max_parallel: max_parallel(config, &args.common)?,
            api_url: file.api_url.clone(),
        })
    }

    /// Local mirror directory for a repository name
    pub fn mirror_path(&self, name: &str) -> PathBuf {
        self.destination.join(name)
    }

    /// The token, when one was supplied
    pub fn token(&self) -> Option<&str> {
        self.credential.as_ref().map(|c| c.token.as_str())
    }
}

/// Argument value if given and non-empty, else the file value if non-empty
fn first_present(arg: &Option<String>, file: &Option<String>) -> Option<String> {
    arg.iter()
        .chain(file.iter())
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn expand_folder(folder: &str) -> Result<PathBuf, ConfigError> {
    shellexpand::full(folder)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|e| ConfigError::InvalidValue {
            field: "folder",
            message: e.to_string(),
        })
}

fn embed_credential(config: &Config, common: &CommonArgs) -> bool {
    config.embed_credential && !common.no_embed_credential
}

fn max_parallel(config: &Config, common: &CommonArgs) -> Result<usize, ConfigError> {
    match common.jobs.unwrap_or(config.max_parallel) {
        0 => Err(ConfigError::InvalidValue {
            field: "jobs",
            message: "must be at least 1".to_string(),
        }),
        n => Ok(n),
    }
}
