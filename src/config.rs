use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::discovery::ScopeFilter;

/// Main configuration structure for repomirror
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Maximum number of git subprocesses running at once
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Embed the token in HTTPS clone URLs (stored in each mirror's git config)
    #[serde(default = "default_true")]
    pub embed_credential: bool,

    /// Repository exclusion patterns
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// GitHub account settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Bitbucket workspace settings
    #[serde(default)]
    pub bitbucket: BitbucketConfig,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    /// GitHub username
    pub username: Option<String>,

    /// Personal access token
    pub token: Option<String>,

    /// Organization to mirror instead of the user's own repositories
    pub org: Option<String>,

    /// Which repositories to mirror
    #[serde(default)]
    pub repo_type: ScopeFilter,

    /// Base folder for GitHub mirrors
    #[serde(default = "default_github_folder")]
    pub folder: String,

    /// REST API root, override for GitHub Enterprise
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
}

/// Bitbucket configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BitbucketConfig {
    /// Workspace (username or team name)
    pub workspace: Option<String>,

    /// Atlassian account email used with an API token
    pub user: Option<String>,

    /// Atlassian API token
    pub token: Option<String>,

    /// Clone over SSH instead of HTTPS
    #[serde(default)]
    pub use_ssh: bool,

    /// Base folder for Bitbucket mirrors
    #[serde(default = "default_bitbucket_folder")]
    pub folder: String,

    /// REST API root
    #[serde(default = "default_bitbucket_api_url")]
    pub api_url: String,
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_max_parallel() -> usize {
    1
}
fn default_github_folder() -> String {
    "github_sync".to_string()
}
fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_bitbucket_folder() -> String {
    "bitbucket_sync".to_string()
}
fn default_bitbucket_api_url() -> String {
    "https://api.bitbucket.org/2.0".to_string()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            username: None,
            token: None,
            org: None,
            repo_type: ScopeFilter::default(),
            folder: default_github_folder(),
            api_url: default_github_api_url(),
        }
    }
}

impl Default for BitbucketConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            user: None,
            token: None,
            use_ssh: false,
            folder: default_bitbucket_folder(),
            api_url: default_bitbucket_api_url(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            embed_credential: default_true(),
            exclude_patterns: Vec::new(),
            github: GitHubConfig::default(),
            bitbucket: BitbucketConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to defaults
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            tracing::debug!("No configuration at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        // Expand environment variables in paths
        config.expand_paths()?;

        Ok(config)
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("repomirror").join("config.yml"))
    }

    /// Expand environment variables in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.github.folder = shellexpand::full(&self.github.folder)
            .context("Failed to expand github.folder path")?
            .into_owned();

        self.bitbucket.folder = shellexpand::full(&self.bitbucket.folder)
            .context("Failed to expand bitbucket.folder path")?
            .into_owned();

        Ok(())
    }
}
