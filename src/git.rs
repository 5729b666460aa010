use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, info, warn};

use crate::discovery::{redact_secret, redact_url};
use crate::error::VcsError;

/// Version-control operations the synchronizer needs
///
/// `GitCli` is the production implementation; tests substitute a recording fake.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Verify the VCS executable can be run, returning its version string
    async fn check_available(&self) -> Result<String, VcsError>;

    /// Create a bare mirror of `url` at `dest`, which must not exist yet
    async fn clone_mirror(&self, url: &str, dest: &Path) -> Result<(), VcsError>;

    /// Fetch all refs into the existing mirror at `dest`, pruning deleted ones
    async fn fetch_update(&self, url: &str, dest: &Path) -> Result<(), VcsError>;
}

/// Shells out to the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
        }
    }

    /// Use a specific git binary
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str], dir: Option<&Path>) -> Result<Output, VcsError> {
        let mut command = AsyncCommand::new(&self.program);
        command.args(args).env("GIT_TERMINAL_PROMPT", "0");
        if let Some(dir) = dir {
            command.current_dir(dir);
        }

        Ok(command.output().await?)
    }

    /// Run git against the repository at `dest` only, never one found in a parent directory
    async fn run_in(&self, dest: &Path, args: &[&str]) -> Result<Output, VcsError> {
        let git_dir = format!("--git-dir={}", dest.display());
        let mut full = vec![git_dir.as_str()];
        full.extend_from_slice(args);
        self.run(&full, Some(dest)).await
    }

    async fn is_bare_repository(&self, dest: &Path) -> Result<bool, VcsError> {
        let output = self
            .run_in(dest, &["rev-parse", "--is-bare-repository"])
            .await?;

        Ok(output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true")
    }

    async fn remote_url(&self, dest: &Path) -> Result<Option<String>, VcsError> {
        let output = self
            .run_in(dest, &["config", "--get", "remote.origin.url"])
            .await?;

        if output.status.success() {
            let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
            Ok(Some(url).filter(|url| !url.is_empty()))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn check_available(&self) -> Result<String, VcsError> {
        let output = self
            .run(&["--version"], None)
            .await
            .map_err(|e| VcsError::Unavailable(format!("cannot run '{}': {}", self.program, e)))?;

        if !output.status.success() {
            return Err(VcsError::Unavailable(stderr_of(&output, None)));
        }

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("Using {}", version);
        Ok(version)
    }

    async fn clone_mirror(&self, url: &str, dest: &Path) -> Result<(), VcsError> {
        info!("Cloning mirror: {} -> {}", redact_url(url), dest.display());

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let dest_arg = dest.to_string_lossy();
        let output = self
            .run(&["clone", "--mirror", "--quiet", url, &dest_arg], None)
            .await?;

        if !output.status.success() {
            if dest.exists() {
                if let Err(e) = tokio::fs::remove_dir_all(dest).await {
                    warn!("Failed to remove partial clone {}: {}", dest.display(), e);
                }
            }

            return Err(VcsError::CloneFailed {
                dest: dest.to_path_buf(),
                message: stderr_of(&output, Some(url)),
            });
        }

        Ok(())
    }

    async fn fetch_update(&self, url: &str, dest: &Path) -> Result<(), VcsError> {
        info!("Updating mirror: {}", dest.display());

        if !self.is_bare_repository(dest).await? {
            return Err(VcsError::FetchFailed {
                dest: dest.to_path_buf(),
                message: "destination exists but is not a bare repository".to_string(),
            });
        }

        let current = self.remote_url(dest).await?;
        if current.as_deref() != Some(url) {
            debug!(
                "Remote URL changed to {}, updating origin",
                redact_url(url)
            );

            let output = self
                .run_in(dest, &["remote", "set-url", "origin", url])
                .await?;
            if !output.status.success() {
                return Err(VcsError::FetchFailed {
                    dest: dest.to_path_buf(),
                    message: stderr_of(&output, Some(url)),
                });
            }
        }

        let output = self
            .run_in(dest, &["fetch", "--all", "--prune", "--quiet"])
            .await?;

        if !output.status.success() {
            return Err(VcsError::FetchFailed {
                dest: dest.to_path_buf(),
                message: stderr_of(&output, Some(url)),
            });
        }

        Ok(())
    }
}

/// git's stderr with any credential from `url` blanked out
fn stderr_of(output: &Output, url: Option<&str>) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let Some(url) = url else {
        return stderr;
    };

    let Ok(parsed) = reqwest::Url::parse(url) else {
        return stderr;
    };

    let userinfo = match (parsed.username(), parsed.password()) {
        ("", None) => return stderr,
        (user, Some(password)) => format!("{}:{}@", user, password),
        (user, None) => format!("{}@", user),
    };

    let stderr = stderr.replace(&userinfo, "***@");
    redact_secret(&stderr, parsed.password())
}
