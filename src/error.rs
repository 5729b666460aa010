//! Error taxonomy for a mirror run
//!
//! Configuration and listing errors are fatal and abort the run before any
//! repository is touched. VCS errors are per-repository: the synchronizer turns
//! them into a `Failed` outcome and moves on to the next repository.

use std::path::PathBuf;

use crate::discovery::PlatformKind;

/// Settings could not be resolved into something runnable
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{platform} account is not set: {hint}")]
    MissingIdentity {
        platform: PlatformKind,
        hint: &'static str,
    },

    #[error("listing {scope} repositories requires a {platform} token (pass --token or set {env_var})")]
    MissingCredential {
        platform: PlatformKind,
        scope: String,
        env_var: &'static str,
    },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

/// The hosting platform refused or failed the repository listing
#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error("{platform} rejected the credential (HTTP {status}): {message}")]
    Authentication {
        platform: PlatformKind,
        status: u16,
        message: String,
    },

    #[error("{platform} is rate limiting requests: {message}")]
    RateLimited {
        platform: PlatformKind,
        message: String,
    },

    #[error("{platform} account or workspace '{target}' does not exist")]
    NotFound {
        platform: PlatformKind,
        target: String,
    },

    #[error("{platform} API error (HTTP {status}): {message}")]
    Api {
        platform: PlatformKind,
        status: u16,
        message: String,
    },

    #[error("network error talking to {platform}: {message}")]
    Network {
        platform: PlatformKind,
        message: String,
    },
}

/// A single VCS invocation failed
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    #[error("mirror clone into {} failed: {message}", dest.display())]
    CloneFailed { dest: PathBuf, message: String },

    #[error("fetch in {} failed: {message}", dest.display())]
    FetchFailed { dest: PathBuf, message: String },

    #[error("git executable is not usable: {0}")]
    Unavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
