//! Common test utilities and helpers for repomirror tests
#![allow(dead_code)]

use async_trait::async_trait;
use repomirror::discovery::{ScopeFilter, Transport};
use repomirror::settings::{AccountScope, Credential};
use repomirror::{Settings, Vcs, VcsError};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One recorded VCS invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCall {
    Clone { url: String, dest: PathBuf },
    Fetch { url: String, dest: PathBuf },
}

impl VcsCall {
    pub fn url(&self) -> &str {
        match self {
            VcsCall::Clone { url, .. } | VcsCall::Fetch { url, .. } => url,
        }
    }
}

/// Records every call instead of running git; clones create the destination
/// directory so a second run sees an existing mirror
#[derive(Default)]
pub struct FakeVcs {
    calls: Mutex<Vec<VcsCall>>,
    failing: HashSet<String>,
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every invocation whose destination ends in one of `names`
    pub fn failing(names: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: names.iter().map(|name| name.to_string()).collect(),
        }
    }

    pub fn calls(&self) -> Vec<VcsCall> {
        self.calls.lock().unwrap().clone()
    }

    fn should_fail(&self, dest: &Path) -> bool {
        dest.file_name()
            .map(|name| self.failing.contains(&*name.to_string_lossy()))
            .unwrap_or(false)
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn check_available(&self) -> Result<String, VcsError> {
        Ok("git version 2.43.0 (fake)".to_string())
    }

    async fn clone_mirror(&self, url: &str, dest: &Path) -> Result<(), VcsError> {
        self.calls.lock().unwrap().push(VcsCall::Clone {
            url: url.to_string(),
            dest: dest.to_path_buf(),
        });

        if self.should_fail(dest) {
            return Err(VcsError::CloneFailed {
                dest: dest.to_path_buf(),
                message: format!("fatal: unable to access '{}': Could not resolve host", url),
            });
        }

        std::fs::create_dir_all(dest)?;
        Ok(())
    }

    async fn fetch_update(&self, url: &str, dest: &Path) -> Result<(), VcsError> {
        self.calls.lock().unwrap().push(VcsCall::Fetch {
            url: url.to_string(),
            dest: dest.to_path_buf(),
        });

        if self.should_fail(dest) {
            return Err(VcsError::FetchFailed {
                dest: dest.to_path_buf(),
                message: format!("fatal: unable to access '{}': Could not resolve host", url),
            });
        }

        Ok(())
    }
}

/// GitHub repository payload as returned by the REST API
pub fn github_repo(owner: &str, name: &str, private: bool) -> Value {
    json!({
        "id": 1,
        "name": name,
        "full_name": format!("{}/{}", owner, name),
        "private": private,
        "clone_url": format!("https://github.com/{}/{}.git", owner, name),
        "ssh_url": format!("git@github.com:{}/{}.git", owner, name),
    })
}

/// Bitbucket repository payload as returned by the 2.0 API
pub fn bitbucket_repo(workspace: &str, name: &str, private: bool) -> Value {
    json!({
        "name": name,
        "slug": name.to_lowercase(),
        "is_private": private,
        "links": {
            "clone": [
                {"name": "https", "href": format!("https://someone@bitbucket.org/{}/{}.git", workspace, name)},
                {"name": "ssh", "href": format!("git@bitbucket.org:{}/{}.git", workspace, name)},
            ]
        }
    })
}

/// Settings for the `acme` GitHub organization against a mock API
pub fn github_settings(api_url: &str, destination: &Path, token: Option<&str>, scope: ScopeFilter) -> Settings {
    Settings {
        account: AccountScope::Organization("acme".to_string()),
        credential: token.map(|token| Credential {
            user: None,
            token: token.to_string(),
        }),
        scope: Some(scope),
        destination: destination.join("acme"),
        transport: Transport::Https,
        embed_credential: true,
        exclude_patterns: Vec::new(),
        max_parallel: 1,
        api_url: api_url.to_string(),
    }
}

/// Settings for the `team` Bitbucket workspace against a mock API
pub fn bitbucket_settings(api_url: &str, destination: &Path, credential: Option<Credential>, transport: Transport) -> Settings {
    Settings {
        account: AccountScope::Workspace("team".to_string()),
        credential,
        scope: None,
        destination: destination.join("team"),
        transport,
        embed_credential: true,
        exclude_patterns: Vec::new(),
        max_parallel: 1,
        api_url: api_url.to_string(),
    }
}

/// Assertion helpers for test validation
pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}
