//! Mirror synchronizer
//!
//! Decides per repository whether to clone a fresh mirror or update the existing
//! one, runs it through the injected [`Vcs`], and turns failures into a
//! per-repository outcome so one bad repository never aborts the run.

use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::discovery::{redact_secret, Platform, RepositoryDescriptor};
use crate::git::Vcs;
use crate::settings::Settings;

/// What happened to one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A new mirror was created
    Cloned,
    /// An existing mirror was fetched and pruned
    Updated,
    /// The VCS invocation failed; the reason is safe to display
    Failed(String),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// Result of synchronizing one repository
#[derive(Debug, Clone)]
pub struct SyncResult {
    pub name: String,
    pub path: PathBuf,
    pub outcome: Outcome,
}

/// Whether a repository would be cloned or updated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Clone,
    Update,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Clone => f.write_str("clone"),
            Action::Update => f.write_str("update"),
        }
    }
}

/// Planned work for one repository, used by dry runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAction {
    pub name: String,
    pub path: PathBuf,
    pub action: Action,
}

/// Drives the VCS for each listed repository
#[derive(Clone)]
pub struct SyncEngine {
    vcs: Arc<dyn Vcs>,
}

impl SyncEngine {
    pub fn new(vcs: Arc<dyn Vcs>) -> Self {
        Self { vcs }
    }

    /// Decide the action for a repository from the state of its destination
    pub fn plan(repo: &RepositoryDescriptor, settings: &Settings) -> PlannedAction {
        let path = settings.mirror_path(&repo.name);
        let action = if path.exists() {
            Action::Update
        } else {
            Action::Clone
        };

        PlannedAction {
            name: repo.name.clone(),
            path,
            action,
        }
    }

    /// Synchronize a single repository
    pub async fn sync(
        &self,
        platform: &dyn Platform,
        repo: &RepositoryDescriptor,
        settings: &Settings,
    ) -> SyncResult {
        let PlannedAction { name, path, action } = Self::plan(repo, settings);

        let Some(url) = platform.clone_url(repo, settings) else {
            warn!("No {:?} clone URL for {}", settings.transport, name);
            return SyncResult {
                name,
                path,
                outcome: Outcome::Failed(format!("no {:?} clone URL available", settings.transport)),
            };
        };

        let result = match action {
            Action::Clone => self.vcs.clone_mirror(&url, &path).await.map(|_| Outcome::Cloned),
            Action::Update => self.vcs.fetch_update(&url, &path).await.map(|_| Outcome::Updated),
        };

        let outcome = match result {
            Ok(outcome) => {
                debug!("{}: {:?}", name, outcome);
                outcome
            }
            Err(e) => {
                let reason = redact_secret(&e.to_string(), settings.token());
                warn!("Failed to {} {}: {}", action, name, reason);
                Outcome::Failed(reason)
            }
        };

        SyncResult {
            name,
            path,
            outcome,
        }
    }

    /// Synchronize every repository, at most `settings.max_parallel` at a time.
    ///
    /// Results come back in the order of `repositories`.
    pub async fn sync_all(
        &self,
        platform: &dyn Platform,
        repositories: &[RepositoryDescriptor],
        settings: &Settings,
    ) -> Vec<SyncResult> {
        let permits = settings.max_parallel.max(1);
        info!(
            "Syncing {} repositories with concurrency {}",
            repositories.len(),
            permits
        );

        let semaphore = Semaphore::new(permits);
        let mut futures = FuturesUnordered::new();

        for (index, repo) in repositories.iter().enumerate() {
            let semaphore = &semaphore;
            futures.push(async move {
                let result = match semaphore.acquire().await {
                    Ok(_permit) => self.sync(platform, repo, settings).await,
                    Err(e) => SyncResult {
                        name: repo.name.clone(),
                        path: settings.mirror_path(&repo.name),
                        outcome: Outcome::Failed(e.to_string()),
                    },
                };
                (index, result)
            });
        }

        let mut results = Vec::with_capacity(repositories.len());
        while let Some(entry) = futures.next().await {
            results.push(entry);
        }

        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{PlatformKind, Transport, Visibility};
    use crate::error::{ListError, VcsError};
    use crate::settings::{AccountScope, Credential};
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    struct StaticPlatform;

    impl Platform for StaticPlatform {
        fn kind(&self) -> PlatformKind {
            PlatformKind::GitHub
        }

        fn list_repositories<'a>(
            &'a self,
            _settings: &'a Settings,
        ) -> BoxStream<'a, Result<RepositoryDescriptor, ListError>> {
            stream::empty().boxed()
        }

        fn clone_url(&self, repo: &RepositoryDescriptor, _settings: &Settings) -> Option<String> {
            repo.https_url.clone()
        }
    }

    /// Records calls and creates the destination on clone
    #[derive(Default)]
    struct RecordingVcs {
        calls: Mutex<Vec<String>>,
        fail_with: Option<&'static str>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl RecordingVcs {
        async fn enter(&self, call: String) {
            self.calls.lock().unwrap().push(call);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Vcs for RecordingVcs {
        async fn check_available(&self) -> Result<String, VcsError> {
            Ok("git version test".to_string())
        }

        async fn clone_mirror(&self, url: &str, dest: &Path) -> Result<(), VcsError> {
            self.enter(format!("clone {}", url)).await;
            if let Some(message) = self.fail_with {
                return Err(VcsError::CloneFailed {
                    dest: dest.to_path_buf(),
                    message: message.to_string(),
                });
            }
            std::fs::create_dir_all(dest)?;
            Ok(())
        }

        async fn fetch_update(&self, url: &str, dest: &Path) -> Result<(), VcsError> {
            self.enter(format!("fetch {}", url)).await;
            if let Some(message) = self.fail_with {
                return Err(VcsError::FetchFailed {
                    dest: dest.to_path_buf(),
                    message: message.to_string(),
                });
            }
            Ok(())
        }
    }

    fn settings(destination: &Path, max_parallel: usize) -> Settings {
        Settings {
            account: AccountScope::Organization("acme".to_string()),
            credential: Some(Credential {
                user: None,
                token: "tok123".to_string(),
            }),
            scope: None,
            destination: destination.to_path_buf(),
            transport: Transport::Https,
            embed_credential: true,
            exclude_patterns: Vec::new(),
            max_parallel,
            api_url: "http://unused".to_string(),
        }
    }

    fn repo(name: &str) -> RepositoryDescriptor {
        RepositoryDescriptor {
            name: name.to_string(),
            https_url: Some(format!("https://example.com/acme/{}.git", name)),
            ssh_url: None,
            visibility: Visibility::Public,
        }
    }

    #[tokio::test]
    async fn test_clone_then_update() {
        let temp = TempDir::new().unwrap();
        let settings = settings(temp.path(), 1);
        let vcs = Arc::new(RecordingVcs::default());
        let engine = SyncEngine::new(vcs.clone());

        let first = engine.sync(&StaticPlatform, &repo("alpha"), &settings).await;
        assert_eq!(first.outcome, Outcome::Cloned);
        assert_eq!(first.path, temp.path().join("alpha"));
        assert!(first.path.exists());

        let second = engine.sync(&StaticPlatform, &repo("alpha"), &settings).await;
        assert_eq!(second.outcome, Outcome::Updated);
        assert_eq!(second.path, first.path);

        let calls = vcs.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "clone https://example.com/acme/alpha.git",
                "fetch https://example.com/acme/alpha.git"
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_reason_is_redacted() {
        let temp = TempDir::new().unwrap();
        let settings = settings(temp.path(), 1);
        let vcs = Arc::new(RecordingVcs {
            fail_with: Some("could not read from https://tok123@example.com"),
            ..Default::default()
        });

        let result = SyncEngine::new(vcs)
            .sync(&StaticPlatform, &repo("alpha"), &settings)
            .await;

        let Outcome::Failed(reason) = result.outcome else {
            panic!("expected failure");
        };
        assert!(!reason.contains("tok123"));
        assert!(reason.contains("***"));
    }

    #[tokio::test]
    async fn test_missing_clone_url_fails_without_vcs_call() {
        let temp = TempDir::new().unwrap();
        let settings = settings(temp.path(), 1);
        let vcs = Arc::new(RecordingVcs::default());
        let mut linkless = repo("alpha");
        linkless.https_url = None;

        let result = SyncEngine::new(vcs.clone())
            .sync(&StaticPlatform, &linkless, &settings)
            .await;

        assert!(result.outcome.is_failure());
        assert!(vcs.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_all_is_sequential_by_default() {
        let temp = TempDir::new().unwrap();
        let settings = settings(temp.path(), 1);
        let vcs = Arc::new(RecordingVcs::default());
        let repos: Vec<_> = ["a", "b", "c", "d"].into_iter().map(repo).collect();

        let results = SyncEngine::new(vcs.clone())
            .sync_all(&StaticPlatform, &repos, &settings)
            .await;

        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert_eq!(vcs.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sync_all_respects_parallel_cap_and_order() {
        let temp = TempDir::new().unwrap();
        let settings = settings(temp.path(), 2);
        let vcs = Arc::new(RecordingVcs::default());
        let repos: Vec<_> = ["a", "b", "c", "d", "e"].into_iter().map(repo).collect();

        let results = SyncEngine::new(vcs.clone())
            .sync_all(&StaticPlatform, &repos, &settings)
            .await;

        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
        assert!(vcs.peak.load(Ordering::SeqCst) <= 2);
        assert!(results.iter().all(|r| r.outcome == Outcome::Cloned));
    }

    #[test]
    fn test_plan_reflects_destination() {
        let temp = TempDir::new().unwrap();
        let settings = settings(temp.path(), 1);
        std::fs::create_dir_all(temp.path().join("existing")).unwrap();

        assert_eq!(
            SyncEngine::plan(&repo("existing"), &settings).action,
            Action::Update
        );
        assert_eq!(SyncEngine::plan(&repo("fresh"), &settings).action, Action::Clone);
    }
}
