//! Run orchestration
//!
//! A run is strictly phased: preflight the VCS, exhaust the listing, then
//! synchronize. Any error before the last phase aborts the run with nothing
//! touched on disk beyond the destination folder itself.

use anyhow::{Context, Result};
use futures::TryStreamExt;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::discovery::{Platform, RepositoryDescriptor};
use crate::git::Vcs;
use crate::settings::Settings;
use crate::sync::{Outcome, PlannedAction, SyncEngine, SyncResult};

/// Aggregated outcome of a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub cloned: usize,
    pub updated: usize,
    /// Failed repositories with their reasons, in listing order
    pub failed: Vec<(String, String)>,
    pub duration: Duration,
    pub results: Vec<SyncResult>,
}

impl RunSummary {
    pub fn from_results(results: Vec<SyncResult>, duration: Duration) -> Self {
        let mut summary = RunSummary {
            duration,
            ..Default::default()
        };

        for result in &results {
            match &result.outcome {
                Outcome::Cloned => summary.cloned += 1,
                Outcome::Updated => summary.updated += 1,
                Outcome::Failed(reason) => summary
                    .failed
                    .push((result.name.clone(), reason.clone())),
            }
        }

        summary.results = results;
        summary
    }

    pub fn successful(&self) -> usize {
        self.cloned + self.updated
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cloned, {} updated, {} failed",
            self.cloned,
            self.updated,
            self.failed.len()
        )
    }
}

/// List every repository in scope, failing on the first listing error
pub async fn collect_repositories(
    platform: &dyn Platform,
    settings: &Settings,
) -> Result<Vec<RepositoryDescriptor>> {
    let repositories: Vec<RepositoryDescriptor> = platform
        .list_repositories(settings)
        .try_collect()
        .await
        .with_context(|| {
            format!(
                "Failed to list {} repositories for '{}'",
                platform.kind(),
                settings.account.identifier()
            )
        })?;

    info!("Discovered {} repositories", repositories.len());
    Ok(repositories)
}

/// Mirror every repository in scope into `settings.destination`
pub async fn run(
    platform: &dyn Platform,
    vcs: Arc<dyn Vcs>,
    settings: &Settings,
) -> Result<RunSummary> {
    let start_time = Instant::now();

    vcs.check_available()
        .await
        .context("git is required to mirror repositories")?;

    tokio::fs::create_dir_all(&settings.destination)
        .await
        .with_context(|| {
            format!(
                "Failed to create destination folder {}",
                settings.destination.display()
            )
        })?;

    let repositories = collect_repositories(platform, settings).await?;

    let results = SyncEngine::new(vcs)
        .sync_all(platform, &repositories, settings)
        .await;

    let summary = RunSummary::from_results(results, start_time.elapsed());
    info!(
        "Sync completed in {:.2}s: {}",
        summary.duration.as_secs_f64(),
        summary
    );

    Ok(summary)
}

/// List and plan without running any VCS command or creating directories
pub async fn dry_run(platform: &dyn Platform, settings: &Settings) -> Result<Vec<PlannedAction>> {
    let repositories = collect_repositories(platform, settings).await?;

    Ok(repositories
        .iter()
        .map(|repo| SyncEngine::plan(repo, settings))
        .collect())
}
