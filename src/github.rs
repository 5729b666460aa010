use anyhow::{Context, Result};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use octocrab::service::middleware::retry::RetryConfig;
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::discovery::{
    is_in_scope, with_userinfo, Platform, PlatformKind, RepositoryDescriptor, Transport,
    Visibility,
};
use crate::error::ListError;
use crate::settings::{AccountScope, Settings};

const PER_PAGE: u8 = 100;

// Runaway pagination guard
const MAX_PAGES: u32 = 1000;

/// GitHub client wrapper producing repository descriptors
pub struct GitHub {
    client: Octocrab,
}

/// Which listing endpoint serves the requested account and scope
#[derive(Debug, Clone, PartialEq)]
struct ListRequest {
    route: String,
    target: String,
    repo_type: Option<&'static str>,
    visibility: Option<&'static str>,
    affiliation: Option<&'static str>,
}

#[derive(Serialize)]
struct ListQuery {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    repo_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    visibility: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    affiliation: Option<&'static str>,
    per_page: u8,
    page: u32,
}

/// The subset of the repository payload we need
#[derive(Debug, Deserialize)]
struct GhRepo {
    name: String,
    clone_url: Option<String>,
    ssh_url: Option<String>,
    #[serde(default)]
    private: bool,
}

impl From<GhRepo> for RepositoryDescriptor {
    fn from(repo: GhRepo) -> Self {
        RepositoryDescriptor {
            name: repo.name,
            https_url: repo.clone_url,
            ssh_url: repo.ssh_url,
            visibility: if repo.private {
                Visibility::Private
            } else {
                Visibility::Public
            },
        }
    }
}

impl ListRequest {
    fn for_settings(settings: &Settings) -> Self {
        let scope = settings.scope.unwrap_or_default();

        match &settings.account {
            AccountScope::Organization(org) => Self {
                route: format!("/orgs/{}/repos", org),
                target: org.clone(),
                repo_type: Some(scope.as_str()),
                visibility: None,
                affiliation: None,
            },
            // The authenticated endpoint is the only one that returns private
            // repositories. `type` cannot be combined with visibility/affiliation.
            AccountScope::User(user) if settings.credential.is_some() => Self {
                route: "/user/repos".to_string(),
                target: user.clone(),
                repo_type: None,
                visibility: Some(scope.as_str()),
                affiliation: Some("owner"),
            },
            AccountScope::User(user) | AccountScope::Workspace(user) => Self {
                route: format!("/users/{}/repos", user),
                target: user.clone(),
                repo_type: Some("owner"),
                visibility: None,
                affiliation: None,
            },
        }
    }

    fn query(&self, page: u32) -> ListQuery {
        ListQuery {
            repo_type: self.repo_type,
            visibility: self.visibility,
            affiliation: self.affiliation,
            per_page: PER_PAGE,
            page,
        }
    }
}

impl GitHub {
    /// Create a client for the API root and credential in the settings
    pub fn new(settings: &Settings) -> Result<Self> {
        // Each page is requested exactly once
        let mut builder = Octocrab::builder().add_retry_config(RetryConfig::None);
        if let Some(token) = settings.token() {
            builder = builder.personal_token(token.to_string());
        }

        let client = builder
            .base_uri(settings.api_url.as_str())
            .with_context(|| format!("Invalid GitHub API URL: {}", settings.api_url))?
            .build()
            .context("Failed to create GitHub client")?;

        Ok(Self { client })
    }

    /// Fetch one page; an empty page ends the listing
    async fn next_page(
        &self,
        request: ListRequest,
        page: Option<u32>,
    ) -> Result<Option<(Vec<GhRepo>, Option<u32>)>, ListError> {
        let Some(page) = page else {
            return Ok(None);
        };

        debug!("Fetching {} page {}", request.route, page);

        let items: Vec<GhRepo> = self
            .client
            .get(&request.route, Some(&request.query(page)))
            .await
            .map_err(|e| classify_error(e, &request.target))?;

        if items.is_empty() {
            return Ok(None);
        }

        let next = if page >= MAX_PAGES {
            warn!("Reached maximum pagination limit ({} pages) for {}", MAX_PAGES, request.target);
            None
        } else {
            Some(page + 1)
        };

        Ok(Some((items, next)))
    }
}

impl Platform for GitHub {
    fn kind(&self) -> PlatformKind {
        PlatformKind::GitHub
    }

    fn list_repositories<'a>(
        &'a self,
        settings: &'a Settings,
    ) -> BoxStream<'a, Result<RepositoryDescriptor, ListError>> {
        let request = ListRequest::for_settings(settings);
        info!("Listing GitHub repositories from {}", request.route);

        stream::try_unfold(Some(1u32), move |page| self.next_page(request.clone(), page))
            .map_ok(move |items| {
                stream::iter(
                    items
                        .into_iter()
                        .map(RepositoryDescriptor::from)
                        .filter(move |repo| is_in_scope(repo, settings))
                        .map(Ok),
                )
            })
            .try_flatten()
            .boxed()
    }

    fn clone_url(&self, repo: &RepositoryDescriptor, settings: &Settings) -> Option<String> {
        let url = repo.url_for(settings.transport)?;

        match (settings.transport, settings.token()) {
            (Transport::Https, Some(token)) if settings.embed_credential => {
                Some(with_userinfo(url, token, None))
            }
            _ => Some(url.to_string()),
        }
    }
}

/// Map an API failure onto the listing error taxonomy
fn classify_error(err: octocrab::Error, target: &str) -> ListError {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            let status = source.status_code.as_u16();
            let message = source.message.clone();

            match status {
                429 => ListError::RateLimited {
                    platform: PlatformKind::GitHub,
                    message,
                },
                403 if message.to_lowercase().contains("rate limit") => ListError::RateLimited {
                    platform: PlatformKind::GitHub,
                    message,
                },
                401 | 403 => ListError::Authentication {
                    platform: PlatformKind::GitHub,
                    status,
                    message,
                },
                404 => ListError::NotFound {
                    platform: PlatformKind::GitHub,
                    target: target.to_string(),
                },
                _ => ListError::Api {
                    platform: PlatformKind::GitHub,
                    status,
                    message,
                },
            }
        }
        other => ListError::Network {
            platform: PlatformKind::GitHub,
            message: other.to_string(),
        },
    }
}
