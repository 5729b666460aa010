//! Bitbucket Cloud workspace listing
//!
//! The 2.0 API pages with an absolute `next` link; the listing simply follows
//! it until it is absent.

use anyhow::{Context, Result};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::discovery::{
    is_in_scope, with_userinfo, Platform, PlatformKind, RepositoryDescriptor, Transport,
    Visibility,
};
use crate::error::ListError;
use crate::settings::Settings;

const PAGE_LEN: u32 = 100;

// Username Bitbucket expects in clone URLs authenticated by a bare access token
const TOKEN_AUTH_USER: &str = "x-token-auth";

/// Bitbucket REST client
pub struct Bitbucket {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct BbPage {
    #[serde(default)]
    values: Vec<BbRepo>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BbRepo {
    name: String,
    #[serde(default)]
    is_private: bool,
    #[serde(default)]
    links: BbLinks,
}

#[derive(Debug, Default, Deserialize)]
struct BbLinks {
    #[serde(default)]
    clone: Vec<BbCloneLink>,
}

#[derive(Debug, Deserialize)]
struct BbCloneLink {
    name: String,
    href: String,
}

#[derive(Debug, Deserialize)]
struct BbErrorBody {
    error: BbErrorDetail,
}

#[derive(Debug, Deserialize)]
struct BbErrorDetail {
    message: String,
}

impl BbRepo {
    fn link(&self, kind: &str) -> Option<String> {
        self.links
            .clone
            .iter()
            .find(|link| link.name == kind)
            .map(|link| link.href.clone())
    }
}

impl From<BbRepo> for RepositoryDescriptor {
    fn from(repo: BbRepo) -> Self {
        RepositoryDescriptor {
            https_url: repo.link("https"),
            ssh_url: repo.link("ssh"),
            visibility: if repo.is_private {
                Visibility::Private
            } else {
                Visibility::Public
            },
            name: repo.name,
        }
    }
}

impl Bitbucket {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("repomirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create Bitbucket client")?;

        Ok(Self { client })
    }

    fn first_page(settings: &Settings) -> String {
        format!(
            "{}/repositories/{}?pagelen={}",
            settings.api_url.trim_end_matches('/'),
            settings.account.identifier(),
            PAGE_LEN
        )
    }

    /// Fetch the page at `url`; no URL means the previous page was the last
    async fn next_page<'a>(
        &'a self,
        settings: &'a Settings,
        url: Option<String>,
    ) -> Result<Option<(Vec<BbRepo>, Option<String>)>, ListError> {
        let Some(url) = url else {
            return Ok(None);
        };

        debug!("Fetching {}", url);

        let mut request = self.client.get(&url);
        if let Some(credential) = &settings.credential {
            request = match &credential.user {
                Some(user) => request.basic_auth(user, Some(&credential.token)),
                None => request.bearer_auth(&credential.token),
            };
        }

        let response = request.send().await.map_err(|e| ListError::Network {
            platform: PlatformKind::Bitbucket,
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body, settings.account.identifier()));
        }

        let page: BbPage = response.json().await.map_err(|e| ListError::Api {
            platform: PlatformKind::Bitbucket,
            status: status.as_u16(),
            message: format!("unexpected response body: {}", e),
        })?;

        Ok(Some((page.values, page.next)))
    }
}

impl Platform for Bitbucket {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Bitbucket
    }

    fn list_repositories<'a>(
        &'a self,
        settings: &'a Settings,
    ) -> BoxStream<'a, Result<RepositoryDescriptor, ListError>> {
        info!("Listing repositories for Bitbucket workspace '{}'", settings.account.identifier());

        let transport = settings.transport;
        stream::try_unfold(Some(Self::first_page(settings)), move |url| {
            self.next_page(settings, url)
        })
        .map_ok(move |values| {
            stream::iter(
                values
                    .into_iter()
                    .map(RepositoryDescriptor::from)
                    .filter(move |repo| {
                        if repo.url_for(transport).is_none() {
                            warn!("No {:?} clone URL found for '{}', skipping", transport, repo.name);
                            return false;
                        }
                        is_in_scope(repo, settings)
                    })
                    .map(Ok),
            )
        })
        .try_flatten()
        .boxed()
    }

    fn clone_url(&self, repo: &RepositoryDescriptor, settings: &Settings) -> Option<String> {
        let url = repo.url_for(settings.transport)?;

        match (settings.transport, &settings.credential) {
            (Transport::Https, Some(credential)) if settings.embed_credential => {
                let user = credential.user.as_deref().unwrap_or(TOKEN_AUTH_USER);
                Some(with_userinfo(url, user, Some(&credential.token)))
            }
            _ => Some(url.to_string()),
        }
    }
}

fn classify_status(status: StatusCode, body: &str, workspace: &str) -> ListError {
    let message = serde_json::from_str::<BbErrorBody>(body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ListError::Authentication {
            platform: PlatformKind::Bitbucket,
            status: status.as_u16(),
            message,
        },
        StatusCode::TOO_MANY_REQUESTS => ListError::RateLimited {
            platform: PlatformKind::Bitbucket,
            message,
        },
        StatusCode::NOT_FOUND => ListError::NotFound {
            platform: PlatformKind::Bitbucket,
            target: workspace.to_string(),
        },
        _ => ListError::Api {
            platform: PlatformKind::Bitbucket,
            status: status.as_u16(),
            message,
        },
    }
}
