use crate::auth::{Authenticator, BearerChallenge, Credentials};
use crate::error::RegistryError;
use crate::manifest::{Catalog, ManifestDocument, PlatformSelector, TagList, MANIFEST_ACCEPT};
use async_trait::async_trait;
use bytes::Bytes;
use layerindex_common::diagnostic::Error;
use layerindex_domain::registry::{ManifestSummary, RegistrySource};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const DEFAULT_REGISTRY: &str = "http://localhost:5000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// Upper bound on Link-header pages followed for a single listing.
const MAX_PAGES: usize = 10_000;

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Base url; `http://` is assumed when no scheme is given.
    pub url: String,
    pub credentials: Option<Credentials>,
    /// Applies to every request, including token fetches.
    pub timeout: Duration,
    /// Platform picked out of multi-arch manifest lists.
    pub platform: PlatformSelector,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY.to_string(),
            credentials: None,
            timeout: DEFAULT_TIMEOUT,
            platform: PlatformSelector::default(),
        }
    }
}

/// Handle on one registry's HTTP API v2.
///
/// Cloning shares the connection pool and token cache. Call [`close`] once
/// the last user is done.
///
/// [`close`]: RegistryClient::close
#[derive(Clone)]
pub struct RegistryClient {
    client: Client,
    authenticator: Arc<Mutex<Authenticator>>,
    credentials: Option<Credentials>,
    registry_url: String,
    platform: PlatformSelector,
}

impl RegistryClient {
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        let registry_url = normalize_url(&config.url)?;
        let client = Client::builder().timeout(config.timeout).build()?;

        info!(registry = %registry_url, platform = %config.platform, "Registry client created");

        Ok(Self {
            client: client.clone(),
            authenticator: Arc::new(Mutex::new(Authenticator::new(client, config.credentials.clone()))),
            credentials: config.credentials,
            registry_url,
            platform: config.platform,
        })
    }

    /// Releases the connection pool. Pending clones keep their own reference.
    pub fn close(self) {
        info!(registry = %self.registry_url, "Registry client closed");
        drop(self);
    }

    pub async fn get_manifest(&self, repo: &str, reference: &str) -> Result<Bytes, RegistryError> {
        let url = format!("{}/v2/{}/manifests/{}", self.registry_url, repo, reference);
        let resp = self.send(&url, &MANIFEST_ACCEPT).await?;
        Ok(resp.bytes().await?)
    }

    async fn get_paginated<T, F>(&self, first: String, mut extract: F) -> Result<Vec<String>, RegistryError>
    where
        T: DeserializeOwned,
        F: FnMut(T) -> Vec<String>,
    {
        let mut items = Vec::new();
        let mut url = first;

        for _ in 0..MAX_PAGES {
            let resp = self.send(&url, &[]).await?;
            let next = resp
                .headers()
                .get(header::LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(next_link)
                .map(|link| self.resolve(&link));

            let body = resp.bytes().await?;
            let page: T = serde_json::from_slice(&body)
                .map_err(|e| RegistryError::Decode(format!("{}: {}", url, e)))?;
            items.extend(extract(page));

            match next {
                Some(next) if next != url => url = next,
                _ => return Ok(items),
            }
        }

        Err(RegistryError::Unavailable(format!("{} did not stop paginating", url)))
    }

    /// Link targets are absolute or root-relative, never relative to a
    /// path prefix in the configured url.
    fn resolve(&self, link: &str) -> String {
        if link.starts_with("http://") || link.starts_with("https://") {
            link.to_string()
        } else {
            format!("{}/{}", origin(&self.registry_url), link.trim_start_matches('/'))
        }
    }

    async fn send(&self, url: &str, accept: &[&str]) -> Result<Response, RegistryError> {
        let resp = self.request(url, accept, None).send().await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return check_status(resp, url);
        }

        let challenge = resp
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(BearerChallenge::parse)
            .ok_or_else(|| RegistryError::AuthenticationFailed(format!("{} rejected the credentials", url)))?;

        debug!(realm = %challenge.realm, scope = ?challenge.scope, "Registry requested a bearer token");
        let token = self.authenticator.lock().await.get_token(&challenge).await?;
        let retry = self.request(url, accept, Some(&token)).send().await?;

        if retry.status() == StatusCode::UNAUTHORIZED {
            self.authenticator.lock().await.invalidate(&challenge);
        }
        check_status(retry, url)
    }

    fn request(&self, url: &str, accept: &[&str], token: Option<&str>) -> RequestBuilder {
        let mut req = self.client.get(url);
        if !accept.is_empty() {
            req = req.header(header::ACCEPT, accept.join(", "));
        }
        match (token, &self.credentials) {
            (Some(token), _) => req.bearer_auth(token),
            (None, Some(creds)) => req.basic_auth(&creds.username, Some(&creds.password)),
            (None, None) => req,
        }
    }

    async fn fetch_summary(&self, repository: &str, tag: &str) -> Result<ManifestSummary, RegistryError> {
        let bytes = self.get_manifest(repository, tag).await?;

        let manifest = match ManifestDocument::from_slice(&bytes)? {
            ManifestDocument::Image(m) => m,
            ManifestDocument::List(list) => {
                let target = list.select(&self.platform).ok_or_else(|| {
                    RegistryError::NotFound(format!("{}:{} has no {} manifest", repository, tag, self.platform))
                })?;
                debug!(repository, tag, digest = %target.digest, "Resolved manifest list entry");
                match ManifestDocument::from_slice(&self.get_manifest(repository, &target.digest).await?)? {
                    ManifestDocument::Image(m) => m,
                    ManifestDocument::List(_) => {
                        return Err(RegistryError::Decode(format!(
                            "{}@{} is a nested manifest list",
                            repository, target.digest
                        )))
                    }
                }
            }
        };

        manifest.summary()
    }
}

#[async_trait]
impl RegistrySource for RegistryClient {
    async fn list_repositories(&self) -> layerindex_common::Result<Vec<String>> {
        let url = format!("{}/v2/_catalog", self.registry_url);
        self.get_paginated(url, |page: Catalog| page.repositories)
            .await
            .map_err(Error::new)
    }

    async fn list_tags(&self, repository: &str) -> layerindex_common::Result<Vec<String>> {
        let url = format!("{}/v2/{}/tags/list", self.registry_url, repository);
        self.get_paginated(url, |page: TagList| page.tags.unwrap_or_default())
            .await
            .map_err(Error::new)
    }

    async fn fetch_manifest(&self, repository: &str, tag: &str) -> layerindex_common::Result<ManifestSummary> {
        self.fetch_summary(repository, tag).await.map_err(Error::new)
    }
}

fn check_status(resp: Response, url: &str) -> Result<Response, RegistryError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else if status == StatusCode::NOT_FOUND {
        Err(RegistryError::NotFound(url.to_string()))
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(RegistryError::AuthenticationFailed(format!("{} returned {}", url, status)))
    } else {
        Err(RegistryError::Unavailable(format!("{} returned {}", url, status)))
    }
}

fn normalize_url(raw: &str) -> Result<String, RegistryError> {
    let invalid = || RegistryError::InvalidUrl(raw.to_string());
    let trimmed = raw.trim();
    let (scheme, rest) = match trimmed.split_once("://") {
        Some((scheme @ ("http" | "https"), rest)) => (scheme, rest),
        Some(_) => return Err(invalid()),
        None => ("http", trimmed),
    };

    let rest = rest.trim_end_matches('/');
    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() || rest.contains(char::is_whitespace) {
        return Err(invalid());
    }
    Ok(format!("{}://{}", scheme, rest))
}

/// `scheme://host[:port]` of a normalized url.
fn origin(url: &str) -> &str {
    let host_start = url.find("://").map_or(0, |i| i + 3);
    match url[host_start..].find('/') {
        Some(i) => &url[..host_start + i],
        None => url,
    }
}

/// Extracts the target of `rel="next"` from a `Link` header.
fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| matches!(p.trim(), "rel=\"next\"" | "rel=next"));
        if !is_next {
            return None;
        }
        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        Some(target.to_string())
    })
}
