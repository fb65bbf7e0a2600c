//! GitHub REST provider backed by reqwest.

use crate::config::ProviderConfig;
use crate::DirectoryProvider;
use async_trait::async_trait;
use orgaudit_core::error::{OrgAuditError, OrgAuditResult};
use orgaudit_core::{Group, GroupId, Identity};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;

/// Fetches organization data from the GitHub REST API.
///
/// ```ignore
/// let provider = GitHubProvider::new(token, ProviderConfig::default())?;
/// let teams = provider.list_teams("acme").await?;
/// ```
pub struct GitHubProvider {
    client: reqwest::Client,
    config: ProviderConfig,
    token: String,
}

// ---------------------------------------------------------------------------
// Wire types (only the fields we read)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UserRecord {
    login: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TeamParent {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct TeamRecord {
    id: u64,
    name: String,
    slug: String,
    #[serde(default)]
    parent: Option<TeamParent>,
}

#[derive(Debug, Deserialize)]
struct RepoRecord {
    name: String,
}

impl From<TeamRecord> for Group {
    fn from(t: TeamRecord) -> Self {
        Group {
            id: GroupId(t.id),
            name: t.name,
            slug: t.slug,
            parent: t.parent.map(|p| GroupId(p.id)),
        }
    }
}

/// What to do when a listing endpoint answers 404.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Missing {
    Fail,
    Empty,
}

impl GitHubProvider {
    pub fn new(token: impl Into<String>, config: ProviderConfig) -> OrgAuditResult<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(OrgAuditError::Credential("GitHub token must not be empty".into()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| OrgAuditError::Provider(format!("failed to build HTTP client: {e}")))?;

        tracing::debug!(api_url = %config.api_url, "github provider ready");

        Ok(Self {
            client,
            config,
            token,
        })
    }

    /// `api_url` + percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> OrgAuditResult<Url> {
        let mut url = self.config.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                OrgAuditError::InvalidInput(format!("API URL {} cannot be a base", self.config.api_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn first_page(&self, segments: &[&str]) -> OrgAuditResult<Url> {
        let mut url = self.endpoint(segments)?;
        url.query_pairs_mut()
            .append_pair("per_page", &self.config.per_page.to_string())
            .append_pair("page", "1");
        Ok(url)
    }

    /// Follows `Link: rel="next"` until exhausted.
    async fn list<T: DeserializeOwned>(
        &self,
        mut url: Url,
        missing: Missing,
    ) -> OrgAuditResult<Vec<T>> {
        let mut items = Vec::new();
        let mut pages = 0usize;

        loop {
            let Some(response) = self.get(&url).await? else {
                if missing == Missing::Empty {
                    tracing::debug!(%url, "listing not found, treating as empty");
                    return Ok(items);
                }
                return Err(OrgAuditError::Provider(format!("{url} not found")));
            };

            let next = next_link(response.headers());
            let page: Vec<T> = response.json().await.map_err(|e| {
                OrgAuditError::Provider(format!("failed to decode {url}: {e}"))
            })?;
            items.extend(page);
            pages += 1;

            match next {
                Some(next) => url = next,
                None => break,
            }
        }

        tracing::debug!(%url, pages, items = items.len(), "listing fetched");
        Ok(items)
    }

    /// GET with retries. `Ok(None)` means 404.
    ///
    /// Rate-limit responses sleep for the period the server asks for and
    /// retry the same URL, up to `max_rate_limit_waits` times. Transport
    /// errors and 5xx back off exponentially, up to `max_retries` times.
    async fn get(&self, url: &Url) -> OrgAuditResult<Option<Response>> {
        let mut attempt = 0u32;
        let mut waits = 0u32;
        loop {
            let result = self
                .client
                .get(url.clone())
                .bearer_auth(&self.token)
                .send()
                .await;

            let response = match result {
                Ok(response) => response,
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.backoff(attempt);
                    tracing::warn!(%url, error = %e, attempt, ?delay, "request failed, retrying");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(e) => {
                    return Err(OrgAuditError::Provider(format!("GET {url} failed: {e}")));
                }
            };

            let status = response.status();
            if status.is_success() {
                return Ok(Some(response));
            }
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }

            if waits < self.config.max_rate_limit_waits {
                if let Some(wait) = rate_limit_wait(status, response.headers(), &self.config) {
                    waits += 1;
                    tracing::warn!(%url, %status, ?wait, waits, "rate limited, sleeping");
                    tokio::time::sleep(wait).await;
                    continue;
                }
            }

            if status.is_server_error() && attempt < self.config.max_retries {
                attempt += 1;
                let delay = self.config.backoff(attempt);
                tracing::warn!(%url, %status, attempt, ?delay, "server error, retrying");
                tokio::time::sleep(delay).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(OrgAuditError::Provider(format!(
                "GET {url} returned {status}: {}",
                body.trim()
            )));
        }
    }
}

#[async_trait]
impl DirectoryProvider for GitHubProvider {
    fn max_concurrent(&self) -> usize {
        self.config.max_concurrent
    }

    async fn list_members(&self, org: &str) -> OrgAuditResult<Vec<Identity>> {
        let url = self.first_page(&["orgs", org, "members"])?;
        let users: Vec<UserRecord> = self.list(url, Missing::Fail).await?;
        tracing::info!(org, members = users.len(), "fetched members");
        Ok(users.into_iter().map(|u| Identity::new(u.login)).collect())
    }

    async fn get_user_email(&self, login: &Identity) -> OrgAuditResult<Option<String>> {
        let url = self.endpoint(&["users", login.as_str()])?;
        let Some(response) = self.get(&url).await? else {
            return Ok(None);
        };
        let user: UserRecord = response
            .json()
            .await
            .map_err(|e| OrgAuditError::Provider(format!("failed to decode {url}: {e}")))?;
        Ok(user.email.filter(|email| !email.is_empty()))
    }

    async fn list_teams(&self, org: &str) -> OrgAuditResult<Vec<Group>> {
        let url = self.first_page(&["orgs", org, "teams"])?;
        let teams: Vec<TeamRecord> = self.list(url, Missing::Fail).await?;
        tracing::info!(org, teams = teams.len(), "fetched teams");
        Ok(teams.into_iter().map(Group::from).collect())
    }

    async fn list_team_members(&self, org: &str, team: &Group) -> OrgAuditResult<Vec<Identity>> {
        let url = self.first_page(&["orgs", org, "teams", &team.slug, "members"])?;
        let users: Vec<UserRecord> = self.list(url, Missing::Fail).await?;
        Ok(users.into_iter().map(|u| Identity::new(u.login)).collect())
    }

    async fn list_repositories(&self, org: &str) -> OrgAuditResult<Vec<String>> {
        let url = self.first_page(&["orgs", org, "repos"])?;
        let repos: Vec<RepoRecord> = self.list(url, Missing::Fail).await?;
        tracing::info!(org, repos = repos.len(), "fetched repositories");
        Ok(repos.into_iter().map(|r| r.name).collect())
    }

    async fn list_repository_teams(&self, org: &str, repo: &str) -> OrgAuditResult<Vec<GroupId>> {
        let url = self.first_page(&["repos", org, repo, "teams"])?;
        let teams: Vec<TeamRecord> = self.list(url, Missing::Empty).await?;
        Ok(teams.into_iter().map(|t| GroupId(t.id)).collect())
    }

    async fn list_repository_collaborators(
        &self,
        org: &str,
        repo: &str,
    ) -> OrgAuditResult<Vec<Identity>> {
        let url = self.first_page(&["repos", org, repo, "collaborators"])?;
        let users: Vec<UserRecord> = self.list(url, Missing::Empty).await?;
        Ok(users.into_iter().map(|u| Identity::new(u.login)).collect())
    }
}

/// Extracts the `rel="next"` target from a `Link` header.
fn next_link(headers: &HeaderMap) -> Option<Url> {
    let link = headers.get(header::LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        if !params.split(';').any(|p| p.trim() == r#"rel="next""#) {
            return None;
        }
        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        Url::parse(target).ok()
    })
}

/// How long to wait before retrying, if `status` + headers indicate a rate
/// limit. A plain 403 without rate-limit headers is a permission error.
fn rate_limit_wait(status: StatusCode, headers: &HeaderMap, config: &ProviderConfig) -> Option<Duration> {
    if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }

    if let Some(secs) = header_u64(headers, "retry-after") {
        return Some(Duration::from_secs(secs));
    }

    if header_u64(headers, "x-ratelimit-remaining") == Some(0) {
        let Some(reset) = header_u64(headers, "x-ratelimit-reset") else {
            return Some(config.rate_limit_wait);
        };
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        return Some(Duration::from_secs(reset.saturating_sub(now) + 1));
    }

    (status == StatusCode::TOO_MANY_REQUESTS).then_some(config.rate_limit_wait)
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
