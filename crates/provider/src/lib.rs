//! Directory ingestion for orgaudit: provider abstraction, GitHub REST
//! client, snapshot collection, and credential resolution.

pub mod collector;
pub mod config;
pub mod credentials;
pub mod github;

use async_trait::async_trait;
use config::DEFAULT_CONCURRENCY;
use orgaudit_core::error::OrgAuditResult;
use orgaudit_core::{Group, GroupId, Identity};

pub use collector::Collector;
pub use config::ProviderConfig;
pub use credentials::{resolve_token, Token, TokenSource};
pub use github::GitHubProvider;

/// Abstraction for fetching organization data from any directory service.
///
/// Listing methods return every page. A repository whose teams or
/// collaborators cannot be found yields an empty list rather than an error.
#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    /// How many calls the collector may keep in flight against this provider.
    fn max_concurrent(&self) -> usize {
        DEFAULT_CONCURRENCY
    }

    async fn list_members(&self, org: &str) -> OrgAuditResult<Vec<Identity>>;
    /// Public email for `login`, if the user exposes one.
    async fn get_user_email(&self, login: &Identity) -> OrgAuditResult<Option<String>>;
    async fn list_teams(&self, org: &str) -> OrgAuditResult<Vec<Group>>;
    /// Direct members only; nested teams are resolved later.
    async fn list_team_members(&self, org: &str, team: &Group) -> OrgAuditResult<Vec<Identity>>;
    async fn list_repositories(&self, org: &str) -> OrgAuditResult<Vec<String>>;
    async fn list_repository_teams(&self, org: &str, repo: &str) -> OrgAuditResult<Vec<GroupId>>;
    async fn list_repository_collaborators(
        &self,
        org: &str,
        repo: &str,
    ) -> OrgAuditResult<Vec<Identity>>;
}
