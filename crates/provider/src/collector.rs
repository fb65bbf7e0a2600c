//! Concurrent snapshot collector.
//!
//! Pulls members, teams, team membership, repositories and repository
//! access from a [`DirectoryProvider`] and assembles an immutable
//! [`Snapshot`]. Per-user, per-team and per-repository calls fan out via
//! `JoinSet`, throttled by a semaphore.

use crate::DirectoryProvider;
use orgaudit_core::error::{OrgAuditError, OrgAuditResult};
use orgaudit_core::{Group, GroupId, Identity, Member, Resource, Snapshot};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Snapshot collector.
///
/// ```ignore
/// let collector = Collector::new(provider).with_concurrency(8);
/// let snapshot = collector.collect("acme").await?;
/// ```
pub struct Collector<P> {
    provider: Arc<P>,
    max_concurrent: usize,
    fetch_emails: bool,
}

impl<P: DirectoryProvider + 'static> Collector<P> {
    /// Concurrency starts at the provider's own limit.
    pub fn new(provider: P) -> Self {
        Self {
            max_concurrent: provider.max_concurrent().max(1),
            provider: Arc::new(provider),
            fetch_emails: true,
        }
    }

    /// Override max concurrent directory calls.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.max_concurrent = n.max(1);
        self
    }

    /// Skip the per-member email lookup (one request per member).
    pub fn with_emails(mut self, enabled: bool) -> Self {
        self.fetch_emails = enabled;
        self
    }

    /// Collects a full snapshot of `org`.
    ///
    /// Missing emails are tolerated; any other failed call aborts.
    pub async fn collect(&self, org: &str) -> OrgAuditResult<Snapshot> {
        if org.is_empty() {
            return Err(OrgAuditError::InvalidInput("organization must not be empty".into()));
        }

        tracing::info!(org, concurrency = self.max_concurrent, "collecting snapshot");

        let logins = self.provider.list_members(org).await?;
        let members = if self.fetch_emails {
            self.attach_emails(logins).await?
        } else {
            logins.into_iter().map(Member::new).collect()
        };

        let teams = self.provider.list_teams(org).await?;
        let team_members = self.fetch_team_members(org, &teams).await?;

        let repos = self.provider.list_repositories(org).await?;
        let resources = self.fetch_repo_access(org, repos).await?;

        let snapshot = Snapshot {
            organization: org.to_string(),
            members,
            teams,
            team_members: team_members.into_iter().collect(),
            resources,
        };

        tracing::info!(
            org,
            members = snapshot.members.len(),
            teams = snapshot.teams.len(),
            resources = snapshot.resources.len(),
            "snapshot collected"
        );
        Ok(snapshot)
    }

    async fn attach_emails(&self, logins: Vec<Identity>) -> OrgAuditResult<Vec<Member>> {
        let emails = self
            .fan_out(logins.clone(), |provider, login| async move {
                match provider.get_user_email(&login).await {
                    Ok(email) => Ok(email),
                    Err(e) => {
                        tracing::warn!(login = %login, error = %e, "email lookup failed");
                        Ok(None)
                    }
                }
            })
            .await?;

        let missing = emails.iter().filter(|e| e.is_none()).count();
        if missing > 0 {
            tracing::info!(missing, "some members have no public email");
        }

        Ok(logins
            .into_iter()
            .zip(emails)
            .map(|(login, email)| Member { login, email })
            .collect())
    }

    async fn fetch_team_members(
        &self,
        org: &str,
        teams: &[Group],
    ) -> OrgAuditResult<Vec<(GroupId, Vec<Identity>)>> {
        let org = org.to_string();
        let members = self
            .fan_out(teams.to_vec(), move |provider, team| {
                let org = org.clone();
                async move { provider.list_team_members(&org, &team).await }
            })
            .await?;

        tracing::info!(teams = teams.len(), "fetched team members");
        Ok(teams.iter().map(|t| t.id).zip(members).collect())
    }

    async fn fetch_repo_access(&self, org: &str, repos: Vec<String>) -> OrgAuditResult<Vec<Resource>> {
        let org = org.to_string();
        let resources = self
            .fan_out(repos, move |provider, name| {
                let org = org.clone();
                async move {
                    let teams = provider.list_repository_teams(&org, &name).await?;
                    let collaborators = provider.list_repository_collaborators(&org, &name).await?;
                    Ok::<_, OrgAuditError>(Resource {
                        name,
                        teams: teams.into_iter().collect(),
                        collaborators,
                    })
                }
            })
            .await?;

        tracing::info!(repos = resources.len(), "fetched repository access");
        Ok(resources)
    }

    /// Runs `task` for every input with bounded concurrency and returns the
    /// outputs in input order.
    async fn fan_out<I, O, F, Fut>(&self, inputs: Vec<I>, task: F) -> OrgAuditResult<Vec<O>>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(Arc<P>, I) -> Fut,
        Fut: Future<Output = OrgAuditResult<O>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();
        let total = inputs.len();

        for (index, input) in inputs.into_iter().enumerate() {
            let sem = Arc::clone(&semaphore);
            let fut = task(Arc::clone(&self.provider), input);
            tasks.spawn(async move {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|e| OrgAuditError::Internal(format!("semaphore closed: {e}")))?;
                fut.await.map(|out| (index, out))
            });
        }

        let mut slots: Vec<Option<O>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (index, out) = joined
                .map_err(|e| OrgAuditError::Internal(format!("collector task panicked: {e}")))??;
            slots[index] = Some(out);
        }

        slots
            .into_iter()
            .map(|slot| slot.ok_or_else(|| OrgAuditError::Internal("collector task lost".into())))
            .collect()
    }
}
