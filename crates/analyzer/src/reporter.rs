//! Access report generator.
//!
//! Takes a `Snapshot` and its `MembershipResolver` and produces the
//! structured report: every group with its resolved members, and every
//! resource with its access explanation. `render` turns it into markdown.

use crate::coverage::CoverageReducer;
use crate::resolver::MembershipResolver;
use orgaudit_core::{
    cmp_case_insensitive, AccessExplanation, GroupRef, Identity, Snapshot, ABSENT_PLACEHOLDER,
};
use rayon::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

/// Structured access report for one organization.
#[derive(Debug)]
pub struct Report {
    pub organization: String,
    /// The synthetic organization-wide group, always first.
    pub everybody: GroupSection,
    /// Teams sorted case-insensitively by name.
    pub groups: Vec<GroupSection>,
    /// Resources sorted case-insensitively by name.
    pub resources: Vec<ResourceAccess>,
    pub collect_time: Duration,
    pub total_time: Duration,
}

/// One group and its resolved, sorted members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSection {
    pub group: GroupRef,
    pub members: Vec<MemberLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberLine {
    pub login: Identity,
    pub email: Option<String>,
}

/// One resource and who can reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAccess {
    pub name: String,
    pub explanation: AccessExplanation,
}

impl GroupSection {
    pub fn name(&self) -> String {
        self.group.to_string()
    }
}

impl Report {
    /// Build a report from a snapshot. Warms the resolver first so that
    /// resource explanations can run in parallel against a read-only cache.
    pub fn build(snapshot: &Snapshot, resolver: &MembershipResolver<'_>) -> Self {
        resolver.warm();

        let emails: HashMap<&Identity, &str> = snapshot
            .members
            .iter()
            .filter_map(|m| m.email.as_deref().map(|email| (&m.login, email)))
            .collect();
        let lines = |members: &[Identity]| -> Vec<MemberLine> {
            members
                .iter()
                .map(|login| MemberLine {
                    login: login.clone(),
                    email: emails.get(login).map(|e| (*e).to_string()),
                })
                .collect()
        };

        let everybody = GroupSection {
            group: GroupRef::Everybody {
                organization: snapshot.organization.clone(),
            },
            members: lines(&resolver.everybody()),
        };

        let mut teams: Vec<_> = resolver.groups().collect();
        teams.sort_by(|a, b| cmp_case_insensitive(&a.name, &b.name).then(a.id.cmp(&b.id)));
        let groups: Vec<GroupSection> = teams
            .into_iter()
            .map(|team| GroupSection {
                group: GroupRef::Team {
                    id: team.id,
                    name: team.name.clone(),
                },
                members: lines(&resolver.effective_members(team.id)),
            })
            .collect();

        let mut sorted: Vec<_> = snapshot.resources.iter().collect();
        sorted.sort_by(|a, b| cmp_case_insensitive(&a.name, &b.name));

        let reducer = CoverageReducer::new(resolver, &snapshot.organization);
        let resources: Vec<ResourceAccess> = sorted
            .par_iter()
            .map(|resource| ResourceAccess {
                name: resource.name.clone(),
                explanation: reducer.explain(resource),
            })
            .collect();

        tracing::info!(
            organization = %snapshot.organization,
            groups = groups.len(),
            resources = resources.len(),
            "report built"
        );

        Report {
            organization: snapshot.organization.clone(),
            everybody,
            groups,
            resources,
            collect_time: Duration::ZERO,
            total_time: Duration::ZERO,
        }
    }

    pub fn with_timings(mut self, collect_time: Duration, total_time: Duration) -> Self {
        self.collect_time = collect_time;
        self.total_time = total_time;
        self
    }

    /// Everybody first, then teams.
    pub fn sections(&self) -> impl Iterator<Item = &GroupSection> {
        std::iter::once(&self.everybody).chain(self.groups.iter())
    }

    /// Render the report as a markdown document.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("# Groups\n\n");
        for section in self.sections() {
            out.push_str(&format!("## {}\n\n", section.name()));
            if section.members.is_empty() {
                out.push_str("*No members*\n\n");
                continue;
            }
            out.push_str("| Username | Email |\n");
            out.push_str("|----------|-------|\n");
            for line in &section.members {
                let email = line.email.as_deref().unwrap_or(ABSENT_PLACEHOLDER);
                out.push_str(&format!("| {} | {} |\n", line.login, email));
            }
            out.push('\n');
        }

        out.push_str("# Projects\n\n");
        out.push_str("| Name | Shared With |\n");
        out.push_str("|------|-------------|\n");
        for resource in &self.resources {
            out.push_str(&format!("| {} | {} |\n", resource.name, resource.explanation));
        }
        out.push('\n');

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgaudit_core::{Group, Member, Resource};

    fn sample() -> Snapshot {
        let mut s = Snapshot::new("acme");
        s.members = vec![
            Member::new("bob").with_email("bob@acme.test"),
            Member::new("alice"),
        ];
        s.teams = vec![Group::new(2, "frontend").with_parent(1), Group::new(1, "Eng")];
        s.team_members.insert(orgaudit_core::GroupId(1), vec!["bob".into()]);
        s.team_members.insert(orgaudit_core::GroupId(2), vec!["alice".into()]);
        s.resources = vec![
            Resource::new("zeta").with_collaborators(["alice", "bob"]),
            Resource::new("Alpha").with_teams([2]).with_collaborators(["alice", "dave"]),
            Resource::new("empty"),
        ];
        s
    }

    #[test]
    fn sections_and_resources_are_sorted() {
        let s = sample();
        let resolver = MembershipResolver::new(&s);
        let report = Report::build(&s, &resolver);

        let names: Vec<String> = report.sections().map(GroupSection::name).collect();
        assert_eq!(names, ["everybody in acme", "Eng", "frontend"]);

        let resources: Vec<&str> = report.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(resources, ["Alpha", "empty", "zeta"]);
    }

    #[test]
    fn renders_markdown_tables() {
        let s = sample();
        let resolver = MembershipResolver::new(&s);
        let report = Report::build(&s, &resolver);

        let expected = "\
# Groups

## everybody in acme

| Username | Email |
|----------|-------|
| alice | - |
| bob | bob@acme.test |

## Eng

| Username | Email |
|----------|-------|
| alice | - |
| bob | bob@acme.test |

## frontend

| Username | Email |
|----------|-------|
| alice | - |

# Projects

| Name | Shared With |
|------|-------------|
| Alpha | frontend, dave |
| empty | - |
| zeta | everybody in acme |

";
        assert_eq!(report.render(), expected);
    }

    #[test]
    fn empty_group_renders_placeholder() {
        let mut s = Snapshot::new("acme");
        s.teams = vec![Group::new(1, "Ghosts")];
        let resolver = MembershipResolver::new(&s);
        let rendered = Report::build(&s, &resolver).render();

        assert!(rendered.contains("## everybody in acme\n\n*No members*\n\n"));
        assert!(rendered.contains("## Ghosts\n\n*No members*\n\n"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let s = sample();
        let first = Report::build(&s, &MembershipResolver::new(&s)).render();
        let second = Report::build(&s, &MembershipResolver::new(&s)).render();
        assert_eq!(first, second);
    }
}
