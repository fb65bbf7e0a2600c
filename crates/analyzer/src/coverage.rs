//! Access coverage reduction: explain a resource's accessor list as named
//! groups plus leftover individuals.
//!
//! This is a covering, not a minimum set cover. Every group explicitly
//! granted on the resource is listed (as long as it has members), even
//! when its members overlap other grantees or never appear in the
//! accessor list. Only individuals are suppressed when a listed group
//! already accounts for them.

use crate::resolver::MembershipResolver;
use orgaudit_core::{
    cmp_case_insensitive, AccessExplanation, Grantee, Group, GroupRef, Identity, Resource,
};
use std::collections::HashSet;

/// Explains resource access using a shared [`MembershipResolver`].
///
/// Holds only borrowed, read-only state so one reducer can be shared
/// across worker threads once the resolver has been warmed.
pub struct CoverageReducer<'r, 'a> {
    resolver: &'r MembershipResolver<'a>,
    organization: &'r str,
}

impl<'r, 'a> CoverageReducer<'r, 'a> {
    pub fn new(resolver: &'r MembershipResolver<'a>, organization: &'r str) -> Self {
        Self {
            resolver,
            organization,
        }
    }

    /// Produces the ordered grantee list for `resource`:
    /// organization-wide group (if everyone has access), then explicitly
    /// granted teams by name, then uncovered individuals by login.
    pub fn explain(&self, resource: &Resource) -> AccessExplanation {
        let access: HashSet<&Identity> = resource.collaborators.iter().collect();
        if access.is_empty() {
            return AccessExplanation::NoAccess;
        }

        let mut uncovered = access.clone();
        let mut grantees = Vec::new();

        let everybody = self.resolver.everybody();
        if everybody.iter().all(|m| access.contains(m)) {
            grantees.push(Grantee::Group(GroupRef::Everybody {
                organization: self.organization.to_string(),
            }));
            for member in everybody.iter() {
                uncovered.remove(member);
            }
        }

        for group in self.granted_groups(resource) {
            let members = self.resolver.effective_members(group.id);
            if members.is_empty() {
                tracing::debug!(resource = %resource.name, team = %group.name, "granted team has no members");
                continue;
            }
            grantees.push(Grantee::Group(GroupRef::Team {
                id: group.id,
                name: group.name.clone(),
            }));
            for member in members.iter() {
                uncovered.remove(member);
            }
        }

        let mut individuals: Vec<&Identity> = uncovered.into_iter().collect();
        individuals.sort_unstable();
        grantees.extend(individuals.into_iter().cloned().map(Grantee::Individual));

        AccessExplanation::Granted(grantees)
    }

    /// Explicitly granted groups, de-duplicated and sorted by name (id
    /// breaks ties). Ids unknown to the snapshot are skipped.
    fn granted_groups(&self, resource: &Resource) -> Vec<&'a Group> {
        let mut seen = HashSet::new();
        let mut groups: Vec<&'a Group> = resource
            .teams
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|&id| {
                let group = self.resolver.group(id);
                if group.is_none() {
                    tracing::warn!(resource = %resource.name, team_id = %id, "granted team not in snapshot");
                }
                group
            })
            .collect();
        groups.sort_by(|a, b| cmp_case_insensitive(&a.name, &b.name).then(a.id.cmp(&b.id)));
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgaudit_core::{GroupId, Member, Snapshot};

    fn org(members: &[&str]) -> Snapshot {
        let mut snapshot = Snapshot::new("acme");
        snapshot.members = members.iter().map(|m| Member::new(*m)).collect();
        snapshot
    }

    fn add_team(snapshot: &mut Snapshot, group: Group, members: &[&str]) {
        snapshot
            .team_members
            .insert(group.id, members.iter().map(|m| Identity::from(*m)).collect());
        snapshot.teams.push(group);
    }

    fn shown(explanation: &AccessExplanation) -> Vec<String> {
        explanation.grantees().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn whole_org_collapses_to_everybody() {
        let snapshot = org(&["alice", "bob", "carol"]);
        let resolver = MembershipResolver::new(&snapshot);
        let reducer = CoverageReducer::new(&resolver, "acme");

        let repo = Resource::new("repo1").with_collaborators(["carol", "alice", "bob"]);
        let explanation = reducer.explain(&repo);

        assert_eq!(
            explanation,
            AccessExplanation::Granted(vec![Grantee::Group(GroupRef::Everybody {
                organization: "acme".into()
            })])
        );
    }

    #[test]
    fn disjoint_granted_team_is_still_listed() {
        let mut snapshot = org(&["alice", "bob"]);
        add_team(&mut snapshot, Group::new(1, "Eng"), &["bob"]);
        let resolver = MembershipResolver::new(&snapshot);
        let reducer = CoverageReducer::new(&resolver, "acme");

        let repo = Resource::new("repo2")
            .with_teams([1])
            .with_collaborators(["dave", "alice"]);

        assert_eq!(shown(&reducer.explain(&repo)), ["Eng", "alice", "dave"]);
    }

    #[test]
    fn empty_access_list_is_no_access() {
        let mut snapshot = org(&["alice"]);
        add_team(&mut snapshot, Group::new(1, "Eng"), &["alice"]);
        let resolver = MembershipResolver::new(&snapshot);
        let reducer = CoverageReducer::new(&resolver, "acme");

        let repo = Resource::new("repo3").with_teams([1]);
        let explanation = reducer.explain(&repo);

        assert!(explanation.is_no_access());
        assert_eq!(explanation.to_string(), "-");
    }

    #[test]
    fn team_members_are_not_repeated_as_individuals() {
        let mut snapshot = org(&["alice", "bob", "carol", "dave"]);
        add_team(&mut snapshot, Group::new(1, "Eng"), &["bob"]);
        add_team(&mut snapshot, Group::new(2, "Frontend").with_parent(1), &["alice"]);
        let resolver = MembershipResolver::new(&snapshot);
        let reducer = CoverageReducer::new(&resolver, "acme");

        let repo = Resource::new("web")
            .with_teams([1])
            .with_collaborators(["alice", "bob", "Zed", "carol"]);

        assert_eq!(shown(&reducer.explain(&repo)), ["Eng", "carol", "Zed"]);
    }

    #[test]
    fn everybody_precedes_teams_and_individuals() {
        let mut snapshot = org(&["alice", "bob"]);
        add_team(&mut snapshot, Group::new(5, "ops"), &["alice"]);
        add_team(&mut snapshot, Group::new(6, "Admins"), &["bob"]);
        let resolver = MembershipResolver::new(&snapshot);
        let reducer = CoverageReducer::new(&resolver, "acme");

        let repo = Resource::new("infra")
            .with_teams([5, 6])
            .with_collaborators(["alice", "bob", "outside-contractor"]);

        assert_eq!(
            shown(&reducer.explain(&repo)),
            ["everybody in acme", "Admins", "ops", "outside-contractor"]
        );
    }

    #[test]
    fn partial_org_access_does_not_use_everybody() {
        let snapshot = org(&["alice", "bob", "carol"]);
        let resolver = MembershipResolver::new(&snapshot);
        let reducer = CoverageReducer::new(&resolver, "acme");

        let repo = Resource::new("private").with_collaborators(["bob", "alice"]);
        assert_eq!(shown(&reducer.explain(&repo)), ["alice", "bob"]);
    }

    #[test]
    fn empty_org_is_covered_by_everybody() {
        let snapshot = org(&[]);
        let resolver = MembershipResolver::new(&snapshot);
        let reducer = CoverageReducer::new(&resolver, "acme");

        let repo = Resource::new("public").with_collaborators(["visitor"]);
        assert_eq!(shown(&reducer.explain(&repo)), ["everybody in acme", "visitor"]);

        // No accessors still means no access, even with no members.
        assert!(reducer.explain(&Resource::new("attic")).is_no_access());
    }

    #[test]
    fn empty_and_unknown_granted_teams_are_skipped() {
        let mut snapshot = org(&["alice"]);
        add_team(&mut snapshot, Group::new(1, "Ghosts"), &[]);
        let resolver = MembershipResolver::new(&snapshot);
        let reducer = CoverageReducer::new(&resolver, "acme");

        let repo = Resource::new("repo")
            .with_teams([1, 42])
            .with_collaborators(["bob"]);
        assert_eq!(shown(&reducer.explain(&repo)), ["bob"]);
    }

    #[test]
    fn duplicate_grants_and_accessors_collapse() {
        let mut snapshot = org(&["alice", "bob"]);
        add_team(&mut snapshot, Group::new(1, "Eng"), &["alice"]);
        let resolver = MembershipResolver::new(&snapshot);
        let reducer = CoverageReducer::new(&resolver, "acme");

        let repo = Resource::new("repo")
            .with_teams([1, 1])
            .with_collaborators(["alice", "carol", "Carol"]);
        let explanation = reducer.explain(&repo);

        assert_eq!(shown(&explanation), ["Eng", "carol"]);
        assert_eq!(
            explanation.grantees()[0],
            Grantee::Group(GroupRef::Team {
                id: GroupId(1),
                name: "Eng".into()
            })
        );
    }

    #[test]
    fn every_accessor_is_explained_exactly_once() {
        let mut snapshot = org(&["a", "b", "c", "d", "e"]);
        add_team(&mut snapshot, Group::new(1, "One"), &["a", "b"]);
        add_team(&mut snapshot, Group::new(2, "Two"), &["b", "c"]);
        let resolver = MembershipResolver::new(&snapshot);
        let reducer = CoverageReducer::new(&resolver, "acme");

        let repo = Resource::new("repo")
            .with_teams([2, 1])
            .with_collaborators(["a", "b", "c", "d", "x"]);
        let explanation = reducer.explain(&repo);

        let mut explained: HashSet<Identity> = HashSet::new();
        let mut individuals = Vec::new();
        for grantee in explanation.grantees() {
            match grantee {
                Grantee::Group(GroupRef::Team { id, .. }) => {
                    explained.extend(resolver.effective_members(*id).iter().cloned())
                }
                Grantee::Group(GroupRef::Everybody { .. }) => {
                    explained.extend(resolver.everybody().iter().cloned())
                }
                Grantee::Individual(login) => {
                    assert!(explained.insert(login.clone()), "{login} explained twice");
                    individuals.push(login.to_string());
                }
            }
        }

        let access: HashSet<Identity> = repo.collaborators.iter().cloned().collect();
        assert_eq!(explained, access);
        assert_eq!(individuals, ["d", "x"]);
        assert_eq!(reducer.explain(&repo), explanation);
    }
}
