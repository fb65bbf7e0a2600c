//! Effective group membership over the team containment graph.
//!
//! Teams reference their parent by id, so the graph is only a forest when
//! the directory data is well formed. The resolver tolerates dangling
//! parents and cycles: dangling edges are dropped, and a cycle is broken
//! the second time traversal reaches a group.

use orgaudit_core::{Group, GroupId, Identity, Snapshot};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

/// Sorted, de-duplicated member list shared between report sections.
pub type MemberSet = Arc<[Identity]>;

/// Resolves and memoizes the effective membership of every team in one
/// snapshot.
///
/// Groups live in an arena indexed by position; `children` is the
/// containment map (parent slot -> child slots) built once at
/// construction. Each slot's result is computed at most once, even when
/// several threads ask for it concurrently.
///
/// ```ignore
/// let resolver = MembershipResolver::new(&snapshot);
/// resolver.warm();
/// let eng = resolver.effective_members(GroupId(1));
/// ```
pub struct MembershipResolver<'a> {
    snapshot: &'a Snapshot,
    slots: HashMap<GroupId, usize>,
    groups: Vec<&'a Group>,
    children: Vec<SmallVec<[usize; 4]>>,
    memo: Vec<OnceLock<MemberSet>>,
    everybody: MemberSet,
}

impl<'a> MembershipResolver<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        let mut slots = HashMap::with_capacity(snapshot.teams.len());
        let mut groups = Vec::with_capacity(snapshot.teams.len());

        for group in &snapshot.teams {
            if slots.contains_key(&group.id) {
                tracing::warn!(group_id = %group.id, name = %group.name, "duplicate group id ignored");
                continue;
            }
            slots.insert(group.id, groups.len());
            groups.push(group);
        }

        let mut children: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); groups.len()];
        for (slot, group) in groups.iter().enumerate() {
            let Some(parent) = group.parent else {
                continue;
            };
            match slots.get(&parent) {
                Some(&parent_slot) => children[parent_slot].push(slot),
                None => tracing::warn!(
                    group = %group.name,
                    parent_id = %parent,
                    "parent group not found, treating as top-level"
                ),
            }
        }

        let resolver = Self {
            snapshot,
            memo: (0..groups.len()).map(|_| OnceLock::new()).collect(),
            everybody: sorted_unique(snapshot.member_logins()),
            slots,
            groups,
            children,
        };
        resolver.report_cycles();
        resolver
    }

    /// Number of distinct groups known to the resolver.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group(&self, id: GroupId) -> Option<&'a Group> {
        self.slots.get(&id).map(|&slot| self.groups[slot])
    }

    /// Distinct groups, in snapshot order.
    pub fn groups(&self) -> impl Iterator<Item = &'a Group> + '_ {
        self.groups.iter().copied()
    }

    /// Every organization member, sorted. Membership of the synthetic
    /// organization-wide group.
    pub fn everybody(&self) -> MemberSet {
        Arc::clone(&self.everybody)
    }

    /// Direct members of `id` plus the members of every descendant group,
    /// sorted case-insensitively.
    ///
    /// A group id that is not part of the snapshot resolves to its direct
    /// members only (usually none).
    pub fn effective_members(&self, id: GroupId) -> MemberSet {
        match self.slots.get(&id) {
            Some(&slot) => self.slot_members(slot),
            None => sorted_unique(self.snapshot.direct_members(id)),
        }
    }

    /// Populates the memo for every group so later lookups are read-only.
    pub fn warm(&self) {
        (0..self.groups.len()).into_par_iter().for_each(|slot| {
            self.slot_members(slot);
        });
        tracing::debug!(groups = self.groups.len(), "membership cache warmed");
    }

    fn slot_members(&self, slot: usize) -> MemberSet {
        Arc::clone(self.memo[slot].get_or_init(|| self.collect(slot)))
    }

    /// Worklist traversal from `root`. `seen` doubles as the cycle guard:
    /// a group reached twice contributes nothing the second time.
    fn collect(&self, root: usize) -> MemberSet {
        let mut seen = vec![false; self.groups.len()];
        let mut stack = vec![root];
        seen[root] = true;

        let mut members: Vec<&Identity> = Vec::new();
        while let Some(slot) = stack.pop() {
            members.extend(self.snapshot.direct_members(self.groups[slot].id));
            for &child in &self.children[slot] {
                if seen[child] {
                    tracing::debug!(
                        root = %self.groups[root].name,
                        group = %self.groups[child].name,
                        "containment cycle truncated"
                    );
                    continue;
                }
                seen[child] = true;
                stack.push(child);
            }
        }

        sorted_unique(members)
    }

    /// Logs each group whose parent chain leads back to itself.
    fn report_cycles(&self) {
        let parent_of = |slot: usize| {
            self.groups[slot]
                .parent
                .and_then(|parent| self.slots.get(&parent).copied())
        };

        for start in 0..self.groups.len() {
            let mut current = parent_of(start);
            for _ in 0..self.groups.len() {
                match current {
                    Some(slot) if slot == start => {
                        tracing::warn!(group = %self.groups[start].name, "group is part of a containment cycle");
                        break;
                    }
                    Some(slot) => current = parent_of(slot),
                    None => break,
                }
            }
        }
    }
}

/// Deduplicates (case-insensitively) and sorts. The first spelling seen wins.
fn sorted_unique<'i>(logins: impl IntoIterator<Item = &'i Identity>) -> MemberSet {
    let mut seen = HashSet::new();
    let mut out: Vec<Identity> = logins
        .into_iter()
        .filter(|login| seen.insert(*login))
        .cloned()
        .collect();
    out.sort_unstable();
    out.into()
}
