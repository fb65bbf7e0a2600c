//! Domain types for the orgaudit access reporter.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Rendered in place of an empty grantee list or a missing email.
pub const ABSENT_PLACEHOLDER: &str = "-";

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A person, identified by their login handle.
///
/// The handle is kept exactly as the directory reported it, but equality,
/// hashing and ordering all fold case, so `Alice` and `alice` are the same
/// identity and sort next to each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(login: impl Into<String>) -> Self {
        Self(login.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    fn folded(&self) -> impl Iterator<Item = char> + '_ {
        self.0.chars().flat_map(char::to_lowercase)
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.folded().eq(other.folded())
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in self.folded() {
            c.hash(state);
        }
        state.write_u8(0xff);
    }
}

impl PartialOrd for Identity {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded().cmp(other.folded())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(login: &str) -> Self {
        Self::new(login)
    }
}

impl From<String> for Identity {
    fn from(login: String) -> Self {
        Self(login)
    }
}

/// Case-insensitive comparison used for every name-sorted listing.
pub fn cmp_case_insensitive(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// An organization member plus the optional public email the directory
/// exposed for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub login: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Member {
    pub fn new(login: impl Into<Identity>) -> Self {
        Self {
            login: login.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

/// Numeric group identifier as assigned by the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A team. `parent` is a reference, not ownership: it may point at a
/// group that does not exist, or form a cycle in malformed data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    /// URL-safe handle used by the directory API to address the team.
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub parent: Option<GroupId>,
}

impl Group {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: GroupId(id),
            slug: name.to_lowercase().replace(' ', "-"),
            name,
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: u64) -> Self {
        self.parent = Some(GroupId(parent));
        self
    }
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// An audited item (a repository) and the two access facts reported for it.
///
/// `collaborators` is the ground truth: everyone with any kind of access,
/// whether via a team or granted individually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    /// Groups explicitly granted access. Most repositories list a handful.
    #[serde(default)]
    pub teams: SmallVec<[GroupId; 4]>,
    #[serde(default)]
    pub collaborators: Vec<Identity>,
}

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            teams: SmallVec::new(),
            collaborators: Vec::new(),
        }
    }

    pub fn with_teams(mut self, teams: impl IntoIterator<Item = u64>) -> Self {
        self.teams = teams.into_iter().map(GroupId).collect();
        self
    }

    pub fn with_collaborators<I, S>(mut self, logins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Identity>,
    {
        self.collaborators = logins.into_iter().map(Into::into).collect();
        self
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Immutable capture of one organization, as handed over by ingestion.
///
/// Every collection defaults to empty so that partially recorded snapshots
/// still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub organization: String,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub teams: Vec<Group>,
    #[serde(default)]
    pub team_members: BTreeMap<GroupId, Vec<Identity>>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl Snapshot {
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            ..Default::default()
        }
    }

    /// Direct (non-inherited) members of a group; empty when unrecorded.
    pub fn direct_members(&self, id: GroupId) -> &[Identity] {
        self.team_members
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn member_logins(&self) -> impl Iterator<Item = &Identity> + '_ {
        self.members.iter().map(|m| &m.login)
    }

    /// Display name of the synthetic organization-wide group.
    pub fn everybody_name(&self) -> String {
        format!("everybody in {}", self.organization)
    }
}

// ---------------------------------------------------------------------------
// Access explanation
// ---------------------------------------------------------------------------

/// A group that can appear in an access explanation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupRef {
    /// Implicit group of every organization member. Has no [`GroupId`].
    Everybody { organization: String },
    Team { id: GroupId, name: String },
}

impl fmt::Display for GroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Everybody { organization } => write!(f, "everybody in {organization}"),
            Self::Team { name, .. } => f.write_str(name),
        }
    }
}

/// One entry of an access explanation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Grantee {
    Group(GroupRef),
    Individual(Identity),
}

impl fmt::Display for Grantee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group(group) => group.fmt(f),
            Self::Individual(login) => login.fmt(f),
        }
    }
}

/// Who can reach a resource.
///
/// `NoAccess` is distinct from an empty `Granted` list: renderers show the
/// placeholder for the former.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessExplanation {
    NoAccess,
    Granted(Vec<Grantee>),
}

impl AccessExplanation {
    pub fn grantees(&self) -> &[Grantee] {
        match self {
            Self::NoAccess => &[],
            Self::Granted(grantees) => grantees,
        }
    }

    pub fn is_no_access(&self) -> bool {
        matches!(self, Self::NoAccess)
    }
}

impl fmt::Display for AccessExplanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAccess => f.write_str(ABSENT_PLACEHOLDER),
            Self::Granted(grantees) if grantees.is_empty() => f.write_str(ABSENT_PLACEHOLDER),
            Self::Granted(grantees) => {
                for (i, grantee) in grantees.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    grantee.fmt(f)?;
                }
                Ok(())
            }
        }
    }
}
