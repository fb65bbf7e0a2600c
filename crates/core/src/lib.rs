//! Domain models, shared types, and error definitions.
//!
//! Foundation crate -- no async or I/O dependencies.

pub mod error;
pub mod types;

pub use error::{OrgAuditError, OrgAuditResult};
pub use types::{
    cmp_case_insensitive, AccessExplanation, Grantee, Group, GroupId, GroupRef, Identity, Member,
    Resource, Snapshot, ABSENT_PLACEHOLDER,
};
