//! Machine-readable output for access reports.
//!
//! Three row schemas:
//! - [`ReportSummaryRow`]: one per report
//! - [`GroupMemberRow`]: one per (group, member), fully denormalized
//! - [`ResourceAccessRow`]: one per resource with its grantees
//!
//! Backend: **NDJSON stream**, newline-delimited JSON rows to any `Write` impl.

pub mod json_stream;

use crate::reporter::Report;
use orgaudit_core::{AccessExplanation, Grantee, GroupRef};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Serializable row types
// ---------------------------------------------------------------------------

/// One row per report: summary statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummaryRow {
    pub organization: String,
    pub total_members: u32,
    pub total_groups: u32,
    pub total_resources: u32,
    /// Resources whose accessor list was empty.
    pub unshared_resources: u32,
    /// Resources granted to every organization member.
    pub org_wide_resources: u32,
    pub collect_time_ms: u64,
    pub total_time_ms: u64,
}

/// One row per group membership. The everybody group uses `group_id: None`.
#[derive(Debug, Clone, Serialize)]
pub struct GroupMemberRow {
    pub organization: String,
    pub group: String,
    pub group_id: Option<u64>,
    pub member: String,
    pub email: Option<String>,
}

/// One row per resource.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceAccessRow {
    pub organization: String,
    pub resource: String,
    /// Grantee display strings, in explanation order. Empty for no access.
    pub shared_with: Vec<String>,
    pub groups: u32,
    pub individuals: u32,
    pub no_access: bool,
}

// ---------------------------------------------------------------------------
// Builder: Report → Rows
// ---------------------------------------------------------------------------

impl Report {
    /// Flatten the report into sink-ready rows.
    pub fn to_rows(&self) -> (ReportSummaryRow, Vec<GroupMemberRow>, Vec<ResourceAccessRow>) {
        let summary = ReportSummaryRow {
            organization: self.organization.clone(),
            total_members: self.everybody.members.len() as u32,
            total_groups: self.groups.len() as u32,
            total_resources: self.resources.len() as u32,
            unshared_resources: self
                .resources
                .iter()
                .filter(|r| r.explanation.is_no_access())
                .count() as u32,
            org_wide_resources: self
                .resources
                .iter()
                .filter(|r| {
                    r.explanation.grantees().iter().any(|g| {
                        matches!(g, Grantee::Group(GroupRef::Everybody { .. }))
                    })
                })
                .count() as u32,
            collect_time_ms: self.collect_time.as_millis() as u64,
            total_time_ms: self.total_time.as_millis() as u64,
        };

        let members = self
            .sections()
            .flat_map(|section| {
                let group = section.name();
                let group_id = match &section.group {
                    GroupRef::Everybody { .. } => None,
                    GroupRef::Team { id, .. } => Some(id.0),
                };
                section.members.iter().map(move |line| GroupMemberRow {
                    organization: self.organization.clone(),
                    group: group.clone(),
                    group_id,
                    member: line.login.to_string(),
                    email: line.email.clone(),
                })
            })
            .collect();

        let resources = self
            .resources
            .iter()
            .map(|r| {
                let grantees = r.explanation.grantees();
                let groups = grantees
                    .iter()
                    .filter(|g| matches!(g, Grantee::Group(_)))
                    .count() as u32;
                ResourceAccessRow {
                    organization: self.organization.clone(),
                    resource: r.name.clone(),
                    shared_with: grantees.iter().map(ToString::to_string).collect(),
                    groups,
                    individuals: grantees.len() as u32 - groups,
                    no_access: matches!(r.explanation, AccessExplanation::NoAccess),
                }
            })
            .collect();

        (summary, members, resources)
    }
}
