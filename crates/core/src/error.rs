//! Centralized error types for the orgaudit workspace.

use thiserror::Error;

/// Top-level error enum. Variants map to subsystems.
///
/// Resolution and coverage reduction are total and never produce one of
/// these; only ingestion, credentials and output do.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OrgAuditError {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type OrgAuditResult<T> = Result<T, OrgAuditError>;
