//! Vault error taxonomy and the normalized result shapes returned by the gateway

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::catalog::CatalogError;

/// Errors produced by vault operations.
///
/// Every variant maps to a stable error code surfaced through
/// [`OperationResult::error_code`]; callers never see raw I/O or database
/// errors.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Bad name or path supplied by the caller
    #[error("validation failed: {0}")]
    Validation(String),

    /// Source or target node does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// A sibling with the same case-insensitive name already exists
    #[error("name conflict: {0}")]
    NameConflict(String),

    /// Operation forbidden by an invariant or configured policy
    #[error("policy violation: {0}")]
    PolicyViolation(String),

    /// Physical operation failed before any catalog staging; no rollback needed
    #[error("storage I/O failed during {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Catalog commit failed and the physical reversal succeeded; both
    /// substrates are back in their pre-operation state
    #[error("{operation} was rolled back: {reason}")]
    ChangesRolledBack { operation: String, reason: String },

    /// Catalog commit failed and the physical reversal also failed; the
    /// substrates now disagree and manual reconciliation is required
    #[error("{operation} rollback failed, manual intervention required: {detail}")]
    RollbackFailed { operation: String, detail: String },

    /// Operation was cancelled between discrete steps
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// Unexpected catalog failure outside the commit step
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Unexpected serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VaultError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Stable code for this error, surfaced in [`OperationResult`] and audit lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::NotFound(_) => "RESOURCE_NOT_FOUND",
            Self::NameConflict(_) => "NAME_CONFLICT",
            Self::PolicyViolation(_) => "POLICY_VIOLATION",
            Self::Io { .. } => "IO_ERROR",
            Self::ChangesRolledBack { .. } => "CHANGES_ROLLED_BACK",
            Self::RollbackFailed { .. } => "ROLLBACK_FAILED",
            Self::Cancelled(_) => "OPERATION_CANCELLED",
            Self::Catalog(_) => "CATALOG_UNEXPECTED",
            Self::Serialization(_) => "SERIALIZATION_FAILED",
        }
    }
}

/// Code recorded when an operation succeeded but a temporary or backup
/// artifact could not be removed afterwards. Non-fatal: logged and audited,
/// never returned as a failure.
pub const CLEANUP_FAILED: &str = "CLEANUP_FAILED";

/// Normalized outcome of a gateway operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
    pub error_code: Option<String>,
}

impl OperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error_code: None,
        }
    }

    pub fn failed(error: &VaultError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            error_code: Some(error.code().to_string()),
        }
    }
}

impl From<Result<String, VaultError>> for OperationResult {
    fn from(result: Result<String, VaultError>) -> Self {
        match result {
            Ok(message) => Self::ok(message),
            Err(e) => Self::failed(&e),
        }
    }
}

/// Outcome of a content download, carrying the bytes and a content type
/// derived from the file extension.
#[derive(Debug, Clone)]
pub struct FileDownloadResult {
    pub success: bool,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub message: String,
}

impl FileDownloadResult {
    pub fn failed(error: &VaultError) -> Self {
        Self {
            success: false,
            bytes: Vec::new(),
            content_type: String::new(),
            message: error.to_string(),
        }
    }
}
