use thiserror::Error;

use crate::identity::Scope;

/// Fatal errors raised by the reconciliation engine.
///
/// Recoverable per-resource conditions (untaggable resources, missing
/// resources) are never errors; they are recorded as skip reasons and
/// surfaced in the report instead.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Malformed resource ID [{id}]: {reason}")]
    MalformedIdentity { id: String, reason: String },

    #[error("Unrecognized header in {source_name}: {detail}")]
    UnrecognizedHeader { source_name: String, detail: String },

    #[error("Reserved column heading {column} present in {source_name}")]
    ReservedColumn { source_name: String, column: String },

    #[error("Resource defined multiple times [{id}] scope={scope} tags.{tag}")]
    AmbiguousDeclaration { id: String, scope: Scope, tag: String },

    #[error("Resource has duplicate tags defined [{first} {second}] [{id}]")]
    DuplicateTagDeclaration {
        id: String,
        first: String,
        second: String,
    },

    #[error("Bad change type argument: {0}")]
    InvalidChangeTypes(String),

    #[error("Bad export mode: {0} (expected all or del)")]
    InvalidExportMode(String),

    #[error("Resource JSON has no \"{field}\": {element}")]
    MissingField { field: &'static str, element: String },

    #[error("Tag update failed for [{id}]: {message}")]
    Submission { id: String, message: String },

    #[error("Tag update for [{id}] timed out after {timeout_secs}s")]
    SubmitTimeout { id: String, timeout_secs: u64 },

    #[error("{count} failed update(s):\n{}", failed.join("\n"))]
    ApplyFailed { count: usize, failed: Vec<String> },

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn malformed_identity(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedIdentity {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn unrecognized_header(source_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnrecognizedHeader {
            source_name: source_name.into(),
            detail: detail.into(),
        }
    }

    pub fn reserved_column(source_name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::ReservedColumn {
            source_name: source_name.into(),
            column: column.into(),
        }
    }

    pub fn ambiguous_declaration(id: impl Into<String>, scope: Scope, tag: impl Into<String>) -> Self {
        Self::AmbiguousDeclaration {
            id: id.into(),
            scope,
            tag: tag.into(),
        }
    }

    pub fn duplicate_tag(
        id: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        Self::DuplicateTagDeclaration {
            id: id.into(),
            first: first.into(),
            second: second.into(),
        }
    }

    pub fn invalid_change_types(message: impl Into<String>) -> Self {
        Self::InvalidChangeTypes(message.into())
    }

    pub fn invalid_export_mode(mode: impl Into<String>) -> Self {
        Self::InvalidExportMode(mode.into())
    }

    pub fn missing_field(field: &'static str, element: impl Into<String>) -> Self {
        Self::MissingField {
            field,
            element: element.into(),
        }
    }

    pub fn submission(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Submission {
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn submit_timeout(id: impl Into<String>, timeout_secs: u64) -> Self {
        Self::SubmitTimeout {
            id: id.into(),
            timeout_secs,
        }
    }

    pub fn apply_failed(failed: Vec<String>) -> Self {
        Self::ApplyFailed {
            count: failed.len(),
            failed,
        }
    }

    /// Get error category for logging and exit reporting
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedIdentity { .. } => ErrorCategory::Identity,
            Self::UnrecognizedHeader { .. }
            | Self::ReservedColumn { .. }
            | Self::MissingField { .. }
            | Self::CsvError(_)
            | Self::JsonError(_) => ErrorCategory::Input,
            Self::AmbiguousDeclaration { .. } | Self::DuplicateTagDeclaration { .. } => {
                ErrorCategory::Conflict
            }
            Self::InvalidChangeTypes(_) | Self::InvalidExportMode(_) | Self::RegexError(_) => {
                ErrorCategory::Configuration
            }
            Self::Submission { .. } | Self::SubmitTimeout { .. } | Self::ApplyFailed { .. } => {
                ErrorCategory::Apply
            }
            Self::Io(_) => ErrorCategory::System,
        }
    }

    /// Identities that failed to update, for operators re-running against
    /// just the failures.
    pub fn failed_ids(&self) -> &[String] {
        match self {
            Self::ApplyFailed { failed, .. } => failed,
            _ => &[],
        }
    }
}

/// Error categories for logging and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Identity,
    Input,
    Conflict,
    Configuration,
    Apply,
    System,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identity => write!(f, "identity"),
            Self::Input => write!(f, "input"),
            Self::Conflict => write!(f, "conflict"),
            Self::Configuration => write!(f, "configuration"),
            Self::Apply => write!(f, "apply"),
            Self::System => write!(f, "system"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
