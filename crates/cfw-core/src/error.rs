//! # Error Types
//!
//! Errors raised before anything touches storage. All use `thiserror`.
//!
//! Structural violations are not errors in this sense: the validator returns
//! a list of [`crate::ValidationIssue`] so every problem can be reported at
//! once.

use thiserror::Error;

/// Failure to turn an input encoding into a [`crate::ParsedFramework`].
#[derive(Error, Debug)]
pub enum IngestError {
    /// JSON text or workbook content could not be parsed. Carries the
    /// underlying parser message.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A workbook is missing one of its required sheets.
    #[error("workbook is missing required sheet \"{0}\"")]
    MissingSheet(String),

    /// The spreadsheet writer failed while producing the blank template.
    #[error("workbook generation failed: {0}")]
    WorkbookWrite(String),

    /// The requested template is not in the bundled library.
    #[error("unknown template: {0}")]
    UnknownTemplate(String),
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedInput(err.to_string())
    }
}

/// Rejected identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Tenant ids become Postgres schema names and are restricted accordingly.
    #[error("invalid tenant id {value:?}: {reason}")]
    InvalidTenant {
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A UUID-backed identifier failed to parse.
    #[error("invalid identifier {0:?}")]
    InvalidUuid(String),
}
