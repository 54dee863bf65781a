//! # Implementation Status
//!
//! The status of one leaf item within one project. The variants are ordered
//! for display; there is no enforced transition graph, any status may follow
//! any other.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Per-leaf implementation status.
///
/// Serialized with the human-readable labels the UI shows
/// (`"Not started"`, `"In progress"`, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum ImplementationStatus {
    #[default]
    #[serde(rename = "Not started")]
    NotStarted,
    #[serde(rename = "Draft")]
    Draft,
    #[serde(rename = "In progress")]
    InProgress,
    #[serde(rename = "Awaiting review")]
    AwaitingReview,
    #[serde(rename = "Awaiting approval")]
    AwaitingApproval,
    #[serde(rename = "Implemented")]
    Implemented,
    #[serde(rename = "Audited")]
    Audited,
    #[serde(rename = "Needs rework")]
    NeedsRework,
}

impl ImplementationStatus {
    /// Every status, in display order.
    pub const ALL: [Self; 8] = [
        Self::NotStarted,
        Self::Draft,
        Self::InProgress,
        Self::AwaitingReview,
        Self::AwaitingApproval,
        Self::Implemented,
        Self::Audited,
        Self::NeedsRework,
    ];

    /// Display label, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::Draft => "Draft",
            Self::InProgress => "In progress",
            Self::AwaitingReview => "Awaiting review",
            Self::AwaitingApproval => "Awaiting approval",
            Self::Implemented => "Implemented",
            Self::Audited => "Audited",
            Self::NeedsRework => "Needs rework",
        }
    }

    /// Whether this status counts toward completion.
    ///
    /// Audited implies implemented. Needs rework does not count.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Implemented | Self::Audited)
    }
}

impl fmt::Display for ImplementationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImplementationStatus {
    type Err = String;

    /// Accepts the display label or its snake_case form, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', " ");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().to_ascii_lowercase() == wanted)
            .ok_or_else(|| format!("unknown implementation status {s:?}"))
    }
}
