//! # Prometheus Metrics
//!
//! Domain counters recorded through the `metrics` facade. The Prometheus
//! recorder is installed once by the binary; without it (tests, embedding)
//! every call here is a no-op.
//!
//! | Counter | Labels |
//! |---------|--------|
//! | `cfw_imports_total` | `source`, `outcome` |
//! | `cfw_associations_total` | `action` |
//! | `cfw_frameworks_deleted_total` | |

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub const IMPORTS_TOTAL: &str = "cfw_imports_total";
pub const ASSOCIATIONS_TOTAL: &str = "cfw_associations_total";
pub const FRAMEWORKS_DELETED_TOTAL: &str = "cfw_frameworks_deleted_total";

/// Import outcome label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Created,
    Replaced,
    Malformed,
    Invalid,
    Conflict,
    Failed,
}

impl ImportOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Replaced => "replaced",
            Self::Malformed => "malformed",
            Self::Invalid => "invalid",
            Self::Conflict => "conflict",
            Self::Failed => "failed",
        }
    }
}

/// Install the global recorder and describe the counters.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    metrics::describe_counter!(IMPORTS_TOTAL, "Framework imports by input source and outcome");
    metrics::describe_counter!(ASSOCIATIONS_TOTAL, "Project association changes by action");
    metrics::describe_counter!(FRAMEWORKS_DELETED_TOTAL, "Frameworks deleted");
    Ok(handle)
}

pub fn record_import(source: &'static str, outcome: ImportOutcome) {
    metrics::counter!(IMPORTS_TOTAL, "source" => source, "outcome" => outcome.as_str()).increment(1);
}

/// `action` is one of `attach`, `detach`, `refused`.
pub fn record_association(action: &'static str) {
    metrics::counter!(ASSOCIATIONS_TOTAL, "action" => action).increment(1);
}

pub fn record_framework_deleted() {
    metrics::counter!(FRAMEWORKS_DELETED_TOTAL).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_labels_are_snake_case() {
        for outcome in [
            ImportOutcome::Created,
            ImportOutcome::Replaced,
            ImportOutcome::Malformed,
            ImportOutcome::Invalid,
            ImportOutcome::Conflict,
            ImportOutcome::Failed,
        ] {
            let label = outcome.as_str();
            assert!(label.chars().all(|c| c.is_ascii_lowercase()), "{label}");
        }
    }

    #[test]
    fn recording_without_a_recorder_is_a_no_op() {
        record_import("json", ImportOutcome::Created);
        record_association("attach");
        record_framework_deleted();
    }
}
