//! # Tenant Catalog
//!
//! In-memory view of one tenant's frameworks, projects, associations and
//! implementation records.
//!
//! Every write follows the same three steps:
//!
//! 1. **Plan** against `&TenantCatalog`: look up, check invariants, and
//!    compute every row the write will touch. No mutation.
//! 2. **Persist** the plan in one database transaction (when a pool is
//!    configured). See [`crate::db`].
//! 3. **Apply** the plan to `&mut TenantCatalog`. Infallible.
//!
//! The caller holds the tenant's write lock across all three, so a failed
//! transaction leaves memory untouched and the two never diverge. The
//! sequencing lives in [`crate::orchestration`].

pub mod association;
pub mod import;
pub mod progress;

use std::collections::HashMap;

use cfw_core::{
    AssociationId, FrameworkId, HierarchyType, ImplementationId, ImplementationStatus, NodeId,
    ProjectId, ValidationIssue,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

// -- Errors -------------------------------------------------------------------

/// Catalog operation failure.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("framework {0} not found")]
    FrameworkNotFound(FrameworkId),

    #[error("project {0} not found")]
    ProjectNotFound(ProjectId),

    #[error("implementation {0} not found")]
    ImplementationNotFound(ImplementationId),

    #[error("framework {framework} is not attached to project {project}")]
    NotAttached {
        project: ProjectId,
        framework: FrameworkId,
    },

    /// Structural validation failed; every violation is carried.
    #[error("framework failed validation with {} issue(s)", .0.len())]
    Invalid(Vec<ValidationIssue>),

    #[error("{}", scope_mismatch_message(*framework_is_organizational))]
    ScopeMismatch {
        framework_is_organizational: bool,
        project_is_organizational: bool,
    },

    #[error("project {0} must keep at least one framework")]
    LastFramework(ProjectId),

    #[error("framework {framework} is attached to {} project(s); detach it first", projects.len())]
    InUse {
        framework: FrameworkId,
        projects: Vec<ProjectId>,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn scope_mismatch_message(framework_is_organizational: bool) -> &'static str {
    if framework_is_organizational {
        "organizational frameworks can only be added to organizational projects"
    } else {
        "project frameworks cannot be added to organizational projects"
    }
}

// -- Records ------------------------------------------------------------------

/// Framework metadata. The tree lives in [`FrameworkEntry::structure`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FrameworkRecord {
    #[schema(value_type = String, format = Uuid)]
    pub id: FrameworkId,
    pub name: String,
    pub description: String,
    pub version: String,
    pub is_organizational: bool,
    #[schema(value_type = String, example = "two_level")]
    pub hierarchy_type: HierarchyType,
    pub level_1_name: String,
    pub level_2_name: String,
    pub level_3_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category (level 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CategoryNode {
    #[schema(value_type = String, format = Uuid)]
    pub id: NodeId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub order_no: i32,
    pub items: Vec<ControlNode>,
}

/// Control (level 2). A leaf in two-level frameworks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ControlNode {
    #[schema(value_type = String, format = Uuid)]
    pub id: NodeId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence_examples: Vec<String>,
    pub order_no: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<SubControlNode>,
}

/// Sub-control (level 3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SubControlNode {
    #[schema(value_type = String, format = Uuid)]
    pub id: NodeId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub order_no: i32,
}

/// A framework with its ordered tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameworkEntry {
    pub record: FrameworkRecord,
    pub structure: Vec<CategoryNode>,
}

impl FrameworkEntry {
    fn is_three_level(&self) -> bool {
        self.record.hierarchy_type.has_level3()
    }

    /// Leaf ids grouped by control, in display order.
    ///
    /// Two-level: one group per control holding the control itself.
    /// Three-level: one group per control holding its sub-controls.
    pub fn leaves_by_control(&self) -> Vec<Vec<NodeId>> {
        self.structure
            .iter()
            .flat_map(|c| &c.items)
            .map(|control| {
                if self.is_three_level() {
                    control.items.iter().map(|s| s.id).collect()
                } else {
                    vec![control.id]
                }
            })
            .collect()
    }

    /// Every leaf id, in display order.
    pub fn leaf_ids(&self) -> Vec<NodeId> {
        self.leaves_by_control().into_iter().flatten().collect()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves_by_control().iter().map(Vec::len).sum()
    }

    /// Node counts per level: `(level1, level2, level3)`.
    pub fn level_counts(&self) -> (usize, usize, usize) {
        let level2 = self.structure.iter().map(|c| c.items.len()).sum();
        let level3 = self
            .structure
            .iter()
            .flat_map(|c| &c.items)
            .map(|ctrl| ctrl.items.len())
            .sum();
        (self.structure.len(), level2, level3)
    }
}

/// Host-platform project, mirrored with the facts the engine needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProjectRecord {
    #[schema(value_type = String, format = Uuid)]
    pub id: ProjectId,
    pub name: String,
    pub is_organizational: bool,
    /// System frameworks attached by the host; they count toward the
    /// last-framework invariant.
    pub native_framework_count: u32,
    pub updated_at: DateTime<Utc>,
}

/// Project ↔ framework link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AssociationRecord {
    #[schema(value_type = String, format = Uuid)]
    pub project_framework_id: AssociationId,
    #[schema(value_type = String, format = Uuid)]
    pub project_id: ProjectId,
    #[schema(value_type = String, format = Uuid)]
    pub framework_id: FrameworkId,
    pub added_at: DateTime<Utc>,
}

/// Evidence attached to an implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EvidenceLink {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Reference to a risk tracked elsewhere on the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RiskRef {
    pub risk_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Per-project, per-leaf tracking record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ImplementationRecord {
    #[schema(value_type = String, format = Uuid)]
    pub id: ImplementationId,
    #[schema(value_type = String, format = Uuid)]
    pub project_framework_id: AssociationId,
    #[schema(value_type = String, format = Uuid)]
    pub leaf_node_id: NodeId,
    #[schema(value_type = String, example = "Not started")]
    pub status: ImplementationStatus,
    pub owner: Option<String>,
    pub reviewer: Option<String>,
    pub approver: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub implementation_details: Option<String>,
    pub evidence_links: Vec<EvidenceLink>,
    pub linked_risks: Vec<RiskRef>,
    pub updated_at: DateTime<Utc>,
}

impl ImplementationRecord {
    /// A fresh `Not started`, unowned record.
    pub fn not_started(association: AssociationId, leaf: NodeId, now: DateTime<Utc>) -> Self {
        Self {
            id: ImplementationId::new(),
            project_framework_id: association,
            leaf_node_id: leaf,
            status: ImplementationStatus::NotStarted,
            owner: None,
            reviewer: None,
            approver: None,
            due_date: None,
            implementation_details: None,
            evidence_links: Vec::new(),
            linked_risks: Vec::new(),
            updated_at: now,
        }
    }
}

// -- Catalog ------------------------------------------------------------------

/// One tenant's state.
#[derive(Debug, Default)]
pub struct TenantCatalog {
    frameworks: HashMap<FrameworkId, FrameworkEntry>,
    projects: HashMap<ProjectId, ProjectRecord>,
    associations: HashMap<AssociationId, AssociationRecord>,
    implementations: HashMap<ImplementationId, ImplementationRecord>,
}

impl TenantCatalog {
    /// Rebuild a catalog from persisted rows.
    pub fn from_parts(
        frameworks: Vec<FrameworkEntry>,
        projects: Vec<ProjectRecord>,
        associations: Vec<AssociationRecord>,
        implementations: Vec<ImplementationRecord>,
    ) -> Self {
        Self {
            frameworks: frameworks.into_iter().map(|f| (f.record.id, f)).collect(),
            projects: projects.into_iter().map(|p| (p.id, p)).collect(),
            associations: associations
                .into_iter()
                .map(|a| (a.project_framework_id, a))
                .collect(),
            implementations: implementations.into_iter().map(|i| (i.id, i)).collect(),
        }
    }

    pub fn framework(&self, id: FrameworkId) -> Result<&FrameworkEntry, CatalogError> {
        self.frameworks
            .get(&id)
            .ok_or(CatalogError::FrameworkNotFound(id))
    }

    /// Frameworks sorted by name.
    pub fn frameworks(&self) -> Vec<&FrameworkEntry> {
        let mut all: Vec<_> = self.frameworks.values().collect();
        all.sort_by(|a, b| a.record.name.cmp(&b.record.name));
        all
    }

    pub fn framework_by_name(&self, name: &str) -> Option<&FrameworkEntry> {
        self.frameworks.values().find(|f| f.record.name == name)
    }

    pub fn project(&self, id: ProjectId) -> Result<&ProjectRecord, CatalogError> {
        self.projects.get(&id).ok_or(CatalogError::ProjectNotFound(id))
    }

    pub fn association(&self, project: ProjectId, framework: FrameworkId) -> Option<&AssociationRecord> {
        self.associations
            .values()
            .find(|a| a.project_id == project && a.framework_id == framework)
    }

    /// Associations of one framework, oldest first.
    pub fn associations_of_framework(&self, framework: FrameworkId) -> Vec<&AssociationRecord> {
        let mut found: Vec<_> = self
            .associations
            .values()
            .filter(|a| a.framework_id == framework)
            .collect();
        found.sort_by_key(|a| a.added_at);
        found
    }

    /// Associations of one project, oldest first.
    pub fn associations_of_project(&self, project: ProjectId) -> Vec<&AssociationRecord> {
        let mut found: Vec<_> = self
            .associations
            .values()
            .filter(|a| a.project_id == project)
            .collect();
        found.sort_by_key(|a| a.added_at);
        found
    }

    pub fn implementations_of(&self, association: AssociationId) -> Vec<&ImplementationRecord> {
        self.implementations
            .values()
            .filter(|i| i.project_framework_id == association)
            .collect()
    }

    pub fn implementation_count(&self) -> usize {
        self.implementations.len()
    }
}
