//! Project mirror, attach/detach, and implementation updates.

use cfw_core::{
    AssociationId, FrameworkId, ImplementationId, ImplementationStatus, NodeId, ProjectId,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use super::{
    AssociationRecord, CatalogError, EvidenceLink, ImplementationRecord, ProjectRecord, RiskRef,
    TenantCatalog,
};

/// Host-side facts about a project.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProjectUpsert {
    pub name: String,
    #[serde(default)]
    pub is_organizational: bool,
    #[serde(default)]
    pub native_framework_count: u32,
}

/// What an attach will write.
#[derive(Debug, Clone)]
pub enum AttachPlan {
    /// Already attached; nothing to write.
    Existing(AssociationRecord),
    New {
        association: AssociationRecord,
        implementations: Vec<ImplementationRecord>,
    },
}

impl AttachPlan {
    pub fn association(&self) -> &AssociationRecord {
        match self {
            Self::Existing(association) | Self::New { association, .. } => association,
        }
    }
}

/// What a detach will remove.
#[derive(Debug, Clone)]
pub enum DetachPlan {
    /// Not attached; nothing to remove.
    Absent { project: ProjectId },
    Remove {
        association: AssociationRecord,
        implementations: Vec<ImplementationId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct DetachOutcome {
    pub removed: bool,
    /// Native plus custom frameworks still attached.
    pub remaining_frameworks: u32,
}

/// `null` deserializes to `Some(None)` so it can clear a field; an absent
/// key stays `None` through `#[serde(default)]`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial update of one implementation record.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ImplementationPatch {
    #[schema(value_type = Option<String>, example = "In progress")]
    pub status: Option<ImplementationStatus>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub owner: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub reviewer: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub approver: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>, format = Date)]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub implementation_details: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<Vec<EvidenceLink>>)]
    pub evidence_links: Option<Option<Vec<EvidenceLink>>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<Vec<RiskRef>>)]
    pub linked_risks: Option<Option<Vec<RiskRef>>>,
}

/// Blank text clears the field like an explicit `null`.
fn patch_text(target: &mut Option<String>, patch: Option<Option<String>>) {
    if let Some(value) = patch {
        *target = value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    }
}

impl TenantCatalog {
    pub fn plan_project(
        &self,
        id: ProjectId,
        upsert: ProjectUpsert,
        now: DateTime<Utc>,
    ) -> Result<ProjectRecord, CatalogError> {
        let name = upsert.name.trim();
        if name.is_empty() {
            return Err(CatalogError::BadRequest("project name must not be empty".into()));
        }

        // A scope flip may not strand attached frameworks on the wrong side.
        for association in self.associations_of_project(id) {
            let framework = self.framework(association.framework_id)?;
            if framework.record.is_organizational != upsert.is_organizational {
                return Err(CatalogError::ScopeMismatch {
                    framework_is_organizational: framework.record.is_organizational,
                    project_is_organizational: upsert.is_organizational,
                });
            }
        }

        Ok(ProjectRecord {
            id,
            name: name.to_string(),
            is_organizational: upsert.is_organizational,
            native_framework_count: upsert.native_framework_count,
            updated_at: now,
        })
    }

    pub fn apply_project(&mut self, record: ProjectRecord) {
        self.projects.insert(record.id, record);
    }

    /// Frameworks attached to a project, native ones included.
    pub fn framework_total(&self, project: &ProjectRecord) -> u32 {
        let custom = u32::try_from(self.associations_of_project(project.id).len()).unwrap_or(u32::MAX);
        project.native_framework_count.saturating_add(custom)
    }

    pub fn plan_attach(
        &self,
        project_id: ProjectId,
        framework_id: FrameworkId,
        now: DateTime<Utc>,
    ) -> Result<AttachPlan, CatalogError> {
        let project = self.project(project_id)?;
        let framework = self.framework(framework_id)?;

        if framework.record.is_organizational != project.is_organizational {
            return Err(CatalogError::ScopeMismatch {
                framework_is_organizational: framework.record.is_organizational,
                project_is_organizational: project.is_organizational,
            });
        }

        if let Some(existing) = self.association(project_id, framework_id) {
            return Ok(AttachPlan::Existing(existing.clone()));
        }

        let association = AssociationRecord {
            project_framework_id: AssociationId::new(),
            project_id,
            framework_id,
            added_at: now,
        };
        let implementations = framework
            .leaf_ids()
            .into_iter()
            .map(|leaf| ImplementationRecord::not_started(association.project_framework_id, leaf, now))
            .collect();

        Ok(AttachPlan::New {
            association,
            implementations,
        })
    }

    pub fn apply_attach(&mut self, plan: AttachPlan) -> AssociationRecord {
        match plan {
            AttachPlan::Existing(association) => association,
            AttachPlan::New {
                association,
                implementations,
            } => {
                for record in implementations {
                    self.implementations.insert(record.id, record);
                }
                self.associations
                    .insert(association.project_framework_id, association.clone());
                association
            }
        }
    }

    pub fn plan_detach(
        &self,
        project_id: ProjectId,
        framework_id: FrameworkId,
    ) -> Result<DetachPlan, CatalogError> {
        let project = self.project(project_id)?;
        let Some(association) = self.association(project_id, framework_id) else {
            return Ok(DetachPlan::Absent { project: project_id });
        };

        if self.framework_total(project) <= 1 {
            return Err(CatalogError::LastFramework(project_id));
        }

        let implementations = self
            .implementations_of(association.project_framework_id)
            .into_iter()
            .map(|i| i.id)
            .collect();
        Ok(DetachPlan::Remove {
            association: association.clone(),
            implementations,
        })
    }

    pub fn apply_detach(&mut self, plan: DetachPlan) -> DetachOutcome {
        let (project_id, removed) = match plan {
            DetachPlan::Absent { project } => (project, false),
            DetachPlan::Remove {
                association,
                implementations,
            } => {
                for id in &implementations {
                    self.implementations.remove(id);
                }
                self.associations.remove(&association.project_framework_id);
                (association.project_id, true)
            }
        };
        let remaining_frameworks = self
            .projects
            .get(&project_id)
            .map_or(0, |p| self.framework_total(p));
        DetachOutcome {
            removed,
            remaining_frameworks,
        }
    }

    /// The updated record, not yet applied.
    pub fn plan_implementation_update(
        &self,
        project_id: ProjectId,
        framework_id: FrameworkId,
        implementation_id: ImplementationId,
        patch: ImplementationPatch,
        now: DateTime<Utc>,
    ) -> Result<ImplementationRecord, CatalogError> {
        let association = self
            .association(project_id, framework_id)
            .ok_or(CatalogError::NotAttached {
                project: project_id,
                framework: framework_id,
            })?;
        let mut record = self
            .implementations
            .get(&implementation_id)
            .filter(|i| i.project_framework_id == association.project_framework_id)
            .cloned()
            .ok_or(CatalogError::ImplementationNotFound(implementation_id))?;

        if let Some(Some(links)) = &patch.evidence_links {
            if links.iter().any(|l| l.url.trim().is_empty()) {
                return Err(CatalogError::BadRequest("evidence link url must not be empty".into()));
            }
        }
        if let Some(Some(risks)) = &patch.linked_risks {
            if risks.iter().any(|r| r.risk_id.trim().is_empty()) {
                return Err(CatalogError::BadRequest("linked risk id must not be empty".into()));
            }
        }

        if let Some(status) = patch.status {
            record.status = status;
        }
        patch_text(&mut record.owner, patch.owner);
        patch_text(&mut record.reviewer, patch.reviewer);
        patch_text(&mut record.approver, patch.approver);
        patch_text(&mut record.implementation_details, patch.implementation_details);
        if let Some(due_date) = patch.due_date {
            record.due_date = due_date;
        }
        if let Some(links) = patch.evidence_links {
            record.evidence_links = links
                .unwrap_or_default()
                .into_iter()
                .map(|l| EvidenceLink {
                    url: l.url.trim().to_string(),
                    label: l.label.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
                })
                .collect();
        }
        if let Some(risks) = patch.linked_risks {
            record.linked_risks = risks.unwrap_or_default();
        }
        record.updated_at = now;
        Ok(record)
    }

    pub fn apply_implementation(&mut self, record: ImplementationRecord) {
        self.implementations.insert(record.id, record);
    }

    /// The implementation row for one leaf of an association.
    pub fn implementation_for_leaf(&self, association: AssociationId, leaf: NodeId) -> Option<&ImplementationRecord> {
        self.implementations
            .values()
            .find(|i| i.project_framework_id == association && i.leaf_node_id == leaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures;
    use serde_json::json;

    fn project(catalog: &mut TenantCatalog, organizational: bool, native: u32) -> ProjectId {
        let id = ProjectId::new();
        let record = catalog
            .plan_project(
                id,
                ProjectUpsert {
                    name: "Project".into(),
                    is_organizational: organizational,
                    native_framework_count: native,
                },
                Utc::now(),
            )
            .unwrap();
        catalog.apply_project(record);
        id
    }

    fn framework(catalog: &mut TenantCatalog, parsed: cfw_core::ParsedFramework) -> FrameworkId {
        let plan = catalog.plan_import(parsed, Utc::now()).unwrap();
        catalog.apply_import(plan).framework_id
    }

    fn attach(catalog: &mut TenantCatalog, p: ProjectId, f: FrameworkId) -> AssociationRecord {
        let plan = catalog.plan_attach(p, f, Utc::now()).unwrap();
        catalog.apply_attach(plan)
    }

    #[test]
    fn attach_fans_out_one_row_per_leaf() {
        let mut catalog = TenantCatalog::default();
        let p = project(&mut catalog, true, 0);
        let f = framework(&mut catalog, fixtures::three_level("Deep"));

        let association = attach(&mut catalog, p, f);
        let rows = catalog.implementations_of(association.project_framework_id);
        assert_eq!(rows.len(), 3);
        assert!(rows
            .iter()
            .all(|r| r.status == ImplementationStatus::NotStarted && r.owner.is_none()));
    }

    #[test]
    fn reattach_returns_existing_association() {
        let mut catalog = TenantCatalog::default();
        let p = project(&mut catalog, false, 0);
        let f = framework(&mut catalog, fixtures::two_level("Twice"));

        let first = attach(&mut catalog, p, f);
        let plan = catalog.plan_attach(p, f, Utc::now()).unwrap();
        assert!(matches!(plan, AttachPlan::Existing(_)));
        let second = catalog.apply_attach(plan);
        assert_eq!(first, second);
        assert_eq!(catalog.implementation_count(), 2);
    }

    #[test]
    fn scope_mismatch_both_ways() {
        let mut catalog = TenantCatalog::default();
        let org_project = project(&mut catalog, true, 0);
        let plain_project = project(&mut catalog, false, 0);
        let org_fw = framework(&mut catalog, fixtures::three_level("Org"));
        let plain_fw = framework(&mut catalog, fixtures::two_level("Plain"));

        let err = catalog.plan_attach(plain_project, org_fw, Utc::now()).unwrap_err();
        assert!(matches!(err, CatalogError::ScopeMismatch { framework_is_organizational: true, .. }));
        assert_eq!(
            err.to_string(),
            "organizational frameworks can only be added to organizational projects"
        );

        let err = catalog.plan_attach(org_project, plain_fw, Utc::now()).unwrap_err();
        assert!(matches!(err, CatalogError::ScopeMismatch { framework_is_organizational: false, .. }));
        assert_eq!(catalog.implementation_count(), 0);
    }

    #[test]
    fn unknown_project_or_framework_is_not_found() {
        let mut catalog = TenantCatalog::default();
        let p = project(&mut catalog, false, 0);
        let f = framework(&mut catalog, fixtures::two_level("Known"));

        assert!(matches!(
            catalog.plan_attach(ProjectId::new(), f, Utc::now()),
            Err(CatalogError::ProjectNotFound(_))
        ));
        assert!(matches!(
            catalog.plan_attach(p, FrameworkId::new(), Utc::now()),
            Err(CatalogError::FrameworkNotFound(_))
        ));
    }

    #[test]
    fn sole_framework_cannot_be_detached() {
        let mut catalog = TenantCatalog::default();
        let p = project(&mut catalog, false, 0);
        let f = framework(&mut catalog, fixtures::two_level("Only"));
        attach(&mut catalog, p, f);

        assert!(matches!(catalog.plan_detach(p, f), Err(CatalogError::LastFramework(_))));
    }

    #[test]
    fn native_frameworks_count_toward_the_invariant() {
        let mut catalog = TenantCatalog::default();
        let p = project(&mut catalog, false, 1);
        let f = framework(&mut catalog, fixtures::two_level("Custom"));
        attach(&mut catalog, p, f);

        let plan = catalog.plan_detach(p, f).unwrap();
        let outcome = catalog.apply_detach(plan);
        assert_eq!(outcome, DetachOutcome { removed: true, remaining_frameworks: 1 });
        assert_eq!(catalog.implementation_count(), 0);
    }

    #[test]
    fn detach_removes_only_its_rows() {
        let mut catalog = TenantCatalog::default();
        let p = project(&mut catalog, false, 0);
        let a = framework(&mut catalog, fixtures::two_level("A"));
        let b = framework(&mut catalog, fixtures::two_level("B"));
        attach(&mut catalog, p, a);
        let kept = attach(&mut catalog, p, b);

        let plan = catalog.plan_detach(p, a).unwrap();
        catalog.apply_detach(plan);
        assert_eq!(catalog.implementation_count(), 2);
        assert_eq!(catalog.implementations_of(kept.project_framework_id).len(), 2);
    }

    #[test]
    fn detaching_absent_association_is_a_no_op() {
        let mut catalog = TenantCatalog::default();
        let p = project(&mut catalog, false, 2);
        let f = framework(&mut catalog, fixtures::two_level("Never"));

        let plan = catalog.plan_detach(p, f).unwrap();
        let outcome = catalog.apply_detach(plan);
        assert_eq!(outcome, DetachOutcome { removed: false, remaining_frameworks: 2 });
    }

    #[test]
    fn scope_flip_with_attached_frameworks_is_refused() {
        let mut catalog = TenantCatalog::default();
        let p = project(&mut catalog, false, 0);
        let f = framework(&mut catalog, fixtures::two_level("Pinned"));
        attach(&mut catalog, p, f);

        let flip = ProjectUpsert {
            name: "Project".into(),
            is_organizational: true,
            native_framework_count: 0,
        };
        assert!(matches!(
            catalog.plan_project(p, flip, Utc::now()),
            Err(CatalogError::ScopeMismatch { .. })
        ));
    }

    #[test]
    fn patch_sets_and_clears_fields() {
        let mut catalog = TenantCatalog::default();
        let p = project(&mut catalog, false, 0);
        let f = framework(&mut catalog, fixtures::two_level("Patch"));
        let association = attach(&mut catalog, p, f);
        let id = catalog.implementations_of(association.project_framework_id)[0].id;

        let patch: ImplementationPatch = serde_json::from_value(json!({
            "status": "Implemented",
            "owner": "alice",
            "due_date": "2026-12-31",
            "evidence_links": [{"url": "https://example.com/policy.pdf", "label": " Policy "}]
        }))
        .unwrap();
        let record = catalog.plan_implementation_update(p, f, id, patch, Utc::now()).unwrap();
        catalog.apply_implementation(record);

        let record = catalog.implementations.get(&id).unwrap();
        assert_eq!(record.status, ImplementationStatus::Implemented);
        assert_eq!(record.owner.as_deref(), Some("alice"));
        assert_eq!(record.due_date, NaiveDate::from_ymd_opt(2026, 12, 31));
        assert_eq!(record.evidence_links[0].label.as_deref(), Some("Policy"));

        let patch: ImplementationPatch =
            serde_json::from_value(json!({"owner": null, "evidence_links": null})).unwrap();
        let record = catalog.plan_implementation_update(p, f, id, patch, Utc::now()).unwrap();
        assert!(record.owner.is_none());
        assert!(record.evidence_links.is_empty());
        assert_eq!(record.status, ImplementationStatus::Implemented);
        assert!(record.due_date.is_some());
    }

    #[test]
    fn patch_rejects_empty_url_and_foreign_ids() {
        let mut catalog = TenantCatalog::default();
        let p = project(&mut catalog, false, 0);
        let f = framework(&mut catalog, fixtures::two_level("Strict"));
        let association = attach(&mut catalog, p, f);
        let id = catalog.implementations_of(association.project_framework_id)[0].id;

        let patch: ImplementationPatch =
            serde_json::from_value(json!({"evidence_links": [{"url": "  "}]})).unwrap();
        assert!(matches!(
            catalog.plan_implementation_update(p, f, id, patch, Utc::now()),
            Err(CatalogError::BadRequest(_))
        ));

        assert!(matches!(
            catalog.plan_implementation_update(p, f, ImplementationId::new(), ImplementationPatch::default(), Utc::now()),
            Err(CatalogError::ImplementationNotFound(_))
        ));

        let other = framework(&mut catalog, fixtures::two_level("Detached"));
        assert!(matches!(
            catalog.plan_implementation_update(p, other, id, ImplementationPatch::default(), Utc::now()),
            Err(CatalogError::NotAttached { .. })
        ));
    }
}
