//! Import (create or replace) and delete planning.
//!
//! Re-importing a name that already exists keeps the framework id and
//! reuses node ids wherever the same title sits under the same reused
//! parent. Implementation rows of leaves that disappear are purged and new
//! leaves receive `Not started` rows in every existing association.

use std::collections::HashSet;

use cfw_core::{
    FrameworkId, HierarchyType, ImplementationId, NodeId, ParsedFramework, ValidationIssue,
};
use chrono::{DateTime, Utc};

use super::{
    CatalogError, CategoryNode, ControlNode, FrameworkEntry, FrameworkRecord, ImplementationRecord,
    SubControlNode, TenantCatalog,
};

/// Rows an import will write.
#[derive(Debug, Clone)]
pub struct ImportPlan {
    pub framework: FrameworkEntry,
    /// `true` when an existing framework of the same name is replaced.
    pub replaced: bool,
    /// Implementation rows whose leaf no longer exists.
    pub purged: Vec<ImplementationId>,
    /// Rows for new leaves in existing associations.
    pub created: Vec<ImplementationRecord>,
}

/// Result echoed to the importer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOutcome {
    pub framework_id: FrameworkId,
    pub items_created: usize,
    pub replaced: bool,
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Remove and return the first node in `pool` titled `title`.
fn take_by_title<'a, T>(pool: &mut Vec<&'a T>, title: &str, title_of: impl Fn(&T) -> &str) -> Option<&'a T> {
    let pos = pool.iter().position(|node| title_of(node) == title)?;
    Some(pool.remove(pos))
}

/// Build the ordered tree, reusing ids from `previous` where titles match.
fn build_tree(parsed: &ParsedFramework, kind: HierarchyType, previous: Option<&FrameworkEntry>) -> Vec<CategoryNode> {
    let mut old_categories: Vec<&CategoryNode> = previous.map(|p| p.structure.iter().collect()).unwrap_or_default();

    parsed
        .structure
        .iter()
        .enumerate()
        .map(|(i, category)| {
            let title = category.title.trim().to_string();
            let reused = take_by_title(&mut old_categories, &title, |c| &c.title);
            let mut old_controls: Vec<&ControlNode> = reused.map(|c| c.items.iter().collect()).unwrap_or_default();

            let items = category
                .items
                .iter()
                .enumerate()
                .map(|(j, control)| {
                    let title = control.title.trim().to_string();
                    let reused = take_by_title(&mut old_controls, &title, |c| &c.title);
                    let mut old_subs: Vec<&SubControlNode> =
                        reused.map(|c| c.items.iter().collect()).unwrap_or_default();

                    let items = if kind.has_level3() {
                        control
                            .items
                            .iter()
                            .enumerate()
                            .map(|(k, sub)| {
                                let title = sub.title.trim().to_string();
                                let reused = take_by_title(&mut old_subs, &title, |s| &s.title);
                                SubControlNode {
                                    id: reused.map_or_else(NodeId::new, |s| s.id),
                                    title,
                                    description: non_blank(sub.description.as_ref()),
                                    order_no: cfw_core::parsed::effective_order(sub.order_no, k),
                                }
                            })
                            .collect()
                    } else {
                        Vec::new()
                    };

                    ControlNode {
                        id: reused.map_or_else(NodeId::new, |c| c.id),
                        title,
                        description: non_blank(control.description.as_ref()),
                        summary: non_blank(control.summary.as_ref()),
                        questions: control.questions.iter().map(|q| q.trim().to_string()).filter(|q| !q.is_empty()).collect(),
                        evidence_examples: control
                            .evidence_examples
                            .iter()
                            .map(|e| e.trim().to_string())
                            .filter(|e| !e.is_empty())
                            .collect(),
                        order_no: cfw_core::parsed::effective_order(control.order_no, j),
                        items,
                    }
                })
                .collect();

            CategoryNode {
                id: reused.map_or_else(NodeId::new, |c| c.id),
                title,
                description: non_blank(category.description.as_ref()),
                order_no: cfw_core::parsed::effective_order(category.order_no, i),
                items,
            }
        })
        .collect()
}

impl TenantCatalog {
    /// Plan the import of an already validated (or trusted) framework.
    ///
    /// The tree is put in canonical order first, so declaration order fills
    /// any missing `order_no`.
    pub fn plan_import(&self, parsed: ParsedFramework, now: DateTime<Utc>) -> Result<ImportPlan, CatalogError> {
        let parsed = parsed.into_canonical_order();
        let kind = parsed.hierarchy_type().ok_or_else(|| {
            CatalogError::Invalid(vec![ValidationIssue {
                path: "hierarchy.type".into(),
                message: format!("unknown hierarchy type {:?}", parsed.hierarchy.kind),
            }])
        })?;

        let name = parsed.name.trim().to_string();
        let previous = self.framework_by_name(&name);
        if let Some(previous) = previous {
            self.check_scope_kept(previous, parsed.is_organizational)?;
        }
        let structure = build_tree(&parsed, kind, previous);

        let record = FrameworkRecord {
            id: previous.map_or_else(FrameworkId::new, |p| p.record.id),
            name,
            description: parsed.description.trim().to_string(),
            version: parsed.version.trim().to_string(),
            is_organizational: parsed.is_organizational,
            hierarchy_type: kind,
            level_1_name: parsed.hierarchy.level1_name.trim().to_string(),
            level_2_name: parsed.hierarchy.level2_name.trim().to_string(),
            level_3_name: if kind.has_level3() {
                non_blank(parsed.hierarchy.level3_name.as_ref())
            } else {
                None
            },
            created_at: previous.map_or(now, |p| p.record.created_at),
            updated_at: now,
        };
        let framework = FrameworkEntry { record, structure };

        let mut purged = Vec::new();
        let mut created = Vec::new();
        if previous.is_some() {
            let leaves = framework.leaf_ids();
            let leaf_set: HashSet<NodeId> = leaves.iter().copied().collect();

            for association in self.associations_of_framework(framework.record.id) {
                let existing = self.implementations_of(association.project_framework_id);
                let covered: HashSet<NodeId> = existing.iter().map(|i| i.leaf_node_id).collect();

                purged.extend(
                    existing
                        .iter()
                        .filter(|i| !leaf_set.contains(&i.leaf_node_id))
                        .map(|i| i.id),
                );
                created.extend(
                    leaves
                        .iter()
                        .filter(|leaf| !covered.contains(leaf))
                        .map(|leaf| ImplementationRecord::not_started(association.project_framework_id, *leaf, now)),
                );
            }
        }

        Ok(ImportPlan {
            framework,
            replaced: previous.is_some(),
            purged,
            created,
        })
    }

    /// A re-import may not flip `is_organizational` while projects of the
    /// old scope are attached.
    fn check_scope_kept(&self, previous: &FrameworkEntry, is_organizational: bool) -> Result<(), CatalogError> {
        if previous.record.is_organizational == is_organizational {
            return Ok(());
        }
        let linked: Vec<String> = self
            .associations_of_framework(previous.record.id)
            .iter()
            .map(|a| a.project_id.to_string())
            .collect();
        if linked.is_empty() {
            return Ok(());
        }
        Err(CatalogError::Invalid(vec![ValidationIssue {
            path: "is_organizational".into(),
            message: format!(
                "cannot change scope while attached to project(s) {}; detach them first",
                linked.join(", ")
            ),
        }]))
    }

    pub fn apply_import(&mut self, plan: ImportPlan) -> ImportOutcome {
        let outcome = ImportOutcome {
            framework_id: plan.framework.record.id,
            items_created: plan.framework.leaf_count(),
            replaced: plan.replaced,
        };
        for id in &plan.purged {
            self.implementations.remove(id);
        }
        for record in plan.created {
            self.implementations.insert(record.id, record);
        }
        self.frameworks.insert(outcome.framework_id, plan.framework);
        outcome
    }

    /// Deletion is refused while any project is attached.
    pub fn plan_delete(&self, id: FrameworkId) -> Result<(), CatalogError> {
        self.framework(id)?;
        let projects: Vec<_> = self
            .associations_of_framework(id)
            .iter()
            .map(|a| a.project_id)
            .collect();
        if projects.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::InUse { framework: id, projects })
        }
    }

    pub fn apply_delete(&mut self, id: FrameworkId) -> Option<FrameworkEntry> {
        self.frameworks.remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures;
    use cfw_core::ProjectId;

    fn import(catalog: &mut TenantCatalog, parsed: ParsedFramework) -> ImportOutcome {
        let plan = catalog.plan_import(parsed, Utc::now()).unwrap();
        catalog.apply_import(plan)
    }

    #[test]
    fn import_counts_leaves() {
        let mut catalog = TenantCatalog::default();
        let outcome = import(&mut catalog, fixtures::two_level("Test FW"));
        assert_eq!(outcome.items_created, 2);
        assert!(!outcome.replaced);

        let outcome = import(&mut catalog, fixtures::three_level("Deep"));
        assert_eq!(outcome.items_created, 3);
    }

    #[test]
    fn declared_order_fills_order_no() {
        let mut catalog = TenantCatalog::default();
        let id = import(&mut catalog, fixtures::two_level("Ordered")).framework_id;
        let entry = catalog.framework(id).unwrap();
        let orders: Vec<_> = entry.structure[0].items.iter().map(|c| c.order_no).collect();
        assert_eq!(orders, [1, 2]);
        assert_eq!(entry.structure[0].order_no, 1);
    }

    #[test]
    fn reimport_keeps_one_framework_and_reuses_ids() {
        let mut catalog = TenantCatalog::default();
        let first = import(&mut catalog, fixtures::two_level("Same"));
        let ctrl1 = catalog.framework(first.framework_id).unwrap().structure[0].items[0].id;

        let mut next = fixtures::two_level("Same");
        next.structure[0].items.push(cfw_core::Level2Item {
            title: "Ctrl3".into(),
            ..Default::default()
        });
        let second = import(&mut catalog, next);

        assert!(second.replaced);
        assert_eq!(second.framework_id, first.framework_id);
        assert_eq!(second.items_created, 3);
        assert_eq!(catalog.frameworks().len(), 1);
        let entry = catalog.framework(first.framework_id).unwrap();
        assert_eq!(entry.structure[0].items[0].id, ctrl1);
    }

    #[test]
    fn reimport_reconciles_attached_projects() {
        let mut catalog = TenantCatalog::default();
        let fw = import(&mut catalog, fixtures::two_level("Reconcile")).framework_id;
        let project = ProjectId::new();
        catalog.apply_project(crate::catalog::ProjectRecord {
            id: project,
            name: "P".into(),
            is_organizational: false,
            native_framework_count: 1,
            updated_at: Utc::now(),
        });
        let plan = catalog.plan_attach(project, fw, Utc::now()).unwrap();
        catalog.apply_attach(plan);
        assert_eq!(catalog.implementation_count(), 2);

        // Drop Ctrl2, add Ctrl9.
        let mut next = fixtures::two_level("Reconcile");
        next.structure[0].items[1].title = "Ctrl9".into();
        let plan = catalog.plan_import(next, Utc::now()).unwrap();
        assert_eq!(plan.purged.len(), 1);
        assert_eq!(plan.created.len(), 1);
        catalog.apply_import(plan);

        let entry = catalog.framework(fw).unwrap();
        let leaves: HashSet<_> = entry.leaf_ids().into_iter().collect();
        let association = catalog.association(project, fw).unwrap().project_framework_id;
        let implementations = catalog.implementations_of(association);
        assert_eq!(implementations.len(), 2);
        assert!(implementations.iter().all(|i| leaves.contains(&i.leaf_node_id)));
    }

    #[test]
    fn reimport_cannot_flip_scope_while_attached() {
        let mut catalog = TenantCatalog::default();
        let fw = import(&mut catalog, fixtures::two_level("Flip")).framework_id;
        let project = ProjectId::new();
        catalog.apply_project(crate::catalog::ProjectRecord {
            id: project,
            name: "P".into(),
            is_organizational: false,
            native_framework_count: 1,
            updated_at: Utc::now(),
        });
        let plan = catalog.plan_attach(project, fw, Utc::now()).unwrap();
        catalog.apply_attach(plan);

        let mut flipped = fixtures::two_level("Flip");
        flipped.is_organizational = true;
        match catalog.plan_import(flipped.clone(), Utc::now()) {
            Err(CatalogError::Invalid(issues)) => {
                assert_eq!(issues[0].path, "is_organizational");
                assert!(issues[0].message.contains(&project.to_string()));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
        assert!(!catalog.framework(fw).unwrap().record.is_organizational);

        // Once detached, the scope may change.
        let detach = catalog.plan_detach(project, fw).unwrap();
        catalog.apply_detach(detach);
        let plan = catalog.plan_import(flipped, Utc::now()).unwrap();
        assert!(plan.framework.record.is_organizational);
    }

    #[test]
    fn delete_is_refused_while_attached() {
        let mut catalog = TenantCatalog::default();
        let fw = import(&mut catalog, fixtures::two_level("Busy")).framework_id;
        let project = ProjectId::new();
        catalog.apply_project(crate::catalog::ProjectRecord {
            id: project,
            name: "P".into(),
            is_organizational: false,
            native_framework_count: 0,
            updated_at: Utc::now(),
        });
        let plan = catalog.plan_attach(project, fw, Utc::now()).unwrap();
        catalog.apply_attach(plan);

        match catalog.plan_delete(fw) {
            Err(CatalogError::InUse { projects, .. }) => assert_eq!(projects, [project]),
            other => panic!("expected InUse, got {other:?}"),
        }
    }

    #[test]
    fn delete_unattached_framework() {
        let mut catalog = TenantCatalog::default();
        let fw = import(&mut catalog, fixtures::two_level("Idle")).framework_id;
        catalog.plan_delete(fw).unwrap();
        assert!(catalog.apply_delete(fw).is_some());
        assert!(matches!(catalog.framework(fw), Err(CatalogError::FrameworkNotFound(_))));
        assert!(matches!(catalog.plan_delete(fw), Err(CatalogError::FrameworkNotFound(_))));
    }

    #[test]
    fn unknown_hierarchy_type_is_rejected_even_when_trusted() {
        let mut parsed = fixtures::two_level("Odd");
        parsed.hierarchy.kind = "flat".into();
        let err = TenantCatalog::default().plan_import(parsed, Utc::now()).unwrap_err();
        assert!(matches!(err, CatalogError::Invalid(issues) if issues[0].path == "hierarchy.type"));
    }
}
