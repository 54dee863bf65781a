//! Read path: summaries, detail views and progress buckets.

use std::collections::HashMap;

use cfw_core::progress::aggregate;
use cfw_core::{AssociationId, FrameworkId, FrameworkProgress, HierarchyType, LeafState, NodeId, ProjectId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{
    AssociationRecord, CatalogError, CategoryNode, FrameworkEntry, FrameworkRecord,
    ImplementationRecord, TenantCatalog,
};

/// List entry for `GET /frameworks`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FrameworkSummary {
    #[serde(flatten)]
    pub record: FrameworkRecord,
    pub level1_count: usize,
    pub level2_count: usize,
    pub level3_count: usize,
    pub linked_project_count: usize,
}

/// A project attached to a framework, with its progress.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkedProject {
    #[schema(value_type = String, format = Uuid)]
    pub project_id: ProjectId,
    pub project_name: String,
    #[schema(value_type = String, format = Uuid)]
    pub project_framework_id: AssociationId,
    pub added_at: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub progress: FrameworkProgress,
}

/// Full tree plus every linked project.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FrameworkDetail {
    #[serde(flatten)]
    pub record: FrameworkRecord,
    pub structure: Vec<CategoryNode>,
    #[serde(rename = "linkedProjects")]
    pub linked_projects: Vec<LinkedProject>,
}

/// One framework's buckets inside a project rollup.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FrameworkProgressEntry {
    #[schema(value_type = String, format = Uuid)]
    pub framework_id: FrameworkId,
    pub name: String,
    #[schema(value_type = String)]
    pub hierarchy_type: HierarchyType,
    #[schema(value_type = Object)]
    pub progress: FrameworkProgress,
}

/// Tree of one attached framework with the project's implementation rows,
/// in leaf display order.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProjectFrameworkView {
    pub framework: FrameworkRecord,
    #[schema(value_type = String, format = Uuid)]
    pub project_framework_id: AssociationId,
    pub structure: Vec<CategoryNode>,
    pub implementations: Vec<ImplementationRecord>,
    #[schema(value_type = Object)]
    pub progress: FrameworkProgress,
}

impl TenantCatalog {
    fn leaf_states(&self, association: AssociationId) -> HashMap<NodeId, LeafState> {
        self.implementations_of(association)
            .into_iter()
            .map(|i| (i.leaf_node_id, LeafState::new(i.status, i.owner.is_some())))
            .collect()
    }

    fn progress_of(&self, framework: &FrameworkEntry, association: &AssociationRecord) -> FrameworkProgress {
        let states = self.leaf_states(association.project_framework_id);
        let controls: Vec<Vec<LeafState>> = framework
            .leaves_by_control()
            .into_iter()
            .map(|leaves| {
                leaves
                    .iter()
                    .map(|leaf| states.get(leaf).copied().unwrap_or_default())
                    .collect()
            })
            .collect();
        aggregate(framework.record.hierarchy_type, &controls)
    }

    fn attached(
        &self,
        project: ProjectId,
        framework: FrameworkId,
    ) -> Result<(&FrameworkEntry, &AssociationRecord), CatalogError> {
        let entry = self.framework(framework)?;
        let association = self
            .association(project, framework)
            .ok_or(CatalogError::NotAttached { project, framework })?;
        Ok((entry, association))
    }

    /// Buckets for one project + framework pair.
    pub fn progress(&self, project: ProjectId, framework: FrameworkId) -> Result<FrameworkProgress, CatalogError> {
        let (entry, association) = self.attached(project, framework)?;
        Ok(self.progress_of(entry, association))
    }

    /// One independent result per attached framework, oldest association
    /// first.
    pub fn project_rollup(&self, project: ProjectId) -> Result<Vec<FrameworkProgressEntry>, CatalogError> {
        self.project(project)?;
        self.associations_of_project(project)
            .into_iter()
            .map(|association| {
                let entry = self.framework(association.framework_id)?;
                Ok(FrameworkProgressEntry {
                    framework_id: entry.record.id,
                    name: entry.record.name.clone(),
                    hierarchy_type: entry.record.hierarchy_type,
                    progress: self.progress_of(entry, association),
                })
            })
            .collect()
    }

    pub fn linked_projects(&self, framework: FrameworkId) -> Result<Vec<LinkedProject>, CatalogError> {
        let entry = self.framework(framework)?;
        Ok(self
            .associations_of_framework(framework)
            .into_iter()
            .filter_map(|association| {
                let project = self.projects.get(&association.project_id)?;
                Some(LinkedProject {
                    project_id: project.id,
                    project_name: project.name.clone(),
                    project_framework_id: association.project_framework_id,
                    added_at: association.added_at,
                    progress: self.progress_of(entry, association),
                })
            })
            .collect())
    }

    pub fn summaries(&self) -> Vec<FrameworkSummary> {
        self.frameworks()
            .into_iter()
            .map(|entry| {
                let (level1_count, level2_count, level3_count) = entry.level_counts();
                FrameworkSummary {
                    record: entry.record.clone(),
                    level1_count,
                    level2_count,
                    level3_count,
                    linked_project_count: self.associations_of_framework(entry.record.id).len(),
                }
            })
            .collect()
    }

    pub fn framework_detail(&self, framework: FrameworkId) -> Result<FrameworkDetail, CatalogError> {
        let entry = self.framework(framework)?;
        Ok(FrameworkDetail {
            record: entry.record.clone(),
            structure: entry.structure.clone(),
            linked_projects: self.linked_projects(framework)?,
        })
    }

    pub fn project_framework_view(
        &self,
        project: ProjectId,
        framework: FrameworkId,
    ) -> Result<ProjectFrameworkView, CatalogError> {
        let (entry, association) = self.attached(project, framework)?;
        let implementations = entry
            .leaf_ids()
            .into_iter()
            .filter_map(|leaf| self.implementation_for_leaf(association.project_framework_id, leaf))
            .cloned()
            .collect();
        Ok(ProjectFrameworkView {
            framework: entry.record.clone(),
            project_framework_id: association.project_framework_id,
            structure: entry.structure.clone(),
            implementations,
            progress: self.progress_of(entry, association),
        })
    }
}
