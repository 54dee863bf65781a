//! # Write Orchestration
//!
//! Every state-changing operation runs the same sequence under the tenant's
//! write lock:
//!
//! 1. **Plan** against the in-memory catalog (invariants checked here).
//! 2. **Persist** the plan in one Postgres transaction, when a pool is
//!    configured.
//! 3. **Apply** the plan to the catalog.
//!
//! A failure at 1 or 2 leaves memory untouched. Imports also run the
//! ingestion normalizer and structural validator before taking the lock.

use cfw_core::{
    validate, FrameworkId, FrameworkSource, ImplementationId, IngestError, ProjectId, TenantId,
    ValidationIssue,
};
use chrono::Utc;
use thiserror::Error;

use crate::catalog::association::{DetachOutcome, ImplementationPatch, ProjectUpsert};
use crate::catalog::import::ImportOutcome;
use crate::catalog::{AssociationRecord, CatalogError, ImplementationRecord, ProjectRecord};
use crate::db;
use crate::db::frameworks::ImportWrite;
use crate::error::AppError;
use crate::metrics::{self as telemetry, ImportOutcome as ImportLabel};
use crate::state::AppState;

/// Why an import did not land.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("framework failed validation with {} issue(s)", .0.len())]
    Invalid(Vec<ValidationIssue>),

    #[error("{0}")]
    Conflict(String),

    /// The tenant could not be loaded.
    #[error(transparent)]
    Unavailable(AppError),

    #[error("import failed: {0}")]
    Failed(String),
}

impl ImportError {
    fn label(&self) -> ImportLabel {
        match self {
            Self::Ingest(_) => ImportLabel::Malformed,
            Self::Invalid(_) => ImportLabel::Invalid,
            Self::Conflict(_) => ImportLabel::Conflict,
            Self::Unavailable(_) | Self::Failed(_) => ImportLabel::Failed,
        }
    }
}

/// Map a write failure, surfacing unique-name races as conflicts.
fn persist_error(err: sqlx::Error) -> CatalogError {
    if db::is_unique_violation(&err) {
        CatalogError::Conflict("a concurrent write changed the same record; retry".into())
    } else {
        CatalogError::Database(err)
    }
}

/// Normalize, validate, persist and apply one import.
pub async fn import(
    state: &AppState,
    tenant: &TenantId,
    source: FrameworkSource<'_>,
) -> Result<ImportOutcome, ImportError> {
    let kind = source.kind();
    let result = run_import(state, tenant, source).await;

    match &result {
        Ok(outcome) => {
            tracing::info!(
                %tenant,
                source = kind,
                framework_id = %outcome.framework_id,
                items_created = outcome.items_created,
                replaced = outcome.replaced,
                "framework imported"
            );
            let label = if outcome.replaced { ImportLabel::Replaced } else { ImportLabel::Created };
            telemetry::record_import(kind, label);
        }
        Err(err) => {
            match err {
                ImportError::Failed(_) | ImportError::Unavailable(_) => {
                    tracing::error!(%tenant, source = kind, error = %err, "framework import failed")
                }
                _ => tracing::warn!(%tenant, source = kind, error = %err, "framework import refused"),
            }
            telemetry::record_import(kind, err.label());
        }
    }
    result
}

async fn run_import(
    state: &AppState,
    tenant: &TenantId,
    source: FrameworkSource<'_>,
) -> Result<ImportOutcome, ImportError> {
    let normalized = cfw_core::normalize(source)?;
    if normalized.needs_validation() {
        validate(&normalized.framework).map_err(ImportError::Invalid)?;
    }

    let catalog = state.catalog(tenant).await.map_err(ImportError::Unavailable)?;
    let mut catalog = catalog.write().await;

    let plan = catalog
        .plan_import(normalized.framework, Utc::now())
        .map_err(|e| match e {
            CatalogError::Invalid(issues) => ImportError::Invalid(issues),
            other => ImportError::Failed(other.to_string()),
        })?;

    if let Some(pool) = &state.db_pool {
        match db::frameworks::write_import(pool, tenant, &plan).await {
            Ok(ImportWrite::Written) => {}
            Ok(ImportWrite::NameTakenBy(other)) => {
                return Err(ImportError::Conflict(format!(
                    "framework name {:?} was taken by {other} in a concurrent import",
                    plan.framework.record.name
                )));
            }
            Err(e) => {
                return Err(match persist_error(e) {
                    CatalogError::Conflict(message) => ImportError::Conflict(message),
                    other => ImportError::Failed(other.to_string()),
                })
            }
        }
    }

    Ok(catalog.apply_import(plan))
}

pub async fn delete_framework(state: &AppState, tenant: &TenantId, id: FrameworkId) -> Result<(), AppError> {
    let catalog = state.catalog(tenant).await?;
    let mut catalog = catalog.write().await;

    if let Err(err) = catalog.plan_delete(id) {
        if let CatalogError::InUse { projects, .. } = &err {
            tracing::warn!(%tenant, framework_id = %id, linked = projects.len(), "framework delete refused");
        }
        return Err(err.into());
    }
    if let Some(pool) = &state.db_pool {
        db::frameworks::delete(pool, tenant, id).await.map_err(persist_error)?;
    }
    if let Some(entry) = catalog.apply_delete(id) {
        tracing::info!(%tenant, framework_id = %id, name = %entry.record.name, "framework deleted");
        telemetry::record_framework_deleted();
    }
    Ok(())
}

pub async fn upsert_project(
    state: &AppState,
    tenant: &TenantId,
    id: ProjectId,
    upsert: ProjectUpsert,
) -> Result<ProjectRecord, AppError> {
    let catalog = state.catalog(tenant).await?;
    let mut catalog = catalog.write().await;

    let record = catalog.plan_project(id, upsert, Utc::now())?;
    if let Some(pool) = &state.db_pool {
        db::projects::upsert_project(pool, tenant, &record).await.map_err(persist_error)?;
    }
    catalog.apply_project(record.clone());
    tracing::info!(
        %tenant,
        project_id = %id,
        is_organizational = record.is_organizational,
        native_frameworks = record.native_framework_count,
        "project upserted"
    );
    Ok(record)
}

/// Attach a framework. Returns the association and whether it is new.
pub async fn attach(
    state: &AppState,
    tenant: &TenantId,
    project: ProjectId,
    framework: FrameworkId,
) -> Result<(AssociationRecord, bool), AppError> {
    let catalog = state.catalog(tenant).await?;
    let mut catalog = catalog.write().await;

    let plan = match catalog.plan_attach(project, framework, Utc::now()) {
        Ok(plan) => plan,
        Err(err) => {
            if matches!(err, CatalogError::ScopeMismatch { .. }) {
                tracing::warn!(%tenant, project_id = %project, framework_id = %framework, "attach refused: scope mismatch");
                telemetry::record_association("refused");
            }
            return Err(err.into());
        }
    };

    let created = match &plan {
        crate::catalog::association::AttachPlan::Existing(_) => false,
        crate::catalog::association::AttachPlan::New {
            association,
            implementations,
        } => {
            if let Some(pool) = &state.db_pool {
                db::projects::attach(pool, tenant, association, implementations)
                    .await
                    .map_err(persist_error)?;
            }
            tracing::info!(
                %tenant,
                project_id = %project,
                framework_id = %framework,
                implementations = implementations.len(),
                "framework attached"
            );
            true
        }
    };

    let association = catalog.apply_attach(plan);
    if created {
        telemetry::record_association("attach");
    }
    Ok((association, created))
}

pub async fn detach(
    state: &AppState,
    tenant: &TenantId,
    project: ProjectId,
    framework: FrameworkId,
) -> Result<DetachOutcome, AppError> {
    let catalog = state.catalog(tenant).await?;
    let mut catalog = catalog.write().await;

    let plan = match catalog.plan_detach(project, framework) {
        Ok(plan) => plan,
        Err(err) => {
            if matches!(err, CatalogError::LastFramework(_)) {
                tracing::warn!(%tenant, project_id = %project, framework_id = %framework, "detach refused: last framework");
                telemetry::record_association("refused");
            }
            return Err(err.into());
        }
    };

    if let crate::catalog::association::DetachPlan::Remove { association, .. } = &plan {
        if let Some(pool) = &state.db_pool {
            db::projects::detach(pool, tenant, association.project_framework_id)
                .await
                .map_err(persist_error)?;
        }
    }

    let outcome = catalog.apply_detach(plan);
    if outcome.removed {
        tracing::info!(
            %tenant,
            project_id = %project,
            framework_id = %framework,
            remaining = outcome.remaining_frameworks,
            "framework detached"
        );
        telemetry::record_association("detach");
    }
    Ok(outcome)
}

pub async fn update_implementation(
    state: &AppState,
    tenant: &TenantId,
    project: ProjectId,
    framework: FrameworkId,
    implementation: ImplementationId,
    patch: ImplementationPatch,
) -> Result<ImplementationRecord, AppError> {
    let catalog = state.catalog(tenant).await?;
    let mut catalog = catalog.write().await;

    let record = catalog.plan_implementation_update(project, framework, implementation, patch, Utc::now())?;
    if let Some(pool) = &state.db_pool {
        db::projects::update_implementation(pool, tenant, &record)
            .await
            .map_err(persist_error)?;
    }
    catalog.apply_implementation(record.clone());
    tracing::debug!(%tenant, implementation_id = %implementation, status = %record.status, "implementation updated");
    Ok(record)
}
