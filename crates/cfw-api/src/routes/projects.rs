//! # Project Association API
//!
//! Project mirror upserts, attach/detach, per-project views and
//! implementation updates.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use cfw_core::{FrameworkId, FrameworkProgress, ImplementationId, ProjectId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::catalog::association::{ImplementationPatch, ProjectUpsert};
use crate::catalog::progress::{FrameworkProgressEntry, ProjectFrameworkView};
use crate::catalog::{AssociationRecord, ImplementationRecord, ProjectRecord};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_path};
use crate::orchestration;
use crate::state::AppState;
use crate::tenant::Tenant;

/// Body of `add-to-project` and `remove-from-project`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssociationRequest {
    #[serde(alias = "framework_id")]
    #[schema(value_type = String, format = Uuid)]
    pub framework_id: FrameworkId,
    #[serde(alias = "project_id")]
    #[schema(value_type = String, format = Uuid)]
    pub project_id: ProjectId,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttachResponse {
    pub success: bool,
    /// `false` when the framework was already attached.
    pub created: bool,
    pub association: AssociationRecord,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DetachResponse {
    pub success: bool,
    pub removed: bool,
    pub remaining_frameworks: u32,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects/{project_id}", put(upsert_project))
        .route("/add-to-project", post(add_to_project))
        .route("/remove-from-project", post(remove_from_project))
        .route("/projects/{project_id}/progress", get(project_progress))
        .route("/projects/{project_id}/frameworks/{framework_id}", get(project_framework))
        .route(
            "/projects/{project_id}/frameworks/{framework_id}/progress",
            get(framework_progress),
        )
        .route(
            "/projects/{project_id}/frameworks/{framework_id}/implementations/{implementation_id}",
            patch(update_implementation),
        )
}

/// PUT /projects/{project_id}: Register or update the host project mirror.
#[utoipa::path(
    put,
    path = "/projects/{project_id}",
    params(("project_id" = Uuid, Path, description = "Host project ID")),
    request_body = ProjectUpsert,
    responses(
        (status = 200, description = "Project stored", body = ProjectRecord),
        (status = 422, description = "Blank name or scope change conflicts with attached frameworks", body = crate::error::ErrorBody),
    ),
    tag = "projects"
)]
pub async fn upsert_project(
    State(state): State<AppState>,
    tenant: Tenant,
    id: Result<Path<ProjectId>, PathRejection>,
    body: Result<Json<ProjectUpsert>, JsonRejection>,
) -> Result<Json<ProjectRecord>, AppError> {
    let id = extract_path(id)?;
    let upsert = extract_json(body)?;
    let record = orchestration::upsert_project(&state, &tenant.0, id, upsert).await?;
    Ok(Json(record))
}

/// POST /add-to-project: Attach a framework to a project.
///
/// Idempotent: attaching twice returns the existing association with 200.
#[utoipa::path(
    post,
    path = "/add-to-project",
    request_body = AssociationRequest,
    responses(
        (status = 201, description = "Framework attached", body = AttachResponse),
        (status = 200, description = "Already attached", body = AttachResponse),
        (status = 404, description = "Project or framework not found", body = crate::error::ErrorBody),
        (status = 422, description = "Organizational scope mismatch", body = crate::error::ErrorBody),
    ),
    tag = "projects"
)]
pub async fn add_to_project(
    State(state): State<AppState>,
    tenant: Tenant,
    body: Result<Json<AssociationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AttachResponse>), AppError> {
    let req = extract_json(body)?;
    let (association, created) = orchestration::attach(&state, &tenant.0, req.project_id, req.framework_id).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(AttachResponse {
            success: true,
            created,
            association,
        }),
    ))
}

/// POST /remove-from-project: Detach a framework from a project.
#[utoipa::path(
    post,
    path = "/remove-from-project",
    request_body = AssociationRequest,
    responses(
        (status = 200, description = "Detached, or was not attached", body = DetachResponse),
        (status = 404, description = "Project not found", body = crate::error::ErrorBody),
        (status = 409, description = "Would leave the project without frameworks", body = crate::error::ErrorBody),
    ),
    tag = "projects"
)]
pub async fn remove_from_project(
    State(state): State<AppState>,
    tenant: Tenant,
    body: Result<Json<AssociationRequest>, JsonRejection>,
) -> Result<Json<DetachResponse>, AppError> {
    let req = extract_json(body)?;
    let outcome = orchestration::detach(&state, &tenant.0, req.project_id, req.framework_id).await?;
    Ok(Json(DetachResponse {
        success: true,
        removed: outcome.removed,
        remaining_frameworks: outcome.remaining_frameworks,
    }))
}

/// GET /projects/{project_id}/progress: Buckets for every attached framework.
#[utoipa::path(
    get,
    path = "/projects/{project_id}/progress",
    params(("project_id" = Uuid, Path, description = "Host project ID")),
    responses(
        (status = 200, description = "Progress per attached framework", body = [FrameworkProgressEntry]),
        (status = 404, description = "Project not found", body = crate::error::ErrorBody),
    ),
    tag = "progress"
)]
pub async fn project_progress(
    State(state): State<AppState>,
    tenant: Tenant,
    id: Result<Path<ProjectId>, PathRejection>,
) -> Result<Json<Vec<FrameworkProgressEntry>>, AppError> {
    let id = extract_path(id)?;
    let catalog = state.catalog(&tenant.0).await?;
    let catalog = catalog.read().await;
    Ok(Json(catalog.project_rollup(id)?))
}

/// GET /projects/{project_id}/frameworks/{framework_id}: Tree with implementation rows.
#[utoipa::path(
    get,
    path = "/projects/{project_id}/frameworks/{framework_id}",
    params(
        ("project_id" = Uuid, Path, description = "Host project ID"),
        ("framework_id" = Uuid, Path, description = "Framework ID"),
    ),
    responses(
        (status = 200, description = "Attached framework view", body = ProjectFrameworkView),
        (status = 404, description = "Not found or not attached", body = crate::error::ErrorBody),
    ),
    tag = "progress"
)]
pub async fn project_framework(
    State(state): State<AppState>,
    tenant: Tenant,
    ids: Result<Path<(ProjectId, FrameworkId)>, PathRejection>,
) -> Result<Json<ProjectFrameworkView>, AppError> {
    let (project, framework) = extract_path(ids)?;
    let catalog = state.catalog(&tenant.0).await?;
    let catalog = catalog.read().await;
    Ok(Json(catalog.project_framework_view(project, framework)?))
}

/// GET /projects/{project_id}/frameworks/{framework_id}/progress: One framework's buckets.
#[utoipa::path(
    get,
    path = "/projects/{project_id}/frameworks/{framework_id}/progress",
    params(
        ("project_id" = Uuid, Path, description = "Host project ID"),
        ("framework_id" = Uuid, Path, description = "Framework ID"),
    ),
    responses(
        (status = 200, description = "Completion buckets", body = Object),
        (status = 404, description = "Not found or not attached", body = crate::error::ErrorBody),
    ),
    tag = "progress"
)]
pub async fn framework_progress(
    State(state): State<AppState>,
    tenant: Tenant,
    ids: Result<Path<(ProjectId, FrameworkId)>, PathRejection>,
) -> Result<Json<FrameworkProgress>, AppError> {
    let (project, framework) = extract_path(ids)?;
    let catalog = state.catalog(&tenant.0).await?;
    let catalog = catalog.read().await;
    Ok(Json(catalog.progress(project, framework)?))
}

/// PATCH .../implementations/{implementation_id}: Partial implementation update.
#[utoipa::path(
    patch,
    path = "/projects/{project_id}/frameworks/{framework_id}/implementations/{implementation_id}",
    params(
        ("project_id" = Uuid, Path, description = "Host project ID"),
        ("framework_id" = Uuid, Path, description = "Framework ID"),
        ("implementation_id" = Uuid, Path, description = "Implementation record ID"),
    ),
    request_body = ImplementationPatch,
    responses(
        (status = 200, description = "Updated record", body = ImplementationRecord),
        (status = 404, description = "Not found or not attached", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid field value", body = crate::error::ErrorBody),
    ),
    tag = "projects"
)]
pub async fn update_implementation(
    State(state): State<AppState>,
    tenant: Tenant,
    ids: Result<Path<(ProjectId, FrameworkId, ImplementationId)>, PathRejection>,
    body: Result<Json<ImplementationPatch>, JsonRejection>,
) -> Result<Json<ImplementationRecord>, AppError> {
    let (project, framework, implementation) = extract_path(ids)?;
    let patch = extract_json(body)?;
    let record =
        orchestration::update_implementation(&state, &tenant.0, project, framework, implementation, patch).await?;
    Ok(Json(record))
}
