//! # Framework Catalog API
//!
//! Import (JSON, pre-parsed workbook rows, raw `.xlsx`, template library),
//! listing, detail and deletion.
//!
//! Import endpoints answer with [`ImportResponse`] whatever the outcome, so
//! the UI can render parser and validation messages directly.

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use cfw_core::ingest::{templates, xlsx};
use cfw_core::{FrameworkId, FrameworkSource, IngestError, TemplateMode, ValidationIssue, WorkbookData};
use serde::Serialize;
use utoipa::ToSchema;

use crate::catalog::import::ImportOutcome;
use crate::catalog::progress::{FrameworkDetail, FrameworkSummary};
use crate::error::AppError;
use crate::extractors::extract_path;
use crate::orchestration::{self, ImportError};
use crate::state::AppState;
use crate::tenant::Tenant;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const TEMPLATE_FILENAME: &str = "framework-import-template.xlsx";

/// Outcome of an import, successful or not.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = Uuid)]
    pub framework_id: Option<FrameworkId>,
    /// Leaf count of the imported structure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_created: Option<usize>,
    /// `true` when an existing framework of the same name was replaced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub errors: Option<Vec<ValidationIssue>>,
}

impl ImportResponse {
    fn success(outcome: ImportOutcome) -> Self {
        Self {
            success: true,
            framework_id: Some(outcome.framework_id),
            items_created: Some(outcome.items_created),
            replaced: Some(outcome.replaced),
            message: None,
            errors: None,
        }
    }

    fn failure(message: impl Into<String>, errors: Option<Vec<ValidationIssue>>) -> Self {
        Self {
            success: false,
            framework_id: None,
            items_created: None,
            replaced: None,
            message: Some(message.into()),
            errors,
        }
    }
}

fn import_failure(err: ImportError) -> (StatusCode, ImportResponse) {
    match err {
        ImportError::Ingest(IngestError::UnknownTemplate(id)) => (
            StatusCode::NOT_FOUND,
            ImportResponse::failure(format!("unknown template: {id}"), None),
        ),
        ImportError::Ingest(IngestError::WorkbookWrite(_)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ImportResponse::failure("import failed", None),
        ),
        ImportError::Ingest(e) => (StatusCode::BAD_REQUEST, ImportResponse::failure(e.to_string(), None)),
        ImportError::Invalid(issues) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ImportResponse::failure("framework failed validation", Some(issues)),
        ),
        ImportError::Conflict(message) => (StatusCode::CONFLICT, ImportResponse::failure(message, None)),
        ImportError::Unavailable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            ImportResponse::failure("tenant storage is unavailable", None),
        ),
        ImportError::Failed(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ImportResponse::failure("import failed", None),
        ),
    }
}

async fn run_import(state: &AppState, tenant: &Tenant, source: FrameworkSource<'_>) -> (StatusCode, Json<ImportResponse>) {
    match orchestration::import(state, &tenant.0, source).await {
        Ok(outcome) => {
            let status = if outcome.replaced { StatusCode::OK } else { StatusCode::CREATED };
            (status, Json(ImportResponse::success(outcome)))
        }
        Err(err) => {
            let (status, body) = import_failure(err);
            (status, Json(body))
        }
    }
}

/// Template library entry.
#[derive(Debug, Serialize, ToSchema)]
pub struct TemplateSummary {
    pub id: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub success: bool,
    #[schema(value_type = String, format = Uuid)]
    pub framework_id: FrameworkId,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/frameworks", get(list_frameworks))
        .route("/frameworks/{framework_id}", get(get_framework).delete(delete_framework))
        .route("/import", post(import_json))
        .route("/import-excel", post(import_excel))
        .route("/import-workbook", post(import_workbook))
        .route("/template", get(download_template))
        .route("/templates", get(list_templates))
        .route("/templates/{template_id}", get(get_template))
        .route("/templates/{template_id}/import", post(import_template))
}

/// GET /frameworks: List frameworks with node counts per level.
#[utoipa::path(
    get,
    path = "/frameworks",
    responses((status = 200, description = "Framework summaries, sorted by name", body = [FrameworkSummary])),
    tag = "frameworks"
)]
pub async fn list_frameworks(
    State(state): State<AppState>,
    tenant: Tenant,
) -> Result<Json<Vec<FrameworkSummary>>, AppError> {
    let catalog = state.catalog(&tenant.0).await?;
    let catalog = catalog.read().await;
    Ok(Json(catalog.summaries()))
}

/// GET /frameworks/{framework_id}: Full tree and linked projects.
#[utoipa::path(
    get,
    path = "/frameworks/{framework_id}",
    params(("framework_id" = Uuid, Path, description = "Framework ID")),
    responses(
        (status = 200, description = "Framework found", body = FrameworkDetail),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "frameworks"
)]
pub async fn get_framework(
    State(state): State<AppState>,
    tenant: Tenant,
    id: Result<Path<FrameworkId>, PathRejection>,
) -> Result<Json<FrameworkDetail>, AppError> {
    let id = extract_path(id)?;
    let catalog = state.catalog(&tenant.0).await?;
    let catalog = catalog.read().await;
    Ok(Json(catalog.framework_detail(id)?))
}

/// DELETE /frameworks/{framework_id}: Delete an unattached framework.
#[utoipa::path(
    delete,
    path = "/frameworks/{framework_id}",
    params(("framework_id" = Uuid, Path, description = "Framework ID")),
    responses(
        (status = 200, description = "Framework deleted", body = DeleteResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Framework is attached to projects", body = crate::error::ErrorBody),
    ),
    tag = "frameworks"
)]
pub async fn delete_framework(
    State(state): State<AppState>,
    tenant: Tenant,
    id: Result<Path<FrameworkId>, PathRejection>,
) -> Result<Json<DeleteResponse>, AppError> {
    let id = extract_path(id)?;
    orchestration::delete_framework(&state, &tenant.0, id).await?;
    Ok(Json(DeleteResponse {
        success: true,
        framework_id: id,
    }))
}

/// POST /import: Import a framework from JSON text.
///
/// The body is read as text so parser errors reach the caller verbatim.
#[utoipa::path(
    post,
    path = "/import",
    request_body(content = String, description = "Framework JSON", content_type = "application/json"),
    responses(
        (status = 201, description = "Framework created", body = ImportResponse),
        (status = 200, description = "Existing framework replaced", body = ImportResponse),
        (status = 400, description = "Malformed JSON", body = ImportResponse),
        (status = 422, description = "Validation failed", body = ImportResponse),
        (status = 409, description = "Concurrent import conflict", body = ImportResponse),
    ),
    tag = "import"
)]
pub async fn import_json(State(state): State<AppState>, tenant: Tenant, body: String) -> impl IntoResponse {
    run_import(&state, &tenant, FrameworkSource::Json(&body)).await
}

/// POST /import-excel: Import pre-parsed workbook sheets.
#[utoipa::path(
    post,
    path = "/import-excel",
    request_body(content = Object, description = "`{info: {field: value}, structure: [row]}`"),
    responses(
        (status = 201, description = "Framework created", body = ImportResponse),
        (status = 400, description = "Malformed body", body = ImportResponse),
        (status = 422, description = "Validation failed", body = ImportResponse),
    ),
    tag = "import"
)]
pub async fn import_excel(
    State(state): State<AppState>,
    tenant: Tenant,
    body: Result<Json<WorkbookData>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(data)) => run_import(&state, &tenant, FrameworkSource::Workbook(data))
            .await
            .into_response(),
        Err(rejection) => {
            crate::metrics::record_import("workbook", crate::metrics::ImportOutcome::Malformed);
            (
                StatusCode::BAD_REQUEST,
                Json(ImportResponse::failure(rejection.body_text(), None)),
            )
                .into_response()
        }
    }
}

/// POST /import-workbook: Import a raw `.xlsx` upload.
#[utoipa::path(
    post,
    path = "/import-workbook",
    request_body(content = Vec<u8>, description = "Workbook bytes", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
    responses(
        (status = 201, description = "Framework created", body = ImportResponse),
        (status = 400, description = "Unreadable workbook or missing sheet", body = ImportResponse),
        (status = 422, description = "Validation failed", body = ImportResponse),
    ),
    tag = "import"
)]
pub async fn import_workbook(State(state): State<AppState>, tenant: Tenant, body: Bytes) -> impl IntoResponse {
    run_import(&state, &tenant, FrameworkSource::Xlsx(&body)).await
}

/// GET /template: Blank `.xlsx` import template.
#[utoipa::path(
    get,
    path = "/template",
    responses((status = 200, description = "`.xlsx` workbook with both sheets pre-labeled")),
    tag = "import"
)]
pub async fn download_template() -> Result<Response, AppError> {
    let bytes = xlsx::template_xlsx().map_err(|e| AppError::Internal(e.to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{TEMPLATE_FILENAME}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// GET /templates: Bundled template library.
#[utoipa::path(
    get,
    path = "/templates",
    responses((status = 200, description = "Bundled templates", body = [TemplateSummary])),
    tag = "templates"
)]
pub async fn list_templates() -> Json<Vec<TemplateSummary>> {
    Json(
        templates::list()
            .iter()
            .map(|t| TemplateSummary {
                id: t.id.to_string(),
                title: t.title.to_string(),
                description: t.description.to_string(),
            })
            .collect(),
    )
}

/// GET /templates/{template_id}: Template JSON, for editing before import.
#[utoipa::path(
    get,
    path = "/templates/{template_id}",
    params(("template_id" = String, Path, description = "Template ID")),
    responses(
        (status = 200, description = "Template framework JSON", body = Object),
        (status = 404, description = "Unknown template", body = crate::error::ErrorBody),
    ),
    tag = "templates"
)]
pub async fn get_template(Path(id): Path<String>) -> Result<Json<serde_json::Value>, AppError> {
    let template = templates::find(&id).ok_or_else(|| AppError::NotFound(format!("template {id} not found")))?;
    let value = serde_json::from_str(template.source).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(value))
}

/// POST /templates/{template_id}/import: Import a template as-is.
#[utoipa::path(
    post,
    path = "/templates/{template_id}/import",
    params(("template_id" = String, Path, description = "Template ID")),
    responses(
        (status = 201, description = "Framework created", body = ImportResponse),
        (status = 200, description = "Existing framework replaced", body = ImportResponse),
        (status = 404, description = "Unknown template", body = ImportResponse),
    ),
    tag = "templates"
)]
pub async fn import_template(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let source = FrameworkSource::Template {
        id: &id,
        mode: TemplateMode::AsIs,
    };
    run_import(&state, &tenant, source).await
}
