//! # OpenAPI Specification Assembly
//!
//! Assembles the utoipa-documented routes into one OpenAPI 3.1 document,
//! served at `/openapi.json` under the plugin prefix. Paths are relative to
//! that prefix.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Custom Compliance Framework API",
        version = "0.1.0",
        description = "Import, browse and track custom compliance frameworks.\n\nProvides:\n- **Import** from JSON, workbook rows, `.xlsx` uploads and the bundled template library\n- **Catalog** listing, detail and deletion\n- **Project associations** with per-leaf implementation tracking\n- **Progress** buckets per framework and per project\n\nEvery request is scoped to the tenant named by the `X-Tenant-Id` header."
    ),
    servers(
        (url = "/plugins/custom-framework-import", description = "Default plugin mount"),
    ),
    paths(
        // ── Catalog ─────────────────────────────────────────────────────
        crate::routes::frameworks::list_frameworks,
        crate::routes::frameworks::get_framework,
        crate::routes::frameworks::delete_framework,
        // ── Import ──────────────────────────────────────────────────────
        crate::routes::frameworks::import_json,
        crate::routes::frameworks::import_excel,
        crate::routes::frameworks::import_workbook,
        crate::routes::frameworks::download_template,
        // ── Templates ───────────────────────────────────────────────────
        crate::routes::frameworks::list_templates,
        crate::routes::frameworks::get_template,
        crate::routes::frameworks::import_template,
        // ── Projects ────────────────────────────────────────────────────
        crate::routes::projects::upsert_project,
        crate::routes::projects::add_to_project,
        crate::routes::projects::remove_from_project,
        crate::routes::projects::update_implementation,
        // ── Progress ────────────────────────────────────────────────────
        crate::routes::projects::project_progress,
        crate::routes::projects::project_framework,
        crate::routes::projects::framework_progress,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::catalog::FrameworkRecord,
        crate::catalog::CategoryNode,
        crate::catalog::ControlNode,
        crate::catalog::SubControlNode,
        crate::catalog::ProjectRecord,
        crate::catalog::AssociationRecord,
        crate::catalog::ImplementationRecord,
        crate::catalog::EvidenceLink,
        crate::catalog::RiskRef,
        crate::catalog::association::ProjectUpsert,
        crate::catalog::association::ImplementationPatch,
        crate::catalog::progress::FrameworkSummary,
        crate::catalog::progress::FrameworkDetail,
        crate::catalog::progress::LinkedProject,
        crate::catalog::progress::FrameworkProgressEntry,
        crate::catalog::progress::ProjectFrameworkView,
        crate::routes::frameworks::ImportResponse,
        crate::routes::frameworks::TemplateSummary,
        crate::routes::frameworks::DeleteResponse,
        crate::routes::projects::AssociationRequest,
        crate::routes::projects::AttachResponse,
        crate::routes::projects::DetachResponse,
    )),
    tags(
        (name = "frameworks", description = "Framework catalog"),
        (name = "import", description = "Framework ingestion"),
        (name = "templates", description = "Bundled template library"),
        (name = "projects", description = "Project associations and implementation tracking"),
        (name = "progress", description = "Completion buckets"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(serve_openapi))
}

async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_documents_every_route_group() {
        let spec = ApiDoc::openapi();
        let paths = &spec.paths.paths;
        for path in [
            "/frameworks",
            "/frameworks/{framework_id}",
            "/import",
            "/import-excel",
            "/import-workbook",
            "/template",
            "/templates/{template_id}/import",
            "/add-to-project",
            "/remove-from-project",
            "/projects/{project_id}/progress",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn spec_serializes_with_schemas() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();
        assert!(json.contains("ImportResponse"));
        assert!(json.contains("ErrorBody"));
    }
}
