//! # Integration Tests for cfw-api
//!
//! Drives the assembled router end to end without a database: imports in
//! every encoding, associations, implementation updates, progress, the
//! delete refusal, templates, health probes and the OpenAPI document.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use cfw_api::state::{AppConfig, AppState};

const PREFIX: &str = "/plugins/custom-framework-import";
const TENANT: &str = "acme";

/// Helper: build the test app with in-memory storage.
fn test_app() -> axum::Router {
    cfw_api::app(AppState::new(AppConfig::default()))
}

/// Helper: read response body as string.
async fn body_string(response: axum::http::Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::http::Response<Body>) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

/// Helper: send a request against the plugin prefix for the test tenant.
async fn send(app: &axum::Router, method: &str, path: &str, body: Option<Value>) -> axum::http::Response<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(format!("{PREFIX}{path}"))
        .header("x-tenant-id", TENANT);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

async fn import(app: &axum::Router, framework: Value) -> Value {
    let response = send(app, "POST", "/import", Some(framework)).await;
    let status = response.status();
    let body = body_json(response).await;
    assert!(status.is_success(), "import failed: {status} {body}");
    body
}

async fn upsert_project(app: &axum::Router, id: &str, organizational: bool, native: u32) {
    let response = send(
        app,
        "PUT",
        &format!("/projects/{id}"),
        Some(json!({
            "name": "Project",
            "is_organizational": organizational,
            "native_framework_count": native,
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

async fn attach(app: &axum::Router, project: &str, framework: &str) -> axum::http::Response<Body> {
    send(
        app,
        "POST",
        "/add-to-project",
        Some(json!({"frameworkId": framework, "projectId": project})),
    )
    .await
}

fn test_fw() -> Value {
    json!({
        "name": "Test FW",
        "description": "Two controls",
        "hierarchy": {"type": "two_level", "level1_name": "Category", "level2_name": "Control"},
        "structure": [
            {"title": "C1", "items": [{"title": "Ctrl1"}, {"title": "Ctrl2"}]}
        ]
    })
}

const PROJECT: &str = "7d4c2a8e-1b3f-4c5d-9e6f-0a1b2c3d4e5f";
const ORG_PROJECT: &str = "0f1e2d3c-4b5a-4968-8776-655443322110";

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let response = test_app()
        .oneshot(Request::builder().uri("/health/liveness").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_readiness_without_database() {
    let response = test_app()
        .oneshot(Request::builder().uri("/health/readiness").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ready");
}

#[tokio::test]
async fn test_metrics_without_recorder_is_unavailable() {
    let response = test_app()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = test_app();
    let response = send(&app, "GET", "/openapi.json", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let spec = body_json(response).await;
    assert!(spec["paths"]["/frameworks"].is_object());
}

// -- Tenancy ------------------------------------------------------------------

#[tokio::test]
async fn test_missing_tenant_is_rejected() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri(format!("{PREFIX}/frameworks"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let app = test_app();
    import(&app, test_fw()).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("{PREFIX}/frameworks"))
                .header("x-tenant-id", "globex")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!([]));
}

// -- Import -------------------------------------------------------------------

#[tokio::test]
async fn test_import_then_progress_reaches_fifty_percent() {
    let app = test_app();
    let imported = import(&app, test_fw()).await;
    assert_eq!(imported["success"], true);
    assert_eq!(imported["itemsCreated"], 2);
    let fw = imported["frameworkId"].as_str().unwrap().to_string();

    upsert_project(&app, PROJECT, false, 0).await;
    let response = attach(&app, PROJECT, &fw).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let view = body_json(send(&app, "GET", &format!("/projects/{PROJECT}/frameworks/{fw}"), None).await).await;
    let implementations = view["implementations"].as_array().unwrap();
    assert_eq!(implementations.len(), 2);
    assert!(implementations.iter().all(|i| i["status"] == "Not started"));
    let first = implementations[0]["id"].as_str().unwrap();

    let response = send(
        &app,
        "PATCH",
        &format!("/projects/{PROJECT}/frameworks/{fw}/implementations/{first}"),
        Some(json!({"status": "Implemented", "owner": "alice"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let progress = body_json(send(&app, "GET", &format!("/projects/{PROJECT}/frameworks/{fw}/progress"), None).await).await;
    assert_eq!(progress["overall"]["total"], 2);
    assert_eq!(progress["overall"]["completed"], 1);
    assert_eq!(progress["overall"]["assigned"], 1);
    assert_eq!(progress["overall"]["percentage"], 50);
    assert!(progress.get("level3").is_none());

    let rollup = body_json(send(&app, "GET", &format!("/projects/{PROJECT}/progress"), None).await).await;
    assert_eq!(rollup[0]["name"], "Test FW");
    assert_eq!(rollup[0]["progress"]["level2"]["percentage"], 50);
}

#[tokio::test]
async fn test_malformed_json_is_400_with_message() {
    let app = test_app();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("{PREFIX}/import"))
                .header("x-tenant-id", TENANT)
                .body(Body::from("{\"name\": "))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(!body["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_validation_error_names_the_control() {
    let app = test_app();
    let response = send(
        &app,
        "POST",
        "/import",
        Some(json!({
            "name": "Nested",
            "hierarchy": {"type": "two_level"},
            "structure": [{"title": "C", "items": [{"title": "Access Review", "items": [{"title": "S"}]}]}]
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    let errors = body["errors"].as_array().unwrap();
    assert!(errors.iter().any(|e| e["message"].as_str().unwrap().contains("Access Review")));

    let list = body_json(send(&app, "GET", "/frameworks", None).await).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn test_reimport_same_name_replaces_in_place() {
    let app = test_app();
    let first = import(&app, test_fw()).await;

    let mut changed = test_fw();
    changed["structure"][0]["items"] = json!([{"title": "Ctrl1"}, {"title": "Ctrl2"}, {"title": "Ctrl3"}]);
    let response = send(&app, "POST", "/import", Some(changed)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let second = body_json(response).await;
    assert_eq!(second["frameworkId"], first["frameworkId"]);
    assert_eq!(second["itemsCreated"], 3);

    let list = body_json(send(&app, "GET", "/frameworks", None).await).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["level2_count"], 3);
}

#[tokio::test]
async fn test_three_level_excel_rows() {
    let app = test_app();
    let response = send(
        &app,
        "POST",
        "/import-excel",
        Some(json!({
            "info": {"Name": "Excel FW", "Hierarchy Type": "three_level", "Level 3 Name": "Sub-control"},
            "structure": [
                {"level": 1, "title": "Cat A", "order": 1},
                {"level": 2, "title": "Ctrl A1", "order": 1},
                {"level": 3, "title": "Sub A1.1", "order": 1},
                {"level": 3, "title": "Sub A1.2", "order": 2}
            ]
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["itemsCreated"], 2);
    let fw = body["frameworkId"].as_str().unwrap();

    let detail = body_json(send(&app, "GET", &format!("/frameworks/{fw}"), None).await).await;
    assert_eq!(detail["hierarchy_type"], "three_level");
    assert_eq!(detail["level_3_name"], "Sub-control");
    assert_eq!(detail["structure"][0]["items"][0]["items"][1]["title"], "Sub A1.2");
    assert_eq!(detail["linkedProjects"], json!([]));
}

#[tokio::test]
async fn test_downloaded_template_imports_as_workbook() {
    let app = test_app();
    let response = send(&app, "GET", "/template", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .contains(".xlsx"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("{PREFIX}/import-workbook"))
                .header("x-tenant-id", TENANT)
                .body(Body::from(bytes))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["itemsCreated"], 2);
}

#[tokio::test]
async fn test_workbook_without_structure_sheet_is_400() {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Framework Info").unwrap();
    sheet.write_string(0, 0, "Field").unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("{PREFIX}/import-workbook"))
                .header("x-tenant-id", TENANT)
                .body(Body::from(bytes))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("Structure"));
}

// -- Templates ----------------------------------------------------------------

#[tokio::test]
async fn test_template_library_import() {
    let app = test_app();
    let list = body_json(send(&app, "GET", "/templates", None).await).await;
    assert!(list.as_array().unwrap().iter().any(|t| t["id"] == "dora"));

    let source = body_json(send(&app, "GET", "/templates/dora", None).await).await;
    assert!(source["name"].is_string());

    let response = send(&app, "POST", "/templates/dora/import", None).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(&app, "POST", "/templates/nope/import", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = send(&app, "GET", "/templates/nope", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// -- Associations -------------------------------------------------------------

#[tokio::test]
async fn test_scope_mismatch_is_422() {
    let app = test_app();
    let mut org = test_fw();
    org["is_organizational"] = json!(true);
    let fw = import(&app, org).await["frameworkId"].as_str().unwrap().to_string();

    upsert_project(&app, PROJECT, false, 1).await;
    let response = attach(&app, PROJECT, &fw).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"]["code"], "SCOPE_MISMATCH");

    upsert_project(&app, ORG_PROJECT, true, 0).await;
    let response = attach(&app, ORG_PROJECT, &fw).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_reimport_keeps_scope_of_attached_framework() {
    let app = test_app();
    let fw = import(&app, test_fw()).await["frameworkId"].as_str().unwrap().to_string();
    upsert_project(&app, PROJECT, false, 1).await;
    assert_eq!(attach(&app, PROJECT, &fw).await.status(), StatusCode::CREATED);

    let mut flipped = test_fw();
    flipped["is_organizational"] = json!(true);
    let response = send(&app, "POST", "/import", Some(flipped)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"][0]["path"], "is_organizational");

    let response = send(&app, "GET", &format!("/frameworks/{fw}"), None).await;
    let detail = body_json(response).await;
    assert_eq!(detail["is_organizational"], false);
}

#[tokio::test]
async fn test_detaching_last_framework_is_409() {
    let app = test_app();
    let fw = import(&app, test_fw()).await["frameworkId"].as_str().unwrap().to_string();
    upsert_project(&app, PROJECT, false, 0).await;
    attach(&app, PROJECT, &fw).await;

    let response = send(
        &app,
        "POST",
        "/remove-from-project",
        Some(json!({"framework_id": fw, "project_id": PROJECT})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"]["code"], "LAST_FRAMEWORK_INVARIANT");

    // With a native framework alongside, the detach goes through.
    upsert_project(&app, PROJECT, false, 1).await;
    let response = send(
        &app,
        "POST",
        "/remove-from-project",
        Some(json!({"frameworkId": fw, "projectId": PROJECT})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["removed"], true);
    assert_eq!(body["remainingFrameworks"], 1);
}

#[tokio::test]
async fn test_attach_is_idempotent() {
    let app = test_app();
    let fw = import(&app, test_fw()).await["frameworkId"].as_str().unwrap().to_string();
    upsert_project(&app, PROJECT, false, 0).await;

    let first = body_json(attach(&app, PROJECT, &fw).await).await;
    let response = attach(&app, PROJECT, &fw).await;
    assert_eq!(response.status(), StatusCode::OK);
    let second = body_json(response).await;
    assert_eq!(second["created"], false);
    assert_eq!(
        first["association"]["project_framework_id"],
        second["association"]["project_framework_id"]
    );
}

#[tokio::test]
async fn test_attach_unknown_project_is_404() {
    let app = test_app();
    let fw = import(&app, test_fw()).await["frameworkId"].as_str().unwrap().to_string();
    let response = attach(&app, PROJECT, &fw).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// -- Deletion -----------------------------------------------------------------

#[tokio::test]
async fn test_delete_attached_framework_is_refused() {
    let app = test_app();
    let fw = import(&app, test_fw()).await["frameworkId"].as_str().unwrap().to_string();
    upsert_project(&app, PROJECT, false, 1).await;
    attach(&app, PROJECT, &fw).await;

    let response = send(&app, "DELETE", &format!("/frameworks/{fw}"), None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"]["details"]["projectIds"], json!([PROJECT]));

    let response = send(
        &app,
        "POST",
        "/remove-from-project",
        Some(json!({"frameworkId": fw, "projectId": PROJECT})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, "DELETE", &format!("/frameworks/{fw}"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(&app, "GET", &format!("/frameworks/{fw}"), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_path_id_is_rejected() {
    let app = test_app();
    let response = send(&app, "GET", "/frameworks/not-a-uuid", None).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
