//! End-to-end tests exercising the HTTP contract through a real router,
//! with the report engine and input downloads mocked out.

use crate::{AppState, Application, Config};
use axum_test::TestServer;
use axum_test::multipart::{MultipartForm, Part};
use std::path::Path;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_dir: &Path, report_engine: &str) -> Config {
    let mut config = Config::default();
    config.base_dir = base_dir.to_path_buf();
    config.report_engine.url = Url::parse(report_engine).expect("report engine URL");
    config.jobs.max_concurrent = 2;
    config
}

async fn test_server(config: Config) -> (TestServer, AppState) {
    let app = Application::new(config).await.expect("Failed to create application");
    app.into_test_server()
}

#[test_log::test(tokio::test)]
async fn health_endpoints_respond() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (server, _state) = test_server(test_config(dir.path(), "http://127.0.0.1:9")).await;

    let root = server.get("/").await;
    assert_eq!(root.status_code(), 200);
    assert_eq!(root.text(), "Market GAP Analysis API is up and running");

    let healthz = server.get("/healthz").await;
    assert_eq!(healthz.status_code(), 200);
    assert_eq!(healthz.text(), "OK");
}

#[test_log::test(tokio::test)]
async fn start_rejects_missing_required_fields() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (server, _state) = test_server(test_config(dir.path(), "http://127.0.0.1:9")).await;

    let no_session = server
        .post("/start_market_gap")
        .json(&serde_json::json!({"email": "a@b.com"}))
        .await;
    assert_eq!(no_session.status_code(), 400);
    let body: serde_json::Value = no_session.json();
    assert_eq!(body["error"], "Missing session_id");

    let no_email = server
        .post("/start_market_gap")
        .json(&serde_json::json!({"session_id": "Temp_1"}))
        .await;
    assert_eq!(no_email.status_code(), 400);
    let body: serde_json::Value = no_email.json();
    assert_eq!(body["error"], "Missing email");
}

#[test_log::test(tokio::test)]
async fn start_with_zero_files_acknowledges_and_calls_engine() {
    let engine = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate_market_reports"))
        .and(body_partial_json(serde_json::json!({
            "session_id": "Temp_20250615_x",
            "email": "a@b.com",
            "input_files": []
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"report_urls": []})))
        .expect(1)
        .mount(&engine)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let (server, state) = test_server(test_config(dir.path(), &engine.uri())).await;

    let response = server
        .post("/start_market_gap")
        .json(&serde_json::json!({"session_id": "Temp_20250615_x", "email": "a@b.com"}))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "Market GAP analysis started with 0 files");

    state.jobs.wait_idle().await;
}

#[test_log::test(tokio::test)]
async fn full_pipeline_stages_inputs_and_collects_reports() {
    let upstream = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/hw_gap.xlsx"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hw gap sheet".to_vec()))
        .expect(1)
        .mount(&upstream)
        .await;

    let report_url = format!("{}/generated/GAP_Market_Report.docx", upstream.uri());
    Mock::given(method("POST"))
        .and(path("/generate_market_reports"))
        .and(body_partial_json(serde_json::json!({
            "session_id": "Temp_20250615_x",
            "email": "a@b.com",
            "folder_id": "drive-folder-9",
            "input_files": [{"file_name": "hw_gap.xlsx"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"report_urls": [report_url]})))
        .expect(1)
        .mount(&upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/generated/GAP_Market_Report.docx"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"rendered docx".to_vec()))
        .expect(1)
        .mount(&upstream)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let (server, state) = test_server(test_config(dir.path(), &upstream.uri())).await;

    let response = server
        .post("/start_market_gap")
        .json(&serde_json::json!({
            "session_id": "Temp_20250615_x",
            "email": "a@b.com",
            "folder_id": "drive-folder-9",
            "file_1_drive_url": format!("{}/drive/hw_gap.xlsx", upstream.uri()),
            "file_1_name": "hw_gap.xlsx"
        }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "Market GAP analysis started with 1 files");

    state.jobs.wait_idle().await;

    // The staged input is retrievable
    let input = server.get("/files/Temp_20250615_x/hw_gap.xlsx").await;
    assert_eq!(input.status_code(), 200);
    assert_eq!(input.as_bytes().as_ref(), b"hw gap sheet");

    // The collected report is retrievable, byte-for-byte
    let report = server.get("/files/Temp_20250615_x/GAP_Market_Report.docx").await;
    assert_eq!(report.status_code(), 200);
    assert_eq!(report.as_bytes().as_ref(), b"rendered docx");

    // And the session listing shows both, sorted by name
    let listing = server.get("/sessions/Temp_20250615_x/files").await;
    assert_eq!(listing.status_code(), 200);
    let listing: serde_json::Value = listing.json();
    let names: Vec<&str> = listing["files"]
        .as_array()
        .expect("files array")
        .iter()
        .map(|f| f["filename"].as_str().expect("filename"))
        .collect();
    assert_eq!(names, vec!["GAP_Market_Report.docx", "hw_gap.xlsx"]);
}

#[test_log::test(tokio::test)]
async fn multipart_uploads_are_staged_directly() {
    let engine = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate_market_reports"))
        .and(body_partial_json(serde_json::json!({
            "session_id": "20250701_upload",
            "input_files": [{"file_name": "sw_gap.xlsx"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"report_urls": []})))
        .expect(1)
        .mount(&engine)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let (server, state) = test_server(test_config(dir.path(), &engine.uri())).await;

    let form = MultipartForm::new()
        .add_text("session_id", "20250701_upload")
        .add_text("email", "a@b.com")
        .add_part("files", Part::bytes(b"sw rows".to_vec()).file_name("sw_gap.xlsx"));

    let response = server.post("/start_market_gap").multipart(form).await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "Market GAP analysis started with 1 files");

    state.jobs.wait_idle().await;

    // Uploaded file is staged under the Temp_-prefixed session folder and
    // addressable by the bare session id
    let staged = server.get("/files/20250701_upload/sw_gap.xlsx").await;
    assert_eq!(staged.status_code(), 200);
    assert_eq!(staged.as_bytes().as_ref(), b"sw rows");
}

#[test_log::test(tokio::test)]
async fn missing_files_and_sessions_return_404() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (server, _state) = test_server(test_config(dir.path(), "http://127.0.0.1:9")).await;

    let missing_file = server.get("/files/Temp_nope/GAP_Market_Report.docx").await;
    assert_eq!(missing_file.status_code(), 404);
    let body: serde_json::Value = missing_file.json();
    assert!(body["error"].as_str().expect("error string").contains("not found"));

    let missing_session = server.get("/sessions/Temp_nope/files").await;
    assert_eq!(missing_session.status_code(), 404);
}

#[test_log::test(tokio::test)]
async fn traversal_attempts_get_404_not_file_contents() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("secret.txt"), b"outside session root").expect("write");

    let (server, state) = test_server(test_config(dir.path(), "http://127.0.0.1:9")).await;

    state.store.write("Temp_t", "report.docx", b"fine").await.expect("write");

    // Encoded slash decodes into a ../ component inside the filename segment
    let response = server.get("/files/Temp_t/..%2Fsecret.txt").await;
    assert_eq!(response.status_code(), 404);
}

#[test_log::test(tokio::test)]
async fn stored_bytes_are_served_exactly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (server, state) = test_server(test_config(dir.path(), "http://127.0.0.1:9")).await;

    let payload: Vec<u8> = (0..=255u8).collect();
    state.store.write("Temp_bytes", "blob.bin", &payload).await.expect("write");

    let response = server.get("/files/Temp_bytes/blob.bin").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.as_bytes().as_ref(), payload.as_slice());
}

#[test_log::test(tokio::test)]
async fn openapi_document_is_served() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (server, _state) = test_server(test_config(dir.path(), "http://127.0.0.1:9")).await;

    let response = server.get("/api-docs/openapi.json").await;
    assert_eq!(response.status_code(), 200);
    let doc: serde_json::Value = response.json();
    assert!(doc["paths"].get("/start_market_gap").is_some());
}
