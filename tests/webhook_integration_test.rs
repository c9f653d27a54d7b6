use httpmock::prelude::*;
use std::net::SocketAddr;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use visit_ingest::launcher::entry::AppRef;
use visit_ingest::Launcher;

const EVERY_VISIT_PATH: &str =
    "/bigquery/v2/projects/city-of-swan-youth-centres/datasets/every_visit_data/tables/every_visit/insertAll";
const ANNUAL_VISIT_PATH: &str =
    "/bigquery/v2/projects/city-of-swan-youth-centres/datasets/annual_visit_data/tables/annual_visit/insertAll";

struct RunningApp {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<visit_ingest::Result<()>>,
    _dir: TempDir,
}

impl RunningApp {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.unwrap().unwrap();
    }
}

fn entry_file(warehouse: &str, app_settings: &str) -> String {
    format!(
        r#"
[app]
kind = "visitor-webhook"
{}

[app.auth]
username = "relay"
password = "secret"

[app.warehouse]
endpoint = "{}"
token = "static"
access_token = "test-token"
"#,
        app_settings, warehouse
    )
}

async fn start_app(warehouse: &str) -> RunningApp {
    start_app_with(warehouse, "").await
}

async fn start_app_with(warehouse: &str, app_settings: &str) -> RunningApp {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("main.toml"),
        entry_file(warehouse, app_settings),
    )
    .unwrap();

    let server = Launcher::default()
        .serve_dir(
            dir.path(),
            &AppRef::default(),
            "127.0.0.1:0".parse().unwrap(),
        )
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();

    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run_until(async move {
        let _ = rx.await;
    }));

    RunningApp {
        addr,
        shutdown: Some(tx),
        handle,
        _dir: dir,
    }
}

fn visit_form() -> Vec<(&'static str, &'static str)> {
    vec![
        ("name", "Sam Visitor"),
        ("location_name", "Ellenbrook Youth Centre"),
        ("signed_in", "2024-05-01 15:30:00"),
        ("questionnaireSubmissions[0][questionnaire_id]", "8895"),
        ("questionnaireSubmissions[0][questionnaire_name]", "Every Visit"),
        ("questionnaireSubmissions[1][questionnaire_id]", "8208"),
        ("questionnaireSubmissions[1][questionnaire_name]", "Annual Visit"),
        ("questionnaireSubmissions[1][guest_name]", "Alex Guest"),
        ("questionnaireSubmissions[1][created]", "2024-05-01 15:31:00"),
    ]
}

#[tokio::test]
async fn test_visit_rows_are_inserted_per_table() {
    let warehouse = MockServer::start();
    let every_visit = warehouse.mock(|when, then| {
        when.method(POST)
            .path(EVERY_VISIT_PATH)
            .header("Authorization", "Bearer test-token")
            .body_contains("\"purpose_of_visit\":null")
            .body_contains("\"responder_name\":\"Sam Visitor\"")
            .body_contains("\"submitted\":\"2024-05-01 15:30:00\"");
        then.status(200)
            .json_body(serde_json::json!({"kind": "bigquery#tableDataInsertAllResponse"}));
    });
    let annual_visit = warehouse.mock(|when, then| {
        when.method(POST)
            .path(ANNUAL_VISIT_PATH)
            .body_contains("\"age\":null")
            .body_contains("\"responder_name\":\"Alex Guest\"")
            .body_contains("\"location\":\"Ellenbrook Youth Centre\"");
        then.status(200)
            .json_body(serde_json::json!({"kind": "bigquery#tableDataInsertAllResponse"}));
    });

    let app = start_app(&warehouse.base_url()).await;

    let response = reqwest::Client::new()
        .post(app.url("/webhook/visitor"))
        .basic_auth("relay", Some("secret"))
        .form(&visit_form())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["rows_inserted"], 2);
    assert_eq!(
        body["tables_updated"],
        serde_json::json!([
            "city-of-swan-youth-centres.every_visit_data.every_visit",
            "city-of-swan-youth-centres.annual_visit_data.annual_visit"
        ])
    );

    every_visit.assert();
    annual_visit.assert();
    app.stop().await;
}

#[tokio::test]
async fn test_missing_credentials() {
    let warehouse = MockServer::start();
    let app = start_app(&warehouse.base_url()).await;

    let response = reqwest::Client::new()
        .post(app.url("/webhook/visitor"))
        .form(&visit_form())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    assert_eq!(
        response.headers().get("www-authenticate").unwrap(),
        "Basic"
    );
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Not authenticated");
    app.stop().await;
}

#[tokio::test]
async fn test_wrong_credentials() {
    let warehouse = MockServer::start();
    let insert = warehouse.mock(|when, then| {
        when.method(POST);
        then.status(200).json_body(serde_json::json!({}));
    });
    let app = start_app(&warehouse.base_url()).await;

    let response = reqwest::Client::new()
        .post(app.url("/webhook/visitor"))
        .basic_auth("relay", Some("wrong"))
        .form(&visit_form())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Unauthorized");
    insert.assert_hits(0);
    app.stop().await;
}

#[tokio::test]
async fn test_unknown_questionnaire_inserts_nothing() {
    let warehouse = MockServer::start();
    let insert = warehouse.mock(|when, then| {
        when.method(POST);
        then.status(200).json_body(serde_json::json!({}));
    });
    let app = start_app(&warehouse.base_url()).await;

    let response = reqwest::Client::new()
        .post(app.url("/webhook/visitor"))
        .basic_auth("relay", Some("secret"))
        .form(&[
            ("name", "Sam"),
            ("questionnaireSubmissions[0][questionnaire_id]", "1111"),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({"status": "ok", "rows_inserted": 0}));
    insert.assert_hits(0);
    app.stop().await;
}

#[tokio::test]
async fn test_rejected_rows_return_500_with_detail() {
    let warehouse = MockServer::start();
    warehouse.mock(|when, then| {
        when.method(POST).path(EVERY_VISIT_PATH);
        then.status(200).json_body(serde_json::json!({
            "kind": "bigquery#tableDataInsertAllResponse",
            "insertErrors": [{
                "index": 0,
                "errors": [{"reason": "invalid", "location": "purpose_of_visit", "message": "no such field"}]
            }]
        }));
    });
    warehouse.mock(|when, then| {
        when.method(POST).path(ANNUAL_VISIT_PATH);
        then.status(200).json_body(serde_json::json!({}));
    });
    let app = start_app(&warehouse.base_url()).await;

    let response = reqwest::Client::new()
        .post(app.url("/webhook/visitor"))
        .basic_auth("relay", Some("secret"))
        .form(&visit_form())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    let detail = body["detail"].as_array().unwrap();
    assert_eq!(detail.len(), 1);
    let errors = &detail[0]["city-of-swan-youth-centres.every_visit_data.every_visit"];
    assert_eq!(errors[0]["index"], 0);
    assert_eq!(errors[0]["errors"][0]["reason"], "invalid");
    app.stop().await;
}

#[tokio::test]
async fn test_warehouse_outage_returns_500() {
    let warehouse = MockServer::start();
    warehouse.mock(|when, then| {
        when.method(POST);
        then.status(503).body("backend unavailable");
    });
    let app = start_app(&warehouse.base_url()).await;

    let response = reqwest::Client::new()
        .post(app.url("/webhook/visitor"))
        .basic_auth("relay", Some("secret"))
        .form(&visit_form())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("503"));
    app.stop().await;
}

#[tokio::test]
async fn test_multipart_form_is_accepted() {
    let warehouse = MockServer::start();
    let every_visit = warehouse.mock(|when, then| {
        when.method(POST)
            .path(EVERY_VISIT_PATH)
            .body_contains("\"responder_name\":\"Multi Part\"");
        then.status(200).json_body(serde_json::json!({}));
    });
    let app = start_app(&warehouse.base_url()).await;

    let boundary = "visit-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nMulti Part\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"questionnaireSubmissions[0][questionnaire_id]\"\r\n\r\n8895\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"a.png\"\r\nContent-Type: image/png\r\n\r\nPNG\r\n\
         --{b}--\r\n",
        b = boundary
    );

    let response = reqwest::Client::new()
        .post(app.url("/webhook/visitor"))
        .basic_auth("relay", Some("secret"))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["rows_inserted"], 1);
    every_visit.assert();
    app.stop().await;
}

#[tokio::test]
async fn test_health_needs_no_auth() {
    let warehouse = MockServer::start();
    let app = start_app(&warehouse.base_url()).await;

    let response = reqwest::get(app.url("/health")).await.unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    app.stop().await;
}

#[tokio::test]
async fn test_bare_basic_scheme_is_rejected_as_invalid() {
    let warehouse = MockServer::start();
    let app = start_app(&warehouse.base_url()).await;

    let response = reqwest::Client::new()
        .post(app.url("/webhook/visitor"))
        .header("Authorization", "Basic")
        .form(&visit_form())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Invalid authentication credentials");
    app.stop().await;
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let warehouse = MockServer::start();
    let insert = warehouse.mock(|when, then| {
        when.method(POST);
        then.status(200).json_body(serde_json::json!({}));
    });
    let app = start_app_with(&warehouse.base_url(), "max_body_bytes = 1024").await;

    let padding = "x".repeat(4096);
    let response = reqwest::Client::new()
        .post(app.url("/webhook/visitor"))
        .basic_auth("relay", Some("secret"))
        .form(&[
            ("name", padding.as_str()),
            ("questionnaireSubmissions[0][questionnaire_id]", "8895"),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 413);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Request body too large");
    insert.assert_hits(0);
    app.stop().await;
}
