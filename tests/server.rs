use std::fs;
use std::path::Path;
use std::sync::Arc;

use paperchunk::config::{load_config, Config};
use paperchunk::pipeline::Pipeline;
use paperchunk::server::{router, AppState};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tempfile::TempDir;

fn test_config(root: &Path) -> Config {
    let path = root.join("paperchunk.toml");
    fs::write(
        &path,
        format!(
            r#"[db]
path = "{root}/db.sqlite"

[chunking]
chunk_size = 4
overlap = 1

[storage]
root = "{root}/stages"

[output]
dir = "{root}/out"

[server]
bind = "127.0.0.1:0"
max_upload_bytes = 4096
"#,
            root = root.display()
        ),
    )
    .unwrap();
    load_config(&path).unwrap()
}

/// Serve the API on an ephemeral port; returns its base URL.
async fn spawn_server(root: &Path) -> String {
    let config = test_config(root);
    let pipeline = Pipeline::open(&config).await.unwrap();
    let app = router(AppState::new(Arc::new(pipeline)), config.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn upload_form(name: &str, body: &[u8]) -> Form {
    Form::new().part("file", Part::bytes(body.to_vec()).file_name(name.to_string()))
}

#[tokio::test]
async fn test_health_and_index() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(tmp.path()).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let index: Value = client.get(&base).send().await.unwrap().json().await.unwrap();
    assert_eq!(index["service"], "paperchunk");
    assert!(index["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e == "POST /upload"));
}

#[tokio::test]
async fn test_upload_then_query() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(tmp.path()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/upload", base))
        .multipart(upload_form("notes.txt", b"one two three four five six seven"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let doc = &body["document"];
    assert_eq!(doc["filename"], "notes.txt");
    assert_eq!(doc["status"], "processed");
    // 7 words, size 4, overlap 1 -> windows at 0, 3, 6
    assert_eq!(doc["chunk_count"], 3);
    let id = doc["id"].as_i64().unwrap();

    let status: Value = client
        .get(format!("{}/documents/{}/status", base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "processed");
    assert_eq!(status["current_folder"], "processed");

    let list: Value = client
        .get(format!("{}/documents?limit=5", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["count"], 1);
    assert_eq!(list["documents"][0]["id"], id);

    let full: Value = client
        .get(format!("{}/documents/{}", base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(full["word_count"], 7);
    assert!(full["parquet_blob_id"].is_string());
}

#[tokio::test]
async fn test_upload_rejects_bad_requests() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(tmp.path()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/upload", base))
        .multipart(upload_form("deck.pptx", b"zip"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"].as_str().unwrap().contains(".pdf"));

    let resp = client
        .post(format!("{}/upload", base))
        .multipart(Form::new().text("other", "x"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["message"], "No file provided");
}

#[tokio::test]
async fn test_upload_of_broken_pdf_reports_processing_failure() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(tmp.path()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/upload", base))
        .multipart(upload_form("broken.pdf", b"not a pdf at all"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "processing_failed");

    let list: Value = client
        .get(format!("{}/documents", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["documents"][0]["status"], "failed");
}

#[tokio::test]
async fn test_unknown_document_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(tmp.path()).await;
    let client = reqwest::Client::new();

    for path in ["/documents/99", "/documents/99/status"] {
        let resp = client.get(format!("{}{}", base, path)).send().await.unwrap();
        assert_eq!(resp.status(), 404);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "not_found");
    }

    let resp = client
        .get(format!("{}/documents?limit=0", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_upload_over_limit_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(tmp.path()).await;
    let client = reqwest::Client::new();

    let big = vec![b'a'; 16 * 1024];
    let resp = client
        .post(format!("{}/upload", base))
        .multipart(upload_form("big.txt", &big))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_client_error(), "got {}", resp.status());
}
