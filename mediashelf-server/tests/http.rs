use std::{fs, path::Path, sync::Arc};

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use mediashelf_core::{DurationProbe, ProbeError};
use mediashelf_server::{AppState, create_router, infra::config::Config};
use serde_json::{Value, json};
use tempfile::TempDir;

struct FixedProbe(f64);

#[async_trait]
impl DurationProbe for FixedProbe {
    async fn probe(&self, _path: &Path) -> Result<f64, ProbeError> {
        Ok(self.0)
    }
}

struct TestApp {
    dir: TempDir,
    state: AppState,
    server: TestServer,
}

impl TestApp {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default().with_web_root(dir.path());
        config.covers.enabled = false;

        let state = AppState::with_probe(config, Arc::new(FixedProbe(125.0)));
        let server = TestServer::new(create_router(state.clone())).unwrap();
        Self { dir, state, server }
    }

    fn write(&self, relative: &str, contents: &[u8]) {
        let path = self.dir.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
}

#[tokio::test]
async fn root_redirects_by_accept_language() {
    let app = TestApp::new();

    let response = app
        .server
        .get("/")
        .add_header("Accept-Language", "zh-TW,zh;q=0.9,en;q=0.8")
        .await;
    response.assert_status(StatusCode::FOUND);
    assert_eq!(response.header("location"), "/cn/");

    let response = app
        .server
        .get("/index.html")
        .add_header("Accept-Language", "en-US")
        .await;
    response.assert_status(StatusCode::FOUND);
    assert_eq!(response.header("location"), "/en/");
}

#[tokio::test]
async fn pages_stay_cached_until_invalidation() {
    let app = TestApp::new();
    app.write("en/index.html", b"<h1>v1</h1>");

    let response = app.server.get("/en/").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "<h1>v1</h1>");
    assert_eq!(
        response.header("content-type"),
        "text/html; charset=utf-8"
    );

    app.write("en/index.html", b"<h1>v2</h1>");
    assert_eq!(app.server.get("/en").await.text(), "<h1>v1</h1>");

    app.state.cache.invalidate_all();
    assert_eq!(app.server.get("/en/").await.text(), "<h1>v2</h1>");
}

#[tokio::test]
async fn missing_page_is_not_found_then_appears() {
    let app = TestApp::new();

    app.server.get("/cn/").await.assert_status(StatusCode::NOT_FOUND);

    app.write("cn/index.html", b"ni hao");
    let response = app.server.get("/cn/").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "ni hao");
}

#[tokio::test]
async fn rejects_escaping_paths() {
    let app = TestApp::new();
    app.write("multimedia/music/db.json", b"{}");

    app.server
        .get("/multimedia/..%2F..%2Fsecret.json")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    app.server
        .get("/multimedia%5Cmusic%5Cdb.json")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    assert!(app.state.cache.is_empty());
}

#[tokio::test]
async fn assets_are_served_from_disk() {
    let app = TestApp::new();
    app.write("multimedia/paintings/images/sunset.jpg", b"\xff\xd8jpeg");

    let response = app.server.get("/multimedia/paintings/images/sunset.jpg").await;
    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), b"\xff\xd8jpeg");
    assert!(app.state.cache.is_empty());
}

#[tokio::test]
async fn sync_trigger_writes_index_served_through_cache() {
    let app = TestApp::new();
    app.write("multimedia/music/videos/b-side.mp4", b"video");
    app.write("multimedia/music/videos/a-side.mp4", b"video");

    let response = app.server.post("/api/admin/sync/music").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["count"], json!(2));
    assert!(body.get("reason").is_none());

    let index: Value = app.server.get("/multimedia/music/db.json").await.json();
    let list = index["list"].as_array().unwrap();
    assert_eq!(list[0]["filename"], json!("a-side.mp4"));
    assert_eq!(list[0]["title"], json!("a-side"));
    assert_eq!(list[0]["durationDisplay"], json!("02:05"));
    assert_eq!(list[1]["filename"], json!("b-side.mp4"));
}

#[tokio::test]
async fn sync_trigger_maps_failures() {
    let app = TestApp::new();

    let response = app.server.post("/api/admin/sync/podcasts").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], json!(false));
    assert!(body["reason"].as_str().unwrap().contains("podcasts"));

    let response = app.server.post("/api/admin/sync/lsLearns").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["count"], json!(0));
}

#[tokio::test]
async fn downloads_listing_skips_hidden_files() {
    let app = TestApp::new();

    let empty: Value = app.server.get("/api/downloads").await.json();
    assert_eq!(empty, json!([]));

    app.write("multimedia/downloads/b.zip", b"zip");
    app.write("multimedia/downloads/a.txt", b"hello");
    app.write("multimedia/downloads/.DS_Store", b"x");

    let listing: Value = app.server.get("/api/downloads").await.json();
    assert_eq!(
        listing,
        json!([
            { "name": "a.txt", "size": 5 },
            { "name": "b.zip", "size": 3 },
        ])
    );
}

#[tokio::test]
async fn healthz_answers() {
    let app = TestApp::new();
    let response = app.server.get("/healthz").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "ok");
}
