//! # Viewer API Tests
//!
//! These tests start the viewer router on an ephemeral port with an in-memory
//! edit store and exercise listing, annotation and export endpoints.
//!
//! ## Running the Tests
//!
//! ```bash
//! cargo test --test serve_test
//! ```

use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::net::TcpListener;

use corpus_annotate::corpus::{Category, Corpus, Profile, Record};
use corpus_annotate::edits::EditStore;
use corpus_annotate::serve::{router, run_viewer, AppState};
use corpus_annotate::slot::{MemorySlotStore, SlotStore};

fn record(id: &str, name: &str, gender: &str, price: f64, text: &str, hedges: &[&str]) -> Record {
    Record {
        id: id.to_string(),
        name: name.to_string(),
        gender: gender.to_string(),
        language: "English".to_string(),
        country: "Canada".to_string(),
        nativeness: "Native".to_string(),
        price,
        plain_text: text.to_string(),
        sentence: text.to_string(),
        original_hedges: hedges.iter().map(|h| h.to_string()).collect(),
        hedge_count: hedges.len() as u32,
        category: Some(if hedges.is_empty() {
            Category::Boosters
        } else {
            Category::Hedges
        }),
        url: Some("ana".to_string()),
        ..Default::default()
    }
}

fn test_corpus() -> Corpus {
    let records = vec![
        record("r1", "Ana", "Female", 20.0, "Maybe she will certainly come.", &["maybe"]),
        record("r2", "ben", "Male", 35.5, "He is quite sure.", &[]),
        record("r3", "Cleo", "Female", 12.0, "Perhaps later.", &["perhaps"]),
    ];

    let mut profiles = BTreeMap::new();
    profiles.insert(
        "ana".to_string(),
        Profile {
            name: "Ana".to_string(),
            gender: "Female".to_string(),
            total_hedge_count: 3,
            hedge_frequency: HashMap::from([("maybe".to_string(), 2), ("perhaps".to_string(), 1)]),
            ..Default::default()
        },
    );

    Corpus::new(records, profiles)
}

/// Helper to start the viewer API on a random port
async fn start_test_server() -> (String, tempfile::TempDir, tokio::task::JoinHandle<()>) {
    let export_dir = tempfile::tempdir().unwrap();
    let slots: Box<dyn SlotStore> = Box::new(MemorySlotStore::new());
    let state = Arc::new(AppState::new(
        test_corpus(),
        EditStore::open(slots),
        2,
        export_dir.path().to_path_buf(),
    ));

    let app = router(state, None);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = format!("http://{}", addr);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give server time to start
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    (url, export_dir, handle)
}

async fn get_json(client: &reqwest::Client, url: String) -> Value {
    let response = client.get(url).send().await.unwrap();
    assert_eq!(response.status(), 200);
    response.json().await.unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_health() {
    let (url, _dir, _handle) = start_test_server().await;

    let response = reqwest::get(format!("{}/health", url)).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_records_filtered_sorted_and_paged() {
    let (url, _dir, _handle) = start_test_server().await;
    let client = reqwest::Client::new();

    let page = get_json(&client, format!("{}/api/records", url)).await;
    assert_eq!(page["total"], 3);
    assert_eq!(page["filtered"], 3);
    assert_eq!(page["displayed"], 2);
    assert_eq!(page["total_pages"], 2);
    // case-insensitive name order
    assert_eq!(page["items"][0]["name"], "Ana");
    assert_eq!(page["items"][1]["name"], "ben");

    let page = get_json(
        &client,
        format!("{}/api/records?gender=Female&sort=price-desc", url),
    )
    .await;
    assert_eq!(page["filtered"], 2);
    assert_eq!(page["items"][0]["id"], "r1");
    assert_eq!(page["items"][1]["id"], "r3");

    let page = get_json(&client, format!("{}/api/records?page=9", url)).await;
    assert_eq!(page["page"], 1);
}

#[tokio::test]
async fn test_record_not_found() {
    let (url, _dir, _handle) = start_test_server().await;

    let response = reqwest::get(format!("{}/api/records/missing", url))
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_add_then_remove_annotation() {
    let (url, _dir, _handle) = start_test_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/edits/r1/annotations", url))
        .json(&json!({"word": "certainly", "kind": "booster"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["changed"], true);
    assert!(body["previous_kind"].is_null());
    assert_eq!(body["edited_count"], 1);
    assert_eq!(body["entry"]["edited_boosters"], json!(["certainly"]));
    assert_eq!(body["entry"]["original_hedges"], json!(["maybe"]));
    assert_eq!(body["card"]["edited"], true);
    assert!(body["card"]["text"]
        .as_str()
        .unwrap()
        .contains("<span class=\"highlight-booster-new\">certainly</span>"));

    let response = client
        .delete(format!("{}/api/edits/r1/annotations", url))
        .json(&json!({"word": "certainly"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["changed"], true);
    assert_eq!(body["previous_kind"], "booster");
    assert_eq!(body["edited_count"], 1);
    assert_eq!(body["entry"]["edited_boosters"], json!([]));

    let detail = get_json(&client, format!("{}/api/records/r1", url)).await;
    assert_eq!(detail["card"]["edited"], true);
    assert_eq!(detail["entry"]["edited_hedges"], json!(["maybe"]));
}

#[tokio::test]
async fn test_annotation_rejects_blank_word() {
    let (url, _dir, _handle) = start_test_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/edits/r1/annotations", url))
        .json(&json!({"word": "   ", "kind": "hedge"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let edits = get_json(&client, format!("{}/api/edits", url)).await;
    assert_eq!(edits["edited_count"], 0);
}

#[tokio::test]
async fn test_annotation_on_unknown_record_changes_nothing() {
    let (url, _dir, _handle) = start_test_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/edits/nope/annotations", url))
        .json(&json!({"word": "very", "kind": "booster"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["changed"], false);
    assert_eq!(body["edited_count"], 0);
    assert!(body["entry"].is_null());
}

#[tokio::test]
async fn test_export_without_edits() {
    let (url, dir, _handle) = start_test_server().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/edits/export", url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "No edits to export");

    let response = client
        .post(format!("{}/api/edits/export", url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_export_download_and_write() {
    let (url, dir, _handle) = start_test_server().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/api/edits/r3/annotations", url))
        .json(&json!({"word": "later", "kind": "hedge"}))
        .send()
        .await
        .unwrap();

    let response = client
        .get(format!("{}/api/edits/export", url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let disposition = response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"edits_backup_"));
    assert!(disposition.ends_with(".json\""));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["r3"]["edited_hedges"], json!(["perhaps", "later"]));

    let written = get_json_post(&client, format!("{}/api/edits/export", url)).await;
    assert_eq!(written["edited_count"], 1);
    let filename = written["filename"].as_str().unwrap();
    let contents = std::fs::read_to_string(dir.path().join(filename)).unwrap();
    let parsed: Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(parsed, body);
}

async fn get_json_post(client: &reqwest::Client, url: String) -> Value {
    let response = client.post(url).send().await.unwrap();
    assert_eq!(response.status(), 200);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_profiles_and_filters() {
    let (url, _dir, _handle) = start_test_server().await;
    let client = reqwest::Client::new();

    let page = get_json(&client, format!("{}/api/profiles", url)).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["name"], "Ana");

    let response = reqwest::get(format!("{}/api/profiles/nobody", url))
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let filters = get_json(&client, format!("{}/api/filters", url)).await;
    assert_eq!(filters["genders"], json!(["Female", "Male"]));
    assert_eq!(filters["countries"], json!(["Canada"]));
    assert_eq!(filters["sorts"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_remove_absent_word_reports_unchanged() {
    let (url, _dir, _handle) = start_test_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/edits/r1/annotations", url))
        .json(&json!({"word": "maybe", "kind": "booster"}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["previous_kind"], "hedge");

    let response = client
        .delete(format!("{}/api/edits/r1/annotations", url))
        .json(&json!({"word": "never", "kind": "hedge"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["changed"], false);
    assert!(body["previous_kind"].is_null());
    assert_eq!(body["entry"]["edited_boosters"], json!(["maybe"]));
}

#[tokio::test]
async fn test_graceful_shutdown_writes_session_backup() {
    let export_dir = tempfile::tempdir().unwrap();
    let slots: Box<dyn SlotStore> = Box::new(MemorySlotStore::new());
    let state = Arc::new(AppState::new(
        test_corpus(),
        EditStore::open(slots),
        25,
        export_dir.path().to_path_buf(),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(run_viewer(listener, state, None, true, async move {
        let _ = stop_rx.await;
    }));

    // Give server time to start
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/edits/r2/annotations", url))
        .json(&json!({"word": "sure", "kind": "booster"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["changed"], true);

    stop_tx.send(()).unwrap();
    let backup = server.await.unwrap().unwrap().expect("backup path");

    assert!(backup.starts_with(export_dir.path()));
    let name = backup.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("edits_backup_"));
    let contents: Value = serde_json::from_str(&std::fs::read_to_string(&backup).unwrap()).unwrap();
    assert_eq!(contents["r2"]["edited_boosters"], json!(["sure"]));
}

#[tokio::test]
async fn test_graceful_shutdown_without_edits_skips_backup() {
    let export_dir = tempfile::tempdir().unwrap();
    let slots: Box<dyn SlotStore> = Box::new(MemorySlotStore::new());
    let state = Arc::new(AppState::new(
        test_corpus(),
        EditStore::open(slots),
        25,
        export_dir.path().to_path_buf(),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backup = run_viewer(listener, state, None, true, async {}).await.unwrap();

    assert!(backup.is_none());
    assert_eq!(std::fs::read_dir(export_dir.path()).unwrap().count(), 0);
}
