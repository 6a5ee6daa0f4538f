//! File-backed configuration store.

mod common;

use std::sync::Arc;

use common::submission;
use serde_json::json;
use vigil::{ConfigService, ConfigStore, Error, JsonFileStore, Registry};

#[tokio::test]
async fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("nested").join("config.json"));

    assert_eq!(store.load().await.unwrap(), None);

    let document = json!({"general": {"app_name": "Vigil"}, "service_checks": {"endpoints": []}});
    store.save(&document).await.unwrap();

    assert_eq!(store.load().await.unwrap(), Some(document));
    assert!(!dir.path().join("nested").join("config.json.tmp").exists());
}

#[tokio::test]
async fn test_malformed_file_is_a_store_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    let store = JsonFileStore::new(&path);
    assert!(store.load().await.is_err());

    let result = ConfigService::open(Arc::new(Registry::new()), Arc::new(store)).await;
    assert!(matches!(result, Err(Error::Store(_))));
}

#[tokio::test]
async fn test_service_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    let service = ConfigService::open(Arc::new(Registry::new()), Arc::new(JsonFileStore::new(&path)))
        .await
        .unwrap();
    service
        .create_endpoint(&submission(json!({
            "name": "api",
            "url": "https://api.example.com",
            "interval_minutes": "15",
            "headers": {"Accept": "application/json"},
        })))
        .await
        .unwrap();
    drop(service);

    let reopened = ConfigService::open(Arc::new(Registry::new()), Arc::new(JsonFileStore::new(&path)))
        .await
        .unwrap();
    let endpoint = reopened.get_endpoint("api").unwrap();
    assert_eq!(endpoint.config.interval_minutes, 15);
    assert_eq!(endpoint.config.headers.unwrap().get("accept"), Some("application/json"));
}

#[tokio::test]
async fn test_hand_edited_invalid_entry_is_rejected_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    let document = json!({"service_checks": {"endpoints": [{"name": "api", "url": "ftp://api.example.com"}]}});
    std::fs::write(&path, document.to_string()).unwrap();

    let result = ConfigService::open(Arc::new(Registry::new()), Arc::new(JsonFileStore::new(&path))).await;
    match result {
        Err(Error::Validation(e)) => assert_eq!(e.to_string(), "invalid_url:endpoints[0].url"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("invalid entry was accepted"),
    }
}
