//! Manifest file handling

use npmmvn::{Manifest, ManifestError, Node, MANIFEST_FILE};
use std::fs;
use tempfile::TempDir;

fn sample() -> Manifest {
    Manifest::new(vec![
        Node::new(
            "A",
            "1.0.0",
            vec![Node::new("B", "2.0.0", vec![Node::new("C", "0.3.1", vec![])])],
        ),
        Node::new("D", "4.0.0-beta.1", vec![]),
    ])
}

#[tokio::test]
async fn test_save_and_load() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(MANIFEST_FILE);

    sample().save(&path).await.unwrap();
    let loaded = Manifest::load(&path).await.unwrap();

    assert_eq!(loaded, sample());
    assert_eq!(loaded.package_count(), 4);
    assert!(!temp.path().join(format!("{}.tmp", MANIFEST_FILE)).exists());
}

#[tokio::test]
async fn test_save_replaces_existing_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(MANIFEST_FILE);
    fs::write(&path, "stale").unwrap();

    Manifest::default().save(&path).await.unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap().trim(), "[]");
}

#[tokio::test]
async fn test_file_layout() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(MANIFEST_FILE);
    Manifest::new(vec![Node::new("A", "1.0.0", vec![])])
        .save(&path)
        .await
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(
        value,
        serde_json::json!([{ "name": "A", "version": "1.0.0", "dependencies": [] }])
    );
}

#[tokio::test]
async fn test_load_missing_file() {
    let temp = TempDir::new().unwrap();
    let result = Manifest::load(&temp.path().join(MANIFEST_FILE)).await;
    assert!(matches!(result, Err(ManifestError::Io { .. })));
}

#[tokio::test]
async fn test_load_rejects_unsafe_names() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(MANIFEST_FILE);
    fs::write(
        &path,
        r#"[{"name": "..", "version": "1.0.0", "dependencies": []}]"#,
    )
    .unwrap();

    let result = Manifest::load(&path).await;
    assert!(matches!(result, Err(ManifestError::ValidationError(_))));
}

#[tokio::test]
async fn test_load_rejects_malformed_json() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(MANIFEST_FILE);
    fs::write(&path, r#"{"name": "A"}"#).unwrap();

    let result = Manifest::load(&path).await;
    assert!(matches!(result, Err(ManifestError::ParseError(_))));
}
