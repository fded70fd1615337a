//! Runs the `docbind` binary against the fake HTTP engine.

mod support;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use docbind::core::{EngineRequest, InMemoryEngine, Method};
use serde_json::{json, Value};
use support::{dead_endpoint, spawn_engine};
use tempfile::TempDir;
use tokio::process::Command;

fn write_config(dir: &Path, endpoint: &str) -> PathBuf {
    let content = format!(
        r#"[connection]
endpoints = ["{endpoint}"]
default_collection = "examples"
name_prefix = "local-"
name_suffix = "-tests"

[collections.examples]
settings = {{ analysis = {{ normalizer = {{ lowercase = {{ type = "custom", filter = ["lowercase"] }} }} }} }}

[collections.examples.mappings.properties.name]
type = "text"
fields = {{ lowercase = {{ type = "keyword", normalizer = "lowercase" }} }}

[collections.People]
name = "staff"
"#
    );
    let path = dir.join("docbind.toml");
    std::fs::write(&path, content).unwrap();
    path
}

async fn run(config: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_docbind"))
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .await
        .unwrap();
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

fn seed(engine: &InMemoryEngine, id: &str, name: &str) {
    let reply = engine.handle(
        &EngineRequest::new(Method::Put, ["local-examples-tests", "_doc", id])
            .param("refresh", "true")
            .json(json!({ "id": id, "name": name })),
    );
    assert!(reply.is_success(), "seed failed: {}", reply.body);
}

async fn setup() -> (TempDir, PathBuf, Arc<InMemoryEngine>) {
    let engine = Arc::new(InMemoryEngine::new());
    let url = spawn_engine(engine.clone()).await;
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), &url);
    (tmp, config, engine)
}

#[tokio::test(flavor = "multi_thread")]
async fn collections_then_provision() {
    let (_tmp, config, engine) = setup().await;

    let (stdout, stderr, ok) = run(&config, &["collections"]).await;
    assert!(ok, "collections failed: {}", stderr);
    let listed: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 2);
    assert!(listed
        .as_array()
        .unwrap()
        .iter()
        .all(|c| c["exists"] == json!(false)));

    let (stdout, stderr, ok) = run(&config, &["provision"]).await;
    assert!(ok, "provision failed: {}", stderr);
    let outcomes: Value = serde_json::from_str(&stdout).unwrap();
    assert!(outcomes
        .as_array()
        .unwrap()
        .iter()
        .all(|o| o["outcome"] == "created"));
    assert_eq!(
        engine.index_names(),
        vec!["local-examples-tests".to_string(), "local-staff-tests".to_string()]
    );

    let (stdout, _, ok) = run(&config, &["provision"]).await;
    assert!(ok);
    assert!(stdout.contains("\"present\""));

    let (stdout, _, ok) = run(&config, &["collections"]).await;
    assert!(ok);
    let listed: Value = serde_json::from_str(&stdout).unwrap();
    let staff = listed
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["logical_name"] == "staff")
        .unwrap();
    assert_eq!(staff["index"], "local-staff-tests");
    assert_eq!(staff["exists"], true);
}

#[tokio::test(flavor = "multi_thread")]
async fn get_and_search() {
    let (_tmp, config, engine) = setup().await;
    let (_, stderr, ok) = run(&config, &["provision"]).await;
    assert!(ok, "provision failed: {}", stderr);
    seed(&engine, "a", "Example A");
    seed(&engine, "b", "Example B");
    seed(&engine, "c", "Other");

    let (stdout, stderr, ok) = run(&config, &["get", "b"]).await;
    assert!(ok, "get failed: {}", stderr);
    let doc: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(doc["name"], "Example B");

    let (_, stderr, ok) = run(&config, &["get", "missing"]).await;
    assert!(!ok);
    assert!(stderr.contains("document not found"));

    let (stdout, stderr, ok) = run(
        &config,
        &[
            "search",
            "--starts-with",
            "exam",
            "--field",
            "name.lowercase",
            "--sort",
            "name.lowercase:desc",
        ],
    )
    .await;
    assert!(ok, "search failed: {}", stderr);
    let result: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["total"], 2);
    assert_eq!(result["documents"][0]["name"], "Example B");
    assert_eq!(result["documents"][1]["name"], "Example A");

    let (stdout, _, ok) = run(
        &config,
        &["search", "--exact", "other", "--field", "name", "-c", "examples"],
    )
    .await;
    assert!(ok);
    let result: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["total"], 1);
    assert_eq!(result["documents"][0]["id"], "c");
}

#[tokio::test(flavor = "multi_thread")]
async fn drop_collection() {
    let (_tmp, config, engine) = setup().await;
    run(&config, &["provision"]).await;

    let (stdout, stderr, ok) = run(&config, &["drop", "staff"]).await;
    assert!(ok, "drop failed: {}", stderr);
    assert!(stdout.contains("\"deleted\""));
    assert_eq!(engine.index_names(), vec!["local-examples-tests".to_string()]);

    let (stdout, _, ok) = run(&config, &["drop", "staff"]).await;
    assert!(ok);
    assert!(stdout.contains("\"absent\""));
}

#[tokio::test(flavor = "multi_thread")]
async fn search_requires_a_mode() {
    let (_tmp, config, _engine) = setup().await;
    let (_, _, ok) = run(&config, &["search", "--field", "name"]).await;
    assert!(!ok);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_engine_fails() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), &dead_endpoint());
    let (_, stderr, ok) = run(&config, &["provision"]).await;
    assert!(!ok);
    assert!(!stderr.is_empty());
}

#[tokio::test]
async fn invalid_config_is_reported() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("docbind.toml");
    std::fs::write(&path, "[connection]\nendpoints = []\n\n[collections.examples]\n").unwrap();
    let (_, stderr, ok) = run(&path, &["collections"]).await;
    assert!(!ok);
    assert!(stderr.contains("no engine endpoints"));

    let (_, stderr, ok) = run(&tmp.path().join("absent.toml"), &["collections"]).await;
    assert!(!ok);
    assert!(stderr.contains("Failed to read config file"));
}
