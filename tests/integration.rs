use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docsplit_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docsplit");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let docs_dir = root.join("docs");
    fs::create_dir_all(&docs_dir).unwrap();

    let page = serde_json::json!({
        "content": "# Intro\nHello\n\n# Details\nWorld",
        "metadata": {
            "source_url": "https://example.com/post",
            "tags": "rust, parsing"
        }
    });
    fs::write(docs_dir.join("page.json"), page.to_string()).unwrap();

    let mut lines = vec![serde_json::json!({"text": "Chapter 1", "font_size": 18.0, "page_number": 1})];
    for i in 0..19 {
        lines.push(serde_json::json!({
            "text": format!("Body sentence number {} ends here.", i),
            "font_size": 11.0,
            "page_number": 1 + i / 10
        }));
    }
    let book = serde_json::json!({
        "content": lines,
        "metadata": { "source_url": "/library/guide.pdf", "title": "Untitled" }
    });
    fs::write(docs_dir.join("book.json"), book.to_string()).unwrap();

    let byline = serde_json::json!({
        "content": "Release notes for version 2\nBy Jane Smith\n\nThis release improves parsing.",
        "metadata": { "source_url": "https://example.com/notes" }
    });
    fs::write(docs_dir.join("byline.json"), byline.to_string()).unwrap();

    // Never reach a real LLM from tests.
    let config_content = r#"[llm]
provider = "disabled"
"#;
    let config_path = config_dir.join("docsplit.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docsplit(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docsplit_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docsplit binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn doc_path(config_path: &Path, name: &str) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("docs")
        .join(name)
        .to_string_lossy()
        .to_string()
}

#[test]
fn test_chunk_web_document() {
    let (_tmp, config_path) = setup_test_env();
    let doc = doc_path(&config_path, "page.json");

    let (stdout, stderr, success) = run_docsplit(&config_path, &["chunk", &doc]);
    assert!(success, "chunk failed: stdout={}, stderr={}", stdout, stderr);

    let chunks: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let chunks = chunks.as_array().unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0]["content"], "# Intro\nHello");
    assert_eq!(chunks[1]["content"], "# Details\nWorld");
    assert_ne!(chunks[0]["id"], chunks[1]["id"]);
    assert_eq!(chunks[0]["metadata"]["tags"][0], "rust");
    assert!(chunks[0]["metadata"]["author_method"].is_null());
}

#[test]
fn test_ingest_web_document() {
    let (_tmp, config_path) = setup_test_env();
    let doc = doc_path(&config_path, "page.json");

    let (stdout, stderr, success) = run_docsplit(
        &config_path,
        &["ingest", &doc, "--team-id", "acme", "--user-id", "u42"],
    );
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);

    let payload: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(payload["team_id"], "acme");
    let items = payload["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["title"], "Intro");
    assert_eq!(items[1]["title"], "Details");
    assert_eq!(items[0]["content"], "# Intro\n\nHello");
    assert_eq!(items[0]["content_type"], "blog");
    assert_eq!(items[0]["user_id"], "u42");
    assert_eq!(items[0]["author"], "");
    assert_eq!(items[0]["author_method"], "fallback");
}

#[test]
fn test_ingest_pdf_document() {
    let (_tmp, config_path) = setup_test_env();
    let doc = doc_path(&config_path, "book.json");

    let (stdout, stderr, success) = run_docsplit(&config_path, &["ingest", &doc]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);

    let payload: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let items = payload["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Chapter 1");
    assert_eq!(items[0]["content_type"], "book");
    assert_eq!(items[0]["user_id"], "default_user");
    assert!(items[0]["content"]
        .as_str()
        .unwrap()
        .contains("Body sentence number 18 ends here."));
}

#[test]
fn test_author_rule_based() {
    let (_tmp, config_path) = setup_test_env();
    let doc = doc_path(&config_path, "byline.json");

    let (stdout, stderr, success) = run_docsplit(&config_path, &["author", &doc]);
    assert!(success, "author failed: stdout={}, stderr={}", stdout, stderr);

    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["name"], "Jane Smith");
    assert_eq!(result["method"], "rule_based");
}

#[test]
fn test_author_fallback_when_llm_disabled() {
    let (_tmp, config_path) = setup_test_env();
    let doc = doc_path(&config_path, "page.json");

    let (stdout, stderr, success) =
        run_docsplit(&config_path, &["author", &doc, "--mode", "accuracy"]);
    assert!(success, "author failed: stdout={}, stderr={}", stdout, stderr);

    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(result["name"].is_null());
    assert_eq!(result["method"], "fallback");
}

#[test]
fn test_author_rejects_unknown_mode() {
    let (_tmp, config_path) = setup_test_env();
    let doc = doc_path(&config_path, "page.json");

    let (_, stderr, success) = run_docsplit(&config_path, &["author", &doc, "--mode", "cheap"]);
    assert!(!success);
    assert!(stderr.contains("Unknown author mode"));
}

#[test]
fn test_raw_payload() {
    let (_tmp, config_path) = setup_test_env();
    let doc = doc_path(&config_path, "byline.json");

    let (stdout, stderr, success) =
        run_docsplit(&config_path, &["raw", &doc, "--team-id", "acme"]);
    assert!(success, "raw failed: stdout={}, stderr={}", stdout, stderr);

    let payload: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(payload["team_id"], "acme");
    assert_eq!(
        payload["raw_data"]["raw_text"],
        "Release notes for version 2\nBy Jane Smith\n\nThis release improves parsing."
    );
    assert_eq!(
        payload["raw_data"]["metadata"]["source_url"],
        "https://example.com/notes"
    );
    assert!(payload["extraction_timestamp"].is_string());
}

#[test]
fn test_missing_document_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_docsplit(&config_path, &["chunk", "/nonexistent/doc.json"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read document"));
}

#[test]
fn test_invalid_config_fails() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config").join("bad.toml");
    fs::write(&bad, "[tags]\nbackend = \"spacy\"\n").unwrap();

    let (_, stderr, success) = run_docsplit(&bad, &["chunk", "whatever.json"]);
    assert!(!success);
    assert!(stderr.contains("Unknown tags backend"));
}
