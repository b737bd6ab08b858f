//! Integration tests for the runner subcommands
//!
//! Each test writes a config and a verdict directory into a temp dir and
//! drives the command function the CLI dispatches to.

use council_runner::commands::{self, AggregateRequest};
use std::path::{Path, PathBuf};

const CONFIG: &str = r#"
[waves]
order = ["wave1", "wave2"]

[tiers.standard]
max_waves = 2

[override]
policy = "write_access"
"#;

const FAIL_DOC: &str = r#"{
  "reviewer": "security", "verdict": "FAIL", "summary": "unsafe input handling",
  "findings": [{"severity": "critical", "category": "injection",
                "file": "src/db.rs", "line": 12, "title": "SQL built by format!"}]
}"#;

const PASS_DOC: &str = r#"{"reviewer": "style", "verdict": "PASS", "findings": []}"#;

struct Workspace {
    _temp: tempfile::TempDir,
    root: PathBuf,
}

impl Workspace {
    fn new(verdicts: &[(&str, &str)]) -> Self {
        let temp = tempfile::TempDir::new().expect("Failed to create temp dir");
        let root = temp.path().to_path_buf();
        std::fs::write(root.join("council.toml"), CONFIG).unwrap();
        std::fs::create_dir(root.join("verdicts")).unwrap();
        for (name, contents) in verdicts {
            std::fs::write(root.join("verdicts").join(name), contents).unwrap();
        }
        Self { _temp: temp, root }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).unwrap();
        path
    }
}

fn kv(out: &str, key: &str) -> String {
    out.lines()
        .find_map(|l| l.strip_prefix(&format!("{}=", key)))
        .unwrap_or_else(|| panic!("missing {} in {:?}", key, out))
        .to_string()
}

/// Test: clean wave prints escalation lines and writes a versioned record
#[test]
fn test_wave_gate_escalates_and_writes_record() {
    let ws = Workspace::new(&[("style.json", PASS_DOC)]);
    let record = ws.path("decision.json");
    let out = commands::wave_gate(
        &ws.path("council.toml"),
        &ws.path("verdicts"),
        "wave1",
        "standard",
        Some(record.as_path()),
    )
    .unwrap();

    assert_eq!(kv(&out, "escalate"), "true");
    assert_eq!(kv(&out, "next_wave"), "wave2");
    assert_eq!(kv(&out, "reason"), "passed_gate");

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(record).unwrap()).unwrap();
    assert_eq!(json["schema_version"], 1);
    assert_eq!(json["decision"]["wave"], "wave1");
    assert!(json["evaluation_id"].is_string());
}

/// Test: critical findings block the gate but the command still succeeds
#[test]
fn test_wave_gate_blocking_is_not_an_error() {
    let ws = Workspace::new(&[("security.json", FAIL_DOC)]);
    let out = commands::wave_gate(
        &ws.path("council.toml"),
        &ws.path("verdicts"),
        "wave1",
        "standard",
        None,
    )
    .unwrap();

    assert_eq!(kv(&out, "blocking"), "true");
    assert_eq!(kv(&out, "escalate"), "false");
    assert!(kv(&out, "reason").contains("critical_findings"));
    assert_eq!(kv(&out, "critical_count"), "1");
}

/// Test: an unknown tier is reported as an error naming the tier
#[test]
fn test_wave_gate_unknown_tier_fails() {
    let ws = Workspace::new(&[("style.json", PASS_DOC)]);
    let err = commands::wave_gate(
        &ws.path("council.toml"),
        &ws.path("verdicts"),
        "wave1",
        "premium",
        None,
    )
    .unwrap_err();

    assert!(format!("{:#}", err).contains("premium"));
}

/// Test: offline aggregation applies a writer's override from the feed
#[test]
fn test_aggregate_with_override_feed() {
    let ws = Workspace::new(&[("security.json", FAIL_DOC), ("style.json", PASS_DOC)]);
    let comments = ws.write(
        "comments.json",
        r#"[{"actor": "lead", "body": "/council override sha=abc1234 reason: false positive"}]"#,
    );
    let permissions = ws.write("perms.json", r#"{"lead": "maintain"}"#);
    let output = ws.path("council.json");

    let out = commands::aggregate(&AggregateRequest {
        config: ws.path("council.toml"),
        verdicts: ws.path("verdicts"),
        head_sha: "abc1234def".to_string(),
        comments: Some(comments),
        permissions: Some(permissions),
        pr_author: Some("dev".to_string()),
        output: Some(output.clone()),
    })
    .unwrap();

    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["verdict"]["outcome"], "WARN");
    assert_eq!(json["verdict"]["applied_override"]["actor"], "lead");
    assert_eq!(json["verdict"]["stats"]["critical"], 1);
    assert!(output.exists());
}

/// Test: without a feed the FAIL stands
#[test]
fn test_aggregate_without_feed_fails() {
    let ws = Workspace::new(&[("security.json", FAIL_DOC)]);
    let out = commands::aggregate(&AggregateRequest {
        config: ws.path("council.toml"),
        verdicts: ws.path("verdicts"),
        head_sha: "abc1234def".to_string(),
        ..Default::default()
    })
    .unwrap();

    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["verdict"]["outcome"], "FAIL");
    assert!(json["verdict"].get("applied_override").is_none());
}

/// Test: positions maps new-file lines, header counted as position 1
#[test]
fn test_positions_command() {
    let ws = Workspace::new(&[]);
    let diff = ws.write("lib.diff", "@@ -1,2 +1,3 @@\n a\n-b\n+c\n d\n");
    let out = commands::positions(&diff).unwrap();

    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["1"], 2);
    assert_eq!(json["2"], 4);
    assert_eq!(json["3"], 5);
}

/// Test: a bad config path surfaces in the error chain
#[test]
fn test_missing_config_reported() {
    let err = commands::wave_gate(
        Path::new("/nonexistent/council.toml"),
        Path::new("/nonexistent/verdicts"),
        "wave1",
        "standard",
        None,
    )
    .unwrap_err();

    assert!(format!("{:#}", err).contains("/nonexistent/council.toml"));
}
