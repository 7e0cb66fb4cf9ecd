// End-to-end tests for the `tguard` binary: exit codes and the --json stdout contract.
//
// Run with: cargo test -p tallyguard-cli --test cli_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use httpmock::prelude::*;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn tguard(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_tguard"));
        cmd.current_dir(self.dir.path())
            .env("TALLYGUARD_ARTIFACT_DIR", self.path("models"))
            .env("TALLYGUARD_HISTORY_DB", self.path("history.db"))
            .env("TALLYGUARD_LLM_ENDPOINT", "http://127.0.0.1:9")
            .env("TALLYGUARD_LLM_TIMEOUT", "2")
            .env_remove("RUST_LOG");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.tguard().args(args).output().expect("run tguard")
    }

    fn self_compare_config(&self) -> PathBuf {
        self.write(
            "recon.json",
            r#"{
                "key_columns": ["Account"],
                "criteria_columns": ["Column1", "Column2"],
                "comment_prompt": "Balance is off by {derived_value} (usually {historical_value}). Explain briefly.",
                "compare_current_criteria_column": true
            }"#,
        )
    }

    /// 20 rows on a small ring plus one far-off row (A-20).
    fn balances_csv(&self) -> PathBuf {
        let mut csv = String::from("Account,Column1,Column2\n");
        for i in 0..20 {
            let angle = i as f64 * std::f64::consts::TAU / 20.0;
            csv.push_str(&format!("A-{i},{},{}\n", 100.0 + angle.cos(), 95.0 + angle.sin()));
        }
        csv.push_str("A-20,10000,-10000\n");
        self.write("balances.csv", &csv)
    }
}

fn code(output: &Output) -> i32 {
    output.status.code().unwrap_or(-1)
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("stdout must be one JSON value: {e}\nstdout:\n{stdout}\nstderr:\n{}", stderr(output)))
}

fn s(path: &Path) -> &str {
    path.to_str().unwrap()
}

// ===========================================================================
// validate / options
// ===========================================================================

#[test]
fn validate_accepts_good_config() {
    let ws = Workspace::new();
    let config = ws.self_compare_config();

    let out = ws.run(&["validate", "--config", s(&config)]);
    assert_eq!(code(&out), 0, "stderr: {}", stderr(&out));
    assert!(stderr(&out).contains("self_compare"));
}

#[test]
fn validate_rejects_single_prefix() {
    let ws = Workspace::new();
    let config = ws.write(
        "paired.toml",
        "criteria_columns = [\"Balance\"]\ncompare_current_criteria_column = false\ndb_columns = \"Current\"\n",
    );

    let out = ws.run(&["validate", "--config", s(&config)]);
    assert_eq!(code(&out), 3);
    assert!(stderr(&out).contains("db_columns"));
}

#[test]
fn unparseable_config_is_exit_3() {
    let ws = Workspace::new();
    let config = ws.write("broken.json", "{ criteria_columns: ");

    let out = ws.run(&["validate", "--config", s(&config)]);
    assert_eq!(code(&out), 3);
}

#[test]
fn options_json_lists_defaults() {
    let ws = Workspace::new();
    let config = ws.self_compare_config();

    let out = ws.run(&["options", "list", "--config", s(&config), "--json"]);
    assert_eq!(code(&out), 0);
    let val = stdout_json(&out);
    assert_eq!(val["1"], "Send an Email");
    assert_eq!(val["2"], "Create a Jira Ticket");
    assert_eq!(val["3"], "Generate a Report");
    assert_eq!(val["4"], "Update Source");
}

#[test]
fn options_select_extracts_input_fields() {
    let ws = Workspace::new();
    let config = ws.self_compare_config();

    let server = MockServer::start();
    let chat = server.mock(|when, then| {
        when.method(POST)
            .path("/api/chat")
            .body_includes("create a jira ticket");
        then.status(200).json_body(serde_json::json!({
            "message": {
                "role": "assistant",
                "content": "def create_ticket():\n    project = input(\"Project key\")\n    summary = input('Summary')\n    return project, summary\n"
            }
        }));
    });

    let out = ws
        .tguard()
        .args(["options", "select", "2", "--config", s(&config), "--json"])
        .env("TALLYGUARD_LLM_ENDPOINT", server.base_url())
        .output()
        .unwrap();
    assert_eq!(code(&out), 0, "stderr: {}", stderr(&out));

    chat.assert_hits(1);
    let val = stdout_json(&out);
    assert_eq!(val["option"], "2");
    assert_eq!(val["message"], "Create a Jira Ticket selected.");
    assert_eq!(val["input_fields"], serde_json::json!(["Project key", "Summary"]));
    assert!(val["generated_code"].as_str().unwrap().starts_with("def create_ticket():"));
}

#[test]
fn options_select_rejects_unknown_key() {
    let ws = Workspace::new();
    let config = ws.self_compare_config();

    let server = MockServer::start();
    let chat = server.mock(|when, then| {
        when.method(POST).path("/api/chat");
        then.status(200).json_body(serde_json::json!({"message": {"content": "unused"}}));
    });

    let out = ws
        .tguard()
        .args(["options", "select", "7", "--config", s(&config)])
        .env("TALLYGUARD_LLM_ENDPOINT", server.base_url())
        .output()
        .unwrap();
    assert_eq!(code(&out), 2);
    assert!(stderr(&out).contains("unknown next-step option '7'"));
    chat.assert_hits(0);
}

#[test]
fn options_select_with_chat_service_down_is_runtime_error() {
    let ws = Workspace::new();
    let config = ws.self_compare_config();

    let out = ws.run(&["options", "select", "1", "--config", s(&config)]);
    assert_eq!(code(&out), 6, "stderr: {}", stderr(&out));
}

#[test]
fn version_prints_package_version() {
    let ws = Workspace::new();
    let out = ws.run(&["--version"]);
    assert_eq!(code(&out), 0);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert_eq!(stdout.trim(), format!("tguard {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_flag_is_usage_error() {
    let ws = Workspace::new();
    let out = ws.run(&["reconcile", "--bogus"]);
    assert_eq!(code(&out), 2);
}

// ===========================================================================
// reconcile
// ===========================================================================

#[test]
fn reconcile_without_model_reports_unscored() {
    let ws = Workspace::new();
    let config = ws.self_compare_config();
    let data = ws.balances_csv();

    let out = ws.run(&["reconcile", s(&data), "--config", s(&config), "--json"]);
    assert_eq!(code(&out), 0, "stderr: {}", stderr(&out));

    let val = stdout_json(&out);
    assert_eq!(val["processed_count"], 21);
    assert_eq!(val["anomalous_count"], 0);
    assert_eq!(val["unscored_count"], 21);
    assert_eq!(val["anomalous_records"], serde_json::json!([]));
    assert!(stderr(&out).contains("tguard train"));
}

#[test]
fn reconcile_missing_file_is_exit_4() {
    let ws = Workspace::new();
    let config = ws.self_compare_config();

    let out = ws.run(&["reconcile", s(&ws.path("nope.csv")), "--config", s(&config)]);
    assert_eq!(code(&out), 4);
}

#[test]
fn reconcile_without_criteria_columns_is_exit_3() {
    let ws = Workspace::new();
    let config = ws.self_compare_config();
    let data = ws.write("other.csv", "Account,Amount\nA-1,5\n");

    let out = ws.run(&["reconcile", s(&data), "--config", s(&config)]);
    assert_eq!(code(&out), 3);
    assert!(stderr(&out).contains("no valid criteria columns"));
}

#[test]
fn trained_model_flags_outlier_and_strict_exits_1() {
    let ws = Workspace::new();
    let config = ws.self_compare_config();
    let data = ws.balances_csv();

    let out = ws.run(&["train", "--config", s(&config), "--history", s(&data), "--json"]);
    assert_eq!(code(&out), 0, "stderr: {}", stderr(&out));
    let trained = stdout_json(&out);
    assert_eq!(trained["status"], "trained");
    assert_eq!(trained["rows"], 21);

    let out = ws.run(&[
        "reconcile",
        s(&data),
        "--config",
        s(&config),
        "--json",
        "--no-comments",
        "--strict",
    ]);
    assert_eq!(code(&out), 1, "stderr: {}", stderr(&out));

    let val = stdout_json(&out);
    assert_eq!(val["anomalous_count"], 1);
    assert_eq!(val["matched_count"], 20);
    let record = &val["anomalous_records"][0];
    assert_eq!(record["Account"], "A-20");
    assert_eq!(record["Balance Difference"], 20000.0);
    assert_eq!(record["Match Status"], "Column1 Break");
    assert_eq!(record["Anomaly"], "Yes");
}

#[test]
fn comments_come_from_chat_service() {
    let ws = Workspace::new();
    let config = ws.self_compare_config();
    let data = ws.balances_csv();
    assert_eq!(code(&ws.run(&["train", "--config", s(&config), "--history", s(&data)])), 0);

    let server = MockServer::start();
    let chat = server.mock(|when, then| {
        when.method(POST)
            .path("/api/chat")
            .body_includes("Balance is off by 20000 (usually 0)");
        then.status(200)
            .json_body(serde_json::json!({"message": {"role": "assistant", "content": "Posting error on A-20."}}));
    });

    let csv_out = ws.path("reviewed.csv");
    let out = ws
        .tguard()
        .args(["reconcile", s(&data), "--config", s(&config), "--json", "--csv", s(&csv_out)])
        .env("TALLYGUARD_LLM_ENDPOINT", server.base_url())
        .output()
        .unwrap();
    assert_eq!(code(&out), 0, "stderr: {}", stderr(&out));

    chat.assert_hits(1);
    let val = stdout_json(&out);
    assert_eq!(val["anomalous_records"][0]["Comments"], "Posting error on A-20.");

    let reviewed = std::fs::read_to_string(&csv_out).unwrap();
    assert!(reviewed.starts_with("Account,Column1,Column2,Balance Difference,Match Status,Anomaly,Comments\n"));
    assert!(reviewed.contains("Posting error on A-20."));
}

#[test]
fn unreachable_chat_service_falls_back_per_row() {
    let ws = Workspace::new();
    let config = ws.self_compare_config();
    let data = ws.balances_csv();
    assert_eq!(code(&ws.run(&["train", "--config", s(&config), "--history", s(&data)])), 0);

    let out = ws.run(&["reconcile", s(&data), "--config", s(&config), "--json"]);
    assert_eq!(code(&out), 0, "stderr: {}", stderr(&out));

    let val = stdout_json(&out);
    let comment = val["anomalous_records"][0]["Comments"].as_str().unwrap();
    assert!(comment.starts_with("Comment unavailable"), "comment: {comment}");
}

// ===========================================================================
// history + model status
// ===========================================================================

#[test]
fn recorded_matches_feed_training() {
    let ws = Workspace::new();
    let config = ws.self_compare_config();
    let data = ws.balances_csv();
    assert_eq!(code(&ws.run(&["train", "--config", s(&config), "--history", s(&data)])), 0);

    let out = ws.run(&[
        "reconcile",
        s(&data),
        "--config",
        s(&config),
        "--no-comments",
        "--record-matches",
    ]);
    assert_eq!(code(&out), 0, "stderr: {}", stderr(&out));

    let out = ws.run(&["train", "--config", s(&config), "--json"]);
    assert_eq!(code(&out), 0, "stderr: {}", stderr(&out));
    let val = stdout_json(&out);
    assert_eq!(val["status"], "trained");
    assert_eq!(val["rows"], 20);
}

#[test]
fn train_with_empty_history_is_skipped() {
    let ws = Workspace::new();
    let config = ws.self_compare_config();

    let out = ws.run(&["train", "--config", s(&config), "--json"]);
    assert_eq!(code(&out), 0, "stderr: {}", stderr(&out));
    assert_eq!(stdout_json(&out)["status"], "skipped");

    let out = ws.run(&["model", "status", "--json"]);
    assert_eq!(stdout_json(&out)["status"], "untrained");
}

#[test]
fn model_status_after_training() {
    let ws = Workspace::new();
    let config = ws.self_compare_config();
    let data = ws.balances_csv();
    assert_eq!(code(&ws.run(&["train", "--config", s(&config), "--history", s(&data)])), 0);

    let out = ws.run(&["model", "status", "--json"]);
    assert_eq!(code(&out), 0);
    let val = stdout_json(&out);
    assert_eq!(val["status"], "trained");
    assert_eq!(val["training_rows"], 21);
    assert_eq!(val["feature_columns"], serde_json::json!(["Column1", "Column2"]));
}
