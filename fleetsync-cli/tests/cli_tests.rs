use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

const PRG: &str = "rsync://utility.mlab.mlab4.prg01.measurement-lab.org:7999/switch";
const SEA: &str = "rsync://utility.mlab.mlab1.sea02.measurement-lab.org:7999/switch";

fn fleetsync_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("fleetsync"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1")
        .env_remove("FLEETSYNC_ACCESS_TOKEN");
    cmd
}

fn write_store(dir: &Path) -> PathBuf {
    let path = dir.join("statuses.json");
    let body = serde_json::json!([
        {
            "dropboxrsyncaddress": SEA,
            "contact": "ops@example.org",
            "lastsuccessfulcollection": "x2024-01-02-03:04",
            "errorsincelastsuccessful": "",
            "lastcollectionattempt": "x2024-01-02-03:04",
            "maxrawfilemtimearchived": "1704164640"
        },
        {
            "dropboxrsyncaddress": PRG,
            "contact": "",
            "lastsuccessfulcollection": "x2024-01-01-00:00",
            "errorsincelastsuccessful": "connection refused",
            "lastcollectionattempt": "x2024-01-02-00:00",
            "maxrawfilemtimearchived": ""
        }
    ]);
    fs::write(&path, serde_json::to_string_pretty(&body).expect("json")).expect("write store");
    path
}

fn deployment(namespace: &str, machine: &str) -> String {
    format!(
        r#"{{"metadata": {{"name": "d", "namespace": "{namespace}"}},
            "spec": {{"selector": {{"matchLabels": {{
              "experiment": "utility.mlab", "machine": "{machine}", "rsync_module": "switch"}}}}}}}}"#
    )
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

#[test]
fn status_prints_table_from_store_file() {
    let home = TempDir::new().expect("home");
    let store = write_store(home.path());

    let assert = fleetsync_cmd(home.path())
        .arg("--store-file")
        .arg(&store)
        .arg("status")
        .assert()
        .success()
        .stdout(contains("2 endpoints | 1 with errors"))
        .stdout(contains("connection refused"));
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");

    // mlab1.sea02 sorts before mlab4.prg01.
    let sea = stdout.find("sea02").expect("sea02 row");
    let prg = stdout.find("prg01").expect("prg01 row");
    assert!(sea < prg, "rows should be sorted by identifier:\n{stdout}");
}

#[test]
fn status_json_applies_filter() {
    let home = TempDir::new().expect("home");
    let store = write_store(home.path());

    let assert = fleetsync_cmd(home.path())
        .args(["status", "--json", "--filter", "sea02", "--store-file"])
        .arg(&store)
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("valid json");

    let result = value["result"].as_array().expect("result array");
    assert_eq!(result.len(), 1);
    assert_eq!(result[0]["dropboxrsyncaddress"], SEA);
    assert_eq!(result[0]["contact"], "ops@example.org");
}

#[test]
fn status_with_no_matches_says_so() {
    let home = TempDir::new().expect("home");
    let store = write_store(home.path());

    fleetsync_cmd(home.path())
        .args(["status", "--filter", "nowhere"])
        .arg("--store-file")
        .arg(&store)
        .assert()
        .success()
        .stdout(contains("No status records."));
}

#[test]
fn status_reports_unreadable_store_file() {
    let home = TempDir::new().expect("home");

    fleetsync_cmd(home.path())
        .arg("status")
        .arg("--store-file")
        .arg(home.path().join("missing.json"))
        .assert()
        .failure()
        .stderr(contains("failed to fetch status records"));
}

// ---------------------------------------------------------------------------
// deployed
// ---------------------------------------------------------------------------

#[test]
fn deployed_lists_ids_from_configured_manifest() {
    let home = TempDir::new().expect("home");
    let manifest = home.path().join("deployments.json");
    fs::write(
        &manifest,
        format!(
            r#"{{"items": [{}, {}, {}]}}"#,
            deployment("scraper", "mlab1.sea02.measurement-lab.org"),
            deployment("scraper", "mlab4.prg01.measurement-lab.org"),
            deployment("other", "mlab2.lga03.measurement-lab.org"),
        ),
    )
    .expect("write manifest");
    let config = home.path().join("config.yaml");
    fs::write(
        &config,
        format!("deployments:\n  - manifest: {}\n", manifest.display()),
    )
    .expect("write config");

    let assert = fleetsync_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .args(["deployed", "--json"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");
    let ids: Vec<String> = serde_json::from_str(&stdout).expect("json array");
    assert_eq!(ids, vec![SEA.to_owned(), PRG.to_owned()]);
}

#[test]
fn deployed_without_sources_prints_nothing() {
    let home = TempDir::new().expect("home");

    fleetsync_cmd(home.path())
        .arg("deployed")
        .assert()
        .success()
        .stdout("")
        .stderr(contains("No deployment sources configured"));
}

// ---------------------------------------------------------------------------
// sync / diff / run
// ---------------------------------------------------------------------------

#[test]
fn sync_requires_spreadsheet() {
    let home = TempDir::new().expect("home");
    let store = write_store(home.path());

    fleetsync_cmd(home.path())
        .arg("--store-file")
        .arg(&store)
        .args(["sync", "--dry-run"])
        .assert()
        .failure()
        .stderr(contains("spreadsheet ID is required"));
}

#[test]
fn diff_requires_spreadsheet() {
    let home = TempDir::new().expect("home");

    fleetsync_cmd(home.path())
        .arg("diff")
        .assert()
        .failure()
        .stderr(contains("spreadsheet ID is required"));
}

#[test]
fn run_rejects_non_positive_interval() {
    let home = TempDir::new().expect("home");

    fleetsync_cmd(home.path())
        .args(["run", "--spreadsheet", "sheet-id", "--expected-upload-interval", "0"])
        .assert()
        .failure()
        .stderr(contains("expected_upload_interval_secs must be positive"));
}

#[test]
fn malformed_config_is_reported() {
    let home = TempDir::new().expect("home");
    let dir = home.path().join(".fleetsync");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("config.yaml"), "prometheus_port: [not, a, port]\n").expect("write");

    fleetsync_cmd(home.path())
        .arg("deployed")
        .assert()
        .failure()
        .stderr(contains("failed to load"));
}
