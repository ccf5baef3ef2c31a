//! Deployed-set resolution from manifest files.
//!
//! Each test gets its own `TempDir`; nothing touches the network.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fleetsync_core::{DeploymentSource, ManualClock};
use fleetsync_deploy::{resolver::read_manifest, DeployError, DeployedSetResolver};
use rstest::rstest;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helper
// ---------------------------------------------------------------------------

fn deployment(namespace: &str, machine: &str, module_key: &str, module: &str) -> String {
    format!(
        r#"{{"metadata": {{"namespace": "{namespace}"}},
            "spec": {{"selector": {{"matchLabels": {{
              "experiment": "utility.mlab", "machine": "{machine}", "{module_key}": "{module}"}}}}}}}}"#
    )
}

fn write_list(dir: &TempDir, name: &str, items: &[String]) -> DeploymentSource {
    let path = dir.path().join(name);
    fs::write(&path, format!(r#"{{"items": [{}]}}"#, items.join(","))).expect("write fixture");
    DeploymentSource::Manifest(path)
}

fn resolver(sources: Vec<DeploymentSource>, clock: Arc<ManualClock>) -> DeployedSetResolver {
    DeployedSetResolver::with_clock(sources, ureq::agent(), Duration::from_secs(3600), clock)
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[rstest]
#[case("rsync_module")]
#[case("module")]
fn module_label_spellings(#[case] key: &str) {
    let dir = TempDir::new().expect("tempdir");
    let source = write_list(
        &dir,
        "d.json",
        &[deployment("scraper", "mlab4.prg01.measurement-lab.org", key, "switch")],
    );
    let set = resolver(vec![source], Arc::new(ManualClock::new()))
        .resolve("scraper")
        .expect("resolve");
    assert!(set.contains("rsync://utility.mlab.mlab4.prg01.measurement-lab.org:7999/switch"));
}

#[test]
fn sources_are_unioned_and_namespace_filtered() {
    let dir = TempDir::new().expect("tempdir");
    let a = write_list(
        &dir,
        "a.json",
        &[deployment("scraper", "mlab4.prg01.measurement-lab.org", "rsync_module", "switch")],
    );
    let b = write_list(
        &dir,
        "b.json",
        &[
            deployment("scraper", "mlab4.sea02.measurement-lab.org", "rsync_module", "switch"),
            deployment("staging", "mlab4.sea03.measurement-lab.org", "rsync_module", "switch"),
        ],
    );
    let set = resolver(vec![a, b], Arc::new(ManualClock::new()))
        .resolve("scraper")
        .expect("resolve");
    assert_eq!(set.len(), 2);
    assert!(!set.iter().any(|id| id.contains("sea03")));
}

#[test]
fn missing_manifest_contributes_nothing() {
    let dir = TempDir::new().expect("tempdir");
    assert!(read_manifest(&dir.path().join("absent.yaml"))
        .expect("absent is fine")
        .is_empty());
    let set = resolver(
        vec![DeploymentSource::Manifest(dir.path().join("absent.yaml"))],
        Arc::new(ManualClock::new()),
    )
    .resolve("scraper")
    .expect("resolve");
    assert!(set.is_empty());
}

#[test]
fn malformed_manifest_is_an_error() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("bad.json");
    fs::write(&path, "{\"items\": [").expect("write");
    let err = resolver(vec![DeploymentSource::Manifest(path)], Arc::new(ManualClock::new()))
        .resolve("scraper")
        .unwrap_err();
    assert!(matches!(err, DeployError::Parse { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// Caching
// ---------------------------------------------------------------------------

#[test]
fn result_is_cached_for_ttl() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let clock = Arc::new(ManualClock::new());
    let resolver = DeployedSetResolver::from_operation(
        Duration::from_secs(3600),
        clock.clone(),
        move |_ns: &String| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Default::default())
        },
    );

    resolver.resolve("scraper").expect("first");
    clock.advance(Duration::from_secs(1800));
    resolver.resolve("scraper").expect("cached");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    clock.advance(Duration::from_secs(1801));
    resolver.resolve("scraper").expect("expired");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn manifest_changes_are_seen_after_expiry() {
    let dir = TempDir::new().expect("tempdir");
    let clock = Arc::new(ManualClock::new());
    let source = write_list(&dir, "d.json", &[]);
    let resolver = resolver(vec![source.clone()], clock.clone());
    assert!(resolver.resolve("scraper").expect("empty").is_empty());

    write_list(
        &dir,
        "d.json",
        &[deployment("scraper", "mlab4.prg01.measurement-lab.org", "rsync_module", "switch")],
    );
    assert!(resolver.resolve("scraper").expect("stale").is_empty());
    clock.advance(Duration::from_secs(3601));
    assert_eq!(resolver.resolve("scraper").expect("fresh").len(), 1);
}
