//! Worksheet round trips against an in-memory sheet service.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use fleetsync_core::{ManualClock, StatusRecord};
use fleetsync_sync::{
    pipeline::{preview_cycle, run_cycle},
    FleetData, SheetService, Spreadsheet, SyncError,
};

const PRG: &str = "rsync://utility.mlab.mlab4.prg01.measurement-lab.org:7999/switch";
const PRG_UTIL: &str = "rsync://utility.mlab.mlab4.prg01.measurement-lab.org:7999/utilization";
const SEA: &str = "rsync://utility.mlab.mlab4.sea02.measurement-lab.org:7999/switch";

/// Holds a grid, records the last write, and can be told to misbehave.
#[derive(Default)]
struct FakeSheet {
    read: Mutex<Option<Value>>,
    writes: Mutex<Vec<(String, Vec<Vec<String>>)>>,
    short_ack: bool,
}

impl FakeSheet {
    fn with_values(values: Value) -> Self {
        Self {
            read: Mutex::new(Some(json!({ "range": "ws!A1:G100", "values": values }))),
            ..Self::default()
        }
    }

    fn without_values() -> Self {
        Self {
            read: Mutex::new(Some(json!({ "range": "ws!A1:G100" }))),
            ..Self::default()
        }
    }

    fn last_write(&self) -> (String, Vec<Vec<String>>) {
        self.writes.lock().unwrap().last().cloned().expect("a write")
    }
}

impl SheetService for FakeSheet {
    fn get_values(&self, _spreadsheet_id: &str, _range: &str) -> Result<Value, SyncError> {
        Ok(self.read.lock().unwrap().clone().unwrap_or(json!({})))
    }

    fn update_values(
        &self,
        _spreadsheet_id: &str,
        range: &str,
        values: &[Vec<String>],
    ) -> Result<Value, SyncError> {
        self.writes
            .lock()
            .unwrap()
            .push((range.to_owned(), values.to_vec()));
        let rows = if self.short_ack { 0 } else { values.len() };
        Ok(json!({ "updatedRange": range, "updatedRows": rows }))
    }
}

fn record(id: &str, max_raw: &str) -> StatusRecord {
    StatusRecord::new(id).with_field("maxrawfilemtimearchived", max_raw)
}

fn sheet(fake: Arc<FakeSheet>) -> Spreadsheet {
    Spreadsheet::new(fake, "sheet-id", "ws")
}

const HEADER: [&str; 6] = [
    "dropboxrsyncaddress",
    "contact",
    "lastsuccessfulcollection",
    "errorsincelastsuccessful",
    "lastcollectionattempt",
    "maxrawfilemtimearchived",
];

#[test]
fn read_range_covers_one_spare_column() {
    let s = sheet(Arc::new(FakeSheet::default()));
    assert_eq!(s.read_range(), "ws!A:G");
}

#[test]
fn empty_worksheet_is_bootstrapped_with_header() {
    let fake = Arc::new(FakeSheet::with_values(json!([])));
    let report = sheet(fake.clone())
        .update(&[record(SEA, "1490746202"), record(PRG, "1490746201")])
        .expect("update");

    assert!(report.bootstrapped);
    let (range, values) = fake.last_write();
    assert_eq!(range, "ws!A1:F3");
    assert_eq!(values[0], HEADER);
    assert_eq!(values[1][0], PRG);
    assert_eq!(values[2][0], SEA);
}

#[test]
fn existing_rows_keep_their_position() {
    let fake = Arc::new(FakeSheet::with_values(json!([
        HEADER,
        [SEA, "", "", "", "", "1"],
        [PRG, "someone@example.com", "", "", "", "2"],
    ])));
    sheet(fake.clone())
        .update(&[record(PRG_UTIL, "3"), record(PRG, "1490746201")])
        .expect("update");

    let (range, values) = fake.last_write();
    assert_eq!(range, "ws!A1:F4");
    assert_eq!(values[1][0], SEA);
    assert_eq!(values[1][5], "1", "row without fresh data untouched");
    assert_eq!(values[2][0], PRG);
    assert_eq!(values[2][5], "1490746201");
    assert_eq!(values[2][1], "", "fresh empty contact overwrites");
    assert_eq!(values[3][0], PRG_UTIL);
}

#[test]
fn operator_column_is_preserved() {
    let fake = Arc::new(FakeSheet::with_values(json!([
        ["dropboxrsyncaddress", "contact", "lastsuccessfulcollection",
         "errorsincelastsuccessful", "lastcollectionattempt",
         "maxrawfilemtimearchived", "notes"],
        [PRG, "", "", "", "", "1", "replaced disk"],
    ])));
    sheet(fake.clone())
        .update(&[record(PRG, "2")])
        .expect("update");

    let (range, values) = fake.last_write();
    assert_eq!(range, "ws!A1:G2");
    assert_eq!(values[1][5], "2");
    assert_eq!(values[1][6], "replaced disk");
}

#[test]
fn missing_values_container_is_retrieval_error() {
    let fake = Arc::new(FakeSheet::without_values());
    let err = sheet(fake.clone()).update(&[record(PRG, "1")]).unwrap_err();
    assert!(matches!(err, SyncError::Retrieval(_)), "got: {err}");
    assert!(fake.writes.lock().unwrap().is_empty(), "nothing written");
}

#[test]
fn blank_header_above_data_is_retrieval_error() {
    let fake = Arc::new(FakeSheet::with_values(json!([
        [],
        [SEA, "ops@example.org", "", "", "", "42"]
    ])));
    let err = sheet(fake.clone()).update(&[record(PRG, "1")]).unwrap_err();
    assert!(matches!(err, SyncError::Retrieval(_)), "got: {err}");
    assert!(fake.writes.lock().unwrap().is_empty(), "existing rows left alone");
}

#[test]
fn blank_header_alone_reads_as_empty_sheet() {
    let fake = Arc::new(FakeSheet::with_values(json!([["", ""]])));
    let report = sheet(fake.clone()).update(&[record(PRG, "1")]).expect("update");
    assert!(report.bootstrapped);
    let (_, values) = fake.last_write();
    assert_eq!(values[0], HEADER);
    assert_eq!(values[1][0], PRG);
}

#[test]
fn unacknowledged_write_is_sync_failure() {
    let fake = Arc::new(FakeSheet {
        short_ack: true,
        ..FakeSheet::with_values(json!([]))
    });
    let err = sheet(fake).update(&[record(PRG, "1")]).unwrap_err();
    assert!(matches!(err, SyncError::SyncFailure(_)), "got: {err}");
    assert_eq!(err.outcome_label(), "sync_failure");
}

#[test]
fn cycle_uses_cached_fleet_and_preview_does_not_write() {
    let fake = Arc::new(FakeSheet::with_values(json!([HEADER])));
    let fleet = FleetData::from_operation(
        Duration::from_secs(30),
        Arc::new(ManualClock::new()),
        |_ns: &String| Ok(vec![record(PRG, "1490746201")]),
    );
    let s = sheet(fake.clone());

    let preview = preview_cycle(&fleet, &s, "scraper").expect("preview");
    assert!(!preview.outcome.written);
    assert_eq!(preview.merged.rows.len(), 1);
    assert!(fake.writes.lock().unwrap().is_empty());

    let outcome = run_cycle(&fleet, &s, "scraper").expect("cycle");
    assert!(outcome.written);
    assert_eq!(outcome.records, 1);
    assert_eq!(outcome.report.appended, 1);
    assert_eq!(fake.writes.lock().unwrap().len(), 1);
}

#[test]
fn upstream_failure_surfaces_before_sheet_is_touched() {
    let fake = Arc::new(FakeSheet::with_values(json!([])));
    let fleet = FleetData::from_operation(
        Duration::from_secs(30),
        Arc::new(ManualClock::new()),
        |_ns: &String| {
            Err(SyncError::Protocol {
                service: "datastore",
                message: "boom".into(),
            })
        },
    );
    let err = run_cycle(&fleet, &sheet(fake.clone()), "scraper").unwrap_err();
    assert_eq!(err.outcome_label(), "protocol_error");
    assert!(fake.writes.lock().unwrap().is_empty());
}
