//! Order-preserving merge of fresh status records into the existing sheet.
//!
//! The sheet is hand-curated: operators reorder rows and add their own
//! columns. The merge therefore never moves a row, never drops one, and never
//! touches a cell whose column is not a record field. Rows whose identifier
//! is absent from the fresh data are left as they were. Identifiers not yet
//! on the sheet are appended at the bottom in sorted order.

use std::collections::BTreeMap;

use serde::Serialize;

use fleetsync_core::{types::canonical_header, SpreadsheetState, StatusRecord, ID_FIELD};

use crate::error::SyncError;

/// What a merge did, for logging and the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Existing rows overwritten with fresh values.
    pub updated: usize,
    /// Existing rows with no fresh record, kept unchanged.
    pub retained: usize,
    /// New rows added after the existing ones.
    pub appended: usize,
    /// The sheet was empty and got the canonical header.
    pub bootstrapped: bool,
}

impl ReconcileReport {
    pub fn total_rows(&self) -> usize {
        self.updated + self.retained + self.appended
    }
}

/// Merge `records` into `previous`.
///
/// `previous` is `None` for an empty sheet, in which case the canonical
/// header is used. When `records` holds the same identifier twice, the later
/// one wins.
pub fn reconcile(
    records: &[StatusRecord],
    previous: Option<&SpreadsheetState>,
) -> Result<(SpreadsheetState, ReconcileReport), SyncError> {
    let mut report = ReconcileReport::default();
    let bootstrap;
    let previous = match previous {
        Some(state) => state,
        None => {
            report.bootstrapped = true;
            bootstrap = SpreadsheetState::empty();
            &bootstrap
        }
    };

    let header = if previous.header.is_empty() {
        if !previous.rows.is_empty() {
            return Err(SyncError::Retrieval(format!(
                "sheet has {} rows but no header",
                previous.rows.len()
            )));
        }
        canonical_header()
    } else {
        previous.header.clone()
    };
    let id_col = header
        .iter()
        .position(|name| name == ID_FIELD)
        .ok_or_else(|| {
            SyncError::Retrieval(format!("sheet header has no {ID_FIELD} column"))
        })?;

    let mut pending: BTreeMap<&str, &StatusRecord> =
        records.iter().map(|record| (record.id(), record)).collect();

    let mut rows = Vec::with_capacity(previous.rows.len() + pending.len());
    for old in &previous.rows {
        let id = old.get(id_col).map(String::as_str).unwrap_or_default();
        match pending.remove(id) {
            Some(record) => {
                report.updated += 1;
                rows.push(overlay(&header, record, old));
            }
            None => {
                report.retained += 1;
                rows.push(old.clone());
            }
        }
    }

    for record in pending.into_values() {
        report.appended += 1;
        rows.push(project(&header, record));
    }

    Ok((SpreadsheetState::new(header, rows), report))
}

/// Fresh values for every record column; the old cell everywhere else.
fn overlay(header: &[String], record: &StatusRecord, old: &[String]) -> Vec<String> {
    header
        .iter()
        .enumerate()
        .map(|(col, name)| match record.field(name) {
            Some(value) => value.to_owned(),
            None => old.get(col).cloned().unwrap_or_default(),
        })
        .collect()
}

/// A brand-new row. Columns outside the record are empty.
fn project(header: &[String], record: &StatusRecord) -> Vec<String> {
    header
        .iter()
        .map(|name| record.field(name).unwrap_or_default().to_owned())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
