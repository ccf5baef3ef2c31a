//! One worksheet of one spreadsheet: read, merge, write back.

use std::sync::Arc;

use serde_json::Value;

use fleetsync_core::{SpreadsheetState, StatusRecord, FIELD_NAMES};

use crate::error::SyncError;
use crate::reconcile::{reconcile, ReconcileReport};
use crate::sheet::SheetService;

/// Widest header we can address with single-letter columns.
pub const MAX_COLUMNS: usize = 26;

/// `0 -> 'A'`, `25 -> 'Z'`.
pub fn column_letter(index: usize) -> Option<char> {
    (index < MAX_COLUMNS).then(|| (b'A' + index as u8) as char)
}

pub struct Spreadsheet {
    service: Arc<dyn SheetService>,
    spreadsheet_id: String,
    worksheet: String,
}

impl Spreadsheet {
    pub fn new(
        service: Arc<dyn SheetService>,
        spreadsheet_id: impl Into<String>,
        worksheet: impl Into<String>,
    ) -> Self {
        Self {
            service,
            spreadsheet_id: spreadsheet_id.into(),
            worksheet: worksheet.into(),
        }
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn worksheet(&self) -> &str {
        &self.worksheet
    }

    /// Columns A through one past the canonical fields, so a single
    /// operator-added column at the end is read back and preserved.
    pub fn read_range(&self) -> String {
        let last = column_letter(FIELD_NAMES.len()).unwrap_or('Z');
        format!("{}!A:{last}", self.worksheet)
    }

    /// Exact rectangle covering the header plus `rows` rows.
    pub fn write_range(&self, state: &SpreadsheetState) -> Result<String, SyncError> {
        let last = state
            .header
            .len()
            .checked_sub(1)
            .and_then(column_letter)
            .ok_or_else(|| {
                SyncError::SyncFailure(format!(
                    "header has {} columns; supported range is 1..={MAX_COLUMNS}",
                    state.header.len()
                ))
            })?;
        Ok(format!("{}!A1:{last}{}", self.worksheet, state.rows.len() + 1))
    }

    /// Current header and rows, or `None` when the worksheet is empty.
    pub fn retrieve(&self) -> Result<Option<SpreadsheetState>, SyncError> {
        let range = self.read_range();
        let response = self.service.get_values(&self.spreadsheet_id, &range)?;
        let Some(values) = response.get("values") else {
            tracing::error!(range, "sheet read returned no values container");
            return Err(SyncError::Retrieval(format!("no values in response for {range}")));
        };
        let mut grid = parse_grid(values)?;
        if grid.is_empty() {
            tracing::warn!(worksheet = %self.worksheet, "no data found on spreadsheet");
            return Ok(None);
        }
        let header = grid.remove(0);
        if header.iter().all(|cell| cell.trim().is_empty()) {
            if grid.is_empty() {
                tracing::warn!(worksheet = %self.worksheet, "no data found on spreadsheet");
                return Ok(None);
            }
            tracing::error!(range, rows = grid.len(), "sheet has data rows under a blank header");
            return Err(SyncError::Retrieval(format!(
                "blank header row above {} data rows in {range}",
                grid.len()
            )));
        }
        Ok(Some(SpreadsheetState::new(header, grid)))
    }

    /// Retrieve and merge without writing.
    pub fn merge(
        &self,
        records: &[StatusRecord],
    ) -> Result<(Option<SpreadsheetState>, SpreadsheetState, ReconcileReport), SyncError> {
        let previous = self.retrieve()?;
        let (merged, report) = reconcile(records, previous.as_ref())?;
        Ok((previous, merged, report))
    }

    /// Overwrite the worksheet with `state`. Returns the acknowledged row
    /// count, which must match header plus rows.
    pub fn apply(&self, state: &SpreadsheetState) -> Result<usize, SyncError> {
        let range = self.write_range(state)?;
        let expected = state.rows.len() + 1;
        tracing::info!(range, rows = expected, "about to update range");
        let response =
            self.service
                .update_values(&self.spreadsheet_id, &range, &state.to_values())?;
        let updated = response
            .get("updatedRows")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        if updated != expected {
            tracing::error!(range, updated, expected, "sheet update not acknowledged");
            return Err(SyncError::SyncFailure(format!(
                "{range}: {updated} rows acknowledged, {expected} sent"
            )));
        }
        Ok(updated)
    }

    /// Merge `records` into the worksheet and write the result.
    pub fn update(&self, records: &[StatusRecord]) -> Result<ReconcileReport, SyncError> {
        let (_, merged, report) = self.merge(records)?;
        self.apply(&merged)?;
        Ok(report)
    }
}

impl std::fmt::Debug for Spreadsheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spreadsheet")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("worksheet", &self.worksheet)
            .finish_non_exhaustive()
    }
}

/// Sheets returns ragged rows of mixed scalars; flatten them to strings.
fn parse_grid(values: &Value) -> Result<Vec<Vec<String>>, SyncError> {
    let rows = values.as_array().ok_or_else(|| SyncError::Protocol {
        service: "sheets",
        message: "values is not an array".to_owned(),
    })?;
    rows.iter()
        .map(|row| {
            let cells = row.as_array().ok_or_else(|| SyncError::Protocol {
                service: "sheets",
                message: "row is not an array".to_owned(),
            })?;
            Ok(cells.iter().map(cell_text).collect())
        })
        .collect()
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
