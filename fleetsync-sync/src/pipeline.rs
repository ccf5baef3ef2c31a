//! One sync cycle: fleet snapshot in, merged worksheet out.

use serde::Serialize;

use fleetsync_core::SpreadsheetState;

use crate::error::SyncError;
use crate::reconcile::ReconcileReport;
use crate::spreadsheet::Spreadsheet;
use crate::store::FleetData;

#[derive(Debug, Clone, Serialize)]
pub struct CycleOutcome {
    pub records: usize,
    pub report: ReconcileReport,
    /// `false` for a dry run.
    pub written: bool,
}

/// Fetch the (cached) records for `namespace` and merge them into `sheet`.
pub fn run_cycle(
    fleet: &FleetData,
    sheet: &Spreadsheet,
    namespace: &str,
) -> Result<CycleOutcome, SyncError> {
    let records = fleet.get(namespace)?;
    let report = sheet.update(&records)?;
    tracing::info!(
        records = records.len(),
        updated = report.updated,
        retained = report.retained,
        appended = report.appended,
        "spreadsheet synced"
    );
    Ok(CycleOutcome {
        records: records.len(),
        report,
        written: true,
    })
}

/// A dry run: the merge result plus what the sheet held before.
#[derive(Debug, Clone)]
pub struct Preview {
    pub outcome: CycleOutcome,
    pub previous: Option<SpreadsheetState>,
    pub merged: SpreadsheetState,
}

/// Compute what [`run_cycle`] would write without writing it.
pub fn preview_cycle(
    fleet: &FleetData,
    sheet: &Spreadsheet,
    namespace: &str,
) -> Result<Preview, SyncError> {
    let records = fleet.get(namespace)?;
    let (previous, merged, report) = sheet.merge(&records)?;
    Ok(Preview {
        outcome: CycleOutcome {
            records: records.len(),
            report,
            written: false,
        },
        previous,
        merged,
    })
}
