//! Unified diff between the current worksheet and a merge result.

use similar::TextDiff;

use fleetsync_core::SpreadsheetState;

/// One line per row, cells separated by tabs.
fn render(state: Option<&SpreadsheetState>) -> String {
    let Some(state) = state else {
        return String::new();
    };
    state
        .to_values()
        .iter()
        .map(|row| format!("{}\n", row.join("\t")))
        .collect()
}

/// Unified diff of `previous` against `merged`; empty when identical.
pub fn sheet_diff(
    worksheet: &str,
    previous: Option<&SpreadsheetState>,
    merged: &SpreadsheetState,
) -> String {
    let old = render(previous);
    let new = render(Some(merged));
    if old == new {
        return String::new();
    }
    TextDiff::from_lines(&old, &new)
        .unified_diff()
        .context_radius(2)
        .header(&format!("a/{worksheet}"), &format!("b/{worksheet}"))
        .to_string()
}
