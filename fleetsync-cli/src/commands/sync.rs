//! `fleetsync sync`: one reconcile cycle.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use fleetsync_sync::{pipeline, ReconcileReport};

use super::{sheet_target, GlobalOpts, TargetArgs};

/// Arguments for `fleetsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Read and merge, but do not write the spreadsheet.
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    pub fn run(self, opts: &GlobalOpts) -> Result<()> {
        let target = sheet_target(opts, &self.target)?;
        let namespace = &target.cfg.datastore_namespace;
        let worksheet = target.spreadsheet.worksheet();

        if self.dry_run {
            let preview = pipeline::preview_cycle(&target.fleet, &target.spreadsheet, namespace)
                .with_context(|| format!("dry run failed for '{worksheet}'"))?;
            println!(
                "{} {}",
                "[dry-run]".yellow(),
                summary(worksheet, preview.outcome.records, &preview.outcome.report)
            );
            return Ok(());
        }

        let outcome = pipeline::run_cycle(&target.fleet, &target.spreadsheet, namespace)
            .with_context(|| format!("sync failed for '{worksheet}'"))?;
        println!("{}", summary(worksheet, outcome.records, &outcome.report).green());
        Ok(())
    }
}

fn summary(worksheet: &str, records: usize, report: &ReconcileReport) -> String {
    let mut line = format!(
        "{worksheet}: {records} records, {} updated, {} retained, {} appended",
        report.updated, report.retained, report.appended
    );
    if report.bootstrapped {
        line.push_str(" (header written)");
    }
    line
}
