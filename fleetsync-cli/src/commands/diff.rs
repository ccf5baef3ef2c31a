//! `fleetsync diff`: unified diff of what the next sync would write.

use anyhow::{Context, Result};
use clap::Args;

use fleetsync_sync::{diff::sheet_diff, pipeline};

use super::{sheet_target, GlobalOpts, TargetArgs};

/// Arguments for `fleetsync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

impl DiffArgs {
    pub fn run(self, opts: &GlobalOpts) -> Result<()> {
        let target = sheet_target(opts, &self.target)?;
        let worksheet = target.spreadsheet.worksheet();
        let preview = pipeline::preview_cycle(
            &target.fleet,
            &target.spreadsheet,
            &target.cfg.datastore_namespace,
        )
        .with_context(|| format!("diff failed for '{worksheet}'"))?;

        let diff = sheet_diff(worksheet, preview.previous.as_ref(), &preview.merged);
        if diff.is_empty() {
            println!("No differences for '{worksheet}'.");
            return Ok(());
        }
        print!("{diff}");
        if !diff.ends_with('\n') {
            println!();
        }
        Ok(())
    }
}
