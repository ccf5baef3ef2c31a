//! `fleetsync status`: one read of the fleet records.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::json;
use tabled::{settings::Style, Table, Tabled};

use fleetsync_core::{timestamp, StatusRecord};
use fleetsync_sync::{http, store::filter_by_id};

use super::GlobalOpts;

/// Arguments for `fleetsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show endpoints whose identifier contains this substring.
    #[arg(long)]
    pub filter: Option<String>,

    /// Datastore namespace holding the status entities.
    #[arg(long)]
    pub datastore_namespace: Option<String>,

    /// Emit `{"result": [...]}` JSON, as served on /json_status.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "endpoint")]
    endpoint: String,
    #[tabled(rename = "contact")]
    contact: String,
    #[tabled(rename = "last success")]
    last_success: String,
    #[tabled(rename = "last attempt")]
    last_attempt: String,
    #[tabled(rename = "errors")]
    errors: String,
    #[tabled(rename = "max raw mtime")]
    max_raw: String,
}

impl StatusArgs {
    pub fn run(self, opts: &GlobalOpts) -> Result<()> {
        let mut cfg = opts.load_config()?;
        if let Some(namespace) = self.datastore_namespace {
            cfg.datastore_namespace = namespace;
        }
        let agent = http::agent();
        let store = opts.status_store(&cfg, &agent)?;
        let namespace = &cfg.datastore_namespace;
        let records = store.fetch_statuses(namespace).with_context(|| {
            format!("failed to fetch status records from namespace '{namespace}'")
        })?;
        let mut records = filter_by_id(&records, self.filter.as_deref().unwrap_or_default());
        records.sort();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&json!({ "result": records }))?);
            return Ok(());
        }
        print_table(&records);
        Ok(())
    }
}

fn print_table(records: &[StatusRecord]) {
    let failing = records
        .iter()
        .filter(|r| !r.error_since_last_successful().is_empty())
        .count();
    println!(
        "fleetsync v{} | {} endpoints | {} with errors",
        env!("CARGO_PKG_VERSION"),
        records.len(),
        failing,
    );
    if records.is_empty() {
        println!("No status records.");
        return;
    }

    let rows: Vec<StatusTableRow> = records
        .iter()
        .map(|r| StatusTableRow {
            endpoint: r.id().to_owned(),
            contact: r.contact().to_owned(),
            last_success: timestamp_cell(r.last_successful_collection()),
            last_attempt: timestamp_cell(r.last_collection_attempt()),
            errors: if r.error_since_last_successful().is_empty() {
                String::new()
            } else {
                r.error_since_last_successful().red().to_string()
            },
            max_raw: r.max_raw_file_mtime_archived().to_owned(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

/// Raw value, dimmed when it does not parse as an `x`-prefixed date.
fn timestamp_cell(raw: &str) -> String {
    match timestamp::parse_encoded_timestamp(raw) {
        Some(_) => raw.to_owned(),
        None if raw.is_empty() => String::new(),
        None => raw.bright_black().to_string(),
    }
}
