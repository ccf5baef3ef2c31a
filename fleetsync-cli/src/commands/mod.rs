//! Subcommands and the wiring they share.

pub mod deployed;
pub mod diff;
pub mod run;
pub mod status;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use fleetsync_core::{config, SyncConfig};
use fleetsync_sync::{
    auth::{metadata_project_id, token_source_from_env},
    datastore::DatastoreStore,
    http, FleetData, JsonFileStore, SheetService, SheetsClient, Spreadsheet, StatusStore,
};

/// Flags accepted by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub store_file: Option<PathBuf>,
}

/// Overrides for where records come from and where they go.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Spreadsheet ID to keep in sync.
    #[arg(long)]
    pub spreadsheet: Option<String>,

    /// Worksheet (tab) name inside the spreadsheet.
    #[arg(long)]
    pub worksheet: Option<String>,

    /// Datastore namespace holding the status entities.
    #[arg(long)]
    pub datastore_namespace: Option<String>,
}

impl TargetArgs {
    pub fn apply(&self, cfg: &mut SyncConfig) {
        if let Some(spreadsheet) = &self.spreadsheet {
            cfg.spreadsheet = Some(spreadsheet.clone());
        }
        if let Some(worksheet) = &self.worksheet {
            cfg.worksheet = worksheet.clone();
        }
        if let Some(namespace) = &self.datastore_namespace {
            cfg.datastore_namespace = namespace.clone();
        }
    }
}

impl GlobalOpts {
    pub fn load_config(&self) -> Result<SyncConfig> {
        let cfg = match &self.config {
            Some(path) => config::load_from(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => config::load().context("failed to load ~/.fleetsync/config.yaml")?,
        };
        Ok(cfg)
    }

    /// The JSON file store when `--store-file` is given, else the datastore.
    pub fn status_store(
        &self,
        cfg: &SyncConfig,
        agent: &ureq::Agent,
    ) -> Result<Arc<dyn StatusStore>> {
        if let Some(path) = &self.store_file {
            return Ok(Arc::new(JsonFileStore::new(path)));
        }
        let project = match &cfg.datastore_project {
            Some(project) => project.clone(),
            None => metadata_project_id(agent)
                .context("no datastore_project configured and metadata server unavailable")?,
        };
        let tokens = token_source_from_env(agent);
        Ok(Arc::new(DatastoreStore::new(agent.clone(), tokens, project)))
    }
}

pub fn sheet_service(agent: &ureq::Agent) -> Result<Arc<dyn SheetService>> {
    let client = SheetsClient::new(agent.clone(), token_source_from_env(agent))
        .context("failed to build spreadsheet client")?;
    Ok(Arc::new(client))
}

/// Everything a one-shot sheet command needs.
pub struct SheetTarget {
    pub cfg: SyncConfig,
    pub fleet: FleetData,
    pub spreadsheet: Spreadsheet,
}

pub fn sheet_target(opts: &GlobalOpts, target: &TargetArgs) -> Result<SheetTarget> {
    let mut cfg = opts.load_config()?;
    target.apply(&mut cfg);
    cfg.validate()?;
    let spreadsheet_id = cfg.require_spreadsheet()?.to_owned();

    let agent = http::agent();
    let store = opts.status_store(&cfg, &agent)?;
    let spreadsheet = Spreadsheet::new(
        sheet_service(&agent)?,
        spreadsheet_id,
        cfg.worksheet.clone(),
    );
    Ok(SheetTarget {
        fleet: FleetData::new(cfg.fleet_cache_ttl(), store),
        spreadsheet,
        cfg,
    })
}
