//! `fleetsync deployed`: the resolved deployed identifier set.

use anyhow::{Context, Result};
use clap::Args;

use fleetsync_deploy::DeployedSetResolver;
use fleetsync_sync::http;

use super::GlobalOpts;

/// Arguments for `fleetsync deployed`.
#[derive(Args, Debug)]
pub struct DeployedArgs {
    /// Namespace whose deployments to list.
    #[arg(long)]
    pub datastore_namespace: Option<String>,

    /// Emit a JSON array.
    #[arg(long)]
    pub json: bool,
}

impl DeployedArgs {
    pub fn run(self, opts: &GlobalOpts) -> Result<()> {
        let mut cfg = opts.load_config()?;
        if let Some(namespace) = self.datastore_namespace {
            cfg.datastore_namespace = namespace;
        }
        if cfg.deployments.is_empty() {
            eprintln!("No deployment sources configured (`deployments:` in config).");
        }

        let resolver = DeployedSetResolver::new(
            cfg.deployments.clone(),
            http::agent(),
            cfg.deployment_cache_ttl(),
        );
        let namespace = &cfg.datastore_namespace;
        let set = resolver
            .resolve(namespace)
            .with_context(|| format!("failed to resolve deployments in '{namespace}'"))?;
        let mut ids: Vec<&String> = set.iter().collect();
        ids.sort();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&ids)?);
        } else {
            for id in ids {
                println!("{id}");
            }
        }
        Ok(())
    }
}
