//! `fleetsync run`: the long-running service.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use fleetsync_core::LogFormat;
use fleetsync_daemon::{start_blocking, Daemon};
use fleetsync_sync::http;

use super::{sheet_service, GlobalOpts, TargetArgs};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

/// Arguments for `fleetsync run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Mean seconds between sync runs (exponentially distributed).
    #[arg(long)]
    pub expected_upload_interval: Option<f64>,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long)]
    pub prometheus_port: Option<u16>,

    /// Port for the status page and JSON endpoint.
    #[arg(long)]
    pub webserver_port: Option<u16>,

    #[arg(long, value_enum)]
    pub log_format: Option<LogFormatArg>,
}

impl RunArgs {
    pub fn run(self, opts: &GlobalOpts) -> Result<()> {
        let mut cfg = opts.load_config()?;
        self.target.apply(&mut cfg);
        if let Some(interval) = self.expected_upload_interval {
            cfg.expected_upload_interval_secs = interval;
        }
        if let Some(port) = self.prometheus_port {
            cfg.prometheus_port = port;
        }
        if let Some(port) = self.webserver_port {
            cfg.webserver_port = port;
        }
        if let Some(format) = self.log_format {
            cfg.log_format = format.into();
        }
        cfg.validate()?;
        cfg.require_spreadsheet()?;

        fleetsync_daemon::init_tracing(cfg.log_format);
        let agent = http::agent();
        let store = opts.status_store(&cfg, &agent)?;
        let sheets = sheet_service(&agent)?;
        let daemon = Daemon::new(cfg, store, sheets, agent).context("failed to start daemon")?;
        start_blocking(daemon).context("daemon exited with an error")
    }
}
