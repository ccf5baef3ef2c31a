use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use fleetsync_core::{LogFormat, SyncConfig, SystemClock};
use fleetsync_deploy::DeployedSetResolver;
use fleetsync_render::StatusPage;
use fleetsync_sync::{
    pipeline::{self, CycleOutcome},
    FleetData, SheetService, Spreadsheet, StatusStore, SyncError,
};

use crate::collector::StatusCollector;
use crate::error::{io_err, DaemonError};
use crate::schedule::SleepPolicy;
use crate::telemetry::{request, timed, Telemetry, SYNC_SUCCESS};
use crate::web::{metrics_router, status_router, WebState};

/// Everything the loop and the servers share, wired from one config.
pub struct Daemon {
    config: SyncConfig,
    telemetry: Arc<Telemetry>,
    fleet: Arc<FleetData>,
    deployed: Arc<DeployedSetResolver>,
    spreadsheet: Arc<Spreadsheet>,
    page: Arc<StatusPage>,
}

impl Daemon {
    /// Validate `config` and wire the caches, collector and page.
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn StatusStore>,
        sheets: Arc<dyn SheetService>,
        agent: ureq::Agent,
    ) -> Result<Self, DaemonError> {
        config.validate()?;
        let spreadsheet_id = config.require_spreadsheet()?.to_owned();

        let telemetry = Arc::new(Telemetry::new()?);
        let fleet = Arc::new(FleetData::from_operation(
            config.fleet_cache_ttl(),
            Arc::new(SystemClock),
            timed(telemetry.datastore_time.clone(), move |namespace: &String| {
                store.fetch_statuses(namespace)
            }),
        ));
        let deployed = Arc::new(DeployedSetResolver::new(
            config.deployments.clone(),
            agent,
            config.deployment_cache_ttl(),
        ));
        let collector = StatusCollector::new(
            fleet.clone(),
            deployed.clone(),
            config.datastore_namespace.clone(),
            telemetry.request(request::COLLECT),
        )?;
        telemetry.register(Box::new(collector))?;

        let spreadsheet = Arc::new(Spreadsheet::new(
            sheets,
            spreadsheet_id,
            config.worksheet.clone(),
        ));

        Ok(Self {
            config,
            telemetry,
            fleet,
            deployed,
            spreadsheet,
            page: Arc::new(StatusPage::new()?),
        })
    }

    pub fn telemetry(&self) -> &Arc<Telemetry> {
        &self.telemetry
    }

    pub fn deployed(&self) -> &Arc<DeployedSetResolver> {
        &self.deployed
    }

    pub fn status_router(&self) -> axum::Router {
        status_router(WebState {
            fleet: self.fleet.clone(),
            page: self.page.clone(),
            telemetry: self.telemetry.clone(),
            namespace: Arc::from(self.config.datastore_namespace.as_str()),
        })
    }

    pub fn metrics_router(&self) -> axum::Router {
        metrics_router(self.telemetry.clone())
    }

    /// One timed sync cycle on the blocking pool, counted by outcome.
    pub async fn sync_once(&self) -> Result<CycleOutcome, SyncError> {
        let fleet = self.fleet.clone();
        let spreadsheet = self.spreadsheet.clone();
        let namespace = self.config.datastore_namespace.clone();
        let runtime = self.telemetry.sync_runtime.clone();

        let joined = tokio::task::spawn_blocking(move || {
            let _timer = runtime.start_timer();
            pipeline::run_cycle(&fleet, &spreadsheet, &namespace)
        })
        .await;

        let result = match joined {
            Ok(result) => result,
            Err(err) => Err(SyncError::SyncFailure(format!("sync task failed: {err}"))),
        };
        match &result {
            Ok(_) => self.telemetry.record_outcome(SYNC_SUCCESS),
            Err(err) => {
                tracing::error!(%err, "sync failed");
                self.telemetry.record_outcome(err.outcome_label());
            }
        }
        result
    }

    /// Run the sync loop and both servers until ctrl-c or a task fails.
    pub async fn run(self) -> Result<(), DaemonError> {
        let daemon = Arc::new(self);
        let (shutdown_tx, _) = broadcast::channel::<()>(16);

        let status_listener = bind(daemon.config.webserver_port).await?;
        let metrics_listener = bind(daemon.config.prometheus_port).await?;

        let status_handle = {
            let shutdown = shutdown_tx.clone();
            let router = daemon.status_router();
            tokio::spawn(async move {
                let result = serve("status", status_listener, router, shutdown.subscribe()).await;
                let _ = shutdown.send(());
                result
            })
        };

        let metrics_handle = {
            let shutdown = shutdown_tx.clone();
            let router = daemon.metrics_router();
            tokio::spawn(async move {
                let result = serve("metrics", metrics_listener, router, shutdown.subscribe()).await;
                let _ = shutdown.send(());
                result
            })
        };

        let sync_handle = {
            let shutdown = shutdown_tx.clone();
            let daemon = daemon.clone();
            tokio::spawn(async move {
                let result = sync_loop(daemon, shutdown.subscribe()).await;
                let _ = shutdown.send(());
                result
            })
        };

        let signal_handle = {
            let shutdown = shutdown_tx.clone();
            tokio::spawn(async move {
                let mut shutdown_rx = shutdown.subscribe();
                tokio::select! {
                    _ = shutdown_rx.recv() => Ok(()),
                    signal = tokio::signal::ctrl_c() => {
                        match signal {
                            Ok(()) => {
                                tracing::info!("received ctrl-c, shutting down");
                                let _ = shutdown.send(());
                                Ok(())
                            }
                            Err(err) => Err(DaemonError::Task(format!(
                                "ctrl-c handler failed: {err}"
                            ))),
                        }
                    }
                }
            })
        };

        let (status_result, metrics_result, sync_result, signal_result) =
            tokio::join!(status_handle, metrics_handle, sync_handle, signal_handle);

        handle_join("status_server", status_result)?;
        handle_join("metrics_server", metrics_result)?;
        handle_join("sync_loop", sync_result)?;
        handle_join("signal_handler", signal_result)?;
        Ok(())
    }
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("config", &self.config)
            .field("spreadsheet", &self.spreadsheet)
            .finish_non_exhaustive()
    }
}

/// Start the daemon and block the current thread until it exits.
///
/// Call [`init_tracing`] first; the daemon logs but never installs a
/// subscriber itself.
pub fn start_blocking(daemon: Daemon) -> Result<(), DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(daemon.run())
}

/// Fetch, reconcile, sleep; forever. Cycle failures are logged and counted,
/// never fatal.
async fn sync_loop(
    daemon: Arc<Daemon>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let policy = SleepPolicy::new(
        daemon.config.expected_upload_interval_secs,
        daemon.config.max_sleep_secs,
    );
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = daemon.sync_once() => {}
        }

        let sleep = policy.next_sleep();
        tracing::info!("sleeping for {:.3} seconds", sleep.as_secs_f64());
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tokio::time::sleep(sleep) => {
                daemon.telemetry.sync_sleep.observe(sleep.as_secs_f64());
            }
        }
    }
    Ok(())
}

async fn bind(port: u16) -> Result<TcpListener, DaemonError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr)
        .await
        .map_err(|e| io_err(addr.to_string(), e))
}

async fn serve(
    name: &'static str,
    listener: TcpListener,
    router: axum::Router,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let addr = listener
        .local_addr()
        .map_err(|e| io_err(format!("{name} listener"), e))?;
    tracing::info!(%addr, "{name} server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .map_err(|e| io_err(format!("{name} server {addr}"), e))
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Task(format!("{task} task join failure: {err}"))),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = match format {
        LogFormat::Text => fmt().with_env_filter(filter).with_target(false).try_init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetsync_core::StatusRecord;
    use fleetsync_sync::store::JsonFileStore;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySheet {
        grid: Mutex<Vec<Vec<String>>>,
    }

    impl SheetService for MemorySheet {
        fn get_values(&self, _id: &str, _range: &str) -> Result<Value, SyncError> {
            Ok(json!({ "values": *self.grid.lock().unwrap() }))
        }

        fn update_values(
            &self,
            _id: &str,
            _range: &str,
            values: &[Vec<String>],
        ) -> Result<Value, SyncError> {
            *self.grid.lock().unwrap() = values.to_vec();
            Ok(json!({ "updatedRows": values.len() }))
        }
    }

    fn config() -> SyncConfig {
        SyncConfig {
            spreadsheet: Some("sheet".into()),
            ..SyncConfig::default()
        }
    }

    fn store_file(dir: &tempfile::TempDir, records: &[StatusRecord]) -> Arc<dyn StatusStore> {
        let path = dir.path().join("fleet.json");
        std::fs::write(&path, serde_json::to_string(records).expect("json")).expect("write");
        Arc::new(JsonFileStore::new(path))
    }

    #[test]
    fn missing_spreadsheet_is_rejected_at_startup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Daemon::new(
            SyncConfig::default(),
            store_file(&dir, &[]),
            Arc::new(MemorySheet::default()),
            ureq::agent(),
        )
        .unwrap_err();
        assert!(matches!(err, DaemonError::Config(_)), "got: {err}");
    }

    #[tokio::test]
    async fn sync_once_writes_sheet_and_counts_success() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sheet = Arc::new(MemorySheet::default());
        let daemon = Daemon::new(
            config(),
            store_file(
                &dir,
                &[StatusRecord::new("rsync://a").with_field("contact", "ops")],
            ),
            sheet.clone(),
            ureq::agent(),
        )
        .expect("daemon");

        let outcome = daemon.sync_once().await.expect("cycle");
        assert_eq!(outcome.report.appended, 1);
        assert_eq!(sheet.grid.lock().unwrap().len(), 2);

        let telemetry = daemon.telemetry();
        assert_eq!(
            telemetry.sync_outcomes.with_label_values(&[SYNC_SUCCESS]).get(),
            1
        );
        assert_eq!(telemetry.sync_runtime.get_sample_count(), 1);
        assert_eq!(telemetry.datastore_time.get_sample_count(), 1);
    }

    #[tokio::test]
    async fn failed_cycle_is_counted_by_outcome() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn StatusStore> =
            Arc::new(JsonFileStore::new(dir.path().join("absent.json")));
        let daemon = Daemon::new(config(), store, Arc::new(MemorySheet::default()), ureq::agent())
            .expect("daemon");

        assert!(daemon.sync_once().await.is_err());
        assert_eq!(
            daemon
                .telemetry()
                .sync_outcomes
                .with_label_values(&["io_error"])
                .get(),
            1
        );
    }
}
