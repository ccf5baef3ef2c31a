//! Process telemetry: sync timings, outcomes, request latency.
//!
//! Everything lives in one [`Registry`] owned by [`Telemetry`]; the fleet
//! gauges are added to it by [`crate::collector::StatusCollector`].

use prometheus::core::Collector;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::error::DaemonError;

/// Buckets sized for rsync runs and sleeps, from seconds to two hours.
pub const TIME_BUCKETS: &[f64] = &[
    0.0, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0, 7200.0,
];

/// `message` label values for [`Telemetry::request_time`].
pub mod request {
    pub const JSON: &str = "json";
    pub const ROOT_URL: &str = "root_url";
    pub const COLLECT: &str = "collect";
    pub const ERROR: &str = "error";
}

/// `message` label value for a successful sync cycle.
pub const SYNC_SUCCESS: &str = "success";

pub struct Telemetry {
    registry: Registry,
    pub sync_runtime: Histogram,
    pub sync_sleep: Histogram,
    pub sync_outcomes: IntCounterVec,
    pub request_time: HistogramVec,
    pub datastore_time: Histogram,
}

impl Telemetry {
    pub fn new() -> Result<Self, DaemonError> {
        let registry = Registry::new();

        let sync_runtime = Histogram::with_opts(
            HistogramOpts::new("spreadsheet_sync_runtime_seconds", "How long each sheet sync took")
                .buckets(TIME_BUCKETS.to_vec()),
        )?;
        let sync_sleep = Histogram::with_opts(
            HistogramOpts::new(
                "spreadsheet_sync_sleep_time_seconds",
                "Sleep time between sheet update runs (should be an exp distribution)",
            )
            .buckets(TIME_BUCKETS.to_vec()),
        )?;
        let sync_outcomes = IntCounterVec::new(
            Opts::new(
                "spreadsheet_sync_success",
                "How many times the sheet update succeeded and failed",
            ),
            &["message"],
        )?;
        let request_time = HistogramVec::new(
            HistogramOpts::new("request_time_seconds", "Running time of web server requests"),
            &["message"],
        )?;
        let datastore_time = Histogram::with_opts(HistogramOpts::new(
            "datastore_time_seconds",
            "Running time of datastore requests",
        ))?;

        registry.register(Box::new(sync_runtime.clone()))?;
        registry.register(Box::new(sync_sleep.clone()))?;
        registry.register(Box::new(sync_outcomes.clone()))?;
        registry.register(Box::new(request_time.clone()))?;
        registry.register(Box::new(datastore_time.clone()))?;

        Ok(Self {
            registry,
            sync_runtime,
            sync_sleep,
            sync_outcomes,
            request_time,
            datastore_time,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn register(&self, collector: Box<dyn Collector>) -> Result<(), DaemonError> {
        Ok(self.registry.register(collector)?)
    }

    /// Latency histogram for one request kind (see [`request`]).
    pub fn request(&self, message: &str) -> Histogram {
        self.request_time.with_label_values(&[message])
    }

    pub fn record_outcome(&self, message: &str) {
        self.sync_outcomes.with_label_values(&[message]).inc();
    }

    /// Gather every family and encode it in the Prometheus text format.
    pub fn encode(&self) -> Result<String, DaemonError> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| DaemonError::Task(format!("metrics not UTF-8: {e}")))
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry").finish_non_exhaustive()
    }
}

/// Wrap `operation` so each call is observed in `histogram`.
pub fn timed<K, R, F>(
    histogram: Histogram,
    operation: F,
) -> impl Fn(&K) -> R + Send + Sync + 'static
where
    K: ?Sized + 'static,
    R: 'static,
    F: Fn(&K) -> R + Send + Sync + 'static,
{
    move |key: &K| {
        let _timer = histogram.start_timer();
        operation(key)
    }
}
