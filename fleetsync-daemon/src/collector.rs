//! Fleet status as Prometheus gauges.
//!
//! [`project`] is the pure part: records plus the deployed set in, labelled
//! samples out. [`StatusCollector`] runs it on every scrape against the cached
//! fleet snapshot and deployed set.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Histogram, Opts};

use fleetsync_core::{identifier, timestamp, EndpointLabels, StatusRecord};
use fleetsync_deploy::DeployedSetResolver;
use fleetsync_sync::FleetData;

pub const LAST_SUCCESS: &str = "scraper_lastsuccessfulcollection";
pub const LAST_ATTEMPT: &str = "scraper_lastcollectionattempt";
pub const MAX_RAW_FILE_TIME: &str = "scraper_maxrawfiletimearchived";

pub const LABEL_NAMES: [&str; 3] = ["experiment", "machine", "module"];

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: EndpointLabels,
    pub value: f64,
}

/// Samples for the three gauge families.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectedMetrics {
    pub last_success: Vec<Sample>,
    pub last_attempt: Vec<Sample>,
    pub max_raw_file_time: Vec<Sample>,
}

impl ProjectedMetrics {
    pub fn families(&self) -> [(&'static str, &[Sample]); 3] {
        [
            (LAST_SUCCESS, &self.last_success),
            (LAST_ATTEMPT, &self.last_attempt),
            (MAX_RAW_FILE_TIME, &self.max_raw_file_time),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.families().iter().all(|(_, samples)| samples.is_empty())
    }
}

/// Turn deployed records into gauge samples.
///
/// Records outside `deployed` are dropped. A record with an undecodable
/// identifier is logged and skipped; an undecodable field drops only that
/// sample.
pub fn project(records: &[StatusRecord], deployed: &HashSet<String>) -> ProjectedMetrics {
    let mut metrics = ProjectedMetrics::default();
    for record in records.iter().filter(|r| deployed.contains(r.id())) {
        let labels = match identifier::decompose(record.id()) {
            Ok(labels) => labels,
            Err(err) => {
                tracing::error!(%err, "bad rsync url");
                continue;
            }
        };
        if let Some(ts) = timestamp::parse_encoded_timestamp(record.last_successful_collection()) {
            metrics.last_success.push(Sample {
                labels: labels.clone(),
                value: ts as f64,
            });
        }
        if let Some(ts) = timestamp::parse_encoded_timestamp(record.last_collection_attempt()) {
            metrics.last_attempt.push(Sample {
                labels: labels.clone(),
                value: ts as f64,
            });
        }
        if let Ok(mtime) = record.max_raw_file_mtime_archived().trim().parse::<i64>() {
            metrics.max_raw_file_time.push(Sample {
                labels,
                value: mtime as f64,
            });
        }
    }
    metrics
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

/// Pulls the cached fleet on each scrape. Upstream failures are logged and
/// leave the families empty; the scrape itself never fails.
pub struct StatusCollector {
    fleet: Arc<FleetData>,
    deployed: Arc<DeployedSetResolver>,
    namespace: String,
    collect_time: Histogram,
    gauges: [GaugeVec; 3],
    // Serializes reset/set/collect so concurrent scrapes never interleave.
    scrape: Mutex<()>,
}

impl StatusCollector {
    pub fn new(
        fleet: Arc<FleetData>,
        deployed: Arc<DeployedSetResolver>,
        namespace: impl Into<String>,
        collect_time: Histogram,
    ) -> Result<Self, prometheus::Error> {
        let gauges = [
            GaugeVec::new(
                Opts::new(LAST_SUCCESS, "Time of the last successful collection"),
                &LABEL_NAMES,
            )?,
            GaugeVec::new(
                Opts::new(LAST_ATTEMPT, "Time of the last collection attempt"),
                &LABEL_NAMES,
            )?,
            GaugeVec::new(
                Opts::new(MAX_RAW_FILE_TIME, "Time before which files may be deleted"),
                &LABEL_NAMES,
            )?,
        ];
        Ok(Self {
            fleet,
            deployed,
            namespace: namespace.into(),
            collect_time,
            gauges,
            scrape: Mutex::new(()),
        })
    }

    fn current(&self) -> ProjectedMetrics {
        let records = match self.fleet.get(&self.namespace) {
            Ok(records) => records,
            Err(err) => {
                tracing::error!(%err, "unable to retrieve fleet data for metrics");
                return ProjectedMetrics::default();
            }
        };
        let deployed = match self.deployed.resolve(&self.namespace) {
            Ok(deployed) => deployed,
            Err(err) => {
                tracing::error!(%err, "unable to resolve deployed endpoints for metrics");
                return ProjectedMetrics::default();
            }
        };
        project(&records, &deployed)
    }
}

impl Collector for StatusCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.gauges.iter().flat_map(|gauge| gauge.desc()).collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let _timer = self.collect_time.start_timer();
        let metrics = self.current();

        let _guard = self.scrape.lock().unwrap_or_else(PoisonError::into_inner);
        let mut families = Vec::new();
        for (gauge, (_, samples)) in self.gauges.iter().zip(metrics.families()) {
            gauge.reset();
            for sample in samples {
                gauge
                    .with_label_values(&sample.labels.values())
                    .set(sample.value);
            }
            families.extend(gauge.collect());
        }
        families
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
