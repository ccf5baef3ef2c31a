//! Long-running fleetsync service: the sync loop, the status page and the
//! metrics endpoint, sharing one fleet cache.

pub mod collector;
pub mod error;
pub mod runtime;
pub mod schedule;
pub mod telemetry;
pub mod web;

pub use error::DaemonError;
pub use runtime::{init_tracing, start_blocking, Daemon};
pub use telemetry::Telemetry;
