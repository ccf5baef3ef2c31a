//! fleetsync core library — status records, codecs, the timed cache, config.
//!
//! Public API surface:
//! - [`types`] — [`StatusRecord`], [`SpreadsheetState`], [`EndpointLabels`]
//! - [`identifier`] — decompose / compose endpoint identifiers
//! - [`timestamp`] — `x`-prefixed date parsing
//! - [`cache`] — [`TimedCache`] and its clocks
//! - [`config`] — [`SyncConfig`] load / validate
//! - [`error`] — [`DecodeError`], [`ConfigError`]

pub mod cache;
pub mod config;
pub mod error;
pub mod identifier;
pub mod timestamp;
pub mod types;

pub use cache::{Clock, ManualClock, SystemClock, TimedCache};
pub use config::{DeploymentSource, LogFormat, SyncConfig};
pub use error::{ConfigError, DecodeError};
pub use types::{EndpointLabels, SpreadsheetState, StatusRecord, FIELD_NAMES, ID_FIELD};
