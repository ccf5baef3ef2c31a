//! # fleetsync-sync
//!
//! Spreadsheet reconciliation and the clients it talks to.
//!
//! Call [`pipeline::run_cycle`] to fetch the (cached) fleet records and merge
//! them into the destination worksheet, or use [`reconcile::reconcile`]
//! directly for the pure order-preserving merge.

pub mod auth;
pub mod datastore;
pub mod diff;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod reconcile;
pub mod sheet;
pub mod spreadsheet;
pub mod store;

pub use error::SyncError;
pub use reconcile::{reconcile, ReconcileReport};
pub use sheet::{SheetService, SheetsClient};
pub use spreadsheet::Spreadsheet;
pub use store::{FleetData, FleetSnapshot, JsonFileStore, StatusStore};
