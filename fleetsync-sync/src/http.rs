//! Shared HTTP plumbing for the external service clients.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::SyncError;

/// Connect and read timeout for every outbound call. A stuck call blocks its
/// own path until this fires; nothing else cancels it.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// One agent per process; clones share the connection pool.
pub fn agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(HTTP_TIMEOUT)
        .timeout_read(HTTP_TIMEOUT)
        .timeout_write(HTTP_TIMEOUT)
        .build()
}

pub(crate) fn service_err(service: &'static str, source: ureq::Error) -> SyncError {
    SyncError::Service {
        service,
        source: Box::new(source),
    }
}

/// Decode a JSON body, tagging failures with the service name.
pub(crate) fn read_json<T: DeserializeOwned>(
    service: &'static str,
    response: ureq::Response,
) -> Result<T, SyncError> {
    response
        .into_json::<T>()
        .map_err(|source| SyncError::Transport { service, source })
}
