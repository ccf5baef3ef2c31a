//! Endpoint identifier codec.
//!
//! Identifiers have the shape
//! `rsync://<experiment>.<machine>:<port>/<module>`, where `<machine>` is a
//! fleet node name such as `mlab4.prg01.measurement-lab.org`.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::DecodeError;
use crate::types::EndpointLabels;

/// Port the deployment registry describes for every rsync endpoint.
pub const REGISTRY_RSYNC_PORT: u16 = 7999;

const IDENTIFIER_PATTERN: &str = concat!(
    r"^rsync://(?P<experiment>.+)\.",
    r"(?P<machine>mlab\d\.[a-z]{3}\d[\dt]\.measurement-lab\.org)",
    r":\d*/(?P<module>.*)$",
);

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(IDENTIFIER_PATTERN).expect("identifier pattern is valid"))
}

/// Split an identifier into `(experiment, machine, module)`.
///
/// Any port is accepted, since the store records the externally observed one.
pub fn decompose(id: &str) -> Result<EndpointLabels, DecodeError> {
    let caps = identifier_regex()
        .captures(id)
        .ok_or_else(|| DecodeError::Identifier { id: id.to_owned() })?;
    Ok(EndpointLabels::new(
        &caps["experiment"],
        &caps["machine"],
        &caps["module"],
    ))
}

/// Build the canonical identifier for `labels` at [`REGISTRY_RSYNC_PORT`].
pub fn compose(labels: &EndpointLabels) -> String {
    format!(
        "rsync://{}.{}:{}/{}",
        labels.experiment, labels.machine, REGISTRY_RSYNC_PORT, labels.module
    )
}
