//! Deployment documents and the identifiers they imply.
//!
//! Only the fields we read are modelled; everything else in a deployment is
//! ignored. A document may be a list (`{items: [...]}`), a bare array, or a
//! single deployment. YAML parsing covers JSON input too.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use fleetsync_core::{identifier::compose, EndpointLabels};

use crate::DeployError;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LabelSelector {
    #[serde(default, rename = "matchLabels")]
    pub match_labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeploymentSpec {
    #[serde(default)]
    pub selector: LabelSelector,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Deployment {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DeploymentSpec,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeploymentList {
    items: Vec<Deployment>,
}

/// Every document shape we accept. Order matters: a list object would also
/// deserialize as an (empty) single deployment.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ManifestDoc {
    List(DeploymentList),
    Array(Vec<Deployment>),
    Single(Deployment),
}

impl ManifestDoc {
    pub(crate) fn into_deployments(self) -> Vec<Deployment> {
        match self {
            ManifestDoc::List(list) => list.items,
            ManifestDoc::Array(items) => items,
            ManifestDoc::Single(one) => vec![one],
        }
    }
}

impl Deployment {
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("<unnamed>")
    }

    /// Endpoint labels from the selector. `rsync_module` wins over `module`
    /// when both are present.
    pub fn endpoint_labels(&self) -> Option<EndpointLabels> {
        let labels = &self.spec.selector.match_labels;
        let experiment = labels.get("experiment")?;
        let machine = labels.get("machine")?;
        let module = labels
            .get("rsync_module")
            .or_else(|| labels.get("module"))?;
        Some(EndpointLabels::new(experiment, machine, module))
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a manifest document. `origin` names the source in errors.
pub fn parse_manifest(text: &str, origin: &str) -> Result<Vec<Deployment>, DeployError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_yaml::from_str::<ManifestDoc>(text)
        .map(ManifestDoc::into_deployments)
        .map_err(|e| DeployError::Parse {
            origin: origin.to_owned(),
            message: e.to_string(),
        })
}

/// Identifiers of the deployments in `namespace`.
pub fn deployed_ids(deployments: &[Deployment], namespace: &str) -> HashSet<String> {
    deployments
        .iter()
        .filter(|d| d.metadata.namespace.as_deref() == Some(namespace))
        .filter_map(|d| match d.endpoint_labels() {
            Some(labels) => Some(compose(&labels)),
            None => {
                tracing::warn!(
                    deployment = d.name(),
                    "deployment selector lacks experiment/machine/rsync_module labels; skipping"
                );
                None
            }
        })
        .collect()
}
