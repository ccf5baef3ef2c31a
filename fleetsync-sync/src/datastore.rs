//! Cloud Datastore REST client for the scraper status entities.
//!
//! Issues `projects/{project}:runQuery` for kind [`STATUS_KIND`] in the
//! configured namespace and follows `endCursor` until the batch reports no
//! more results. Each entity becomes one [`StatusRecord`]: the key name is the
//! identifier and the properties fill the remaining fields.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use fleetsync_core::StatusRecord;

use crate::auth::TokenSource;
use crate::error::SyncError;
use crate::http::{read_json, service_err};
use crate::store::StatusStore;

pub const STATUS_KIND: &str = "dropboxrsyncaddress";
pub const DATASTORE_BASE: &str = "https://datastore.googleapis.com/v1";

/// Upper bound on pages per fetch; a cursor that never advances stops here.
const MAX_PAGES: usize = 1000;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryResponse {
    pub batch: QueryResultBatch,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResultBatch {
    #[serde(default)]
    pub entity_results: Vec<EntityResult>,
    #[serde(default)]
    pub end_cursor: Option<String>,
    #[serde(default)]
    pub more_results: String,
}

#[derive(Debug, Deserialize)]
pub struct EntityResult {
    pub entity: Entity,
}

#[derive(Debug, Deserialize)]
pub struct Entity {
    pub key: Key,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Key {
    #[serde(default)]
    pub path: Vec<PathElement>,
}

#[derive(Debug, Deserialize)]
pub struct PathElement {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

/// A property value. Only scalar kinds are read; anything else renders empty.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Value {
    pub string_value: Option<String>,
    pub integer_value: Option<String>,
    pub double_value: Option<f64>,
    pub boolean_value: Option<bool>,
    pub timestamp_value: Option<String>,
}

impl Value {
    fn render(&self) -> String {
        if let Some(s) = &self.string_value {
            s.clone()
        } else if let Some(i) = &self.integer_value {
            i.clone()
        } else if let Some(d) = self.double_value {
            d.to_string()
        } else if let Some(b) = self.boolean_value {
            b.to_string()
        } else if let Some(t) = &self.timestamp_value {
            t.clone()
        } else {
            String::new()
        }
    }
}

impl Entity {
    /// Convert to a record, or `None` if the key has no usable last element.
    pub fn to_record(&self) -> Option<StatusRecord> {
        let last = self.key.path.last()?;
        let id = last.name.clone().or_else(|| last.id.clone())?;
        Some(StatusRecord::from_pairs(
            id,
            self.properties
                .iter()
                .map(|(name, value)| (name.as_str(), value.render())),
        ))
    }
}

impl QueryResultBatch {
    /// Records in this batch and the cursor to continue from, if any.
    pub fn into_page(self) -> (Vec<StatusRecord>, Option<String>) {
        let records = self
            .entity_results
            .iter()
            .filter_map(|result| {
                let record = result.entity.to_record();
                if record.is_none() {
                    tracing::warn!("skipping status entity with an incomplete key");
                }
                record
            })
            .collect();
        let next = match self.more_results.as_str() {
            "NOT_FINISHED" => self.end_cursor,
            _ => None,
        };
        (records, next)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct DatastoreStore {
    agent: ureq::Agent,
    tokens: Arc<dyn TokenSource>,
    project: String,
    base_url: String,
}

impl DatastoreStore {
    pub fn new(
        agent: ureq::Agent,
        tokens: Arc<dyn TokenSource>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            agent,
            tokens,
            project: project.into(),
            base_url: DATASTORE_BASE.to_owned(),
        }
    }

    /// Point at an emulator or proxy instead of the public endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn run_query(
        &self,
        namespace: &str,
        cursor: Option<&str>,
    ) -> Result<QueryResultBatch, SyncError> {
        let mut query = json!({ "kind": [{ "name": STATUS_KIND }] });
        if let Some(cursor) = cursor {
            query["startCursor"] = json!(cursor);
        }
        let body = json!({
            "partitionId": { "projectId": self.project, "namespaceId": namespace },
            "query": query,
        });
        let url = format!("{}/projects/{}:runQuery", self.base_url, self.project);
        let token = self.tokens.access_token()?;
        let response = self
            .agent
            .post(&url)
            .set("Authorization", &format!("Bearer {token}"))
            .send_json(body)
            .map_err(|e| service_err("datastore", e))?;
        let parsed: RunQueryResponse = read_json("datastore", response)?;
        Ok(parsed.batch)
    }
}

impl std::fmt::Debug for DatastoreStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatastoreStore")
            .field("project", &self.project)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl StatusStore for DatastoreStore {
    fn fetch_statuses(&self, namespace: &str) -> Result<Vec<StatusRecord>, SyncError> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let batch = self.run_query(namespace, cursor.as_deref())?;
            let (page, next) = batch.into_page();
            let exhausted = page.is_empty();
            records.extend(page);
            match next {
                Some(next) if !exhausted && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next)
                }
                _ => break,
            }
        }
        tracing::debug!(namespace, count = records.len(), "fetched status entities");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(json: &str) -> QueryResultBatch {
        serde_json::from_str::<RunQueryResponse>(json)
            .expect("parse")
            .batch
    }

    #[test]
    fn entity_properties_become_record_fields() {
        let (records, next) = batch(
            r#"{"batch": {
                "entityResults": [{"entity": {
                    "key": {"partitionId": {"namespaceId": "scraper"},
                            "path": [{"kind": "dropboxrsyncaddress",
                                      "name": "rsync://utility.mlab.mlab4.prg01.measurement-lab.org:7999/switch"}]},
                    "properties": {
                        "maxrawfilemtimearchived": {"integerValue": "1490746201"},
                        "lastsuccessfulcollection": {"stringValue": "x2017-03-28"},
                        "contact": {"nullValue": null},
                        "blob": {"arrayValue": {"values": []}}
                    }}}],
                "endCursor": "CiQS",
                "moreResults": "NO_MORE_RESULTS"}}"#,
        )
        .into_page();

        assert_eq!(next, None);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert!(record.id().ends_with(":7999/switch"));
        assert_eq!(record.max_raw_file_mtime_archived(), "1490746201");
        assert_eq!(record.last_successful_collection(), "x2017-03-28");
        assert_eq!(record.contact(), "");
    }

    #[test]
    fn not_finished_batch_yields_cursor() {
        let (records, next) = batch(
            r#"{"batch": {"entityResults": [{"entity": {"key": {"path": [{"kind": "k", "name": "a"}]}}}],
                          "endCursor": "abc", "moreResults": "NOT_FINISHED"}}"#,
        )
        .into_page();
        assert_eq!(records.len(), 1);
        assert_eq!(next.as_deref(), Some("abc"));
    }

    #[test]
    fn keyless_entities_are_skipped() {
        let (records, _) = batch(
            r#"{"batch": {"entityResults": [{"entity": {"key": {"path": []}}}],
                          "moreResults": "NO_MORE_RESULTS"}}"#,
        )
        .into_page();
        assert!(records.is_empty());
    }
}
