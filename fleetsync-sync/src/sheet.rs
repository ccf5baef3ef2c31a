//! The spreadsheet service seam and its Sheets v4 REST implementation.
//!
//! Responses are handed back as raw JSON so the caller can tell "no `values`
//! key" (retrieval failure) from "empty `values`" (empty sheet).

use std::sync::Arc;

use serde_json::{json, Value};
use url::Url;

use crate::auth::TokenSource;
use crate::error::SyncError;
use crate::http::{read_json, service_err};

pub const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

/// Read and overwrite a rectangular range of cells.
pub trait SheetService: Send + Sync {
    /// `values.get` for `range` (A1 notation, worksheet-qualified).
    fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Value, SyncError>;

    /// `values.update` with raw (uninterpreted) input.
    fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<String>],
    ) -> Result<Value, SyncError>;
}

impl<T: SheetService + ?Sized> SheetService for Arc<T> {
    fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Value, SyncError> {
        (**self).get_values(spreadsheet_id, range)
    }

    fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<String>],
    ) -> Result<Value, SyncError> {
        (**self).update_values(spreadsheet_id, range, values)
    }
}

pub struct SheetsClient {
    agent: ureq::Agent,
    tokens: Arc<dyn TokenSource>,
    base_url: Url,
}

impl SheetsClient {
    pub fn new(agent: ureq::Agent, tokens: Arc<dyn TokenSource>) -> Result<Self, SyncError> {
        Self::with_base_url(agent, tokens, SHEETS_BASE)
    }

    /// `base_url` must end in `/spreadsheets/`.
    pub fn with_base_url(
        agent: ureq::Agent,
        tokens: Arc<dyn TokenSource>,
        base_url: &str,
    ) -> Result<Self, SyncError> {
        let base_url = Url::parse(base_url).map_err(|e| SyncError::Protocol {
            service: "sheets",
            message: format!("bad base URL {base_url:?}: {e}"),
        })?;
        Ok(Self {
            agent,
            tokens,
            base_url,
        })
    }

    /// `<base>/<id>/values/<range>`, each segment percent-encoded.
    pub fn values_url(&self, spreadsheet_id: &str, range: &str) -> Result<Url, SyncError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| SyncError::Protocol {
                service: "sheets",
                message: format!("base URL {} cannot take a path", self.base_url),
            })?
            .pop_if_empty()
            .extend([spreadsheet_id, "values", range]);
        Ok(url)
    }

    fn authorized(&self, method: &str, url: &Url) -> Result<ureq::Request, SyncError> {
        let token = self.tokens.access_token()?;
        Ok(self
            .agent
            .request_url(method, url)
            .set("Authorization", &format!("Bearer {token}")))
    }
}

impl std::fmt::Debug for SheetsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl SheetService for SheetsClient {
    fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Value, SyncError> {
        let url = self.values_url(spreadsheet_id, range)?;
        let response = self
            .authorized("GET", &url)?
            .call()
            .map_err(|e| service_err("sheets", e))?;
        read_json("sheets", response)
    }

    fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<String>],
    ) -> Result<Value, SyncError> {
        let mut url = self.values_url(spreadsheet_id, range)?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = json!({ "range": range, "majorDimension": "ROWS", "values": values });
        let response = self
            .authorized("PUT", &url)?
            .send_json(body)
            .map_err(|e| service_err("sheets", e))?;
        read_json("sheets", response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;

    #[test]
    fn range_with_spaces_and_bang_is_one_encoded_segment() {
        let client =
            SheetsClient::new(ureq::agent(), Arc::new(StaticToken::new("t"))).expect("client");
        let url = client
            .values_url("sheet-1", "Drop box status (auto updated)!A:G")
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-1/values/Drop%20box%20status%20(auto%20updated)!A:G"
        );
    }

    #[test]
    fn slash_in_range_does_not_split_path() {
        let client =
            SheetsClient::new(ureq::agent(), Arc::new(StaticToken::new("t"))).expect("client");
        let url = client.values_url("id", "a/b!A1").expect("url");
        assert!(url.path().ends_with("/values/a%2Fb!A1"), "{}", url.path());
    }
}
