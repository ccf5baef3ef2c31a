//! Domain types shared by every fleetsync crate.
//!
//! Records are immutable once built: fields are private and only readable
//! through accessors. All transformations produce new values.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Field names
// ---------------------------------------------------------------------------

/// Name of the identifier field; also the first spreadsheet column.
pub const ID_FIELD: &str = "dropboxrsyncaddress";

/// Canonical field order, identifier first. Doubles as the default sheet header.
pub const FIELD_NAMES: [&str; 6] = [
    ID_FIELD,
    "contact",
    "lastsuccessfulcollection",
    "errorsincelastsuccessful",
    "lastcollectionattempt",
    "maxrawfilemtimearchived",
];

// ---------------------------------------------------------------------------
// StatusRecord
// ---------------------------------------------------------------------------

/// Status of one collection endpoint as held by the authoritative store.
///
/// Field declaration order matches [`FIELD_NAMES`], so the derived `Ord`
/// sorts by the full field tuple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StatusRecord {
    #[serde(rename = "dropboxrsyncaddress")]
    id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    contact: String,
    #[serde(
        default,
        rename = "lastsuccessfulcollection",
        deserialize_with = "lenient_string"
    )]
    last_successful_collection: String,
    #[serde(
        default,
        rename = "errorsincelastsuccessful",
        deserialize_with = "lenient_string"
    )]
    error_since_last_successful: String,
    #[serde(
        default,
        rename = "lastcollectionattempt",
        deserialize_with = "lenient_string"
    )]
    last_collection_attempt: String,
    #[serde(
        default,
        rename = "maxrawfilemtimearchived",
        deserialize_with = "lenient_string"
    )]
    max_raw_file_mtime_archived: String,
}

impl StatusRecord {
    /// A record with every status field empty.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            contact: String::new(),
            last_successful_collection: String::new(),
            error_since_last_successful: String::new(),
            last_collection_attempt: String::new(),
            max_raw_file_mtime_archived: String::new(),
        }
    }

    /// Build a record from `(field name, value)` pairs.
    ///
    /// Names outside [`FIELD_NAMES`] (and the identifier field itself) are
    /// ignored; absent fields stay empty.
    pub fn from_pairs<I, K, V>(id: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .fold(Self::new(id), |record, (name, value)| {
                record.with_field(name.as_ref(), value)
            })
    }

    /// Return a copy of this record with `name` set to `value`.
    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        match name {
            "contact" => self.contact = value,
            "lastsuccessfulcollection" => self.last_successful_collection = value,
            "errorsincelastsuccessful" => self.error_since_last_successful = value,
            "lastcollectionattempt" => self.last_collection_attempt = value,
            "maxrawfilemtimearchived" => self.max_raw_file_mtime_archived = value,
            _ => {}
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn contact(&self) -> &str {
        &self.contact
    }

    pub fn last_successful_collection(&self) -> &str {
        &self.last_successful_collection
    }

    pub fn error_since_last_successful(&self) -> &str {
        &self.error_since_last_successful
    }

    pub fn last_collection_attempt(&self) -> &str {
        &self.last_collection_attempt
    }

    pub fn max_raw_file_mtime_archived(&self) -> &str {
        &self.max_raw_file_mtime_archived
    }

    /// Look a field up by its canonical name. `None` for unknown names.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            ID_FIELD => Some(&self.id),
            "contact" => Some(&self.contact),
            "lastsuccessfulcollection" => Some(&self.last_successful_collection),
            "errorsincelastsuccessful" => Some(&self.error_since_last_successful),
            "lastcollectionattempt" => Some(&self.last_collection_attempt),
            "maxrawfilemtimearchived" => Some(&self.max_raw_file_mtime_archived),
            _ => None,
        }
    }

    /// All values in [`FIELD_NAMES`] order.
    pub fn values(&self) -> [&str; 6] {
        [
            &self.id,
            &self.contact,
            &self.last_successful_collection,
            &self.error_since_last_successful,
            &self.last_collection_attempt,
            &self.max_raw_file_mtime_archived,
        ]
    }
}

/// Accepts strings, integers, floats and null; the store is loosely typed.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientString;

    impl<'de> Visitor<'de> for LenientString {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string, a number, or null")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_owned())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_unit<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(LenientString)
}

// ---------------------------------------------------------------------------
// SpreadsheetState
// ---------------------------------------------------------------------------

/// Header plus rows of the destination worksheet.
///
/// Invariant: every row has exactly `header.len()` cells.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpreadsheetState {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SpreadsheetState {
    /// Build a state, padding short rows with empty cells and truncating long
    /// ones so the width invariant holds.
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = header.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { header, rows }
    }

    /// The canonical header with no rows: what an empty sheet reads as.
    pub fn empty() -> Self {
        Self {
            header: canonical_header(),
            rows: Vec::new(),
        }
    }

    /// Position of the identifier column, if the header has one.
    pub fn id_column(&self) -> Option<usize> {
        self.header.iter().position(|name| name == ID_FIELD)
    }

    /// Header followed by rows, the shape written to the destination.
    pub fn to_values(&self) -> Vec<Vec<String>> {
        std::iter::once(self.header.clone())
            .chain(self.rows.iter().cloned())
            .collect()
    }
}

/// [`FIELD_NAMES`] as owned strings.
pub fn canonical_header() -> Vec<String> {
    FIELD_NAMES.iter().map(|name| (*name).to_owned()).collect()
}

// ---------------------------------------------------------------------------
// EndpointLabels
// ---------------------------------------------------------------------------

/// Structured parts of an endpoint identifier. Used as metric labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointLabels {
    pub experiment: String,
    pub machine: String,
    #[serde(alias = "rsync_module")]
    pub module: String,
}

impl EndpointLabels {
    pub fn new(
        experiment: impl Into<String>,
        machine: impl Into<String>,
        module: impl Into<String>,
    ) -> Self {
        Self {
            experiment: experiment.into(),
            machine: machine.into(),
            module: module.into(),
        }
    }

    /// Label values in `experiment, machine, module` order.
    pub fn values(&self) -> [&str; 3] {
        [&self.experiment, &self.machine, &self.module]
    }
}

impl fmt::Display for EndpointLabels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.experiment, self.machine, self.module)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
