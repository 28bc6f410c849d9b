//! Remote collaborators of the synchronizer.
//!
//! - [`RecordDatabase`]: the managed record database (paginated match-all queries)
//! - [`KeyValueStore`]: the cloud key-value store that mirrors favorites across devices
//!
//! Backends:
//! - [`memory`]: in-process stores with fault injection
//! - [`file`]: a JSON record export and a polled JSON key-value file
//!
//! The synchronizer only ever sees `Arc<dyn RecordDatabase>` and
//! `Arc<dyn KeyValueStore>`.

pub mod file;
pub mod memory;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::RemoteError;

/// Key-value key holding the ordered list of favorite recipe ids.
pub const FAVORITES_KEY: &str = "favorites";

/// Record type queried for the catalog unless configured otherwise.
pub const DEFAULT_RECORD_TYPE: &str = "Recipe";

/// A typed field value on a remote record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    String(String),
    StringList(Vec<String>),
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::StringList(value)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(value: Vec<&str>) -> Self {
        FieldValue::StringList(value.into_iter().map(str::to_string).collect())
    }
}

/// A record as returned by the record database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    pub record_name: String,
    #[serde(default = "default_record_type")]
    pub record_type: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

fn default_record_type() -> String {
    DEFAULT_RECORD_TYPE.to_string()
}

impl RemoteRecord {
    pub fn new(record_name: impl Into<String>) -> Self {
        Self {
            record_name: record_name.into(),
            record_type: default_record_type(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(FieldValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.fields.get(key) {
            Some(FieldValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn string_list(&self, key: &str) -> Option<&[String]> {
        match self.fields.get(key) {
            Some(FieldValue::StringList(list)) => Some(list),
            _ => None,
        }
    }
}

/// Opaque continuation token returned with a partial result page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page request. Queries always match every record of the type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRequest {
    Start { record_type: String },
    Continue { cursor: Cursor },
}

/// One page of results. Individual records may fail without failing the page.
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    pub records: Vec<std::result::Result<RemoteRecord, RemoteError>>,
    pub cursor: Option<Cursor>,
}

#[async_trait]
pub trait RecordDatabase: Send + Sync {
    /// Human-readable backend name (e.g., "memory", "json").
    fn backend_name(&self) -> &str;

    /// Run one page of a match-all query.
    async fn query(&self, request: QueryRequest) -> std::result::Result<QueryPage, RemoteError>;
}

/// Why the key-value store signalled a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// Another device wrote new values.
    ServerChange,
    /// First download of the store's values on this device.
    InitialSync,
    QuotaViolation,
    AccountChange,
}

/// An externally originated change notification. May be stale or redundant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvChange {
    pub reason: ChangeReason,
    /// Keys that changed. Empty means "unknown, assume all".
    pub keys: Vec<String>,
}

impl KvChange {
    pub fn touches(&self, key: &str) -> bool {
        self.keys.is_empty() || self.keys.iter().any(|k| k == key)
    }
}

/// Cloud key-value store holding small id lists.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Human-readable backend name.
    fn backend_name(&self) -> &str;

    /// Read an id list. Missing keys read as empty.
    async fn get_ids(&self, key: &str) -> Result<Vec<i64>>;

    /// Replace an id list.
    async fn set_ids(&self, key: &str, ids: &[i64]) -> Result<()>;

    /// Exchange values with the remote side, emitting change
    /// notifications for anything that changed elsewhere.
    async fn synchronize(&self) -> Result<()> {
        Ok(())
    }

    /// Subscribe to externally originated change notifications.
    fn subscribe(&self) -> broadcast::Receiver<KvChange>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_untagged_json() {
        let json = r#"{"recordName":"7","fields":{"name":"Torch","output":4,"ingredients":["coal","stick"]}}"#;
        let record: RemoteRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.record_type, "Recipe");
        assert_eq!(record.string("name"), Some("Torch"));
        assert_eq!(record.int("output"), Some(4));
        assert_eq!(
            record.string_list("ingredients"),
            Some(&["coal".to_string(), "stick".to_string()][..])
        );
        // Wrong type reads as absent
        assert_eq!(record.int("name"), None);
    }

    #[test]
    fn test_kv_change_touches() {
        let any = KvChange {
            reason: ChangeReason::InitialSync,
            keys: Vec::new(),
        };
        assert!(any.touches(FAVORITES_KEY));

        let other = KvChange {
            reason: ChangeReason::ServerChange,
            keys: vec!["theme".to_string()],
        };
        assert!(!other.touches(FAVORITES_KEY));
    }
}
