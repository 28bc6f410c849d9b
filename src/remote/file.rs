//! JSON-file remote backends.
//!
//! ```text
//! records.json   → [ { "recordName": "12", "recordType": "Recipe", "fields": { ... } }, ... ]
//! kv.json        → { "favorites": [12, 40, 7] }
//! ```
//!
//! The record export is re-read on every query and served in fixed-size
//! pages with `offset:{n}` cursors. The key-value file may be edited by
//! other processes; `synchronize` hashes it and emits a change
//! notification when the content differs from what this store last wrote
//! or saw.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{
    ChangeReason, Cursor, KeyValueStore, KvChange, QueryPage, QueryRequest, RecordDatabase,
    RemoteRecord,
};
use crate::cache::write_atomic;
use crate::error::{RemoteError, RemoteErrorCode};

/// Serves a JSON export of remote records.
pub struct JsonRecordDatabase {
    path: PathBuf,
    page_size: usize,
}

impl JsonRecordDatabase {
    pub fn new(path: impl Into<PathBuf>, page_size: usize) -> Self {
        Self {
            path: path.into(),
            page_size: page_size.max(1),
        }
    }

    fn read_export(&self) -> std::result::Result<Vec<serde_json::Value>, RemoteError> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            let code = match e.kind() {
                ErrorKind::NotFound => RemoteErrorCode::UnknownItem,
                ErrorKind::PermissionDenied => RemoteErrorCode::PermissionFailure,
                _ => RemoteErrorCode::ServiceUnavailable,
            };
            RemoteError::new(code, format!("{}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            RemoteError::new(
                RemoteErrorCode::InternalError,
                format!("malformed record export: {e}"),
            )
        })
    }

    fn decode(value: serde_json::Value) -> std::result::Result<RemoteRecord, RemoteError> {
        serde_json::from_value(value).map_err(|e| {
            RemoteError::new(RemoteErrorCode::InvalidArguments, format!("bad record: {e}"))
        })
    }
}

#[async_trait]
impl RecordDatabase for JsonRecordDatabase {
    fn backend_name(&self) -> &str {
        "json"
    }

    async fn query(&self, request: QueryRequest) -> std::result::Result<QueryPage, RemoteError> {
        let (record_type, offset) = match &request {
            QueryRequest::Start { record_type } => (record_type.clone(), 0),
            QueryRequest::Continue { cursor } => parse_cursor(cursor)?,
        };

        let matching: Vec<std::result::Result<RemoteRecord, RemoteError>> = self
            .read_export()?
            .into_iter()
            .map(Self::decode)
            .filter(|r| match r {
                Ok(record) => record.record_type == record_type,
                Err(_) => true,
            })
            .collect();

        let end = (offset + self.page_size).min(matching.len());
        let records = matching
            .get(offset..end)
            .map(<[_]>::to_vec)
            .unwrap_or_default();
        let cursor = (end < matching.len()).then(|| Cursor::new(format!("{record_type}:{end}")));

        Ok(QueryPage { records, cursor })
    }
}

fn parse_cursor(cursor: &Cursor) -> std::result::Result<(String, usize), RemoteError> {
    cursor
        .as_str()
        .rsplit_once(':')
        .and_then(|(record_type, offset)| {
            offset.parse().ok().map(|offset| (record_type.to_string(), offset))
        })
        .ok_or_else(|| {
            RemoteError::new(
                RemoteErrorCode::InvalidArguments,
                format!("unknown cursor {}", cursor.as_str()),
            )
        })
}

/// What this store last wrote or saw on disk.
#[derive(Default)]
struct SeenState {
    hash: Option<blake3::Hash>,
    values: BTreeMap<String, Vec<i64>>,
}

/// Key-value store persisted to a JSON file shared between processes.
pub struct JsonKeyValueStore {
    path: PathBuf,
    seen: Mutex<SeenState>,
    changes: broadcast::Sender<KvChange>,
}

impl JsonKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            path: path.into(),
            seen: Mutex::new(SeenState::default()),
            changes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_bytes(&self) -> Result<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", self.path.display())),
        }
    }

    fn parse(bytes: &[u8]) -> Result<BTreeMap<String, Vec<i64>>> {
        if bytes.is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(bytes).context("Key-value file is not a JSON object of id lists")
    }

    fn remember(&self, hash: blake3::Hash, values: BTreeMap<String, Vec<i64>>) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.hash = Some(hash);
            seen.values = values;
        }
    }
}

#[async_trait]
impl KeyValueStore for JsonKeyValueStore {
    fn backend_name(&self) -> &str {
        "json"
    }

    async fn get_ids(&self, key: &str) -> Result<Vec<i64>> {
        let values = Self::parse(&self.read_bytes()?)?;
        Ok(values.get(key).cloned().unwrap_or_default())
    }

    async fn set_ids(&self, key: &str, ids: &[i64]) -> Result<()> {
        // A corrupt file is replaced rather than blocking writes
        let mut values = Self::parse(&self.read_bytes()?).unwrap_or_default();
        values.insert(key.to_string(), ids.to_vec());

        let bytes = serde_json::to_vec_pretty(&values).context("Failed to encode key-value file")?;
        write_atomic(&self.path, &bytes)?;

        // Our own write must not come back as a remote change
        self.remember(blake3::hash(&bytes), values);
        Ok(())
    }

    async fn synchronize(&self) -> Result<()> {
        let bytes = self.read_bytes()?;
        let hash = blake3::hash(&bytes);

        let previous = match self.seen.lock() {
            Ok(seen) if seen.hash == Some(hash) => return Ok(()),
            Ok(seen) => seen.hash.map(|_| seen.values.clone()),
            Err(e) => anyhow::bail!("lock poisoned: {e}"),
        };

        let values = Self::parse(&bytes)?;
        let change = match previous {
            None => KvChange {
                reason: ChangeReason::InitialSync,
                keys: Vec::new(),
            },
            Some(previous) => {
                let mut keys: Vec<String> = values
                    .iter()
                    .filter(|(k, v)| previous.get(*k) != Some(*v))
                    .map(|(k, _)| k.clone())
                    .collect();
                keys.extend(previous.keys().filter(|k| !values.contains_key(*k)).cloned());
                KvChange {
                    reason: ChangeReason::ServerChange,
                    keys,
                }
            }
        };

        self.remember(hash, values);
        if change.reason == ChangeReason::InitialSync || !change.keys.is_empty() {
            tracing::debug!("Key-value change detected: {:?}", change);
            let _ = self.changes.send(change);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<KvChange> {
        self.changes.subscribe()
    }
}
