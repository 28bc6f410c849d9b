//! In-process remote backends.
//!
//! Both stores keep everything behind a `Mutex` and expose counters and
//! fault switches so callers can observe exactly what the synchronizer did.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{
    ChangeReason, Cursor, KeyValueStore, KvChange, QueryPage, QueryRequest, RecordDatabase,
    RemoteRecord,
};
use crate::error::{RemoteError, RemoteErrorCode};

type RecordResult = std::result::Result<RemoteRecord, RemoteError>;

/// A record database serving fixed pages.
pub struct MemoryDatabase {
    pages: Vec<Vec<RecordResult>>,
    /// Errors returned by the next queries, one per query.
    scripted_failures: Mutex<VecDeque<RemoteError>>,
    /// Error returned by every query while set.
    persistent_failure: Mutex<Option<RemoteError>>,
    latency: Option<Duration>,
    queries: AtomicUsize,
}

impl MemoryDatabase {
    pub fn paged(pages: Vec<Vec<RemoteRecord>>) -> Self {
        Self::with_record_results(
            pages
                .into_iter()
                .map(|page| page.into_iter().map(Ok).collect())
                .collect(),
        )
    }

    /// Pages whose entries may individually be errors.
    pub fn with_record_results(pages: Vec<Vec<RecordResult>>) -> Self {
        Self {
            pages,
            scripted_failures: Mutex::new(VecDeque::new()),
            persistent_failure: Mutex::new(None),
            latency: None,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn from_records(records: Vec<RemoteRecord>, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let pages = records
            .chunks(page_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        Self::paged(pages)
    }

    /// Delay every query by `latency` (uses tokio time).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail the next query with `error`. Calls queue up.
    pub fn fail_next(&self, error: RemoteError) {
        if let Ok(mut failures) = self.scripted_failures.lock() {
            failures.push_back(error);
        }
    }

    /// Fail every query with `error` until cleared with `None`.
    pub fn fail_always(&self, error: Option<RemoteError>) {
        if let Ok(mut failure) = self.persistent_failure.lock() {
            *failure = error;
        }
    }

    /// Number of queries received so far, failed ones included.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn page_index(&self, request: &QueryRequest) -> std::result::Result<usize, RemoteError> {
        match request {
            QueryRequest::Start { .. } => Ok(0),
            QueryRequest::Continue { cursor } => cursor
                .as_str()
                .strip_prefix("page:")
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|n| *n < self.pages.len())
                .ok_or_else(|| {
                    RemoteError::new(
                        RemoteErrorCode::InvalidArguments,
                        format!("unknown cursor {}", cursor.as_str()),
                    )
                }),
        }
    }
}

#[async_trait]
impl RecordDatabase for MemoryDatabase {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn query(&self, request: QueryRequest) -> std::result::Result<QueryPage, RemoteError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let persistent = self.persistent_failure.lock().ok().and_then(|f| f.clone());
        if let Some(err) = persistent {
            return Err(err);
        }
        let scripted = self.scripted_failures.lock().ok().and_then(|mut f| f.pop_front());
        if let Some(err) = scripted {
            return Err(err);
        }

        if self.pages.is_empty() {
            return Ok(QueryPage::default());
        }

        let index = self.page_index(&request)?;
        let next = index + 1;
        Ok(QueryPage {
            records: self.pages[index].clone(),
            cursor: (next < self.pages.len()).then(|| Cursor::new(format!("page:{next}"))),
        })
    }
}

/// A key-value store held in memory.
pub struct MemoryKeyValueStore {
    values: Mutex<HashMap<String, Vec<i64>>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
    changes: broadcast::Sender<KvChange>,
}

impl Default for MemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            values: Mutex::new(HashMap::new()),
            writes: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
            changes,
        }
    }

    /// Seed a value without counting it as a write.
    pub fn with_ids(self, key: &str, ids: Vec<i64>) -> Self {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), ids);
        }
        self
    }

    pub fn stored(&self, key: &str) -> Vec<i64> {
        self.values
            .lock()
            .ok()
            .and_then(|values| values.get(key).cloned())
            .unwrap_or_default()
    }

    /// Number of successful `set_ids` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Simulate another device writing `ids` under `key`.
    pub fn external_change(&self, key: &str, ids: Vec<i64>) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), ids);
        }
        let _ = self.changes.send(KvChange {
            reason: ChangeReason::ServerChange,
            keys: vec![key.to_string()],
        });
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn get_ids(&self, key: &str) -> Result<Vec<i64>> {
        let values = self
            .values
            .lock()
            .map_err(|e| anyhow::anyhow!("lock poisoned: {e}"))?;
        Ok(values.get(key).cloned().unwrap_or_default())
    }

    async fn set_ids(&self, key: &str, ids: &[i64]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("key-value store rejected write to {key}");
        }
        let mut values = self
            .values
            .lock()
            .map_err(|e| anyhow::anyhow!("lock poisoned: {e}"))?;
        values.insert(key.to_string(), ids.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<KvChange> {
        self.changes.subscribe()
    }
}
