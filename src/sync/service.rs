//! Event loop that owns a [`Synchronizer`].
//!
//! Callers talk to it through a cloneable [`SyncHandle`]: mutations are
//! sent as commands, state comes back as snapshots on a watch channel.
//! The loop also applies finished fetches, reacts to key-value change
//! notifications and polls the key-value store once per tick.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;

use super::state::Snapshot;
use super::{FetchOutcome, Synchronizer};
use crate::remote::{ChangeReason, KeyValueStore, KvChange};

const COMMAND_BUFFER: usize = 32;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

type Reply<T> = oneshot::Sender<Result<T>>;

#[derive(Debug)]
pub enum Command {
    /// Start a fetch. Replies false if one was already running.
    Sync { reply: oneshot::Sender<bool> },
    ToggleFavorite { id: i64, reply: Reply<bool> },
    RecordSearch { name: String, reply: Reply<()> },
    RemoveSearch { name: String, reply: Reply<()> },
    ClearSearches { reply: Reply<()> },
    ClearCache { reply: Reply<()> },
    ClearAllData { reply: Reply<()> },
    Shutdown,
}

pub struct SyncService {
    sync: Synchronizer,
    kv: Arc<dyn KeyValueStore>,
    commands: mpsc::Receiver<Command>,
    changes: broadcast::Receiver<KvChange>,
    sync_on_start: bool,
    poll_interval: Duration,
}

impl SyncService {
    pub fn new(sync: Synchronizer, kv: Arc<dyn KeyValueStore>) -> (Self, SyncHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let handle = SyncHandle {
            commands: tx,
            snapshots: sync.subscribe(),
        };
        let changes = kv.subscribe();
        let service = Self {
            sync,
            kv,
            commands: rx,
            changes,
            sync_on_start: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
        };
        (service, handle)
    }

    pub fn sync_on_start(mut self, enabled: bool) -> Self {
        self.sync_on_start = enabled;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run until a shutdown command arrives or every handle is dropped.
    pub async fn run(self) {
        let Self {
            mut sync,
            kv,
            mut commands,
            mut changes,
            sync_on_start,
            poll_interval,
        } = self;

        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<FetchOutcome>();

        sync.load_favorites().await;
        if sync_on_start {
            sync.request_sync(&done_tx);
        }

        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut changes_open = true;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => handle_command(&mut sync, command, &done_tx).await,
                },
                Some(outcome) = done_rx.recv() => {
                    // Failures are recorded in the published state
                    let _ = sync.complete_sync(outcome).await;
                }
                change = changes.recv(), if changes_open => match change {
                    Ok(change) => sync.handle_kv_change(&change).await,
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("Missed {} key-value notifications, re-reading", missed);
                        let change = KvChange {
                            reason: ChangeReason::ServerChange,
                            keys: Vec::new(),
                        };
                        sync.handle_kv_change(&change).await;
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("Key-value notifications closed");
                        changes_open = false;
                    }
                },
                _ = ticker.tick() => {
                    sync.clear_expired_status();
                    if let Err(e) = kv.synchronize().await {
                        tracing::debug!("Key-value poll via {} failed: {:#}", kv.backend_name(), e);
                    }
                }
            }
        }

        tracing::info!("Sync service stopped");
    }
}

async fn handle_command(
    sync: &mut Synchronizer,
    command: Command,
    done: &mpsc::UnboundedSender<FetchOutcome>,
) {
    // A dropped reply receiver just means the caller stopped waiting
    match command {
        Command::Sync { reply } => {
            let _ = reply.send(sync.request_sync(done));
        }
        Command::ToggleFavorite { id, reply } => {
            let _ = reply.send(sync.toggle_favorite(id).await);
        }
        Command::RecordSearch { name, reply } => {
            let _ = reply.send(sync.record_search(&name));
        }
        Command::RemoveSearch { name, reply } => {
            let _ = reply.send(sync.remove_search(&name));
        }
        Command::ClearSearches { reply } => {
            let _ = reply.send(sync.clear_searches());
        }
        Command::ClearCache { reply } => {
            let _ = reply.send(sync.clear_cache());
        }
        Command::ClearAllData { reply } => {
            let _ = reply.send(sync.clear_all_data().await);
        }
        Command::Shutdown => {}
    }
}

/// Cloneable front end to a running [`SyncService`].
#[derive(Clone)]
pub struct SyncHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Arc<Snapshot>>,
}

impl SyncHandle {
    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("sync service is not running"))
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.map_err(|_| anyhow!("sync service dropped the request"))?
    }

    /// Ask for a fetch. `Ok(false)` means one was already in flight.
    pub async fn request_sync(&self) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Sync { reply: tx }).await?;
        rx.await.map_err(|_| anyhow!("sync service dropped the request"))
    }

    /// Wait until no fetch is in flight and return the settled snapshot.
    pub async fn wait_until_settled(&self) -> Result<Arc<Snapshot>> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|s| !s.sync.is_syncing())
            .await
            .map_err(|_| anyhow!("sync service is not running"))?;
        Ok(Arc::clone(&snapshot))
    }

    /// Request a fetch and wait for it (or the one already running) to end.
    pub async fn sync(&self) -> Result<Arc<Snapshot>> {
        self.request_sync().await?;
        self.wait_until_settled().await
    }

    pub async fn toggle_favorite(&self, id: i64) -> Result<bool> {
        self.request(|reply| Command::ToggleFavorite { id, reply }).await
    }

    pub async fn record_search(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.request(|reply| Command::RecordSearch { name, reply }).await
    }

    pub async fn remove_search(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.request(|reply| Command::RemoveSearch { name, reply }).await
    }

    pub async fn clear_searches(&self) -> Result<()> {
        self.request(|reply| Command::ClearSearches { reply }).await
    }

    pub async fn clear_cache(&self) -> Result<()> {
        self.request(|reply| Command::ClearCache { reply }).await
    }

    pub async fn clear_all_data(&self) -> Result<()> {
        self.request(|reply| Command::ClearAllData { reply }).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshots.borrow().clone()
    }
}
