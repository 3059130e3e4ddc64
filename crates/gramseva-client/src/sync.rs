//! Reconciliation loop.
//!
//! Moves collections between the [`ClientStore`], the server, and the local
//! cache:
//!
//! - **fetch**: server value, else the local cache.
//! - **push**: deduplicated full-collection replace with bounded retry, else
//!   the local cache (reported as success).
//! - **pump**: applies realtime broadcasts and resyncs after each connect.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use gramseva_types::Collection;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::local::{LocalStore, LocalStoreError};
use crate::realtime::ServerEvent;
use crate::remote::{Remote, RemoteError};
use crate::store::{ClientStore, canonical};

/// How a push ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Server accepted the replacement.
    Remote,
    /// Server unreachable; the value was written to the local cache.
    LocalFallback,
    /// Identical to the last value the server saw from us; nothing sent.
    Deduplicated,
}

pub struct SyncEngine {
    store: Arc<ClientStore>,
    remote: Arc<dyn Remote>,
    local: LocalStore,
    push_attempts: u32,
    push_backoff: Duration,
    /// Serializes pushes per collection so replaces leave in mutation order.
    push_locks: HashMap<Collection, Mutex<()>>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<ClientStore>,
        remote: Arc<dyn Remote>,
        local: LocalStore,
        config: &ClientConfig,
    ) -> Self {
        Self {
            store,
            remote,
            local,
            push_attempts: config.push_attempts.max(1),
            push_backoff: config.push_backoff,
            push_locks: Collection::all().map(|c| (c, Mutex::new(()))).collect(),
        }
    }

    pub fn store(&self) -> &Arc<ClientStore> {
        &self.store
    }

    pub fn remote(&self) -> &Arc<dyn Remote> {
        &self.remote
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    // ========================================================================
    // Inbound
    // ========================================================================

    /// Initial load of every collection.
    pub async fn load_all(&self) {
        let loads = Collection::all().map(|c| self.fetch(c));
        futures::future::join_all(loads).await;
        info!("collections loaded");
    }

    /// Replace `collection` with the server's value, or the local cache when
    /// the server cannot be reached. A cache flagged pending from an earlier
    /// run is restored and pushed instead of fetched over.
    pub async fn fetch(&self, collection: Collection) {
        self.store.begin_load(collection);
        if self.local.is_pending(collection) {
            self.store.restore_pending(collection, self.local.load(collection));
            match self.push(collection).await {
                Ok(outcome) => info!(collection = %collection, ?outcome, "restored offline changes"),
                Err(e) => warn!(collection = %collection, error = %e, "re-push of offline changes failed"),
            }
            return;
        }
        match self.remote.fetch(collection).await {
            Ok(value) => self.store.apply_remote(collection, value),
            Err(e) => {
                warn!(collection = %collection, error = %e, "fetch failed; using local cache");
                self.store.finish_local_load(collection, self.local.load(collection));
            }
        }
    }

    /// Server value wins; any offline changes still pending are dropped.
    pub fn apply_remote(&self, collection: Collection, payload: Value) {
        if self.store.pending_local(collection) {
            if let Err(e) = self.local.clear_pending(collection) {
                warn!(collection = %collection, error = %e, "failed to clear pending flag");
            }
        }
        self.store.apply_remote(collection, payload);
    }

    /// After a (re)connect: collections whose last push only reached local
    /// storage are pushed again, everything else is re-fetched.
    pub async fn resync(&self) {
        for collection in Collection::all() {
            if self.store.pending_local(collection) {
                match self.push(collection).await {
                    Ok(outcome) => info!(collection = %collection, ?outcome, "re-pushed offline changes"),
                    Err(e) => warn!(collection = %collection, error = %e, "re-push failed"),
                }
            } else {
                self.fetch(collection).await;
            }
        }
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    /// Push the current value of `collection`.
    ///
    /// Only a failure to write the local cache is an error; an unreachable
    /// server degrades to [`PushOutcome::LocalFallback`].
    pub async fn push(&self, collection: Collection) -> Result<PushOutcome, LocalStoreError> {
        let _guard = match self.push_locks.get(&collection) {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let value = self.store.raw(collection);
        let text = canonical(&value);
        if !self.store.needs_push(collection, &text) {
            debug!(collection = %collection, "push skipped: unchanged");
            return Ok(PushOutcome::Deduplicated);
        }

        match self.push_with_retry(collection, &value).await {
            Ok(()) => {
                if self.store.pending_local(collection) {
                    self.local.clear_pending(collection)?;
                }
                self.store.mark_pushed(collection, &text);
                debug!(collection = %collection, "pushed");
                Ok(PushOutcome::Remote)
            }
            Err(e) => {
                self.local.save(collection, &value)?;
                self.local.mark_pending(collection)?;
                self.store.mark_local_fallback(collection, &text);
                warn!(collection = %collection, error = %e, "push failed; saved to local storage");
                Ok(PushOutcome::LocalFallback)
            }
        }
    }

    async fn push_with_retry(&self, collection: Collection, value: &Value) -> Result<(), RemoteError> {
        let mut delay = self.push_backoff;
        let mut attempt = 1;
        loop {
            match self.remote.push(collection, value).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.push_attempts && e.is_connectivity() => {
                    debug!(collection = %collection, attempt, error = %e, "push failed; retrying");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    // ========================================================================
    // Realtime pump
    // ========================================================================

    /// Apply realtime events until `cancel` fires or the channel closes.
    pub fn spawn_pump(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<ServerEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => event,
                };
                match event {
                    Some(ServerEvent::Connected) => engine.resync().await,
                    Some(ServerEvent::CollectionUpdated { collection, payload }) => {
                        engine.apply_remote(collection, payload)
                    }
                    None => break,
                }
            }
            debug!("sync pump stopped");
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
