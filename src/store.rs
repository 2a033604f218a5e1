//! Async store wrapper.
//!
//! [`LocalStore`] is built once by the application's composition root and
//! shared by `Arc`. It owns the lifecycle of the single [`AppDbState`]:
//!
//! ```text
//! Closed ──init()──▶ Opening ──(migrate)──▶ Open ──close()──▶ Closed
//! ```
//!
//! Every data operation awaits the open first, so callers never see a
//! half-opened or half-migrated store. Blocking LMDB work runs on tokio's
//! blocking pool while holding a read lease on the store gate; `close` and
//! `reset` take the gate exclusively, so the environment is never reopened
//! while an earlier one is still in use.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::sync::{Mutex, OwnedRwLockReadGuard, RwLock};

use crate::collection::CollectionName;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::local_db_state::{record_id, AppDbState, StoreTxn};
use crate::migration::{DestructiveRebuild, MigrationStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Closed,
    Opening,
    Open,
}

#[derive(Default)]
struct Slot {
    db: Option<Arc<AppDbState>>,
    last_error: Option<String>,
}

/// An open handle that keeps `close`/`reset` waiting until dropped.
pub(crate) struct Lease {
    db: Arc<AppDbState>,
    _gate: OwnedRwLockReadGuard<()>,
}

impl Deref for Lease {
    type Target = AppDbState;

    fn deref(&self) -> &AppDbState {
        &self.db
    }
}

pub struct LocalStore {
    config: StoreConfig,
    strategy: Arc<dyn MigrationStrategy>,
    slot: Mutex<Slot>,
    gate: Arc<RwLock<()>>,
    failed_opens: AtomicU64,
    opening: AtomicBool,
    open: AtomicBool,
    pub(crate) seed_gate: Mutex<()>,
}

impl LocalStore {
    /// A closed store using [`DestructiveRebuild`] for migrations.
    pub fn new(config: StoreConfig) -> Self {
        Self::with_strategy(config, Arc::new(DestructiveRebuild))
    }

    pub fn with_strategy(config: StoreConfig, strategy: Arc<dyn MigrationStrategy>) -> Self {
        Self {
            config,
            strategy,
            slot: Mutex::new(Slot::default()),
            gate: Arc::new(RwLock::new(())),
            failed_opens: AtomicU64::new(0),
            opening: AtomicBool::new(false),
            open: AtomicBool::new(false),
            seed_gate: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn state(&self) -> StoreState {
        if self.opening.load(Ordering::Acquire) {
            StoreState::Opening
        } else if self.open.load(Ordering::Acquire) {
            StoreState::Open
        } else {
            StoreState::Closed
        }
    }

    /// Opens (and if needed migrates) the store. Idempotent.
    ///
    /// Concurrent callers share one open attempt: the first runs it, the rest
    /// receive its handle or, if it failed, [`StoreError::OpenFailed`] with
    /// its message. The store then stays closed; a later call tries again.
    pub async fn init(&self) -> Result<()> {
        self.lease().await.map(|_| ())
    }

    /// Opens on first use and pins the handle for one operation.
    pub(crate) async fn lease(&self) -> Result<Lease> {
        let gate = Arc::clone(&self.gate).read_owned().await;
        let db = self.handle().await?;
        Ok(Lease { db, _gate: gate })
    }

    /// The shared database handle, opening the store if needed.
    pub(crate) async fn handle(&self) -> Result<Arc<AppDbState>> {
        let seen_failures = self.failed_opens.load(Ordering::Acquire);
        let mut slot = self.slot.lock().await;
        if let Some(db) = slot.db.as_ref() {
            return Ok(Arc::clone(db));
        }
        if self.failed_opens.load(Ordering::Acquire) != seen_failures {
            if let Some(reason) = slot.last_error.clone() {
                return Err(StoreError::OpenFailed(reason));
            }
        }

        self.opening.store(true, Ordering::Release);
        let config = self.config.clone();
        let strategy = Arc::clone(&self.strategy);
        let opened = tokio::task::spawn_blocking(move || AppDbState::open(&config, strategy.as_ref())).await;
        self.opening.store(false, Ordering::Release);

        match opened.map_err(StoreError::from).and_then(|result| result) {
            Ok(db) => {
                let db = Arc::new(db);
                slot.db = Some(Arc::clone(&db));
                slot.last_error = None;
                self.open.store(true, Ordering::Release);
                Ok(db)
            }
            Err(e) => {
                warn!("❌ Failed to open store at {}: {e}", self.config.path.display());
                slot.last_error = Some(e.to_string());
                self.failed_opens.fetch_add(1, Ordering::AcqRel);
                Err(e)
            }
        }
    }

    pub async fn get_all<T>(&self, collection: CollectionName) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let db = self.lease().await?;
        tokio::task::spawn_blocking(move || db.get_all(collection)).await?
    }

    /// Point lookup. A missing id is `Ok(None)`.
    pub async fn get<T>(&self, collection: CollectionName, id: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let db = self.lease().await?;
        let id = id.to_owned();
        tokio::task::spawn_blocking(move || db.get(collection, &id)).await?
    }

    /// Upsert by the record's `id`; the previous record is replaced, not
    /// merged.
    pub async fn put<T: Serialize>(&self, collection: CollectionName, record: &T) -> Result<()> {
        let value = serde_json::to_value(record)?;
        record_id(collection, &value)?;
        let db = self.lease().await?;
        tokio::task::spawn_blocking(move || db.put(collection, &value)).await?
    }

    /// Removes by key. Deleting a missing id succeeds.
    pub async fn delete(&self, collection: CollectionName, id: &str) -> Result<()> {
        let db = self.lease().await?;
        let id = id.to_owned();
        tokio::task::spawn_blocking(move || db.delete(collection, &id)).await?
    }

    pub async fn count(&self, collection: CollectionName) -> Result<usize> {
        let db = self.lease().await?;
        tokio::task::spawn_blocking(move || db.count(collection)).await?
    }

    /// Runs `f` as one all-or-nothing write across any collections.
    ///
    /// This is the raw-handle entry point for custom multi-collection work
    /// such as the cascade deletes.
    pub async fn transaction<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut StoreTxn<'_>) -> Result<R> + Send + 'static,
    {
        let db = self.lease().await?;
        tokio::task::spawn_blocking(move || db.write(f)).await?
    }

    /// Raw JSON view of a collection, for callers without a concrete type.
    pub async fn get_all_json(&self, collection: CollectionName) -> Result<Vec<JsonValue>> {
        self.get_all(collection).await
    }

    pub async fn schema_version(&self) -> Result<Option<u32>> {
        let db = self.lease().await?;
        tokio::task::spawn_blocking(move || db.schema_version()).await?
    }

    pub async fn clear_all_records(&self) -> Result<()> {
        let db = self.lease().await?;
        tokio::task::spawn_blocking(move || db.clear_all_records()).await?
    }

    /// Waits for in-flight operations, then syncs and closes the
    /// environment. The next operation reopens it.
    pub async fn close(&self) -> Result<()> {
        let _exclusive = self.gate.write().await;
        self.close_exclusive().await
    }

    /// Closes the store, deletes its directory and opens a fresh, empty one.
    ///
    /// Other callers wait until the new store is open.
    pub async fn reset(&self) -> Result<()> {
        let _exclusive = self.gate.write().await;
        self.close_exclusive().await?;

        let path = self.config.path.clone();
        tokio::task::spawn_blocking(move || match std::fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        })
        .await??;
        info!("Store at {} reset", self.config.path.display());

        self.handle().await.map(|_| ())
    }

    /// Caller holds the gate exclusively, so no lease still shares `db`.
    async fn close_exclusive(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        if let Some(db) = slot.db.take() {
            self.open.store(false, Ordering::Release);
            if Arc::strong_count(&db) > 1 {
                warn!("Closing store while a detached handle is still alive");
            }
            let sync = tokio::task::spawn_blocking(move || db.sync()).await?;
            if let Err(e) = sync {
                warn!("Closing store without a final sync: {e}");
            }
            info!("Store at {} closed", self.config.path.display());
        }
        Ok(())
    }
}
