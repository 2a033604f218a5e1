//! LMDB-backed engine behind [`LocalStore`](crate::store::LocalStore).
//!
//! [`AppDbState`] owns the single environment handle for the process and one
//! named database per [`CollectionName`]. All calls here are blocking; the
//! async wrapper moves them onto tokio's blocking pool.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use lmdb::{
    Cursor, Database, DatabaseFlags, Environment, RwTransaction, Transaction, WriteFlags,
};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::collection::{CollectionName, META_DB, SCHEMA_VERSION, SCHEMA_VERSION_KEY};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::migration::MigrationStrategy;

pub struct AppDbState {
    env: Environment,
    collections: HashMap<CollectionName, Database>,
    meta: Database,
    path: PathBuf,
}

impl AppDbState {
    /// Opens the environment and migrates it to [`SCHEMA_VERSION`] if the
    /// persisted version is absent or older.
    ///
    /// Version check, migration, collection creation and the version stamp
    /// share one write transaction.
    pub fn open(config: &StoreConfig, strategy: &dyn MigrationStrategy) -> Result<Self> {
        std::fs::create_dir_all(&config.path)?;

        info!("Opening store at {}", config.path.display());
        let env = Environment::new()
            .set_max_dbs(config.max_collections)
            .set_map_size(config.map_size)
            .open(&config.path)
            .map_err(|source| StoreError::Open {
                path: config.path.clone(),
                source,
            })?;

        let mut txn = env.begin_rw_txn()?;
        let stored = read_schema_version(&txn)?;

        match stored {
            Some(found) if found > SCHEMA_VERSION => {
                return Err(StoreError::SchemaTooNew {
                    found,
                    supported: SCHEMA_VERSION,
                });
            }
            Some(found) if found == SCHEMA_VERSION => {
                debug!("Store schema is current (v{found})");
            }
            _ => {
                info!(
                    "Store schema {:?} is behind v{SCHEMA_VERSION}; running '{}' migration",
                    stored,
                    strategy.name()
                );
                strategy.migrate(&mut txn, stored, SCHEMA_VERSION)?;
            }
        }

        let (collections, meta) = create_collections(&txn)?;
        if stored != Some(SCHEMA_VERSION) {
            txn.put(
                meta,
                &SCHEMA_VERSION_KEY,
                &SCHEMA_VERSION.to_be_bytes(),
                WriteFlags::empty(),
            )?;
        }

        txn.commit().map_err(|e| match stored {
            Some(found) if found == SCHEMA_VERSION => StoreError::Lmdb(e),
            _ => StoreError::Migration {
                from: stored,
                to: SCHEMA_VERSION,
                reason: format!("commit failed: {e}"),
            },
        })?;

        info!("✅ Store ready at {} (schema v{SCHEMA_VERSION})", config.path.display());
        Ok(Self {
            env,
            collections,
            meta,
            path: config.path.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema_version(&self) -> Result<Option<u32>> {
        let txn = self.env.begin_ro_txn()?;
        let version = match txn.get(self.meta, &SCHEMA_VERSION_KEY) {
            Ok(bytes) => Some(decode_version(bytes)?),
            Err(lmdb::Error::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        txn.abort();
        Ok(version)
    }

    pub fn get<T: DeserializeOwned>(&self, collection: CollectionName, id: &str) -> Result<Option<T>> {
        let txn = self.env.begin_ro_txn()?;
        let found = read_record(&txn, self.db(collection), id)?;
        txn.abort();
        Ok(found)
    }

    /// Every record in `collection`, in key order.
    pub fn get_all<T: DeserializeOwned>(&self, collection: CollectionName) -> Result<Vec<T>> {
        let txn = self.env.begin_ro_txn()?;
        let records = read_all(&txn, self.db(collection))?;
        txn.abort();
        Ok(records)
    }

    pub fn count(&self, collection: CollectionName) -> Result<usize> {
        let txn = self.env.begin_ro_txn()?;
        let count = count_records(&txn, self.db(collection))?;
        txn.abort();
        Ok(count)
    }

    /// Upserts by `id`. The stored record is replaced wholesale.
    pub fn put<T: Serialize>(&self, collection: CollectionName, record: &T) -> Result<()> {
        self.write(|txn| txn.put(collection, record))
    }

    /// Removes by key. A missing key is a no-op.
    pub fn delete(&self, collection: CollectionName, id: &str) -> Result<()> {
        self.write(|txn| txn.delete(collection, id).map(|_| ()))
    }

    /// Runs `f` in one write transaction spanning every collection.
    ///
    /// `Ok` commits, `Err` aborts: readers see all of the closure's writes or
    /// none of them.
    pub fn write<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut StoreTxn<'_>) -> Result<R>,
    {
        let txn = self.env.begin_rw_txn()?;
        let mut store_txn = StoreTxn { txn, state: self };

        match f(&mut store_txn) {
            Ok(value) => {
                store_txn.txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                debug!("Aborting write transaction: {e}");
                store_txn.txn.abort();
                Err(e)
            }
        }
    }

    /// Empties every collection, keeping the schema stamp.
    pub fn clear_all_records(&self) -> Result<()> {
        self.write(|txn| {
            for collection in CollectionName::ALL {
                txn.clear(collection)?;
            }
            Ok(())
        })?;
        info!("All collections cleared at {}", self.path.display());
        Ok(())
    }

    /// Flushes the environment to disk.
    pub fn sync(&self) -> Result<()> {
        self.env.sync(true).map_err(|e| {
            warn!("Failed to sync store at {}: {e}", self.path.display());
            StoreError::from(e)
        })
    }

    fn db(&self, collection: CollectionName) -> Database {
        // every collection is opened in `open`, so the map is total
        self.collections[&collection]
    }
}

/// Write transaction handed to [`AppDbState::write`] closures.
pub struct StoreTxn<'env> {
    txn: RwTransaction<'env>,
    state: &'env AppDbState,
}

impl StoreTxn<'_> {
    pub fn get<T: DeserializeOwned>(&self, collection: CollectionName, id: &str) -> Result<Option<T>> {
        read_record(&self.txn, self.state.db(collection), id)
    }

    pub fn get_all<T: DeserializeOwned>(&self, collection: CollectionName) -> Result<Vec<T>> {
        read_all(&self.txn, self.state.db(collection))
    }

    pub fn count(&self, collection: CollectionName) -> Result<usize> {
        count_records(&self.txn, self.state.db(collection))
    }

    pub fn put<T: Serialize>(&mut self, collection: CollectionName, record: &T) -> Result<()> {
        let value = serde_json::to_value(record)?;
        let id = record_id(collection, &value)?.to_owned();
        let bytes = serde_json::to_vec(&value)?;
        self.txn
            .put(self.state.db(collection), &id, &bytes, WriteFlags::empty())?;
        Ok(())
    }

    /// Returns whether a record was removed.
    pub fn delete(&mut self, collection: CollectionName, id: &str) -> Result<bool> {
        if id.is_empty() {
            return Ok(false);
        }
        match self.txn.del(self.state.db(collection), &id, None) {
            Ok(()) => Ok(true),
            Err(lmdb::Error::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn clear(&mut self, collection: CollectionName) -> Result<()> {
        self.txn.clear_db(self.state.db(collection))?;
        Ok(())
    }
}

/// The record's non-empty string `id`.
pub(crate) fn record_id(collection: CollectionName, value: &JsonValue) -> Result<&str> {
    match value.get("id").and_then(JsonValue::as_str) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(StoreError::MissingId { collection }),
    }
}

fn read_record<T: DeserializeOwned, X: Transaction>(txn: &X, db: Database, id: &str) -> Result<Option<T>> {
    if id.is_empty() {
        return Ok(None);
    }
    match txn.get(db, &id) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
        Err(lmdb::Error::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn read_all<T: DeserializeOwned, X: Transaction>(txn: &X, db: Database) -> Result<Vec<T>> {
    let mut cursor = txn.open_ro_cursor(db)?;
    let mut records = Vec::new();
    for (_, bytes) in cursor.iter() {
        records.push(serde_json::from_slice(bytes)?);
    }
    Ok(records)
}

fn count_records<X: Transaction>(txn: &X, db: Database) -> Result<usize> {
    let mut cursor = txn.open_ro_cursor(db)?;
    Ok(cursor.iter().count())
}

fn read_schema_version<X: Transaction>(txn: &X) -> Result<Option<u32>> {
    // SAFETY: opening an existing handle; a missing meta database means a
    // fresh environment.
    let meta = match unsafe { txn.open_db(Some(META_DB)) } {
        Ok(db) => db,
        Err(lmdb::Error::NotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    match txn.get(meta, &SCHEMA_VERSION_KEY) {
        // an unreadable stamp is treated like a missing one, so the store
        // gets rebuilt instead of staying unopenable
        Ok(bytes) => match decode_version(bytes) {
            Ok(version) => Ok(Some(version)),
            Err(e) => {
                warn!("Ignoring unreadable schema version: {e}");
                Ok(None)
            }
        },
        Err(lmdb::Error::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn decode_version(bytes: &[u8]) -> Result<u32> {
    let raw: [u8; 4] = bytes
        .try_into()
        .map_err(|_| StoreError::Corrupted(format!("schema version has {} bytes", bytes.len())))?;
    Ok(u32::from_be_bytes(raw))
}

fn create_collections(txn: &RwTransaction<'_>) -> Result<(HashMap<CollectionName, Database>, Database)> {
    let mut collections = HashMap::with_capacity(CollectionName::ALL.len());
    for collection in CollectionName::ALL {
        // SAFETY: handles are used by other transactions only after the
        // open transaction commits.
        let db = unsafe { txn.create_db(Some(collection.as_str()), DatabaseFlags::empty()) }?;
        collections.insert(collection, db);
    }
    let meta = unsafe { txn.create_db(Some(META_DB), DatabaseFlags::empty()) }?;
    Ok((collections, meta))
}
