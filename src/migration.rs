//! Schema migration strategies.
//!
//! A strategy runs inside the write transaction that opens the store, so a
//! failed migration leaves the previous on-disk state untouched. Once the
//! strategy returns, the engine makes sure every collection exists and stamps
//! the new schema version in that same transaction.

use lmdb::{Cursor, DatabaseFlags, RwTransaction, Transaction};
use log::{debug, info};

use crate::collection::CollectionName;
use crate::error::{Result, StoreError};

pub trait MigrationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Brings the environment from `from` (absent on a fresh store) to `to`.
    fn migrate(&self, txn: &mut RwTransaction<'_>, from: Option<u32>, to: u32) -> Result<()>;
}

/// Drops every named database and recreates the collections empty.
///
/// All records are lost on a version bump. Acceptable only because the
/// contents are reseedable reference data.
#[derive(Debug, Default, Clone, Copy)]
pub struct DestructiveRebuild;

impl MigrationStrategy for DestructiveRebuild {
    fn name(&self) -> &'static str {
        "destructive-rebuild"
    }

    fn migrate(&self, txn: &mut RwTransaction<'_>, from: Option<u32>, to: u32) -> Result<()> {
        let existing = existing_databases(txn)?;
        info!(
            "Rebuilding store from {:?} to v{to}: dropping {} database(s)",
            from,
            existing.len()
        );

        for name in &existing {
            // SAFETY: the handle is opened and dropped inside this
            // transaction and never escapes it.
            let db = unsafe { txn.open_db(Some(name)) }.map_err(|e| StoreError::Migration {
                from,
                to,
                reason: format!("cannot open '{name}' for dropping: {e}"),
            })?;
            unsafe { txn.drop_db(db) }.map_err(|e| StoreError::Migration {
                from,
                to,
                reason: format!("cannot drop '{name}': {e}"),
            })?;
            debug!("Dropped database '{name}'");
        }

        for collection in CollectionName::ALL {
            // SAFETY: handles become valid for other transactions only after
            // the enclosing open transaction commits.
            unsafe { txn.create_db(Some(collection.as_str()), DatabaseFlags::empty()) }.map_err(
                |e| StoreError::Migration {
                    from,
                    to,
                    reason: format!("cannot create '{collection}': {e}"),
                },
            )?;
        }

        Ok(())
    }
}

/// Names of every named database in the environment.
///
/// LMDB records named databases as keys of the unnamed main database; nothing
/// else is ever written there.
pub(crate) fn existing_databases(txn: &RwTransaction<'_>) -> Result<Vec<String>> {
    // SAFETY: the main database handle always exists and needs no creation.
    let main = unsafe { txn.open_db(None) }?;
    let mut cursor = txn.open_ro_cursor(main)?;
    let names: Vec<String> = cursor
        .iter()
        .map(|(key, _)| String::from_utf8_lossy(key).into_owned())
        .collect();
    Ok(names)
}
