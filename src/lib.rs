//! # Civic Store Core
//!
//! Local data layer for an offline-capable civic issue reporting client.
//! Built on LMDB (Lightning Memory-Mapped Database): a fixed set of JSON
//! record collections, a compiled schema version with migration on open,
//! one-time seeding of reference and demo data, and salted credential hashing.
//!
//! ## Features
//!
//! - **Versioned schema**: the persisted version is checked on every open and
//!   a pluggable [`MigrationStrategy`] brings older stores up to date
//! - **Single-flight lifecycle**: concurrent `init()` callers share one open
//! - **Atomic multi-collection writes**: cascade deletes and seeding commit
//!   all-or-nothing
//! - **Idempotent seeding**: gated on the `reports` collection, with
//!   concurrent seed calls collapsed to a single writer
//! - **FFI surface**: JSON-in/JSON-out C functions for non-Rust UI shells
//!
//! ## Quick Start
//!
//! ```no_run
//! use civic_store_core::{CollectionName, LocalStore, ReferenceData, StoreConfig};
//!
//! # async fn run() -> civic_store_core::Result<()> {
//! let store = LocalStore::new(StoreConfig::named("civic"));
//! store.init().await?;
//! store.seed_if_empty(ReferenceData::builtin()).await?;
//!
//! let reports: Vec<serde_json::Value> = store.get_all(CollectionName::Reports).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## FFI Functions
//!
//! - [`create_db`] - Open (and migrate) a store, returning a handle
//! - [`push_data`] - Upsert a record into a collection (alias: `put_data`)
//! - [`get_by_id`] - Retrieve a record by ID
//! - [`get_all`] - Retrieve every record in a collection
//! - [`delete_by_id`] - Delete a record by ID
//! - [`seed_reference_data`] - Seed the built-in reference dataset if empty
//! - [`clear_all_records`] - Empty every collection
//! - [`reset_database`] - Delete and recreate the store
//! - [`close_database`] - Close the environment, keeping the handle
//! - [`free_db`] / [`free_response`] - Release handles and response strings

pub mod cascade;
pub mod collection;
pub mod config;
pub mod credentials;
pub mod error;
pub mod local_db_model;
pub mod local_db_state;
pub mod migration;
pub mod seed;
pub mod session;
pub mod store;
mod app_response;

pub use crate::cascade::CascadeSummary;
pub use crate::collection::{CollectionName, SCHEMA_VERSION};
pub use crate::config::StoreConfig;
pub use crate::error::{Result, StoreError};
pub use crate::local_db_model::{Role, SessionKind, SessionRecord, UserRecord, UserTemplate};
pub use crate::local_db_state::{AppDbState, StoreTxn};
pub use crate::migration::{DestructiveRebuild, MigrationStrategy};
pub use crate::seed::{ReferenceData, SeedOutcome, SeedSummary};
pub use crate::store::{LocalStore, StoreState};

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use log::{info, warn};
use serde_json::Value as JsonValue;
use tokio::runtime::Runtime;

use crate::app_response::AppResponse;

/// A store plus the runtime that drives it for C callers.
pub struct StoreHandle {
    runtime: Runtime,
    store: LocalStore,
}

/// Opens the store `<name>.lmdb`, migrating it if needed.
///
/// Returns a null pointer if the name is null or not UTF-8, or if the store
/// cannot be opened. Release the handle with [`free_db`].
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use civic_store_core::create_db;
///
/// let name = CString::new("civic_demo").unwrap();
/// let handle = create_db(name.as_ptr());
/// assert!(!handle.is_null());
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_db(name: *const c_char) -> *mut StoreHandle {
    if name.is_null() {
        warn!("Null name pointer passed to create_db");
        return std::ptr::null_mut();
    }

    let name_str = match unsafe { CStr::from_ptr(name).to_str() } {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid UTF-8 in name parameter: {e}");
            return std::ptr::null_mut();
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("civic-store")
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            warn!("❌ Failed to start store runtime: {e}");
            return std::ptr::null_mut();
        }
    };

    let store = LocalStore::new(StoreConfig::named(name_str));
    match runtime.block_on(store.init()) {
        Ok(()) => {
            info!("✅ Store '{name_str}' initialized");
            Box::into_raw(Box::new(StoreHandle { runtime, store }))
        }
        Err(e) => {
            warn!("❌ Failed to initialize store '{name_str}': {e}");
            std::ptr::null_mut()
        }
    }
}

/// Upserts a JSON record into `collection`, keyed by its `id` field.
///
/// An existing record with the same id is replaced, not merged.
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use civic_store_core::{create_db, push_data};
///
/// let name = CString::new("civic_demo").unwrap();
/// let handle = create_db(name.as_ptr());
///
/// let collection = CString::new("reports").unwrap();
/// let json = CString::new(r#"{"id":"rpt-100","title":"Pothole"}"#).unwrap();
/// let result = push_data(handle, collection.as_ptr(), json.as_ptr());
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn push_data(
    handle: *mut StoreHandle,
    collection: *const c_char,
    json_ptr: *const c_char,
) -> *const c_char {
    let handle = match handle_ref(handle, "push_data") {
        Ok(h) => h,
        Err(err) => return err,
    };
    let collection = match parse_collection(collection) {
        Ok(c) => c,
        Err(err) => return err,
    };
    let json_str = match c_ptr_to_string(json_ptr, "JSON") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let record: JsonValue = match serde_json::from_str(&json_str) {
        Ok(v) => v,
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Invalid JSON: {e}"));
            return response_to_c_string(&error);
        }
    };

    match handle.runtime.block_on(handle.store.put(collection, &record)) {
        Ok(()) => response_to_c_string(&AppResponse::Ok(json_str)),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Alias for [`push_data`], matching endpoint naming.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn put_data(
    handle: *mut StoreHandle,
    collection: *const c_char,
    json_ptr: *const c_char,
) -> *const c_char {
    push_data(handle, collection, json_ptr)
}

/// Retrieves one record. A missing id yields a `NotFound` envelope.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_by_id(
    handle: *mut StoreHandle,
    collection: *const c_char,
    id: *const c_char,
) -> *const c_char {
    let handle = match handle_ref(handle, "get_by_id") {
        Ok(h) => h,
        Err(err) => return err,
    };
    let collection = match parse_collection(collection) {
        Ok(c) => c,
        Err(err) => return err,
    };
    let id_str = match c_ptr_to_string(id, "id") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let found = handle
        .runtime
        .block_on(handle.store.get::<JsonValue>(collection, &id_str));
    match found {
        Ok(Some(record)) => json_response(&record),
        Ok(None) => {
            let error = AppResponse::NotFound(format!("No record in '{collection}' with id: {id_str}"));
            response_to_c_string(&error)
        }
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Retrieves every record in `collection` as a JSON array.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_all(handle: *mut StoreHandle, collection: *const c_char) -> *const c_char {
    let handle = match handle_ref(handle, "get_all") {
        Ok(h) => h,
        Err(err) => return err,
    };
    let collection = match parse_collection(collection) {
        Ok(c) => c,
        Err(err) => return err,
    };

    match handle.runtime.block_on(handle.store.get_all_json(collection)) {
        Ok(records) => json_response(&records),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Deletes a record. Deleting a missing id still returns `Ok`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn delete_by_id(
    handle: *mut StoreHandle,
    collection: *const c_char,
    id: *const c_char,
) -> *const c_char {
    let handle = match handle_ref(handle, "delete_by_id") {
        Ok(h) => h,
        Err(err) => return err,
    };
    let collection = match parse_collection(collection) {
        Ok(c) => c,
        Err(err) => return err,
    };
    let id_str = match c_ptr_to_string(id, "id") {
        Ok(s) => s,
        Err(err) => return err,
    };

    match handle.runtime.block_on(handle.store.delete(collection, &id_str)) {
        Ok(()) => response_to_c_string(&AppResponse::success(format!("Deleted '{id_str}' from '{collection}'"))),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Seeds the built-in reference dataset unless the store already has reports.
///
/// The `Ok` payload is the JSON-encoded [`SeedOutcome`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn seed_reference_data(handle: *mut StoreHandle) -> *const c_char {
    let handle = match handle_ref(handle, "seed_reference_data") {
        Ok(h) => h,
        Err(err) => return err,
    };

    match handle.runtime.block_on(handle.store.seed_if_empty(ReferenceData::builtin())) {
        Ok(outcome) => json_response(&outcome),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Empties every collection. The schema stamp is kept.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn clear_all_records(handle: *mut StoreHandle) -> *const c_char {
    let handle = match handle_ref(handle, "clear_all_records") {
        Ok(h) => h,
        Err(err) => return err,
    };

    match handle.runtime.block_on(handle.store.clear_all_records()) {
        Ok(()) => response_to_c_string(&AppResponse::success("All records cleared successfully")),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Closes the store, deletes its directory and reopens it empty.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn reset_database(handle: *mut StoreHandle) -> *const c_char {
    let handle = match handle_ref(handle, "reset_database") {
        Ok(h) => h,
        Err(err) => return err,
    };

    match handle.runtime.block_on(handle.store.reset()) {
        Ok(()) => {
            let path = handle.store.config().path.display().to_string();
            response_to_c_string(&AppResponse::success(format!("Store '{path}' was reset successfully")))
        }
        Err(e) => response_to_c_string(&AppResponse::DatabaseError(format!("Error resetting store: {e}"))),
    }
}

/// Closes the environment. The handle stays valid; the next call on it
/// reopens the store.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_database(handle: *mut StoreHandle) -> *const c_char {
    let handle = match handle_ref(handle, "close_database") {
        Ok(h) => h,
        Err(err) => return err,
    };

    match handle.runtime.block_on(handle.store.close()) {
        Ok(()) => response_to_c_string(&AppResponse::success("Database connection closed successfully")),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Closes the store and releases a handle from [`create_db`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_db(handle: *mut StoreHandle) {
    if handle.is_null() {
        return;
    }
    let handle = unsafe { Box::from_raw(handle) };
    if let Err(e) = handle.runtime.block_on(handle.store.close()) {
        warn!("Error closing store while freeing handle: {e}");
    }
}

/// Releases a response string returned by any function above.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response(ptr: *const c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr as *mut c_char) });
    }
}

fn handle_ref<'a>(handle: *mut StoreHandle, caller: &str) -> std::result::Result<&'a StoreHandle, *const c_char> {
    match unsafe { handle.as_ref() } {
        Some(h) => Ok(h),
        None => {
            let error = AppResponse::BadRequest(format!("Null store pointer passed to {caller}"));
            Err(response_to_c_string(&error))
        }
    }
}

fn parse_collection(ptr: *const c_char) -> std::result::Result<CollectionName, *const c_char> {
    let name = c_ptr_to_string(ptr, "collection")?;
    name.parse::<CollectionName>()
        .map_err(|e| response_to_c_string(&AppResponse::from(e)))
}

fn json_response<T: serde::Serialize>(value: &T) -> *const c_char {
    match serde_json::to_string(value) {
        Ok(json) => response_to_c_string(&AppResponse::Ok(json)),
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Error serializing result: {e}"));
            response_to_c_string(&error)
        }
    }
}

/// Serializes the envelope into a C string owned by the caller.
///
/// Returns null only if the envelope cannot be serialized.
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}

/// Reads a C string, turning null pointers and invalid UTF-8 into a
/// `BadRequest` envelope.
fn c_ptr_to_string(ptr: *const c_char, field_name: &str) -> std::result::Result<String, *const c_char> {
    if ptr.is_null() {
        let error = AppResponse::BadRequest(format!("Null {field_name} pointer"));
        return Err(response_to_c_string(&error));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => {
            let error = AppResponse::BadRequest(format!("Invalid UTF-8 in {field_name}: {e}"));
            Err(response_to_c_string(&error))
        }
    }
}
