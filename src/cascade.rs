//! Cross-collection deletes.
//!
//! The store has no foreign keys, so removing a parent means finding its
//! dependents by field and deleting them in the same transaction. Dependents
//! are read as raw JSON; records lacking the linking field are left alone.

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::collection::CollectionName;
use crate::error::Result;
use crate::local_db_state::StoreTxn;
use crate::store::LocalStore;

/// Records removed by a cascade.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeSummary {
    pub users: usize,
    pub reports: usize,
    pub comments: usize,
    pub report_history: usize,
    pub notifications: usize,
    pub sessions: usize,
}

impl CascadeSummary {
    fn absorb(&mut self, other: CascadeSummary) {
        self.users += other.users;
        self.reports += other.reports;
        self.comments += other.comments;
        self.report_history += other.report_history;
        self.notifications += other.notifications;
        self.sessions += other.sessions;
    }
}

/// Deletes a report with its comments, history and notifications.
pub fn delete_report_in(txn: &mut StoreTxn<'_>, report_id: &str) -> Result<CascadeSummary> {
    let mut summary = CascadeSummary::default();
    if txn.delete(CollectionName::Reports, report_id)? {
        summary.reports = 1;
    }
    summary.comments = delete_where(txn, CollectionName::Comments, "report_id", report_id)?;
    summary.report_history = delete_where(txn, CollectionName::ReportHistory, "report_id", report_id)?;
    summary.notifications = delete_where(txn, CollectionName::Notifications, "report_id", report_id)?;
    Ok(summary)
}

/// Deletes a user, everything they reported or wrote, notifications
/// addressed to them and any session wrapper holding them.
pub fn delete_user_in(txn: &mut StoreTxn<'_>, user_id: &str) -> Result<CascadeSummary> {
    let mut summary = CascadeSummary::default();

    let reports: Vec<JsonValue> = txn.get_all(CollectionName::Reports)?;
    for report in reports.iter().filter(|r| field_is(r, "reporter_id", user_id)) {
        if let Some(report_id) = report.get("id").and_then(JsonValue::as_str) {
            summary.absorb(delete_report_in(txn, report_id)?);
        }
    }

    summary.comments += delete_where(txn, CollectionName::Comments, "author_id", user_id)?;
    summary.notifications += delete_where(txn, CollectionName::Notifications, "user_id", user_id)?;

    let sessions: Vec<JsonValue> = txn.get_all(CollectionName::Sessions)?;
    for session in sessions.iter().filter(|s| s.get("user").is_some_and(|u| field_is(u, "id", user_id))) {
        if let Some(key) = session.get("id").and_then(JsonValue::as_str) {
            if txn.delete(CollectionName::Sessions, key)? {
                summary.sessions += 1;
            }
        }
    }

    if txn.delete(CollectionName::Users, user_id)? {
        summary.users = 1;
    }
    Ok(summary)
}

impl LocalStore {
    pub async fn delete_report_cascade(&self, report_id: &str) -> Result<CascadeSummary> {
        let id = report_id.to_owned();
        let summary = self.transaction(move |txn| delete_report_in(txn, &id)).await?;
        info!("Deleted report {report_id} with dependents: {summary:?}");
        Ok(summary)
    }

    pub async fn delete_user_cascade(&self, user_id: &str) -> Result<CascadeSummary> {
        let id = user_id.to_owned();
        let summary = self.transaction(move |txn| delete_user_in(txn, &id)).await?;
        info!("Deleted user {user_id} with dependents: {summary:?}");
        Ok(summary)
    }
}

fn delete_where(txn: &mut StoreTxn<'_>, collection: CollectionName, field: &str, value: &str) -> Result<usize> {
    let records: Vec<JsonValue> = txn.get_all(collection)?;
    let mut removed = 0;
    for record in records.iter().filter(|r| field_is(r, field, value)) {
        if let Some(id) = record.get("id").and_then(JsonValue::as_str) {
            if txn.delete(collection, id)? {
                removed += 1;
            }
        }
    }
    Ok(removed)
}

fn field_is(record: &JsonValue, field: &str, value: &str) -> bool {
    record.get(field).and_then(JsonValue::as_str) == Some(value)
}
