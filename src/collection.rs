//! The closed set of record collections and the compiled schema version.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Schema version compiled into this build.
///
/// Bumping it makes the next [`init`](crate::store::LocalStore::init) run the
/// configured migration strategy before anything else touches the store.
pub const SCHEMA_VERSION: u32 = 3;

/// Internal database holding the persisted schema stamp.
pub(crate) const META_DB: &str = "__meta";
pub(crate) const SCHEMA_VERSION_KEY: &str = "schema_version";

/// A named collection of JSON records keyed by their `id` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CollectionName {
    Users,
    Reports,
    Notifications,
    Comments,
    ReportHistory,
    Sessions,
    DynamicCategories,
    DynamicBadges,
    GamificationSettings,
    AuditLogs,
}

impl CollectionName {
    pub const ALL: [CollectionName; 10] = [
        CollectionName::Users,
        CollectionName::Reports,
        CollectionName::Notifications,
        CollectionName::Comments,
        CollectionName::ReportHistory,
        CollectionName::Sessions,
        CollectionName::DynamicCategories,
        CollectionName::DynamicBadges,
        CollectionName::GamificationSettings,
        CollectionName::AuditLogs,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CollectionName::Users => "users",
            CollectionName::Reports => "reports",
            CollectionName::Notifications => "notifications",
            CollectionName::Comments => "comments",
            CollectionName::ReportHistory => "report-history",
            CollectionName::Sessions => "sessions",
            CollectionName::DynamicCategories => "dynamic-categories",
            CollectionName::DynamicBadges => "dynamic-badges",
            CollectionName::GamificationSettings => "gamification-settings",
            CollectionName::AuditLogs => "audit-logs",
        }
    }
}

impl Display for CollectionName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionName {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CollectionName::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| StoreError::UnknownCollection(s.to_string()))
    }
}

impl TryFrom<String> for CollectionName {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CollectionName> for String {
    fn from(value: CollectionName) -> Self {
        value.as_str().to_string()
    }
}
