//! One-time seeding of reference and demo data.
//!
//! The gate is a count of `reports`: a store with any report is considered
//! seeded. Seeding itself hashes every demo credential and writes the whole
//! reference corpus in one transaction.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::collection::CollectionName;
use crate::credentials::derive_credentials;
use crate::error::Result;
use crate::local_db_model::{Role, UserRecord, UserTemplate};
use crate::store::LocalStore;

pub const SUPER_ADMIN_PASSWORD: &str = "superadmin123";
pub const ADMIN_PASSWORD: &str = "admin123";
pub const CITIZEN_PASSWORD: &str = "citizen123";

/// Demo plaintext password for a role tier.
pub fn tier_password(role: Role) -> &'static str {
    match role {
        Role::SuperAdmin => SUPER_ADMIN_PASSWORD,
        Role::MunicipalAdmin => ADMIN_PASSWORD,
        Role::Citizen => CITIZEN_PASSWORD,
    }
}

/// Everything written by a seed run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceData {
    pub super_admin: UserTemplate,
    pub admins: Vec<UserTemplate>,
    pub citizens: Vec<UserTemplate>,
    pub reports: Vec<JsonValue>,
    pub comments: Vec<JsonValue>,
    pub report_history: Vec<JsonValue>,
    pub categories: Vec<JsonValue>,
    pub badges: Vec<JsonValue>,
    pub gamification: Vec<JsonValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSummary {
    pub users: usize,
    pub reports: usize,
    pub comments: usize,
    pub report_history: usize,
    pub categories: usize,
    pub badges: usize,
    pub gamification: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SeedOutcome {
    Seeded(SeedSummary),
    AlreadySeeded,
}

impl ReferenceData {
    pub fn user_count(&self) -> usize {
        1 + self.admins.len() + self.citizens.len()
    }

    fn templates(&self) -> impl Iterator<Item = &UserTemplate> {
        std::iter::once(&self.super_admin)
            .chain(self.admins.iter())
            .chain(self.citizens.iter())
    }

    /// The compiled-in demo dataset.
    pub fn builtin() -> Self {
        Self {
            super_admin: user("usr-super-001", "superadmin@civicwatch.local", "Sam Rivera", Role::SuperAdmin, None, 0),
            admins: vec![
                user("usr-admin-001", "admin@springfield.gov", "Jordan Price", Role::MunicipalAdmin, Some("springfield"), 0),
                user("usr-admin-002", "admin@riverton.gov", "Alex Moreno", Role::MunicipalAdmin, Some("riverton"), 0),
            ],
            citizens: vec![
                user("usr-cit-001", "maria@example.com", "Maria Lopez", Role::Citizen, Some("springfield"), 120),
                user("usr-cit-002", "dev@example.com", "Devon Kim", Role::Citizen, Some("springfield"), 45),
                user("usr-cit-003", "amira@example.com", "Amira Haddad", Role::Citizen, Some("riverton"), 210),
                user("usr-cit-004", "tomas@example.com", "Tomas Novak", Role::Citizen, Some("riverton"), 15),
                user("usr-cit-005", "lena@example.com", "Lena Fischer", Role::Citizen, Some("springfield"), 0),
            ],
            reports: vec![
                report("rpt-001", "usr-cit-001", "springfield", "cat-roads", "Deep pothole on Main St", "in_progress", 39.7817, -89.6501, "2024-03-02T08:15:00Z"),
                report("rpt-002", "usr-cit-002", "springfield", "cat-lighting", "Streetlight out near the school", "submitted", 39.7990, -89.6440, "2024-03-05T19:42:00Z"),
                report("rpt-003", "usr-cit-003", "riverton", "cat-waste", "Overflowing bins at the park entrance", "resolved", 43.0247, -108.3801, "2024-02-21T11:03:00Z"),
                report("rpt-004", "usr-cit-004", "riverton", "cat-water", "Water leak from hydrant", "acknowledged", 43.0311, -108.3952, "2024-03-08T07:30:00Z"),
                report("rpt-005", "usr-cit-001", "springfield", "cat-parks", "Broken swing in Lincoln Park", "submitted", 39.8012, -89.6620, "2024-03-10T15:20:00Z"),
                report("rpt-006", "usr-cit-003", "riverton", "cat-roads", "Faded crosswalk markings", "rejected", 43.0280, -108.3870, "2024-01-30T09:55:00Z"),
            ],
            comments: vec![
                comment("cmt-001", "rpt-001", "usr-cit-002", "Nearly lost a tyre here yesterday.", "2024-03-03T10:00:00Z"),
                comment("cmt-002", "rpt-001", "usr-admin-001", "Crew scheduled for Thursday.", "2024-03-04T09:12:00Z"),
                comment("cmt-003", "rpt-003", "usr-admin-002", "Collection frequency increased.", "2024-02-23T14:40:00Z"),
                comment("cmt-004", "rpt-004", "usr-cit-003", "Still leaking this morning.", "2024-03-09T08:05:00Z"),
                comment("cmt-005", "rpt-006", "usr-admin-002", "Repainting is planned for the spring programme.", "2024-02-01T16:30:00Z"),
            ],
            report_history: vec![
                history("hst-001", "rpt-001", "submitted", "acknowledged", "usr-admin-001", "2024-03-02T12:00:00Z"),
                history("hst-002", "rpt-001", "acknowledged", "in_progress", "usr-admin-001", "2024-03-04T09:10:00Z"),
                history("hst-003", "rpt-003", "submitted", "in_progress", "usr-admin-002", "2024-02-22T08:00:00Z"),
                history("hst-004", "rpt-003", "in_progress", "resolved", "usr-admin-002", "2024-02-23T14:35:00Z"),
                history("hst-005", "rpt-004", "submitted", "acknowledged", "usr-admin-002", "2024-03-08T10:00:00Z"),
                history("hst-006", "rpt-006", "submitted", "rejected", "usr-admin-002", "2024-02-01T16:25:00Z"),
            ],
            categories: vec![
                category("cat-roads", "Roads & Sidewalks", "🛣️", &["Pothole", "Damaged sidewalk", "Road markings"]),
                category("cat-lighting", "Street Lighting", "💡", &["Light out", "Flickering light"]),
                category("cat-waste", "Waste & Cleanliness", "🗑️", &["Overflowing bin", "Illegal dumping", "Graffiti"]),
                category("cat-water", "Water & Drainage", "🚰", &["Leak", "Blocked drain", "Flooding"]),
                category("cat-parks", "Parks & Green Areas", "🌳", &["Damaged equipment", "Fallen tree"]),
                category("cat-other", "Other", "📌", &[]),
            ],
            badges: vec![
                badge("bdg-first-report", "First Report", "Submitted a first report", 1, 0),
                badge("bdg-active-citizen", "Active Citizen", "Submitted ten reports", 10, 0),
                badge("bdg-community-voice", "Community Voice", "Reached 100 points", 0, 100),
                badge("bdg-city-hero", "City Hero", "Reached 500 points", 0, 500),
            ],
            gamification: vec![json!({
                "id": "default",
                "points_per_report": 10,
                "points_per_comment": 2,
                "points_per_upvote": 1,
                "points_on_resolution": 15,
                "daily_report_cap": 5,
                "enabled": true,
            })],
        }
    }
}

impl LocalStore {
    /// Seeds `reference` unless `reports` already holds a record.
    ///
    /// Concurrent calls are serialized on a seed gate and the emptiness check
    /// is repeated inside the write transaction, so exactly one call writes
    /// the dataset and the others return [`SeedOutcome::AlreadySeeded`].
    pub async fn seed_if_empty(&self, reference: ReferenceData) -> Result<SeedOutcome> {
        let _gate = self.seed_gate.lock().await;

        if self.count(CollectionName::Reports).await? > 0 {
            info!("Reports present; skipping reference seed");
            return Ok(SeedOutcome::AlreadySeeded);
        }

        let db = self.lease().await?;
        tokio::task::spawn_blocking(move || {
            let users = hash_templates(&reference)?;
            db.write(move |txn| {
                if txn.count(CollectionName::Reports)? > 0 {
                    warn!("Reports appeared while seeding was pending; keeping the existing data");
                    return Ok(SeedOutcome::AlreadySeeded);
                }

                for collection in CollectionName::ALL {
                    let existing = txn.count(collection)?;
                    if existing > 0 {
                        warn!("Seeding wipes {existing} record(s) left in '{collection}'");
                    }
                    txn.clear(collection)?;
                }

                for user in &users {
                    txn.put(CollectionName::Users, user)?;
                }
                let groups = [
                    (CollectionName::Reports, &reference.reports),
                    (CollectionName::Comments, &reference.comments),
                    (CollectionName::ReportHistory, &reference.report_history),
                    (CollectionName::DynamicCategories, &reference.categories),
                    (CollectionName::DynamicBadges, &reference.badges),
                    (CollectionName::GamificationSettings, &reference.gamification),
                ];
                for (collection, records) in groups {
                    for record in records {
                        txn.put(collection, record)?;
                    }
                }

                let summary = SeedSummary {
                    users: users.len(),
                    reports: reference.reports.len(),
                    comments: reference.comments.len(),
                    report_history: reference.report_history.len(),
                    categories: reference.categories.len(),
                    badges: reference.badges.len(),
                    gamification: reference.gamification.len(),
                };
                info!("Seeded reference data: {summary:?}");
                Ok(SeedOutcome::Seeded(summary))
            })
        })
        .await?
    }
}

/// Attaches a fresh salt and tier-password hash to every template.
fn hash_templates(reference: &ReferenceData) -> Result<Vec<UserRecord>> {
    reference
        .templates()
        .map(|template| -> Result<UserRecord> {
            let (salt, hash) = derive_credentials(tier_password(template.role))?;
            Ok(template.clone().with_credentials(salt, hash))
        })
        .collect()
}

const SEEDED_AT: &str = "2024-01-01T00:00:00Z";

fn user(id: &str, email: &str, full_name: &str, role: Role, municipality: Option<&str>, points: i64) -> UserTemplate {
    UserTemplate {
        id: id.to_string(),
        email: email.to_string(),
        full_name: full_name.to_string(),
        role,
        municipality: municipality.map(str::to_string),
        points,
        created_at: SEEDED_AT.to_string(),
    }
}

#[allow(clippy::too_many_arguments)]
fn report(
    id: &str,
    reporter_id: &str,
    municipality: &str,
    category_id: &str,
    title: &str,
    status: &str,
    lat: f64,
    lng: f64,
    created_at: &str,
) -> JsonValue {
    json!({
        "id": id,
        "reporter_id": reporter_id,
        "municipality": municipality,
        "category_id": category_id,
        "title": title,
        "status": status,
        "location": { "lat": lat, "lng": lng },
        "upvotes": 0,
        "subscribers": [reporter_id],
        "created_at": created_at,
    })
}

fn comment(id: &str, report_id: &str, author_id: &str, body: &str, created_at: &str) -> JsonValue {
    json!({
        "id": id,
        "report_id": report_id,
        "author_id": author_id,
        "body": body,
        "created_at": created_at,
    })
}

fn history(id: &str, report_id: &str, from: &str, to: &str, changed_by: &str, changed_at: &str) -> JsonValue {
    json!({
        "id": id,
        "report_id": report_id,
        "from_status": from,
        "to_status": to,
        "changed_by": changed_by,
        "changed_at": changed_at,
    })
}

fn category(id: &str, name: &str, icon: &str, subcategories: &[&str]) -> JsonValue {
    json!({
        "id": id,
        "name": name,
        "icon": icon,
        "subcategories": subcategories,
        "active": true,
    })
}

fn badge(id: &str, name: &str, description: &str, min_reports: u32, min_points: u32) -> JsonValue {
    json!({
        "id": id,
        "name": name,
        "description": description,
        "min_reports": min_reports,
        "min_points": min_points,
    })
}
