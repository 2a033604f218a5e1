//! Typed records the store itself reasons about.
//!
//! Most collections hold free-form JSON objects keyed by `id`. Users and
//! session wrappers get concrete types because seeding, sign-in and the
//! cascade deletes read their fields.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Citizen,
    MunicipalAdmin,
    SuperAdmin,
}

/// A user definition before credentials are attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTemplate {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub municipality: Option<String>,
    #[serde(default)]
    pub points: i64,
    pub created_at: String,
}

/// A persisted user. `password_hash` is `hex(SHA-256(salt ‖ password))`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub municipality: Option<String>,
    #[serde(default)]
    pub points: i64,
    pub salt: String,
    pub password_hash: String,
    pub created_at: String,
}

impl UserTemplate {
    pub fn with_credentials(self, salt: String, password_hash: String) -> UserRecord {
        UserRecord {
            id: self.id,
            email: self.email,
            full_name: self.full_name,
            role: self.role,
            municipality: self.municipality,
            points: self.points,
            salt,
            password_hash,
            created_at: self.created_at,
        }
    }
}

/// Which surface a session belongs to. Serialized as the session record key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKind {
    #[serde(rename = "citizen_session")]
    Citizen,
    #[serde(rename = "portal_session")]
    Portal,
    #[serde(rename = "super_admin_session")]
    SuperAdmin,
}

impl SessionKind {
    pub const ALL: [SessionKind; 3] = [SessionKind::Citizen, SessionKind::Portal, SessionKind::SuperAdmin];

    pub fn token(self) -> &'static str {
        match self {
            SessionKind::Citizen => "citizen_session",
            SessionKind::Portal => "portal_session",
            SessionKind::SuperAdmin => "super_admin_session",
        }
    }

    /// The only role allowed to hold this kind of session.
    pub fn required_role(self) -> Role {
        match self {
            SessionKind::Citizen => Role::Citizen,
            SessionKind::Portal => Role::MunicipalAdmin,
            SessionKind::SuperAdmin => Role::SuperAdmin,
        }
    }
}

impl Display for SessionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Session wrapper stored in `sessions`.
///
/// Keyed by the session kind, never by the user's id, so it cannot collide
/// with the user's own record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionKind,
    pub user: UserRecord,
    pub started_at: String,
}
