//! Session wrappers and demo sign-in.

use log::{debug, info, warn};
use serde_json::Value as JsonValue;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::collection::CollectionName;
use crate::credentials::verify_password;
use crate::error::Result;
use crate::local_db_model::{SessionKind, SessionRecord, UserRecord};
use crate::store::LocalStore;

impl LocalStore {
    /// Stores `user` as the active session of `kind`, replacing any previous
    /// one.
    pub async fn save_session(&self, kind: SessionKind, user: UserRecord) -> Result<SessionRecord> {
        let session = SessionRecord {
            id: kind,
            user,
            started_at: now_rfc3339()?,
        };
        self.put(CollectionName::Sessions, &session).await?;
        info!("Session '{kind}' started for {}", session.user.id);
        Ok(session)
    }

    pub async fn session(&self, kind: SessionKind) -> Result<Option<SessionRecord>> {
        self.get(CollectionName::Sessions, kind.token()).await
    }

    pub async fn end_session(&self, kind: SessionKind) -> Result<()> {
        self.delete(CollectionName::Sessions, kind.token()).await
    }

    /// Checks `email`/`password` against stored credentials and opens a
    /// session of `kind`.
    ///
    /// Users are matched on their raw `email` field, so records of other
    /// shapes in `users` never break sign-in. Unknown e-mail, a matched record
    /// without credentials, a role that cannot hold `kind` and a wrong
    /// password all return `Ok(None)`.
    pub async fn sign_in(&self, kind: SessionKind, email: &str, password: &str) -> Result<Option<SessionRecord>> {
        let email = email.trim();
        let users: Vec<JsonValue> = self.get_all(CollectionName::Users).await?;
        let Some(raw) = users.into_iter().find(|u| {
            u.get("email")
                .and_then(JsonValue::as_str)
                .is_some_and(|e| e.eq_ignore_ascii_case(email))
        }) else {
            debug!("Sign-in rejected: no user for the given e-mail");
            return Ok(None);
        };

        let user: UserRecord = match serde_json::from_value(raw) {
            Ok(user) => user,
            Err(e) => {
                warn!("Sign-in rejected: matching user record has no usable credentials: {e}");
                return Ok(None);
            }
        };

        let password_ok = verify_password(password, &user.salt, &user.password_hash);
        if user.role != kind.required_role() || !password_ok {
            debug!("Sign-in rejected for {} on '{kind}'", user.id);
            return Ok(None);
        }

        self.save_session(kind, user).await.map(Some)
    }
}

fn now_rfc3339() -> Result<String> {
    Ok(OffsetDateTime::now_utc().format(&Rfc3339)?)
}
