use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Core Identity & Session Schemas ---

/// Identity
///
/// The currently authenticated principal: the minimal pair of id and email.
/// Owned exclusively by the `SessionStore`; every other component only ever
/// reads it out of the published `AuthState`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    // Primary key, issued by the external auth service (auth.users.id).
    pub id: Uuid,
    pub email: String,
}

/// Session
///
/// The backend's credential artifact backing an `Identity`. The store holds a
/// cached, possibly-stale copy of this and treats it as authoritative only
/// after its own `loading` flag clears.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub user: Identity,
    /// Timestamp after which the access token must not be accepted.
    pub expires_at: DateTime<Utc>,
    /// Opaque token the backend uses to mint a replacement session.
    pub refresh_token: String,
    /// Bearer token attached to authenticated backend calls (e.g. sign-out).
    pub access_token: String,
}

/// Role
///
/// The permission level granted by a row in the `user_roles` table.
/// Roles are looked up, not embedded in the session, so a role change never
/// requires re-authentication.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
}

/// RoleRecord
///
/// One row of the secondary roles table, keyed by user id. Absence of a
/// record means the user is an ordinary member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleRecord {
    pub user_id: Uuid,
    pub role: Role,
}

/// AuthState
///
/// The pair the `SessionStore` publishes on every change. `user` is only
/// meaningful once `loading` is false; until the initial session fetch
/// resolves, consumers must treat the state as undetermined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<Identity>,
    pub loading: bool,
}

impl AuthState {
    /// The state every store starts in: nothing known yet.
    pub fn initial() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }

    /// True once loading has cleared and an identity is present.
    pub fn signed_in(&self) -> bool {
        !self.loading && self.user.is_some()
    }
}
