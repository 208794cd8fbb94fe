use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::AuthError;
use crate::models::{Identity, Role, RoleRecord};

// 1. RoleDirectory Contract

/// RoleDirectory
///
/// Abstract contract for the secondary roles table: a point lookup keyed by
/// user id. Kept separate from the session backend because roles are looked
/// up on demand, never pushed with the session.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Fetches the role record for a user, or `None` when no row exists
    /// (which means ordinary member).
    async fn role_for(&self, user_id: Uuid) -> Result<Option<RoleRecord>, AuthError>;
}

/// RoleDirectoryRef
///
/// The concrete type used to share the directory across the application.
pub type RoleDirectoryRef = Arc<dyn RoleDirectory>;

// 2. The Real Implementation (user_roles table)

/// HttpRoleDirectory
///
/// Point lookup against the club site's `user_roles` table through the
/// backend's REST interface (`/rest/v1/user_roles?user_id=eq.{id}`).
pub struct HttpRoleDirectory {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl HttpRoleDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.backend_url.clone(),
            anon_key: config.anon_key.clone(),
        }
    }
}

#[async_trait]
impl RoleDirectory for HttpRoleDirectory {
    async fn role_for(&self, user_id: Uuid) -> Result<Option<RoleRecord>, AuthError> {
        let url = format!(
            "{}/rest/v1/user_roles?select=user_id,role&user_id=eq.{}",
            self.base_url, user_id
        );

        let response = self
            .http
            .get(url)
            .header("apikey", &self.anon_key)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Network(format!(
                "role table answered {}",
                response.status()
            )));
        }

        let mut rows = response
            .json::<Vec<RoleRecord>>()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        // user_id is the table's key; at most one row comes back.
        Ok(rows.drain(..).next())
    }
}

// 3. The Mock Implementation (For Tests)

/// MockRoleDirectory
///
/// In-memory roles table with switchable failure mode and a lookup counter,
/// so tests can assert both fail-closed behavior and that no lookup happened
/// where none is allowed.
#[derive(Default)]
pub struct MockRoleDirectory {
    roles: Mutex<HashMap<Uuid, Role>>,
    fail: AtomicBool,
    lookups: AtomicUsize,
    /// Delay applied to every lookup, simulating a slow roles backend.
    pub delay: Option<std::time::Duration>,
}

impl MockRoleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn grant(&self, user_id: Uuid, role: Role) {
        self.roles
            .lock()
            .expect("mock lock poisoned")
            .insert(user_id, role);
    }

    pub fn revoke(&self, user_id: Uuid) {
        self.roles
            .lock()
            .expect("mock lock poisoned")
            .remove(&user_id);
    }

    /// Switches every subsequent lookup to a simulated backend failure.
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoleDirectory for MockRoleDirectory {
    async fn role_for(&self, user_id: Uuid) -> Result<Option<RoleRecord>, AuthError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AuthError::Network("mock role table offline".to_string()));
        }
        let role = self
            .roles
            .lock()
            .expect("mock lock poisoned")
            .get(&user_id)
            .copied();
        Ok(role.map(|role| RoleRecord { user_id, role }))
    }
}

// 4. The Resolver

/// AdminCheck
///
/// The three-way outcome of an admin check. `Undetermined` still denies
/// (authorization is fail-closed, never fail-open) but stays distinguishable
/// from a genuine `NotAdmin` so the caller can offer a retry affordance
/// instead of a permanent denial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCheck {
    Admin,
    NotAdmin,
    Undetermined(AuthError),
}

impl AdminCheck {
    /// The fail-closed boolean view: true only for a confirmed admin.
    pub fn is_admin(&self) -> bool {
        matches!(self, AdminCheck::Admin)
    }
}

/// RoleResolver
///
/// Answers "does this identity hold the admin role?" via the directory,
/// caching the answer per user id. The cache must be invalidated whenever the
/// session store's identity changes (the `AuthContext` wires that up); a new
/// sign-in must never reuse a stale answer for a different or previous user.
/// Failures are never cached.
pub struct RoleResolver {
    directory: RoleDirectoryRef,
    cache: Mutex<Option<(Uuid, Role)>>,
}

impl RoleResolver {
    pub fn new(directory: RoleDirectoryRef) -> Self {
        Self {
            directory,
            cache: Mutex::new(None),
        }
    }

    /// is_admin
    ///
    /// An absent identity is `NotAdmin` immediately, with zero lookups.
    /// Otherwise a point lookup resolves the role; a missing record means
    /// member. Lookup failures are logged and surfaced as `Undetermined`
    /// carrying `RoleLookupFailed`.
    pub async fn is_admin(&self, identity: Option<&Identity>) -> AdminCheck {
        let Some(identity) = identity else {
            return AdminCheck::NotAdmin;
        };

        if let Some((cached_id, role)) = *self.cache.lock().expect("role cache lock poisoned") {
            if cached_id == identity.id {
                return match role {
                    Role::Admin => AdminCheck::Admin,
                    Role::Member => AdminCheck::NotAdmin,
                };
            }
        }

        match self.directory.role_for(identity.id).await {
            Ok(record) => {
                let role = record.map(|r| r.role).unwrap_or(Role::Member);
                *self.cache.lock().expect("role cache lock poisoned") =
                    Some((identity.id, role));
                match role {
                    Role::Admin => AdminCheck::Admin,
                    Role::Member => AdminCheck::NotAdmin,
                }
            }
            Err(e) => {
                tracing::error!(user_id = %identity.id, error = %e, "role lookup failed");
                AdminCheck::Undetermined(AuthError::RoleLookupFailed(e.to_string()))
            }
        }
    }

    /// Drops the cached answer. Called on every identity change, including
    /// sign-out.
    pub fn invalidate(&self) {
        *self.cache.lock().expect("role cache lock poisoned") = None;
    }
}
