use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::backend::SessionClientRef;
use crate::errors::AuthError;
use crate::models::{AuthState, Identity};
use crate::roles::{AdminCheck, RoleDirectoryRef, RoleResolver};
use crate::session::SessionStore;
use tokio::sync::watch;

/// AuthContext
///
/// The single façade every page and the route gate depend on. Composes the
/// `SessionStore` and `RoleResolver` and re-publishes whenever the store's
/// state changes. This is the sole propagation path; no consumer talks to the
/// store directly.
///
/// Errors from the underlying operations pass through unchanged: the context
/// never catches and hides what the sign-in form needs to display.
pub struct AuthContext {
    store: Arc<SessionStore>,
    resolver: Arc<RoleResolver>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl AuthContext {
    /// new
    ///
    /// Builds the context over a session client and a role directory, and
    /// starts the watcher that invalidates the role cache on every identity
    /// change (a new sign-in must never reuse the previous user's answer).
    pub fn new(client: SessionClientRef, directory: RoleDirectoryRef) -> Arc<Self> {
        let store = SessionStore::new(client);
        let resolver = Arc::new(RoleResolver::new(directory));

        let watcher = {
            let mut state_rx = store.subscribe();
            let resolver = Arc::downgrade(&resolver);
            let mut last_seen: Option<Uuid> = state_rx.borrow().user.as_ref().map(|u| u.id);
            tokio::spawn(async move {
                while state_rx.changed().await.is_ok() {
                    let current = state_rx.borrow().user.as_ref().map(|u| u.id);
                    if current != last_seen {
                        let Some(resolver) = resolver.upgrade() else { break };
                        tracing::debug!("identity changed, dropping cached role answer");
                        resolver.invalidate();
                        last_seen = current;
                    }
                }
            })
        };

        Arc::new(Self {
            store,
            resolver,
            watcher: Mutex::new(Some(watcher)),
        })
    }

    // --- Published State ---

    pub fn user(&self) -> Option<Identity> {
        self.store.user()
    }

    pub fn loading(&self) -> bool {
        self.store.loading()
    }

    pub fn state(&self) -> AuthState {
        self.store.state()
    }

    /// Subscribes to state publications, for the route gate and any component
    /// that renders differently for signed-in users.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.store.subscribe()
    }

    // --- Operations (transparent pass-through) ---

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.store.sign_in(email, password).await
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.store.sign_up(email, password).await
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.store.sign_out().await
    }

    /// is_admin
    ///
    /// Evaluated lazily against the *current* user at call time, never cached
    /// at context creation. After the async lookup resolves, the identity is
    /// re-checked: a user may sign out or switch accounts mid-flight, and a
    /// resolution computed against a superseded identity must be discarded
    /// rather than applied (cooperative staleness guard).
    pub async fn is_admin(&self) -> AdminCheck {
        let identity = self.store.user();
        let check = self.resolver.is_admin(identity.as_ref()).await;

        let current = self.store.user().map(|u| u.id);
        if identity.map(|u| u.id) != current {
            return AdminCheck::Undetermined(AuthError::RoleLookupFailed(
                "identity changed during role lookup".to_string(),
            ));
        }
        check
    }

    // --- Teardown ---

    /// close
    ///
    /// Stops the invalidation watcher and tears down the underlying store.
    pub fn close(&self) {
        if let Some(watcher) = self
            .watcher
            .lock()
            .expect("auth context lock poisoned")
            .take()
        {
            watcher.abort();
        }
        self.store.close();
    }
}

impl Drop for AuthContext {
    fn drop(&mut self) {
        self.close();
    }
}
