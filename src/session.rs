use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backend::SessionClientRef;
use crate::errors::AuthError;
use crate::models::{AuthState, Identity};

/// SessionStore
///
/// The single source of truth for "who is signed in right now". One instance
/// per running application, constructed at the root and injected, never
/// reached for ambiently.
///
/// Lifecycle: construction requests the backend's cached session and
/// subscribes to its change-notification stream; until the fetch resolves the
/// store publishes `loading = true` with no user. Every subsequent
/// session-changed event (sign-in, sign-out, token refresh, cross-tab change)
/// atomically replaces the published identity and clears `loading`.
///
/// Ordering: the subscription can fire before the initial fetch resolves
/// when a cached local token validates faster than the network round trip. The
/// store therefore stamps every resolution with a monotonically increasing
/// sequence number and discards any application older than the latest applied
/// one. Last write wins by sequence, not by arrival time.
pub struct SessionStore {
    client: SessionClientRef,
    state: watch::Sender<AuthState>,
    /// Next sequence number to hand out. The initial fetch takes its stamp
    /// before the event pump can hand out any, so a faster event outranks it.
    seq: AtomicU64,
    /// Sequence of the most recently applied resolution. Guarded so the
    /// compare-and-publish step is atomic.
    last_applied: Mutex<Option<u64>>,
    closed: AtomicBool,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    /// new
    ///
    /// Builds the store and starts its two background resolutions: the initial
    /// session fetch and the long-lived event pump. Both apply through the
    /// same sequence-checked path.
    pub fn new(client: SessionClientRef) -> Arc<Self> {
        let (state, _) = watch::channel(AuthState::initial());
        let store = Arc::new(Self {
            client: client.clone(),
            state,
            seq: AtomicU64::new(0),
            last_applied: Mutex::new(None),
            closed: AtomicBool::new(false),
            pump: Mutex::new(None),
        });

        // Stamp the fetch first: any event received afterwards carries a
        // higher sequence and wins regardless of which resolves first.
        let fetch_seq = store.next_seq();
        let fetch_store = Arc::downgrade(&store);
        let fetch_client = client.clone();
        tokio::spawn(async move {
            let resolved = match fetch_client.current_session().await {
                Ok(session) => session.map(|s| s.user),
                Err(e) => {
                    // A failed fetch still resolves the loading state; the
                    // gate must never hang in Pending on a backend error.
                    tracing::warn!(error = %e, "initial session fetch failed; resolving signed out");
                    None
                }
            };
            if let Some(store) = fetch_store.upgrade() {
                store.apply(fetch_seq, resolved);
            }
        });

        let mut events = client.subscribe();
        let pump_store = Arc::downgrade(&store);
        let pump = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(change) => {
                        let Some(store) = pump_store.upgrade() else { break };
                        let seq = store.next_seq();
                        store.apply(seq, change.map(|s| s.user));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "session event stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        *store
            .pump
            .lock()
            .expect("session store lock poisoned") = Some(pump);

        store
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// apply
    ///
    /// The sole mutation path for the published state. Discards resolutions
    /// that lost the race to a newer one, and everything after teardown.
    fn apply(&self, seq: u64, user: Option<Identity>) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        let mut last = self
            .last_applied
            .lock()
            .expect("session store lock poisoned");
        if let Some(latest) = *last {
            if seq < latest {
                tracing::debug!(seq, latest, "discarding stale session resolution");
                return false;
            }
        }
        *last = Some(seq);
        self.state.send_replace(AuthState {
            user,
            loading: false,
        });
        true
    }

    // --- Published State ---

    /// Snapshot of the current published state.
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Subscribes to state publications. The receiver always observes the
    /// latest value; intermediate states may be skipped under load.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn user(&self) -> Option<Identity> {
        self.state.borrow().user.clone()
    }

    pub fn loading(&self) -> bool {
        self.state.borrow().loading
    }

    // --- Operations ---

    /// sign_in
    ///
    /// Delegates to the backend. On success the published state updates via
    /// the change event, never via this return path, so there is exactly one
    /// way state changes. On failure `user` is untouched.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.client.sign_in_with_password(email, password).await?;
        Ok(())
    }

    /// sign_up
    ///
    /// Same contract as `sign_in`; additionally may surface
    /// `AuthError::PendingConfirmation` when the backend withholds the session
    /// until the email is confirmed.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.client.sign_up(email, password).await?;
        Ok(())
    }

    /// sign_out
    ///
    /// Requests invalidation from the backend. The store transitions to signed
    /// out only once the confirming change event arrives, never optimistically,
    /// so a failed sign-out leaves the prior session intact and returns a
    /// recoverable error.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.client.sign_out().await
    }

    // --- Teardown ---

    /// close
    ///
    /// Unsubscribes from the change stream and freezes the store. No decision
    /// may be computed against a store after teardown; late resolutions are
    /// dropped by `apply`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(pump) = self
            .pump
            .lock()
            .expect("session store lock poisoned")
            .take()
        {
            pump.abort();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.close();
    }
}
