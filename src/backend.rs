use async_trait::async_trait;
use chrono::{Duration as ExpiryWindow, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::AuthError;
use crate::models::{Identity, Session};

/// SessionChange
///
/// The payload of a session-changed event: the new session, or `None` for a
/// confirmed sign-out. Fired by the backend for sign-in, sign-out, token
/// refresh, and cross-tab changes alike; the store treats them all the same.
pub type SessionChange = Option<Session>;

// Capacity of the change-event channel. Events are tiny and consumed promptly
// by the store's pump; a small buffer is plenty.
const EVENT_CHANNEL_CAPACITY: usize = 16;

// 1. SessionClient Contract

/// SessionClient
///
/// Defines the abstract contract with the external authentication service.
/// This trait lets us swap the concrete implementation (the real Supabase
/// client `HttpSessionClient` in production, the in-memory `MockSessionClient`
/// during testing) without affecting the `SessionStore`.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn SessionClient>`) safely shareable across task boundaries.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Returns the backend's cached notion of the current session, without
    /// forcing a fresh network round trip where the backend holds one locally.
    async fn current_session(&self) -> Result<Option<Session>, AuthError>;

    /// Subscribes to the session-changed event stream. Dropping the receiver
    /// unsubscribes, which makes teardown visible in the type signature.
    fn subscribe(&self) -> broadcast::Receiver<SessionChange>;

    /// Exchanges an email/password pair for a session. On success the client
    /// also publishes the change on its event stream; consumers update from
    /// the event, never from this return value, to keep a single update path.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError>;

    /// Creates an account. May surface `AuthError::PendingConfirmation` when
    /// the backend requires email confirmation before a session exists.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// Requests invalidation of the current session. The corresponding
    /// sign-out event is published only after the backend confirms.
    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// SessionClientRef
///
/// The concrete type used to share the session client across the application.
pub type SessionClientRef = Arc<dyn SessionClient>;

// 2. The Real Implementation (Supabase Auth)

/// HttpSessionClient
///
/// The concrete implementation backed by the Supabase auth API (`/auth/v1/*`),
/// the same service the club site authenticates against. Successful operations
/// update the locally cached session and publish the change on the event
/// stream; failures leave both untouched.
pub struct HttpSessionClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    current: Mutex<Option<Session>>,
    events: broadcast::Sender<SessionChange>,
}

/// TokenResponse
///
/// Minimal struct to deserialize the session-bearing responses from the
/// Supabase token and signup endpoints.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    /// Lifetime of the access token, in seconds.
    expires_in: i64,
    user: AuthUserPayload,
}

#[derive(Deserialize)]
struct AuthUserPayload {
    id: Uuid,
    email: String,
}

impl HttpSessionClient {
    /// Constructs the client from the loaded application configuration.
    pub fn new(config: &AppConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            http: reqwest::Client::new(),
            base_url: config.backend_url.clone(),
            anon_key: config.anon_key.clone(),
            current: Mutex::new(None),
            events,
        }
    }

    /// Installs the session as current and publishes the change event.
    /// This is the only place the real client mutates its cached session.
    fn install(&self, session: Option<Session>) {
        *self
            .current
            .lock()
            .expect("session client lock poisoned") = session.clone();
        // A send error only means no subscriber is currently attached.
        let _ = self.events.send(session);
    }

    fn session_from(&self, token: TokenResponse) -> Session {
        Session {
            user: Identity {
                id: token.user.id,
                email: token.user.email,
            },
            expires_at: Utc::now() + ExpiryWindow::seconds(token.expires_in),
            refresh_token: token.refresh_token,
            access_token: token.access_token,
        }
    }
}

#[async_trait]
impl SessionClient for HttpSessionClient {
    /// current_session
    ///
    /// Returns the locally cached session. A fresh process has none; the cache
    /// fills as soon as a sign-in succeeds or an external event arrives.
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self
            .current
            .lock()
            .expect("session client lock poisoned")
            .clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.events.subscribe()
    }

    /// sign_in_with_password
    ///
    /// Calls the password-grant token endpoint. Supabase answers 4xx for a
    /// rejected credential pair, which maps to `InvalidCredentials`; transport
    /// failures map to `Network`.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);

        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(AuthError::Network(format!(
                "auth backend answered {status}"
            )));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let session = self.session_from(token);
        tracing::info!("Signed in: {}", session.user.email);
        self.install(Some(session.clone()));
        Ok(session)
    }

    /// sign_up
    ///
    /// Calls the signup endpoint. When email confirmation is enabled the
    /// response carries a bare user object with no tokens; that is surfaced as
    /// `PendingConfirmation` rather than an immediate sign-in.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let url = format!("{}/auth/v1/signup", self.base_url);

        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            // Rejected sign-up (existing email, weak password).
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(AuthError::Network(format!(
                "auth backend answered {status}"
            )));
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if body.get("access_token").is_none() {
            // Account created, session withheld until the email is confirmed.
            return Err(AuthError::PendingConfirmation);
        }

        let token: TokenResponse = serde_json::from_value(body)
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let session = self.session_from(token);
        tracing::info!("Account created and signed in: {}", session.user.email);
        self.install(Some(session.clone()));
        Ok(session)
    }

    /// sign_out
    ///
    /// Asks the backend to revoke the current session. The cached session and
    /// the sign-out event are only cleared/published once the backend
    /// confirms. A failed request leaves the prior session intact.
    async fn sign_out(&self) -> Result<(), AuthError> {
        let access_token = {
            let current = self
                .current
                .lock()
                .expect("session client lock poisoned");
            match current.as_ref() {
                Some(session) => session.access_token.clone(),
                None => return Err(AuthError::NotAuthenticated),
            }
        };

        let url = format!("{}/auth/v1/logout", self.base_url);
        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !response.status().is_success() {
            tracing::error!("sign-out rejected by backend: {}", response.status());
            return Err(AuthError::Network(format!(
                "auth backend answered {}",
                response.status()
            )));
        }

        tracing::info!("Signed out");
        self.install(None);
        Ok(())
    }
}

// 3. The Mock Implementation (For Tests)

/// MockSessionClient
///
/// An in-memory implementation of `SessionClient` used by this crate's tests
/// and available to downstream shells for isolated setups. Accounts are
/// registered up front; failure modes and a configurable fetch delay let tests
/// script races and backend outages deterministically.
pub struct MockSessionClient {
    events: broadcast::Sender<SessionChange>,
    current: Mutex<Option<Session>>,
    accounts: Mutex<HashMap<String, (String, Identity)>>,
    /// Delay applied to `current_session`, simulating a slow initial fetch.
    pub fetch_delay: Option<Duration>,
    /// When true, sign-out fails with a network error and confirms nothing.
    pub fail_sign_out: bool,
    /// When true, sign-up answers `PendingConfirmation` instead of a session.
    pub require_confirmation: bool,
    /// When true, every backend call fails with a network error.
    pub offline: bool,
}

impl MockSessionClient {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            events,
            current: Mutex::new(None),
            accounts: Mutex::new(HashMap::new()),
            fetch_delay: None,
            fail_sign_out: false,
            require_confirmation: false,
            offline: false,
        }
    }

    /// Seeds the backend-side session cache, as if a prior visit left a valid
    /// local token behind.
    pub fn with_cached_session(self, session: Session) -> Self {
        *self.current.lock().expect("mock lock poisoned") = Some(session);
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn failing_sign_out(mut self) -> Self {
        self.fail_sign_out = true;
        self
    }

    pub fn requiring_confirmation(mut self) -> Self {
        self.require_confirmation = true;
        self
    }

    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Registers a known account so `sign_in_with_password` can succeed.
    pub fn register_account(&self, email: &str, password: &str) -> Identity {
        let identity = Identity {
            id: Uuid::new_v4(),
            email: email.to_string(),
        };
        self.accounts
            .lock()
            .expect("mock lock poisoned")
            .insert(email.to_string(), (password.to_string(), identity.clone()));
        identity
    }

    /// Publishes a backend-originated event (cross-tab change, token refresh)
    /// without going through any of the request methods.
    pub fn emit(&self, change: SessionChange) {
        *self.current.lock().expect("mock lock poisoned") = change.clone();
        let _ = self.events.send(change);
    }

    /// Builds a session artifact for an identity, one hour from expiry.
    pub fn session_for(identity: Identity) -> Session {
        Session {
            user: identity,
            expires_at: Utc::now() + ExpiryWindow::hours(1),
            refresh_token: format!("refresh-{}", Uuid::new_v4()),
            access_token: format!("access-{}", Uuid::new_v4()),
        }
    }

    fn install(&self, session: Option<Session>) {
        *self.current.lock().expect("mock lock poisoned") = session.clone();
        let _ = self.events.send(session);
    }
}

impl Default for MockSessionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionClient for MockSessionClient {
    /// current_session
    ///
    /// Snapshots the cached session *before* sleeping through the configured
    /// delay, so an event emitted mid-fetch makes this resolution stale:
    /// exactly the init-vs-event race the store must win by sequence number.
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        let snapshot = self.current.lock().expect("mock lock poisoned").clone();
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        if self.offline {
            return Err(AuthError::Network("mock backend offline".to_string()));
        }
        Ok(snapshot)
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        if self.offline {
            return Err(AuthError::Network("mock backend offline".to_string()));
        }

        let identity = {
            let accounts = self.accounts.lock().expect("mock lock poisoned");
            match accounts.get(email) {
                Some((expected, identity)) if expected == password => identity.clone(),
                _ => return Err(AuthError::InvalidCredentials),
            }
        };

        let session = Self::session_for(identity);
        self.install(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        if self.offline {
            return Err(AuthError::Network("mock backend offline".to_string()));
        }

        let identity = self.register_account(email, password);

        if self.require_confirmation {
            return Err(AuthError::PendingConfirmation);
        }

        let session = Self::session_for(identity);
        self.install(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if self.offline || self.fail_sign_out {
            // No confirmation event: the prior session stays in place.
            return Err(AuthError::Network("mock backend offline".to_string()));
        }
        self.install(None);
        Ok(())
    }
}
