use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// --- Module Structure ---

// Core authentication and authorization components.
pub mod auth;
pub mod backend;
pub mod config;
pub mod errors;
pub mod gate;
pub mod models;
pub mod roles;
pub mod session;

// Viewport-driven reveal signals, consumed by every animated page section.
pub mod visibility;

// --- Public Re-exports ---

// Makes the core types easily accessible to the consuming application shell.
pub use auth::AuthContext;
pub use backend::{HttpSessionClient, MockSessionClient, SessionClientRef};
pub use config::{AppConfig, Env};
pub use errors::AuthError;
pub use gate::{DenyReason, GateDecision, GatePolicy, RouteGate};
pub use models::{AuthState, Identity, Role, RoleRecord, Session};
pub use roles::{AdminCheck, HttpRoleDirectory, MockRoleDirectory, RoleDirectoryRef};
pub use session::SessionStore;
pub use visibility::{Rect, RootMargin, VisibilityConfig, VisibilitySignal};

/// AppState
///
/// Implements the **Unified State Pattern**: the single container holding the
/// shared auth context and the loaded configuration, constructed once at the
/// application root and injected into every page, never reached for as
/// ambient global state, so tests can construct isolated instances.
#[derive(Clone)]
pub struct AppState {
    /// The process-wide auth façade every page and route gate consumes.
    pub auth: Arc<AuthContext>,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl AppState {
    /// from_config
    ///
    /// Wires the real backends: the Supabase session client and the
    /// `user_roles` directory, both derived from the same configuration.
    pub fn from_config(config: AppConfig) -> Self {
        let client: SessionClientRef = Arc::new(HttpSessionClient::new(&config));
        let directory: RoleDirectoryRef = Arc::new(HttpRoleDirectory::new(&config));
        Self {
            auth: AuthContext::new(client, directory),
            config,
        }
    }

    /// with_backends
    ///
    /// Builds the state over injected backends. This is the test entry point:
    /// mock client and directory in, fully isolated state out.
    pub fn with_backends(
        config: AppConfig,
        client: SessionClientRef,
        directory: RoleDirectoryRef,
    ) -> Self {
        Self {
            auth: AuthContext::new(client, directory),
            config,
        }
    }
}

/// init_tracing
///
/// Initializes the logging stack for the given environment. Local gets pretty
/// human-readable output for debugging; production gets JSON for ingestion by
/// centralized log aggregators. The `RUST_LOG` variable overrides the default
/// filter when set.
pub fn init_tracing(env: &Env) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warp_club=debug".into());

    match env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }
}
