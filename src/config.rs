use std::env;

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded,
/// so every component (the HTTP session client, the role directory, logging
/// setup) sees a consistent view. Constructed once at the application root and
/// injected alongside the rest of the unified state.
#[derive(Clone)]
pub struct AppConfig {
    /// Base URL of the external auth/data backend (Supabase project URL).
    pub backend_url: String,
    /// The publishable API key sent with every backend request.
    pub anon_key: String,
    /// Runtime environment marker. Controls logging format selection.
    pub env: Env,
}

/// Env
///
/// Defines the runtime context, used to switch between development conveniences
/// (pretty logs) and production-grade output (JSON logs for aggregators).
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// Provides a safe, non-panicking AppConfig instance primarily used for test
    /// setup. Lets tests construct isolated state without touching the process
    /// environment.
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:54321".to_string(),
            anon_key: "anon-test-key-local".to_string(),
            env: Env::Local,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// The canonical function for initializing the configuration at startup.
    /// Reads all parameters from environment variables and implements the
    /// fail-fast principle.
    ///
    /// # Panics
    /// Panics if a variable required for the current runtime environment is not
    /// set. This prevents the application from starting with an incomplete or
    /// insecure configuration.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        match env {
            Env::Local => Self {
                env: Env::Local,
                // Local development talks to the Supabase CLI stack, which runs
                // on a well-known port with a published demo key.
                backend_url: env::var("SUPABASE_URL")
                    .unwrap_or_else(|_| "http://localhost:54321".to_string()),
                anon_key: env::var("SUPABASE_ANON_KEY")
                    .unwrap_or_else(|_| "anon-test-key-local".to_string()),
            },
            Env::Production => Self {
                env: Env::Production,
                // Production demands explicit settings; there is no safe fallback.
                backend_url: env::var("SUPABASE_URL")
                    .expect("FATAL: SUPABASE_URL must be set in production."),
                anon_key: env::var("SUPABASE_ANON_KEY")
                    .expect("FATAL: SUPABASE_ANON_KEY must be set in production."),
            },
        }
    }
}
