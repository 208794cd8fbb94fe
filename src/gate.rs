use crate::auth::AuthContext;
use crate::models::AuthState;
use crate::roles::AdminCheck;

/// GateDecision
///
/// The three-state outcome computed for a protected route, recomputed on
/// every relevant change. Transient and derived: it has no identity of its
/// own and is never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Identity (or role) resolution has not completed. Render a neutral
    /// placeholder; never the protected content and never a redirect, since
    /// a redirect decided under uncertainty would bounce a valid,
    /// still-loading session.
    Pending,
    /// Resolution completed and the policy is satisfied: render the content.
    Allow,
    /// Resolution completed and the policy is not satisfied.
    Deny(DenyReason),
}

/// DenyReason
///
/// Why a gate denied. `NotAuthenticated` redirects to the sign-in
/// destination; `NotAdmin` only arises under `GatePolicy::RequireAdmin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotAuthenticated,
    NotAdmin,
}

/// GatePolicy
///
/// What a protected route requires. The club site's observed behavior gates
/// admin pages on "is signed in" only (the admin menu is merely hidden from
/// navigation), so `SignedIn` is the default. `RequireAdmin` additionally
/// gates on a confirmed admin role for deployments that tighten the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatePolicy {
    #[default]
    SignedIn,
    RequireAdmin,
}

/// RouteGate
///
/// The decision wrapper placed around protected pages. Purely derived from
/// auth context publications: the gate holds no timers, performs no retries,
/// and never errors. The configured redirect destination is where a
/// `Deny(NotAuthenticated)` sends the visitor.
#[derive(Debug, Clone)]
pub struct RouteGate {
    policy: GatePolicy,
    redirect_to: String,
}

impl RouteGate {
    /// A gate with the observed default policy: any signed-in user passes.
    pub fn new(redirect_to: impl Into<String>) -> Self {
        Self {
            policy: GatePolicy::SignedIn,
            redirect_to: redirect_to.into(),
        }
    }

    pub fn with_policy(policy: GatePolicy, redirect_to: impl Into<String>) -> Self {
        Self {
            policy,
            redirect_to: redirect_to.into(),
        }
    }

    pub fn policy(&self) -> GatePolicy {
        self.policy
    }

    /// Where a denied, unauthenticated visitor is sent (the sign-in page).
    pub fn redirect_to(&self) -> &str {
        &self.redirect_to
    }

    /// decide
    ///
    /// The state machine over the `loading`/`user` pair:
    /// - `loading` ⇒ `Pending`, unconditionally.
    /// - settled + absent user ⇒ `Deny(NotAuthenticated)`.
    /// - settled + present user ⇒ `Allow` under `SignedIn`; under
    ///   `RequireAdmin` the role answer is still outstanding, so `Pending`
    ///   until `decide_with_role` supplies it.
    pub fn decide(&self, state: &AuthState) -> GateDecision {
        if state.loading {
            return GateDecision::Pending;
        }
        match &state.user {
            None => GateDecision::Deny(DenyReason::NotAuthenticated),
            Some(_) => match self.policy {
                GatePolicy::SignedIn => GateDecision::Allow,
                GatePolicy::RequireAdmin => GateDecision::Pending,
            },
        }
    }

    /// decide_with_role
    ///
    /// Completes a `RequireAdmin` decision once the role check has resolved.
    /// `Undetermined` denies (authorization is fail-closed), but the caller
    /// still holds the distinguishable error for its retry affordance.
    pub fn decide_with_role(&self, state: &AuthState, check: &AdminCheck) -> GateDecision {
        match self.decide(state) {
            GateDecision::Pending if !state.loading && state.user.is_some() => match check {
                AdminCheck::Admin => GateDecision::Allow,
                AdminCheck::NotAdmin | AdminCheck::Undetermined(_) => {
                    GateDecision::Deny(DenyReason::NotAdmin)
                }
            },
            decision => decision,
        }
    }

    /// evaluate
    ///
    /// Drives the full decision against a live context, performing the role
    /// lookup only when the policy requires one and the identity has settled
    /// (the resolver is never consulted while loading).
    pub async fn evaluate(&self, ctx: &AuthContext) -> GateDecision {
        let state = ctx.state();
        match self.decide(&state) {
            GateDecision::Pending if state.signed_in() => {
                let check = ctx.is_admin().await;
                self.decide_with_role(&state, &check)
            }
            decision => decision,
        }
    }
}
