use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use warp_club::auth::AuthContext;
use warp_club::backend::{MockSessionClient, SessionClientRef};
use warp_club::errors::AuthError;
use warp_club::gate::{DenyReason, GateDecision, GatePolicy, RouteGate};
use warp_club::models::{AuthState, Identity, Role};
use warp_club::roles::{AdminCheck, MockRoleDirectory, RoleDirectoryRef};

// --- Helper Functions ---

fn identity(email: &str) -> Identity {
    Identity {
        id: Uuid::new_v4(),
        email: email.to_string(),
    }
}

fn loading_state(user: Option<Identity>) -> AuthState {
    AuthState {
        user,
        loading: true,
    }
}

fn settled_state(user: Option<Identity>) -> AuthState {
    AuthState {
        user,
        loading: false,
    }
}

// --- Pure Decision Tests ---

#[test]
fn loading_always_renders_placeholder() {
    let gate = RouteGate::new("/auth");

    // While loading, any user value yields Pending: never the content, never
    // a redirect, since bouncing a valid, still-loading session would be wrong.
    assert_eq!(gate.decide(&loading_state(None)), GateDecision::Pending);
    assert_eq!(
        gate.decide(&loading_state(Some(identity("alice@warp.club")))),
        GateDecision::Pending
    );
}

#[test]
fn settled_and_absent_redirects_to_sign_in() {
    let gate = RouteGate::new("/auth");

    assert_eq!(
        gate.decide(&settled_state(None)),
        GateDecision::Deny(DenyReason::NotAuthenticated)
    );
    assert_eq!(gate.redirect_to(), "/auth");
}

#[test]
fn settled_and_present_renders_content() {
    let gate = RouteGate::new("/auth");

    assert_eq!(
        gate.decide(&settled_state(Some(identity("alice@warp.club")))),
        GateDecision::Allow
    );
}

#[test]
fn default_policy_admits_any_signed_in_user() {
    // The observed site behavior: admin pages gate on "is signed in" only,
    // with the admin menu merely hidden from navigation.
    let gate = RouteGate::new("/auth");
    assert_eq!(gate.policy(), GatePolicy::SignedIn);
    assert_eq!(
        gate.decide(&settled_state(Some(identity("member@warp.club")))),
        GateDecision::Allow
    );
}

#[test]
fn admin_policy_stays_pending_until_role_resolves() {
    let gate = RouteGate::with_policy(GatePolicy::RequireAdmin, "/auth");

    assert_eq!(
        gate.decide(&settled_state(Some(identity("alice@warp.club")))),
        GateDecision::Pending
    );
}

#[test]
fn admin_policy_decides_from_the_role_check() {
    let gate = RouteGate::with_policy(GatePolicy::RequireAdmin, "/auth");
    let state = settled_state(Some(identity("alice@warp.club")));

    assert_eq!(
        gate.decide_with_role(&state, &AdminCheck::Admin),
        GateDecision::Allow
    );
    assert_eq!(
        gate.decide_with_role(&state, &AdminCheck::NotAdmin),
        GateDecision::Deny(DenyReason::NotAdmin)
    );
    // Fail-closed: an undetermined check denies.
    assert_eq!(
        gate.decide_with_role(
            &state,
            &AdminCheck::Undetermined(AuthError::RoleLookupFailed("offline".to_string()))
        ),
        GateDecision::Deny(DenyReason::NotAdmin)
    );
}

#[test]
fn role_check_never_overrides_loading_or_absence() {
    let gate = RouteGate::with_policy(GatePolicy::RequireAdmin, "/auth");

    assert_eq!(
        gate.decide_with_role(&loading_state(None), &AdminCheck::Admin),
        GateDecision::Pending
    );
    assert_eq!(
        gate.decide_with_role(&settled_state(None), &AdminCheck::Admin),
        GateDecision::Deny(DenyReason::NotAuthenticated)
    );
}

// --- Live Context Tests ---

async fn wait_until_settled(ctx: &AuthContext) {
    let mut rx = ctx.subscribe();
    tokio::time::timeout(Duration::from_secs(1), async {
        while rx.borrow().loading {
            rx.changed().await.expect("state channel closed");
        }
    })
    .await
    .expect("context never settled");
}

fn build_context(
    client: &Arc<MockSessionClient>,
    directory: &Arc<MockRoleDirectory>,
) -> Arc<AuthContext> {
    AuthContext::new(
        client.clone() as SessionClientRef,
        directory.clone() as RoleDirectoryRef,
    )
}

#[tokio::test]
async fn evaluate_is_pending_while_the_session_loads() {
    let client = Arc::new(MockSessionClient::new().with_fetch_delay(Duration::from_millis(100)));
    let directory = Arc::new(MockRoleDirectory::new());
    let ctx = build_context(&client, &directory);

    let gate = RouteGate::new("/auth");
    assert_eq!(gate.evaluate(&ctx).await, GateDecision::Pending);
}

#[tokio::test]
async fn evaluate_walks_the_full_flow() {
    let client = Arc::new(MockSessionClient::new());
    let alice = client.register_account("alice@warp.club", "hunter2");
    let directory = Arc::new(MockRoleDirectory::new());
    let ctx = build_context(&client, &directory);
    wait_until_settled(&ctx).await;

    let gate = RouteGate::new("/auth");
    let admin_gate = RouteGate::with_policy(GatePolicy::RequireAdmin, "/auth");

    // Signed out: both policies redirect.
    assert_eq!(
        gate.evaluate(&ctx).await,
        GateDecision::Deny(DenyReason::NotAuthenticated)
    );

    ctx.sign_in("alice@warp.club", "hunter2").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Signed-in member: admitted by the observed policy, denied by the
    // tightened one.
    assert_eq!(gate.evaluate(&ctx).await, GateDecision::Allow);
    assert_eq!(
        admin_gate.evaluate(&ctx).await,
        GateDecision::Deny(DenyReason::NotAdmin)
    );

    // Granting the role flips the tightened gate once the cache clears.
    directory.grant(alice.id, Role::Admin);
    ctx.sign_out().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    ctx.sign_in("alice@warp.club", "hunter2").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(admin_gate.evaluate(&ctx).await, GateDecision::Allow);
}
