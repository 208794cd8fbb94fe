use std::sync::Arc;
use uuid::Uuid;
use warp_club::errors::AuthError;
use warp_club::models::{Identity, Role};
use warp_club::roles::{AdminCheck, MockRoleDirectory, RoleDirectoryRef, RoleResolver};

// --- Helper Functions ---

fn identity(email: &str) -> Identity {
    Identity {
        id: Uuid::new_v4(),
        email: email.to_string(),
    }
}

fn resolver_over(directory: &Arc<MockRoleDirectory>) -> RoleResolver {
    RoleResolver::new(directory.clone() as RoleDirectoryRef)
}

// --- Tests ---

#[tokio::test]
async fn absent_identity_is_not_admin_with_zero_lookups() {
    let directory = Arc::new(MockRoleDirectory::new());
    let resolver = resolver_over(&directory);

    let check = resolver.is_admin(None).await;

    assert_eq!(check, AdminCheck::NotAdmin);
    assert_eq!(directory.lookup_count(), 0);
}

#[tokio::test]
async fn missing_record_means_member() {
    let directory = Arc::new(MockRoleDirectory::new());
    let resolver = resolver_over(&directory);
    let alice = identity("alice@warp.club");

    let check = resolver.is_admin(Some(&alice)).await;

    assert_eq!(check, AdminCheck::NotAdmin);
    assert!(!check.is_admin());
    assert_eq!(directory.lookup_count(), 1);
}

#[tokio::test]
async fn admin_record_grants_admin() {
    let directory = Arc::new(MockRoleDirectory::new());
    let alice = identity("alice@warp.club");
    directory.grant(alice.id, Role::Admin);
    let resolver = resolver_over(&directory);

    let check = resolver.is_admin(Some(&alice)).await;

    assert_eq!(check, AdminCheck::Admin);
    assert!(check.is_admin());
}

#[tokio::test]
async fn member_record_does_not_grant_admin() {
    let directory = Arc::new(MockRoleDirectory::new());
    let alice = identity("alice@warp.club");
    directory.grant(alice.id, Role::Member);
    let resolver = resolver_over(&directory);

    assert_eq!(resolver.is_admin(Some(&alice)).await, AdminCheck::NotAdmin);
}

#[tokio::test]
async fn lookup_failure_fails_closed_but_stays_observable() {
    let directory = Arc::new(MockRoleDirectory::new());
    let alice = identity("alice@warp.club");
    directory.grant(alice.id, Role::Admin);
    directory.set_failing(true);
    let resolver = resolver_over(&directory);

    let check = resolver.is_admin(Some(&alice)).await;

    // Denied, but distinguishable from a genuine "not admin".
    assert!(!check.is_admin());
    assert!(matches!(
        check,
        AdminCheck::Undetermined(AuthError::RoleLookupFailed(_))
    ));
}

#[tokio::test]
async fn failures_are_never_cached() {
    let directory = Arc::new(MockRoleDirectory::new());
    let alice = identity("alice@warp.club");
    directory.grant(alice.id, Role::Admin);
    directory.set_failing(true);
    let resolver = resolver_over(&directory);

    assert!(!resolver.is_admin(Some(&alice)).await.is_admin());

    // Backend recovers; the next check must re-consult it.
    directory.set_failing(false);
    assert_eq!(resolver.is_admin(Some(&alice)).await, AdminCheck::Admin);
    assert_eq!(directory.lookup_count(), 2);
}

#[tokio::test]
async fn cached_answer_skips_second_lookup() {
    let directory = Arc::new(MockRoleDirectory::new());
    let alice = identity("alice@warp.club");
    directory.grant(alice.id, Role::Admin);
    let resolver = resolver_over(&directory);

    assert_eq!(resolver.is_admin(Some(&alice)).await, AdminCheck::Admin);
    assert_eq!(resolver.is_admin(Some(&alice)).await, AdminCheck::Admin);

    assert_eq!(directory.lookup_count(), 1);
}

#[tokio::test]
async fn invalidate_forces_a_fresh_lookup() {
    let directory = Arc::new(MockRoleDirectory::new());
    let alice = identity("alice@warp.club");
    directory.grant(alice.id, Role::Admin);
    let resolver = resolver_over(&directory);

    assert_eq!(resolver.is_admin(Some(&alice)).await, AdminCheck::Admin);

    // The role was revoked server-side; a stale cached answer would be wrong.
    directory.revoke(alice.id);
    resolver.invalidate();

    assert_eq!(resolver.is_admin(Some(&alice)).await, AdminCheck::NotAdmin);
    assert_eq!(directory.lookup_count(), 2);
}

#[tokio::test]
async fn cache_is_keyed_by_identity() {
    let directory = Arc::new(MockRoleDirectory::new());
    let alice = identity("alice@warp.club");
    let bob = identity("bob@warp.club");
    directory.grant(alice.id, Role::Admin);
    let resolver = resolver_over(&directory);

    assert_eq!(resolver.is_admin(Some(&alice)).await, AdminCheck::Admin);

    // A different user must never see Alice's cached answer.
    assert_eq!(resolver.is_admin(Some(&bob)).await, AdminCheck::NotAdmin);
    assert_eq!(directory.lookup_count(), 2);
}
