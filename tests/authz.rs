//! Role Resolution, Administrator Overrides, and Authorization-List Rules

mod utils;

use chrono::Utc;
use tmi_core::Error;
use tmi_core::authz::{
    AdminCache, AdminGrant, Decision, GranteeRef, Role, check,
};
use tmi_core::resource::operations;
use tmi_core::resource::types::{AuthorizationEntry, SubjectType};
use utils::{NoSessions, ProviderImpl, login, login_with_groups};

fn entry(subject: &str, subject_type: SubjectType, role: Role) -> AuthorizationEntry {
    AuthorizationEntry { subject: subject.to_string(), subject_type, role }
}

// The creator becomes owner; strangers cannot even see the record.
#[tokio::test]
async fn creator_owns_strangers_see_nothing() {
    let provider = ProviderImpl::new();
    let admins = AdminCache::new();
    login(&provider, "alice").await;
    login(&provider, "mallory").await;
    let alice = provider.principal_of("alice");
    let mallory = provider.principal_of("mallory");

    let tm = operations::create_threat_model(&provider, &alice, "payments", None, "STRIDE")
        .await
        .expect("should create");
    assert_eq!(tm.owner, "alice");

    let decision =
        check(&provider, &admins, &alice, tm.id, Role::Owner).await.expect("should check");
    assert_eq!(decision, Decision::Allowed(Role::Owner));

    // no role at all is indistinguishable from absence
    let decision =
        check(&provider, &admins, &mallory, tm.id, Role::Reader).await.expect("should check");
    assert_eq!(decision, Decision::NotFound);

    let err = operations::get_threat_model(&provider, &admins, &mallory, tm.id)
        .await
        .expect_err("should be hidden");
    assert!(matches!(err, Error::NotFound(_)));
}

// A present-but-insufficient role is forbidden, not hidden.
#[tokio::test]
async fn reader_is_forbidden_not_hidden() {
    let provider = ProviderImpl::new();
    let admins = AdminCache::new();
    login(&provider, "alice").await;
    login(&provider, "bob").await;
    let alice = provider.principal_of("alice");
    let bob = provider.principal_of("bob");

    let tm = operations::create_threat_model(&provider, &alice, "payments", None, "STRIDE")
        .await
        .expect("should create");
    operations::patch_authorization(&provider, &admins, &alice, tm.id, vec![
        entry("alice", SubjectType::User, Role::Owner),
        entry("bob", SubjectType::User, Role::Reader),
    ])
    .await
    .expect("should patch");

    let decision =
        check(&provider, &admins, &bob, tm.id, Role::Writer).await.expect("should check");
    assert_eq!(decision, Decision::Forbidden);

    // reading is fine
    operations::get_threat_model(&provider, &admins, &bob, tm.id)
        .await
        .expect("reader should read");

    // repeated checks are stable while nothing changes
    for _ in 0..3 {
        let decision =
            check(&provider, &admins, &bob, tm.id, Role::Writer).await.expect("should check");
        assert_eq!(decision, Decision::Forbidden);
    }
}

// Group entries grant the maximum of all matching rules.
#[tokio::test]
async fn group_roles_take_maximum() {
    let provider = ProviderImpl::new();
    let admins = AdminCache::new();
    login(&provider, "alice").await;
    login_with_groups(&provider, "bob", &["ops", "security"]).await;
    let alice = provider.principal_of("alice");
    let bob = provider.principal_of("bob");

    let tm = operations::create_threat_model(&provider, &alice, "payments", None, "STRIDE")
        .await
        .expect("should create");
    operations::patch_authorization(&provider, &admins, &alice, tm.id, vec![
        entry("alice", SubjectType::User, Role::Owner),
        entry("bob", SubjectType::User, Role::Reader),
        entry("ops", SubjectType::Group, Role::Writer),
    ])
    .await
    .expect("should patch");

    let decision =
        check(&provider, &admins, &bob, tm.id, Role::Writer).await.expect("should check");
    assert_eq!(decision, Decision::Allowed(Role::Writer));
}

// Duplicate (subject, subject_type) pairs are rejected with conflict.
#[tokio::test]
async fn duplicate_subject_conflicts() {
    let provider = ProviderImpl::new();
    let admins = AdminCache::new();
    login(&provider, "alice").await;
    let alice = provider.principal_of("alice");

    let tm = operations::create_threat_model(&provider, &alice, "payments", None, "STRIDE")
        .await
        .expect("should create");

    let err = operations::patch_authorization(&provider, &admins, &alice, tm.id, vec![
        entry("alice", SubjectType::User, Role::Owner),
        entry("bob@x", SubjectType::User, Role::Writer),
        entry("bob@x", SubjectType::User, Role::Reader),
    ])
    .await
    .expect_err("should conflict");
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(err.status(), 409);
}

// An empty authorization list would remove the last owner.
#[tokio::test]
async fn empty_list_rejected() {
    let provider = ProviderImpl::new();
    let admins = AdminCache::new();
    login(&provider, "alice").await;
    let alice = provider.principal_of("alice");

    let tm = operations::create_threat_model(&provider, &alice, "payments", None, "STRIDE")
        .await
        .expect("should create");

    let err = operations::patch_authorization(&provider, &admins, &alice, tm.id, vec![])
        .await
        .expect_err("should reject");
    assert!(matches!(err, Error::InvalidInput(_)));
}

// Only the owner may mutate the list; ownership follows the single owner
// entry.
#[tokio::test]
async fn ownership_transfer() {
    let provider = ProviderImpl::new();
    let admins = AdminCache::new();
    login(&provider, "alice").await;
    login(&provider, "bob").await;
    let alice = provider.principal_of("alice");
    let bob = provider.principal_of("bob");

    let tm = operations::create_threat_model(&provider, &alice, "payments", None, "STRIDE")
        .await
        .expect("should create");
    operations::patch_authorization(&provider, &admins, &alice, tm.id, vec![
        entry("alice", SubjectType::User, Role::Owner),
        entry("bob", SubjectType::User, Role::Writer),
    ])
    .await
    .expect("should patch");

    // a writer may not touch the list
    let err = operations::patch_authorization(&provider, &admins, &bob, tm.id, vec![
        entry("bob", SubjectType::User, Role::Owner),
    ])
    .await
    .expect_err("writer should be refused");
    assert!(matches!(err, Error::Forbidden(_)));

    // the owner may hand it over
    let tm = operations::patch_authorization(&provider, &admins, &alice, tm.id, vec![
        entry("bob", SubjectType::User, Role::Owner),
        entry("alice", SubjectType::User, Role::Writer),
    ])
    .await
    .expect("owner should transfer");
    assert_eq!(tm.owner, "bob");

    let decision =
        check(&provider, &admins, &alice, tm.id, Role::Owner).await.expect("should check");
    assert_eq!(decision, Decision::Forbidden);
}

// An administrator grant confers owner-equivalent rights everywhere, and
// cache invalidation makes new grants visible immediately.
#[tokio::test]
async fn admin_override() {
    let provider = ProviderImpl::new();
    let admins = AdminCache::new();
    login(&provider, "alice").await;
    login(&provider, "root").await;
    let alice = provider.principal_of("alice");
    let root = provider.principal_of("root");

    let tm = operations::create_threat_model(&provider, &alice, "payments", None, "STRIDE")
        .await
        .expect("should create");

    // not yet an administrator
    let decision =
        check(&provider, &admins, &root, tm.id, Role::Reader).await.expect("should check");
    assert_eq!(decision, Decision::NotFound);

    admins
        .grant(&provider, AdminGrant {
            grantee: GranteeRef::Email("root@example.com".to_string()),
            created_at: Utc::now(),
            granted_by: "alice".to_string(),
        })
        .await
        .expect("should grant");

    // duplicate grants are refused
    let err = admins
        .grant(&provider, AdminGrant {
            grantee: GranteeRef::Email("root@example.com".to_string()),
            created_at: Utc::now(),
            granted_by: "alice".to_string(),
        })
        .await
        .expect_err("should conflict");
    assert!(matches!(err, Error::Conflict(_)));

    // the grant takes effect without a restart
    let decision =
        check(&provider, &admins, &root, tm.id, Role::Owner).await.expect("should check");
    assert_eq!(decision, Decision::Allowed(Role::Owner));

    // an administrator may delete a threat model they do not own
    operations::delete_threat_model(&provider, &NoSessions, &admins, &root, tm.id)
        .await
        .expect("admin should delete");

    // revocation takes effect too
    admins
        .revoke_grant(&provider, &GranteeRef::Email("root@example.com".to_string()))
        .await
        .expect("should revoke");
    let other = operations::create_threat_model(&provider, &alice, "cards", None, "STRIDE")
        .await
        .expect("should create");
    let decision =
        check(&provider, &admins, &root, other.id, Role::Reader).await.expect("should check");
    assert_eq!(decision, Decision::NotFound);
}
