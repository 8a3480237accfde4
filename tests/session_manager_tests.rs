//! Session state-machine properties: optimistic restore and its background
//! verification, login/signup outcomes, the busy gate, stale-response
//! discarding, logout idempotence, and profile updates.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use mediportal_session::identity::{
    AuthGrant, IdentityApi, IdentityError, LoginRequest, ProfileUpdate, Role, SessionManager,
    SessionStatus, SignupRequest, UserProfile,
};
use mediportal_session::store::{MemorySessionStore, SessionStore};

fn profile(id: &str, email: &str, role: Role) -> UserProfile {
    UserProfile {
        id: id.into(),
        email: email.into(),
        display_name: format!("User {id}"),
        role,
        created_at: None,
    }
}

fn grant(id: &str, email: &str, token: &str) -> AuthGrant {
    AuthGrant { profile: profile(id, email, Role::Patient), credential: token.into() }
}

/// Scripted identity backend: each operation pops its next queued result.
/// An operation with a gate suspends until the test releases a permit,
/// which is how the in-flight cases are driven.
#[derive(Default)]
struct ScriptedIdentity {
    login_results: Mutex<VecDeque<Result<AuthGrant, IdentityError>>>,
    signup_results: Mutex<VecDeque<Result<AuthGrant, IdentityError>>>,
    fetch_results: Mutex<VecDeque<Result<UserProfile, IdentityError>>>,
    login_gate: Option<Arc<Semaphore>>,
    fetch_gate: Option<Arc<Semaphore>>,
}

impl ScriptedIdentity {
    fn with_login(result: Result<AuthGrant, IdentityError>) -> Self {
        let s = Self::default();
        s.login_results.lock().push_back(result);
        s
    }

    fn with_fetch(result: Result<UserProfile, IdentityError>) -> Self {
        let s = Self::default();
        s.fetch_results.lock().push_back(result);
        s
    }

    fn with_signup(result: Result<AuthGrant, IdentityError>) -> Self {
        let s = Self::default();
        s.signup_results.lock().push_back(result);
        s
    }

    async fn wait(gate: &Option<Arc<Semaphore>>) {
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }
    }
}

#[async_trait]
impl IdentityApi for ScriptedIdentity {
    async fn login(&self, _req: &LoginRequest) -> Result<AuthGrant, IdentityError> {
        Self::wait(&self.login_gate).await;
        self.login_results.lock().pop_front().expect("unexpected login call")
    }

    async fn signup(&self, _req: &SignupRequest) -> Result<AuthGrant, IdentityError> {
        self.signup_results.lock().pop_front().expect("unexpected signup call")
    }

    async fn fetch_current_user(&self, _credential: &str) -> Result<UserProfile, IdentityError> {
        Self::wait(&self.fetch_gate).await;
        self.fetch_results.lock().pop_front().expect("unexpected fetch call")
    }
}

#[tokio::test]
async fn empty_store_restores_to_unauthenticated() {
    let store = Arc::new(MemorySessionStore::new());
    let manager = SessionManager::new(store, Arc::new(ScriptedIdentity::default()));

    let session = manager.session();
    assert_eq!(session.status, SessionStatus::Unauthenticated);
    assert!(session.profile.is_none());
    assert!(session.credential.is_none());
    assert!(!manager.verification_pending());
}

#[tokio::test]
async fn restore_is_optimistic_then_confirmed_with_fresh_profile() {
    let cached = profile("u-1", "ada@example.com", Role::Patient);
    let mut fresh = cached.clone();
    fresh.display_name = "Ada L. (renamed)".into();

    let store = Arc::new(MemorySessionStore::with_session("tok-1", cached.clone()));
    let identity = Arc::new(ScriptedIdentity::with_fetch(Ok(fresh.clone())));
    let manager = SessionManager::new(store.clone(), identity);

    // Optimistic: authenticated with the cached profile before any network.
    let session = manager.session();
    assert_eq!(session.status, SessionStatus::Authenticated);
    assert_eq!(session.profile.as_ref().unwrap().display_name, cached.display_name);
    assert!(manager.verification_pending());

    assert!(manager.verify_restored().await);
    let session = manager.session();
    assert_eq!(session.status, SessionStatus::Authenticated);
    assert_eq!(session.profile.as_ref().unwrap().display_name, fresh.display_name);
    assert_eq!(session.credential.as_deref(), Some("tok-1"));
    // The fresh profile is re-persisted.
    assert_eq!(store.load().unwrap().profile.display_name, fresh.display_name);
}

#[tokio::test]
async fn restore_verification_unauthorized_purges_silently() {
    let store = Arc::new(MemorySessionStore::with_session(
        "tok-dead",
        profile("u-1", "ada@example.com", Role::Patient),
    ));
    let identity = Arc::new(ScriptedIdentity::with_fetch(Err(IdentityError::Unauthorized(
        "Token has expired".into(),
    ))));
    let manager = SessionManager::new(store.clone(), identity);

    assert!(manager.verify_restored().await);
    let session = manager.session();
    assert_eq!(session.status, SessionStatus::Unauthenticated);
    assert!(session.profile.is_none());
    assert!(session.credential.is_none());
    // Silent: no error banner for a session that simply was not there.
    assert!(session.last_error.is_none());
    assert!(store.load().is_none());
}

#[tokio::test]
async fn restore_verification_unreachable_keeps_cached_session() {
    let cached = profile("u-1", "ada@example.com", Role::Patient);
    let store = Arc::new(MemorySessionStore::with_session("tok-1", cached.clone()));
    let identity = Arc::new(ScriptedIdentity::with_fetch(Err(IdentityError::Unreachable(
        "connection refused".into(),
    ))));
    let manager = SessionManager::new(store.clone(), identity);

    assert!(!manager.verify_restored().await);
    let session = manager.session();
    assert_eq!(session.status, SessionStatus::Authenticated);
    assert_eq!(session.profile.as_ref(), Some(&cached));
    assert_eq!(session.credential.as_deref(), Some("tok-1"));
    // Nothing persisted, nothing purged.
    assert_eq!(store.load().unwrap().profile, cached);
}

#[tokio::test]
async fn login_success_authenticates_and_persists() {
    let store = Arc::new(MemorySessionStore::new());
    let identity = Arc::new(ScriptedIdentity::with_login(Ok(grant("u-7", "ada@example.com", "tok-7"))));
    let manager = SessionManager::new(store.clone(), identity);

    let profile = manager.login("ada@example.com", "s3cr3t").await.unwrap();
    assert_eq!(profile.id, "u-7");
    let session = manager.session();
    assert_eq!(session.status, SessionStatus::Authenticated);
    assert_eq!(session.credential.as_deref(), Some("tok-7"));
    assert_eq!(store.load().unwrap().credential, "tok-7");
}

#[tokio::test]
async fn login_rejection_fails_with_message_and_clear_error_resets() {
    let store = Arc::new(MemorySessionStore::new());
    let identity = Arc::new(ScriptedIdentity::with_login(Err(IdentityError::Unauthorized(
        "Invalid email or password".into(),
    ))));
    let manager = SessionManager::new(store.clone(), identity);

    let err = manager.login("ada@example.com", "wrong").await.unwrap_err();
    assert_eq!(err.code_str(), "invalid_credentials");
    let session = manager.session();
    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(session.last_error.as_deref(), Some("Invalid email or password"));
    assert!(session.profile.is_none());
    assert!(session.credential.is_none());
    assert!(store.load().is_none());

    manager.clear_error();
    let session = manager.session();
    assert_eq!(session.status, SessionStatus::Unauthenticated);
    assert!(session.last_error.is_none());
}

#[tokio::test]
async fn login_unreachable_is_a_hard_failure_with_distinct_error() {
    let store = Arc::new(MemorySessionStore::new());
    let identity = Arc::new(ScriptedIdentity::with_login(Err(IdentityError::Unreachable(
        "timed out".into(),
    ))));
    let manager = SessionManager::new(store, identity);

    let err = manager.login("ada@example.com", "s3cr3t").await.unwrap_err();
    assert_eq!(err.code_str(), "service_unreachable");
    // No cached fallback: nothing gets authenticated on a transport failure.
    assert_eq!(manager.session().status, SessionStatus::Failed);
}

#[tokio::test]
async fn login_with_empty_input_is_rejected_before_the_network() {
    let manager = SessionManager::new(
        Arc::new(MemorySessionStore::new()),
        Arc::new(ScriptedIdentity::default()),
    );
    // The scripted backend would panic on an unexpected call; not reaching it
    // is the point.
    let err = manager.login("", "p").await.unwrap_err();
    assert_eq!(err.code_str(), "invalid_credentials");
    let err = manager.login("a@x.com", "").await.unwrap_err();
    assert_eq!(err.code_str(), "invalid_credentials");
    assert_eq!(manager.session().status, SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn signup_success_implies_login() {
    let store = Arc::new(MemorySessionStore::new());
    let identity = Arc::new(ScriptedIdentity::with_signup(Ok(grant("u-9", "new@example.com", "tok-9"))));
    let manager = SessionManager::new(store.clone(), identity);

    let profile = manager
        .signup("new@example.com", "Str0ngPass", "New Person", Role::Patient)
        .await
        .unwrap();
    assert_eq!(profile.id, "u-9");
    assert_eq!(manager.session().status, SessionStatus::Authenticated);
    assert_eq!(store.load().unwrap().credential, "tok-9");
}

#[tokio::test]
async fn signup_duplicate_account_surfaces_as_account_exists() {
    let identity = Arc::new(ScriptedIdentity::with_signup(Err(IdentityError::Invalid(
        "Email already registered".into(),
    ))));
    let manager = SessionManager::new(Arc::new(MemorySessionStore::new()), identity);

    let err = manager
        .signup("taken@example.com", "Str0ngPass", "Taken Person", Role::Doctor)
        .await
        .unwrap_err();
    assert_eq!(err.code_str(), "account_exists");
    assert_eq!(manager.session().status, SessionStatus::Failed);
}

#[tokio::test]
async fn signup_rejects_unknown_role_locally() {
    let manager = SessionManager::new(
        Arc::new(MemorySessionStore::new()),
        Arc::new(ScriptedIdentity::default()),
    );
    let err = manager
        .signup("new@example.com", "Str0ngPass", "New Person", Role::Unknown)
        .await
        .unwrap_err();
    assert_eq!(err.code_str(), "invalid_credentials");
}

#[tokio::test]
async fn logout_is_idempotent_and_purges_storage() {
    let store = Arc::new(MemorySessionStore::new());
    let identity = Arc::new(ScriptedIdentity::with_login(Ok(grant("u-7", "ada@example.com", "tok-7"))));
    let manager = SessionManager::new(store.clone(), identity);
    manager.login("ada@example.com", "s3cr3t").await.unwrap();

    manager.logout();
    let after_first = manager.session();
    assert_eq!(after_first.status, SessionStatus::Unauthenticated);
    assert!(store.load().is_none());

    manager.logout();
    assert_eq!(manager.session(), after_first);
}

#[tokio::test]
async fn update_user_merges_and_repersists_without_status_change() {
    let store = Arc::new(MemorySessionStore::new());
    let identity = Arc::new(ScriptedIdentity::with_login(Ok(grant("u-7", "ada@example.com", "tok-7"))));
    let manager = SessionManager::new(store.clone(), identity);
    manager.login("ada@example.com", "s3cr3t").await.unwrap();

    let updated = manager
        .update_user(&ProfileUpdate { display_name: Some("Ada, MD".into()), ..Default::default() })
        .unwrap();
    assert_eq!(updated.display_name, "Ada, MD");
    let session = manager.session();
    assert_eq!(session.status, SessionStatus::Authenticated);
    assert_eq!(session.profile.as_ref().unwrap().display_name, "Ada, MD");
    assert_eq!(session.profile.as_ref().unwrap().email, "ada@example.com");
    assert_eq!(store.load().unwrap().profile.display_name, "Ada, MD");
}

#[tokio::test]
async fn update_user_without_a_session_is_an_error() {
    let manager = SessionManager::new(
        Arc::new(MemorySessionStore::new()),
        Arc::new(ScriptedIdentity::default()),
    );
    let err = manager
        .update_user(&ProfileUpdate { display_name: Some("Nobody".into()), ..Default::default() })
        .unwrap_err();
    assert_eq!(err.code_str(), "unauthorized");
}

#[tokio::test]
async fn remembered_login_prefill_survives_logout() {
    let manager = SessionManager::new(
        Arc::new(MemorySessionStore::new()),
        Arc::new(ScriptedIdentity::default()),
    );
    manager.remember_login("ada@example.com", "s3cr3t");
    manager.logout();
    assert_eq!(
        manager.remembered_login(),
        Some(("ada@example.com".into(), "s3cr3t".into()))
    );
    manager.forget_login();
    assert!(manager.remembered_login().is_none());
}

#[tokio::test]
async fn second_login_while_one_is_in_flight_is_busy() {
    let gate = Arc::new(Semaphore::new(0));
    let identity = Arc::new(ScriptedIdentity {
        login_gate: Some(gate.clone()),
        ..ScriptedIdentity::with_login(Ok(grant("u-a", "a@x.com", "tok-a")))
    });
    let store = Arc::new(MemorySessionStore::new());
    let manager = Arc::new(SessionManager::new(store, identity));

    let first = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.login("a@x.com", "p1").await })
    };
    // Let the first login reach its suspension point.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(manager.session().status, SessionStatus::Authenticating);

    let err = manager.login("b@y.com", "p2").await.unwrap_err();
    assert_eq!(err.code_str(), "busy");

    gate.add_permits(1);
    let profile = first.await.unwrap().unwrap();
    assert_eq!(profile.id, "u-a");
    // The final session reflects only the first login's outcome.
    let session = manager.session();
    assert_eq!(session.status, SessionStatus::Authenticated);
    assert_eq!(session.profile.as_ref().unwrap().email, "a@x.com");
    assert_eq!(session.credential.as_deref(), Some("tok-a"));
}

#[tokio::test]
async fn explicit_login_supersedes_stale_restore_verification() {
    let cached = profile("u-old", "old@example.com", Role::Patient);
    let store = Arc::new(MemorySessionStore::with_session("tok-old", cached));

    let gate = Arc::new(Semaphore::new(0));
    let identity = Arc::new(ScriptedIdentity {
        fetch_gate: Some(gate.clone()),
        ..Default::default()
    });
    identity
        .fetch_results
        .lock()
        .push_back(Err(IdentityError::Unauthorized("Token has expired".into())));
    identity
        .login_results
        .lock()
        .push_back(Ok(grant("u-new", "new@example.com", "tok-new")));
    let manager = Arc::new(SessionManager::new(store.clone(), identity));

    // Background verification starts and parks at the gate.
    let verify = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.verify_restored().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // The user logs in while the verification is still pending.
    manager.login("new@example.com", "p").await.unwrap();

    // Now the stale Unauthorized verdict arrives; it must be discarded.
    gate.add_permits(1);
    assert!(!verify.await.unwrap());

    let session = manager.session();
    assert_eq!(session.status, SessionStatus::Authenticated);
    assert_eq!(session.profile.as_ref().unwrap().email, "new@example.com");
    assert_eq!(session.credential.as_deref(), Some("tok-new"));
    assert_eq!(store.load().unwrap().credential, "tok-new");
}
