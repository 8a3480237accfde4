//! The authentication state machine. The manager is the only writer of the
//! session and of the persistent store; the guard and dispatcher consume
//! read-only snapshots.
//!
//! Generation discipline: every state write bumps a counter. Any operation
//! that suspends (login, signup, the background restore verification)
//! captures the counter before awaiting and applies its outcome only if the
//! counter is unchanged on resume. Stale responses are discarded, never
//! cancelled; the session always reflects the newest operation that was
//! allowed to start.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::client::{AuthGrant, IdentityApi, IdentityError, LoginRequest, SignupRequest};
use super::profile::{ProfileUpdate, Role, UserProfile};
use super::session::{Session, SessionStatus};
use crate::error::{AuthError, AuthResult};
use crate::store::SessionStore;

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    identity: Arc<dyn IdentityApi>,
    state: RwLock<ManagerState>,
}

struct ManagerState {
    session: Session,
    generation: u64,
    /// Credential still owed a background verification after an optimistic
    /// restore. Taken by `verify_restored`, dropped by any newer operation.
    verify_owed: Option<String>,
}

impl SessionManager {
    /// Construct and run the restore step: an existing snapshot makes the
    /// session optimistically `Authenticated` (no login-screen flash on
    /// reload) and leaves a verification owed; an empty or unparsable store
    /// yields `Unauthenticated`. The load is synchronous, so `Restoring` is
    /// never observable after construction returns.
    pub fn new(store: Arc<dyn SessionStore>, identity: Arc<dyn IdentityApi>) -> Self {
        let (session, verify_owed) = match store.load() {
            Some(persisted) => {
                info!(target: "mediportal::session", "session.restore user={} (pending verification)", persisted.profile.id);
                let credential = persisted.credential.clone();
                (Session::authenticated(persisted.profile, persisted.credential), Some(credential))
            }
            None => (Session::unauthenticated(), None),
        };
        Self {
            store,
            identity,
            state: RwLock::new(ManagerState { session, generation: 0, verify_owed }),
        }
    }

    /// Snapshot for consumers (route guard, role dispatcher, views).
    pub fn session(&self) -> Session {
        self.state.read().session.clone()
    }

    /// Apply a write only if no newer operation has written since `expected`
    /// was captured. Returns whether the write happened.
    fn set_session_if_current(&self, expected: u64, session: Session) -> bool {
        let mut st = self.state.write();
        if st.generation != expected {
            debug!(target: "mediportal::session", "discarding stale transition (gen {} != {})", expected, st.generation);
            return false;
        }
        st.generation += 1;
        st.session = session;
        true
    }

    /// Background verification of an optimistically restored session.
    /// Returns whether its outcome was applied (a newer operation wins).
    pub async fn verify_restored(&self) -> bool {
        let (gen, credential) = {
            let mut st = self.state.write();
            let Some(credential) = st.verify_owed.take() else {
                return false;
            };
            (st.generation, credential)
        };
        match self.identity.fetch_current_user(&credential).await {
            Ok(profile) => {
                // Profile may have changed server-side since last visit.
                let applied = self.set_session_if_current(gen, Session::authenticated(profile.clone(), credential.clone()));
                if applied {
                    if let Err(e) = self.store.save(&credential, &profile) {
                        warn!(target: "mediportal::session", "session.persist failed: {}", e);
                    }
                    info!(target: "mediportal::session", "session.verify ok user={}", profile.id);
                }
                applied
            }
            Err(IdentityError::Unauthorized(msg)) => {
                // The cached credential is dead. Silent logout: from the
                // user's perspective they simply were not logged in.
                let applied = self.set_session_if_current(gen, Session::unauthenticated());
                if applied {
                    self.store.clear();
                    info!(target: "mediportal::session", "session.verify revoked: {}", msg);
                }
                applied
            }
            Err(err) => {
                // Unreachable (or a malformed verdict): keep the cached
                // session rather than locking the user out over a blip.
                warn!(target: "mediportal::session", "session.verify deferred: {}", err);
                false
            }
        }
    }

    /// Whether a background verification is still owed from the restore.
    pub fn verification_pending(&self) -> bool {
        self.state.read().verify_owed.is_some()
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthResult<UserProfile> {
        let email = email.trim().to_ascii_lowercase();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::invalid_credentials("email and password are required"));
        }
        let gen = self.begin_authenticating()?;
        let req = LoginRequest { email, password: password.to_string() };
        match self.identity.login(&req).await {
            Ok(grant) => self.complete_grant(gen, grant, "login"),
            Err(err) => {
                let auth_err = match err {
                    IdentityError::Unauthorized(m) | IdentityError::Invalid(m) => AuthError::invalid_credentials(m),
                    IdentityError::Unreachable(m) => AuthError::service_unreachable(m),
                };
                self.set_session_if_current(gen, Session::failed(auth_err.message()));
                Err(auth_err)
            }
        }
    }

    /// Signup transitions straight to `Authenticated` on success: signing up
    /// implies being logged in.
    pub async fn signup(&self, email: &str, password: &str, display_name: &str, role: Role) -> AuthResult<UserProfile> {
        let email = email.trim().to_ascii_lowercase();
        let display_name = display_name.trim().to_string();
        if email.is_empty() || password.is_empty() || display_name.is_empty() {
            return Err(AuthError::invalid_credentials("email, password and name are required"));
        }
        if role == Role::Unknown {
            return Err(AuthError::invalid_credentials("role must be patient, doctor or admin"));
        }
        let gen = self.begin_authenticating()?;
        let req = SignupRequest { email, password: password.to_string(), display_name, role };
        match self.identity.signup(&req).await {
            Ok(grant) => self.complete_grant(gen, grant, "signup"),
            Err(err) => {
                let auth_err = match err {
                    IdentityError::Invalid(m) => {
                        let lowered = m.to_ascii_lowercase();
                        if lowered.contains("registered") || lowered.contains("exists") {
                            AuthError::account_exists(m)
                        } else {
                            AuthError::invalid_credentials(m)
                        }
                    }
                    IdentityError::Unauthorized(m) => AuthError::invalid_credentials(m),
                    IdentityError::Unreachable(m) => AuthError::service_unreachable(m),
                };
                self.set_session_if_current(gen, Session::failed(auth_err.message()));
                Err(auth_err)
            }
        }
    }

    /// Gate for login/signup: reject while another authenticating operation
    /// is in flight, otherwise enter `Authenticating` and supersede any
    /// still-pending restore verification.
    fn begin_authenticating(&self) -> AuthResult<u64> {
        let mut st = self.state.write();
        if st.session.status == SessionStatus::Authenticating {
            return Err(AuthError::busy("another sign-in is already in progress"));
        }
        st.generation += 1;
        st.session = Session::authenticating();
        st.verify_owed = None;
        Ok(st.generation)
    }

    fn complete_grant(&self, gen: u64, grant: AuthGrant, op: &str) -> AuthResult<UserProfile> {
        let applied = self.set_session_if_current(
            gen,
            Session::authenticated(grant.profile.clone(), grant.credential.clone()),
        );
        if applied {
            if let Err(e) = self.store.save(&grant.credential, &grant.profile) {
                warn!(target: "mediportal::session", "session.persist failed: {}", e);
            }
            info!(target: "mediportal::session", "session.{} user={} role={}", op, grant.profile.id, grant.profile.role);
        }
        Ok(grant.profile)
    }

    /// Purge storage, clear the in-memory session. Cannot fail; calling it
    /// again when already logged out is a no-op.
    pub fn logout(&self) {
        self.store.clear();
        let mut st = self.state.write();
        let was = st.session.status;
        st.generation += 1;
        st.session = Session::unauthenticated();
        st.verify_owed = None;
        drop(st);
        if was == SessionStatus::Authenticated {
            info!(target: "mediportal::session", "session.logout");
        }
    }

    /// Merge a partial update into the authenticated profile and re-persist.
    /// Never changes status.
    pub fn update_user(&self, update: &ProfileUpdate) -> AuthResult<UserProfile> {
        let mut st = self.state.write();
        let (Some(profile), Some(credential)) = (st.session.profile.clone(), st.session.credential.clone()) else {
            return Err(AuthError::unauthorized("no active session to update"));
        };
        let mut profile = profile;
        update.apply_to(&mut profile);
        st.generation += 1;
        st.session = Session::authenticated(profile.clone(), credential.clone());
        drop(st);
        if let Err(e) = self.store.save(&credential, &profile) {
            warn!(target: "mediportal::session", "session.persist failed: {}", e);
        }
        Ok(profile)
    }

    /// `Failed -> Unauthenticated`, clearing the error; used when the caller
    /// re-attempts input. No-op in any other state.
    pub fn clear_error(&self) {
        let mut st = self.state.write();
        if st.session.status == SessionStatus::Failed {
            st.generation += 1;
            st.session = Session::unauthenticated();
        }
    }

    // Remembered-login passthroughs: prefill for the login form only.

    pub fn remember_login(&self, email: &str, password: &str) {
        self.store.save_remembered(email, password);
    }

    pub fn remembered_login(&self) -> Option<(String, String)> {
        self.store.load_remembered()
    }

    pub fn forget_login(&self) {
        self.store.clear_remembered();
    }
}
