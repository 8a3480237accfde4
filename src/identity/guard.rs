//! Route guarding: a pure function of the session snapshot plus the view's
//! optional required role. No internal state, no storage access.

use super::profile::Role;
use super::session::{Session, SessionStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Restore still reconciling; render a placeholder, decide nothing yet.
    Loading,
    /// Not authenticated: go to login, carrying the requested path so the
    /// caller can return there after a successful sign-in.
    RedirectToLogin { from: String },
    /// Authenticated but the view demands a different role: the visitor is
    /// legitimate, just misrouted. Send them home, never back to login.
    RedirectToRoleHome { role: Role, to: String },
    /// Render the requested view.
    Render,
}

pub fn evaluate(session: &Session, requested_path: &str, required_role: Option<Role>) -> RouteDecision {
    match session.status {
        SessionStatus::Restoring => RouteDecision::Loading,
        SessionStatus::Authenticated => {
            if let (Some(required), Some(profile)) = (required_role, session.profile.as_ref()) {
                if profile.role != required {
                    return RouteDecision::RedirectToRoleHome {
                        role: profile.role,
                        to: profile.role.home_path().to_string(),
                    };
                }
            }
            RouteDecision::Render
        }
        SessionStatus::Unauthenticated | SessionStatus::Authenticating | SessionStatus::Failed => {
            RouteDecision::RedirectToLogin { from: requested_path.to_string() }
        }
    }
}
