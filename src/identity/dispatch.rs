//! Dashboard dispatch: total, pure mapping from the session snapshot to the
//! view variant the entry page should render.

use std::fmt::{Display, Formatter};

use super::profile::Role;
use super::session::{Session, SessionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardView {
    Loading,
    AccessDenied,
    Patient,
    Doctor,
    Admin,
    /// Diagnostic fallback for an unrecognized role; renders a message
    /// naming the problem instead of a blank screen.
    UnknownRole,
}

impl DashboardView {
    pub fn title(self) -> &'static str {
        match self {
            DashboardView::Loading => "Loading…",
            DashboardView::AccessDenied => "Please sign in",
            DashboardView::Patient => "Patient Dashboard",
            DashboardView::Doctor => "Doctor Dashboard",
            DashboardView::Admin => "Admin Dashboard",
            DashboardView::UnknownRole => "Unrecognized account role",
        }
    }
}

impl Display for DashboardView {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

/// Total over every session status and every role value, including roles the
/// backend invented after this client shipped (those decode to
/// `Role::Unknown` and land on the diagnostic view).
pub fn dispatch(session: &Session) -> DashboardView {
    match session.status {
        SessionStatus::Restoring | SessionStatus::Authenticating => DashboardView::Loading,
        SessionStatus::Unauthenticated | SessionStatus::Failed => DashboardView::AccessDenied,
        SessionStatus::Authenticated => match session.profile.as_ref().map(|p| p.role) {
            Some(Role::Patient) => DashboardView::Patient,
            Some(Role::Doctor) => DashboardView::Doctor,
            Some(Role::Admin) => DashboardView::Admin,
            Some(Role::Unknown) => DashboardView::UnknownRole,
            // Unreachable while the manager upholds its invariants; still a
            // defined outcome rather than a panic.
            None => DashboardView::AccessDenied,
        },
    }
}
