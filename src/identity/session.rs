use serde::{Deserialize, Serialize};

use super::profile::UserProfile;

/// Exactly one status holds at any instant; there are no observable
/// intermediate states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Unauthenticated,
    Restoring,
    Authenticating,
    Authenticated,
    Failed,
}

/// The client-held record of whether, and as whom, the visitor is
/// authenticated. Constructed only through the constructors below so the
/// field invariants hold: `Authenticated` carries both profile and
/// credential, every other status carries neither.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub status: SessionStatus,
    pub profile: Option<UserProfile>,
    pub credential: Option<String>,
    pub last_error: Option<String>,
}

impl Session {
    fn bare(status: SessionStatus) -> Self {
        Self { status, profile: None, credential: None, last_error: None }
    }

    pub fn unauthenticated() -> Self {
        Self::bare(SessionStatus::Unauthenticated)
    }

    pub fn restoring() -> Self {
        Self::bare(SessionStatus::Restoring)
    }

    pub fn authenticating() -> Self {
        Self::bare(SessionStatus::Authenticating)
    }

    pub fn authenticated(profile: UserProfile, credential: String) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            profile: Some(profile),
            credential: Some(credential),
            last_error: None,
        }
    }

    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self {
            status: SessionStatus::Failed,
            profile: None,
            credential: None,
            last_error: Some(message.into()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }
}
