//! Unified error model for session operations.
//! Every failure a caller can see is one of these variants; nothing in the
//! session subsystem panics or throws past this enum. Storage corruption and
//! verification-time credential expiry are recovered internally and never
//! reach a caller.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::identity::IdentityError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthError {
    InvalidCredentials { message: String },
    AccountExists { message: String },
    Unauthorized { message: String },
    ServiceUnreachable { message: String },
    Busy { message: String },
    MalformedPersistedState { message: String },
}

impl AuthError {
    pub fn code_str(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials { .. } => "invalid_credentials",
            AuthError::AccountExists { .. } => "account_exists",
            AuthError::Unauthorized { .. } => "unauthorized",
            AuthError::ServiceUnreachable { .. } => "service_unreachable",
            AuthError::Busy { .. } => "busy",
            AuthError::MalformedPersistedState { .. } => "malformed_persisted_state",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AuthError::InvalidCredentials { message }
            | AuthError::AccountExists { message }
            | AuthError::Unauthorized { message }
            | AuthError::ServiceUnreachable { message }
            | AuthError::Busy { message }
            | AuthError::MalformedPersistedState { message } => message.as_str(),
        }
    }

    pub fn invalid_credentials<S: Into<String>>(msg: S) -> Self { AuthError::InvalidCredentials { message: msg.into() } }
    pub fn account_exists<S: Into<String>>(msg: S) -> Self { AuthError::AccountExists { message: msg.into() } }
    pub fn unauthorized<S: Into<String>>(msg: S) -> Self { AuthError::Unauthorized { message: msg.into() } }
    pub fn service_unreachable<S: Into<String>>(msg: S) -> Self { AuthError::ServiceUnreachable { message: msg.into() } }
    pub fn busy<S: Into<String>>(msg: S) -> Self { AuthError::Busy { message: msg.into() } }
    pub fn malformed_persisted_state<S: Into<String>>(msg: S) -> Self { AuthError::MalformedPersistedState { message: msg.into() } }

    /// Map to HTTP status code, for embedders that relay these over HTTP.
    pub fn http_status(&self) -> u16 {
        match self {
            AuthError::InvalidCredentials { .. } => 401,
            AuthError::AccountExists { .. } => 409,
            AuthError::Unauthorized { .. } => 401,
            AuthError::ServiceUnreachable { .. } => 503,
            AuthError::Busy { .. } => 429,
            AuthError::MalformedPersistedState { .. } => 500,
        }
    }
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AuthError {}

pub type AuthResult<T> = Result<T, AuthError>;

/// Context-free mapping from the identity client's wire classification.
/// The session manager overrides this where the operation gives better
/// context (e.g. a rejected signup surfacing as `AccountExists`).
impl From<IdentityError> for AuthError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Unauthorized(msg) => AuthError::unauthorized(msg),
            IdentityError::Invalid(msg) => AuthError::invalid_credentials(msg),
            IdentityError::Unreachable(msg) => AuthError::service_unreachable(msg),
        }
    }
}
