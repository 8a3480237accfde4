//! Typed adapter over the identity backend's three remote calls.
//!
//! Wire contract (`/api/auth` on the backend):
//!   POST /api/auth/login   {email, password}              -> {success, data: {user, token}}
//!   POST /api/auth/signup  {email, password, name, role}  -> {success, data: {user, token}}
//!   GET  /api/auth/me      Authorization: Bearer <token>  -> {success, data: <user>}
//! Failures carry `{"error": "<message>"}`. Classification is load-bearing
//! for the session manager: 401 means the credential is bad and the session
//! must go; a transport failure means the backend never rendered a verdict
//! and the cached session must stay.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::profile::{Role, UserProfile};
use crate::config::PortalConfig;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// The credential is invalid or expired; the backend saw it and said no.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The backend rejected the input (bad email, duplicate account, ...).
    #[error("invalid request: {0}")]
    Invalid(String),
    /// Transport failure or backend fault; no verdict was rendered.
    #[error("identity service unreachable: {0}")]
    Unreachable(String),
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub role: Role,
}

/// A freshly issued credential with the profile it belongs to.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    pub profile: UserProfile,
    pub credential: String,
}

#[async_trait]
pub trait IdentityApi: Send + Sync {
    async fn login(&self, req: &LoginRequest) -> Result<AuthGrant, IdentityError>;
    async fn signup(&self, req: &SignupRequest) -> Result<AuthGrant, IdentityError>;
    async fn fetch_current_user(&self, credential: &str) -> Result<UserProfile, IdentityError>;
}

pub struct HttpIdentityClient {
    base: Url,
    client: reqwest::Client,
}

impl HttpIdentityClient {
    pub fn new(base: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base = Url::parse(base)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base, client })
    }

    pub fn from_config(cfg: &PortalConfig) -> anyhow::Result<Self> {
        Self::new(&cfg.api_url, cfg.http_timeout)
    }

    fn endpoint(&self, path: &str) -> Result<Url, IdentityError> {
        self.base
            .join(path)
            .map_err(|e| IdentityError::Unreachable(format!("bad endpoint {path}: {e}")))
    }

    /// Map a non-success response to the error taxonomy. 5xx counts as
    /// unreachable: the backend faulted before rendering a verdict.
    async fn classify_failure(resp: reqwest::Response) -> IdentityError {
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::json!({}));
        let msg = body
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("request rejected")
            .to_string();
        if status == StatusCode::UNAUTHORIZED {
            IdentityError::Unauthorized(msg)
        } else if status.is_client_error() {
            IdentityError::Invalid(msg)
        } else {
            IdentityError::Unreachable(format!("HTTP {status}: {msg}"))
        }
    }

    /// Pull a user object out of a success envelope, warning once if the
    /// backend sent a role string we do not recognize.
    fn decode_user(user: &serde_json::Value) -> Result<UserProfile, IdentityError> {
        if let Some(raw_role) = user.get("role").and_then(|v| v.as_str()) {
            if Role::parse(raw_role) == Role::Unknown {
                warn!(target: "mediportal::identity", "backend sent unrecognized role '{}'", raw_role);
            }
        }
        serde_json::from_value::<UserProfile>(user.clone())
            .map_err(|e| IdentityError::Unreachable(format!("malformed user payload: {e}")))
    }

    async fn decode_grant(resp: reqwest::Response) -> Result<AuthGrant, IdentityError> {
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| IdentityError::Unreachable(format!("malformed response body: {e}")))?;
        let data = body
            .get("data")
            .ok_or_else(|| IdentityError::Unreachable("response missing data".into()))?;
        let user = data
            .get("user")
            .ok_or_else(|| IdentityError::Unreachable("response missing data.user".into()))?;
        let token = data
            .get("token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| IdentityError::Unreachable("response missing data.token".into()))?;
        let profile = Self::decode_user(user)?;
        Ok(AuthGrant { profile, credential: token.to_string() })
    }
}

#[async_trait]
impl IdentityApi for HttpIdentityClient {
    async fn login(&self, req: &LoginRequest) -> Result<AuthGrant, IdentityError> {
        let url = self.endpoint("/api/auth/login")?;
        let resp = self
            .client
            .post(url)
            .json(&serde_json::json!({"email": req.email, "password": req.password}))
            .send()
            .await
            .map_err(|e| IdentityError::Unreachable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Self::classify_failure(resp).await);
        }
        let grant = Self::decode_grant(resp).await?;
        debug!(target: "mediportal::identity", "login ok user={}", grant.profile.id);
        Ok(grant)
    }

    async fn signup(&self, req: &SignupRequest) -> Result<AuthGrant, IdentityError> {
        let url = self.endpoint("/api/auth/signup")?;
        let resp = self
            .client
            .post(url)
            .json(&serde_json::json!({
                "email": req.email,
                "password": req.password,
                "name": req.display_name,
                "role": req.role.as_str(),
            }))
            .send()
            .await
            .map_err(|e| IdentityError::Unreachable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Self::classify_failure(resp).await);
        }
        let grant = Self::decode_grant(resp).await?;
        debug!(target: "mediportal::identity", "signup ok user={}", grant.profile.id);
        Ok(grant)
    }

    async fn fetch_current_user(&self, credential: &str) -> Result<UserProfile, IdentityError> {
        let url = self.endpoint("/api/auth/me")?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|e| IdentityError::Unreachable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Self::classify_failure(resp).await);
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| IdentityError::Unreachable(format!("malformed response body: {e}")))?;
        let user = body
            .get("data")
            .ok_or_else(|| IdentityError::Unreachable("response missing data".into()))?;
        Self::decode_user(user)
    }
}
