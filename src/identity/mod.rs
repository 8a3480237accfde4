//! Session and access-control management: the authentication state machine,
//! the identity-backend client, and the routing decisions derived from auth
//! state. Keep the public surface thin and split implementation across
//! sub-modules.

mod client;
mod dispatch;
mod guard;
mod manager;
mod profile;
mod session;

pub use client::{AuthGrant, HttpIdentityClient, IdentityApi, IdentityError, LoginRequest, SignupRequest};
pub use dispatch::{dispatch, DashboardView};
pub use guard::{evaluate, RouteDecision};
pub use manager::SessionManager;
pub use profile::{ProfileUpdate, Role, UserProfile};
pub use session::{Session, SessionStatus};
