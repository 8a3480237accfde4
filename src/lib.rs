//! Client-side session and access-control management for the mediportal
//! healthcare portal. Owns the authentication state machine, its durable
//! restore across reloads, and the routing decisions derived from it.
//! The backend identity service is consumed only through the wire
//! contract in [`identity::HttpIdentityClient`].

pub mod config;
pub mod error;
pub mod identity;
pub mod store;
