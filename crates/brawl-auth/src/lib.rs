//! Developer-portal authentication and API-key lifecycle
//!
//! The Brawl Stars data API is gated behind bearer keys that can only be
//! provisioned through the developer portal — a separate service with its
//! own login, cookies, and endpoints. Each key is bound to the caller's
//! public IPv4 address, so a usable key must be re-provisioned whenever
//! that address changes.
//!
//! This crate owns both halves of that problem:
//! 1. [`PortalClient`] holds the portal session (login, key create/list/
//!    revoke, logout) and re-authenticates transparently when the session
//!    expires.
//! 2. [`TokenManager`] decides whether a usable key already exists (cached
//!    locally, or discoverable on the account by matching the current
//!    public address), creates one when it doesn't, and revokes the old
//!    key on refresh.
//!
//! The data-request side lives in `brawl-client`, which pulls tokens from
//! the manager and forces a refresh on authorization failures.

pub mod constants;
pub mod error;
pub mod ip;
pub mod keys;
pub mod manager;
pub mod portal;

pub use error::{Error, Result};
pub use ip::{IpDiscovery, IpifyDiscovery};
pub use keys::{ApiKey, CidrRestriction, PortalStatus};
pub use manager::TokenManager;
pub use portal::{Portal, PortalClient};
