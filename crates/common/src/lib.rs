//! Common types shared by the portal-auth and data-client crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
