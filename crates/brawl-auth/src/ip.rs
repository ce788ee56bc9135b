//! Public-IP discovery
//!
//! Keys are allow-listed per caller address, so every acquisition starts by
//! resolving the current public IPv4 address. Discovery failure is fatal to
//! the acquisition attempt — there is no address to scope a key to.

use std::future::Future;
use std::net::Ipv4Addr;
use std::pin::Pin;

use serde::Deserialize;
use tracing::debug;

use crate::constants::IP_DISCOVERY_URL;
use crate::error::{Error, Result};

/// Resolves the caller's current public IPv4 address.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn IpDiscovery>`), which is what lets tests inject a fixed
/// address instead of hitting the network.
pub trait IpDiscovery: Send + Sync {
    fn public_ip(&self) -> Pin<Box<dyn Future<Output = Result<Ipv4Addr>> + Send + '_>>;
}

#[derive(Debug, Deserialize)]
struct DiscoveryResponse {
    ip: String,
}

/// Production discovery against `api.ipify.org`.
pub struct IpifyDiscovery {
    http: reqwest::Client,
    endpoint: String,
}

impl IpifyDiscovery {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_endpoint(http, IP_DISCOVERY_URL)
    }

    /// Discovery against a custom endpoint returning `{"ip": "..."}`.
    pub fn with_endpoint(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    async fn discover(&self) -> Result<Ipv4Addr> {
        let response = self
            .http
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| Error::Http(format!("ip discovery request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Remote(format!(
                "ip discovery endpoint returned {status}"
            )));
        }

        let parsed: DiscoveryResponse = response
            .json()
            .await
            .map_err(|e| Error::Protocol(format!("ip discovery response was not valid JSON: {e}")))?;

        let address: Ipv4Addr = parsed.ip.parse().map_err(|_| {
            Error::Protocol(format!(
                "ip discovery returned a non-IPv4 address: {}",
                parsed.ip
            ))
        })?;

        debug!(%address, "discovered public address");
        Ok(address)
    }
}

impl IpDiscovery for IpifyDiscovery {
    fn public_ip(&self) -> Pin<Box<dyn Future<Output = Result<Ipv4Addr>> + Send + '_>> {
        Box::pin(self.discover())
    }
}
