//! Portal key records and network-range matching
//!
//! The portal exchanges key records as camelCase JSON. A key's
//! `cidrRanges` restriction is the allow-list of caller addresses it is
//! valid from — the lifecycle manager adopts an existing key only when one
//! of those entries covers the caller's current public address.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Portal operation status (`code` 0 and `message` "ok" on success).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalStatus {
    #[serde(default)]
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub detail: Option<String>,
}

/// One network-range restriction on a key: a list of CIDR entries plus the
/// restriction type (the portal uses `"client"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CidrRestriction {
    pub cidrs: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
}

/// An API key registered on the developer account.
///
/// Identity is `id`; `key` is the secret bearer token presented to the
/// data API. The key is usable only while one of its CIDR entries covers
/// the caller's public address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    pub id: String,
    pub developer_id: String,
    pub tier: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub origins: Option<Vec<String>>,
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
    #[serde(default)]
    pub cidr_ranges: Vec<CidrRestriction>,
    #[serde(default)]
    pub valid_until: Option<String>,
    pub key: String,
}

impl ApiKey {
    /// Whether any of this key's CIDR entries covers `address`.
    pub fn allows_address(&self, address: Ipv4Addr) -> bool {
        self.cidr_ranges
            .iter()
            .flat_map(|restriction| restriction.cidrs.iter())
            .any(|entry| cidr_covers(entry, address))
    }
}

/// Check whether a CIDR entry covers an address.
///
/// Entries come in two forms: a bare dotted-quad (`"203.0.113.5"`, treated
/// as /32) or an explicit prefix (`"203.0.113.0/24"`). Unparseable entries
/// never match — a garbage restriction must not cause a key to be adopted.
pub fn cidr_covers(entry: &str, address: Ipv4Addr) -> bool {
    let (net, prefix_len) = match entry.split_once('/') {
        Some((net, len)) => match len.parse::<u8>() {
            Ok(len) if len <= 32 => (net, len),
            _ => return false,
        },
        None => (entry, 32),
    };
    let Ok(net) = net.parse::<Ipv4Addr>() else {
        return false;
    };
    if prefix_len == 0 {
        return true;
    }
    let mask = u32::MAX << (32 - prefix_len);
    (u32::from(net) & mask) == (u32::from(address) & mask)
}

/// Login response envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default)]
    pub status: Option<PortalStatus>,
    #[serde(default)]
    pub session_expires_in_seconds: Option<u64>,
}

/// Key-listing response envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListKeysResponse {
    #[serde(default)]
    pub status: Option<PortalStatus>,
    #[serde(default)]
    pub session_expires_in_seconds: Option<u64>,
    #[serde(default)]
    pub keys: Vec<ApiKey>,
}

/// Key-creation response envelope. `key` is absent when creation failed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyResponse {
    #[serde(default)]
    pub status: Option<PortalStatus>,
    #[serde(default)]
    pub key: Option<ApiKey>,
}

/// Key-revocation response envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeKeyResponse {
    #[serde(default)]
    pub status: Option<PortalStatus>,
}

/// Render a portal status for error messages.
pub(crate) fn status_summary(status: &Option<PortalStatus>) -> String {
    match status {
        Some(status) => match &status.detail {
            Some(detail) => format!("{} ({detail})", status.message),
            None => status.message.clone(),
        },
        None => "no status in response".into(),
    }
}
