//! Data-request dispatcher
//!
//! Issues bearer-authenticated GETs against the data API with tokens
//! supplied by the lifecycle manager. Authorization rejections trigger
//! one forced key refresh and one replay of the identical request; a
//! second rejection is fatal. Everything else maps straight onto the
//! error taxonomy: remote rejections keep the API's reason/message
//! fields, success statuses with broken bodies are contract violations.

use std::sync::Arc;
use std::time::Duration;

use brawl_auth::{IpifyDiscovery, PortalClient, TokenManager};
use common::Secret;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Club, ClubMember, PagedList, Player};
use crate::paging::Page;

/// Default data-API base URL.
pub const API_BASE_URL: &str = "https://api.brawlstars.com";

/// API version segment prefixed to every path.
const API_VERSION: &str = "v1";

/// Client for the data API, dispatching through the token lifecycle
/// manager.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenManager>,
}

impl ApiClient {
    /// Client against the production data API.
    pub fn new(http: reqwest::Client, tokens: Arc<TokenManager>) -> Self {
        Self::with_base_url(http, API_BASE_URL, tokens)
    }

    /// Client against a custom base URL (tests point this at a local
    /// mock server).
    pub fn with_base_url(
        http: reqwest::Client,
        base_url: impl Into<String>,
        tokens: Arc<TokenManager>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            tokens,
        }
    }

    /// Wire up the full stack — portal client, IP discovery, token
    /// manager, dispatcher — from a loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .build()
            .map_err(|e| Error::Http(format!("building http client: {e}")))?;

        let password = config
            .portal
            .password
            .clone()
            .unwrap_or_else(|| Secret::new(String::new()));
        let portal = PortalClient::with_options(
            http.clone(),
            config.portal.base_url.clone(),
            config.portal.email.clone(),
            password,
            Duration::from_secs(config.portal.session_margin_secs),
        );
        let discovery = IpifyDiscovery::with_endpoint(http.clone(), config.api.ip_endpoint.clone());
        let tokens = Arc::new(TokenManager::new(
            Arc::new(portal),
            Arc::new(discovery),
            config.portal.key_name.clone(),
        ));

        Ok(Self::with_base_url(http, config.api.base_url.clone(), tokens))
    }

    /// The token lifecycle manager backing this client (for explicit
    /// `refresh`/`cleanup` calls).
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Issue an authenticated GET for an API path (no leading slash, no
    /// version prefix) and parse the body.
    ///
    /// On a 403 the key is refreshed and the request replayed exactly
    /// once; a second 403 surfaces as [`Error::Authorization`].
    pub async fn fetch(&self, path: &str) -> Result<serde_json::Value> {
        let token = self.tokens.get_token().await?;
        let response = self.request(path, &token).await?;

        if response.status().as_u16() != 403 {
            return parse_response(path, response).await;
        }

        debug!(path, "authorization rejected, refreshing api key");
        let token = self.tokens.refresh().await?;
        let retry = self.request(path, &token).await?;

        if retry.status().as_u16() == 403 {
            let body = retry
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            warn!(path, "request rejected again after key refresh");
            return Err(Error::Authorization(format!(
                "request to {path} rejected twice: {body}"
            )));
        }
        parse_response(path, retry).await
    }

    async fn request(&self, path: &str, token: &str) -> Result<reqwest::Response> {
        self.http
            .get(format!("{}/{API_VERSION}/{path}", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Http(format!("request to {path} failed: {e}")))
    }

    /// Look up a club by tag.
    pub async fn get_club(&self, tag: &str) -> Result<Club> {
        let value = self.fetch(&format!("clubs/{}", encode_tag(tag))).await?;
        decode("club", value)
    }

    /// A club's member list, optionally windowed by pagination cursors.
    pub async fn get_club_members(&self, tag: &str, page: &Page) -> Result<PagedList<ClubMember>> {
        let query = page.query()?;
        let value = self
            .fetch(&format!("clubs/{}/members{query}", encode_tag(tag)))
            .await?;
        decode("club member list", value)
    }

    /// Look up a player by tag.
    pub async fn get_player(&self, tag: &str) -> Result<Player> {
        let value = self.fetch(&format!("players/{}", encode_tag(tag))).await?;
        decode("player", value)
    }

    /// A player's recent battles. The payload shape varies per game mode,
    /// so it is returned raw.
    pub async fn get_player_battlelog(&self, tag: &str) -> Result<serde_json::Value> {
        self.fetch(&format!("players/{}/battlelog", encode_tag(tag)))
            .await
    }
}

/// Map a parsed body into a domain entity, reporting shape mismatches as
/// protocol errors.
fn decode<T: serde::de::DeserializeOwned>(what: &str, value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| Error::Protocol(format!("{what} payload did not match expected shape: {e}")))
}

/// Percent-encode a `#`-prefixed entity tag for use in a path segment.
/// Accepts tags with or without the leading `#`.
fn encode_tag(tag: &str) -> String {
    format!("%23{}", tag.trim_start_matches('#'))
}

async fn parse_response(path: &str, response: reqwest::Response) -> Result<serde_json::Value> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::Http(format!("reading response body from {path}: {e}")))?;

    if status.is_success() {
        if body.is_empty() {
            return Err(Error::Protocol(format!(
                "empty response body from {path} ({status})"
            )));
        }
        return serde_json::from_str(&body).map_err(|e| {
            Error::Protocol(format!("response from {path} ({status}) was not valid JSON: {e}"))
        });
    }

    let (reason, message) = parse_error_body(&body);
    Err(Error::Remote {
        status: status.as_u16(),
        reason,
        message,
    })
}

/// Pull the machine-readable `reason`/`message` fields out of an error
/// body, falling back to the raw text when the body isn't the documented
/// shape.
fn parse_error_body(body: &str) -> (String, String) {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => {
            let reason = value
                .get("reason")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown")
                .to_owned();
            let message = value
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or(body)
                .to_owned();
            (reason, message)
        }
        Err(_) => ("unknown".into(), body.to_owned()),
    }
}
