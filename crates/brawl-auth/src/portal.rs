//! Developer-portal session client
//!
//! Owns exactly one authenticated portal session: login captures the
//! response's session cookies and records an expiry a conservative margin
//! under the portal's 1-hour session TTL. Every session-bound operation
//! goes through [`PortalClient::ensure_session`] first, so callers never
//! reason about portal-session expiry — only about the key lifecycle.

use std::future::Future;
use std::net::Ipv4Addr;
use std::pin::Pin;
use std::time::{Duration, Instant};

use common::Secret;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::constants::{
    CREATE_KEY_PATH, DEFAULT_SESSION_MARGIN_SECS, LIST_KEYS_PATH, LOGIN_PATH, LOGOUT_PATH,
    PORTAL_BASE_URL, REVOKE_KEY_PATH,
};
use crate::error::{Error, Result};
use crate::keys::{
    ApiKey, CreateKeyResponse, ListKeysResponse, LoginResponse, RevokeKeyResponse, status_summary,
};

/// An authenticated portal session: the joined session cookies and a local
/// expiry. Never leaves the client that created it.
#[derive(Debug)]
struct Session {
    cookies: String,
    expires_at: Instant,
}

/// Session-management operations the token lifecycle manager depends on.
///
/// `Pin<Box<dyn Future>>` return types keep the trait dyn-compatible
/// (`Arc<dyn Portal>`), so tests can substitute an in-memory portal.
/// Implementations ensure a live session internally — callers never see
/// session expiry.
pub trait Portal: Send + Sync {
    fn list_keys(&self) -> Pin<Box<dyn Future<Output = Result<Vec<ApiKey>>> + Send + '_>>;

    fn create_key<'a>(
        &'a self,
        address: &'a str,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ApiKey>> + Send + 'a>>;

    fn revoke_key<'a>(&'a self, id: &'a str)
    -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Client for the developer portal's session and key-management endpoints.
pub struct PortalClient {
    http: reqwest::Client,
    base_url: String,
    email: String,
    password: Secret<String>,
    session_margin: Duration,
    session: Mutex<Option<Session>>,
}

impl PortalClient {
    /// Client against the production portal with the default session margin.
    pub fn new(http: reqwest::Client, email: impl Into<String>, password: Secret<String>) -> Self {
        Self::with_options(
            http,
            PORTAL_BASE_URL,
            email,
            password,
            Duration::from_secs(DEFAULT_SESSION_MARGIN_SECS),
        )
    }

    /// Client with an explicit base URL and session margin.
    ///
    /// `session_margin` must stay strictly under the portal's real session
    /// TTL (1 hour) or operations may run on an expired session.
    pub fn with_options(
        http: reqwest::Client,
        base_url: impl Into<String>,
        email: impl Into<String>,
        password: Secret<String>,
        session_margin: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            email: email.into(),
            password,
            session_margin,
            session: Mutex::new(None),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Authenticate against the portal and cache the session cookies.
    ///
    /// Succeeds only when the portal returns `Set-Cookie` headers — a
    /// success indicator without a cookie leaves nothing to authenticate
    /// later requests with.
    pub async fn login(&self) -> Result<()> {
        let mut slot = self.session.lock().await;
        self.login_locked(&mut slot).await
    }

    async fn login_locked(&self, slot: &mut Option<Session>) -> Result<()> {
        if self.email.is_empty() || self.password.expose().is_empty() {
            return Err(Error::Authentication(
                "portal email and password are required".into(),
            ));
        }

        let response = self
            .http
            .post(self.endpoint(LOGIN_PATH))
            .json(&serde_json::json!({
                "email": self.email,
                "password": self.password.expose(),
            }))
            .send()
            .await
            .map_err(|e| Error::Http(format!("login request failed: {e}")))?;

        let status = response.status();
        let cookies: Vec<String> = response
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .map(|value| value.trim().to_owned())
            .collect();

        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("reading login response: {e}")))?;
        let parsed: Option<LoginResponse> = serde_json::from_str(&body).ok();

        if cookies.is_empty() {
            let summary = parsed
                .map(|r| status_summary(&r.status))
                .unwrap_or_else(|| "unparseable response body".into());
            return Err(Error::Authentication(format!(
                "portal returned no session cookie ({status}): {summary}"
            )));
        }

        let server_ttl = parsed.and_then(|r| r.session_expires_in_seconds);
        *slot = Some(Session {
            cookies: cookies.join("; "),
            expires_at: Instant::now() + self.session_margin,
        });
        info!(
            margin_secs = self.session_margin.as_secs(),
            server_ttl_secs = server_ttl,
            "portal session established"
        );
        Ok(())
    }

    /// Log in iff no session is cached or the cached one has expired.
    ///
    /// The only self-healing entry point: every session-bound operation
    /// calls this before issuing its request.
    pub async fn ensure_session(&self) -> Result<()> {
        self.session_cookies().await.map(|_| ())
    }

    /// Cookie header value for a live session, logging in when needed.
    async fn session_cookies(&self) -> Result<String> {
        let mut slot = self.session.lock().await;
        match slot.as_ref() {
            Some(session) if Instant::now() < session.expires_at => Ok(session.cookies.clone()),
            _ => {
                debug!("no live portal session, logging in");
                self.login_locked(&mut slot).await?;
                let session = slot.as_ref().ok_or_else(|| {
                    Error::Authentication("login completed without establishing a session".into())
                })?;
                Ok(session.cookies.clone())
            }
        }
    }

    /// Create a key scoped to a single IPv4 address.
    ///
    /// `address` must be a dotted-quad; it becomes the key's sole CIDR
    /// entry (a /32-equivalent). Validation happens before any network
    /// call, including the session check.
    pub async fn create_key(&self, address: &str, name: &str) -> Result<ApiKey> {
        let address: Ipv4Addr = address.parse().map_err(|_| {
            Error::Validation(format!("not an IPv4 dotted-quad address: {address:?}"))
        })?;

        let cookies = self.session_cookies().await?;
        let body = serde_json::json!({
            "name": name,
            "description": format!(
                "[{address}] created {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
            ),
            "cidrRanges": [address.to_string()],
            "scopes": serde_json::Value::Null,
        });

        let response = self
            .http
            .post(self.endpoint(CREATE_KEY_PATH))
            .header(reqwest::header::COOKIE, cookies)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Http(format!("create-key request failed: {e}")))?;

        let status = response.status();
        let parsed: CreateKeyResponse = response.json().await.map_err(|e| {
            Error::Protocol(format!("create-key response was not valid JSON ({status}): {e}"))
        })?;

        match parsed.key {
            Some(key) => {
                info!(key_id = %key.id, name, %address, "created api key");
                Ok(key)
            }
            None => Err(Error::Remote(format!(
                "portal returned no created key ({status}): {}",
                status_summary(&parsed.status)
            ))),
        }
    }

    /// List every key on the account, verbatim.
    ///
    /// Other processes and the portal UI create keys too — callers must
    /// tolerate and ignore unrelated entries.
    pub async fn list_keys(&self) -> Result<Vec<ApiKey>> {
        let cookies = self.session_cookies().await?;
        let response = self
            .http
            .post(self.endpoint(LIST_KEYS_PATH))
            .header(reqwest::header::COOKIE, cookies)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| Error::Http(format!("list-keys request failed: {e}")))?;

        let status = response.status();
        let parsed: ListKeysResponse = response.json().await.map_err(|e| {
            Error::Protocol(format!("list-keys response was not valid JSON ({status}): {e}"))
        })?;

        debug!(keys = parsed.keys.len(), "listed account keys");
        Ok(parsed.keys)
    }

    /// Revoke a key by id.
    pub async fn revoke_key(&self, id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(Error::Validation("key id must be a non-empty string".into()));
        }

        let cookies = self.session_cookies().await?;
        let response = self
            .http
            .post(self.endpoint(REVOKE_KEY_PATH))
            .header(reqwest::header::COOKIE, cookies)
            .json(&serde_json::json!({ "id": id }))
            .send()
            .await
            .map_err(|e| Error::Http(format!("revoke-key request failed: {e}")))?;

        let status = response.status();
        let parsed: RevokeKeyResponse = response.json().await.map_err(|e| {
            Error::Protocol(format!("revoke-key response was not valid JSON ({status}): {e}"))
        })?;

        if parsed
            .status
            .as_ref()
            .is_some_and(|s| s.message == "ok")
        {
            info!(key_id = id, "revoked api key");
            Ok(())
        } else {
            Err(Error::Remote(format!(
                "portal did not confirm key revocation ({status}): {}",
                status_summary(&parsed.status)
            )))
        }
    }

    /// Best-effort session termination. Never errors: a failed logout has
    /// no correctness impact, the session simply expires on its own.
    pub async fn logout(&self) {
        let mut slot = self.session.lock().await;
        let Some(session) = slot.take() else {
            return;
        };

        let result = self
            .http
            .post(self.endpoint(LOGOUT_PATH))
            .header(reqwest::header::COOKIE, session.cookies)
            .json(&serde_json::json!({}))
            .send()
            .await;

        match result {
            Ok(response) => debug!(status = %response.status(), "portal session closed"),
            Err(e) => warn!(error = %e, "logout failed, session will expire server-side"),
        }
    }
}

impl Portal for PortalClient {
    fn list_keys(&self) -> Pin<Box<dyn Future<Output = Result<Vec<ApiKey>>> + Send + '_>> {
        Box::pin(PortalClient::list_keys(self))
    }

    fn create_key<'a>(
        &'a self,
        address: &'a str,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ApiKey>> + Send + 'a>> {
        Box::pin(PortalClient::create_key(self, address, name))
    }

    fn revoke_key<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(PortalClient::revoke_key(self, id))
    }
}
