//! Developer-portal endpoints and defaults
//!
//! The portal is `developer.brawlstars.com` — a separate service from the
//! data API (`api.brawlstars.com`). All portal operations are POSTs to the
//! paths below; the base URL is injectable so tests can point at a local
//! mock server.

/// Developer-portal base URL
pub const PORTAL_BASE_URL: &str = "https://developer.brawlstars.com";

/// Authentication endpoint (sets session cookies)
pub const LOGIN_PATH: &str = "/api/login";

/// Session termination endpoint
pub const LOGOUT_PATH: &str = "/api/logout";

/// Key creation endpoint
pub const CREATE_KEY_PATH: &str = "/api/apikey/create";

/// Key listing endpoint
pub const LIST_KEYS_PATH: &str = "/api/apikey/list";

/// Key revocation endpoint
pub const REVOKE_KEY_PATH: &str = "/api/apikey/revoke";

/// Public-IP discovery endpoint (returns `{"ip": "..."}`)
pub const IP_DISCOVERY_URL: &str = "https://api.ipify.org?format=json";

/// Default name for keys this client provisions
pub const DEFAULT_KEY_NAME: &str = "autoCreate";

/// Default session lifetime margin in seconds.
///
/// The portal issues 1-hour sessions; operating on a margin strictly under
/// the server TTL avoids ever sending a request on an expired session.
pub const DEFAULT_SESSION_MARGIN_SECS: u64 = 3599;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portal_paths_are_rooted() {
        for path in [
            LOGIN_PATH,
            LOGOUT_PATH,
            CREATE_KEY_PATH,
            LIST_KEYS_PATH,
            REVOKE_KEY_PATH,
        ] {
            assert!(path.starts_with("/api/"), "unexpected path: {path}");
        }
    }

    #[test]
    fn session_margin_is_under_one_hour() {
        assert!(DEFAULT_SESSION_MARGIN_SECS < 3600);
    }
}
