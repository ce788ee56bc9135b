//! API-key lifecycle manager
//!
//! Decides whether a usable key already exists, when to create one, and
//! when to revoke the old one. The cached token is a tagged state — a
//! token is never cached without its key id, so the partial states the
//! portal's ad-hoc clients tend to grow are unrepresentable here.
//!
//! Acquisition is reuse-by-network-address: the remote API enforces
//! per-key IP allow-listing, so the manager re-resolves the public
//! address on every acquisition and adopts any account key whose CIDR
//! restriction already covers it before creating anything new. That keeps
//! the account from accumulating one key per process restart.
//!
//! The state mutex is held across the whole acquisition protocol, so two
//! concurrent `get_token` calls from the empty state run exactly one
//! acquisition; the second caller observes the bound state and returns
//! the cached token.

use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::ip::IpDiscovery;
use crate::portal::Portal;

/// Lifecycle state of the locally cached token.
///
/// Both the secret token and its key id are set or neither is — there is
/// no partial state. "Stale" is an event (explicit refresh, a dispatch
/// 403, or an address change observed during acquisition), not a stored
/// state: it immediately drops the manager back to `Empty`.
#[derive(Debug, Clone)]
enum TokenState {
    Empty,
    Bound {
        token: String,
        key_id: String,
        address: Ipv4Addr,
    },
}

/// Owns the reuse-or-create key acquisition protocol and the cached token.
pub struct TokenManager {
    portal: Arc<dyn Portal>,
    ip: Arc<dyn IpDiscovery>,
    key_name: String,
    state: Mutex<TokenState>,
}

impl TokenManager {
    pub fn new(
        portal: Arc<dyn Portal>,
        ip: Arc<dyn IpDiscovery>,
        key_name: impl Into<String>,
    ) -> Self {
        Self {
            portal,
            ip,
            key_name: key_name.into(),
            state: Mutex::new(TokenState::Empty),
        }
    }

    /// Return the cached token, acquiring one first when none is bound.
    ///
    /// The bound path is the common, cheap one: no network calls, the
    /// cached secret is returned as-is.
    pub async fn get_token(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        if let TokenState::Bound { token, .. } = &*state {
            return Ok(token.clone());
        }
        self.acquire(&mut state, None).await
    }

    /// Force a fresh acquisition.
    ///
    /// When bound, the cached key is revoked first — best effort: an
    /// orphaned key on the portal is a cleanup concern, not a correctness
    /// one, so a revoke failure is logged and acquisition proceeds.
    pub async fn refresh(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        let prior = match &*state {
            TokenState::Bound { key_id, address, .. } => {
                match self.portal.revoke_key(key_id).await {
                    Ok(()) => debug!(key_id = %key_id, "revoked key before refresh"),
                    Err(e) => {
                        warn!(key_id = %key_id, error = %e, "revoke before refresh failed, orphaning key")
                    }
                }
                let prior = (key_id.clone(), *address);
                *state = TokenState::Empty;
                Some(prior)
            }
            TokenState::Empty => None,
        };
        self.acquire(&mut state, prior).await
    }

    /// Revoke the cached key and drop back to the empty state.
    ///
    /// Returns whether revocation succeeded. Idempotent: with nothing
    /// bound this is a no-op success. Never errors — a portal refusal is
    /// reported as `false` and the binding is kept so a later call can
    /// retry.
    pub async fn cleanup(&self) -> bool {
        let mut state = self.state.lock().await;
        let TokenState::Bound { key_id, .. } = &*state else {
            return true;
        };
        match self.portal.revoke_key(key_id).await {
            Ok(()) => {
                *state = TokenState::Empty;
                true
            }
            Err(e) => {
                warn!(key_id = %key_id, error = %e, "key revocation failed");
                false
            }
        }
    }

    /// Key id of the bound token, if any.
    pub async fn bound_key_id(&self) -> Option<String> {
        match &*self.state.lock().await {
            TokenState::Bound { key_id, .. } => Some(key_id.clone()),
            TokenState::Empty => None,
        }
    }

    /// Run the acquisition protocol: discover the public address, scan the
    /// account for an adoptable key, create one when none covers the
    /// address. Called with the state lock held (the caller has already
    /// dropped any previous binding); `prior` is the replaced binding, for
    /// diagnostics.
    async fn acquire(
        &self,
        state: &mut TokenState,
        prior: Option<(String, Ipv4Addr)>,
    ) -> Result<String> {
        let prior_key = prior.as_ref().map(|(key_id, _)| key_id.clone());
        let prior_address = prior.as_ref().map(|(_, address)| *address);

        let address = match self.ip.public_ip().await {
            Ok(address) => address,
            Err(e) => return Err(acquisition_error("ip-discovery", prior_key, prior_address, e)),
        };

        if prior_address.is_some_and(|old| old != address) {
            debug!(old = ?prior_address, new = %address, "public address changed since previous binding");
        }

        let keys = match self.portal.list_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                return Err(acquisition_error(
                    step_of(&e, "list-keys"),
                    prior_key,
                    Some(address),
                    e,
                ));
            }
        };

        // Keys created by other processes or the portal UI coexist on the
        // account; only an address match makes one adoptable.
        if let Some(key) = keys.iter().find(|key| key.allows_address(address)) {
            info!(key_id = %key.id, name = %key.name, %address, "adopted existing api key");
            *state = TokenState::Bound {
                token: key.key.clone(),
                key_id: key.id.clone(),
                address,
            };
            return Ok(key.key.clone());
        }

        let key = match self
            .portal
            .create_key(&address.to_string(), &self.key_name)
            .await
        {
            Ok(key) => key,
            Err(e) => {
                return Err(acquisition_error(
                    step_of(&e, "create-key"),
                    prior_key,
                    Some(address),
                    e,
                ));
            }
        };

        info!(key_id = %key.id, %address, "bound newly created api key");
        let token = key.key.clone();
        *state = TokenState::Bound {
            token: key.key,
            key_id: key.id,
            address,
        };
        Ok(token)
    }
}

/// Attribute a portal failure to the lifecycle sub-step it occurred in.
/// Login failures surface inside list/create calls (the portal client
/// re-authenticates internally) and are reported as their own step.
fn step_of(error: &Error, fallback: &'static str) -> &'static str {
    match error {
        Error::Authentication(_) => "login",
        _ => fallback,
    }
}

fn acquisition_error(
    step: &'static str,
    key_id: Option<String>,
    address: Option<Ipv4Addr>,
    source: Error,
) -> Error {
    Error::Acquisition {
        step,
        key_id,
        address,
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::keys::{ApiKey, CidrRestriction};

    fn test_key(id: &str, name: &str, cidr: &str, token: &str) -> ApiKey {
        ApiKey {
            id: id.into(),
            developer_id: "dev-1".into(),
            tier: "developer/silver".into(),
            name: name.into(),
            description: format!("[{cidr}] test"),
            origins: None,
            scopes: Some(vec!["brawlstars".into()]),
            cidr_ranges: vec![CidrRestriction {
                cidrs: vec![cidr.into()],
                kind: "client".into(),
            }],
            valid_until: None,
            key: token.into(),
        }
    }

    /// In-memory portal with per-operation call counters and failure
    /// injection.
    #[derive(Default)]
    struct FakePortal {
        keys: std::sync::Mutex<Vec<ApiKey>>,
        list_calls: AtomicUsize,
        create_calls: AtomicUsize,
        revoke_calls: AtomicUsize,
        fail_list: Option<fn() -> Error>,
        fail_create: bool,
        fail_revoke: bool,
    }

    impl FakePortal {
        fn with_keys(keys: Vec<ApiKey>) -> Arc<Self> {
            Arc::new(Self {
                keys: std::sync::Mutex::new(keys),
                ..Self::default()
            })
        }

        fn empty() -> Arc<Self> {
            Self::with_keys(Vec::new())
        }
    }

    impl Portal for FakePortal {
        fn list_keys(&self) -> Pin<Box<dyn Future<Output = Result<Vec<ApiKey>>> + Send + '_>> {
            Box::pin(async move {
                self.list_calls.fetch_add(1, Ordering::SeqCst);
                if let Some(make_error) = self.fail_list {
                    return Err(make_error());
                }
                Ok(self.keys.lock().unwrap().clone())
            })
        }

        fn create_key<'a>(
            &'a self,
            address: &'a str,
            name: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<ApiKey>> + Send + 'a>> {
            Box::pin(async move {
                let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
                if self.fail_create {
                    return Err(Error::Remote("key quota reached".into()));
                }
                let key = test_key(&format!("key-{n}"), name, address, &format!("token-{n}"));
                self.keys.lock().unwrap().push(key.clone());
                Ok(key)
            })
        }

        fn revoke_key<'a>(
            &'a self,
            id: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
            Box::pin(async move {
                self.revoke_calls.fetch_add(1, Ordering::SeqCst);
                if self.fail_revoke {
                    return Err(Error::Remote("unknown key".into()));
                }
                self.keys.lock().unwrap().retain(|key| key.id != id);
                Ok(())
            })
        }
    }

    /// Discovery returning a fixed address, counting invocations.
    struct FixedIp {
        address: Ipv4Addr,
        calls: AtomicUsize,
    }

    impl FixedIp {
        fn new(address: &str) -> Arc<Self> {
            Arc::new(Self {
                address: address.parse().unwrap(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl IpDiscovery for FixedIp {
        fn public_ip(&self) -> Pin<Box<dyn Future<Output = Result<Ipv4Addr>> + Send + '_>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let address = self.address;
            Box::pin(async move { Ok(address) })
        }
    }

    struct FailingIp;

    impl IpDiscovery for FailingIp {
        fn public_ip(&self) -> Pin<Box<dyn Future<Output = Result<Ipv4Addr>> + Send + '_>> {
            Box::pin(async { Err(Error::Http("discovery endpoint unreachable".into())) })
        }
    }

    fn manager(portal: Arc<FakePortal>, ip: Arc<FixedIp>) -> TokenManager {
        TokenManager::new(portal, ip, "autoCreate")
    }

    #[tokio::test]
    async fn acquires_by_creating_key_when_account_has_no_match() {
        let portal = FakePortal::empty();
        let ip = FixedIp::new("203.0.113.5");
        let mgr = manager(portal.clone(), ip.clone());

        let token = mgr.get_token().await.unwrap();
        assert_eq!(token, "token-1");
        assert_eq!(portal.list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(portal.create_calls.load(Ordering::SeqCst), 1);

        // The created key is scoped to the discovered address.
        let keys = portal.keys.lock().unwrap().clone();
        assert_eq!(keys[0].cidr_ranges[0].cidrs, vec!["203.0.113.5"]);

        // Bound state: a second call is silent and returns the same token.
        let again = mgr.get_token().await.unwrap();
        assert_eq!(again, token);
        assert_eq!(ip.calls.load(Ordering::SeqCst), 1);
        assert_eq!(portal.list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(portal.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn adopts_existing_key_covering_discovered_address() {
        let portal = FakePortal::with_keys(vec![
            test_key("other", "someone-elses", "198.51.100.1", "token-other"),
            test_key("mine", "oldRun", "203.0.113.5", "token-mine"),
        ]);
        let ip = FixedIp::new("203.0.113.5");
        let mgr = manager(portal.clone(), ip);

        let token = mgr.get_token().await.unwrap();
        assert_eq!(token, "token-mine");
        assert_eq!(mgr.bound_key_id().await.as_deref(), Some("mine"));
        // Adoption must not create anything.
        assert_eq!(portal.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ignores_keys_bound_to_other_addresses() {
        let portal = FakePortal::with_keys(vec![test_key(
            "stale",
            "autoCreate",
            "198.51.100.1",
            "token-stale",
        )]);
        let ip = FixedIp::new("203.0.113.5");
        let mgr = manager(portal.clone(), ip);

        let token = mgr.get_token().await.unwrap();
        // The name matches but the restriction doesn't cover us; the data
        // API would reject that key, so a new one is created.
        assert_ne!(token, "token-stale");
        assert_eq!(portal.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_revokes_bound_key_and_reacquires() {
        let portal = FakePortal::empty();
        let ip = FixedIp::new("203.0.113.5");
        let mgr = manager(portal.clone(), ip);

        let first = mgr.get_token().await.unwrap();
        let second = mgr.refresh().await.unwrap();

        assert_ne!(first, second);
        assert_eq!(portal.revoke_calls.load(Ordering::SeqCst), 1);
        assert_eq!(portal.create_calls.load(Ordering::SeqCst), 2);
        // The revoked key is gone from the account.
        assert_eq!(portal.keys.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn refresh_proceeds_when_revocation_fails() {
        let portal = Arc::new(FakePortal {
            fail_revoke: true,
            ..FakePortal::default()
        });
        let ip = FixedIp::new("203.0.113.5");
        let mgr = manager(portal.clone(), ip);

        mgr.get_token().await.unwrap();
        let token = mgr.refresh().await.unwrap();
        assert_eq!(token, "token-2");
        assert_eq!(portal.create_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refresh_from_empty_behaves_like_acquisition() {
        let portal = FakePortal::empty();
        let ip = FixedIp::new("203.0.113.5");
        let mgr = manager(portal.clone(), ip);

        let token = mgr.refresh().await.unwrap();
        assert_eq!(token, "token-1");
        assert_eq!(portal.revoke_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let portal = FakePortal::empty();
        let ip = FixedIp::new("203.0.113.5");
        let mgr = manager(portal.clone(), ip);

        mgr.get_token().await.unwrap();
        assert!(mgr.cleanup().await);
        assert!(mgr.bound_key_id().await.is_none());

        // Second call has nothing to do and still reports success.
        assert!(mgr.cleanup().await);
        assert_eq!(portal.revoke_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cleanup_on_empty_manager_is_a_noop_success() {
        let portal = FakePortal::empty();
        let ip = FixedIp::new("203.0.113.5");
        let mgr = manager(portal.clone(), ip);

        assert!(mgr.cleanup().await);
        assert_eq!(portal.revoke_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cleanup_reports_failed_revocation_and_keeps_binding() {
        let portal = Arc::new(FakePortal {
            fail_revoke: true,
            ..FakePortal::default()
        });
        let ip = FixedIp::new("203.0.113.5");
        let mgr = manager(portal.clone(), ip);

        mgr.get_token().await.unwrap();
        assert!(!mgr.cleanup().await);
        // Still bound, so a retry reaches the portal again.
        assert!(mgr.bound_key_id().await.is_some());
        assert!(!mgr.cleanup().await);
        assert_eq!(portal.revoke_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn ip_discovery_failure_is_fatal_and_names_the_step() {
        let portal = FakePortal::empty();
        let mgr = TokenManager::new(portal.clone(), Arc::new(FailingIp), "autoCreate");

        let err = mgr.get_token().await.unwrap_err();
        match err {
            Error::Acquisition { step, key_id, .. } => {
                assert_eq!(step, "ip-discovery");
                assert!(key_id.is_none());
            }
            other => panic!("expected acquisition error, got: {other}"),
        }
        assert_eq!(portal.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn list_failure_names_the_listing_step() {
        let portal = Arc::new(FakePortal {
            fail_list: Some(|| Error::Remote("portal maintenance".into())),
            ..FakePortal::default()
        });
        let ip = FixedIp::new("203.0.113.5");
        let mgr = manager(portal, ip);

        let err = mgr.get_token().await.unwrap_err();
        assert!(
            matches!(err, Error::Acquisition { step: "list-keys", .. }),
            "got: {err}"
        );
    }

    #[tokio::test]
    async fn login_failure_inside_listing_is_attributed_to_login() {
        let portal = Arc::new(FakePortal {
            fail_list: Some(|| Error::Authentication("bad credentials".into())),
            ..FakePortal::default()
        });
        let ip = FixedIp::new("203.0.113.5");
        let mgr = manager(portal, ip);

        let err = mgr.get_token().await.unwrap_err();
        assert!(
            matches!(err, Error::Acquisition { step: "login", .. }),
            "got: {err}"
        );
    }

    #[tokio::test]
    async fn create_failure_names_the_creation_step() {
        let portal = Arc::new(FakePortal {
            fail_create: true,
            ..FakePortal::default()
        });
        let ip = FixedIp::new("203.0.113.5");
        let mgr = manager(portal, ip);

        let err = mgr.get_token().await.unwrap_err();
        assert!(
            matches!(err, Error::Acquisition { step: "create-key", .. }),
            "got: {err}"
        );
    }

    #[tokio::test]
    async fn address_change_binds_a_key_for_the_new_address() {
        let portal = FakePortal::empty();
        let ip = FixedIp::new("203.0.113.5");
        let mgr = manager(portal.clone(), ip);

        mgr.get_token().await.unwrap();

        // Simulate the process's public address changing between refreshes.
        let moved = TokenManager {
            portal: mgr.portal.clone(),
            ip: FixedIp::new("198.51.100.9"),
            key_name: mgr.key_name.clone(),
            state: Mutex::new(mgr.state.lock().await.clone()),
        };

        let token = moved.refresh().await.unwrap();
        assert_eq!(token, "token-2");
        let keys = portal.keys.lock().unwrap().clone();
        assert!(keys.iter().any(|k| k.cidr_ranges[0].cidrs == vec!["198.51.100.9"]));
    }

    #[tokio::test]
    async fn concurrent_get_token_runs_one_acquisition() {
        let portal = FakePortal::empty();
        let ip = FixedIp::new("203.0.113.5");
        let mgr = Arc::new(manager(portal.clone(), ip));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let mgr = mgr.clone();
            handles.push(tokio::spawn(async move { mgr.get_token().await.unwrap() }));
        }

        let mut tokens = Vec::new();
        for handle in handles {
            tokens.push(handle.await.unwrap());
        }

        assert!(tokens.iter().all(|t| t == "token-1"));
        assert_eq!(portal.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(portal.list_calls.load(Ordering::SeqCst), 1);
    }
}
