// src/session/mod.rs
//! Session store: the one bearer token gated requests depend on.
//!
//! Empty at process start. Set by a successful login, cleared by logout or
//! when a gated upstream answers 401/403. Consumers never read the token
//! directly; they go through [`Session::attach`] or [`Session::current_token`].

pub mod auth;
pub mod persist;

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use metrics::counter;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::providers::UpstreamRequest;

use self::auth::{AuthBackend, RegisterError, Registration};
use self::persist::TokenStore;

pub const AUTH_HEADER: &str = "Authorization";

pub struct Session {
    token: RwLock<Option<String>>,
    backend: Arc<dyn AuthBackend>,
    store: Option<Arc<dyn TokenStore>>,
}

impl Session {
    pub fn new(backend: Arc<dyn AuthBackend>) -> Self {
        Self {
            token: RwLock::new(None),
            backend,
            store: None,
        }
    }

    /// Persists login/logout through `store` from now on.
    pub fn with_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Like `new(..).with_store(store)`, then loads a previously persisted
    /// token. A broken store is logged and ignored.
    pub fn restore(backend: Arc<dyn AuthBackend>, store: Arc<dyn TokenStore>) -> Self {
        let token = match store.load() {
            Ok(t) => t,
            Err(e) => {
                warn!(target: "session", error = ?e, "could not load persisted token");
                None
            }
        };
        if let Some(t) = &token {
            info!(target: "session", fp = %fingerprint(t), "restored persisted session");
        }
        Self {
            token: RwLock::new(token),
            backend,
            store: Some(store),
        }
    }

    /// On failure the previous token (if any) is left untouched.
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<(), FetchError> {
        if identifier.trim().is_empty() || secret.is_empty() {
            return Err(FetchError::Unauthenticated);
        }

        let token = match self.backend.login(identifier.trim(), secret).await {
            Ok(t) => t,
            Err(e) => {
                warn!(target: "session", error = %e, "login failed");
                counter!("session_login_failures_total").increment(1);
                return Err(FetchError::Unauthenticated);
            }
        };

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&token) {
                warn!(target: "session", error = ?e, "could not persist token");
            }
        }
        info!(target: "session", fp = %fingerprint(&token), "logged in");
        *self.write() = Some(token);
        Ok(())
    }

    /// Clears the token unconditionally. Idempotent.
    pub fn logout(&self) {
        let had = self.write().take().is_some();
        self.clear_store();
        if had {
            info!(target: "session", "logged out");
        }
    }

    /// Implicit logout after an upstream refused `rejected`. Only clears the
    /// session while `rejected` is still the current token; a newer login
    /// survives a late rejection of the one it replaced. Returns whether the
    /// session was cleared.
    pub fn expire(&self, status: u16, rejected: &str) -> bool {
        let cleared = {
            let mut token = self.write();
            if token.as_deref() == Some(rejected) {
                *token = None;
                true
            } else {
                false
            }
        };
        if !cleared {
            debug!(target: "session", status, fp = %fingerprint(rejected), "stale token rejected; session kept");
            return false;
        }
        warn!(target: "session", status, fp = %fingerprint(rejected), "upstream rejected token; clearing session");
        counter!("session_expired_total").increment(1);
        self.clear_store();
        true
    }

    pub fn current_token(&self) -> Option<String> {
        self.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    /// Returns `request` with `Authorization: <token>` when a token is held.
    /// Without a token, gated requests fail and ungated ones pass unchanged.
    pub fn attach(
        &self,
        request: UpstreamRequest,
        gated: bool,
    ) -> Result<UpstreamRequest, FetchError> {
        match self.current_token() {
            Some(token) => Ok(request.with_header(AUTH_HEADER, token)),
            None if gated => Err(FetchError::Unauthenticated),
            None => Ok(request),
        }
    }

    pub async fn register(&self, registration: &Registration) -> Result<String, RegisterError> {
        registration.validate()?;
        self.backend.register(registration).await
    }

    fn clear_store(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                warn!(target: "session", error = ?e, "could not clear persisted token");
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<String>> {
        self.token.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<String>> {
        self.token.write().unwrap_or_else(|p| p.into_inner())
    }
}

/// Short, non-reversible token id for logs. Raw tokens are never logged.
pub(crate) fn fingerprint(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(token.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::persist::MemoryTokenStore;
    use super::*;
    use async_trait::async_trait;

    struct FixedBackend {
        token: Option<&'static str>,
    }

    #[async_trait]
    impl AuthBackend for FixedBackend {
        async fn login(&self, _identifier: &str, _secret: &str) -> anyhow::Result<String> {
            self.token
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("bad credentials"))
        }

        async fn register(&self, _r: &Registration) -> Result<String, RegisterError> {
            Ok("ok".into())
        }
    }

    fn session(token: Option<&'static str>) -> Session {
        Session::new(Arc::new(FixedBackend { token }))
    }

    #[tokio::test]
    async fn login_sets_and_logout_clears() {
        let s = session(Some("t-1"));
        assert_eq!(s.current_token(), None);
        s.login("alice", "pw").await.unwrap();
        assert_eq!(s.current_token().as_deref(), Some("t-1"));
        s.logout();
        s.logout();
        assert_eq!(s.current_token(), None);
    }

    #[tokio::test]
    async fn failed_login_keeps_previous_token() {
        let s = session(None);
        *s.write() = Some("old".into());
        assert_eq!(s.login("alice", "pw").await, Err(FetchError::Unauthenticated));
        assert_eq!(s.current_token().as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn blank_credentials_are_rejected_locally() {
        let s = session(Some("t"));
        assert_eq!(s.login("  ", "pw").await, Err(FetchError::Unauthenticated));
        assert_eq!(s.login("alice", "").await, Err(FetchError::Unauthenticated));
        assert!(!s.is_authenticated());
    }

    #[test]
    fn attach_respects_gating() {
        let s = session(None);
        let req = UpstreamRequest::get("http://x/traffic/stats");
        assert_eq!(s.attach(req.clone(), true), Err(FetchError::Unauthenticated));
        assert_eq!(s.attach(req.clone(), false), Ok(req.clone()));

        *s.write() = Some("tok".into());
        let attached = s.attach(req, true).unwrap();
        assert_eq!(attached.header(AUTH_HEADER), Some("tok"));
    }

    #[tokio::test]
    async fn persisted_token_survives_restore_and_logout_clears_it() {
        let store: Arc<MemoryTokenStore> = Arc::new(MemoryTokenStore::default());
        let backend = Arc::new(FixedBackend { token: Some("p-1") });

        let s = Session::new(backend.clone()).with_store(store.clone());
        s.login("alice", "pw").await.unwrap();

        let restored = Session::restore(backend.clone(), store.clone());
        assert_eq!(restored.current_token().as_deref(), Some("p-1"));

        restored.logout();
        assert_eq!(store.load().unwrap(), None);
        assert_eq!(Session::restore(backend, store).current_token(), None);
    }

    #[tokio::test]
    async fn expire_clears_only_the_rejected_token() {
        let store: Arc<MemoryTokenStore> = Arc::new(MemoryTokenStore::default());
        let s = session(Some("t-2")).with_store(store.clone());
        s.login("alice", "pw").await.unwrap();

        assert!(!s.expire(401, "t-1"), "stale token must not clear a newer one");
        assert_eq!(s.current_token().as_deref(), Some("t-2"));
        assert_eq!(store.load().unwrap().as_deref(), Some("t-2"));

        assert!(s.expire(401, "t-2"));
        assert_eq!(s.current_token(), None);
        assert_eq!(store.load().unwrap(), None);
        assert!(!s.expire(403, "t-2"));
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        assert_eq!(fingerprint("abc"), fingerprint("abc"));
        assert_ne!(fingerprint("abc"), fingerprint("abd"));
        assert_eq!(fingerprint("abc").len(), 12);
    }
}
