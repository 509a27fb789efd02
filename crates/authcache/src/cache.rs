//! Bounded time-evicting caches over the auth provider.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use nodestore::{NodeStore, User};

use crate::error::{AuthError, Result};
use crate::provider::AuthProvider;

/// Configuration for the auth caches.
#[derive(Debug, Clone)]
pub struct AuthCacheConfig {
    /// Maximum number of cached token validations.
    pub token_cache_size: u64,
    /// How long a validated token stays cached.
    pub token_ttl: Duration,
    /// Maximum number of cached username checks.
    pub name_cache_size: u64,
    /// How long a validated username stays cached.
    pub name_ttl: Duration,
}

impl Default for AuthCacheConfig {
    fn default() -> Self {
        Self {
            token_cache_size: 1000,
            token_ttl: Duration::from_secs(300),
            name_cache_size: 1000,
            name_ttl: Duration::from_secs(300),
        }
    }
}

/// Validates bearer tokens and username lists, caching the results.
///
/// The token cache keys on the raw token value and holds the resolved
/// [`User`]; the username cache holds names known to be valid accounts.
/// Misses call the provider; token misses additionally materialize the user
/// through [`NodeStore::get_user`] so the account gets its internal ID. A
/// provider rejection evicts the token from the cache.
pub struct AuthCache {
    provider: Arc<dyn AuthProvider>,
    nodestore: Arc<dyn NodeStore>,
    tokens: Cache<String, User>,
    names: Cache<String, ()>,
}

impl AuthCache {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        nodestore: Arc<dyn NodeStore>,
        config: AuthCacheConfig,
    ) -> Self {
        Self {
            provider,
            nodestore,
            tokens: Cache::builder()
                .max_capacity(config.token_cache_size)
                .time_to_live(config.token_ttl)
                .build(),
            names: Cache::builder()
                .max_capacity(config.name_cache_size)
                .time_to_live(config.name_ttl)
                .build(),
        }
    }

    /// Resolve a token to a user, consulting the cache first.
    pub async fn get_user(&self, token: &str) -> Result<User> {
        if let Some(user) = self.tokens.get(token).await {
            return Ok(user);
        }

        tracing::debug!("token cache miss, validating with auth provider");
        let account_name = match self.provider.get_user(token).await {
            Ok(name) => name,
            Err(e) => {
                if matches!(e, AuthError::InvalidToken) {
                    self.tokens.invalidate(token).await;
                }
                return Err(e);
            }
        };

        let user = self.nodestore.get_user(&account_name).await?;
        self.tokens.insert(token.to_string(), user.clone()).await;
        // a successful token validation also proves the name valid
        self.names
            .insert(user.account_name().to_string(), ())
            .await;
        Ok(user)
    }

    /// Check that every account name in the list is a valid account,
    /// consulting the cache first. Fails with
    /// [`AuthError::InvalidUserName`] listing the names the provider does
    /// not recognize.
    pub async fn validate_user_names(&self, names: &[String], token: &str) -> Result<()> {
        let mut unknown = Vec::new();
        for name in names {
            if self.names.get(name).await.is_none() {
                unknown.push(name.clone());
            }
        }
        if unknown.is_empty() {
            return Ok(());
        }

        let invalid = match self.provider.validate_user_names(&unknown, token).await {
            Ok(invalid) => invalid,
            Err(e) => {
                if matches!(e, AuthError::InvalidToken) {
                    self.tokens.invalidate(token).await;
                }
                return Err(e);
            }
        };
        if !invalid.is_empty() {
            return Err(AuthError::InvalidUserName(invalid));
        }

        for name in unknown {
            self.names.insert(name, ()).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use nodestore::MemoryNodeStore;

    #[derive(Default)]
    struct MockProvider {
        tokens: Mutex<HashMap<String, String>>,
        accounts: Mutex<HashSet<String>>,
        token_calls: AtomicUsize,
        name_calls: AtomicUsize,
    }

    impl MockProvider {
        fn with_token(self, token: &str, account: &str) -> Self {
            self.tokens
                .lock()
                .unwrap()
                .insert(token.to_string(), account.to_string());
            self.accounts.lock().unwrap().insert(account.to_string());
            self
        }

        fn with_account(self, account: &str) -> Self {
            self.accounts.lock().unwrap().insert(account.to_string());
            self
        }

        fn revoke(&self, token: &str) {
            self.tokens.lock().unwrap().remove(token);
        }
    }

    #[async_trait]
    impl AuthProvider for MockProvider {
        async fn get_user(&self, token: &str) -> Result<String> {
            self.token_calls.fetch_add(1, Ordering::SeqCst);
            self.tokens
                .lock()
                .unwrap()
                .get(token)
                .cloned()
                .ok_or(AuthError::InvalidToken)
        }

        async fn validate_user_names(&self, names: &[String], token: &str) -> Result<Vec<String>> {
            self.name_calls.fetch_add(1, Ordering::SeqCst);
            if !self.tokens.lock().unwrap().contains_key(token) {
                return Err(AuthError::InvalidToken);
            }
            let accounts = self.accounts.lock().unwrap();
            Ok(names
                .iter()
                .filter(|n| !accounts.contains(*n))
                .cloned()
                .collect())
        }
    }

    fn cache_with(provider: MockProvider) -> (AuthCache, Arc<MockProvider>, Arc<MemoryNodeStore>) {
        let provider = Arc::new(provider);
        let nodestore = Arc::new(MemoryNodeStore::new());
        let cache = AuthCache::new(
            provider.clone(),
            nodestore.clone(),
            AuthCacheConfig::default(),
        );
        (cache, provider, nodestore)
    }

    #[tokio::test]
    async fn test_get_user_materializes_internal_id() {
        let (cache, _, nodestore) =
            cache_with(MockProvider::default().with_token("tok-alice", "alice"));

        let user = cache.get_user("tok-alice").await.unwrap();
        assert_eq!(user.account_name(), "alice");

        // same internal ID as a direct registry lookup
        let direct = nodestore.get_user("alice").await.unwrap();
        assert_eq!(user.id(), direct.id());
    }

    #[tokio::test]
    async fn test_get_user_is_cached() {
        let (cache, provider, _) =
            cache_with(MockProvider::default().with_token("tok-alice", "alice"));

        let first = cache.get_user("tok-alice").await.unwrap();
        let second = cache.get_user("tok-alice").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.token_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_user_rejects_unknown_token() {
        let (cache, _, _) = cache_with(MockProvider::default());
        let err = cache.get_user("nope").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn test_revoked_token_is_evicted() {
        let (cache, provider, _) =
            cache_with(MockProvider::default().with_token("tok-alice", "alice"));

        cache.get_user("tok-alice").await.unwrap();
        provider.revoke("tok-alice");

        // a fresh provider rejection on the same token evicts the cached entry
        let err = cache
            .validate_user_names(&["somebody".to_string()], "tok-alice")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));

        let err = cache.get_user("tok-alice").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn test_validate_user_names_caches_valid_names() {
        let (cache, provider, _) = cache_with(
            MockProvider::default()
                .with_token("tok", "alice")
                .with_account("bob"),
        );

        let names = vec!["bob".to_string()];
        cache.validate_user_names(&names, "tok").await.unwrap();
        cache.validate_user_names(&names, "tok").await.unwrap();
        assert_eq!(provider.name_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_validate_user_names_reports_invalid() {
        let (cache, _, _) = cache_with(
            MockProvider::default()
                .with_token("tok", "alice")
                .with_account("bob"),
        );

        let names = vec!["bob".to_string(), "ghost".to_string()];
        let err = cache.validate_user_names(&names, "tok").await.unwrap_err();
        match err {
            AuthError::InvalidUserName(invalid) => assert_eq!(invalid, vec!["ghost".to_string()]),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_token_validation_also_caches_name() {
        let (cache, provider, _) =
            cache_with(MockProvider::default().with_token("tok-alice", "alice"));

        cache.get_user("tok-alice").await.unwrap();
        cache
            .validate_user_names(&["alice".to_string()], "tok-alice")
            .await
            .unwrap();
        assert_eq!(provider.name_calls.load(Ordering::SeqCst), 0);
    }
}
