use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::types::{Identity, LookupError, TokenClaims};

/// Resolves the full identity record for a verified token subject.
///
/// Returning `Ok(None)` means the subject no longer exists; `Err` means the
/// backend could not answer.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, claims: &TokenClaims) -> Result<Option<Identity>, LookupError>;
}

/// Trusts the verified claims as the identity record.
/// Used by the standalone binary where no host user store is reachable.
pub struct ClaimsIdentityResolver;

#[async_trait]
impl IdentityResolver for ClaimsIdentityResolver {
    async fn resolve(&self, claims: &TokenClaims) -> Result<Option<Identity>, LookupError> {
        Ok(Some(Identity {
            id: claims.id.clone(),
            email: claims.email.clone(),
            collection: claims.collection.clone(),
            role: None,
        }))
    }
}

/// In-memory identity store keyed by (collection, id)
#[derive(Clone, Default)]
pub struct InMemoryIdentityStore {
    identities: Arc<RwLock<HashMap<(String, String), Identity>>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, identity: Identity) {
        let key = (identity.collection.clone(), identity.id.clone());
        self.identities.write().await.insert(key, identity);
    }

    pub async fn remove(&self, collection: &str, id: &str) -> bool {
        self.identities
            .write()
            .await
            .remove(&(collection.to_string(), id.to_string()))
            .is_some()
    }
}

#[async_trait]
impl IdentityResolver for InMemoryIdentityStore {
    async fn resolve(&self, claims: &TokenClaims) -> Result<Option<Identity>, LookupError> {
        let identities = self.identities.read().await;
        let result = identities
            .get(&(claims.collection.clone(), claims.id.clone()))
            .cloned();

        debug!(
            subject = %claims.id,
            collection = %claims.collection,
            found = result.is_some(),
            "Identity lookup"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(id: &str, collection: &str) -> TokenClaims {
        TokenClaims {
            id: id.to_string(),
            collection: collection.to_string(),
            email: Some("u@example.com".to_string()),
            exp: 0,
            iat: 0,
        }
    }

    #[tokio::test]
    async fn test_store_resolves_by_collection_and_id() {
        let store = InMemoryIdentityStore::new();
        store
            .insert(Identity::new("7", "users").with_role("admin"))
            .await;

        let found = store.resolve(&claims("7", "users")).await.unwrap();
        assert_eq!(found.and_then(|i| i.role), Some("admin".to_string()));

        // Same id in a different collection is a different subject
        assert_eq!(store.resolve(&claims("7", "admins")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_remove() {
        let store = InMemoryIdentityStore::new();
        store.insert(Identity::new("7", "users")).await;

        assert!(store.remove("users", "7").await);
        assert!(!store.remove("users", "7").await);
        assert_eq!(store.resolve(&claims("7", "users")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_claims_resolver_copies_claims() {
        let identity = ClaimsIdentityResolver
            .resolve(&claims("9", "users"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(identity.id, "9");
        assert_eq!(identity.collection, "users");
        assert_eq!(identity.email.as_deref(), Some("u@example.com"));
    }
}
