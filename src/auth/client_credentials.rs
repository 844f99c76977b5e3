use super::errors::ResolutionFailure;
use super::traits::CredentialValidator;
use crate::clients::{Client, SharedClientStore};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

// compared against on a store miss so both failure paths hash and compare once
const DUMMY_SECRET: &[u8] = b"keyturn-dummy-secret-for-missing-clients";

/// Resolves clients from the client store
pub struct ClientResolver {
    store: SharedClientStore,
}

impl ClientResolver {
    pub fn new(store: SharedClientStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CredentialValidator for ClientResolver {
    async fn validate(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Client, ResolutionFailure> {
        // don't bother the store with keys that can't exist
        let id = Uuid::parse_str(client_id).map_err(|_| ResolutionFailure::InvalidIdentifier)?;

        let record = self
            .store
            .find_by_id(id)
            .await
            .map_err(ResolutionFailure::Store)?;

        let Some(record) = record else {
            std::hint::black_box(secrets_match(DUMMY_SECRET, client_secret.as_bytes()));
            return Err(ResolutionFailure::ClientNotFound);
        };

        if secrets_match(record.secret.as_bytes(), client_secret.as_bytes()) {
            Ok(record.identity())
        } else {
            Err(ResolutionFailure::SecretMismatch)
        }
    }
}

/// Constant-time in both length and content: the inputs are reduced to fixed-size
/// digests before the comparison.
fn secrets_match(stored: &[u8], supplied: &[u8]) -> bool {
    let stored = Sha256::digest(stored);
    let supplied = Sha256::digest(supplied);
    stored.as_slice().ct_eq(supplied.as_slice()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{ClientRecord, ClientStore, MemoryClientStore, Supplemental};
    use anyhow::Result;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// store that only counts lookups
    #[derive(Default)]
    struct CountingStore {
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl ClientStore for CountingStore {
        async fn find_by_id(&self, _id: Uuid) -> Result<Option<ClientRecord>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
        async fn insert(&self, _record: ClientRecord) -> Result<()> {
            Ok(())
        }
        async fn update(&self, _record: ClientRecord) -> Result<bool> {
            Ok(false)
        }
        async fn delete(&self, _id: Uuid) -> Result<bool> {
            Ok(false)
        }
    }

    async fn seeded() -> (ClientResolver, ClientRecord) {
        let store = MemoryClientStore::new();
        let mut sup = Supplemental::new();
        sup.insert("region".into(), json!("eu"));
        let record =
            ClientRecord::generate("svc".into(), vec!["client:fetch".into()], sup).unwrap();
        store.insert(record.clone()).await.unwrap();
        (ClientResolver::new(Arc::new(store)), record)
    }

    #[tokio::test]
    async fn test_valid_credentials_resolve_client() {
        let (resolver, record) = seeded().await;
        let client = resolver
            .validate(&record.id.to_string(), &record.secret)
            .await
            .unwrap();
        assert_eq!(client.id, record.id);
        assert_eq!(client.name, "svc");
        assert_eq!(client.scopes, vec!["client:fetch"]);
        assert_eq!(client.supplemental["region"], "eu");
    }

    #[tokio::test]
    async fn test_wrong_secret() {
        let (resolver, record) = seeded().await;
        let err = resolver
            .validate(&record.id.to_string(), "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionFailure::SecretMismatch));
    }

    #[tokio::test]
    async fn test_secret_prefix_does_not_match() {
        let (resolver, record) = seeded().await;
        let err = resolver
            .validate(&record.id.to_string(), &record.secret[..32])
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionFailure::SecretMismatch));
    }

    #[tokio::test]
    async fn test_unknown_client() {
        let (resolver, record) = seeded().await;
        let err = resolver
            .validate(&Uuid::new_v4().to_string(), &record.secret)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionFailure::ClientNotFound));
    }

    #[tokio::test]
    async fn test_invalid_uuid_skips_lookup() {
        let store = Arc::new(CountingStore::default());
        let resolver = ClientResolver::new(store.clone());

        for bad in ["", "test", "72d1d680-92ee-463a-98a8", "not a uuid at all"] {
            let err = resolver.validate(bad, "secret").await.unwrap_err();
            assert!(matches!(err, ResolutionFailure::InvalidIdentifier));
        }
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);

        let _ = resolver.validate(&Uuid::new_v4().to_string(), "secret").await;
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match(b"abc", b"abc"));
        assert!(!secrets_match(b"abc", b"abd"));
        assert!(!secrets_match(b"abc", b"abcd"));
        assert!(!secrets_match(b"abc", b""));
    }
}
