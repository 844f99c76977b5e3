use super::model::ClientRecord;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Persistence collaborator for client records. The auth core only ever calls
/// `find_by_id`; the rest is for the CRUD handlers.
#[async_trait]
pub trait ClientStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ClientRecord>>;

    /// Fails if a record with the same id already exists
    async fn insert(&self, record: ClientRecord) -> Result<()>;

    /// Returns false if there was nothing to update
    async fn update(&self, record: ClientRecord) -> Result<bool>;

    /// Returns false if there was nothing to delete
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Insert or overwrite, used at startup for the bootstrap client
    async fn upsert(&self, record: ClientRecord) -> Result<()> {
        if !self.update(record.clone()).await? {
            self.insert(record).await?;
        }
        Ok(())
    }
}

pub type SharedClientStore = Arc<dyn ClientStore + Send + Sync>;

/// in-memory store, doesn't persist across restarts
#[derive(Clone, Default)]
pub struct MemoryClientStore {
    clients: Arc<RwLock<HashMap<Uuid, ClientRecord>>>,
}

impl MemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStore for MemoryClientStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ClientRecord>> {
        Ok(self.clients.read().await.get(&id).cloned())
    }

    async fn insert(&self, record: ClientRecord) -> Result<()> {
        let mut clients = self.clients.write().await;
        if clients.contains_key(&record.id) {
            return Err(anyhow!("Client already exists: {}", record.id));
        }
        clients.insert(record.id, record);
        Ok(())
    }

    async fn update(&self, record: ClientRecord) -> Result<bool> {
        let mut clients = self.clients.write().await;
        match clients.get_mut(&record.id) {
            Some(existing) => {
                *existing = record;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.clients.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::model::Supplemental;

    fn record(name: &str) -> ClientRecord {
        ClientRecord::generate(name.into(), vec![], Supplemental::new()).unwrap()
    }

    #[tokio::test]
    async fn test_insert_then_find() {
        let store = MemoryClientStore::new();
        let rec = record("one");
        store.insert(rec.clone()).await.unwrap();
        assert_eq!(store.find_by_id(rec.id).await.unwrap(), Some(rec));
    }

    #[tokio::test]
    async fn test_duplicate_insert_fails() {
        let store = MemoryClientStore::new();
        let rec = record("one");
        store.insert(rec.clone()).await.unwrap();
        assert!(store.insert(rec).await.is_err());
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() {
        let store = MemoryClientStore::new();
        let rec = record("ghost");
        assert!(!store.update(rec.clone()).await.unwrap());
        assert!(!store.delete(rec.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = MemoryClientStore::new();
        let mut rec = record("first");
        store.upsert(rec.clone()).await.unwrap();
        rec.name = "second".into();
        store.upsert(rec.clone()).await.unwrap();
        let found = store.find_by_id(rec.id).await.unwrap().unwrap();
        assert_eq!(found.name, "second");
    }

    #[tokio::test]
    async fn test_delete_removes() {
        let store = MemoryClientStore::new();
        let rec = record("doomed");
        store.insert(rec.clone()).await.unwrap();
        assert!(store.delete(rec.id).await.unwrap());
        assert!(store.find_by_id(rec.id).await.unwrap().is_none());
    }
}
