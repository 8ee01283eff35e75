//! Outbound port: the content-addressed object store `node-runtime` wires up
//! (in-memory for tests, a real backing store in production).

use async_trait::async_trait;
use shared_types::cid::Cid;
use shared_types::errors::PublishError;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::domain::content_address;

/// Contract: `put` is idempotent — storing the same bytes twice returns the
/// same [`Cid`] and is not an error (§4.2).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, bytes: Vec<u8>) -> Result<Cid, PublishError>;
    async fn get(&self, cid: &Cid) -> Result<Vec<u8>, PublishError>;
}

/// In-memory store, grounded on the teacher's key-value adapter pattern but
/// keyed by content hash rather than a caller-supplied key.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<Cid, Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<Cid, PublishError> {
        let cid = content_address(&bytes)?;
        self.objects.lock().await.entry(cid.clone()).or_insert(bytes);
        Ok(cid)
    }

    async fn get(&self, cid: &Cid) -> Result<Vec<u8>, PublishError> {
        self.objects
            .lock()
            .await
            .get(cid)
            .cloned()
            .ok_or_else(|| PublishError::GetFailed(format!("no object for cid {cid}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryObjectStore::new();
        let cid = store.put(b"hello".to_vec()).await.unwrap();
        let bytes = store.get(&cid).await.unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn put_is_idempotent() {
        let store = InMemoryObjectStore::new();
        let a = store.put(b"hello".to_vec()).await.unwrap();
        let b = store.put(b"hello".to_vec()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn get_missing_cid_fails() {
        let store = InMemoryObjectStore::new();
        let bogus = content_address(b"never stored").unwrap();
        assert!(store.get(&bogus).await.is_err());
    }
}
