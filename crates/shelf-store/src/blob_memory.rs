use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use shelf_types::CatalogKey;

use crate::blob::{BlobStore, ImageBlob};
use crate::error::StoreResult;

/// In-memory, HashMap-based blob store for tests and embedding.
///
/// Secondary lookups scan the map; the directory-backed store maintains
/// real indexes.
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<CatalogKey, ImageBlob>>,
}

impl MemoryBlobStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Newest first, canonical key as the tie-breaker for determinism.
fn sort_newest_first(blobs: &mut [ImageBlob]) {
    blobs.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| a.key().cmp(&b.key()))
    });
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, blob: ImageBlob) -> StoreResult<()> {
        let mut map = self.blobs.write().expect("blob lock poisoned");
        map.insert(blob.key(), blob);
        Ok(())
    }

    async fn get(&self, key: &CatalogKey) -> StoreResult<Option<ImageBlob>> {
        let map = self.blobs.read().expect("blob lock poisoned");
        Ok(map.get(key).cloned())
    }

    async fn exists(&self, key: &CatalogKey) -> StoreResult<bool> {
        let map = self.blobs.read().expect("blob lock poisoned");
        Ok(map.contains_key(key))
    }

    async fn delete(&self, key: &CatalogKey) -> StoreResult<bool> {
        let mut map = self.blobs.write().expect("blob lock poisoned");
        Ok(map.remove(key).is_some())
    }

    async fn delete_all(&self) -> StoreResult<()> {
        self.blobs.write().expect("blob lock poisoned").clear();
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<ImageBlob>> {
        let map = self.blobs.read().expect("blob lock poisoned");
        let mut all: Vec<ImageBlob> = map.values().cloned().collect();
        sort_newest_first(&mut all);
        Ok(all)
    }

    async fn find_by_code(&self, code: &str) -> StoreResult<Vec<ImageBlob>> {
        let map = self.blobs.read().expect("blob lock poisoned");
        let mut hits: Vec<ImageBlob> = map.values().filter(|b| b.code == code).cloned().collect();
        sort_newest_first(&mut hits);
        Ok(hits)
    }

    async fn find_by_supplier(&self, supplier: &str) -> StoreResult<Vec<ImageBlob>> {
        let map = self.blobs.read().expect("blob lock poisoned");
        let mut hits: Vec<ImageBlob> = map
            .values()
            .filter(|b| b.supplier == supplier)
            .cloned()
            .collect();
        sort_newest_first(&mut hits);
        Ok(hits)
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.blobs.read().expect("blob lock poisoned").len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(code: &str, supplier: &str, payload: &[u8]) -> ImageBlob {
        ImageBlob::new(&CatalogKey::new(code, supplier), "jpeg", payload.to_vec())
    }

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let store = MemoryBlobStore::new();
        let b = blob("A1", "S1", b"payload");
        store.put(b.clone()).await.unwrap();

        let got = store.get(&CatalogKey::new("A1", "S1")).await.unwrap();
        assert_eq!(got, Some(b));
    }

    #[tokio::test]
    async fn get_absent_returns_none() {
        let store = MemoryBlobStore::new();
        assert!(store
            .get(&CatalogKey::new("A1", "S1"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn put_is_upsert() {
        let store = MemoryBlobStore::new();
        store.put(blob("A1", "S1", b"old")).await.unwrap();
        store.put(blob("A1", "S1", b"new")).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let got = store
            .get(&CatalogKey::new("A1", "S1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.bytes, b"new");
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = MemoryBlobStore::new();
        store.put(blob("A1", "S1", b"x")).await.unwrap();
        assert!(store.delete(&CatalogKey::new("A1", "S1")).await.unwrap());
        assert!(!store.delete(&CatalogKey::new("A1", "S1")).await.unwrap());
    }

    #[tokio::test]
    async fn delete_all_empties_store() {
        let store = MemoryBlobStore::new();
        store.put(blob("A1", "S1", b"x")).await.unwrap();
        store.put(blob("A2", "S1", b"y")).await.unwrap();
        store.delete_all().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn find_by_code_spans_suppliers() {
        let store = MemoryBlobStore::new();
        store.put(blob("A1", "S1", b"x")).await.unwrap();
        store.put(blob("A1", "S2", b"y")).await.unwrap();
        store.put(blob("B2", "S1", b"z")).await.unwrap();

        let hits = store.find_by_code("A1").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|b| b.code == "A1"));
    }

    #[tokio::test]
    async fn find_by_supplier() {
        let store = MemoryBlobStore::new();
        store.put(blob("A1", "S1", b"x")).await.unwrap();
        store.put(blob("B2", "S2", b"y")).await.unwrap();

        let hits = store.find_by_supplier("S2").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].code, "B2");
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = MemoryBlobStore::new();
        let mut older = blob("A1", "S1", b"x");
        older.timestamp = older.timestamp - chrono::Duration::seconds(60);
        let newer = blob("B2", "S1", b"y");
        store.put(older).await.unwrap();
        store.put(newer).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all[0].code, "B2");
        assert_eq!(all[1].code, "A1");
    }
}
