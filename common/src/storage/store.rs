use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{path::Path as ObjPath, ObjectStore};

use crate::utils::config::{AppConfig, StorageKind};

pub type DynStore = Arc<dyn ObjectStore>;

/// Holds the raw uploaded bytes of every document, keyed by document id.
/// Extraction reads from here; a later transcript or re-extraction can too.
#[derive(Clone)]
pub struct StorageManager {
    store: DynStore,
    backend_kind: StorageKind,
}

impl StorageManager {
    pub async fn new(cfg: &AppConfig) -> object_store::Result<Self> {
        let backend_kind = cfg.storage.clone();
        let store: DynStore = match backend_kind {
            StorageKind::Local => {
                let base = PathBuf::from(&cfg.data_dir);
                if !base.exists() {
                    std::fs::create_dir_all(&base).map_err(|source| {
                        object_store::Error::Generic {
                            store: "LocalFileSystem",
                            source: Box::new(source),
                        }
                    })?;
                }
                Arc::new(LocalFileSystem::new_with_prefix(base)?)
            }
            StorageKind::Memory => Arc::new(InMemory::new()),
        };

        Ok(Self {
            store,
            backend_kind,
        })
    }

    /// Inject a specific backend, mainly for tests.
    pub fn with_backend(store: DynStore, backend_kind: StorageKind) -> Self {
        Self {
            store,
            backend_kind,
        }
    }

    pub fn backend_kind(&self) -> &StorageKind {
        &self.backend_kind
    }

    fn location_for(document_id: &str, file_name: &str) -> String {
        format!("uploads/{document_id}/{file_name}")
    }

    pub async fn put_upload(
        &self,
        document_id: &str,
        file_name: &str,
        data: Bytes,
    ) -> object_store::Result<()> {
        let path = ObjPath::from(Self::location_for(document_id, file_name));
        let payload = object_store::PutPayload::from_bytes(data);
        self.store.put(&path, payload).await.map(|_| ())
    }

    pub async fn get_upload(
        &self,
        document_id: &str,
        file_name: &str,
    ) -> object_store::Result<Bytes> {
        let path = ObjPath::from(Self::location_for(document_id, file_name));
        let result = self.store.get(&path).await?;
        result.bytes().await
    }

    /// Remove the stored upload. Missing objects are not an error; delete must
    /// be idempotent.
    pub async fn delete_upload(
        &self,
        document_id: &str,
        file_name: &str,
    ) -> object_store::Result<()> {
        let path = ObjPath::from(Self::location_for(document_id, file_name));
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_manager() -> StorageManager {
        StorageManager::with_backend(Arc::new(InMemory::new()), StorageKind::Memory)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let storage = memory_manager();
        storage
            .put_upload("doc-1", "notes.txt", Bytes::from_static(b"hello"))
            .await
            .expect("put");

        let bytes = storage.get_upload("doc-1", "notes.txt").await.expect("get");
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let storage = memory_manager();
        storage
            .put_upload("doc-1", "notes.txt", Bytes::from_static(b"hello"))
            .await
            .expect("put");

        storage.delete_upload("doc-1", "notes.txt").await.expect("first delete");
        storage.delete_upload("doc-1", "notes.txt").await.expect("second delete");

        assert!(storage.get_upload("doc-1", "notes.txt").await.is_err());
    }
}
