use crate::error::{ModelError, Result};
use crate::model_storage::ModelStorage;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tracing::{debug, info, instrument, warn};

/// Animation names offered on every uploaded model
pub const AVAILABLE_ANIMATIONS: [&str; 15] = [
    "rotate", "spin", "bounce", "float", "pulse", "wave", "shake", "swing", "jump", "dance",
    "wobble", "roll", "flip", "breathe", "walk",
];

/// Lifecycle state of a registered model
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Ready,
}

/// Metadata for one uploaded model file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelRecord {
    /// Short opaque identifier, unique within the registry
    pub id: String,
    /// Client-supplied file name
    pub filename: String,
    /// Upper-cased extension without the dot
    pub format: String,
    /// Size in bytes
    pub size: u64,
    /// Human readable size
    pub size_formatted: String,
    /// When the model was registered
    pub uploaded_at: DateTime<Utc>,
    /// Location of the bytes in the storage directory
    pub file_path: PathBuf,
    pub available_animations: Vec<String>,
    pub status: ModelStatus,
}

/// A stored model opened for download
#[derive(Debug)]
pub struct ModelDownload {
    /// Name suggested to the client
    pub filename: String,
    pub size: u64,
    pub file: File,
}

struct Entry {
    seq: u64,
    record: ModelRecord,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

/// In-memory registry of uploaded models, the source of truth for what exists
///
/// The map is guarded by a single lock that is never held across an await;
/// filesystem work for delete and download happens outside it.
pub struct ModelRegistry {
    inner: RwLock<Inner>,
    storage: ModelStorage,
}

impl ModelRegistry {
    pub fn new(storage: ModelStorage) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            storage,
        }
    }

    pub fn storage(&self) -> &ModelStorage {
        &self.storage
    }

    /// All records in insertion order
    pub fn list(&self) -> Vec<ModelRecord> {
        let inner = self.inner.read();
        let mut entries: Vec<&Entry> = inner.entries.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.record.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.inner.read().entries.contains_key(model_id)
    }

    pub fn get(&self, model_id: &str) -> Result<ModelRecord> {
        self.inner
            .read()
            .entries
            .get(model_id)
            .map(|e| e.record.clone())
            .ok_or_else(|| ModelError::NotFound(model_id.to_string()))
    }

    /// Register a record; an existing id is never overwritten
    pub fn insert(&self, record: ModelRecord) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.entries.contains_key(&record.id) {
            return Err(ModelError::DuplicateId(record.id));
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(record.id.clone(), Entry { seq, record });

        metrics::gauge!("models.registered").set(inner.entries.len() as f64);
        Ok(())
    }

    /// Remove a model's backing file (if still present) and its entry
    #[instrument(skip(self))]
    pub async fn delete(&self, model_id: &str) -> Result<()> {
        let record = self.get(model_id)?;

        match self.storage.remove(&record.file_path).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(file_path = %record.file_path.display(), "Backing file already gone");
            }
            Err(e) => {
                warn!(
                    error = %e,
                    file_path = %record.file_path.display(),
                    "Failed to remove backing file"
                );
            }
        }

        {
            let mut inner = self.inner.write();
            if inner.entries.remove(model_id).is_none() {
                return Err(ModelError::NotFound(model_id.to_string()));
            }
            metrics::gauge!("models.registered").set(inner.entries.len() as f64);
        }

        metrics::counter!("models.deleted").increment(1);
        info!(model_id = %model_id, "Model deleted");

        Ok(())
    }

    /// Open a model's bytes along with the original file name
    #[instrument(skip(self))]
    pub async fn download(&self, model_id: &str) -> Result<ModelDownload> {
        let record = self.get(model_id)?;

        if !self.storage.exists(&record.file_path).await {
            return Err(ModelError::FileMissing(model_id.to_string()));
        }

        // The file can vanish between the check and the open under a racing delete
        let file = open_existing(&self.storage, &record.file_path, model_id).await?;
        let size = file
            .metadata()
            .await
            .map(|m| m.len())
            .unwrap_or(record.size);

        Ok(ModelDownload {
            filename: record.filename,
            size,
            file,
        })
    }
}

async fn open_existing(storage: &ModelStorage, path: &Path, model_id: &str) -> Result<File> {
    storage.open(path).await.map_err(|e| {
        warn!(error = %e, file_path = %path.display(), "Failed to open model file");
        ModelError::FileMissing(model_id.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::size::format_file_size;
    use tokio::io::AsyncReadExt;

    fn create_test_record(storage: &ModelStorage, id: &str, bytes: &[u8]) -> ModelRecord {
        let file_path = storage.path_for(id, ".glb");
        std::fs::write(&file_path, bytes).unwrap();

        ModelRecord {
            id: id.to_string(),
            filename: format!("{}.glb", id),
            format: "GLB".to_string(),
            size: bytes.len() as u64,
            size_formatted: format_file_size(bytes.len() as u64),
            uploaded_at: Utc::now(),
            file_path,
            available_animations: AVAILABLE_ANIMATIONS.iter().map(|s| s.to_string()).collect(),
            status: ModelStatus::Ready,
        }
    }

    fn setup() -> (tempfile::TempDir, ModelRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::new(ModelStorage::at(dir.path()));
        (dir, registry)
    }

    #[test]
    fn test_list_keeps_insertion_order() {
        let (_dir, registry) = setup();
        for id in ["cccc", "aaaa", "bbbb"] {
            let record = create_test_record(registry.storage(), id, b"x");
            registry.insert(record).unwrap();
        }

        let ids: Vec<String> = registry.list().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["cccc", "aaaa", "bbbb"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_insert_rejects_duplicate_id() {
        let (_dir, registry) = setup();
        let record = create_test_record(registry.storage(), "dup00001", b"first");
        registry.insert(record.clone()).unwrap();

        let mut second = record;
        second.filename = "other.glb".to_string();
        assert!(matches!(
            registry.insert(second),
            Err(ModelError::DuplicateId(id)) if id == "dup00001"
        ));
        assert_eq!(registry.get("dup00001").unwrap().filename, "dup00001.glb");
    }

    #[test]
    fn test_get_missing() {
        let (_dir, registry) = setup();
        assert!(registry.is_empty());
        assert!(matches!(registry.get("nope"), Err(ModelError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_entry_and_file() {
        let (_dir, registry) = setup();
        let record = create_test_record(registry.storage(), "del00001", b"bytes");
        let path = record.file_path.clone();
        registry.insert(record).unwrap();

        registry.delete("del00001").await.unwrap();

        assert!(!path.exists());
        assert!(matches!(registry.get("del00001"), Err(ModelError::NotFound(_))));
        assert!(matches!(
            registry.delete("del00001").await,
            Err(ModelError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_file() {
        let (_dir, registry) = setup();
        let record = create_test_record(registry.storage(), "gone0001", b"bytes");
        std::fs::remove_file(&record.file_path).unwrap();
        registry.insert(record).unwrap();

        registry.delete("gone0001").await.unwrap();
        assert!(!registry.contains("gone0001"));
    }

    #[tokio::test]
    async fn test_download_returns_bytes_and_filename() {
        let (_dir, registry) = setup();
        let record = create_test_record(registry.storage(), "dl000001", b"model-bytes");
        registry.insert(record).unwrap();

        let mut download = registry.download("dl000001").await.unwrap();
        let mut contents = Vec::new();
        download.file.read_to_end(&mut contents).await.unwrap();

        assert_eq!(download.filename, "dl000001.glb");
        assert_eq!(download.size, 11);
        assert_eq!(contents, b"model-bytes");
    }

    #[tokio::test]
    async fn test_download_reports_missing_file() {
        let (_dir, registry) = setup();
        let record = create_test_record(registry.storage(), "miss0001", b"bytes");
        std::fs::remove_file(&record.file_path).unwrap();
        registry.insert(record).unwrap();

        assert!(matches!(
            registry.download("miss0001").await,
            Err(ModelError::FileMissing(id)) if id == "miss0001"
        ));
        assert!(matches!(
            registry.download("unknown").await,
            Err(ModelError::NotFound(_))
        ));
    }
}
