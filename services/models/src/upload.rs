use crate::error::{ModelError, Result};
use crate::model_registry::{ModelRecord, ModelRegistry, ModelStatus, AVAILABLE_ANIMATIONS};
use crate::size::format_file_size;
use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Accepted model file extensions, compared case-insensitively
pub const SUPPORTED_FORMATS: [&str; 4] = [".glb", ".gltf", ".obj", ".fbx"];

/// Attempts at drawing an id not already present in the registry
const MAX_ID_ATTEMPTS: usize = 8;

/// Lower-cased extension (with the dot) when it is a supported model format
pub fn validate_extension(filename: &str) -> Result<String> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default();

    if SUPPORTED_FORMATS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(ModelError::UnsupportedFormat { extension })
    }
}

/// Short opaque model id: the first eight characters of a v4 UUID
pub fn generate_model_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Save an uploaded file and register it
///
/// Either the file is written and the record inserted, or the call fails
/// before the registry is touched and no file is left behind.
#[instrument(skip(registry, chunks))]
pub async fn upload<S, E>(
    registry: &ModelRegistry,
    filename: &str,
    chunks: S,
) -> Result<ModelRecord>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    upload_with_ids(registry, filename, chunks, generate_model_id).await
}

/// [`upload`] drawing candidate ids from `next_id`
pub async fn upload_with_ids<S, E, F>(
    registry: &ModelRegistry,
    filename: &str,
    chunks: S,
    next_id: F,
) -> Result<ModelRecord>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
    F: FnMut() -> String,
{
    let extension = match validate_extension(filename) {
        Ok(ext) => ext,
        Err(e) => {
            metrics::counter!("models.uploads.rejected").increment(1);
            return Err(e);
        }
    };

    let storage = registry.storage();
    let (model_id, file_path, file) = claim_model_file(registry, &extension, next_id)
        .await
        .inspect_err(|_| metrics::counter!("models.uploads.failed").increment(1))?;

    let size = storage
        .write_stream(file, &file_path, chunks)
        .await
        .map_err(|e| {
            error!(error = %e, model_id = %model_id, "Failed to save model file");
            metrics::counter!("models.uploads.failed").increment(1);
            ModelError::StorageWrite(e)
        })?;

    let record = ModelRecord {
        id: model_id.clone(),
        filename: filename.to_string(),
        format: extension.trim_start_matches('.').to_uppercase(),
        size,
        size_formatted: format_file_size(size),
        uploaded_at: Utc::now(),
        file_path: file_path.clone(),
        available_animations: AVAILABLE_ANIMATIONS.iter().map(|s| s.to_string()).collect(),
        status: ModelStatus::Ready,
    };

    if let Err(e) = registry.insert(record.clone()) {
        // Same id registered under another extension meanwhile; only our own file goes
        if let Err(cleanup) = storage.remove(&file_path).await {
            warn!(error = %cleanup, "Failed to remove orphaned model file");
        }
        metrics::counter!("models.uploads.failed").increment(1);
        return Err(e);
    }

    metrics::counter!("models.uploads.accepted").increment(1);
    metrics::counter!("models.bytes.stored").increment(size);
    info!(
        model_id = %record.id,
        format = %record.format,
        size_bytes = size,
        "Model uploaded"
    );

    Ok(record)
}

/// Draw an id that is neither registered nor backed by an existing file, and
/// create its file exclusively
async fn claim_model_file<F>(
    registry: &ModelRegistry,
    extension: &str,
    mut next_id: F,
) -> Result<(String, PathBuf, File)>
where
    F: FnMut() -> String,
{
    let storage = registry.storage();
    let mut candidate = String::new();

    for _ in 0..MAX_ID_ATTEMPTS {
        candidate = next_id();
        if registry.contains(&candidate) {
            warn!(model_id = %candidate, "Generated model id already registered, retrying");
            continue;
        }

        let path = storage.path_for(&candidate, extension);
        match storage.create_new(&path).await {
            Ok(file) => return Ok((candidate, path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                warn!(model_id = %candidate, "Model file already exists, retrying");
            }
            Err(e) => {
                error!(error = %e, model_id = %candidate, "Failed to create model file");
                return Err(ModelError::StorageWrite(e));
            }
        }
    }

    Err(ModelError::DuplicateId(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_storage::ModelStorage;
    use futures::stream;
    use tokio_test::{assert_err, assert_ok};

    fn body(bytes: &'static [u8]) -> impl Stream<Item = io::Result<Bytes>> + Send {
        stream::iter(vec![Ok(Bytes::from_static(bytes))])
    }

    fn ids(list: &'static [&'static str]) -> impl FnMut() -> String {
        let mut ids = list.iter().cycle();
        move || ids.next().unwrap().to_string()
    }

    fn setup() -> (tempfile::TempDir, ModelRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::new(ModelStorage::at(dir.path()));
        (dir, registry)
    }

    #[test]
    fn test_validate_extension() {
        assert_eq!(assert_ok!(validate_extension("robot.glb")), ".glb");
        assert_eq!(assert_ok!(validate_extension("Scene.GLTF")), ".gltf");
        assert_eq!(assert_ok!(validate_extension("mesh.v2.Obj")), ".obj");
        assert_eq!(assert_ok!(validate_extension("rig.fbx")), ".fbx");

        for name in ["model.txt", "model", ".glb", "archive.glb.zip", ""] {
            let err = assert_err!(validate_extension(name), "{name} should be rejected");
            assert!(matches!(err, ModelError::UnsupportedFormat { .. }));
        }
    }

    #[test]
    fn test_generate_model_id() {
        let id = generate_model_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_model_id(), generate_model_id());
    }

    #[tokio::test]
    async fn test_upload_every_supported_format() {
        let (_dir, registry) = setup();

        for (name, format) in [
            ("a.glb", "GLB"),
            ("b.GLTF", "GLTF"),
            ("c.Obj", "OBJ"),
            ("d.fbx", "FBX"),
        ] {
            let record = upload(&registry, name, body(b"0123456789")).await.unwrap();
            assert_eq!(record.format, format);
            assert_eq!(record.filename, name);
            assert_eq!(record.status, ModelStatus::Ready);
        }

        assert_eq!(registry.len(), 4);
    }

    #[tokio::test]
    async fn test_upload_writes_file_and_registers() {
        let (_dir, registry) = setup();

        let record = upload(&registry, "robot.glb", body(b"glTF-binary"))
            .await
            .unwrap();

        let stored = registry.get(&record.id).unwrap();
        assert_eq!(stored, record);
        assert!(stored.file_path.exists());
        assert_eq!(stored.size, 11);
        assert_eq!(stored.size_formatted, "11.0 B");
        assert_eq!(
            stored.file_path,
            registry.storage().path_for(&record.id, ".glb")
        );
        assert_eq!(stored.available_animations.len(), 15);
    }

    #[tokio::test]
    async fn test_upload_rejects_unsupported_format() {
        let (dir, registry) = setup();

        let err = upload(&registry, "model.txt", body(b"hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, ModelError::UnsupportedFormat { .. }));
        assert!(registry.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_registers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the storage directory should be
        let not_a_dir = dir.path().join("uploads");
        std::fs::write(&not_a_dir, b"").unwrap();
        let registry = ModelRegistry::new(ModelStorage::at(&not_a_dir));

        let err = upload(&registry, "robot.glb", body(b"bytes"))
            .await
            .unwrap_err();

        assert!(matches!(err, ModelError::StorageWrite(_)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_body_leaves_no_partial_file() {
        let (dir, registry) = setup();
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "body truncated")),
        ]);

        let err = upload(&registry, "robot.fbx", chunks).await.unwrap_err();

        assert!(matches!(err, ModelError::StorageWrite(_)));
        assert!(registry.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_registered_id_is_redrawn() {
        let (_dir, registry) = setup();
        let first = upload_with_ids(
            &registry,
            "a.glb",
            body(b"first"),
            ids(&["0000aaaa"]),
        )
            .await
            .unwrap();

        let second = upload_with_ids(
            &registry,
            "b.glb",
            body(b"second"),
            ids(&["0000aaaa", "0000bbbb"]),
        )
        .await
        .unwrap();

        assert_eq!(first.id, "0000aaaa");
        assert_eq!(second.id, "0000bbbb");
        assert_eq!(std::fs::read(&first.file_path).unwrap(), b"first");
        assert_eq!(std::fs::read(&second.file_path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_exhausted_ids_fail_with_duplicate_id() {
        let (dir, registry) = setup();
        let first = upload_with_ids(
            &registry,
            "a.glb",
            body(b"first"),
            ids(&["0000aaaa"]),
        )
        .await;
        assert_ok!(first);

        let second = upload_with_ids(
            &registry,
            "b.obj",
            body(b"second"),
            ids(&["0000aaaa"]),
        )
        .await;
        let err = assert_err!(second);

        assert!(matches!(err, ModelError::DuplicateId(ref id) if id == "0000aaaa"));
        assert_eq!(registry.len(), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_existing_file_is_never_overwritten() {
        let (_dir, registry) = setup();
        // Another upload is still writing this id and has not registered it yet
        let busy = registry.storage().path_for("0000aaaa", ".glb");
        std::fs::write(&busy, b"in flight").unwrap();

        let record = upload_with_ids(
            &registry,
            "robot.glb",
            body(b"mine"),
            ids(&["0000aaaa", "0000bbbb"]),
        )
        .await
        .unwrap();

        assert_eq!(record.id, "0000bbbb");
        assert_eq!(std::fs::read(&busy).unwrap(), b"in flight");
        assert_eq!(std::fs::read(&record.file_path).unwrap(), b"mine");
    }

    #[tokio::test]
    async fn test_lost_insert_keeps_registered_file() {
        let (_dir, registry) = setup();
        let storage = registry.storage();

        let rival_path = storage.path_for("cafef00d", ".glb");
        std::fs::write(&rival_path, b"registered bytes").unwrap();
        let rival = ModelRecord {
            id: "cafef00d".to_string(),
            filename: "rival.glb".to_string(),
            format: "GLB".to_string(),
            size: 16,
            size_formatted: format_file_size(16),
            uploaded_at: Utc::now(),
            file_path: rival_path.clone(),
            available_animations: AVAILABLE_ANIMATIONS.iter().map(|s| s.to_string()).collect(),
            status: ModelStatus::Ready,
        };

        // The rival registers the same id while this upload is still streaming
        let shared = &registry;
        let chunks = stream::once(async move {
            shared.insert(rival).unwrap();
            Ok::<_, io::Error>(Bytes::from_static(b"late bytes"))
        });

        let err = upload_with_ids(&registry, "robot.obj", chunks, ids(&["cafef00d"]))
            .await
            .unwrap_err();

        assert!(matches!(err, ModelError::DuplicateId(_)));
        assert_eq!(registry.len(), 1);
        let kept = registry.get("cafef00d").unwrap();
        assert_eq!(kept.file_path, rival_path);
        assert_eq!(std::fs::read(&kept.file_path).unwrap(), b"registered bytes");
        assert!(!storage.path_for("cafef00d", ".obj").exists());
    }
}
