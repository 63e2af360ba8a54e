//! Content-addressed storage for uploaded media.
//!
//! Bytes live as flat files named by a freshly minted opaque id, with no
//! extension. The store never renames, inspects, or transcodes payloads;
//! mime types travel out-of-band (upload metadata or the stream endpoint's
//! query override).

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::MediaConfig;
use crate::protocol::VideoDescriptor;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("upload exceeds the maximum size of {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("no stored media under that key")]
    NotFound,
    #[error("invalid storage key")]
    InvalidKey,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One stored object, as reported by the admin listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
}

/// Filesystem-backed media store rooted at the configured uploads directory.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    max_upload_size: u64,
}

impl MediaStore {
    /// Open the store, creating the uploads directory if absent.
    pub async fn open(config: &MediaConfig) -> Result<Self, MediaError> {
        let root = PathBuf::from(&config.uploads_dir);
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            max_upload_size: config.max_upload_size,
        })
    }

    pub fn max_upload_size(&self) -> u64 {
        self.max_upload_size
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Begin a size-capped streaming upload under a freshly minted key.
    pub async fn begin_upload(&self) -> Result<UploadSink, MediaError> {
        let key = Uuid::new_v4().to_string();
        let path = self.root.join(&key);
        let file = fs::File::create(&path).await?;
        Ok(UploadSink {
            file,
            path,
            key,
            written: 0,
            cap: self.max_upload_size,
        })
    }

    /// Open a stored object for reading, returning the handle and its size.
    pub async fn open_object(&self, key: &str) -> Result<(fs::File, u64), MediaError> {
        let path = self.object_path(key)?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediaError::NotFound)
            }
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata().await?.len();
        Ok((file, size))
    }

    /// List every stored object with size and modification time.
    pub async fn list(&self) -> Result<Vec<StoredObject>, MediaError> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut objects = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let key = entry.file_name().to_string_lossy().into_owned();
            let modified_at = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            objects.push(StoredObject {
                key,
                size: meta.len(),
                modified_at,
            });
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    /// Delete objects older than `age`. Returns (count deleted, bytes freed).
    pub async fn sweep_older_than(&self, age: Duration) -> Result<(usize, u64), MediaError> {
        let cutoff = SystemTime::now()
            .checked_sub(age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut entries = fs::read_dir(&self.root).await?;
        let mut deleted = 0usize;
        let mut freed = 0u64;
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let old_enough = meta.modified().map(|m| m < cutoff).unwrap_or(false);
            if old_enough {
                if let Err(e) = fs::remove_file(entry.path()).await {
                    tracing::warn!(path = %entry.path().display(), error = %e, "Failed to delete stored media");
                    continue;
                }
                deleted += 1;
                freed += meta.len();
            }
        }
        Ok((deleted, freed))
    }

    /// Delete every stored object. Returns (count deleted, bytes freed).
    pub async fn sweep_all(&self) -> Result<(usize, u64), MediaError> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut deleted = 0usize;
        let mut freed = 0u64;
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            if let Err(e) = fs::remove_file(entry.path()).await {
                tracing::warn!(path = %entry.path().display(), error = %e, "Failed to delete stored media");
                continue;
            }
            deleted += 1;
            freed += meta.len();
        }
        Ok((deleted, freed))
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, MediaError> {
        if !is_valid_key(key) {
            return Err(MediaError::InvalidKey);
        }
        Ok(self.root.join(key))
    }
}

/// Keys are minted as UUIDs; anything outside that alphabet is rejected so a
/// crafted key can never escape the uploads directory.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 64
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        && !key.contains("..")
}

/// In-progress streaming upload. Dropped without `finish` leaves a partial
/// file that the age-based sweep eventually reclaims; `abort` removes it
/// eagerly.
pub struct UploadSink {
    file: fs::File,
    path: PathBuf,
    key: String,
    written: u64,
    cap: u64,
}

impl UploadSink {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Append a chunk, enforcing the configured size cap.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), MediaError> {
        let next = self.written.saturating_add(chunk.len() as u64);
        if next > self.cap {
            return Err(MediaError::TooLarge { limit: self.cap });
        }
        self.file.write_all(chunk).await?;
        self.written = next;
        Ok(())
    }

    /// Flush and seal the upload, producing the descriptor clients share.
    pub async fn finish(
        mut self,
        name: String,
        mime_type: String,
    ) -> Result<VideoDescriptor, MediaError> {
        self.file.flush().await?;
        Ok(VideoDescriptor {
            id: self.key.clone(),
            name,
            size: self.written,
            mime_type,
            storage_key: self.key,
        })
    }

    /// Drop the partial file.
    pub async fn abort(self) {
        drop(self.file);
        if let Err(e) = fs::remove_file(&self.path).await {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove aborted upload");
        }
    }
}

/// Resolve the `Content-Type` for a stored object.
///
/// The query-string override is the authoritative signal; otherwise the key's
/// extension is consulted. Keys are minted without extensions, so the default
/// is the common case.
pub fn content_type_for(key: &str, override_type: Option<&str>) -> String {
    if let Some(t) = override_type {
        let t = t.trim();
        if !t.is_empty() {
            return t.to_string();
        }
    }
    let extension = Path::new(key)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        _ => "video/mp4",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &Path, cap: u64) -> MediaConfig {
        MediaConfig {
            uploads_dir: dir.to_string_lossy().into_owned(),
            max_upload_size: cap,
        }
    }

    #[tokio::test]
    async fn upload_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::open(&test_config(dir.path(), 1024)).await.unwrap();

        let mut sink = store.begin_upload().await.unwrap();
        sink.write_chunk(b"hello ").await.unwrap();
        sink.write_chunk(b"world").await.unwrap();
        let video = sink
            .finish("movie.mp4".to_string(), "video/mp4".to_string())
            .await
            .unwrap();

        assert_eq!(video.size, 11);
        assert_eq!(video.id, video.storage_key);
        assert_eq!(video.name, "movie.mp4");

        let (mut file, size) = store.open_object(&video.storage_key).await.unwrap();
        assert_eq!(size, 11);
        let mut contents = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut file, &mut contents)
            .await
            .unwrap();
        assert_eq!(contents, b"hello world");
    }

    #[tokio::test]
    async fn size_cap_is_enforced_mid_stream() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::open(&test_config(dir.path(), 10)).await.unwrap();

        let mut sink = store.begin_upload().await.unwrap();
        sink.write_chunk(b"123456").await.unwrap();
        let err = sink.write_chunk(b"7890123").await.unwrap_err();
        assert!(matches!(err, MediaError::TooLarge { limit: 10 }));
        sink.abort().await;

        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_and_hostile_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::open(&test_config(dir.path(), 1024)).await.unwrap();

        assert!(matches!(
            store.open_object("no-such-key").await.unwrap_err(),
            MediaError::NotFound
        ));
        assert!(matches!(
            store.open_object("../etc/passwd").await.unwrap_err(),
            MediaError::InvalidKey
        ));
        assert!(matches!(
            store.open_object("").await.unwrap_err(),
            MediaError::InvalidKey
        ));
    }

    #[tokio::test]
    async fn sweep_all_clears_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::open(&test_config(dir.path(), 1024)).await.unwrap();

        for _ in 0..3 {
            let mut sink = store.begin_upload().await.unwrap();
            sink.write_chunk(b"abc").await.unwrap();
            sink.finish("clip.mp4".into(), "video/mp4".into())
                .await
                .unwrap();
        }
        assert_eq!(store.list().await.unwrap().len(), 3);

        let (deleted, freed) = store.sweep_all().await.unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(freed, 9);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[test]
    fn content_type_table() {
        assert_eq!(content_type_for("abc123", None), "video/mp4");
        assert_eq!(content_type_for("clip.mkv", None), "video/x-matroska");
        assert_eq!(content_type_for("clip.webm", None), "video/webm");
        assert_eq!(content_type_for("clip.mov", None), "video/quicktime");
        assert_eq!(
            content_type_for("abc123", Some("video/webm")),
            "video/webm"
        );
        assert_eq!(content_type_for("abc123", Some("  ")), "video/mp4");
    }
}
