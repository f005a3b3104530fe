//! Blob storage backends.
//!
//! Uploaded media lands behind the [`BlobStore`] trait and becomes
//! addressable at a stable `/uploads/<name>` url. Names are random UUIDs —
//! never derived from user input — with only the extension of the caller's
//! filename hint carried over so browsers can sniff content sensibly.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use murmur_core::defaults::UPLOAD_URL_PREFIX;
use murmur_core::{BlobStore, Error, Result};

/// Extract a safe lowercase extension (with leading dot) from a filename
/// hint. Anything other than short alphanumeric extensions is discarded.
pub fn file_extension(filename_hint: &str) -> String {
    match filename_hint.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= 8
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!(".{}", ext.to_ascii_lowercase())
        }
        _ => String::new(),
    }
}

/// Generate a collision-resistant blob name from a filename hint.
pub fn generate_blob_name(filename_hint: &str) -> String {
    format!("{}{}", Uuid::new_v4(), file_extension(filename_hint))
}

/// Resolve a `/uploads/<name>` url back to its bare name.
///
/// Rejects anything that is not a plain name under the upload prefix, so a
/// crafted url can never escape the storage directory.
fn blob_name_from_url(url: &str) -> Result<&str> {
    let name = url
        .strip_prefix(UPLOAD_URL_PREFIX)
        .ok_or_else(|| Error::NotFound(format!("blob {}", url)))?;
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(Error::NotFound(format!("blob {}", url)));
    }
    Ok(name)
}

/// Filesystem blob storage.
///
/// Stores files flat under `{base}/uploads/`, matching the public url shape.
pub struct FilesystemBlobStore {
    base_path: PathBuf,
}

impl FilesystemBlobStore {
    /// Create a new filesystem store rooted at the given base directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, name: &str) -> PathBuf {
        self.base_path.join("uploads").join(name)
    }

    /// Validate that the backend can write, read, and delete files.
    ///
    /// Performs a full round-trip at startup to catch filesystem issues
    /// (permission errors, missing directories) early.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        let test_file = self.base_path.join("uploads/.health-check");

        fs::create_dir_all(self.base_path.join("uploads"))
            .await
            .map_err(|e| format!("create_dir_all: {}", e))?;

        let data = b"storage-health-check";
        fs::write(&test_file, data)
            .await
            .map_err(|e| format!("write({:?}): {}", test_file, e))?;

        let read_back = fs::read(&test_file)
            .await
            .map_err(|e| format!("read({:?}): {}", test_file, e))?;
        if read_back != data {
            return Err("read-back mismatch".to_string());
        }

        let _ = fs::remove_file(&test_file).await;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(&self, filename_hint: &str, data: &[u8]) -> Result<String> {
        let name = generate_blob_name(filename_hint);
        let full_path = self.full_path(&name);
        debug!(
            subsystem = "store",
            component = "blob",
            op = "put",
            blob_url = %format!("{}{}", UPLOAD_URL_PREFIX, name),
            size_bytes = data.len(),
            "Writing blob"
        );

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "blob: create_dir_all failed");
                Error::Storage(format!("create upload dir: {}", e))
            })?;
        }

        // Atomic write: temp file + rename
        let temp_path = full_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Storage(format!("create {}: {}", temp_path.display(), e)))?;
        file.write_all(data)
            .await
            .map_err(|e| Error::Storage(format!("write: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| Error::Storage(format!("sync: {}", e)))?;
        drop(file);

        fs::rename(&temp_path, &full_path)
            .await
            .map_err(|e| Error::Storage(format!("rename: {}", e)))?;

        Ok(format!("{}{}", UPLOAD_URL_PREFIX, name))
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let name = blob_name_from_url(url)?;
        match fs::read(self.full_path(name)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("blob {}", url)))
            }
            Err(e) => Err(Error::Storage(format!("read {}: {}", url, e))),
        }
    }
}

/// In-memory blob storage for tests and the server's memory mode.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs. Useful for asserting upload counts in tests.
    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, filename_hint: &str, data: &[u8]) -> Result<String> {
        let url = format!("{}{}", UPLOAD_URL_PREFIX, generate_blob_name(filename_hint));
        self.blobs
            .lock()
            .unwrap()
            .insert(url.clone(), data.to_vec());
        Ok(url)
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        blob_name_from_url(url)?;
        self.blobs
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("blob {}", url)))
    }
}
