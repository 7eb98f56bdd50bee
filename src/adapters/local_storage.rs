//! [`FileStorage`] on the local filesystem, returning `file://` URLs.

use crate::error::PortError;
use crate::pipeline::input::local_path;
use crate::ports::FileStorage;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// File extension for a content type; unknown types keep the upload's own.
fn extension(content_type: &str, filename: &str) -> String {
    match content_type {
        "image/png" => "png".to_string(),
        "image/jpeg" => "jpg".to_string(),
        "image/webp" => "webp".to_string(),
        "image/gif" => "gif".to_string(),
        "image/bmp" => "bmp".to_string(),
        "image/tiff" => "tiff".to_string(),
        _ => Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("bin")
            .to_lowercase(),
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn upload(&self, bytes: &[u8], filename: &str, content_type: &str) -> Result<String, PortError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| PortError::Storage(format!("cannot create {}: {}", self.root.display(), e)))?;

        let name = format!("{}.{}", Uuid::new_v4(), extension(content_type, filename));
        let path = self.root.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| PortError::Storage(format!("cannot write {}: {}", path.display(), e)))?;

        let absolute = std::path::absolute(&path).unwrap_or(path);
        debug!("Stored upload {} at {}", filename, absolute.display());
        Ok(format!("file://{}", absolute.display()))
    }

    async fn delete(&self, url: &str) -> Result<(), PortError> {
        let path = local_path(url);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PortError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(PortError::Storage(format!("cannot delete {}: {}", path.display(), e))),
        }
    }
}
