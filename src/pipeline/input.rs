//! Image loading: turn the job's `image_url` into bytes.
//!
//! Storage hands back either a `file://` URL (local storage) or an HTTP(S)
//! URL (object storage/CDN). Plain paths are accepted too so the CLI can
//! point at a photo on disk. Nothing is written to disk: menu photos are a
//! few megabytes at most and go straight into a base64 request body.

use crate::error::PortError;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like an HTTP(S) URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Local filesystem path for a `file://` URL or a bare path.
pub fn local_path(input: &str) -> PathBuf {
    PathBuf::from(input.strip_prefix("file://").unwrap_or(input))
}

/// Read the image at `source`, downloading it when it is a URL.
pub async fn load_image(source: &str, timeout_secs: u64) -> Result<Vec<u8>, PortError> {
    if is_url(source) {
        download_url(source, timeout_secs).await
    } else {
        read_local(source).await
    }
}

async fn read_local(source: &str) -> Result<Vec<u8>, PortError> {
    let path = local_path(source);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read {} bytes from {}", bytes.len(), path.display());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(PortError::NotFound(path.display().to_string()))
        }
        Err(e) => Err(PortError::Storage(format!(
            "cannot read {}: {}",
            path.display(),
            e
        ))),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, PortError> {
    info!("Downloading menu image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PortError::Request(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PortError::Timeout(timeout_secs.saturating_mul(1000))
        } else {
            PortError::Request(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(PortError::Request(format!(
            "GET {} returned HTTP {}",
            url,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PortError::Request(e.to_string()))?;
    debug!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}
