//! Collaborator contracts consumed by the pipeline.
//!
//! Everything the pipeline does not own (OCR, the LLM, image search, file
//! storage and the database) is reached through one of these object-safe
//! traits. Concrete implementations live in [`crate::adapters`]; tests supply
//! hand-written fakes.

use crate::error::PortError;
use crate::job::{Job, JobId, JobStatus, MenuId};
use crate::output::MenuRecord;
use async_trait::async_trait;

/// Text pulled out of a menu photo.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub text: String,
    /// Provider confidence in `0.0..=1.0`, when the provider reports one.
    pub confidence: Option<f32>,
}

impl Extraction {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
        }
    }
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, image_url: &str) -> Result<Extraction, PortError>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one completion for `prompt` and return the raw response text.
    async fn generate(&self, prompt: &str) -> Result<String, PortError>;
}

#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// Best photo URL for `query`, or `None` when nothing matched.
    async fn search(&self, query: &str) -> Result<Option<String>, PortError>;
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store `bytes` and return a URL the text extractor can read.
    async fn upload(
        &self,
        bytes: &[u8],
        filename: &str,
        content_type: &str,
    ) -> Result<String, PortError>;

    async fn delete(&self, url: &str) -> Result<(), PortError>;
}

#[async_trait]
pub trait MenuRepository: Send + Sync {
    async fn create(&self, record: &MenuRecord) -> Result<(), PortError>;

    async fn get(&self, id: MenuId) -> Result<Option<MenuRecord>, PortError>;

    async fn delete(&self, id: MenuId) -> Result<(), PortError>;
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &Job) -> Result<(), PortError>;

    async fn get(&self, id: JobId) -> Result<Option<Job>, PortError>;

    /// Overwrite the stored job. Fails with [`PortError::NotFound`] when the
    /// job was deleted in the meantime.
    async fn update(&self, job: &Job) -> Result<(), PortError>;

    /// Store `job` only if the stored status still equals `expected`.
    ///
    /// Returns `Ok(false)` when another writer changed the status first.
    async fn compare_and_update(&self, expected: JobStatus, job: &Job) -> Result<bool, PortError>;

    async fn delete(&self, id: JobId) -> Result<(), PortError>;
}
