//! Concrete implementations of the [`crate::ports`] traits.
//!
//! - [`llm`]: structuring via an `edgequake_llm` provider, and provider resolution
//! - [`vision_ocr`]: OCR by asking a vision model to transcribe the photo
//! - [`unsplash`]: photo lookup through the Unsplash search API
//! - [`local_storage`]: uploads written under a local directory
//! - [`memory`]: in-memory job and menu repositories

pub mod llm;
pub mod local_storage;
pub mod memory;
pub mod unsplash;
pub mod vision_ocr;

pub use llm::{resolve_provider, EdgequakeLanguageModel};
pub use local_storage::LocalFileStorage;
pub use memory::{InMemoryJobRepository, InMemoryMenuRepository};
pub use unsplash::{DisabledImageSearch, UnsplashImageSearch};
pub use vision_ocr::VisionTextExtractor;

use crate::config::DigitizerConfig;
use crate::error::DigitizerError;
use crate::orchestrator::{JobOrchestrator, Ports};
use crate::ports::ImageSearch;
use crate::service::JobService;
use std::path::PathBuf;
use std::sync::Arc;

/// Wire a [`JobService`] from the bundled adapters: the resolved LLM
/// provider for both OCR and structuring, local file storage under
/// `storage_root`, in-memory repositories, and Unsplash photo search when an
/// access key is given.
pub fn local_service(
    config: DigitizerConfig,
    storage_root: impl Into<PathBuf>,
    unsplash_access_key: Option<&str>,
) -> Result<JobService, DigitizerError> {
    let provider = resolve_provider(&config)?;

    let search: Arc<dyn ImageSearch> = match unsplash_access_key.filter(|k| !k.trim().is_empty()) {
        Some(key) => Arc::new(
            UnsplashImageSearch::new(key, config.image_search_timeout_secs)
                .map_err(|e| DigitizerError::InvalidConfig(format!("image search client: {}", e)))?,
        ),
        None => Arc::new(DisabledImageSearch),
    };

    let ports = Ports {
        extractor: Arc::new(VisionTextExtractor::new(Arc::clone(&provider), &config)),
        model: Arc::new(EdgequakeLanguageModel::new(provider, &config)),
        search,
        menus: Arc::new(InMemoryMenuRepository::new()),
        jobs: Arc::new(InMemoryJobRepository::new()),
    };
    let storage = Arc::new(LocalFileStorage::new(storage_root));

    Ok(JobService::new(JobOrchestrator::new(ports, config), storage))
}
