//! # menu-digitizer
//!
//! Turn a photo of a restaurant menu into a structured, bilingual
//! (English/Amharic) digital menu using an OCR step and an LLM.
//!
//! ## Why this crate?
//!
//! Menus are printed in every layout imaginable, mix Ge'ez script with Latin,
//! and list prices in whatever format the printer liked. Instead of
//! hand-written layout rules, the photo is transcribed by a vision model and
//! the text is structured by an LLM into a fixed JSON schema. Everything
//! around those two calls (retries, response repair, categorisation, photo
//! lookup, job bookkeeping) is deterministic and tested without a live model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 0. Accept     validate image, store it, create a pending job (returns)
//!  ├─ 1. Extract    OCR port → raw text                  (fatal on error)
//!  ├─ 2. Structure  LLM with retry/backoff → repaired JSON → Tab/Category/Item
//!  ├─ 3. Enrich     ≤5 concurrent photo lookups, per-name cache (never fatal)
//!  └─ 4. Persist    menu record → link to job → completed
//! ```
//!
//! Steps 1–4 run on a detached tokio task; callers poll the job.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use menu_digitizer::{adapters, DigitizerConfig, Upload};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = DigitizerConfig::default();
//!     let service = adapters::local_service(config, "uploads", None)?;
//!
//!     let upload = Upload {
//!         filename: Some("menu.jpg".into()),
//!         content_type: Some("image/jpeg".into()),
//!         bytes: std::fs::read("menu.jpg")?,
//!     };
//!     let (accepted, submission) = service.create_job("rest-1", "user-1", upload).await?;
//!     submission.wait().await?;
//!
//!     let view = service.get_job(accepted.job_id).await?;
//!     println!("{}", serde_json::to_string_pretty(&view)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `menudigitize` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when embedding the library in a service:
//! ```toml
//! menu-digitizer = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod adapters;
pub mod config;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod ports;
pub mod progress;
pub mod prompts;
pub mod service;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DigitizerConfig, DigitizerConfigBuilder};
pub use error::{DigitizerError, ErrorBody, ErrorKind, ParseError, PortError};
pub use job::{Job, JobId, JobStage, JobStatus, MenuId};
pub use orchestrator::{JobOrchestrator, Ports, Submission};
pub use output::{Allergy, Category, Menu, MenuItem, MenuRecord, Nutrition, Tab};
pub use pipeline::enrich::{EnrichmentStats, PhotoCache};
pub use ports::{Extraction, FileStorage, ImageSearch, JobRepository, LanguageModel, MenuRepository, TextExtractor};
pub use progress::{JobProgressCallback, NoopProgressCallback, ProgressCallback};
pub use service::{JobAccepted, JobDeleted, JobService, JobView, Upload};
