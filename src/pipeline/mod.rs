//! Pipeline stages for menu digitisation.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable on its own and the orchestrator only sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ (OCR port) ──▶ structure ──▶ enrich
//! (bytes)   (base64)    (raw text)     │             (photos)
//!                                      ├─ llm       retry/backoff
//!                                      ├─ parse     repair + decode JSON
//!                                      └─ assemble  Tab → Category → Item
//!                                          └─ classify
//! ```
//!
//! 1. [`input`]  — read the stored photo from a path, `file://` or HTTP(S) URL
//! 2. [`encode`] — sniff the format and base64-wrap it for the vision model
//! 3. [`structure`] — one structuring prompt; drives [`llm`], [`parse`] and
//!    [`assemble`]
//! 4. [`enrich`] — bounded-concurrency photo lookups with a per-key cache

pub mod assemble;
pub mod classify;
pub mod encode;
pub mod enrich;
pub mod input;
pub mod llm;
pub mod parse;
pub mod structure;
