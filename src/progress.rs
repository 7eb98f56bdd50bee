//! Progress-callback trait for per-job pipeline events.
//!
//! Inject an [`Arc<dyn JobProgressCallback>`] via
//! [`crate::config::DigitizerConfigBuilder::progress_callback`] to receive
//! events as the orchestrator drives each job through its stages.
//!
//! # Why callbacks instead of channels?
//!
//! Callers can forward events to a broadcast channel, a websocket, a
//! notification service or a terminal spinner without the library knowing how
//! the host application communicates. Jobs run on detached tokio tasks, so the
//! trait is `Send + Sync` and may be called from several jobs at once.
//!
//! # Example
//!
//! ```rust
//! use menu_digitizer::{DigitizerConfig, JobId, JobProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl JobProgressCallback for CountingCallback {
//!     fn on_job_complete(&self, job_id: JobId, item_count: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("job {job_id}: {item_count} dishes");
//!     }
//! }
//!
//! let config = DigitizerConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::job::{JobId, JobStage};
use std::sync::Arc;

/// Called by the orchestrator as it processes each job.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must protect shared mutable state
/// with appropriate synchronisation primitives (e.g. `Mutex`, `AtomicUsize`).
pub trait JobProgressCallback: Send + Sync {
    /// A pipeline run started. `attempt` is 1 for the first run and grows
    /// with every retry.
    fn on_job_start(&self, job_id: JobId, attempt: u32) {
        let _ = (job_id, attempt);
    }

    fn on_stage_start(&self, job_id: JobId, stage: JobStage) {
        let _ = (job_id, stage);
    }

    fn on_stage_complete(&self, job_id: JobId, stage: JobStage) {
        let _ = (job_id, stage);
    }

    /// The run completed and the menu is linked to the job.
    ///
    /// # Arguments
    /// * `item_count` — dishes in the assembled menu
    fn on_job_complete(&self, job_id: JobId, item_count: usize) {
        let _ = (job_id, item_count);
    }

    /// The run ended in `failed`; `error` is the message stored on the job.
    fn on_job_failed(&self, job_id: JobId, error: &str) {
        let _ = (job_id, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl JobProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DigitizerConfig`].
pub type ProgressCallback = Arc<dyn JobProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        stages: Mutex<Vec<JobStage>>,
        completes: AtomicUsize,
        failures: AtomicUsize,
    }

    impl JobProgressCallback for TrackingCallback {
        fn on_stage_start(&self, _job_id: JobId, stage: JobStage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_job_complete(&self, _job_id: JobId, _item_count: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_job_failed(&self, _job_id: JobId, _error: &str) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        let id = JobId::new();
        cb.on_job_start(id, 1);
        cb.on_stage_start(id, JobStage::Extracting);
        cb.on_stage_complete(id, JobStage::Extracting);
        cb.on_job_complete(id, 4);
        cb.on_job_failed(id, "ocr down");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        let id = JobId::new();
        tracker.on_stage_start(id, JobStage::Extracting);
        tracker.on_stage_start(id, JobStage::Structuring);
        tracker.on_job_failed(id, "LLM gave up");

        assert_eq!(
            *tracker.stages.lock().unwrap(),
            vec![JobStage::Extracting, JobStage::Structuring]
        );
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 0);
        assert_eq!(tracker.failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_job_complete(JobId::new(), 10);
    }
}
