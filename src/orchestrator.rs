//! Job orchestration: the `pending → processing → {completed, failed}` machine.
//!
//! ## Flow per run
//!
//! ```text
//! Extract ──▶ Structure ──▶ Enrich ──▶ Persist menu ──▶ link to job
//!  (OCR)       (LLM)        (photos)    (MenuRepository)  (JobRepository)
//! ```
//!
//! Each run executes on a detached tokio task. `create` and `retry` return
//! as soon as the job record is stored; callers poll [`JobOrchestrator::get`]
//! or await [`Submission::wait`].
//!
//! ## Single flight
//!
//! At most one run per job id is in flight. Inside this process a claim set
//! rejects a second retry immediately; across processes the repository's
//! compare-and-update on `failed → processing` lets exactly one caller win.
//!
//! ## Partial failure
//!
//! A menu that was stored but could not be linked to its job is deleted
//! again (best effort) before the job is marked failed, so a failed job never
//! leaves an orphaned menu behind.

use crate::config::DigitizerConfig;
use crate::error::DigitizerError;
use crate::job::{Job, JobId, JobStage, JobStatus, MenuId};
use crate::output::MenuRecord;
use crate::pipeline::enrich::{enrich_menu, PhotoCache};
use crate::pipeline::structure::structure_menu;
use crate::ports::{Extraction, ImageSearch, JobRepository, LanguageModel, MenuRepository, TextExtractor};
use crate::progress::{JobProgressCallback, NoopProgressCallback};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// The collaborators a pipeline run needs.
#[derive(Clone)]
pub struct Ports {
    pub extractor: Arc<dyn TextExtractor>,
    pub model: Arc<dyn LanguageModel>,
    pub search: Arc<dyn ImageSearch>,
    pub menus: Arc<dyn MenuRepository>,
    pub jobs: Arc<dyn JobRepository>,
}

/// A job accepted for processing and the task running it.
#[derive(Debug)]
pub struct Submission {
    /// Job as stored when the call returned: `pending` after create,
    /// `processing` after retry.
    pub job: Job,
    pub handle: JoinHandle<()>,
}

impl Submission {
    /// Wait for the run to reach a terminal state.
    pub async fn wait(self) -> Result<(), DigitizerError> {
        self.handle
            .await
            .map_err(|e| DigitizerError::Internal(format!("pipeline task aborted: {}", e)))
    }
}

/// Drives jobs through the pipeline. Cheap to clone.
#[derive(Clone)]
pub struct JobOrchestrator {
    ports: Ports,
    config: Arc<DigitizerConfig>,
    in_flight: Arc<Mutex<HashSet<JobId>>>,
}

static NOOP_PROGRESS: NoopProgressCallback = NoopProgressCallback;

/// Marks a job id as running; released on drop, including on panic.
struct RunClaim {
    in_flight: Arc<Mutex<HashSet<JobId>>>,
    job_id: JobId,
}

impl RunClaim {
    fn try_claim(in_flight: &Arc<Mutex<HashSet<JobId>>>, job_id: JobId) -> Option<Self> {
        let mut set = in_flight.lock().unwrap_or_else(|e| e.into_inner());
        set.insert(job_id).then(|| Self {
            in_flight: Arc::clone(in_flight),
            job_id,
        })
    }
}

impl Drop for RunClaim {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.job_id);
    }
}

/// Everything a successful run produced, before it is persisted.
struct RunOutput {
    extraction: Extraction,
    record: MenuRecord,
}

impl JobOrchestrator {
    pub fn new(ports: Ports, config: DigitizerConfig) -> Self {
        Self {
            ports,
            config: Arc::new(config),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> &DigitizerConfig {
        &self.config
    }

    /// Store a new `pending` job for `image_url` and start processing it.
    pub async fn create(
        &self,
        restaurant_id: &str,
        user_id: &str,
        image_url: &str,
    ) -> Result<Submission, DigitizerError> {
        let job = Job::new(
            restaurant_id,
            user_id,
            image_url,
            self.config.estimated_processing_secs,
        );
        self.ports
            .jobs
            .create(&job)
            .await
            .map_err(|e| DigitizerError::Internal(format!("failed to store job: {}", e)))?;

        let claim = RunClaim::try_claim(&self.in_flight, job.id)
            .ok_or_else(|| DigitizerError::Internal(format!("job id {} already running", job.id)))?;
        info!("Job {} created for restaurant {}", job.id, job.restaurant_id);

        let this = self.clone();
        let mut running = job.clone();
        let handle = tokio::spawn(async move {
            running.start_run(this.config.estimated_processing_secs);
            if let Err(e) = this.ports.jobs.update(&running).await {
                warn!("Job {}: could not enter processing, abandoning run: {}", running.id, e);
                return;
            }
            this.execute(running, claim).await;
        });

        Ok(Submission { job, handle })
    }

    /// Re-run a `failed` job under the same id and image.
    ///
    /// Errors: [`DigitizerError::NotFound`] for an unknown id;
    /// [`DigitizerError::RetryNotAllowed`] unless the job is `failed` and no
    /// other run of it is in flight.
    pub async fn retry(&self, job_id: JobId) -> Result<Submission, DigitizerError> {
        let mut job = self.get(job_id).await?;
        if job.status != JobStatus::Failed {
            return Err(DigitizerError::RetryNotAllowed {
                job_id,
                status: job.status,
            });
        }

        let claim = RunClaim::try_claim(&self.in_flight, job_id).ok_or(
            DigitizerError::RetryNotAllowed {
                job_id,
                status: JobStatus::Processing,
            },
        )?;

        job.start_run(self.config.estimated_processing_secs);
        let won = self
            .ports
            .jobs
            .compare_and_update(JobStatus::Failed, &job)
            .await
            .map_err(|e| DigitizerError::Internal(format!("failed to update job: {}", e)))?;
        if !won {
            let status = match self.ports.jobs.get(job_id).await {
                Ok(Some(current)) => current.status,
                _ => JobStatus::Processing,
            };
            return Err(DigitizerError::RetryNotAllowed { job_id, status });
        }
        info!("Job {}: retry accepted (attempt {})", job_id, job.attempt);

        let this = self.clone();
        let running = job.clone();
        let handle = tokio::spawn(async move {
            this.execute(running, claim).await;
        });

        Ok(Submission { job, handle })
    }

    pub async fn get(&self, job_id: JobId) -> Result<Job, DigitizerError> {
        self.ports
            .jobs
            .get(job_id)
            .await
            .map_err(|e| DigitizerError::Internal(format!("failed to load job: {}", e)))?
            .ok_or(DigitizerError::NotFound { job_id })
    }

    /// Remove the job record. A menu it produced stays in the menu store.
    pub async fn delete(&self, job_id: JobId) -> Result<(), DigitizerError> {
        self.get(job_id).await?;
        self.ports
            .jobs
            .delete(job_id)
            .await
            .map_err(|e| DigitizerError::Internal(format!("failed to delete job: {}", e)))?;
        info!("Job {} deleted", job_id);
        Ok(())
    }

    pub async fn menu(&self, menu_id: MenuId) -> Result<Option<MenuRecord>, DigitizerError> {
        self.ports
            .menus
            .get(menu_id)
            .await
            .map_err(|e| DigitizerError::Internal(format!("failed to load menu: {}", e)))
    }

    fn progress(&self) -> &dyn JobProgressCallback {
        match &self.config.progress_callback {
            Some(cb) => cb.as_ref(),
            None => &NOOP_PROGRESS,
        }
    }

    /// Run the pipeline for a job already stored as `processing`.
    ///
    /// The claim is released just before the terminal status is written, so
    /// a retry that observes `failed` is never turned away by this run.
    async fn execute(&self, job: Job, claim: RunClaim) {
        self.progress().on_job_start(job.id, job.attempt);
        info!("Job {}: run {} started", job.id, job.attempt);

        match self.run_pipeline(&job).await {
            Ok(output) => self.persist(job, output, claim).await,
            Err(e) => self.record_failure(job, e, Some(claim)).await,
        }
    }

    async fn run_pipeline(&self, job: &Job) -> Result<RunOutput, DigitizerError> {
        let progress = self.progress();

        progress.on_stage_start(job.id, JobStage::Extracting);
        let extraction = self
            .ports
            .extractor
            .extract(&job.image_url)
            .await
            .map_err(|e| DigitizerError::ExtractionFailed {
                image_url: job.image_url.clone(),
                detail: e.to_string(),
            })?;
        if extraction.text.trim().is_empty() {
            return Err(DigitizerError::ExtractionFailed {
                image_url: job.image_url.clone(),
                detail: "no text found in image".to_string(),
            });
        }
        debug!("Job {}: extracted {} chars", job.id, extraction.text.len());
        progress.on_stage_complete(job.id, JobStage::Extracting);

        progress.on_stage_start(job.id, JobStage::Structuring);
        let structured = structure_menu(self.ports.model.as_ref(), &extraction.text, &self.config).await?;
        progress.on_stage_complete(job.id, JobStage::Structuring);

        progress.on_stage_start(job.id, JobStage::Enriching);
        let mut menu = structured.menu;
        let cache = PhotoCache::new();
        enrich_menu(&mut menu, self.ports.search.as_ref(), &cache, &self.config).await;
        progress.on_stage_complete(job.id, JobStage::Enriching);

        Ok(RunOutput {
            extraction,
            record: MenuRecord::new(job.restaurant_id.clone(), menu),
        })
    }

    async fn persist(&self, mut job: Job, output: RunOutput, claim: RunClaim) {
        let progress = self.progress();
        progress.on_stage_start(job.id, JobStage::Persisting);

        let RunOutput { extraction, record } = output;
        let item_count = record.menu.item_count();

        if let Err(e) = self.ports.menus.create(&record).await {
            self.discard_menu(job.id, record.id).await;
            let err = DigitizerError::PersistenceFailed {
                detail: format!("menu insert failed: {}", e),
            };
            return self.record_failure(job, err, Some(claim)).await;
        }

        job.complete(record.id, extraction.text, extraction.confidence);
        drop(claim);
        if let Err(e) = self.ports.jobs.update(&job).await {
            self.discard_menu(job.id, record.id).await;
            let err = DigitizerError::PersistenceFailed {
                detail: format!("linking menu {} to job failed: {}", record.id, e),
            };
            return self.record_failure(job, err, None).await;
        }

        progress.on_stage_complete(job.id, JobStage::Persisting);
        progress.on_job_complete(job.id, item_count);
        info!("Job {} completed: menu {} with {} items", job.id, record.id, item_count);
    }

    async fn discard_menu(&self, job_id: JobId, menu_id: MenuId) {
        if let Err(e) = self.ports.menus.delete(menu_id).await {
            warn!("Job {}: failed to delete orphaned menu {}: {}", job_id, menu_id, e);
        }
    }

    async fn record_failure(&self, mut job: Job, err: DigitizerError, claim: Option<RunClaim>) {
        let message = err.to_string();
        error!("Job {} failed ({}): {}", job.id, err.kind(), message);

        job.fail(err.kind(), message.clone());
        drop(claim);
        if let Err(e) = self.ports.jobs.update(&job).await {
            warn!("Job {}: failed to record failure: {}", job.id, e);
        }
        self.progress().on_job_failed(job.id, &message);
    }
}
