//! Job records: one tracked attempt to digitise a single uploaded menu image.
//!
//! A job moves through `pending → processing → {completed, failed}`. The only
//! way back out of `failed` is an explicit retry, which re-enters
//! `processing` under the same id and with the same `image_url`.

use crate::error::ErrorKind;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque job identity, generated at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identity of a persisted menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MenuId(Uuid);

impl MenuId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MenuId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MenuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage reported to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Extracting,
    Structuring,
    Enriching,
    Persisting,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Extracting => "extracting",
            JobStage::Structuring => "structuring",
            JobStage::Enriching => "enriching",
            JobStage::Persisting => "persisting",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub restaurant_id: String,
    pub user_id: String,
    pub image_url: String,
    pub status: JobStatus,
    pub result_text: Option<String>,
    pub confidence: Option<f32>,
    pub structured_menu_id: Option<MenuId>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    /// Pipeline runs started for this job; 0 while still pending.
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_completion: DateTime<Utc>,
}

impl Job {
    pub fn new(
        restaurant_id: impl Into<String>,
        user_id: impl Into<String>,
        image_url: impl Into<String>,
        estimated_processing_secs: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            restaurant_id: restaurant_id.into(),
            user_id: user_id.into(),
            image_url: image_url.into(),
            status: JobStatus::Pending,
            result_text: None,
            confidence: None,
            structured_menu_id: None,
            error: None,
            error_kind: None,
            attempt: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            estimated_completion: eta(now, estimated_processing_secs),
        }
    }

    /// Enter `processing` for a new run. A stale `error` from the previous
    /// run is kept until this run reaches a terminal outcome.
    pub fn start_run(&mut self, estimated_processing_secs: u64) {
        let now = Utc::now();
        self.status = JobStatus::Processing;
        self.attempt += 1;
        self.result_text = None;
        self.confidence = None;
        self.structured_menu_id = None;
        self.completed_at = None;
        self.updated_at = now;
        self.estimated_completion = eta(now, estimated_processing_secs);
    }

    pub fn complete(&mut self, menu_id: MenuId, result_text: String, confidence: Option<f32>) {
        let now = Utc::now();
        self.status = JobStatus::Completed;
        self.structured_menu_id = Some(menu_id);
        self.result_text = Some(result_text);
        self.confidence = confidence;
        self.error = None;
        self.error_kind = None;
        self.updated_at = now;
        self.completed_at = Some(now);
    }

    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.structured_menu_id = None;
        self.result_text = None;
        self.confidence = None;
        self.error = Some(message.into());
        self.error_kind = Some(kind);
        self.updated_at = Utc::now();
        self.completed_at = None;
    }
}

/// `from + secs`, saturating at the latest representable instant.
fn eta(from: DateTime<Utc>, secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|d| from.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
