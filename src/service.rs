//! External interface: the job operations a router exposes, as plain methods.
//!
//! [`JobService`] is framework-agnostic. Each method maps 1:1 onto an HTTP
//! route; errors carry their status via [`DigitizerError::status_code`] and
//! render as an [`crate::error::ErrorBody`]. Response DTOs serialise with
//! camelCase keys.
//!
//! | Operation   | Success            | Failure                                  |
//! |-------------|--------------------|------------------------------------------|
//! | create job  | 202 [`JobAccepted`]| 400 `invalid_file`, 502 `storage_failed` |
//! | get job     | 200 [`JobView`]    | 404 `not_found`, 500 dangling menu link  |
//! | retry job   | 202 [`JobAccepted`]| 400 `retry_not_allowed`, 404             |
//! | delete job  | 200 [`JobDeleted`] | 404 `not_found`                          |

use crate::config::DigitizerConfig;
use crate::error::DigitizerError;
use crate::job::{Job, JobId, JobStatus, MenuId};
use crate::orchestrator::{JobOrchestrator, Submission};
use crate::output::{MenuRecord, Nutrition};
use crate::pipeline::encode::sniff_format;
use crate::ports::FileStorage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Allergy sentence shown when the model reported no allergens.
pub const NO_ALLERGENS_EN: &str = "No common allergens identified.";
pub const NO_ALLERGENS_AM: &str = "ምንም የተለመዱ አለርጂዎች አልተገኙም።";

/// An uploaded menu photo as received from the client.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

// ── Response DTOs ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAccepted {
    pub job_id: JobId,
    pub status: JobStatus,
    pub estimated_completion_time: DateTime<Utc>,
}

impl JobAccepted {
    pub const STATUS_CODE: u16 = 202;
}

impl From<&Job> for JobAccepted {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            estimated_completion_time: job.estimated_completion,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub estimated_completion_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Present only for failed jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present only for completed jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<JobResults>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResults {
    pub extracted_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    pub photo_matches: Vec<PhotoMatch>,
    pub menu_items: Vec<MenuItemView>,
    pub structured_menu_id: MenuId,
}

/// A dish whose photo came from image search rather than the placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoMatch {
    pub item_name: String,
    pub photo_url: String,
}

/// One dish flattened out of the Tab → Category hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemView {
    pub name: String,
    pub name_am: String,
    pub description: String,
    pub description_am: String,
    pub tab: String,
    pub category: String,
    pub tags: Vec<String>,
    pub price: f64,
    pub currency: String,
    pub allergies: String,
    pub allergies_am: String,
    pub allergens: Vec<String>,
    pub ingredients: Vec<String>,
    pub ingredients_am: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nutrition: Option<Nutrition>,
    pub preparation_time: u32,
    pub eating_instructions: String,
    pub eating_instructions_am: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDeleted {
    pub job_id: JobId,
    pub deleted: bool,
}

// ── Service ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct JobService {
    orchestrator: JobOrchestrator,
    storage: Arc<dyn FileStorage>,
}

impl JobService {
    pub fn new(orchestrator: JobOrchestrator, storage: Arc<dyn FileStorage>) -> Self {
        Self { orchestrator, storage }
    }

    pub fn orchestrator(&self) -> &JobOrchestrator {
        &self.orchestrator
    }

    /// Validate and store the photo, then start a job for it.
    pub async fn create_job(
        &self,
        restaurant_id: &str,
        user_id: &str,
        upload: Upload,
    ) -> Result<(JobAccepted, Submission), DigitizerError> {
        let content_type = validate_upload(&upload, self.orchestrator.config())?;
        let filename = upload
            .filename
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or("menu");

        let image_url = self
            .storage
            .upload(&upload.bytes, filename, &content_type)
            .await
            .map_err(|e| DigitizerError::StorageFailed {
                detail: e.to_string(),
            })?;
        info!("Stored {} ({} bytes) at {}", filename, upload.bytes.len(), image_url);

        let submission = match self
            .orchestrator
            .create(restaurant_id, user_id, &image_url)
            .await
        {
            Ok(s) => s,
            Err(e) => {
                if let Err(del) = self.storage.delete(&image_url).await {
                    warn!("Failed to delete stored upload {} after job creation failed: {}", image_url, del);
                }
                return Err(e);
            }
        };
        Ok((JobAccepted::from(&submission.job), submission))
    }

    pub async fn get_job(&self, job_id: JobId) -> Result<JobView, DigitizerError> {
        let job = self.orchestrator.get(job_id).await?;

        let results = match (job.status, job.structured_menu_id) {
            (JobStatus::Completed, Some(menu_id)) => {
                let record = self.orchestrator.menu(menu_id).await?.ok_or_else(|| {
                    warn!("Job {}: linked menu {} is missing", job.id, menu_id);
                    DigitizerError::Internal(format!(
                        "menu {} linked to job {} does not exist",
                        menu_id, job.id
                    ))
                })?;
                Some(build_results(&job, menu_id, &record, self.orchestrator.config()))
            }
            _ => None,
        };
        let error = match job.status {
            JobStatus::Failed => job.error.clone(),
            _ => None,
        };

        Ok(JobView {
            job_id: job.id,
            status: job.status,
            created_at: job.created_at,
            estimated_completion_time: job.estimated_completion,
            completed_at: job.completed_at,
            error,
            results,
        })
    }

    pub async fn retry_job(&self, job_id: JobId) -> Result<(JobAccepted, Submission), DigitizerError> {
        let submission = self.orchestrator.retry(job_id).await?;
        Ok((JobAccepted::from(&submission.job), submission))
    }

    pub async fn delete_job(&self, job_id: JobId) -> Result<JobDeleted, DigitizerError> {
        self.orchestrator.delete(job_id).await?;
        Ok(JobDeleted {
            job_id,
            deleted: true,
        })
    }
}

/// Check an upload and return the content type to store it under.
pub fn validate_upload(upload: &Upload, config: &DigitizerConfig) -> Result<String, DigitizerError> {
    if upload.bytes.is_empty() {
        return Err(DigitizerError::InvalidFile {
            reason: "no file uploaded".into(),
        });
    }
    if upload.bytes.len() > config.max_upload_bytes {
        return Err(DigitizerError::InvalidFile {
            reason: format!(
                "file is {} bytes; the limit is {} bytes",
                upload.bytes.len(),
                config.max_upload_bytes
            ),
        });
    }
    let format = sniff_format(&upload.bytes).ok_or_else(|| DigitizerError::InvalidFile {
        reason: match upload.content_type.as_deref() {
            Some(ct) => format!("content is not a supported image (declared {})", ct),
            None => "content is not a supported image".into(),
        },
    })?;
    Ok(format.to_mime_type().to_string())
}

fn build_results(
    job: &Job,
    menu_id: MenuId,
    record: &MenuRecord,
    config: &DigitizerConfig,
) -> JobResults {
    let mut photo_matches = Vec::new();
    let mut menu_items = Vec::new();

    for (tab, category, item) in record.menu.items() {
        let photo_url = item.photos.first().cloned();
        if let Some(url) = &photo_url {
            if *url != config.placeholder_photo_url {
                photo_matches.push(PhotoMatch {
                    item_name: item.name.clone(),
                    photo_url: url.clone(),
                });
            }
        }

        let (allergies, allergies_am, allergens) = match &item.allergies {
            Some(a) => (
                non_empty_or(&a.text, NO_ALLERGENS_EN),
                non_empty_or(&a.text_am, NO_ALLERGENS_AM),
                a.allergens.clone(),
            ),
            None => (NO_ALLERGENS_EN.to_string(), NO_ALLERGENS_AM.to_string(), Vec::new()),
        };

        menu_items.push(MenuItemView {
            name: item.name.clone(),
            name_am: item.name_am.clone(),
            description: item.description.clone(),
            description_am: item.description_am.clone(),
            tab: tab.name.clone(),
            category: category.name.clone(),
            tags: item.tags.clone(),
            price: item.price,
            currency: item.currency.clone(),
            allergies,
            allergies_am,
            allergens,
            ingredients: item.ingredients.clone(),
            ingredients_am: item.ingredients_am.clone(),
            nutrition: item.nutrition,
            preparation_time: item.preparation_time,
            eating_instructions: item.eating_instructions.clone(),
            eating_instructions_am: item.eating_instructions_am.clone(),
            photo_url,
        });
    }

    JobResults {
        extracted_text: job.result_text.clone().unwrap_or_default(),
        confidence: job.confidence,
        photo_matches,
        menu_items,
        structured_menu_id: menu_id,
    }
}

fn non_empty_or(text: &str, fallback: &str) -> String {
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{Allergy, Category, Menu, MenuItem, Tab};

    fn upload(bytes: &[u8]) -> Upload {
        Upload {
            filename: Some("menu.png".into()),
            content_type: Some("image/png".into()),
            bytes: bytes.to_vec(),
        }
    }

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn upload_validation() {
        let config = DigitizerConfig::default();
        assert_eq!(validate_upload(&upload(PNG), &config).unwrap(), "image/png");

        let err = validate_upload(&upload(b""), &config).unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = validate_upload(&upload(b"%PDF-1.4"), &config).unwrap_err();
        assert!(err.to_string().contains("declared image/png"), "got {err}");

        let small = DigitizerConfig::builder().max_upload_bytes(4).build().unwrap();
        let err = validate_upload(&upload(PNG), &small).unwrap_err();
        assert!(err.to_string().contains("limit"), "got {err}");
    }

    #[test]
    fn results_flatten_menu_and_fill_allergy_templates() {
        let config = DigitizerConfig::default();
        let mut job = Job::new("r", "u", "file:///m.png", 120);
        let menu_id = MenuId::new();
        job.start_run(120);
        job.complete(menu_id, "Doro Wot 150".into(), Some(0.9));

        let record = MenuRecord::new(
            "r",
            Menu {
                tabs: vec![Tab {
                    name: "Lunch".into(),
                    name_am: "ምሳ".into(),
                    categories: vec![Category {
                        name: "Stew".into(),
                        name_am: "ወጥ".into(),
                        items: vec![
                            MenuItem {
                                name: "Doro Wot".into(),
                                photos: vec!["https://img.test/doro".into()],
                                allergies: Some(Allergy {
                                    text: "Contains egg.".into(),
                                    text_am: String::new(),
                                    allergens: vec!["egg".into()],
                                }),
                                ..Default::default()
                            },
                            MenuItem {
                                name: "Misir Wot".into(),
                                photos: vec![config.placeholder_photo_url.clone()],
                                ..Default::default()
                            },
                        ],
                    }],
                }],
            },
        );

        let results = build_results(&job, menu_id, &record, &config);
        assert_eq!(results.extracted_text, "Doro Wot 150");
        assert_eq!(results.menu_items.len(), 2);
        assert_eq!(results.menu_items[0].tab, "Lunch");
        assert_eq!(results.menu_items[0].category, "Stew");
        assert_eq!(results.menu_items[0].allergies, "Contains egg.");
        assert_eq!(results.menu_items[0].allergies_am, NO_ALLERGENS_AM);
        assert_eq!(results.menu_items[1].allergies, NO_ALLERGENS_EN);
        assert_eq!(
            results.photo_matches,
            vec![PhotoMatch {
                item_name: "Doro Wot".into(),
                photo_url: "https://img.test/doro".into(),
            }]
        );

        let json = serde_json::to_value(&results).unwrap();
        assert!(json.get("structuredMenuId").is_some());
        assert_eq!(json["menuItems"][0]["nameAm"], "");
        assert_eq!(json["menuItems"][0]["photoUrl"], "https://img.test/doro");
    }
}
