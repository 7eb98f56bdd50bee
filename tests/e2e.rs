//! End-to-end tests for menu-digitizer.
//!
//! These tests use real menu photos in `./test_cases/` and make live LLM API
//! calls (and Unsplash calls when `UNSPLASH_ACCESS_KEY` is set).  They are
//! gated behind the `E2E_ENABLED` environment variable so they do not run in
//! CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_digitize_menu_photo -- --nocapture

use menu_digitizer::{adapters, DigitizerConfig, JobStatus, Upload};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no photo at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test photo not found: {}", p.display());
            println!("       Put a menu photo at test_cases/menu.jpg");
            return;
        }
        p
    }};
}

fn upload_for(path: &PathBuf) -> Upload {
    Upload {
        filename: path.file_name().map(|n| n.to_string_lossy().into_owned()),
        content_type: None,
        bytes: std::fs::read(path).expect("read test photo"),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_digitize_menu_photo() {
    let photo = e2e_skip_unless_ready!(test_cases_dir().join("menu.jpg"));
    let uploads = tempfile::tempdir().unwrap();
    let unsplash = std::env::var("UNSPLASH_ACCESS_KEY").ok();

    let service = adapters::local_service(
        DigitizerConfig::default(),
        uploads.path(),
        unsplash.as_deref(),
    )
    .expect("provider configured");

    let (accepted, submission) = service
        .create_job("e2e-restaurant", "e2e-user", upload_for(&photo))
        .await
        .expect("upload accepted");
    submission.wait().await.unwrap();

    let view = service.get_job(accepted.job_id).await.unwrap();
    println!("{}", serde_json::to_string_pretty(&view).unwrap());
    assert_eq!(view.status, JobStatus::Completed, "job failed: {:?}", view.error);

    let results = view.results.unwrap();
    assert!(!results.extracted_text.trim().is_empty());
    assert!(!results.menu_items.is_empty(), "no dishes recognised");
    for item in &results.menu_items {
        assert!(!item.name.trim().is_empty());
        assert!(!item.tab.is_empty());
        assert!(!item.category.is_empty());
        assert!((1..=60).contains(&item.preparation_time));
        assert!(item.photo_url.is_some(), "every dish gets a photo or placeholder");
    }
}

#[tokio::test]
async fn test_retry_after_forced_failure() {
    let photo = e2e_skip_unless_ready!(test_cases_dir().join("menu.jpg"));
    let uploads = tempfile::tempdir().unwrap();

    // Model name no provider knows: the structuring step fails terminally.
    let broken = DigitizerConfig::builder()
        .model("no-such-model-e2e")
        .max_attempts(1)
        .build()
        .unwrap();
    let service = adapters::local_service(broken, uploads.path(), None).expect("provider configured");

    let (accepted, submission) = service
        .create_job("e2e-restaurant", "e2e-user", upload_for(&photo))
        .await
        .unwrap();
    submission.wait().await.unwrap();

    let view = service.get_job(accepted.job_id).await.unwrap();
    assert_eq!(view.status, JobStatus::Failed);
    assert!(view.error.is_some());

    let (retried, submission) = service.retry_job(accepted.job_id).await.unwrap();
    assert_eq!(retried.job_id, accepted.job_id);
    assert_eq!(retried.status, JobStatus::Processing);
    submission.wait().await.unwrap();
}
