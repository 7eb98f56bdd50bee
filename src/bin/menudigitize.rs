//! CLI binary for menu-digitizer.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `DigitizerConfig`, runs one job to completion and prints the result.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use menu_digitizer::pipeline::input::is_url;
use menu_digitizer::{
    adapters, DigitizerConfig, JobId, JobProgressCallback, JobService, JobStage, JobStatus,
    ProgressCallback, Submission, Upload,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner that names the stage the job is in and logs a line per
/// finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Queued");
        bar.set_message("storing photo…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

fn stage_label(stage: JobStage) -> &'static str {
    match stage {
        JobStage::Extracting => "reading the menu photo",
        JobStage::Structuring => "structuring dishes",
        JobStage::Enriching => "finding dish photos",
        JobStage::Persisting => "saving menu",
    }
}

impl JobProgressCallback for CliProgressCallback {
    fn on_job_start(&self, _job_id: JobId, attempt: u32) {
        self.bar.set_prefix(if attempt > 1 { "Retrying" } else { "Digitising" });
    }

    fn on_stage_start(&self, _job_id: JobId, stage: JobStage) {
        self.bar.set_message(format!("{}…", stage_label(stage)));
    }

    fn on_stage_complete(&self, _job_id: JobId, stage: JobStage) {
        self.bar.println(format!("  {} {}", green("✓"), stage_label(stage)));
    }

    fn on_job_complete(&self, _job_id: JobId, item_count: usize) {
        self.bar.finish_and_clear();
        eprintln!("{} {} dishes digitised", green("✔"), bold(&item_count.to_string()));
    }

    fn on_job_failed(&self, _job_id: JobId, error: &str) {
        self.bar.finish_and_clear();
        let msg = match error.char_indices().nth(120) {
            Some((idx, _)) => format!("{}\u{2026}", &error[..idx]),
            None => error.to_string(),
        };
        eprintln!("{} {}", red("✘"), red(&msg));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Digitise a local photo, print the menu tree
  menudigitize menu.jpg

  # Full job view as JSON (same shape as the HTTP API)
  menudigitize --json menu.jpg > menu.json

  # Photo already hosted somewhere
  menudigitize https://cdn.example.com/menus/cafe.jpg

  # Use a specific model and real dish photos
  menudigitize --model gpt-4.1-mini --unsplash-key $UNSPLASH_ACCESS_KEY menu.jpg

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  UNSPLASH_ACCESS_KEY     Unsplash API access key for dish photos
"#;

/// Digitise photos of restaurant menus into structured bilingual menus.
#[derive(Parser, Debug)]
#[command(
    name = "menudigitize",
    version,
    about = "Digitise a photo of a restaurant menu into a structured bilingual menu",
    long_about = "Read a menu photo with a vision LLM, structure the dishes into tabs and \
categories with English and Amharic fields, attach dish photos and print the result. \
Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Menu photo: local file path or HTTP/HTTPS URL.
    image: String,

    /// Restaurant the menu belongs to.
    #[arg(long, env = "MENU_RESTAURANT_ID", default_value = "local")]
    restaurant: String,

    /// User submitting the job.
    #[arg(long, env = "MENU_USER_ID", default_value = "cli")]
    user: String,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Unsplash access key; without one every dish gets the placeholder photo.
    #[arg(long, env = "UNSPLASH_ACCESS_KEY", hide_env_values = true)]
    unsplash_key: Option<String>,

    /// Directory uploads are stored in.
    #[arg(long, env = "MENU_STORAGE_DIR", default_value = "uploads")]
    storage_dir: PathBuf,

    /// Concurrent photo lookups.
    #[arg(short, long, env = "MENU_CONCURRENCY", default_value_t = 5)]
    concurrency: usize,

    /// LLM attempts per structuring call.
    #[arg(long, env = "MENU_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Max LLM output tokens per call.
    #[arg(long, env = "MENU_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "MENU_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Currency for dishes listed without one.
    #[arg(long, env = "MENU_CURRENCY", default_value = "ETB")]
    currency: String,

    /// Path to a text file with a custom structuring prompt (must contain {menu_text}).
    #[arg(long, env = "MENU_STRUCTURING_PROMPT")]
    structuring_prompt: Option<PathBuf>,

    /// Output the job view as JSON instead of a menu tree.
    #[arg(long, env = "MENU_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "MENU_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MENU_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MENU_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "MENU_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides all the feedback that matters; keep library INFO
    // logs out of its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn JobProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;
    let service = adapters::local_service(config, &cli.storage_dir, cli.unsplash_key.as_deref())
        .context("Failed to set up the digitiser")?;

    // ── Submit and wait ──────────────────────────────────────────────────
    let submission = submit(&service, &cli).await?;
    let job_id = submission.job.id;
    submission.wait().await.context("Pipeline task failed")?;

    let view = service.get_job(job_id).await.context("Failed to load job")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&view).context("Failed to serialise job")?
        );
    }

    if view.status != JobStatus::Completed {
        bail!(
            "job {} {}: {}",
            job_id,
            view.status,
            view.error.as_deref().unwrap_or("no error recorded")
        );
    }

    if !cli.json {
        print_menu(&service, job_id).await?;
    }
    Ok(())
}

async fn submit(service: &JobService, cli: &Cli) -> Result<Submission> {
    if is_url(&cli.image) {
        return service
            .orchestrator()
            .create(&cli.restaurant, &cli.user, &cli.image)
            .await
            .context("Failed to create job");
    }

    let path = Path::new(&cli.image);
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let upload = Upload {
        filename: path.file_name().map(|n| n.to_string_lossy().into_owned()),
        content_type: None,
        bytes,
    };
    let (_accepted, submission) = service
        .create_job(&cli.restaurant, &cli.user, upload)
        .await
        .context("Failed to create job")?;
    Ok(submission)
}

async fn print_menu(service: &JobService, job_id: JobId) -> Result<()> {
    let job = service.orchestrator().get(job_id).await?;
    let Some(menu_id) = job.structured_menu_id else {
        bail!("job {} completed without a menu", job_id);
    };
    let Some(record) = service.orchestrator().menu(menu_id).await? else {
        bail!("menu {} not found", menu_id);
    };

    for tab in &record.menu.tabs {
        println!("{} {}", cyan("◆"), bold(&labelled(&tab.name, &tab.name_am)));
        for category in &tab.categories {
            println!("  {}", bold(&labelled(&category.name, &category.name_am)));
            for item in &category.items {
                println!(
                    "    • {}  {}  {}",
                    labelled(&item.name, &item.name_am),
                    green(&format!("{:.2} {}", item.price, item.currency)),
                    dim(&format!("{} min", item.preparation_time)),
                );
                if let Some(photo) = item.photos.first() {
                    println!("      {}", dim(photo));
                }
            }
        }
    }
    Ok(())
}

fn labelled(name: &str, name_am: &str) -> String {
    if name_am.is_empty() {
        name.to_string()
    } else {
        format!("{name} ({name_am})")
    }
}

/// Map CLI args to `DigitizerConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<DigitizerConfig> {
    let mut builder = DigitizerConfig::builder()
        .enrichment_concurrency(cli.concurrency)
        .max_attempts(cli.max_attempts)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .default_currency(cli.currency.clone())
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref path) = cli.structuring_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read structuring prompt from {:?}", path))?;
        builder = builder.structuring_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
