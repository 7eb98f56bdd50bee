//! Configuration types for menu digitisation.
//!
//! All pipeline behaviour is controlled through [`DigitizerConfig`], built via
//! its [`DigitizerConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share a config between the orchestrator, the adapters and the
//! CLI, and to log exactly what a run used.

use crate::error::DigitizerError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Photo assigned to dishes whose image lookup failed or found nothing.
pub const DEFAULT_PLACEHOLDER_PHOTO_URL: &str =
    "https://images.unsplash.com/photo-1546069901-ba9599a7e63c?w=800&q=80";

/// Upper bound for [`DigitizerConfig::estimated_processing_secs`] (one day).
pub const MAX_ESTIMATED_PROCESSING_SECS: u64 = 24 * 60 * 60;

/// Configuration for the digitisation pipeline.
///
/// Built via [`DigitizerConfig::builder()`] or using
/// [`DigitizerConfig::default()`].
///
/// # Example
/// ```rust
/// use menu_digitizer::DigitizerConfig;
///
/// let config = DigitizerConfig::builder()
///     .enrichment_concurrency(3)
///     .default_currency("USD")
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct DigitizerConfig {
    /// LLM model identifier, e.g. "gpt-4.1-nano". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for structuring and OCR calls. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per call. Default: 8192.
    ///
    /// A long menu with bilingual fields, ingredients and nutrition runs to
    /// several thousand output tokens; truncation yields unparseable JSON.
    pub max_tokens: usize,

    /// Total LLM attempts per structuring call, first try included. Default: 3.
    pub max_attempts: u32,

    /// Backoff before the second attempt in milliseconds; doubles each time. Default: 500.
    pub retry_backoff_ms: u64,

    /// Fixed pause before re-asking the LLM after an unparseable answer. Default: 300.
    pub parse_retry_delay_ms: u64,

    /// Maximum simultaneous image-search calls during enrichment. Default: 5.
    ///
    /// This protects the image provider's quota, not throughput.
    pub enrichment_concurrency: usize,

    /// Per-lookup image-search timeout in seconds. Default: 5.
    pub image_search_timeout_secs: u64,

    /// Photo assigned when a lookup fails or finds nothing.
    pub placeholder_photo_url: String,

    /// Currency used when the model gives none. Default: "ETB".
    pub default_currency: String,

    /// Minutes used when the model gives no (or a non-positive) preparation time. Default: 15.
    pub default_preparation_time: u32,

    /// Advertised processing time for new and retried jobs in seconds.
    /// Default: 120. At most [`MAX_ESTIMATED_PROCESSING_SECS`].
    pub estimated_processing_secs: u64,

    /// Largest accepted upload in bytes. Default: 10 MiB.
    pub max_upload_bytes: usize,

    /// Download timeout when the extractor fetches a remote image, in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Custom structuring prompt template. Must contain `{menu_text}`.
    /// If None, uses the built-in prompt.
    pub structuring_prompt: Option<String>,

    /// Optional per-job progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DigitizerConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 8192,
            max_attempts: 3,
            retry_backoff_ms: 500,
            parse_retry_delay_ms: 300,
            enrichment_concurrency: 5,
            image_search_timeout_secs: 5,
            placeholder_photo_url: DEFAULT_PLACEHOLDER_PHOTO_URL.to_string(),
            default_currency: "ETB".to_string(),
            default_preparation_time: 15,
            estimated_processing_secs: 120,
            max_upload_bytes: 10 * 1024 * 1024,
            download_timeout_secs: 60,
            structuring_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DigitizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigitizerConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("parse_retry_delay_ms", &self.parse_retry_delay_ms)
            .field("enrichment_concurrency", &self.enrichment_concurrency)
            .field("image_search_timeout_secs", &self.image_search_timeout_secs)
            .field("default_currency", &self.default_currency)
            .field("default_preparation_time", &self.default_preparation_time)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn JobProgressCallback>"),
            )
            .finish()
    }
}

impl DigitizerConfig {
    /// Create a new builder for `DigitizerConfig`.
    pub fn builder() -> DigitizerConfigBuilder {
        DigitizerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`DigitizerConfig`].
#[derive(Debug)]
pub struct DigitizerConfigBuilder {
    config: DigitizerConfig,
}

impl DigitizerConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn parse_retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.parse_retry_delay_ms = ms;
        self
    }

    pub fn enrichment_concurrency(mut self, n: usize) -> Self {
        self.config.enrichment_concurrency = n.max(1);
        self
    }

    pub fn image_search_timeout_secs(mut self, secs: u64) -> Self {
        self.config.image_search_timeout_secs = secs.max(1);
        self
    }

    pub fn placeholder_photo_url(mut self, url: impl Into<String>) -> Self {
        self.config.placeholder_photo_url = url.into();
        self
    }

    pub fn default_currency(mut self, currency: impl Into<String>) -> Self {
        self.config.default_currency = currency.into();
        self
    }

    pub fn default_preparation_time(mut self, minutes: u32) -> Self {
        self.config.default_preparation_time = minutes.clamp(1, 60);
        self
    }

    pub fn estimated_processing_secs(mut self, secs: u64) -> Self {
        self.config.estimated_processing_secs = secs;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn structuring_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.structuring_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DigitizerConfig, DigitizerError> {
        let c = &self.config;
        if c.placeholder_photo_url.trim().is_empty() {
            return Err(DigitizerError::InvalidConfig(
                "placeholder photo URL must not be empty".into(),
            ));
        }
        if c.default_currency.trim().is_empty() {
            return Err(DigitizerError::InvalidConfig(
                "default currency must not be empty".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(DigitizerError::InvalidConfig(
                "max upload size must be ≥ 1 byte".into(),
            ));
        }
        if c.estimated_processing_secs > MAX_ESTIMATED_PROCESSING_SECS {
            return Err(DigitizerError::InvalidConfig(format!(
                "estimated processing time must be ≤ {} seconds, got {}",
                MAX_ESTIMATED_PROCESSING_SECS, c.estimated_processing_secs
            )));
        }
        if let Some(ref p) = c.structuring_prompt {
            if !p.contains(crate::prompts::MENU_TEXT_PLACEHOLDER) {
                return Err(DigitizerError::InvalidConfig(format!(
                    "custom structuring prompt must contain {}",
                    crate::prompts::MENU_TEXT_PLACEHOLDER
                )));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_contract() {
        let c = DigitizerConfig::default();
        assert_eq!(c.max_attempts, 3);
        assert_eq!(c.retry_backoff_ms, 500);
        assert_eq!(c.parse_retry_delay_ms, 300);
        assert_eq!(c.enrichment_concurrency, 5);
        assert_eq!(c.default_currency, "ETB");
        assert_eq!(c.default_preparation_time, 15);
    }

    #[test]
    fn builder_clamps_values() {
        let c = DigitizerConfig::builder()
            .max_attempts(0)
            .enrichment_concurrency(0)
            .default_preparation_time(500)
            .temperature(9.0)
            .build()
            .unwrap();
        assert_eq!(c.max_attempts, 1);
        assert_eq!(c.enrichment_concurrency, 1);
        assert_eq!(c.default_preparation_time, 60);
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn custom_prompt_requires_placeholder() {
        let err = DigitizerConfig::builder()
            .structuring_prompt("Structure this menu please")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("{menu_text}"), "got: {err}");

        DigitizerConfig::builder()
            .structuring_prompt("Menu:\n{menu_text}")
            .build()
            .expect("placeholder present");
    }

    #[test]
    fn empty_placeholder_rejected() {
        assert!(DigitizerConfig::builder()
            .placeholder_photo_url("  ")
            .build()
            .is_err());
    }

    #[test]
    fn oversized_processing_estimate_rejected() {
        let err = DigitizerConfig::builder()
            .estimated_processing_secs(u64::MAX)
            .build()
            .unwrap_err();
        assert!(matches!(err, DigitizerError::InvalidConfig(_)), "got: {err}");

        let c = DigitizerConfig::builder()
            .estimated_processing_secs(MAX_ESTIMATED_PROCESSING_SECS)
            .build()
            .unwrap();
        assert_eq!(c.estimated_processing_secs, MAX_ESTIMATED_PROCESSING_SECS);
    }

    #[test]
    fn debug_hides_provider() {
        let dbg = format!("{:?}", DigitizerConfig::default());
        assert!(dbg.contains("DigitizerConfig"));
        assert!(dbg.contains("max_attempts"));
    }
}
