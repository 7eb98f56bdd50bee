//! [`TextExtractor`] that reads menu photos with a vision-capable LLM.
//!
//! ## Message Layout
//!
//! 1. **System message**: the transcription rules ([`OCR_SYSTEM_PROMPT`])
//! 2. **User message**: the photo as a base64 image attachment, empty text
//!
//! VLM APIs require at least one user turn to respond to; the image carries
//! all the actual content.

use crate::adapters::llm::completion_options;
use crate::config::DigitizerConfig;
use crate::error::PortError;
use crate::pipeline::{encode, input};
use crate::ports::{Extraction, TextExtractor};
use crate::prompts::OCR_SYSTEM_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub struct VisionTextExtractor {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    download_timeout_secs: u64,
}

impl VisionTextExtractor {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &DigitizerConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            download_timeout_secs: config.download_timeout_secs,
        }
    }
}

#[async_trait]
impl TextExtractor for VisionTextExtractor {
    async fn extract(&self, image_url: &str) -> Result<Extraction, PortError> {
        let start = Instant::now();
        let bytes = input::load_image(image_url, self.download_timeout_secs).await?;
        let image = encode::encode_image(&bytes)?;

        let messages = vec![
            ChatMessage::system(OCR_SYSTEM_PROMPT),
            ChatMessage::user_with_images("", vec![image]),
        ];
        let options = completion_options(self.temperature, self.max_tokens);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| PortError::Request(e.to_string()))?;
        debug!(
            "OCR call: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(Extraction::new(response.content.trim()))
    }
}
