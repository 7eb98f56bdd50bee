//! Structuring engine: raw OCR text → [`Menu`].
//!
//! One prompt, one logical LLM call under [`RetryPolicy`], then parse and
//! assemble. An unparseable answer earns exactly one more logical call after
//! a short pause; a second unparseable answer fails the run. A partial menu
//! is never returned.

use crate::config::DigitizerConfig;
use crate::error::DigitizerError;
use crate::output::{FlatParsedItem, Menu};
use crate::pipeline::assemble::{assemble_menu, AssemblyDefaults};
use crate::pipeline::llm::{generate_with_retry, RetryPolicy};
use crate::pipeline::parse::parse_menu_items;
use crate::ports::LanguageModel;
use crate::prompts::structuring_prompt;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// A structured menu plus the LLM cost of producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredMenu {
    pub menu: Menu,
    /// Provider calls made, across the parse retry if one happened.
    pub llm_calls: u32,
}

pub async fn structure_menu(
    model: &dyn LanguageModel,
    raw_text: &str,
    config: &DigitizerConfig,
) -> Result<StructuredMenu, DigitizerError> {
    let prompt = structuring_prompt(config.structuring_prompt.as_deref(), raw_text);
    let policy = RetryPolicy::from_config(config);

    let first = generate_with_retry(model, &prompt, policy).await?;
    let mut llm_calls = first.attempts;

    let items: Vec<FlatParsedItem> = match parse_menu_items(&first.text) {
        Ok(items) => items,
        Err(e) => {
            warn!("Structuring response unparseable, asking again: {}", e);
            sleep(Duration::from_millis(config.parse_retry_delay_ms)).await;

            let second = generate_with_retry(model, &prompt, policy).await?;
            llm_calls += second.attempts;
            parse_menu_items(&second.text).map_err(|e| DigitizerError::StructuringTerminal {
                detail: e.to_string(),
            })?
        }
    };
    debug!("Parsed {} flat menu items", items.len());

    let menu = assemble_menu(&items, &AssemblyDefaults::from(config));
    if menu.item_count() == 0 {
        return Err(DigitizerError::StructuringTerminal {
            detail: "no menu items".to_string(),
        });
    }

    info!(
        "Structured {} items into {} tabs ({} LLM calls)",
        menu.item_count(),
        menu.tabs.len(),
        llm_calls
    );
    Ok(StructuredMenu { menu, llm_calls })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct ScriptedModel {
        script: Mutex<Vec<Result<String, PortError>>>,
        prompts: Mutex<Vec<String>>,
        calls: AtomicU32,
    }

    impl ScriptedModel {
        fn new(script: Vec<Result<String, PortError>>) -> Self {
            Self {
                script: Mutex::new(script),
                prompts: Mutex::new(Vec::new()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn generate(&self, prompt: &str) -> Result<String, PortError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            }
        }
    }

    fn config() -> DigitizerConfig {
        DigitizerConfig::builder()
            .retry_backoff_ms(1)
            .parse_retry_delay_ms(1)
            .build()
            .unwrap()
    }

    const GOOD: &str = r#"{"menuItems":[{"name":"Doro Wot","price":150},{"name":"Shiro","price":90}]}"#;

    #[tokio::test]
    async fn happy_path_embeds_text_in_prompt() {
        let model = ScriptedModel::new(vec![Ok(GOOD.into())]);
        let out = structure_menu(&model, "Doro Wot 150 ETB\nShiro 90 ETB", &config())
            .await
            .unwrap();
        assert_eq!(out.menu.item_count(), 2);
        assert_eq!(out.llm_calls, 1);
        assert!(model.prompts.lock().unwrap()[0].contains("Doro Wot 150 ETB\nShiro 90 ETB"));
    }

    #[tokio::test]
    async fn one_parse_failure_is_retried() {
        let model = ScriptedModel::new(vec![Ok("Sorry, I cannot help".into()), Ok(GOOD.into())]);
        let out = structure_menu(&model, "menu", &config()).await.unwrap();
        assert_eq!(out.menu.item_count(), 2);
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_parse_failure_is_terminal() {
        let model = ScriptedModel::new(vec![Ok("not json".into())]);
        let err = structure_menu(&model, "menu", &config()).await.unwrap_err();
        assert!(matches!(err, DigitizerError::StructuringTerminal { .. }), "got {err:?}");
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_items_is_terminal() {
        let model = ScriptedModel::new(vec![Ok(r#"{"menuItems":[{"name":""}]}"#.into())]);
        let err = structure_menu(&model, "menu", &config()).await.unwrap_err();
        assert!(err.to_string().contains("no menu items"), "got {err}");
    }

    #[tokio::test]
    async fn transient_errors_then_success() {
        let model = ScriptedModel::new(vec![
            Err(PortError::Request("503 Service Unavailable".into())),
            Err(PortError::Request("503 Service Unavailable".into())),
            Ok(GOOD.into()),
        ]);
        let out = structure_menu(&model, "menu", &config()).await.unwrap();
        assert_eq!(out.llm_calls, 3);
    }
}
