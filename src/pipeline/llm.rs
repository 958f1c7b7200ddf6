//! LLM backend: build the chat request for one slide and call the provider.
//!
//! All prompt wording lives in [`crate::prompts`]; this module owns the
//! message layout, retries and timeouts.
//!
//! ## Retry Strategy
//!
//! Rate limits and 5xx responses are transient and common on long decks.
//! Every failure (including a timeout or an empty answer) is retried with
//! exponential backoff (`retry_backoff_ms * 2^(attempt-1)`): with a 500 ms
//! base and 3 retries the waits are 500 ms → 1 s → 2 s. Each attempt is
//! bounded by `api_timeout_secs`.
//!
//! The engine never retries; once this module gives up, the slide fails.

use crate::analyzer::{AnalysisRequest, SlideAnalyzer};
use crate::config::NotesConfig;
use crate::error::{AnalysisError, NotesError};
use crate::pipeline::postprocess::clean_markdown;
use crate::prompts;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Longest single wait between attempts.
const MAX_BACKOFF_MS: u64 = 60_000;

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// [`SlideAnalyzer`] backed by an `edgequake-llm` provider.
pub struct LlmAnalyzer {
    provider: Arc<dyn LLMProvider>,
    label: String,
    vision: bool,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
}

impl LlmAnalyzer {
    /// Wrap an already constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &NotesConfig) -> Self {
        let label = match (&config.provider_name, &config.model) {
            (Some(p), Some(m)) => format!("{p}/{m}"),
            (Some(p), None) => p.clone(),
            (None, Some(m)) => m.clone(),
            (None, None) => "auto-detected provider".to_string(),
        };
        Self {
            provider,
            label,
            vision: config.vision,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    /// Resolve a provider from `config` and the environment.
    pub fn from_config(config: &NotesConfig) -> Result<Self, NotesError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    /// Send a one-line probe; fails if the provider cannot answer at all.
    pub async fn check_connection(&self) -> Result<(), NotesError> {
        let messages = vec![ChatMessage::user(prompts::CONNECTION_PROBE)];
        let options = CompletionOptions {
            max_tokens: Some(8),
            ..Default::default()
        };
        let secs = self.api_timeout_secs;
        let res = timeout(Duration::from_secs(secs), self.provider.chat(&messages, Some(&options))).await;
        match res {
            Ok(Ok(_)) => {
                info!("LLM connection OK ({})", self.label);
                Ok(())
            }
            Ok(Err(e)) => Err(NotesError::ProviderNotConfigured {
                provider: self.label.clone(),
                hint: format!("Connection test failed: {e}"),
            }),
            Err(_) => Err(NotesError::ProviderNotConfigured {
                provider: self.label.clone(),
                hint: format!("Connection test timed out after {secs}s"),
            }),
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    async fn analyze_with_retry(&self, req: AnalysisRequest<'_>) -> Result<String, AnalysisError> {
        let messages = build_messages(&req, self.vision);
        let options = self.options();
        let start = Instant::now();
        let mut last_err = AnalysisError::EmptyResponse;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "Slide {}: retry {}/{} after {}ms",
                    req.index, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let call = self.provider.chat(&messages, Some(&options));
            match timeout(Duration::from_secs(self.api_timeout_secs), call).await {
                Ok(Ok(response)) => {
                    let notes = clean_markdown(&response.content);
                    if notes.trim().is_empty() {
                        warn!("Slide {}: attempt {} returned nothing", req.index, attempt + 1);
                        last_err = AnalysisError::EmptyResponse;
                        continue;
                    }
                    debug!(
                        "Slide {}: {} input tokens, {} output tokens, {:?}",
                        req.index,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(notes);
                }
                Ok(Err(e)) => {
                    warn!("Slide {}: attempt {} failed: {}", req.index, attempt + 1, e);
                    last_err = AnalysisError::Exhausted {
                        attempts: attempt + 1,
                        detail: e.to_string(),
                    };
                }
                Err(_) => {
                    warn!(
                        "Slide {}: attempt {} timed out after {}s",
                        req.index,
                        attempt + 1,
                        self.api_timeout_secs
                    );
                    last_err = AnalysisError::Timeout {
                        secs: self.api_timeout_secs,
                    };
                }
            }
        }

        Err(match last_err {
            AnalysisError::Exhausted { detail, .. } => AnalysisError::Exhausted {
                attempts: self.max_retries + 1,
                detail,
            },
            other => other,
        })
    }
}

impl SlideAnalyzer for LlmAnalyzer {
    fn analyze<'a>(&'a self, request: AnalysisRequest<'a>) -> BoxFuture<'a, Result<String, AnalysisError>> {
        Box::pin(self.analyze_with_retry(request))
    }

    fn supports_vision(&self) -> bool {
        self.vision
    }

    fn describe(&self) -> String {
        let mode = if self.vision { "vision" } else { "text-only" };
        format!("{} ({mode})", self.label)
    }
}

/// Message layout, in order:
/// 1. system: user prompt + section-format rules
/// 2. system: rolling context of earlier slides (omitted when empty)
/// 3. user: slide number and text, with the page image when vision is on
fn build_messages(req: &AnalysisRequest<'_>, vision: bool) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(prompts::system_prompt(req.prompt))];
    if !req.context.is_empty() {
        messages.push(ChatMessage::system(prompts::context_message(req.context)));
    }

    let image = req.image.filter(|_| vision);
    let text = prompts::slide_request(req.index, req.text, image.is_some());
    match image {
        Some(img) => messages.push(ChatMessage::user_with_images(text, vec![img.clone()])),
        None => messages.push(ChatMessage::user(text)),
    }
    messages
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, NotesError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        NotesError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_provider(config: &NotesConfig) -> Result<Arc<dyn LLMProvider>, NotesError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| NotesError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider, or run with --no-ai.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

/// Wait before retry number `attempt` (1-based), capped at
/// [`MAX_BACKOFF_MS`].
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    2u64.checked_pow(attempt.saturating_sub(1))
        .map_or(u64::MAX, |factor| base_ms.saturating_mul(factor))
        .min(MAX_BACKOFF_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_llm::ImageData;

    fn request<'a>(context: &'a str, image: Option<&'a ImageData>) -> AnalysisRequest<'a> {
        AnalysisRequest {
            index: 4,
            text: "Pricing tiers",
            prompt: "Write for a sales audience.",
            context,
            image,
            visual_elements: 1,
        }
    }

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 3), 2000);
        assert_eq!(backoff_ms(500, 70), MAX_BACKOFF_MS);
        assert_eq!(backoff_ms(u64::MAX, 2), MAX_BACKOFF_MS);
    }

    #[test]
    fn first_slide_has_no_context_message() {
        let messages = build_messages(&request("", None), true);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.starts_with("Write for a sales audience."));
        assert!(messages[1].content.contains("**Slide Number:** 4"));
        assert!(messages[1].content.contains("Pricing tiers"));
    }

    #[test]
    fn context_goes_in_its_own_system_message() {
        let messages = build_messages(&request("Slide 3: Intro...", None), true);
        assert_eq!(messages.len(), 3);
        assert!(messages[1].content.contains("Slide 3: Intro..."));
    }

    #[test]
    fn image_only_attached_with_vision() {
        let img = ImageData::new("aGVsbG8=", "image/png");
        let with = build_messages(&request("", Some(&img)), true);
        assert!(with[1].content.contains("attached as an image"));
        let without = build_messages(&request("", Some(&img)), false);
        assert!(!without[1].content.contains("attached as an image"));
    }
}
