//! Configuration types for speaker-note generation.
//!
//! Every knob lives in [`NotesConfig`], built via its [`NotesConfigBuilder`].
//! The same config is handed to the single-file engine and the batch engine
//! through [`crate::session::Session`]; nothing reads ambient globals.

use crate::error::NotesError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Configuration for a notes run.
///
/// # Example
/// ```rust
/// use edgequake_slide_notes::NotesConfig;
///
/// let config = NotesConfig::builder()
///     .dpi(150)
///     .model("gpt-4.1-mini")
///     .context_char_budget(1500)
///     .build()
///     .unwrap();
/// assert_eq!(config.context_char_budget, 1500);
/// ```
#[derive(Clone)]
pub struct NotesConfig {
    /// Rendering DPI used when rasterising each slide. Range: 72–400. Default: 150.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2000.
    ///
    /// Caps memory for oversized pages independently of DPI.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted decks.
    pub password: Option<String>,

    /// LLM model identifier. If None, the provider default is used.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.3.
    ///
    /// Narration benefits from a little variety, unlike transcription.
    pub temperature: f32,

    /// Maximum tokens generated per slide. Default: 4000.
    pub max_tokens: usize,

    /// Retry attempts on a failed LLM call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Send the rendered slide image to the model. Default: true.
    ///
    /// Turn off for text-only models; the analyzer then reports
    /// `supports_vision() == false` and images are never attached.
    pub vision: bool,

    /// Character budget for the rolling context passed to each slide. Default: 2000.
    pub context_char_budget: usize,

    /// How many recent slide summaries the context window retains. Default: 5.
    pub context_window_slides: usize,

    /// Optional observer for per-file and per-slide events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            max_rendered_pixels: 2000,
            password: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.3,
            max_tokens: 4000,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            vision: true,
            context_char_budget: 2000,
            context_window_slides: 5,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for NotesConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotesConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("vision", &self.vision)
            .field("context_char_budget", &self.context_char_budget)
            .field("context_window_slides", &self.context_window_slides)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ProgressObserver>"),
            )
            .finish()
    }
}

/// The subset of settings that changes what the model is asked to produce.
#[derive(Serialize)]
struct GenerationFingerprint<'a> {
    model: Option<&'a str>,
    provider: Option<&'a str>,
    temperature: f32,
    max_tokens: usize,
    vision: bool,
    context_char_budget: usize,
    context_window_slides: usize,
}

impl NotesConfig {
    /// Create a new builder for `NotesConfig`.
    pub fn builder() -> NotesConfigBuilder {
        NotesConfigBuilder {
            config: Self::default(),
        }
    }

    /// Stable digest of the generation-relevant settings.
    ///
    /// Stored in each checkpoint so a resumed run can tell whether it is
    /// continuing with different settings than the slides already written.
    pub fn fingerprint(&self) -> String {
        let fp = GenerationFingerprint {
            model: self.model.as_deref(),
            provider: self.provider_name.as_deref(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            vision: self.vision,
            context_char_budget: self.context_char_budget,
            context_window_slides: self.context_window_slides,
        };
        // Serialising a plain struct of scalars cannot fail.
        let json = serde_json::to_vec(&fp).unwrap_or_default();
        short_digest(&json)
    }
}

/// First 16 hex characters of the SHA-256 of `bytes`.
pub fn short_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let hex = format!("{:x}", digest);
    hex[..16].to_string()
}

/// Builder for [`NotesConfig`].
#[derive(Debug)]
pub struct NotesConfigBuilder {
    config: NotesConfig,
}

impl NotesConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

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

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(10);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms.min(60_000);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn vision(mut self, v: bool) -> Self {
        self.config.vision = v;
        self
    }

    pub fn context_char_budget(mut self, chars: usize) -> Self {
        self.config.context_char_budget = chars;
        self
    }

    pub fn context_window_slides(mut self, n: usize) -> Self {
        self.config.context_window_slides = n;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<NotesConfig, NotesError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(NotesError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.max_tokens == 0 {
            return Err(NotesError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(NotesError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.context_window_slides == 0 {
            return Err(NotesError::InvalidConfig(
                "Context window must hold at least one slide".into(),
            ));
        }
        Ok(self.config)
    }
}

/// How batch outputs are named: `{stem}{suffix}{extension}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputNaming {
    pub suffix: String,
    pub extension: String,
}

impl Default for OutputNaming {
    fn default() -> Self {
        Self {
            suffix: "_summary".to_string(),
            extension: ".md".to_string(),
        }
    }
}

impl OutputNaming {
    pub fn new(suffix: impl Into<String>, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        // Accept "md" as well as ".md".
        let extension = if extension.is_empty() || extension.starts_with('.') {
            extension
        } else {
            format!(".{extension}")
        };
        Self {
            suffix: suffix.into(),
            extension,
        }
    }

    /// Output file name for an input with the given stem.
    pub fn file_name(&self, stem: &str) -> String {
        format!("{}{}{}", stem, self.suffix, self.extension)
    }

    /// Human-readable naming pattern, e.g. `{stem}_summary.md`.
    pub fn pattern(&self) -> String {
        format!("{{stem}}{}{}", self.suffix, self.extension)
    }
}
