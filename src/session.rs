//! Explicit run context.
//!
//! A [`Session`] bundles everything the engines need: the resolved
//! configuration, the extractor, the analysis backend and the shutdown
//! signal. It is built once by the caller and passed down; nothing in the
//! library reads global state.

use crate::analyzer::{PlaceholderAnalyzer, SlideAnalyzer};
use crate::config::NotesConfig;
use crate::error::NotesError;
use crate::pipeline::extract::{PdfiumExtractor, SlideExtractor};
use crate::pipeline::llm::LlmAnalyzer;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::shutdown::ShutdownSignal;
use std::sync::Arc;

#[derive(Clone)]
pub struct Session {
    config: NotesConfig,
    extractor: Arc<dyn SlideExtractor>,
    analyzer: Arc<dyn SlideAnalyzer>,
    shutdown: ShutdownSignal,
}

impl Session {
    pub fn new(config: NotesConfig, extractor: Arc<dyn SlideExtractor>, analyzer: Arc<dyn SlideAnalyzer>) -> Self {
        Self {
            config,
            extractor,
            analyzer,
            shutdown: ShutdownSignal::never(),
        }
    }

    /// pdfium extraction and placeholder notes; no provider is needed.
    pub fn placeholder(config: NotesConfig) -> Self {
        let extractor = Arc::new(PdfiumExtractor::from_config(&config));
        Self::new(config, extractor, Arc::new(PlaceholderAnalyzer))
    }

    /// pdfium extraction and an LLM backend resolved from `config` and the
    /// environment.
    pub fn with_llm(config: NotesConfig) -> Result<Self, NotesError> {
        let analyzer = LlmAnalyzer::from_config(&config)?;
        let extractor = Arc::new(PdfiumExtractor::from_config(&config));
        Ok(Self::new(config, extractor, Arc::new(analyzer)))
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Same session with a different progress callback.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &NotesConfig {
        &self.config
    }

    pub fn extractor(&self) -> &dyn SlideExtractor {
        self.extractor.as_ref()
    }

    pub fn analyzer(&self) -> &dyn SlideAnalyzer {
        self.analyzer.as_ref()
    }

    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// The configured progress callback, or a no-op.
    pub fn progress(&self) -> ProgressCallback {
        self.config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("analyzer", &self.analyzer.describe())
            .field("shutdown", &self.shutdown)
            .finish()
    }
}
