//! Analysis backends: one slide in, notes text out.
//!
//! The engine only sees [`SlideAnalyzer`]. Capabilities are asked of the
//! implementation instead of being guessed from a provider or model name:
//! [`SlideAnalyzer::supports_vision`] decides whether page images are sent,
//! [`SlideAnalyzer::is_placeholder`] selects the relaxed validation rules.
//!
//! [`crate::pipeline::llm::LlmAnalyzer`] is the real backend;
//! [`PlaceholderAnalyzer`] produces stand-in notes without any model.

use crate::error::AnalysisError;
use crate::notes;
use edgequake_llm::ImageData;
use futures::future::BoxFuture;

/// Everything a backend gets for one slide.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    pub index: usize,
    pub text: &'a str,
    /// The user's prompt, verbatim.
    pub prompt: &'a str,
    /// Rolling summary of earlier slides; empty for the first slide.
    pub context: &'a str,
    /// Page rendering. Only set when the backend supports vision.
    pub image: Option<&'a ImageData>,
    pub visual_elements: usize,
}

/// A backend that writes notes for one slide at a time.
pub trait SlideAnalyzer: Send + Sync {
    fn analyze<'a>(&'a self, request: AnalysisRequest<'a>) -> BoxFuture<'a, Result<String, AnalysisError>>;

    fn supports_vision(&self) -> bool {
        false
    }

    /// True when the output is stand-in text rather than model output.
    fn is_placeholder(&self) -> bool {
        false
    }

    /// Short human-readable description for logs and the CLI banner.
    fn describe(&self) -> String;
}

/// Backend used with `--no-ai`: deterministic stand-in notes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderAnalyzer;

impl SlideAnalyzer for PlaceholderAnalyzer {
    fn analyze<'a>(&'a self, request: AnalysisRequest<'a>) -> BoxFuture<'a, Result<String, AnalysisError>> {
        let notes = notes::placeholder_notes(request.index, request.text, request.visual_elements);
        Box::pin(async move { Ok(notes) })
    }

    fn is_placeholder(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        "placeholder (no AI)".to_string()
    }
}
