//! Error types for the edgequake-slide-notes library.
//!
//! Two error types mirror the two layers that can fail:
//!
//! * [`NotesError`]: **Fatal** for the unit it escapes from: a whole run
//!   (bad configuration, unreadable prompt), or a single file (extraction
//!   failure, a slide whose generation failed). The batch engine catches it
//!   at the per-file boundary and records it in the manifest; the CLI maps
//!   it to an exit code.
//!
//! * [`AnalysisError`]: a failure inside the analysis backend (LLM call,
//!   timeout, empty answer). The single-file engine wraps it in
//!   [`NotesError::Generation`] after recording it against the slide.
//!
//! Durable-state *read* problems (corrupt checkpoint, unparsable manifest)
//! never surface here: they are logged and treated as "no state".

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors returned by the edgequake-slide-notes library.
#[derive(Debug, Error)]
pub enum NotesError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The path exists but is not a usable PDF input.
    #[error("Invalid input '{path}': {reason}")]
    InvalidInput { path: PathBuf, reason: String },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// Input directory is missing or not a directory.
    #[error("Input directory '{path}' is not usable: {reason}")]
    InvalidDirectory { path: PathBuf, reason: String },

    /// A directory run found nothing to process.
    #[error("No PDF files found in '{path}'")]
    NoInputFiles { path: PathBuf },

    /// The prompt file is missing, empty, or unreadable.
    #[error("Prompt file '{path}' is not usable: {reason}")]
    InvalidPrompt { path: PathBuf, reason: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The document opened but slide content could not be extracted.
    #[error("Failed to extract slides from '{path}': {detail}")]
    ExtractionFailed { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
If the auto-download failed, you can:\n\
  • Check your internet connection and try again.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Generation errors ─────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The analysis backend failed for a slide; the file is aborted.
    #[error("Slide {slide}: generation failed: {source}")]
    Generation {
        slide: usize,
        #[source]
        source: AnalysisError,
    },

    /// The backend answered but the notes are structurally incomplete.
    #[error("Slide {slide}: generated notes failed validation: {reason}")]
    ValidationFailed { slide: usize, reason: String },

    /// The assembled document does not contain one block per slide.
    #[error("Output for '{path}' contains {found} slide blocks, expected {expected}")]
    IncompleteDocument {
        path: PathBuf,
        found: usize,
        expected: usize,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create, append to, or replace an output document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The batch manifest could not be written.
    #[error("Failed to write state file '{path}': {source}")]
    StateWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Control flow ──────────────────────────────────────────────────────
    /// The operator interrupted the run. Everything checkpointed so far is
    /// kept; rerun with `--resume` to continue.
    #[error("Interrupted at slide {slide}; progress saved, rerun with --resume to continue")]
    Interrupted { slide: usize },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NotesError {
    /// True when the error is an operator interruption rather than a failure.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, NotesError::Interrupted { .. })
    }
}

/// A failure reported by an analysis backend for one slide.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalysisError {
    /// Every attempt failed; `detail` is the last error seen.
    #[error("LLM call failed after {attempts} attempt(s): {detail}")]
    Exhausted { attempts: u32, detail: String },

    /// A single call exceeded the configured timeout and no retries remain.
    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider returned an empty completion.
    #[error("LLM returned an empty response")]
    EmptyResponse,

    /// Non-retryable failure (rejected request, unusable provider).
    #[error("{0}")]
    Permanent(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupted_is_interrupt() {
        let e = NotesError::Interrupted { slide: 4 };
        assert!(e.is_interrupt());
        assert!(e.to_string().contains("--resume"));
        assert!(!NotesError::Internal("x".into()).is_interrupt());
    }

    #[test]
    fn generation_display_names_slide_and_cause() {
        let e = NotesError::Generation {
            slide: 7,
            source: AnalysisError::Exhausted {
                attempts: 4,
                detail: "HTTP 503".into(),
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("Slide 7"), "got: {msg}");
        assert!(msg.contains("HTTP 503"), "got: {msg}");
    }

    #[test]
    fn incomplete_document_display() {
        let e = NotesError::IncompleteDocument {
            path: PathBuf::from("deck.pdf"),
            found: 4,
            expected: 5,
        };
        let msg = e.to_string();
        assert!(msg.contains("4 slide blocks"));
        assert!(msg.contains("expected 5"));
    }

    #[test]
    fn timeout_display() {
        let e = AnalysisError::Timeout { secs: 30 };
        assert!(e.to_string().contains("30s"));
    }
}
