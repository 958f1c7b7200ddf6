//! # edgequake-slide-notes
//!
//! Turn PDF slide decks into speaker notes with an LLM, one slide at a time,
//! and survive being stopped halfway.
//!
//! ## Why resumable?
//!
//! A 60-slide deck is 60 sequential model calls; a directory of decks is
//! hundreds. Rate limits, network drops and Ctrl-C are routine at that
//! length. Every finished slide is appended to the output and checkpointed
//! before the next one starts, and every file's status is kept in a batch
//! manifest, so a rerun continues where the last one stopped instead of
//! paying for the same slides twice.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     validate the PDF and the prompt file
//!  ├─ 2. Extract   text + visual count + page render via pdfium (spawn_blocking)
//!  ├─ 3. Resume    checkpoint decides the first slide, repairs the output
//!  ├─ 4. Analyze   one LLM call per slide with rolling context of earlier slides
//!  ├─ 5. Validate  five required sections per slide
//!  └─ 6. Append    block appended to the output, checkpoint rewritten
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_slide_notes::{NotesConfig, ProcessingMode, Session, SlideNotesEngine};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / ...
//!     let config = NotesConfig::builder().build()?;
//!     let engine = SlideNotesEngine::new(Session::with_llm(config)?);
//!     let outcome = engine
//!         .process_file(
//!             Path::new("deck.pdf"),
//!             Path::new("deck_summary.md"),
//!             "Write notes for a technical audience.",
//!             ProcessingMode::Single,
//!         )
//!         .await?;
//!     eprintln!("{} slides", outcome.total_slides);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `slide-notes` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyzer;
pub mod batch;
pub mod checkpoint;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod notes;
pub mod persist;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;
pub mod shutdown;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyzer::{AnalysisRequest, PlaceholderAnalyzer, SlideAnalyzer};
pub use batch::{BatchOptions, BatchProcessor, BatchReport, StatusReport};
pub use checkpoint::{CheckpointStore, ProcessingMode, ProcessingState, SlideCheckpoint};
pub use config::{NotesConfig, NotesConfigBuilder, OutputNaming};
pub use context::ContextWindow;
pub use engine::{FileOutcome, SlideNotesEngine};
pub use error::{AnalysisError, NotesError};
pub use manifest::{FileRecord, FileStatus, Manifest, RecordUpdate, StatusSummary};
pub use pipeline::extract::{PdfiumExtractor, SlideExtractor, SlideUnit};
pub use pipeline::llm::LlmAnalyzer;
pub use progress::{NoopProgressCallback, NotesProgressCallback, ProgressCallback};
pub use session::Session;
pub use shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};
