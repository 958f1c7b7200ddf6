//! Single-file engine: one deck in, one notes document out.
//!
//! ## Resumability
//!
//! Every slide is appended to the output document and checkpointed before
//! the next one starts. A rerun asks the [`CheckpointStore`] where to start,
//! reads back what is already on disk as the document prefix and rebuilds
//! the rolling context from it, so the finished document is the same as an
//! uninterrupted run would have produced.
//!
//! ## Failure
//!
//! Any slide failure aborts the file. The failed slide is recorded in the
//! checkpoint; everything before it stays on disk for the next run.

use crate::analyzer::AnalysisRequest;
use crate::checkpoint::{CheckpointStore, ProcessingMode, ProcessingState};
use crate::context::ContextWindow;
use crate::error::NotesError;
use crate::notes;
use crate::persist;
use crate::pipeline::extract::SlideUnit;
use crate::pipeline::input;
use crate::session::Session;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, info_span, warn, Instrument};

const PARTIAL_PREFIX: &str = ".slide_notes_partial_";

/// Result of one completed file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub source: PathBuf,
    pub output_path: PathBuf,
    pub document: String,
    pub total_slides: usize,
    /// First slide generated in this run; 1 unless the run resumed.
    pub start_slide: usize,
}

impl FileOutcome {
    pub fn resumed(&self) -> bool {
        self.start_slide > 1
    }
}

/// Drives one file at a time through extraction, analysis and checkpointing.
#[derive(Debug, Clone)]
pub struct SlideNotesEngine {
    session: Session,
}

impl SlideNotesEngine {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Generate notes for `source`, streaming slides into `artifact`.
    ///
    /// Resumes automatically when `artifact` has a valid checkpoint. On
    /// success `artifact` holds the complete document and the checkpoint is
    /// gone.
    pub async fn process_file(
        &self,
        source: &Path,
        artifact: &Path,
        prompt: &str,
        mode: ProcessingMode,
    ) -> Result<FileOutcome, NotesError> {
        let span = info_span!("file", file = %display_name(source));
        self.run_file(source, artifact, prompt, mode).instrument(span).await
    }

    /// Forget any progress for `artifact`: checkpoint and partial output.
    pub fn clean_start(&self, source: &Path, artifact: &Path) {
        CheckpointStore::new(source, artifact, ProcessingMode::Single).reset();
    }

    async fn run_file(
        &self,
        source: &Path,
        artifact: &Path,
        prompt: &str,
        mode: ProcessingMode,
    ) -> Result<FileOutcome, NotesError> {
        let config = self.session.config();
        let progress = self.session.progress();
        let analyzer = self.session.analyzer();
        let shutdown = self.session.shutdown();

        input::validate_pdf(source)?;

        // ── Step 1: Extract every slide up front ─────────────────────────────
        let slides = self.session.extractor().extract(source).await?;
        let total = slides.len();
        if total == 0 {
            return Err(NotesError::ExtractionFailed {
                path: source.to_path_buf(),
                detail: "document has no pages".into(),
            });
        }

        // ── Step 2: Decide where to start ────────────────────────────────────
        let prompt_checksum = input::prompt_checksum(prompt);
        let config_checksum = config.fingerprint();
        let store = CheckpointStore::new(source, artifact, mode)
            .with_checksums(prompt_checksum.as_str(), config_checksum.as_str());

        let mut start = 1;
        if store.has_incomplete_work() {
            let (next, state) = store.resume_point();
            warn_on_checksum_mismatch(&state, &prompt_checksum, &config_checksum);
            start = next;
        } else {
            store.reset();
        }
        if start > total + 1 {
            warn!(
                start,
                total, "Checkpoint is ahead of the document; starting over"
            );
            store.reset();
            start = 1;
        }
        store.begin(total);

        // ── Step 3: Load the prefix already on disk ──────────────────────────
        let mut document = String::new();
        if start > 1 {
            match fs::read_to_string(artifact) {
                Ok(prefix) => document = prefix,
                Err(e) => {
                    warn!("Cannot read partial output {}: {e}; starting over", artifact.display());
                    store.reset();
                    store.begin(total);
                    start = 1;
                }
            }
        }
        if start > 1 {
            info!("Resuming at slide {}/{}", start, total);
        } else {
            info!("Processing {} slides", total);
        }

        let mut window = ContextWindow::new(config.context_window_slides, config.context_char_budget);
        rebuild_context(&mut window, &document, &slides, start, config.context_window_slides);

        progress.on_file_start(source, total, start);

        // ── Step 4: One slide at a time ──────────────────────────────────────
        let send_images = analyzer.supports_vision();
        let placeholder = analyzer.is_placeholder();

        for unit in slides.iter().skip(start - 1) {
            let index = unit.index;
            if shutdown.is_triggered() {
                return Err(NotesError::Interrupted { slide: index });
            }
            progress.on_slide_start(index, total);

            let context = window.build();
            let request = AnalysisRequest {
                index,
                text: &unit.text,
                prompt,
                context: &context,
                image: unit.image.as_ref().filter(|_| send_images),
                visual_elements: unit.visual_elements,
            };

            let result = tokio::select! {
                biased;
                r = analyzer.analyze(request) => r,
                _ = shutdown.triggered() => {
                    info!(slide = index, "Interrupted while generating");
                    return Err(NotesError::Interrupted { slide: index });
                }
            };

            let generated = match result {
                Ok(text) => text,
                Err(e) => {
                    let msg = e.to_string();
                    store.record_slide_error(index, &msg);
                    progress.on_slide_error(index, total, &msg);
                    return Err(NotesError::Generation { slide: index, source: e });
                }
            };

            if let Err(reason) = notes::validate_generated(&generated, placeholder) {
                store.record_slide_error(index, &reason);
                progress.on_slide_error(index, total, &reason);
                return Err(NotesError::ValidationFailed { slide: index, reason });
            }

            if unit.has_visuals() && !notes::mentions_visuals(&generated) {
                warn!(
                    slide = index,
                    visuals = unit.visual_elements,
                    "Notes do not describe the slide's visual elements"
                );
            }

            let block = notes::format_slide_block(&generated, index);
            window.push(index, &unit.text, &block);
            store.checkpoint_slide(index, &block)?;
            document.push_str(&block);

            progress.on_slide_complete(index, total, generated.chars().count());
        }

        // ── Step 5: Whole-document checks and final write ────────────────────
        let found = notes::count_slide_markers(&document);
        if found != total {
            return Err(NotesError::IncompleteDocument {
                path: artifact.to_path_buf(),
                found,
                expected: total,
            });
        }

        let floor = if placeholder {
            notes::MIN_AVG_CHARS_PLACEHOLDER
        } else {
            notes::MIN_AVG_CHARS_GENERATED
        };
        let average = document.chars().count() / total;
        if average < floor {
            warn!(average, floor, "Notes are shorter than expected");
        }

        persist::write_atomic(artifact, document.as_bytes()).map_err(|source| {
            NotesError::OutputWriteFailed {
                path: artifact.to_path_buf(),
                source,
            }
        })?;
        store.cleanup();
        progress.on_file_complete(source, total);
        info!("Wrote {} slides to {}", total, artifact.display());

        Ok(FileOutcome {
            source: source.to_path_buf(),
            output_path: artifact.to_path_buf(),
            document,
            total_slides: total,
            start_slide: start,
        })
    }

    /// Process several inputs into one combined document.
    ///
    /// A single input with an `output` path streams straight into it.
    /// Otherwise each input streams into its own partial file next to
    /// `output` (or in the working directory), the combined document is
    /// written to `output` when given, and the partial files are removed.
    /// With more than one input each section starts with `# Notes for <name>`.
    pub async fn process_inputs(
        &self,
        inputs: &[PathBuf],
        output: Option<&Path>,
        prompt: &str,
    ) -> Result<String, NotesError> {
        if let ([source], Some(out)) = (inputs, output) {
            let outcome = self.process_file(source, out, prompt, ProcessingMode::Single).await?;
            return Ok(outcome.document);
        }

        let partials = Self::streaming_paths(inputs, output);
        let mut sections = Vec::with_capacity(inputs.len());
        for (source, partial) in inputs.iter().zip(&partials) {
            let outcome = self
                .process_file(source, partial, prompt, ProcessingMode::Single)
                .await?;
            sections.push((display_name(source), outcome.document));
        }

        let combined = if sections.len() == 1 {
            sections.remove(0).1
        } else {
            sections
                .iter()
                .map(|(name, doc)| format!("# Notes for {name}\n\n{doc}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        if let Some(out) = output {
            persist::write_atomic(out, combined.as_bytes()).map_err(|source| {
                NotesError::OutputWriteFailed {
                    path: out.to_path_buf(),
                    source,
                }
            })?;
            info!("Wrote combined notes to {}", out.display());
        }
        for partial in &partials {
            if let Err(e) = persist::remove_if_exists(partial) {
                warn!("Failed to remove {}: {e}", partial.display());
            }
        }
        Ok(combined)
    }

    /// Where [`Self::process_inputs`] streams each input, in input order.
    ///
    /// A single input with an output file streams straight into it; every
    /// other case gets one partial file per input position.
    pub fn streaming_paths(inputs: &[PathBuf], output: Option<&Path>) -> Vec<PathBuf> {
        if let ([_], Some(out)) = (inputs, output) {
            return vec![out.to_path_buf()];
        }
        let dir = output
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        inputs
            .iter()
            .enumerate()
            .map(|(i, source)| partial_path_for(dir, i + 1, source))
            .collect()
    }
}

/// Hidden partial file for the `position`-th input of a multi-input run.
///
/// The position keeps inputs that share a file stem apart.
pub fn partial_path_for(dir: &Path, position: usize, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    dir.join(format!("{PARTIAL_PREFIX}{position}_{stem}.md"))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn warn_on_checksum_mismatch(state: &ProcessingState, prompt: &str, config: &str) {
    if !state.prompt_checksum.is_empty() && state.prompt_checksum != prompt {
        warn!("Prompt changed since this file was started; earlier slides used the old prompt");
    }
    if !state.config_checksum.is_empty() && state.config_checksum != config {
        warn!("Generation settings changed since this file was started");
    }
}

/// Refill `window` with the blocks already in `document`, as if slides
/// `1..start` had just been generated.
fn rebuild_context(window: &mut ContextWindow, document: &str, slides: &[SlideUnit], start: usize, capacity: usize) {
    if start <= 1 {
        return;
    }
    let first = start.saturating_sub(capacity).max(1);
    let mut from = if first == 1 {
        Some(0)
    } else {
        notes::block_end_offset(document, first - 1)
    };
    for index in first..start {
        let Some(begin) = from else {
            return;
        };
        let Some(end) = notes::block_end_offset(document, index) else {
            return;
        };
        if let (Some(block), Some(unit)) = (document.get(begin..end), slides.get(index - 1)) {
            window.push(index, &unit.text, block);
        }
        from = Some(end);
    }
}
