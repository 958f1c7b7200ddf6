//! Batch engine: every PDF of a directory, tracked by the manifest.
//!
//! Files move `PENDING → IN_PROGRESS → COMPLETED | ERROR` and each
//! transition is written to the manifest before the next step starts. Only
//! `PENDING` files are queued; files left `IN_PROGRESS` or `ERROR` by an
//! earlier run wait until the caller re-queues them
//! ([`BatchOptions::retry_failed`]). A failing file is recorded and the run
//! moves on; an interruption stops the run where it is.
//!
//! Each file is handed to the [`SlideNotesEngine`], which keeps its own
//! checkpoint next to the output, so an interrupted file also resumes at
//! slide level once it is queued again.

use crate::checkpoint::{CheckpointStore, ProcessingMode};
use crate::config::OutputNaming;
use crate::engine::SlideNotesEngine;
use crate::error::NotesError;
use crate::manifest::{FileRecord, FileStatus, Manifest, RecordUpdate, StatusSummary};
use crate::pipeline::input;
use crate::progress::{NotesProgressCallback, ProgressCallback};
use crate::session::Session;
use chrono::Utc;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// How a directory run starts.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Delete the manifest and per-file checkpoints first.
    pub clean_start: bool,
    /// Move `ERROR` and `IN_PROGRESS` records back to `PENDING` first.
    pub retry_failed: bool,
    /// Command line recorded in the manifest header.
    pub command: String,
}

/// What a directory run did.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Files completed in this run.
    pub completed: Vec<String>,
    /// Files that failed in this run, with their error.
    pub errors: Vec<(String, String)>,
    /// Files already completed before this run started.
    pub previously_completed: usize,
    pub interrupted: bool,
    /// Manifest counts after the run.
    pub summary: StatusSummary,
}

impl BatchReport {
    /// True when the run was not interrupted and no file is in `ERROR`.
    pub fn success(&self) -> bool {
        !self.interrupted && self.summary.error == 0
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Batch summary")?;
        writeln!(f, "  Completed this run:   {}", self.completed.len())?;
        writeln!(f, "  Previously completed: {}", self.previously_completed)?;
        writeln!(f, "  Failed this run:      {}", self.errors.len())?;
        for status in FileStatus::ALL {
            let n = self.summary.count(status);
            if n > 0 {
                writeln!(f, "  {:<21} {}", format!("{status}:"), n)?;
            }
        }
        writeln!(f, "  Total files:          {}", self.summary.total)?;
        for (file, err) in &self.errors {
            writeln!(f, "  ✗ {file}: {err}")?;
        }
        Ok(())
    }
}

/// Snapshot printed by `dir --show-status`.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub pattern: String,
    pub has_manifest: bool,
    pub summary: StatusSummary,
    pub errors: Vec<FileRecord>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Input directory:  {}", self.input_dir.display())?;
        writeln!(f, "Output directory: {}", self.output_dir.display())?;
        writeln!(f, "Naming pattern:   {}", self.pattern)?;
        if !self.has_manifest {
            return writeln!(f, "No batch run recorded for this output directory.");
        }
        writeln!(
            f,
            "Progress:         {}/{} files ({:.1}%)",
            self.summary.completed,
            self.summary.total,
            self.summary.percent_complete()
        )?;
        for status in FileStatus::ALL {
            writeln!(f, "  {:<12} {}", format!("{status}:"), self.summary.count(status))?;
        }
        if !self.errors.is_empty() {
            writeln!(f, "Failed files:")?;
            for r in &self.errors {
                writeln!(
                    f,
                    "  ✗ {}: {}",
                    r.filename,
                    r.error_message.as_deref().unwrap_or("unknown error")
                )?;
            }
        }
        Ok(())
    }
}

/// Runs a directory through the single-file engine.
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    session: Session,
    manifest: Manifest,
}

impl BatchProcessor {
    pub fn new(session: Session, output_dir: impl Into<PathBuf>, naming: OutputNaming) -> Self {
        Self {
            session,
            manifest: Manifest::new(output_dir, naming),
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Forget every earlier run in this output directory. Outputs already
    /// written stay until their file is processed again.
    pub fn clean_start(&self) {
        for record in self.manifest.load() {
            CheckpointStore::new(&record.input_path, &record.output_path, ProcessingMode::Batch).cleanup();
        }
        self.manifest.cleanup();
    }

    pub fn status(&self, input_dir: &Path) -> StatusReport {
        StatusReport {
            input_dir: input_dir.to_path_buf(),
            output_dir: self.manifest.output_dir().to_path_buf(),
            pattern: self.manifest.naming().pattern(),
            has_manifest: self.manifest.exists(),
            summary: self.manifest.summary(),
            errors: self.manifest.by_status(FileStatus::Error),
        }
    }

    /// Process every queued PDF of `input_dir`.
    ///
    /// Per-file failures are recorded in the manifest and the report; only
    /// setup problems (no inputs, unwritable manifest) are returned as
    /// errors.
    pub async fn run(&self, input_dir: &Path, prompt: &str, options: &BatchOptions) -> Result<BatchReport, NotesError> {
        input::ensure_output_dir(self.manifest.output_dir())?;

        if options.clean_start {
            info!("Clean start requested; discarding earlier progress");
            self.clean_start();
        }

        // ── Step 1: Load or create the manifest ──────────────────────────────
        let records = self.manifest.load();
        if records.is_empty() {
            let pdfs = input::discover_pdfs(input_dir)?;
            if pdfs.is_empty() {
                return Err(NotesError::NoInputFiles {
                    path: input_dir.to_path_buf(),
                });
            }
            self.manifest.initialize(&pdfs, &options.command)?;
        } else {
            info!(files = records.len(), "Resuming batch from manifest");
            let changed = self.manifest.detect_changes(input_dir);
            if !changed.is_empty() {
                warn!(
                    "{} file(s) changed since the batch started and will not be reprocessed: {}",
                    changed.len(),
                    changed.join(", ")
                );
            }
        }

        if options.retry_failed {
            let n = self
                .manifest
                .reset_to_pending(&[FileStatus::Error, FileStatus::InProgress])?;
            if n > 0 {
                info!(files = n, "Re-queued failed and unfinished files");
            }
        }

        // ── Step 2: Work through the queue ───────────────────────────────────
        let queue = self.manifest.by_status(FileStatus::Pending);
        let mut report = BatchReport {
            previously_completed: self.manifest.summary().completed,
            ..Default::default()
        };
        let stuck = self.manifest.summary();
        if stuck.in_progress + stuck.error > 0 && !options.retry_failed {
            warn!(
                in_progress = stuck.in_progress,
                error = stuck.error,
                "Some files are not queued; rerun with --retry-failed to include them"
            );
        }
        if queue.is_empty() {
            info!("No pending files");
        }

        for (n, record) in queue.iter().enumerate() {
            if self.session.shutdown().is_triggered() {
                report.interrupted = true;
                break;
            }
            info!("[{}/{}] {}", n + 1, queue.len(), record.filename);

            self.manifest.update_status(
                &record.filename,
                FileStatus::InProgress,
                RecordUpdate {
                    start_time: Some(Utc::now()),
                    error_message: Some(None),
                    ..Default::default()
                },
            )?;

            let tracker: ProgressCallback = Arc::new(ManifestProgress {
                inner: self.session.progress(),
                manifest: self.manifest.clone(),
                filename: record.filename.clone(),
            });
            let engine = SlideNotesEngine::new(self.session.clone().with_progress(tracker));

            match engine
                .process_file(&record.input_path, &record.output_path, prompt, ProcessingMode::Batch)
                .await
            {
                Ok(outcome) => {
                    self.manifest.update_status(
                        &record.filename,
                        FileStatus::Completed,
                        RecordUpdate {
                            total_slides: Some(outcome.total_slides),
                            completed_slides: Some(outcome.total_slides),
                            completion_time: Some(Utc::now()),
                            error_message: Some(None),
                            ..Default::default()
                        },
                    )?;
                    info!(file = %record.filename, slides = outcome.total_slides, "Completed");
                    report.completed.push(record.filename.clone());
                }
                Err(e) if e.is_interrupt() => {
                    warn!(file = %record.filename, "Interrupted; file left in progress");
                    report.interrupted = true;
                    break;
                }
                Err(e) => {
                    let msg = e.to_string();
                    error!(file = %record.filename, "Failed: {msg}");
                    self.manifest.update_status(
                        &record.filename,
                        FileStatus::Error,
                        RecordUpdate {
                            completion_time: Some(Utc::now()),
                            error_message: Some(Some(msg.clone())),
                            ..Default::default()
                        },
                    )?;
                    report.errors.push((record.filename.clone(), msg));
                }
            }
        }

        report.summary = self.manifest.summary();
        Ok(report)
    }
}

/// Forwards progress events and records each file's slide count in the
/// manifest once extraction has found it.
struct ManifestProgress {
    inner: ProgressCallback,
    manifest: Manifest,
    filename: String,
}

impl NotesProgressCallback for ManifestProgress {
    fn on_file_start(&self, path: &Path, total: usize, start_slide: usize) {
        let update = RecordUpdate {
            total_slides: Some(total),
            completed_slides: Some(start_slide.saturating_sub(1)),
            ..Default::default()
        };
        if let Err(e) = self
            .manifest
            .update_status(&self.filename, FileStatus::InProgress, update)
        {
            warn!(file = %self.filename, "Could not record slide count: {e}");
        }
        self.inner.on_file_start(path, total, start_slide);
    }

    fn on_slide_start(&self, slide: usize, total: usize) {
        self.inner.on_slide_start(slide, total);
    }

    fn on_slide_complete(&self, slide: usize, total: usize, chars: usize) {
        self.inner.on_slide_complete(slide, total, chars);
    }

    fn on_slide_error(&self, slide: usize, total: usize, error: &str) {
        self.inner.on_slide_error(slide, total, error);
    }

    fn on_file_complete(&self, path: &Path, total: usize) {
        self.inner.on_file_complete(path, total);
    }
}
