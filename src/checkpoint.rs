//! Per-file checkpoint store.
//!
//! One JSON record per output document, kept as a hidden sibling of the
//! document (`.slide_notes_progress_<stem>.json`). It records which slides
//! are done and which of those passed structural validation, and from that
//! decides where a rerun starts.
//!
//! Ordering on every slide: the block is appended to the output document
//! first, then the state is rewritten with the document length after the
//! append. A crash between the two leaves an untracked tail on the document,
//! which [`CheckpointStore::resume_point`] cuts away.
//!
//! Read or parse problems with the record are logged and treated as "no
//! state": losing resumability is preferred over refusing to run.

use crate::error::NotesError;
use crate::notes;
use crate::persist;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

const STATE_PREFIX: &str = ".slide_notes_progress_";

/// Outcome of one slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideCheckpoint {
    pub slide_number: usize,
    pub completed: bool,
    pub character_count: usize,
    pub completion_time: Option<DateTime<Utc>>,
    pub is_validated: bool,
    pub error_message: Option<String>,
    /// Output document length right after this slide's block was appended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_offset: Option<u64>,
}

/// Which pipeline produced the state. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    Single,
    Batch,
}

/// Durable snapshot of one file's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingState {
    pub file_path: PathBuf,
    pub total_slides: usize,
    #[serde(default)]
    pub completed_slides: usize,
    pub slide_progress: Vec<SlideCheckpoint>,
    #[serde(default)]
    pub last_validated_slide: usize,
    #[serde(default)]
    pub output_path: PathBuf,
    pub start_time: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub processing_mode: ProcessingMode,
    #[serde(default)]
    pub prompt_checksum: String,
    #[serde(default)]
    pub config_checksum: String,
}

impl ProcessingState {
    /// Highest slide that is both completed and validated, 0 if none.
    pub fn last_safe_slide(&self) -> usize {
        self.slide_progress
            .iter()
            .filter(|s| s.completed && s.is_validated)
            .map(|s| s.slide_number)
            .max()
            .unwrap_or(0)
    }

    pub fn slide(&self, index: usize) -> Option<&SlideCheckpoint> {
        self.slide_progress.iter().find(|s| s.slide_number == index)
    }

    fn upsert(&mut self, checkpoint: SlideCheckpoint) {
        match self
            .slide_progress
            .iter_mut()
            .find(|s| s.slide_number == checkpoint.slide_number)
        {
            Some(existing) => *existing = checkpoint,
            None => {
                self.slide_progress.push(checkpoint);
                self.slide_progress.sort_by_key(|s| s.slide_number);
            }
        }
    }
}

/// Owner of one file's checkpoint record and its output document.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    source: PathBuf,
    artifact: PathBuf,
    state_path: PathBuf,
    mode: ProcessingMode,
    prompt_checksum: String,
    config_checksum: String,
}

impl CheckpointStore {
    /// `source` is the input PDF, `artifact` the document slides stream into.
    pub fn new(source: impl Into<PathBuf>, artifact: impl Into<PathBuf>, mode: ProcessingMode) -> Self {
        let artifact = artifact.into();
        Self {
            source: source.into(),
            state_path: Self::state_path_for(&artifact),
            artifact,
            mode,
            prompt_checksum: String::new(),
            config_checksum: String::new(),
        }
    }

    /// Checksums written into every record this store saves.
    pub fn with_checksums(mut self, prompt: impl Into<String>, config: impl Into<String>) -> Self {
        self.prompt_checksum = prompt.into();
        self.config_checksum = config.into();
        self
    }

    /// Where the record for `artifact` lives.
    pub fn state_path_for(artifact: &Path) -> PathBuf {
        let stem = artifact
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let name = format!("{STATE_PREFIX}{stem}.json");
        match artifact.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.join(name),
            _ => PathBuf::from(name),
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact
    }

    /// Read the record, or `None` when it is absent or unreadable.
    pub fn load(&self) -> Option<ProcessingState> {
        let raw = match fs::read_to_string(&self.state_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                error!(path = %self.state_path.display(), "Failed to read checkpoint: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(path = %self.state_path.display(), "Ignoring unreadable checkpoint: {e}");
                None
            }
        }
    }

    /// True when a structurally valid record exists, was written for this
    /// store's source, and that PDF is still on disk.
    pub fn has_incomplete_work(&self) -> bool {
        let Some(state) = self.load() else {
            return false;
        };
        if !state.file_path.exists() {
            warn!(
                source = %state.file_path.display(),
                "Checkpoint refers to a file that no longer exists; ignoring it"
            );
            return false;
        }
        if !same_file(&state.file_path, &self.source) {
            warn!(
                recorded = %state.file_path.display(),
                current = %self.source.display(),
                "Checkpoint belongs to another input; ignoring it"
            );
            return false;
        }
        true
    }

    /// Decide where processing restarts and make the output document agree.
    ///
    /// The resume point is one past the highest completed-and-validated
    /// slide. The document is cut back to the end of that slide's block so
    /// nothing from a later, untrusted slide survives. If that block cannot
    /// be located the run starts over from slide 1 with an empty document.
    pub fn resume_point(&self) -> (usize, ProcessingState) {
        let Some(state) = self.load() else {
            return (1, self.initial_state());
        };
        let last_safe = state.last_safe_slide();

        if state.completed_slides > last_safe {
            info!(
                completed = state.completed_slides,
                last_safe,
                "Slide {} was not validated; resuming from slide {}",
                state.completed_slides,
                last_safe + 1
            );
        }

        match self.truncate_artifact(&state, last_safe) {
            Ok(true) => (last_safe + 1, state),
            Ok(false) => {
                warn!(
                    artifact = %self.artifact.display(),
                    "Cannot locate slide {last_safe} in the output; starting over"
                );
                self.reset();
                (1, self.initial_state())
            }
            Err(e) => {
                error!(
                    artifact = %self.artifact.display(),
                    "Failed to repair output: {e}; starting over"
                );
                self.reset();
                (1, self.initial_state())
            }
        }
    }

    /// Cut the document back to the end of `last_safe`'s block.
    ///
    /// `Ok(false)` when the block is not in the document.
    fn truncate_artifact(&self, state: &ProcessingState, last_safe: usize) -> std::io::Result<bool> {
        if last_safe == 0 {
            if self.artifact.exists() {
                persist::write_atomic(&self.artifact, b"")?;
            }
            return Ok(true);
        }

        let content = match fs::read_to_string(&self.artifact) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        let by_offset = state
            .slide(last_safe)
            .and_then(|s| s.output_offset)
            .and_then(|o| usize::try_from(o).ok())
            .filter(|&o| {
                o <= content.len()
                    && content.is_char_boundary(o)
                    && notes::ends_with_block(&content[..o], last_safe)
            });

        let cut = match by_offset.or_else(|| notes::block_end_offset(&content, last_safe)) {
            Some(cut) => cut,
            None => return Ok(false),
        };

        if cut < content.len() {
            persist::write_atomic(&self.artifact, content[..cut].as_bytes())?;
            info!(
                removed = content.len() - cut,
                "Removed output written after slide {last_safe}"
            );
        }
        Ok(true)
    }

    /// Record a finished slide.
    ///
    /// Appends `block` (with a trailing separator when it lacks one) to the
    /// output document, then rewrites the record. `completed_slides` always
    /// advances; `last_validated_slide` only when the block carries every
    /// required section.
    pub fn checkpoint_slide(&self, index: usize, block: &str) -> Result<(), NotesError> {
        let validated = notes::has_all_sections(block);

        let offset = if block.ends_with(notes::SLIDE_SEPARATOR) {
            persist::append(&self.artifact, block)
        } else {
            persist::append(&self.artifact, &format!("{block}{}", notes::SLIDE_SEPARATOR))
        }
        .map_err(|source| NotesError::OutputWriteFailed {
            path: self.artifact.clone(),
            source,
        })?;

        let mut state = self.load().unwrap_or_else(|| self.initial_state());
        let now = Utc::now();
        state.upsert(SlideCheckpoint {
            slide_number: index,
            completed: true,
            character_count: block.chars().count(),
            completion_time: Some(now),
            is_validated: validated,
            error_message: None,
            output_offset: Some(offset),
        });
        state.completed_slides = index;
        if validated {
            state.last_validated_slide = index;
        } else {
            warn!(slide = index, "Slide checkpointed without passing validation");
        }
        state.last_update = now;
        self.save(&mut state);

        debug!(slide = index, chars = block.len(), "Checkpointed slide");
        Ok(())
    }

    /// Record a failed slide without moving the progress counters.
    pub fn record_slide_error(&self, index: usize, message: &str) {
        let mut state = self.load().unwrap_or_else(|| self.initial_state());
        let now = Utc::now();
        state.upsert(SlideCheckpoint {
            slide_number: index,
            completed: false,
            character_count: 0,
            completion_time: Some(now),
            is_validated: false,
            error_message: Some(message.to_string()),
            output_offset: None,
        });
        state.last_update = now;
        self.save(&mut state);
        error!(slide = index, "Recorded slide error: {message}");
    }

    /// Store the deck size once it is known. No-op without a record.
    pub fn update_total_slides(&self, total: usize) {
        if let Some(mut state) = self.load() {
            if state.total_slides != total && state.total_slides != 0 {
                warn!(
                    recorded = state.total_slides,
                    current = total,
                    "Slide count changed since the last run"
                );
            }
            state.total_slides = total;
            state.last_update = Utc::now();
            self.save(&mut state);
        }
    }

    /// Open the record for a run over `total` slides, creating it when absent.
    pub fn begin(&self, total: usize) {
        if self.load().is_some() {
            self.update_total_slides(total);
            return;
        }
        let mut state = self.initial_state();
        state.total_slides = total;
        self.save(&mut state);
    }

    /// Delete the record after a fully successful run. Idempotent.
    pub fn cleanup(&self) {
        match persist::remove_if_exists(&self.state_path) {
            Ok(true) => info!(path = %self.state_path.display(), "Removed checkpoint"),
            Ok(false) => {}
            Err(e) => error!(path = %self.state_path.display(), "Failed to remove checkpoint: {e}"),
        }
    }

    /// Drop the record and the partial document for a fresh start.
    pub fn reset(&self) {
        self.cleanup();
        if let Err(e) = persist::remove_if_exists(&self.artifact) {
            error!(artifact = %self.artifact.display(), "Failed to remove partial output: {e}");
        }
    }

    fn save(&self, state: &mut ProcessingState) {
        state.prompt_checksum.clone_from(&self.prompt_checksum);
        state.config_checksum.clone_from(&self.config_checksum);
        let json = match serde_json::to_vec_pretty(state) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialise checkpoint: {e}");
                return;
            }
        };
        if let Err(e) = persist::write_atomic(&self.state_path, &json) {
            error!(path = %self.state_path.display(), "Failed to save checkpoint: {e}");
        }
    }

    fn initial_state(&self) -> ProcessingState {
        let now = Utc::now();
        ProcessingState {
            file_path: self.source.clone(),
            total_slides: 0,
            completed_slides: 0,
            slide_progress: Vec::new(),
            last_validated_slide: 0,
            output_path: self.artifact.clone(),
            start_time: now,
            last_update: now,
            processing_mode: self.mode,
            prompt_checksum: self.prompt_checksum.clone(),
            config_checksum: self.config_checksum.clone(),
        }
    }
}

/// Path equality after resolving both sides; raw comparison when either
/// cannot be resolved.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
