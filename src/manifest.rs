//! Batch manifest: one durable table tracking every file of a directory run.
//!
//! Stored as `.slide_notes_manifest.txt` in the output directory. A block of
//! `#` comment lines carries run metadata, followed by a pipe-delimited table
//! with one header row and one row per file:
//!
//! ```text
//! # Slide Notes Batch Manifest
//! # Generated: 2026-01-05T10:00:00+00:00
//! # Command: slide-notes dir decks/ --prompt notes.md
//! # Output Directory: out
//! # Total Files: 2
//! #
//! STATUS|FILENAME|INPUT_PATH|OUTPUT_PATH|TOTAL_SLIDES|COMPLETED_SLIDES|START_TIME|COMPLETION_TIME|ERROR_MESSAGE|FILE_SIZE|CHECKSUM
//! COMPLETED|a.pdf|decks/a.pdf|out/a_summary.md|12|12|...|...||48213|9f2c...
//! PENDING|b.pdf|decks/b.pdf|out/b_summary.md|0|0|||||
//! ```
//!
//! Cells escape `\`, `|`, CR and LF with backslashes, so any path or error
//! message survives a round trip. Every mutation loads the whole table,
//! changes it in memory and rewrites the file atomically. A table that
//! fails to parse is treated as empty.

use crate::config::OutputNaming;
use crate::error::NotesError;
use crate::persist;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, error, info, warn};

pub const MANIFEST_FILE_NAME: &str = ".slide_notes_manifest.txt";

const FINGERPRINT_WINDOW: u64 = 1024;

const COLUMNS: [&str; 11] = [
    "STATUS",
    "FILENAME",
    "INPUT_PATH",
    "OUTPUT_PATH",
    "TOTAL_SLIDES",
    "COMPLETED_SLIDES",
    "START_TIME",
    "COMPLETION_TIME",
    "ERROR_MESSAGE",
    "FILE_SIZE",
    "CHECKSUM",
];

/// Lifecycle of one file in a batch.
///
/// `Pending → InProgress → {Completed | Error}`. `Skipped` is recognised
/// when reading a manifest but no code path assigns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileStatus {
    Pending,
    InProgress,
    Completed,
    Error,
    Skipped,
}

impl FileStatus {
    pub const ALL: [FileStatus; 5] = [
        FileStatus::Pending,
        FileStatus::InProgress,
        FileStatus::Completed,
        FileStatus::Error,
        FileStatus::Skipped,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Pending => "PENDING",
            FileStatus::InProgress => "IN_PROGRESS",
            FileStatus::Completed => "COMPLETED",
            FileStatus::Error => "ERROR",
            FileStatus::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("unknown status '{s}'"))
    }
}

/// One file tracked by the manifest. `filename` is unique within a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub filename: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub status: FileStatus,
    pub total_slides: usize,
    pub completed_slides: usize,
    pub start_time: Option<DateTime<Utc>>,
    pub completion_time: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub file_size: u64,
    pub checksum: String,
}

/// Optional field changes applied together with a status transition.
///
/// `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct RecordUpdate {
    pub total_slides: Option<usize>,
    pub completed_slides: Option<usize>,
    pub start_time: Option<DateTime<Utc>>,
    pub completion_time: Option<DateTime<Utc>>,
    /// `Some(None)` clears a previous message.
    pub error_message: Option<Option<String>>,
}

/// Record counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub error: usize,
    pub skipped: usize,
    pub total: usize,
}

impl StatusSummary {
    pub fn count(&self, status: FileStatus) -> usize {
        match status {
            FileStatus::Pending => self.pending,
            FileStatus::InProgress => self.in_progress,
            FileStatus::Completed => self.completed,
            FileStatus::Error => self.error,
            FileStatus::Skipped => self.skipped,
        }
    }

    /// Completed share of all records, 0–100.
    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 * 100.0 / self.total as f64
        }
    }
}

/// Handle on the manifest of one output directory.
#[derive(Debug, Clone)]
pub struct Manifest {
    output_dir: PathBuf,
    path: PathBuf,
    naming: OutputNaming,
}

impl Manifest {
    pub fn new(output_dir: impl Into<PathBuf>, naming: OutputNaming) -> Self {
        let output_dir = output_dir.into();
        Self {
            path: output_dir.join(MANIFEST_FILE_NAME),
            output_dir,
            naming,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn naming(&self) -> &OutputNaming {
        &self.naming
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Output path for an input file under this manifest's naming scheme.
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.output_dir.join(self.naming.file_name(&stem))
    }

    /// Start a new manifest with one `PENDING` record per input, sorted by
    /// file name. Replaces any existing manifest.
    pub fn initialize(&self, inputs: &[PathBuf], command: &str) -> Result<Vec<FileRecord>, NotesError> {
        let mut inputs: Vec<&PathBuf> = inputs.iter().collect();
        inputs.sort_by_key(|p| file_name_of(p));

        let mut records: Vec<FileRecord> = Vec::with_capacity(inputs.len());
        for input in inputs {
            let filename = file_name_of(input);
            if records.iter().any(|r| r.filename == filename) {
                warn!(file = %filename, "Duplicate file name; keeping the first one");
                continue;
            }
            let output_path = self.output_path_for(input);
            if let Some(first) = records.iter().find(|r| r.output_path == output_path) {
                warn!(
                    file = %filename,
                    kept = %first.filename,
                    output = %output_path.display(),
                    "Another input already writes this output; skipping"
                );
                continue;
            }
            records.push(FileRecord {
                output_path,
                input_path: input.clone(),
                status: FileStatus::Pending,
                total_slides: 0,
                completed_slides: 0,
                start_time: None,
                completion_time: None,
                error_message: None,
                file_size: fs::metadata(input).map(|m| m.len()).unwrap_or(0),
                checksum: file_fingerprint(input),
                filename,
            });
        }

        self.write(&records, command)?;
        info!(files = records.len(), "Initialised manifest");
        Ok(records)
    }

    /// All records, in stored order. Empty when the manifest is missing or
    /// cannot be parsed.
    pub fn load(&self) -> Vec<FileRecord> {
        self.read().map(|(_, records)| records).unwrap_or_default()
    }

    /// Change the status of `filename` and apply `update`, rewriting the
    /// whole manifest.
    pub fn update_status(&self, filename: &str, status: FileStatus, update: RecordUpdate) -> Result<(), NotesError> {
        let (command, mut records) = self.read().unwrap_or_default();
        let Some(record) = records.iter_mut().find(|r| r.filename == filename) else {
            warn!(file = %filename, "No manifest record to update");
            return Ok(());
        };

        record.status = status;
        if let Some(n) = update.total_slides {
            record.total_slides = n;
        }
        if let Some(n) = update.completed_slides {
            record.completed_slides = n;
        }
        if let Some(t) = update.start_time {
            record.start_time = Some(t);
        }
        if let Some(t) = update.completion_time {
            record.completion_time = Some(t);
        }
        if let Some(msg) = update.error_message {
            record.error_message = msg;
        }

        self.write(&records, &command)?;
        debug!(file = %filename, %status, "Updated manifest record");
        Ok(())
    }

    pub fn by_status(&self, status: FileStatus) -> Vec<FileRecord> {
        self.load().into_iter().filter(|r| r.status == status).collect()
    }

    pub fn summary(&self) -> StatusSummary {
        let mut s = StatusSummary::default();
        for r in self.load() {
            match r.status {
                FileStatus::Pending => s.pending += 1,
                FileStatus::InProgress => s.in_progress += 1,
                FileStatus::Completed => s.completed += 1,
                FileStatus::Error => s.error += 1,
                FileStatus::Skipped => s.skipped += 1,
            }
            s.total += 1;
        }
        s
    }

    /// File names whose head/tail fingerprint no longer matches the record.
    ///
    /// Inputs are looked up at their recorded path, falling back to
    /// `input_dir/<filename>` when the recorded path is gone. Missing files
    /// are not reported. Changes are only reported, never reprocessed.
    pub fn detect_changes(&self, input_dir: &Path) -> Vec<String> {
        let mut changed = Vec::new();
        for record in self.load() {
            let path = if record.input_path.exists() {
                record.input_path.clone()
            } else {
                input_dir.join(&record.filename)
            };
            if !path.exists() {
                continue;
            }
            if file_fingerprint(&path) != record.checksum {
                warn!(file = %record.filename, "Input changed since the manifest was created");
                changed.push(record.filename);
            }
        }
        changed
    }

    /// Move every record in one of `from` back to `PENDING`, clearing its
    /// error message. Returns how many records changed.
    pub fn reset_to_pending(&self, from: &[FileStatus]) -> Result<usize, NotesError> {
        let Some((command, mut records)) = self.read() else {
            return Ok(0);
        };
        let mut n = 0;
        for r in records.iter_mut().filter(|r| from.contains(&r.status)) {
            r.status = FileStatus::Pending;
            r.error_message = None;
            n += 1;
        }
        if n > 0 {
            self.write(&records, &command)?;
            info!(files = n, "Re-queued files");
        }
        Ok(n)
    }

    /// Delete the manifest. Idempotent.
    pub fn cleanup(&self) {
        match persist::remove_if_exists(&self.path) {
            Ok(true) => info!(path = %self.path.display(), "Removed manifest"),
            Ok(false) => {}
            Err(e) => error!(path = %self.path.display(), "Failed to remove manifest: {e}"),
        }
    }

    /// Write `records` as the complete manifest.
    pub fn write(&self, records: &[FileRecord], command: &str) -> Result<(), NotesError> {
        let mut out = String::new();
        out.push_str("# Slide Notes Batch Manifest\n");
        out.push_str(&format!("# Generated: {}\n", Utc::now().to_rfc3339()));
        out.push_str(&format!("# Command: {}\n", single_line(command)));
        out.push_str(&format!(
            "# Output Directory: {}\n",
            single_line(&self.output_dir.display().to_string())
        ));
        out.push_str(&format!("# Total Files: {}\n", records.len()));
        out.push_str("#\n");
        out.push_str(&COLUMNS.join("|"));
        out.push('\n');
        for r in records {
            out.push_str(&encode_row(r));
            out.push('\n');
        }

        persist::write_atomic(&self.path, out.as_bytes()).map_err(|source| NotesError::StateWrite {
            path: self.path.clone(),
            source,
        })
    }

    /// Parse the manifest into `(command, records)`.
    fn read(&self) -> Option<(String, Vec<FileRecord>)> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                error!(path = %self.path.display(), "Failed to read manifest: {e}");
                return None;
            }
        };
        match parse_manifest(&raw) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                error!(path = %self.path.display(), "Ignoring unreadable manifest: {e}");
                None
            }
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn single_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

/// Cheap change-detection fingerprint: SHA-256 over the first KiB and the
/// last KiB of the file, truncated to 16 hex chars. Files under 1 KiB
/// are hashed twice. Interior edits go unnoticed. Empty on read failure.
pub fn file_fingerprint(path: &Path) -> String {
    fn digest(path: &Path) -> std::io::Result<String> {
        let mut f = File::open(path)?;
        let len = f.metadata()?.len();

        let mut head = Vec::with_capacity(FINGERPRINT_WINDOW as usize);
        (&mut f).take(FINGERPRINT_WINDOW).read_to_end(&mut head)?;

        let tail_len = len.min(FINGERPRINT_WINDOW);
        f.seek(SeekFrom::Start(len - tail_len))?;
        let mut tail = Vec::with_capacity(tail_len as usize);
        (&mut f).take(tail_len).read_to_end(&mut tail)?;

        let mut hasher = Sha256::new();
        hasher.update(&head);
        hasher.update(&tail);
        let hex = format!("{:x}", hasher.finalize());
        Ok(hex[..16].to_string())
    }

    digest(path).unwrap_or_else(|e| {
        warn!(path = %path.display(), "Cannot fingerprint file: {e}");
        String::new()
    })
}

// ── Table encoding ───────────────────────────────────────────────────────

fn escape(cell: &str) -> String {
    let mut out = String::with_capacity(cell.len());
    for c in cell.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '|' => out.push_str("\\|"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// Split a row on unescaped pipes, undoing [`escape`] per cell.
fn split_row(line: &str) -> Result<Vec<String>, String> {
    let mut cells = Vec::new();
    let mut cur = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\\') => cur.push('\\'),
                Some('|') => cur.push('|'),
                Some('n') => cur.push('\n'),
                Some('r') => cur.push('\r'),
                other => return Err(format!("bad escape sequence '\\{}'", other.unwrap_or(' '))),
            },
            '|' => cells.push(std::mem::take(&mut cur)),
            c => cur.push(c),
        }
    }
    cells.push(cur);
    Ok(cells)
}

fn fmt_time(t: &Option<DateTime<Utc>>) -> String {
    t.map(|t| t.to_rfc3339()).unwrap_or_default()
}

fn encode_row(r: &FileRecord) -> String {
    let cells = [
        r.status.as_str().to_string(),
        r.filename.clone(),
        r.input_path.display().to_string(),
        r.output_path.display().to_string(),
        r.total_slides.to_string(),
        r.completed_slides.to_string(),
        fmt_time(&r.start_time),
        fmt_time(&r.completion_time),
        r.error_message.clone().unwrap_or_default(),
        r.file_size.to_string(),
        r.checksum.clone(),
    ];
    cells.iter().map(|c| escape(c)).collect::<Vec<_>>().join("|")
}

fn parse_time(cell: &str) -> Result<Option<DateTime<Utc>>, String> {
    if cell.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(cell)
        .map(|t| Some(t.with_timezone(&Utc)))
        .map_err(|e| format!("bad timestamp '{cell}': {e}"))
}

fn parse_count<T: FromStr>(cell: &str, column: &str) -> Result<T, String>
where
    T: Default,
{
    if cell.is_empty() {
        return Ok(T::default());
    }
    cell.parse()
        .map_err(|_| format!("bad {column} value '{cell}'"))
}

fn decode_row(line: &str) -> Result<FileRecord, String> {
    let cells = split_row(line)?;
    if cells.len() != COLUMNS.len() {
        return Err(format!(
            "expected {} columns, found {}",
            COLUMNS.len(),
            cells.len()
        ));
    }
    Ok(FileRecord {
        status: cells[0].parse()?,
        filename: cells[1].clone(),
        input_path: PathBuf::from(&cells[2]),
        output_path: PathBuf::from(&cells[3]),
        total_slides: parse_count(&cells[4], "TOTAL_SLIDES")?,
        completed_slides: parse_count(&cells[5], "COMPLETED_SLIDES")?,
        start_time: parse_time(&cells[6])?,
        completion_time: parse_time(&cells[7])?,
        error_message: Some(cells[8].clone()).filter(|m| !m.is_empty()),
        file_size: parse_count(&cells[9], "FILE_SIZE")?,
        checksum: cells[10].clone(),
    })
}

fn parse_manifest(raw: &str) -> Result<(String, Vec<FileRecord>), String> {
    let mut command = String::new();
    let mut header_seen = false;
    let mut records = Vec::new();

    for line in raw.lines() {
        if let Some(meta) = line.strip_prefix('#') {
            if let Some(cmd) = meta.trim_start().strip_prefix("Command:") {
                command = cmd.trim().to_string();
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        if !header_seen {
            if line.trim() != COLUMNS.join("|") {
                return Err("missing or unexpected header row".into());
            }
            header_seen = true;
            continue;
        }
        let record = decode_row(line)?;
        if records.iter().any(|r: &FileRecord| r.filename == record.filename) {
            return Err(format!("duplicate record for '{}'", record.filename));
        }
        records.push(record);
    }

    if !header_seen {
        return Err("missing header row".into());
    }
    Ok((command, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn record(i: usize) -> FileRecord {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        FileRecord {
            filename: format!("deck_{i:03}.pdf"),
            input_path: PathBuf::from(format!("/in/deck_{i:03}.pdf")),
            output_path: PathBuf::from(format!("/out/deck_{i:03}_summary.md")),
            status: FileStatus::ALL[i % FileStatus::ALL.len()],
            total_slides: i * 3,
            completed_slides: i,
            start_time: (i % 2 == 0).then_some(start),
            completion_time: (i % 3 == 0).then_some(start + chrono::Duration::seconds(i as i64)),
            error_message: (i % 4 == 1).then(|| format!("failure {i}: bad | pipe\nand newline \\ slash")),
            file_size: 1000 + i as u64,
            checksum: format!("{:016x}", i * 7919),
        }
    }

    fn manifest() -> (TempDir, Manifest) {
        let dir = TempDir::new().unwrap();
        let m = Manifest::new(dir.path().join("out"), OutputNaming::default());
        (dir, m)
    }

    #[test]
    fn round_trip_preserves_every_field() {
        for n in [0usize, 1, 50] {
            let (_dir, m) = manifest();
            let records: Vec<FileRecord> = (0..n).map(record).collect();
            m.write(&records, "slide-notes dir /in").unwrap();
            assert_eq!(m.load(), records, "n = {n}");
        }
    }

    #[test]
    fn initialize_sorts_and_fingerprints() {
        let (dir, m) = manifest();
        let b = dir.path().join("b.pdf");
        let a = dir.path().join("a.pdf");
        fs::write(&b, b"%PDF-b").unwrap();
        fs::write(&a, b"%PDF-a").unwrap();

        let records = m.initialize(&[b, a], "cmd").unwrap();
        assert_eq!(records[0].filename, "a.pdf");
        assert_eq!(records[1].filename, "b.pdf");
        assert!(records.iter().all(|r| r.status == FileStatus::Pending));
        assert_eq!(records[0].file_size, 6);
        assert_eq!(records[0].checksum.len(), 16);
        assert!(records[0].output_path.ends_with("out/a_summary.md"));
        assert_eq!(m.load(), records);
    }

    #[test]
    fn inputs_with_the_same_output_are_tracked_once() {
        let (dir, m) = manifest();
        let lower = dir.path().join("deck.pdf");
        let upper = dir.path().join("deck.PDF");
        fs::write(&lower, b"%PDF-lower").unwrap();
        fs::write(&upper, b"%PDF-upper").unwrap();

        let records = m.initialize(&[lower, upper], "cmd").unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].output_path.ends_with("out/deck_summary.md"));
        assert_eq!(m.load().len(), 1);
    }

    #[test]
    fn update_status_applies_fields_and_keeps_command() {
        let (_dir, m) = manifest();
        m.write(&[record(0), record(1)], "slide-notes dir in").unwrap();
        let now = Utc::now();
        m.update_status(
            "deck_001.pdf",
            FileStatus::Completed,
            RecordUpdate {
                total_slides: Some(12),
                completed_slides: Some(12),
                completion_time: Some(now),
                error_message: Some(None),
                ..Default::default()
            },
        )
        .unwrap();

        let r = m.load().into_iter().find(|r| r.filename == "deck_001.pdf").unwrap();
        assert_eq!(r.status, FileStatus::Completed);
        assert_eq!(r.completed_slides, 12);
        assert_eq!(r.completion_time, Some(now));
        assert!(r.error_message.is_none());
        let raw = fs::read_to_string(m.path()).unwrap();
        assert!(raw.contains("# Command: slide-notes dir in"));
        assert!(raw.contains("# Total Files: 2"));
    }

    #[test]
    fn summary_and_by_status() {
        let (_dir, m) = manifest();
        let records: Vec<FileRecord> = (0..10).map(record).collect();
        m.write(&records, "").unwrap();
        let s = m.summary();
        assert_eq!(s.total, 10);
        assert_eq!(s.pending, 2);
        assert_eq!(s.completed, 2);
        assert_eq!(m.by_status(FileStatus::Error).len(), s.error);
        assert!((s.percent_complete() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn corrupt_manifest_loads_empty() {
        let (_dir, m) = manifest();
        fs::create_dir_all(m.output_dir()).unwrap();
        fs::write(m.path(), "# header\nSTATUS|FILENAME\nnonsense").unwrap();
        assert!(m.load().is_empty());

        m.write(&[record(1)], "").unwrap();
        let raw = fs::read_to_string(m.path()).unwrap();
        fs::write(m.path(), raw.replace("PENDING", "BOGUS").replace("IN_PROGRESS", "BOGUS")).unwrap();
        assert!(m.load().is_empty());
    }

    #[test]
    fn reset_to_pending_requeues_failures() {
        let (_dir, m) = manifest();
        let mut records: Vec<FileRecord> = (0..5).map(record).collect();
        records[0].status = FileStatus::Error;
        records[1].status = FileStatus::InProgress;
        records[2].status = FileStatus::Completed;
        m.write(&records, "").unwrap();

        let n = m.reset_to_pending(&[FileStatus::Error, FileStatus::InProgress]).unwrap();
        assert_eq!(n, 2);
        let loaded = m.load();
        assert_eq!(loaded[0].status, FileStatus::Pending);
        assert!(loaded[0].error_message.is_none());
        assert_eq!(loaded[2].status, FileStatus::Completed);
    }

    #[test]
    fn checksum_tracks_head_and_tail_only() {
        let (dir, m) = manifest();
        let path = dir.path().join("big.pdf");
        let mut bytes = vec![b'x'; 8 * 1024];
        fs::write(&path, &bytes).unwrap();
        m.initialize(&[path.clone()], "").unwrap();
        assert!(m.detect_changes(dir.path()).is_empty());

        // Interior edit, more than 1 KiB from either end.
        bytes[4096] = b'y';
        fs::write(&path, &bytes).unwrap();
        assert!(m.detect_changes(dir.path()).is_empty());

        // Edit inside the first KiB.
        bytes[10] = b'z';
        fs::write(&path, &bytes).unwrap();
        assert_eq!(m.detect_changes(dir.path()), vec!["big.pdf".to_string()]);

        // Re-baseline, then edit inside the last KiB.
        m.initialize(&[path.clone()], "").unwrap();
        let last = bytes.len() - 5;
        bytes[last] = b'q';
        fs::write(&path, &bytes).unwrap();
        assert_eq!(m.detect_changes(dir.path()), vec!["big.pdf".to_string()]);
    }

    #[test]
    fn small_files_are_fingerprinted_whole() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("small.pdf");
        fs::write(&path, b"%PDF-1.4 tiny").unwrap();
        let a = file_fingerprint(&path);
        fs::write(&path, b"%PDF-1.4 tinY").unwrap();
        assert_ne!(a, file_fingerprint(&path));
        assert_eq!(file_fingerprint(&dir.path().join("missing.pdf")), "");
    }

    #[test]
    fn status_parses_from_manifest_names() {
        for s in FileStatus::ALL {
            assert_eq!(s.as_str().parse::<FileStatus>().unwrap(), s);
        }
        assert!("DONE".parse::<FileStatus>().is_err());
    }
}
