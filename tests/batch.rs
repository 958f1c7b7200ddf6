//! Batch engine: manifest transitions across runs.

mod common;

use common::{fake_pdf, session, FakeExtractor, ScriptedAnalyzer};
use edgequake_slide_notes::notes::count_slide_markers;
use edgequake_slide_notes::{
    shutdown_channel, BatchOptions, BatchProcessor, FileStatus, Manifest, OutputNaming, PlaceholderAnalyzer,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const PROMPT: &str = "Summarise each slide for new team members.";

fn options() -> BatchOptions {
    BatchOptions {
        command: "slide-notes dir decks --prompt prompt.md".into(),
        ..Default::default()
    }
}

fn decks(dir: &Path) {
    for name in ["alpha.pdf", "beta.pdf", "gamma.pdf"] {
        fake_pdf(dir, name);
    }
}

#[tokio::test]
async fn placeholder_run_completes_every_file() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    decks(input.path());

    let processor = BatchProcessor::new(
        session(FakeExtractor::new(4), Arc::new(PlaceholderAnalyzer)),
        output.path(),
        OutputNaming::default(),
    );
    let report = processor.run(input.path(), PROMPT, &options()).await.unwrap();

    assert!(report.success());
    assert_eq!(report.completed, vec!["alpha.pdf", "beta.pdf", "gamma.pdf"]);
    assert_eq!(report.summary.completed, 3);
    assert_eq!(report.summary.error, 0);

    for stem in ["alpha", "beta", "gamma"] {
        let notes = fs::read_to_string(output.path().join(format!("{stem}_summary.md"))).unwrap();
        assert_eq!(count_slide_markers(&notes), 4);
    }
    let records = Manifest::new(output.path(), OutputNaming::default()).load();
    assert!(records.iter().all(|r| r.status == FileStatus::Completed));
    assert!(records.iter().all(|r| r.total_slides == 4 && r.completed_slides == 4));
    assert!(records.iter().all(|r| r.completion_time.is_some()));
}

#[tokio::test]
async fn failed_file_is_recorded_and_not_retried_by_default() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    decks(input.path());

    let processor = BatchProcessor::new(
        session(FakeExtractor::new(2), Arc::new(ScriptedAnalyzer::new().failing_on("beta"))),
        output.path(),
        OutputNaming::default(),
    );
    let report = processor.run(input.path(), PROMPT, &options()).await.unwrap();
    assert!(!report.success());
    assert_eq!(report.completed, vec!["alpha.pdf", "gamma.pdf"]);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].0, "beta.pdf");

    let manifest = processor.manifest();
    let failed = manifest.by_status(FileStatus::Error);
    assert_eq!(failed.len(), 1);
    assert!(failed[0].error_message.as_deref().unwrap().contains("503"));

    // Second run: nothing pending, nothing reprocessed.
    let healthy = Arc::new(ScriptedAnalyzer::new());
    let processor = BatchProcessor::new(
        session(FakeExtractor::new(2), healthy.clone()),
        output.path(),
        OutputNaming::default(),
    );
    let report = processor.run(input.path(), PROMPT, &options()).await.unwrap();
    assert!(healthy.called().is_empty());
    assert!(report.completed.is_empty());
    assert_eq!(report.previously_completed, 2);
    assert_eq!(report.summary.error, 1);

    // Explicit retry picks up only the failed file.
    let opts = BatchOptions {
        retry_failed: true,
        ..options()
    };
    let report = processor.run(input.path(), PROMPT, &opts).await.unwrap();
    assert!(report.success());
    assert_eq!(report.completed, vec!["beta.pdf"]);
    assert_eq!(healthy.called(), vec![1, 2]);
    assert_eq!(report.summary.completed, 3);
}

#[tokio::test]
async fn interruption_leaves_current_file_in_progress() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    decks(input.path());

    let (trigger, signal) = shutdown_channel();
    // The trigger fires while beta's first slide is generated.
    let analyzer = ScriptedAnalyzer::new().interrupting_after(1, trigger);
    let processor = BatchProcessor::new(
        session(FakeExtractor::new(2).with_count("alpha", 0), Arc::new(analyzer)).with_shutdown(signal),
        output.path(),
        OutputNaming::default(),
    );
    let report = processor.run(input.path(), PROMPT, &options()).await.unwrap();

    assert!(report.interrupted);
    assert!(!report.success());
    let manifest = processor.manifest();
    // alpha has no pages and fails; beta stops after slide 1.
    assert_eq!(manifest.by_status(FileStatus::Error).len(), 1);
    let in_progress = manifest.by_status(FileStatus::InProgress);
    assert_eq!(in_progress.len(), 1);
    assert_eq!(in_progress[0].filename, "beta.pdf");
    assert_eq!(in_progress[0].total_slides, 2);
    assert_eq!(manifest.by_status(FileStatus::Pending).len(), 1);
}

#[tokio::test]
async fn clean_start_reprocesses_everything() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    decks(input.path());

    let first = BatchProcessor::new(
        session(FakeExtractor::new(1), Arc::new(PlaceholderAnalyzer)),
        output.path(),
        OutputNaming::new("_notes", "txt"),
    );
    first.run(input.path(), PROMPT, &options()).await.unwrap();
    assert!(output.path().join("alpha_notes.txt").exists());

    let analyzer = Arc::new(ScriptedAnalyzer::new());
    let again = BatchProcessor::new(
        session(FakeExtractor::new(1), analyzer.clone()),
        output.path(),
        OutputNaming::new("_notes", "txt"),
    );
    let opts = BatchOptions {
        clean_start: true,
        ..options()
    };
    let report = again.run(input.path(), PROMPT, &opts).await.unwrap();
    assert_eq!(report.completed.len(), 3);
    assert_eq!(report.previously_completed, 0);
    assert_eq!(analyzer.called(), vec![1, 1, 1]);
}

#[tokio::test]
async fn empty_directory_is_an_error() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let processor = BatchProcessor::new(
        session(FakeExtractor::new(1), Arc::new(PlaceholderAnalyzer)),
        output.path(),
        OutputNaming::default(),
    );
    assert!(processor.run(input.path(), PROMPT, &options()).await.is_err());
    assert!(!processor.manifest().exists());
}

#[tokio::test]
async fn status_report_counts_records() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    decks(input.path());

    let processor = BatchProcessor::new(
        session(FakeExtractor::new(1), Arc::new(ScriptedAnalyzer::new().failing_on("gamma"))),
        output.path(),
        OutputNaming::default(),
    );
    let before = processor.status(input.path());
    assert!(!before.has_manifest);
    assert!(before.to_string().contains("No batch run"));

    processor.run(input.path(), PROMPT, &options()).await.unwrap();
    let status = processor.status(input.path());
    assert_eq!(status.summary.completed, 2);
    assert_eq!(status.summary.error, 1);
    assert_eq!(status.pattern, "{stem}_summary.md");
    let text = status.to_string();
    assert!(text.contains("2/3 files"));
    assert!(text.contains("gamma.pdf"));
}
