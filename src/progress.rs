//! Progress-callback trait for per-file and per-slide events.
//!
//! Inject an [`Arc<dyn NotesProgressCallback>`] via
//! [`crate::config::NotesConfigBuilder::progress_callback`] to receive
//! events as the engine works through a deck.
//!
//! Slides are processed strictly in order, one at a time, so events for one
//! file never interleave. The trait is still `Send + Sync` because the
//! engine future may move between runtime threads.
//!
//! # Example
//!
//! ```rust
//! use edgequake_slide_notes::{NotesProgressCallback, NotesConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl NotesProgressCallback for CountingCallback {
//!     fn on_slide_complete(&self, slide: usize, total: usize, chars: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Slide {}/{} done ({} chars)", slide, total, chars);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = NotesConfig::builder()
//!     .progress_callback(counter as Arc<dyn NotesProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the engines as they process each file and slide.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait NotesProgressCallback: Send + Sync {
    /// Called once per file after extraction, before the first slide.
    ///
    /// # Arguments
    /// * `path`        the input file
    /// * `total`       number of slides in the deck
    /// * `start_slide` first slide that will be generated (> 1 on resume)
    fn on_file_start(&self, path: &Path, total: usize, start_slide: usize) {
        let _ = (path, total, start_slide);
    }

    /// Called just before the analysis backend is invoked for a slide.
    fn on_slide_start(&self, slide: usize, total: usize) {
        let _ = (slide, total);
    }

    /// Called once a slide has been checkpointed.
    ///
    /// # Arguments
    /// * `chars` character count of the generated notes
    fn on_slide_complete(&self, slide: usize, total: usize, chars: usize) {
        let _ = (slide, total, chars);
    }

    /// Called when a slide fails. The file is aborted right after.
    fn on_slide_error(&self, slide: usize, total: usize, error: &str) {
        let _ = (slide, total, error);
    }

    /// Called once the final document for a file has been written.
    fn on_file_complete(&self, path: &Path, total: usize) {
        let _ = (path, total);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl NotesProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::NotesConfig`].
pub type ProgressCallback = Arc<dyn NotesProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        start_slide: AtomicUsize,
    }

    impl NotesProgressCallback for TrackingCallback {
        fn on_file_start(&self, _path: &Path, _total: usize, start_slide: usize) {
            self.start_slide.store(start_slide, Ordering::SeqCst);
        }

        fn on_slide_start(&self, _slide: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_slide_complete(&self, _slide: usize, _total: usize, _chars: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_slide_error(&self, _slide: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_file_start(Path::new("deck.pdf"), 5, 1);
        cb.on_slide_start(1, 5);
        cb.on_slide_complete(1, 5, 42);
        cb.on_slide_error(2, 5, "some error");
        cb.on_file_complete(Path::new("deck.pdf"), 5);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_file_start(Path::new("deck.pdf"), 3, 2);
        tracker.on_slide_start(2, 3);
        tracker.on_slide_complete(2, 3, 100);
        tracker.on_slide_start(3, 3);
        tracker.on_slide_error(3, 3, "LLM timeout");

        assert_eq!(tracker.start_slide.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }
}
