//! Shared fakes for the integration tests: no pdfium, no network.

#![allow(dead_code)]

use edgequake_slide_notes::notes::{SLIDE_NARRATION, SLIDE_NUMBER, SLIDE_TEXT, SLIDE_TOPICS, SLIDE_VISUALS};
use edgequake_slide_notes::{
    AnalysisError, AnalysisRequest, NotesConfig, NotesError, Session, ShutdownTrigger, SlideAnalyzer,
    SlideExtractor, SlideUnit,
};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Write a file that passes PDF validation.
pub fn fake_pdf(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("%PDF-1.4\n% {name}\n")).unwrap();
    path
}

/// Returns `slides` text-only slides for every file, or a per-stem count.
pub struct FakeExtractor {
    default_slides: usize,
    per_stem: HashMap<String, usize>,
    folder_in_text: bool,
}

impl FakeExtractor {
    pub fn new(default_slides: usize) -> Self {
        Self {
            default_slides,
            per_stem: HashMap::new(),
            folder_in_text: false,
        }
    }

    pub fn with_count(mut self, stem: &str, slides: usize) -> Self {
        self.per_stem.insert(stem.to_string(), slides);
        self
    }

    /// Prefix slide text with the parent folder, e.g. `q1/deck slide 1`.
    pub fn with_folder_in_text(mut self) -> Self {
        self.folder_in_text = true;
        self
    }
}

impl SlideExtractor for FakeExtractor {
    fn extract<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Vec<SlideUnit>, NotesError>> {
        let stem = path.file_stem().unwrap().to_string_lossy().into_owned();
        let n = self.per_stem.get(&stem).copied().unwrap_or(self.default_slides);
        let label = match path.parent().and_then(|p| p.file_name()) {
            Some(folder) if self.folder_in_text => format!("{}/{stem}", folder.to_string_lossy()),
            _ => stem,
        };
        let slides = (1..=n)
            .map(|i| SlideUnit::text_only(i, format!("{label} slide {i}: quarterly planning overview")))
            .collect();
        Box::pin(async move { Ok(slides) })
    }
}

/// Deterministic backend with programmable failures.
///
/// The notes embed the context they were given, so two runs only produce the
/// same bytes when every slide saw the same context.
#[derive(Default)]
pub struct ScriptedAnalyzer {
    pub calls: Mutex<Vec<usize>>,
    fail_at: Option<usize>,
    fail_on_text: Option<String>,
    incomplete_at: Option<usize>,
    interrupt_after: Option<(usize, ShutdownTrigger)>,
    number_offset: usize,
}

impl ScriptedAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend error on slide `index`.
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Backend error on any slide whose text contains `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on_text = Some(needle.to_string());
        self
    }

    /// Notes without a narration section on slide `index`.
    pub fn incomplete_at(mut self, index: usize) -> Self {
        self.incomplete_at = Some(index);
        self
    }

    /// Fire `trigger` while answering slide `index`.
    pub fn interrupting_after(mut self, index: usize, trigger: ShutdownTrigger) -> Self {
        self.interrupt_after = Some((index, trigger));
        self
    }

    /// Write `index + offset` as the slide number, like a model copying
    /// the deck's printed page numbers.
    pub fn numbering_from(mut self, offset: usize) -> Self {
        self.number_offset = offset;
        self
    }

    pub fn called(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

pub fn full_notes(index: usize, text: &str, context: &str) -> String {
    format!(
        "{SLIDE_NUMBER} {index}\n\n{SLIDE_TEXT}\n{text}\n\n{SLIDE_VISUALS}\nNo image or diagram on this slide.\n\n\
         {SLIDE_TOPICS}\n* Planning\n* Context of {} chars\n\n\
         {SLIDE_NARRATION}\nOn this slide we walk through the plan for the quarter and how it builds on what came before.\n",
        context.chars().count()
    )
}

impl SlideAnalyzer for ScriptedAnalyzer {
    fn analyze<'a>(&'a self, request: AnalysisRequest<'a>) -> BoxFuture<'a, Result<String, AnalysisError>> {
        self.calls.lock().unwrap().push(request.index);

        let result = if self.fail_at == Some(request.index)
            || self
                .fail_on_text
                .as_deref()
                .is_some_and(|needle| request.text.contains(needle))
        {
            Err(AnalysisError::Exhausted {
                attempts: 4,
                detail: "503 Service Unavailable".into(),
            })
        } else if self.incomplete_at == Some(request.index) {
            let notes = full_notes(request.index + self.number_offset, request.text, request.context);
            let cut = notes.find(SLIDE_NARRATION).unwrap();
            Ok(notes[..cut].to_string())
        } else {
            Ok(full_notes(request.index + self.number_offset, request.text, request.context))
        };

        if let Some((index, trigger)) = &self.interrupt_after {
            if *index == request.index {
                trigger.trigger();
            }
        }
        Box::pin(async move { result })
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

pub fn session(extractor: FakeExtractor, analyzer: Arc<dyn SlideAnalyzer>) -> Session {
    let config = NotesConfig::builder().build().unwrap();
    Session::new(config, Arc::new(extractor), analyzer)
}
