//! CLI binary for edgequake-slide-notes.
//!
//! A thin shim over the library crate: maps flags to `NotesConfig`, builds a
//! `Session`, wires Ctrl-C to the shutdown signal and prints summaries.
//! Exit codes: 0 success, 1 failure, 130 interrupted.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_slide_notes::pipeline::input;
use edgequake_slide_notes::{
    shutdown_channel, BatchOptions, BatchProcessor, LlmAnalyzer, NotesConfig, NotesError,
    NotesProgressCallback, OutputNaming, PdfiumExtractor, ProgressCallback, Session, SlideAnalyzer,
    SlideNotesEngine,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const EXIT_FAILURE: u8 = 1;
const EXIT_INTERRUPTED: u8 = 130;

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One progress bar, reused for every file of a run.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
        let errors = self.errors.load(Ordering::SeqCst);
        if errors > 0 {
            eprintln!("{} {} slide(s) failed", red("✘"), errors);
        }
    }
}

impl NotesProgressCallback for CliProgressCallback {
    fn on_file_start(&self, path: &Path, total: usize, start_slide: usize) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.bar.set_length(total as u64);
        self.bar.set_position(start_slide.saturating_sub(1) as u64);
        self.bar.set_prefix(name.clone());
        self.bar.reset_eta();
        let resumed = if start_slide > 1 {
            format!("  (resuming at slide {start_slide})")
        } else {
            String::new()
        };
        self.bar
            .println(format!("{} {}{}", bold("◆"), bold(&format!("{name}: {total} slides")), dim(&resumed)));
    }

    fn on_slide_start(&self, slide: usize, _total: usize) {
        self.bar.set_message(format!("slide {slide}"));
    }

    fn on_slide_complete(&self, slide: usize, total: usize, chars: usize) {
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}",
            green("✓"),
            slide,
            total,
            dim(&format!("{chars:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_slide_error(&self, slide: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} Slide {:>3}/{:<3}  {}", red("✗"), slide, total, red(&msg)));
    }

    fn on_file_complete(&self, path: &Path, total: usize) {
        self.bar.println(format!(
            "{} {} ({total} slides)",
            green("✔"),
            bold(&path.display().to_string())
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Notes for one deck
  slide-notes file deck.pdf --prompt prompt.md -o deck_notes.md

  # Several decks into one document on stdout
  slide-notes file intro.pdf part2.pdf --prompt prompt.md

  # A whole directory, outputs named {stem}_summary.md
  slide-notes dir decks/ --prompt prompt.md --output-dir notes/

  # Where did the last directory run get to?
  slide-notes dir decks/ --output-dir notes/ --show-status

  # Pick up failed and unfinished files after fixing the cause
  slide-notes dir decks/ --prompt prompt.md --output-dir notes/ --resume --retry-failed

  # Try the pipeline without an API key
  slide-notes file deck.pdf --prompt prompt.md --no-ai

RESUMING:
  Progress is checkpointed after every slide. Rerunning the same command
  continues from the last validated slide; --clean-start discards it.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium; skips auto-download
  RUST_LOG                Log filter, e.g. edgequake_slide_notes=debug
"#;

/// Generate speaker notes for PDF slide decks with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "slide-notes",
    version,
    about = "Generate speaker notes for PDF slide decks with an LLM, resumable per slide",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process one or more PDF files into a single notes document.
    File(FileArgs),
    /// Process every PDF in a directory, one notes file per PDF.
    Dir(DirArgs),
}

#[derive(Args, Debug)]
struct FileArgs {
    /// PDF files to process, in order.
    #[arg(required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Prompt file (Markdown) describing the notes you want.
    #[arg(short, long, env = "SLIDE_NOTES_PROMPT")]
    prompt: PathBuf,

    /// Write notes to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Continue from saved progress (also automatic when progress exists).
    #[arg(long)]
    resume: bool,

    /// Discard saved progress and start from slide 1.
    #[arg(long, conflicts_with = "resume")]
    clean_start: bool,
}

#[derive(Args, Debug)]
struct DirArgs {
    /// Directory containing the PDF files.
    input_dir: PathBuf,

    /// Prompt file (Markdown) describing the notes you want.
    #[arg(short, long, env = "SLIDE_NOTES_PROMPT", required_unless_present = "show_status")]
    prompt: Option<PathBuf>,

    /// Where notes and the batch manifest are written. Default: the input directory.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Appended to each PDF's stem to name its notes file.
    #[arg(long, default_value = "_summary")]
    suffix: String,

    /// Extension of the notes files.
    #[arg(long, default_value = ".md")]
    extension: String,

    /// Continue from the batch manifest (also automatic when one exists).
    #[arg(long)]
    resume: bool,

    /// Discard the batch manifest and all per-file progress first.
    #[arg(long, conflicts_with = "resume")]
    clean_start: bool,

    /// Print the batch status and exit.
    #[arg(long)]
    show_status: bool,

    /// Re-queue files that failed or were left unfinished.
    #[arg(long)]
    retry_failed: bool,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Placeholder notes without calling any model.
    #[arg(long, global = true, env = "SLIDE_NOTES_NO_AI")]
    no_ai: bool,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Rendering DPI (72–400).
    #[arg(long, global = true, env = "SLIDE_NOTES_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// PDF user password for encrypted decks.
    #[arg(long, global = true, env = "SLIDE_NOTES_PASSWORD")]
    password: Option<String>,

    /// Do not send slide images to the model.
    #[arg(long, global = true, env = "SLIDE_NOTES_NO_VISION")]
    no_vision: bool,

    /// LLM temperature (0.0–2.0).
    #[arg(long, global = true, env = "SLIDE_NOTES_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Max LLM output tokens per slide.
    #[arg(long, global = true, env = "SLIDE_NOTES_MAX_TOKENS", default_value_t = 4000)]
    max_tokens: usize,

    /// Retries per slide on LLM failure (0–10).
    #[arg(long, global = true, env = "SLIDE_NOTES_MAX_RETRIES", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(0..=10))]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, global = true, env = "SLIDE_NOTES_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Character budget for the context of earlier slides.
    #[arg(long, global = true, env = "SLIDE_NOTES_CONTEXT_CHARS", default_value_t = 2000)]
    context_chars: usize,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "SLIDE_NOTES_NO_PROGRESS")]
    no_progress: bool,

    /// Append logs (without colours) to this file.
    #[arg(long, global = true, env = "SLIDE_NOTES_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SLIDE_NOTES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SLIDE_NOTES_QUIET")]
    quiet: bool,
}

impl CommonArgs {
    fn show_progress(&self) -> bool {
        !self.quiet && !self.no_progress
    }
}

/// How a run ended, mapped to the process exit code.
enum RunStatus {
    Success,
    Failed,
    Interrupted,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.common) {
        eprintln!("{} {e:#}", red("✘"));
        return ExitCode::from(EXIT_FAILURE);
    }

    match run(cli).await {
        Ok(RunStatus::Success) => ExitCode::SUCCESS,
        Ok(RunStatus::Failed) => ExitCode::from(EXIT_FAILURE),
        Ok(RunStatus::Interrupted) => ExitCode::from(EXIT_INTERRUPTED),
        Err(e) => {
            if e.downcast_ref::<NotesError>().is_some_and(NotesError::is_interrupt) {
                eprintln!("{} {}", yellow("⏸"), e.root_cause());
                return ExitCode::from(EXIT_INTERRUPTED);
            }
            eprintln!("{} {e:#}", red("✘"));
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

// ── Logging setup ────────────────────────────────────────────────────────────
// Suppress INFO-level library logs when the progress bar is active; the bar
// provides the feedback that matters. RUST_LOG always wins.
fn init_logging(common: &CommonArgs) -> Result<()> {
    let level = if common.verbose {
        "debug"
    } else if common.quiet || common.show_progress() {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = match &common.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

async fn run(cli: Cli) -> Result<RunStatus> {
    let common = &cli.common;

    // Status needs neither pdfium nor a provider.
    if let Command::Dir(args) = &cli.command {
        if args.show_status {
            let output_dir = args.output_dir.clone().unwrap_or_else(|| args.input_dir.clone());
            let naming = OutputNaming::new(args.suffix.clone(), args.extension.clone());
            let processor = BatchProcessor::new(
                Session::placeholder(NotesConfig::default()),
                output_dir,
                naming,
            );
            print!("{}", processor.status(&args.input_dir));
            return Ok(RunStatus::Success);
        }
    }

    ensure_pdfium(common.quiet)?;

    // ── Build session ────────────────────────────────────────────────────────
    let progress = common.show_progress().then(CliProgressCallback::new);
    let config = build_config(common, progress.clone().map(|p| p as ProgressCallback))?;
    let session = build_session(common, config).await?;

    let (trigger, signal) = shutdown_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{} Interrupt received; stopping after saving progress…", yellow("⏸"));
            trigger.trigger();
        }
    });
    let session = session.with_shutdown(signal);

    let status = match &cli.command {
        Command::File(args) => run_file(args, session, common.quiet).await,
        Command::Dir(args) => run_dir(args, session, common.quiet).await,
    };
    if let Some(p) = &progress {
        p.finish();
    }
    status
}

async fn run_file(args: &FileArgs, session: Session, quiet: bool) -> Result<RunStatus> {
    for input in &args.inputs {
        input::validate_pdf(input)?;
    }
    let prompt = input::load_prompt(&args.prompt)?;
    let engine = SlideNotesEngine::new(session);
    let output = args.output.as_deref();

    if args.clean_start {
        let artifacts = SlideNotesEngine::streaming_paths(&args.inputs, output);
        for (source, artifact) in args.inputs.iter().zip(&artifacts) {
            engine.clean_start(source, artifact);
        }
        info!("Discarded saved progress");
    } else if args.resume {
        info!("Resuming from saved progress where available");
    }

    let document = match engine.process_inputs(&args.inputs, output, &prompt).await {
        Ok(doc) => doc,
        Err(e) if e.is_interrupt() => {
            if !quiet {
                eprintln!("{} {e}", yellow("⏸"));
                eprintln!("   Rerun the same command with --resume to continue.");
            }
            return Ok(RunStatus::Interrupted);
        }
        Err(e) => return Err(e).context("Notes generation failed"),
    };

    match output {
        Some(path) => {
            if !quiet {
                eprintln!(
                    "{}  {} file(s)  →  {}",
                    green("✔"),
                    args.inputs.len(),
                    bold(&path.display().to_string())
                );
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(document.as_bytes())
                .context("Failed to write to stdout")?;
        }
    }
    Ok(RunStatus::Success)
}

async fn run_dir(args: &DirArgs, session: Session, quiet: bool) -> Result<RunStatus> {
    let prompt_path = args
        .prompt
        .as_deref()
        .context("--prompt is required unless --show-status is given")?;
    let prompt = input::load_prompt(prompt_path)?;
    let output_dir = args.output_dir.clone().unwrap_or_else(|| args.input_dir.clone());
    let naming = OutputNaming::new(args.suffix.clone(), args.extension.clone());

    let processor = BatchProcessor::new(session, output_dir, naming);
    if args.resume && !processor.manifest().exists() {
        warn!("No batch manifest found; starting a new run");
    }

    let options = BatchOptions {
        clean_start: args.clean_start,
        retry_failed: args.retry_failed,
        command: std::env::args().collect::<Vec<_>>().join(" "),
    };
    let report = processor
        .run(&args.input_dir, &prompt, &options)
        .await
        .context("Batch run failed")?;

    if !quiet {
        eprint!("{report}");
    }
    if report.interrupted {
        if !quiet {
            eprintln!("{} Batch interrupted; progress saved.", yellow("⏸"));
            eprintln!("   Rerun with --resume --retry-failed to finish the interrupted file.");
        }
        return Ok(RunStatus::Interrupted);
    }
    if report.success() {
        Ok(RunStatus::Success)
    } else {
        Ok(RunStatus::Failed)
    }
}

/// Map CLI args to `NotesConfig`.
fn build_config(common: &CommonArgs, progress: Option<ProgressCallback>) -> Result<NotesConfig> {
    let mut builder = NotesConfig::builder()
        .dpi(common.dpi)
        .temperature(common.temperature)
        .max_tokens(common.max_tokens)
        .max_retries(common.max_retries)
        .api_timeout_secs(common.timeout)
        .context_char_budget(common.context_chars)
        .vision(!common.no_vision);

    if let Some(ref model) = common.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = common.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = common.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Placeholder session for `--no-ai`; otherwise resolve the provider and
/// make sure it answers before any slide is touched.
async fn build_session(common: &CommonArgs, config: NotesConfig) -> Result<Session> {
    if common.no_ai {
        if !common.quiet {
            eprintln!("{} Placeholder mode: no model will be called", dim("ℹ"));
        }
        return Ok(Session::placeholder(config));
    }

    let analyzer = LlmAnalyzer::from_config(&config).context("No usable LLM provider")?;
    analyzer
        .check_connection()
        .await
        .context("LLM connection test failed")?;
    if !common.quiet {
        eprintln!("{} Using {}", dim("ℹ"), analyzer.describe());
    }
    let extractor = Arc::new(PdfiumExtractor::from_config(&config));
    Ok(Session::new(config, extractor, Arc::new(analyzer)))
}

// ── Ensure PDFium engine is available ────────────────────────────────────────
// On the very first run the pdfium shared library (~30 MB) is downloaded and
// cached; later startups only check the cache path.
fn ensure_pdfium(quiet: bool) -> Result<()> {
    if pdfium_auto::is_pdfium_cached() {
        return Ok(());
    }
    if quiet {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download PDFium engine")?;
        return Ok(());
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.set_message("Connecting…");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(())
}
