//! Collaborator stages around the resumable engine.
//!
//! Each submodule does exactly one job and can be tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ llm ──▶ postprocess
//! (validate) (pdfium)  (LLM)   (cleanup)
//! ```
//!
//! 1. [`input`]   : validate PDFs, discover a directory, load the prompt
//! 2. [`extract`] : text, visual-element count and PNG rendering per slide;
//!    runs in `spawn_blocking` because pdfium is not async-safe
//! 3. [`llm`]     : one chat call per slide with retry/backoff/timeout; the
//!    only stage with network I/O
//! 4. [`postprocess`] : deterministic cleanup of the model's answer

pub mod extract;
pub mod input;
pub mod llm;
pub mod postprocess;
