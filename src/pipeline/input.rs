//! Input validation: PDFs, input directories and prompt files.
//!
//! Everything here fails fast, before any slide is extracted, so that a
//! typo on the command line surfaces as a clear error rather than a pdfium
//! crash halfway through a batch. Input must stay on disk for the whole run
//! because a resumed run reads it again.

use crate::config::short_digest;
use crate::error::NotesError;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Check that `path` is a readable, non-empty file that starts with `%PDF`.
pub fn validate_pdf(path: &Path) -> Result<(), NotesError> {
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(NotesError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => {
            return Err(NotesError::FileNotFound {
                path: path.to_path_buf(),
            })
        }
    };

    if !meta.is_file() {
        return Err(NotesError::InvalidInput {
            path: path.to_path_buf(),
            reason: "not a regular file".into(),
        });
    }
    if !has_pdf_extension(path) {
        return Err(NotesError::InvalidInput {
            path: path.to_path_buf(),
            reason: "expected a .pdf file".into(),
        });
    }
    if meta.len() == 0 {
        return Err(NotesError::InvalidInput {
            path: path.to_path_buf(),
            reason: "file is empty".into(),
        });
    }

    match fs::File::open(path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(NotesError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(NotesError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(NotesError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    debug!("Validated PDF: {}", path.display());
    Ok(())
}

/// All `*.pdf` files directly inside `dir`, sorted by file name
/// (case-insensitive). Subdirectories are not searched.
pub fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>, NotesError> {
    if !dir.is_dir() {
        return Err(NotesError::InvalidDirectory {
            path: dir.to_path_buf(),
            reason: if dir.exists() {
                "not a directory".into()
            } else {
                "directory not found".into()
            },
        });
    }

    let entries = fs::read_dir(dir).map_err(|e| NotesError::InvalidDirectory {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut pdfs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_pdf_extension(p))
        .collect();
    pdfs.sort_by_key(|p| {
        let name = p
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        (name.to_lowercase(), name)
    });

    info!("Found {} PDF file(s) in {}", pdfs.len(), dir.display());
    Ok(pdfs)
}

/// Read the user's prompt file. Must exist and contain non-blank text.
pub fn load_prompt(path: &Path) -> Result<String, NotesError> {
    let invalid = |reason: String| NotesError::InvalidPrompt {
        path: path.to_path_buf(),
        reason,
    };

    if !path.exists() {
        return Err(invalid("file not found".into()));
    }
    if !path.is_file() {
        return Err(invalid("not a regular file".into()));
    }
    let ext_ok = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("md"))
        .unwrap_or(false);
    if !ext_ok {
        warn!("Prompt file {} is not a .md file; using it anyway", path.display());
    }

    let prompt = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    if prompt.trim().is_empty() {
        return Err(invalid("file is empty".into()));
    }
    debug!("Loaded prompt ({} chars) from {}", prompt.len(), path.display());
    Ok(prompt)
}

/// Digest stored in checkpoints to notice a prompt edited between runs.
pub fn prompt_checksum(prompt: &str) -> String {
    short_digest(prompt.as_bytes())
}

/// Ensure an output directory exists.
pub fn ensure_output_dir(dir: &Path) -> Result<(), NotesError> {
    fs::create_dir_all(dir).map_err(|source| NotesError::OutputWriteFailed {
        path: dir.to_path_buf(),
        source,
    })
}
