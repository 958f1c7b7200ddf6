//! Post-processing: deterministic cleanup of model-generated notes.
//!
//! Models occasionally disobey the format rules in ways that are harmless
//! to a reader but break the document structure:
//!
//! - wrapping the answer in ` ```markdown ... ``` ` fences
//! - ending with their own `---` rule, which would double the separator
//! - inventing `![chart](chart.png)` links for visuals they can only describe
//! - CRLF line endings, zero-width spaces, runs of blank lines
//!
//! Each rule is a pure `&str → String` pass. Content is never rewritten,
//! only wrapping and whitespace.
//!
//! ## Rule Order
//!
//! Fences are stripped first so the remaining rules see the real content;
//! line endings are normalised before any line-based rule; the trailing-rule
//! pass runs after whitespace trimming so it sees the true last line.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw model answer.
///
/// Rules (applied in order):
/// 1. Strip outer markdown fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Replace fabricated image links with their alt text
/// 6. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 7. Drop trailing `---` rules
/// 8. End with exactly one newline
pub fn clean_markdown(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_hallucinated_images(&s);
    let s = remove_invisible_chars(&s);
    let s = strip_trailing_rules(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\r?\n(.*)\r?\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 5: Fabricated image links ───────────────────────────────────────────
//
// Notes describe visuals in prose; there are no image files to link to.
// Any `![alt](url)` whose url is not an absolute http(s) link becomes
// `*alt*` so the description survives.

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").unwrap());

fn is_placeholder_url(url: &str) -> bool {
    let u = url.trim();
    if !u.starts_with("http://") && !u.starts_with("https://") {
        return true;
    }
    ["example.com", "placeholder.com", "placehold.it", "dummyimage.com"]
        .iter()
        .any(|d| u.contains(d))
}

fn remove_hallucinated_images(input: &str) -> String {
    RE_IMAGE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let alt = caps[1].trim();
            if !is_placeholder_url(&caps[2]) {
                caps[0].to_string()
            } else if alt.is_empty() {
                String::new()
            } else {
                format!("*{}*", alt)
            }
        })
        .to_string()
}

// ── Rule 6: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 7: Drop trailing separators ─────────────────────────────────────────

fn strip_trailing_rules(input: &str) -> String {
    let mut s = input.trim_end();
    while let Some(rest) = s.strip_suffix("---") {
        if !(rest.is_empty() || rest.ends_with('\n')) {
            break;
        }
        s = rest.trim_end();
    }
    s.to_string()
}

// ── Rule 8: Ensure single final newline ──────────────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}\n", trimmed)
    }
}
