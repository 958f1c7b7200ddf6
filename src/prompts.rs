//! Prompt text for speaker-note generation.
//!
//! The user supplies the *what* (tone, audience, emphasis) in a prompt file.
//! This module appends the *shape*: the five labelled sections every slide
//! block must carry, which is what the engine validates and what the
//! checkpoint store uses as its resume marker. Keeping the wording here
//! means prompt regressions can be caught by unit tests without a model.

use crate::notes::{SLIDE_NARRATION, SLIDE_NUMBER, SLIDE_TEXT, SLIDE_TOPICS, SLIDE_VISUALS};

/// Format rules appended to the user's prompt in the system message.
pub fn format_instructions() -> String {
    format!(
        r#"## Required output format

Answer with exactly these five sections, in this order, using the labels verbatim:

{SLIDE_NUMBER} <the slide number>

{SLIDE_TEXT}
<the slide's text, cleaned up and faithfully transcribed>

{SLIDE_VISUALS}
<a description of every image, chart, diagram or other visual on the slide; write "None" if there are none>

{SLIDE_TOPICS}
*   <one bullet per key topic>

{SLIDE_NARRATION}
<what the presenter should say for this slide, written as natural spoken narration of at least a few sentences>

Rules:
- Output ONLY these sections. Do NOT wrap the answer in ```markdown fences.
- Do NOT add a trailing "---" separator; it is added for you.
- Keep the narration consistent with the previous slides summarised in the context, without repeating them."#
    )
}

/// Full system message: the user's prompt followed by the format rules.
pub fn system_prompt(user_prompt: &str) -> String {
    format!("{}\n\n{}", user_prompt.trim(), format_instructions())
}

/// Context message carrying the rolling summary of earlier slides.
pub fn context_message(context: &str) -> String {
    format!(
        "Previous slides, for continuity (most recent last):\n\n\"\"\"\n{}\n\"\"\"",
        context
    )
}

/// User turn for one slide.
pub fn slide_request(index: usize, text: &str, has_image: bool) -> String {
    let text = if text.trim().is_empty() {
        "[no extractable text on this slide]"
    } else {
        text
    };
    let image_note = if has_image {
        "\n\nThe rendered slide is attached as an image. Describe its visuals under the images/diagrams section."
    } else {
        ""
    };
    format!(
        "## Slide to analyze\n\n{SLIDE_NUMBER} {index}\n**Slide Content:**\n{text}{image_note}\n\n\
         Provide the analysis in the required format."
    )
}

/// One-line probe used to check a provider before a run.
pub const CONNECTION_PROBE: &str = "Reply with the single word OK.";
