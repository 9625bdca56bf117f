//! CLI output formatting.
//!
//! Each command has a `format_*` function returning `Vec<String>` and a
//! `print_*` wrapper that writes to stdout. Format functions are pure so the
//! exact lines can be asserted in tests. Warnings are not printed here; they
//! go through `log` when they happen.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Images (2)
//! 001 20241201.png
//! 002 20241202.png
//!
//! Feed
//!     https://gist.githubusercontent.com/pappater/abc123/raw/art_prompts.json
//!
//! Template
//!     index.html: updated
//! ```
//!
//! ## Generate
//!
//! ```text
//! [1/4] Selected art style: Ukiyo-e
//! [2/4] Generated art concept:
//!     A great wave curls over a line of fishing boats...
//! [3/4] Saved to gist: https://gist.github.com/pappater/abc123#art_prompt_20241201_093000.md
//! [4/4] Image saved: images/20241201093000.png
//!
//! Art Style: Ukiyo-e
//! Prompt:    https://gist.github.com/pappater/abc123#art_prompt_20241201_093000.md
//! Image:     images/20241201093000.png
//! ```

use crate::build::{BuildMode, BuildReport};
use crate::generate::{GenerateEvent, GenerateSummary};
use crate::inject::FeedOutcome;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate text to `max` characters, appending `...` if truncated.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte, _)) => format!("{}...", &text[..byte]),
        None => text.to_string(),
    }
}

// ============================================================================
// Build
// ============================================================================

/// Format the result of `build` or `check`.
pub fn format_build_output(report: &BuildReport) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push(format!("Images ({})", report.images.len()));
    if report.images.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
    }
    for (i, name) in report.images.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), name));
    }

    lines.push(String::new());
    lines.push("Feed".to_string());
    let feed_line = match (&report.feed_url, report.feed) {
        (Some(url), FeedOutcome::Injected) => url.clone(),
        (Some(url), _) => format!("{url} (no feed markers in template)"),
        (None, _) => "not configured".to_string(),
    };
    lines.push(format!("{}{}", indent(1), feed_line));

    lines.push(String::new());
    lines.push("Template".to_string());
    let status = match (report.mode, report.changed) {
        (BuildMode::Write, true) => "updated",
        (BuildMode::Write, false) => "unchanged",
        (BuildMode::Check, true) => "valid, out of date",
        (BuildMode::Check, false) => "valid, up to date",
    };
    lines.push(format!(
        "{}{}: {}",
        indent(1),
        report.template.display(),
        status
    ));

    lines
}

pub fn print_build_output(report: &BuildReport) {
    for line in format_build_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Generate
// ============================================================================

/// Characters of the concept shown in progress output.
const CONCEPT_PREVIEW: usize = 150;

/// Format one progress event of a generation run.
pub fn format_generate_event(event: &GenerateEvent) -> Vec<String> {
    match event {
        GenerateEvent::StyleSelected(style) => {
            vec![format!("[1/4] Selected art style: {}", style)]
        }
        GenerateEvent::ConceptGenerated(concept) => vec![
            "[2/4] Generated art concept:".to_string(),
            format!("{}{}", indent(1), truncate(concept, CONCEPT_PREVIEW)),
        ],
        GenerateEvent::PromptPublished(url) => vec![format!("[3/4] Saved to gist: {}", url)],
        GenerateEvent::ImageSkipped => vec![format!(
            "[4/4] Skipping image generation ({}=true)",
            crate::generate::SKIP_IMAGES_ENV
        )],
        GenerateEvent::ImageSaved(path) => {
            vec![format!("[4/4] Image saved: {}", path.display())]
        }
        GenerateEvent::ImageFailed(reason) => vec![
            format!("[4/4] Image generation failed: {}", reason),
            format!(
                "{}The concept is saved to the gist and can be used with other tools.",
                indent(1)
            ),
        ],
    }
}

/// Format the closing summary of a generation run.
pub fn format_generate_summary(summary: &GenerateSummary) -> Vec<String> {
    let image = match &summary.image_path {
        Some(path) => path.display().to_string(),
        None => "not generated (use the prompt with another tool)".to_string(),
    };
    vec![
        format!("Art Style: {}", summary.art_style),
        format!("Prompt:    {}", summary.gist_url),
        format!("Image:     {}", image),
    ]
}

pub fn print_generate_summary(summary: &GenerateSummary) {
    for line in format_generate_summary(summary) {
        println!("{}", line);
    }
}
