//! Text extraction and Markdown rendering for LMS content.
//!
//! LMS pages, assignment descriptions and discussion prompts arrive as HTML.
//! This crate turns them into:
//! - plain text for prompts and deduplication ([`clean_html`])
//! - Markdown for exported documents ([`html_to_markdown`], [`render_study_guide`])
//!
//! It also owns the naming rules for exported artifacts.

mod cleanup;
mod guide;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node};
use tracing::debug;

use coursewatch_shared::{CourseWatchError, Result};

pub use guide::{GuideSection, StudyGuideDoc, render_study_guide};

/// Elements whose text never reaches the output.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Elements that separate words when flattened to text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

// ---------------------------------------------------------------------------
// Plain text
// ---------------------------------------------------------------------------

/// Strip all markup from an HTML fragment and collapse whitespace.
///
/// Entities are decoded, script/style content is dropped, and block elements
/// act as word separators. The result has no leading/trailing whitespace and
/// no runs of more than one space.
pub fn clean_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let fragment = Html::parse_fragment(html);
    let mut text = String::with_capacity(html.len());
    collect_text(fragment.root_element(), &mut text);

    collapse_whitespace(&text)
}

/// Depth-first text collection below `element`.
fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                let is_block = BLOCK_ELEMENTS.contains(&name);
                if is_block {
                    out.push(' ');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
                if is_block {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

/// Replace every whitespace run with a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    WS_RE.replace_all(text, " ").trim().to_string()
}

/// First `max_chars` characters of `text` (char-boundary safe).
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

/// Convert an HTML fragment (e.g. an exam description) to Markdown.
///
/// Headings are nested at `min_heading_level` or deeper so the result can be
/// embedded in a larger document.
pub fn html_to_markdown(html: &str, min_heading_level: usize) -> Result<String> {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "nav", "iframe", "noscript", "svg"])
        .build();

    let raw_markdown = converter
        .convert(html)
        .map_err(|e| CourseWatchError::Conversion(format!("htmd conversion failed: {e}")))?;

    debug!(raw_len = raw_markdown.len(), "htmd conversion complete");

    Ok(cleanup::run_pipeline(&raw_markdown, min_heading_level))
}

/// Normalize generated Markdown-ish text for embedding under a parent heading.
pub fn normalize_generated(text: &str, min_heading_level: usize) -> String {
    cleanup::run_pipeline(text, min_heading_level)
}

// ---------------------------------------------------------------------------
// Artifact naming
// ---------------------------------------------------------------------------

/// Sanitize an assessment name for use in a file name.
///
/// Keeps `[A-Za-z0-9 _-]`, then collapses runs of spaces and hyphens into a
/// single hyphen. Leading/trailing hyphens are dropped; an empty result
/// becomes `untitled`.
pub fn sanitize_file_stem(name: &str) -> String {
    static SEPARATOR_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[-\s]+").expect("valid regex"));

    let kept: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();

    let collapsed = SEPARATOR_RE.replace_all(&kept, "-");
    let stem = collapsed.trim_matches('-');

    if stem.is_empty() {
        "untitled".to_string()
    } else {
        stem.to_string()
    }
}

/// File name of the exported study guide for an assessment.
pub fn study_guide_file_name(assessment_name: &str) -> String {
    format!(
        "{}-COMPREHENSIVE-study-guide.md",
        sanitize_file_stem(assessment_name)
    )
}
