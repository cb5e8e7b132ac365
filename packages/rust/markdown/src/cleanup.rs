//! Cleanup pipeline for Markdown produced from LMS HTML or generated text.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on raw Markdown text.
///
/// `min_heading_level` is the shallowest heading allowed in the output; any
/// heading above it is pushed down so the text nests under a parent document.
pub(crate) fn run_pipeline(md: &str, min_heading_level: usize) -> String {
    let mut result = md.to_string();

    result = nest_headings(&result, min_heading_level);
    result = bold_lines_to_headings(&result, min_heading_level);
    result = strip_leftover_html(&result);
    result = normalize_whitespace(&result);
    result = clean_blank_lines(&result);
    result = ensure_trailing_newline(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Nest heading levels
// ---------------------------------------------------------------------------

/// Shift headings so none is shallower than `min_level` (capped at H6).
fn nest_headings(md: &str, min_level: usize) -> String {
    static H_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("valid regex"));

    let mut in_code_block = false;
    let mut lines: Vec<String> = Vec::new();

    for line in md.lines() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
        }
        if !in_code_block {
            if let Some(caps) = H_RE.captures(line) {
                let level = caps[1].len().max(min_level).min(6);
                lines.push(format!("{} {}", "#".repeat(level), caps[2].trim()));
                continue;
            }
        }
        lines.push(line.to_string());
    }

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 2: Promote standalone bold lines
// ---------------------------------------------------------------------------

/// Generated text often marks headers as `**Header**` on a line of its own.
fn bold_lines_to_headings(md: &str, level: usize) -> String {
    static BOLD_LINE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\*\*([^*]+)\*\*:?$").expect("valid regex"));

    let hashes = "#".repeat(level.min(6));
    md.lines()
        .map(|line| match BOLD_LINE_RE.captures(line.trim()) {
            Some(caps) => format!("{hashes} {}", caps[1].trim()),
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 3: Strip leftover HTML tags
// ---------------------------------------------------------------------------

/// Remove stray container tags that survived the conversion, keeping their text.
fn strip_leftover_html(md: &str) -> String {
    static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"</?(?:div|span|section|article|aside|header|footer|figure|figcaption|details|summary|font|center)(?:\s[^>]*)?>")
            .expect("valid regex")
    });

    let mut result = String::new();
    let mut in_code_block = false;

    for line in md.lines() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
        }
        if in_code_block {
            result.push_str(line);
        } else {
            result.push_str(&HTML_TAG_RE.replace_all(line, ""));
        }
        result.push('\n');
    }

    if result.ends_with('\n') {
        result.pop();
    }

    result
}

// ---------------------------------------------------------------------------
// Pass 4: Normalize whitespace
// ---------------------------------------------------------------------------

/// Trim trailing whitespace on every line and drop `\r`.
fn normalize_whitespace(md: &str) -> String {
    md.lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 5: Collapse blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of 2+ blank lines into exactly 1.
fn clean_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Pass 6: Ensure trailing newline
// ---------------------------------------------------------------------------

/// Ensure the text ends with exactly one newline.
fn ensure_trailing_newline(md: &str) -> String {
    let trimmed = md.trim_end_matches('\n');
    format!("{trimmed}\n")
}
