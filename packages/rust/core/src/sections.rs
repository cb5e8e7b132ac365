//! Tolerant splitting of generated text into known sections.
//!
//! Markers are matched by first occurrence, each one searched after the
//! previous marker that was found. Inline markers ignore case; heading
//! markers must appear in the case given. Text under a missing
//! marker stays with the section before it, and text ahead of the first
//! marker belongs to the first section when that marker is missing. Nothing
//! here fails: malformed output yields empty or oversized sections.

use coursewatch_markdown::GuideSection;

/// Action plan response markers.
pub const ACTION_PLAN_MARKER: &str = "ACTION_PLAN:";
pub const TIPS_MARKER: &str = "TIPS:";

/// Study guide outline: (marker, rendered heading).
pub const GUIDE_OUTLINE: &[(&str, &str)] = &[
    ("KEY CONCEPTS", "Key Concepts"),
    ("KEY IDEAS", "Key Ideas & Theories"),
    ("MULTIPLE CHOICE", "Multiple Choice Practice Questions"),
    ("ANSWER KEY", "Answer Key"),
];

/// How a marker sits in the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerStyle {
    /// Content may start on the marker's own line (`TIPS: start early`).
    Inline,
    /// Marker is a heading; only a line starting with it, in the marker's own
    /// case, counts, and the rest of that line is dropped
    /// (`## 2. KEY IDEAS & THEORIES`). Prose such as `Key ideas in this unit`
    /// is body text.
    Heading,
}

/// Split `text` into one trimmed section per marker.
pub fn split_sections(text: &str, markers: &[&str], style: MarkerStyle) -> Vec<String> {
    let mut sections = vec![String::new(); markers.len()];
    if markers.is_empty() {
        return sections;
    }

    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let haystack = match style {
        MarkerStyle::Inline => text.to_ascii_lowercase(),
        MarkerStyle::Heading => text.to_string(),
    };
    let mut cursor = 0;
    let mut found: Vec<(usize, usize, usize)> = Vec::new();

    for (index, marker) in markers.iter().enumerate() {
        let needle = match style {
            MarkerStyle::Inline => marker.to_ascii_lowercase(),
            MarkerStyle::Heading => (*marker).to_string(),
        };
        if let Some((cut, body)) = find_marker(&haystack, &needle, cursor, style) {
            found.push((index, cut, body));
            cursor = body;
        }
    }

    let Some(&(first_index, first_cut, _)) = found.first() else {
        sections[0] = clean_section(text, style);
        return sections;
    };

    if first_index != 0 {
        sections[0] = clean_section(&text[..first_cut], style);
    }

    for (k, &(index, _, body)) in found.iter().enumerate() {
        let end = found.get(k + 1).map_or(text.len(), |&(_, cut, _)| cut);
        sections[index] = clean_section(&text[body..end], style);
    }

    sections
}

/// Locate `needle` at or after `from`; returns (where the previous section
/// ends, where this section's body starts).
fn find_marker(haystack: &str, needle: &str, from: usize, style: MarkerStyle) -> Option<(usize, usize)> {
    let mut search = from;

    while let Some(relative) = haystack[search..].find(needle) {
        let start = search + relative;
        let end = start + needle.len();
        let line_start = haystack[..start].rfind('\n').map_or(0, |i| i + 1).max(from);
        let decorated = haystack[line_start..start].chars().all(is_heading_decoration);

        match style {
            MarkerStyle::Inline => {
                let cut = if decorated { line_start } else { start };
                return Some((cut, end));
            }
            MarkerStyle::Heading if decorated => {
                let body = haystack[end..].find('\n').map_or(haystack.len(), |i| end + i + 1);
                return Some((line_start, body));
            }
            MarkerStyle::Heading => search = end,
        }
    }

    None
}

/// Characters allowed ahead of a marker on its line (`## `, `**`, `3. `).
fn is_heading_decoration(c: char) -> bool {
    c.is_whitespace() || c.is_ascii_digit() || matches!(c, '#' | '*' | '_' | '.' | ')')
}

fn clean_section(raw: &str, style: MarkerStyle) -> String {
    let trimmed = raw.trim();
    match style {
        MarkerStyle::Inline => trimmed
            .trim_start_matches([':', '*'])
            .trim()
            .to_string(),
        MarkerStyle::Heading => trimmed.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Typed parsers
// ---------------------------------------------------------------------------

/// Parsed short action plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPlan {
    pub plan: String,
    pub tips: String,
}

impl ActionPlan {
    /// Plan used whenever generation fails or returns nothing usable.
    pub fn fallback() -> Self {
        Self {
            plan: "1. Review requirements\n2. Complete work\n3. Submit".to_string(),
            tips: "• Start early\n• Check rubric".to_string(),
        }
    }
}

/// Parse an `ACTION_PLAN:` / `TIPS:` response. `None` when the response
/// carries no plan text at all.
pub fn parse_action_plan(response: &str) -> Option<ActionPlan> {
    let mut sections =
        split_sections(response, &[ACTION_PLAN_MARKER, TIPS_MARKER], MarkerStyle::Inline)
            .into_iter();
    let plan = sections.next().unwrap_or_default();
    let tips = sections.next().unwrap_or_default();

    if plan.is_empty() {
        return None;
    }
    Some(ActionPlan { plan, tips })
}

/// Split a study guide response into the four outline sections.
pub fn parse_study_guide(response: &str) -> Vec<GuideSection> {
    let markers: Vec<&str> = GUIDE_OUTLINE.iter().map(|(marker, _)| *marker).collect();
    split_sections(response, &markers, MarkerStyle::Heading)
        .into_iter()
        .zip(GUIDE_OUTLINE)
        .map(|(body, (_, heading))| GuideSection {
            heading: (*heading).to_string(),
            body,
        })
        .collect()
}
