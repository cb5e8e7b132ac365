//! Core domain types shared by the collector, classifiers, and curator.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use url::Url;

use crate::error::{CourseWatchError, Result};

/// Literal timestamp format used by the LMS for every instant it reports.
pub const SOURCE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Parse an LMS timestamp (`2026-01-25T10:00:00Z`) as a UTC instant.
///
/// Only the exact literal format is accepted; offsets, fractional seconds and
/// date-only strings are parse errors.
pub fn parse_source_instant(raw: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, SOURCE_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| CourseWatchError::parse(format!("invalid timestamp '{raw}': {e}")))
}

// ---------------------------------------------------------------------------
// SourceInstance
// ---------------------------------------------------------------------------

/// One configured LMS instance: base address plus bearer credential.
#[derive(Clone)]
pub struct SourceInstance {
    /// Display name used in logs and to route curation back to the instance.
    pub name: String,
    /// Base URL, e.g. `https://school.instructure.com`.
    pub base_url: Url,
    /// Bearer token.
    pub token: String,
}

impl std::fmt::Debug for SourceInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceInstance")
            .field("name", &self.name)
            .field("base_url", &self.base_url.as_str())
            .field("token", &"***")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// WorkItem
// ---------------------------------------------------------------------------

/// Which retrieval method produced a [`WorkItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOrigin {
    /// Pre-aggregated planner view.
    Planner,
    /// Exhaustive per-course assignment enumeration.
    Enumeration,
}

/// A unit of assignable academic work, normalized from either retrieval method.
#[derive(Debug, Clone, Serialize)]
pub struct WorkItem {
    pub name: String,
    /// Owning course/section name.
    pub container_name: String,
    /// Deadline exactly as the source reported it.
    pub due_at: Option<String>,
    pub points: f64,
    /// Raw HTML description.
    pub description: String,
    pub reference_url: String,
    /// Name of the source instance this item came from.
    pub source: String,
    /// Course id on the source instance, when known.
    pub container_id: Option<u64>,
    pub origin: ItemOrigin,
    /// Deadline in the run's zone. Set by the temporal classifier only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at_local: Option<DateTime<Tz>>,
    /// Calendar date of `due_at_local`. Set by the temporal classifier only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date_local: Option<NaiveDate>,
}

impl WorkItem {
    /// Identity used for cross-source deduplication: `(name, due_at)` verbatim.
    pub fn identity_key(&self) -> (&str, Option<&str>) {
        (self.name.as_str(), self.due_at.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Kind of study material inside a content container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ContentKind {
    Page,
    Assignment,
    Discussion,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "Page",
            Self::Assignment => "Assignment",
            Self::Discussion => "Discussion",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pointer to a piece of content inside a container, before its body is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRef {
    pub kind: ContentKind,
    pub title: String,
    /// Page slug for pages, numeric content id for assignments and discussions.
    pub locator: String,
}

/// A module/unit grouping content, as enumerated from the source.
#[derive(Debug, Clone)]
pub struct ContentContainer {
    pub id: String,
    pub name: String,
    /// Raw unlock timestamp, if the source exposes one.
    pub unlock_at: Option<String>,
    pub entries: Vec<ContentRef>,
}

/// Fetched body of a [`ContentRef`].
#[derive(Debug, Clone, Default)]
pub struct ContentBody {
    pub title: String,
    /// Raw HTML body, description, or prompt.
    pub html: String,
    /// Item-level publish/unlock timestamp, raw.
    pub publish_at: Option<String>,
}

/// Curated study material with cleaned text.
#[derive(Debug, Clone, Serialize)]
pub struct ContentItem {
    pub kind: ContentKind,
    pub title: String,
    pub container_name: String,
    /// Markup-free, whitespace-collapsed text.
    pub text: String,
    pub publish_instant: Option<DateTime<Utc>>,
}

/// Metadata of the assessment a curation was run for.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentMeta {
    pub name: String,
    pub container_name: String,
    pub description: String,
    pub points: f64,
    pub deadline: DateTime<Tz>,
}

/// Ordered pre-deadline content for one major assessment.
#[derive(Debug, Clone, Serialize)]
pub struct CurationResult {
    pub assessment: AssessmentMeta,
    pub items: Vec<ContentItem>,
}

impl CurationResult {
    /// An empty result means "no prior content available", not an error.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn item(name: &str, due_at: Option<&str>) -> WorkItem {
        WorkItem {
            name: name.into(),
            container_name: "BIO 101".into(),
            due_at: due_at.map(String::from),
            points: 0.0,
            description: String::new(),
            reference_url: "#".into(),
            source: "main".into(),
            container_id: None,
            origin: ItemOrigin::Enumeration,
            due_at_local: None,
            due_date_local: None,
        }
    }

    #[test]
    fn parse_source_instant_accepts_literal_format() {
        let instant = parse_source_instant("2026-01-25T10:00:00Z").expect("parse");
        assert_eq!(instant.year(), 2026);
        assert_eq!(instant.hour(), 10);
    }

    #[test]
    fn parse_source_instant_rejects_other_formats() {
        assert!(parse_source_instant("2026-01-25T10:00:00+00:00").is_err());
        assert!(parse_source_instant("2026-01-25T10:00:00.000Z").is_err());
        assert!(parse_source_instant("2026-01-25").is_err());
        assert!(parse_source_instant("").is_err());
    }

    #[test]
    fn identity_key_is_verbatim() {
        let a = item("Essay 1", Some("2026-02-01T23:59:00Z"));
        let b = item("Essay 1", Some("2026-02-01T23:59:00Z"));
        let c = item("essay 1", Some("2026-02-01T23:59:00Z"));
        assert_eq!(a.identity_key(), b.identity_key());
        assert_ne!(a.identity_key(), c.identity_key());
        assert_eq!(item("x", None).identity_key(), ("x", None));
    }

    #[test]
    fn source_instance_debug_redacts_token() {
        let instance = SourceInstance {
            name: "main".into(),
            base_url: Url::parse("https://canvas.example.edu").unwrap(),
            token: "secret-token-value".into(),
        };
        let debug = format!("{instance:?}");
        assert!(!debug.contains("secret-token-value"));
        assert!(debug.contains("***"));
    }
}
