//! Raw LMS response records.
//!
//! Every optional field is an `Option` because the API reports absent values
//! both as missing keys and as explicit `null`. Defaults are applied by the
//! accessor methods, never at deserialization time.

use serde::Deserialize;

use coursewatch_shared::{ContentContainer, ContentKind, ContentRef};

/// Display name used when the source omits one.
pub const UNNAMED: &str = "Unnamed";

/// Course name used when the source omits one.
pub const UNKNOWN_COURSE: &str = "Unknown";

/// URL used when the source provides no link.
pub const NO_URL: &str = "#";

// ---------------------------------------------------------------------------
// Courses & assignments
// ---------------------------------------------------------------------------

/// `GET /api/v1/courses` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseRecord {
    /// Missing for access-restricted enrollments.
    pub id: Option<u64>,
    pub name: Option<String>,
    pub workflow_state: Option<String>,
    pub end_at: Option<String>,
}

impl CourseRecord {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN_COURSE)
    }

    /// Completed or deleted courses carry no current work.
    pub fn is_closed(&self) -> bool {
        matches!(
            self.workflow_state.as_deref(),
            Some("completed") | Some("deleted")
        )
    }
}

/// `GET /api/v1/courses/:id/assignments` entry, also `GET .../assignments/:id`.
#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentRecord {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub due_at: Option<String>,
    pub unlock_at: Option<String>,
    pub points_possible: Option<f64>,
    pub description: Option<String>,
    pub html_url: Option<String>,
}

impl AssignmentRecord {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNNAMED)
    }

    pub fn points(&self) -> f64 {
        self.points_possible.unwrap_or(0.0)
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn html_url(&self) -> &str {
        self.html_url.as_deref().unwrap_or(NO_URL)
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// `GET /api/v1/planner/items` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerRecord {
    pub context_name: Option<String>,
    pub course_id: Option<u64>,
    pub plannable_date: Option<String>,
    /// Relative link to the item in the web UI.
    pub html_url: Option<String>,
    #[serde(default)]
    pub plannable: Option<PlannableRecord>,
}

/// The `plannable` object nested in a planner item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlannableRecord {
    pub title: Option<String>,
    pub points_possible: Option<f64>,
    pub html_url: Option<String>,
    pub description: Option<String>,
}

impl PlannerRecord {
    pub fn title(&self) -> &str {
        self.plannable
            .as_ref()
            .and_then(|p| p.title.as_deref())
            .unwrap_or(UNNAMED)
    }

    pub fn container_name(&self) -> &str {
        self.context_name.as_deref().unwrap_or(UNKNOWN_COURSE)
    }

    pub fn points(&self) -> f64 {
        self.plannable
            .as_ref()
            .and_then(|p| p.points_possible)
            .unwrap_or(0.0)
    }

    pub fn description(&self) -> &str {
        self.plannable
            .as_ref()
            .and_then(|p| p.description.as_deref())
            .unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Modules & content
// ---------------------------------------------------------------------------

/// `GET /api/v1/courses/:id/modules?include[]=items` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleRecord {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub unlock_at: Option<String>,
    #[serde(default)]
    pub items: Option<Vec<ModuleItemRecord>>,
}

/// One item inside a module.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleItemRecord {
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub title: Option<String>,
    /// API URL of the item (pages: `.../pages/<slug>`).
    pub url: Option<String>,
    pub html_url: Option<String>,
    /// Page slug, present on `Page` items.
    pub page_url: Option<String>,
    pub content_id: Option<u64>,
}

impl ModuleItemRecord {
    /// Map to a [`ContentRef`]; items of other kinds (files, links, headers) yield `None`.
    pub fn to_content_ref(&self) -> Option<ContentRef> {
        let title = self.title.clone().unwrap_or_else(|| "Item".to_string());
        match self.item_type.as_deref()? {
            "Page" => {
                let slug = self.page_url.clone().or_else(|| {
                    self.url
                        .as_deref()
                        .or(self.html_url.as_deref())
                        .and_then(last_path_segment)
                })?;
                Some(ContentRef {
                    kind: ContentKind::Page,
                    title,
                    locator: slug,
                })
            }
            "Assignment" => Some(ContentRef {
                kind: ContentKind::Assignment,
                title,
                locator: self.content_id?.to_string(),
            }),
            "Discussion" => Some(ContentRef {
                kind: ContentKind::Discussion,
                title,
                locator: self.content_id?.to_string(),
            }),
            _ => None,
        }
    }
}

impl ModuleRecord {
    pub fn into_container(self) -> ContentContainer {
        let entries = self
            .items
            .unwrap_or_default()
            .iter()
            .filter_map(ModuleItemRecord::to_content_ref)
            .collect();

        ContentContainer {
            id: self.id.map(|id| id.to_string()).unwrap_or_default(),
            name: self.name.unwrap_or_else(|| "Module".to_string()),
            unlock_at: self.unlock_at,
            entries,
        }
    }
}

/// `GET /api/v1/courses/:id/pages/:slug` body.
#[derive(Debug, Clone, Deserialize)]
pub struct PageRecord {
    pub title: Option<String>,
    pub body: Option<String>,
    /// Scheduled publication, when the page uses one.
    pub publish_at: Option<String>,
}

/// `GET /api/v1/courses/:id/discussion_topics/:id` body.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscussionRecord {
    pub title: Option<String>,
    pub message: Option<String>,
    pub delayed_post_at: Option<String>,
    pub posted_at: Option<String>,
}

/// Last non-empty path segment of a URL or path, ignoring any query string.
fn last_path_segment(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(String::from)
}
