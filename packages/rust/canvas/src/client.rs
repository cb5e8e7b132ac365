//! Authenticated HTTP client for one LMS instance.
//!
//! Every list endpoint is paginated through the `Link: <...>; rel="next"`
//! response header. Pagination stops after [`MAX_PAGES`] pages, at the first
//! page without a `next` link, or at a link pointing at another origin (the
//! bearer token is never sent off-instance).

use std::sync::LazyLock;
use std::time::Duration;

use chrono::NaiveDate;
use regex::Regex;
use reqwest::Client;
use reqwest::header::LINK;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use coursewatch_shared::{
    ContentBody, ContentContainer, ContentKind, ContentRef, CourseWatchError, Result,
    SourceInstance,
};

use crate::records::{
    AssignmentRecord, CourseRecord, DiscussionRecord, ModuleRecord, NO_URL, PageRecord,
    PlannerRecord,
};

/// User-Agent string for LMS requests.
const USER_AGENT: &str = concat!("CourseWatch/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Upper bound on pages followed for one list endpoint.
pub const MAX_PAGES: usize = 50;

/// Page size requested from list endpoints.
const PER_PAGE: &str = "100";

// ---------------------------------------------------------------------------
// CanvasClient
// ---------------------------------------------------------------------------

/// Read-only API client bound to a single [`SourceInstance`].
#[derive(Debug, Clone)]
pub struct CanvasClient {
    client: Client,
    instance: SourceInstance,
}

impl CanvasClient {
    /// Create a client for `instance`.
    pub fn new(instance: SourceInstance) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| CourseWatchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, instance })
    }

    /// The instance this client talks to.
    pub fn instance(&self) -> &SourceInstance {
        &self.instance
    }

    /// Resolve a possibly relative web link against the instance base URL.
    ///
    /// Missing or unparseable links become `#`.
    pub fn absolute_url(&self, link: Option<&str>) -> String {
        match link.map(str::trim).filter(|l| !l.is_empty()) {
            Some(link) => self
                .instance
                .base_url
                .join(link)
                .map(String::from)
                .unwrap_or_else(|_| NO_URL.to_string()),
            None => NO_URL.to_string(),
        }
    }

    // -- courses & assignments ----------------------------------------------

    /// Courses with an active enrollment.
    #[instrument(skip_all, fields(instance = %self.instance.name))]
    pub async fn list_courses(&self) -> Result<Vec<CourseRecord>> {
        let url = self.endpoint(&["api", "v1", "courses"], &[("enrollment_state", "active")])?;
        self.get_paginated(url).await
    }

    /// Every assignment of a course, regardless of due date.
    #[instrument(skip_all, fields(instance = %self.instance.name, course_id = course_id))]
    pub async fn list_assignments(&self, course_id: u64) -> Result<Vec<AssignmentRecord>> {
        let id = course_id.to_string();
        let url = self.endpoint(&["api", "v1", "courses", &id, "assignments"], &[])?;
        self.get_paginated(url).await
    }

    /// Planner items with a date in `[start, end]`.
    #[instrument(skip_all, fields(instance = %self.instance.name, start = %start, end = %end))]
    pub async fn planner_items(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<PlannerRecord>> {
        let start = start.format("%Y-%m-%d").to_string();
        let end = end.format("%Y-%m-%d").to_string();
        let url = self.endpoint(
            &["api", "v1", "planner", "items"],
            &[("start_date", &start), ("end_date", &end)],
        )?;
        self.get_paginated(url).await
    }

    // -- modules & content --------------------------------------------------

    /// Modules of a course with their items inlined.
    #[instrument(skip_all, fields(instance = %self.instance.name, course_id = course_id))]
    pub async fn list_modules(&self, course_id: u64) -> Result<Vec<ModuleRecord>> {
        let id = course_id.to_string();
        let url = self.endpoint(
            &["api", "v1", "courses", &id, "modules"],
            &[("include[]", "items")],
        )?;
        self.get_paginated(url).await
    }

    pub async fn fetch_page(&self, course_id: u64, slug: &str) -> Result<PageRecord> {
        let id = course_id.to_string();
        let url = self.endpoint(&["api", "v1", "courses", &id, "pages", slug], &[])?;
        self.get_one(url).await
    }

    pub async fn fetch_assignment(&self, course_id: u64, assignment_id: &str) -> Result<AssignmentRecord> {
        let id = course_id.to_string();
        let url = self.endpoint(
            &["api", "v1", "courses", &id, "assignments", assignment_id],
            &[],
        )?;
        self.get_one(url).await
    }

    pub async fn fetch_discussion(&self, course_id: u64, topic_id: &str) -> Result<DiscussionRecord> {
        let id = course_id.to_string();
        let url = self.endpoint(
            &["api", "v1", "courses", &id, "discussion_topics", topic_id],
            &[],
        )?;
        self.get_one(url).await
    }

    /// Modules of a course as content containers.
    pub async fn content_containers(&self, course_id: u64) -> Result<Vec<ContentContainer>> {
        let modules = self.list_modules(course_id).await?;
        Ok(modules.into_iter().map(ModuleRecord::into_container).collect())
    }

    /// Fetch the body of one content reference.
    pub async fn content_body(&self, course_id: u64, entry: &ContentRef) -> Result<ContentBody> {
        let body = match entry.kind {
            ContentKind::Page => {
                let page = self.fetch_page(course_id, &entry.locator).await?;
                ContentBody {
                    title: page.title.unwrap_or_else(|| entry.title.clone()),
                    html: page.body.unwrap_or_default(),
                    publish_at: page.publish_at,
                }
            }
            ContentKind::Assignment => {
                let assignment = self.fetch_assignment(course_id, &entry.locator).await?;
                ContentBody {
                    title: assignment.name.unwrap_or_else(|| entry.title.clone()),
                    html: assignment.description.unwrap_or_default(),
                    publish_at: assignment.unlock_at,
                }
            }
            ContentKind::Discussion => {
                let topic = self.fetch_discussion(course_id, &entry.locator).await?;
                ContentBody {
                    title: topic.title.unwrap_or_else(|| entry.title.clone()),
                    html: topic.message.unwrap_or_default(),
                    publish_at: topic.delayed_post_at.or(topic.posted_at),
                }
            }
        };
        Ok(body)
    }

    // -- transport ----------------------------------------------------------

    /// Build an API URL from path segments (percent-encoded) and query pairs.
    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.instance.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                CourseWatchError::config(format!(
                    "instance '{}' base url cannot carry a path",
                    self.instance.name
                ))
            })?
            .pop_if_empty()
            .extend(segments);

        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("per_page", PER_PAGE);
        }

        Ok(url)
    }

    /// Follow `rel="next"` links and concatenate every page.
    ///
    /// A failure on the first page is an error. A failure on a later page
    /// keeps what was already read.
    async fn get_paginated<T: DeserializeOwned>(&self, first: Url) -> Result<Vec<T>> {
        let (mut all, mut next): (Vec<T>, Option<Url>) = self.get_page(&first).await?;
        let mut pages = 1;

        while let Some(url) = next.take() {
            if pages >= MAX_PAGES {
                warn!(%first, pages, "page cap reached, truncating list");
                break;
            }
            if url.origin() != self.instance.base_url.origin() {
                warn!(next = %url, "next link leaves the instance, ignoring");
                break;
            }
            match self.get_page::<Vec<T>>(&url).await {
                Ok((items, following)) => {
                    all.extend(items);
                    next = following;
                    pages += 1;
                }
                Err(e) => {
                    warn!(error = %e, pages, "pagination failed, keeping pages already read");
                    break;
                }
            }
        }

        debug!(url = %first, pages, items = all.len(), "list fetched");
        Ok(all)
    }

    async fn get_one<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        self.get_page(&url).await.map(|(value, _)| value)
    }

    /// One authenticated GET, decoded as `T`, plus the `next` link if any.
    async fn get_page<T: DeserializeOwned>(&self, url: &Url) -> Result<(T, Option<Url>)> {
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&self.instance.token)
            .send()
            .await
            .map_err(|e| CourseWatchError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CourseWatchError::Network(format!("{url}: HTTP {status}")));
        }

        let next = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_link);

        let value = response
            .json::<T>()
            .await
            .map_err(|e| CourseWatchError::parse(format!("{url}: unexpected response body: {e}")))?;

        Ok((value, next))
    }
}

/// Extract the `rel="next"` target from a `Link` header value.
fn next_link(header: &str) -> Option<Url> {
    static NEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"<([^>]+)>\s*;\s*rel="?next"?"#).expect("valid regex")
    });

    header
        .split(',')
        .find_map(|part| NEXT_RE.captures(part.trim()))
        .and_then(|caps| Url::parse(&caps[1]).ok())
}
