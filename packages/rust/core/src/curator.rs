//! Pre-deadline study material curation for major assessments.
//!
//! Only material available before the assessment deadline (the cutoff) is
//! kept:
//! - containers on the denylist are skipped by name;
//! - a dated container is admitted only if it unlocked strictly before the
//!   cutoff, an undated one only if its name carries a week/chapter/module
//!   marker;
//! - an item with its own publish instant must also precede the cutoff.
//!
//! Fetch failures skip the affected container or item. An empty result means
//! "no prior content available".

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument, warn};

use coursewatch_canvas::CanvasClient;
use coursewatch_markdown::{clean_html, truncate_chars};
use coursewatch_shared::{
    AssessmentMeta, ContentBody, ContentContainer, ContentItem, ContentRef, CurationResult,
    Result, RunConfig, WorkItem, parse_source_instant,
};

use crate::collector;

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// Where curation reads containers and content bodies from.
#[allow(async_fn_in_trait)]
pub trait ContentSource {
    /// Containers in enumeration order.
    async fn list_containers(&self) -> Result<Vec<ContentContainer>>;

    /// Body of one entry of a container.
    async fn fetch(&self, entry: &ContentRef) -> Result<ContentBody>;
}

/// Capability injected into the pipeline: curate material for one major item.
#[allow(async_fn_in_trait)]
pub trait Curator {
    async fn curate(&self, item: &WorkItem, cutoff: DateTime<Utc>) -> CurationResult;
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// How a container relates to the cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Unlocked strictly before the cutoff.
    Dated(DateTime<Utc>),
    /// No unlock instant, admitted by a lexical marker in its name.
    Undated,
    Rejected,
}

/// Whether a container name matches the non-substantive denylist.
pub fn is_denied(name: &str, config: &RunConfig) -> bool {
    let name = name.to_lowercase();
    config.curation_denylist.iter().any(|term| name.contains(term))
}

/// Decide whether `container` may contribute material for `cutoff`.
pub fn admit(container: &ContentContainer, cutoff: DateTime<Utc>, config: &RunConfig) -> Admission {
    if is_denied(&container.name, config) {
        return Admission::Rejected;
    }

    match container.unlock_at.as_deref() {
        Some(raw) => match parse_source_instant(raw) {
            Ok(unlock) if unlock < cutoff => Admission::Dated(unlock),
            Ok(_) => Admission::Rejected,
            Err(e) => {
                warn!(container = %container.name, error = %e, "unreadable unlock date, excluding container");
                Admission::Rejected
            }
        },
        None => {
            let name = container.name.to_lowercase();
            if config.fallback_markers.iter().any(|m| name.contains(m)) {
                Admission::Undated
            } else {
                Admission::Rejected
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Curation
// ---------------------------------------------------------------------------

/// Curate the material `source` exposes before `cutoff`, for `assessment`.
#[instrument(skip_all, fields(assessment = %assessment.name, cutoff = %cutoff))]
pub async fn curate<S: ContentSource>(
    source: &S,
    assessment: AssessmentMeta,
    cutoff: DateTime<Utc>,
    config: &RunConfig,
) -> CurationResult {
    let containers = match source.list_containers().await {
        Ok(containers) => containers,
        Err(e) => {
            warn!(error = %e, "container listing failed, no material curated");
            return CurationResult {
                assessment,
                items: Vec::new(),
            };
        }
    };

    let mut items = Vec::new();
    let mut seen_prefixes: HashSet<String> = HashSet::new();
    let mut admitted = 0usize;

    for container in &containers {
        let inherited = match admit(container, cutoff, config) {
            Admission::Dated(unlock) => Some(unlock),
            Admission::Undated => None,
            Admission::Rejected => {
                debug!(container = %container.name, "container not admitted");
                continue;
            }
        };
        admitted += 1;

        for entry in &container.entries {
            let Some(item) = fetch_item(source, container, entry, inherited, cutoff).await else {
                continue;
            };

            let prefix = truncate_chars(&item.text, config.content_dedup_prefix).to_string();
            if !seen_prefixes.insert(prefix) {
                debug!(title = %item.title, "duplicate content, skipping");
                continue;
            }
            items.push(item);
        }
    }

    info!(
        containers = containers.len(),
        admitted,
        items = items.len(),
        "curation complete"
    );

    CurationResult { assessment, items }
}

/// Fetch and clean one entry; `None` when it fails, is empty, or is too late.
async fn fetch_item<S: ContentSource>(
    source: &S,
    container: &ContentContainer,
    entry: &ContentRef,
    inherited: Option<DateTime<Utc>>,
    cutoff: DateTime<Utc>,
) -> Option<ContentItem> {
    let body = match source.fetch(entry).await {
        Ok(body) => body,
        Err(e) => {
            warn!(kind = %entry.kind, title = %entry.title, error = %e, "content fetch failed, skipping");
            return None;
        }
    };

    let own = match body.publish_at.as_deref().map(parse_source_instant) {
        None => None,
        Some(Ok(instant)) => Some(instant),
        Some(Err(e)) => {
            warn!(title = %entry.title, error = %e, "unreadable publish date, skipping");
            return None;
        }
    };
    if own.is_some_and(|instant| instant >= cutoff) {
        debug!(title = %entry.title, "published after cutoff, skipping");
        return None;
    }

    let text = clean_html(&body.html);
    if text.is_empty() {
        return None;
    }

    let title = if body.title.trim().is_empty() {
        entry.title.clone()
    } else {
        body.title
    };

    Some(ContentItem {
        kind: entry.kind,
        title,
        container_name: container.name.clone(),
        text,
        publish_instant: own.or(inherited),
    })
}

/// Assessment metadata for a classified item; `cutoff` stands in when the
/// item has no localized deadline.
pub fn assessment_meta(item: &WorkItem, cutoff: DateTime<Utc>, zone: Tz) -> AssessmentMeta {
    AssessmentMeta {
        name: item.name.clone(),
        container_name: item.container_name.clone(),
        description: item.description.clone(),
        points: item.points,
        deadline: item
            .due_at_local
            .unwrap_or_else(|| cutoff.with_timezone(&zone)),
    }
}

// ---------------------------------------------------------------------------
// LMS-backed implementations
// ---------------------------------------------------------------------------

/// Modules of one course on one instance.
#[derive(Debug, Clone, Copy)]
pub struct CourseContent<'a> {
    pub client: &'a CanvasClient,
    pub course_id: u64,
}

impl ContentSource for CourseContent<'_> {
    async fn list_containers(&self) -> Result<Vec<ContentContainer>> {
        self.client.content_containers(self.course_id).await
    }

    async fn fetch(&self, entry: &ContentRef) -> Result<ContentBody> {
        self.client.content_body(self.course_id, entry).await
    }
}

/// Curates from the instance and course a work item was collected from.
#[derive(Debug, Clone)]
pub struct CanvasCurator<'a> {
    clients: &'a [CanvasClient],
    now: DateTime<Tz>,
    config: &'a RunConfig,
}

impl<'a> CanvasCurator<'a> {
    pub fn new(clients: &'a [CanvasClient], now: DateTime<Tz>, config: &'a RunConfig) -> Self {
        Self {
            clients,
            now,
            config,
        }
    }

    /// Course id of `item`: its own when known, else an exact name match
    /// among the instance's active courses.
    async fn locate_course(&self, client: &CanvasClient, item: &WorkItem) -> Option<u64> {
        if let Some(id) = item.container_id {
            return Some(id);
        }
        collector::active_courses(client, self.now, self.config)
            .await
            .into_iter()
            .find(|course| course.name() == item.container_name)
            .and_then(|course| course.id)
    }
}

impl Curator for CanvasCurator<'_> {
    async fn curate(&self, item: &WorkItem, cutoff: DateTime<Utc>) -> CurationResult {
        let assessment = assessment_meta(item, cutoff, self.config.zone);
        let empty = |assessment| CurationResult {
            assessment,
            items: Vec::new(),
        };

        let Some(client) = self
            .clients
            .iter()
            .find(|c| c.instance().name == item.source)
        else {
            warn!(source = %item.source, "no client for item source, skipping curation");
            return empty(assessment);
        };

        let Some(course_id) = self.locate_course(client, item).await else {
            warn!(course = %item.container_name, "course not found, skipping curation");
            return empty(assessment);
        };

        let source = CourseContent { client, course_id };
        curate(&source, assessment, cutoff, self.config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use coursewatch_shared::{ContentKind, CourseWatchError, ItemOrigin, SourceInstance};
    use std::collections::HashMap;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// In-memory source keyed by entry locator.
    struct FakeSource {
        containers: Option<Vec<ContentContainer>>,
        bodies: HashMap<String, ContentBody>,
    }

    impl ContentSource for FakeSource {
        async fn list_containers(&self) -> Result<Vec<ContentContainer>> {
            self.containers
                .clone()
                .ok_or_else(|| CourseWatchError::Network("HTTP 500".into()))
        }

        async fn fetch(&self, entry: &ContentRef) -> Result<ContentBody> {
            self.bodies
                .get(&entry.locator)
                .cloned()
                .ok_or_else(|| CourseWatchError::Network(format!("{}: HTTP 404", entry.locator)))
        }
    }

    fn cutoff() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 10, 17, 30, 0).unwrap()
    }

    fn stamp(instant: DateTime<Utc>) -> String {
        instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    fn page(locator: &str) -> ContentRef {
        ContentRef {
            kind: ContentKind::Page,
            title: locator.into(),
            locator: locator.into(),
        }
    }

    fn container(name: &str, unlock_at: Option<String>, entries: Vec<ContentRef>) -> ContentContainer {
        ContentContainer {
            id: name.into(),
            name: name.into(),
            unlock_at,
            entries,
        }
    }

    fn body(html: &str) -> ContentBody {
        ContentBody {
            title: String::new(),
            html: html.into(),
            publish_at: None,
        }
    }

    fn exam() -> AssessmentMeta {
        AssessmentMeta {
            name: "Midterm Exam".into(),
            container_name: "BIO 101".into(),
            description: String::new(),
            points: 100.0,
            deadline: cutoff().with_timezone(&chrono_tz::America::Los_Angeles),
        }
    }

    fn titles(result: &CurationResult) -> Vec<&str> {
        result.items.iter().map(|i| i.title.as_str()).collect()
    }

    #[test]
    fn admission_around_cutoff() {
        let config = RunConfig::default();
        let before = container("Unit A", Some(stamp(cutoff() - TimeDelta::seconds(1))), vec![]);
        let at = container("Unit B", Some(stamp(cutoff())), vec![]);
        let after = container("Unit C", Some(stamp(cutoff() + TimeDelta::seconds(1))), vec![]);

        assert_eq!(
            admit(&before, cutoff(), &config),
            Admission::Dated(cutoff() - TimeDelta::seconds(1))
        );
        assert_eq!(admit(&at, cutoff(), &config), Admission::Rejected);
        assert_eq!(admit(&after, cutoff(), &config), Admission::Rejected);
    }

    #[test]
    fn admission_fallback_and_denylist() {
        let config = RunConfig::default();
        assert_eq!(admit(&container("Week 5", None, vec![]), cutoff(), &config), Admission::Undated);
        assert_eq!(admit(&container("Chapter 2 Notes", None, vec![]), cutoff(), &config), Admission::Undated);
        assert_eq!(admit(&container("Overview", None, vec![]), cutoff(), &config), Admission::Rejected);

        let early = Some(stamp(cutoff() - TimeDelta::days(30)));
        assert_eq!(
            admit(&container("Library Guide", early.clone(), vec![]), cutoff(), &config),
            Admission::Rejected
        );
        assert_eq!(
            admit(&container("Week 1: Syllabus & Orientation", None, vec![]), cutoff(), &config),
            Admission::Rejected
        );
        assert_eq!(
            admit(&container("Week 3", Some("next week".into()), vec![]), cutoff(), &config),
            Admission::Rejected
        );
    }

    #[tokio::test]
    async fn curates_in_container_then_item_order() {
        let early = stamp(cutoff() - TimeDelta::days(14));
        let source = FakeSource {
            containers: Some(vec![
                container("Week 1", Some(early.clone()), vec![page("cells"), page("membranes")]),
                container("Library Guide", Some(early.clone()), vec![page("library")]),
                container("Week 9", Some(stamp(cutoff() + TimeDelta::days(1))), vec![page("future")]),
                container("Week 5", None, vec![page("enzymes")]),
                container("Extras", None, vec![page("extra")]),
            ]),
            bodies: HashMap::from([
                ("cells".to_string(), body("<p>Cells are the unit of life.</p>")),
                ("membranes".to_string(), body("<p>Membranes are lipid bilayers.</p>")),
                ("library".to_string(), body("<p>How to use the library.</p>")),
                ("future".to_string(), body("<p>Future content.</p>")),
                ("enzymes".to_string(), body("<p>Enzymes lower activation energy.</p>")),
                ("extra".to_string(), body("<p>Extra.</p>")),
            ]),
        };

        let result = curate(&source, exam(), cutoff(), &RunConfig::default()).await;
        assert_eq!(titles(&result), vec!["cells", "membranes", "enzymes"]);
        assert_eq!(result.items[0].text, "Cells are the unit of life.");
        assert_eq!(result.items[0].container_name, "Week 1");
        assert!(result.items[0].publish_instant.is_some());
        assert!(result.items[2].publish_instant.is_none());

        for item in &result.items {
            match item.publish_instant {
                Some(instant) => assert!(instant < cutoff()),
                None => assert!(item.container_name.to_lowercase().contains("week")),
            }
        }
    }

    #[tokio::test]
    async fn item_level_publish_instant_refines_container() {
        let early = stamp(cutoff() - TimeDelta::days(7));
        let mut late_body = body("<p>Posted after the exam.</p>");
        late_body.publish_at = Some(stamp(cutoff() + TimeDelta::hours(1)));
        let mut own_body = body("<p>Posted two days before.</p>");
        own_body.publish_at = Some(stamp(cutoff() - TimeDelta::days(2)));

        let source = FakeSource {
            containers: Some(vec![container(
                "Week 4",
                Some(early),
                vec![page("late"), page("own")],
            )]),
            bodies: HashMap::from([
                ("late".to_string(), late_body),
                ("own".to_string(), own_body),
            ]),
        };

        let result = curate(&source, exam(), cutoff(), &RunConfig::default()).await;
        assert_eq!(titles(&result), vec!["own"]);
        assert_eq!(
            result.items[0].publish_instant,
            Some(cutoff() - TimeDelta::days(2))
        );
    }

    #[tokio::test]
    async fn dedups_by_cleaned_prefix() {
        let shared: String = "A".repeat(100);
        let source = FakeSource {
            containers: Some(vec![container(
                "Week 2",
                None,
                vec![page("first"), page("second"), page("third"), page("empty")],
            )]),
            bodies: HashMap::from([
                ("first".to_string(), body(&format!("<p>{shared} tail one</p>"))),
                ("second".to_string(), body(&format!("<div>{shared}   tail two</div>"))),
                ("third".to_string(), body(&format!("<p>{} different</p>", "A".repeat(99)))),
                ("empty".to_string(), body("<p>   </p>")),
            ]),
        };

        let result = curate(&source, exam(), cutoff(), &RunConfig::default()).await;
        assert_eq!(titles(&result), vec!["first", "third"]);
    }

    #[tokio::test]
    async fn failures_are_skipped_not_fatal() {
        let source = FakeSource {
            containers: Some(vec![container("Week 1", None, vec![page("missing"), page("ok")])]),
            bodies: HashMap::from([("ok".to_string(), body("<p>Fine.</p>"))]),
        };
        let result = curate(&source, exam(), cutoff(), &RunConfig::default()).await;
        assert_eq!(titles(&result), vec!["ok"]);

        let unreachable = FakeSource {
            containers: None,
            bodies: HashMap::new(),
        };
        let result = curate(&unreachable, exam(), cutoff(), &RunConfig::default()).await;
        assert!(result.is_empty());
        assert_eq!(result.assessment.name, "Midterm Exam");
    }

    fn major_item(container_id: Option<u64>, source: &str) -> WorkItem {
        WorkItem {
            name: "Midterm Exam".into(),
            container_name: "BIO 101".into(),
            due_at: Some(stamp(cutoff())),
            points: 100.0,
            description: "<p>Chapters 1-3</p>".into(),
            reference_url: "#".into(),
            source: source.into(),
            container_id,
            origin: ItemOrigin::Enumeration,
            due_at_local: Some(cutoff().with_timezone(&chrono_tz::America::Los_Angeles)),
            due_date_local: None,
        }
    }

    async fn mount_course_content(server: &MockServer, course_id: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/courses/{course_id}/modules")))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"id": 1, "name": "Week 1", "unlock_at": "2026-01-05T08:00:00Z",
                     "items": [{"type": "Page", "title": "Cells", "page_url": "cells"},
                               {"type": "Discussion", "title": "Debate", "content_id": 4}]},
                    {"id": 2, "name": "Course Essentials", "items": [{"type": "Page", "title": "Rules", "page_url": "rules"}]}]"#,
            ))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/courses/{course_id}/pages/cells")))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"title": "Cells", "body": "<h2>Cells</h2><p>Basic unit.</p>"}"#,
            ))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/courses/{course_id}/discussion_topics/4")))
            .respond_with(ResponseTemplate::new(500))
            .mount(server)
            .await;
    }

    fn client_for(server: &MockServer, name: &str) -> CanvasClient {
        CanvasClient::new(SourceInstance {
            name: name.into(),
            base_url: Url::parse(&server.uri()).unwrap(),
            token: "tok".into(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn canvas_curator_uses_item_course() {
        let server = MockServer::start().await;
        mount_course_content(&server, 12).await;

        let clients = vec![client_for(&server, "main")];
        let config = RunConfig::default();
        let now = chrono_tz::America::Los_Angeles
            .with_ymd_and_hms(2026, 2, 8, 9, 0, 0)
            .unwrap();
        let curator = CanvasCurator::new(&clients, now, &config);

        let result = curator.curate(&major_item(Some(12), "main"), cutoff()).await;
        assert_eq!(titles(&result), vec!["Cells"]);
        assert_eq!(result.items[0].text, "Cells Basic unit.");
        assert_eq!(result.assessment.points, 100.0);
    }

    #[tokio::test]
    async fn canvas_curator_falls_back_to_course_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/courses"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"id": 30, "name": "CHEM 110"}, {"id": 31, "name": "BIO 101"}]"#,
            ))
            .mount(&server)
            .await;
        mount_course_content(&server, 31).await;

        let clients = vec![client_for(&server, "main")];
        let config = RunConfig::default();
        let now = chrono_tz::America::Los_Angeles
            .with_ymd_and_hms(2026, 2, 8, 9, 0, 0)
            .unwrap();
        let curator = CanvasCurator::new(&clients, now, &config);

        let result = curator.curate(&major_item(None, "main"), cutoff()).await;
        assert_eq!(titles(&result), vec!["Cells"]);

        let unknown_source = curator.curate(&major_item(Some(31), "other"), cutoff()).await;
        assert!(unknown_source.is_empty());
    }
}
