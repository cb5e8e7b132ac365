//! Pipeline entry points.
//!
//! [`curate_and_classify`] is the pure core: merge, classify, curate majors.
//! [`run_daily`] wraps it with collection, study guide generation, export and
//! delivery. [`build_guide`] is the single-assessment path used by the
//! `guide` command.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{info, instrument, warn};

use coursewatch_canvas::CanvasClient;
use coursewatch_markdown::StudyGuideDoc;
use coursewatch_shared::{
    CourseWatchError, CurationResult, Result, RunConfig, WorkItem, parse_source_instant,
};

use crate::collector;
use crate::completion::CompletionClient;
use crate::curator::{CanvasCurator, Curator};
use crate::dedup;
use crate::digest;
use crate::export;
use crate::importance;
use crate::notify::TelegramNotifier;
use crate::temporal;

/// Classified window plus one curation per major item.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    /// In-window items, deadline ascending.
    pub classified: Vec<WorkItem>,
    /// One entry per major item in `classified`, in the same order.
    pub curations: Vec<CurationResult>,
}

/// Merge per-instance lists, classify against `now`, and curate every major
/// item with its deadline as cutoff.
#[instrument(skip_all, fields(sources = sources.len()))]
pub async fn curate_and_classify<C: Curator>(
    sources: Vec<Vec<WorkItem>>,
    now: DateTime<Tz>,
    config: &RunConfig,
    curator: &C,
) -> PipelineOutput {
    let merged = dedup::merge(sources);
    let classified = temporal::classify(merged, now, config);

    let mut curations = Vec::new();
    for item in classified.iter().filter(|item| importance::is_major(item, config)) {
        let Some(cutoff) = cutoff_of(item) else {
            continue;
        };
        let curation = curator.curate(item, cutoff).await;
        info!(exam = %item.name, materials = curation.items.len(), "curated major assessment");
        curations.push(curation);
    }

    info!(
        classified = classified.len(),
        majors = curations.len(),
        "classification complete"
    );
    PipelineOutput {
        classified,
        curations,
    }
}

/// Cutoff instant of a work item: its deadline.
fn cutoff_of(item: &WorkItem) -> Option<DateTime<Utc>> {
    item.due_at_local
        .map(|local| local.with_timezone(&Utc))
        .or_else(|| item.due_at.as_deref().and_then(|raw| parse_source_instant(raw).ok()))
}

// ---------------------------------------------------------------------------
// Daily run
// ---------------------------------------------------------------------------

/// Resolved outbound collaborators for a full run.
#[derive(Debug, Clone)]
pub struct Services {
    pub clients: Vec<CanvasClient>,
    pub completion: CompletionClient,
    pub notifier: TelegramNotifier,
    /// Directory study guides are exported to.
    pub export_dir: PathBuf,
    /// Send one action-plan card per classified item.
    pub item_cards: bool,
}

/// A study guide written to disk.
#[derive(Debug, Clone)]
pub struct GeneratedGuide {
    pub exam: String,
    pub path: PathBuf,
    pub materials: usize,
}

/// Result of [`run_daily`].
#[derive(Debug)]
pub struct RunSummary {
    pub classified: usize,
    pub majors: usize,
    pub guides: Vec<GeneratedGuide>,
    /// Whether the digest message was accepted by the delivery channel.
    pub digest_delivered: bool,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after a study guide is written.
    fn guide_written(&self, guide: &GeneratedGuide);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn guide_written(&self, _guide: &GeneratedGuide) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// [`run_daily`] under a wall-clock cap. Exceeding `cap` is the one way a
/// daily run fails.
pub async fn run_daily_capped(
    services: &Services,
    now: DateTime<Tz>,
    config: &RunConfig,
    progress: &dyn ProgressReporter,
    cap: Duration,
) -> Result<RunSummary> {
    tokio::time::timeout(cap, run_daily(services, now, config, progress))
        .await
        .map_err(|_| CourseWatchError::Timeout(format!("run exceeded the {}s time limit", cap.as_secs())))
}

/// Full daily run: collect, classify, curate, generate guides, notify.
///
/// Recoverable failures along the way are logged and skipped, so the run
/// always ends with a digest attempt.
#[instrument(skip_all, fields(instances = services.clients.len()))]
pub async fn run_daily(
    services: &Services,
    now: DateTime<Tz>,
    config: &RunConfig,
    progress: &dyn ProgressReporter,
) -> RunSummary {
    let start = Instant::now();

    // --- Phase 1: Collect ---
    progress.phase("Collecting work items");
    let sources = collector::collect_all(&services.clients, now, config).await;

    // --- Phase 2: Classify and curate ---
    progress.phase("Classifying and curating");
    let curator = CanvasCurator::new(&services.clients, now, config);
    let output = curate_and_classify(sources, now, config, &curator).await;

    // --- Phase 3: Study guides ---
    progress.phase("Generating study guides");
    let mut guides = Vec::new();
    for curation in &output.curations {
        if let Some(guide) = build_guide(services, curation, now).await {
            progress.guide_written(&guide);
            guides.push(guide);
        }
    }

    // --- Phase 4: Notify ---
    progress.phase("Sending notifications");
    if services.item_cards {
        let today = now.with_timezone(&config.zone).date_naive();
        for item in &output.classified {
            let plan = services.completion.action_plan(item).await;
            let priority = importance::priority(item, today, config);
            services
                .notifier
                .send_message(&digest::item_card(item, &plan, priority, &now))
                .await;
        }
    }

    let exams: Vec<String> = guides.iter().map(|g| g.exam.clone()).collect();
    let message = digest::digest_message(&output.classified, &exams, &now, config);
    let digest_delivered = services.notifier.send_message(&message).await;

    for guide in &guides {
        let caption = digest::study_guide_caption(&guide.exam, guide.materials);
        services.notifier.send_document(&guide.path, &caption).await;
    }

    let summary = RunSummary {
        classified: output.classified.len(),
        majors: output.curations.len(),
        guides,
        digest_delivered,
        elapsed: start.elapsed(),
    };

    info!(
        classified = summary.classified,
        majors = summary.majors,
        guides = summary.guides.len(),
        delivered = summary.digest_delivered,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "daily run complete"
    );
    progress.done(&summary);
    summary
}

/// Generate and export a study guide for one curation.
///
/// `None` when there is no prior content, or when generation or export fails.
pub async fn build_guide(
    services: &Services,
    curation: &CurationResult,
    now: DateTime<Tz>,
) -> Option<GeneratedGuide> {
    let exam = &curation.assessment.name;
    if curation.is_empty() {
        info!(exam = %exam, "no prior content available, skipping study guide");
        return None;
    }

    let sections = match services.completion.study_guide(exam, &curation.items).await {
        Ok(sections) => sections,
        Err(e) => {
            warn!(exam = %exam, error = %e, "study guide generation failed");
            return None;
        }
    };

    let doc = StudyGuideDoc {
        assessment: &curation.assessment,
        materials: &curation.items,
        sections,
        generated_at: now,
    };

    match export::export_study_guide(&services.export_dir, &doc) {
        Ok(path) => Some(GeneratedGuide {
            exam: exam.clone(),
            path,
            materials: curation.items.len(),
        }),
        Err(e) => {
            warn!(exam = %exam, error = %e, "study guide export failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use coursewatch_shared::{
        AssessmentMeta, CompletionConfig, ContentItem, ContentKind, ItemOrigin, SourceInstance,
        TelegramConfig,
    };
    use std::sync::Mutex;
    use url::Url;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn la(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        chrono_tz::America::Los_Angeles
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
    }

    fn item(name: &str, due_at: Option<&str>, points: f64) -> WorkItem {
        WorkItem {
            name: name.into(),
            container_name: "BIO 101".into(),
            due_at: due_at.map(String::from),
            points,
            description: String::new(),
            reference_url: "#".into(),
            source: "main".into(),
            container_id: Some(5),
            origin: ItemOrigin::Enumeration,
            due_at_local: None,
            due_date_local: None,
        }
    }

    /// Records every call and returns one canned material item.
    #[derive(Default)]
    struct RecordingCurator {
        calls: Mutex<Vec<(String, DateTime<Utc>)>>,
    }

    impl Curator for RecordingCurator {
        async fn curate(&self, item: &WorkItem, cutoff: DateTime<Utc>) -> CurationResult {
            self.calls.lock().unwrap().push((item.name.clone(), cutoff));
            CurationResult {
                assessment: AssessmentMeta {
                    name: item.name.clone(),
                    container_name: item.container_name.clone(),
                    description: String::new(),
                    points: item.points,
                    deadline: cutoff.with_timezone(&chrono_tz::America::Los_Angeles),
                },
                items: vec![ContentItem {
                    kind: ContentKind::Page,
                    title: "Week 1".into(),
                    container_name: "Week 1".into(),
                    text: "cells".into(),
                    publish_instant: None,
                }],
            }
        }
    }

    #[tokio::test]
    async fn curates_each_major_item_with_its_deadline() {
        let now = la(2026, 1, 25, 8, 0);
        let sources = vec![
            vec![
                item("Lab 2", Some("2026-01-27T01:00:00Z"), 10.0),
                item("Midterm Exam", Some("2026-01-27T17:00:00Z"), 100.0),
                item("Final Exam", Some("2026-03-20T17:00:00Z"), 200.0),
            ],
            vec![item("Midterm Exam", Some("2026-01-27T17:00:00Z"), 100.0)],
        ];
        let curator = RecordingCurator::default();

        let output = curate_and_classify(sources, now, &RunConfig::default(), &curator).await;

        let names: Vec<&str> = output.classified.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Lab 2", "Midterm Exam"]);
        assert_eq!(output.curations.len(), 1);

        let calls = curator.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "Midterm Exam");
        assert_eq!(calls[0].1, Utc.with_ymd_and_hms(2026, 1, 27, 17, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn no_majors_means_no_curation() {
        let now = la(2026, 1, 25, 8, 0);
        let sources = vec![vec![item("Lab 2", Some("2026-01-26T01:00:00Z"), 10.0)]];
        let curator = RecordingCurator::default();

        let output = curate_and_classify(sources, now, &RunConfig::default(), &curator).await;
        assert_eq!(output.classified.len(), 1);
        assert!(output.curations.is_empty());
        assert!(curator.calls.lock().unwrap().is_empty());
    }

    fn client_for(server: &MockServer, name: &str) -> CanvasClient {
        CanvasClient::new(SourceInstance {
            name: name.into(),
            base_url: Url::parse(&server.uri()).unwrap(),
            token: "tok".into(),
        })
        .unwrap()
    }

    async fn mount_json(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn essay_seen_by_both_methods_is_reported_once() {
        let first = MockServer::start().await;
        mount_json(
            &first,
            "/api/v1/planner/items",
            r#"[{"context_name": "ENG 101", "course_id": 1,
                 "plannable_date": "2026-02-01T23:59:00Z",
                 "html_url": "/courses/1/assignments/10",
                 "plannable": {"title": "Essay 1", "points_possible": 100, "description": "from planner"}}]"#,
        )
        .await;
        mount_json(&first, "/api/v1/courses", r#"[{"id": 1, "name": "ENG 101"}]"#).await;
        mount_json(
            &first,
            "/api/v1/courses/1/assignments",
            r#"[{"id": 10, "name": "Essay 1", "due_at": "2026-02-01T23:59:00Z", "points_possible": 100,
                 "description": "from enumeration", "html_url": "https://x/courses/1/assignments/10"}]"#,
        )
        .await;

        let second = MockServer::start().await;
        mount_json(&second, "/api/v1/planner/items", "[]").await;
        mount_json(&second, "/api/v1/courses", r#"[{"id": 7, "name": "MATH 200"}]"#).await;
        mount_json(
            &second,
            "/api/v1/courses/7/assignments",
            r#"[{"id": 70, "name": "Problem Set 3", "due_at": "2026-01-31T07:59:00Z", "points_possible": 20}]"#,
        )
        .await;

        let clients = vec![client_for(&first, "college"), client_for(&second, "university")];
        let now = la(2026, 1, 30, 8, 0);
        let config = RunConfig::default();
        let sources = collector::collect_all(&clients, now, &config).await;
        let output = curate_and_classify(sources, now, &config, &RecordingCurator::default()).await;

        let essays: Vec<&WorkItem> = output
            .classified
            .iter()
            .filter(|i| i.name == "Essay 1")
            .collect();
        assert_eq!(essays.len(), 1);
        assert_eq!(essays[0].description, "from planner");
        assert_eq!(essays[0].origin, ItemOrigin::Planner);
        assert_eq!(output.classified.len(), 2);
        assert_eq!(output.classified[0].name, "Problem Set 3");
    }

    fn services_for(server: &MockServer, export_dir: PathBuf) -> Services {
        Services {
            clients: vec![client_for(server, "main")],
            completion: CompletionClient::new(CompletionConfig {
                api_key: "sk-test".into(),
                model: "gpt-4o-mini".into(),
                base_url: server.uri(),
                temperature: 0.7,
            })
            .unwrap(),
            notifier: TelegramNotifier::new(TelegramConfig {
                bot_token: "123:ABC".into(),
                chat_id: "42".into(),
                base_url: server.uri(),
            })
            .unwrap(),
            export_dir,
            item_cards: false,
        }
    }

    #[tokio::test]
    async fn daily_run_exports_and_delivers_guide() {
        let server = MockServer::start().await;
        mount_json(&server, "/api/v1/planner/items", "[]").await;
        mount_json(&server, "/api/v1/courses", r#"[{"id": 5, "name": "BIO 101 (Winter 2026)"}]"#).await;
        mount_json(
            &server,
            "/api/v1/courses/5/assignments",
            r#"[{"id": 1, "name": "Midterm Exam", "due_at": "2026-01-27T17:00:00Z", "points_possible": 100},
                {"id": 2, "name": "Lab 2", "due_at": "2026-01-26T01:00:00Z", "points_possible": 10}]"#,
        )
        .await;
        mount_json(
            &server,
            "/api/v1/courses/5/modules",
            r#"[{"id": 1, "name": "Week 1", "unlock_at": "2026-01-05T08:00:00Z",
                 "items": [{"type": "Page", "title": "Cells", "page_url": "cells"}]}]"#,
        )
        .await;
        mount_json(
            &server,
            "/api/v1/courses/5/pages/cells",
            r#"{"title": "Cells", "body": "<p>Cells are the unit of life.</p>"}"#,
        )
        .await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"choices": [{"message": {"content": "KEY CONCEPTS\nCells\nKEY IDEAS\nLife\nMULTIPLE CHOICE\nQ1\nANSWER KEY\nQ1: A"}}]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .and(body_string_contains("BIO101"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendDocument"))
            .and(body_string_contains("Midterm-Exam-COMPREHENSIVE-study-guide.md"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = std::env::temp_dir().join(format!("cw-pipeline-test-{}", uuid::Uuid::now_v7()));
        let services = services_for(&server, dir.clone());
        let now = la(2026, 1, 25, 8, 0);

        let summary = run_daily(&services, now, &RunConfig::default(), &SilentProgress).await;

        assert_eq!(summary.classified, 2);
        assert_eq!(summary.majors, 1);
        assert_eq!(summary.guides.len(), 1);
        assert!(summary.digest_delivered);

        let guide = &summary.guides[0];
        assert_eq!(guide.exam, "Midterm Exam");
        assert_eq!(guide.materials, 1);
        let written = std::fs::read_to_string(&guide.path).unwrap();
        assert!(written.contains("Cells"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn capped_run_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("[]")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = std::env::temp_dir().join(format!("cw-pipeline-test-{}", uuid::Uuid::now_v7()));
        let services = services_for(&server, dir);
        let now = la(2026, 1, 25, 8, 0);

        let result = run_daily_capped(
            &services,
            now,
            &RunConfig::default(),
            &SilentProgress,
            Duration::from_millis(100),
        )
        .await;
        assert!(matches!(result, Err(CourseWatchError::Timeout(_))));
    }

    #[tokio::test]
    async fn empty_curation_produces_no_guide() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = std::env::temp_dir().join(format!("cw-pipeline-test-{}", uuid::Uuid::now_v7()));
        let services = services_for(&server, dir.clone());
        let curation = CurationResult {
            assessment: AssessmentMeta {
                name: "Final Exam".into(),
                container_name: "BIO 101".into(),
                description: String::new(),
                points: 200.0,
                deadline: la(2026, 3, 20, 9, 0),
            },
            items: Vec::new(),
        };

        assert!(build_guide(&services, &curation, la(2026, 3, 18, 8, 0)).await.is_none());
        assert!(!dir.exists());
    }
}
