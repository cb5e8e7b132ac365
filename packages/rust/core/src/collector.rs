//! Work item collection from every configured LMS instance.
//!
//! Each instance is read twice: the planner view (method A, dated items in the
//! lookahead range) and a full assignment enumeration of active courses
//! (method B, including undated items). Planner records come first in the
//! per-instance merge so their resolved links win.
//!
//! A failing sub-call only empties that sub-call's contribution.

use chrono::{DateTime, Days, TimeDelta, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument, warn};

use coursewatch_canvas::{AssignmentRecord, CanvasClient, CourseRecord, PlannerRecord};
use coursewatch_shared::{ItemOrigin, RunConfig, WorkItem, parse_source_instant};

use crate::dedup;

/// Collect every instance, one list per instance, in configuration order.
pub async fn collect_all(
    clients: &[CanvasClient],
    now: DateTime<Tz>,
    config: &RunConfig,
) -> Vec<Vec<WorkItem>> {
    let mut per_instance = Vec::with_capacity(clients.len());
    for client in clients {
        per_instance.push(collect_instance(client, now, config).await);
    }
    per_instance
}

/// Collect one instance: planner view, then enumeration, merged.
#[instrument(skip_all, fields(instance = %client.instance().name))]
pub async fn collect_instance(
    client: &CanvasClient,
    now: DateTime<Tz>,
    config: &RunConfig,
) -> Vec<WorkItem> {
    let planner = planner_items(client, now, config).await;
    let enumerated = enumerated_items(client, now, config).await;

    let (planner_count, enumerated_count) = (planner.len(), enumerated.len());
    let merged = dedup::merge([planner, enumerated]);

    info!(
        planner = planner_count,
        enumerated = enumerated_count,
        merged = merged.len(),
        "collected work items"
    );
    merged
}

/// Active, open courses whose end date is not older than the stale horizon.
///
/// Courses without an id are skipped. A failed listing yields no courses.
pub async fn active_courses(
    client: &CanvasClient,
    now: DateTime<Tz>,
    config: &RunConfig,
) -> Vec<CourseRecord> {
    let courses = match client.list_courses().await {
        Ok(courses) => courses,
        Err(e) => {
            warn!(error = %e, "course listing failed");
            return Vec::new();
        }
    };

    let horizon = now.with_timezone(&Utc) - TimeDelta::days(config.stale_course_days);
    courses
        .into_iter()
        .filter(|course| {
            if course.id.is_none() {
                debug!(name = course.name(), "skipping course without id");
                return false;
            }
            if course.is_closed() {
                debug!(name = course.name(), "skipping closed course");
                return false;
            }
            if ended_before(course, horizon) {
                debug!(name = course.name(), "skipping stale course");
                return false;
            }
            true
        })
        .collect()
}

/// Assignments whose name contains `query` (case-insensitive) across all
/// instances, in instance then course order.
pub async fn search_assignments(
    clients: &[CanvasClient],
    query: &str,
    now: DateTime<Tz>,
    config: &RunConfig,
) -> Vec<WorkItem> {
    let needle = query.to_lowercase();
    let mut found = Vec::new();

    for client in clients {
        for course in active_courses(client, now, config).await {
            for item in course_assignments(client, &course).await {
                if item.name.to_lowercase().contains(&needle) {
                    found.push(item);
                }
            }
        }
    }

    debug!(query, matches = found.len(), "assignment search complete");
    found
}

// ---------------------------------------------------------------------------
// Method A: planner view
// ---------------------------------------------------------------------------

async fn planner_items(client: &CanvasClient, now: DateTime<Tz>, config: &RunConfig) -> Vec<WorkItem> {
    let today = now.with_timezone(&config.zone).date_naive();
    let end = today
        .checked_add_days(Days::new(config.planner_lookahead_days))
        .unwrap_or(today);

    match client.planner_items(today, end).await {
        Ok(records) => records
            .iter()
            .filter_map(|record| planner_to_item(client, record))
            .collect(),
        Err(e) => {
            warn!(error = %e, "planner view failed, continuing without it");
            Vec::new()
        }
    }
}

fn planner_to_item(client: &CanvasClient, record: &PlannerRecord) -> Option<WorkItem> {
    let due_at = record.plannable_date.clone()?;
    let link = record
        .plannable
        .as_ref()
        .and_then(|p| p.html_url.as_deref())
        .or(record.html_url.as_deref());

    Some(WorkItem {
        name: record.title().to_string(),
        container_name: record.container_name().to_string(),
        due_at: Some(due_at),
        points: record.points(),
        description: record.description().to_string(),
        reference_url: client.absolute_url(link),
        source: client.instance().name.clone(),
        container_id: record.course_id,
        origin: ItemOrigin::Planner,
        due_at_local: None,
        due_date_local: None,
    })
}

// ---------------------------------------------------------------------------
// Method B: course enumeration
// ---------------------------------------------------------------------------

async fn enumerated_items(client: &CanvasClient, now: DateTime<Tz>, config: &RunConfig) -> Vec<WorkItem> {
    let mut items = Vec::new();
    for course in active_courses(client, now, config).await {
        items.extend(course_assignments(client, &course).await);
    }
    items
}

async fn course_assignments(client: &CanvasClient, course: &CourseRecord) -> Vec<WorkItem> {
    let Some(course_id) = course.id else {
        return Vec::new();
    };

    match client.list_assignments(course_id).await {
        Ok(records) => records
            .iter()
            .map(|record| assignment_to_item(client, course, record))
            .collect(),
        Err(e) => {
            warn!(course = course.name(), error = %e, "assignment listing failed, skipping course");
            Vec::new()
        }
    }
}

fn assignment_to_item(client: &CanvasClient, course: &CourseRecord, record: &AssignmentRecord) -> WorkItem {
    WorkItem {
        name: record.name().to_string(),
        container_name: course.name().to_string(),
        due_at: record.due_at.clone(),
        points: record.points(),
        description: record.description().to_string(),
        reference_url: record.html_url().to_string(),
        source: client.instance().name.clone(),
        container_id: course.id,
        origin: ItemOrigin::Enumeration,
        due_at_local: None,
        due_date_local: None,
    }
}

/// Whether the course ended before `horizon`. Unparsable end dates keep the course.
fn ended_before(course: &CourseRecord, horizon: DateTime<Utc>) -> bool {
    course
        .end_at
        .as_deref()
        .and_then(|raw| parse_source_instant(raw).ok())
        .is_some_and(|end| end < horizon)
}
