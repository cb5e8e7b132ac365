//! Notification text: daily digest, item cards, captions, failure notice.
//!
//! All text targets Telegram's legacy Markdown; values coming from the LMS
//! are escaped with [`escape_markdown`].

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate};
use chrono_tz::Tz;

use coursewatch_shared::{RunConfig, WorkItem};

use crate::importance::{self, Priority};
use crate::sections::ActionPlan;

/// Escape the characters legacy Markdown treats as entity delimiters.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// English ordinal suffix for a day of month.
pub fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// Date group header, e.g. `Jan 27th:`.
pub fn date_header(date: NaiveDate) -> String {
    format!("{} {}{}:", date.format("%b"), date.day(), ordinal_suffix(date.day()))
}

/// Compact course code: text before the first `(`, spaces removed
/// (`MGMT 311 (Winter 2026; 23330)` → `MGMT311`).
pub fn course_code(container_name: &str) -> String {
    let head = container_name.split('(').next().unwrap_or(container_name);
    head.chars().filter(|c| !c.is_whitespace()).collect()
}

/// 12-hour clock time without a leading zero, e.g. `9:05 AM`.
pub fn clock_time(at: &DateTime<Tz>) -> String {
    let formatted = at.format("%I:%M %p").to_string();
    formatted.trim_start_matches('0').to_string()
}

/// Human-readable distance from `now` to `due`.
pub fn time_until_due(due: &DateTime<Tz>, now: &DateTime<Tz>) -> String {
    let delta = due.signed_duration_since(now);
    if delta < chrono::TimeDelta::zero() {
        return "Past due".to_string();
    }

    match delta.num_days() {
        0 if delta.num_hours() == 0 => format!("Due in {} minutes", delta.num_minutes()),
        0 => format!("Due in {} hours", delta.num_hours()),
        1 => format!("Due tomorrow at {}", due.format("%I:%M %p")),
        days => format!("Due in {days} days ({})", due.format("%b %d at %I:%M %p")),
    }
}

fn long_date(now: &DateTime<Tz>) -> String {
    now.format("%A, %B %d, %Y").to_string()
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Message sent when nothing is due in the window.
pub fn all_clear_message(now: &DateTime<Tz>) -> String {
    format!(
        "✅ *Daily Canvas Update*\n📅 {}\n\n🎉 *Nothing due in the next 3 days!*\n\n\
         Enjoy the free time or get ahead on upcoming work! 💪",
        long_date(now)
    )
}

/// Daily digest of classified items grouped by local due date.
///
/// `guides` lists the assessments a study guide was produced for.
pub fn digest_message(items: &[WorkItem], guides: &[String], now: &DateTime<Tz>, config: &RunConfig) -> String {
    if items.is_empty() {
        return all_clear_message(now);
    }

    let mut by_date: BTreeMap<NaiveDate, Vec<&WorkItem>> = BTreeMap::new();
    for item in items {
        if let Some(date) = item.due_date_local {
            by_date.entry(date).or_default().push(item);
        }
    }

    let mut out = format!("📚 Daily Canvas Update\n📅 {}\n\n", long_date(now));

    for (date, group) in &by_date {
        out.push_str(&date_header(*date));
        out.push('\n');
        for item in group {
            let time = item.due_at_local.as_ref().map(clock_time).unwrap_or_default();
            let marker = if importance::is_major(item, config) { "🚨 " } else { "" };
            out.push_str(&format!(
                "{marker}{}, {}, {time}\n",
                escape_markdown(&item.name),
                escape_markdown(&course_code(&item.container_name)),
            ));
        }
        out.push('\n');
    }

    if !guides.is_empty() {
        out.push_str("📚 Auto-Generated Study Guides:\n");
        for exam in guides {
            out.push_str(&format!("✅ {}\n", escape_markdown(exam)));
        }
    }

    out.trim_end().to_string()
}

/// Per-item card with the generated action plan.
///
/// Plan and tips are generated text and are escaped like LMS values.
pub fn item_card(item: &WorkItem, plan: &ActionPlan, priority: Priority, now: &DateTime<Tz>) -> String {
    let (due, countdown) = match item.due_at_local {
        Some(d) => (d.format("%b %d at %I:%M %p").to_string(), time_until_due(&d, now)),
        None => ("No due date".to_string(), "Unknown".to_string()),
    };

    let mut card = format!(
        "{} *{}* - Due {due}\n⏰ {countdown}\n📚 {}\n⭐ Points: {}\n\n{}\n\n💡 {}\n",
        priority.symbol(),
        escape_markdown(&item.name),
        escape_markdown(&item.container_name),
        item.points,
        escape_markdown(&plan.plan),
        escape_markdown(&plan.tips),
    );

    if priority == Priority::Major {
        card.push_str("\n_A study guide is generated automatically for this exam._\n");
    }

    card.push_str(&format!("\n[Open in Canvas]({})", item.reference_url));
    card
}

/// Caption for an uploaded study guide.
pub fn study_guide_caption(exam: &str, materials: usize) -> String {
    format!(
        "📖 *Study Guide: {}*\n\n\
         ✅ Generated from {materials} course materials:\n\
         • Key concepts organized by topic\n\
         • Key ideas & theories\n\
         • Multiple choice practice questions\n\
         • Answer key at the end",
        escape_markdown(exam)
    )
}

/// Best-effort notice sent when a run fails.
pub fn failure_message(error: &str) -> String {
    format!("❌ *Error in Daily Canvas Planner*\n\n{}", escape_markdown(error))
}
