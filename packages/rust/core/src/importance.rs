//! Major-assessment detection and notification priority.

use chrono::{Days, NaiveDate};

use coursewatch_shared::{RunConfig, WorkItem};

/// Whether `item` is a major assessment (midterm, final, proctored exam).
///
/// Rules, first match wins, case-insensitive:
/// 1. the name contains one of `config.major_phrases`;
/// 2. the name contains "exam" and the item is worth at least
///    `config.major_exam_min_points`;
/// 3. the description mentions a proctoring tool.
pub fn is_major(item: &WorkItem, config: &RunConfig) -> bool {
    let name = item.name.to_lowercase();

    if config.major_phrases.iter().any(|p| name.contains(p)) {
        return true;
    }

    if name.contains("exam") && item.points >= config.major_exam_min_points {
        return true;
    }

    let description = item.description.to_lowercase();
    config
        .proctoring_markers
        .iter()
        .any(|m| description.contains(m))
}

/// Notification priority. Ordered so that `Major` is the greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Normal,
    DueTomorrow,
    DueToday,
    Major,
}

impl Priority {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Major => "🚨",
            Self::DueToday => "⚠️",
            Self::DueTomorrow => "📌",
            Self::Normal => "📋",
        }
    }

    /// Short label used by terminal output.
    pub fn label(self) -> &'static str {
        match self {
            Self::Major => "MAJOR",
            Self::DueToday => "DUE TODAY",
            Self::DueTomorrow => "DUE TOMORROW",
            Self::Normal => "UPCOMING",
        }
    }
}

/// Priority of a classified item relative to `today` (a date in the run zone).
///
/// Major assessments dominate regardless of how close the deadline is.
pub fn priority(item: &WorkItem, today: NaiveDate, config: &RunConfig) -> Priority {
    if is_major(item, config) {
        return Priority::Major;
    }

    match item.due_date_local {
        Some(date) if date == today => Priority::DueToday,
        Some(date) if Some(date) == today.checked_add_days(Days::new(1)) => Priority::DueTomorrow,
        _ => Priority::Normal,
    }
}
