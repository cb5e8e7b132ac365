//! Deadline windowing in the run's target zone.

use chrono::DateTime;
use chrono_tz::Tz;
use tracing::{debug, warn};

use coursewatch_shared::{RunConfig, WorkItem, parse_source_instant};

/// Keep the items due within `[now, now + config.window]`, localized and
/// sorted by deadline.
///
/// Items without a deadline or with an unparsable one are dropped (the latter
/// with a warning). Both window bounds are inclusive. The sort is stable, so
/// items sharing a deadline keep their input order.
pub fn classify(items: Vec<WorkItem>, now: DateTime<Tz>, config: &RunConfig) -> Vec<WorkItem> {
    let now = now.with_timezone(&config.zone);
    let horizon = now + config.window;
    let total = items.len();

    let mut kept: Vec<WorkItem> = items
        .into_iter()
        .filter_map(|mut item| {
            let raw = item.due_at.as_deref()?;
            let utc = match parse_source_instant(raw) {
                Ok(utc) => utc,
                Err(e) => {
                    warn!(name = %item.name, error = %e, "dropping item with unparsable deadline");
                    return None;
                }
            };

            let local = utc.with_timezone(&config.zone);
            if local < now || local > horizon {
                return None;
            }

            item.due_at_local = Some(local);
            item.due_date_local = Some(local.date_naive());
            Some(item)
        })
        .collect();

    kept.sort_by(|a, b| a.due_at_local.cmp(&b.due_at_local));

    debug!(total, kept = kept.len(), %horizon, "classified deadlines");
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Timelike};
    use coursewatch_shared::ItemOrigin;

    fn item(name: &str, due_at: Option<&str>) -> WorkItem {
        WorkItem {
            name: name.into(),
            container_name: "MATH 201".into(),
            due_at: due_at.map(String::from),
            points: 0.0,
            description: String::new(),
            reference_url: "#".into(),
            source: "main".into(),
            container_id: None,
            origin: ItemOrigin::Planner,
            due_at_local: None,
            due_date_local: None,
        }
    }

    fn new_year_midnight() -> DateTime<Tz> {
        chrono_tz::America::Los_Angeles
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .unwrap()
    }

    fn names(items: &[WorkItem]) -> Vec<&str> {
        items.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn window_boundaries() {
        // Los Angeles is UTC-8 in January.
        let items = vec![
            item("inside", Some("2026-01-04T19:59:59Z")),
            item("just outside", Some("2026-01-04T20:00:01Z")),
            item("past", Some("2026-01-01T07:59:59Z")),
            item("at horizon", Some("2026-01-04T20:00:00Z")),
            item("at now", Some("2026-01-01T08:00:00Z")),
        ];

        let kept = classify(items, new_year_midnight(), &RunConfig::default());
        assert_eq!(names(&kept), vec!["at now", "inside", "at horizon"]);
    }

    #[test]
    fn grace_extension_reaches_early_fourth_day() {
        // Run at 14:00 on Jan 1; an item due 01:50 on Jan 5 is past a plain
        // three-day horizon but inside the 3d12h window.
        let now = chrono_tz::America::Los_Angeles
            .with_ymd_and_hms(2026, 1, 1, 14, 0, 0)
            .unwrap();
        let late = || vec![item("late night lab", Some("2026-01-05T09:50:00Z"))];

        assert_eq!(classify(late(), now, &RunConfig::default()).len(), 1);

        let three_days = RunConfig {
            window: chrono::TimeDelta::days(3),
            ..RunConfig::default()
        };
        assert!(classify(late(), now, &three_days).is_empty());
    }

    #[test]
    fn localizes_into_target_zone() {
        let now = chrono_tz::America::Los_Angeles
            .with_ymd_and_hms(2026, 1, 24, 0, 0, 0)
            .unwrap();
        let kept = classify(
            vec![
                item("morning", Some("2026-01-25T10:00:00Z")),
                item("previous evening", Some("2026-01-25T07:59:00Z")),
            ],
            now,
            &RunConfig::default(),
        );

        let evening = &kept[0];
        assert_eq!(evening.name, "previous evening");
        assert_eq!(
            evening.due_date_local,
            Some(NaiveDate::from_ymd_opt(2026, 1, 24).unwrap())
        );

        let morning = kept[1].due_at_local.unwrap();
        assert_eq!(morning.hour(), 2);
        assert_eq!(morning.minute(), 0);
        assert_eq!(morning.timezone(), chrono_tz::America::Los_Angeles);
        assert_eq!(
            kept[1].due_date_local,
            Some(NaiveDate::from_ymd_opt(2026, 1, 25).unwrap())
        );
    }

    #[test]
    fn now_in_another_zone_is_the_same_instant() {
        let now_utc = chrono_tz::UTC.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        let kept = classify(
            vec![item("at now", Some("2026-01-01T08:00:00Z"))],
            now_utc,
            &RunConfig::default(),
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(
            kept[0].due_at_local.unwrap().timezone(),
            chrono_tz::America::Los_Angeles
        );
    }

    #[test]
    fn drops_missing_and_unparsable_deadlines() {
        let items = vec![
            item("no date", None),
            item("offset form", Some("2026-01-02T10:00:00+00:00")),
            item("garbage", Some("tomorrow")),
            item("ok", Some("2026-01-02T10:00:00Z")),
        ];
        let kept = classify(items, new_year_midnight(), &RunConfig::default());
        assert_eq!(names(&kept), vec!["ok"]);
    }

    #[test]
    fn sorts_ascending_and_keeps_tie_order() {
        let items = vec![
            item("third", Some("2026-01-03T10:00:00Z")),
            item("tie a", Some("2026-01-02T10:00:00Z")),
            item("first", Some("2026-01-01T10:00:00Z")),
            item("tie b", Some("2026-01-02T10:00:00Z")),
        ];
        let kept = classify(items, new_year_midnight(), &RunConfig::default());
        assert_eq!(names(&kept), vec!["first", "tie a", "tie b", "third"]);
    }

    #[test]
    fn unclassified_items_have_no_local_fields() {
        let raw = item("raw", Some("2026-01-02T10:00:00Z"));
        assert!(raw.due_at_local.is_none());
        let kept = classify(vec![raw], new_year_midnight(), &RunConfig::default());
        assert!(kept[0].due_at_local.is_some());
        assert!(kept[0].due_date_local.is_some());
    }
}
