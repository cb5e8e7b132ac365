//! Identity-based merge of work item lists.

use std::collections::HashSet;

use tracing::debug;

use coursewatch_shared::WorkItem;

/// Merge item lists in the given order, keeping the first item seen for each
/// identity key (`name`, raw `due_at`).
///
/// Later duplicates are dropped even when they carry richer fields, so callers
/// put the list they trust most first (planner view before enumeration,
/// earlier instances before later ones).
pub fn merge<I>(lists: I) -> Vec<WorkItem>
where
    I: IntoIterator<Item = Vec<WorkItem>>,
{
    let all: Vec<WorkItem> = lists.into_iter().flatten().collect();

    let mut seen = HashSet::new();
    let keep: Vec<bool> = all.iter().map(|item| seen.insert(item.identity_key())).collect();
    drop(seen);

    let total = all.len();
    let merged: Vec<WorkItem> = all
        .into_iter()
        .zip(keep)
        .filter_map(|(item, first)| first.then_some(item))
        .collect();
    let dropped = total - merged.len();

    debug!(kept = merged.len(), dropped, "merged work items");
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursewatch_shared::ItemOrigin;

    fn item(name: &str, due_at: Option<&str>, description: &str) -> WorkItem {
        WorkItem {
            name: name.into(),
            container_name: "ENG 101".into(),
            due_at: due_at.map(String::from),
            points: 10.0,
            description: description.into(),
            reference_url: "#".into(),
            source: "main".into(),
            container_id: Some(1),
            origin: ItemOrigin::Enumeration,
            due_at_local: None,
            due_date_local: None,
        }
    }

    fn names(items: &[WorkItem]) -> Vec<(&str, Option<&str>, &str)> {
        items
            .iter()
            .map(|i| (i.name.as_str(), i.due_at.as_deref(), i.description.as_str()))
            .collect()
    }

    #[test]
    fn first_seen_wins() {
        let a = vec![item("Essay 1", Some("2026-02-01T23:59:00Z"), "planner")];
        let b = vec![
            item("Essay 1", Some("2026-02-01T23:59:00Z"), "enumeration, richer"),
            item("Quiz 2", Some("2026-02-02T23:59:00Z"), "quiz"),
        ];
        let merged = merge(vec![a, b]);
        assert_eq!(
            names(&merged),
            vec![
                ("Essay 1", Some("2026-02-01T23:59:00Z"), "planner"),
                ("Quiz 2", Some("2026-02-02T23:59:00Z"), "quiz"),
            ]
        );
    }

    #[test]
    fn identity_requires_exact_name_and_due_at() {
        let merged = merge(vec![vec![
            item("Essay 1", Some("2026-02-01T23:59:00Z"), ""),
            item("Essay 1", Some("2026-02-02T23:59:00Z"), ""),
            item("essay 1", Some("2026-02-01T23:59:00Z"), ""),
            item("Essay 1", Some("2026-02-01T23:59:00+00:00"), ""),
            item("Essay 1", None, ""),
            item("Essay 1", None, "second undated"),
        ]]);
        assert_eq!(merged.len(), 5);
        assert_eq!(merged[4].due_at, None);
        assert_eq!(merged[4].description, "");
    }

    #[test]
    fn duplicates_within_one_list_collapse() {
        let merged = merge(vec![vec![
            item("HW", Some("2026-01-05T08:00:00Z"), "one"),
            item("HW", Some("2026-01-05T08:00:00Z"), "two"),
        ]]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].description, "one");
    }

    #[test]
    fn merge_is_idempotent_over_grouping() {
        let a = vec![
            item("A", Some("2026-01-01T00:00:00Z"), "a1"),
            item("B", Some("2026-01-02T00:00:00Z"), "b1"),
        ];
        let b = vec![
            item("B", Some("2026-01-02T00:00:00Z"), "b2"),
            item("C", None, "c1"),
        ];
        let c = vec![
            item("C", None, "c2"),
            item("A", Some("2026-01-01T00:00:00Z"), "a3"),
            item("D", Some("2026-01-04T00:00:00Z"), "d3"),
        ];

        let nested = merge(vec![merge(vec![a.clone(), b.clone()]), c.clone()]);
        let flat = merge(vec![a, b, c]);
        assert_eq!(names(&nested), names(&flat));
        assert_eq!(flat.len(), 4);
    }

    #[test]
    fn merged_items_have_distinct_identity_keys() {
        let merged = merge(vec![
            vec![
                item("Quiz", Some("2026-03-01T10:00:00Z"), "a"),
                item("Quiz", None, "b"),
            ],
            vec![
                item("Quiz", None, "c"),
                item("Quiz", Some("2026-03-01T10:00:00Z"), "d"),
            ],
        ]);
        let keys: HashSet<_> = merged.iter().map(WorkItem::identity_key).collect();
        assert_eq!(keys.len(), merged.len());
        assert_eq!(
            merged.iter().map(|i| i.description.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn empty_input() {
        assert!(merge(Vec::<Vec<WorkItem>>::new()).is_empty());
        assert!(merge(vec![vec![], vec![]]).is_empty());
    }
}
