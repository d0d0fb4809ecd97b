//! Task status rollup.

use std::collections::BTreeMap;

use crate::model::{Task, TaskReport};

/// Recompute the per-status report over non-deleted top-level tasks.
/// Deleted nodes are excluded from `total` and from every bucket.
pub fn task_report(tasks: &[Task]) -> TaskReport {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut total = 0;

    for task in tasks.iter().filter(|task| !task.is_deleted) {
        total += 1;
        *counts.entry(task.status.as_str().to_string()).or_insert(0) += 1;
    }

    TaskReport { total, counts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::model::{TaskStatus, TaskType};

    fn task(id: &str, status: TaskStatus, is_deleted: bool) -> Task {
        let now = Utc::now();
        Task {
            id: id.to_string(),
            external_id: id.to_string(),
            name: id.to_string(),
            task_type: TaskType::Simple,
            status,
            is_deleted,
            is_deletable: true,
            attachments: Vec::new(),
            submissions: None,
            observation_information: None,
            parent_external_id: None,
            has_sub_tasks: false,
            children: Vec::new(),
            synced_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn counts_only_non_deleted_top_level_tasks() {
        let tasks = vec![
            task("a", TaskStatus::Completed, false),
            task("b", TaskStatus::NotStarted, false),
            task("c", TaskStatus::Completed, true),
        ];

        let report = task_report(&tasks);
        assert_eq!(report.total, 2);
        assert_eq!(report.counts.get("completed"), Some(&1));
        assert_eq!(report.counts.get("notStarted"), Some(&1));
        // The deleted task appears in no bucket.
        assert_eq!(report.counts.values().sum::<u64>(), report.total);
    }

    #[test]
    fn empty_forest_reports_zero() {
        let report = task_report(&[]);
        assert_eq!(report.total, 0);
        assert!(report.counts.is_empty());
    }

    #[test]
    fn per_status_sums_equal_total() {
        let tasks = vec![
            task("a", TaskStatus::Completed, false),
            task("b", TaskStatus::Completed, false),
            task("c", TaskStatus::InProgress, false),
            task("d", TaskStatus::Started, true),
        ];
        let report = task_report(&tasks);
        assert_eq!(report.counts.values().sum::<u64>(), report.total);
    }
}
