//! Task tree nodes.
//!
//! Tasks form an ordered forest of unbounded-but-bounded-depth nodes.
//! A task is never structurally removed once stored; deletion is expressed
//! by the `is_deleted` soft flag so offline clients can keep referencing it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum nesting depth accepted on ingestion. Deeper trees are rejected
/// as validation failures before any merge work happens.
pub const MAX_TASK_DEPTH: usize = 16;

/// Lifecycle status of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    NotStarted,
    Started,
    InProgress,
    Completed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl TaskStatus {
    /// Wire name, also used as the bucket key in the task report.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "notStarted",
            Self::Started => "started",
            Self::InProgress => "inProgress",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskType {
    /// Plain checklist item
    Simple,
    /// Backed by an observation submission
    Observation,
    /// Links learning content
    Content,
}

impl Default for TaskType {
    fn default() -> Self {
        Self::Simple
    }
}

/// A file or link attached to a task by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    #[serde(rename = "type")]
    pub content_type: String,
    /// Logical object-store path
    pub source_path: String,
}

/// A node in a project's work-breakdown tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Stable id; client-supplied or server-generated
    pub id: String,
    /// Human-facing reference, defaults from the name
    pub external_id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub status: TaskStatus,
    /// Soft-delete flag; flagged nodes stay in the tree
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default = "default_true")]
    pub is_deletable: bool,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Server-authoritative; never overwritten by client input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submissions: Option<serde_json::Value>,
    /// Server-authoritative; never overwritten by client input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation_information: Option<serde_json::Value>,
    /// External id of the parent, for conditional-visibility references
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_external_id: Option<String>,
    #[serde(default)]
    pub has_sub_tasks: bool,
    #[serde(default)]
    pub children: Vec<Task>,
    pub synced_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Task {
    /// Count of nodes in this subtree, the node itself included.
    pub fn subtree_len(&self) -> usize {
        // Explicit stack; ingestion bounds depth but not width.
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names_round_trip() {
        for status in [
            TaskStatus::NotStarted,
            TaskStatus::Started,
            TaskStatus::InProgress,
            TaskStatus::Completed,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            let back: TaskStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn task_defaults_apply_on_deserialize() {
        let json = serde_json::json!({
            "id": "t-1",
            "externalId": "improve-library",
            "name": "Improve the library",
            "syncedAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        });
        let task: Task = serde_json::from_value(json).unwrap();
        assert_eq!(task.task_type, TaskType::Simple);
        assert_eq!(task.status, TaskStatus::NotStarted);
        assert!(!task.is_deleted);
        assert!(task.is_deletable);
        assert!(task.attachments.is_empty());
        assert!(task.children.is_empty());
    }

    #[test]
    fn subtree_len_counts_nested_nodes() {
        let json = serde_json::json!({
            "id": "a", "externalId": "a", "name": "a",
            "syncedAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z",
            "children": [
                {
                    "id": "b", "externalId": "b", "name": "b",
                    "syncedAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z",
                    "children": [{
                        "id": "c", "externalId": "c", "name": "c",
                        "syncedAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"
                    }]
                }
            ]
        });
        let task: Task = serde_json::from_value(json).unwrap();
        assert_eq!(task.subtree_len(), 3);
    }
}
