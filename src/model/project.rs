//! The project document: a user's working instance of an improvement
//! template, holding the task tree and certificate state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::certificate::Certificate;
use super::task::Task;

/// Lifecycle status of a project. `Submitted` is terminal for sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectStatus {
    NotStarted,
    Started,
    InProgress,
    Completed,
    Submitted,
}

impl Default for ProjectStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "notStarted",
            Self::Started => "started",
            Self::InProgress => "inProgress",
            Self::Completed => "completed",
            Self::Submitted => "submitted",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-status rollup over non-deleted top-level tasks.
///
/// Serializes flat (`{"total": 2, "completed": 1, "notStarted": 1}`) to
/// match the document shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    pub total: u64,
    #[serde(flatten)]
    pub counts: BTreeMap<String, u64>,
}

/// Denormalized `{id, name}` snapshot of a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySnapshot {
    pub id: String,
    pub name: String,
}

/// Denormalized snapshot of the solution a project was created from,
/// carrying the certificate template reference used by issuance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionSnapshot {
    pub id: String,
    pub name: String,
    /// Logical object-store path of the certificate SVG template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_template_path: Option<String>,
}

/// A user's improvement project.
///
/// Created on add/import; tasks mutate only through sync/import; the
/// certificate mutates only through the issuance pipeline. Never physically
/// deleted once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub task_report: TaskReport,
    /// Optimistic-concurrency token handed to the client on download;
    /// sync requires it back unchanged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_downloaded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Certificate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_information: Option<EntitySnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution_information: Option<SolutionSnapshot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_by: String,
}

impl Project {
    /// Whether sync is still allowed.
    pub fn is_finalized(&self) -> bool {
        self.status == ProjectStatus::Submitted
    }
}
