//! Sync coordination.
//!
//! Guards a sync against stale tokens and finalized projects, applies the
//! payload through the merge + rollup, persists one atomic field-set
//! update, and publishes the updated document fire-and-forget.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};
use crate::events::EventPublisher;
use crate::model::{Project, ProjectStatus, TaskReport};
use crate::store::ProjectStore;

use super::merge::{merge_forest, TaskPatch};
use super::report::task_report;

/// The writable surface of a sync. Computed fields (`taskReport`,
/// `certificate`, timestamps) are not expressible here, so a client cannot
/// overwrite them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub tasks: Option<Vec<TaskPatch>>,
    /// The token handed out on download; must equal the stored value
    #[serde(default)]
    pub last_downloaded_at: Option<DateTime<Utc>>,
}

/// Minimal summary returned to the caller instead of the full document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub project_id: String,
    pub status: ProjectStatus,
    pub task_report: TaskReport,
    pub updated_at: DateTime<Utc>,
}

/// Result of a successful sync. `newly_submitted` tells the caller to kick
/// off certificate issuance in the background.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub summary: SyncSummary,
    pub newly_submitted: bool,
}

/// Coordinates one sync round trip.
pub struct ProjectSyncCoordinator {
    store: Arc<dyn ProjectStore>,
    events: Arc<dyn EventPublisher>,
}

impl ProjectSyncCoordinator {
    pub fn new(store: Arc<dyn ProjectStore>, events: Arc<dyn EventPublisher>) -> Self {
        Self { store, events }
    }

    /// Reconcile a client payload with the stored project.
    ///
    /// Preconditions are checked in order, each its own failure: the
    /// project must exist for this user, the sync token must match exactly,
    /// and the project must not be finalized. A token mismatch aborts with
    /// no mutation at all.
    pub async fn sync(
        &self,
        project_id: &str,
        user_id: &str,
        request: SyncRequest,
    ) -> ServiceResult<SyncOutcome> {
        let token = request.last_downloaded_at.ok_or_else(|| {
            ServiceError::Validation("lastDownloadedAt is required".to_string())
        })?;

        let mut project = self
            .store
            .find_for_user(project_id, user_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("project {} not found", project_id))
            })?;

        if project.last_downloaded_at != Some(token) {
            return Err(ServiceError::Conflict(
                "project was modified since last download".to_string(),
            ));
        }

        if project.is_finalized() {
            return Err(ServiceError::Rejected(
                "project has already been submitted".to_string(),
            ));
        }

        let now = Utc::now();
        let was_submitted = project.status == ProjectStatus::Submitted;
        let mut fields = serde_json::Map::new();

        if let Some(title) = request.title {
            project.title = title;
            fields.insert("title".into(), serde_json::to_value(&project.title)?);
        }
        if let Some(description) = request.description {
            project.description = description;
            fields.insert(
                "description".into(),
                serde_json::to_value(&project.description)?,
            );
        }
        if let Some(status) = request.status {
            project.status = status;
            fields.insert("status".into(), serde_json::to_value(status)?);
        }

        if let Some(tasks) = &request.tasks {
            let merged = merge_forest(tasks, std::mem::take(&mut project.tasks), now)?;
            project.task_report = task_report(&merged);
            project.tasks = merged;
            fields.insert("tasks".into(), serde_json::to_value(&project.tasks)?);
            fields.insert(
                "taskReport".into(),
                serde_json::to_value(&project.task_report)?,
            );
        }

        let newly_submitted = !was_submitted && project.status == ProjectStatus::Submitted;
        if newly_submitted {
            project.completed_date = Some(now);
            fields.insert("completedDate".into(), serde_json::to_value(now)?);
        }

        project.updated_at = now;
        project.updated_by = user_id.to_string();
        fields.insert("updatedAt".into(), serde_json::to_value(now)?);
        fields.insert("updatedBy".into(), serde_json::to_value(user_id)?);

        self.store
            .update(project_id, serde_json::Value::Object(fields))
            .await?;

        self.publish(&project).await;

        Ok(SyncOutcome {
            summary: SyncSummary {
                project_id: project.id.clone(),
                status: project.status,
                task_report: project.task_report.clone(),
                updated_at: project.updated_at,
            },
            newly_submitted,
        })
    }

    /// Fire-and-forget publish of the updated document. Failure is logged,
    /// never propagated: the write is already committed.
    async fn publish(&self, project: &Project) {
        if let Err(e) = self.events.publish_project(project).await {
            tracing::warn!(project_id = %project.id, "event publish failed: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopEventPublisher;
    use crate::model::TaskStatus;
    use crate::store::InMemoryProjectStore;

    fn seeded_project(token: DateTime<Utc>) -> Project {
        serde_json::from_value(serde_json::json!({
            "id": "p-1",
            "userId": "u-1",
            "title": "School library",
            "status": "inProgress",
            "lastDownloadedAt": token,
            "tasks": [{
                "id": "task-a",
                "externalId": "task-a",
                "name": "Set up shelves",
                "status": "notStarted",
                "syncedAt": "2024-01-01T00:00:00Z",
                "updatedAt": "2024-01-01T00:00:00Z"
            }],
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    fn coordinator(store: Arc<InMemoryProjectStore>) -> ProjectSyncCoordinator {
        ProjectSyncCoordinator::new(store, Arc::new(NoopEventPublisher))
    }

    fn sync_request(token: DateTime<Utc>) -> SyncRequest {
        SyncRequest {
            last_downloaded_at: Some(token),
            tasks: Some(vec![
                TaskPatch {
                    id: Some("task-a".to_string()),
                    name: "Set up shelves".to_string(),
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
                TaskPatch {
                    name: "Paint the walls".to_string(),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn sync_merges_tasks_and_recomputes_report() {
        let token = Utc::now();
        let store = Arc::new(InMemoryProjectStore::new());
        store.insert(seeded_project(token)).await;

        let outcome = coordinator(Arc::clone(&store))
            .sync("p-1", "u-1", sync_request(token))
            .await
            .unwrap();

        assert_eq!(outcome.summary.task_report.total, 2);
        assert_eq!(outcome.summary.task_report.counts.get("completed"), Some(&1));
        assert_eq!(
            outcome.summary.task_report.counts.get("notStarted"),
            Some(&1)
        );
        assert!(!outcome.newly_submitted);

        let stored = store.find_by_id("p-1").await.unwrap().unwrap();
        assert_eq!(stored.tasks.len(), 2);
        assert_eq!(stored.tasks[0].status, TaskStatus::Completed);
        assert_eq!(stored.task_report.total, 2);
    }

    #[tokio::test]
    async fn stale_token_conflicts_and_leaves_document_unchanged() {
        let token = Utc::now();
        let store = Arc::new(InMemoryProjectStore::new());
        store.insert(seeded_project(token)).await;
        let before = serde_json::to_value(store.find_by_id("p-1").await.unwrap()).unwrap();

        let stale = token - chrono::Duration::minutes(5);
        let err = coordinator(Arc::clone(&store))
            .sync("p-1", "u-1", sync_request(stale))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), "CONFLICT");
        let after = serde_json::to_value(store.find_by_id("p-1").await.unwrap()).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn submitted_project_rejects_sync() {
        let token = Utc::now();
        let mut project = seeded_project(token);
        project.status = ProjectStatus::Submitted;
        let store = Arc::new(InMemoryProjectStore::new());
        store.insert(project).await;

        let err = coordinator(Arc::clone(&store))
            .sync("p-1", "u-1", sync_request(token))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), "REJECTED");
    }

    #[tokio::test]
    async fn unknown_project_or_wrong_user_is_not_found() {
        let token = Utc::now();
        let store = Arc::new(InMemoryProjectStore::new());
        store.insert(seeded_project(token)).await;

        let err = coordinator(Arc::clone(&store))
            .sync("p-1", "someone-else", sync_request(token))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), "NOT_FOUND");

        let err = coordinator(store)
            .sync("p-missing", "u-1", sync_request(token))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn missing_token_is_a_validation_failure() {
        let store = Arc::new(InMemoryProjectStore::new());
        store.insert(seeded_project(Utc::now())).await;

        let err = coordinator(store)
            .sync("p-1", "u-1", SyncRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), "VALIDATION");
    }

    #[tokio::test]
    async fn submission_stamps_completed_date_and_flags_outcome() {
        let token = Utc::now();
        let store = Arc::new(InMemoryProjectStore::new());
        store.insert(seeded_project(token)).await;

        let request = SyncRequest {
            status: Some(ProjectStatus::Submitted),
            ..sync_request(token)
        };
        let outcome = coordinator(Arc::clone(&store))
            .sync("p-1", "u-1", request)
            .await
            .unwrap();

        assert!(outcome.newly_submitted);
        let stored = store.find_by_id("p-1").await.unwrap().unwrap();
        assert_eq!(stored.status, ProjectStatus::Submitted);
        assert!(stored.completed_date.is_some());
    }

    #[tokio::test]
    async fn publish_failure_does_not_fail_the_sync() {
        struct FailingPublisher;

        #[async_trait::async_trait]
        impl EventPublisher for FailingPublisher {
            async fn publish_project(&self, _project: &Project) -> anyhow::Result<()> {
                anyhow::bail!("bus down")
            }
        }

        let token = Utc::now();
        let store = Arc::new(InMemoryProjectStore::new());
        store.insert(seeded_project(token)).await;

        let coordinator =
            ProjectSyncCoordinator::new(Arc::clone(&store) as Arc<dyn ProjectStore>, Arc::new(FailingPublisher));
        let outcome = coordinator.sync("p-1", "u-1", sync_request(token)).await;
        assert!(outcome.is_ok());
    }
}
