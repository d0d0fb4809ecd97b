//! In-memory project store.
//!
//! Backs tests and local development. All mutations happen under a single
//! write lock, which makes the field-set and compare-and-swap updates
//! atomic the same way the document store's filtered PATCH is.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::model::{CertificateStatus, Project};

use super::{apply_fields, ProjectStore};

/// HashMap-backed store keyed by project id.
#[derive(Default)]
pub struct InMemoryProjectStore {
    projects: RwLock<HashMap<String, Project>>,
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document directly, bypassing `create`'s duplicate check.
    pub async fn insert(&self, project: Project) {
        self.projects.write().await.insert(project.id.clone(), project);
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn find_by_id(&self, project_id: &str) -> Result<Option<Project>> {
        Ok(self.projects.read().await.get(project_id).cloned())
    }

    async fn find_for_user(&self, project_id: &str, user_id: &str) -> Result<Option<Project>> {
        Ok(self
            .projects
            .read()
            .await
            .get(project_id)
            .filter(|p| p.user_id == user_id)
            .cloned())
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Project>> {
        Ok(self
            .projects
            .read()
            .await
            .values()
            .find(|p| {
                p.certificate
                    .as_ref()
                    .and_then(|c| c.transaction_id.as_deref())
                    == Some(transaction_id)
            })
            .cloned())
    }

    async fn create(&self, project: &Project) -> Result<()> {
        let mut projects = self.projects.write().await;
        if projects.contains_key(&project.id) {
            anyhow::bail!("project {} already exists", project.id);
        }
        projects.insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn update(&self, project_id: &str, fields: serde_json::Value) -> Result<()> {
        let mut projects = self.projects.write().await;
        let current = projects
            .get(project_id)
            .ok_or_else(|| anyhow::anyhow!("project {} not found", project_id))?;
        let updated = apply_fields(current, &fields)?;
        projects.insert(project_id.to_string(), updated);
        Ok(())
    }

    async fn update_certificate_if(
        &self,
        transaction_id: &str,
        expected: CertificateStatus,
        fields: serde_json::Value,
    ) -> Result<bool> {
        let mut projects = self.projects.write().await;
        let matched = projects.values().find_map(|p| {
            let cert = p.certificate.as_ref()?;
            (cert.transaction_id.as_deref() == Some(transaction_id)
                && cert.status == expected)
                .then(|| p.id.clone())
        });
        let Some(id) = matched else {
            return Ok(false);
        };
        let updated = apply_fields(&projects[&id], &fields)?;
        projects.insert(id, updated);
        Ok(true)
    }
}
