//! Project change events.
//!
//! After sync/add/certificate mutations the full updated document is
//! published fire-and-forget. Publish failures are logged by callers and
//! never roll back the persisted write.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use crate::model::Project;

/// Seam for the downstream event consumer.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_project(&self, project: &Project) -> Result<()>;
}

/// Publishes the document as JSON to a configured HTTP endpoint.
pub struct HttpEventPublisher {
    client: Client,
    endpoint: String,
}

impl HttpEventPublisher {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl EventPublisher for HttpEventPublisher {
    async fn publish_project(&self, project: &Project) -> Result<()> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(project)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("event publish failed: {} - {}", status, text);
        }
        Ok(())
    }
}

/// Publisher used when no event endpoint is configured.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish_project(&self, _project: &Project) -> Result<()> {
        Ok(())
    }
}
