//! HTTP document-store client (PostgREST-style REST interface).
//!
//! Filtered PATCH with `Prefer: return=representation` is what gives the
//! atomic field-set and compare-and-swap semantics: the filter and the
//! write happen in one round trip, and the response rows tell us whether
//! anything matched.

use anyhow::Result;
use reqwest::Client;

use crate::model::{CertificateStatus, Project};

use super::ProjectStore;

/// REST client for the project collection.
pub struct HttpProjectStore {
    client: Client,
    url: String,
    api_key: String,
}

impl HttpProjectStore {
    pub fn new(url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/projects", self.url)
    }

    async fn fetch_one(&self, filter: &str) -> Result<Option<Project>> {
        let resp = self
            .client
            .get(format!("{}?{}&limit=1", self.collection_url(), filter))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            anyhow::bail!("project lookup failed: {} - {}", status, text);
        }

        let projects: Vec<Project> = serde_json::from_str(&text)?;
        Ok(projects.into_iter().next())
    }

    /// PATCH documents matching `filter`; returns the rows that matched.
    async fn patch(&self, filter: &str, fields: &serde_json::Value) -> Result<Vec<Project>> {
        let resp = self
            .client
            .patch(format!("{}?{}", self.collection_url(), filter))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .json(fields)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            anyhow::bail!("project update failed: {} - {}", status, text);
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait::async_trait]
impl ProjectStore for HttpProjectStore {
    /// The callback lookup and the user-scoped lookup both depend on these;
    /// the RPC is a no-op when the indexes already exist.
    async fn ensure_indexes(&self) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/rpc/ensure_project_indexes", self.url))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "indexes": ["userId", "certificate->>transactionId"]
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("index registration failed: {} - {}", status, text);
        }
        Ok(())
    }

    async fn find_by_id(&self, project_id: &str) -> Result<Option<Project>> {
        self.fetch_one(&format!("id=eq.{}", urlencoding::encode(project_id)))
            .await
    }

    async fn find_for_user(&self, project_id: &str, user_id: &str) -> Result<Option<Project>> {
        self.fetch_one(&format!(
            "id=eq.{}&userId=eq.{}",
            urlencoding::encode(project_id),
            urlencoding::encode(user_id)
        ))
        .await
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Project>> {
        self.fetch_one(&format!(
            "certificate->>transactionId=eq.{}",
            urlencoding::encode(transaction_id)
        ))
        .await
    }

    async fn create(&self, project: &Project) -> Result<()> {
        let resp = self
            .client
            .post(self.collection_url())
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(project)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await?;
            anyhow::bail!("project create failed: {} - {}", status, text);
        }
        Ok(())
    }

    async fn update(&self, project_id: &str, fields: serde_json::Value) -> Result<()> {
        let matched = self
            .patch(
                &format!("id=eq.{}", urlencoding::encode(project_id)),
                &fields,
            )
            .await?;
        if matched.is_empty() {
            anyhow::bail!("project {} not found", project_id);
        }
        Ok(())
    }

    async fn update_certificate_if(
        &self,
        transaction_id: &str,
        expected: CertificateStatus,
        fields: serde_json::Value,
    ) -> Result<bool> {
        let filter = format!(
            "certificate->>transactionId=eq.{}&certificate->>status=eq.{}",
            urlencoding::encode(transaction_id),
            expected.as_str()
        );
        let matched = self.patch(&filter, &fields).await?;
        Ok(!matched.is_empty())
    }
}
