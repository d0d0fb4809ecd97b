//! Certificate eligibility evaluation.
//!
//! The rule engine deciding whether a project's evidence satisfies its
//! solution's certificate criteria is an external collaborator; the core
//! only consumes its verdict.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::model::Project;

/// What the rule engine decided.
#[derive(Debug, Clone, Deserialize)]
pub struct EligibilityVerdict {
    pub eligible: bool,
    #[serde(default)]
    pub message: String,
}

/// Seam for the external eligibility rule engine.
#[async_trait]
pub trait EligibilityEvaluator: Send + Sync {
    async fn evaluate(&self, project: &Project) -> Result<EligibilityVerdict>;
}

/// HTTP client posting a project's completion evidence to the rule engine.
pub struct HttpEligibilityEvaluator {
    client: Client,
    url: String,
    api_key: String,
}

impl HttpEligibilityEvaluator {
    pub fn new(url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl EligibilityEvaluator for HttpEligibilityEvaluator {
    async fn evaluate(&self, project: &Project) -> Result<EligibilityVerdict> {
        let body = serde_json::json!({
            "projectId": project.id,
            "solutionId": project.solution_information.as_ref().map(|s| s.id.clone()),
            "status": project.status,
            "taskReport": project.task_report,
            "completedDate": project.completed_date,
        });

        let resp = self
            .client
            .post(format!("{}/evaluate", self.url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            anyhow::bail!("eligibility evaluation failed: {} - {}", status, text);
        }

        Ok(serde_json::from_str(&text)?)
    }
}
