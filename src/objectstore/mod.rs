//! Object store collaborator.
//!
//! Artifacts and templates live under opaque logical paths; the store
//! issues short-lived read URLs on demand. Documents persist paths, never
//! URLs.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;

/// Seam for the external object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload bytes to a logical path.
    async fn upload(&self, path: &str, content: Bytes, content_type: &str) -> Result<()>;

    /// Download the object at a logical path.
    async fn download(&self, path: &str) -> Result<Bytes>;

    /// Issue a short-lived read URL for a logical path.
    async fn read_url(&self, path: &str, ttl_secs: u64) -> Result<String>;
}

/// HTTP object-store client (bucket + signed-URL API).
pub struct HttpObjectStore {
    client: Client,
    url: String,
    api_key: String,
    bucket: String,
}

impl HttpObjectStore {
    pub fn new(url: &str, api_key: &str, bucket: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            bucket: bucket.to_string(),
        }
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/object/{}/{}", self.url, self.bucket, path)
    }
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(&self, path: &str, content: Bytes, content_type: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.object_url(path))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(content)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("upload of {} failed: {} - {}", path, status, text);
        }
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Bytes> {
        let resp = self
            .client
            .get(self.object_url(path))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("download of {} failed: {} - {}", path, status, text);
        }
        Ok(resp.bytes().await?)
    }

    async fn read_url(&self, path: &str, ttl_secs: u64) -> Result<String> {
        let resp = self
            .client
            .post(format!("{}/object/sign/{}/{}", self.url, self.bucket, path))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "expiresIn": ttl_secs }))
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            anyhow::bail!("signing {} failed: {} - {}", path, status, text);
        }

        let signed: SignedUrlResponse = serde_json::from_str(&text)?;
        // The API returns a path relative to the storage root.
        Ok(format!(
            "{}/{}",
            self.url,
            signed.signed_url.trim_start_matches('/')
        ))
    }
}
