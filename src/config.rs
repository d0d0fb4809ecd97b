//! Service configuration.
//!
//! Loaded once from the environment in `main` and carried inside the shared
//! application state; nothing reads ambient globals after startup.

use anyhow::{Context, Result};

/// Environment-driven configuration for the service and its collaborators.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// Base URL of the document store's REST interface
    pub store_url: String,
    /// API key for the document store
    pub store_api_key: String,
    /// Base URL of the document renderer
    pub renderer_url: String,
    /// Public URL the renderer posts its async callback to
    pub renderer_callback_url: String,
    /// Renderer round-trip timeout, seconds
    pub renderer_timeout_secs: u64,
    /// Base URL of the object store
    pub object_store_url: String,
    /// API key for the object store
    pub object_store_key: String,
    /// Bucket holding certificate artifacts and templates
    pub object_store_bucket: String,
    /// Base URL of the external eligibility rule engine
    pub eligibility_url: String,
    /// API key for the rule engine
    pub eligibility_api_key: String,
    /// Endpoint receiving fire-and-forget project change events; publishing
    /// is disabled when unset
    pub event_endpoint: Option<String>,
    /// Base URL embedded in certificate QR codes
    pub verification_base_url: String,
    /// Lifetime of short-lived artifact read URLs, seconds
    pub read_url_ttl_secs: u64,
}

impl Config {
    /// Build from environment variables. Store, renderer, and object-store
    /// coordinates are required; everything else has a sensible default.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:4000"),
            store_url: required("PROJECT_STORE_URL")?,
            store_api_key: required("PROJECT_STORE_API_KEY")?,
            renderer_url: required("RENDERER_URL")?,
            renderer_callback_url: env_or(
                "RENDERER_CALLBACK_URL",
                "http://localhost:4000/api/v1/certificates/callback",
            ),
            renderer_timeout_secs: env_parse("RENDERER_TIMEOUT_SECS", 120),
            object_store_url: required("OBJECT_STORE_URL")?,
            object_store_key: required("OBJECT_STORE_KEY")?,
            object_store_bucket: env_or("OBJECT_STORE_BUCKET", "certificates"),
            eligibility_url: required("ELIGIBILITY_URL")?,
            eligibility_api_key: env_or("ELIGIBILITY_API_KEY", ""),
            event_endpoint: std::env::var("EVENT_ENDPOINT").ok().filter(|v| !v.is_empty()),
            verification_base_url: env_or(
                "VERIFICATION_BASE_URL",
                "http://localhost:4000/api/v1/projects",
            ),
            read_url_ttl_secs: env_parse("READ_URL_TTL_SECS", 300),
        })
    }

    /// Public verification URL for a project, embedded in its QR code.
    pub fn verification_url(&self, project_id: &str) -> String {
        format!(
            "{}/{}/certificate",
            self.verification_base_url.trim_end_matches('/'),
            project_id
        )
    }
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{} must be set", name))
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_url_joins_without_double_slash() {
        let config = Config {
            bind_addr: String::new(),
            store_url: String::new(),
            store_api_key: String::new(),
            renderer_url: String::new(),
            renderer_callback_url: String::new(),
            renderer_timeout_secs: 0,
            object_store_url: String::new(),
            object_store_key: String::new(),
            object_store_bucket: String::new(),
            eligibility_url: String::new(),
            eligibility_api_key: String::new(),
            event_endpoint: None,
            verification_base_url: "https://example.org/api/v1/projects/".into(),
            read_url_ttl_secs: 0,
        };
        assert_eq!(
            config.verification_url("p-1"),
            "https://example.org/api/v1/projects/p-1/certificate"
        );
    }
}
