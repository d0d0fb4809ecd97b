//! Document renderer client (Gotenberg-compatible).
//!
//! The renderer accepts a multipart payload of markup + stylesheet and
//! works in two modes:
//!
//! - **async**: the request returns immediately; the rendered artifact (or
//!   an error body) arrives later on our webhook, correlated only by the
//!   `gotenberg-trace` header.
//! - **sync**: the request blocks and the response body is the artifact.
//!
//! A round-trip timeout applies to both modes; callers treat a timeout the
//! same as a failed callback.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use thiserror::Error;
use uuid::Uuid;

/// Header carrying the correlation id on requests and callbacks.
pub const TRACE_HEADER: &str = "gotenberg-trace";
/// Header naming the output file on success callbacks.
pub const DISPOSITION_HEADER: &str = "content-disposition";

/// Renderer failure, classified so callers can map timeouts onto the
/// callback-error state.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer timed out")]
    Timeout,
    #[error("renderer returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("renderer unreachable: {0}")]
    Network(String),
}

impl RenderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// What gets rendered: populated SVG markup, optional stylesheet, and the
/// filename the artifact should carry.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub svg: String,
    pub css: Option<String>,
    pub output_filename: String,
}

/// Seam for the external document renderer.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Dispatch an asynchronous render. Returns the transaction id that the
    /// eventual webhook callback will carry.
    async fn render_async(&self, request: &RenderRequest) -> Result<String, RenderError>;

    /// Render synchronously; the returned bytes are the finished PDF.
    async fn render_sync(&self, request: &RenderRequest) -> Result<Bytes, RenderError>;
}

/// HTTP client for a Gotenberg-compatible renderer.
pub struct GotenbergClient {
    client: Client,
    url: String,
    /// Where the renderer posts async results
    webhook_url: String,
}

impl GotenbergClient {
    pub fn new(url: &str, webhook_url: &str, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_else(|_| Client::new()),
            url: url.trim_end_matches('/').to_string(),
            webhook_url: webhook_url.to_string(),
        }
    }

    fn convert_url(&self) -> String {
        format!("{}/forms/chromium/convert/html", self.url)
    }

    /// The renderer keys file roles off the multipart file names.
    fn form(request: &RenderRequest) -> reqwest::multipart::Form {
        let mut form = reqwest::multipart::Form::new().part(
            "files",
            reqwest::multipart::Part::text(request.svg.clone()).file_name("index.html"),
        );
        if let Some(css) = &request.css {
            form = form.part(
                "files",
                reqwest::multipart::Part::text(css.clone()).file_name("style.css"),
            );
        }
        form
    }

    fn classify(err: reqwest::Error) -> RenderError {
        if err.is_timeout() {
            RenderError::Timeout
        } else if err.is_connect() {
            RenderError::Network(format!("connection failed: {}", err))
        } else {
            RenderError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl DocumentRenderer for GotenbergClient {
    async fn render_async(&self, request: &RenderRequest) -> Result<String, RenderError> {
        let trace = Uuid::new_v4().to_string();

        let resp = self
            .client
            .post(self.convert_url())
            .header(TRACE_HEADER, &trace)
            .header("Gotenberg-Webhook-Url", &self.webhook_url)
            .header("Gotenberg-Webhook-Error-Url", &self.webhook_url)
            .header("Gotenberg-Output-Filename", &request.output_filename)
            .multipart(Self::form(request))
            .send()
            .await
            .map_err(Self::classify)?;

        let status = resp.status();
        // The renderer may echo the trace back; prefer its value.
        let echoed = resp
            .headers()
            .get(TRACE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RenderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(trace = %trace, "render dispatched");
        Ok(echoed.unwrap_or(trace))
    }

    async fn render_sync(&self, request: &RenderRequest) -> Result<Bytes, RenderError> {
        let resp = self
            .client
            .post(self.convert_url())
            .header(TRACE_HEADER, Uuid::new_v4().to_string())
            .header("Gotenberg-Output-Filename", &request.output_filename)
            .multipart(Self::form(request))
            .send()
            .await
            .map_err(Self::classify)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RenderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        resp.bytes().await.map_err(Self::classify)
    }
}
