//! Certificate issuance state machine.
//!
//! ```text
//! notEvaluated --evaluate--> ineligible          (terminal, message set)
//! notEvaluated --evaluate--> eligible
//! eligible --build payload--> payloadBuilt
//! payloadBuilt --dispatch--> requested           (transaction id assigned,
//!                                                 svg uploaded for durability)
//! requested --callback ok--> issued              (pdf path + issued-on set)
//! requested --callback err--> callbackError      (message set)
//! issued | callbackError --reissue--> eligible   (prior issuance archived)
//! ```
//!
//! The async callback is correlated solely by transaction id and applied
//! through a compare-and-swap on (transaction id, status == requested), so
//! at-least-once delivery cannot double-apply a transition. The reissue
//! path renders synchronously inside a scoped temp directory that is
//! removed on every exit path.

use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::events::EventPublisher;
use crate::model::{Certificate, CertificateStatus, Project};
use crate::objectstore::ObjectStore;
use crate::renderer::{DocumentRenderer, RenderError};
use crate::store::ProjectStore;

use super::payload::{CertificatePayloadBuilder, RenderPayload};
use super::EligibilityEvaluator;

/// How an issuance attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuanceOutcome {
    /// Evaluator said no; certificate persisted as ineligible with its
    /// message, no renderer call made
    Ineligible { message: String },
    /// Dispatched; the webhook will finish the job
    Requested { transaction_id: String },
    /// Renderer unreachable or timed out; persisted as callbackError
    Failed { message: String },
}

/// What the webhook handler did with a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackDisposition {
    /// Exactly one state transition applied
    Applied,
    /// Unknown transaction id, or the transition had already been applied
    Ignored,
}

/// An inbound renderer callback, already parsed by the HTTP layer.
#[derive(Debug, Clone)]
pub enum RenderCallback {
    Success {
        /// Output filename from the `content-disposition` header
        filename: Option<String>,
        artifact: Bytes,
    },
    Failure { message: String },
}

/// Drives certificates through the issuance pipeline.
pub struct CertificateIssuer {
    store: Arc<dyn ProjectStore>,
    evaluator: Arc<dyn EligibilityEvaluator>,
    payloads: CertificatePayloadBuilder,
    renderer: Arc<dyn DocumentRenderer>,
    objects: Arc<dyn ObjectStore>,
    events: Arc<dyn EventPublisher>,
    /// Base of the public verification URL embedded in QR codes
    verification_base_url: String,
}

impl CertificateIssuer {
    pub fn new(
        store: Arc<dyn ProjectStore>,
        evaluator: Arc<dyn EligibilityEvaluator>,
        renderer: Arc<dyn DocumentRenderer>,
        objects: Arc<dyn ObjectStore>,
        events: Arc<dyn EventPublisher>,
        verification_base_url: String,
    ) -> Self {
        Self {
            store,
            evaluator,
            payloads: CertificatePayloadBuilder::new(Arc::clone(&objects)),
            renderer,
            objects,
            events,
            verification_base_url,
        }
    }

    fn verification_url(&self, project_id: &str) -> String {
        format!(
            "{}/{}/certificate",
            self.verification_base_url.trim_end_matches('/'),
            project_id
        )
    }

    // ─────────────────────────────────────────────────────────────────────
    // Normal (async) issuance
    // ─────────────────────────────────────────────────────────────────────

    /// Evaluate eligibility and, when eligible, dispatch an async render.
    pub async fn issue(&self, project_id: &str) -> ServiceResult<IssuanceOutcome> {
        let project = self
            .store
            .find_by_id(project_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("project {} not found", project_id)))?;

        if !project.is_finalized() {
            return Err(ServiceError::Rejected(
                "certificate issuance requires a submitted project".to_string(),
            ));
        }

        let verdict = self
            .evaluator
            .evaluate(&project)
            .await
            .context("eligibility evaluation")?;

        if !verdict.eligible {
            let certificate = Certificate {
                eligible: false,
                message: Some(verdict.message.clone()),
                status: CertificateStatus::Ineligible,
                ..Default::default()
            };
            self.persist_certificate(&project, certificate).await?;
            tracing::info!(project_id, "certificate ineligible: {}", verdict.message);
            return Ok(IssuanceOutcome::Ineligible {
                message: verdict.message,
            });
        }

        let payload = self
            .payloads
            .build(&project, &self.verification_url(project_id))
            .await?;

        // The populated SVG is uploaded before dispatch so the artifact
        // survives even if the renderer never calls back.
        self.objects
            .upload(
                &payload.svg_path,
                Bytes::from(payload.request.svg.clone()),
                "image/svg+xml",
            )
            .await
            .context("uploading certificate svg")?;

        match self.renderer.render_async(&payload.request).await {
            Ok(transaction_id) => {
                let certificate = Certificate {
                    eligible: true,
                    status: CertificateStatus::Requested,
                    transaction_id: Some(transaction_id.clone()),
                    svg_path: Some(payload.svg_path.clone()),
                    ..Default::default()
                };
                self.persist_certificate(&project, certificate).await?;
                tracing::info!(project_id, %transaction_id, "certificate render dispatched");
                Ok(IssuanceOutcome::Requested { transaction_id })
            }
            Err(err) if err.is_timeout() => {
                let message = err.to_string();
                let certificate = Certificate {
                    eligible: true,
                    status: CertificateStatus::CallbackError,
                    message: Some(message.clone()),
                    svg_path: Some(payload.svg_path.clone()),
                    ..Default::default()
                };
                self.persist_certificate(&project, certificate).await?;
                tracing::warn!(project_id, "certificate dispatch timed out");
                Ok(IssuanceOutcome::Failed { message })
            }
            Err(err) => Err(ServiceError::Upstream(
                anyhow::Error::new(err).context("certificate render dispatch"),
            )),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Webhook reconciliation
    // ─────────────────────────────────────────────────────────────────────

    /// Apply a renderer callback. The transaction id is the only handle on
    /// the owning project; an unknown id is a no-op, not an error — the
    /// renderer may retry or serve other tenants.
    pub async fn handle_callback(
        &self,
        transaction_id: &str,
        callback: RenderCallback,
    ) -> ServiceResult<CallbackDisposition> {
        let Some(project) = self.store.find_by_transaction_id(transaction_id).await? else {
            tracing::info!(transaction_id, "callback for unknown transaction ignored");
            return Ok(CallbackDisposition::Ignored);
        };
        let Some(current) = project.certificate.clone() else {
            tracing::info!(transaction_id, "callback for project without certificate ignored");
            return Ok(CallbackDisposition::Ignored);
        };

        let updated = match callback {
            RenderCallback::Success { filename, artifact } => {
                let pdf_path = pdf_path_for(&project, &current, filename.as_deref());
                self.objects
                    .upload(&pdf_path, artifact, "application/pdf")
                    .await
                    .context("uploading certificate pdf")?;
                Certificate {
                    status: CertificateStatus::Issued,
                    pdf_path: Some(pdf_path),
                    issued_on: Some(Utc::now()),
                    message: None,
                    ..current
                }
            }
            RenderCallback::Failure { message } => Certificate {
                status: CertificateStatus::CallbackError,
                message: Some(message),
                ..current
            },
        };

        // Compare-and-swap on (transaction id, requested): a duplicate
        // delivery finds the status already moved and matches nothing.
        let matched = self
            .store
            .update_certificate_if(
                transaction_id,
                CertificateStatus::Requested,
                serde_json::json!({
                    "certificate": &updated,
                    "updatedAt": Utc::now(),
                }),
            )
            .await?;

        if !matched {
            tracing::info!(transaction_id, "callback transition already applied, ignored");
            return Ok(CallbackDisposition::Ignored);
        }

        tracing::info!(
            project_id = %project.id,
            transaction_id,
            status = %updated.status,
            "certificate callback applied"
        );
        if let Some(refreshed) = self.store.find_by_id(&project.id).await? {
            self.publish(&refreshed).await;
        }
        Ok(CallbackDisposition::Applied)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Synchronous reissue
    // ─────────────────────────────────────────────────────────────────────

    /// Re-render a certificate synchronously. The prior issuance is
    /// archived before any new value is assigned; the render stages its
    /// artifacts in a scoped temp directory that is deleted on every exit
    /// path, including early returns.
    pub async fn reissue(&self, project_id: &str, user_id: &str) -> ServiceResult<IssuanceOutcome> {
        let project = self
            .store
            .find_for_user(project_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("project {} not found", project_id)))?;

        let mut certificate = project
            .certificate
            .clone()
            .filter(|c| c.eligible)
            .ok_or_else(|| {
                ServiceError::Ineligible("project has no eligible certificate".to_string())
            })?;

        if !matches!(
            certificate.status,
            CertificateStatus::Issued | CertificateStatus::CallbackError
        ) {
            return Err(ServiceError::Rejected(format!(
                "certificate in state {} cannot be reissued",
                certificate.status
            )));
        }

        // Archive first and persist the archived state: from here on there
        // is no active transaction id until the new one lands.
        certificate.archive_current();
        self.persist_certificate(&project, certificate.clone()).await?;

        let payload = self
            .payloads
            .build(&project, &self.verification_url(project_id))
            .await?;
        let transaction_id = Uuid::new_v4().to_string();

        // Scoped working directory; the Drop guard removes it on success,
        // upstream failure, and panic alike.
        let workdir = tempfile::tempdir().context("creating render workdir")?;

        let outcome = self
            .render_and_store(&mut certificate, &payload, &transaction_id, workdir.path())
            .await;

        match outcome {
            Ok(()) => {
                self.persist_certificate(&project, certificate).await?;
                tracing::info!(project_id, %transaction_id, "certificate reissued");
                Ok(IssuanceOutcome::Requested { transaction_id })
            }
            Err(RenderError::Timeout) | Err(RenderError::Network(_)) => {
                let message = "renderer unavailable during reissue".to_string();
                certificate.status = CertificateStatus::CallbackError;
                certificate.message = Some(message.clone());
                certificate.transaction_id = Some(transaction_id);
                self.persist_certificate(&project, certificate).await?;
                Ok(IssuanceOutcome::Failed { message })
            }
            Err(err) => Err(ServiceError::Upstream(
                anyhow::Error::new(err).context("synchronous certificate render"),
            )),
        }
    }

    /// Render synchronously, stage both artifacts under `workdir`, upload
    /// them, and fill in the certificate's new live fields.
    async fn render_and_store(
        &self,
        certificate: &mut Certificate,
        payload: &RenderPayload,
        transaction_id: &str,
        workdir: &std::path::Path,
    ) -> Result<(), RenderError> {
        let pdf = self.renderer.render_sync(&payload.request).await?;

        let stage = |name: &str| workdir.join(name);
        let io_err = |e: std::io::Error| RenderError::Network(format!("staging artifact: {}", e));
        tokio::fs::write(stage("certificate.svg"), payload.request.svg.as_bytes())
            .await
            .map_err(io_err)?;
        tokio::fs::write(stage("certificate.pdf"), &pdf)
            .await
            .map_err(io_err)?;

        let upload_err =
            |e: anyhow::Error| RenderError::Network(format!("artifact upload: {:#}", e));
        let svg = tokio::fs::read(stage("certificate.svg")).await.map_err(io_err)?;
        let pdf = tokio::fs::read(stage("certificate.pdf")).await.map_err(io_err)?;
        futures::future::try_join(
            self.objects
                .upload(&payload.svg_path, Bytes::from(svg), "image/svg+xml"),
            self.objects
                .upload(&payload.pdf_path, Bytes::from(pdf), "application/pdf"),
        )
        .await
        .map_err(upload_err)?;

        certificate.status = CertificateStatus::Issued;
        certificate.transaction_id = Some(transaction_id.to_string());
        certificate.svg_path = Some(payload.svg_path.clone());
        certificate.pdf_path = Some(payload.pdf_path.clone());
        certificate.issued_on = Some(Utc::now());
        certificate.message = None;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Shared plumbing
    // ─────────────────────────────────────────────────────────────────────

    async fn persist_certificate(
        &self,
        project: &Project,
        certificate: Certificate,
    ) -> ServiceResult<()> {
        self.store
            .update(
                &project.id,
                serde_json::json!({
                    "certificate": certificate,
                    "updatedAt": Utc::now(),
                }),
            )
            .await?;
        if let Some(refreshed) = self.store.find_by_id(&project.id).await? {
            self.publish(&refreshed).await;
        }
        Ok(())
    }

    /// Fire-and-forget; the certificate write is already committed.
    async fn publish(&self, project: &Project) {
        if let Err(e) = self.events.publish_project(project).await {
            tracing::warn!(project_id = %project.id, "event publish failed: {:#}", e);
        }
    }
}

/// The PDF lands next to the SVG when one was staged, otherwise under a
/// name derived from the callback's disposition filename.
fn pdf_path_for(project: &Project, certificate: &Certificate, filename: Option<&str>) -> String {
    if let Some(svg_path) = certificate.svg_path.as_deref() {
        if let Some(stem) = svg_path.strip_suffix(".svg") {
            return format!("{}.pdf", stem);
        }
    }
    let name = filename
        .map(|f| f.trim_matches('"').to_string())
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| format!("{}.pdf", Uuid::new_v4()));
    format!("certificates/{}/{}", project.id, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::certificate::EligibilityVerdict;
    use crate::events::NoopEventPublisher;
    use crate::renderer::RenderRequest;
    use crate::store::InMemoryProjectStore;

    // ── Test collaborators ───────────────────────────────────────────────

    struct FixedEvaluator(bool, &'static str);

    #[async_trait::async_trait]
    impl EligibilityEvaluator for FixedEvaluator {
        async fn evaluate(&self, _project: &Project) -> anyhow::Result<EligibilityVerdict> {
            Ok(EligibilityVerdict {
                eligible: self.0,
                message: self.1.to_string(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingRenderer {
        dispatches: Mutex<Vec<String>>,
        sync_result: Option<&'static str>,
        timeout: bool,
    }

    #[async_trait::async_trait]
    impl DocumentRenderer for RecordingRenderer {
        async fn render_async(&self, request: &RenderRequest) -> Result<String, RenderError> {
            if self.timeout {
                return Err(RenderError::Timeout);
            }
            self.dispatches
                .lock()
                .unwrap()
                .push(request.output_filename.clone());
            Ok("tx-123".to_string())
        }

        async fn render_sync(&self, _request: &RenderRequest) -> Result<Bytes, RenderError> {
            if self.timeout {
                return Err(RenderError::Timeout);
            }
            Ok(Bytes::from_static(
                self.sync_result.unwrap_or("%PDF-stub").as_bytes(),
            ))
        }
    }

    #[derive(Default)]
    struct MemoryObjects {
        objects: Mutex<std::collections::HashMap<String, Bytes>>,
    }

    #[async_trait::async_trait]
    impl ObjectStore for MemoryObjects {
        async fn upload(&self, path: &str, content: Bytes, _content_type: &str) -> anyhow::Result<()> {
            self.objects.lock().unwrap().insert(path.to_string(), content);
            Ok(())
        }

        async fn download(&self, path: &str) -> anyhow::Result<Bytes> {
            self.objects
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("{} not found", path))
        }

        async fn read_url(&self, path: &str, _ttl_secs: u64) -> anyhow::Result<String> {
            Ok(format!("https://signed.example/{}", path))
        }
    }

    // ── Fixtures ─────────────────────────────────────────────────────────

    fn submitted_project() -> Project {
        serde_json::from_value(serde_json::json!({
            "id": "p-1",
            "userId": "u-1",
            "userName": "Asha Rao",
            "title": "School library",
            "status": "submitted",
            "completedDate": "2024-03-05T12:00:00Z",
            "solutionInformation": {
                "id": "sol-1",
                "name": "Library improvement",
                "certificateTemplatePath": "templates/library.svg"
            },
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    struct Harness {
        store: Arc<InMemoryProjectStore>,
        objects: Arc<MemoryObjects>,
        issuer: CertificateIssuer,
    }

    async fn harness(eligible: bool, renderer: RecordingRenderer) -> Harness {
        let store = Arc::new(InMemoryProjectStore::new());
        store.insert(submitted_project()).await;
        let objects = Arc::new(MemoryObjects::default());
        objects
            .upload(
                "templates/library.svg",
                Bytes::from_static(b"<svg>{{userName}} {{qrCode}}</svg>"),
                "image/svg+xml",
            )
            .await
            .unwrap();

        let issuer = CertificateIssuer::new(
            Arc::clone(&store) as Arc<dyn ProjectStore>,
            Arc::new(FixedEvaluator(eligible, "minimum tasks not completed")),
            Arc::new(renderer),
            Arc::clone(&objects) as Arc<dyn ObjectStore>,
            Arc::new(NoopEventPublisher),
            "https://example.org/api/v1/projects".to_string(),
        );
        Harness { store, objects, issuer }
    }

    // ── Issuance ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn ineligible_verdict_persists_message_and_skips_renderer() {
        let h = harness(false, RecordingRenderer::default()).await;

        let outcome = h.issuer.issue("p-1").await.unwrap();
        assert_eq!(
            outcome,
            IssuanceOutcome::Ineligible {
                message: "minimum tasks not completed".to_string()
            }
        );

        let stored = h.store.find_by_id("p-1").await.unwrap().unwrap();
        let cert = stored.certificate.unwrap();
        assert!(!cert.eligible);
        assert_eq!(cert.status, CertificateStatus::Ineligible);
        assert_eq!(cert.message.as_deref(), Some("minimum tasks not completed"));
        // No dispatch, no uploaded svg.
        assert!(h.objects.objects.lock().unwrap().len() == 1);
    }

    #[tokio::test]
    async fn eligible_project_dispatches_and_stores_transaction() {
        let h = harness(true, RecordingRenderer::default()).await;

        let outcome = h.issuer.issue("p-1").await.unwrap();
        assert_eq!(
            outcome,
            IssuanceOutcome::Requested {
                transaction_id: "tx-123".to_string()
            }
        );

        let stored = h.store.find_by_id("p-1").await.unwrap().unwrap();
        let cert = stored.certificate.unwrap();
        assert!(cert.eligible);
        assert_eq!(cert.status, CertificateStatus::Requested);
        assert_eq!(cert.transaction_id.as_deref(), Some("tx-123"));
        // The populated svg was uploaded for durability before dispatch.
        let svg_path = cert.svg_path.unwrap();
        assert!(h.objects.objects.lock().unwrap().contains_key(&svg_path));
    }

    #[tokio::test]
    async fn issue_on_unsubmitted_project_is_rejected() {
        let h = harness(true, RecordingRenderer::default()).await;
        let mut project = submitted_project();
        project.id = "p-2".to_string();
        project.status = crate::model::ProjectStatus::InProgress;
        h.store.insert(project).await;

        let err = h.issuer.issue("p-2").await.unwrap_err();
        assert_eq!(err.status_code(), "REJECTED");
    }

    #[tokio::test]
    async fn dispatch_timeout_lands_in_callback_error() {
        let renderer = RecordingRenderer {
            timeout: true,
            ..Default::default()
        };
        let h = harness(true, renderer).await;

        let outcome = h.issuer.issue("p-1").await.unwrap();
        assert!(matches!(outcome, IssuanceOutcome::Failed { .. }));

        let stored = h.store.find_by_id("p-1").await.unwrap().unwrap();
        let cert = stored.certificate.unwrap();
        assert_eq!(cert.status, CertificateStatus::CallbackError);
        assert!(cert.message.is_some());
    }

    // ── Callbacks ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn success_callback_issues_exactly_once() {
        let h = harness(true, RecordingRenderer::default()).await;
        h.issuer.issue("p-1").await.unwrap();

        let callback = RenderCallback::Success {
            filename: Some("certificate.pdf".to_string()),
            artifact: Bytes::from_static(b"%PDF-1.7"),
        };

        let first = h
            .issuer
            .handle_callback("tx-123", callback.clone())
            .await
            .unwrap();
        assert_eq!(first, CallbackDisposition::Applied);

        let stored = h.store.find_by_id("p-1").await.unwrap().unwrap();
        let cert = stored.certificate.unwrap();
        assert_eq!(cert.status, CertificateStatus::Issued);
        assert!(cert.issued_on.is_some());
        let pdf_path = cert.pdf_path.clone().unwrap();
        assert!(pdf_path.ends_with(".pdf"));
        assert!(h.objects.objects.lock().unwrap().contains_key(&pdf_path));

        // At-least-once delivery: the second application is a no-op.
        let second = h.issuer.handle_callback("tx-123", callback).await.unwrap();
        assert_eq!(second, CallbackDisposition::Ignored);
    }

    #[tokio::test]
    async fn unknown_transaction_is_a_successful_no_op() {
        let h = harness(true, RecordingRenderer::default()).await;

        let disposition = h
            .issuer
            .handle_callback(
                "tx-unknown",
                RenderCallback::Failure {
                    message: "boom".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(disposition, CallbackDisposition::Ignored);
    }

    #[tokio::test]
    async fn error_callback_sets_message() {
        let h = harness(true, RecordingRenderer::default()).await;
        h.issuer.issue("p-1").await.unwrap();

        let disposition = h
            .issuer
            .handle_callback(
                "tx-123",
                RenderCallback::Failure {
                    message: "chromium crashed".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(disposition, CallbackDisposition::Applied);

        let stored = h.store.find_by_id("p-1").await.unwrap().unwrap();
        let cert = stored.certificate.unwrap();
        assert_eq!(cert.status, CertificateStatus::CallbackError);
        assert_eq!(cert.message.as_deref(), Some("chromium crashed"));
    }

    // ── Reissue ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn reissue_archives_prior_issuance_before_new_values() {
        let h = harness(true, RecordingRenderer::default()).await;
        h.issuer.issue("p-1").await.unwrap();
        h.issuer
            .handle_callback(
                "tx-123",
                RenderCallback::Success {
                    filename: None,
                    artifact: Bytes::from_static(b"%PDF-1.7"),
                },
            )
            .await
            .unwrap();

        let before = h.store.find_by_id("p-1").await.unwrap().unwrap();
        let old = before.certificate.unwrap();
        let old_pdf = old.pdf_path.clone().unwrap();

        let outcome = h.issuer.reissue("p-1", "u-1").await.unwrap();
        let IssuanceOutcome::Requested { transaction_id } = outcome else {
            panic!("expected reissue to complete");
        };
        assert_ne!(transaction_id, "tx-123");

        let stored = h.store.find_by_id("p-1").await.unwrap().unwrap();
        let cert = stored.certificate.unwrap();
        let archived = cert.original_transaction_information.unwrap();
        assert_eq!(archived.transaction_id.as_deref(), Some("tx-123"));
        assert_eq!(archived.pdf_path.as_deref(), Some(old_pdf.as_str()));
        assert_eq!(cert.status, CertificateStatus::Issued);
        assert_eq!(cert.transaction_id.as_deref(), Some(transaction_id.as_str()));
        assert_ne!(cert.pdf_path, Some(old_pdf));
        assert!(h
            .objects
            .objects
            .lock()
            .unwrap()
            .contains_key(cert.pdf_path.as_deref().unwrap()));
    }

    #[tokio::test]
    async fn reissue_requires_a_completed_issuance() {
        let h = harness(true, RecordingRenderer::default()).await;
        h.issuer.issue("p-1").await.unwrap();

        // Still `requested`: the webhook has not landed yet.
        let err = h.issuer.reissue("p-1", "u-1").await.unwrap_err();
        assert_eq!(err.status_code(), "REJECTED");
    }

    #[tokio::test]
    async fn reissue_without_eligible_certificate_is_ineligible() {
        let h = harness(false, RecordingRenderer::default()).await;
        h.issuer.issue("p-1").await.unwrap();

        let err = h.issuer.reissue("p-1", "u-1").await.unwrap_err();
        assert_eq!(err.status_code(), "INELIGIBLE");
    }

    #[tokio::test]
    async fn reissue_timeout_archives_and_records_callback_error() {
        let h = harness(true, RecordingRenderer::default()).await;
        h.issuer.issue("p-1").await.unwrap();
        h.issuer
            .handle_callback(
                "tx-123",
                RenderCallback::Success {
                    filename: None,
                    artifact: Bytes::from_static(b"%PDF-1.7"),
                },
            )
            .await
            .unwrap();

        // Swap in a timing-out renderer for the second round.
        let store = Arc::clone(&h.store);
        let issuer = CertificateIssuer::new(
            Arc::clone(&store) as Arc<dyn ProjectStore>,
            Arc::new(FixedEvaluator(true, "")),
            Arc::new(RecordingRenderer {
                timeout: true,
                ..Default::default()
            }),
            Arc::clone(&h.objects) as Arc<dyn ObjectStore>,
            Arc::new(NoopEventPublisher),
            "https://example.org/api/v1/projects".to_string(),
        );

        let outcome = issuer.reissue("p-1", "u-1").await.unwrap();
        assert!(matches!(outcome, IssuanceOutcome::Failed { .. }));

        let stored = store.find_by_id("p-1").await.unwrap().unwrap();
        let cert = stored.certificate.unwrap();
        assert_eq!(cert.status, CertificateStatus::CallbackError);
        let archived = cert.original_transaction_information.unwrap();
        assert_eq!(archived.transaction_id.as_deref(), Some("tx-123"));
    }
}
