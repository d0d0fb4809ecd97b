//! Render payload assembly.
//!
//! Populates the solution's certificate template with recipient and
//! project details, embeds the verification QR code, and fixes the logical
//! artifact paths the issuance will write to. Template substitution itself
//! is pure; only the template fetch touches the object store.

use std::sync::Arc;

use anyhow::Context;
use qrcode::render::svg;
use qrcode::QrCode;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::model::Project;
use crate::objectstore::ObjectStore;
use crate::renderer::RenderRequest;

/// Longest project title the template will render cleanly.
const MAX_TITLE_CHARS: usize = 75;
/// Longest recipient name the template will render cleanly.
const MAX_NAME_CHARS: usize = 40;

/// A ready-to-dispatch render request plus the artifact paths that will be
/// persisted on the document.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub request: RenderRequest,
    pub svg_path: String,
    pub pdf_path: String,
}

/// Assembles renderer payloads for certificate issuance.
pub struct CertificatePayloadBuilder {
    objects: Arc<dyn ObjectStore>,
}

impl CertificatePayloadBuilder {
    pub fn new(objects: Arc<dyn ObjectStore>) -> Self {
        Self { objects }
    }

    /// Fetch the solution's template and populate it for this project.
    /// The verification URL ends up inside the embedded QR code.
    pub async fn build(
        &self,
        project: &Project,
        verification_url: &str,
    ) -> ServiceResult<RenderPayload> {
        let template_path = project
            .solution_information
            .as_ref()
            .and_then(|s| s.certificate_template_path.as_deref())
            .ok_or_else(|| {
                ServiceError::Validation(
                    "solution has no certificate template".to_string(),
                )
            })?;

        let template = self
            .objects
            .download(template_path)
            .await
            .with_context(|| format!("fetching certificate template {}", template_path))?;
        let template = String::from_utf8_lossy(&template).into_owned();

        let svg = populate_template(&template, project, verification_url)?;

        let stem = Uuid::new_v4();
        Ok(RenderPayload {
            request: RenderRequest {
                svg,
                css: None,
                output_filename: format!("{}.pdf", stem),
            },
            svg_path: format!("certificates/{}/{}.svg", project.id, stem),
            pdf_path: format!("certificates/{}/{}.pdf", project.id, stem),
        })
    }
}

/// Substitute template tokens. Pure; unit-tested without any collaborator.
pub(crate) fn populate_template(
    template: &str,
    project: &Project,
    verification_url: &str,
) -> ServiceResult<String> {
    let recipient = truncate_display(
        project.user_name.as_deref().unwrap_or(&project.user_id),
        MAX_NAME_CHARS,
    );
    let title = truncate_display(&project.title, MAX_TITLE_CHARS);
    let completed = project
        .completed_date
        .map(|d| d.format("%d %B %Y").to_string())
        .unwrap_or_default();

    Ok(template
        .replace("{{userName}}", &recipient)
        .replace("{{projectName}}", &title)
        .replace("{{completedDate}}", &completed)
        .replace("{{qrCode}}", &qr_svg(verification_url)?))
}

/// Render the verification URL as an inline SVG QR fragment.
fn qr_svg(url: &str) -> ServiceResult<String> {
    let code = QrCode::new(url.as_bytes())
        .map_err(|e| ServiceError::Validation(format!("QR encoding failed: {}", e)))?;
    Ok(code
        .render()
        .min_dimensions(160, 160)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build())
}

/// Cut an overlong display value at a char boundary, marking the cut.
fn truncate_display(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut out: String = value.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}
