//! Public certificate verification.
//!
//! A read-only projector safe to expose to unauthenticated third parties:
//! it never mutates anything and resolves short-lived read URLs for the
//! artifacts that exist.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::ProjectStatus;
use crate::objectstore::ObjectStore;
use crate::store::ProjectStore;

/// Why a certificate that should exist is not servable. The two kinds are
/// deliberately distinct: one means issuance never started, the other that
/// it started but produced nothing retrievable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    /// No issuance was ever dispatched for this project
    MissingTransaction,
    /// Dispatched, but neither artifact path is populated
    MissingArtifacts,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("project not found")]
    ProjectNotFound,
    #[error("project is not eligible for a certificate")]
    NotEligible,
    #[error("certificate is not available")]
    CertificateNotAvailable(UnavailableReason),
    #[error("{0:#}")]
    Upstream(#[from] anyhow::Error),
}

impl VerifyError {
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::ProjectNotFound => "PROJECT_NOT_FOUND",
            Self::NotEligible => "PROJECT_NOT_ELIGIBLE_FOR_CERTIFICATE",
            Self::CertificateNotAvailable(_) => "CERTIFICATE_NOT_AVAILABLE",
            Self::Upstream(_) => "UPSTREAM_FAILURE",
        }
    }
}

/// The record handed to a verifying third party.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    pub project_id: String,
    pub project_name: String,
    pub program_id: Option<String>,
    pub solution_id: Option<String>,
    pub solution_name: Option<String>,
    pub user_id: String,
    pub user_name: Option<String>,
    pub status: ProjectStatus,
    pub is_certificate_verified: bool,
    pub completed_date: Option<DateTime<Utc>>,
    pub eligible: bool,
    pub certificate_pdf_url: Option<String>,
    pub certificate_svg_url: Option<String>,
}

/// Answers "is this certificate valid" for a given project.
pub struct CertificateVerifier {
    store: Arc<dyn ProjectStore>,
    objects: Arc<dyn ObjectStore>,
    read_url_ttl_secs: u64,
}

impl CertificateVerifier {
    pub fn new(
        store: Arc<dyn ProjectStore>,
        objects: Arc<dyn ObjectStore>,
        read_url_ttl_secs: u64,
    ) -> Self {
        Self {
            store,
            objects,
            read_url_ttl_secs,
        }
    }

    pub async fn verify(&self, project_id: &str) -> Result<VerificationRecord, VerifyError> {
        let project = self
            .store
            .find_by_id(project_id)
            .await?
            .ok_or(VerifyError::ProjectNotFound)?;

        let certificate = project
            .certificate
            .as_ref()
            .filter(|c| c.eligible && project.status == ProjectStatus::Submitted)
            .ok_or(VerifyError::NotEligible)?;

        if certificate
            .transaction_id
            .as_deref()
            .map_or(true, |id| id.is_empty())
        {
            return Err(VerifyError::CertificateNotAvailable(
                UnavailableReason::MissingTransaction,
            ));
        }
        if certificate.pdf_path.is_none() && certificate.svg_path.is_none() {
            return Err(VerifyError::CertificateNotAvailable(
                UnavailableReason::MissingArtifacts,
            ));
        }

        let certificate_pdf_url = self.sign(certificate.pdf_path.as_deref()).await?;
        let certificate_svg_url = self.sign(certificate.svg_path.as_deref()).await?;

        Ok(VerificationRecord {
            project_id: project.id.clone(),
            project_name: project.title.clone(),
            program_id: project.program_information.as_ref().map(|p| p.id.clone()),
            solution_id: project.solution_information.as_ref().map(|s| s.id.clone()),
            solution_name: project.solution_information.as_ref().map(|s| s.name.clone()),
            user_id: project.user_id.clone(),
            user_name: project.user_name.clone(),
            status: project.status,
            is_certificate_verified: true,
            completed_date: project.completed_date,
            eligible: certificate.eligible,
            certificate_pdf_url,
            certificate_svg_url,
        })
    }

    /// Resolve a read URL for a path that may be absent.
    async fn sign(&self, path: Option<&str>) -> Result<Option<String>, VerifyError> {
        match path {
            Some(path) => Ok(Some(
                self.objects.read_url(path, self.read_url_ttl_secs).await?,
            )),
            None => Ok(None),
        }
    }
}
