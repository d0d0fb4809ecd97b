//! Certificate state embedded in a project document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a certificate is in the issuance pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CertificateStatus {
    /// Eligibility has not been evaluated yet
    NotEvaluated,
    /// Evaluator said no; terminal, message carries the reason
    Ineligible,
    /// Evaluator said yes; render not yet prepared
    Eligible,
    /// Render payload assembled
    PayloadBuilt,
    /// Dispatched to the renderer, waiting for its callback
    Requested,
    /// Callback delivered the rendered artifact
    Issued,
    /// Callback reported a failure (or the render timed out)
    CallbackError,
}

impl Default for CertificateStatus {
    fn default() -> Self {
        Self::NotEvaluated
    }
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotEvaluated => "notEvaluated",
            Self::Ineligible => "ineligible",
            Self::Eligible => "eligible",
            Self::PayloadBuilt => "payloadBuilt",
            Self::Requested => "requested",
            Self::Issued => "issued",
            Self::CallbackError => "callbackError",
        }
    }
}

impl std::fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Archive of a superseded issuance, populated only on reissue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalTransaction {
    pub transaction_id: Option<String>,
    pub pdf_path: Option<String>,
    pub svg_path: Option<String>,
    pub issued_on: Option<DateTime<Utc>>,
}

/// Certificate state for a project.
///
/// Invariant: at most one active `transaction_id` at a time. A reissue
/// archives the prior one into `original_transaction_information` before a
/// new one is assigned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    #[serde(default)]
    pub eligible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub status: CertificateStatus,
    /// Correlation key of the active issuance; the renderer's callback
    /// carries this and nothing else we can match on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svg_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_on: Option<DateTime<Utc>>,
    /// Source template reference from the solution snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_transaction_information: Option<OriginalTransaction>,
}

impl Certificate {
    /// Move the current issuance into the archive slot, clearing the live
    /// fields. Called at the start of a reissue, before any new value is
    /// assigned.
    pub fn archive_current(&mut self) {
        self.original_transaction_information = Some(OriginalTransaction {
            transaction_id: self.transaction_id.take(),
            pdf_path: self.pdf_path.take(),
            svg_path: self.svg_path.take(),
            issued_on: self.issued_on.take(),
        });
        self.status = CertificateStatus::Eligible;
        self.message = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_moves_live_fields_and_resets_state() {
        let mut cert = Certificate {
            eligible: true,
            status: CertificateStatus::Issued,
            transaction_id: Some("tx-123".into()),
            pdf_path: Some("p1".into()),
            svg_path: Some("s1".into()),
            issued_on: Some(Utc::now()),
            ..Default::default()
        };

        cert.archive_current();

        let archived = cert.original_transaction_information.as_ref().unwrap();
        assert_eq!(archived.transaction_id.as_deref(), Some("tx-123"));
        assert_eq!(archived.pdf_path.as_deref(), Some("p1"));
        assert_eq!(archived.svg_path.as_deref(), Some("s1"));
        assert!(archived.issued_on.is_some());

        assert_eq!(cert.status, CertificateStatus::Eligible);
        assert!(cert.transaction_id.is_none());
        assert!(cert.pdf_path.is_none());
        assert!(cert.svg_path.is_none());
        assert!(cert.issued_on.is_none());
    }

    #[test]
    fn default_certificate_is_not_evaluated() {
        let cert = Certificate::default();
        assert_eq!(cert.status, CertificateStatus::NotEvaluated);
        assert!(!cert.eligible);
        assert!(cert.transaction_id.is_none());
    }
}
