//! Certificate issuance pipeline and verification.
//!
//! A submitted project flows through: eligibility evaluation, render
//! payload assembly, dispatch to the external renderer, and webhook
//! reconciliation correlated by transaction id. Reissue runs the render
//! synchronously after archiving the prior issuance. Verification is a
//! read-only projector for third parties.

mod eligibility;
mod issuance;
mod payload;
mod verify;

pub use eligibility::{EligibilityEvaluator, EligibilityVerdict, HttpEligibilityEvaluator};
pub use issuance::{CertificateIssuer, CallbackDisposition, IssuanceOutcome, RenderCallback};
pub use payload::{CertificatePayloadBuilder, RenderPayload};
pub use verify::{CertificateVerifier, UnavailableReason, VerificationRecord, VerifyError};
