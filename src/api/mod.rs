//! HTTP surface.
//!
//! Thin handlers over the sync coordinator, the issuance pipeline, and the
//! verifier. Every failure leaves through the uniform
//! `{success: false, message, status}` envelope.

mod certificates;
mod projects;
pub mod routes;
mod types;

pub use routes::{serve, AppState};
