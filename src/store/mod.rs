//! Project document store.
//!
//! The store exposes exactly the operations the core needs: point lookups,
//! creation, atomic field-set updates, and a compare-and-swap update keyed
//! by certificate transaction id. There are no cross-document transactions;
//! callers are written for availability over strict consistency.

mod http;
mod memory;

pub use http::HttpProjectStore;
pub use memory::InMemoryProjectStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{CertificateStatus, Project};

/// Persistence seam for project documents.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Register collection indexes. Idempotent; run once at startup, never
    /// as a side effect of constructing anything.
    async fn ensure_indexes(&self) -> Result<()> {
        Ok(())
    }

    /// Look up a project by id.
    async fn find_by_id(&self, project_id: &str) -> Result<Option<Project>>;

    /// Look up a project owned by a specific user.
    async fn find_for_user(&self, project_id: &str, user_id: &str) -> Result<Option<Project>>;

    /// Look up the project whose active certificate transaction id matches.
    /// The renderer callback has no other handle on the owning document.
    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Project>>;

    /// Insert a new project document.
    async fn create(&self, project: &Project) -> Result<()>;

    /// Atomically set the given top-level fields on one document.
    /// `fields` is a flat JSON object keyed by wire (camelCase) names.
    async fn update(&self, project_id: &str, fields: serde_json::Value) -> Result<()>;

    /// Compare-and-swap: set `fields` on the document whose certificate
    /// currently has this `transaction_id` AND this `expected` status.
    /// Returns whether a document matched. A duplicate webhook delivery
    /// matches nothing and must be treated as a successful no-op.
    async fn update_certificate_if(
        &self,
        transaction_id: &str,
        expected: CertificateStatus,
        fields: serde_json::Value,
    ) -> Result<bool>;
}

/// Merge a flat field-set into a project in place, going through the wire
/// representation so updates behave identically across store backends.
pub(crate) fn apply_fields(project: &Project, fields: &serde_json::Value) -> Result<Project> {
    let mut doc = serde_json::to_value(project)?;
    let (Some(doc_map), Some(field_map)) = (doc.as_object_mut(), fields.as_object()) else {
        anyhow::bail!("field-set update requires a JSON object");
    };
    for (key, value) in field_map {
        doc_map.insert(key.clone(), value.clone());
    }
    Ok(serde_json::from_value(doc)?)
}
