//! Task tree merge.
//!
//! Merges an incoming client-edited forest into the stored forest. The
//! merge is a pure function of `(incoming, stored, now)`:
//!
//! - incoming nodes are normalized (defaults filled, ids minted where the
//!   client sent none or sent a library-template reference), then matched
//!   against stored siblings by id;
//! - a match copies every client-editable field and keeps the stored
//!   node's server-authoritative `submissions` / `observationInformation`;
//! - an unmatched node is appended as a new sibling;
//! - a stored node the client did not send back is retained untouched.
//!   Removal is only ever the explicit `isDeleted` flag.
//!
//! Before any merge work the incoming forest is flattened into an arena
//! (explicit stack, no recursion) that rejects over-deep nesting and
//! duplicate sibling ids. The merge itself recurses, bounded by the
//! validated depth.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::model::{Attachment, Task, TaskStatus, TaskType, MAX_TASK_DEPTH};

/// A task as the client sends it: everything optional except the name,
/// defaults applied during normalization. Server-authoritative fields are
/// not expressible here at all.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub task_type: Option<TaskType>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub is_deleted: Option<bool>,
    #[serde(default)]
    pub is_deletable: Option<bool>,
    #[serde(default)]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default)]
    pub children: Vec<TaskPatch>,
}

/// Ids shaped like canonical library-template references (24 hex chars)
/// must not be reused as stable task ids; a fresh id is minted instead.
fn is_library_reference(id: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new("^[a-f0-9]{24}$").expect("static pattern"))
        .is_match(id)
}

/// The id a patch merges under: the client's id when it is a stable one,
/// a fresh UUID otherwise.
fn effective_id(patch: &TaskPatch) -> String {
    match patch.id.as_deref() {
        Some(id) if !id.is_empty() && !is_library_reference(id) => id.to_string(),
        _ => Uuid::new_v4().to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ingestion validation
// ─────────────────────────────────────────────────────────────────────────────

struct ArenaNode<'a> {
    patch: &'a TaskPatch,
    depth: usize,
}

/// Flatten the incoming forest with an explicit stack, enforcing the depth
/// bound and sibling-id uniqueness. The wire format is a tree, so
/// acyclicity holds structurally; this guards against pathological nesting
/// and ambiguous merges.
fn validate_forest(incoming: &[TaskPatch]) -> Result<(), ServiceError> {
    let mut stack: Vec<ArenaNode> = incoming
        .iter()
        .map(|patch| ArenaNode { patch, depth: 1 })
        .collect();

    check_sibling_ids(incoming)?;

    while let Some(node) = stack.pop() {
        if node.depth > MAX_TASK_DEPTH {
            return Err(ServiceError::Validation(format!(
                "task tree exceeds maximum depth of {}",
                MAX_TASK_DEPTH
            )));
        }
        check_sibling_ids(&node.patch.children)?;
        stack.extend(node.patch.children.iter().map(|child| ArenaNode {
            patch: child,
            depth: node.depth + 1,
        }));
    }
    Ok(())
}

fn check_sibling_ids(siblings: &[TaskPatch]) -> Result<(), ServiceError> {
    let mut seen = std::collections::HashSet::new();
    for patch in siblings {
        if let Some(id) = patch.id.as_deref().filter(|id| !id.is_empty()) {
            if !seen.insert(id) {
                return Err(ServiceError::Validation(format!(
                    "duplicate task id among siblings: {}",
                    id
                )));
            }
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Merge
// ─────────────────────────────────────────────────────────────────────────────

/// Merge the incoming forest into the stored one. Fails only on ingestion
/// validation; the merge itself cannot fail.
pub fn merge_forest(
    incoming: &[TaskPatch],
    stored: Vec<Task>,
    now: DateTime<Utc>,
) -> Result<Vec<Task>, ServiceError> {
    validate_forest(incoming)?;

    let mut forest = stored;
    for patch in incoming {
        merge_node(patch, &mut forest, None, now);
    }
    Ok(forest)
}

/// Merge one incoming node into a sibling list, then its children.
/// Depth is bounded by ingestion validation.
fn merge_node(
    patch: &TaskPatch,
    siblings: &mut Vec<Task>,
    parent_external_id: Option<&str>,
    now: DateTime<Utc>,
) {
    let id = effective_id(patch);

    let position = siblings.iter().position(|task| task.id == id);
    let index = match position {
        Some(index) => {
            apply_patch(&mut siblings[index], patch, parent_external_id, now);
            index
        }
        None => {
            siblings.push(new_task(patch, id, parent_external_id, now));
            siblings.len() - 1
        }
    };

    let task_external_id = siblings[index].external_id.clone();
    // Split the borrow: recurse into the matched node's children.
    let node = &mut siblings[index];
    for child in &patch.children {
        merge_node(child, &mut node.children, Some(&task_external_id), now);
    }
    node.has_sub_tasks = !node.children.is_empty();
}

/// Copy every client-editable field onto a matched stored node, leaving
/// `submissions` / `observation_information` untouched.
fn apply_patch(
    task: &mut Task,
    patch: &TaskPatch,
    parent_external_id: Option<&str>,
    now: DateTime<Utc>,
) {
    if !patch.name.is_empty() {
        task.name = patch.name.clone();
    }
    if let Some(external_id) = patch.external_id.clone().filter(|v| !v.is_empty()) {
        task.external_id = external_id;
    }
    task.task_type = patch.task_type.unwrap_or(task.task_type);
    task.status = patch.status.unwrap_or_default();
    task.is_deleted = patch.is_deleted.unwrap_or(false);
    task.is_deletable = patch.is_deletable.unwrap_or(true);
    if let Some(attachments) = &patch.attachments {
        task.attachments = attachments.clone();
    }
    task.parent_external_id = parent_external_id.map(|v| v.to_string());
    task.synced_at = now;
    task.updated_at = now;
}

/// Build a fresh node from a normalized patch.
fn new_task(
    patch: &TaskPatch,
    id: String,
    parent_external_id: Option<&str>,
    now: DateTime<Utc>,
) -> Task {
    Task {
        id,
        external_id: patch
            .external_id
            .clone()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| patch.name.clone()),
        name: patch.name.clone(),
        task_type: patch.task_type.unwrap_or_default(),
        status: patch.status.unwrap_or_default(),
        is_deleted: patch.is_deleted.unwrap_or(false),
        is_deletable: patch.is_deletable.unwrap_or(true),
        attachments: patch.attachments.clone().unwrap_or_default(),
        submissions: None,
        observation_information: None,
        parent_external_id: parent_external_id.map(|v| v.to_string()),
        has_sub_tasks: false,
        children: Vec::new(),
        synced_at: now,
        updated_at: now,
    }
}
