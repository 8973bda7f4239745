//! Computation runtime interface.
//!
//! The bridge starts one computation per fill request and stops it once
//! the request reaches a terminal state. How the runtime renders output is
//! its own business; rendered output comes back through the transport
//! (see [`crate::device`]) keyed by the slot id in the returned handle.

pub mod loopback;

use serde::{Deserialize, Serialize};

use crate::resolver::session::SessionHandle;
use crate::view::ViewNode;

/// Runtime failure.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("runtime unavailable: {0}")]
    Unavailable(String),
    #[error("failed to start {name}: {reason}")]
    StartFailed { name: String, reason: String },
}

/// Request descriptor handed to the runtime: the focused field's
/// identifying data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutofillRequest {
    pub field_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub autofill_hints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl From<&ViewNode> for AutofillRequest {
    fn from(node: &ViewNode) -> Self {
        Self {
            field_id: node.id.clone(),
            class_name: node.class_name.clone(),
            autofill_hints: node.autofill_hints.clone(),
            text: node.text.clone(),
            hint: node.hint.clone(),
        }
    }
}

/// Starts and stops suggestion-producing computations.
pub trait ComputationRuntime: Send + Sync + 'static {
    /// Start the named computation for `request`.
    ///
    /// Must not block; output is published later under
    /// `SessionHandle::provided_slot_id`.
    fn start(&self, name: &str, request: &AutofillRequest) -> Result<SessionHandle, RuntimeError>;

    /// Stop a computation started by [`start`](Self::start). Best-effort.
    fn stop(&self, handle: &SessionHandle);
}
