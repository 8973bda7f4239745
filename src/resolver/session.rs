//! Session handles returned by a runtime, and the broker key derived
//! from them.

use serde::{Deserialize, Serialize};

/// Identifies a running computation and the slot its output is published
/// under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle {
    /// Slot id the rendered output will be published under.
    pub provided_slot_id: String,
    /// Runtime session id, used to stop the computation.
    pub session_id: String,
}

/// Broker registration key: one live fill per (slot, field) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub slot_id: String,
    pub field_id: String,
}

impl SessionKey {
    pub fn new(slot_id: impl Into<String>, field_id: impl Into<String>) -> Self {
        Self {
            slot_id: slot_id.into(),
            field_id: field_id.into(),
        }
    }

    /// Key for a field's output under a started session.
    pub fn for_session(handle: &SessionHandle, field_id: &str) -> Self {
        Self::new(handle.provided_slot_id.clone(), field_id)
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.slot_id, self.field_id)
    }
}
