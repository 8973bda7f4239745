//! In-process runtime that answers every request with a fixed list of
//! suggestions, published over the transport like a real runtime would.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use super::{AutofillRequest, ComputationRuntime, RuntimeError};
use crate::broker::sink::{FillResponse, Suggestion};
use crate::device::TransportMessage;
use crate::resolver::session::SessionHandle;

struct Inner {
    outbound: UnboundedSender<String>,
    suggestions: Vec<String>,
    render_delay: Duration,
    active: Mutex<HashSet<String>>,
}

impl Inner {
    fn active(&self) -> MutexGuard<'_, HashSet<String>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Loopback [`ComputationRuntime`].
///
/// `start` must be called inside a Tokio runtime: output is published from
/// a spawned task after `render_delay`, and only if the session has not
/// been stopped by then.
#[derive(Clone)]
pub struct LoopbackRuntime {
    inner: Arc<Inner>,
}

impl LoopbackRuntime {
    /// Create the runtime and the receiving end of its transport.
    pub fn new(suggestions: Vec<String>, render_delay: Duration) -> (Self, UnboundedReceiver<String>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let runtime = Self {
            inner: Arc::new(Inner {
                outbound,
                suggestions,
                render_delay,
                active: Mutex::new(HashSet::new()),
            }),
        };
        (runtime, rx)
    }

    /// Announce readiness over the transport.
    pub fn announce_ready(&self) -> Result<(), RuntimeError> {
        let ready = serde_json::to_string(&TransportMessage::Ready)
            .map_err(|e| RuntimeError::Unavailable(e.to_string()))?;
        self.inner
            .outbound
            .send(ready)
            .map_err(|_| RuntimeError::Unavailable("transport closed".into()))
    }

    /// Number of sessions started and not yet stopped.
    pub fn active_sessions(&self) -> usize {
        self.inner.active().len()
    }

    fn render(&self, request: &AutofillRequest, handle: &SessionHandle) -> Result<String, RuntimeError> {
        let content = FillResponse {
            field_id: request.field_id.clone(),
            suggestions: self
                .inner
                .suggestions
                .iter()
                .map(|value| Suggestion {
                    label: value.clone(),
                    value: value.clone(),
                })
                .collect(),
        };
        let message = TransportMessage::Output {
            slot_id: handle.provided_slot_id.clone(),
            field_id: request.field_id.clone(),
            content,
        };
        serde_json::to_string(&message).map_err(|e| RuntimeError::StartFailed {
            name: "loopback".into(),
            reason: e.to_string(),
        })
    }
}

impl ComputationRuntime for LoopbackRuntime {
    fn start(&self, name: &str, request: &AutofillRequest) -> Result<SessionHandle, RuntimeError> {
        if self.inner.outbound.is_closed() {
            return Err(RuntimeError::Unavailable("transport closed".into()));
        }

        let handle = SessionHandle {
            provided_slot_id: format!("slot-{}", Uuid::new_v4()),
            session_id: format!("{name}-{}", Uuid::new_v4()),
        };
        let rendered = self.render(request, &handle)?;
        self.inner.active().insert(handle.session_id.clone());

        tracing::debug!(
            computation = name,
            session_id = %handle.session_id,
            field_id = %request.field_id,
            "loopback computation started"
        );

        let inner = self.inner.clone();
        let session_id = handle.session_id.clone();
        tokio::spawn(async move {
            if !inner.render_delay.is_zero() {
                tokio::time::sleep(inner.render_delay).await;
            }
            if !inner.active().contains(&session_id) {
                tracing::debug!(session_id = %session_id, "stopped before render");
                return;
            }
            if inner.outbound.send(rendered).is_err() {
                tracing::warn!(session_id = %session_id, "transport closed before render");
            }
        });

        Ok(handle)
    }

    fn stop(&self, handle: &SessionHandle) {
        if self.inner.active().remove(&handle.session_id) {
            tracing::debug!(session_id = %handle.session_id, "loopback computation stopped");
        } else {
            tracing::warn!(session_id = %handle.session_id, "stop for unknown session");
        }
    }
}
