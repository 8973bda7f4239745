//! Autofill session bridge — from a focused field to a platform result.
//!
//! For each fill request the bridge resolves the focused field, starts a
//! computation for it and registers a one-shot broker handler under
//! (provided slot, field). The first of {rendered output, platform
//! cancellation, fill timeout} completes the request: the platform callback
//! fires once, the computation is stopped once, and the registration is
//! gone.
//!
//! ```text
//! Idle -> FocusResolved -> ComputationRequested -> CallbackRegistered
//!   |          |                  |                      |
//!   v          |                  v                      v
//! NoFocus      |             StartFailed      Completed | Cancelled | TimedOut
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::broker::CallbackBroker;
use crate::broker::sink::{FillOutcome, ResultCallback};
use crate::config::ServiceConfig;
use crate::resolver::session::{SessionHandle, SessionKey};
use crate::resolver::{DocumentOrderResolver, FocusedFieldResolver};
use crate::runtime::{AutofillRequest, ComputationRuntime};
use crate::view::FillContext;

/// Where a fill request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPhase {
    Idle,
    FocusResolved,
    ComputationRequested,
    CallbackRegistered,
    Completed,
    Cancelled,
    TimedOut,
    NoFocus,
    StartFailed,
}

impl FillPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Cancelled | Self::TimedOut | Self::NoFocus | Self::StartFailed
        )
    }
}

/// An in-flight fill: the platform callback and the computation to stop.
///
/// Whichever path calls [`finish`](Self::finish) first wins; later calls
/// are no-ops.
struct PendingFill {
    key: SessionKey,
    handle: SessionHandle,
    runtime: Arc<dyn ComputationRuntime>,
    callback: Mutex<Option<Box<dyn ResultCallback>>>,
    done: CancellationToken,
}

/// Stops the computation when dropped, including while unwinding out of a
/// panicking platform callback.
struct StopGuard<'a> {
    runtime: &'a dyn ComputationRuntime,
    handle: &'a SessionHandle,
}

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        self.runtime.stop(self.handle);
    }
}

impl PendingFill {
    fn finish(&self, outcome: FillOutcome, phase: FillPhase) -> bool {
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(callback) = callback else {
            return false;
        };
        self.done.cancel();

        tracing::debug!(
            phase = ?phase,
            key = %self.key,
            session_id = %self.handle.session_id,
            "fill finished"
        );
        let _stop = StopGuard {
            runtime: self.runtime.as_ref(),
            handle: &self.handle,
        };
        callback.on_result(outcome);
        true
    }

    /// Drop the broker registration ahead of an early finish, so the key is
    /// free again by the time the platform callback runs. A delivery that
    /// already won leaves nothing to remove.
    fn release(&self, broker: &CallbackBroker) {
        if !self.done.is_cancelled() {
            broker.remove(&self.key);
        }
    }
}

pub struct AutofillSessionBridge {
    runtime: Arc<dyn ComputationRuntime>,
    broker: Arc<CallbackBroker>,
    resolver: Box<dyn FocusedFieldResolver>,
    computation_name: String,
    fill_timeout: Duration,
}

impl AutofillSessionBridge {
    pub fn new(
        config: &ServiceConfig,
        runtime: Arc<dyn ComputationRuntime>,
        broker: Arc<CallbackBroker>,
    ) -> Self {
        Self {
            runtime,
            broker,
            resolver: Box::new(DocumentOrderResolver),
            computation_name: config.computation_name.clone(),
            fill_timeout: config.fill_timeout(),
        }
    }

    /// Replace the focus resolution strategy.
    pub fn with_resolver(mut self, resolver: Box<dyn FocusedFieldResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn broker(&self) -> &Arc<CallbackBroker> {
        &self.broker
    }

    /// Handle one platform fill request.
    ///
    /// Never blocks. `on_complete` is invoked exactly once: immediately when
    /// the request ends early, otherwise when output is delivered, `cancel`
    /// fires, or the fill timeout elapses. Returns the phase reached before
    /// returning to the caller.
    pub fn handle_fill_request(
        &self,
        contexts: &[FillContext],
        cancel: CancellationToken,
        on_complete: Box<dyn ResultCallback>,
    ) -> FillPhase {
        tracing::trace!(phase = ?FillPhase::Idle, contexts = contexts.len(), "fill request");

        let Some(node) = self.resolver.resolve_latest(contexts) else {
            tracing::debug!(phase = ?FillPhase::NoFocus, "no focused field");
            on_complete.on_result(FillOutcome::NoFocusedField);
            return FillPhase::NoFocus;
        };
        let field_id = node.id.clone();
        tracing::debug!(phase = ?FillPhase::FocusResolved, field_id = %field_id, "focus resolved");

        let Ok(tokio_handle) = tokio::runtime::Handle::try_current() else {
            tracing::error!(field_id = %field_id, "fill request outside an async runtime");
            on_complete.on_result(FillOutcome::Failed {
                reason: "no async runtime".into(),
            });
            return FillPhase::StartFailed;
        };

        let request = AutofillRequest::from(node);
        let handle = match self.runtime.start(&self.computation_name, &request) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(
                    phase = ?FillPhase::StartFailed,
                    field_id = %field_id,
                    error = %e,
                    "computation failed to start"
                );
                on_complete.on_result(FillOutcome::Failed {
                    reason: e.to_string(),
                });
                return FillPhase::StartFailed;
            }
        };
        tracing::debug!(
            phase = ?FillPhase::ComputationRequested,
            field_id = %field_id,
            slot_id = %handle.provided_slot_id,
            session_id = %handle.session_id,
            "computation started"
        );

        let key = SessionKey::for_session(&handle, &field_id);
        let pending = Arc::new(PendingFill {
            key: key.clone(),
            handle,
            runtime: self.runtime.clone(),
            callback: Mutex::new(Some(on_complete)),
            done: CancellationToken::new(),
        });

        let delivered = pending.clone();
        let registered = self.broker.register(
            key.clone(),
            Box::new(move |response| {
                delivered.finish(FillOutcome::Suggestions(response), FillPhase::Completed);
            }),
        );
        if let Err(e) = registered {
            // The live registration belongs to another fill; leave it alone.
            tracing::warn!(key = %key, error = %e, "duplicate fill session");
            pending.finish(
                FillOutcome::Failed {
                    reason: e.to_string(),
                },
                FillPhase::StartFailed,
            );
            return FillPhase::StartFailed;
        }
        tracing::debug!(phase = ?FillPhase::CallbackRegistered, key = %key, "awaiting output");

        let broker = self.broker.clone();
        let timeout = self.fill_timeout;
        tokio_handle.spawn(async move {
            tokio::select! {
                biased;
                _ = pending.done.cancelled() => {}
                _ = cancel.cancelled() => {
                    pending.release(&broker);
                    pending.finish(FillOutcome::Cancelled, FillPhase::Cancelled);
                }
                _ = tokio::time::sleep(timeout) => {
                    tracing::warn!(key = %pending.key, ?timeout, "no output before fill timeout");
                    pending.release(&broker);
                    pending.finish(FillOutcome::TimedOut, FillPhase::TimedOut);
                }
            }
        });

        FillPhase::CallbackRegistered
    }
}
