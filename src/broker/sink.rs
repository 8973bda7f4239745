//! Result sinks — how a finished fill reaches the platform.
//!
//! The platform hands each fill request exactly one [`ResultCallback`].
//! Every terminal path of the bridge consumes it, so the type system
//! rules out a second invocation.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// One autofill suggestion for the focused field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Text shown in the suggestion list.
    pub label: String,
    /// Value filled into the field when chosen.
    pub value: String,
}

/// Rendered output of an autofill computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillResponse {
    pub field_id: String,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

/// Terminal result of a fill request.
///
/// Everything except `Suggestions` is an empty result from the platform's
/// point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FillOutcome {
    Suggestions(FillResponse),
    NoFocusedField,
    Cancelled,
    TimedOut,
    Failed { reason: String },
}

impl FillOutcome {
    /// The response to hand the platform, if any.
    pub fn response(&self) -> Option<&FillResponse> {
        match self {
            Self::Suggestions(response) => Some(response),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.response().is_none()
    }
}

/// Platform completion capability. Consumed on use.
pub trait ResultCallback: Send + 'static {
    fn on_result(self: Box<Self>, outcome: FillOutcome);
}

impl<F> ResultCallback for F
where
    F: FnOnce(FillOutcome) + Send + 'static,
{
    fn on_result(self: Box<Self>, outcome: FillOutcome) {
        (*self)(outcome)
    }
}

/// A callback that forwards the outcome over a oneshot channel.
///
/// A dropped receiver is not an error; the outcome is discarded.
pub fn channel_sink() -> (Box<dyn ResultCallback>, oneshot::Receiver<FillOutcome>) {
    let (tx, rx) = oneshot::channel();
    let sink = move |outcome: FillOutcome| {
        if tx.send(outcome).is_err() {
            tracing::debug!("fill outcome receiver dropped");
        }
    };
    (Box::new(sink), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_delivers() {
        let (sink, rx) = channel_sink();
        sink.on_result(FillOutcome::Cancelled);
        assert_eq!(rx.await.unwrap(), FillOutcome::Cancelled);
    }

    #[test]
    fn channel_sink_with_dropped_receiver() {
        let (sink, rx) = channel_sink();
        drop(rx);
        sink.on_result(FillOutcome::TimedOut);
    }

    #[test]
    fn closure_callback() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
        let slot = seen.clone();
        let cb: Box<dyn ResultCallback> = Box::new(move |o: FillOutcome| {
            *slot.lock().unwrap() = Some(o);
        });
        cb.on_result(FillOutcome::NoFocusedField);
        assert_eq!(*seen.lock().unwrap(), Some(FillOutcome::NoFocusedField));
    }

    #[test]
    fn outcome_json_shape() {
        let outcome = FillOutcome::Suggestions(FillResponse {
            field_id: "f".into(),
            suggestions: vec![Suggestion {
                label: "Home".into(),
                value: "1 Main St".into(),
            }],
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "suggestions");
        assert_eq!(json["field_id"], "f");
        assert!(!outcome.is_empty());

        let failed = serde_json::to_value(FillOutcome::Failed {
            reason: "boom".into(),
        })
        .unwrap();
        assert_eq!(failed["outcome"], "failed");
        assert_eq!(failed["reason"], "boom");
        assert!(FillOutcome::Cancelled.is_empty());
    }
}
