//! Device client — the runtime-to-host JSON transport boundary.
//!
//! Each inbound message is decoded and dispatched independently. A
//! malformed message or a panicking result handler is logged and dropped;
//! it never takes the host down or affects later messages.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::broker::CallbackBroker;
use crate::broker::sink::FillResponse;
use crate::json::{JsonError, PortableJsonParser, SerdeJsonParser};
use crate::resolver::session::SessionKey;

/// Severity of a runtime-forwarded log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

/// Messages the runtime sends over the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "message", rename_all = "snake_case")]
pub enum TransportMessage {
    /// Rendered output for a field under a provided slot.
    Output {
        slot_id: String,
        field_id: String,
        content: FillResponse,
    },
    /// The runtime finished loading.
    Ready,
    Log {
        #[serde(default)]
        level: LogLevel,
        text: String,
    },
}

/// What a received message turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Delivered,
    /// Output with no pending registration (late, duplicate, or unknown).
    Unclaimed,
    Ready,
    Logged,
}

/// Per-message failure.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("malformed message: {0}")]
    Json(#[from] JsonError),
    #[error("undecodable message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("result handler panicked: {0}")]
    HandlerPanicked(String),
}

pub struct DeviceClient {
    parser: Box<dyn PortableJsonParser>,
    broker: Arc<CallbackBroker>,
    ready: AtomicBool,
}

impl DeviceClient {
    pub fn new(broker: Arc<CallbackBroker>) -> Self {
        Self::with_parser(broker, Box::new(SerdeJsonParser))
    }

    pub fn with_parser(broker: Arc<CallbackBroker>, parser: Box<dyn PortableJsonParser>) -> Self {
        Self {
            parser,
            broker,
            ready: AtomicBool::new(false),
        }
    }

    /// Whether the runtime has announced readiness.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Receive one transport message. Failures are logged, never returned.
    pub fn receive(&self, json: &str) {
        if let Err(e) = self.try_receive(json) {
            tracing::error!(error = %e, payload = json, "failed to receive transport message");
        }
    }

    /// Decode and dispatch one message.
    pub fn try_receive(&self, json: &str) -> Result<Dispatch, DeviceError> {
        let value = self.parser.parse(json)?;
        let message: TransportMessage = serde_json::from_value(value.into_value())?;
        self.dispatch(message)
    }

    fn dispatch(&self, message: TransportMessage) -> Result<Dispatch, DeviceError> {
        match message {
            TransportMessage::Output {
                slot_id,
                field_id,
                content,
            } => {
                let key = SessionKey::new(slot_id, field_id);
                let delivered = catch_unwind(AssertUnwindSafe(|| self.broker.deliver(&key, content)))
                    .map_err(|payload| DeviceError::HandlerPanicked(panic_message(payload.as_ref())))?;
                if delivered {
                    Ok(Dispatch::Delivered)
                } else {
                    tracing::debug!(key = %key, "unclaimed output");
                    Ok(Dispatch::Unclaimed)
                }
            }
            TransportMessage::Ready => {
                self.ready.store(true, Ordering::Release);
                tracing::info!("runtime ready");
                Ok(Dispatch::Ready)
            }
            TransportMessage::Log { level, text } => {
                match level {
                    LogLevel::Debug => tracing::debug!(target: "arcfill::runtime", "{text}"),
                    LogLevel::Info => tracing::info!(target: "arcfill::runtime", "{text}"),
                    LogLevel::Warn => tracing::warn!(target: "arcfill::runtime", "{text}"),
                    LogLevel::Error => tracing::error!(target: "arcfill::runtime", "{text}"),
                }
                Ok(Dispatch::Logged)
            }
        }
    }

    /// Feed messages from `rx` into [`receive`](Self::receive) until the
    /// sending side closes.
    pub async fn pump(self: Arc<Self>, mut rx: UnboundedReceiver<String>) {
        while let Some(message) = rx.recv().await {
            self.receive(&message);
        }
        tracing::debug!("transport closed");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn output(slot: &str, field: &str) -> String {
        serde_json::to_string(&TransportMessage::Output {
            slot_id: slot.into(),
            field_id: field.into(),
            content: FillResponse {
                field_id: field.into(),
                suggestions: Vec::new(),
            },
        })
        .unwrap()
    }

    #[test]
    fn output_reaches_registered_handler() {
        let broker = Arc::new(CallbackBroker::new());
        let seen = Arc::new(Mutex::new(None));
        let slot = seen.clone();
        broker
            .register(
                SessionKey::new("s1", "f1"),
                Box::new(move |r| *slot.lock().unwrap() = Some(r.field_id)),
            )
            .unwrap();

        let client = DeviceClient::new(broker.clone());
        assert_eq!(client.try_receive(&output("s1", "f1")).unwrap(), Dispatch::Delivered);
        assert_eq!(seen.lock().unwrap().as_deref(), Some("f1"));
        assert_eq!(client.try_receive(&output("s1", "f1")).unwrap(), Dispatch::Unclaimed);
    }

    #[test]
    fn ready_and_log_messages() {
        let client = DeviceClient::new(Arc::new(CallbackBroker::new()));
        assert!(!client.is_ready());
        assert_eq!(client.try_receive(r#"{"message":"ready"}"#).unwrap(), Dispatch::Ready);
        assert!(client.is_ready());
        assert_eq!(
            client
                .try_receive(r#"{"message":"log","level":"warn","text":"slow particle"}"#)
                .unwrap(),
            Dispatch::Logged
        );
        assert_eq!(
            client.try_receive(r#"{"message":"log","text":"no level"}"#).unwrap(),
            Dispatch::Logged
        );
    }

    #[test]
    fn malformed_messages_are_isolated() {
        let broker = Arc::new(CallbackBroker::new());
        let client = DeviceClient::new(broker.clone());

        assert!(matches!(client.try_receive("{oops"), Err(DeviceError::Json(_))));
        assert!(matches!(
            client.try_receive(r#"{"message":"teleport"}"#),
            Err(DeviceError::Decode(_))
        ));
        assert!(matches!(
            client.try_receive(r#"{"message":"output","slot_id":"s"}"#),
            Err(DeviceError::Decode(_))
        ));

        // receive() swallows all of the above.
        client.receive("{oops");
        client.receive(r#"{"message":"teleport"}"#);

        // And the client keeps working afterwards.
        assert_eq!(client.try_receive(r#"{"message":"ready"}"#).unwrap(), Dispatch::Ready);
    }

    #[test]
    fn panicking_handler_is_contained() {
        let broker = Arc::new(CallbackBroker::new());
        broker
            .register(SessionKey::new("s", "f"), Box::new(|_| panic!("renderer exploded")))
            .unwrap();
        let client = DeviceClient::new(broker.clone());

        let err = client.try_receive(&output("s", "f")).unwrap_err();
        assert!(matches!(err, DeviceError::HandlerPanicked(ref m) if m == "renderer exploded"));
        // The registration was consumed before the handler ran.
        assert_eq!(broker.pending(), 0);
        client.receive(&output("s", "f"));
    }

    #[tokio::test]
    async fn pump_drains_until_closed() {
        let broker = Arc::new(CallbackBroker::new());
        let client = Arc::new(DeviceClient::new(broker));
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send("garbage".to_string()).unwrap();
        tx.send(r#"{"message":"ready"}"#.to_string()).unwrap();
        drop(tx);

        client.clone().pump(rx).await;
        assert!(client.is_ready());
    }
}
