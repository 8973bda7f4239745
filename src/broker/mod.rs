//! One-shot result broker.
//!
//! Rendered output for a (slot, field) pair is delivered to the handler
//! registered under that key, at most once. Delivery takes the handler out
//! of the map under the lock and invokes it after the lock is released, so
//! a handler may itself touch the broker.

pub mod sink;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::resolver::session::SessionKey;
use sink::FillResponse;

/// Handler invoked with the rendered output for its key.
pub type ResultHandler = Box<dyn FnOnce(FillResponse) + Send + 'static>;

/// Broker registration failure.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("a handler is already registered for {0}")]
    AlreadyRegistered(SessionKey),
}

/// Concurrency-safe map of pending one-shot handlers.
#[derive(Default)]
pub struct CallbackBroker {
    handlers: Mutex<HashMap<SessionKey, ResultHandler>>,
}

impl CallbackBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn handlers(&self) -> MutexGuard<'_, HashMap<SessionKey, ResultHandler>> {
        // Handlers never run under this lock.
        self.handlers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `handler` for `key`.
    ///
    /// Fails if a handler is already pending for the key; the existing
    /// registration is left untouched.
    pub fn register(&self, key: SessionKey, handler: ResultHandler) -> Result<(), BrokerError> {
        let mut handlers = self.handlers();
        if handlers.contains_key(&key) {
            return Err(BrokerError::AlreadyRegistered(key));
        }
        tracing::debug!(key = %key, "callback registered");
        handlers.insert(key, handler);
        Ok(())
    }

    /// Deliver `response` to the handler registered for `key`.
    ///
    /// Returns `false` if nothing is registered (never registered, already
    /// delivered, or removed), in which case the response is dropped.
    pub fn deliver(&self, key: &SessionKey, response: FillResponse) -> bool {
        let handler = self.handlers().remove(key);
        match handler {
            Some(handler) => {
                tracing::debug!(key = %key, "delivering result");
                handler(response);
                true
            }
            None => {
                tracing::debug!(key = %key, "no handler registered, result dropped");
                false
            }
        }
    }

    /// Drop the registration for `key` without invoking it.
    pub fn remove(&self, key: &SessionKey) -> bool {
        self.handlers().remove(key).is_some()
    }

    pub fn is_registered(&self, key: &SessionKey) -> bool {
        self.handlers().contains_key(key)
    }

    /// Number of pending registrations.
    pub fn pending(&self) -> usize {
        self.handlers().len()
    }
}

impl std::fmt::Debug for CallbackBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackBroker")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn response(field: &str) -> FillResponse {
        FillResponse {
            field_id: field.into(),
            suggestions: Vec::new(),
        }
    }

    fn counting_handler(count: &Arc<AtomicUsize>) -> ResultHandler {
        let count = count.clone();
        Box::new(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn deliver_invokes_once_and_clears() {
        let broker = CallbackBroker::new();
        let count = Arc::new(AtomicUsize::new(0));
        let key = SessionKey::new("slot", "field");

        broker.register(key.clone(), counting_handler(&count)).unwrap();
        assert!(broker.is_registered(&key));

        assert!(broker.deliver(&key, response("field")));
        assert!(!broker.is_registered(&key));
        assert_eq!(broker.pending(), 0);

        // Second delivery is a no-op.
        assert!(!broker.deliver(&key, response("field")));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn deliver_unknown_key() {
        let broker = CallbackBroker::new();
        assert!(!broker.deliver(&SessionKey::new("s", "f"), response("f")));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let broker = CallbackBroker::new();
        let count = Arc::new(AtomicUsize::new(0));
        let key = SessionKey::new("slot", "field");

        broker.register(key.clone(), counting_handler(&count)).unwrap();
        let err = broker.register(key.clone(), counting_handler(&count)).unwrap_err();
        assert!(matches!(err, BrokerError::AlreadyRegistered(ref k) if *k == key));
        assert_eq!(broker.pending(), 1);
    }

    #[test]
    fn keys_are_independent() {
        let broker = CallbackBroker::new();
        let count = Arc::new(AtomicUsize::new(0));
        broker
            .register(SessionKey::new("s", "a"), counting_handler(&count))
            .unwrap();
        broker
            .register(SessionKey::new("s", "b"), counting_handler(&count))
            .unwrap();

        assert!(broker.deliver(&SessionKey::new("s", "b"), response("b")));
        assert!(broker.is_registered(&SessionKey::new("s", "a")));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_skips_handler() {
        let broker = CallbackBroker::new();
        let count = Arc::new(AtomicUsize::new(0));
        let key = SessionKey::new("slot", "field");
        broker.register(key.clone(), counting_handler(&count)).unwrap();

        assert!(broker.remove(&key));
        assert!(!broker.remove(&key));
        assert!(!broker.deliver(&key, response("field")));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_may_reenter_broker() {
        let broker = Arc::new(CallbackBroker::new());
        let inner = broker.clone();
        let key = SessionKey::new("slot", "field");
        let next = SessionKey::new("slot", "next");
        let next_clone = next.clone();
        broker
            .register(
                key.clone(),
                Box::new(move |_| {
                    inner.register(next_clone, Box::new(|_| {})).unwrap();
                }),
            )
            .unwrap();

        assert!(broker.deliver(&key, response("field")));
        assert!(broker.is_registered(&next));
    }

    #[test]
    fn concurrent_delivery_fires_once() {
        let broker = Arc::new(CallbackBroker::new());
        let count = Arc::new(AtomicUsize::new(0));
        let key = SessionKey::new("slot", "field");
        broker.register(key.clone(), counting_handler(&count)).unwrap();

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let broker = broker.clone();
                let key = key.clone();
                std::thread::spawn(move || broker.deliver(&key, response("field")))
            })
            .collect();
        let delivered = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|d| *d)
            .count();

        assert_eq!(delivered, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
