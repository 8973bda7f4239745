//! Autofill bridge between a platform view snapshot and an
//! Arcs-style computation runtime.
//!
//! A fill request flows through [`resolver`] (find the focused field),
//! [`bridge`] (start a computation, wait for its rendered output) and
//! [`broker`] (one-shot delivery keyed by slot and field). Rendered output
//! arrives over the JSON transport handled by [`device`].

pub mod bridge;
pub mod broker;
pub mod config;
pub mod device;
pub mod json;
pub mod resolver;
pub mod runtime;
pub mod service;
pub mod view;

pub use bridge::AutofillSessionBridge;
pub use broker::CallbackBroker;
pub use broker::sink::{FillOutcome, FillResponse, ResultCallback, Suggestion};
pub use config::ServiceConfig;
pub use device::DeviceClient;
pub use resolver::session::{SessionHandle, SessionKey};
pub use runtime::{AutofillRequest, ComputationRuntime, RuntimeError};
pub use service::AutofillService;
pub use view::{FillContext, FillRequest, ViewNode, WindowNode};
