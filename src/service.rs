//! Platform-facing entry points, wired together from a [`ServiceConfig`]
//! and a runtime at process start.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::bridge::{AutofillSessionBridge, FillPhase};
use crate::broker::CallbackBroker;
use crate::broker::sink::ResultCallback;
use crate::config::{ConfigError, ServiceConfig};
use crate::device::DeviceClient;
use crate::runtime::ComputationRuntime;
use crate::view::FillRequest;

pub struct AutofillService {
    bridge: AutofillSessionBridge,
    device: Arc<DeviceClient>,
}

impl AutofillService {
    /// Assemble the broker, bridge and device client. The bridge and the
    /// device client share one broker.
    pub fn new(config: &ServiceConfig, runtime: Arc<dyn ComputationRuntime>) -> Result<Self, ConfigError> {
        config.validate()?;
        let broker = Arc::new(CallbackBroker::new());
        let device = Arc::new(DeviceClient::new(broker.clone()));
        let bridge = AutofillSessionBridge::new(config, runtime, broker);
        tracing::info!(
            computation = %config.computation_name,
            fill_timeout_ms = config.fill_timeout_ms,
            "autofill service assembled"
        );
        Ok(Self { bridge, device })
    }

    /// Transport endpoint for messages from the runtime.
    pub fn device_client(&self) -> Arc<DeviceClient> {
        self.device.clone()
    }

    pub fn bridge(&self) -> &AutofillSessionBridge {
        &self.bridge
    }

    pub fn on_fill_request(
        &self,
        request: &FillRequest,
        cancel: CancellationToken,
        callback: Box<dyn ResultCallback>,
    ) -> FillPhase {
        tracing::debug!(request_id = request.request_id, "fill request received");
        self.bridge
            .handle_fill_request(&request.fill_contexts, cancel, callback)
    }

    /// Saving is not supported; the request is acknowledged and dropped.
    pub fn on_save_request(&self, request: &FillRequest) {
        tracing::debug!(request_id = request.request_id, "save request ignored");
    }
}
