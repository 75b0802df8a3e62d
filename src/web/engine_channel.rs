//! Defines the message types for communicating with the render engine task.

use serde_json::Value;
use tokio::sync::oneshot;

use super::models::StatusResponse;
use crate::config::EffectSettings;

/// Requests the API handlers send to the engine. Each carries a oneshot
/// sender for the reply.
#[derive(Debug)]
pub enum EngineRequest {
    /// Snapshot of the service, detector, and printer state.
    GetStatus {
        respond_to: oneshot::Sender<StatusResponse>,
    },
    /// A Moonraker-style status payload to merge into the printer state.
    PushStatus {
        status: Value,
        respond_to: oneshot::Sender<()>,
    },
    /// Install a manual effect override, or clear it with `None`.
    SetOverride {
        settings: Option<EffectSettings>,
        respond_to: oneshot::Sender<()>,
    },
}
