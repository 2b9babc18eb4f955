use serde::Serialize;

use crate::{models::EstimateResult, shake::ShakeState};

/// Everything the display layer needs to follow a session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum SessionEvent {
    ShakeStateChanged(ShakeState),
    EstimateReady(EstimateResult),
}

impl SessionEvent {
    pub fn estimate(&self) -> Option<&EstimateResult> {
        match self {
            SessionEvent::EstimateReady(result) => Some(result),
            SessionEvent::ShakeStateChanged(_) => None,
        }
    }
}
