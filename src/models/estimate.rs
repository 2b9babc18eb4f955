use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Mode;

/// One completed selection. Never mutated after creation; removed only by
/// history pruning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResult {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
    /// Mode actually used, after the long-shake override.
    pub mode: Mode,
    pub intensity: f64,
    pub duration_ms: u64,
}

impl EstimateResult {
    pub fn new(text: String, mode: Mode, intensity: f64, duration: Duration) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            text,
            mode,
            intensity,
            duration_ms: duration.as_millis().min(u64::MAX as u128) as u64,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}
