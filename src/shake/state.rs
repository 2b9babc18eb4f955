use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Detector's current view of the gesture in progress.
///
/// `intensity` is 0.0 whenever `is_active` is false. `duration` counts from
/// the first active sample of the current episode and is zero when idle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShakeState {
    pub intensity: f64,
    #[serde(rename = "durationMs", with = "duration_ms")]
    pub duration: Duration,
    pub is_active: bool,
}

impl ShakeState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn active(intensity: f64, duration: Duration) -> Self {
        Self {
            intensity,
            duration,
            is_active: true,
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_duration_as_milliseconds() {
        let state = ShakeState::active(0.5, Duration::from_millis(1250));
        let json = serde_json::to_value(state).unwrap();
        assert_eq!(json["durationMs"], 1250);
        assert_eq!(json["isActive"], true);

        let back: ShakeState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
