use std::{sync::Arc, time::Duration};

use rand::{rngs::OsRng, Rng};

use super::{
    error::{EstimateError, EstimateOutcome},
    pools::{EstimatePools, Tier},
};
use crate::models::{EstimateResult, Mode};

/// Shakes strictly longer than this switch to the humorous pool.
pub const EASTER_EGG_DURATION: Duration = Duration::from_secs(15);

/// Maps a finished shake to one estimate.
///
/// Holds only the immutable catalog, so a single selector can be shared across
/// tasks and called concurrently. Draws use the operating system CSPRNG.
#[derive(Debug, Clone)]
pub struct EstimateSelector {
    pools: Arc<EstimatePools>,
}

impl EstimateSelector {
    pub fn new(pools: EstimatePools) -> Self {
        Self {
            pools: Arc::new(pools),
        }
    }

    pub fn pools(&self) -> &EstimatePools {
        &self.pools
    }

    /// Mode actually used for a shake of `duration` when `requested` was asked for.
    pub fn effective_mode(requested: Mode, duration: Duration) -> Mode {
        if duration > EASTER_EGG_DURATION {
            Mode::Humorous
        } else {
            requested
        }
    }

    pub fn generate(
        &self,
        intensity: f64,
        duration: Duration,
        mode: Mode,
    ) -> EstimateOutcome<EstimateResult> {
        if !intensity.is_finite() || !(0.0..=1.0).contains(&intensity) {
            return Err(EstimateError::InvalidIntensity(intensity));
        }

        let effective = Self::effective_mode(mode, duration);
        let tier = Tier::for_draw(effective, intensity);
        let pool = self.pools.pool(effective, tier);
        if pool.is_empty() {
            return Err(EstimateError::EmptyPool {
                mode: effective,
                tier: tier.as_str(),
            });
        }

        let index = OsRng.gen_range(0..pool.len());
        let text = pool[index].clone();

        Ok(EstimateResult::new(text, effective, intensity, duration))
    }
}

impl Default for EstimateSelector {
    fn default() -> Self {
        Self::new(EstimatePools::builtin())
    }
}
