pub mod detector;
pub mod edge;
pub mod state;

pub use detector::{
    normalize_intensity, shake_acceleration, ShakeDetector, ShakeListener, GRAVITY_BASELINE_G,
    INTENSITY_EPSILON, MAX_INTENSITY_G, SHAKE_THRESHOLD_G,
};
pub use edge::ShakeEdgeTracker;
pub use state::ShakeState;
