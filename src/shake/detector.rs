use std::time::{Duration, Instant};

use super::ShakeState;
use crate::sensor::AccelerationSample;

/// Magnitude of a device at rest, in g.
pub const GRAVITY_BASELINE_G: f64 = 1.0;
/// Shake acceleration at or above which a shake is in progress.
pub const SHAKE_THRESHOLD_G: f64 = 1.5;
/// Shake acceleration that maps to intensity 1.0. Stronger shakes saturate.
pub const MAX_INTENSITY_G: f64 = 4.0;
/// Intensity changes smaller than this do not publish a new state.
pub const INTENSITY_EPSILON: f64 = 0.01;

pub type ShakeListener = Box<dyn FnMut(&ShakeState) + Send + 'static>;

/// Acceleration beyond gravity, floored at zero. Non-finite samples yield
/// `None` and are treated as "no shake".
pub fn shake_acceleration(sample: &AccelerationSample) -> Option<f64> {
    if !sample.is_finite() {
        return None;
    }
    let magnitude = sample.magnitude();
    if !magnitude.is_finite() {
        return None;
    }
    Some((magnitude - GRAVITY_BASELINE_G).max(0.0))
}

/// Linear intensity in [0.0, 1.0] for a shake acceleration.
pub fn normalize_intensity(shake_g: f64) -> f64 {
    (shake_g / MAX_INTENSITY_G).clamp(0.0, 1.0)
}

/// Turns the raw acceleration stream into shake episodes.
///
/// Edge-triggered: the first below-threshold sample ends an episode. The
/// detector publishes a state only when it differs from the last published
/// one, so a device at rest produces no notifications.
pub struct ShakeDetector {
    monitoring: bool,
    state: ShakeState,
    published: ShakeState,
    episode_started_at: Option<Instant>,
    listeners: Vec<ShakeListener>,
}

impl Default for ShakeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ShakeDetector {
    pub fn new() -> Self {
        Self {
            monitoring: false,
            state: ShakeState::idle(),
            published: ShakeState::idle(),
            episode_started_at: None,
            listeners: Vec::new(),
        }
    }

    pub fn start_monitoring(&mut self) {
        self.monitoring = true;
    }

    pub fn stop_monitoring(&mut self) {
        self.monitoring = false;
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    pub fn state(&self) -> ShakeState {
        self.state
    }

    /// Register a listener called, in registration order, for every
    /// published state.
    pub fn on_state_changed(&mut self, listener: ShakeListener) {
        self.listeners.push(listener);
    }

    /// Forget any episode in progress.
    pub fn reset(&mut self) {
        self.state = ShakeState::idle();
        self.published = ShakeState::idle();
        self.episode_started_at = None;
    }

    /// Feed one reading. Returns the new state when it was published.
    pub fn process_sample(&mut self, sample: &AccelerationSample) -> Option<ShakeState> {
        if !self.monitoring {
            return None;
        }

        let shake_g = shake_acceleration(sample);
        let is_active = shake_g.is_some_and(|g| g >= SHAKE_THRESHOLD_G);

        self.state = if is_active {
            let intensity = shake_g.map(normalize_intensity).unwrap_or(0.0);
            let duration = match self.episode_started_at {
                Some(started_at) if self.state.is_active => sample
                    .timestamp
                    .saturating_duration_since(started_at)
                    .max(self.state.duration),
                _ => {
                    self.episode_started_at = Some(sample.timestamp);
                    Duration::ZERO
                }
            };
            ShakeState::active(intensity, duration)
        } else {
            self.episode_started_at = None;
            ShakeState::idle()
        };

        if !self.differs_from_published() {
            return None;
        }

        self.published = self.state;
        for listener in self.listeners.iter_mut() {
            listener(&self.published);
        }
        Some(self.published)
    }

    fn differs_from_published(&self) -> bool {
        self.state.is_active != self.published.is_active
            || (self.state.intensity - self.published.intensity).abs() > INTENSITY_EPSILON
            || self.state.duration != self.published.duration
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn monitoring_detector() -> ShakeDetector {
        let mut detector = ShakeDetector::new();
        detector.start_monitoring();
        detector
    }

    fn sample(x: f64, y: f64, z: f64, origin: Instant, at_ms: u64) -> AccelerationSample {
        AccelerationSample::at(x, y, z, origin + Duration::from_millis(at_ms))
    }

    #[test]
    fn rest_reading_is_not_a_shake() {
        let mut detector = monitoring_detector();
        let origin = Instant::now();

        assert!(detector.process_sample(&sample(0.0, 0.0, 1.0, origin, 0)).is_none());
        let state = detector.state();
        assert!(!state.is_active);
        assert_eq!(state.intensity, 0.0);
        assert_eq!(state.duration, Duration::ZERO);
    }

    #[test]
    fn strong_shake_saturates_at_one() {
        let mut detector = monitoring_detector();
        let state = detector
            .process_sample(&sample(5.0, 0.0, 1.0, Instant::now(), 0))
            .unwrap();
        assert!(state.is_active);
        assert_eq!(state.intensity, 1.0);
    }

    #[test]
    fn intensity_scales_linearly_above_threshold() {
        let mut detector = monitoring_detector();
        // magnitude 3.0 -> shake 2.0 -> intensity 0.5
        let state = detector
            .process_sample(&sample(0.0, 0.0, 3.0, Instant::now(), 0))
            .unwrap();
        assert!(state.is_active);
        assert!((state.intensity - 0.5).abs() < 1e-12);
    }

    #[test]
    fn just_below_threshold_is_inactive() {
        let mut detector = monitoring_detector();
        // magnitude 2.49 -> shake 1.49
        assert!(detector
            .process_sample(&sample(0.0, 0.0, 2.49, Instant::now(), 0))
            .is_none());
        assert!(!detector.state().is_active);

        // magnitude 2.5 -> shake exactly at threshold
        let state = detector
            .process_sample(&sample(0.0, 0.0, 2.5, Instant::now(), 10))
            .unwrap();
        assert!(state.is_active);
    }

    #[test]
    fn intensity_zero_iff_inactive_over_a_grid() {
        let mut detector = monitoring_detector();
        let origin = Instant::now();
        let mut at_ms = 0;

        for x in [-6.0, -3.0, -1.0, 0.0, 0.5, 2.0, 4.5] {
            for y in [-2.5, 0.0, 1.5] {
                for z in [-1.0, 0.0, 1.0, 3.0] {
                    at_ms += 10;
                    detector.process_sample(&sample(x, y, z, origin, at_ms));
                    let state = detector.state();
                    assert!((0.0..=1.0).contains(&state.intensity));
                    assert_eq!(state.intensity == 0.0, !state.is_active);
                }
            }
        }
    }

    #[test]
    fn duration_grows_during_episode_and_resets_after() {
        let mut detector = monitoring_detector();
        let origin = Instant::now();

        let first = detector.process_sample(&sample(3.0, 0.0, 1.0, origin, 0)).unwrap();
        assert_eq!(first.duration, Duration::ZERO);

        let second = detector
            .process_sample(&sample(-3.0, 0.0, 1.0, origin, 400))
            .unwrap();
        assert_eq!(second.duration, Duration::from_millis(400));

        let ended = detector.process_sample(&sample(0.0, 0.0, 1.0, origin, 450)).unwrap();
        assert!(!ended.is_active);
        assert_eq!(ended.duration, Duration::ZERO);

        let next = detector.process_sample(&sample(3.0, 0.0, 1.0, origin, 900)).unwrap();
        assert!(next.is_active);
        assert_eq!(next.duration, Duration::ZERO);
    }

    #[test]
    fn duration_never_decreases_on_out_of_order_timestamps() {
        let mut detector = monitoring_detector();
        let origin = Instant::now() + Duration::from_secs(1);

        detector.process_sample(&sample(3.0, 0.0, 1.0, origin, 0));
        detector.process_sample(&sample(3.0, 0.0, 1.0, origin, 500));
        detector.process_sample(&sample(3.0, 0.0, 1.0, origin, 200));
        assert_eq!(detector.state().duration, Duration::from_millis(500));
    }

    #[test]
    fn identical_readings_publish_once() {
        let mut detector = monitoring_detector();
        let origin = Instant::now();

        assert!(detector.process_sample(&sample(3.0, 0.0, 1.0, origin, 0)).is_some());
        assert!(detector.process_sample(&sample(3.0, 0.0, 1.0, origin, 0)).is_none());
        // tiny intensity wobble at the same timestamp stays quiet
        assert!(detector.process_sample(&sample(3.001, 0.0, 1.0, origin, 0)).is_none());
    }

    #[test]
    fn stopped_detector_ignores_samples() {
        let mut detector = ShakeDetector::new();
        assert!(!detector.is_monitoring());
        assert!(detector
            .process_sample(&sample(5.0, 0.0, 1.0, Instant::now(), 0))
            .is_none());
        assert!(!detector.state().is_active);

        detector.start_monitoring();
        detector.start_monitoring();
        assert!(detector.is_monitoring());
        detector.stop_monitoring();
        detector.stop_monitoring();
        assert!(!detector.is_monitoring());
    }

    #[test]
    fn reset_then_rest_reading_stays_idle() {
        let mut detector = monitoring_detector();
        let origin = Instant::now();
        detector.process_sample(&sample(3.0, 0.0, 1.0, origin, 0));
        detector.process_sample(&sample(3.0, 0.0, 1.0, origin, 300));

        detector.reset();
        assert!(detector.process_sample(&sample(0.0, 0.0, 1.0, origin, 350)).is_none());
        let state = detector.state();
        assert!(!state.is_active);
        assert_eq!(state.duration, Duration::ZERO);
    }

    #[test]
    fn non_finite_samples_count_as_no_shake() {
        let mut detector = monitoring_detector();
        let origin = Instant::now();
        detector.process_sample(&sample(3.0, 0.0, 1.0, origin, 0));

        let state = detector
            .process_sample(&sample(f64::NAN, 0.0, 1.0, origin, 20))
            .unwrap();
        assert!(!state.is_active);
        assert_eq!(state.intensity, 0.0);

        assert!(detector
            .process_sample(&sample(f64::INFINITY, 0.0, 1.0, origin, 40))
            .is_none());
        assert!(detector
            .process_sample(&sample(1e200, 1e200, 0.0, origin, 60))
            .is_none());
    }

    #[test]
    fn listeners_see_every_published_state_in_order() {
        let mut detector = monitoring_detector();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        detector.on_state_changed(Box::new(move |state| {
            sink.lock().unwrap().push(state.is_active);
        }));

        let origin = Instant::now();
        detector.process_sample(&sample(3.0, 0.0, 1.0, origin, 0));
        detector.process_sample(&sample(0.0, 0.0, 1.0, origin, 20));
        detector.process_sample(&sample(0.0, 0.0, 1.0, origin, 40));

        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }
}
