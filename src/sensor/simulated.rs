use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{AccelerationSample, SampleSender, SensorSource};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 50;

/// One segment of a simulated gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    /// Device lying still: gravity only.
    Rest(Duration),
    /// Back-and-forth shaking along x with the given peak in g.
    Shake { duration: Duration, peak_g: f64 },
}

impl Phase {
    pub fn duration(&self) -> Duration {
        match self {
            Phase::Rest(duration) => *duration,
            Phase::Shake { duration, .. } => *duration,
        }
    }

    fn sample_count(&self, rate_hz: u32) -> u64 {
        (self.duration().as_secs_f64() * rate_hz as f64).round() as u64
    }

    /// Reading for the `index`-th sample inside this phase.
    fn reading(&self, index: u64) -> (f64, f64, f64) {
        match self {
            Phase::Rest(_) => (0.0, 0.0, 1.0),
            Phase::Shake { peak_g, .. } => {
                // Alternate direction every sample so magnitude stays at the peak.
                let x = if index % 2 == 0 { *peak_g } else { -*peak_g };
                (x, 0.0, 1.0)
            }
        }
    }
}

/// Scripted accelerometer used on desktop and in tests.
///
/// Paced sensors emit in real time; unpaced ones emit the whole pattern at once
/// with synthetic timestamps spaced by the sample period.
pub struct SimulatedSensor {
    pattern: Vec<Phase>,
    rate_hz: u32,
    paced: bool,
    repeat: bool,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl SimulatedSensor {
    pub fn new(pattern: Vec<Phase>, rate_hz: u32) -> Self {
        Self {
            pattern,
            rate_hz: rate_hz.max(1),
            paced: true,
            repeat: false,
            handle: None,
            cancel_token: None,
        }
    }

    /// A short demo: a gentle shake, a hard shake, then one long enough to
    /// trip the humorous override.
    pub fn demo(rate_hz: u32) -> Self {
        let pattern = vec![
            Phase::Rest(Duration::from_secs(1)),
            Phase::Shake {
                duration: Duration::from_secs(2),
                peak_g: 2.5,
            },
            Phase::Rest(Duration::from_millis(1500)),
            Phase::Shake {
                duration: Duration::from_secs(3),
                peak_g: 4.0,
            },
            Phase::Rest(Duration::from_millis(1500)),
            Phase::Shake {
                duration: Duration::from_secs(16),
                peak_g: 3.0,
            },
            Phase::Rest(Duration::from_secs(2)),
        ];
        Self::new(pattern, rate_hz)
    }

    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    pub fn rate_hz(&self) -> u32 {
        self.rate_hz
    }

    /// Every reading of one pass through the pattern, in order.
    pub fn readings(&self) -> Vec<(f64, f64, f64)> {
        self.pattern
            .iter()
            .flat_map(|phase| {
                (0..phase.sample_count(self.rate_hz)).map(move |index| phase.reading(index))
            })
            .collect()
    }

    fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz as f64)
    }
}

#[async_trait]
impl SensorSource for SimulatedSensor {
    fn is_supported(&self) -> bool {
        true
    }

    fn start(&mut self, tx: SampleSender) -> Result<()> {
        if self.handle.is_some() {
            bail!("simulated sensor already running");
        }

        let readings = self.readings();
        if readings.is_empty() {
            log_warn!("simulated sensor pattern is empty; no samples will be produced");
        }

        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let period = self.period();
        let paced = self.paced;
        let repeat = self.repeat;

        let handle = tokio::spawn(async move {
            let origin = Instant::now();
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut emitted: u64 = 0;

            'outer: loop {
                for &(x, y, z) in &readings {
                    let timestamp = if paced {
                        tokio::select! {
                            _ = ticker.tick() => {}
                            _ = token.cancelled() => break 'outer,
                        }
                        Instant::now()
                    } else {
                        if token.is_cancelled() {
                            break 'outer;
                        }
                        origin + period.mul_f64(emitted as f64)
                    };

                    if tx.send(AccelerationSample::at(x, y, z, timestamp)).is_err() {
                        break 'outer;
                    }
                    emitted += 1;
                }

                if !repeat || readings.is_empty() {
                    break;
                }
            }

            log_info!("simulated sensor finished after {} samples", emitted);
        });

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        log_info!(
            "simulated sensor started at {} Hz (paced={}, repeat={})",
            self.rate_hz,
            self.paced,
            self.repeat
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("simulated sensor task failed to join")
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn readings_follow_the_pattern() {
        let sensor = SimulatedSensor::new(
            vec![
                Phase::Rest(Duration::from_millis(100)),
                Phase::Shake {
                    duration: Duration::from_millis(60),
                    peak_g: 3.0,
                },
            ],
            100,
        );
        let readings = sensor.readings();

        assert_eq!(readings.len(), 16);
        assert_eq!(readings[0], (0.0, 0.0, 1.0));
        assert_eq!(readings[10], (3.0, 0.0, 1.0));
        assert_eq!(readings[11], (-3.0, 0.0, 1.0));
    }

    #[tokio::test]
    async fn unpaced_sensor_spaces_timestamps_by_period() {
        let mut sensor = SimulatedSensor::new(
            vec![Phase::Shake {
                duration: Duration::from_millis(100),
                peak_g: 3.0,
            }],
            50,
        )
        .unpaced();
        let (tx, mut rx) = mpsc::unbounded_channel();
        sensor.start(tx).unwrap();

        let mut samples = Vec::new();
        while let Some(sample) = rx.recv().await {
            samples.push(sample);
        }
        sensor.stop().await.unwrap();

        assert_eq!(samples.len(), 5);
        let gap = samples[4].timestamp - samples[0].timestamp;
        assert_eq!(gap.as_millis(), 80);
    }

    #[tokio::test]
    async fn double_start_is_rejected_and_stop_is_idempotent() {
        let mut sensor = SimulatedSensor::demo(20).unpaced();
        let (tx, _rx) = mpsc::unbounded_channel();
        sensor.start(tx.clone()).unwrap();
        assert!(sensor.start(tx).is_err());
        sensor.stop().await.unwrap();
        sensor.stop().await.unwrap();
    }
}
