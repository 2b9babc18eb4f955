//! Acceleration sources feeding the shake detector.
//!
//! Every source pushes [`AccelerationSample`]s (g-units) into an unbounded
//! channel. Dropping the sender ends the stream.

pub mod replay;
pub mod simulated;

use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

pub use replay::ReplaySensor;
pub use simulated::{Phase, SimulatedSensor};

/// One tri-axial reading in g-units (1g = 9.8 m/s²).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccelerationSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// When the reading was taken; the detector measures durations from this.
    pub timestamp: Instant,
}

impl AccelerationSample {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self::at(x, y, z, Instant::now())
    }

    pub fn at(x: f64, y: f64, z: f64, timestamp: Instant) -> Self {
        Self { x, y, z, timestamp }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

pub type SampleSender = mpsc::UnboundedSender<AccelerationSample>;
pub type SampleReceiver = mpsc::UnboundedReceiver<AccelerationSample>;

#[async_trait]
pub trait SensorSource: Send {
    /// False when the platform has no accelerometer. Such a source never
    /// produces samples.
    fn is_supported(&self) -> bool;

    /// Begin pushing samples into `tx`.
    fn start(&mut self, tx: SampleSender) -> Result<()>;

    /// Stop producing samples. Calling it on a stopped source is a no-op.
    async fn stop(&mut self) -> Result<()>;
}

/// Stand-in for platforms without an accelerometer.
#[derive(Debug, Default)]
pub struct UnsupportedSensor;

#[async_trait]
impl SensorSource for UnsupportedSensor {
    fn is_supported(&self) -> bool {
        false
    }

    fn start(&mut self, _tx: SampleSender) -> Result<()> {
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }
}
