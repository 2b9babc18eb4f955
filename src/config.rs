use std::{path::PathBuf, str::FromStr};

use anyhow::{anyhow, bail, Context, Result};

use crate::sensor::simulated::DEFAULT_SAMPLE_RATE_HZ;

const APP_DIR_NAME: &str = "shakecast";

/// Where samples come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    /// Scripted demo gesture, paced in real time.
    Simulated,
    /// `x y z` or `t_ms x y z` lines on stdin.
    Stdin,
    /// No accelerometer; nothing is ever detected.
    None,
}

impl FromStr for SensorKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "simulated" | "sim" => Ok(SensorKind::Simulated),
            "stdin" | "replay" => Ok(SensorKind::Stdin),
            "none" | "off" => Ok(SensorKind::None),
            other => Err(anyhow!("unknown sensor '{other}' (expected simulated, stdin or none)")),
        }
    }
}

/// Process-level configuration, read from `SHAKECAST_*` environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub sensor: SensorKind,
    pub sample_rate_hz: u32,
    pub catalog_path: Option<PathBuf>,
    pub debug: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = match lookup("SHAKECAST_DATA_DIR") {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => dirs::data_local_dir()
                .map(|dir| dir.join(APP_DIR_NAME))
                .ok_or_else(|| anyhow!("no local data directory; set SHAKECAST_DATA_DIR"))?,
        };

        let sensor = lookup("SHAKECAST_SENSOR")
            .map(|value| value.parse::<SensorKind>())
            .transpose()?
            .unwrap_or(SensorKind::Simulated);

        let sample_rate_hz = match lookup("SHAKECAST_SAMPLE_HZ") {
            Some(raw) => {
                let rate = raw
                    .trim()
                    .parse::<u32>()
                    .with_context(|| format!("SHAKECAST_SAMPLE_HZ '{raw}' is not a number"))?;
                if !(1..=1000).contains(&rate) {
                    bail!("SHAKECAST_SAMPLE_HZ must be between 1 and 1000, got {rate}");
                }
                rate
            }
            None => DEFAULT_SAMPLE_RATE_HZ,
        };

        let catalog_path = lookup("SHAKECAST_CATALOG")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let debug = lookup("SHAKECAST_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            data_dir,
            sensor,
            sample_rate_hz,
            catalog_path,
            debug,
        })
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("shakecast.sqlite3")
    }
}
