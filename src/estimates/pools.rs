use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use super::{
    catalog,
    error::{EstimateError, EstimateOutcome},
};
use crate::models::Mode;

/// Intensity at or above which Work and Generic draw from the hard pool.
pub const HARD_INTENSITY_THRESHOLD: f64 = 0.5;

/// Which sub-pool of a mode a draw comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Gentle,
    Hard,
    /// Humorous has one pool regardless of intensity.
    Single,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Gentle => "gentle",
            Tier::Hard => "hard",
            Tier::Single => "single",
        }
    }

    pub fn for_draw(mode: Mode, intensity: f64) -> Self {
        match mode {
            Mode::Humorous => Tier::Single,
            Mode::Work | Mode::Generic if intensity < HARD_INTENSITY_THRESHOLD => Tier::Gentle,
            Mode::Work | Mode::Generic => Tier::Hard,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TieredPool {
    pub gentle: Vec<String>,
    pub hard: Vec<String>,
}

impl TieredPool {
    fn from_static(gentle: &[&str], hard: &[&str]) -> Self {
        Self {
            gentle: gentle.iter().map(|s| s.to_string()).collect(),
            hard: hard.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// On-disk shape of an injected catalog.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFile {
    work: TieredPool,
    generic: TieredPool,
    humorous: Vec<String>,
}

/// Immutable, validated estimate catalog. Every pool reachable by the
/// selection rule is guaranteed non-empty with no blank entries.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatePools {
    work: TieredPool,
    generic: TieredPool,
    humorous: Vec<String>,
}

impl EstimatePools {
    pub fn new(work: TieredPool, generic: TieredPool, humorous: Vec<String>) -> EstimateOutcome<Self> {
        let pools = Self {
            work,
            generic,
            humorous,
        };
        pools.validate()?;
        Ok(pools)
    }

    /// The catalog that ships with the app.
    pub fn builtin() -> Self {
        Self {
            work: TieredPool::from_static(catalog::WORK_GENTLE, catalog::WORK_HARD),
            generic: TieredPool::from_static(catalog::GENERIC_GENTLE, catalog::GENERIC_HARD),
            humorous: catalog::HUMOROUS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn from_json_file(path: &Path) -> EstimateOutcome<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|err| EstimateError::Catalog(format!("{}: {err}", path.display())))?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(contents: &str) -> EstimateOutcome<Self> {
        let file: CatalogFile = serde_json::from_str(contents)
            .map_err(|err| EstimateError::Catalog(err.to_string()))?;
        Self::new(file.work, file.generic, file.humorous)
    }

    pub fn pool(&self, mode: Mode, tier: Tier) -> &[String] {
        match (mode, tier) {
            (Mode::Humorous, _) => &self.humorous,
            (Mode::Work, Tier::Hard) => &self.work.hard,
            (Mode::Work, _) => &self.work.gentle,
            (Mode::Generic, Tier::Hard) => &self.generic.hard,
            (Mode::Generic, _) => &self.generic.gentle,
        }
    }

    fn validate(&self) -> EstimateOutcome<()> {
        let reachable = [
            (Mode::Work, Tier::Gentle),
            (Mode::Work, Tier::Hard),
            (Mode::Generic, Tier::Gentle),
            (Mode::Generic, Tier::Hard),
            (Mode::Humorous, Tier::Single),
        ];

        for (mode, tier) in reachable {
            let pool = self.pool(mode, tier);
            if pool.is_empty() {
                return Err(EstimateError::EmptyPool {
                    mode,
                    tier: tier.as_str(),
                });
            }
            if let Some(index) = pool.iter().position(|entry| entry.trim().is_empty()) {
                return Err(EstimateError::BlankEntry {
                    mode,
                    tier: tier.as_str(),
                    index,
                });
            }
        }

        Ok(())
    }
}

impl Default for EstimatePools {
    fn default() -> Self {
        Self::builtin()
    }
}
