use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::models::Mode;

pub const DEFAULT_MAX_HISTORY_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub selected_mode: Mode,
    pub max_history_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            selected_mode: Mode::Work,
            max_history_size: DEFAULT_MAX_HISTORY_SIZE,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if !self.selected_mode.is_user_selectable() {
            bail!("mode '{}' cannot be selected", self.selected_mode);
        }
        if self.max_history_size == 0 {
            bail!("max history size must be at least 1");
        }
        Ok(())
    }
}

/// JSON-backed user settings. Reads are served from memory; every change is
/// written to disk before it becomes visible.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            parse_or_default(&contents, &path)
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn load(&self) -> Settings {
        *self.read_guard()
    }

    pub fn selected_mode(&self) -> Mode {
        self.read_guard().selected_mode
    }

    pub fn max_history_size(&self) -> u32 {
        self.read_guard().max_history_size
    }

    pub fn save(&self, settings: Settings) -> Result<()> {
        settings.validate()?;
        let mut guard = self
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    pub fn set_selected_mode(&self, mode: Mode) -> Result<()> {
        let settings = Settings {
            selected_mode: mode,
            ..self.load()
        };
        self.save(settings)
    }

    pub fn set_max_history_size(&self, max_history_size: u32) -> Result<()> {
        let settings = Settings {
            max_history_size,
            ..self.load()
        };
        self.save(settings)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: Settings = serde_json::from_str(&contents)?;
        data.validate()?;
        let mut guard = self
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = data;
        Ok(())
    }

    fn read_guard(&self) -> std::sync::RwLockReadGuard<'_, Settings> {
        self.data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write to a sibling temp file and rename over the target so a crash
    /// never leaves a half-written settings file.
    fn persist(&self, data: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }

        let serialized = serde_json::to_string_pretty(data)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serialized)
            .with_context(|| format!("Failed to write settings to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace settings at {}", self.path.display()))
    }
}

fn parse_or_default(contents: &str, path: &std::path::Path) -> Settings {
    match serde_json::from_str::<Settings>(contents) {
        Ok(settings) if settings.validate().is_ok() => settings,
        Ok(settings) => {
            warn!(
                "Ignoring invalid settings in {} ({:?}); using defaults",
                path.display(),
                settings
            );
            Settings::default()
        }
        Err(err) => {
            warn!(
                "Failed to parse settings in {}: {err}; using defaults",
                path.display()
            );
            Settings::default()
        }
    }
}
