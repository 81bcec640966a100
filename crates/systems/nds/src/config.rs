//! 3D renderer settings
//!
//! Stored as JSON next to the rest of the emulator configuration. Fields
//! missing from the file take their default values.

use crate::flush::ColorFormat;
use crate::render3d::RendererId;
use emu_core::logging::{log, LogCategory, LogConfig, LogLevel};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to access settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Render3DSettings {
    pub renderer: RendererId,
    pub color_format: ColorFormat,
    /// 1, 2 or 4; anything else is treated as 1
    pub texture_scaling_factor: usize,
    pub texture_deposterize: bool,
    pub texture_smooth: bool,
    /// Level for the renderer's log categories
    pub log_level: LogLevel,
}

impl Default for Render3DSettings {
    fn default() -> Self {
        Self {
            renderer: RendererId::Null,
            color_format: ColorFormat::Bgr666Rev,
            texture_scaling_factor: 1,
            texture_deposterize: false,
            texture_smooth: false,
            log_level: LogLevel::Warn,
        }
    }
}

impl Render3DSettings {
    /// Load settings, falling back to defaults on a missing or invalid file
    pub fn load(path: &Path) -> Self {
        match Self::load_strict(path) {
            Ok(settings) => settings,
            Err(SettingsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(e) => {
                log(LogCategory::Config, LogLevel::Warn, || {
                    format!("{} ({}). Using defaults.", e, path.display())
                });
                Self::default()
            }
        }
    }

    pub fn load_strict(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Set the level of every renderer log category
    pub fn apply_log_level(&self) {
        let config = LogConfig::global();
        for category in LogCategory::ALL {
            config.set_level(category, self.log_level);
        }
    }
}
