//! Settings management

use kiln_script::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("reading or writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("serializing settings for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Engine settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub scripting: ScriptingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptingSettings {
    /// `strict_handles` and `trace_internal_calls`
    #[serde(flatten)]
    pub engine: EngineConfig,
    /// Script sources evaluated before script behaviors are instantiated
    pub scripts: Vec<PathBuf>,
    pub tick_rate_hz: u32,
    /// Frames the runtime simulates before exiting
    pub frames: u64,
}

impl Default for ScriptingSettings {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            scripts: Vec::new(),
            tick_rate_hz: 60,
            frames: 120,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_owned(),
            source,
        })?;
        let settings = serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_owned(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Like [`Settings::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let text = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Serialize {
            path: path.to_owned(),
            source,
        })?;
        std::fs::write(path, text).map_err(|source| SettingsError::Io {
            path: path.to_owned(),
            source,
        })
    }
}

impl ScriptingSettings {
    /// Script paths resolved against the directory holding the settings file.
    pub fn resolved_scripts(&self, settings_path: &Path) -> Vec<PathBuf> {
        let base = settings_path.parent().unwrap_or(Path::new(""));
        self.scripts.iter().map(|p| base.join(p)).collect()
    }
}

impl From<&ScriptingSettings> for EngineConfig {
    fn from(settings: &ScriptingSettings) -> Self {
        settings.engine.clone()
    }
}
