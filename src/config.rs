//! Settings file schema and loader
//!
//! Settings are stored as YAML in the user's config directory.
//! Default location: <config_dir>/gatelogic/settings.yaml

use crate::error::StoreError;
use crate::preset::FilePresetStore;
use crate::sequencer::playback::Timing;
use crate::sequencer::row::{DEFAULT_DIVISIONS, DIVISIONS};
use crate::sequencer::{EngineConfig, ReferenceMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Whether a referenced row may itself reference another row
    pub reference_mode: ReferenceMode,

    /// Custom position -> division table used for new presets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub division_table: Option<[u8; DIVISIONS]>,

    /// Gate width in logical mode and for short steps (ms)
    pub trigger_ms: u32,

    /// Auxiliary clock pulse width (ms)
    pub clock_out_ms: u32,

    /// Error blink half-period (ms)
    pub error_blink_ms: u32,

    /// Minimum knob movement on the 16-bit scale before speed follows it
    pub knob_threshold: u16,

    /// Where presets live; defaults to <config_dir>/gatelogic/presets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presets_dir: Option<PathBuf>,

    pub midi: MidiSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let timing = Timing::default();
        Self {
            reference_mode: ReferenceMode::Single,
            division_table: None,
            trigger_ms: timing.trigger_ms,
            clock_out_ms: timing.clock_out_ms,
            error_blink_ms: 333,
            knob_threshold: timing.knob_threshold,
            presets_dir: None,
            midi: MidiSettings::default(),
        }
    }
}

/// Gate -> MIDI note output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiSettings {
    /// Port name substring to connect to at start-up (case-insensitive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_match: Option<String>,

    /// MIDI channel 0-15
    pub channel: u8,

    /// Note sent for row 0; row n sends base_note + n
    pub base_note: u8,
}

impl Default for MidiSettings {
    fn default() -> Self {
        Self {
            port_match: None,
            channel: 0,
            base_note: 36,
        }
    }
}

impl Settings {
    pub fn timing(&self) -> Timing {
        Timing {
            trigger_ms: self.trigger_ms.max(1),
            clock_out_ms: self.clock_out_ms.max(1),
            knob_threshold: self.knob_threshold,
        }
    }

    /// The division table for fresh presets. A table with a zero entry is ignored.
    pub fn divisions(&self) -> [u8; DIVISIONS] {
        match self.division_table {
            Some(table) if table.iter().all(|&d| d > 0) => table,
            Some(_) => {
                log::warn!("Settings: division_table contains a zero entry, using default table");
                DEFAULT_DIVISIONS
            }
            None => DEFAULT_DIVISIONS,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            divisions: self.divisions(),
            ..EngineConfig::default()
        }
    }

    pub fn presets_dir(&self) -> PathBuf {
        self.presets_dir
            .clone()
            .unwrap_or_else(FilePresetStore::default_dir)
    }
}

/// Get the default settings file path
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gatelogic")
        .join("settings.yaml")
}

/// Load settings from a YAML file
///
/// A missing file yields defaults. An unreadable or invalid file logs a
/// warning and yields defaults.
pub fn load_settings(path: &Path) -> Settings {
    log::info!("load_settings: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_settings: No settings file, using defaults");
        return Settings::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<Settings>(&contents) {
            Ok(settings) => {
                log::info!(
                    "load_settings: reference mode {:?}, trigger {} ms",
                    settings.reference_mode,
                    settings.trigger_ms
                );
                settings
            }
            Err(e) => {
                log::warn!("load_settings: Failed to parse settings: {}", e);
                Settings::default()
            }
        },
        Err(e) => {
            log::warn!("load_settings: Failed to read settings file: {}", e);
            Settings::default()
        }
    }
}

/// Save settings to a YAML file, creating parent directories as needed
pub fn save_settings(settings: &Settings, path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let yaml = serde_yaml::to_string(settings)?;
    std::fs::write(path, yaml).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("save_settings: Saved to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(&dir.path().join("settings.yaml"));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.divisions(), DEFAULT_DIVISIONS);
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
reference_mode: nested
division_table: [24, 16, 12, 8, 6, 4, 3, 2, 1, 1, 1, 1]
trigger_ms: 15
midi:
  port_match: "Eurorack"
  base_note: 60
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.reference_mode, ReferenceMode::Nested);
        assert_eq!(settings.divisions()[0], 24);
        assert_eq!(settings.timing().trigger_ms, 15);
        assert_eq!(settings.clock_out_ms, 10);
        assert_eq!(settings.midi.port_match.as_deref(), Some("Eurorack"));
        assert_eq!(settings.midi.channel, 0);
    }

    #[test]
    fn test_zero_division_falls_back() {
        let settings = Settings {
            division_table: Some([0; DIVISIONS]),
            ..Settings::default()
        };
        assert_eq!(settings.divisions(), DEFAULT_DIVISIONS);
    }

    #[test]
    fn test_invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "reference_mode: sideways").unwrap();
        assert_eq!(load_settings(&path), Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.yaml");
        let settings = Settings {
            reference_mode: ReferenceMode::Nested,
            error_blink_ms: 200,
            ..Settings::default()
        };
        save_settings(&settings, &path).unwrap();
        assert_eq!(load_settings(&path), settings);
    }
}
