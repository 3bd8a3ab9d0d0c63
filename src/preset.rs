//! Preset records and their YAML file store
//!
//! A preset is a snapshot of the engine configuration and all eight rows,
//! addressed by slot 0-9. The record has no version tag; a layout change
//! needs a migration outside this crate.

use crate::error::StoreError;
use crate::sequencer::row::{Row, DIVISIONS, ROWS};
use crate::sequencer::{EngineConfig, InputMode, Mode, Sequencer};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const PRESET_SLOTS: u8 = 10;

/// A preset slot, always `< PRESET_SLOTS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PresetSlot(u8);

impl PresetSlot {
    pub fn new(slot: u8) -> Option<Self> {
        (slot < PRESET_SLOTS).then_some(PresetSlot(slot))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for PresetSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "preset {}", self.0)
    }
}

impl TryFrom<u8> for PresetSlot {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        PresetSlot::new(value).ok_or_else(|| format!("preset slot {} out of range", value))
    }
}

impl From<PresetSlot> for u8 {
    fn from(slot: PresetSlot) -> u8 {
        slot.0
    }
}

/// Persisted snapshot of one preset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetRecord {
    pub mode: Mode,
    pub input_mode: InputMode,
    pub division_table: [u8; DIVISIONS],
    pub rows: [Row; ROWS],
}

impl PresetRecord {
    pub fn capture(seq: &Sequencer) -> Self {
        let config = seq.config();
        Self {
            mode: config.mode,
            input_mode: config.input_mode,
            division_table: config.divisions,
            rows: seq.rows().clone(),
        }
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            mode: self.mode,
            input_mode: self.input_mode,
            divisions: self.division_table,
        }
    }

    /// Overwrite the sequencer with this record
    pub fn apply(&self, seq: &mut Sequencer) {
        seq.load(self.config(), self.rows.clone());
    }
}

/// State shared by all presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedState {
    /// Last accepted tick rate in ticks per minute
    pub speed: u32,
}

/// Stores records as YAML files inside one directory
#[derive(Debug, Clone)]
pub struct FilePresetStore {
    dir: PathBuf,
}

impl FilePresetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<config_dir>/gatelogic/presets`, or `./presets` when there is no config dir
    pub fn default_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("gatelogic").join("presets"))
            .unwrap_or_else(|| PathBuf::from("presets"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn preset_path(&self, slot: PresetSlot) -> PathBuf {
        self.dir.join(format!("preset-{}.yaml", slot.get()))
    }

    pub fn store_preset(&self, slot: PresetSlot, record: &PresetRecord) -> Result<(), StoreError> {
        self.write(&self.preset_path(slot), record)
    }

    pub fn load_preset(&self, slot: PresetSlot) -> Result<Option<PresetRecord>, StoreError> {
        self.read(&self.preset_path(slot))
    }

    pub fn store_shared(&self, shared: &SharedState) -> Result<(), StoreError> {
        self.write(&self.dir.join("shared.yaml"), shared)
    }

    pub fn load_shared(&self) -> Result<Option<SharedState>, StoreError> {
        self.read(&self.dir.join("shared.yaml"))
    }

    pub fn store_index(&self, slot: PresetSlot) -> Result<(), StoreError> {
        self.write(&self.dir.join("current.yaml"), &slot)
    }

    pub fn load_index(&self) -> Result<Option<PresetSlot>, StoreError> {
        self.read(&self.dir.join("current.yaml"))
    }

    fn write<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let yaml = serde_yaml::to_string(value)?;
        std::fs::write(path, yaml).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, StoreError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_yaml::from_str(&contents)
            .map(Some)
            .map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }
}
