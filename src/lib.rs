//! gatelogic - an 8-channel trigger/gate generator engine
//!
//! This library provides the control logic of a clock-divided gate module:
//! - Per-row clock divisions combined across rows with AND/OR/XOR logic
//! - Reference validation and dependency-ordered recomputation
//! - A 16-step pattern mode with phase-aligned tickers
//! - Master clock, speed, gate timing and rotate mode
//! - A session controller that turns grid, clock and timer events into all of the above
//!
//! Hardware is reached only through the [`Host`] trait; [`DesktopHost`]
//! emulates it with MIDI, audio and an on-screen grid.

pub mod audio;
pub mod config;
pub mod desktop;
pub mod error;
pub mod host;
pub mod midi;
pub mod preset;
pub mod sequencer;
pub mod session;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use audio::AudioOutput;
pub use config::{load_settings, Settings};
pub use desktop::DesktopHost;
pub use error::{LogicError, MidiError, StoreError};
pub use host::{Event, Host, PulseKind, TimerId};
pub use midi::MidiGateOutput;
pub use preset::{FilePresetStore, PresetRecord, PresetSlot};
pub use sequencer::row::{LogicOp, RowIndex};
pub use sequencer::{Mode, ReferenceMode, Sequencer};
pub use session::{Controller, Page};
