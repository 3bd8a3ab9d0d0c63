//! Test doubles shared across module tests.

use crate::host::{Host, TimerId, GRID_HEIGHT, GRID_WIDTH};
use crate::preset::{PresetRecord, PresetSlot, SharedState};
use crate::sequencer::row::{RowIndex, ROWS};
use std::collections::HashMap;

/// A timer as the recording host last saw it armed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedTimer {
    pub delay_ms: u32,
    pub repeat: bool,
}

/// Host that records every outbound call and keeps storage in memory
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub timers: HashMap<TimerId, ArmedTimer>,
    pub arm_count: HashMap<TimerId, usize>,
    pub cancelled: Vec<TimerId>,
    pub gates: [bool; ROWS],
    pub gate_history: Vec<(RowIndex, bool)>,
    pub clock_output: bool,
    pub grid_connected: bool,
    pub leds: Vec<Vec<u8>>,
    pub knob: Option<u16>,
    pub presets: HashMap<PresetSlot, PresetRecord>,
    pub shared: Option<SharedState>,
    pub preset_index: Option<PresetSlot>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            grid_connected: true,
            leds: vec![vec![0; GRID_WIDTH as usize]; GRID_HEIGHT as usize],
            ..Self::default()
        }
    }

    pub fn led(&self, x: u8, y: u8) -> u8 {
        self.leds[y as usize][x as usize]
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }
}

impl Host for RecordingHost {
    fn arm_timer(&mut self, id: TimerId, delay_ms: u32, repeat: bool) {
        self.timers.insert(id, ArmedTimer { delay_ms, repeat });
        *self.arm_count.entry(id).or_default() += 1;
    }

    fn cancel_timer(&mut self, id: TimerId) {
        self.timers.remove(&id);
        self.cancelled.push(id);
    }

    fn set_gate(&mut self, row: RowIndex, high: bool) {
        self.gates[row.get()] = high;
        self.gate_history.push((row, high));
    }

    fn set_clock_output(&mut self, high: bool) {
        self.clock_output = high;
    }

    fn is_grid_connected(&self) -> bool {
        self.grid_connected
    }

    fn clear_grid(&mut self) {
        for row in &mut self.leds {
            row.fill(0);
        }
    }

    fn set_grid_led(&mut self, x: u8, y: u8, level: u8) {
        if let Some(cell) = self.leds.get_mut(y as usize).and_then(|r| r.get_mut(x as usize)) {
            *cell = level;
        }
    }

    fn knob_count(&self) -> usize {
        usize::from(self.knob.is_some())
    }

    fn knob_value(&self, _index: usize) -> u16 {
        self.knob.unwrap_or(0)
    }

    fn store_preset(&mut self, slot: PresetSlot, record: &PresetRecord) {
        self.presets.insert(slot, record.clone());
    }

    fn load_preset(&mut self, slot: PresetSlot) -> Option<PresetRecord> {
        self.presets.get(&slot).cloned()
    }

    fn store_shared(&mut self, shared: &SharedState) {
        self.shared = Some(*shared);
    }

    fn load_shared(&mut self) -> Option<SharedState> {
        self.shared
    }

    fn store_preset_index(&mut self, slot: PresetSlot) {
        self.preset_index = Some(slot);
    }

    fn load_preset_index(&mut self) -> Option<PresetSlot> {
        self.preset_index
    }
}
