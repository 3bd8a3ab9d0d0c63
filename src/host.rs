//! Boundary between the engine and the hardware (or its emulation)
//!
//! The engine reacts to [`Event`]s and talks back only through [`Host`].
//! Storage and peripheral failures are the host's business; none of the
//! outbound calls report errors back into the engine.

use crate::preset::{PresetRecord, PresetSlot, SharedState};
use crate::sequencer::row::{RowIndex, ROWS};
use std::fmt;

pub const GRID_WIDTH: u8 = 16;
pub const GRID_HEIGHT: u8 = ROWS as u8;

pub const B_FULL: u8 = 11;
pub const B_BLINK: u8 = 10;
pub const B_HALF: u8 = 6;
pub const B_DIM: u8 = 2;

/// Identity of a host timer. Re-arming an id restarts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u8);

impl TimerId {
    /// Periodic knob poll
    pub const SPEED: TimerId = TimerId(0);
    /// Master tick
    pub const CLOCK: TimerId = TimerId(1);
    /// Drops the auxiliary clock output
    pub const CLOCK_OUT: TimerId = TimerId(2);
    /// Error blink cadence
    pub const ERROR: TimerId = TimerId(3);
    const GATE_BASE: u8 = 4;

    /// Auto-off timer of a row's gate
    pub fn gate(row: RowIndex) -> TimerId {
        TimerId(Self::GATE_BASE + row.get() as u8)
    }

    /// The row whose gate this timer closes, if it is a gate timer
    pub fn gate_row(self) -> Option<RowIndex> {
        self.0
            .checked_sub(Self::GATE_BASE)
            .and_then(|r| RowIndex::new(r as usize))
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.gate_row() {
            Some(row) => write!(f, "gate timer ({})", row),
            None => write!(f, "timer {}", self.0),
        }
    }
}

/// What an external clock pulse asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseKind {
    Tick,
    Rotate,
}

/// Peripherals whose connection state the host reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peripheral {
    Grid,
    Midi,
}

/// Inbound events, processed one at a time to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    ClockPulse(PulseKind),
    GridKey { x: u8, y: u8, pressed: bool },
    GridKeyHeld { x: u8, y: u8 },
    FrontButton,
    FrontButtonHeld,
    TimerFired(TimerId),
    KnobSample(u16),
    Connected { peripheral: Peripheral, connected: bool },
}

/// Outbound calls the engine makes into its host
pub trait Host {
    /// Arm (or re-arm) a timer to fire after `delay_ms`, repeating if `repeat`
    fn arm_timer(&mut self, id: TimerId, delay_ms: u32, repeat: bool);
    fn cancel_timer(&mut self, id: TimerId);

    fn set_gate(&mut self, row: RowIndex, high: bool);
    fn set_clock_output(&mut self, high: bool);

    fn is_grid_connected(&self) -> bool;
    fn clear_grid(&mut self);
    fn set_grid_led(&mut self, x: u8, y: u8, level: u8);
    /// Push the LED buffer to the device
    fn refresh_grid(&mut self) {}

    fn knob_count(&self) -> usize;
    fn knob_value(&self, index: usize) -> u16;

    fn store_preset(&mut self, slot: PresetSlot, record: &PresetRecord);
    fn load_preset(&mut self, slot: PresetSlot) -> Option<PresetRecord>;
    fn store_shared(&mut self, shared: &SharedState);
    fn load_shared(&mut self) -> Option<SharedState>;
    fn store_preset_index(&mut self, slot: PresetSlot);
    fn load_preset_index(&mut self) -> Option<PresetSlot>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_timer_ids_round_trip_rows() {
        for row in RowIndex::all() {
            assert_eq!(TimerId::gate(row).gate_row(), Some(row));
        }
        assert_eq!(TimerId::CLOCK.gate_row(), None);
        assert_eq!(TimerId(12).gate_row(), None);
    }
}
