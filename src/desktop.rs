//! Desktop host - emulates the module's hardware on a workstation
//!
//! Timers are kept in a deadline table and fired one at a time from the
//! caller's loop, so the engine still sees a single-threaded stream of
//! events. Gates go out over MIDI and to the audio monitor; the grid is an
//! LED buffer the GUI draws from.

use crate::audio::AudioOutput;
use crate::host::{Host, TimerId, GRID_HEIGHT, GRID_WIDTH};
use crate::midi::MidiGateOutput;
use crate::preset::{FilePresetStore, PresetRecord, PresetSlot, SharedState};
use crate::sequencer::row::{RowIndex, ROWS};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub type LedBuffer = [[u8; GRID_WIDTH as usize]; GRID_HEIGHT as usize];

#[derive(Debug, Clone, Copy)]
struct Timer {
    due: Instant,
    period: Option<Duration>,
}

pub struct DesktopHost {
    timers: BTreeMap<TimerId, Timer>,
    leds: LedBuffer,
    gates: [bool; ROWS],
    clock_output: bool,
    grid_connected: bool,
    knob: Option<u16>,
    store: FilePresetStore,
    midi: MidiGateOutput,
    audio: AudioOutput,
}

impl DesktopHost {
    pub fn new(store: FilePresetStore, midi: MidiGateOutput, audio: AudioOutput) -> Self {
        Self {
            timers: BTreeMap::new(),
            leds: [[0; GRID_WIDTH as usize]; GRID_HEIGHT as usize],
            gates: [false; ROWS],
            clock_output: false,
            grid_connected: true,
            knob: None,
            store,
            midi,
            audio,
        }
    }

    /// Remove and return the earliest timer due at `now`, rescheduling it if periodic.
    /// Call repeatedly until it returns `None`.
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerId> {
        let (&id, _) = self
            .timers
            .iter()
            .filter(|(_, t)| t.due <= now)
            .min_by_key(|(_, t)| t.due)?;

        let timer = self.timers.remove(&id)?;
        if let Some(period) = timer.period {
            let mut due = timer.due + period;
            if due <= now {
                // skip missed periods rather than bursting
                due = now + period;
            }
            self.timers.insert(id, Timer { due, period: Some(period) });
        }
        Some(id)
    }

    /// Earliest pending deadline, for sleeping or scheduling a repaint
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|t| t.due).min()
    }

    pub fn leds(&self) -> &LedBuffer {
        &self.leds
    }

    pub fn gates(&self) -> &[bool; ROWS] {
        &self.gates
    }

    pub fn clock_output(&self) -> bool {
        self.clock_output
    }

    pub fn set_knob(&mut self, value: u16) {
        self.knob = Some(value);
    }

    pub fn set_grid_connected(&mut self, connected: bool) {
        self.grid_connected = connected;
    }

    pub fn midi_mut(&mut self) -> &mut MidiGateOutput {
        &mut self.midi
    }

    pub fn midi(&self) -> &MidiGateOutput {
        &self.midi
    }

    fn arm_at(&mut self, id: TimerId, now: Instant, delay_ms: u32, repeat: bool) {
        let delay = Duration::from_millis(delay_ms as u64);
        let timer = Timer {
            due: now + delay,
            period: repeat.then_some(delay),
        };
        self.timers.insert(id, timer);
    }
}

impl Host for DesktopHost {
    fn arm_timer(&mut self, id: TimerId, delay_ms: u32, repeat: bool) {
        self.arm_at(id, Instant::now(), delay_ms, repeat);
    }

    fn cancel_timer(&mut self, id: TimerId) {
        self.timers.remove(&id);
    }

    fn set_gate(&mut self, row: RowIndex, high: bool) {
        self.gates[row.get()] = high;
        self.audio.set_gate(row, high);
        if let Err(e) = self.midi.send_gate(row, high) {
            log::warn!("MIDI: {}", e);
        }
    }

    fn set_clock_output(&mut self, high: bool) {
        self.clock_output = high;
    }

    fn is_grid_connected(&self) -> bool {
        self.grid_connected
    }

    fn clear_grid(&mut self) {
        self.leds = [[0; GRID_WIDTH as usize]; GRID_HEIGHT as usize];
    }

    fn set_grid_led(&mut self, x: u8, y: u8, level: u8) {
        if let Some(cell) = self
            .leds
            .get_mut(y as usize)
            .and_then(|row| row.get_mut(x as usize))
        {
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
        if let Err(e) = self.store.store_preset(slot, record) {
            log::warn!("Failed to store {}: {}", slot, e);
        }
    }

    fn load_preset(&mut self, slot: PresetSlot) -> Option<PresetRecord> {
        self.store.load_preset(slot).unwrap_or_else(|e| {
            log::warn!("Failed to load {}: {}", slot, e);
            None
        })
    }

    fn store_shared(&mut self, shared: &SharedState) {
        if let Err(e) = self.store.store_shared(shared) {
            log::warn!("Failed to store shared state: {}", e);
        }
    }

    fn load_shared(&mut self) -> Option<SharedState> {
        self.store.load_shared().unwrap_or_else(|e| {
            log::warn!("Failed to load shared state: {}", e);
            None
        })
    }

    fn store_preset_index(&mut self, slot: PresetSlot) {
        if let Err(e) = self.store.store_index(slot) {
            log::warn!("Failed to store preset index: {}", e);
        }
    }

    fn load_preset_index(&mut self) -> Option<PresetSlot> {
        self.store.load_index().unwrap_or_else(|e| {
            log::warn!("Failed to load preset index: {}", e);
            None
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::host::Event;
    use crate::session::Controller;

    fn host(dir: &std::path::Path) -> DesktopHost {
        DesktopHost::new(
            FilePresetStore::new(dir),
            MidiGateOutput::default(),
            AudioOutput::silent(),
        )
    }

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = host(dir.path());
        let now = Instant::now();
        host.arm_at(TimerId::CLOCK, now, 20, false);
        host.arm_at(TimerId::CLOCK_OUT, now, 10, false);
        host.arm_at(TimerId::ERROR, now, 50, false);

        let later = now + Duration::from_millis(30);
        assert_eq!(host.pop_due(later), Some(TimerId::CLOCK_OUT));
        assert_eq!(host.pop_due(later), Some(TimerId::CLOCK));
        assert_eq!(host.pop_due(later), None);
        assert_eq!(host.next_deadline(), Some(now + Duration::from_millis(50)));
    }

    #[test]
    fn test_periodic_timer_reschedules() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = host(dir.path());
        let now = Instant::now();
        host.arm_at(TimerId::CLOCK, now, 100, true);

        assert_eq!(host.pop_due(now + Duration::from_millis(100)), Some(TimerId::CLOCK));
        assert_eq!(host.pop_due(now + Duration::from_millis(150)), None);
        assert_eq!(host.next_deadline(), Some(now + Duration::from_millis(200)));

        // far behind: no burst of catch-up ticks
        let late = now + Duration::from_millis(1000);
        assert_eq!(host.pop_due(late), Some(TimerId::CLOCK));
        assert_eq!(host.pop_due(late), None);
    }

    #[test]
    fn test_rearm_restarts_and_cancel_removes() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = host(dir.path());
        let now = Instant::now();
        let gate = TimerId::gate(RowIndex::new(0).unwrap());
        host.arm_at(gate, now, 10, false);
        host.arm_at(gate, now + Duration::from_millis(8), 10, false);
        assert_eq!(host.pop_due(now + Duration::from_millis(12)), None);
        assert_eq!(host.pop_due(now + Duration::from_millis(18)), Some(gate));

        host.arm_at(gate, now, 10, false);
        host.cancel_timer(gate);
        assert_eq!(host.next_deadline(), None);
    }

    #[test]
    fn test_controller_runs_against_desktop_host() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = host(dir.path());
        let mut controller = Controller::new(&Settings::default());
        controller.init(&mut host);
        assert!(dir.path().join("preset-0.yaml").exists());

        controller.process_event(Event::TimerFired(TimerId::CLOCK), &mut host);
        assert!(host.gates()[0]);
        assert!(host.clock_output());
        assert!(host.leds().iter().any(|row| row.iter().any(|&l| l > 0)));

        let gate = TimerId::gate(RowIndex::new(0).unwrap());
        controller.process_event(Event::TimerFired(gate), &mut host);
        assert!(!host.gates()[0]);
    }
}
