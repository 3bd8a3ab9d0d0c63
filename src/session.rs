//! Session controller - the glue between inbound events and the engine
//!
//! Owns the sequencer, the clock and the session state (page, selection,
//! error indicator). Every inbound [`Event`] is handled to completion here,
//! and grid rendering reads the resulting state back out.

use crate::config::Settings;
use crate::host::{
    Event, Host, Peripheral, PulseKind, TimerId, B_BLINK, B_DIM, B_FULL, B_HALF, GRID_WIDTH,
};
use crate::preset::{PresetRecord, PresetSlot, SharedState, PRESET_SLOTS};
use crate::sequencer::playback::{self, speed_for_column, Playback};
use crate::sequencer::row::{GateLength, LogicOp, RowIndex, POSITION_OFFSET, STEPS};
use crate::sequencer::{EngineConfig, InputMode, Mode, Sequencer};

/// Number of visible blinks for a rejected input
pub const ERROR_BLINKS: u8 = 3;

const PRESET_ROW: u8 = 0;
const MODE_ROW: u8 = 2;
const INPUT_ROW: u8 = 3;
const SPEED_ROW: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Page {
    #[default]
    Main,
    Config,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    pub selected_row: RowIndex,
    pub selected_preset: PresetSlot,
    pub page: Page,
    pub error_row: Option<RowIndex>,
    /// Remaining blink half-periods; the error cell is lit on even counts
    pub error_blink_countdown: u8,
    preset_saved: bool,
}

impl Session {
    pub fn error_visible(&self) -> Option<RowIndex> {
        self.error_row
            .filter(|_| self.error_blink_countdown > 0 && self.error_blink_countdown % 2 == 0)
    }
}

pub struct Controller {
    seq: Sequencer,
    playback: Playback,
    session: Session,
    engine_config: EngineConfig,
    error_blink_ms: u32,
}

impl Controller {
    pub fn new(settings: &Settings) -> Self {
        let engine_config = settings.engine_config();
        Self {
            seq: Sequencer::new(engine_config, settings.reference_mode),
            playback: Playback::new(settings.timing()),
            session: Session::default(),
            engine_config,
            error_blink_ms: settings.error_blink_ms.max(1),
        }
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.seq
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    /// First boot: build the default preset and store it with the shared state
    pub fn init_presets(&mut self, host: &mut dyn Host) {
        let slot = PresetSlot::default();
        self.seq = Sequencer::new(self.engine_config, self.seq.reference_mode());
        host.store_preset(slot, &PresetRecord::capture(&self.seq));
        host.store_shared(&self.shared_state());
        host.store_preset_index(slot);
        self.session.selected_preset = slot;
        log::info!("Initialised default presets");
    }

    /// Load the last used preset and shared state, then start the clock
    pub fn init(&mut self, host: &mut dyn Host) {
        if let Some(shared) = host.load_shared() {
            self.playback.set_speed(shared.speed, host);
        }
        let slot = host.load_preset_index().unwrap_or_default();
        match host.load_preset(slot) {
            Some(record) => {
                record.apply(&mut self.seq);
                self.session.selected_preset = slot;
                log::info!("Loaded {}", slot);
            }
            None => self.init_presets(host),
        }
        self.playback.start(host);
        self.render_grid(host);
    }

    pub fn process_event(&mut self, event: Event, host: &mut dyn Host) {
        match event {
            Event::ClockPulse(kind) => self.clock_pulse(kind, host),
            Event::GridKey { x, y, pressed } => {
                if pressed {
                    self.grid_press(x, y, host);
                }
            }
            Event::GridKeyHeld { x, y } => self.grid_held(x, y, host),
            Event::FrontButton => self.toggle_page(host),
            Event::FrontButtonHeld => self.save_preset(host),
            Event::TimerFired(TimerId::ERROR) => self.error_timer(host),
            Event::TimerFired(id) => {
                if !self.playback.timer_fired(id, &mut self.seq, host) {
                    log::trace!("Ignoring unknown {}", id);
                }
                if id != TimerId::CLOCK {
                    return;
                }
            }
            Event::KnobSample(value) => {
                self.playback.knob_sample(value, host);
                return;
            }
            Event::Connected {
                peripheral,
                connected,
            } => {
                log::info!(
                    "{:?} {}",
                    peripheral,
                    if connected { "connected" } else { "disconnected" }
                );
                if peripheral != Peripheral::Grid || !connected {
                    return;
                }
            }
        }
        self.render_grid(host);
    }

    fn clock_pulse(&mut self, kind: PulseKind, host: &mut dyn Host) {
        match (kind, self.seq.input_mode()) {
            (PulseKind::Tick, InputMode::Clock) => {
                self.playback.tick(&mut self.seq, host);
            }
            (PulseKind::Rotate, InputMode::Rotate) => playback::rotate(&mut self.seq),
            (kind, mode) => log::trace!("Ignoring {:?} pulse in {:?} input mode", kind, mode),
        }
    }

    fn grid_press(&mut self, x: u8, y: u8, host: &mut dyn Host) {
        let Some(row) = RowIndex::new(y as usize) else {
            return;
        };
        match (self.session.page, self.seq.mode()) {
            (Page::Main, Mode::Logical) => self.logical_press(x, row, host),
            (Page::Main, Mode::Step) => {
                self.seq.cycle_step(row, x as usize);
            }
            (Page::Config, _) => self.config_press(x, y, host),
        }
    }

    fn grid_held(&mut self, x: u8, y: u8, host: &mut dyn Host) {
        match self.session.page {
            Page::Main => {
                if let Some(row) = RowIndex::new(y as usize) {
                    self.seq.set_step_length(row, x as usize + 1);
                }
            }
            Page::Config => {
                if y == PRESET_ROW {
                    if let Some(slot) = PresetSlot::new(x) {
                        self.session.selected_preset = slot;
                        self.save_preset(host);
                    }
                }
            }
        }
    }

    fn logical_press(&mut self, x: u8, row: RowIndex, host: &mut dyn Host) {
        if x == 0 {
            self.session.selected_row = row;
            return;
        }

        if let Some(op) = LogicOp::from_column(x) {
            let selected = self.session.selected_row;
            let current = self.seq.row(selected).logic;
            if current.op == op && current.target == Some(row) {
                self.seq.clear_logic(selected);
                return;
            }
            if let Err(e) = self.seq.assign_logic(selected, op, row) {
                log::warn!("Rejected {:?} from {} to {}: {}", op, selected, row, e);
                self.blink_error(row, host);
            }
            return;
        }

        if (POSITION_OFFSET..GRID_WIDTH).contains(&x) {
            if let Err(e) = self.seq.set_position(row, x) {
                log::warn!("Rejected position {} for {}: {}", x, row, e);
                self.blink_error(row, host);
            }
        }
    }

    fn config_press(&mut self, x: u8, y: u8, host: &mut dyn Host) {
        match y {
            PRESET_ROW => {
                if let Some(slot) = PresetSlot::new(x) {
                    self.load_preset(slot, host);
                }
            }
            MODE_ROW => {
                let mode = match x {
                    0 => Mode::Logical,
                    1 => Mode::Step,
                    _ => return,
                };
                if mode != self.seq.mode() {
                    self.seq.set_mode(mode);
                    self.clear_error(host);
                }
            }
            INPUT_ROW => match x {
                0 => self.seq.set_input_mode(InputMode::Clock),
                1 => self.seq.set_input_mode(InputMode::Rotate),
                _ => {}
            },
            SPEED_ROW => {
                self.playback.set_speed(speed_for_column(x), host);
                host.store_shared(&self.shared_state());
            }
            _ => {}
        }
    }

    fn toggle_page(&mut self, host: &mut dyn Host) {
        self.session.page = match self.session.page {
            Page::Main => Page::Config,
            Page::Config => Page::Main,
        };
        self.clear_error(host);
        log::debug!("Page {:?}", self.session.page);
    }

    fn load_preset(&mut self, slot: PresetSlot, host: &mut dyn Host) {
        self.session.selected_preset = slot;
        match host.load_preset(slot) {
            Some(record) => {
                record.apply(&mut self.seq);
                host.store_preset_index(slot);
                self.session.selected_row = RowIndex::FIRST;
                log::info!("Loaded {}", slot);
            }
            None => log::info!("{} is empty, keeping current rows", slot),
        }
        self.clear_error(host);
    }

    fn save_preset(&mut self, host: &mut dyn Host) {
        let slot = self.session.selected_preset;
        host.store_preset(slot, &PresetRecord::capture(&self.seq));
        host.store_shared(&self.shared_state());
        host.store_preset_index(slot);
        self.session.preset_saved = true;
        log::info!("Saved {}", slot);
    }

    fn shared_state(&self) -> SharedState {
        SharedState {
            speed: self.playback.speed(),
        }
    }

    fn blink_error(&mut self, row: RowIndex, host: &mut dyn Host) {
        self.session.error_row = Some(row);
        self.session.error_blink_countdown = ERROR_BLINKS * 2;
        host.arm_timer(TimerId::ERROR, self.error_blink_ms, true);
    }

    fn error_timer(&mut self, host: &mut dyn Host) {
        self.session.error_blink_countdown = self.session.error_blink_countdown.saturating_sub(1);
        if self.session.error_blink_countdown == 0 {
            self.clear_error(host);
        }
        self.render_grid(host);
    }

    fn clear_error(&mut self, host: &mut dyn Host) {
        if self.session.error_row.take().is_some() {
            host.cancel_timer(TimerId::ERROR);
        }
        self.session.error_blink_countdown = 0;
    }

    /// Draw the current page. Clears row blink flags even without a grid.
    pub fn render_grid(&mut self, host: &mut dyn Host) {
        let blinks = self.seq.take_blinks();
        if !host.is_grid_connected() {
            return;
        }

        host.clear_grid();
        if std::mem::take(&mut self.session.preset_saved) {
            for (y, row) in self.seq.rows().iter().enumerate() {
                host.set_grid_led(row.position, y as u8, B_DIM);
            }
            host.refresh_grid();
            return;
        }

        match (self.session.page, self.seq.mode()) {
            (Page::Main, Mode::Logical) => self.render_logical(&blinks, host),
            (Page::Main, Mode::Step) => self.render_steps(&blinks, host),
            (Page::Config, _) => self.render_config(host),
        }
        host.refresh_grid();
    }

    fn render_logical(&self, blinks: &[bool], host: &mut dyn Host) {
        let selected = self.seq.row(self.session.selected_row);
        host.set_grid_led(0, self.session.selected_row.get() as u8, B_HALF);
        for (y, row) in self.seq.rows().iter().enumerate() {
            let y = y as u8;
            for op in [LogicOp::And, LogicOp::Or, LogicOp::Xor] {
                let active = selected.logic.op == op
                    && selected.logic.target.map(|t| t.get() as u8) == Some(y);
                let x = op.column().unwrap_or(1);
                host.set_grid_led(x, y, if active { B_HALF } else { B_DIM });
            }
            let level = if blinks[y as usize] { B_BLINK } else { B_HALF };
            host.set_grid_led(row.position, y, level);
        }
        if let Some(row) = self.session.error_visible() {
            host.set_grid_led(1, row.get() as u8, B_FULL);
        }
    }

    fn render_steps(&self, blinks: &[bool], host: &mut dyn Host) {
        for (y, row) in self.seq.rows().iter().enumerate() {
            let playhead = row.ticker as usize % STEPS;
            for (x, cell) in row.steps.iter().enumerate().take(row.pattern_length as usize) {
                let level = match cell.gate {
                    GateLength::Off => 0,
                    GateLength::Short => B_HALF,
                    GateLength::Long => B_FULL,
                };
                let level = if x == playhead {
                    if blinks[y] { B_BLINK } else { level.max(B_DIM) }
                } else {
                    level
                };
                host.set_grid_led(x as u8, y as u8, level);
            }
        }
    }

    fn render_config(&self, host: &mut dyn Host) {
        for x in 0..PRESET_SLOTS {
            let level = if x == self.session.selected_preset.get() { B_HALF } else { B_DIM };
            host.set_grid_led(x, PRESET_ROW, level);
        }

        let mode_x = match self.seq.mode() {
            Mode::Logical => 0,
            Mode::Step => 1,
        };
        let input_x = match self.seq.input_mode() {
            InputMode::Clock => 0,
            InputMode::Rotate => 1,
        };
        for x in 0..2 {
            host.set_grid_led(x, MODE_ROW, if x == mode_x { B_HALF } else { B_DIM });
            host.set_grid_led(x, INPUT_ROW, if x == input_x { B_HALF } else { B_DIM });
        }

        let speed = self.playback.speed();
        for x in 0..GRID_WIDTH {
            if speed_for_column(x) <= speed {
                host.set_grid_led(x, SPEED_ROW, B_DIM);
            }
        }
    }
}
