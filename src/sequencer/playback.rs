/// Clock and timing - master tick, speed, gate auto-off and rotate mode
use super::row::{GateLength, RowIndex, ROWS};
use super::{Mode, Sequencer};
use crate::host::{Host, TimerId};

/// Slowest tick rate, ticks per minute
pub const MIN_SPEED: u32 = 20;
/// Fastest tick rate, ticks per minute
pub const MAX_SPEED: u32 = 2000;
/// Rate used until a knob sample or stored speed says otherwise
pub const DEFAULT_SPEED: u32 = 600;
/// Knob poll period
pub const SPEED_POLL_MS: u32 = 4;

/// Durations the clock controller needs, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Gate width in logical mode and for `Short` steps
    pub trigger_ms: u32,
    /// Width of the auxiliary clock pulse
    pub clock_out_ms: u32,
    /// Minimum knob movement accepted as a new sample
    pub knob_threshold: u16,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            trigger_ms: 10,
            clock_out_ms: 10,
            knob_threshold: 256,
        }
    }
}

/// Tick interval in milliseconds for a requested rate
pub fn interval_ms(rate: u32) -> u32 {
    60_000 / rate.clamp(MIN_SPEED, MAX_SPEED)
}

/// Map a 16-bit knob sample onto the speed range
pub fn speed_from_knob(value: u16) -> u32 {
    ((value as u32 * (MAX_SPEED - MIN_SPEED)) >> 16) + MIN_SPEED
}

/// Map a grid column (0-15) onto the speed range
pub fn speed_for_column(x: u8) -> u32 {
    MIN_SPEED + x.min(15) as u32 * (MAX_SPEED - MIN_SPEED) / 15
}

pub struct Playback {
    speed: u32,
    last_knob: Option<u16>,
    timing: Timing,
}

impl Playback {
    pub fn new(timing: Timing) -> Self {
        Self {
            speed: DEFAULT_SPEED,
            last_knob: None,
            timing,
        }
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    pub fn interval_ms(&self) -> u32 {
        interval_ms(self.speed)
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Arm the master tick and the knob poll
    pub fn start(&mut self, host: &mut dyn Host) {
        host.arm_timer(TimerId::CLOCK, self.interval_ms(), true);
        host.arm_timer(TimerId::SPEED, SPEED_POLL_MS, true);
        log::info!("Clock running at {} ticks/min", self.speed);
    }

    /// Clamp and apply a new tick rate, reprogramming the master tick timer
    pub fn set_speed(&mut self, rate: u32, host: &mut dyn Host) -> u32 {
        let rate = rate.clamp(MIN_SPEED, MAX_SPEED);
        if rate != self.speed {
            self.speed = rate;
            host.arm_timer(TimerId::CLOCK, self.interval_ms(), true);
            log::debug!("Speed {} ticks/min ({} ms)", rate, self.interval_ms());
        }
        rate
    }

    /// Feed a knob sample; changes smaller than the threshold are ignored.
    /// Returns whether the sample was accepted.
    pub fn knob_sample(&mut self, value: u16, host: &mut dyn Host) -> bool {
        if let Some(last) = self.last_knob {
            if last.abs_diff(value) < self.timing.knob_threshold {
                return false;
            }
        }
        self.last_knob = Some(value);
        self.set_speed(speed_from_knob(value), host);
        true
    }

    /// Periodic poll of the first knob, if the host has one
    pub fn poll_knob(&mut self, host: &mut dyn Host) -> bool {
        if host.knob_count() == 0 {
            return false;
        }
        let value = host.knob_value(0);
        self.knob_sample(value, host)
    }

    /// One master tick: pulse the clock output, advance every row, fire gates
    pub fn tick(&mut self, seq: &mut Sequencer, host: &mut dyn Host) -> [bool; ROWS] {
        host.arm_timer(TimerId::CLOCK_OUT, self.timing.clock_out_ms, false);
        host.set_clock_output(true);

        let fired = seq.advance();
        for row in RowIndex::all().filter(|r| fired[r.get()]) {
            let width = self.gate_width(seq, row);
            fire_gate(seq, row, width, host);
        }
        log::trace!("Tick {} fired {:?}", seq.master_tick(), fired);
        fired
    }

    fn gate_width(&self, seq: &Sequencer, row: RowIndex) -> u32 {
        match (seq.mode(), seq.current_gate(row)) {
            (Mode::Step, GateLength::Long) => {
                (self.interval_ms() * 3 / 4).max(self.timing.trigger_ms)
            }
            _ => self.timing.trigger_ms,
        }
    }

    /// Route a fired timer that belongs to the clock. Returns false for foreign ids.
    pub fn timer_fired(&mut self, id: TimerId, seq: &mut Sequencer, host: &mut dyn Host) -> bool {
        match id {
            TimerId::CLOCK => {
                self.tick(seq, host);
            }
            TimerId::SPEED => {
                self.poll_knob(host);
            }
            TimerId::CLOCK_OUT => host.set_clock_output(false),
            _ => match id.gate_row() {
                Some(row) => host.set_gate(row, false),
                None => return false,
            },
        }
        true
    }
}

impl Default for Playback {
    fn default() -> Self {
        Self::new(Timing::default())
    }
}

/// Raise a row's gate and (re-)arm its auto-off timer
fn fire_gate(seq: &mut Sequencer, row: RowIndex, width_ms: u32, host: &mut dyn Host) {
    host.arm_timer(TimerId::gate(row), width_ms, false);
    host.set_gate(row, true);
    seq.set_blink(row);
}

/// Circular shift of (position, division, pattern length): row i takes row i+1's
pub fn rotate(seq: &mut Sequencer) {
    let rows = seq.rows_mut();
    let first = (rows[0].position, rows[0].division, rows[0].pattern_length);
    for i in 0..ROWS - 1 {
        rows[i].position = rows[i + 1].position;
        rows[i].division = rows[i + 1].division;
        rows[i].pattern_length = rows[i + 1].pattern_length;
    }
    let last = &mut rows[ROWS - 1];
    (last.position, last.division, last.pattern_length) = first;

    match seq.mode() {
        Mode::Logical => seq.recompute_all(),
        Mode::Step => {
            for row in RowIndex::all() {
                seq.realign_ticker(row);
            }
        }
    }
    log::trace!("Rotated row assignments");
}
