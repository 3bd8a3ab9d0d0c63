/// Core engine state - the eight rows, their configuration and the
/// validate-then-propagate mutation pipeline
use serde::{Deserialize, Serialize};

pub mod graph;
pub mod pattern;
pub mod playback;
pub mod row;
pub mod step;

use crate::error::LogicError;
use graph::{RowStack, Targets};
use pattern::{combine, pattern};
use row::{division_for, Logic, LogicOp, Row, RowIndex, DEFAULT_DIVISIONS, DIVISIONS, ROWS, STEPS};

/// How a row's trigger is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Logical,
    Step,
}

/// How an external clock pulse is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    #[default]
    Clock,
    Rotate,
}

/// Whether logic references may chain through rows that reference others
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceMode {
    /// Targets must be anchors; a row combines with its target's base pattern
    #[default]
    Single,
    /// Targets may reference further rows; a row combines with its target's effective pattern
    Nested,
}

/// Per-preset engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub mode: Mode,
    pub input_mode: InputMode,
    pub divisions: [u8; DIVISIONS],
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Logical,
            input_mode: InputMode::Clock,
            divisions: DEFAULT_DIVISIONS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sequencer {
    rows: [Row; ROWS],
    config: EngineConfig,
    reference_mode: ReferenceMode,
    master_tick: u64,
}

impl Sequencer {
    pub fn new(config: EngineConfig, reference_mode: ReferenceMode) -> Self {
        let rows = std::array::from_fn(|i| {
            let index = RowIndex::new(i).unwrap_or(RowIndex::FIRST);
            Row::default_for(index, &config.divisions)
        });
        let mut seq = Self {
            rows,
            config,
            reference_mode,
            master_tick: 0,
        };
        if config.mode == Mode::Step {
            seq.reset_pattern_state();
        }
        seq
    }

    pub fn rows(&self) -> &[Row; ROWS] {
        &self.rows
    }

    pub fn row(&self, row: RowIndex) -> &Row {
        &self.rows[row.get()]
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    pub fn input_mode(&self) -> InputMode {
        self.config.input_mode
    }

    pub fn set_input_mode(&mut self, input_mode: InputMode) {
        self.config.input_mode = input_mode;
    }

    pub fn reference_mode(&self) -> ReferenceMode {
        self.reference_mode
    }

    /// Number of master ticks processed since the last reset
    pub fn master_tick(&self) -> u64 {
        self.master_tick
    }

    pub fn targets(&self) -> Targets {
        std::array::from_fn(|i| self.rows[i].logic.active_target())
    }

    /// Switch between Logical and Step mode. Wipes all row pattern state.
    pub fn set_mode(&mut self, mode: Mode) {
        self.config.mode = mode;
        self.reset_pattern_state();
        log::debug!("Mode switched to {:?}, row pattern state reset", mode);
    }

    fn reset_pattern_state(&mut self) {
        let divisions = self.config.divisions;
        self.master_tick = 0;
        for row in &mut self.rows {
            row.clear_pattern_state();
            row.division = division_for(&divisions, row.position);
            row.pattern_length = match self.config.mode {
                Mode::Logical => row.division as u64,
                Mode::Step => STEPS as u64,
            };
            row.ticker = row.pattern_length - 1;
        }
    }

    /// Move a row to a new division position and recompute everything that depends on it
    pub fn set_position(&mut self, row: RowIndex, position: u8) -> Result<(), LogicError> {
        let order = graph::propagation_order(&self.targets(), row)?;
        let r = &mut self.rows[row.get()];
        r.position = position;
        r.division = division_for(&self.config.divisions, position);
        self.apply_order(order);
        log::debug!("{} moved to position {} (division {})", row, position, self.row(row).division);
        Ok(())
    }

    /// Validate and commit a logic reference. On error nothing is changed.
    pub fn assign_logic(
        &mut self,
        row: RowIndex,
        op: LogicOp,
        target: RowIndex,
    ) -> Result<(), LogicError> {
        if op == LogicOp::None {
            self.clear_logic(row);
            return Ok(());
        }
        graph::validate(&self.targets(), self.reference_mode, row, target)?;

        let mut targets = self.targets();
        targets[row.get()] = Some(target);
        let order = graph::propagation_order(&targets, row)?;

        self.rows[row.get()].logic = Logic::new(op, target);
        self.apply_order(order);
        log::debug!(
            "{} now {:?} {} (length {})",
            row,
            op,
            target,
            self.row(row).pattern_length
        );
        Ok(())
    }

    /// Drop a row's logic reference. Always allowed.
    pub fn clear_logic(&mut self, row: RowIndex) {
        self.rows[row.get()].logic = Logic::NONE;
        let targets = self.targets();
        let order = graph::propagation_order(&targets, row)
            .unwrap_or_else(|_| graph::full_order(&targets));
        self.apply_order(order);
    }

    /// Recompute every row from its position and logic, ignoring any incremental state
    pub fn recompute_all(&mut self) {
        if self.mode() == Mode::Step {
            return;
        }
        let order = graph::full_order(&self.targets());
        self.apply_order(order);
    }

    fn apply_order(&mut self, mut order: RowStack) {
        if self.mode() == Mode::Step {
            return;
        }
        while let Some(row) = order.pop() {
            self.recompute_row(row);
        }
    }

    fn recompute_row(&mut self, row: RowIndex) {
        let divisions = self.config.divisions;
        let master_tick = self.master_tick;
        let length = {
            let r = &mut self.rows[row.get()];
            r.division = division_for(&divisions, r.position);
            r.division as u64
        };
        let length = match self.rows[row.get()].logic.active_target() {
            None => length,
            Some(target) => {
                let other = match self.reference_mode {
                    ReferenceMode::Single => self.rows[target.get()].division as u64,
                    ReferenceMode::Nested => self.rows[target.get()].pattern_length,
                };
                length.saturating_mul(other)
            }
        };
        let r = &mut self.rows[row.get()];
        r.pattern_length = length.max(1);
        r.ticker = (master_tick + r.pattern_length - 1) % r.pattern_length;
    }

    /// Whether `row` fires at phase `tick` of its logical-mode cycle
    pub fn fires_at(&self, row: RowIndex, tick: u64) -> bool {
        self.fires_at_depth(row, tick, 0)
    }

    fn fires_at_depth(&self, row: RowIndex, tick: u64, depth: usize) -> bool {
        let r = &self.rows[row.get()];
        let own = pattern(r.division, tick);
        let Some(target) = r.logic.active_target() else {
            return own;
        };
        let other = match self.reference_mode {
            ReferenceMode::Single => pattern(self.rows[target.get()].division, tick),
            ReferenceMode::Nested if depth + 1 < ROWS => {
                self.fires_at_depth(target, tick, depth + 1)
            }
            ReferenceMode::Nested => pattern(self.rows[target.get()].division, tick),
        };
        combine(r.logic.op, own, other)
    }

    /// Advance every row's ticker by one and report which rows fire
    pub fn advance(&mut self) -> [bool; ROWS] {
        self.master_tick += 1;
        let mut fired = [false; ROWS];
        for row in RowIndex::all() {
            let r = &mut self.rows[row.get()];
            r.ticker = (r.ticker + 1) % r.pattern_length.max(1);
            let ticker = r.ticker;
            fired[row.get()] = match self.config.mode {
                Mode::Logical => self.fires_at(row, ticker),
                Mode::Step => self.rows[row.get()].steps[ticker as usize % STEPS].active,
            };
        }
        fired
    }

    pub fn set_blink(&mut self, row: RowIndex) {
        self.rows[row.get()].blink = true;
    }

    /// Read and reset the blink flags set since the last render pass
    pub fn take_blinks(&mut self) -> [bool; ROWS] {
        std::array::from_fn(|i| std::mem::take(&mut self.rows[i].blink))
    }

    /// Replace the whole row and config state, e.g. on preset load
    pub fn load(&mut self, config: EngineConfig, rows: [Row; ROWS]) {
        self.config = config;
        self.rows = rows;
        self.master_tick = 0;
        self.drop_invalid_references();
        match self.mode() {
            Mode::Logical => self.recompute_all(),
            Mode::Step => {
                for r in &mut self.rows {
                    r.pattern_length = r.pattern_length.clamp(1, STEPS as u64);
                    r.ticker = r.pattern_length - 1;
                }
            }
        }
    }

    fn drop_invalid_references(&mut self) {
        let requested: [Logic; ROWS] = std::array::from_fn(|i| self.rows[i].logic);
        for r in &mut self.rows {
            r.logic = Logic::NONE;
        }
        for row in RowIndex::all() {
            let logic = requested[row.get()];
            let Some(target) = logic.active_target() else {
                continue;
            };
            match graph::validate(&self.targets(), self.reference_mode, row, target) {
                Ok(()) => self.rows[row.get()].logic = logic,
                Err(e) => log::warn!("Dropping stored reference {} -> {}: {}", row, target, e),
            }
        }
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [Row; ROWS] {
        &mut self.rows
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new(EngineConfig::default(), ReferenceMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn r(i: usize) -> RowIndex {
        RowIndex::new(i).unwrap()
    }

    /// Set row `i` to the position whose division is `division` in the default table
    fn position_of(division: u8) -> u8 {
        let index = DEFAULT_DIVISIONS.iter().position(|&d| d == division).unwrap();
        row::position_for_index(index)
    }

    #[test]
    fn test_default_sequencer() {
        let seq = Sequencer::default();
        assert_eq!(seq.mode(), Mode::Logical);
        assert_eq!(seq.input_mode(), InputMode::Clock);
        for (i, row) in seq.rows().iter().enumerate() {
            assert_eq!(row.division as usize, i + 1);
            assert_eq!(row.pattern_length, row.division as u64);
        }
    }

    #[test]
    fn test_default_rows_fire_on_their_division() {
        let mut seq = Sequencer::default();
        let mut fired = vec![Vec::new(); ROWS];
        for tick in 0..128u64 {
            for (i, f) in seq.advance().iter().enumerate() {
                if *f {
                    fired[i].push(tick);
                }
            }
        }
        assert_eq!(fired[0], (0..128).collect::<Vec<_>>());
        assert_eq!(fired[7], (0..16).map(|k| k * 8 + 7).collect::<Vec<_>>());
    }

    #[test]
    fn test_and_reference_fires_on_common_ticks() {
        let mut seq = Sequencer::default();
        seq.set_position(r(2), position_of(3)).unwrap();
        seq.set_position(r(5), position_of(4)).unwrap();
        seq.assign_logic(r(2), LogicOp::And, r(5)).unwrap();
        assert_eq!(seq.row(r(2)).pattern_length, 12);

        assert!(seq.fires_at(r(2), 11));
        assert!(!seq.fires_at(r(2), 2));
        assert!(!seq.fires_at(r(2), 3));

        let mut fired = Vec::new();
        for tick in 0..24u64 {
            if seq.advance()[2] {
                fired.push(tick);
            }
        }
        assert_eq!(fired, vec![11, 23]);
    }

    #[test]
    fn test_rejected_assignment_leaves_rows_untouched() {
        let mut seq = Sequencer::default();
        seq.assign_logic(r(1), LogicOp::Or, r(4)).unwrap();
        let before = seq.rows().clone();

        assert_eq!(
            seq.assign_logic(r(4), LogicOp::And, r(1)),
            Err(LogicError::CircularReference)
        );
        assert_eq!(seq.assign_logic(r(3), LogicOp::Xor, r(3)), Err(LogicError::SelfReference));
        assert_eq!(seq.rows(), &before);
    }

    #[test]
    fn test_capacity_rule() {
        let mut seq = Sequencer::default();
        for i in 0..6 {
            seq.assign_logic(r(i), LogicOp::Or, r(7)).unwrap();
        }
        assert_eq!(
            seq.assign_logic(r(6), LogicOp::Or, r(7)),
            Err(LogicError::CapacityExceeded)
        );
    }

    #[test]
    fn test_division_change_propagates_to_referencing_rows() {
        let mut seq = Sequencer::default();
        seq.assign_logic(r(0), LogicOp::Or, r(3)).unwrap();
        assert_eq!(seq.row(r(0)).pattern_length, 4);
        seq.set_position(r(3), position_of(6)).unwrap();
        assert_eq!(seq.row(r(0)).pattern_length, 6);
    }

    #[test]
    fn test_nested_lengths_chain() {
        let mut seq = Sequencer::new(EngineConfig::default(), ReferenceMode::Nested);
        seq.assign_logic(r(1), LogicOp::Or, r(2)).unwrap();
        seq.assign_logic(r(0), LogicOp::Or, r(1)).unwrap();
        // divisions 1, 2, 3
        assert_eq!(seq.row(r(1)).pattern_length, 6);
        assert_eq!(seq.row(r(0)).pattern_length, 6);
        assert_eq!(
            seq.assign_logic(r(2), LogicOp::And, r(0)),
            Err(LogicError::CircularReference)
        );

        seq.set_position(r(2), position_of(5)).unwrap();
        assert_eq!(seq.row(r(1)).pattern_length, 10);
        assert_eq!(seq.row(r(0)).pattern_length, 10);
    }

    #[test]
    fn test_mode_switch_resets_pattern_state() {
        let mut seq = Sequencer::default();
        seq.assign_logic(r(0), LogicOp::And, r(1)).unwrap();
        seq.set_mode(Mode::Step);
        assert!(seq.rows().iter().all(|row| !row.is_referencing()));
        assert!(seq.rows().iter().all(|row| row.pattern_length == STEPS as u64));
        seq.set_mode(Mode::Logical);
        assert_eq!(seq.row(r(3)).pattern_length, 4);
    }

    #[test]
    fn test_load_drops_cyclic_references() {
        let mut seq = Sequencer::default();
        let mut rows = seq.rows().clone();
        rows[0].logic = Logic::new(LogicOp::And, r(1));
        rows[1].logic = Logic::new(LogicOp::And, r(0));
        seq.load(EngineConfig::default(), rows);
        let referencing = seq.rows().iter().filter(|row| row.is_referencing()).count();
        assert_eq!(referencing, 1);
        assert!(graph::check_cycle(&seq.targets(), r(0)).is_ok());
    }

    fn arb_action() -> impl Strategy<Value = (bool, usize, usize, u8)> {
        (any::<bool>(), 0..ROWS, 0..ROWS, 0u8..4)
    }

    proptest! {
        #[test]
        fn incremental_matches_full_recompute(
            nested in any::<bool>(),
            actions in prop::collection::vec(arb_action(), 1..40),
            ticks in 0u64..50,
        ) {
            let mode = if nested { ReferenceMode::Nested } else { ReferenceMode::Single };
            let mut seq = Sequencer::new(EngineConfig::default(), mode);
            for _ in 0..ticks {
                seq.advance();
            }
            for (is_logic, a, b, op) in actions {
                if is_logic {
                    let op = match op {
                        0 => LogicOp::None,
                        1 => LogicOp::And,
                        2 => LogicOp::Or,
                        _ => LogicOp::Xor,
                    };
                    let _ = seq.assign_logic(r(a), op, r(b));
                } else {
                    seq.set_position(r(a), 4 + (b as u8 + op) % 12).unwrap();
                }
            }
            let mut fresh = seq.clone();
            fresh.recompute_all();
            prop_assert_eq!(seq.rows(), fresh.rows());
            prop_assert!(seq.rows().iter().filter(|row| row.is_referencing()).count() <= row::MAX_REFERENCES);
        }
    }
}
