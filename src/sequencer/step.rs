/// Step mode - explicit 16-slot patterns with ticker phase alignment
use super::row::{GateLength, RowIndex, StepCell, STEPS};
use super::{Mode, Sequencer};

impl Sequencer {
    /// Advance a step slot Off -> Short -> Long -> Off and return its new state
    pub fn cycle_step(&mut self, row: RowIndex, slot: usize) -> Option<StepCell> {
        if self.mode() != Mode::Step {
            return None;
        }
        let cell = self.rows_mut()[row.get()].steps.get_mut(slot)?;
        cell.cycle();
        Some(*cell)
    }

    pub fn step_cell(&self, row: RowIndex, slot: usize) -> StepCell {
        self.row(row).steps.get(slot).copied().unwrap_or_default()
    }

    /// Gate length stored at the slot the row's ticker currently points to
    pub fn current_gate(&self, row: RowIndex) -> GateLength {
        let r = self.row(row);
        r.steps[r.ticker as usize % STEPS].gate
    }

    /// Set how many slots a step-mode row cycles through, then realign its ticker
    pub fn set_step_length(&mut self, row: RowIndex, length: usize) -> bool {
        if self.mode() != Mode::Step || length == 0 || length > STEPS {
            return false;
        }
        let length = length as u64;
        if self.row(row).pattern_length == length {
            return false;
        }
        self.rows_mut()[row.get()].pattern_length = length;
        self.realign_ticker(row);
        log::debug!("{} step length now {}", row, length);
        true
    }

    /// Phase-lock `row` to another row: one with the same length if any,
    /// otherwise the one with the closest larger length.
    pub fn realign_ticker(&mut self, row: RowIndex) {
        let length = self.row(row).pattern_length.max(1);
        let others = || RowIndex::all().filter(move |&r| r != row);

        let same = others().find(|&r| self.row(r).pattern_length == length);
        let larger = others()
            .filter(|&r| self.row(r).pattern_length > length)
            .min_by_key(|&r| self.row(r).pattern_length);

        let ticker = match same.or(larger) {
            Some(source) => self.row(source).ticker,
            None => self.row(row).ticker,
        };
        self.rows_mut()[row.get()].ticker = ticker % length;
    }
}
