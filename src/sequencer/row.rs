/// Row store types - one row per gate output
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of gate channels
pub const ROWS: usize = 8;

/// Slots in a step-mode row
pub const STEPS: usize = 16;

/// Entries in a division lookup table
pub const DIVISIONS: usize = 12;

/// Grid column of the first division position
pub const POSITION_OFFSET: u8 = 4;

/// At most this many rows may carry a logic reference at once
pub const MAX_REFERENCES: usize = ROWS - 2;

pub const DEFAULT_DIVISIONS: [u8; DIVISIONS] = [128, 64, 32, 16, 8, 7, 6, 5, 4, 3, 2, 1];

/// Index of a row, always `< ROWS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct RowIndex(u8);

impl RowIndex {
    pub const FIRST: RowIndex = RowIndex(0);

    pub fn new(index: usize) -> Option<Self> {
        (index < ROWS).then(|| RowIndex(index as u8))
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = RowIndex> {
        (0..ROWS as u8).map(RowIndex)
    }

    /// The row after this one, wrapping around to row 0
    pub fn next(self) -> RowIndex {
        RowIndex((self.0 + 1) % ROWS as u8)
    }
}

impl Default for RowIndex {
    fn default() -> Self {
        RowIndex::FIRST
    }
}

impl fmt::Display for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}", self.0)
    }
}

impl TryFrom<u8> for RowIndex {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        RowIndex::new(value as usize).ok_or_else(|| format!("row index {} out of range", value))
    }
}

impl From<RowIndex> for u8 {
    fn from(index: RowIndex) -> u8 {
        index.0
    }
}

/// Boolean operator applied between a row and the row it references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicOp {
    #[default]
    None,
    And,
    Or,
    Xor,
}

impl LogicOp {
    /// Operator bound to a logic column on the grid (columns 1-3)
    pub fn from_column(x: u8) -> Option<LogicOp> {
        match x {
            1 => Some(LogicOp::And),
            2 => Some(LogicOp::Or),
            3 => Some(LogicOp::Xor),
            _ => None,
        }
    }

    pub fn column(self) -> Option<u8> {
        match self {
            LogicOp::None => None,
            LogicOp::And => Some(1),
            LogicOp::Or => Some(2),
            LogicOp::Xor => Some(3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Logic {
    pub op: LogicOp,
    pub target: Option<RowIndex>,
}

impl Logic {
    pub const NONE: Logic = Logic {
        op: LogicOp::None,
        target: None,
    };

    pub fn new(op: LogicOp, target: RowIndex) -> Self {
        if op == LogicOp::None {
            return Logic::NONE;
        }
        Logic {
            op,
            target: Some(target),
        }
    }

    /// The referenced row, if the reference is active
    pub fn active_target(&self) -> Option<RowIndex> {
        match self.op {
            LogicOp::None => None,
            _ => self.target,
        }
    }
}

/// Gate length of a step slot, cycled by successive presses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateLength {
    #[default]
    Off,
    Short,
    Long,
}

impl GateLength {
    pub fn next(self) -> GateLength {
        match self {
            GateLength::Off => GateLength::Short,
            GateLength::Short => GateLength::Long,
            GateLength::Long => GateLength::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepCell {
    pub active: bool,
    pub gate: GateLength,
}

impl StepCell {
    /// Advance Off -> Short -> Long -> Off; `active` follows the Off boundary
    pub fn cycle(&mut self) {
        self.gate = self.gate.next();
        self.active = self.gate != GateLength::Off;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub position: u8,
    pub division: u8,
    pub pattern_length: u64,
    pub logic: Logic,
    #[serde(skip)]
    pub ticker: u64,
    #[serde(skip)]
    pub blink: bool,
    pub steps: [StepCell; STEPS],
}

impl Row {
    pub fn new(position: u8, table: &[u8; DIVISIONS]) -> Self {
        let division = division_for(table, position);
        Self {
            position,
            division,
            pattern_length: division as u64,
            logic: Logic::NONE,
            ticker: division as u64 - 1,
            blink: false,
            steps: [StepCell::default(); STEPS],
        }
    }

    /// Default row `i` sits at position `15 - i`
    pub fn default_for(index: RowIndex, table: &[u8; DIVISIONS]) -> Self {
        Row::new(15 - index.get() as u8, table)
    }

    pub fn is_referencing(&self) -> bool {
        self.logic.active_target().is_some()
    }

    /// Wipe logic and step state, leaving position and division in place
    pub fn clear_pattern_state(&mut self) {
        self.logic = Logic::NONE;
        self.steps = [StepCell::default(); STEPS];
        self.blink = false;
    }
}

/// Look up the division for a grid position, clamping positions outside the table
pub fn division_for(table: &[u8; DIVISIONS], position: u8) -> u8 {
    let index = position.saturating_sub(POSITION_OFFSET) as usize;
    table[index.min(DIVISIONS - 1)].max(1)
}

/// Inverse of [`division_for`]: the grid position that selects `index` in the table
pub fn position_for_index(index: usize) -> u8 {
    POSITION_OFFSET + index.min(DIVISIONS - 1) as u8
}
