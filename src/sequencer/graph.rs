//! Row reference graph: validation, cycle detection and propagation order.
//!
//! The graph has at most [`ROWS`] nodes and each node has at most one
//! outgoing edge, so it is stored as a flat array of optional targets and
//! every traversal is bounded by the row count.

use super::row::{RowIndex, MAX_REFERENCES, ROWS};
use super::ReferenceMode;
use crate::error::LogicError;

/// Outgoing reference of every row, indexed by row
pub type Targets = [Option<RowIndex>; ROWS];

/// Fixed-capacity stack of row ids, sized to the row count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowStack {
    items: [RowIndex; ROWS],
    len: usize,
}

impl RowStack {
    pub fn new() -> Self {
        Self {
            items: [RowIndex::FIRST; ROWS],
            len: 0,
        }
    }

    /// Push a row id; returns false if the id is already on the stack or the stack is full
    pub fn push(&mut self, row: RowIndex) -> bool {
        if self.len == ROWS || self.contains(row) {
            return false;
        }
        self.items[self.len] = row;
        self.len += 1;
        true
    }

    pub fn pop(&mut self) -> Option<RowIndex> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(self.items[self.len])
    }

    pub fn contains(&self, row: RowIndex) -> bool {
        self.items[..self.len].contains(&row)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for RowStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk the forward chain from `start`; fails if the walk returns to `start`
/// or fails to reach an anchor within the row count.
pub fn check_cycle(targets: &Targets, start: RowIndex) -> Result<(), LogicError> {
    let mut current = start;
    for _ in 0..ROWS {
        match targets[current.get()] {
            None => return Ok(()),
            Some(next) if next == start => return Err(LogicError::CircularReference),
            Some(next) => current = next,
        }
    }
    Err(LogicError::CircularReference)
}

/// Check whether `row` may start referencing `target`. Nothing is mutated.
pub fn validate(
    targets: &Targets,
    mode: ReferenceMode,
    row: RowIndex,
    target: RowIndex,
) -> Result<(), LogicError> {
    if row == target {
        return Err(LogicError::SelfReference);
    }

    match mode {
        ReferenceMode::Single => {
            // the target must be an anchor, which also rules out A <-> B
            if targets[target.get()].is_some() {
                return Err(LogicError::CircularReference);
            }
        }
        ReferenceMode::Nested => {
            let mut tentative = *targets;
            tentative[row.get()] = Some(target);
            check_cycle(&tentative, row)?;
        }
    }

    let others = targets
        .iter()
        .enumerate()
        .filter(|(i, t)| *i != row.get() && t.is_some())
        .count();
    if others + 1 > MAX_REFERENCES {
        return Err(LogicError::CapacityExceeded);
    }

    Ok(())
}

/// Number of forward hops from `row` to its anchor
pub fn depth(targets: &Targets, row: RowIndex) -> usize {
    let mut current = row;
    let mut hops = 0;
    while let Some(next) = targets[current.get()] {
        hops += 1;
        if hops >= ROWS {
            break;
        }
        current = next;
    }
    hops
}

/// Rows whose effective pattern may change when `start` changes, as a stack
/// that pops anchors first and every referencing row after the row it points to.
pub fn propagation_order(targets: &Targets, start: RowIndex) -> Result<RowStack, LogicError> {
    check_cycle(targets, start)?;

    let mut visited = RowStack::new();
    let mut pending = RowStack::new();
    visited.push(start);
    pending.push(start);

    while let Some(row) = pending.pop() {
        let ancestor = targets[row.get()];
        let descendants = RowIndex::all().filter(|r| targets[r.get()] == Some(row));
        for next in ancestor.into_iter().chain(descendants) {
            if visited.push(next) {
                pending.push(next);
            }
        }
    }

    Ok(order_by_depth(targets, |r| visited.contains(r)))
}

/// Every row, ordered like [`propagation_order`]
pub fn full_order(targets: &Targets) -> RowStack {
    order_by_depth(targets, |_| true)
}

fn order_by_depth(targets: &Targets, include: impl Fn(RowIndex) -> bool) -> RowStack {
    let mut order = RowStack::new();
    for d in (0..ROWS).rev() {
        for row in RowIndex::all() {
            if include(row) && depth(targets, row) == d {
                order.push(row);
            }
        }
    }
    order
}
