// src/delta.rs
//! Delta Engine: which rows of this cycle were not in the previous snapshot.
//!
//! Membership is by exact value tuple, not by position. The new snapshot is
//! always the current extraction as a whole, so rows that drop off the live
//! table stop being tracked.

use std::collections::HashSet;

use crate::data::Row;

/// Rows extracted by the most recent successful cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    rows: Vec<Row>,
    index: HashSet<Row>,
}

impl Snapshot {
    pub fn new(rows: Vec<Row>) -> Self {
        let index = rows.iter().cloned().collect();
        Self { rows, index }
    }

    pub fn contains(&self, row: &Row) -> bool {
        self.index.contains(row)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diff {
    /// Rows of `current` absent from the previous snapshot, in `current` order.
    pub delta: Vec<Row>,
    /// Replacement for the previous snapshot.
    pub snapshot: Snapshot,
}

/// With no previous snapshot (first cycle) everything is new.
/// An empty `current` gives an empty delta *and* an empty snapshot.
pub fn diff(current: Vec<Row>, previous: Option<&Snapshot>) -> Diff {
    let delta = match previous {
        None => current.clone(),
        Some(prev) => current.iter().filter(|r| !prev.contains(r)).cloned().collect(),
    };
    Diff { delta, snapshot: Snapshot::new(current) }
}
