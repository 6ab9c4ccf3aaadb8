// src/store.rs
//
// Consolidation Store: every row ever accepted, in first-seen order.
//
// Append-only by construction: the only mutator takes a delta and pushes it
// to the end. Durable copies are the Sink's business (CsvSink keeps a
// `<prefix>_consolidated` file in step with this).

use crate::data::Row;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dataset {
    rows: Vec<Row>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one cycle's delta. Returns the new length.
    pub fn append(&mut self, delta: &[Row]) -> usize {
        self.rows.extend_from_slice(delta);
        self.rows.len()
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
