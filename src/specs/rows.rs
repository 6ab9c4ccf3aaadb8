// src/specs/rows.rs
//! Row Extractor & Validator.
//!
//! A body row is accepted only if it has exactly one cell per schema field.
//! Anything else is rejected whole (never padded or truncated) and logged.

use tracing::{debug, warn};

use crate::core::html::{children, Element};
use crate::data::{Row, Schema};
use crate::specs::table::{is_header_row, own_children, Table};

/// A body row dropped for having the wrong number of cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    /// 1-based position among the table's body rows.
    pub position: usize,
    pub found: usize,
    pub expected: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extraction {
    pub rows: Vec<Row>,
    pub rejected: Vec<Rejection>,
}

pub fn extract(table: &Table<'_>, schema: &Schema) -> Extraction {
    let expected = schema.len();
    let mut out = Extraction::default();
    let mut position = 0usize;

    for section in table.body_sections() {
        for tr in own_children(&section, &["tr"]) {
            if is_header_row(tr.inner) {
                debug!("header row inside table body skipped");
                continue;
            }
            position += 1;

            let cells: Vec<String> = children(tr.inner, &["td", "th"])
                .iter()
                .map(Element::text)
                .collect();

            if cells.len() == expected {
                out.rows.push(Row::new(cells));
            } else {
                warn!(position, found = cells.len(), expected, "malformed row rejected");
                out.rejected.push(Rejection { position, found: cells.len(), expected });
            }
        }
    }
    out
}
