// src/specs/locator.rs
//! Table Locator: finds the one market table in a page.
//!
//! The same logical table keeps changing its markup (renamed classes,
//! framework-injected attributes), so no single selector is trusted.
//! Strategies run in a fixed order, most specific first; the first match wins.
//! Each strategy is a plain function over the page's tables, and adding or
//! dropping one is a one-line change to [`STRATEGIES`].

use std::fmt;

use tracing::debug;

use crate::core::sanitize::normalize_ws;
use crate::error::NotFound;
use crate::specs::table::Table;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// `class` attribute equal to the last observed signature.
    ExactSignature,
    /// Every marker token present among the table's attribute tokens.
    MarkerTokens,
    /// A header section with at least `min_header_cells` cells.
    HeaderHeuristic,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::ExactSignature => "exact-signature",
            Strategy::MarkerTokens => "marker-tokens",
            Strategy::HeaderHeuristic => "header-heuristic",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is known about the target table's markup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub exact_class: String,
    pub marker_tokens: Vec<String>,
    pub min_header_cells: usize,
}

type StrategyFn = for<'a> fn(&Signature, &[Table<'a>]) -> Option<Table<'a>>;

/// Priority order. First hit wins.
pub const STRATEGIES: &[(Strategy, StrategyFn)] = &[
    (Strategy::ExactSignature, exact_signature),
    (Strategy::MarkerTokens, marker_tokens),
    (Strategy::HeaderHeuristic, header_heuristic),
];

#[derive(Clone, Copy, Debug)]
pub struct Located<'a> {
    pub table: Table<'a>,
    pub strategy: Strategy,
}

#[derive(Clone, Debug)]
pub struct TableLocator {
    signature: Signature,
}

impl TableLocator {
    pub fn new(signature: Signature) -> Self {
        Self { signature }
    }

    pub fn locate<'a>(&self, markup: &'a str) -> Result<Located<'a>, NotFound> {
        let tables = Table::scan(markup);

        for (strategy, find) in STRATEGIES {
            if let Some(table) = find(&self.signature, &tables) {
                debug!(strategy = %strategy, tables = tables.len(), "market table located");
                return Ok(Located { table, strategy: *strategy });
            }
            debug!(strategy = %strategy, tables = tables.len(), "strategy matched nothing");
        }

        Err(NotFound { tables_seen: tables.len() })
    }
}

fn exact_signature<'a>(sig: &Signature, tables: &[Table<'a>]) -> Option<Table<'a>> {
    let want = normalize_ws(&sig.exact_class);
    if want.is_empty() {
        return None;
    }
    tables
        .iter()
        .copied()
        .find(|t| t.class().as_deref() == Some(want.as_str()))
}

fn marker_tokens<'a>(sig: &Signature, tables: &[Table<'a>]) -> Option<Table<'a>> {
    if sig.marker_tokens.is_empty() {
        return None;
    }
    tables.iter().copied().find(|t| {
        let tokens = t.attribute_tokens();
        sig.marker_tokens.iter().all(|m| tokens.contains(m))
    })
}

fn header_heuristic<'a>(sig: &Signature, tables: &[Table<'a>]) -> Option<Table<'a>> {
    let min = sig.min_header_cells.max(1);
    let qualifying: Vec<Table<'a>> = tables
        .iter()
        .copied()
        .filter(|t| t.header_cells().len() >= min)
        .collect();
    // Innermost wins: a wrapper with its own header is still a wrapper.
    qualifying
        .iter()
        .copied()
        .find(|outer| !qualifying.iter().any(|t| outer.encloses(t)))
}
