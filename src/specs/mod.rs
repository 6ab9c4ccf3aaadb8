// src/specs/mod.rs
//! # Market table "specs"
//!
//! This module knows **how to read the page**: where the market table lives in
//! the markup and how to turn it into rows. It is pure; no networking, no
//! files, no retained state.
//!
//! ## What lives here
//! - [`table::Table`]: a borrowed view over one `<table>` element (attribute
//!   tokens, header section, body sections).
//! - [`locator`]: finds *the* market table, trying strategies from most to
//!   least specific (exact class signature → marker tokens → header shape).
//! - [`rows`]: extracts fixed-width rows and rejects malformed ones.
//!
//! ## What does **not** live here
//! - Retrieval (`source`), diffing (`delta`), persistence (`sink`), pacing
//!   (`poller`).
//!
//! ## Conventions
//! - Case-insensitive tag detection via `core::html`; tolerate attribute
//!   order, framework-injected attributes and missing closing tags.
//! - Headers are recognised by **position** (`<thead>`, all-`<th>` rows),
//!   never by comparing cell values.
//! - Specs are testable offline against literal markup fixtures.

pub mod locator;
pub mod rows;
pub mod table;
