// src/specs/table.rs
use std::borrow::Cow;
use std::collections::HashSet;

use crate::core::html::{children, descendants, Element};
use crate::core::sanitize::normalize_ws;

/// Borrowed view over one `<table>` element of a page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Table<'a> {
    el: Element<'a>,
}

impl<'a> Table<'a> {
    /// Every `<table>` in the markup, nested ones included, in document order.
    pub fn scan(markup: &'a str) -> Vec<Table<'a>> {
        descendants(markup, "table")
            .into_iter()
            .map(|el| Table { el })
            .collect()
    }

    pub fn opener(&self) -> &'a str {
        self.el.opener
    }

    /// True when `other` sits somewhere inside this table.
    pub fn encloses(&self, other: &Table<'_>) -> bool {
        self.el.inner.as_bytes().as_ptr_range().contains(&other.el.opener.as_ptr())
    }

    /// The `class` attribute with whitespace normalised.
    pub fn class(&self) -> Option<String> {
        self.el.attr("class").map(|c| normalize_ws(&c))
    }

    /// Attribute names plus every whitespace-separated token of every
    /// attribute value, as one set.
    pub fn attribute_tokens(&self) -> HashSet<String> {
        let mut tokens = HashSet::new();
        for (name, value) in self.el.attributes() {
            tokens.extend(value.split_whitespace().map(str::to_string));
            tokens.insert(name);
        }
        tokens
    }

    /// Texts of the header cells: the first row of `<thead>`, or else a
    /// leading row made only of `<th>` cells. Empty when there is no header.
    pub fn header_cells(&self) -> Vec<String> {
        let Some(row) = self.header_row() else {
            return Vec::new();
        };
        children(row, &["th", "td"]).iter().map(Element::text).collect()
    }

    fn header_row(&self) -> Option<&'a str> {
        let inner = self.el.inner;
        if let Some(head) = own_children(inner, &["thead"]).first() {
            // Some pages put bare <th> cells straight into <thead>.
            let rows = own_children(head.inner, &["tr"]);
            return Some(rows.first().map_or(head.inner, |r| r.inner));
        }

        let scope = own_children(inner, &["tbody"]).first().map_or(inner, |b| b.inner);
        let first = own_children(scope, &["tr"]).into_iter().next()?;
        is_header_row(first.inner).then_some(first.inner)
    }

    /// Sections holding data rows: every `<tbody>`, or when there is none,
    /// the table body with `<thead>`/`<tfoot>` cut out.
    pub fn body_sections(&self) -> Vec<Cow<'a, str>> {
        let inner = self.el.inner;

        let bodies = own_children(inner, &["tbody"]);
        if !bodies.is_empty() {
            return bodies.into_iter().map(|b| Cow::Borrowed(b.inner)).collect();
        }

        let cut = own_children(inner, &["thead", "tfoot"]);
        if cut.is_empty() {
            return vec![Cow::Borrowed(inner)];
        }

        let mut body = String::with_capacity(inner.len());
        let mut pos = 0usize;
        for section in cut {
            body.push_str(&inner[pos..section.start]);
            pos = section.end;
        }
        body.push_str(&inner[pos..]);
        vec![Cow::Owned(body)]
    }
}

/// `children(s, names)` minus matches that belong to a `<table>` nested in `s`.
pub fn own_children<'s>(s: &'s str, names: &[&'static str]) -> Vec<Element<'s>> {
    let nested = children(s, &["table"]);
    children(s, names)
        .into_iter()
        .filter(|el| !nested.iter().any(|t| (t.start..t.end).contains(&el.start)))
        .collect()
}

/// A row whose cells are all `<th>` is a header row by structure.
pub fn is_header_row(tr_inner: &str) -> bool {
    let cells = children(tr_inner, &["td", "th"]);
    !cells.is_empty() && cells.iter().all(|c| c.name == "th")
}
