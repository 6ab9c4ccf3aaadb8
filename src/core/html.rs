// src/core/html.rs
//! Tolerant HTML scanning over raw markup.
//!
//! This is not a DOM. Elements are found by case-insensitive search for their
//! opening tag, with the tag name checked at a boundary (`<th` never matches
//! `<thead>`), and same-name nesting is balanced so a `<table>` inside a cell
//! does not end its parent early. Closing tags that are missing entirely are
//! tolerated: the element then runs up to the next sibling opener.
//!
//! Offsets taken from the lowercased copy are valid in the scanned string
//! because only ASCII is lowercased.

use super::sanitize::{decode_entities, normalize_ws};

/// One element found by [`children`] or [`descendants`].
///
/// `start`/`end` are byte offsets of the whole element (opener through closing
/// tag) in the string that was scanned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Element<'a> {
    pub name: &'static str,
    pub opener: &'a str,
    pub inner: &'a str,
    pub start: usize,
    pub end: usize,
}

impl<'a> Element<'a> {
    pub fn attributes(&self) -> Vec<(String, String)> {
        attributes(self.opener)
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        let name = to_lower(name);
        attributes(self.opener)
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    /// Visible text of the element body.
    pub fn text(&self) -> String {
        inner_text(self.inner)
    }
}

/// Fast ASCII-only lowercasing for tag/attribute matching.
pub fn to_lower(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii() { c.to_ascii_lowercase() } else { c })
        .collect()
}

/// Top-level elements whose tag is one of `names`, in document order.
///
/// "Top-level" is relative to `names` only: a `<tr>` inside a `<tbody>` is
/// found when scanning for `tr`, but a `<td>` inside a nested `<table>` in
/// another `<td>` is skipped together with its parent.
pub fn children<'a>(s: &'a str, names: &[&'static str]) -> Vec<Element<'a>> {
    let lc = to_lower(s);
    let mut out = Vec::new();
    let mut pos = 0usize;

    while let Some((start, name)) = next_open_any(&lc, names, pos) {
        let Some(open_end) = tag_end(s, start) else { break };
        let opener = &s[start..open_end];

        let (inner, end) = if opener.ends_with("/>") {
            ("", open_end)
        } else if let Some((close, close_end)) = matching_close(s, &lc, name, open_end) {
            (&s[open_end..close], close_end)
        } else {
            // Unclosed: runs until the next sibling opener or the end of input.
            let stop = next_open_any(&lc, names, open_end)
                .map(|(at, _)| at)
                .unwrap_or(s.len());
            (&s[open_end..stop], stop)
        };

        out.push(Element { name, opener, inner, start, end });
        pos = end;
    }
    out
}

/// Every element named `name` in document order, including ones nested
/// inside each other. Offsets are relative to `s`.
pub fn descendants<'a>(s: &'a str, name: &'static str) -> Vec<Element<'a>> {
    let mut out = Vec::new();
    collect_descendants(s, name, 0, &mut out);
    out
}

fn collect_descendants<'a>(s: &'a str, name: &'static str, base: usize, out: &mut Vec<Element<'a>>) {
    for mut el in children(s, &[name]) {
        let inner_base = base + el.start + el.opener.len();
        el.start += base;
        el.end += base;
        let inner = el.inner;
        out.push(el);
        collect_descendants(inner, name, inner_base, out);
    }
}

/// Attribute `(name, value)` pairs of an opening tag such as
/// `<table class="a b" data-x=1 hidden>`. Names are lowercased; valueless
/// attributes get an empty value. Values are returned raw (entities intact).
pub fn attributes(opener: &str) -> Vec<(String, String)> {
    let body = opener
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim_end_matches('/')
        .trim_start();
    let name_len = body.find(char::is_whitespace).unwrap_or(body.len());
    let s = &body[name_len..];
    let b = s.as_bytes();

    let mut out = Vec::new();
    let mut i = 0usize;
    while i < b.len() {
        while i < b.len() && (b[i].is_ascii_whitespace() || b[i] == b'/') {
            i += 1;
        }
        if i >= b.len() {
            break;
        }

        let ns = i;
        while i < b.len() && !b[i].is_ascii_whitespace() && b[i] != b'=' {
            i += 1;
        }
        let name = to_lower(&s[ns..i]);

        while i < b.len() && b[i].is_ascii_whitespace() {
            i += 1;
        }

        let mut value = s!();
        if i < b.len() && b[i] == b'=' {
            i += 1;
            while i < b.len() && b[i].is_ascii_whitespace() {
                i += 1;
            }
            if i < b.len() && (b[i] == b'"' || b[i] == b'\'') {
                let quote = b[i];
                i += 1;
                let vs = i;
                while i < b.len() && b[i] != quote {
                    i += 1;
                }
                value = s!(&s[vs..i]);
                i += 1;
            } else {
                let vs = i;
                while i < b.len() && !b[i].is_ascii_whitespace() {
                    i += 1;
                }
                value = s!(&s[vs..i]);
            }
        }

        if !name.is_empty() {
            out.push((name, value));
        }
    }
    out
}

/// Visible text of a fragment: tags removed, entities decoded, whitespace
/// (including non-breaking spaces) collapsed and trimmed.
pub fn inner_text(fragment: &str) -> String {
    normalize_ws(&decode_entities(&strip_tags(fragment)))
}

/// Remove all HTML tags `<...>` from the string. No whitespace handling.
pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/* ---------- scanning ---------- */

fn next_open_any(lc: &str, names: &[&'static str], from: usize) -> Option<(usize, &'static str)> {
    names
        .iter()
        .filter_map(|n| find_tag(lc, "<", n, from).map(|at| (at, *n)))
        .min_by_key(|(at, _)| *at)
}

/// Offset of the next `<name` (or `</name` with `lead = "</"`) at or after
/// `from` where the tag name ends at a boundary.
fn find_tag(lc: &str, lead: &str, name: &str, from: usize) -> Option<usize> {
    let pat = join!(lead, name);
    let bytes = lc.as_bytes();
    let mut pos = from;
    loop {
        let at = lc.get(pos..)?.find(&pat)? + pos;
        let after = at + pat.len();
        match bytes.get(after) {
            Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => return Some(at),
            Some(_) => pos = after,
            None => return None,
        }
    }
}

/// Index just past the `>` ending the tag that starts at `lt`.
/// A `>` inside a quoted attribute value does not end the tag.
fn tag_end(s: &str, lt: usize) -> Option<usize> {
    let b = s.as_bytes();
    let mut in_s = false; // '
    let mut in_d = false; // "
    let mut i = lt + 1;
    while i < b.len() {
        match b[i] {
            b'\'' if !in_d => in_s = !in_s,
            b'"' if !in_s => in_d = !in_d,
            b'>' if !in_s && !in_d => return Some(i + 1),
            _ => {}
        }
        i += 1;
    }
    None
}

/// `(close_start, close_end)` of the tag balancing an element of `name`
/// whose opener ends at `open_end`.
fn matching_close(s: &str, lc: &str, name: &str, open_end: usize) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    let mut pos = open_end;
    loop {
        let close = find_tag(lc, "</", name, pos)?;
        match find_tag(lc, "<", name, pos) {
            Some(open) if open < close => {
                let end = tag_end(s, open)?;
                if !s[open..end].ends_with("/>") {
                    depth += 1;
                }
                pos = end;
            }
            _ => {
                depth -= 1;
                let close_end = tag_end(s, close)?;
                if depth == 0 {
                    return Some((close, close_end));
                }
                pos = close_end;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn th_does_not_match_thead() {
        let html = "<thead><tr><th>A</th><TH class=x>B</TH></tr></thead>";
        let heads = children(html, &["thead"]);
        assert_eq!(heads.len(), 1);
        let ths = children(heads[0].inner, &["tr"])
            .into_iter()
            .flat_map(|tr| children(tr.inner, &["th"]))
            .map(|th| th.text())
            .collect::<Vec<_>>();
        assert_eq!(ths, vec!["A", "B"]);
    }

    #[test]
    fn nested_tables_stay_balanced() {
        let html = r#"
            <table id="outer"><tr><td>
                <table id="inner"><tr><td>x</td></tr></table>
            </td><td>after</td></tr></table>
            <table id="third"></table>
        "#;
        let top = children(html, &["table"]);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].attr("id").as_deref(), Some("outer"));
        assert!(top[0].inner.contains("after"));

        let all = descendants(html, "table");
        let ids: Vec<_> = all.iter().filter_map(|t| t.attr("id")).collect();
        assert_eq!(ids, vec!["outer", "inner", "third"]);
        assert_eq!(&html[all[1].start..all[1].end], r#"<table id="inner"><tr><td>x</td></tr></table>"#);
    }

    #[test]
    fn cells_in_document_order_skip_nested_rows() {
        let tr = "<td>1</td><th>2</th><td><table><tr><td>n</td></tr></table>3</td>";
        let cells: Vec<_> = children(tr, &["td", "th"]).iter().map(|c| (c.name, c.text())).collect();
        assert_eq!(cells, vec![("td", s!("1")), ("th", s!("2")), ("td", s!("n3"))]);
    }

    #[test]
    fn unclosed_cells_end_at_next_sibling() {
        let tr = "<td>a<td>b <td> c ";
        let cells: Vec<_> = children(tr, &["td"]).iter().map(|c| c.text()).collect();
        assert_eq!(cells, vec!["a", "b", "c"]);
    }

    #[test]
    fn quoted_gt_does_not_end_opener() {
        let html = r#"<table title="a > b" class='t'><tr><td>x</td></tr></table>"#;
        let t = children(html, &["table"]);
        assert_eq!(t[0].attr("class").as_deref(), Some("t"));
        assert_eq!(t[0].attr("title").as_deref(), Some("a > b"));
    }

    #[test]
    fn attributes_parse_all_forms() {
        let attrs = attributes(r#"<table CLASS="table  table-striped" data-id=7 _ngcontent-c12 hidden>"#);
        assert_eq!(
            attrs,
            vec![
                (s!("class"), s!("table  table-striped")),
                (s!("data-id"), s!("7")),
                (s!("_ngcontent-c12"), s!()),
                (s!("hidden"), s!()),
            ]
        );
    }

    #[test]
    fn inner_text_strips_and_normalizes() {
        assert_eq!(inner_text("  <span>Nabil&nbsp;Bank</span>\n\t Ltd &amp; Co\u{a0} "), "Nabil Bank Ltd & Co");
        assert_eq!(inner_text("<b></b>"), "");
    }
}
