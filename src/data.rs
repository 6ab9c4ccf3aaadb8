// src/data.rs
//
// Row shape shared by every stage of a cycle.
//
// - Schema: the fixed, ordered field names of one deployment.
// - Row:    one record's field values. Identity is the whole value tuple;
//           there is no primary key.

use std::collections::HashSet;
use std::fmt;

use crate::error::ConfigError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<String>,
}

impl Schema {
    /// Field names must be non-empty, non-blank and unique.
    pub fn new<I, S>(fields: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(ConfigError::Invalid(s!("schema must name at least one field")));
        }

        let mut seen = HashSet::new();
        for f in &fields {
            if f.trim().is_empty() {
                return Err(ConfigError::Invalid(s!("schema field names must not be blank")));
            }
            if !seen.insert(f.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate schema field {f:?}")));
            }
        }
        Ok(Self { fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Row(Vec<String>);

impl Row {
    pub fn new(fields: Vec<String>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for Row {
    fn from(fields: Vec<String>) -> Self {
        Self(fields)
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for Row {
    fn from(fields: [S; N]) -> Self {
        Self(fields.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}
