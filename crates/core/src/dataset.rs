use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::SiftError;

/// Typed cell values as produced by the ingestion layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Interpret the value as an outlier flag.
    ///
    /// Booleans map directly, numbers are true when non-zero, and the text
    /// forms `true`/`false`/`1`/`0` (any case) are accepted. Anything else,
    /// including null, has no flag interpretation.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            FieldValue::Integer(i) => Some(*i != 0),
            FieldValue::Float(f) if f.is_finite() => Some(*f != 0.0),
            FieldValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Convert into an equality-comparable attribute key.
    ///
    /// Returns None for null and non-finite floats.
    pub fn to_attribute_value(&self) -> Option<AttributeValue> {
        match self {
            FieldValue::Text(s) => Some(AttributeValue::Text(s.clone())),
            FieldValue::Integer(i) => Some(AttributeValue::Integer(*i)),
            FieldValue::Float(f) if f.is_finite() => Some(AttributeValue::Float(FloatKey::new(*f))),
            FieldValue::Boolean(b) => Some(AttributeValue::Boolean(*b)),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

/// A finite float usable as a hash/ordering key. `-0.0` is folded into `0.0`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FloatKey(f64);

impl FloatKey {
    pub fn new(value: f64) -> Self {
        if value == 0.0 {
            Self(0.0)
        } else {
            Self(value)
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl PartialEq for FloatKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for FloatKey {}

impl Hash for FloatKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for FloatKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Opaque attribute value. Values are only ever compared for equality and
/// sorted for deterministic output; numeric columns must be bucketed upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Boolean(bool),
    Integer(i64),
    Float(FloatKey),
    Text(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Boolean(b) => write!(f, "{}", b),
            AttributeValue::Integer(i) => write!(f, "{}", i),
            AttributeValue::Float(x) => write!(f, "{}", x.get()),
            AttributeValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_owned())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Boolean(value)
    }
}

/// A row-oriented, column-labelled table. Every row holds exactly one value
/// per declared column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<FieldValue>>,
}

impl Dataset {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a dataset from records of `(column, value)` pairs.
    ///
    /// Columns are taken in first-seen order; a record that omits a column
    /// gets `Null` for it.
    pub fn from_records<R, S>(records: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoIterator<Item = (S, FieldValue)>,
        S: Into<String>,
    {
        let mut columns: Vec<String> = Vec::new();
        let mut keyed: Vec<Vec<(usize, FieldValue)>> = Vec::new();

        for record in records {
            let mut cells = Vec::new();
            for (name, value) in record {
                let name = name.into();
                let idx = match columns.iter().position(|c| *c == name) {
                    Some(idx) => idx,
                    None => {
                        columns.push(name);
                        columns.len() - 1
                    }
                };
                cells.push((idx, value));
            }
            keyed.push(cells);
        }

        let width = columns.len();
        let rows = keyed
            .into_iter()
            .map(|cells| {
                let mut row = vec![FieldValue::Null; width];
                for (idx, value) in cells {
                    row[idx] = value;
                }
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn push_row(&mut self, row: Vec<FieldValue>) -> Result<(), SiftError> {
        if row.len() != self.columns.len() {
            return Err(SiftError::RowWidth {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Every row must hold exactly one cell per column. `push_row` enforces
    /// this; deserialized datasets are only checked here.
    pub fn check_row_widths(&self) -> Result<(), SiftError> {
        let expected = self.columns.len();
        match self.rows.iter().find(|row| row.len() != expected) {
            Some(row) => Err(SiftError::RowWidth {
                expected,
                actual: row.len(),
            }),
            None => Ok(()),
        }
    }

    /// Overwrite every cell of `column` with `value`, adding the column if absent.
    pub fn fill_column(&mut self, column: &str, value: FieldValue) {
        let idx = match self.column_index(column) {
            Some(idx) => idx,
            None => {
                self.columns.push(column.to_owned());
                for row in &mut self.rows {
                    row.push(FieldValue::Null);
                }
                self.columns.len() - 1
            }
        };
        for row in &mut self.rows {
            row[idx] = value.clone();
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<FieldValue>] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate one column's values in row order.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &FieldValue> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
