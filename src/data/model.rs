use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// FieldValue – a single field of a fold
// ---------------------------------------------------------------------------

/// A dynamically-shaped field value.
///
/// Numeric data is either a flat sample sequence (`Series`) or a row-major
/// sample matrix (`Matrix`, one sample per row). `List` holds results that do
/// not collapse into a matrix, e.g. per-sample `[removal, baseline]` pairs.
///
/// JSON carries no shape tag, so an empty `Matrix` (zero samples) is written
/// as `[]` and reads back as an empty `Series` (one sample with no points).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(f64),
    Text(String),
    Series(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Number of independent samples the field holds: one for a series, one
    /// per row for a matrix. Non-numeric values hold none.
    pub fn sample_count(&self) -> Option<usize> {
        match self {
            FieldValue::Series(_) => Some(1),
            FieldValue::Matrix(rows) => Some(rows.len()),
            _ => None,
        }
    }

    /// Borrow the field as sample rows, preserving row order.
    pub fn rows(&self) -> Option<Vec<&[f64]>> {
        match self {
            FieldValue::Series(values) => Some(vec![values.as_slice()]),
            FieldValue::Matrix(rows) => Some(rows.iter().map(Vec::as_slice).collect()),
            _ => None,
        }
    }

    pub fn is_series(&self) -> bool {
        matches!(self, FieldValue::Series(_))
    }

    pub fn as_series(&self) -> Option<&[f64]> {
        match self {
            FieldValue::Series(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// Collapse an ordered result sequence into one field value.
    ///
    /// Series results stack into a matrix; anything else is kept as a list.
    pub fn from_results(results: Vec<FieldValue>) -> FieldValue {
        if results.iter().all(FieldValue::is_series) {
            let rows = results
                .into_iter()
                .filter_map(|r| match r {
                    FieldValue::Series(values) => Some(values),
                    _ => None,
                })
                .collect();
            FieldValue::Matrix(rows)
        } else {
            FieldValue::List(results)
        }
    }
}

impl From<Vec<f64>> for FieldValue {
    fn from(values: Vec<f64>) -> Self {
        FieldValue::Series(values)
    }
}

impl From<Vec<Vec<f64>>> for FieldValue {
    fn from(rows: Vec<Vec<f64>>) -> Self {
        FieldValue::Matrix(rows)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Scalar(v) => write!(f, "{v:.4}"),
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Series(values) => write!(f, "series[{}]", values.len()),
            FieldValue::Matrix(rows) => {
                let cols = rows.first().map_or(0, Vec::len);
                write!(f, "matrix[{}x{cols}]", rows.len())
            }
            FieldValue::List(items) => write!(f, "list[{}]", items.len()),
        }
    }
}

// ---------------------------------------------------------------------------
// FoldRecord – named fields of one fold
// ---------------------------------------------------------------------------

/// All fields of one fold. There is no fixed schema; field names are
/// domain-specific (`spectra`, `axis_wavenumber`, `heat_flow`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FoldRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl FoldRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy when assembling fixtures.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Dataset – ordered folds
// ---------------------------------------------------------------------------

/// Ordered mapping from fold name to fold record.
///
/// Fold order is insertion order and survives JSON round trips.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    folds: Vec<(String, FoldRecord)>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            folds: Vec::with_capacity(capacity),
        }
    }

    /// Insert a fold. An existing fold of the same name is replaced in place,
    /// keeping its position.
    pub fn insert(&mut self, name: impl Into<String>, record: FoldRecord) {
        let name = name.into();
        match self.folds.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = record,
            None => self.folds.push((name, record)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FoldRecord> {
        self.folds.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FoldRecord)> {
        self.folds.iter().map(|(n, r)| (n.as_str(), r))
    }

    pub fn fold_names(&self) -> Vec<&str> {
        self.folds.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Number of folds.
    pub fn len(&self) -> usize {
        self.folds.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.folds.is_empty()
    }

    pub(crate) fn folds(&self) -> &[(String, FoldRecord)] {
        &self.folds
    }
}

impl FromIterator<(String, FoldRecord)> for Dataset {
    fn from_iter<I: IntoIterator<Item = (String, FoldRecord)>>(iter: I) -> Self {
        let mut dataset = Dataset::new();
        for (name, record) in iter {
            dataset.insert(name, record);
        }
        dataset
    }
}

// -- Order-preserving serde for Dataset --

impl Serialize for Dataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.folds.len()))?;
        for (name, record) in &self.folds {
            map.serialize_entry(name, record)?;
        }
        map.end()
    }
}

struct DatasetVisitor;

impl<'de> Visitor<'de> for DatasetVisitor {
    type Value = Dataset;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of fold name to fold record")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Dataset, A::Error> {
        let mut dataset = Dataset::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((name, record)) = access.next_entry::<String, FoldRecord>()? {
            dataset.insert(name, record);
        }
        Ok(dataset)
    }
}

impl<'de> Deserialize<'de> for Dataset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Dataset, D::Error> {
        deserializer.deserialize_map(DatasetVisitor)
    }
}
