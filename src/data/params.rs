use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};

/// Names supplied by decomposition. Overrides may never use them.
pub const RESERVED_NAMES: [&str; 2] = ["y", "x"];

// ---------------------------------------------------------------------------
// ParamValue – a single algorithm setting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    IntPair(i64, i64),
    Text(String),
}

impl ParamValue {
    /// Guess the type of a command-line literal.
    ///
    /// `3` is an int, `0.5` or `1e3` a float, `true`/`false` a bool and
    /// `200,-100` an integer pair. Anything else is kept as text.
    pub fn parse_literal(s: &str) -> ParamValue {
        let s = s.trim();
        if let Ok(i) = s.parse::<i64>() {
            return ParamValue::Int(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return ParamValue::Float(f);
        }
        if s == "true" || s == "false" {
            return ParamValue::Bool(s == "true");
        }
        if let Some((a, b)) = s.split_once(',') {
            if let (Ok(a), Ok(b)) = (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
                return ParamValue::IntPair(a, b);
            }
        }
        ParamValue::Text(s.to_string())
    }

    fn kind(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::IntPair(..) => "int pair",
            ParamValue::Text(_) => "text",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::IntPair(a, b) => write!(f, "({a}, {b})"),
            ParamValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<(i64, i64)> for ParamValue {
    fn from((a, b): (i64, i64)) -> Self {
        ParamValue::IntPair(a, b)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

// ---------------------------------------------------------------------------
// ParamSet – named settings
// ---------------------------------------------------------------------------

/// Named algorithm settings, either declared defaults or caller overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet {
    values: BTreeMap<String, ParamValue>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Merge `overrides` into these declared defaults.
    ///
    /// Every override must name a declared parameter; `y` and `x` are always
    /// rejected since decomposition supplies them.
    pub fn merge_overrides(&self, overrides: &ParamSet, method: &str) -> Result<ParamSet> {
        let mut merged = self.clone();
        for (name, value) in overrides.iter() {
            if RESERVED_NAMES.contains(&name) {
                return Err(PrepError::ReservedParameter(name.to_string()));
            }
            if !self.contains(name) {
                return Err(PrepError::UnknownParameter {
                    method: method.to_string(),
                    name: name.to_string(),
                });
            }
            merged.insert(name, value.clone());
        }
        Ok(merged)
    }

    // -- Typed accessors used by the processing methods --

    fn require(&self, name: &str) -> Result<&ParamValue> {
        self.get(name)
            .ok_or_else(|| PrepError::invalid_parameter(name, "missing"))
    }

    fn type_error(name: &str, expected: &str, got: &ParamValue) -> PrepError {
        PrepError::invalid_parameter(name, format!("expected {expected}, got {}", got.kind()))
    }

    pub fn float(&self, name: &str) -> Result<f64> {
        match self.require(name)? {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(i) => Ok(*i as f64),
            other => Err(Self::type_error(name, "a number", other)),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        match self.require(name)? {
            ParamValue::Int(i) => Ok(*i),
            ParamValue::Float(v) if v.fract() == 0.0 => Ok(*v as i64),
            other => Err(Self::type_error(name, "an integer", other)),
        }
    }

    pub fn count(&self, name: &str) -> Result<usize> {
        let value = self.int(name)?;
        usize::try_from(value)
            .map_err(|_| PrepError::invalid_parameter(name, format!("{value} is negative")))
    }

    pub fn flag(&self, name: &str) -> Result<bool> {
        match self.require(name)? {
            ParamValue::Bool(b) => Ok(*b),
            ParamValue::Int(i) => Ok(*i != 0),
            other => Err(Self::type_error(name, "a bool", other)),
        }
    }

    pub fn text(&self, name: &str) -> Result<&str> {
        match self.require(name)? {
            ParamValue::Text(s) => Ok(s),
            other => Err(Self::type_error(name, "text", other)),
        }
    }

    pub fn int_pair(&self, name: &str) -> Result<(i64, i64)> {
        match self.require(name)? {
            ParamValue::IntPair(a, b) => Ok((*a, *b)),
            other => Err(Self::type_error(name, "an integer pair", other)),
        }
    }
}

impl<'a> FromIterator<(&'a str, ParamValue)> for ParamSet {
    fn from_iter<I: IntoIterator<Item = (&'a str, ParamValue)>>(iter: I) -> Self {
        let mut set = ParamSet::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}

// ---------------------------------------------------------------------------
// ArgumentSet – one sample plus settings
// ---------------------------------------------------------------------------

/// Arguments for one call of a processing function: the sample `y`, the axis
/// `x` when the layout provides one, and the merged settings.
///
/// Sample data is borrowed from the fold, so a broadcast axis is shared by
/// every argument set of the fold.
#[derive(Debug, Clone, Copy)]
pub struct ArgumentSet<'a> {
    pub y: &'a [f64],
    pub x: Option<&'a [f64]>,
    pub params: &'a ParamSet,
}

impl<'a> ArgumentSet<'a> {
    pub fn new(y: &'a [f64], params: &'a ParamSet) -> Self {
        Self { y, x: None, params }
    }

    pub fn with_x(mut self, x: &'a [f64]) -> Self {
        self.x = Some(x);
        self
    }
}
