//! Hierarchical parameter store.
//!
//! Names are slash-separated (`Vr/<name>/<property>`) and case-insensitive.
//! Every typed lookup returns `AppError::quit` naming the offending parameter
//! when the value is missing or has the wrong shape, so techniques can simply
//! propagate with `?`.
//!
//! The store is built once by the host and shared read-only between execution
//! contexts (`Arc<ParameterStore>`).

use std::collections::BTreeMap;

use crate::error::AppError;

pub mod units;

pub use units::Dimension;

/// Parameter name holding the global verbosity level.
pub const VERBOSITY_PARAMETER: &str = "Ts/SequenceVerbosity";

/// Typed parameter value.
///
/// Dimensioned doubles keep their unit string; conversion happens at lookup
/// time against the dimension the caller expects.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Boolean(bool),
    Integer(i64),
    Double { value: f64, unit: Option<String> },
    String(String),
    BooleanVector(Vec<bool>),
    IntegerVector(Vec<i64>),
    DoubleVector { values: Vec<f64>, unit: Option<String> },
    StringVector(Vec<String>),
}

impl ParameterValue {
    fn shape(&self) -> &'static str {
        match self {
            ParameterValue::Boolean(_) => "boolean",
            ParameterValue::Integer(_) => "integer",
            ParameterValue::Double { .. } => "double",
            ParameterValue::String(_) => "string",
            ParameterValue::BooleanVector(_) => "boolean vector",
            ParameterValue::IntegerVector(_) => "integer vector",
            ParameterValue::DoubleVector { .. } => "double vector",
            ParameterValue::StringVector(_) => "string vector",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Parameter {
    name: String,
    value: ParameterValue,
}

#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    entries: BTreeMap<String, Parameter>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter. The original spelling of `name` is kept
    /// for enumeration and diagnostics.
    pub fn insert(&mut self, name: impl Into<String>, value: ParameterValue) {
        let name = name.into();
        self.entries.insert(name.to_lowercase(), Parameter { name, value });
    }

    /// Builder-style `insert`.
    pub fn with(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    /// Names (original spelling) that start with `prefix` and end with `suffix`,
    /// both compared case-insensitively, in lower-cased lexical order.
    pub fn names_bracketed_by(&self, prefix: &str, suffix: &str) -> Vec<String> {
        let prefix = prefix.to_lowercase();
        let suffix = suffix.to_lowercase();
        self.entries
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, _)| key.len() >= prefix.len() + suffix.len() && key.ends_with(&suffix))
            .map(|(_, parameter)| parameter.name.clone())
            .collect()
    }

    fn lookup(&self, name: &str) -> Result<&ParameterValue, AppError> {
        self.entries
            .get(&name.to_lowercase())
            .map(|parameter| &parameter.value)
            .ok_or_else(|| AppError::quit(name, "Parameter is required but has not been set."))
    }

    fn mismatch(name: &str, expected: &str, found: &ParameterValue) -> AppError {
        AppError::quit(
            name,
            format!("Expected a {expected} parameter, found a {}.", found.shape()),
        )
    }

    pub fn string(&self, name: &str) -> Result<String, AppError> {
        match self.lookup(name)? {
            ParameterValue::String(value) => Ok(value.clone()),
            other => Err(Self::mismatch(name, "string", other)),
        }
    }

    /// String vector. A single string is accepted as a one-element vector.
    pub fn string_vector(&self, name: &str) -> Result<Vec<String>, AppError> {
        match self.lookup(name)? {
            ParameterValue::StringVector(values) => Ok(values.clone()),
            ParameterValue::String(value) => Ok(vec![value.clone()]),
            other => Err(Self::mismatch(name, "string vector", other)),
        }
    }

    pub fn boolean(&self, name: &str) -> Result<bool, AppError> {
        match self.lookup(name)? {
            ParameterValue::Boolean(value) => Ok(*value),
            other => Err(Self::mismatch(name, "boolean", other)),
        }
    }

    /// Boolean that defaults to `default` when the parameter is absent.
    pub fn boolean_or(&self, name: &str, default: bool) -> Result<bool, AppError> {
        if self.exists(name) {
            self.boolean(name)
        } else {
            Ok(default)
        }
    }

    pub fn boolean_vector(&self, name: &str) -> Result<Vec<bool>, AppError> {
        match self.lookup(name)? {
            ParameterValue::BooleanVector(values) => Ok(values.clone()),
            ParameterValue::Boolean(value) => Ok(vec![*value]),
            other => Err(Self::mismatch(name, "boolean vector", other)),
        }
    }

    pub fn integer(&self, name: &str) -> Result<i64, AppError> {
        match self.lookup(name)? {
            ParameterValue::Integer(value) => Ok(*value),
            other => Err(Self::mismatch(name, "integer", other)),
        }
    }

    pub fn integer_vector(&self, name: &str) -> Result<Vec<i64>, AppError> {
        match self.lookup(name)? {
            ParameterValue::IntegerVector(values) => Ok(values.clone()),
            ParameterValue::Integer(value) => Ok(vec![*value]),
            other => Err(Self::mismatch(name, "integer vector", other)),
        }
    }

    /// Dimensionless double. Integers are widened.
    pub fn unitless(&self, name: &str) -> Result<f64, AppError> {
        match self.lookup(name)? {
            ParameterValue::Double { value, unit: None } => Ok(*value),
            ParameterValue::Integer(value) => Ok(*value as f64),
            ParameterValue::Double { unit: Some(unit), .. } => Err(AppError::quit(
                name,
                format!("Expected a unitless value, found unit \"{unit}\"."),
            )),
            other => Err(Self::mismatch(name, "unitless", other)),
        }
    }

    pub fn unitless_vector(&self, name: &str) -> Result<Vec<f64>, AppError> {
        match self.lookup(name)? {
            ParameterValue::DoubleVector { values, unit: None } => Ok(values.clone()),
            ParameterValue::IntegerVector(values) => Ok(values.iter().map(|v| *v as f64).collect()),
            ParameterValue::Double { value, unit: None } => Ok(vec![*value]),
            ParameterValue::Integer(value) => Ok(vec![*value as f64]),
            ParameterValue::DoubleVector { unit: Some(unit), .. }
            | ParameterValue::Double { unit: Some(unit), .. } => Err(AppError::quit(
                name,
                format!("Expected unitless values, found unit \"{unit}\"."),
            )),
            other => Err(Self::mismatch(name, "unitless vector", other)),
        }
    }

    /// Dimensioned double converted to internal units. A missing unit means the
    /// value is already expressed in internal units.
    pub fn double(&self, name: &str, dimension: Dimension) -> Result<f64, AppError> {
        match self.lookup(name)? {
            ParameterValue::Double { value, unit } => {
                Ok(value * Self::scale(name, dimension, unit.as_deref())?)
            }
            ParameterValue::Integer(value) => Ok(*value as f64),
            other => Err(Self::mismatch(name, "double", other)),
        }
    }

    pub fn double_vector(&self, name: &str, dimension: Dimension) -> Result<Vec<f64>, AppError> {
        match self.lookup(name)? {
            ParameterValue::DoubleVector { values, unit } => {
                let scale = Self::scale(name, dimension, unit.as_deref())?;
                Ok(values.iter().map(|v| v * scale).collect())
            }
            ParameterValue::Double { value, unit } => {
                Ok(vec![value * Self::scale(name, dimension, unit.as_deref())?])
            }
            other => Err(Self::mismatch(name, "double vector", other)),
        }
    }

    /// Number of entries of a vector parameter; scalars count as one.
    pub fn vector_len(&self, name: &str) -> Result<usize, AppError> {
        let len = match self.lookup(name)? {
            ParameterValue::BooleanVector(values) => values.len(),
            ParameterValue::IntegerVector(values) => values.len(),
            ParameterValue::DoubleVector { values, .. } => values.len(),
            ParameterValue::StringVector(values) => values.len(),
            _ => 1,
        };
        Ok(len)
    }

    /// Global verbosity (`Ts/SequenceVerbosity`), 0 when unset or malformed.
    pub fn verbosity(&self) -> i64 {
        self.integer(VERBOSITY_PARAMETER).unwrap_or(0)
    }

    fn scale(name: &str, dimension: Dimension, unit: Option<&str>) -> Result<f64, AppError> {
        match unit {
            None => Ok(1.0),
            Some(unit) => units::scale_to_internal(dimension, unit).ok_or_else(|| {
                AppError::quit(
                    name,
                    format!(
                        "Unit \"{unit}\" is not a valid {dimension:?} unit (internal unit {}).",
                        dimension.internal_unit()
                    ),
                )
            }),
        }
    }
}
