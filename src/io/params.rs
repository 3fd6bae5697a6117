//! Parameter file loading.
//!
//! A parameter file is a flat JSON object mapping full parameter names to
//! values:
//!
//! ```json
//! {
//!   "Ts/SequenceVerbosity": 1,
//!   "Vr/Split/Type": "UniformSplitting",
//!   "Vr/Split/ForRegion/Target/SplitNumber": [4, 2],
//!   "Vr/Split/ForRegion/Target/MaximumEnergies": { "value": [1.0, 500.0], "unit": "keV" }
//! }
//! ```
//!
//! Scalars map to their natural type, homogeneous arrays to vectors, and
//! `{ "value", "unit" }` objects to dimensioned doubles. Names differing only
//! in case collide; the first one in file order wins.

use std::fs::File;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::AppError;
use crate::params::{ParameterStore, ParameterValue};

/// Read a parameter file into a store.
pub fn read_parameters_json(path: &Path) -> Result<ParameterStore, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open parameter file '{}': {e}", path.display())))?;
    let root: Value = serde_json::from_reader(file)
        .map_err(|e| AppError::input(format!("Invalid parameter JSON '{}': {e}", path.display())))?;
    parameters_from_json(&root)
}

/// Convert an already parsed JSON document into a store.
pub fn parameters_from_json(root: &Value) -> Result<ParameterStore, AppError> {
    let Value::Object(entries) = root else {
        return Err(AppError::input("Parameter file must contain a JSON object."));
    };

    let mut store = ParameterStore::new();
    for (name, raw) in entries {
        if store.exists(name) {
            log::warn!("Ignoring parameter {name}: a parameter with the same name in another case was already read");
            continue;
        }
        store.insert(name.clone(), convert(name, raw)?);
    }
    log::debug!("Read {} parameter(s)", store.len());
    Ok(store)
}

fn convert(name: &str, raw: &Value) -> Result<ParameterValue, AppError> {
    match raw {
        Value::Bool(value) => Ok(ParameterValue::Boolean(*value)),
        Value::Number(number) => Ok(match number.as_i64() {
            Some(value) => ParameterValue::Integer(value),
            None => ParameterValue::Double {
                value: number_value(name, number)?,
                unit: None,
            },
        }),
        Value::String(value) => Ok(ParameterValue::String(value.clone())),
        Value::Array(items) => convert_array(name, items, None),
        Value::Object(fields) => convert_dimensioned(name, fields),
        Value::Null => Err(bad_value(name, "null is not a parameter value")),
    }
}

fn convert_dimensioned(name: &str, fields: &Map<String, Value>) -> Result<ParameterValue, AppError> {
    let unit = match fields.get("unit") {
        Some(Value::String(unit)) => Some(unit.clone()),
        None | Some(Value::Null) => None,
        Some(_) => return Err(bad_value(name, "\"unit\" must be a string")),
    };
    match fields.get("value") {
        Some(Value::Number(number)) => Ok(ParameterValue::Double {
            value: number_value(name, number)?,
            unit,
        }),
        Some(Value::Array(items)) => convert_array(name, items, unit),
        _ => Err(bad_value(name, "expected a numeric \"value\" next to \"unit\"")),
    }
}

fn convert_array(name: &str, items: &[Value], unit: Option<String>) -> Result<ParameterValue, AppError> {
    if unit.is_none() {
        if let Some(values) = items.iter().map(Value::as_bool).collect::<Option<Vec<_>>>() {
            if !values.is_empty() {
                return Ok(ParameterValue::BooleanVector(values));
            }
        }
        if let Some(values) = items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
        {
            return Ok(ParameterValue::StringVector(values));
        }
        if let Some(values) = items.iter().map(Value::as_i64).collect::<Option<Vec<_>>>() {
            return Ok(ParameterValue::IntegerVector(values));
        }
    }
    let values = items
        .iter()
        .map(Value::as_f64)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| bad_value(name, "arrays must hold values of a single type"))?;
    Ok(ParameterValue::DoubleVector { values, unit })
}

fn number_value(name: &str, number: &serde_json::Number) -> Result<f64, AppError> {
    number
        .as_f64()
        .ok_or_else(|| bad_value(name, "number is out of range"))
}

fn bad_value(name: &str, message: &str) -> AppError {
    AppError::input(format!("Invalid value for parameter {name}: {message}."))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::params::Dimension;

    #[test]
    fn values_map_to_parameter_shapes() {
        let store = parameters_from_json(&json!({
            "Ts/SequenceVerbosity": 1,
            "Vr/Split/Type": "UniformSplitting",
            "Vr/Split/ForRegion/Target/ProcessesNamed": ["eBrem", "annihil"],
            "Vr/Split/ForRegion/Target/SplitNumber": [4, 2],
            "Vr/Split/ForRegion/Target/MaximumEnergies": { "value": [1.0, 500.0], "unit": "keV" },
            "Vr/Split/UseDirectionalSplitting": true,
            "Vr/Split/RMax": { "value": 2.5, "unit": "cm" },
            "Vr/Ww/UpperLimitFactor": 5.0
        }))
        .unwrap();

        assert_eq!(store.verbosity(), 1);
        assert_eq!(
            store.string_vector("Vr/Split/ForRegion/Target/ProcessesNamed").unwrap(),
            vec!["eBrem".to_string(), "annihil".to_string()]
        );
        assert_eq!(
            store.integer_vector("Vr/Split/ForRegion/Target/SplitNumber").unwrap(),
            vec![4, 2]
        );
        assert!(store.boolean("Vr/Split/UseDirectionalSplitting").unwrap());
        assert!((store.double("Vr/Split/RMax", Dimension::Length).unwrap() - 25.0).abs() < 1e-9);
        assert!((store.unitless("Vr/Ww/UpperLimitFactor").unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn case_duplicates_keep_the_first_key() {
        let store = parameters_from_json(&json!({
            "Vr/A/Type": "KillOtherParticles",
            "vr/a/type": "WeightWindow"
        }))
        .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.string("VR/A/TYPE").unwrap(), "KillOtherParticles");
    }

    #[test]
    fn case_duplicates_follow_file_order_not_sorted_order() {
        // "vr/..." sorts after "Vr/..." but comes first in the file.
        let store = parameters_from_json(
            &serde_json::from_str(r#"{ "vr/a/type": "WeightWindow", "Vr/A/Type": "KillOtherParticles" }"#)
                .unwrap(),
        )
        .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.string("Vr/A/Type").unwrap(), "WeightWindow");
    }

    #[test]
    fn malformed_values_are_input_errors() {
        let err = parameters_from_json(&json!({ "Vr/A/Mixed": [1, "two"] })).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
        assert!(parameters_from_json(&json!([1, 2])).is_err());
        assert!(parameters_from_json(&json!({ "Vr/A/Null": null })).is_err());
    }
}
