//! Structural conversion of variable values.
//!
//! The executor coerces resolved task variables into the [`TargetShape`]
//! declared by each parameter binding, and flattens handler results into
//! named variables. Both go through a [`Converter`]. Conversion errors are
//! never fatal; callers fall back to the unconverted value.

use serde_json::{Number, Value};
use thiserror::Error;

use crate::task::Variables;

/// The shape a bound argument is coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TargetShape {
    /// Accept any value as-is.
    #[default]
    Any,
    /// A JSON string.
    String,
    /// A whole number.
    Integer,
    /// A floating point number.
    Float,
    /// `true` or `false`.
    Boolean,
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
}

impl TargetShape {
    /// Returns `true` if `value` already has this shape and needs no conversion.
    pub fn is_satisfied_by(&self, value: &Value) -> bool {
        match self {
            TargetShape::Any => true,
            TargetShape::String => value.is_string(),
            TargetShape::Integer => value.is_i64() || value.is_u64(),
            TargetShape::Float => value.is_number(),
            TargetShape::Boolean => value.is_boolean(),
            TargetShape::Object => value.is_object(),
            TargetShape::Array => value.is_array(),
        }
    }
}

impl std::fmt::Display for TargetShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TargetShape::Any => "any",
            TargetShape::String => "string",
            TargetShape::Integer => "integer",
            TargetShape::Float => "float",
            TargetShape::Boolean => "boolean",
            TargetShape::Object => "object",
            TargetShape::Array => "array",
        };
        f.write_str(name)
    }
}

/// A value could not be converted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// The value cannot be represented in the target shape.
    #[error("cannot convert {found} value to {target}")]
    Incompatible {
        /// Kind of the source value.
        found: &'static str,
        /// Requested shape.
        target: TargetShape,
    },

    /// The value has the right kind but its content does not parse.
    #[error("cannot parse {value:?} as {target}")]
    Unparseable {
        /// The textual source value.
        value: String,
        /// Requested shape.
        target: TargetShape,
    },

    /// The value cannot be split into named entries.
    #[error("cannot flatten {found} value into named variables")]
    NotFlattenable {
        /// Kind of the source value.
        found: &'static str,
    },
}

/// Converts variable values between shapes.
///
/// Implementations must be pure; the executor may call them concurrently
/// from many tasks.
pub trait Converter: Send + Sync + 'static {
    /// Convert `value` into `target`.
    fn convert(&self, value: &Value, target: TargetShape) -> Result<Value, ConversionError>;

    /// Split `value` into named entries for result flattening.
    fn to_entries(&self, value: &Value) -> Result<Variables, ConversionError>;
}

/// Lenient JSON converter.
///
/// Accepts numeric and boolean strings, renders scalars as strings, and
/// converts between integer and float forms when no precision is lost.
/// Only objects can be flattened.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl Converter for JsonConverter {
    fn convert(&self, value: &Value, target: TargetShape) -> Result<Value, ConversionError> {
        if target.is_satisfied_by(value) {
            return Ok(value.clone());
        }

        match (target, value) {
            (TargetShape::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (TargetShape::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),

            (TargetShape::Integer, Value::String(s)) => {
                let trimmed = s.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    return Ok(Value::from(i));
                }
                trimmed
                    .parse::<u64>()
                    .map(Value::from)
                    .map_err(|_| unparseable(s, target))
            }
            (TargetShape::Integer, Value::Number(n)) => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| Value::from(f as i64))
                .ok_or_else(|| unparseable(&n.to_string(), target)),

            (TargetShape::Float, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| unparseable(s, target)),

            (TargetShape::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(unparseable(s, target)),
            },

            (target, value) => Err(ConversionError::Incompatible {
                found: kind_of(value),
                target,
            }),
        }
    }

    fn to_entries(&self, value: &Value) -> Result<Variables, ConversionError> {
        match value {
            Value::Object(map) => Ok(map.clone()),
            other => Err(ConversionError::NotFlattenable {
                found: kind_of(other),
            }),
        }
    }
}

fn unparseable(value: &str, target: TargetShape) -> ConversionError {
    ConversionError::Unparseable {
        value: value.to_string(),
        target,
    }
}

/// Human readable kind of a JSON value.
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
