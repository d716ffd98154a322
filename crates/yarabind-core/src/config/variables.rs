//! External variable binding.
//!
//! Hosts declare variables as `{type, id, value}` with a numeric type code.
//! Binding checks the code and nothing else: a value that does not fit its
//! declared type is left for the engine to reject.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Variable kinds, numbered as hosts number them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VariableType {
    /// Signed 64-bit integer
    Integer = 1,
    /// 64-bit float
    Float = 2,
    /// Boolean
    Boolean = 3,
    /// Text
    String = 4,
}

impl VariableType {
    /// Numeric code used by hosts
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Returns the name used in messages
    pub fn as_str(self) -> &'static str {
        match self {
            VariableType::Integer => "integer",
            VariableType::Float => "float",
            VariableType::Boolean => "boolean",
            VariableType::String => "string",
        }
    }
}

impl TryFrom<i64> for VariableType {
    type Error = Error;

    fn try_from(code: i64) -> Result<Self> {
        match code {
            1 => Ok(VariableType::Integer),
            2 => Ok(VariableType::Float),
            3 => Ok(VariableType::Boolean),
            4 => Ok(VariableType::String),
            _ => Err(Error::UnknownVariableType { code }),
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A variable value as supplied by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    /// Boolean
    Boolean(bool),
    /// Integer
    Integer(i64),
    /// Float
    Float(f64),
    /// Text
    String(String),
}

/// Host-facing variable declaration: `{type, id, value}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Raw type code; 0 when omitted
    #[serde(rename = "type", default)]
    pub type_code: i64,
    /// Variable identifier
    pub id: String,
    /// Declared value
    pub value: VariableValue,
}

/// A bound variable with a recognized type
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Declared kind
    pub kind: VariableType,
    /// Identifier referenced by rules
    pub id: String,
    /// Value, passed through unchanged
    pub value: VariableValue,
}

impl Variable {
    /// Creates a new variable
    pub fn new(kind: VariableType, id: impl Into<String>, value: VariableValue) -> Self {
        Self {
            kind,
            id: id.into(),
            value,
        }
    }

    /// Creates an integer variable
    pub fn integer(id: impl Into<String>, value: i64) -> Self {
        Self::new(VariableType::Integer, id, VariableValue::Integer(value))
    }

    /// Creates a float variable
    pub fn float(id: impl Into<String>, value: f64) -> Self {
        Self::new(VariableType::Float, id, VariableValue::Float(value))
    }

    /// Creates a boolean variable
    pub fn boolean(id: impl Into<String>, value: bool) -> Self {
        Self::new(VariableType::Boolean, id, VariableValue::Boolean(value))
    }

    /// Creates a string variable
    pub fn string(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(VariableType::String, id, VariableValue::String(value.into()))
    }
}

impl From<Variable> for VariableSpec {
    fn from(variable: Variable) -> Self {
        Self {
            type_code: variable.kind.code(),
            id: variable.id,
            value: variable.value,
        }
    }
}

/// Bind one declaration
pub fn bind(spec: &VariableSpec) -> Result<Variable> {
    let kind = VariableType::try_from(spec.type_code)?;
    Ok(Variable::new(kind, spec.id.clone(), spec.value.clone()))
}

/// Bind every declaration, stopping at the first failure
pub fn bind_all(specs: &[VariableSpec]) -> Result<Vec<Variable>> {
    specs.iter().map(bind).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bind_recognized_types() {
        let specs: Vec<VariableSpec> = serde_json::from_str(
            r#"[
                {"type": 1, "id": "skill_level", "value": 34},
                {"type": 2, "id": "percent", "value": 0.45},
                {"type": 3, "id": "isYara", "value": true},
                {"type": 4, "id": "name", "value": "stephen"}
            ]"#,
        )
        .unwrap();

        let bound = bind_all(&specs).unwrap();
        assert_eq!(
            bound,
            vec![
                Variable::integer("skill_level", 34),
                Variable::float("percent", 0.45),
                Variable::boolean("isYara", true),
                Variable::string("name", "stephen"),
            ]
        );
    }

    #[test]
    fn test_missing_type_defaults_to_zero() {
        let spec: VariableSpec =
            serde_json::from_str(r#"{"id": "skill_level", "value": 34}"#).unwrap();
        assert_eq!(spec.type_code, 0);

        let err = bind(&spec).unwrap_err();
        assert!(matches!(err, Error::UnknownVariableType { code: 0 }));
        assert_eq!(err.to_string(), "Unknown variable type: 0");
    }

    #[test]
    fn test_unknown_type_echoes_code() {
        let spec = VariableSpec {
            type_code: 42,
            id: "x".into(),
            value: VariableValue::Integer(1),
        };
        assert_eq!(bind(&spec).unwrap_err().to_string(), "Unknown variable type: 42");
    }

    #[test]
    fn test_bind_all_stops_at_first_failure() {
        let specs = vec![
            Variable::integer("a", 1).into(),
            VariableSpec {
                type_code: 9,
                id: "b".into(),
                value: VariableValue::Integer(2),
            },
            VariableSpec {
                type_code: 7,
                id: "c".into(),
                value: VariableValue::Integer(3),
            },
        ];
        assert!(matches!(
            bind_all(&specs),
            Err(Error::UnknownVariableType { code: 9 })
        ));
    }

    #[test]
    fn test_no_coercion() {
        // A string value declared as an integer is passed through as-is.
        let spec = VariableSpec {
            type_code: 1,
            id: "age".into(),
            value: VariableValue::String("35".into()),
        };
        let bound = bind(&spec).unwrap();
        assert_eq!(bound.kind, VariableType::Integer);
        assert_eq!(bound.value, VariableValue::String("35".into()));
    }
}
