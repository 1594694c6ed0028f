//! Instruction tree parsing.
//!
//! An instruction tree is a JSON array of single-key objects:
//!
//! ```json
//! [
//!   { "addpage": {} },
//!   { "setfont": { "family": "Arial", "size": 9 } },
//!   { "table": { "index": 0, "body": [ { "row": [ ... ] } ] } }
//! ]
//! ```
//!
//! The key is the operation name, the value its parameter object. A few
//! operations (`setheaderfunc`, `setfooterfunc`) also accept a bare
//! instruction array as their value.

use serde_json::{Map, Value};

use crate::error::FormpressError;

/// One operation with its raw arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub op: String,
    pub args: Value,
}

static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();

impl Instruction {
    /// The parameter object. Array or null arguments give an empty map.
    pub fn params(&self) -> &Map<String, Value> {
        match &self.args {
            Value::Object(map) => map,
            _ => EMPTY.get_or_init(Map::new),
        }
    }
}

/// Parse a JSON string into an instruction list.
pub fn parse_str(json: &str) -> Result<Vec<Instruction>, FormpressError> {
    let value: Value = serde_json::from_str(json)?;
    parse(&value)
}

/// Parse an instruction array.
///
/// This is the one place a malformed structure is fatal: anything other
/// than an array of single-key objects with object/array/null values is
/// rejected with [`FormpressError::InvalidOperation`].
pub fn parse(value: &Value) -> Result<Vec<Instruction>, FormpressError> {
    let items = value.as_array().ok_or_else(|| {
        FormpressError::InvalidOperation(format!(
            "expected an array of operations, found {}",
            json_kind(value)
        ))
    })?;

    items
        .iter()
        .enumerate()
        .map(|(position, item)| parse_one(position, item))
        .collect()
}

fn parse_one(position: usize, item: &Value) -> Result<Instruction, FormpressError> {
    let map = item.as_object().ok_or_else(|| {
        FormpressError::InvalidOperation(format!(
            "operation #{position} must be an object, found {}",
            json_kind(item)
        ))
    })?;

    let mut entries = map.iter();
    let (op, args) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        _ => {
            return Err(FormpressError::InvalidOperation(format!(
                "operation #{position} must have exactly one key, found {}",
                map.len()
            )))
        }
    };

    match args {
        Value::Object(_) | Value::Array(_) | Value::Null => Ok(Instruction {
            op: op.clone(),
            args: args.clone(),
        }),
        other => Err(FormpressError::InvalidOperation(format!(
            "parameters of '{op}' must be an object, found {}",
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
