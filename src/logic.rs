//! Logic expression evaluator.
//!
//! Rules are JSON objects in the json-logic style: a single operator key
//! whose value is the argument list, e.g.
//! `{"*": [{"var": "qty"}, {"var": "price"}]}`. Arguments are themselves
//! rules; non-object values are literals. Rules are evaluated against a
//! data record, read through `var` with dotted paths.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LogicError {
    #[error("unknown logic operator '{0}'")]
    UnknownOperator(String),
    #[error("operator '{op}' expects {expected} argument(s), got {got}")]
    Arity {
        op: String,
        expected: &'static str,
        got: usize,
    },
    #[error("operator '{op}' needs numbers, got {value}")]
    NotNumeric { op: String, value: String },
    #[error("division by zero")]
    DivisionByZero,
}

/// Accept a rule either inline or as a string holding JSON.
///
/// Strings that aren't JSON are treated as literal values.
pub fn parse_rule(raw: &Value) -> Value {
    match raw {
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| raw.clone()),
        other => other.clone(),
    }
}

/// Evaluate a rule against a data record.
pub fn apply(rule: &Value, data: &Value) -> Result<Value, LogicError> {
    match rule {
        Value::Object(map) if map.len() == 1 => {
            let Some((op, raw_args)) = map.iter().next() else {
                return Ok(rule.clone());
            };
            let args: Vec<&Value> = match raw_args {
                Value::Array(items) => items.iter().collect(),
                single => vec![single],
            };
            apply_op(op, &args, data)
        }
        Value::Array(items) => items
            .iter()
            .map(|item| apply(item, data))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        _ => Ok(rule.clone()),
    }
}

fn apply_op(op: &str, args: &[&Value], data: &Value) -> Result<Value, LogicError> {
    match op {
        "var" => evaluate_var(args, data),
        "if" | "?:" => evaluate_if(args, data),
        "and" => {
            let mut last = Value::Bool(true);
            for arg in args {
                last = apply(arg, data)?;
                if !is_truthy(&last) {
                    break;
                }
            }
            Ok(last)
        }
        "or" => {
            let mut last = Value::Bool(false);
            for arg in args {
                last = apply(arg, data)?;
                if is_truthy(&last) {
                    break;
                }
            }
            Ok(last)
        }
        "!" => {
            let value = single_arg(op, args, data)?;
            Ok(Value::Bool(!is_truthy(&value)))
        }
        "!!" => {
            let value = single_arg(op, args, data)?;
            Ok(Value::Bool(is_truthy(&value)))
        }
        "==" | "!=" | "===" | "!==" => {
            let [a, b] = pair(op, args, data)?;
            let equal = if op.len() == 3 {
                a == b
            } else {
                loose_equals(&a, &b)
            };
            Ok(Value::Bool(if op.starts_with('!') { !equal } else { equal }))
        }
        "<" | "<=" | ">" | ">=" => evaluate_comparison(op, args, data),
        "+" => {
            let values = numbers(op, args, data)?;
            Ok(number(values.iter().sum()))
        }
        "*" => {
            let values = numbers(op, args, data)?;
            if values.is_empty() {
                return Err(arity(op, "at least 1", 0));
            }
            Ok(number(values.iter().product()))
        }
        "-" => {
            let values = numbers(op, args, data)?;
            match values.as_slice() {
                [a] => Ok(number(-a)),
                [a, b] => Ok(number(a - b)),
                _ => Err(arity(op, "1 or 2", values.len())),
            }
        }
        "/" | "%" => {
            let values = numbers(op, args, data)?;
            let [a, b] = values.as_slice() else {
                return Err(arity(op, "2", values.len()));
            };
            if *b == 0.0 {
                return Err(LogicError::DivisionByZero);
            }
            Ok(number(if op == "/" { a / b } else { a % b }))
        }
        "min" | "max" => {
            let values = numbers(op, args, data)?;
            let folded = values.iter().copied().reduce(|acc, v| {
                if (op == "min" && v < acc) || (op == "max" && v > acc) {
                    v
                } else {
                    acc
                }
            });
            Ok(folded.map_or(Value::Null, number))
        }
        "cat" => {
            let mut result = String::new();
            for arg in args {
                result.push_str(&value_to_string(&apply(arg, data)?));
            }
            Ok(Value::String(result))
        }
        "in" => {
            let [needle, haystack] = pair(op, args, data)?;
            let found = match &haystack {
                Value::String(s) => s.contains(&value_to_string(&needle)),
                Value::Array(items) => items.iter().any(|item| loose_equals(item, &needle)),
                _ => false,
            };
            Ok(Value::Bool(found))
        }
        other => Err(LogicError::UnknownOperator(other.to_string())),
    }
}

// ─── Operator helpers ───────────────────────────────────────────────

fn evaluate_var(args: &[&Value], data: &Value) -> Result<Value, LogicError> {
    let path = match args.first() {
        Some(arg) => apply(arg, data)?,
        None => Value::Null,
    };
    let default = match args.get(1) {
        Some(arg) => apply(arg, data)?,
        None => Value::Null,
    };

    let path = match &path {
        Value::Null => return Ok(data.clone()),
        Value::String(s) if s.is_empty() => return Ok(data.clone()),
        other => value_to_string(other),
    };
    let parts: Vec<&str> = path.split('.').collect();
    Ok(traverse(data, &parts).cloned().unwrap_or(default))
}

fn evaluate_if(args: &[&Value], data: &Value) -> Result<Value, LogicError> {
    for chunk in args.chunks(2) {
        match chunk {
            [condition, then] => {
                if is_truthy(&apply(condition, data)?) {
                    return apply(then, data);
                }
            }
            [otherwise] => return apply(otherwise, data),
            _ => {}
        }
    }
    Ok(Value::Null)
}

fn evaluate_comparison(op: &str, args: &[&Value], data: &Value) -> Result<Value, LogicError> {
    let values = args
        .iter()
        .map(|arg| apply(arg, data))
        .collect::<Result<Vec<_>, _>>()?;
    let holds = |a: &Value, b: &Value| compare_values(a, b, op);
    match values.as_slice() {
        [a, b] => Ok(Value::Bool(holds(a, b))),
        // Between: {"<": [low, x, high]}
        [a, b, c] if op == "<" || op == "<=" => Ok(Value::Bool(holds(a, b) && holds(b, c))),
        _ => Err(arity(op, "2", values.len())),
    }
}

fn single_arg(op: &str, args: &[&Value], data: &Value) -> Result<Value, LogicError> {
    match args {
        [arg] => apply(arg, data),
        _ => Err(arity(op, "1", args.len())),
    }
}

fn pair(op: &str, args: &[&Value], data: &Value) -> Result<[Value; 2], LogicError> {
    match args {
        [a, b] => Ok([apply(a, data)?, apply(b, data)?]),
        _ => Err(arity(op, "2", args.len())),
    }
}

fn numbers(op: &str, args: &[&Value], data: &Value) -> Result<Vec<f64>, LogicError> {
    args.iter()
        .map(|arg| {
            let value = apply(arg, data)?;
            as_f64(&value).ok_or_else(|| LogicError::NotNumeric {
                op: op.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

fn arity(op: &str, expected: &'static str, got: usize) -> LogicError {
    LogicError::Arity {
        op: op.to_string(),
        expected,
        got,
    }
}

fn number(value: f64) -> Value {
    serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
}

// ─── Value helpers ──────────────────────────────────────────────────

/// Traverse a JSON value by dot-path segments.
fn traverse<'a>(value: &'a Value, parts: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for part in parts {
        match current {
            Value::Object(map) => {
                current = map.get(*part)?;
            }
            Value::Array(arr) => {
                let idx: usize = part.parse().ok()?;
                current = arr.get(idx)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

/// Numeric view of a value. Numeric strings count; null is zero.
pub fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        Value::Null => Some(0.0),
        _ => None,
    }
}

/// Numbers compare as f64, strings lexically, anything else is false.
fn compare_values(a: &Value, b: &Value, op: &str) -> bool {
    if let (Some(na), Some(nb)) = (as_f64(a), as_f64(b)) {
        return match op {
            "<" => na < nb,
            "<=" => na <= nb,
            ">" => na > nb,
            _ => na >= nb,
        };
    }
    match (a.as_str(), b.as_str()) {
        (Some(sa), Some(sb)) => match op {
            "<" => sa < sb,
            "<=" => sa <= sb,
            ">" => sa > sb,
            _ => sa >= sb,
        },
        _ => false,
    }
}

fn loose_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(sa), Value::String(sb)) => sa == sb,
        _ => match (as_f64(a), as_f64(b)) {
            (Some(na), Some(nb)) => na == nb,
            _ => a == b,
        },
    }
}

/// Determine if a JSON value is truthy.
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(_) => true,
    }
}

/// Convert a JSON value to display text. Compound values serialize as JSON.
pub fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => f.to_string(),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => v.to_string(),
    }
}

/// Build a single-operator rule; handy for callers composing formulas.
pub fn rule(op: &str, args: Value) -> Value {
    let mut map = Map::new();
    map.insert(op.to_string(), args);
    Value::Object(map)
}
