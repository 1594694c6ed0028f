//! # Value Resolver
//!
//! Typed parameter lookup. A parameter's raw value is used as-is unless it
//! is an object, in which case it is an operand:
//!
//! - `{"logic": rule}` evaluates a logic rule against the caller's record.
//! - `{"field": "{field:title}: {field:value}"}` fills a template from the
//!   field registry entry at the current row.
//! - `{"form": "title"}` / `{"submission": "created_at"}` read metadata
//!   (`title`, `created_by`, `created_at`).
//!
//! Anything unresolvable yields the caller's fallback. Operands are only
//! evaluated one level deep.

use serde_json::{Map, Value};
use tracing::debug;

use crate::format;
use crate::logic;
use crate::model::{RecordMeta, RenderData, RenderOptions, Scalar};

/// Resolves parameters against the render inputs.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    pub data: &'a RenderData,
    pub options: &'a RenderOptions,
    /// Row index used by `field` operands.
    pub row_index: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(data: &'a RenderData, options: &'a RenderOptions, row_index: usize) -> Self {
        Self {
            data,
            options,
            row_index,
        }
    }

    /// The parameter as a scalar, with operands evaluated. `None` when the
    /// parameter is absent, null, or does not resolve to a scalar.
    pub fn scalar(&self, params: &Map<String, Value>, name: &str) -> Option<Scalar> {
        let raw = params.get(name)?;
        let value = match raw {
            Value::Object(operand) => self.operand(operand)?,
            other => other.clone(),
        };
        match Scalar::from_json(&value)? {
            Scalar::Null => None,
            scalar => Some(scalar),
        }
    }

    pub fn string(&self, params: &Map<String, Value>, name: &str, fallback: &str) -> String {
        self.scalar(params, name)
            .map_or_else(|| fallback.to_string(), |s| s.to_text())
    }

    pub fn float(&self, params: &Map<String, Value>, name: &str, fallback: f64) -> f64 {
        self.scalar(params, name).map_or(fallback, |s| s.to_f64())
    }

    pub fn int(&self, params: &Map<String, Value>, name: &str, fallback: i64) -> i64 {
        self.scalar(params, name).map_or(fallback, |s| s.to_i64())
    }

    pub fn boolean(&self, params: &Map<String, Value>, name: &str, fallback: bool) -> bool {
        self.scalar(params, name).map_or(fallback, |s| s.to_bool())
    }

    /// Evaluate an operand object. Unknown operand kinds resolve to `None`.
    pub fn operand(&self, operand: &Map<String, Value>) -> Option<Value> {
        if let Some(rule) = operand.get("logic") {
            return self.logic_operand(rule);
        }
        if let Some(template) = operand.get("field") {
            return self.field_operand(template.as_str()?).map(Value::String);
        }
        if let Some(attribute) = operand.get("form") {
            return self
                .meta_operand(self.data.form.as_ref(), attribute.as_str()?)
                .map(Value::String);
        }
        if let Some(attribute) = operand.get("submission") {
            return self
                .meta_operand(self.data.submission.as_ref(), attribute.as_str()?)
                .map(Value::String);
        }
        debug!(keys = ?operand.keys().collect::<Vec<_>>(), "unrecognised operand");
        None
    }

    fn logic_operand(&self, rule: &Value) -> Option<Value> {
        let rule = logic::parse_rule(rule);
        match logic::apply(&rule, &self.data.record) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(error = %e, "logic operand failed");
                None
            }
        }
    }

    fn field_operand(&self, template: &str) -> Option<String> {
        let entry = self.data.fields.get(self.row_index)?;
        Some(
            template
                .replace("{field:title}", &entry.title)
                .replace("{field:value}", &entry.value.to_text()),
        )
    }

    fn meta_operand(&self, meta: Option<&RecordMeta>, attribute: &str) -> Option<String> {
        let meta = meta?;
        match attribute {
            "title" => Some(meta.title.clone()),
            "created_by" => meta.created_by.as_ref().map(|u| u.display_name.clone()),
            "created_at" => meta
                .created_at
                .as_ref()
                .map(|at| format::format_datetime(at, &self.options.timestamp_format)),
            _ => None,
        }
    }
}
