//! # Data Model
//!
//! Everything the caller hands to the interpreter besides the instruction
//! tree: tables of rows and cells, the form field registry, form and
//! submission metadata, global substitutions, and render options.
//!
//! All of it is immutable input. The only mutable state during a render is
//! [`crate::layout::LayoutState`], which lives inside the interpreter.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ── Scalar values ───────────────────────────────────────────────────

/// A polymorphic cell, field, or parameter value.
///
/// Coercions never fail: text that doesn't parse as the requested type
/// becomes that type's zero value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Discriminant of a [`Scalar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Null,
    Bool,
    Int,
    Float,
    Text,
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Null => ScalarKind::Null,
            Scalar::Bool(_) => ScalarKind::Bool,
            Scalar::Int(_) => ScalarKind::Int,
            Scalar::Float(_) => ScalarKind::Float,
            Scalar::Text(_) => ScalarKind::Text,
        }
    }

    /// Convert a JSON value. Arrays and objects have no scalar form.
    pub fn from_json(value: &serde_json::Value) -> Option<Scalar> {
        match value {
            serde_json::Value::Null => Some(Scalar::Null),
            serde_json::Value::Bool(b) => Some(Scalar::Bool(*b)),
            serde_json::Value::Number(n) => Some(match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => Scalar::Float(n.as_f64().unwrap_or(0.0)),
            }),
            serde_json::Value::String(s) => Some(Scalar::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Null => serde_json::Value::Null,
            Scalar::Bool(b) => serde_json::Value::Bool(*b),
            Scalar::Int(i) => serde_json::Value::from(*i),
            Scalar::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Scalar::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Scalar::Null => 0.0,
            Scalar::Bool(b) => f64::from(u8::from(*b)),
            Scalar::Int(i) => *i as f64,
            Scalar::Float(f) => *f,
            Scalar::Text(s) => s.trim().parse().unwrap_or(0.0),
        }
    }

    pub fn to_i64(&self) -> i64 {
        match self {
            Scalar::Null => 0,
            Scalar::Bool(b) => i64::from(*b),
            Scalar::Int(i) => *i,
            Scalar::Float(f) => f.trunc() as i64,
            Scalar::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
                    .unwrap_or(0)
            }
        }
    }

    pub fn to_bool(&self) -> bool {
        match self {
            Scalar::Null => false,
            Scalar::Bool(b) => *b,
            Scalar::Int(i) => *i != 0,
            Scalar::Float(f) => *f != 0.0,
            Scalar::Text(s) => matches!(s.trim(), "1" | "t" | "T" | "true" | "TRUE" | "True"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Scalar::Float(f)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

// ── Tables ──────────────────────────────────────────────────────────

/// An image attached to a cell or field. `data` is hex encoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFile {
    pub data: String,
    /// Short type tag: `jpg`, `png`, `gif` or `bmp`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub mime: String,
    #[serde(default)]
    pub name: String,
    pub width: u32,
    pub height: u32,
}

/// A single table cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    /// Dotted locator, e.g. `items.0.price`.
    #[serde(default)]
    pub path: String,
    /// Short identifier.
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub value: Scalar,
    /// Format hint (`currency`, `date`) applied when the cell is rendered,
    /// ahead of the operation's own `format`.
    #[serde(default)]
    pub format: String,
    /// Type tag. `currency` and `date` force the matching format.
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub images: Vec<ImageFile>,
}

impl Cell {
    /// A cell standing in for a literal text or a global value.
    pub fn synthetic(name: &str, value: Scalar) -> Self {
        Cell {
            path: name.to_string(),
            key: name.to_string(),
            title: name.to_string(),
            value,
            ..Default::default()
        }
    }

    pub fn literal(text: &str) -> Self {
        Cell {
            value: Scalar::Text(text.to_string()),
            ..Default::default()
        }
    }

    /// Does a `target` parameter select this cell?
    pub fn matches(&self, target: &str) -> bool {
        !target.is_empty() && (self.key == target || self.path == target)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(default)]
    pub cells: Vec<Cell>,
}

/// A table: display rows plus the raw records calculations run over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub rows: Vec<Row>,
    /// Raw data records, one per row. When empty, records are derived
    /// from the rows themselves (see [`Table::records`]).
    #[serde(default)]
    pub records: Vec<serde_json::Value>,
}

impl Table {
    /// The records calculations iterate over.
    ///
    /// Supplied records win. Otherwise each row becomes an object mapping
    /// every cell's key and path to its value.
    pub fn records(&self) -> Vec<serde_json::Value> {
        if !self.records.is_empty() {
            return self.records.clone();
        }
        self.rows
            .iter()
            .map(|row| {
                let mut record = serde_json::Map::new();
                for cell in &row.cells {
                    for name in [&cell.key, &cell.path] {
                        if !name.is_empty() {
                            record.insert(name.clone(), cell.value.to_json());
                        }
                    }
                }
                serde_json::Value::Object(record)
            })
            .collect()
    }
}

// ── Form mode ───────────────────────────────────────────────────────

/// One entry of the external field registry (form mode's rows).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldEntry {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub value: Scalar,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub images: Vec<ImageFile>,
}

impl FieldEntry {
    pub fn matches(&self, target: &str) -> bool {
        !target.is_empty() && (self.key == target || self.path == target)
    }

    pub fn to_cell(&self) -> Cell {
        Cell {
            path: self.path.clone(),
            key: self.key.clone(),
            title: self.title.clone(),
            value: self.value.clone(),
            kind: self.kind.clone(),
            images: self.images.clone(),
            ..Default::default()
        }
    }
}

/// A user reference on form or submission metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    #[serde(default)]
    pub display_name: String,
}

/// Metadata for the form or the submission being rendered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub created_by: Option<UserRef>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

// ── Render inputs ───────────────────────────────────────────────────

/// Everything a render reads besides the instruction tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderData {
    #[serde(default)]
    pub tables: Vec<Table>,
    /// Form-mode field registry.
    #[serde(default)]
    pub fields: Vec<FieldEntry>,
    #[serde(default)]
    pub form: Option<RecordMeta>,
    #[serde(default)]
    pub submission: Option<RecordMeta>,
    /// Placeholder name → value, substituted into rendered text.
    #[serde(default)]
    pub globals: BTreeMap<String, Scalar>,
    /// Dataset `logic` operands are evaluated against.
    #[serde(default)]
    pub record: serde_json::Value,
}

/// Render configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    pub currency_symbol: String,
    pub currency_precision: usize,
    pub date_parse: String,
    pub date_format: String,
    pub timestamp_format: String,
    /// Converts embedded image pixels to user units.
    pub pixels_per_unit: f64,
    /// Overrides the initial top offset used by `setinity`.
    pub init_y: Option<f64>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            currency_symbol: "£".to_string(),
            currency_precision: 2,
            date_parse: "yyyy-M-d".to_string(),
            date_format: "d/M/yyyy".to_string(),
            timestamp_format: "d/M/yyyy HH:mm".to_string(),
            pixels_per_unit: 96.0 / 25.4,
            init_y: None,
        }
    }
}

// ── Page geometry ───────────────────────────────────────────────────

/// Standard page sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum PageSize {
    A3,
    #[default]
    A4,
    A5,
    Letter,
    Legal,
    Tabloid,
    Custom {
        width: f64,
        height: f64,
    },
}

impl PageSize {
    /// Returns (width, height) in points.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::A3 => (841.89, 1190.55),
            PageSize::A5 => (419.53, 595.28),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::Tabloid => (792.0, 1224.0),
            PageSize::Custom { width, height } => (*width, *height),
        }
    }

    /// Parse a size name case-insensitively. Unknown names give A4.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "a3" => PageSize::A3,
            "a5" => PageSize::A5,
            "letter" => PageSize::Letter,
            "legal" => PageSize::Legal,
            "tabloid" => PageSize::Tabloid,
            _ => PageSize::A4,
        }
    }
}

/// Measurement unit of the instruction tree's coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    Pt,
    #[default]
    Mm,
    Cm,
    In,
}

impl Unit {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "pt" => Unit::Pt,
            "cm" => Unit::Cm,
            "in" | "inch" => Unit::In,
            _ => Unit::Mm,
        }
    }

    /// Points per user unit.
    pub fn scale(&self) -> f64 {
        match self {
            Unit::Pt => 1.0,
            Unit::Mm => 72.0 / 25.4,
            Unit::Cm => 72.0 / 2.54,
            Unit::In => 72.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Parameters of the create-document capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSetup {
    pub orientation: Orientation,
    pub unit: Unit,
    pub size: PageSize,
    /// Resource directory for fonts/images referenced by relative path.
    pub resource_dir: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_coercions_fall_back_to_zero() {
        assert_eq!(Scalar::from("abc").to_f64(), 0.0);
        assert_eq!(Scalar::from("12.9").to_i64(), 12);
        assert_eq!(Scalar::from(" 7 ").to_i64(), 7);
        assert!(Scalar::from("true").to_bool());
        assert!(!Scalar::from("yes").to_bool());
        assert_eq!(Scalar::Float(4.5).to_text(), "4.5");
        assert_eq!(Scalar::Float(2.0).to_text(), "2");
        assert_eq!(Scalar::Null.to_text(), "");
    }

    #[test]
    fn scalar_deserializes_untagged() {
        let cell: Cell = serde_json::from_value(json!({
            "key": "qty", "value": 3, "type": "currency"
        }))
        .unwrap();
        assert_eq!(cell.value, Scalar::Int(3));
        assert_eq!(cell.value.kind(), ScalarKind::Int);
        assert_eq!(cell.kind, "currency");

        let cell: Cell = serde_json::from_value(json!({ "value": null })).unwrap();
        assert_eq!(cell.value, Scalar::Null);
    }

    #[test]
    fn records_are_derived_from_cells() {
        let table = Table {
            rows: vec![Row {
                cells: vec![Cell {
                    key: "qty".into(),
                    path: "items.qty".into(),
                    value: Scalar::Int(4),
                    ..Default::default()
                }],
            }],
            records: vec![],
        };
        assert_eq!(table.records(), vec![json!({"qty": 4, "items.qty": 4})]);
    }

    #[test]
    fn supplied_records_win() {
        let table = Table {
            rows: vec![Row::default()],
            records: vec![json!({"a": 1})],
        };
        assert_eq!(table.records(), vec![json!({"a": 1})]);
    }

    #[test]
    fn options_default_when_missing() {
        let opts: RenderOptions = serde_json::from_value(json!({"currencySymbol": "$"})).unwrap();
        assert_eq!(opts.currency_symbol, "$");
        assert_eq!(opts.currency_precision, 2);
        assert_eq!(opts.date_format, "d/M/yyyy");
    }

    #[test]
    fn page_size_names() {
        assert_eq!(PageSize::from_name("letter"), PageSize::Letter);
        assert_eq!(PageSize::from_name("bogus"), PageSize::A4);
        assert_eq!(Unit::from_name("inch").scale(), 72.0);
    }
}
