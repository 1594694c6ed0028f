//! Aggregations over the active table.
//!
//! A calculation pairs an aggregation kind with a logic rule. The rule is
//! evaluated once per table record; rows whose rule fails are skipped by
//! `count`/`minimum`/`maximum` and count as zero for `sum`/`average`.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::logic;
use crate::model::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Minimum,
    Maximum,
    Average,
    /// Evaluate against the table's current row only.
    Single,
}

impl Aggregate {
    pub fn from_name(name: &str) -> Self {
        match name {
            "count" => Aggregate::Count,
            "sum" => Aggregate::Sum,
            "minimum" => Aggregate::Minimum,
            "maximum" => Aggregate::Maximum,
            "average" => Aggregate::Average,
            _ => Aggregate::Single,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Aggregate::Count => "count",
            Aggregate::Sum => "sum",
            Aggregate::Minimum => "minimum",
            Aggregate::Maximum => "maximum",
            Aggregate::Average => "average",
            Aggregate::Single => "single",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    /// The aggregation has no defined value, e.g. the average of no rows.
    #[error("{kind} calculation is undefined over {rows} row(s)")]
    Undefined { kind: &'static str, rows: usize },
}

/// A parsed `calculation` parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Calculation {
    pub kind: Aggregate,
    pub formula: Value,
}

impl Calculation {
    /// Read `{"type": "sum", "formula": rule}`, inline or JSON-encoded.
    /// Returns `None` when there is no formula.
    pub fn from_param(param: &Value) -> Option<Self> {
        let param = logic::parse_rule(param);
        let map = param.as_object()?;
        let formula = map.get("formula").map(logic::parse_rule)?;
        if formula.is_null() || formula.as_str() == Some("") {
            return None;
        }
        let kind = map.get("type").and_then(Value::as_str).unwrap_or("");
        Some(Calculation {
            kind: Aggregate::from_name(kind),
            formula,
        })
    }

    /// Compute the raw numeric result.
    ///
    /// `None` means "no result" (single row out of bounds or failing,
    /// or min/max with no evaluable rows). An average over zero rows is NaN.
    pub fn aggregate(&self, table: &Table, row_index: usize) -> Option<f64> {
        let records = table.records();

        if self.kind == Aggregate::Single {
            return records.get(row_index).and_then(|r| self.evaluate(r));
        }

        let results: Vec<Option<f64>> = records.iter().map(|r| self.evaluate(r)).collect();

        match self.kind {
            Aggregate::Count => Some(
                results
                    .iter()
                    .filter(|r| matches!(r, Some(v) if *v > 0.0))
                    .count() as f64,
            ),
            Aggregate::Sum => Some(results.iter().map(|r| r.unwrap_or(0.0)).sum()),
            Aggregate::Average => {
                let sum: f64 = results.iter().map(|r| r.unwrap_or(0.0)).sum();
                Some(sum / results.len() as f64)
            }
            Aggregate::Minimum => results.iter().flatten().copied().reduce(|acc, v| if v < acc { v } else { acc }),
            Aggregate::Maximum => results.iter().flatten().copied().reduce(|acc, v| if v > acc { v } else { acc }),
            Aggregate::Single => None,
        }
    }

    fn evaluate(&self, record: &Value) -> Option<f64> {
        match logic::apply(&self.formula, record) {
            Ok(value) => logic::as_f64(&value),
            Err(e) => {
                debug!(kind = self.kind.name(), error = %e, "calculation row skipped");
                None
            }
        }
    }
}

/// Run a calculation and render its result as text.
///
/// A result `<= 0` falls back to `fallback` when one is supplied, so a
/// placeholder such as `"N/A"` can stand in for "no meaningful total".
/// "No result" also returns the fallback unchanged.
pub fn calculate(
    calculation: &Calculation,
    table: &Table,
    row_index: usize,
    fallback: &str,
) -> Result<String, CalcError> {
    let Some(result) = calculation.aggregate(table, row_index) else {
        return Ok(fallback.to_string());
    };

    if result.is_nan() {
        return Err(CalcError::Undefined {
            kind: calculation.kind.name(),
            rows: table.records().len(),
        });
    }

    if result <= 0.0 && !fallback.is_empty() {
        return Ok(fallback.to_string());
    }

    Ok(result.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table_of(values: &[f64]) -> Table {
        Table {
            rows: vec![],
            records: values.iter().map(|v| json!({ "n": v })).collect(),
        }
    }

    fn calc(kind: &str) -> Calculation {
        Calculation::from_param(&json!({ "type": kind, "formula": { "var": "n" } })).unwrap()
    }

    #[test]
    fn sum_adds_every_row() {
        let table = table_of(&[2.0, 3.5, -1.0]);
        assert_eq!(calc("sum").aggregate(&table, 0), Some(4.5));
        assert_eq!(calculate(&calc("sum"), &table, 0, ""), Ok("4.5".to_string()));
    }

    #[test]
    fn min_and_max_keep_extremes() {
        let table = table_of(&[4.0, 1.0, 7.0]);
        assert_eq!(calc("minimum").aggregate(&table, 0), Some(1.0));
        assert_eq!(calc("maximum").aggregate(&table, 0), Some(7.0));
    }

    #[test]
    fn count_only_counts_positive_results() {
        let table = table_of(&[0.0, 5.0, -2.0, 3.0]);
        assert_eq!(calculate(&calc("count"), &table, 0, ""), Ok("2".to_string()));
    }

    #[test]
    fn average_of_nothing_is_undefined() {
        let table = table_of(&[]);
        assert!(calc("average").aggregate(&table, 0).unwrap().is_nan());
        assert_eq!(
            calculate(&calc("average"), &table, 0, "N/A"),
            Err(CalcError::Undefined {
                kind: "average",
                rows: 0
            })
        );
        assert_eq!(calc("average").aggregate(&table_of(&[1.0, 2.0]), 0), Some(1.5));
    }

    #[test]
    fn non_positive_results_use_the_fallback() {
        let zero = table_of(&[0.0]);
        assert_eq!(calculate(&calc("sum"), &zero, 0, "N/A"), Ok("N/A".to_string()));
        let some = table_of(&[4.5]);
        assert_eq!(calculate(&calc("sum"), &some, 0, "N/A"), Ok("4.5".to_string()));
        assert_eq!(calculate(&calc("sum"), &zero, 0, ""), Ok("0".to_string()));
    }

    #[test]
    fn single_row_uses_current_index() {
        let table = table_of(&[3.0, 8.0]);
        let single = Calculation::from_param(&json!({ "formula": { "var": "n" } })).unwrap();
        assert_eq!(single.kind, Aggregate::Single);
        assert_eq!(calculate(&single, &table, 1, ""), Ok("8".to_string()));
        assert_eq!(calculate(&single, &table, 5, "-"), Ok("-".to_string()));
    }

    #[test]
    fn failing_rows_are_skipped_or_zeroed() {
        let table = Table {
            rows: vec![],
            records: vec![json!({ "n": 2 }), json!({ "n": "oops" }), json!({ "n": 5 })],
        };
        let rule = |kind: &str| {
            Calculation::from_param(&json!({ "type": kind, "formula": { "+": [{ "var": "n" }, 0] } }))
                .unwrap()
        };
        assert_eq!(rule("sum").aggregate(&table, 0), Some(7.0));
        assert_eq!(rule("count").aggregate(&table, 0), Some(2.0));
        assert_eq!(rule("minimum").aggregate(&table, 0), Some(2.0));
    }

    #[test]
    fn formula_may_be_a_json_string() {
        let parsed = Calculation::from_param(&json!(
            "{\"type\": \"maximum\", \"formula\": \"{\\\"var\\\": \\\"n\\\"}\"}"
        ))
        .unwrap();
        assert_eq!(parsed.kind, Aggregate::Maximum);
        assert_eq!(parsed.aggregate(&table_of(&[1.0, 9.0]), 0), Some(9.0));
        assert!(Calculation::from_param(&json!({ "type": "sum" })).is_none());
    }
}
