//! Currency and date formatting of rendered text.
//!
//! Both formatters are total: input that doesn't parse comes back
//! unchanged. Date patterns use Joda-style letters (`yyyy`, `M`, `dd`,
//! `HH:mm`, ...) and are translated to chrono strftime items.

use chrono::format::{parse, Parsed, StrftimeItems};
use chrono::{NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::model::RenderOptions;

/// Which formatter to run and its settings.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatSpec {
    Currency { symbol: String, precision: usize },
    Date { parse: String, format: String },
    /// Unknown kinds leave text untouched.
    None,
}

impl FormatSpec {
    /// Build from a `format` parameter: either a kind name (`"currency"`)
    /// or an object `{"type": "currency", "symbol": "$", "precision": 0}`.
    /// Missing settings come from the render options.
    pub fn from_param(param: &Value, options: &RenderOptions) -> Self {
        let (kind, settings) = match param {
            Value::String(kind) => (kind.as_str(), None),
            Value::Object(map) => (
                map.get("type").and_then(Value::as_str).unwrap_or(""),
                Some(map),
            ),
            _ => ("", None),
        };
        let setting = |name: &str| settings.and_then(|m| m.get(name));
        let text_setting = |name: &str, fallback: &str| {
            setting(name)
                .and_then(Value::as_str)
                .unwrap_or(fallback)
                .to_string()
        };

        match kind {
            "currency" => FormatSpec::Currency {
                symbol: text_setting("symbol", &options.currency_symbol),
                precision: setting("precision")
                    .and_then(Value::as_u64)
                    .map_or(options.currency_precision, |p| p as usize),
            },
            "date" => FormatSpec::Date {
                parse: text_setting("parse", &options.date_parse),
                format: text_setting("format", &options.date_format),
            },
            _ => FormatSpec::None,
        }
    }

    /// Format `text`.
    pub fn apply(&self, text: &str) -> String {
        match self {
            FormatSpec::Currency { symbol, precision } => {
                format_currency(text, symbol, *precision).unwrap_or_else(|| text.to_string())
            }
            FormatSpec::Date { parse, format } => {
                format_date(text, parse, format).unwrap_or_else(|| text.to_string())
            }
            FormatSpec::None => text.to_string(),
        }
    }
}

/// `1234.5` → `£1,234.50`; negatives put the sign before the symbol.
pub fn format_currency(text: &str, symbol: &str, precision: usize) -> Option<String> {
    let value: f64 = text.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }

    let fixed = format!("{:.*}", precision, value.abs());
    let (whole, fraction) = match fixed.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let is_zero = fixed.chars().all(|c| c == '0' || c == '.');
    let sign = if value < 0.0 && !is_zero { "-" } else { "" };
    Some(match fraction {
        Some(f) => format!("{sign}{symbol}{grouped}.{f}"),
        None => format!("{sign}{symbol}{grouped}"),
    })
}

/// Re-render a date from one Joda-style pattern to another.
pub fn format_date(text: &str, parse_pattern: &str, format_pattern: &str) -> Option<String> {
    let parsed = parse_datetime(text, parse_pattern)?;
    Some(format_datetime(&parsed, format_pattern))
}

/// Parse with a Joda-style pattern. Date-only patterns give midnight.
pub fn parse_datetime(text: &str, pattern: &str) -> Option<NaiveDateTime> {
    let strftime = joda_to_strftime(pattern);
    let mut parsed = Parsed::new();
    parse(&mut parsed, text.trim(), StrftimeItems::new(&strftime)).ok()?;
    let date = parsed.to_naive_date().ok()?;
    let time = parsed.to_naive_time().unwrap_or(NaiveTime::MIN);
    Some(date.and_time(time))
}

pub fn format_datetime(value: &NaiveDateTime, pattern: &str) -> String {
    value.format(&joda_to_strftime(pattern)).to_string()
}

/// Translate Joda pattern letters into strftime specifiers.
///
/// Runs of the same letter select the width; text in single quotes is
/// literal and `''` is a quote.
pub fn joda_to_strftime(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }

        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }

        let spec = match (c, run) {
            ('y', 2) => Some("%y"),
            ('y', _) => Some("%Y"),
            ('M', 1) => Some("%-m"),
            ('M', 2) => Some("%m"),
            ('M', 3) => Some("%b"),
            ('M', _) => Some("%B"),
            ('d', 1) => Some("%-d"),
            ('d', _) => Some("%d"),
            ('H', 1) => Some("%-H"),
            ('H', _) => Some("%H"),
            ('h', 1) => Some("%-I"),
            ('h', _) => Some("%I"),
            ('m', 1) => Some("%-M"),
            ('m', _) => Some("%M"),
            ('s', 1) => Some("%-S"),
            ('s', _) => Some("%S"),
            ('a', _) => Some("%p"),
            ('E', 1..=3) => Some("%a"),
            ('E', _) => Some("%A"),
            _ => None,
        };

        match spec {
            Some(spec) => out.push_str(spec),
            None => (0..run).for_each(|_| push_literal(&mut out, c)),
        }
        i += run;
    }

    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn currency_groups_thousands() {
        assert_eq!(format_currency("1234.5", "£", 2).as_deref(), Some("£1,234.50"));
        assert_eq!(format_currency("1234567", "$", 0).as_deref(), Some("$1,234,567"));
        assert_eq!(format_currency("-12.5", "£", 2).as_deref(), Some("-£12.50"));
        assert_eq!(format_currency("-0.001", "£", 2).as_deref(), Some("£0.00"));
        assert_eq!(format_currency("999", "", 2).as_deref(), Some("999.00"));
    }

    #[test]
    fn currency_leaves_text_alone() {
        let spec = FormatSpec::Currency {
            symbol: "£".into(),
            precision: 2,
        };
        assert_eq!(spec.apply("N/A"), "N/A");
        assert_eq!(spec.apply("1234.5"), "£1,234.50");
    }

    #[test]
    fn date_round_trip_patterns() {
        assert_eq!(format_date("2023-5-9", "yyyy-M-d", "d/M/yyyy").as_deref(), Some("9/5/2023"));
        assert_eq!(
            format_date("2023-05-09", "yyyy-MM-dd", "dd MMM yyyy").as_deref(),
            Some("09 May 2023")
        );
        assert_eq!(format_date("not a date", "yyyy-M-d", "d/M/yyyy"), None);
    }

    #[test]
    fn date_spec_returns_input_on_failure() {
        let spec = FormatSpec::from_param(&json!("date"), &RenderOptions::default());
        assert_eq!(spec.apply("2023-5-9"), "9/5/2023");
        assert_eq!(spec.apply("yesterday"), "yesterday");
    }

    #[test]
    fn spec_from_object_overrides_options() {
        let spec = FormatSpec::from_param(
            &json!({"type": "currency", "symbol": "$", "precision": 0}),
            &RenderOptions::default(),
        );
        assert_eq!(
            spec,
            FormatSpec::Currency {
                symbol: "$".into(),
                precision: 0
            }
        );
        assert_eq!(
            FormatSpec::from_param(&json!("upper"), &RenderOptions::default()),
            FormatSpec::None
        );
    }

    #[test]
    fn joda_translation() {
        assert_eq!(joda_to_strftime("d/M/yyyy HH:mm"), "%-d/%-m/%Y %H:%M");
        assert_eq!(joda_to_strftime("'Day' d"), "Day %-d");
        assert_eq!(joda_to_strftime("EEEE, MMMM d"), "%A, %B %-d");
        assert_eq!(joda_to_strftime("100%"), "100%%");
    }

    #[test]
    fn datetime_patterns_keep_time() {
        let parsed = parse_datetime("2024-1-2 13:05", "yyyy-M-d HH:mm").unwrap();
        assert_eq!(format_datetime(&parsed, "d/M/yyyy HH:mm"), "2/1/2024 13:05");
    }
}
