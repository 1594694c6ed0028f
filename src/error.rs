//! Structured error types for the formpress interpreter.
//!
//! Only structural problems escape a render: malformed JSON, a malformed
//! instruction tree, or a table/form body addressed outside the supplied
//! data. Everything else is absorbed where it happens and degrades to a
//! documented default.

use thiserror::Error;

/// The unified error type returned by all public formpress API functions.
#[derive(Debug, Error)]
pub enum FormpressError {
    /// JSON input failed to parse.
    #[error("Failed to parse input: {source}{}", hint_suffix(.hint))]
    Parse {
        #[source]
        source: serde_json::Error,
        hint: String,
    },

    /// The instruction tree is not an array of single-key operation objects.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A table or form body referenced data that does not exist.
    #[error("{what} index {index} is out of bounds (have {len})")]
    OutOfBounds {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// Reading inputs or writing the finished document failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn hint_suffix(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {}", hint)
    }
}

impl From<serde_json::Error> for FormpressError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the expected schema. Check field names and types.".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        FormpressError::Parse { source: e, hint }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_carries_hint() {
        let err: FormpressError = serde_json::from_str::<serde_json::Value>("[1,]")
            .unwrap_err()
            .into();
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to parse input"));
        assert!(msg.contains("Hint: Check for trailing commas"));
    }

    #[test]
    fn out_of_bounds_message() {
        let err = FormpressError::OutOfBounds {
            what: "table",
            index: 3,
            len: 1,
        };
        assert_eq!(err.to_string(), "table index 3 is out of bounds (have 1)");
    }
}
