use serde::{Deserialize, Serialize};
use std::fmt;

/// A single table cell after ingestion.
///
/// The enum uses an explicit `{type, value}` tagged layout so JSON consumers can tell a numeric
/// `0` apart from a missing value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// No value: an empty field, an empty cell or an error cell. Never treated as zero.
    Missing,
    /// IEEE-754 double precision number.
    Number(f64),
    /// Text exactly as it appeared in the source (not trimmed).
    Text(String),
}

impl Default for Value {
    fn default() -> Self {
        Value::Missing
    }
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Numeric interpretation of the value.
    ///
    /// Text is trimmed and parsed as a decimal number. Anything that does not parse, and any
    /// non-finite result, is `None`.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            Value::Missing => return None,
            Value::Number(n) => *n,
            Value::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        n.is_finite().then_some(n)
    }
}

/// Renders the value the way it is exported: numbers in shortest round-trip form, text verbatim,
/// missing as the empty string.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_trimmed_before_parsing() {
        assert_eq!(Value::from(" 12.5 ").as_number(), Some(12.5));
        assert_eq!(Value::from("-3").as_number(), Some(-3.0));
        assert_eq!(Value::Number(7.0).as_number(), Some(7.0));
    }

    #[test]
    fn unparseable_and_non_finite_are_missing() {
        assert_eq!(Value::from("N/A").as_number(), None);
        assert_eq!(Value::from("1,234").as_number(), None);
        assert_eq!(Value::from("").as_number(), None);
        assert_eq!(Value::from("NaN").as_number(), None);
        assert_eq!(Value::from("inf").as_number(), None);
        assert_eq!(Value::Number(f64::NAN).as_number(), None);
        assert_eq!(Value::Missing.as_number(), None);
    }

    #[test]
    fn display_matches_export_form() {
        assert_eq!(Value::Number(120.0).to_string(), "120");
        assert_eq!(Value::Number(0.25).to_string(), "0.25");
        assert_eq!(Value::from(" Acme ").to_string(), " Acme ");
        assert_eq!(Value::Missing.to_string(), "");
    }

    #[test]
    fn json_layout_is_tagged() {
        let json = serde_json::to_value(Value::Number(1.5)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "number", "value": 1.5}));
        let json = serde_json::to_value(Value::Missing).unwrap();
        assert_eq!(json, serde_json::json!({"type": "missing"}));
    }
}
