//! Element property values as exchanged with the engine.

use core::fmt;

/// A property value. The engine stores every property as text; values that
/// parse as a float are surfaced as numbers.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(untagged)
)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
}

impl PropertyValue {
    /// Interpret an engine string.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(n) => Self::Number(n),
            Err(_) => Self::Text(trimmed.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }

    /// Whether a value read back from the engine is the value that was
    /// written. Numbers compare by exact value, text case-insensitively.
    pub fn matches(&self, read_back: &Self) -> bool {
        match (self, read_back) {
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::parse(v)
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::parse(&v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_numbers_and_text() {
        assert_eq!(PropertyValue::parse("50"), PropertyValue::Number(50.0));
        assert_eq!(PropertyValue::parse(" 0.95 "), PropertyValue::Number(0.95));
        assert_eq!(
            PropertyValue::parse("Idling"),
            PropertyValue::Text("Idling".to_string())
        );
        assert_eq!(PropertyValue::from("12.5"), PropertyValue::Number(12.5));
    }

    #[test]
    fn display_writes_engine_text() {
        assert_eq!(PropertyValue::Number(100.0).to_string(), "100");
        assert_eq!(PropertyValue::Number(0.25).to_string(), "0.25");
        assert_eq!(PropertyValue::from("constant").to_string(), "constant");
    }

    #[test]
    fn read_back_matching() {
        assert!(PropertyValue::from(10.0).matches(&PropertyValue::parse("10")));
        assert!(PropertyValue::from("Constant").matches(&PropertyValue::parse("constant")));
        assert!(!PropertyValue::from(10.0).matches(&PropertyValue::parse("10.5")));
        assert!(!PropertyValue::from(10.0).matches(&PropertyValue::parse("10.000000001")));
        assert!(PropertyValue::from(0.1 + 0.2).matches(&PropertyValue::parse(&(0.1 + 0.2).to_string())));
        assert!(!PropertyValue::from("on").matches(&PropertyValue::parse("1")));
    }
}
