//! Loosely typed block arguments

use serde_json::{Map, Value};

use cozbridge_protocol::is_truthy;

use super::EncodeError;

/// Named arguments supplied by a block
///
/// Values arrive as numbers, booleans or strings depending on how the block
/// was filled in; the accessors re-parse them and never trust the raw type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockArgs(Map<String, Value>);

impl BlockArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Builder-style insert
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        self.0.insert(name.to_string(), value.into());
    }

    /// Parse `KEY=VALUE` pairs; values are kept as strings
    pub fn parse_pairs<I, S>(pairs: I) -> Result<Self, EncodeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut args = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| EncodeError::invalid(format!("expected KEY=VALUE, got '{}'", pair)))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(EncodeError::invalid(format!("empty key in '{}'", pair)));
            }
            args.insert(&key.to_ascii_uppercase(), value);
        }
        Ok(args)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Numeric value, or `default` when absent or not a finite number
    ///
    /// Blank strings and `null` read as 0, booleans as 1 or 0.
    pub fn number(&self, name: &str, default: f64) -> f64 {
        let parsed = match self.0.get(name) {
            None => return default,
            Some(Value::Null) => Some(0.0),
            Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => {
                let s = s.trim();
                if s.is_empty() {
                    Some(0.0)
                } else {
                    s.parse::<f64>().ok()
                }
            }
            Some(Value::Array(_) | Value::Object(_)) => None,
        };

        parsed.filter(|n| n.is_finite()).unwrap_or(default)
    }

    pub fn number_clamped(&self, name: &str, default: f64, min: f64, max: f64) -> f64 {
        self.number(name, default).clamp(min, max)
    }

    /// Boolean value; strings are true only when they spell `true`
    pub fn boolean(&self, name: &str, default: bool) -> bool {
        match self.0.get(name) {
            None => default,
            Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            Some(other) => is_truthy(other),
        }
    }

    /// Trimmed text form, empty when absent
    pub fn text(&self, name: &str) -> String {
        match self.0.get(name) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(other) => other.to_string(),
        }
    }

    /// Trimmed text, or a missing-argument error when blank
    pub fn required_text(&self, name: &'static str) -> Result<String, EncodeError> {
        let text = self.text(name);
        if text.is_empty() {
            Err(EncodeError::MissingArgument(name))
        } else {
            Ok(text)
        }
    }
}

impl From<Map<String, Value>> for BlockArgs {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_parsing() {
        let args = BlockArgs::new()
            .with("N", 12.5)
            .with("S", " 40 ")
            .with("BLANK", "")
            .with("BAD", "fast")
            .with("T", true)
            .with("NULL", Value::Null)
            .with("INF", "inf");

        assert_eq!(args.number("N", 0.0), 12.5);
        assert_eq!(args.number("S", 0.0), 40.0);
        assert_eq!(args.number("BLANK", 7.0), 0.0);
        assert_eq!(args.number("BAD", 7.0), 7.0);
        assert_eq!(args.number("T", 0.0), 1.0);
        assert_eq!(args.number("NULL", 7.0), 0.0);
        assert_eq!(args.number("INF", 7.0), 7.0);
        assert_eq!(args.number("ABSENT", 50.0), 50.0);
    }

    #[test]
    fn test_number_clamped() {
        let args = BlockArgs::new().with("P", 150).with("Q", -3);
        assert_eq!(args.number_clamped("P", 0.0, 0.0, 100.0), 100.0);
        assert_eq!(args.number_clamped("Q", 0.0, 0.0, 100.0), 0.0);
        assert_eq!(args.number_clamped("ABSENT", 20.0, 0.0, 100.0), 20.0);
    }

    #[test]
    fn test_boolean_parsing() {
        let args = BlockArgs::new()
            .with("A", "TRUE")
            .with("B", "false")
            .with("C", "yes")
            .with("D", 1)
            .with("E", 0)
            .with("F", json!(false));

        assert!(args.boolean("A", false));
        assert!(!args.boolean("B", true));
        assert!(!args.boolean("C", true));
        assert!(args.boolean("D", false));
        assert!(!args.boolean("E", true));
        assert!(!args.boolean("F", true));
        assert!(args.boolean("ABSENT", true));
        assert!(!args.boolean("ABSENT", false));
    }

    #[test]
    fn test_text() {
        let args = BlockArgs::new().with("T", "  hi  ").with("N", 3);
        assert_eq!(args.text("T"), "hi");
        assert_eq!(args.text("N"), "3");
        assert_eq!(args.text("ABSENT"), "");
        assert_eq!(args.required_text("T").unwrap(), "hi");
        assert!(matches!(
            args.required_text("ABSENT"),
            Err(EncodeError::MissingArgument("ABSENT"))
        ));
    }

    #[test]
    fn test_parse_pairs() {
        let args = BlockArgs::parse_pairs(["distance=100", "SPEED=50", "text=a=b"]).unwrap();
        assert_eq!(args.number("DISTANCE", 0.0), 100.0);
        assert_eq!(args.number("SPEED", 0.0), 50.0);
        assert_eq!(args.text("TEXT"), "a=b");

        assert!(BlockArgs::parse_pairs(["novalue"]).is_err());
        assert!(BlockArgs::parse_pairs(["=5"]).is_err());
    }
}
