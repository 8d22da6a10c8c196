//! Robot state snapshots pushed by the peer

use std::time::SystemTime;

use serde_json::{json, Map, Value};

/// Truthiness of a loosely typed peer value
///
/// `null`, `false`, `0`, `NaN` and the empty string are falsy; everything else
/// (including empty arrays and objects) is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Most recent full state reading from the peer
///
/// Snapshots are immutable once built; a new push replaces the whole value.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    fields: Map<String, Value>,
    captured_at: SystemTime,
}

impl StateSnapshot {
    /// Build a snapshot captured now
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            captured_at: SystemTime::now(),
        }
    }

    /// Snapshot returned when the peer did not answer in time
    ///
    /// Pose at the origin, zero battery, no cube visible, no faces.
    pub fn fallback() -> Self {
        let fields = match json!({
            "pose": {"x": 0, "y": 0, "angle": 0},
            "head": 0,
            "lift": 0,
            "battery": 0,
            "cube_visible": false,
            "faces": []
        }) {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    /// Raw field value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Field interpreted as a boolean flag; absent fields are false
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).is_some_and(is_truthy)
    }

    /// Field as a number, if it is one
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// Field as an integer, if it is one
    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(value: Value) -> StateSnapshot {
        match value {
            Value::Object(map) => StateSnapshot::new(map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_fallback_snapshot_fields() {
        let s = StateSnapshot::fallback();
        assert_eq!(s.get("pose"), Some(&json!({"x": 0, "y": 0, "angle": 0})));
        assert_eq!(s.number("battery"), Some(0.0));
        assert!(!s.flag("cube_visible"));
        assert_eq!(s.get("faces"), Some(&json!([])));
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("no")));
        assert!(is_truthy(&json!(2)));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
    }

    #[test]
    fn test_accessors() {
        let s = snapshot(json!({
            "battery_voltage": 3.9,
            "is_charging": true,
            "cube_tapped_id": 2,
            "battery_percent": "73%"
        }));
        assert_eq!(s.number("battery_voltage"), Some(3.9));
        assert!(s.flag("is_charging"));
        assert!(!s.flag("is_moving"));
        assert_eq!(s.integer("cube_tapped_id"), Some(2));
        assert_eq!(s.number("battery_percent"), None);
    }
}
