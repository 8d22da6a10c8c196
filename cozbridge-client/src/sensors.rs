//! Sensor readers over the state snapshot

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use cozbridge_protocol::StateSnapshot;

/// A value reported by a sensor block
#[derive(Debug, Clone, PartialEq)]
pub enum SensorValue {
    Flag(bool),
    Number(f64),
    Integer(i64),
    /// The peer did not report the field
    Missing,
}

impl SensorValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Flag(b) => Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
            Self::Integer(i) => Value::from(*i),
            Self::Missing => Value::Null,
        }
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Missing => f.write_str("none"),
        }
    }
}

/// Sensor blocks backed by the state snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensor {
    BatteryVoltage,
    BatteryPercent,
    IsCharging,
    IsPickedUp,
    IsMoving,
    IsCarryingBlock,
    IsCliffDetected,
    CameraEnabled,
    CubeConnected(u8),
    CubeVisible(u8),
    CubeTappedId,
}

impl Sensor {
    pub const ALL: [Sensor; 15] = [
        Self::BatteryVoltage,
        Self::BatteryPercent,
        Self::IsCharging,
        Self::IsPickedUp,
        Self::IsMoving,
        Self::IsCarryingBlock,
        Self::IsCliffDetected,
        Self::CameraEnabled,
        Self::CubeConnected(1),
        Self::CubeConnected(2),
        Self::CubeConnected(3),
        Self::CubeVisible(1),
        Self::CubeVisible(2),
        Self::CubeVisible(3),
        Self::CubeTappedId,
    ];

    /// Snapshot field the sensor reads, which is also its block name
    pub fn field(&self) -> String {
        match self {
            Self::BatteryVoltage => "battery_voltage".into(),
            Self::BatteryPercent => "battery_percent".into(),
            Self::IsCharging => "is_charging".into(),
            Self::IsPickedUp => "is_picked_up".into(),
            Self::IsMoving => "is_moving".into(),
            Self::IsCarryingBlock => "is_carrying_block".into(),
            Self::IsCliffDetected => "is_cliff_detected".into(),
            Self::CameraEnabled => "camera_enabled".into(),
            Self::CubeConnected(n) => format!("cube_{}_connected", n),
            Self::CubeVisible(n) => format!("cube_{}_visible", n),
            Self::CubeTappedId => "cube_tapped_id".into(),
        }
    }

    /// Cube sensors dump the snapshot when verbose diagnostics are on
    pub fn is_cube_sensor(&self) -> bool {
        matches!(
            self,
            Self::CubeConnected(_) | Self::CubeVisible(_) | Self::CubeTappedId
        )
    }

    pub fn read(&self, snapshot: &StateSnapshot) -> SensorValue {
        let field = self.field();
        match self {
            Self::BatteryVoltage => snapshot
                .number(&field)
                .map_or(SensorValue::Missing, SensorValue::Number),
            Self::BatteryPercent => SensorValue::Number(snapshot.number(&field).unwrap_or(0.0)),
            Self::CubeTappedId => SensorValue::Integer(snapshot.integer(&field).unwrap_or(0)),
            _ => SensorValue::Flag(snapshot.flag(&field)),
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.field())
    }
}

impl FromStr for Sensor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|sensor| sensor.field() == s)
            .ok_or_else(|| format!("unknown sensor '{}'", s))
    }
}
