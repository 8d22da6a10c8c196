//! Light descriptors understood by the peer

use serde::{Deserialize, Serialize};

/// Red, green, blue channel bytes
pub type Rgb = [u8; 3];

/// Animation applied to a light pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    #[default]
    Steady,
    Flash,
    Off,
}

impl PatternKind {
    /// Parse a pattern name, falling back to [`PatternKind::Steady`]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "flash" => Self::Flash,
            "off" => Self::Off,
            _ => Self::Steady,
        }
    }
}

/// Full light pattern with colours and timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightPattern {
    pub on: Rgb,
    pub off: Rgb,
    pub on_period_ms: u32,
    pub off_period_ms: u32,
    pub transition_on_period_ms: u32,
    pub transition_off_period_ms: u32,
    pub pattern: PatternKind,
}

impl LightPattern {
    /// Pattern whose on and off colours are the same
    pub fn single_color(rgb: Rgb, pattern: PatternKind) -> Self {
        Self {
            on: rgb,
            off: rgb,
            on_period_ms: 0,
            off_period_ms: 0,
            transition_on_period_ms: 0,
            transition_off_period_ms: 0,
            pattern,
        }
    }
}

/// A light value: either a solid colour (`[r, g, b]` on the wire) or a
/// pattern object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Light {
    Solid(Rgb),
    Pattern(LightPattern),
}

impl Light {
    pub const OFF: Light = Light::Solid([0, 0, 0]);
}

impl Default for Light {
    fn default() -> Self {
        Self::OFF
    }
}
