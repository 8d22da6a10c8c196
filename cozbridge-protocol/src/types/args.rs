//! Positional call arguments
//!
//! Plain JSON numbers are ambiguous to the peer (a number might be a distance,
//! a speed or an angle), so values with a unit or a richer peer-side type are
//! sent as tagged wrappers: `{"__cozmo_type": "<kind>", "value": <payload>}`.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};

use super::light::Light;

/// Key carrying the semantic kind of a tagged wrapper
pub const TYPE_TAG: &str = "__cozmo_type";

/// A musical note for the song player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongNote {
    #[serde(rename = "noteType")]
    pub note_type: String,
    #[serde(rename = "noteDuration")]
    pub note_duration: String,
}

/// Argument annotated with its semantic kind
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArg {
    DistanceMm(f64),
    SpeedMmps(f64),
    Degrees(f64),
    Light(Light),
    SongNote(SongNote),
    Animation(String),
}

impl TypedArg {
    /// Wire name of the kind tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DistanceMm(_) => "distance_mm",
            Self::SpeedMmps(_) => "speed_mmps",
            Self::Degrees(_) => "degrees",
            Self::Light(_) => "light",
            Self::SongNote(_) => "songnote",
            Self::Animation(_) => "anim",
        }
    }
}

impl Serialize for TypedArg {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(TYPE_TAG, self.kind())?;
        match self {
            Self::DistanceMm(v) | Self::SpeedMmps(v) | Self::Degrees(v) => {
                map.serialize_entry("value", v)?
            }
            Self::Light(light) => map.serialize_entry("value", light)?,
            Self::SongNote(note) => map.serialize_entry("value", note)?,
            Self::Animation(name) => map.serialize_entry("value", name)?,
        }
        map.end()
    }
}

/// One positional argument of a call
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    Typed(TypedArg),
    List(Vec<Arg>),
}

impl Serialize for Arg {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Typed(typed) => typed.serialize(serializer),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Option<f64>> for Arg {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Null, Self::Number)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<TypedArg> for Arg {
    fn from(value: TypedArg) -> Self {
        Self::Typed(value)
    }
}

impl From<Light> for Arg {
    fn from(value: Light) -> Self {
        Self::Typed(TypedArg::Light(value))
    }
}
