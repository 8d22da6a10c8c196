//! Colour presets, light patterns and the backpack light slots

use cozbridge_protocol::{Arg, Light, LightPattern, PatternKind, Rgb};

use super::args::BlockArgs;
use super::EncodeError;

pub const OFF: Rgb = [0, 0, 0];
pub const BLUE: Rgb = [0, 0, 255];

const BACKPACK_SLOTS: usize = 5;

/// Named colours understood by the light blocks
pub const PRESETS: &[(&str, Rgb)] = &[
    ("off", OFF),
    ("red", [255, 0, 0]),
    ("green", [0, 255, 0]),
    ("blue", BLUE),
    ("white", [255, 255, 255]),
    ("red_light", [64, 0, 0]),
    ("green_light", [0, 64, 0]),
    ("blue_light", [0, 0, 64]),
    ("white_light", [64, 64, 64]),
    ("off_light", OFF),
];

/// Look up a preset by name
pub fn preset_rgb(name: &str) -> Option<Rgb> {
    PRESETS
        .iter()
        .find(|(preset, _)| *preset == name)
        .map(|(_, rgb)| *rgb)
}

/// Look up a preset, using `fallback` for unknown names
pub fn preset_or(name: &str, fallback: Rgb) -> Rgb {
    preset_rgb(name).unwrap_or(fallback)
}

fn channel(args: &BlockArgs, name: &str) -> u8 {
    args.number(name, 0.0).floor().clamp(0.0, 255.0) as u8
}

fn period(args: &BlockArgs, name: &str) -> u32 {
    args.number(name, 0.0).floor().clamp(0.0, u32::MAX as f64) as u32
}

/// Build a single-colour pattern from `R G B ON OFF TON TOFF PATTERN`
pub fn pattern_from_args(args: &BlockArgs) -> LightPattern {
    let rgb = [channel(args, "R"), channel(args, "G"), channel(args, "B")];
    LightPattern {
        on_period_ms: period(args, "ON"),
        off_period_ms: period(args, "OFF"),
        transition_on_period_ms: period(args, "TON"),
        transition_off_period_ms: period(args, "TOFF"),
        ..LightPattern::single_color(rgb, PatternKind::from_name(&args.text("PATTERN")))
    }
}

/// Slot number from `INDEX`, floored and clamped to 1..=5
pub fn backpack_index(args: &BlockArgs) -> usize {
    args.number("INDEX", 1.0).floor().clamp(1.0, BackpackLights::SLOTS as f64) as usize
}

/// Cube id from `CUBE_ID`, floored and clamped to 1..=3
pub fn cube_id(args: &BlockArgs) -> u8 {
    args.number("CUBE_ID", 1.0).floor().clamp(1.0, 3.0) as u8
}

/// Which cube lights a block addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubeCorner {
    All,
    /// Zero-based corner index
    Single(usize),
}

impl CubeCorner {
    /// Parse `LIGHT_CORNER`; absent means every corner
    pub fn from_args(args: &BlockArgs) -> Result<Self, EncodeError> {
        match args.text("LIGHT_CORNER").as_str() {
            "" | "all" => Ok(Self::All),
            "light1" => Ok(Self::Single(0)),
            "light2" => Ok(Self::Single(1)),
            "light3" => Ok(Self::Single(2)),
            "light4" => Ok(Self::Single(3)),
            other => Err(EncodeError::invalid(format!("unknown cube corner '{}'", other))),
        }
    }
}

/// Last value sent to each of the five backpack lights
///
/// The peer only accepts whole-array updates, so a single-slot change
/// re-sends every slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackpackLights([Light; BACKPACK_SLOTS]);

impl BackpackLights {
    pub const SLOTS: usize = BACKPACK_SLOTS;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn slots(&self) -> &[Light; Self::SLOTS] {
        &self.0
    }

    pub fn set_all(&mut self, light: Light) {
        self.0 = [light; Self::SLOTS];
    }

    /// Set one slot, numbered from 1; out-of-range numbers are clamped
    pub fn set_slot(&mut self, slot: usize, light: Light) {
        let index = slot.clamp(1, Self::SLOTS) - 1;
        self.0[index] = light;
    }

    /// Every slot as a tagged light argument
    pub fn to_args(&self) -> Vec<Arg> {
        self.0.iter().copied().map(Arg::from).collect()
    }
}
