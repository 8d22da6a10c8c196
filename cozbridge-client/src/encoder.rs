//! Block command encoding
//!
//! Turns a block opcode and its loosely typed arguments into the call sent to
//! the peer. Numeric inputs are re-parsed and clamped here, colour names are
//! resolved to channel triples, and values the peer cannot infer on its own
//! (distances, speeds, angles, lights, notes, animations) are wrapped in
//! tagged arguments.

mod args;
mod lights;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use cozbridge_protocol::{Arg, CallRequest, Light, SongNote, TypedArg};
use cozbridge_utils::BridgeError;

pub use args::BlockArgs;
pub use lights::{
    backpack_index, cube_id, pattern_from_args, preset_or, preset_rgb, BackpackLights, CubeCorner,
    BLUE, OFF, PRESETS,
};

/// Lowest head angle in degrees
pub const HEAD_ANGLE_MIN: f64 = -25.0;
/// Highest head angle in degrees
pub const HEAD_ANGLE_MAX: f64 = 44.5;

const DRIVE_TIMEOUT: Duration = Duration::from_secs(15);
const WHEELS_MIN_TIMEOUT_MS: f64 = 10_000.0;

/// Input errors caught before anything is sent
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("unknown opcode: {0}")]
    UnknownOpcode(String),

    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl EncodeError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl From<EncodeError> for BridgeError {
    fn from(err: EncodeError) -> Self {
        match err {
            EncodeError::UnknownOpcode(op) => BridgeError::UnknownOperation(op),
            other => BridgeError::InvalidArgument(other.to_string()),
        }
    }
}

/// A call ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundCommand {
    pub method: String,
    pub args: Vec<Arg>,
    pub await_result: bool,
    /// Deadline for awaited calls; `None` uses the configured default
    pub timeout: Option<Duration>,
}

impl OutboundCommand {
    /// Call the peer does not reply to
    pub fn fire(method: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            method: method.into(),
            args,
            await_result: false,
            timeout: None,
        }
    }

    pub fn awaited(
        method: impl Into<String>,
        args: Vec<Arg>,
        await_result: bool,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            method: method.into(),
            args,
            await_result,
            timeout,
        }
    }

    pub fn into_request(self) -> CallRequest {
        CallRequest::new(self.method, self.args, self.await_result)
    }
}

/// Block operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    DriveStraight,
    DriveWheels,
    StopAllMotors,
    AbortAllActions,
    TurnInPlace,
    SetHeadAngle,
    SetLiftHeight,
    SetBackpackPreset,
    SetBackpackPresetPattern,
    SetBackpackLed,
    SetBackpackLightPattern,
    SetHeadLight,
    SetCubeLightsPreset,
    SetCubeLights,
    SetCubeLightCornersPattern,
    PlayAnimTrigger,
    SayText,
    PlaySong,
}

impl Opcode {
    pub const ALL: [Opcode; 18] = [
        Self::DriveStraight,
        Self::DriveWheels,
        Self::StopAllMotors,
        Self::AbortAllActions,
        Self::TurnInPlace,
        Self::SetHeadAngle,
        Self::SetLiftHeight,
        Self::SetBackpackPreset,
        Self::SetBackpackPresetPattern,
        Self::SetBackpackLed,
        Self::SetBackpackLightPattern,
        Self::SetHeadLight,
        Self::SetCubeLightsPreset,
        Self::SetCubeLights,
        Self::SetCubeLightCornersPattern,
        Self::PlayAnimTrigger,
        Self::SayText,
        Self::PlaySong,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::DriveStraight => "drive_straight",
            Self::DriveWheels => "drive_wheels",
            Self::StopAllMotors => "stop_all_motors",
            Self::AbortAllActions => "abort_all_actions",
            Self::TurnInPlace => "turn_in_place",
            Self::SetHeadAngle => "set_head_angle",
            Self::SetLiftHeight => "set_lift_height",
            Self::SetBackpackPreset => "set_backpack_preset",
            Self::SetBackpackPresetPattern => "set_backpack_preset_pattern",
            Self::SetBackpackLed => "set_backpack_led",
            Self::SetBackpackLightPattern => "set_backpack_light_pattern",
            Self::SetHeadLight => "set_head_light",
            Self::SetCubeLightsPreset => "set_cube_lights_preset",
            Self::SetCubeLights => "set_cube_lights",
            Self::SetCubeLightCornersPattern => "set_cube_light_corners_pattern",
            Self::PlayAnimTrigger => "play_anim_trigger",
            Self::SayText => "say_text",
            Self::PlaySong => "play_song",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Opcode {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.name() == s)
            .ok_or_else(|| EncodeError::UnknownOpcode(s.to_string()))
    }
}

/// Map a 0..=100 head position onto the head's angular range
///
/// Out-of-range input is clamped first.
pub fn head_angle_degrees(percent: f64) -> f64 {
    let p = percent.clamp(0.0, 100.0);
    HEAD_ANGLE_MIN + (p / 100.0) * (HEAD_ANGLE_MAX - HEAD_ANGLE_MIN)
}

/// Encode one block operation
///
/// Backpack operations update `backpack` before encoding.
pub fn encode(
    opcode: Opcode,
    args: &BlockArgs,
    backpack: &mut BackpackLights,
) -> Result<OutboundCommand, EncodeError> {
    match opcode {
        Opcode::DriveStraight => Ok(drive_straight(args)),
        Opcode::DriveWheels => Ok(drive_wheels(args)),
        Opcode::StopAllMotors => Ok(OutboundCommand::fire("robot.stop_all_motors", vec![])),
        Opcode::AbortAllActions => Ok(OutboundCommand::fire("robot.abort_all_actions", vec![])),
        Opcode::TurnInPlace => Ok(turn_in_place(args)),
        Opcode::SetHeadAngle => Ok(set_head_angle(args)),
        Opcode::SetLiftHeight => Ok(set_lift_height(args)),
        Opcode::SetBackpackPreset => set_backpack_preset(args, backpack),
        Opcode::SetBackpackPresetPattern => Ok(set_backpack_preset_pattern(args, backpack)),
        Opcode::SetBackpackLed => set_backpack_led(args, backpack),
        Opcode::SetBackpackLightPattern => Ok(set_backpack_light_pattern(args, backpack)),
        Opcode::SetHeadLight => Ok(OutboundCommand::fire(
            "robot.set_head_light",
            vec![args.boolean("ENABLE", false).into()],
        )),
        Opcode::SetCubeLightsPreset => Ok(set_cube_lights_preset(args)),
        Opcode::SetCubeLights => {
            let light = Light::Solid(preset_or(&args.text("PRESET"), BLUE));
            cube_lights(args, light)
        }
        Opcode::SetCubeLightCornersPattern => {
            cube_lights(args, Light::Pattern(pattern_from_args(args)))
        }
        Opcode::PlayAnimTrigger => Ok(play_anim_trigger(args)),
        Opcode::SayText => Ok(say_text(args)),
        Opcode::PlaySong => play_song(args),
    }
}

fn in_parallel(args: &BlockArgs) -> bool {
    args.boolean("IN_PARALLEL", false)
}

fn should_await(args: &BlockArgs) -> bool {
    args.boolean("AWAIT", false)
}

fn drive_straight(args: &BlockArgs) -> OutboundCommand {
    let call_args = vec![
        TypedArg::DistanceMm(args.number("DISTANCE", 0.0)).into(),
        TypedArg::SpeedMmps(args.number("SPEED", 50.0)).into(),
        args.boolean("PLAY_ANIM", true).into(),
        in_parallel(args).into(),
    ];
    OutboundCommand::awaited(
        "robot.drive_straight",
        call_args,
        should_await(args),
        Some(DRIVE_TIMEOUT),
    )
}

fn drive_wheels(args: &BlockArgs) -> OutboundCommand {
    let duration = args.number("DURATION", 0.0);
    let call_args = vec![
        args.number("LEFT", 0.0).into(),
        args.number("RIGHT", 0.0).into(),
        Arg::Null,
        Arg::Null,
        Some(duration).filter(|d| *d > 0.0).into(),
    ];
    let timeout_ms = WHEELS_MIN_TIMEOUT_MS.max(duration * 1000.0 + 2000.0);
    OutboundCommand::awaited(
        "robot.drive_wheels",
        call_args,
        args.boolean("WAIT", true),
        Some(Duration::from_millis(timeout_ms as u64)),
    )
}

fn turn_in_place(args: &BlockArgs) -> OutboundCommand {
    let call_args = vec![
        TypedArg::Degrees(args.number("ANGLE", 0.0)).into(),
        args.number("SPEED", 90.0).into(),
        in_parallel(args).into(),
    ];
    OutboundCommand::awaited(
        "robot.turn_in_place",
        call_args,
        should_await(args),
        Some(DRIVE_TIMEOUT),
    )
}

fn set_head_angle(args: &BlockArgs) -> OutboundCommand {
    let angle = head_angle_degrees(args.number("PERCENT", 0.0));
    let call_args = vec![
        TypedArg::Degrees(angle).into(),
        args.number("DURATION", 0.0).into(),
        in_parallel(args).into(),
    ];
    OutboundCommand::awaited("robot.set_head_angle", call_args, should_await(args), None)
}

fn set_lift_height(args: &BlockArgs) -> OutboundCommand {
    let height = args.number_clamped("HEIGHT", 20.0, 0.0, 100.0) / 100.0;
    let call_args = vec![
        height.into(),
        args.number("DURATION", 0.0).into(),
        in_parallel(args).into(),
    ];
    OutboundCommand::awaited("robot.set_lift_height", call_args, should_await(args), None)
}

fn set_backpack_preset(
    args: &BlockArgs,
    backpack: &mut BackpackLights,
) -> Result<OutboundCommand, EncodeError> {
    let preset = args.required_text("PRESET")?;
    let light = Light::Solid(preset_or(&preset, OFF));
    backpack.set_all(light);
    Ok(OutboundCommand::fire(
        "robot.set_all_backpack_lights",
        vec![light.into()],
    ))
}

fn set_backpack_preset_pattern(args: &BlockArgs, backpack: &mut BackpackLights) -> OutboundCommand {
    backpack.set_all(Light::Pattern(pattern_from_args(args)));
    OutboundCommand::fire("robot.set_backpack_lights", backpack.to_args())
}

fn set_backpack_led(
    args: &BlockArgs,
    backpack: &mut BackpackLights,
) -> Result<OutboundCommand, EncodeError> {
    let preset = args.required_text("PRESET")?;
    backpack.set_slot(backpack_index(args), Light::Solid(preset_or(&preset, OFF)));
    Ok(OutboundCommand::fire("robot.set_backpack_lights", backpack.to_args()))
}

fn set_backpack_light_pattern(args: &BlockArgs, backpack: &mut BackpackLights) -> OutboundCommand {
    backpack.set_slot(backpack_index(args), Light::Pattern(pattern_from_args(args)));
    OutboundCommand::fire("robot.set_backpack_lights", backpack.to_args())
}

fn cube_method(args: &BlockArgs, name: &str) -> String {
    format!("robot.world.light_cubes[{}].{}", cube_id(args), name)
}

fn set_cube_lights_preset(args: &BlockArgs) -> OutboundCommand {
    let light = Light::Solid(preset_or(&args.text("PRESET"), BLUE));
    OutboundCommand::fire(cube_method(args, "set_lights"), vec![light.into()])
}

fn cube_lights(args: &BlockArgs, light: Light) -> Result<OutboundCommand, EncodeError> {
    match CubeCorner::from_args(args)? {
        CubeCorner::All => Ok(OutboundCommand::fire(
            cube_method(args, "set_lights"),
            vec![light.into()],
        )),
        CubeCorner::Single(index) => {
            let mut corners = [Light::OFF; 4];
            corners[index] = light;
            Ok(OutboundCommand::fire(
                cube_method(args, "set_light_corners"),
                corners.into_iter().map(Arg::from).collect(),
            ))
        }
    }
}

fn play_anim_trigger(args: &BlockArgs) -> OutboundCommand {
    let loop_count = 1;
    let num_retries = 0;
    let call_args = vec![
        TypedArg::Animation(args.text("NAME")).into(),
        Arg::Integer(loop_count),
        in_parallel(args).into(),
        Arg::Integer(num_retries),
    ];
    OutboundCommand::awaited("robot.play_anim_trigger", call_args, should_await(args), None)
}

fn say_text(args: &BlockArgs) -> OutboundCommand {
    let mut text = args.text("TEXT");
    if text.is_empty() {
        text = "HELLO".into();
    }
    let mut duration_scalar = args.number("DURATION_SCALAR", 1.0);
    if duration_scalar <= 0.0 {
        duration_scalar = 1.0;
    }
    let play_excited_animation = false;

    let call_args = vec![
        text.into(),
        play_excited_animation.into(),
        args.boolean("USE_COZMO_VOICE", false).into(),
        duration_scalar.into(),
        args.number_clamped("VOICE_PITCH", 0.0, -1.0, 1.0).into(),
        in_parallel(args).into(),
    ];
    OutboundCommand::awaited(
        "robot.say_text",
        call_args,
        args.boolean("AWAIT", true),
        None,
    )
}

fn play_song(args: &BlockArgs) -> Result<OutboundCommand, EncodeError> {
    let note = SongNote {
        note_type: args.required_text("NOTE")?,
        note_duration: args.required_text("DURATION")?,
    };
    let notes = Arg::List(vec![TypedArg::SongNote(note).into()]);
    Ok(OutboundCommand::awaited(
        "robot.play_song",
        vec![notes],
        args.boolean("WAIT", false),
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn wire(args: &[Arg]) -> Value {
        serde_json::to_value(args).unwrap()
    }

    fn run(opcode: Opcode, args: BlockArgs) -> OutboundCommand {
        encode(opcode, &args, &mut BackpackLights::new()).unwrap()
    }

    #[test]
    fn test_opcode_names_round_trip() {
        for op in Opcode::ALL {
            assert_eq!(op.name().parse::<Opcode>().unwrap(), op);
        }
        assert!(matches!(
            "fly".parse::<Opcode>(),
            Err(EncodeError::UnknownOpcode(_))
        ));
    }

    #[test]
    fn test_head_angle_mapping() {
        assert_eq!(head_angle_degrees(0.0), -25.0);
        assert_eq!(head_angle_degrees(100.0), 44.5);
        assert_eq!(head_angle_degrees(50.0), 9.75);
        assert_eq!(head_angle_degrees(-20.0), -25.0);
        assert_eq!(head_angle_degrees(250.0), 44.5);
    }

    #[test]
    fn test_set_head_angle_wraps_degrees() {
        let cmd = run(
            Opcode::SetHeadAngle,
            BlockArgs::new().with("PERCENT", "50").with("AWAIT", "true"),
        );
        assert_eq!(cmd.method, "robot.set_head_angle");
        assert!(cmd.await_result);
        assert_eq!(
            wire(&cmd.args),
            json!([{"__cozmo_type": "degrees", "value": 9.75}, 0.0, false])
        );
    }

    #[test]
    fn test_drive_straight() {
        let cmd = run(
            Opcode::DriveStraight,
            BlockArgs::new().with("DISTANCE", "100").with("AWAIT", "TRUE"),
        );
        assert_eq!(cmd.method, "robot.drive_straight");
        assert!(cmd.await_result);
        assert_eq!(cmd.timeout, Some(Duration::from_secs(15)));
        assert_eq!(
            wire(&cmd.args),
            json!([
                {"__cozmo_type": "distance_mm", "value": 100.0},
                {"__cozmo_type": "speed_mmps", "value": 50.0},
                true,
                false
            ])
        );
    }

    #[test]
    fn test_drive_wheels_timeout_tracks_duration() {
        let cmd = run(Opcode::DriveWheels, BlockArgs::new().with("DURATION", 30));
        assert_eq!(cmd.timeout, Some(Duration::from_secs(32)));
        assert_eq!(wire(&cmd.args)[4], json!(30.0));

        let cmd = run(Opcode::DriveWheels, BlockArgs::new().with("LEFT", 20));
        assert_eq!(cmd.timeout, Some(Duration::from_secs(10)));
        assert_eq!(wire(&cmd.args), json!([20.0, 0.0, null, null, null]));
        assert!(cmd.await_result);
    }

    #[test]
    fn test_lift_height_is_a_fraction() {
        let cmd = run(Opcode::SetLiftHeight, BlockArgs::new());
        assert_eq!(cmd.args[0], Arg::Number(0.2));

        let cmd = run(Opcode::SetLiftHeight, BlockArgs::new().with("HEIGHT", 400));
        assert_eq!(cmd.args[0], Arg::Number(1.0));
    }

    #[test]
    fn test_single_backpack_slot_resends_all() {
        let mut backpack = BackpackLights::new();
        encode(
            Opcode::SetBackpackPreset,
            &BlockArgs::new().with("PRESET", "green"),
            &mut backpack,
        )
        .unwrap();
        let before = *backpack.slots();

        let cmd = encode(
            Opcode::SetBackpackLed,
            &BlockArgs::new().with("INDEX", 2).with("PRESET", "red"),
            &mut backpack,
        )
        .unwrap();

        assert_eq!(cmd.method, "robot.set_backpack_lights");
        assert_eq!(cmd.args.len(), 5);
        for (i, arg) in cmd.args.iter().enumerate() {
            let expected = if i == 1 {
                Light::Solid([255, 0, 0])
            } else {
                before[i]
            };
            assert_eq!(arg, &Arg::from(expected));
        }
    }

    #[test]
    fn test_backpack_pattern_slot() {
        let mut backpack = BackpackLights::new();
        let cmd = encode(
            Opcode::SetBackpackLightPattern,
            &BlockArgs::new()
                .with("INDEX", 5)
                .with("R", 10)
                .with("PATTERN", "flash"),
            &mut backpack,
        )
        .unwrap();

        let sent = wire(&cmd.args);
        assert_eq!(sent[0], json!({"__cozmo_type": "light", "value": [0, 0, 0]}));
        assert_eq!(sent[4]["value"]["on"], json!([10, 0, 0]));
        assert_eq!(sent[4]["value"]["pattern"], json!("flash"));
    }

    #[test]
    fn test_backpack_preset_fallback_and_missing() {
        let mut backpack = BackpackLights::new();
        let cmd = encode(
            Opcode::SetBackpackPreset,
            &BlockArgs::new().with("PRESET", "mauve"),
            &mut backpack,
        )
        .unwrap();
        assert_eq!(cmd.method, "robot.set_all_backpack_lights");
        assert_eq!(cmd.args, vec![Arg::from(Light::OFF)]);

        let err = encode(Opcode::SetBackpackLed, &BlockArgs::new(), &mut backpack).unwrap_err();
        assert_eq!(err, EncodeError::MissingArgument("PRESET"));
    }

    #[test]
    fn test_cube_lights() {
        let cmd = run(
            Opcode::SetCubeLightsPreset,
            BlockArgs::new().with("CUBE_ID", 2).with("PRESET", "mauve"),
        );
        assert_eq!(cmd.method, "robot.world.light_cubes[2].set_lights");
        assert_eq!(cmd.args, vec![Arg::from(Light::Solid(BLUE))]);

        let cmd = run(
            Opcode::SetCubeLights,
            BlockArgs::new()
                .with("CUBE_ID", 1)
                .with("LIGHT_CORNER", "light2")
                .with("PRESET", "red"),
        );
        assert_eq!(cmd.method, "robot.world.light_cubes[1].set_light_corners");
        assert_eq!(
            cmd.args,
            vec![
                Arg::from(Light::OFF),
                Arg::from(Light::Solid([255, 0, 0])),
                Arg::from(Light::OFF),
                Arg::from(Light::OFF),
            ]
        );

        let err = encode(
            Opcode::SetCubeLightCornersPattern,
            &BlockArgs::new().with("LIGHT_CORNER", "top"),
            &mut BackpackLights::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EncodeError::InvalidArgument(_)));
    }

    #[test]
    fn test_say_text_defaults() {
        let cmd = run(
            Opcode::SayText,
            BlockArgs::new()
                .with("DURATION_SCALAR", -2)
                .with("VOICE_PITCH", 3),
        );
        assert!(cmd.await_result);
        assert_eq!(
            wire(&cmd.args),
            json!(["HELLO", false, false, 1.0, 1.0, false])
        );
    }

    #[test]
    fn test_play_song() {
        let cmd = run(
            Opcode::PlaySong,
            BlockArgs::new().with("NOTE", "C2").with("DURATION", "Quarter"),
        );
        assert!(!cmd.await_result);
        assert_eq!(
            wire(&cmd.args),
            json!([[{
                "__cozmo_type": "songnote",
                "value": {"noteType": "C2", "noteDuration": "Quarter"}
            }]])
        );

        let err = encode(
            Opcode::PlaySong,
            &BlockArgs::new().with("NOTE", "C2"),
            &mut BackpackLights::new(),
        )
        .unwrap_err();
        assert_eq!(err, EncodeError::MissingArgument("DURATION"));
    }

    #[test]
    fn test_play_anim_trigger() {
        let cmd = run(
            Opcode::PlayAnimTrigger,
            BlockArgs::new().with("NAME", "CubePounceWinSession"),
        );
        assert_eq!(
            wire(&cmd.args),
            json!([{"__cozmo_type": "anim", "value": "CubePounceWinSession"}, 1, false, 0])
        );
    }

    #[test]
    fn test_fire_and_forget_ops() {
        for op in [Opcode::StopAllMotors, Opcode::AbortAllActions] {
            let cmd = run(op, BlockArgs::new());
            assert!(!cmd.await_result);
            assert!(cmd.args.is_empty());
        }
        let cmd = run(Opcode::SetHeadLight, BlockArgs::new().with("ENABLE", "true"));
        assert_eq!(cmd.args, vec![Arg::Bool(true)]);
    }
}
