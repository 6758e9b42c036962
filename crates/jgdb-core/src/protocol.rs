//! Wire protocol types.
//!
//! Packets embedded in the debugger's output stream carry a
//! `{"functionName": ..., "args": {...}}` envelope. The operation name is
//! resolved to an [`Op`] at decode time; argument shapes are the typed
//! structs below. JSON field names match what the debugger-side script
//! emits, so several fields carry explicit renames.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Operations the debugger-side script invokes on the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Execution resumed; the paused-state caches are stale.
    ContinueEvent,
    /// Execution stopped at a breakpoint, signal, or step boundary.
    StopEvent,
    /// The debuggee exited; the debugger prompt is available again.
    ExitedEvent,
    /// A hover query succeeded.
    HoverFinished,
    /// A hover query failed.
    HoverFailed,
    /// A backtrace query succeeded.
    BacktraceFinished,
    /// A backtrace query failed.
    BacktraceFailed,
    /// Discovery: an inferior (debugged process) exists.
    FoundInferior,
    /// Discovery: a thread exists within an inferior.
    FoundThread,
    /// Discovery: a stack frame exists within a thread.
    FoundFrame,
    /// The current source position is known.
    PositionFinished,
    /// The current source position could not be determined.
    PositionFailed,
}

impl Op {
    /// Resolve a wire operation name to an [`Op`].
    pub fn from_wire_name(name: &str) -> Option<Op> {
        match name {
            "handleContinueEvent" => Some(Op::ContinueEvent),
            "handleStopEvent" => Some(Op::StopEvent),
            "handleExitedEvent" => Some(Op::ExitedEvent),
            "hoverRequestFinished" => Some(Op::HoverFinished),
            "hoverRequestFailed" => Some(Op::HoverFailed),
            "backtraceRequestFinished" => Some(Op::BacktraceFinished),
            "backtraceRequestFailed" => Some(Op::BacktraceFailed),
            "foundInferiorContext" => Some(Op::FoundInferior),
            "foundThreadContext" => Some(Op::FoundThread),
            "foundFrameContext" => Some(Op::FoundFrame),
            "currentPositionRequestFinished" => Some(Op::PositionFinished),
            "currentPositionRequestFailed" => Some(Op::PositionFailed),
            _ => None,
        }
    }

    /// The wire name of this operation.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Op::ContinueEvent => "handleContinueEvent",
            Op::StopEvent => "handleStopEvent",
            Op::ExitedEvent => "handleExitedEvent",
            Op::HoverFinished => "hoverRequestFinished",
            Op::HoverFailed => "hoverRequestFailed",
            Op::BacktraceFinished => "backtraceRequestFinished",
            Op::BacktraceFailed => "backtraceRequestFailed",
            Op::FoundInferior => "foundInferiorContext",
            Op::FoundThread => "foundThreadContext",
            Op::FoundFrame => "foundFrameContext",
            Op::PositionFinished => "currentPositionRequestFinished",
            Op::PositionFailed => "currentPositionRequestFailed",
        }
    }
}

/// Remote functions the bridge invokes on the debugger-side script.
pub mod remote {
    pub const REQUEST_CURRENT_POSITION: &str = "request_current_position";
    pub const REQUEST_HOVER_VALUE: &str = "request_hover_value";
    pub const REQUEST_BACKTRACE: &str = "request_backtrace_for_current_thread";
    pub const REQUEST_ALL_THREADS_IN_INFERIOR: &str = "request_all_threads_in_inferior";
    pub const REQUEST_ALL_AVAILABLE_CONTEXTS: &str = "request_all_available_contexts";
    pub const SET_BREAKPOINTS: &str = "set_breakpoints";
    pub const REMOVE_BREAKPOINTS: &str = "remove_breakpoints";
}

/// A decoded packet: one operation plus its raw arguments.
///
/// Arguments stay as a JSON value until the matching handler parses them;
/// the core does not interpret them further.
#[derive(Debug, Clone)]
pub struct Packet {
    /// The operation this packet invokes.
    pub op: Op,
    /// The operation's arguments, as received.
    pub args: serde_json::Value,
}

/// The wire envelope around a packet payload.
#[derive(Debug, Deserialize)]
struct PacketEnvelope {
    #[serde(rename = "functionName")]
    function_name: String,
    #[serde(default)]
    args: serde_json::Value,
}

/// Decode one packet payload string.
///
/// # Errors
///
/// [`CoreError::MalformedPacket`] when the payload is not a valid envelope,
/// [`CoreError::UnknownOperation`] when the operation name is unrecognized.
/// Neither is fatal to a session; callers log and drop.
pub fn decode_packet(payload: &str) -> Result<Packet, CoreError> {
    let envelope: PacketEnvelope =
        serde_json::from_str(payload).map_err(|e| CoreError::MalformedPacket(e.to_string()))?;
    let op = Op::from_wire_name(&envelope.function_name)
        .ok_or(CoreError::UnknownOperation(envelope.function_name))?;
    Ok(Packet {
        op,
        args: envelope.args,
    })
}

/// Arguments of a successful hover query.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct HoverFinishedArgs {
    pub expression: String,
    pub value: String,
}

/// Arguments of a failed hover query.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct HoverFailedArgs {
    pub expression: String,
}

/// One frame in a backtrace result, newest first at level 0.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct FrameDescriptor {
    #[serde(rename = "functionName")]
    pub function_name: String,
    pub level: u32,
}

/// Arguments of a successful backtrace query.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BacktraceFinishedArgs {
    pub frames: Vec<FrameDescriptor>,
}

/// Discovery arguments for an inferior.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct FoundInferiorArgs {
    #[serde(rename = "inferiorID")]
    pub inferior_id: u32,
    #[serde(rename = "inferiorName")]
    pub inferior_name: String,
}

/// Discovery arguments for a thread.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct FoundThreadArgs {
    #[serde(rename = "inferiorID")]
    pub inferior_id: u32,
    #[serde(rename = "globalThreadID")]
    pub global_thread_id: u32,
    #[serde(rename = "threadName")]
    pub thread_name: String,
}

/// Discovery arguments for a stack frame.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct FoundFrameArgs {
    #[serde(rename = "inferiorID")]
    pub inferior_id: u32,
    #[serde(rename = "globalThreadID")]
    pub global_thread_id: u32,
    #[serde(rename = "functionName")]
    pub function_name: String,
    pub level: u32,
}

/// Arguments of a successful current-position query.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PositionFinishedArgs {
    #[serde(rename = "isNewestFrame")]
    pub is_newest_frame: bool,
    #[serde(rename = "filePath")]
    pub file_path: PathBuf,
    pub line: u32,
}

/// The cached source position of the frame the debugger is focused on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePosition {
    pub file_path: PathBuf,
    /// Line number as reported by the debugger.
    pub line: u32,
    /// Whether the focused frame is the newest frame of its thread.
    pub is_newest_frame: bool,
}

impl From<PositionFinishedArgs> for SourcePosition {
    fn from(args: PositionFinishedArgs) -> Self {
        Self {
            file_path: args.file_path,
            line: args.line,
            is_newest_frame: args.is_newest_frame,
        }
    }
}

/// Arguments of `request_hover_value`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HoverQueryArgs {
    pub expression: String,
}

/// Arguments of `request_all_threads_in_inferior`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreadsQueryArgs {
    pub inferior_id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_wire_names_round_trip() {
        let ops = [
            Op::ContinueEvent,
            Op::StopEvent,
            Op::ExitedEvent,
            Op::HoverFinished,
            Op::HoverFailed,
            Op::BacktraceFinished,
            Op::BacktraceFailed,
            Op::FoundInferior,
            Op::FoundThread,
            Op::FoundFrame,
            Op::PositionFinished,
            Op::PositionFailed,
        ];
        for op in ops {
            assert_eq!(Op::from_wire_name(op.wire_name()), Some(op));
        }
    }

    #[test]
    fn op_unknown_wire_name() {
        assert_eq!(Op::from_wire_name("unknownOp"), None);
        assert_eq!(Op::from_wire_name(""), None);
    }

    #[test]
    fn decode_packet_valid() {
        let payload = r#"{"functionName":"handleStopEvent","args":{}}"#;
        let packet = decode_packet(payload).unwrap();
        assert_eq!(packet.op, Op::StopEvent);
        assert!(packet.args.as_object().unwrap().is_empty());
    }

    #[test]
    fn decode_packet_missing_args_defaults_to_null() {
        let payload = r#"{"functionName":"handleContinueEvent"}"#;
        let packet = decode_packet(payload).unwrap();
        assert_eq!(packet.op, Op::ContinueEvent);
        assert!(packet.args.is_null());
    }

    #[test]
    fn decode_packet_malformed_json() {
        let err = decode_packet("{not json").unwrap_err();
        assert!(matches!(err, CoreError::MalformedPacket(_)));
    }

    #[test]
    fn decode_packet_unknown_operation() {
        let payload = r#"{"functionName":"frobnicate","args":{}}"#;
        let err = decode_packet(payload).unwrap_err();
        match err {
            CoreError::UnknownOperation(name) => assert_eq!(name, "frobnicate"),
            other => panic!("expected UnknownOperation, got: {:?}", other),
        }
    }

    #[test]
    fn hover_args_wire_keys() {
        let json = r#"{"expression":"x + y","value":"42"}"#;
        let args: HoverFinishedArgs = serde_json::from_str(json).unwrap();
        assert_eq!(args.expression, "x + y");
        assert_eq!(args.value, "42");
    }

    #[test]
    fn inferior_args_wire_keys() {
        let json = r#"{"inferiorID":1,"inferiorName":"a.out"}"#;
        let args: FoundInferiorArgs = serde_json::from_str(json).unwrap();
        assert_eq!(args.inferior_id, 1);
        assert_eq!(args.inferior_name, "a.out");
    }

    #[test]
    fn thread_args_wire_keys() {
        let json = r#"{"inferiorID":1,"globalThreadID":7,"threadName":"worker"}"#;
        let args: FoundThreadArgs = serde_json::from_str(json).unwrap();
        assert_eq!(args.global_thread_id, 7);
        assert_eq!(args.thread_name, "worker");
    }

    #[test]
    fn frame_args_wire_keys() {
        let json =
            r#"{"inferiorID":1,"globalThreadID":7,"functionName":"main","level":0}"#;
        let args: FoundFrameArgs = serde_json::from_str(json).unwrap();
        assert_eq!(args.function_name, "main");
        assert_eq!(args.level, 0);
    }

    #[test]
    fn position_args_wire_keys() {
        let json = r#"{"isNewestFrame":true,"filePath":"/src/main.c","line":12}"#;
        let args: PositionFinishedArgs = serde_json::from_str(json).unwrap();
        assert!(args.is_newest_frame);
        assert_eq!(args.file_path, PathBuf::from("/src/main.c"));
        assert_eq!(args.line, 12);

        let pos: SourcePosition = args.into();
        assert_eq!(pos.line, 12);
        assert!(pos.is_newest_frame);
    }

    #[test]
    fn backtrace_args_preserve_frame_order() {
        let json = r#"{"frames":[
            {"functionName":"inner","level":0},
            {"functionName":"outer","level":1},
            {"functionName":"main","level":2}
        ]}"#;
        let args: BacktraceFinishedArgs = serde_json::from_str(json).unwrap();
        assert_eq!(args.frames.len(), 3);
        assert_eq!(args.frames[0].function_name, "inner");
        assert_eq!(args.frames[2].level, 2);
    }

    #[test]
    fn threads_query_args_serialize_snake_case() {
        let json = serde_json::to_value(ThreadsQueryArgs { inferior_id: 3 }).unwrap();
        assert_eq!(json["inferior_id"], 3);
    }
}
