//! jgdb-core — the GDB bridge core.
//!
//! This crate implements the protocol side of the bridge: splitting the
//! debugger's combined output stream into interactive text and embedded
//! packets, decoding and dispatching packets to handlers, correlating
//! one-shot queries with their responses, caching the paused-state
//! context tree, and encoding outbound commands.

pub mod breakpoint;
pub mod command;
pub mod context;
pub mod demux;
pub mod dispatch;
pub mod error;
pub mod pending;
pub mod protocol;

// Re-export key types for convenience.
pub use breakpoint::{BreakpointDelta, BreakpointSpec, BreakpointTable};
pub use command::{internal_command, remote_call, user_command, Command};
pub use context::ContextCache;
pub use demux::{Demuxed, StreamDemux, PACKET_TAG};
pub use dispatch::PacketDispatcher;
pub use error::CoreError;
pub use pending::{PendingRequests, QueryOutcome};
pub use protocol::{decode_packet, Op, Packet, SourcePosition};
