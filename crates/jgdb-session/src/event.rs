//! Events the session reports to the presentation layer.

use jgdb_core::SourcePosition;

/// One notification on the session's event channel.
///
/// Events arrive in the order the underlying stream produced them; output
/// text may be split across any number of `Output` events depending on
/// how the subprocess flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Interactive text to render verbatim (already newline-translated).
    Output(String),
    /// Whether the debugger currently accepts commands.
    InputState(bool),
    /// The cached source position changed; `None` means it was cleared.
    PositionChanged(Option<SourcePosition>),
    /// The context cache gained an entry or was cleared.
    ContextChanged,
    /// The subprocess exited; the session is unusable from here on.
    Exited {
        /// The exit code, when the process exited normally.
        status: Option<i32>,
    },
}
