//! The debug session: one live debugger subprocess wired to the bridge core.
//!
//! A session owns its subprocess exclusively. All output processing
//! (demultiplexing, packet dispatch, cache mutation) runs sequentially on
//! one task, so handlers never race each other. The presentation layer
//! holds the [`DebugSession`] handle and consumes [`SessionEvent`]s; it
//! never blocks the stream loop.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use tokio::process::Child;
use tokio::sync::mpsc;

use jgdb_core::protocol::{
    remote, BacktraceFinishedArgs, FoundFrameArgs, FoundInferiorArgs, FoundThreadArgs,
    FrameDescriptor, HoverFailedArgs, HoverFinishedArgs, HoverQueryArgs, PositionFinishedArgs,
    ThreadsQueryArgs,
};
use jgdb_core::{
    decode_packet, internal_command, remote_call, user_command, BreakpointSpec, BreakpointTable,
    Command, ContextCache, Op, PacketDispatcher, PendingRequests, QueryOutcome, SourcePosition,
    StreamDemux,
};

use crate::error::SessionError;
use crate::event::SessionEvent;
use crate::supervisor::{self, GdbProcess, SpawnedProcess};

/// How to launch the debugger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Path to the debugger binary.
    pub gdb_path: PathBuf,
    /// Extra arguments passed to the debugger.
    pub gdb_args: Vec<String>,
    /// Debugger-side extension script to `source` at startup, if any.
    /// Without it no packets will ever arrive.
    pub extension_script: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            gdb_path: PathBuf::from("gdb"),
            gdb_args: Vec::new(),
            extension_script: None,
        }
    }
}

/// Shared state the stream loop and the session handle both touch.
struct Shared {
    pending: Mutex<PendingRequests>,
    context: Mutex<ContextCache>,
    position: Mutex<Option<SourcePosition>>,
    accepts_input: AtomicBool,
    alive: AtomicBool,
    events: mpsc::UnboundedSender<SessionEvent>,
}

/// A handle to one active debug run.
pub struct DebugSession {
    process: GdbProcess,
    shared: Arc<Shared>,
    breakpoints: Mutex<BreakpointTable>,
}

impl DebugSession {
    /// Spawn the debugger and start the session.
    ///
    /// On success the process has launched and the session accepts input.
    /// The returned receiver carries everything the presentation layer
    /// needs to render; dropping it does not end the session.
    ///
    /// # Errors
    ///
    /// [`SessionError::SpawnFailed`] when the subprocess cannot start.
    /// No partial state is created on failure.
    pub async fn start(
        config: SessionConfig,
    ) -> Result<(DebugSession, mpsc::UnboundedReceiver<SessionEvent>), SessionError> {
        let SpawnedProcess {
            process,
            chunks,
            child,
        } = supervisor::spawn(&config.gdb_path, &config.gdb_args)?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            pending: Mutex::new(PendingRequests::new()),
            context: Mutex::new(ContextCache::new()),
            position: Mutex::new(None),
            accepts_input: AtomicBool::new(true),
            alive: AtomicBool::new(true),
            events: event_tx,
        });

        let session = DebugSession {
            process: process.clone(),
            shared: shared.clone(),
            breakpoints: Mutex::new(BreakpointTable::new()),
        };

        // Load the debugger-side script first so packets start flowing.
        if let Some(script) = &config.extension_script {
            session.send_internal(&format!("source {}", script.display()));
        }

        let dispatcher = build_dispatcher(process, shared.clone());
        tokio::spawn(run_stream(chunks, child, dispatcher, shared));

        Ok((session, event_rx))
    }

    /// Whether the subprocess is still running.
    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::SeqCst)
    }

    /// Whether the debugger currently accepts commands.
    pub fn accepts_input(&self) -> bool {
        self.shared.accepts_input.load(Ordering::SeqCst)
    }

    /// The cached source position, if any.
    pub fn current_position(&self) -> Option<SourcePosition> {
        self.shared.position.lock().unwrap().clone()
    }

    /// A snapshot of the context cache. May be empty if the session just
    /// resumed or ended; that is not an error.
    pub fn context_snapshot(&self) -> ContextCache {
        self.shared.context.lock().unwrap().clone()
    }

    /// Forward a user-typed command verbatim.
    ///
    /// Silently refused once the subprocess has exited.
    pub fn send_line(&self, text: &str) {
        if !self.is_alive() {
            tracing::debug!("ignoring send_line on ended session");
            return;
        }
        self.forward(user_command(text));
    }

    /// Send a system-issued debugger command, annotated in the output.
    pub fn send_internal(&self, command: &str) {
        if !self.is_alive() {
            tracing::debug!("ignoring send_internal on ended session");
            return;
        }
        self.forward(internal_command(command));
    }

    /// Deliver an interrupt (the Ctrl+C path). Safe at any time.
    pub fn interrupt(&self) {
        self.process.interrupt();
    }

    /// Ask the subprocess to terminate. Cleanup happens on the exit path,
    /// which is the single source of teardown.
    pub fn shutdown(&self) {
        self.process.terminate();
    }

    /// Load a program into the debugger.
    pub fn load_program(&self, program: &Path) {
        self.send_internal(&format!("file {}", program.display()));
    }

    /// Start the debuggee. Gated on the input-accepting state.
    pub fn run(&self) -> bool {
        self.command_if_ready("run")
    }

    /// Step over the current line.
    pub fn step_over(&self) -> bool {
        self.command_if_ready("n")
    }

    /// Step into the call at the current line.
    pub fn step_into(&self) -> bool {
        self.command_if_ready("s")
    }

    /// Run until the current function returns.
    pub fn step_out(&self) -> bool {
        self.command_if_ready("finish")
    }

    /// Resume execution.
    pub fn continue_execution(&self) -> bool {
        self.command_if_ready("c")
    }

    /// Ask for the current source position. The answer arrives as a
    /// position packet and updates the cache.
    pub fn request_current_position(&self) -> bool {
        self.remote_if_ready(remote::REQUEST_CURRENT_POSITION, &serde_json::json!({}))
    }

    /// Ask for discovery of threads in one inferior.
    pub fn request_all_threads_in_inferior(&self, inferior_id: u32) -> bool {
        self.remote_if_ready(
            remote::REQUEST_ALL_THREADS_IN_INFERIOR,
            &ThreadsQueryArgs { inferior_id },
        )
    }

    /// Ask for discovery of every inferior, thread, and frame.
    pub fn request_all_available_contexts(&self) -> bool {
        self.remote_if_ready(remote::REQUEST_ALL_AVAILABLE_CONTEXTS, &serde_json::json!({}))
    }

    /// Evaluate `expression` in the current frame.
    ///
    /// Resolves when the matching hover packet arrives; no timeout is
    /// imposed here. Callers with a deadline wrap this future and call
    /// [`cancel_hover`](Self::cancel_hover) on expiry.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotReady`] when the debugger is running,
    /// [`SessionError::QueryFailed`] on an explicit failure packet,
    /// [`SessionError::Closed`] when the session ends first.
    pub async fn hover(&self, expression: &str) -> Result<String, SessionError> {
        if !self.is_alive() {
            return Err(SessionError::Closed);
        }
        if !self.accepts_input() {
            return Err(SessionError::NotReady);
        }

        let rx = self.shared.pending.lock().unwrap().issue(expression);
        let cmd = remote_call(
            remote::REQUEST_HOVER_VALUE,
            &HoverQueryArgs {
                expression: expression.to_string(),
            },
        )?;
        self.forward(cmd);

        match rx.await {
            Ok(QueryOutcome::Success(value)) => Ok(value
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string())),
            Ok(QueryOutcome::Failure) => Err(SessionError::QueryFailed {
                key: expression.to_string(),
            }),
            Err(_) => Err(SessionError::Closed),
        }
    }

    /// Abandon every outstanding hover request for `expression`. A late
    /// response for the key is then dropped.
    pub fn cancel_hover(&self, expression: &str) {
        self.shared.pending.lock().unwrap().cancel(expression);
    }

    /// Fetch the backtrace of the current thread.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`hover`](Self::hover).
    pub async fn backtrace(&self) -> Result<Vec<FrameDescriptor>, SessionError> {
        if !self.is_alive() {
            return Err(SessionError::Closed);
        }
        if !self.accepts_input() {
            return Err(SessionError::NotReady);
        }

        let rx = self
            .shared
            .pending
            .lock()
            .unwrap()
            .issue(remote::REQUEST_BACKTRACE);
        let cmd = remote_call(remote::REQUEST_BACKTRACE, &serde_json::json!({}))?;
        self.forward(cmd);

        match rx.await {
            Ok(QueryOutcome::Success(value)) => serde_json::from_value(value).map_err(|e| {
                tracing::warn!("backtrace frames did not parse: {e}");
                SessionError::QueryFailed {
                    key: remote::REQUEST_BACKTRACE.to_string(),
                }
            }),
            Ok(QueryOutcome::Failure) => Err(SessionError::QueryFailed {
                key: remote::REQUEST_BACKTRACE.to_string(),
            }),
            Err(_) => Err(SessionError::Closed),
        }
    }

    /// Send breakpoints to the debugger and track them.
    pub fn set_breakpoints(&self, specs: &[BreakpointSpec]) -> bool {
        if specs.is_empty() {
            return true;
        }
        {
            let mut table = self.breakpoints.lock().unwrap();
            for spec in specs {
                table.add(spec.clone());
            }
        }
        self.send_breakpoint_call(remote::SET_BREAKPOINTS, specs)
    }

    /// Remove breakpoints from the debugger and stop tracking them.
    pub fn remove_breakpoints(&self, specs: &[BreakpointSpec]) -> bool {
        if specs.is_empty() {
            return true;
        }
        {
            let mut table = self.breakpoints.lock().unwrap();
            for spec in specs {
                table.remove(spec);
            }
        }
        self.send_breakpoint_call(remote::REMOVE_BREAKPOINTS, specs)
    }

    /// Reconcile the debugger with a desired breakpoint set, sending only
    /// the additions and removals.
    pub fn sync_breakpoints(&self, desired: &[BreakpointSpec]) -> bool {
        let delta = self.breakpoints.lock().unwrap().sync(desired);
        let mut ok = true;
        if !delta.added.is_empty() {
            ok &= self.send_breakpoint_call(remote::SET_BREAKPOINTS, &delta.added);
        }
        if !delta.removed.is_empty() {
            ok &= self.send_breakpoint_call(remote::REMOVE_BREAKPOINTS, &delta.removed);
        }
        ok
    }

    /// The breakpoints currently tracked as sent.
    pub fn tracked_breakpoints(&self) -> Vec<BreakpointSpec> {
        self.breakpoints.lock().unwrap().iter().cloned().collect()
    }

    fn send_breakpoint_call(&self, function: &str, specs: &[BreakpointSpec]) -> bool {
        let args = serde_json::json!({ "breakpoints": specs });
        match remote_call(function, &args) {
            Ok(cmd) => {
                self.forward(cmd);
                true
            }
            Err(e) => {
                tracing::warn!("could not encode {function}: {e}");
                false
            }
        }
    }

    fn command_if_ready(&self, command: &str) -> bool {
        if !self.is_alive() || !self.accepts_input() {
            return false;
        }
        self.forward(internal_command(command));
        true
    }

    fn remote_if_ready<T: serde::Serialize>(&self, function: &str, args: &T) -> bool {
        if !self.is_alive() || !self.accepts_input() {
            return false;
        }
        match remote_call(function, args) {
            Ok(cmd) => {
                self.forward(cmd);
                true
            }
            Err(e) => {
                tracing::warn!("could not encode {function}: {e}");
                false
            }
        }
    }

    fn forward(&self, cmd: Command) {
        forward(&self.process, &self.shared.events, cmd);
    }
}

impl Drop for DebugSession {
    fn drop(&mut self) {
        if self.is_alive() {
            self.process.terminate();
        }
    }
}

impl std::fmt::Debug for DebugSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugSession")
            .field("alive", &self.is_alive())
            .field("accepts_input", &self.accepts_input())
            .finish()
    }
}

/// Write a command to the subprocess, surfacing its annotation first.
fn forward(process: &GdbProcess, events: &mpsc::UnboundedSender<SessionEvent>, cmd: Command) {
    if let Some(annotation) = &cmd.annotation {
        let _ = events.send(SessionEvent::Output(format!("{annotation}\n\r")));
    }
    process.send_line(&cmd.line);
}

/// Parse handler arguments, logging and dropping the packet on mismatch.
fn parse_args<T: DeserializeOwned>(op: Op, args: serde_json::Value) -> Option<T> {
    match serde_json::from_value(args) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!("bad arguments for {}: {e}", op.wire_name());
            None
        }
    }
}

/// Register the built-in handler for every wire operation.
fn build_dispatcher(process: GdbProcess, shared: Arc<Shared>) -> PacketDispatcher {
    let mut dispatcher = PacketDispatcher::new();

    {
        let shared = shared.clone();
        dispatcher.register(Op::ContinueEvent, move |_args| {
            shared.accepts_input.store(false, Ordering::SeqCst);
            shared.context.lock().unwrap().clear();
            *shared.position.lock().unwrap() = None;
            let _ = shared.events.send(SessionEvent::InputState(false));
            let _ = shared.events.send(SessionEvent::ContextChanged);
            let _ = shared.events.send(SessionEvent::PositionChanged(None));
        });
    }

    {
        let shared = shared.clone();
        dispatcher.register(Op::StopEvent, move |_args| {
            shared.accepts_input.store(true, Ordering::SeqCst);
            let _ = shared.events.send(SessionEvent::InputState(true));
            // The stop packet carries no position; ask for it.
            match remote_call(remote::REQUEST_CURRENT_POSITION, &serde_json::json!({})) {
                Ok(cmd) => forward(&process, &shared.events, cmd),
                Err(e) => tracing::warn!("could not encode position request: {e}"),
            }
        });
    }

    {
        let shared = shared.clone();
        dispatcher.register(Op::ExitedEvent, move |_args| {
            shared.accepts_input.store(true, Ordering::SeqCst);
            let _ = shared.events.send(SessionEvent::InputState(true));
        });
    }

    {
        let shared = shared.clone();
        dispatcher.register(Op::HoverFinished, move |args| {
            let Some(args) = parse_args::<HoverFinishedArgs>(Op::HoverFinished, args) else {
                return;
            };
            shared
                .pending
                .lock()
                .unwrap()
                .resolve_success(&args.expression, serde_json::Value::String(args.value));
        });
    }

    {
        let shared = shared.clone();
        dispatcher.register(Op::HoverFailed, move |args| {
            let Some(args) = parse_args::<HoverFailedArgs>(Op::HoverFailed, args) else {
                return;
            };
            shared.pending.lock().unwrap().resolve_failure(&args.expression);
        });
    }

    {
        let shared = shared.clone();
        dispatcher.register(Op::BacktraceFinished, move |args| {
            let Some(args) = parse_args::<BacktraceFinishedArgs>(Op::BacktraceFinished, args)
            else {
                return;
            };
            let frames = match serde_json::to_value(args.frames) {
                Ok(frames) => frames,
                Err(e) => {
                    tracing::warn!("could not re-encode backtrace frames: {e}");
                    return;
                }
            };
            shared
                .pending
                .lock()
                .unwrap()
                .resolve_success(remote::REQUEST_BACKTRACE, frames);
        });
    }

    {
        let shared = shared.clone();
        dispatcher.register(Op::BacktraceFailed, move |_args| {
            shared
                .pending
                .lock()
                .unwrap()
                .resolve_failure(remote::REQUEST_BACKTRACE);
        });
    }

    {
        let shared = shared.clone();
        dispatcher.register(Op::FoundInferior, move |args| {
            let Some(args) = parse_args::<FoundInferiorArgs>(Op::FoundInferior, args) else {
                return;
            };
            let inserted = shared
                .context
                .lock()
                .unwrap()
                .add_inferior(args.inferior_id, args.inferior_name);
            if inserted {
                let _ = shared.events.send(SessionEvent::ContextChanged);
            }
        });
    }

    {
        let shared = shared.clone();
        dispatcher.register(Op::FoundThread, move |args| {
            let Some(args) = parse_args::<FoundThreadArgs>(Op::FoundThread, args) else {
                return;
            };
            let inserted = shared.context.lock().unwrap().add_thread(
                args.inferior_id,
                args.global_thread_id,
                args.thread_name,
            );
            if inserted {
                let _ = shared.events.send(SessionEvent::ContextChanged);
            }
        });
    }

    {
        let shared = shared.clone();
        dispatcher.register(Op::FoundFrame, move |args| {
            let Some(args) = parse_args::<FoundFrameArgs>(Op::FoundFrame, args) else {
                return;
            };
            let inserted = shared.context.lock().unwrap().add_frame(
                args.inferior_id,
                args.global_thread_id,
                args.level,
                args.function_name,
            );
            if inserted {
                let _ = shared.events.send(SessionEvent::ContextChanged);
            }
        });
    }

    {
        let shared = shared.clone();
        dispatcher.register(Op::PositionFinished, move |args| {
            let Some(args) = parse_args::<PositionFinishedArgs>(Op::PositionFinished, args) else {
                return;
            };
            let position: SourcePosition = args.into();
            *shared.position.lock().unwrap() = Some(position.clone());
            let _ = shared
                .events
                .send(SessionEvent::PositionChanged(Some(position)));
        });
    }

    dispatcher.register(Op::PositionFailed, move |_args| {
        tracing::debug!("current position unavailable");
    });

    dispatcher
}

/// The per-session stream loop: demultiplex, dispatch, then tear down
/// exactly once when the subprocess goes away.
async fn run_stream(
    mut chunks: mpsc::Receiver<Vec<u8>>,
    mut child: Child,
    mut dispatcher: PacketDispatcher,
    shared: Arc<Shared>,
) {
    let mut demux = StreamDemux::new();
    while let Some(chunk) = chunks.recv().await {
        let out = demux.push(&chunk);
        if !out.display.is_empty() {
            let _ = shared.events.send(SessionEvent::Output(out.display));
        }
        for payload in out.packets {
            match decode_packet(&payload) {
                Ok(packet) => dispatcher.dispatch(packet),
                Err(e) => tracing::warn!("dropping packet: {e}"),
            }
        }
    }

    // Both output pipes closed: the subprocess is gone. Reap it and run
    // the one and only teardown.
    let status = child.wait().await.ok().and_then(|s| s.code());
    shared.alive.store(false, Ordering::SeqCst);
    shared.accepts_input.store(false, Ordering::SeqCst);
    shared.pending.lock().unwrap().fail_all();
    shared.context.lock().unwrap().clear();
    *shared.position.lock().unwrap() = None;
    let _ = shared.events.send(SessionEvent::Exited { status });
    tracing::info!("debugger exited with status {status:?}");
}
