//! Interactive console: the minimal presentation layer.
//!
//! Runs the terminal in raw mode and plays both directions: session
//! output is written straight through (it arrives already
//! newline-translated), and keystrokes are accumulated into a line that
//! Enter submits. Ctrl+C interrupts the debuggee at any time; Ctrl+D
//! ends the session.

use std::io::{self, Write};

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tokio::sync::mpsc;

use jgdb_session::{DebugSession, SessionEvent};

/// What one key press means to the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Append a character to the pending line.
    Insert(char),
    /// Submit the pending line to the debugger.
    Submit,
    /// Remove the last pending character.
    Backspace,
    /// Interrupt the debuggee.
    Interrupt,
    /// End the session and leave.
    Quit,
    /// Nothing.
    Ignore,
}

/// Map a key event to its console action.
pub fn classify_key(key: &KeyEvent) -> KeyAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => KeyAction::Interrupt,
            KeyCode::Char('d') => KeyAction::Quit,
            _ => KeyAction::Ignore,
        };
    }
    match key.code {
        KeyCode::Enter => KeyAction::Submit,
        KeyCode::Backspace => KeyAction::Backspace,
        // Completion is not wired up; swallow tabs rather than send them.
        KeyCode::Tab => KeyAction::Ignore,
        KeyCode::Char(c) => KeyAction::Insert(c),
        _ => KeyAction::Ignore,
    }
}

/// Restores the terminal on scope exit.
struct RawModeGuard;

impl RawModeGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Read terminal events on a dedicated thread; crossterm's read blocks.
fn spawn_key_reader() -> mpsc::UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || loop {
        match crossterm::event::read() {
            Ok(event) => {
                if tx.send(event).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
    rx
}

/// Drive the console until the session ends or the user quits.
pub async fn run(
    session: &DebugSession,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) -> Result<()> {
    let _raw = RawModeGuard::new()?;
    let mut keys = spawn_key_reader();
    let mut stdout = io::stdout();
    let mut line = String::new();
    let mut accepts_input = session.accepts_input();

    loop {
        tokio::select! {
            maybe_event = events.recv() => {
                let Some(event) = maybe_event else { break };
                match event {
                    SessionEvent::Output(text) => {
                        stdout.write_all(text.as_bytes())?;
                        stdout.flush()?;
                    }
                    SessionEvent::InputState(state) => accepts_input = state,
                    SessionEvent::PositionChanged(Some(pos)) => {
                        let marker = if pos.is_newest_frame { "=>" } else { "->" };
                        write!(
                            stdout,
                            "\n\r{marker} {}:{}\n\r",
                            pos.file_path.display(),
                            pos.line
                        )?;
                        stdout.flush()?;
                    }
                    SessionEvent::PositionChanged(None) | SessionEvent::ContextChanged => {}
                    SessionEvent::Exited { .. } => {
                        stdout.write_all(b"\n\r\n\rGDB exited.\n\r")?;
                        stdout.flush()?;
                        break;
                    }
                }
            }
            maybe_key = keys.recv() => {
                match maybe_key {
                    Some(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                        match classify_key(&key) {
                            KeyAction::Interrupt => session.interrupt(),
                            KeyAction::Quit => session.shutdown(),
                            KeyAction::Submit if accepts_input => {
                                stdout.write_all(b"\n\r")?;
                                stdout.flush()?;
                                session.send_line(&line);
                                line.clear();
                            }
                            KeyAction::Backspace if accepts_input => {
                                if line.pop().is_some() {
                                    stdout.write_all(b"\x1b[D\x1b[P")?;
                                    stdout.flush()?;
                                }
                            }
                            KeyAction::Insert(c) if accepts_input => {
                                line.push(c);
                                let mut buf = [0u8; 4];
                                stdout.write_all(c.encode_utf8(&mut buf).as_bytes())?;
                                stdout.flush()?;
                            }
                            _ => {}
                        }
                    }
                    Some(_) => {}
                    None => break,
                }
            }
        }
    }
    Ok(())
}
