//! Single-slot session management.
//!
//! One presentation surface drives at most one debug session. The manager
//! owns the active handle, rejects double starts while the subprocess is
//! alive, and lets a finished session be replaced.

use tokio::sync::mpsc;

use crate::error::SessionError;
use crate::event::SessionEvent;
use crate::session::{DebugSession, SessionConfig};

/// Owner of the (at most one) active debug session.
#[derive(Debug, Default)]
pub struct SessionManager {
    active: Option<DebugSession>,
}

impl SessionManager {
    /// Create a manager with no active session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session.
    ///
    /// # Errors
    ///
    /// [`SessionError::AlreadyRunning`] when a live session exists; no
    /// partial state is created. Spawn failures pass through unchanged.
    pub async fn start(
        &mut self,
        config: SessionConfig,
    ) -> Result<mpsc::UnboundedReceiver<SessionEvent>, SessionError> {
        if let Some(existing) = &self.active {
            if existing.is_alive() {
                return Err(SessionError::AlreadyRunning);
            }
        }
        let (session, events) = DebugSession::start(config).await?;
        self.active = Some(session);
        Ok(events)
    }

    /// The active session handle, if one has been started.
    pub fn session(&self) -> Option<&DebugSession> {
        self.active.as_ref()
    }

    /// Whether a live session exists.
    pub fn has_live_session(&self) -> bool {
        self.active.as_ref().is_some_and(|s| s.is_alive())
    }

    /// Shut down and release the active session, if any. Teardown itself
    /// runs on the session's exit path.
    pub fn shutdown(&mut self) {
        if let Some(session) = self.active.take() {
            session.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tokio::time::{timeout, Duration};

    fn cat_config() -> SessionConfig {
        SessionConfig {
            gdb_path: PathBuf::from("cat"),
            ..SessionConfig::default()
        }
    }

    #[tokio::test]
    async fn manager_new_has_no_session() {
        let manager = SessionManager::new();
        assert!(manager.session().is_none());
        assert!(!manager.has_live_session());
    }

    #[tokio::test]
    async fn double_start_rejected_while_alive() {
        let mut manager = SessionManager::new();
        let _events = manager.start(cat_config()).await.unwrap();
        assert!(manager.has_live_session());

        let result = manager.start(cat_config()).await;
        assert!(matches!(result, Err(SessionError::AlreadyRunning)));
        // The first session is untouched.
        assert!(manager.has_live_session());

        manager.shutdown();
    }

    #[tokio::test]
    async fn finished_session_can_be_replaced() {
        let mut manager = SessionManager::new();
        let mut events = manager.start(cat_config()).await.unwrap();

        manager.session().unwrap().shutdown();
        loop {
            match timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("timed out waiting for exit")
            {
                Some(SessionEvent::Exited { .. }) | None => break,
                Some(_) => continue,
            }
        }
        // Teardown runs before the exit event is sent, so the slot is
        // already considered dead.
        assert!(!manager.has_live_session());

        let _events = manager.start(cat_config()).await.unwrap();
        assert!(manager.has_live_session());
        manager.shutdown();
    }

    #[tokio::test]
    async fn spawn_failure_leaves_no_state() {
        let mut manager = SessionManager::new();
        let config = SessionConfig {
            gdb_path: PathBuf::from("definitely-not-a-real-debugger-xyz"),
            ..SessionConfig::default()
        };
        assert!(manager.start(config).await.is_err());
        assert!(manager.session().is_none());

        // A valid start still works afterwards.
        let _events = manager.start(cat_config()).await.unwrap();
        manager.shutdown();
    }
}
