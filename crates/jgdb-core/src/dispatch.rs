//! Packet dispatcher.
//!
//! Routes decoded packets to registered handlers by operation kind.
//! Handlers run synchronously on the stream-processing task; an operation
//! with no handler is a forward-compatible no-op.

use std::collections::HashMap;

use crate::protocol::{Op, Packet};

/// Callback invoked with a packet's arguments.
pub type PacketHandler = Box<dyn FnMut(serde_json::Value) + Send>;

/// Registry of packet handlers, one per operation.
#[derive(Default)]
pub struct PacketDispatcher {
    handlers: HashMap<Op, PacketHandler>,
}

impl PacketDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for an operation, replacing any previous one.
    pub fn register<F>(&mut self, op: Op, handler: F)
    where
        F: FnMut(serde_json::Value) + Send + 'static,
    {
        self.handlers.insert(op, Box::new(handler));
    }

    /// How many operations have handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Invoke the handler for `packet`, if one is registered.
    pub fn dispatch(&mut self, packet: Packet) {
        match self.handlers.get_mut(&packet.op) {
            Some(handler) => handler(packet.args),
            None => {
                tracing::debug!("no handler for operation {}", packet.op.wire_name());
            }
        }
    }
}

impl std::fmt::Debug for PacketDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketDispatcher")
            .field("handler_count", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn packet(op: Op, args: serde_json::Value) -> Packet {
        Packet { op, args }
    }

    #[test]
    fn dispatcher_new_empty() {
        let disp = PacketDispatcher::new();
        assert_eq!(disp.handler_count(), 0);
    }

    #[test]
    fn dispatcher_invokes_registered_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let mut disp = PacketDispatcher::new();
        disp.register(Op::StopEvent, move |args| {
            seen_clone.lock().unwrap().push(args);
        });

        disp.dispatch(packet(Op::StopEvent, serde_json::json!({"k": 1})));

        let captured = seen.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0]["k"], 1);
    }

    #[test]
    fn dispatcher_unregistered_operation_is_noop() {
        let called = Arc::new(Mutex::new(false));
        let called_clone = called.clone();

        let mut disp = PacketDispatcher::new();
        disp.register(Op::StopEvent, move |_| {
            *called_clone.lock().unwrap() = true;
        });

        // No handler for ContinueEvent; must not panic and must not
        // invoke the StopEvent handler.
        disp.dispatch(packet(Op::ContinueEvent, serde_json::Value::Null));
        assert!(!*called.lock().unwrap());
    }

    #[test]
    fn dispatcher_reregister_replaces_handler() {
        let counter = Arc::new(Mutex::new(0));

        let first = counter.clone();
        let mut disp = PacketDispatcher::new();
        disp.register(Op::ExitedEvent, move |_| {
            *first.lock().unwrap() += 1;
        });

        let second = counter.clone();
        disp.register(Op::ExitedEvent, move |_| {
            *second.lock().unwrap() += 10;
        });
        assert_eq!(disp.handler_count(), 1);

        disp.dispatch(packet(Op::ExitedEvent, serde_json::Value::Null));
        // Only the replacement ran.
        assert_eq!(*counter.lock().unwrap(), 10);
    }

    #[test]
    fn dispatcher_handler_can_mutate_captured_state() {
        let mut disp = PacketDispatcher::new();
        let count = Arc::new(Mutex::new(0u32));
        let count_clone = count.clone();
        disp.register(Op::FoundInferior, move |_| {
            *count_clone.lock().unwrap() += 1;
        });

        for _ in 0..3 {
            disp.dispatch(packet(Op::FoundInferior, serde_json::json!({})));
        }
        assert_eq!(*count.lock().unwrap(), 3);
    }

    #[test]
    fn dispatcher_debug_format() {
        let disp = PacketDispatcher::new();
        let debug = format!("{:?}", disp);
        assert!(debug.contains("PacketDispatcher"));
    }
}
