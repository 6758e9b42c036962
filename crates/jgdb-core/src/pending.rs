//! Pending-request table.
//!
//! The wire has no message IDs, so one-shot queries are correlated by a
//! key taken from the request itself (the hover expression text, or the
//! remote function name for argument-less queries). Each registered
//! request holds a oneshot sender; the matching response resolves it
//! exactly once. Multiplicity is FIFO per key: a response resolves only
//! the oldest outstanding entry with that key.

use tokio::sync::oneshot;

/// The result delivered to a waiting query.
#[derive(Debug)]
pub enum QueryOutcome {
    /// The debugger answered; the payload is the handler's value.
    Success(serde_json::Value),
    /// The debugger reported failure, or the request was cancelled.
    Failure,
}

struct PendingEntry {
    key: String,
    tx: oneshot::Sender<QueryOutcome>,
}

/// Table of outstanding one-shot queries, in issuance order.
#[derive(Default)]
pub struct PendingRequests {
    entries: Vec<PendingEntry>,
}

impl PendingRequests {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a query and return the receiver its response resolves.
    ///
    /// The caller is responsible for sending the matching command to the
    /// subprocess. No timeout is imposed here; callers needing bounded
    /// latency wrap the receiver themselves and [`cancel`](Self::cancel)
    /// on expiry.
    pub fn issue(&mut self, key: impl Into<String>) -> oneshot::Receiver<QueryOutcome> {
        let (tx, rx) = oneshot::channel();
        self.entries.push(PendingEntry {
            key: key.into(),
            tx,
        });
        rx
    }

    /// How many requests are outstanding.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no requests are outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve the oldest request matching `key` with a success value.
    ///
    /// Returns `true` if an entry was resolved. A response with no
    /// matching entry is a safe no-op (e.g. a late reply after
    /// cancellation).
    pub fn resolve_success(&mut self, key: &str, value: serde_json::Value) -> bool {
        self.resolve_first(key, QueryOutcome::Success(value))
    }

    /// Resolve the oldest request matching `key` as failed.
    pub fn resolve_failure(&mut self, key: &str) -> bool {
        self.resolve_first(key, QueryOutcome::Failure)
    }

    /// Remove every request matching `key`, resolving each as failed.
    ///
    /// Returns how many entries were removed. Used when a caller's
    /// interest in the key has expired entirely.
    pub fn cancel(&mut self, key: &str) -> usize {
        let mut removed = 0;
        let mut remaining = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if entry.key == key {
                let _ = entry.tx.send(QueryOutcome::Failure);
                removed += 1;
            } else {
                remaining.push(entry);
            }
        }
        self.entries = remaining;
        removed
    }

    /// Resolve every outstanding request as failed. Called on teardown.
    pub fn fail_all(&mut self) {
        for entry in self.entries.drain(..) {
            let _ = entry.tx.send(QueryOutcome::Failure);
        }
    }

    fn resolve_first(&mut self, key: &str, outcome: QueryOutcome) -> bool {
        match self.entries.iter().position(|e| e.key == key) {
            Some(idx) => {
                let entry = self.entries.remove(idx);
                // A dropped receiver means the caller gave up; that's fine.
                let _ = entry.tx.send(outcome);
                true
            }
            None => {
                tracing::debug!("no pending request for key {key:?}");
                false
            }
        }
    }
}

impl std::fmt::Debug for PendingRequests {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequests")
            .field("len", &self.entries.len())
            .finish()
    }
}
