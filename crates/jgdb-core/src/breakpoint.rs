//! Client-side breakpoint tracking.
//!
//! The bridge sends breakpoints to the debugger as descriptor lists; this
//! table remembers what has been sent so a changed desired set can be
//! expressed as set/remove deltas.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A breakpoint descriptor as carried on the wire: file path plus line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BreakpointSpec {
    pub path: PathBuf,
    /// Line number (1-based).
    pub line: u32,
}

impl BreakpointSpec {
    /// Create a descriptor for the given path and line.
    pub fn new(path: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            path: path.into(),
            line,
        }
    }
}

/// The difference between the tracked set and a desired set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakpointDelta {
    /// Breakpoints to send via `set_breakpoints`.
    pub added: Vec<BreakpointSpec>,
    /// Breakpoints to send via `remove_breakpoints`.
    pub removed: Vec<BreakpointSpec>,
}

impl BreakpointDelta {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// The set of breakpoints the debugger currently knows about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakpointTable {
    entries: BTreeSet<BreakpointSpec>,
}

impl BreakpointTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a breakpoint. Returns `false` if it was already present.
    pub fn add(&mut self, spec: BreakpointSpec) -> bool {
        self.entries.insert(spec)
    }

    /// Stop tracking a breakpoint. Returns `false` if it was absent.
    pub fn remove(&mut self, spec: &BreakpointSpec) -> bool {
        self.entries.remove(spec)
    }

    /// How many breakpoints are tracked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no breakpoints are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over tracked breakpoints in path/line order.
    pub fn iter(&self) -> impl Iterator<Item = &BreakpointSpec> {
        self.entries.iter()
    }

    /// Replace the tracked set with `desired`, returning the delta the
    /// debugger must be told about.
    pub fn sync(&mut self, desired: &[BreakpointSpec]) -> BreakpointDelta {
        let desired: BTreeSet<BreakpointSpec> = desired.iter().cloned().collect();
        let added = desired.difference(&self.entries).cloned().collect();
        let removed = self.entries.difference(&desired).cloned().collect();
        self.entries = desired;
        BreakpointDelta { added, removed }
    }

    /// Forget everything without producing a delta.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
