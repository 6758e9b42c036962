//! Context cache: the inferior → thread → frame tree.
//!
//! Built incrementally from discovery packets while execution is paused.
//! Inserts are idempotent and orphan-protected; the whole tree is cleared
//! when execution resumes and on session teardown, so readers must
//! tolerate finding it empty.

use std::collections::HashMap;

/// One stack frame of a paused thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameContext {
    /// Frame level; 0 is the newest frame.
    pub level: u32,
    pub function_name: String,
}

/// One thread of an inferior, with its discovered frames keyed by level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadContext {
    pub global_id: u32,
    pub name: String,
    frames: HashMap<u32, FrameContext>,
}

impl ThreadContext {
    /// Discovered frames ordered by level, newest first.
    pub fn frames_by_level(&self) -> Vec<&FrameContext> {
        let mut frames: Vec<&FrameContext> = self.frames.values().collect();
        frames.sort_by_key(|f| f.level);
        frames
    }

    /// How many frames have been discovered for this thread.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

/// One inferior (debugged process), with its discovered threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferiorContext {
    pub id: u32,
    pub name: String,
    threads: HashMap<u32, ThreadContext>,
}

impl InferiorContext {
    /// Look up a thread by global ID.
    pub fn thread(&self, global_id: u32) -> Option<&ThreadContext> {
        self.threads.get(&global_id)
    }

    /// Iterate over discovered threads (unordered).
    pub fn threads(&self) -> impl Iterator<Item = &ThreadContext> {
        self.threads.values()
    }

    /// How many threads have been discovered for this inferior.
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }
}

/// The paused-state context tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextCache {
    inferiors: HashMap<u32, InferiorContext>,
}

impl ContextCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an inferior's existence.
    ///
    /// Returns `true` when the entry was inserted; a duplicate ID is a
    /// no-op returning `false`.
    pub fn add_inferior(&mut self, id: u32, name: impl Into<String>) -> bool {
        if self.inferiors.contains_key(&id) {
            return false;
        }
        self.inferiors.insert(
            id,
            InferiorContext {
                id,
                name: name.into(),
                threads: HashMap::new(),
            },
        );
        true
    }

    /// Record a thread's existence within an inferior.
    ///
    /// A duplicate thread is a no-op; a thread whose inferior is unknown
    /// is silently dropped. Returns `true` only on insertion.
    pub fn add_thread(&mut self, inferior_id: u32, global_id: u32, name: impl Into<String>) -> bool {
        let Some(inferior) = self.inferiors.get_mut(&inferior_id) else {
            return false;
        };
        if inferior.threads.contains_key(&global_id) {
            return false;
        }
        inferior.threads.insert(
            global_id,
            ThreadContext {
                global_id,
                name: name.into(),
                frames: HashMap::new(),
            },
        );
        true
    }

    /// Record a frame's existence within a thread.
    ///
    /// A duplicate level is a no-op; a frame whose inferior or thread is
    /// unknown is silently dropped. Returns `true` only on insertion.
    pub fn add_frame(
        &mut self,
        inferior_id: u32,
        global_thread_id: u32,
        level: u32,
        function_name: impl Into<String>,
    ) -> bool {
        let Some(thread) = self
            .inferiors
            .get_mut(&inferior_id)
            .and_then(|i| i.threads.get_mut(&global_thread_id))
        else {
            return false;
        };
        if thread.frames.contains_key(&level) {
            return false;
        }
        thread.frames.insert(
            level,
            FrameContext {
                level,
                function_name: function_name.into(),
            },
        );
        true
    }

    /// Look up an inferior by ID.
    pub fn inferior(&self, id: u32) -> Option<&InferiorContext> {
        self.inferiors.get(&id)
    }

    /// Iterate over discovered inferiors (unordered).
    pub fn inferiors(&self) -> impl Iterator<Item = &InferiorContext> {
        self.inferiors.values()
    }

    /// How many inferiors have been discovered.
    pub fn inferior_count(&self) -> usize {
        self.inferiors.len()
    }

    /// Whether nothing has been discovered.
    pub fn is_empty(&self) -> bool {
        self.inferiors.is_empty()
    }

    /// Forget the whole tree. Entries describe a paused state only.
    pub fn clear(&mut self) {
        self.inferiors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_new_empty() {
        let cache = ContextCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.inferior_count(), 0);
    }

    #[test]
    fn add_inferior_then_thread_then_frame() {
        let mut cache = ContextCache::new();
        assert!(cache.add_inferior(1, "a.out"));
        assert!(cache.add_thread(1, 7, "worker"));
        assert!(cache.add_frame(1, 7, 0, "main"));

        let inferior = cache.inferior(1).unwrap();
        assert_eq!(inferior.name, "a.out");
        let thread = inferior.thread(7).unwrap();
        assert_eq!(thread.name, "worker");
        assert_eq!(thread.frames_by_level()[0].function_name, "main");
    }

    #[test]
    fn duplicate_inferior_is_noop() {
        let mut cache = ContextCache::new();
        assert!(cache.add_inferior(1, "p1"));
        assert!(!cache.add_inferior(1, "p1"));
        assert_eq!(cache.inferior_count(), 1);
    }

    #[test]
    fn duplicate_thread_and_frame_are_noops() {
        let mut cache = ContextCache::new();
        cache.add_inferior(1, "p1");
        assert!(cache.add_thread(1, 2, "t"));
        assert!(!cache.add_thread(1, 2, "t"));
        assert!(cache.add_frame(1, 2, 0, "f"));
        assert!(!cache.add_frame(1, 2, 0, "f"));

        let thread = cache.inferior(1).unwrap().thread(2).unwrap();
        assert_eq!(thread.frame_count(), 1);
    }

    #[test]
    fn orphan_thread_is_dropped() {
        let mut cache = ContextCache::new();
        assert!(!cache.add_thread(99, 1, "orphan"));
        assert!(cache.is_empty());
    }

    #[test]
    fn orphan_frame_is_dropped() {
        let mut cache = ContextCache::new();
        cache.add_inferior(1, "p1");
        // Thread 5 was never discovered.
        assert!(!cache.add_frame(1, 5, 0, "f"));
        assert_eq!(cache.inferior(1).unwrap().thread_count(), 0);
    }

    #[test]
    fn frames_sorted_by_level() {
        let mut cache = ContextCache::new();
        cache.add_inferior(1, "p");
        cache.add_thread(1, 1, "t");
        cache.add_frame(1, 1, 2, "main");
        cache.add_frame(1, 1, 0, "inner");
        cache.add_frame(1, 1, 1, "outer");

        let thread = cache.inferior(1).unwrap().thread(1).unwrap();
        let names: Vec<&str> = thread
            .frames_by_level()
            .iter()
            .map(|f| f.function_name.as_str())
            .collect();
        assert_eq!(names, ["inner", "outer", "main"]);
    }

    #[test]
    fn clear_empties_everything() {
        let mut cache = ContextCache::new();
        cache.add_inferior(1, "p");
        cache.add_thread(1, 1, "t");
        cache.add_frame(1, 1, 0, "f");

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.inferior(1).is_none());
    }

    #[test]
    fn multiple_inferiors_tracked_independently() {
        let mut cache = ContextCache::new();
        cache.add_inferior(1, "one");
        cache.add_inferior(2, "two");
        cache.add_thread(1, 10, "t10");
        cache.add_thread(2, 20, "t20");

        assert_eq!(cache.inferior_count(), 2);
        assert_eq!(cache.inferior(1).unwrap().thread_count(), 1);
        assert_eq!(cache.inferior(2).unwrap().thread_count(), 1);
        assert!(cache.inferior(1).unwrap().thread(20).is_none());
    }
}
