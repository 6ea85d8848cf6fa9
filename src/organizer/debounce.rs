use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Coalesces bursts of events for the same path.
///
/// A path becomes ready once no new event has arrived for it during the
/// window, so a file still being written keeps getting pushed back.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Note an event for `path` at `now`
    pub fn touch(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path, now);
    }

    /// Remove and return every path that has been quiet for the window
    pub fn drain_ready(&mut self, now: Instant) -> Vec<PathBuf> {
        let window = self.window;
        let mut ready: Vec<(PathBuf, Instant)> = Vec::new();
        self.pending.retain(|path, last| {
            if now.saturating_duration_since(*last) >= window {
                ready.push((path.clone(), *last));
                false
            } else {
                true
            }
        });
        // Oldest burst first
        ready.sort_by_key(|(_, last)| *last);
        ready.into_iter().map(|(p, _)| p).collect()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
