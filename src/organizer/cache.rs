use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Bounded set of already-processed paths, in insertion order.
///
/// Owned by exactly one context (the pipeline dispatcher, or the caller of
/// a one-shot pass); other readers go through the pipeline's query handle.
#[derive(Debug, Clone)]
pub struct ProcessedCache {
    capacity: usize,
    entries: HashMap<String, SystemTime>,
    order: VecDeque<String>,
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl ProcessedCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(&key(path))
    }

    pub fn record(&mut self, path: &Path) {
        self.record_at(path, SystemTime::now());
    }

    /// Record `path` as processed at `when`.
    ///
    /// Re-recording a known path refreshes its timestamp but keeps its
    /// original insertion position, so eviction stays least-recently-inserted.
    pub fn record_at(&mut self, path: &Path, when: SystemTime) {
        let k = key(path);
        if let Some(ts) = self.entries.get_mut(&k) {
            *ts = when;
            return;
        }

        self.entries.insert(k.clone(), when);
        self.order.push_back(k);

        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Drop entries older than `retention` whose file no longer exists
    pub fn sweep(&mut self, retention: Duration) -> usize {
        self.sweep_at(SystemTime::now(), retention)
    }

    pub fn sweep_at(&mut self, now: SystemTime, retention: Duration) -> usize {
        let before = self.entries.len();
        let entries = &mut self.entries;
        self.order.retain(|k| {
            let expired = entries
                .get(k)
                .map(|ts| now.duration_since(*ts).unwrap_or_default() > retention)
                .unwrap_or(true);
            let drop = expired && !Path::new(k).exists();
            if drop {
                entries.remove(k);
            }
            !drop
        });

        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "swept processed cache");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Paths in insertion order, oldest first
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_capacity_never_exceeded() {
        let mut cache = ProcessedCache::new(3);
        for i in 0..10 {
            cache.record(&PathBuf::from(format!("/dl/{}.pdf", i)));
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_overflow_evicts_earliest_inserted() {
        let mut cache = ProcessedCache::new(3);
        let paths: Vec<PathBuf> = (0..4).map(|i| PathBuf::from(format!("/dl/{}", i))).collect();
        for p in &paths {
            cache.record(p);
        }
        assert!(!cache.contains(&paths[0]));
        assert!(cache.contains(&paths[1]));
        assert!(cache.contains(&paths[2]));
        assert!(cache.contains(&paths[3]));
    }

    #[test]
    fn test_rerecord_keeps_insertion_position() {
        let mut cache = ProcessedCache::new(2);
        let a = PathBuf::from("/dl/a");
        let b = PathBuf::from("/dl/b");
        let c = PathBuf::from("/dl/c");
        cache.record(&a);
        cache.record(&b);
        cache.record(&a); // refresh only
        cache.record(&c);
        assert!(!cache.contains(&a), "oldest insertion is evicted even if recently refreshed");
        assert!(cache.contains(&b));
        assert!(cache.contains(&c));
    }

    #[test]
    fn test_sweep_requires_old_and_missing() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("present.pdf");
        std::fs::write(&present, "x").unwrap();
        let gone_old = dir.path().join("gone_old.pdf");
        let gone_new = dir.path().join("gone_new.pdf");

        let now = SystemTime::now();
        let week = Duration::from_secs(7 * 86_400);
        let long_ago = now - Duration::from_secs(8 * 86_400);

        let mut cache = ProcessedCache::new(10);
        cache.record_at(&present, long_ago);
        cache.record_at(&gone_old, long_ago);
        cache.record_at(&gone_new, now);

        assert_eq!(cache.sweep_at(now, week), 1);
        assert!(cache.contains(&present));
        assert!(!cache.contains(&gone_old));
        assert!(cache.contains(&gone_new));
        assert_eq!(cache.paths().count(), 2);
    }
}
