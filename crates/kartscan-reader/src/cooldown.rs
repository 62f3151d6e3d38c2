//! Time-windowed suppression of repeated tag reads.
//!
//! An RDM6300 reader repeats a tag's frame for as long as the tag stays in
//! its field. [`CooldownCache`] remembers when each tag was last accepted and
//! suppresses further reads of it until the window has elapsed.
//!
//! Time is always passed in by the caller, which keeps the cache
//! deterministic under test.
//!
//! # Example
//!
//! ```
//! use std::time::{Duration, Instant};
//! use kartscan_core::TagId;
//! use kartscan_reader::CooldownCache;
//!
//! let mut cache = CooldownCache::new(Duration::from_secs(3));
//! let tag = TagId::new("AABBCCDDEE").unwrap();
//! let t0 = Instant::now();
//!
//! assert!(cache.check_and_record(&tag, t0));
//! assert!(!cache.check_and_record(&tag, t0 + Duration::from_secs(1)));
//! assert!(cache.check_and_record(&tag, t0 + Duration::from_secs(3)));
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use kartscan_core::{TagId, constants::DEFAULT_COOLDOWN_SECS};

/// Map from tag to the instant it was last accepted.
#[derive(Debug, Clone)]
pub struct CooldownCache {
    window: Duration,
    entries: HashMap<TagId, Instant>,
}

impl CooldownCache {
    /// Create an empty cache with the given suppression window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: HashMap::new(),
        }
    }

    /// Whether `tag` was recorded less than one window before `now`.
    ///
    /// Entries older than the window never suppress a read, whether or not
    /// [`cleanup`](Self::cleanup) has removed them yet.
    pub fn is_in_cooldown(&self, tag: &TagId, now: Instant) -> bool {
        self.entries
            .get(tag)
            .is_some_and(|last| now.saturating_duration_since(*last) < self.window)
    }

    /// Set the last-accepted instant of `tag` to `now`.
    pub fn record(&mut self, tag: TagId, now: Instant) {
        self.entries.insert(tag, now);
    }

    /// Accept `tag` unless it is in cooldown.
    ///
    /// Returns `true` and records the tag when it was not in cooldown;
    /// returns `false` and leaves the entry untouched otherwise, so a tag held
    /// in the field is accepted again once per window rather than never.
    pub fn check_and_record(&mut self, tag: &TagId, now: Instant) -> bool {
        if self.is_in_cooldown(tag, now) {
            return false;
        }
        self.record(tag.clone(), now);
        true
    }

    /// Remove entries older than the window; returns how many were removed.
    ///
    /// An entry exactly one window old is kept. It no longer suppresses reads
    /// and is removed by the next cleanup.
    pub fn cleanup(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let window = self.window;
        self.entries
            .retain(|_, last| now.saturating_duration_since(*last) <= window);
        before - self.entries.len()
    }

    /// Number of tracked tags.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no tag is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Suppression window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Forget every tag.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for CooldownCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_COOLDOWN_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tag(s: &str) -> TagId {
        TagId::new(s).unwrap()
    }

    #[test]
    fn test_unknown_tag_is_not_in_cooldown() {
        let cache = CooldownCache::default();
        assert!(!cache.is_in_cooldown(&tag("1A2B3C4D5E"), Instant::now()));
        assert_eq!(cache.window(), Duration::from_secs(3));
    }

    #[rstest]
    #[case::immediately(0, true)]
    #[case::just_before(2999, true)]
    #[case::exactly_at_window(3000, false)]
    #[case::after_window(3001, false)]
    fn test_window_edges(#[case] elapsed_ms: u64, #[case] suppressed: bool) {
        let mut cache = CooldownCache::default();
        let t0 = Instant::now();
        cache.record(tag("1A2B3C4D5E"), t0);

        let now = t0 + Duration::from_millis(elapsed_ms);
        assert_eq!(cache.is_in_cooldown(&tag("1A2B3C4D5E"), now), suppressed);
    }

    #[test]
    fn test_record_resets_the_window() {
        let mut cache = CooldownCache::default();
        let t0 = Instant::now();
        let t = tag("AABBCCDDEE");

        cache.record(t.clone(), t0);
        cache.record(t.clone(), t0 + Duration::from_secs(2));

        assert!(cache.is_in_cooldown(&t, t0 + Duration::from_secs(4)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_check_and_record_does_not_extend_on_suppression() {
        let mut cache = CooldownCache::default();
        let t0 = Instant::now();
        let t = tag("AABBCCDDEE");

        assert!(cache.check_and_record(&t, t0));
        // Lingering tag read every second
        assert!(!cache.check_and_record(&t, t0 + Duration::from_secs(1)));
        assert!(!cache.check_and_record(&t, t0 + Duration::from_secs(2)));
        assert!(cache.check_and_record(&t, t0 + Duration::from_secs(3)));
    }

    #[test]
    fn test_distinct_tags_are_independent() {
        let mut cache = CooldownCache::default();
        let t0 = Instant::now();

        assert!(cache.check_and_record(&tag("1111111111"), t0));
        assert!(cache.check_and_record(&tag("2222222222"), t0));
        assert!(!cache.check_and_record(&tag("1111111111"), t0));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cleanup_counts_expired_entries() {
        let mut cache = CooldownCache::default();
        let t0 = Instant::now();

        cache.record(tag("1111111111"), t0);
        cache.record(tag("2222222222"), t0 + Duration::from_secs(1));
        cache.record(tag("3333333333"), t0 + Duration::from_secs(5));

        // 1111 is 5.5s old, 2222 is 4.5s old, 3333 is 0.5s old
        let removed = cache.cleanup(t0 + Duration::from_millis(5500));
        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.is_in_cooldown(&tag("3333333333"), t0 + Duration::from_millis(5500)));
    }

    #[test]
    fn test_cleanup_keeps_entry_exactly_one_window_old() {
        let mut cache = CooldownCache::default();
        let t0 = Instant::now();
        cache.record(tag("1111111111"), t0);

        assert_eq!(cache.cleanup(t0 + Duration::from_secs(3)), 0);
        assert!(!cache.is_in_cooldown(&tag("1111111111"), t0 + Duration::from_secs(3)));
        assert_eq!(cache.cleanup(t0 + Duration::from_millis(3001)), 1);
    }

    #[test]
    fn test_second_cleanup_removes_nothing() {
        let mut cache = CooldownCache::default();
        let t0 = Instant::now();
        let later = t0 + Duration::from_millis(3001);
        cache.record(tag("1111111111"), t0);
        cache.record(tag("2222222222"), t0 + Duration::from_secs(1));

        assert_eq!(cache.cleanup(later), 1);
        assert_eq!(cache.cleanup(later), 0);
        assert_eq!(cache.len(), 1);
        assert!(cache.is_in_cooldown(&tag("2222222222"), later));
    }

    #[test]
    fn test_cleanup_on_empty_cache() {
        let mut cache = CooldownCache::default();
        assert_eq!(cache.cleanup(Instant::now()), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_window_never_suppresses() {
        let mut cache = CooldownCache::new(Duration::ZERO);
        let t0 = Instant::now();
        let t = tag("AABBCCDDEE");

        assert!(cache.check_and_record(&t, t0));
        assert!(cache.check_and_record(&t, t0));
    }

    #[test]
    fn test_clear() {
        let mut cache = CooldownCache::default();
        let t0 = Instant::now();
        cache.record(tag("AABBCCDDEE"), t0);

        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.is_in_cooldown(&tag("AABBCCDDEE"), t0));
    }
}
