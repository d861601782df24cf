//! Session state tracking
//!
//! One [`SessionState`] exists per page lifetime. It is owned by the tracker
//! and mutated only through the methods below, all on the caller's thread.

use crate::types::{SessionSnapshot, SessionStats};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

/// Counters and derived metrics for the current page lifetime
#[derive(Debug, Clone)]
pub struct SessionState {
    session_id: String,
    session_start: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    event_count: u64,
    scroll_depth: u8,
    max_scroll_depth: u8,
    is_idle: bool,
    observed_elements: HashSet<String>,
}

impl SessionState {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            session_start: start,
            last_activity: start,
            event_count: 0,
            scroll_depth: 0,
            max_scroll_depth: 0,
            is_idle: false,
            observed_elements: HashSet::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session_start(&self) -> DateTime<Utc> {
        self.session_start
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn max_scroll_depth(&self) -> u8 {
        self.max_scroll_depth
    }

    pub fn is_idle(&self) -> bool {
        self.is_idle
    }

    /// Milliseconds since session start
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.session_start).num_milliseconds()
    }

    /// Claim the next sequence number. Never reused.
    pub fn next_sequence(&mut self) -> u64 {
        self.event_count += 1;
        self.event_count
    }

    pub fn mark_activity(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    /// Record the current scroll depth; the maximum never decreases
    pub fn record_scroll_depth(&mut self, percent: u8) {
        let percent = percent.min(100);
        self.scroll_depth = percent;
        self.max_scroll_depth = self.max_scroll_depth.max(percent);
    }

    /// Only the idle machine calls this
    pub(crate) fn set_idle(&mut self, idle: bool) {
        self.is_idle = idle;
    }

    /// Add an element to the viewed set. Returns false if it was already there.
    pub fn observe(&mut self, element: &str) -> bool {
        if self.observed_elements.contains(element) {
            return false;
        }
        self.observed_elements.insert(element.to_string())
    }

    pub fn has_observed(&self, element: &str) -> bool {
        self.observed_elements.contains(element)
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            time_on_page_ms: self.elapsed_ms(now),
            event_count: self.event_count,
            max_scroll_depth: self.max_scroll_depth,
            is_idle: self.is_idle,
        }
    }

    pub fn stats(&self, now: DateTime<Utc>) -> SessionStats {
        SessionStats {
            session_id: self.session_id.clone(),
            session_start: self.session_start,
            last_activity: self.last_activity,
            time_on_page_ms: self.elapsed_ms(now),
            event_count: self.event_count,
            scroll_depth: self.scroll_depth,
            max_scroll_depth: self.max_scroll_depth,
            is_idle: self.is_idle,
            viewed_elements: self.observed_elements.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    #[test]
    fn test_sequence_is_gapless() {
        let mut session = SessionState::new(start());
        let seqs: Vec<u64> = (0..5).map(|_| session.next_sequence()).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
        assert_eq!(session.event_count(), 5);
    }

    #[test]
    fn test_max_scroll_depth_is_monotonic() {
        let mut session = SessionState::new(start());
        for pct in [10, 60, 30, 80, 5] {
            session.record_scroll_depth(pct);
        }
        let stats = session.stats(start());
        assert_eq!(stats.scroll_depth, 5);
        assert_eq!(stats.max_scroll_depth, 80);
    }

    #[test]
    fn test_observe_is_append_only() {
        let mut session = SessionState::new(start());
        assert!(session.observe("img#hero"));
        assert!(!session.observe("img#hero"));
        assert!(session.has_observed("img#hero"));
        assert_eq!(session.stats(start()).viewed_elements, 1);
    }

    #[test]
    fn test_last_activity_never_moves_back() {
        let mut session = SessionState::new(start());
        session.mark_activity(start() + Duration::seconds(10));
        session.mark_activity(start() + Duration::seconds(5));
        assert_eq!(session.last_activity(), start() + Duration::seconds(10));
    }

    #[test]
    fn test_snapshot_time_on_page() {
        let session = SessionState::new(start());
        let snap = session.snapshot(start() + Duration::milliseconds(2500));
        assert_eq!(snap.time_on_page_ms, 2500);
        assert!(!snap.is_idle);
    }
}
