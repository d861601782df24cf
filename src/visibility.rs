//! One-shot "entered view" detection
//!
//! Candidates are buffered until the page has had time to settle, then
//! registered. An intersection update for a registered element at or above
//! the threshold adds it to the session's viewed set and yields a hit; the
//! element is then unregistered, so re-entering the viewport never reports
//! it again.

use crate::classifier;
use crate::dom::{Node, Rect};
use crate::session::SessionState;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

/// Stable identity of an element for the viewed set.
///
/// Prefers the host-assigned key; otherwise falls back to path plus identifier.
pub fn element_key(node: &Node) -> String {
    match node.key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => key.to_string(),
        None => format!(
            "{}|{}",
            classifier::path(Some(node)),
            classifier::identify(Some(node))
        ),
    }
}

/// A newly viewed element
#[derive(Debug, Clone, PartialEq)]
pub struct ViewHit {
    pub key: String,
    /// Rounded percentage of the element that is visible
    pub visibility_ratio: u32,
    pub rect: Rect,
}

#[derive(Debug, Clone)]
pub struct VisibilityTracker {
    settle_deadline: Option<DateTime<Utc>>,
    buffered: Vec<String>,
    registered: HashSet<String>,
}

impl VisibilityTracker {
    pub fn new(settle_at: DateTime<Utc>) -> Self {
        Self {
            settle_deadline: Some(settle_at),
            buffered: Vec::new(),
            registered: HashSet::new(),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.settle_deadline.is_none()
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.settle_deadline
    }

    /// Register candidates now if the page has settled, otherwise buffer
    /// them. Elements already viewed are skipped. Returns how many were
    /// accepted.
    pub fn register_candidates(&mut self, nodes: &[Node], session: &SessionState) -> usize {
        let mut accepted = 0;
        for node in nodes {
            let key = element_key(node);
            if session.has_observed(&key) {
                continue;
            }
            if self.is_settled() {
                if self.registered.insert(key) {
                    accepted += 1;
                }
            } else if !self.buffered.contains(&key) {
                self.buffered.push(key);
                accepted += 1;
            }
        }
        accepted
    }

    /// Move buffered candidates into the registered set once the settle
    /// deadline has passed. Returns the number registered, or None if the
    /// deadline is not due.
    pub fn settle_due(&mut self, now: DateTime<Utc>) -> Option<usize> {
        self.settle_deadline.filter(|d| *d <= now)?;
        self.settle_deadline = None;
        let count = self.buffered.len();
        self.registered.extend(self.buffered.drain(..));
        debug!(count, "view candidates registered");
        Some(count)
    }

    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    /// Handle an intersection update reported by the host
    pub fn on_intersection(
        &mut self,
        node: &Node,
        ratio: f64,
        rect: Option<Rect>,
        threshold: f64,
        session: &mut SessionState,
    ) -> Option<ViewHit> {
        if !ratio.is_finite() || ratio < threshold {
            return None;
        }
        let key = element_key(node);
        if !self.registered.contains(&key) {
            return None;
        }
        self.registered.remove(&key);
        if !session.observe(&key) {
            return None;
        }
        Some(ViewHit {
            key,
            visibility_ratio: (ratio.clamp(0.0, 1.0) * 100.0).round() as u32,
            rect: rect.or(node.rect).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn hero() -> Node {
        let mut node = Node::new("img").with_id("hero");
        node.key = Some("n-1".to_string());
        node
    }

    #[test]
    fn test_candidates_wait_for_settle() {
        let mut session = SessionState::new(t(0));
        let mut tracker = VisibilityTracker::new(t(1_000));
        assert_eq!(tracker.register_candidates(&[hero()], &session), 1);

        assert!(tracker
            .on_intersection(&hero(), 0.9, None, 0.5, &mut session)
            .is_none());
        assert!(tracker.settle_due(t(999)).is_none());
        assert_eq!(tracker.settle_due(t(1_000)), Some(1));

        let hit = tracker
            .on_intersection(&hero(), 0.734, None, 0.5, &mut session)
            .unwrap();
        assert_eq!(hit.key, "n-1");
        assert_eq!(hit.visibility_ratio, 73);
    }

    #[test]
    fn test_below_threshold_keeps_candidate() {
        let mut session = SessionState::new(t(0));
        let mut tracker = VisibilityTracker::new(t(0));
        tracker.settle_due(t(0));
        tracker.register_candidates(&[hero()], &session);

        assert!(tracker
            .on_intersection(&hero(), 0.3, None, 0.5, &mut session)
            .is_none());
        assert!(tracker
            .on_intersection(&hero(), 0.5, None, 0.5, &mut session)
            .is_some());
    }

    #[test]
    fn test_view_is_one_shot() {
        let mut session = SessionState::new(t(0));
        let mut tracker = VisibilityTracker::new(t(0));
        tracker.settle_due(t(0));
        tracker.register_candidates(&[hero()], &session);

        assert!(tracker
            .on_intersection(&hero(), 1.0, None, 0.5, &mut session)
            .is_some());
        // leaves and re-enters, and is even re-registered
        tracker.register_candidates(&[hero()], &session);
        assert!(tracker
            .on_intersection(&hero(), 1.0, None, 0.5, &mut session)
            .is_none());
        assert_eq!(tracker.registered_count(), 0);
    }

    #[test]
    fn test_key_falls_back_to_path_and_identifier() {
        let node = Node::new("button")
            .with_id("go")
            .with_parent(Node::new("form").with_parent(Node::new("body")));
        assert_eq!(element_key(&node), "form > button#go|button#go");
    }
}
