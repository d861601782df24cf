//! Rate control for high-frequency signal sources
//!
//! Each source owns at most one pending slot: a deadline, a generation token
//! and the latest value seen. Scheduling again for the same source replaces
//! the slot, so there is never a queue. Nothing here runs on its own; the
//! owner drains due slots with [`RateController::pop_due`].

use crate::clock::deadline_after;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::trace;

/// Identity of a rate-controlled source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateSource {
    MouseMove,
    Scroll,
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Throttle,
    Debounce,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    mode: Mode,
    deadline: DateTime<Utc>,
    token: u64,
    pending: T,
}

/// A slot whose deadline has passed
#[derive(Debug, Clone, PartialEq)]
pub struct Fired<T> {
    pub source: RateSource,
    pub deadline: DateTime<Utc>,
    pub token: u64,
    pub value: T,
}

/// Per-source throttle and debounce slots
#[derive(Debug, Clone)]
pub struct RateController<T> {
    slots: HashMap<RateSource, Slot<T>>,
    next_token: u64,
}

impl<T> Default for RateController<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RateController<T> {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
            next_token: 0,
        }
    }

    fn token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    /// Trailing-window throttle.
    ///
    /// The first value for an idle source opens a window of `interval_ms`;
    /// values arriving inside the window only replace the pending value. When
    /// the window closes the latest value fires once. Returns true when this
    /// call opened a new window.
    pub fn throttle(
        &mut self,
        source: RateSource,
        interval_ms: u64,
        now: DateTime<Utc>,
        value: T,
    ) -> bool {
        if let Some(slot) = self.slots.get_mut(&source) {
            if slot.mode == Mode::Throttle {
                slot.pending = value;
                return false;
            }
        }
        let token = self.token();
        let deadline = deadline_after(now, interval_ms);
        trace!(?source, token, %deadline, "throttle window opened");
        self.slots.insert(
            source,
            Slot {
                mode: Mode::Throttle,
                deadline,
                token,
                pending: value,
            },
        );
        true
    }

    /// Debounce: every call replaces the pending value and pushes the
    /// deadline to `now + delay_ms`.
    pub fn debounce(&mut self, source: RateSource, delay_ms: u64, now: DateTime<Utc>, value: T) {
        let token = self.token();
        let deadline = deadline_after(now, delay_ms);
        trace!(?source, token, %deadline, "debounce rescheduled");
        self.slots.insert(
            source,
            Slot {
                mode: Mode::Debounce,
                deadline,
                token,
                pending: value,
            },
        );
    }

    /// Earliest pending deadline across all sources
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.slots.values().map(|s| s.deadline).min()
    }

    /// Remove and return the earliest slot due at or before `now`
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<Fired<T>> {
        let source = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.deadline <= now)
            .min_by_key(|(_, slot)| (slot.deadline, slot.token))
            .map(|(source, _)| *source)?;
        let slot = self.slots.remove(&source)?;
        Some(Fired {
            source,
            deadline: slot.deadline,
            token: slot.token,
            value: slot.pending,
        })
    }

    pub fn is_pending(&self, source: RateSource) -> bool {
        self.slots.contains_key(&source)
    }

    /// Drop every pending slot
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
