//! Idle/active state machine
//!
//! Tracks liveness from a rolling inactivity deadline. Only edges are
//! reported: ACTIVE → IDLE when the deadline passes, IDLE → ACTIVE on the next
//! activity. This is the only writer of the session's idle flag.

use crate::clock::deadline_after;
use crate::session::SessionState;
use chrono::{DateTime, Utc};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleState {
    Active,
    Idle,
}

/// An edge the tracker must report
#[derive(Debug, Clone, PartialEq)]
pub enum IdleTransition {
    /// The inactivity deadline passed at `at`
    BecameIdle {
        at: DateTime<Utc>,
        last_activity: DateTime<Utc>,
        timeout_ms: u64,
    },
    /// Activity arrived while idle
    BecameActive { idle_duration_ms: i64 },
}

#[derive(Debug, Clone)]
pub struct IdleMachine {
    state: IdleState,
    deadline: Option<DateTime<Utc>>,
    timeout_ms: u64,
}

impl IdleMachine {
    /// Start ACTIVE with the timer armed from `now`
    pub fn new(timeout_ms: u64, now: DateTime<Utc>) -> Self {
        Self {
            state: IdleState::Active,
            deadline: Some(deadline_after(now, timeout_ms)),
            timeout_ms,
        }
    }

    pub fn state(&self) -> IdleState {
        self.state
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Takes effect at the next timer reset
    pub fn set_timeout(&mut self, timeout_ms: u64) {
        self.timeout_ms = timeout_ms;
    }

    /// Register activity: re-arm the timer and, if idle, report the way back
    /// to ACTIVE with the time elapsed since the previous activity.
    pub fn on_activity(
        &mut self,
        now: DateTime<Utc>,
        session: &mut SessionState,
    ) -> Option<IdleTransition> {
        self.deadline = Some(deadline_after(now, self.timeout_ms));

        let transition = match self.state {
            IdleState::Active => None,
            IdleState::Idle => {
                let idle_duration_ms = (now - session.last_activity()).num_milliseconds();
                self.state = IdleState::Active;
                session.set_idle(false);
                debug!(idle_duration_ms, "user became active");
                Some(IdleTransition::BecameActive { idle_duration_ms })
            }
        };
        session.mark_activity(now);
        transition
    }

    /// Fire the inactivity timer if it is due
    pub fn fire_due(
        &mut self,
        now: DateTime<Utc>,
        session: &mut SessionState,
    ) -> Option<IdleTransition> {
        let deadline = self.deadline.filter(|d| *d <= now)?;
        self.deadline = None;
        if self.state == IdleState::Idle {
            return None;
        }
        self.state = IdleState::Idle;
        session.set_idle(true);
        debug!(%deadline, "user became idle");
        Some(IdleTransition::BecameIdle {
            at: deadline,
            last_activity: session.last_activity(),
            timeout_ms: self.timeout_ms,
        })
    }
}
