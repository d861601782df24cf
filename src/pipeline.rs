//! Capture pipeline orchestration
//!
//! [`InteractionTracker`] owns the session state and every timer, routes each
//! raw signal to its handler and hands the resulting records to the sink.
//! All mutation happens on the caller's thread, one signal at a time.

use crate::classifier;
use crate::clock::{deadline_after, Clock, ManualClock};
use crate::config::{ConfigPatch, TrackerConfig};
use crate::dom::Node;
use crate::error::TrackerError;
use crate::idle::{IdleMachine, IdleTransition};
use crate::normalizer::{self, EventNormalizer};
use crate::rate::{Fired, RateController, RateSource};
use crate::session::SessionState;
use crate::signal::{PointerSignal, Signal, TimedSignal};
use crate::sink::{MemorySink, Sink};
use crate::types::{EventKind, EventRecord, Payload, SessionStats};
use crate::visibility::VisibilityTracker;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

/// Subject for events about the document as a whole
const SUBJECT_PAGE: &str = "page";
const SUBJECT_WINDOW: &str = "window";
const SUBJECT_SESSION: &str = "session";
const SUBJECT_NETWORK: &str = "network";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerSource {
    Rate,
    Visibility,
    Idle,
}

/// Event capture and normalization pipeline for one page lifetime
pub struct InteractionTracker<S: Sink, C: Clock> {
    config: TrackerConfig,
    session: SessionState,
    rate: RateController<Signal>,
    idle: IdleMachine,
    visibility: VisibilityTracker,
    sink: S,
    clock: C,
    last_seen: DateTime<Utc>,
    terminated: bool,
}

impl<S: Sink, C: Clock> InteractionTracker<S, C> {
    /// Start a session at the clock's current time
    pub fn new(config: TrackerConfig, sink: S, clock: C) -> Result<Self, TrackerError> {
        config.validate()?;
        let now = clock.now();
        let session = SessionState::new(now);
        let settle_at = deadline_after(now, config.view_settle_delay);
        info!(session_id = session.session_id(), "interaction tracker started");

        Ok(Self {
            idle: IdleMachine::new(config.idle_timeout, now),
            visibility: VisibilityTracker::new(settle_at),
            rate: RateController::new(),
            config,
            session,
            sink,
            clock,
            last_seen: now,
            terminated: false,
        })
    }

    /// Process a signal at the clock's current time
    pub fn handle(&mut self, signal: Signal) {
        let now = self.clock.now();
        self.process(signal, now);
    }

    /// Process a signal at its own timestamp, falling back to the clock
    pub fn handle_timed(&mut self, timed: TimedSignal) {
        let now = timed.at.unwrap_or_else(|| self.clock.now());
        self.process(timed.signal, now);
    }

    /// Fire every timer due at the clock's current time
    pub fn advance(&mut self) {
        let now = self.clock.now();
        let now = self.observe_time(now);
        self.advance_to(now);
    }

    /// Current session metrics
    pub fn stats(&self) -> SessionStats {
        self.session.stats(self.clock.now().max(self.last_seen))
    }

    /// Inject a synthetic `custom` record through the normal emission path.
    /// Returns its sequence number.
    pub fn log_custom_event(
        &mut self,
        name: &str,
        subject: &str,
        extra: Payload,
    ) -> Result<u64, TrackerError> {
        if self.terminated {
            return Err(TrackerError::InvalidSignal(
                "session has ended with page_exit".to_string(),
            ));
        }
        if name.trim().is_empty() {
            return Err(TrackerError::InvalidSignal(
                "custom event name must not be empty".to_string(),
            ));
        }
        let now = self.observe_time(self.clock.now());
        self.advance_to(now);

        let mut payload = Payload::new();
        payload.insert("name".to_string(), json!(name));
        payload.extend(extra);
        let subject = if subject.trim().is_empty() {
            SUBJECT_PAGE
        } else {
            subject
        };
        Ok(self.emit(EventKind::Custom, subject, None, payload, now))
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Merge a partial configuration. Timers already scheduled keep their
    /// deadlines; new values apply from the next signal.
    pub fn update_config(&mut self, patch: &ConfigPatch) -> Result<(), TrackerError> {
        let next = self.config.merged(patch)?;
        self.idle.set_timeout(next.idle_timeout);
        self.config = next;
        info!(config = ?self.config, "configuration updated");
        Ok(())
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Whether `page_exit` has been processed
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Largest delay a rate-limited source can hold a value for
    pub fn max_rate_delay_ms(&self) -> u64 {
        self.config
            .scroll_throttle
            .max(self.config.mouse_move_throttle)
            .max(self.config.resize_throttle)
    }

    /// Keep processing time monotonic even if the host reports signals
    /// slightly out of order.
    fn observe_time(&mut self, at: DateTime<Utc>) -> DateTime<Utc> {
        if at < self.last_seen {
            debug!(%at, last_seen = %self.last_seen, "clamping out-of-order timestamp");
            return self.last_seen;
        }
        self.last_seen = at;
        at
    }

    fn process(&mut self, signal: Signal, at: DateTime<Utc>) {
        if self.terminated {
            debug!(signal = signal.name(), "ignoring signal after page_exit");
            return;
        }
        let now = self.observe_time(at);
        self.advance_to(now);

        if signal.resets_idle() {
            if let Some(transition) = self.idle.on_activity(now, &mut self.session) {
                self.emit_transition(transition, now);
            }
        }

        let name = signal.name();
        debug!(signal = name, "dispatch");
        if let Err(e) = self.dispatch(signal, now) {
            warn!(signal = name, error = %e, "signal handler failed");
        }

        // zero-length delays fire immediately
        self.advance_to(now);
    }

    /// Fire due timers in deadline order, stamping each with its deadline
    fn advance_to(&mut self, now: DateTime<Utc>) {
        while !self.terminated {
            let candidates = [
                (self.rate.next_deadline(), TimerSource::Rate),
                (self.visibility.next_deadline(), TimerSource::Visibility),
                (self.idle.next_deadline(), TimerSource::Idle),
            ];
            let Some((deadline, source)) = candidates
                .into_iter()
                .filter_map(|(d, s)| d.filter(|d| *d <= now).map(|d| (d, s)))
                .min_by_key(|(d, _)| *d)
            else {
                break;
            };

            match source {
                TimerSource::Rate => {
                    if let Some(fired) = self.rate.pop_due(deadline) {
                        self.emit_rate_limited(fired);
                    }
                }
                TimerSource::Visibility => {
                    self.visibility.settle_due(deadline);
                }
                TimerSource::Idle => {
                    if let Some(transition) = self.idle.fire_due(deadline, &mut self.session) {
                        self.emit_transition(transition, deadline);
                    }
                }
            }
        }
    }

    /// Single emission path. Any record other than the idle machine's own
    /// counts as engagement, so an idle session is first brought back to
    /// active.
    fn emit(
        &mut self,
        kind: EventKind,
        subject: &str,
        node: Option<&Node>,
        payload: Payload,
        now: DateTime<Utc>,
    ) -> u64 {
        if !kind.is_idle_transition() && self.session.is_idle() {
            if let Some(transition) = self.idle.on_activity(now, &mut self.session) {
                self.emit_transition(transition, now);
            }
        }
        let record = EventNormalizer::normalize(kind, subject, node, payload, now, &mut self.session);
        debug!(
            seq = record.sequence_number,
            kind = kind.as_str(),
            subject = %record.event_subject,
            "emit"
        );
        self.sink.emit(&record);
        record.sequence_number
    }

    fn emit_element(&mut self, kind: EventKind, node: Option<&Node>, payload: Payload, now: DateTime<Utc>) {
        let subject = normalizer::element_subject(node);
        self.emit(kind, &subject, node, payload, now);
    }

    fn emit_pointer(
        &mut self,
        kind: EventKind,
        pointer: &PointerSignal,
        now: DateTime<Utc>,
    ) -> Result<(), TrackerError> {
        check_pointer(pointer)?;
        let payload = normalizer::pointer_payload(pointer);
        match pointer.target.as_ref() {
            Some(node) => self.emit_element(kind, Some(node), payload, now),
            None => {
                self.emit(kind, SUBJECT_PAGE, None, payload, now);
            }
        }
        Ok(())
    }

    fn emit_transition(&mut self, transition: IdleTransition, now: DateTime<Utc>) {
        match transition {
            IdleTransition::BecameIdle {
                at,
                last_activity,
                timeout_ms,
            } => {
                let payload = object(json!({
                    "idle_timeout_ms": timeout_ms,
                    "last_activity": last_activity.to_rfc3339(),
                }));
                self.emit(EventKind::UserIdle, SUBJECT_SESSION, None, payload, at);
            }
            IdleTransition::BecameActive { idle_duration_ms } => {
                let payload = object(json!({ "idle_duration_ms": idle_duration_ms }));
                self.emit(EventKind::UserActive, SUBJECT_SESSION, None, payload, now);
            }
        }
    }

    /// Trailing record of a throttled or debounced source
    fn emit_rate_limited(&mut self, fired: Fired<Signal>) {
        let at = fired.deadline;
        debug!(source = ?fired.source, token = fired.token, "rate-limited source fired");
        match fired.value {
            Signal::MouseMove(p) => {
                let payload = normalizer::pointer_payload(&p);
                match p.target.as_ref() {
                    Some(node) => self.emit_element(EventKind::MouseMove, Some(node), payload, at),
                    None => {
                        self.emit(EventKind::MouseMove, SUBJECT_PAGE, None, payload, at);
                    }
                }
            }
            Signal::Scroll(s) => {
                let pct = normalizer::scroll_percentage(&s);
                // update before emission so the snapshot carries the new maximum
                self.session.record_scroll_depth(pct);
                let payload =
                    normalizer::scroll_payload(&s, pct, self.session.max_scroll_depth());
                self.emit(EventKind::Scroll, SUBJECT_PAGE, None, payload, at);
            }
            Signal::Resize(r) => {
                let payload = normalizer::resize_payload(&r);
                self.emit(EventKind::Resize, SUBJECT_WINDOW, None, payload, at);
            }
            other => warn!(signal = other.name(), "unexpected rate-limited signal"),
        }
    }

    /// Signal-to-handler table
    fn dispatch(&mut self, signal: Signal, now: DateTime<Utc>) -> Result<(), TrackerError> {
        match signal {
            Signal::Click(p) => self.emit_pointer(EventKind::Click, &p, now)?,
            Signal::DblClick(p) => self.emit_pointer(EventKind::DoubleClick, &p, now)?,
            Signal::ContextMenu(p) => self.emit_pointer(EventKind::RightClick, &p, now)?,
            Signal::MouseEnter(p) => self.emit_pointer(EventKind::MouseEnter, &p, now)?,
            Signal::MouseLeave(p) => self.emit_pointer(EventKind::MouseLeave, &p, now)?,

            // liveness only; handled by the idle machine before dispatch
            Signal::MouseDown(_) | Signal::TouchStart(_) | Signal::KeyPress(_) => {}

            Signal::MouseMove(p) => {
                if self.config.track_mouse_movement {
                    check_pointer(&p)?;
                    self.rate.throttle(
                        RateSource::MouseMove,
                        self.config.mouse_move_throttle,
                        now,
                        Signal::MouseMove(p),
                    );
                }
            }

            Signal::KeyDown(_) | Signal::KeyUp(_) if !self.config.track_keyboard => {}
            Signal::KeyDown(k) => {
                let payload = normalizer::key_payload(&k);
                self.emit_element(EventKind::KeyboardDown, k.target.as_ref(), payload, now);
            }
            Signal::KeyUp(k) => {
                let payload = normalizer::key_payload(&k);
                self.emit_element(EventKind::KeyboardUp, k.target.as_ref(), payload, now);
            }

            Signal::Change(e) => {
                let payload = normalizer::value_payload(e.target.as_ref());
                self.emit_element(EventKind::Change, e.target.as_ref(), payload, now);
            }
            Signal::Input(e) => {
                let payload = normalizer::value_payload(e.target.as_ref());
                self.emit_element(EventKind::Input, e.target.as_ref(), payload, now);
            }
            Signal::Focus(e) => self.emit_element(EventKind::Focus, e.target.as_ref(), Payload::new(), now),
            Signal::Blur(e) => self.emit_element(EventKind::Blur, e.target.as_ref(), Payload::new(), now),
            Signal::Submit(e) => self.emit_element(EventKind::Submit, e.target.as_ref(), Payload::new(), now),
            Signal::DragStart(e) => {
                self.emit_element(EventKind::DragStart, e.target.as_ref(), Payload::new(), now)
            }
            Signal::DragEnd(e) => self.emit_element(EventKind::DragEnd, e.target.as_ref(), Payload::new(), now),
            Signal::Drop(e) => self.emit_element(EventKind::Drop, e.target.as_ref(), Payload::new(), now),

            Signal::Scroll(s) => {
                let metrics = [s.scroll_top, s.scroll_left, s.scroll_height, s.viewport_height];
                if metrics.iter().any(|v| !v.is_finite()) {
                    return Err(TrackerError::InvalidSignal(
                        "scroll metrics must be finite".to_string(),
                    ));
                }
                self.rate
                    .debounce(RateSource::Scroll, self.config.scroll_throttle, now, Signal::Scroll(s));
            }
            Signal::Resize(r) => {
                if !(r.width.is_finite() && r.height.is_finite()) || r.width < 0.0 || r.height < 0.0 {
                    return Err(TrackerError::InvalidSignal(format!(
                        "invalid viewport size {}x{}",
                        r.width, r.height
                    )));
                }
                self.rate
                    .debounce(RateSource::Resize, self.config.resize_throttle, now, Signal::Resize(r));
            }

            Signal::VisibilityChange { hidden } => {
                let payload = object(json!({
                    "hidden": hidden,
                    "visibility_state": if hidden { "hidden" } else { "visible" },
                }));
                self.emit(EventKind::VisibilityChange, SUBJECT_PAGE, None, payload, now);
            }
            Signal::Online => {
                let payload = object(json!({ "online": true }));
                self.emit(EventKind::ConnectionOnline, SUBJECT_NETWORK, None, payload, now);
            }
            Signal::Offline => {
                let payload = object(json!({ "online": false }));
                self.emit(EventKind::ConnectionOffline, SUBJECT_NETWORK, None, payload, now);
            }

            Signal::Copy(_) | Signal::Cut(_) | Signal::Paste(_) if !self.config.track_clipboard => {}
            Signal::Copy(c) => {
                let payload = normalizer::clipboard_payload(&c);
                self.emit_element(EventKind::Copy, c.target.as_ref(), payload, now);
            }
            Signal::Cut(c) => {
                let payload = normalizer::clipboard_payload(&c);
                self.emit_element(EventKind::Cut, c.target.as_ref(), payload, now);
            }
            Signal::Paste(c) => {
                let payload = normalizer::clipboard_payload(&c);
                self.emit_element(EventKind::Paste, c.target.as_ref(), payload, now);
            }

            Signal::Selection(s) => {
                // a collapsed selection is not a selection
                if !s.text.trim().is_empty() {
                    let payload = normalizer::selection_payload(&s);
                    self.emit_element(EventKind::TextSelection, s.target.as_ref(), payload, now);
                }
            }

            Signal::MediaPlay(m) => {
                let payload = normalizer::media_payload(&m);
                self.emit_element(EventKind::MediaPlay, m.target.as_ref(), payload, now);
            }
            Signal::MediaPause(m) => {
                let payload = normalizer::media_payload(&m);
                self.emit_element(EventKind::MediaPause, m.target.as_ref(), payload, now);
            }
            Signal::MediaEnded(m) => {
                let payload = normalizer::media_payload(&m);
                self.emit_element(EventKind::MediaEnded, m.target.as_ref(), payload, now);
            }

            Signal::Intersection(i) => {
                if !i.ratio.is_finite() {
                    return Err(TrackerError::InvalidSignal(
                        "intersection ratio must be finite".to_string(),
                    ));
                }
                if self.config.track_visibility {
                    let hit = self.visibility.on_intersection(
                        &i.target,
                        i.ratio,
                        i.rect,
                        self.config.visibility_threshold,
                        &mut self.session,
                    );
                    if let Some(hit) = hit {
                        let payload = object(json!({
                            "visibility_ratio": hit.visibility_ratio,
                            "rect": hit.rect,
                        }));
                        let subject = classifier::classify(Some(&i.target));
                        self.emit(EventKind::View, &subject, Some(&i.target), payload, now);
                    }
                }
            }
            Signal::RegisterCandidates { nodes } => {
                let accepted = self.visibility.register_candidates(&nodes, &self.session);
                debug!(offered = nodes.len(), accepted, "view candidates offered");
            }

            Signal::PageLoad(p) => {
                let payload = normalizer::page_payload(&p);
                self.emit(EventKind::PageView, SUBJECT_PAGE, None, payload, now);
            }
            Signal::PageExit => {
                let payload = object(json!({
                    "time_on_page_ms": self.session.elapsed_ms(now),
                    "max_scroll_depth": self.session.max_scroll_depth(),
                }));
                self.emit(EventKind::PageExit, SUBJECT_PAGE, None, payload, now);
                self.rate.clear();
                self.terminated = true;
                info!(
                    session_id = self.session.session_id(),
                    events = self.session.event_count(),
                    "session ended"
                );
            }
        }
        Ok(())
    }
}

fn check_pointer(p: &PointerSignal) -> Result<(), TrackerError> {
    if p.x.is_finite() && p.y.is_finite() {
        Ok(())
    } else {
        Err(TrackerError::InvalidSignal(format!(
            "pointer coordinates must be finite, got ({}, {})",
            p.x, p.y
        )))
    }
}

fn object(value: serde_json::Value) -> Payload {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Payload::new(),
    }
}

/// Replay timed signals through a fresh tracker and collect the records
/// (stateless, one-shot).
///
/// Time starts at the first signal's timestamp. After the last signal the
/// clock moves forward just far enough for trailing throttled and debounced
/// records to fire.
pub fn replay(
    signals: Vec<TimedSignal>,
    config: TrackerConfig,
) -> Result<Vec<EventRecord>, TrackerError> {
    let start = signals
        .iter()
        .find_map(|s| s.at)
        .unwrap_or_else(Utc::now);
    let clock = ManualClock::new(start);
    let sink = MemorySink::new();
    let mut tracker = InteractionTracker::new(config, sink.clone(), clock.clone())?;

    for timed in signals {
        if let Some(at) = timed.at {
            clock.set(at.max(clock.now()));
        }
        tracker.handle_timed(timed);
    }

    if !tracker.is_terminated() {
        clock.set(deadline_after(clock.now(), tracker.max_rate_delay_ms()));
        tracker.advance();
    }

    Ok(sink.drain())
}

/// Replay an NDJSON stream of signals and return NDJSON records
pub fn replay_ndjson(ndjson: &str, config: TrackerConfig) -> Result<String, TrackerError> {
    let signals = TimedSignal::parse_ndjson(ndjson)?;
    let records = replay(signals, config)?;
    let mut out = String::new();
    for record in &records {
        let line = serde_json::to_string(record)
            .map_err(|e| TrackerError::EncodingError(e.to_string()))?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Rect;
    use crate::signal::{ClipboardSignal, ElementSignal, IntersectionSignal, KeySignal, ScrollSignal};
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    fn tracker(
        config: TrackerConfig,
    ) -> (InteractionTracker<MemorySink, ManualClock>, MemorySink, ManualClock) {
        let clock = ManualClock::new(start());
        let sink = MemorySink::new();
        let tracker = InteractionTracker::new(config, sink.clone(), clock.clone()).unwrap();
        (tracker, sink, clock)
    }

    fn click_on(node: Node) -> Signal {
        Signal::Click(PointerSignal {
            target: Some(node),
            x: 10.0,
            y: 20.0,
            button: Some(0),
        })
    }

    fn kinds(records: &[EventRecord]) -> Vec<EventKind> {
        records.iter().map(|r| r.event_kind).collect()
    }

    #[test]
    fn test_click_record() {
        let (mut tracker, sink, clock) = tracker(TrackerConfig::default());
        clock.advance_ms(250);
        tracker.handle(click_on(Node::new("button").with_id("buy")));

        let records = sink.drain();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.event_kind, EventKind::Click);
        assert_eq!(r.event_subject, "button");
        assert_eq!(r.relative_time_ms, 250);
        assert_eq!(r.payload["x"], 10.0);
        assert_eq!(r.target_descriptor.as_ref().unwrap().identifier, "button#buy");
    }

    #[test]
    fn test_mouse_move_throttle_keeps_latest() {
        let (mut tracker, sink, clock) = tracker(TrackerConfig::default());
        for (x, delay) in [(1.0, 0), (2.0, 100)] {
            clock.advance_ms(delay);
            tracker.handle(Signal::MouseMove(PointerSignal {
                x,
                y: x,
                ..Default::default()
            }));
        }
        assert!(sink.is_empty());

        clock.advance_ms(1_000);
        tracker.advance();
        let records = sink.drain();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload["x"], 2.0);
        assert_eq!(records[0].relative_time_ms, 500);
    }

    #[test]
    fn test_scroll_debounce_updates_snapshot() {
        let (mut tracker, sink, clock) = tracker(TrackerConfig::default());
        for top in [100.0, 250.0] {
            clock.advance_ms(50);
            tracker.handle(Signal::Scroll(ScrollSignal {
                scroll_top: top,
                scroll_left: 0.0,
                scroll_height: 1000.0,
                viewport_height: 500.0,
            }));
        }
        clock.advance_ms(300);
        tracker.advance();

        let records = sink.drain();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload["scroll_percentage"], 50);
        assert_eq!(records[0].session_snapshot.max_scroll_depth, 50);
        assert_eq!(records[0].relative_time_ms, 400);
    }

    #[test]
    fn test_keyboard_toggle() {
        let config = TrackerConfig {
            track_keyboard: false,
            ..Default::default()
        };
        let (mut tracker, sink, _clock) = tracker(config);
        tracker.handle(Signal::KeyDown(KeySignal {
            key: "a".to_string(),
            ..Default::default()
        }));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_password_keystrokes_are_masked() {
        let (mut tracker, sink, _clock) = tracker(TrackerConfig::default());
        tracker.handle(Signal::KeyDown(KeySignal {
            target: Some(Node::new("input").with_type("password")),
            key: "h".to_string(),
            code: "KeyH".to_string(),
            ..Default::default()
        }));
        let records = sink.drain();
        assert_eq!(records[0].payload["key"], normalizer::REDACTION_MASK);
        assert_eq!(records[0].payload["code"], normalizer::REDACTION_MASK);
    }

    #[test]
    fn test_invalid_signal_does_not_stop_pipeline() {
        let (mut tracker, sink, _clock) = tracker(TrackerConfig::default());
        tracker.handle(Signal::Click(PointerSignal {
            x: f64::NAN,
            ..Default::default()
        }));
        tracker.handle(Signal::Focus(ElementSignal {
            target: Some(Node::new("input")),
        }));
        let records = sink.drain();
        assert_eq!(kinds(&records), vec![EventKind::Focus]);
        assert_eq!(records[0].sequence_number, 1);
    }

    #[test]
    fn test_idle_cycle() {
        let (mut tracker, sink, clock) = tracker(TrackerConfig::default());
        clock.advance_ms(31_000);
        tracker.advance();
        tracker.handle(click_on(Node::new("a")));

        let records = sink.drain();
        assert_eq!(
            kinds(&records),
            vec![EventKind::UserIdle, EventKind::UserActive, EventKind::Click]
        );
        assert_eq!(records[0].relative_time_ms, 30_000);
        assert_eq!(records[0].payload["idle_timeout_ms"], 30_000);
        assert_eq!(records[1].payload["idle_duration_ms"], 31_000);
        assert!(records[0].session_snapshot.is_idle);
        assert!(!records[2].session_snapshot.is_idle);
    }

    #[test]
    fn test_non_qualifying_emission_wakes_idle_session() {
        let (mut tracker, sink, clock) = tracker(TrackerConfig::default());
        clock.advance_ms(40_000);
        tracker.handle(Signal::VisibilityChange { hidden: true });
        assert_eq!(
            kinds(&sink.drain()),
            vec![
                EventKind::UserIdle,
                EventKind::UserActive,
                EventKind::VisibilityChange
            ]
        );
        assert!(!tracker.stats().is_idle);
    }

    #[test]
    fn test_page_exit_is_terminal() {
        let (mut tracker, sink, clock) = tracker(TrackerConfig::default());
        tracker.handle(Signal::PageExit);
        clock.advance_ms(60_000);
        tracker.advance();
        tracker.handle(click_on(Node::new("button")));

        assert_eq!(kinds(&sink.drain()), vec![EventKind::PageExit]);
        assert!(tracker.is_terminated());
        assert!(tracker.log_custom_event("late", "", Payload::new()).is_err());
    }

    #[test]
    fn test_custom_event() {
        let (mut tracker, sink, _clock) = tracker(TrackerConfig::default());
        let mut extra = Payload::new();
        extra.insert("plan".to_string(), json!("pro"));
        let seq = tracker.log_custom_event("upgrade", "billing", extra).unwrap();

        let records = sink.drain();
        assert_eq!(seq, 1);
        assert_eq!(records[0].event_kind, EventKind::Custom);
        assert_eq!(records[0].event_subject, "billing");
        assert_eq!(records[0].payload["name"], "upgrade");
        assert_eq!(records[0].payload["plan"], "pro");
    }

    #[test]
    fn test_update_config() {
        let (mut tracker, _sink, _clock) = tracker(TrackerConfig::default());
        let patch = ConfigPatch {
            idle_timeout: Some(10_000),
            ..Default::default()
        };
        tracker.update_config(&patch).unwrap();
        assert_eq!(tracker.config().idle_timeout, 10_000);

        let bad = ConfigPatch {
            visibility_threshold: Some(0.0),
            ..Default::default()
        };
        assert!(tracker.update_config(&bad).is_err());
        assert_eq!(tracker.config().visibility_threshold, 0.5);
    }

    #[test]
    fn test_oversized_delays_rejected() {
        let clock = ManualClock::new(start());
        let config = TrackerConfig {
            idle_timeout: u64::MAX,
            ..Default::default()
        };
        let result = InteractionTracker::new(config, MemorySink::new(), clock);
        assert!(matches!(result, Err(TrackerError::InvalidConfig(_))));

        let (mut tracker, sink, clock) = tracker(TrackerConfig::default());
        let patch = ConfigPatch {
            mouse_move_throttle: Some(10_000_000_000_000_000),
            ..Default::default()
        };
        assert!(tracker.update_config(&patch).is_err());
        assert_eq!(tracker.config().mouse_move_throttle, 500);

        tracker.handle(Signal::MouseMove(PointerSignal::default()));
        clock.advance_ms(500);
        tracker.advance();
        assert_eq!(kinds(&sink.drain()), vec![EventKind::MouseMove]);
    }

    #[test]
    fn test_gated_signals_still_reset_idle() {
        let config = TrackerConfig {
            track_mouse_movement: false,
            track_clipboard: false,
            ..Default::default()
        };
        let (mut tracker, sink, clock) = tracker(config);
        clock.advance_ms(20_000);
        tracker.handle(Signal::MouseMove(PointerSignal {
            x: 5.0,
            y: 5.0,
            ..Default::default()
        }));
        tracker.handle(Signal::Copy(ClipboardSignal::default()));
        clock.advance_ms(15_000);
        tracker.advance();
        assert!(sink.is_empty());

        clock.advance_ms(16_000);
        tracker.advance();
        let records = sink.drain();
        assert_eq!(kinds(&records), vec![EventKind::UserIdle]);
        assert_eq!(records[0].relative_time_ms, 50_000);
    }

    #[test]
    fn test_clipboard_toggle() {
        let clipboard = |selection_length| ClipboardSignal {
            target: Some(Node::new("p")),
            selection_length: Some(selection_length),
        };

        let off = TrackerConfig {
            track_clipboard: false,
            ..Default::default()
        };
        let (mut muted, muted_sink, _clock) = tracker(off);
        muted.handle(Signal::Copy(clipboard(4)));
        muted.handle(Signal::Cut(clipboard(4)));
        muted.handle(Signal::Paste(clipboard(4)));
        assert!(muted_sink.is_empty());

        let (mut tracker, sink, _clock) = tracker(TrackerConfig::default());
        tracker.handle(Signal::Copy(clipboard(4)));
        tracker.handle(Signal::Cut(clipboard(2)));
        tracker.handle(Signal::Paste(clipboard(9)));
        let records = sink.drain();
        assert_eq!(
            kinds(&records),
            vec![EventKind::Copy, EventKind::Cut, EventKind::Paste]
        );
        assert_eq!(records[2].payload["selection_length"], 9);
    }

    #[test]
    fn test_mouse_movement_toggle() {
        let config = TrackerConfig {
            track_mouse_movement: false,
            ..Default::default()
        };
        let (mut tracker, sink, clock) = tracker(config);
        tracker.handle(Signal::MouseMove(PointerSignal::default()));
        clock.advance_ms(1_000);
        tracker.advance();
        assert!(sink.is_empty());
    }

    fn card() -> Node {
        let mut node = Node::new("div").with_class("card");
        node.key = Some("card-1".to_string());
        node
    }

    fn settle_with_candidate(
        tracker: &mut InteractionTracker<MemorySink, ManualClock>,
        clock: &ManualClock,
    ) {
        tracker.handle(Signal::RegisterCandidates {
            nodes: vec![card()],
        });
        clock.advance_ms(1_200);
        tracker.advance();
    }

    #[test]
    fn test_visibility_toggle() {
        let config = TrackerConfig {
            track_visibility: false,
            ..Default::default()
        };
        let (mut tracker, sink, clock) = tracker(config);
        settle_with_candidate(&mut tracker, &clock);
        tracker.handle(Signal::Intersection(IntersectionSignal {
            target: card(),
            ratio: 1.0,
            rect: None,
        }));
        assert!(sink.is_empty());
        assert_eq!(tracker.stats().viewed_elements, 0);
    }

    #[test]
    fn test_view_payload_geometry() {
        let (mut tracker, sink, clock) = tracker(TrackerConfig::default());
        settle_with_candidate(&mut tracker, &clock);
        tracker.handle(Signal::Intersection(IntersectionSignal {
            target: card(),
            ratio: 0.75,
            rect: Some(Rect {
                x: 10.0,
                y: 20.0,
                width: 300.0,
                height: 150.0,
            }),
        }));

        let records = sink.drain();
        assert_eq!(kinds(&records), vec![EventKind::View]);
        assert_eq!(records[0].payload["visibility_ratio"], 75);
        assert_eq!(
            records[0].payload["rect"],
            json!({ "x": 10.0, "y": 20.0, "width": 300.0, "height": 150.0 })
        );
    }

    #[test]
    fn test_view_rect_falls_back_to_node_geometry() {
        let (mut tracker, sink, clock) = tracker(TrackerConfig::default());
        settle_with_candidate(&mut tracker, &clock);
        let mut target = card();
        target.rect = Some(Rect {
            x: 0.0,
            y: 640.0,
            width: 320.0,
            height: 80.0,
        });
        tracker.handle(Signal::Intersection(IntersectionSignal {
            target,
            ratio: 0.5,
            rect: None,
        }));

        let records = sink.drain();
        assert_eq!(records[0].payload["rect"]["y"], 640.0);
        assert_eq!(records[0].payload["rect"]["width"], 320.0);
    }

    #[test]
    fn test_replay_ndjson() {
        let input = r#"
{"at": "2024-01-15T14:00:00Z", "type": "page_load", "url": "https://example.com/"}
{"at": "2024-01-15T14:00:01Z", "type": "scroll", "scroll_top": 250, "scroll_height": 1000, "viewport_height": 500}
{"at": "2024-01-15T14:00:02Z", "type": "click", "x": 5, "y": 6, "target": {"tag": "a", "id": "next"}}
"#;
        let out = replay_ndjson(input, TrackerConfig::default()).unwrap();
        let records: Vec<EventRecord> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(
            kinds(&records),
            vec![EventKind::PageView, EventKind::Scroll, EventKind::Click]
        );
        assert_eq!(records[1].relative_time_ms, 1_300);
        assert_eq!(records[0].payload["url"], "https://example.com/");
    }
}
