//! Event normalization
//!
//! Turns a kind, a subject, an optional originating node and a kind-specific
//! payload into a complete [`EventRecord`]: sequence number, timing,
//! classifier output, privacy redaction and the embedded session snapshot.

use crate::classifier;
use crate::dom::Node;
use crate::session::SessionState;
use crate::signal::{
    ClipboardSignal, KeySignal, MediaSignal, PageSignal, PointerSignal, ResizeSignal,
    ScrollSignal, SelectionSignal,
};
use crate::types::{EventKind, EventRecord, Payload};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// Replaces any value read from a password field
pub const REDACTION_MASK: &str = "********";

/// Payload keys that can carry user-typed content
const SENSITIVE_KEYS: [&str; 4] = ["value", "key", "code", "excerpt"];

/// Maximum characters of selected text kept in a payload
const SELECTION_EXCERPT_CHARS: usize = 100;

/// Builds event records against the session state
pub struct EventNormalizer;

impl EventNormalizer {
    /// Build the record for one emission.
    ///
    /// Claims the next sequence number and, for every kind except
    /// `user_idle`, marks the session as active at `now`.
    pub fn normalize(
        kind: EventKind,
        subject: &str,
        node: Option<&Node>,
        extra: Payload,
        now: DateTime<Utc>,
        session: &mut SessionState,
    ) -> EventRecord {
        let sequence_number = session.next_sequence();
        if kind != EventKind::UserIdle {
            session.mark_activity(now);
        }

        let mut payload = extra;
        if node.is_some_and(Node::is_password_input) {
            redact(&mut payload);
        }

        EventRecord {
            sequence_number,
            timestamp_utc: now,
            relative_time_ms: session.elapsed_ms(now),
            event_kind: kind,
            event_subject: subject.to_string(),
            target_descriptor: node.map(classifier::describe),
            payload,
            session_snapshot: session.snapshot(now),
        }
    }
}

/// Replace every sensitive field with the mask
pub fn redact(payload: &mut Payload) {
    for key in SENSITIVE_KEYS {
        if let Some(v) = payload.get_mut(key) {
            if !v.is_null() {
                *v = Value::String(REDACTION_MASK.to_string());
            }
        }
    }
}

/// Subject for an element-originated event: its classified type
pub fn element_subject(node: Option<&Node>) -> String {
    classifier::classify(node)
}

/// Scroll depth as a rounded percentage of the scrollable range.
///
/// Content no taller than the viewport has nothing to scroll and yields 0.
pub fn scroll_percentage(scroll: &ScrollSignal) -> u8 {
    let range = scroll.scroll_height - scroll.viewport_height;
    if !range.is_finite() || range <= 0.0 || !scroll.scroll_top.is_finite() {
        return 0;
    }
    let pct = (scroll.scroll_top / range * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

fn object(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

pub fn pointer_payload(p: &PointerSignal) -> Payload {
    let mut payload = object(json!({ "x": p.x, "y": p.y }));
    if let Some(button) = p.button {
        payload.insert("button".to_string(), json!(button));
    }
    payload
}

pub fn key_payload(k: &KeySignal) -> Payload {
    object(json!({
        "key": k.key,
        "code": k.code,
        "ctrl": k.ctrl,
        "shift": k.shift,
        "alt": k.alt,
        "meta": k.meta,
        "repeat": k.repeat,
    }))
}

/// Value details for change/input events
pub fn value_payload(node: Option<&Node>) -> Payload {
    let mut payload = Payload::new();
    let Some(node) = node else {
        return payload;
    };
    if let Some(value) = node.value.as_deref() {
        payload.insert("value".to_string(), json!(value));
        payload.insert("value_length".to_string(), json!(value.chars().count()));
    }
    let checkable = node
        .input_type
        .as_deref()
        .is_some_and(|t| t.eq_ignore_ascii_case("checkbox") || t.eq_ignore_ascii_case("radio"));
    if checkable {
        payload.insert("checked".to_string(), json!(node.checked.unwrap_or(false)));
    }
    payload
}

pub fn scroll_payload(s: &ScrollSignal, percentage: u8, max_depth: u8) -> Payload {
    object(json!({
        "scroll_top": s.scroll_top,
        "scroll_left": s.scroll_left,
        "scroll_percentage": percentage,
        "max_scroll_depth": max_depth,
    }))
}

pub fn resize_payload(r: &ResizeSignal) -> Payload {
    object(json!({ "width": r.width, "height": r.height }))
}

pub fn clipboard_payload(c: &ClipboardSignal) -> Payload {
    let mut payload = Payload::new();
    if let Some(len) = c.selection_length {
        payload.insert("selection_length".to_string(), json!(len));
    }
    payload
}

pub fn selection_payload(s: &SelectionSignal) -> Payload {
    let excerpt: String = s.text.chars().take(SELECTION_EXCERPT_CHARS).collect();
    object(json!({
        "selection_length": s.text.chars().count(),
        "excerpt": excerpt,
    }))
}

pub fn media_payload(m: &MediaSignal) -> Payload {
    object(json!({
        "current_time": m.current_time,
        "duration": m.duration,
        "muted": m.muted,
    }))
}

pub fn page_payload(p: &PageSignal) -> Payload {
    let mut payload = Payload::new();
    for (key, value) in [("url", &p.url), ("title", &p.title), ("referrer", &p.referrer)] {
        if let Some(v) = value {
            payload.insert(key.to_string(), json!(v));
        }
    }
    payload
}
