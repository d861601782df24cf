//! Event record types
//!
//! The [`EventRecord`] is the unit handed to a sink. Each record embeds a copy
//! of the session metrics so it can be consumed on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind-specific attributes of a record
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Closed taxonomy of normalized event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Click,
    DoubleClick,
    RightClick,
    Change,
    Input,
    Focus,
    Blur,
    Submit,
    KeyboardDown,
    KeyboardUp,
    Scroll,
    MouseMove,
    MouseEnter,
    MouseLeave,
    Copy,
    Cut,
    Paste,
    Resize,
    VisibilityChange,
    ConnectionOnline,
    ConnectionOffline,
    PageExit,
    MediaPlay,
    MediaPause,
    MediaEnded,
    TextSelection,
    DragStart,
    DragEnd,
    Drop,
    View,
    UserIdle,
    UserActive,
    PageView,
    Custom,
}

impl EventKind {
    /// Every kind, in taxonomy order
    pub const ALL: [EventKind; 34] = [
        EventKind::Click,
        EventKind::DoubleClick,
        EventKind::RightClick,
        EventKind::Change,
        EventKind::Input,
        EventKind::Focus,
        EventKind::Blur,
        EventKind::Submit,
        EventKind::KeyboardDown,
        EventKind::KeyboardUp,
        EventKind::Scroll,
        EventKind::MouseMove,
        EventKind::MouseEnter,
        EventKind::MouseLeave,
        EventKind::Copy,
        EventKind::Cut,
        EventKind::Paste,
        EventKind::Resize,
        EventKind::VisibilityChange,
        EventKind::ConnectionOnline,
        EventKind::ConnectionOffline,
        EventKind::PageExit,
        EventKind::MediaPlay,
        EventKind::MediaPause,
        EventKind::MediaEnded,
        EventKind::TextSelection,
        EventKind::DragStart,
        EventKind::DragEnd,
        EventKind::Drop,
        EventKind::View,
        EventKind::UserIdle,
        EventKind::UserActive,
        EventKind::PageView,
        EventKind::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Click => "click",
            EventKind::DoubleClick => "double_click",
            EventKind::RightClick => "right_click",
            EventKind::Change => "change",
            EventKind::Input => "input",
            EventKind::Focus => "focus",
            EventKind::Blur => "blur",
            EventKind::Submit => "submit",
            EventKind::KeyboardDown => "keyboard_down",
            EventKind::KeyboardUp => "keyboard_up",
            EventKind::Scroll => "scroll",
            EventKind::MouseMove => "mouse_move",
            EventKind::MouseEnter => "mouse_enter",
            EventKind::MouseLeave => "mouse_leave",
            EventKind::Copy => "copy",
            EventKind::Cut => "cut",
            EventKind::Paste => "paste",
            EventKind::Resize => "resize",
            EventKind::VisibilityChange => "visibility_change",
            EventKind::ConnectionOnline => "connection_online",
            EventKind::ConnectionOffline => "connection_offline",
            EventKind::PageExit => "page_exit",
            EventKind::MediaPlay => "media_play",
            EventKind::MediaPause => "media_pause",
            EventKind::MediaEnded => "media_ended",
            EventKind::TextSelection => "text_selection",
            EventKind::DragStart => "drag_start",
            EventKind::DragEnd => "drag_end",
            EventKind::Drop => "drop",
            EventKind::View => "view",
            EventKind::UserIdle => "user_idle",
            EventKind::UserActive => "user_active",
            EventKind::PageView => "page_view",
            EventKind::Custom => "custom",
        }
    }

    /// Kinds produced by the idle machine itself
    pub fn is_idle_transition(&self) -> bool {
        matches!(self, EventKind::UserIdle | EventKind::UserActive)
    }
}

/// Classified origin of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    /// Semantic element type (e.g. `button`, `email_input`)
    pub element_type: String,
    /// Readable identifier built from tag, id, classes and attributes
    pub identifier: String,
    /// Structural path below the document root
    pub path: String,
}

/// Session metrics embedded in every record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub time_on_page_ms: i64,
    /// Cumulative event count, including this record
    pub event_count: u64,
    pub max_scroll_depth: u8,
    pub is_idle: bool,
}

/// A normalized interaction event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// 1-based, gapless, unique per session
    pub sequence_number: u64,
    pub timestamp_utc: DateTime<Utc>,
    /// Offset from session start
    pub relative_time_ms: i64,
    pub event_kind: EventKind,
    /// Short qualifier: an element type, or "page", "window", "session", ...
    pub event_subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_descriptor: Option<TargetDescriptor>,
    pub payload: Payload,
    pub session_snapshot: SessionSnapshot,
}

/// Control-surface view of the session state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,
    pub session_start: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub time_on_page_ms: i64,
    pub event_count: u64,
    pub scroll_depth: u8,
    pub max_scroll_depth: u8,
    pub is_idle: bool,
    pub viewed_elements: usize,
}
