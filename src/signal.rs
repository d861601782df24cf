//! Raw signals delivered by the host
//!
//! One variant per native trigger, tagged by its DOM event name:
//!
//! ```json
//! { "type": "click", "x": 120, "y": 48, "target": { "tag": "button", "id": "buy" } }
//! ```
//!
//! A [`TimedSignal`] adds an optional `at` timestamp for replay.

use crate::dom::{Node, Rect};
use crate::error::TrackerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pointer and touch signals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerSignal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Node>,
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button: Option<u8>,
}

/// Keyboard signals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySignal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Node>,
    pub key: String,
    pub code: String,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
    pub repeat: bool,
}

/// Signals that only carry their originating element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementSignal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Node>,
}

/// Document scroll metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollSignal {
    pub scroll_top: f64,
    pub scroll_left: f64,
    pub scroll_height: f64,
    pub viewport_height: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeSignal {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipboardSignal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Node>,
    /// Length of the selection being copied or cut, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection_length: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionSignal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Node>,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSignal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Node>,
    pub current_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub muted: bool,
}

/// Intersection update from the host's layout engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectionSignal {
    pub target: Node,
    pub ratio: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rect: Option<Rect>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSignal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

/// A raw signal from the host environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Signal {
    Click(PointerSignal),
    DblClick(PointerSignal),
    ContextMenu(PointerSignal),
    MouseDown(PointerSignal),
    MouseMove(PointerSignal),
    MouseEnter(PointerSignal),
    MouseLeave(PointerSignal),
    TouchStart(PointerSignal),
    KeyDown(KeySignal),
    KeyUp(KeySignal),
    KeyPress(KeySignal),
    Change(ElementSignal),
    Input(ElementSignal),
    Focus(ElementSignal),
    Blur(ElementSignal),
    Submit(ElementSignal),
    Scroll(ScrollSignal),
    Resize(ResizeSignal),
    VisibilityChange { hidden: bool },
    Online,
    Offline,
    Copy(ClipboardSignal),
    Cut(ClipboardSignal),
    Paste(ClipboardSignal),
    Selection(SelectionSignal),
    DragStart(ElementSignal),
    DragEnd(ElementSignal),
    Drop(ElementSignal),
    #[serde(rename = "play")]
    MediaPlay(MediaSignal),
    #[serde(rename = "pause")]
    MediaPause(MediaSignal),
    #[serde(rename = "ended")]
    MediaEnded(MediaSignal),
    Intersection(IntersectionSignal),
    #[serde(rename = "register_candidates")]
    RegisterCandidates { nodes: Vec<Node> },
    #[serde(rename = "page_load")]
    PageLoad(PageSignal),
    #[serde(rename = "page_exit")]
    PageExit,
}

impl Signal {
    /// DOM-style name, for logs
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Click(_) => "click",
            Signal::DblClick(_) => "dblclick",
            Signal::ContextMenu(_) => "contextmenu",
            Signal::MouseDown(_) => "mousedown",
            Signal::MouseMove(_) => "mousemove",
            Signal::MouseEnter(_) => "mouseenter",
            Signal::MouseLeave(_) => "mouseleave",
            Signal::TouchStart(_) => "touchstart",
            Signal::KeyDown(_) => "keydown",
            Signal::KeyUp(_) => "keyup",
            Signal::KeyPress(_) => "keypress",
            Signal::Change(_) => "change",
            Signal::Input(_) => "input",
            Signal::Focus(_) => "focus",
            Signal::Blur(_) => "blur",
            Signal::Submit(_) => "submit",
            Signal::Scroll(_) => "scroll",
            Signal::Resize(_) => "resize",
            Signal::VisibilityChange { .. } => "visibilitychange",
            Signal::Online => "online",
            Signal::Offline => "offline",
            Signal::Copy(_) => "copy",
            Signal::Cut(_) => "cut",
            Signal::Paste(_) => "paste",
            Signal::Selection(_) => "selection",
            Signal::DragStart(_) => "dragstart",
            Signal::DragEnd(_) => "dragend",
            Signal::Drop(_) => "drop",
            Signal::MediaPlay(_) => "play",
            Signal::MediaPause(_) => "pause",
            Signal::MediaEnded(_) => "ended",
            Signal::Intersection(_) => "intersection",
            Signal::RegisterCandidates { .. } => "register_candidates",
            Signal::PageLoad(_) => "page_load",
            Signal::PageExit => "page_exit",
        }
    }

    /// Signals that reset the inactivity timer.
    ///
    /// Deliberately narrower than the tracked set: keyup, focus and the like
    /// do not count as liveness.
    pub fn resets_idle(&self) -> bool {
        matches!(
            self,
            Signal::MouseDown(_)
                | Signal::MouseMove(_)
                | Signal::KeyPress(_)
                | Signal::Scroll(_)
                | Signal::TouchStart(_)
                | Signal::Click(_)
        )
    }
}

/// A recorded signal that failed to parse
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalIssue {
    /// 1-based line (NDJSON) or array entry (JSON)
    pub position: usize,
    pub error: String,
}

/// Outcome of checking a recording without replaying it
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignalCheck {
    pub total: usize,
    pub issues: Vec<SignalIssue>,
}

impl SignalCheck {
    pub fn valid(&self) -> usize {
        self.total - self.issues.len()
    }

    fn record(&mut self, position: usize, result: Result<TimedSignal, TrackerError>) {
        self.total += 1;
        if let Err(e) = result {
            self.issues.push(SignalIssue {
                position,
                error: e.to_string(),
            });
        }
    }
}

/// A signal with an optional capture timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct TimedSignal {
    pub at: Option<DateTime<Utc>>,
    pub signal: Signal,
}

impl TimedSignal {
    pub fn new(signal: Signal) -> Self {
        Self { at: None, signal }
    }

    pub fn at(at: DateTime<Utc>, signal: Signal) -> Self {
        Self {
            at: Some(at),
            signal,
        }
    }

    /// Parse one signal object, reading `at` alongside the signal fields
    pub fn from_value(mut value: serde_json::Value) -> Result<Self, TrackerError> {
        let at = match value.as_object_mut().and_then(|obj| obj.remove("at")) {
            Some(raw) => Some(serde_json::from_value::<DateTime<Utc>>(raw).map_err(|e| {
                TrackerError::InvalidSignal(format!("Invalid `at` timestamp: {}", e))
            })?),
            None => None,
        };
        let signal = serde_json::from_value(value)
            .map_err(|e| TrackerError::ParseError(format!("Failed to parse signal: {}", e)))?;
        Ok(Self { at, signal })
    }

    pub fn from_json(json: &str) -> Result<Self, TrackerError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Serialize back to the wire shape
    pub fn to_value(&self) -> Result<serde_json::Value, TrackerError> {
        let mut value = serde_json::to_value(&self.signal)?;
        if let (Some(at), Some(obj)) = (self.at, value.as_object_mut()) {
            obj.insert("at".to_string(), serde_json::to_value(at)?);
        }
        Ok(value)
    }

    /// Parse a JSON array of signals
    pub fn parse_array(json: &str) -> Result<Vec<Self>, TrackerError> {
        let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
        values.into_iter().map(Self::from_value).collect()
    }

    /// Parse NDJSON, one signal per non-empty line
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<Self>, TrackerError> {
        let mut signals = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match Self::from_json(trimmed) {
                Ok(signal) => signals.push(signal),
                Err(e) => {
                    return Err(TrackerError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(signals)
    }

    /// Check every non-empty NDJSON line, collecting all failures
    pub fn check_ndjson(ndjson: &str) -> SignalCheck {
        let mut check = SignalCheck::default();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                check.record(line_num + 1, Self::from_json(trimmed));
            }
        }
        check
    }

    /// Check every entry of a JSON array. Fails only if the input is not an
    /// array at all.
    pub fn check_array(json: &str) -> Result<SignalCheck, TrackerError> {
        let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
        let mut check = SignalCheck::default();
        for (index, value) in values.into_iter().enumerate() {
            check.record(index + 1, Self::from_value(value));
        }
        Ok(check)
    }
}
