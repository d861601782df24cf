//! Record sinks
//!
//! The pipeline hands every record to a [`Sink`] and forgets about it. Sinks
//! never fail from the pipeline's point of view; write errors are logged and
//! swallowed here.

use crate::types::EventRecord;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use tracing::warn;

/// Fire-and-forget consumer of event records
pub trait Sink {
    fn emit(&mut self, record: &EventRecord);
}

impl<F> Sink for F
where
    F: FnMut(&EventRecord),
{
    fn emit(&mut self, record: &EventRecord) {
        self(record)
    }
}

/// Shared in-memory buffer; clones see the same records
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Rc<RefCell<Vec<EventRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every buffered record
    pub fn drain(&self) -> Vec<EventRecord> {
        std::mem::take(&mut *self.records.borrow_mut())
    }

    pub fn records(&self) -> Vec<EventRecord> {
        self.records.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }
}

impl Sink for MemorySink {
    fn emit(&mut self, record: &EventRecord) {
        self.records.borrow_mut().push(record.clone());
    }
}

/// One JSON object per line
pub struct JsonLinesSink<W: Write> {
    out: W,
    flush: bool,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W, flush: bool) -> Self {
        Self { out, flush }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Sink for JsonLinesSink<W> {
    fn emit(&mut self, record: &EventRecord) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                warn!(seq = record.sequence_number, error = %e, "failed to encode record");
                return;
            }
        };
        if let Err(e) = writeln!(self.out, "{}", line) {
            warn!(seq = record.sequence_number, error = %e, "failed to write record");
            return;
        }
        if self.flush {
            if let Err(e) = self.out.flush() {
                warn!(error = %e, "failed to flush sink");
            }
        }
    }
}

/// Human-readable console lines:
/// `#12 +3.204s click [button] button#buy "Add to cart" {"x":10,"y":20}`
pub struct ConsoleSink<W: Write> {
    out: W,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Format a record the way [`ConsoleSink`] prints it
pub fn console_line(record: &EventRecord) -> String {
    let mut line = format!(
        "#{} +{:.3}s {} [{}]",
        record.sequence_number,
        record.relative_time_ms as f64 / 1000.0,
        record.event_kind.as_str(),
        record.event_subject
    );
    if let Some(target) = &record.target_descriptor {
        line.push(' ');
        line.push_str(&target.identifier);
    }
    if !record.payload.is_empty() {
        line.push(' ');
        line.push_str(&serde_json::Value::Object(record.payload.clone()).to_string());
    }
    line
}

impl<W: Write> Sink for ConsoleSink<W> {
    fn emit(&mut self, record: &EventRecord) {
        if let Err(e) = writeln!(self.out, "{}", console_line(record)) {
            warn!(seq = record.sequence_number, error = %e, "failed to write console line");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventKind, Payload, SessionSnapshot, TargetDescriptor};
    use chrono::{TimeZone, Utc};

    fn record(seq: u64) -> EventRecord {
        let mut payload = Payload::new();
        payload.insert("x".to_string(), serde_json::json!(10));
        EventRecord {
            sequence_number: seq,
            timestamp_utc: Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 3).unwrap(),
            relative_time_ms: 3_204,
            event_kind: EventKind::Click,
            event_subject: "button".to_string(),
            target_descriptor: Some(TargetDescriptor {
                element_type: "button".to_string(),
                identifier: "button#buy".to_string(),
                path: "button#buy".to_string(),
            }),
            payload,
            session_snapshot: SessionSnapshot {
                session_id: "s".to_string(),
                time_on_page_ms: 3_204,
                event_count: seq,
                max_scroll_depth: 0,
                is_idle: false,
            },
        }
    }

    #[test]
    fn test_memory_sink_clones_share_buffer() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.emit(&record(1));
        writer.emit(&record(2));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.drain().len(), 2);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_json_lines_sink() {
        let mut sink = JsonLinesSink::new(Vec::new(), false);
        sink.emit(&record(1));
        sink.emit(&record(2));
        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: EventRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.sequence_number, 2);
    }

    #[test]
    fn test_console_line() {
        assert_eq!(
            console_line(&record(12)),
            r#"#12 +3.204s click [button] button#buy {"x":10}"#
        );
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |r: &EventRecord| seen.push(r.sequence_number);
            sink.emit(&record(7));
        }
        assert_eq!(seen, vec![7]);
    }
}
