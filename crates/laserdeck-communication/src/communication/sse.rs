//! Incremental decoder for `text/event-stream` bodies
//!
//! Network chunks can split a line (or a CRLF pair) anywhere, so the decoder
//! keeps the unfinished line between calls to [`SseDecoder::feed`].

use serde::{Deserialize, Serialize};

/// One dispatched server-sent event
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerEvent {
    /// Value of the `event:` field, `None` for the default type
    pub event: Option<String>,
    /// Data lines joined with `\n`
    pub data: String,
    /// Last event id seen on the stream
    pub id: Option<String>,
}

impl ServerEvent {
    /// Event carrying only data, with the default type
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    /// Event type, `message` unless the server named one
    pub fn event_type(&self) -> &str {
        match self.event.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "message",
        }
    }
}

/// Stateful line parser for an event stream
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    after_cr: bool,
    data: String,
    event: Option<String>,
    last_id: Option<String>,
}

impl SseDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns the events completed by them
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        for &byte in chunk {
            if self.after_cr {
                self.after_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\r' => {
                    self.after_cr = true;
                    self.finish_line(&mut events);
                }
                b'\n' => self.finish_line(&mut events),
                _ => self.line.push(byte),
            }
        }
        events
    }

    fn finish_line(&mut self, events: &mut Vec<ServerEvent>) {
        let raw = std::mem::take(&mut self.line);
        let line = String::from_utf8_lossy(&raw);

        if line.is_empty() {
            if let Some(event) = self.dispatch() {
                events.push(event);
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (&*line, ""),
        };
        match field {
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "event" => self.event = Some(value.to_string()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            // retry hints are ignored; the reconnect delay is fixed
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<ServerEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let mut data = std::mem::take(&mut self.data);
        data.pop();
        Some(ServerEvent {
            event,
            data,
            id: self.last_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: {\"printing\":true}\n\n");
        assert_eq!(events, vec![ServerEvent::message("{\"printing\":true}")]);
        assert_eq!(events[0].event_type(), "message");
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"da").is_empty());
        assert!(decoder.feed(b"ta: {\"paused\":").is_empty());
        assert!(decoder.feed(b"false}\r").is_empty());
        let events = decoder.feed(b"\n\r\n");
        assert_eq!(events, vec![ServerEvent::message("{\"paused\":false}")]);
    }

    #[test]
    fn test_multiline_data_and_fields() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(
            b": keepalive\nevent: status\nid: 7\nretry: 100\ndata: a\ndata:b\n\ndata: c\n\n",
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), "status");
        assert_eq!(events[0].data, "a\nb");
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[1].event_type(), "message");
        assert_eq!(events[1].id.as_deref(), Some("7"));
    }

    #[test]
    fn test_blank_lines_without_data_dispatch_nothing() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"\n\nevent: ping\n\n").is_empty());
        // the event type does not leak into the next event
        let events = decoder.feed(b"data: x\n\n");
        assert_eq!(events[0].event_type(), "message");
    }
}
