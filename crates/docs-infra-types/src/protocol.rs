//! Wire format: one JSON envelope per line.
//!
//! ```text
//! {"type":"process-types","id":"req-1","data":{...}}\n
//! {"type":"success","id":"req-1","data":{...}}\n
//! {"type":"error","id":"req-1","data":{"error":"..."}}\n
//! ```

use memchr::memchr;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Payload of an `error` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    pub error: String,
}

/// An IPC envelope, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum IpcMessage {
    ProcessTypes { id: String, data: Value },
    Success { id: String, data: Value },
    Error { id: String, data: ErrorData },
}

impl IpcMessage {
    pub fn id(&self) -> &str {
        match self {
            Self::ProcessTypes { id, .. } | Self::Success { id, .. } | Self::Error { id, .. } => {
                id
            }
        }
    }

    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            id: id.into(),
            data: ErrorData {
                error: message.into(),
            },
        }
    }

    /// Serialize as one line, newline included.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn from_line(line: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(line)
    }
}

/// Largest accepted frame. Longer lines are dropped.
pub const DEFAULT_MAX_FRAME: usize = 64 * 1024 * 1024;

/// Reassembles newline-delimited frames from arbitrary read chunks.
///
/// Bytes of the trailing partial line are searched for a newline once, so a
/// large line arriving in many chunks costs time linear in its length.
#[derive(Debug)]
pub struct FrameBuffer {
    pending: Vec<u8>,
    /// Prefix of `pending` known to contain no newline.
    scanned: usize,
    max_frame: usize,
    /// Skipping the rest of an oversized line.
    discarding: bool,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME)
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            pending: Vec::new(),
            scanned: 0,
            max_frame,
            discarding: false,
        }
    }

    /// Append `chunk` and return every complete line. The trailing partial
    /// line stays buffered. Blank lines are skipped, and a line longer than
    /// the frame limit is dropped with a warning.
    pub fn push(&mut self, mut chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        if self.discarding {
            match memchr(b'\n', chunk) {
                Some(i) => {
                    self.discarding = false;
                    chunk = &chunk[i + 1..];
                }
                None => return lines,
            }
        }
        self.pending.extend_from_slice(chunk);

        let mut start = 0;
        let mut search = self.scanned;
        while let Some(offset) = memchr(b'\n', &self.pending[search..]) {
            let end = search + offset;
            let mut line = &self.pending[start..end];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            if line.len() > self.max_frame {
                warn!(limit = self.max_frame, "dropping oversized IPC frame");
            } else if !line.iter().all(u8::is_ascii_whitespace) {
                lines.push(line.to_vec());
            }
            start = end + 1;
            search = start;
        }
        self.pending.drain(..start);
        self.scanned = self.pending.len();

        if self.pending.len() > self.max_frame {
            warn!(limit = self.max_frame, "dropping oversized IPC frame");
            self.pending = Vec::new();
            self.scanned = 0;
            self.discarding = true;
        }
        lines
    }

    /// Bytes of the incomplete trailing line.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let message = IpcMessage::ProcessTypes {
            id: "req-1".into(),
            data: json!({ "entry": "/a/Demo.tsx" }),
        };
        let line = message.to_line().unwrap();

        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        let value: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(
            value,
            json!({ "type": "process-types", "id": "req-1", "data": { "entry": "/a/Demo.tsx" } })
        );
    }

    #[test]
    fn test_error_response_shape() {
        let line = IpcMessage::error("req-7", "boom").to_line().unwrap();
        let value: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value, json!({ "type": "error", "id": "req-7", "data": { "error": "boom" } }));
    }

    #[test]
    fn test_newlines_in_payload_are_escaped() {
        let message = IpcMessage::Success {
            id: "req-2".into(),
            data: json!({ "source": "line one\nline two" }),
        };
        let line = message.to_line().unwrap();
        assert_eq!(line.matches('\n').count(), 1);
        assert_eq!(IpcMessage::from_line(line.trim_end().as_bytes()).unwrap(), message);
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(IpcMessage::from_line(br#"{"type":"ping","id":"x","data":null}"#).is_err());
        assert!(IpcMessage::from_line(b"not json").is_err());
    }

    #[test]
    fn test_frame_buffer_keeps_partial_line() {
        let mut frames = FrameBuffer::new();

        assert!(frames.push(br#"{"type":"success","id""#).is_empty());
        assert!(frames.buffered() > 0);

        let lines = frames.push(b":\"req-1\",\"data\":1}\n{\"type\":");
        assert_eq!(lines.len(), 1);
        assert_eq!(IpcMessage::from_line(&lines[0]).unwrap().id(), "req-1");
        assert_eq!(frames.buffered(), "{\"type\":".len());
    }

    #[test]
    fn test_frame_buffer_splits_many_lines_and_skips_blank() {
        let mut frames = FrameBuffer::new();
        let lines = frames.push(b"a\r\n\n  \nb\nc");
        assert_eq!(lines, vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(frames.push(b"\n"), vec![b"c".to_vec()]);
        assert_eq!(frames.buffered(), 0);
    }

    #[test]
    fn test_frame_buffer_large_line_in_small_chunks() {
        let payload = "x".repeat(4 * 1024 * 1024);
        let line = IpcMessage::Success {
            id: "req-9".into(),
            data: json!({ "source": payload }),
        }
        .to_line()
        .unwrap();

        let mut frames = FrameBuffer::new();
        let mut lines = Vec::new();
        for chunk in line.as_bytes().chunks(8 * 1024) {
            lines.extend(frames.push(chunk));
        }

        assert_eq!(lines.len(), 1);
        assert_eq!(frames.buffered(), 0);
        let message = IpcMessage::from_line(&lines[0]).unwrap();
        assert_eq!(message.id(), "req-9");
    }

    #[test]
    fn test_frame_buffer_drops_oversized_line_and_recovers() {
        let mut frames = FrameBuffer::with_max_frame(16);

        assert!(frames.push(b"0123456789").is_empty());
        assert!(frames.push(b"0123456789").is_empty());
        assert_eq!(frames.buffered(), 0);
        assert!(frames.push(b"still the same line").is_empty());

        let lines = frames.push(b" end\nnext\n");
        assert_eq!(lines, vec![b"next".to_vec()]);
        assert_eq!(frames.buffered(), 0);
    }

    #[test]
    fn test_frame_buffer_drops_oversized_complete_line() {
        let mut frames = FrameBuffer::with_max_frame(4);
        let lines = frames.push(b"toolong\nok\n");
        assert_eq!(lines, vec![b"ok".to_vec()]);
    }
}
