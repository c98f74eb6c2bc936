use bytes::Bytes;
use serde::Serialize;

pub const CONTENT_TYPE: &str = "text/event-stream";
pub const ERROR_EVENT: &str = "error";

pub fn data_frame<T: Serialize>(value: &T) -> Bytes {
    let payload = serde_json::to_string(value).unwrap_or_default();
    Bytes::from(format!("data: {payload}\n\n"))
}

pub fn event_frame<T: Serialize>(event: &str, value: &T) -> Bytes {
    let payload = serde_json::to_string(value).unwrap_or_default();
    Bytes::from(format!("event: {event}\ndata: {payload}\n\n"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: Option<String>,
    pub data: String,
}

impl Frame {
    pub fn is_error(&self) -> bool {
        self.event.as_deref() == Some(ERROR_EVENT)
    }
}

#[derive(Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(idx) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=idx).collect();
            let text = String::from_utf8_lossy(&raw);
            let line = text.trim_end_matches(|c| c == '\n' || c == '\r');
            if line.is_empty() {
                if let Some(frame) = self.finish() {
                    frames.push(frame);
                }
            } else if let Some(value) = line.strip_prefix("event:") {
                self.event = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data.push(value.trim_start().to_string());
            }
        }
        frames
    }

    fn finish(&mut self) -> Option<Frame> {
        if self.data.is_empty() && self.event.is_none() {
            return None;
        }
        Some(Frame {
            event: self.event.take(),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_frames_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        let data = data_frame(&json!({"id": "job-1", "message": "ready"}));
        let error = event_frame(ERROR_EVENT, &json!({"error": "gone"}));
        let mut wire = data.to_vec();
        wire.extend_from_slice(&error);

        let (head, tail) = wire.split_at(7);
        assert!(decoder.push(head).is_empty());
        let frames = decoder.push(tail);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, None);
        assert_eq!(frames[0].data, r#"{"id":"job-1","message":"ready"}"#);
        assert!(frames[1].is_error());
        assert_eq!(frames[1].data, r#"{"error":"gone"}"#);
    }

    #[test]
    fn ignores_blank_keepalive_lines() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"\n\r\n: ping\n\n").is_empty());
    }
}
