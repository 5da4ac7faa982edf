// Wire frame re-assembly
//
// Chunks arrive at arbitrary byte boundaries; frames are delimited by a
// blank line (LF or CRLF). The decoder accumulates bytes, emits every
// complete frame, and carries the trailing fragment over to the next
// chunk. Decoding only happens on complete frames, so a UTF-8 sequence
// split across chunks never reaches the parser half-way.

use crate::events::{StreamEvent, DONE_SENTINEL};

/// Output of the decoder for one complete frame.
#[derive(Debug, Clone)]
pub enum DecodedFrame {
    Event(StreamEvent),
    /// The terminal sentinel; no further frames follow.
    Done,
}

/// Stateful re-assembler for blank-line-delimited stream frames.
#[derive(Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    done: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the terminal sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one chunk and drain every frame completed by it.
    ///
    /// Malformed frames are logged and skipped; they never abort the
    /// stream. After the terminal sentinel, remaining input is ignored.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<DecodedFrame> {
        if self.done {
            return Vec::new();
        }
        self.buf.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some((end, delim_len)) = find_frame_boundary(&self.buf) {
            let rest = self.buf.split_off(end + delim_len);
            let block = std::mem::replace(&mut self.buf, rest);
            let block = &block[..end];

            if let Some(frame) = parse_block(block) {
                let is_done = matches!(frame, DecodedFrame::Done);
                out.push(frame);
                if is_done {
                    self.done = true;
                    self.buf.clear();
                    break;
                }
            }
        }
        out
    }
}

/// Find the first blank line: returns (frame end offset, delimiter length).
fn find_frame_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < buf.len() {
        let Some(first) = line_break_at(buf, i) else {
            i += 1;
            continue;
        };
        if let Some(second) = line_break_at(buf, i + first) {
            return Some((i, first + second));
        }
        i += first;
    }
    None
}

/// Length of the line break at `i`: 1 for LF, 2 for CRLF, None otherwise.
/// A lone trailing CR is not a break; it may be half of a CRLF still in
/// flight.
fn line_break_at(buf: &[u8], i: usize) -> Option<usize> {
    match buf.get(i) {
        Some(b'\n') => Some(1),
        Some(b'\r') if buf.get(i + 1) == Some(&b'\n') => Some(2),
        _ => None,
    }
}

/// Parse one complete frame block into a decoded frame.
///
/// Comment lines (leading ':') are heartbeats and ignored. The first
/// `data:` line carries the payload.
fn parse_block(block: &[u8]) -> Option<DecodedFrame> {
    let text = String::from_utf8_lossy(block);
    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let Some(payload) = line.strip_prefix("data:") else {
            tracing::warn!(line = %truncate(line), "skipping unrecognized stream line");
            continue;
        };
        let payload = payload.trim_start();
        if payload == DONE_SENTINEL {
            return Some(DecodedFrame::Done);
        }
        return match serde_json::from_str::<StreamEvent>(payload) {
            Ok(event) => Some(DecodedFrame::Event(event)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    payload = %truncate(payload),
                    "skipping malformed stream frame"
                );
                None
            }
        };
    }
    None
}

/// Truncate payloads for log lines.
fn truncate(s: &str) -> String {
    const MAX: usize = 120;
    if s.len() <= MAX {
        s.to_string()
    } else {
        let mut end = MAX;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::StreamEventKind;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn wire_event(index: i64, kind: StreamEventKind) -> StreamEvent {
        StreamEvent {
            index,
            kind,
            execution_id: Uuid::now_v7(),
            node_id: Some("node-1".to_string()),
            data: json!({ "delta": format!("chunk-{index}") }),
            timestamp: Utc::now(),
        }
    }

    fn raw_stream(events: &[StreamEvent], with_done: bool) -> Vec<u8> {
        let mut raw = String::new();
        for event in events {
            raw.push_str(&event.to_frame());
        }
        if with_done {
            raw.push_str("data: [DONE]\n\n");
        }
        raw.into_bytes()
    }

    fn decoded_indexes(frames: &[DecodedFrame]) -> Vec<i64> {
        frames
            .iter()
            .filter_map(|f| match f {
                DecodedFrame::Event(e) => Some(e.index),
                DecodedFrame::Done => None,
            })
            .collect()
    }

    #[test]
    fn decodes_whole_buffer_at_once() {
        let events = vec![wire_event(0, StreamEventKind::ExecutionStart), wire_event(1, StreamEventKind::NodeOutput)];
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(&raw_stream(&events, true));

        assert_eq!(decoded_indexes(&frames), vec![0, 1]);
        assert!(matches!(frames.last(), Some(DecodedFrame::Done)));
        assert!(decoder.is_done());
    }

    #[test]
    fn fragmentation_is_invisible_to_the_parser() {
        // Splitting the same byte stream at arbitrary boundaries must
        // yield the same parsed sequence as one big push.
        let events: Vec<StreamEvent> = (0..5)
            .map(|i| wire_event(i, StreamEventKind::NodeOutput))
            .collect();
        let raw = raw_stream(&events, true);

        let mut reference = FrameDecoder::new();
        let expected = decoded_indexes(&reference.push(&raw));

        for chunk_size in [1usize, 2, 3, 7, 16, 61] {
            let mut decoder = FrameDecoder::new();
            let mut frames = Vec::new();
            for chunk in raw.chunks(chunk_size) {
                frames.extend(decoder.push(chunk));
            }
            assert_eq!(decoded_indexes(&frames), expected, "chunk size {chunk_size}");
            assert!(decoder.is_done(), "chunk size {chunk_size}");
        }
    }

    #[test]
    fn tolerates_crlf_line_endings() {
        let event = wire_event(3, StreamEventKind::NodeOutput);
        let json = serde_json::to_string(&event).unwrap();
        let raw = format!(": ping\r\n\r\ndata: {}\r\n\r\ndata: [DONE]\r\n\r\n", json);

        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(raw.as_bytes());
        assert_eq!(decoded_indexes(&frames), vec![3]);
        assert!(decoder.is_done());
    }

    #[test]
    fn crlf_split_between_chunks() {
        let event = wire_event(0, StreamEventKind::NodeOutput);
        let json = serde_json::to_string(&event).unwrap();
        let raw = format!("data: {}\r\n\r\n", json).into_bytes();

        // Split right between CR and LF of the delimiter.
        let split = raw.len() - 3;
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(&raw[..split]).is_empty());
        let frames = decoder.push(&raw[split..]);
        assert_eq!(decoded_indexes(&frames), vec![0]);
    }

    #[test]
    fn heartbeat_comments_are_ignored() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b": keep-alive\n\n: keep-alive\n\n");
        assert!(frames.is_empty());
        assert!(!decoder.is_done());
    }

    #[test]
    fn malformed_frames_are_skipped_not_fatal() {
        let good = wire_event(2, StreamEventKind::NodeOutput);
        let raw = format!("data: {{not json\n\n{}", good.to_frame());

        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(raw.as_bytes());
        assert_eq!(decoded_indexes(&frames), vec![2]);
    }

    #[test]
    fn input_after_done_is_ignored() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: [DONE]\n\n");
        let frames = decoder.push(raw_stream(&[wire_event(9, StreamEventKind::NodeOutput)], false).as_slice());
        assert!(frames.is_empty());
    }

    #[test]
    fn incomplete_frame_is_held_back() {
        let event = wire_event(0, StreamEventKind::NodeOutput);
        let frame = event.to_frame();
        let (head, tail) = frame.as_bytes().split_at(frame.len() / 2);

        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(head).is_empty());
        let frames = decoder.push(tail);
        assert_eq!(decoded_indexes(&frames), vec![0]);
    }
}
