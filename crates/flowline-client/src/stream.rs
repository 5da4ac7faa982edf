// Typed event stream over raw response bytes
//
// Network chunks arrive at arbitrary boundaries; the frame decoder
// re-assembles them into wire frames. Iteration ends at the `[DONE]`
// sentinel, at a terminal event, or when the transport closes (after
// which the caller reconnects with its last index).

use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use flowline_protocol::{DecodedFrame, FrameDecoder, StreamEvent};

use crate::client::ClientError;

struct DecodeState<S> {
    bytes: S,
    decoder: FrameDecoder,
    pending: VecDeque<StreamEvent>,
    finished: bool,
}

/// Turn a stream of byte chunks into a stream of typed events.
pub fn decode_stream<S, E>(bytes: S) -> impl Stream<Item = Result<StreamEvent, ClientError>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    ClientError: From<E>,
{
    let state = DecodeState {
        bytes,
        decoder: FrameDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                // Terminal events end the logical stream even if the
                // transport stays open a little longer.
                if event.kind.is_terminal() {
                    state.finished = true;
                    state.pending.clear();
                }
                return Some((Ok(event), state));
            }
            if state.finished || state.decoder.is_done() {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for frame in state.decoder.push(&chunk) {
                        if let DecodedFrame::Event(event) = frame {
                            state.pending.push_back(event);
                        }
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(ClientError::from(e)), state));
                }
                None => return None,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flowline_protocol::StreamEventKind;
    use serde_json::json;
    use std::convert::Infallible;
    use uuid::Uuid;

    fn wire_event(index: i64, kind: StreamEventKind) -> StreamEvent {
        StreamEvent {
            index,
            kind,
            execution_id: Uuid::now_v7(),
            node_id: None,
            data: json!({}),
            timestamp: Utc::now(),
        }
    }

    fn chunked(raw: &[u8], size: usize) -> Vec<Result<Bytes, Infallible>> {
        raw.chunks(size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect()
    }

    async fn collect_indexes(
        chunks: Vec<Result<Bytes, Infallible>>,
    ) -> Vec<i64> {
        decode_stream(stream::iter(chunks))
            .map(|r| r.unwrap().index)
            .collect()
            .await
    }

    #[tokio::test]
    async fn decodes_fragmented_response() {
        let mut raw = String::new();
        for i in 0..3 {
            raw.push_str(&wire_event(i, StreamEventKind::NodeOutput).to_frame());
        }
        raw.push_str("data: [DONE]\n\n");

        for chunk_size in [1, 5, 64] {
            let indexes = collect_indexes(chunked(raw.as_bytes(), chunk_size)).await;
            assert_eq!(indexes, vec![0, 1, 2], "chunk size {chunk_size}");
        }
    }

    #[tokio::test]
    async fn stops_at_terminal_event_without_sentinel() {
        let mut raw = String::new();
        raw.push_str(&wire_event(0, StreamEventKind::ExecutionStart).to_frame());
        raw.push_str(&wire_event(1, StreamEventKind::ExecutionComplete).to_frame());
        raw.push_str(&wire_event(2, StreamEventKind::NodeOutput).to_frame());

        let indexes = collect_indexes(chunked(raw.as_bytes(), 16)).await;
        assert_eq!(indexes, vec![0, 1]);
    }

    #[tokio::test]
    async fn heartbeats_produce_no_items() {
        let raw = b": keep-alive\n\n: keep-alive\n\ndata: [DONE]\n\n";
        let indexes = collect_indexes(chunked(raw, 7)).await;
        assert!(indexes.is_empty());
    }

    #[tokio::test]
    async fn transport_close_ends_iteration() {
        // No sentinel: the server hit its lifetime cap and closed.
        let raw = wire_event(0, StreamEventKind::NodeOutput).to_frame();
        let indexes = collect_indexes(chunked(raw.as_bytes(), 9)).await;
        assert_eq!(indexes, vec![0]);
    }
}
