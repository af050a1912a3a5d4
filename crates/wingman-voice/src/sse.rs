//! Incremental decoder for `text/event-stream` bodies.
//!
//! Network reads do not respect line boundaries, so bytes are buffered until
//! a full line is available. Only `data:` fields are surfaced; comments,
//! `event:`/`id:` fields and blank separators are ignored.

use crate::error::VoiceError;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt;

/// One decoded `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    /// The `[DONE]` sentinel that terminates OpenAI-style streams.
    Done,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes and returns every event completed by them.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = parse_line(&line[..line.len() - 1]) {
                events.push(event);
            }
        }
        events
    }

    /// Decodes whatever is left once the body has ended without a trailing newline.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }
}

/// What a payload parser wants done with one `data:` field.
pub enum Frame<T> {
    Item(T),
    Skip,
    /// Stop reading; the remote signalled completion.
    End,
    /// Yield this error and stop reading.
    Fail(VoiceError),
}

struct FrameState<B, E, T, F> {
    bytes: BoxStream<'static, Result<B, E>>,
    decoder: SseDecoder,
    parse: F,
    pending: VecDeque<Result<T, VoiceError>>,
    finished: bool,
}

impl<B, E, T, F> FrameState<B, E, T, F>
where
    F: FnMut(&str) -> Frame<T>,
{
    fn absorb(&mut self, events: impl IntoIterator<Item = SseEvent>) {
        for event in events {
            if self.finished {
                break;
            }
            let data = match event {
                SseEvent::Done => {
                    self.finished = true;
                    break;
                }
                SseEvent::Data(data) => data,
            };
            match (self.parse)(&data) {
                Frame::Item(item) => self.pending.push_back(Ok(item)),
                Frame::Skip => {}
                Frame::End => self.finished = true,
                Frame::Fail(e) => {
                    self.pending.push_back(Err(e));
                    self.finished = true;
                }
            }
        }
    }
}

/// Maps an SSE response body to a stream of parsed payloads.
///
/// The stream ends at `[DONE]`, at a [`Frame::End`], after a
/// [`Frame::Fail`], or when the body closes. Transport errors are wrapped
/// with `read_error` and also end the stream. Items already decoded are
/// always delivered before the stream ends.
pub fn frame_stream<S, B, E, T, F>(
    bytes: S,
    read_error: fn(String) -> VoiceError,
    parse: F,
) -> BoxStream<'static, Result<T, VoiceError>>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
    T: Send + 'static,
    F: FnMut(&str) -> Frame<T> + Send + 'static,
{
    let state = FrameState {
        bytes: bytes.boxed(),
        decoder: SseDecoder::new(),
        parse,
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, move |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = st.decoder.push(chunk.as_ref());
                    st.absorb(events);
                }
                Some(Err(e)) => {
                    st.pending
                        .push_back(Err(read_error(format!("stream read failed: {e}"))));
                    st.finished = true;
                }
                None => {
                    let tail = st.decoder.finish();
                    st.absorb(tail);
                    st.finished = true;
                }
            }
        }
    })
    .boxed()
}

fn parse_line(line: &[u8]) -> Option<SseEvent> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches('\r');
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data).trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }
    Some(SseEvent::Data(data.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_split_across_chunks_are_reassembled() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"a\"").is_empty());
        let events = decoder.push(b":1}\n\ndata: [DONE]\n");
        assert_eq!(
            events,
            vec![
                SseEvent::Data("{\"a\":1}".to_string()),
                SseEvent::Done
            ]
        );
    }

    #[test]
    fn multibyte_characters_split_mid_sequence_survive() {
        let payload = "data: günaydın\n".as_bytes();
        // Split inside the two-byte 'ü'.
        let (head, tail) = payload.split_at(8);
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(head).is_empty());
        assert_eq!(
            decoder.push(tail),
            vec![SseEvent::Data("günaydın".to_string())]
        );
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\r\nevent: message\r\nid: 7\r\ndata: x\r\n\r\n");
        assert_eq!(events, vec![SseEvent::Data("x".to_string())]);
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish(), Some(SseEvent::Data("tail".to_string())));
        assert_eq!(decoder.finish(), None);
    }
}
