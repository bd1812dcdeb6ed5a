//! Incremental server-sent-events decoding.
//!
//! Only the `data:` field is interpreted; multi-line data is joined with
//! `\n` and dispatched on a blank line. Comments (`:` lines) and other
//! fields are ignored. Input may be split at arbitrary byte boundaries.

use std::collections::VecDeque;

use futures_util::{Stream, StreamExt};

use super::GatewayError;

/// Line-buffering SSE decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes received after the last complete line.
    partial: Vec<u8>,
    /// `data:` lines of the event being assembled.
    data: Vec<String>,
}

impl SseDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds bytes and returns the payloads of every event they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.partial.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(end) = self.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=end).collect();
            if let Some(event) = self.process_line(&line[..end]) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes a trailing event that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.partial);
        let from_rest = if rest.is_empty() {
            None
        } else {
            self.process_line(&rest)
        };
        from_rest.or_else(|| self.dispatch())
    }

    fn process_line(&mut self, raw: &[u8]) -> Option<String> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if raw.is_empty() {
            return self.dispatch();
        }
        let line = String::from_utf8_lossy(raw);
        if let Some(value) = line.strip_prefix("data:") {
            self.data
                .push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.data).join("\n"))
        }
    }
}

/// Adapts a byte stream into a stream of SSE event payloads.
///
/// A transport error ends the stream after being yielded once.
pub fn event_stream<S, B, E>(bytes: S) -> impl Stream<Item = Result<String, GatewayError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<GatewayError> + Send + 'static,
{
    struct State<S> {
        bytes: std::pin::Pin<Box<S>>,
        decoder: SseDecoder,
        ready: VecDeque<String>,
        done: bool,
    }

    let state = State {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        done: false,
    };

    futures_util::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(payload) = st.ready.pop_front() {
                return Some((Ok(payload), st));
            }
            if st.done {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = st.decoder.push(chunk.as_ref());
                    st.ready.extend(events);
                }
                Some(Err(err)) => {
                    st.done = true;
                    return Some((Err(err.into()), st));
                }
                None => {
                    st.done = true;
                    st.ready.extend(st.decoder.finish());
                }
            }
        }
    })
}
