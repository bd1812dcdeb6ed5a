//! Scripted gateway for testing.
//!
//! Responses are queued up front and consumed in order, one per call. A
//! call whose queue is empty fails with [`GatewayError::Unavailable`], which
//! is also how tests exercise the failure paths. Every call is recorded so
//! tests can assert on the prompts the controller produced.

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::{StreamExt, stream};
use parking_lot::Mutex;

use vexchat_proto::assist::Turn;

use super::{AiGateway, ChunkStream, GatewayError};

type ChunkItem = Result<String, GatewayError>;

/// How one streaming turn behaves.
#[derive(Debug, Clone)]
pub enum StreamScript {
    /// Yields each chunk, then ends normally.
    Chunks(Vec<String>),
    /// Yields the chunks, then a single error.
    FailAfter {
        chunks: Vec<String>,
        error: GatewayError,
    },
    /// Yields the chunks, then never produces another item.
    StallAfter(Vec<String>),
    /// Fails before the stream opens.
    RefuseToOpen(GatewayError),
}

impl StreamScript {
    /// Convenience for [`StreamScript::Chunks`] from string slices.
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Chunks(chunks.into_iter().map(Into::into).collect())
    }
}

/// A call observed by the scripted gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Complete(String),
    ChatStream { history: Vec<Turn>, message: String },
    Structured(String),
    Summarize(String),
}

#[derive(Debug, Default)]
struct Script {
    completions: VecDeque<Result<String, GatewayError>>,
    structured: VecDeque<Result<Vec<String>, GatewayError>>,
    summaries: VecDeque<Result<String, GatewayError>>,
    streams: VecDeque<StreamScript>,
    calls: Vec<RecordedCall>,
}

/// In-process [`AiGateway`] that replays queued responses.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    script: Mutex<Script>,
    latency: Option<Duration>,
    chunk_delay: Option<Duration>,
}

impl ScriptedGateway {
    /// Creates a gateway with nothing queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call by `latency` before it answers.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Delays every streamed chunk by `delay`.
    #[must_use]
    pub const fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Queues the next [`AiGateway::complete`] result.
    pub fn push_completion(&self, result: Result<String, GatewayError>) {
        self.script.lock().completions.push_back(result);
    }

    /// Queues the next [`AiGateway::structured_complete`] result.
    pub fn push_structured(&self, result: Result<Vec<String>, GatewayError>) {
        self.script.lock().structured.push_back(result);
    }

    /// Queues the next [`AiGateway::summarize`] result.
    pub fn push_summary(&self, result: Result<String, GatewayError>) {
        self.script.lock().summaries.push_back(result);
    }

    /// Queues the next streaming turn.
    pub fn push_stream(&self, script: StreamScript) {
        self.script.lock().streams.push_back(script);
    }

    /// Every call received so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script.lock().calls.clone()
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn exhausted(what: &str) -> GatewayError {
    GatewayError::Unavailable(format!("no scripted {what} response"))
}

impl AiGateway for ScriptedGateway {
    async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
        let next = {
            let mut script = self.script.lock();
            script.calls.push(RecordedCall::Complete(prompt.to_string()));
            script.completions.pop_front()
        };
        self.pause().await;
        next.unwrap_or_else(|| Err(exhausted("completion")))
    }

    async fn chat_stream(
        &self,
        history: &[Turn],
        new_message: &str,
    ) -> Result<ChunkStream, GatewayError> {
        let next = {
            let mut script = self.script.lock();
            script.calls.push(RecordedCall::ChatStream {
                history: history.to_vec(),
                message: new_message.to_string(),
            });
            script.streams.pop_front()
        };
        self.pause().await;

        let (chunks, tail): (Vec<String>, ChunkStream) =
            match next.ok_or_else(|| exhausted("stream"))? {
                StreamScript::RefuseToOpen(err) => return Err(err),
                StreamScript::Chunks(chunks) => (chunks, Box::pin(stream::empty::<ChunkItem>())),
                StreamScript::FailAfter { chunks, error } => {
                    (chunks, Box::pin(stream::once(async move { ChunkItem::Err(error) })))
                }
                StreamScript::StallAfter(chunks) => {
                    (chunks, Box::pin(stream::pending::<ChunkItem>()))
                }
            };

        let head = stream::iter(chunks.into_iter().map(Ok));
        let delay = self.chunk_delay;
        let chunks = head.chain(tail).then(move |item| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            item
        });
        Ok(Box::pin(chunks))
    }

    async fn structured_complete(&self, prompt: &str) -> Result<Vec<String>, GatewayError> {
        let next = {
            let mut script = self.script.lock();
            script.calls.push(RecordedCall::Structured(prompt.to_string()));
            script.structured.pop_front()
        };
        self.pause().await;
        next.unwrap_or_else(|| Err(exhausted("structured")))
    }

    async fn summarize(&self, transcript: &str) -> Result<String, GatewayError> {
        let next = {
            let mut script = self.script.lock();
            script.calls.push(RecordedCall::Summarize(transcript.to_string()));
            script.summaries.pop_front()
        };
        self.pause().await;
        next.unwrap_or_else(|| Err(exhausted("summary")))
    }
}
