//! AI gateway abstraction.
//!
//! Defines the [`AiGateway`] trait that every text-generation backend must
//! satisfy. Concrete implementations:
//! - [`gemini::GeminiGateway`]: Generative Language REST API over HTTPS
//! - [`scripted::ScriptedGateway`]: in-process scripted responses for testing
//!
//! The controller treats every gateway failure as recoverable: callers see
//! the absence of a result, never an error surfaced to the UI.

pub mod gemini;
pub mod prompts;
pub mod scripted;
pub mod sse;

use std::pin::Pin;

use futures_util::Stream;

use vexchat_proto::assist::Turn;

/// A finite, non-restartable sequence of streamed text chunks.
///
/// Each item is the *new* text produced since the previous item; the
/// consumer is responsible for accumulating it.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, GatewayError>> + Send>>;

/// Errors that can occur while talking to the AI gateway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The gateway cannot be used at all (no credentials, bad endpoint).
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    /// The remote side answered with a non-success HTTP status.
    #[error("gateway returned HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The remote side reported an error inside an otherwise valid response.
    #[error("gateway rejected request: {0}")]
    Rejected(String),

    /// Connection or I/O failure.
    #[error("gateway transport error: {0}")]
    Transport(String),

    /// The request did not complete in time.
    #[error("gateway request timed out")]
    Timeout,

    /// The response could not be parsed.
    #[error("malformed gateway response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Async text-generation capability consumed by the conversation controller.
pub trait AiGateway: Send + Sync + 'static {
    /// Single-turn completion of `prompt`.
    fn complete(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, GatewayError>> + Send;

    /// Opens a streaming chat turn.
    ///
    /// `history` is the role-tagged transcript preceding `new_message`.
    /// Resolves once the stream is open; chunks then arrive through the
    /// returned [`ChunkStream`], which ends when the remote turn completes.
    fn chat_stream(
        &self,
        history: &[Turn],
        new_message: &str,
    ) -> impl std::future::Future<Output = Result<ChunkStream, GatewayError>> + Send;

    /// Completion constrained to a JSON array of short strings.
    ///
    /// Non-parsable output is reported as [`GatewayError::MalformedResponse`].
    fn structured_complete(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>, GatewayError>> + Send;

    /// Summarizes a rendered conversation transcript.
    fn summarize(
        &self,
        transcript: &str,
    ) -> impl std::future::Future<Output = Result<String, GatewayError>> + Send;
}
