//! Remote store contract consumed by the reconciliation engine.
//!
//! # Responsibility
//! - Describe the remote operations the engine issues, independent of the
//!   transport that carries them.
//! - Classify transport failures into a small error taxonomy.
//!
//! # Invariants
//! - Implementations own timeouts; the engine never cancels a call.
//! - Calls are issued one at a time; implementations need not be reentrant
//!   across overlapping passes.

use crate::logging::single_line;
use crate::sync::wire::{RemoteObjective, RemoteTask, TaskStatusUpdate};
use async_trait::async_trait;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

const MAX_RAW_MESSAGE_CHARS: usize = 200;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Failure of one remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// No authenticated session is available.
    AuthRequired,
    /// The remote store could not be reached.
    Network(String),
    /// Non-2xx response.
    Server { status: u16, message: String },
    /// Response body did not match the expected schema.
    Parse(String),
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthRequired => write!(f, "authentication required"),
            Self::Network(message) => write!(f, "network error: {message}"),
            Self::Server { status, message } => write!(f, "server error {status}: {message}"),
            Self::Parse(message) => write!(f, "malformed response: {message}"),
        }
    }
}

impl Error for RemoteError {}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Error body shapes the remote store is known to return.
#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Nested { error: ErrorDetail },
    Flat { error: String },
    Message { message: String },
    Detail { detail: String },
    List { errors: Vec<ErrorDetail> },
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        match self {
            Self::Nested { error } => Some(error.message),
            Self::Flat { error } => Some(error),
            Self::Message { message } => Some(message),
            Self::Detail { detail } => Some(detail),
            Self::List { errors } => {
                let joined = errors
                    .into_iter()
                    .map(|detail| detail.message)
                    .collect::<Vec<_>>()
                    .join("; ");
                (!joined.is_empty()).then_some(joined)
            }
        }
    }
}

impl RemoteError {
    /// Builds a `Server` error from a non-2xx status and its raw body.
    ///
    /// Known body shapes win; otherwise the trimmed body (capped), and for an
    /// empty body a generic `HTTP <status>` message.
    pub fn from_response(status: u16, body: &str) -> Self {
        let known = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(ErrorBody::into_message)
            .filter(|message| !message.trim().is_empty());

        let message = match known {
            Some(message) => message,
            None => {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    format!("HTTP {status}")
                } else {
                    single_line(trimmed, MAX_RAW_MESSAGE_CHARS)
                }
            }
        };

        Self::Server { status, message }
    }
}

/// Remote store operations used by the reconcilers.
///
/// HTTP transports decode 2xx bodies with [`decode_body`] into the envelopes
/// in [`crate::sync::wire`] (`ObjectiveListEnvelope`, `ObjectiveEnvelope`,
/// `TaskListEnvelope`, `TaskEnvelope`) and map other statuses through
/// [`RemoteError::from_response`].
///
/// [`decode_body`]: crate::sync::wire::decode_body
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Whether an authenticated session is currently available.
    fn is_authenticated(&self) -> bool;

    /// Lists every objective. Entries may omit their children; the engine
    /// falls back to [`RemoteApi::get_objective_detail`] when it needs them.
    async fn list_objectives(&self) -> RemoteResult<Vec<RemoteObjective>>;

    /// Fetches one objective with all of its children.
    async fn get_objective_detail(&self, canonical_id: &str) -> RemoteResult<RemoteObjective>;

    /// Creates one objective aggregate in a single request.
    async fn create_objective(&self, payload: &RemoteObjective) -> RemoteResult<RemoteObjective>;

    /// Lists tasks scheduled on `date_iso` (`YYYY-MM-DD`).
    async fn list_tasks(&self, date_iso: &str) -> RemoteResult<Vec<RemoteTask>>;

    async fn create_task(&self, payload: &RemoteTask) -> RemoteResult<RemoteTask>;

    async fn update_task(&self, id: &str, update: &TaskStatusUpdate) -> RemoteResult<RemoteTask>;
}
