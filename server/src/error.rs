use shared::SessionId;
use thiserror::Error;

/// Per-event failures. None of these are fatal to the process or to the
/// session that caused them; the transport logs and drops the event.
#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("malformed frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),

    #[error("malformed `{event}` payload: {source}")]
    MalformedPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown event `{0}`")]
    UnknownEvent(String),

    #[error("session {0} is already registered")]
    DuplicateSession(SessionId),
}
