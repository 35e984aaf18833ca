//! Error types for request construction, dispatch and response decoding.
//!
//! # Design
//! Every validation failure is raised while the request is being built, before
//! the transport sees anything. `FailureStatusCode` is the only variant that
//! depends on the server's answer, and it is produced only when the caller
//! asks for it through `ResponseEnvelope::assert_success`. Transport failures
//! are carried as-is in `Transport`; nothing here retries.

use crate::edn::EdnError;
use crate::response::DecodedBody;

/// Errors returned by the builder, the invokers and the decoders.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The content type is not a valid media type.
    #[error("invalid content type: {0}")]
    InvalidContentType(String),

    /// The accept value is not a valid list of media ranges.
    #[error("invalid accept type: {0}")]
    InvalidAcceptType(String),

    /// The protocol version is neither `1.1` nor `2.0`.
    #[error("invalid HTTP version: {0}")]
    InvalidHttpVersion(String),

    /// The timeout is neither a duration nor a non-negative millisecond count.
    #[error("invalid timeout: {0}")]
    InvalidTimeoutType(String),

    /// A structured body was given with a content type that has no serializer.
    #[error("no serializer for structured body with content type {0}")]
    UnknownContentTypeForSerialization(String),

    /// A file source that cannot be read from the local file system.
    #[error("unsupported body source: {0}")]
    UnsupportedBodySource(String),

    /// The server answered outside 200..=299 and the caller asserted success.
    #[error("request failed with status {status}")]
    FailureStatusCode {
        status: u16,
        body: Option<DecodedBody>,
    },

    /// `method` or `location` was never set.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid method: {0}")]
    InvalidMethod(String),

    #[error("invalid uri {value}: {reason}")]
    InvalidUri { value: String, reason: String },

    #[error("invalid header {name}")]
    InvalidHeader { name: String },

    /// A multipart part is missing its name.
    #[error("invalid body part: {0}")]
    InvalidBodyPart(String),

    /// A form body that is not a mapping of names to values.
    #[error("form body must be a JSON object, got {0}")]
    InvalidFormBody(String),

    /// A declarative context whose shape cannot be interpreted.
    #[error("invalid request context: {0}")]
    InvalidContext(String),

    /// The body was already decoded into something that cannot be re-read.
    #[error("response body is not readable: already decoded as {0}")]
    BodyNotReadable(&'static str),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("edn error: {0}")]
    Edn(#[from] EdnError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport failed to deliver the request or read the response head.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Non-blocking dispatch requires a running tokio runtime.
    #[error("no async runtime available for non-blocking dispatch")]
    NoRuntime,

    #[error("request task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl From<ureq::Error> for HttpError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Io(io) => HttpError::Io(io),
            other => HttpError::Transport(Box::new(other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, HttpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_status_display_names_the_status() {
        let err = HttpError::FailureStatusCode {
            status: 503,
            body: Some(DecodedBody::Text("down".to_string())),
        };
        assert_eq!(err.to_string(), "request failed with status 503");
    }

    #[test]
    fn validation_errors_carry_the_offending_value() {
        let err = HttpError::InvalidHttpVersion("3.0".to_string());
        assert!(err.to_string().contains("3.0"));
        let err = HttpError::InvalidContentType("not a mime".to_string());
        assert!(err.to_string().contains("not a mime"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: HttpError = io.into();
        assert!(matches!(err, HttpError::Io(_)));
    }
}
