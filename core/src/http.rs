//! Wire-level request and response types shared by the builder and transports.
//!
//! # Design
//! The builder produces a `BuiltRequest` without touching the network; a
//! `Transport` turns it into a `RawResponse`. Keeping these as plain data is
//! what lets the builder be tested byte for byte and lets the blocking and
//! non-blocking invokers share one construction path.

use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HttpError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_http(self) -> http::Method {
        match self {
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Post => http::Method::POST,
            HttpMethod::Put => http::Method::PUT,
            HttpMethod::Patch => http::Method::PATCH,
            HttpMethod::Delete => http::Method::DELETE,
            HttpMethod::Head => http::Method::HEAD,
        }
    }
}

impl FromStr for HttpMethod {
    type Err = HttpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "patch" => Ok(HttpMethod::Patch),
            "delete" => Ok(HttpMethod::Delete),
            "head" => Ok(HttpMethod::Head),
            _ => Err(HttpError::InvalidMethod(s.to_string())),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_http().as_str())
    }
}

/// The byte-producing body attached to an outgoing request.
pub enum WireBody {
    /// No body at all; no `Content-Length` is framed for it.
    Empty,
    Bytes(Vec<u8>),
    /// A stream pulled by the transport while sending. `length` is `None` for
    /// streams of unknown size, which are sent chunked.
    Reader {
        reader: Box<dyn Read + Send>,
        length: Option<u64>,
    },
}

impl WireBody {
    pub fn reader(reader: impl Read + Send + 'static, length: Option<u64>) -> Self {
        WireBody::Reader {
            reader: Box::new(reader),
            length,
        }
    }

    /// Size in bytes when known up front.
    pub fn content_length(&self) -> Option<u64> {
        match self {
            WireBody::Empty => None,
            WireBody::Bytes(b) => Some(b.len() as u64),
            WireBody::Reader { length, .. } => *length,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, WireBody::Empty)
    }

    /// Drain the body into memory. Used by tests and diagnostics.
    pub fn into_bytes(self) -> io::Result<Vec<u8>> {
        match self {
            WireBody::Empty => Ok(Vec::new()),
            WireBody::Bytes(b) => Ok(b),
            WireBody::Reader { mut reader, .. } => {
                let mut out = Vec::new();
                reader.read_to_end(&mut out)?;
                Ok(out)
            }
        }
    }
}

impl fmt::Debug for WireBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireBody::Empty => f.write_str("Empty"),
            WireBody::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            WireBody::Reader { length, .. } => {
                f.debug_struct("Reader").field("length", length).finish()
            }
        }
    }
}

/// A fully assembled request, ready for a transport.
#[derive(Debug)]
pub struct BuiltRequest {
    pub request: http::Request<WireBody>,
    /// Per-request deadline, translated by the transport to its own timeout.
    pub timeout: Option<Duration>,
}

impl BuiltRequest {
    /// First value of a request header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.headers().get(name).and_then(|v| v.to_str().ok())
    }
}

/// What a transport hands back once response headers have arrived.
pub struct RawResponse {
    pub parts: http::response::Parts,
    /// The unread response body.
    pub body: Box<dyn Read + Send>,
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.parts.status)
            .finish_non_exhaustive()
    }
}
