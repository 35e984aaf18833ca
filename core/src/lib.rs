//! Declarative HTTP requests with streaming bodies and lazy response decoding.
//!
//! # Overview
//! A caller describes an exchange as a `RequestContext` (location, method,
//! headers, body, content negotiation). The request builder turns it into a
//! wire-accurate `BuiltRequest`, a `Transport` dispatches it, and the
//! resulting `ResponseEnvelope` decodes its body only when asked to.
//!
//! # Design
//! - Bodies are a tagged union resolved once by the body encoder: raw forms
//!   pass through, structured data is serialized per content type, and
//!   multipart parts are composed into one lazily pulled stream.
//! - Blocking and non-blocking dispatch share one builder; they differ only
//!   in where the transport call runs.
//! - The default transport lives in an explicit `ClientProvider`; callers may
//!   own one or use the process-wide `ClientProvider::global()`.
//! - Nothing retries and non-2xx responses are not errors unless the caller
//!   asserts success.

pub mod body;
pub mod client;
pub mod content_type;
pub mod edn;
pub mod error;
pub mod http;
pub mod multipart;
pub mod request;
pub mod response;
pub mod transport;
pub mod types;

pub use body::{encode_body, Body, BodyPart, EncodedBody, FileSource, PartContent};
pub use client::{request, request_async, Client, PendingResponse};
pub use content_type::{validate_accept, validate_content_type, ContentType};
pub use error::{HttpError, Result};
pub use http::{BuiltRequest, HttpMethod, RawResponse, WireBody};
pub use multipart::MultipartStream;
pub use request::build_request;
pub use response::{is_success, DecodedBody, EdnReadOptions, ResponseBody, ResponseEnvelope};
pub use transport::{ClientProvider, Transport, TransportConfig, UreqTransport};
pub use types::{Authorization, RequestContext, Timeout};
