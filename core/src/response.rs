//! Response envelope and on-demand body decoding.
//!
//! # Design
//! The envelope starts with the raw body stream. Each decoder consumes the
//! envelope and returns a new one whose body is the decoded value, so the
//! single-pass stream can only be decoded once. Decoding the same response
//! twice, or from two threads, is a caller error; nothing here guards it.

use std::fmt;
use std::io::{Cursor, Read};

use http::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;

use crate::edn::{self, EdnReader};
use crate::error::{HttpError, Result};
use crate::http::RawResponse;

/// A body that has been read and decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedBody {
    Text(String),
    Json(serde_json::Value),
    Edn(Vec<edn::Value>),
}

impl DecodedBody {
    fn kind(&self) -> &'static str {
        match self {
            DecodedBody::Text(_) => "text",
            DecodedBody::Json(_) => "json",
            DecodedBody::Edn(_) => "edn",
        }
    }
}

/// The envelope's body: still a stream, or already decoded.
pub enum ResponseBody {
    Stream(Box<dyn Read + Send>),
    Decoded(DecodedBody),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Stream(_) => f.write_str("Stream(..)"),
            ResponseBody::Decoded(d) => f.debug_tuple("Decoded").field(d).finish(),
        }
    }
}

/// Options for `ResponseEnvelope::read_edn`.
#[derive(Debug, Clone, PartialEq)]
pub struct EdnReadOptions {
    /// Value that marks end of stream. Reading stops when the reader yields
    /// it, and it is not included in the result.
    pub eof: edn::Value,
}

impl Default for EdnReadOptions {
    fn default() -> Self {
        Self {
            eof: edn::Value::keyword("wirecall/eof"),
        }
    }
}

/// A transport response with a lazily decoded body.
#[derive(Debug)]
pub struct ResponseEnvelope {
    /// Status line and headers as received.
    pub res: http::response::Parts,
    pub status_code: u16,
    pub body: ResponseBody,
    /// First `Content-Type` value, if the server sent one.
    pub content_type: Option<String>,
}

/// Whether `status` is in 200..=299.
pub fn is_success(status: u16) -> bool {
    (200..=299).contains(&status)
}

impl ResponseEnvelope {
    pub fn from_raw(raw: RawResponse) -> Self {
        let content_type = raw
            .parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Self {
            status_code: raw.parts.status.as_u16(),
            res: raw.parts,
            body: ResponseBody::Stream(raw.body),
            content_type,
        }
    }

    /// First value of a response header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.res.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn is_success(&self) -> bool {
        is_success(self.status_code)
    }

    /// The envelope unchanged on success, `FailureStatusCode` otherwise.
    /// Does not read the body; a decoded body is carried into the error.
    pub fn assert_success(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let body = match self.body {
            ResponseBody::Decoded(decoded) => Some(decoded),
            ResponseBody::Stream(_) => None,
        };
        Err(HttpError::FailureStatusCode {
            status: self.status_code,
            body,
        })
    }

    /// Drain the body as UTF-8 text.
    pub fn read_text(self) -> Result<Self> {
        let (envelope, mut reader) = self.take_reader()?;
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Ok(envelope.with_body(DecodedBody::Text(text)))
    }

    /// Parse the body as one JSON document.
    pub fn read_json(self) -> Result<Self> {
        let (envelope, reader) = self.take_reader()?;
        let value = serde_json::from_reader(reader)?;
        Ok(envelope.with_body(DecodedBody::Json(value)))
    }

    /// Read every EDN value in the body, in order, until the reader reports
    /// `opts.eof`.
    pub fn read_edn(self, opts: EdnReadOptions) -> Result<Self> {
        let (envelope, reader) = self.take_reader()?;
        let mut reader = EdnReader::new(reader);
        let mut values = Vec::new();
        loop {
            let value = reader.read_or(&opts.eof)?;
            if value == opts.eof {
                break;
            }
            values.push(value);
        }
        Ok(envelope.with_body(DecodedBody::Edn(values)))
    }

    pub fn text(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Decoded(DecodedBody::Text(t)) => Some(t),
            _ => None,
        }
    }

    pub fn json(&self) -> Option<&serde_json::Value> {
        match &self.body {
            ResponseBody::Decoded(DecodedBody::Json(v)) => Some(v),
            _ => None,
        }
    }

    pub fn edn(&self) -> Option<&[edn::Value]> {
        match &self.body {
            ResponseBody::Decoded(DecodedBody::Edn(v)) => Some(v),
            _ => None,
        }
    }

    /// Deserialize an already decoded JSON body into `T`.
    pub fn json_as<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.body {
            ResponseBody::Decoded(DecodedBody::Json(v)) => Ok(T::deserialize(v)?),
            ResponseBody::Decoded(other) => Err(HttpError::BodyNotReadable(other.kind())),
            ResponseBody::Stream(_) => Err(HttpError::BodyNotReadable("stream")),
        }
    }

    /// Split off a reader over the body. Decoded text can be re-read; other
    /// decoded values cannot.
    fn take_reader(self) -> Result<(Self, Box<dyn Read + Send>)> {
        let ResponseEnvelope {
            res,
            status_code,
            body,
            content_type,
        } = self;
        let reader: Box<dyn Read + Send> = match body {
            ResponseBody::Stream(reader) => reader,
            ResponseBody::Decoded(DecodedBody::Text(text)) => {
                Box::new(Cursor::new(text.into_bytes()))
            }
            ResponseBody::Decoded(other) => return Err(HttpError::BodyNotReadable(other.kind())),
        };
        let envelope = ResponseEnvelope {
            res,
            status_code,
            body: ResponseBody::Decoded(DecodedBody::Text(String::new())),
            content_type,
        };
        Ok((envelope, reader))
    }

    fn with_body(mut self, body: DecodedBody) -> Self {
        self.body = ResponseBody::Decoded(body);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn envelope(status: u16, content_type: Option<&str>, body: &str) -> ResponseEnvelope {
        let mut builder = http::Response::builder().status(status);
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        ResponseEnvelope::from_raw(RawResponse {
            parts,
            body: Box::new(Cursor::new(body.as_bytes().to_vec())),
        })
    }

    #[test]
    fn envelope_captures_status_and_content_type() {
        let env = envelope(201, Some("application/edn"), "");
        assert_eq!(env.status_code, 201);
        assert_eq!(env.content_type.as_deref(), Some("application/edn"));
        assert_eq!(env.header("content-type"), Some("application/edn"));
        assert!(envelope(200, None, "").content_type.is_none());
    }

    #[test]
    fn success_range_is_inclusive() {
        assert!(!is_success(199));
        assert!(is_success(200));
        assert!(is_success(299));
        assert!(!is_success(300));
        assert!(!is_success(0));
        assert!(!is_success(u16::MAX));
    }

    #[test]
    fn assert_success_is_idempotent_on_success() {
        let env = envelope(204, None, "").assert_success().unwrap();
        let env = env.assert_success().unwrap();
        assert_eq!(env.status_code, 204);
    }

    #[test]
    fn assert_success_does_not_force_decoding() {
        let err = envelope(500, None, "boom").assert_success().unwrap_err();
        assert!(matches!(
            err,
            HttpError::FailureStatusCode { status: 500, body: None }
        ));
    }

    #[test]
    fn assert_success_carries_decoded_body() {
        let env = envelope(404, None, "missing").read_text().unwrap();
        let err = env.assert_success().unwrap_err();
        match err {
            HttpError::FailureStatusCode { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, Some(DecodedBody::Text("missing".into())));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn read_text_drains_the_stream() {
        let env = envelope(200, None, "héllo").read_text().unwrap();
        assert_eq!(env.text(), Some("héllo"));
    }

    #[test]
    fn read_json_parses_one_document() {
        let env = envelope(200, None, r#"{"a": [1, 2]}"#).read_json().unwrap();
        assert_eq!(env.json(), Some(&json!({"a": [1, 2]})));
    }

    #[test]
    fn json_as_deserializes_decoded_json() {
        #[derive(Deserialize)]
        struct Item {
            id: u32,
        }
        let env = envelope(200, None, r#"{"id": 9}"#).read_json().unwrap();
        let item: Item = env.json_as().unwrap();
        assert_eq!(item.id, 9);

        let raw = envelope(200, None, "{}");
        assert!(matches!(
            raw.json_as::<Item>(),
            Err(HttpError::BodyNotReadable("stream"))
        ));
    }

    #[test]
    fn read_edn_collects_values_in_order() {
        let env = envelope(200, None, "1 2 3").read_edn(EdnReadOptions::default()).unwrap();
        assert_eq!(
            env.edn(),
            Some(&[edn::Value::Integer(1), edn::Value::Integer(2), edn::Value::Integer(3)][..])
        );
    }

    #[test]
    fn read_edn_stops_at_custom_sentinel() {
        let opts = EdnReadOptions {
            eof: edn::Value::keyword("stop"),
        };
        let env = envelope(200, None, "1 :stop 2").read_edn(opts).unwrap();
        assert_eq!(env.edn(), Some(&[edn::Value::Integer(1)][..]));
    }

    #[test]
    fn decoded_text_can_be_decoded_again() {
        let env = envelope(200, None, "[1]").read_text().unwrap().read_json().unwrap();
        assert_eq!(env.json(), Some(&json!([1])));
    }

    #[test]
    fn decoded_json_cannot_be_reread() {
        let env = envelope(200, None, "{}").read_json().unwrap();
        assert!(matches!(env.read_text(), Err(HttpError::BodyNotReadable("json"))));
    }

    #[test]
    fn encoded_json_body_reads_back_equal() {
        let original = json!({"name": "x", "nested": {"list": [1, 2.5, null, true]}});
        let encoded = crate::body::encode_body(
            crate::body::Body::Data(original.clone()),
            &crate::content_type::ContentType::Json,
        )
        .unwrap();
        let bytes = encoded.wire.into_bytes().unwrap();
        let env = envelope(200, None, std::str::from_utf8(&bytes).unwrap())
            .read_json()
            .unwrap();
        assert_eq!(env.json(), Some(&original));
    }

    #[test]
    fn deeply_nested_edn_is_an_error_not_a_crash() {
        let body = "[".repeat(50_000);
        let err = envelope(200, Some("application/edn"), &body)
            .read_edn(EdnReadOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            HttpError::Edn(edn::EdnError::DepthLimitExceeded(edn::MAX_DEPTH))
        ));
    }

    #[test]
    fn invalid_json_is_reported() {
        let err = envelope(200, None, "{nope").read_json().unwrap_err();
        assert!(matches!(err, HttpError::Json(_)));
    }
}
