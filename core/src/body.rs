//! Request bodies and their encoding into a wire body.
//!
//! # Design
//! A `Body` says what the caller has; the content type only matters for
//! `Body::Data`. Raw forms (bytes, text, streams, files, prebuilt wire bodies)
//! go out as they are whatever the content type says. Structured data is
//! serialized by the serializer the content type selects, and `Body::Parts`
//! is composed into a multipart stream.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use url::Url;

use crate::content_type::{ContentType, Serialization};
use crate::edn;
use crate::error::{HttpError, Result};
use crate::http::WireBody;
use crate::multipart::{generate_boundary, MultipartStream};

/// A file to send, named by path or by `file://` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Path(PathBuf),
    Uri(Url),
}

impl FileSource {
    /// Local path of the file. Only `file://` URIs have one.
    pub fn resolve(self) -> Result<PathBuf> {
        match self {
            FileSource::Path(path) => Ok(path),
            FileSource::Uri(uri) => {
                if uri.scheme() != "file" {
                    return Err(HttpError::UnsupportedBodySource(uri.to_string()));
                }
                uri.to_file_path()
                    .map_err(|_| HttpError::UnsupportedBodySource(uri.to_string()))
            }
        }
    }
}

impl From<PathBuf> for FileSource {
    fn from(path: PathBuf) -> Self {
        FileSource::Path(path)
    }
}

impl From<&str> for FileSource {
    fn from(path: &str) -> Self {
        FileSource::Path(PathBuf::from(path))
    }
}

impl From<Url> for FileSource {
    fn from(uri: Url) -> Self {
        FileSource::Uri(uri)
    }
}

/// Content of one multipart part.
pub enum PartContent {
    File(FileSource),
    Stream(Box<dyn Read + Send>),
    Bytes(Vec<u8>),
    Text(String),
}

impl fmt::Debug for PartContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartContent::File(file) => f.debug_tuple("File").field(file).finish(),
            PartContent::Stream(_) => f.write_str("Stream(..)"),
            PartContent::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            PartContent::Text(t) => f.debug_tuple("Text").field(t).finish(),
        }
    }
}

/// One named part of a multipart body.
#[derive(Debug)]
pub struct BodyPart {
    pub name: String,
    pub content: PartContent,
    pub content_type: Option<String>,
    /// Emitted as `filename=` in the part's Content-Disposition.
    pub file_name: Option<String>,
}

impl BodyPart {
    pub fn new(name: impl Into<String>, content: PartContent) -> Self {
        Self {
            name: name.into(),
            content,
            content_type: None,
            file_name: None,
        }
    }

    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, PartContent::Text(value.into()))
    }

    pub fn bytes(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self::new(name, PartContent::Bytes(value.into()))
    }

    /// A file part. Its file name defaults to the file's base name and its
    /// content type to a guess from the path.
    pub fn file(name: impl Into<String>, file: impl Into<FileSource>) -> Self {
        Self::new(name, PartContent::File(file.into()))
    }

    pub fn stream(name: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        Self::new(name, PartContent::Stream(Box::new(reader)))
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A request body as the caller describes it.
#[derive(Default)]
pub enum Body {
    #[default]
    Empty,
    Bytes(Vec<u8>),
    Text(String),
    Stream(Box<dyn Read + Send>),
    File(FileSource),
    /// A body already in wire form; passed through untouched.
    Wire(WireBody),
    /// Structured data, serialized according to the content type.
    Data(serde_json::Value),
    /// Multipart parts, composed when the content type is multipart.
    Parts(Vec<BodyPart>),
}

impl Body {
    pub fn stream(reader: impl Read + Send + 'static) -> Self {
        Body::Stream(Box::new(reader))
    }

    pub fn file(file: impl Into<FileSource>) -> Self {
        Body::File(file.into())
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Body::Text(t) => f.debug_tuple("Text").field(t).finish(),
            Body::Stream(_) => f.write_str("Stream(..)"),
            Body::File(file) => f.debug_tuple("File").field(file).finish(),
            Body::Wire(w) => f.debug_tuple("Wire").field(w).finish(),
            Body::Data(v) => f.debug_tuple("Data").field(v).finish(),
            Body::Parts(p) => f.debug_tuple("Parts").field(p).finish(),
        }
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Text(s)
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Body::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Body {
    fn from(b: Vec<u8>) -> Self {
        Body::Bytes(b)
    }
}

/// A JSON string is raw text and `null` is no body; anything else is
/// structured data serialized per content type.
impl From<serde_json::Value> for Body {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Body::Empty,
            serde_json::Value::String(s) => Body::Text(s),
            other => Body::Data(other),
        }
    }
}

impl From<Vec<BodyPart>> for Body {
    fn from(parts: Vec<BodyPart>) -> Self {
        Body::Parts(parts)
    }
}

/// An encoded body and, for multipart, the boundary it was framed with.
#[derive(Debug)]
pub struct EncodedBody {
    pub wire: WireBody,
    pub boundary: Option<String>,
}

impl EncodedBody {
    fn plain(wire: WireBody) -> Self {
        Self {
            wire,
            boundary: None,
        }
    }
}

/// Turn `body` into a wire body for `content_type`.
pub fn encode_body(body: Body, content_type: &ContentType) -> Result<EncodedBody> {
    let wire = match body {
        Body::Empty => WireBody::Empty,
        Body::Bytes(bytes) => WireBody::Bytes(bytes),
        Body::Text(text) => WireBody::Bytes(text.into_bytes()),
        Body::Stream(reader) => WireBody::Reader {
            reader,
            length: None,
        },
        Body::Wire(wire) => wire,
        Body::File(file) => {
            let path = file.resolve()?;
            let file = File::open(&path)?;
            let length = file.metadata()?.len();
            WireBody::reader(file, Some(length))
        }
        Body::Data(value) => return encode_data(&value, content_type).map(EncodedBody::plain),
        Body::Parts(parts) => {
            if content_type.serialization() != Some(Serialization::Multipart) {
                return Err(HttpError::UnknownContentTypeForSerialization(
                    content_type.to_string(),
                ));
            }
            let boundary = generate_boundary();
            let stream = MultipartStream::new(parts, boundary.clone())?;
            return Ok(EncodedBody {
                wire: WireBody::reader(stream, None),
                boundary: Some(boundary),
            });
        }
    };
    Ok(EncodedBody::plain(wire))
}

fn encode_data(value: &serde_json::Value, content_type: &ContentType) -> Result<WireBody> {
    match content_type.serialization() {
        Some(Serialization::Json) => Ok(WireBody::Bytes(serde_json::to_vec(value)?)),
        Some(Serialization::Edn) => Ok(WireBody::Bytes(
            edn::Value::from(value).to_string().into_bytes(),
        )),
        Some(Serialization::Form) => Ok(WireBody::Bytes(encode_form(value)?.into_bytes())),
        Some(Serialization::Multipart) | None => Err(
            HttpError::UnknownContentTypeForSerialization(content_type.to_string()),
        ),
    }
}

/// `k=v&k=v`, both sides percent-encoded as UTF-8, in the map's order.
pub fn encode_form(value: &serde_json::Value) -> Result<String> {
    let map = value
        .as_object()
        .ok_or_else(|| HttpError::InvalidFormBody(value.to_string()))?;
    let pairs: Vec<String> = map
        .iter()
        .map(|(k, v)| {
            let v = match v {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            format!("{}={}", urlencoding::encode(k), urlencoding::encode(&v))
        })
        .collect();
    Ok(pairs.join("&"))
}
