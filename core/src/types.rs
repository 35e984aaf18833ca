//! The request context: a caller's description of an HTTP exchange.
//!
//! # Design
//! `RequestContext` is plain data assembled with builder-style setters; it is
//! checked only when the request is built. `method` and `location` are kept
//! optional here so that a context missing either is reported as an error at
//! build time instead of being silently defaulted.
//!
//! `from_json` accepts the same context as a JSON document with camel-case
//! keys, for callers that keep request descriptions as data.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::body::Body;
use crate::content_type::ContentType;
use crate::error::{HttpError, Result};
use crate::http::HttpMethod;
use crate::transport::Transport;

/// Credentials sent in the `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Basic { username: String, password: String },
    Bearer { token: String },
    /// Sent verbatim.
    Raw(String),
}

/// A request timeout, either as a duration or a millisecond count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    Duration(Duration),
    Millis(i64),
}

impl Timeout {
    pub fn to_duration(self) -> Result<Duration> {
        match self {
            Timeout::Duration(d) => Ok(d),
            Timeout::Millis(ms) => u64::try_from(ms)
                .map(Duration::from_millis)
                .map_err(|_| HttpError::InvalidTimeoutType(ms.to_string())),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Timeout::Duration(d)
    }
}

impl From<i64> for Timeout {
    fn from(ms: i64) -> Self {
        Timeout::Millis(ms)
    }
}

/// Parse a protocol version string: `1.1` or `2.0` (`2` is accepted too).
pub fn parse_version(value: &str) -> Result<http::Version> {
    match value {
        "1.1" => Ok(http::Version::HTTP_11),
        "2" | "2.0" => Ok(http::Version::HTTP_2),
        other => Err(HttpError::InvalidHttpVersion(other.to_string())),
    }
}

/// Everything needed to build one request.
#[derive(Default)]
pub struct RequestContext {
    pub location: Option<String>,
    pub method: Option<HttpMethod>,
    pub base_uri: Option<String>,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Body,
    pub content_type: Option<ContentType>,
    pub accept: Option<ContentType>,
    pub accept_language: Option<String>,
    pub authorization: Option<Authorization>,
    pub api_key: Option<String>,
    pub timeout: Option<Timeout>,
    pub version: Option<String>,
    /// Transport for this request only; the client's provider is used otherwise.
    pub client: Option<Arc<dyn Transport>>,
}

impl RequestContext {
    pub fn new(method: HttpMethod, location: impl Into<String>) -> Self {
        Self {
            method: Some(method),
            location: Some(location.into()),
            ..Self::default()
        }
    }

    pub fn get(location: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, location)
    }

    pub fn post(location: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, location)
    }

    pub fn put(location: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, location)
    }

    pub fn patch(location: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, location)
    }

    pub fn delete(location: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, location)
    }

    pub fn head(location: impl Into<String>) -> Self {
        Self::new(HttpMethod::Head, location)
    }

    pub fn base_uri(mut self, base: impl Into<String>) -> Self {
        self.base_uri = Some(base.into());
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    pub fn content_type(mut self, content_type: impl Into<ContentType>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn accept(mut self, accept: impl Into<ContentType>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn accept_language(mut self, language: impl Into<String>) -> Self {
        self.accept_language = Some(language.into());
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.authorization = Some(Authorization::Basic {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn bearer_auth(mut self, token: impl Into<String>) -> Self {
        self.authorization = Some(Authorization::Bearer {
            token: token.into(),
        });
        self
    }

    pub fn authorization(mut self, authorization: Authorization) -> Self {
        self.authorization = Some(authorization);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn client(mut self, transport: Arc<dyn Transport>) -> Self {
        self.client = Some(transport);
        self
    }

    /// Build a context from a JSON document.
    ///
    /// Recognized keys: `location`, `method`, `baseUri`, `query`, `headers`,
    /// `body`, `contentType`, `accept`, `acceptLanguage`, `authorization`,
    /// `apiKey`, `timeout` (milliseconds), `version`. Unknown keys are ignored.
    pub fn from_json(doc: &Value) -> Result<Self> {
        let map = doc
            .as_object()
            .ok_or_else(|| HttpError::InvalidContext("context must be a JSON object".into()))?;
        let mut ctx = RequestContext::default();

        for (key, value) in map {
            match key.as_str() {
                "location" => ctx.location = Some(expect_str(key, value)?.to_string()),
                "baseUri" => ctx.base_uri = Some(expect_str(key, value)?.to_string()),
                "method" => ctx.method = Some(expect_str(key, value)?.parse()?),
                "query" => ctx.query = string_pairs(key, value)?,
                "headers" => ctx.headers = string_pairs(key, value)?,
                "body" => ctx.body = Body::from(value.clone()),
                "contentType" => {
                    let s = value
                        .as_str()
                        .ok_or_else(|| HttpError::InvalidContentType(value.to_string()))?;
                    ctx.content_type = Some(ContentType::from(s));
                }
                "accept" => {
                    let s = value
                        .as_str()
                        .ok_or_else(|| HttpError::InvalidAcceptType(value.to_string()))?;
                    ctx.accept = Some(ContentType::from(s));
                }
                "acceptLanguage" => {
                    ctx.accept_language = Some(expect_str(key, value)?.to_string())
                }
                "apiKey" => ctx.api_key = Some(expect_str(key, value)?.to_string()),
                "authorization" => ctx.authorization = Some(authorization_from_json(value)),
                "timeout" => {
                    let ms = value
                        .as_i64()
                        .ok_or_else(|| HttpError::InvalidTimeoutType(value.to_string()))?;
                    ctx.timeout = Some(Timeout::Millis(ms));
                }
                "version" => {
                    let s = value
                        .as_str()
                        .ok_or_else(|| HttpError::InvalidHttpVersion(value.to_string()))?;
                    ctx.version = Some(s.to_string());
                }
                _ => {}
            }
        }
        Ok(ctx)
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("location", &self.location)
            .field("method", &self.method)
            .field("base_uri", &self.base_uri)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("content_type", &self.content_type)
            .field("accept", &self.accept)
            .field("accept_language", &self.accept_language)
            .field("authorization", &self.authorization.as_ref().map(|_| "<redacted>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("version", &self.version)
            .field("client", &self.client.is_some())
            .finish()
    }
}

fn expect_str<'a>(key: &str, value: &'a Value) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| HttpError::InvalidContext(format!("`{key}` must be a string, got {value}")))
}

fn string_pairs(key: &str, value: &Value) -> Result<Vec<(String, String)>> {
    let map = value.as_object().ok_or_else(|| {
        HttpError::InvalidContext(format!("`{key}` must be an object, got {value}"))
    })?;
    Ok(map
        .iter()
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), v)
        })
        .collect())
}

fn authorization_from_json(value: &Value) -> Authorization {
    let field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);
    match value.get("kind").and_then(Value::as_str) {
        Some("basic") => {
            if let (Some(username), Some(password)) = (field("username"), field("password")) {
                return Authorization::Basic { username, password };
            }
        }
        Some("bearer") => {
            if let Some(token) = field("token") {
                return Authorization::Bearer { token };
            }
        }
        _ => {}
    }
    match value {
        Value::String(s) => Authorization::Raw(s.clone()),
        other => Authorization::Raw(other.to_string()),
    }
}
