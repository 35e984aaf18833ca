//! Request builder: turns a `RequestContext` into a `BuiltRequest`.
//!
//! Assembly is one linear pass. Cheap validations (method, location, content
//! types, version, timeout) run before the body is encoded, so a bad context
//! never opens a file or generates a boundary.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::header::{
    HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE,
};
use url::Url;

use crate::body::encode_body;
use crate::content_type::{validate_accept, validate_content_type, ContentType};
use crate::error::{HttpError, Result};
use crate::http::BuiltRequest;
use crate::types::{parse_version, Authorization, RequestContext};

/// Header carrying `RequestContext::api_key`.
pub const X_API_KEY: &str = "x-api-key";

/// Build the wire request described by `ctx`. `ctx.client` is ignored here.
pub fn build_request(ctx: RequestContext) -> Result<BuiltRequest> {
    let method = ctx.method.ok_or(HttpError::MissingField("method"))?;
    let location = ctx.location.ok_or(HttpError::MissingField("location"))?;
    let uri = resolve_uri(ctx.base_uri.as_deref(), &location, &ctx.query)?;

    let content_type = ctx.content_type.unwrap_or(ContentType::Json);
    let content_type_value = validate_content_type(content_type.as_str())?;
    let accept = validate_accept(ctx.accept.unwrap_or(ContentType::Json).as_str())?;
    let version = ctx.version.as_deref().map(parse_version).transpose()?;
    let timeout = ctx.timeout.map(|t| t.to_duration()).transpose()?;

    let encoded = encode_body(ctx.body, &content_type)?;

    let content_type_header = match &encoded.boundary {
        Some(boundary) => with_boundary(&content_type_value, boundary),
        None => content_type_value,
    };

    let mut builder = http::Request::builder()
        .method(method.as_http())
        .uri(uri.as_str())
        .header(CONTENT_TYPE, header_value(CONTENT_TYPE.as_str(), &content_type_header)?)
        .header(ACCEPT, header_value(ACCEPT.as_str(), &accept)?);

    if let Some(version) = version {
        builder = builder.version(version);
    }
    if let Some(length) = encoded.wire.content_length() {
        builder = builder.header(CONTENT_LENGTH, length);
    }
    if let Some(language) = &ctx.accept_language {
        let value = header_value(ACCEPT_LANGUAGE.as_str(), language)?;
        builder = builder.header(ACCEPT_LANGUAGE, value);
    }
    if let Some(auth) = &ctx.authorization {
        let value = authorization_value(auth);
        builder = builder.header(AUTHORIZATION, header_value(AUTHORIZATION.as_str(), &value)?);
    }
    if let Some(key) = &ctx.api_key {
        builder = builder.header(X_API_KEY, header_value(X_API_KEY, key)?);
    }

    let mut request = builder
        .body(encoded.wire)
        .map_err(|e| HttpError::InvalidUri {
            value: uri.to_string(),
            reason: e.to_string(),
        })?;

    // Custom headers go last and replace any defaulted header of the same name.
    for (name, value) in &ctx.headers {
        let header_name = HeaderName::try_from(name.as_str())
            .map_err(|_| HttpError::InvalidHeader { name: name.clone() })?;
        request
            .headers_mut()
            .insert(header_name, header_value(name, value)?);
    }

    Ok(BuiltRequest { request, timeout })
}

/// `query-append(join(base, location))`, or just `location` without a base.
///
/// The base is treated as a directory: `http://x/a` joined with `b` is
/// `http://x/a/b`. A location with its own scheme replaces the base.
pub fn resolve_uri(base: Option<&str>, location: &str, query: &[(String, String)]) -> Result<Url> {
    let invalid = |value: &str, e: url::ParseError| HttpError::InvalidUri {
        value: value.to_string(),
        reason: e.to_string(),
    };

    let mut url = match base {
        Some(base) => {
            let mut base_url = Url::parse(base).map_err(|e| invalid(base, e))?;
            if !base_url.path().ends_with('/') {
                let path = format!("{}/", base_url.path());
                base_url.set_path(&path);
            }
            base_url
                .join(location.trim_start_matches('/'))
                .map_err(|e| invalid(location, e))?
        }
        None => Url::parse(location).map_err(|e| invalid(location, e))?,
    };

    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in query {
            pairs.append_pair(name, value);
        }
    }
    Ok(url)
}

/// `content_type` with any caller-supplied `boundary` parameter replaced by
/// the one the body was framed with.
fn with_boundary(content_type: &str, boundary: &str) -> String {
    let mut segments: Vec<&str> = content_type
        .split(';')
        .map(str::trim)
        .filter(|segment| {
            let name = segment.split('=').next().unwrap_or_default().trim();
            !segment.is_empty() && !name.eq_ignore_ascii_case("boundary")
        })
        .collect();
    let param = format!("boundary={boundary}");
    segments.push(&param);
    segments.join("; ")
}

/// Value of the `Authorization` header.
pub fn authorization_value(auth: &Authorization) -> String {
    match auth {
        Authorization::Basic { username, password } => {
            format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
        }
        Authorization::Bearer { token } => format!("Bearer {token}"),
        Authorization::Raw(raw) => raw.clone(),
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::try_from(value).map_err(|_| HttpError::InvalidHeader {
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Body, BodyPart};
    use crate::http::HttpMethod;
    use crate::types::Timeout;
    use serde_json::json;
    use std::time::Duration;

    fn build(ctx: RequestContext) -> BuiltRequest {
        build_request(ctx).unwrap()
    }

    #[test]
    fn base_location_and_query_combine() {
        let url = resolve_uri(
            Some("http://x/a"),
            "b",
            &[("q".to_string(), "1".to_string())],
        )
        .unwrap();
        assert_eq!(url.as_str(), "http://x/a/b?q=1");
    }

    #[test]
    fn base_with_trailing_slash_and_leading_slash_location() {
        let url = resolve_uri(Some("http://x/a/"), "/b/c", &[]).unwrap();
        assert_eq!(url.as_str(), "http://x/a/b/c");
    }

    #[test]
    fn absolute_location_replaces_base() {
        let url = resolve_uri(Some("http://x/a"), "https://y/z", &[]).unwrap();
        assert_eq!(url.as_str(), "https://y/z");
    }

    #[test]
    fn query_is_appended_to_existing_query() {
        let url = resolve_uri(None, "http://x/p?a=1", &[("b".into(), "two words".into())]).unwrap();
        assert_eq!(url.as_str(), "http://x/p?a=1&b=two+words");
    }

    #[test]
    fn relative_location_without_base_is_invalid() {
        let err = build_request(RequestContext::get("/only/a/path")).unwrap_err();
        assert!(matches!(err, HttpError::InvalidUri { .. }));
    }

    #[test]
    fn missing_method_or_location_fails() {
        let ctx = RequestContext {
            location: Some("http://x".into()),
            ..RequestContext::default()
        };
        assert!(matches!(
            build_request(ctx),
            Err(HttpError::MissingField("method"))
        ));
        let ctx = RequestContext {
            method: Some(HttpMethod::Get),
            ..RequestContext::default()
        };
        assert!(matches!(
            build_request(ctx),
            Err(HttpError::MissingField("location"))
        ));
    }

    #[test]
    fn defaults_content_type_and_accept_to_json() {
        let built = build(RequestContext::get("http://x/"));
        assert_eq!(built.header("content-type"), Some("application/json"));
        assert_eq!(built.header("accept"), Some("application/json"));
        assert_eq!(*built.request.method(), http::Method::GET);
        assert!(built.header("authorization").is_none());
        assert!(built.header("accept-language").is_none());
        assert!(built.header("x-api-key").is_none());
        assert!(built.header("content-length").is_none());
        assert!(built.timeout.is_none());
    }

    #[test]
    fn optional_headers_are_set_when_present() {
        let built = build(
            RequestContext::get("http://x/")
                .accept("text")
                .accept_language("de-CH")
                .api_key("k")
                .header("X-Custom", "c"),
        );
        assert_eq!(built.header("accept"), Some("text/plain"));
        assert_eq!(built.header("accept-language"), Some("de-CH"));
        assert_eq!(built.header("x-api-key"), Some("k"));
        assert_eq!(built.header("x-custom"), Some("c"));
    }

    #[test]
    fn custom_headers_override_defaults() {
        let built = build(RequestContext::get("http://x/").header("Accept", "*/*"));
        assert_eq!(built.header("accept"), Some("*/*"));
    }

    #[test]
    fn authorization_formats() {
        let basic = Authorization::Basic {
            username: "user".into(),
            password: "pass".into(),
        };
        assert_eq!(authorization_value(&basic), "Basic dXNlcjpwYXNz");
        let bearer = Authorization::Bearer { token: "t0k".into() };
        assert_eq!(authorization_value(&bearer), "Bearer t0k");
        assert_eq!(authorization_value(&Authorization::Raw("X y".into())), "X y");

        let built = build(RequestContext::get("http://x/").basic_auth("user", "pass"));
        assert_eq!(built.header("authorization"), Some("Basic dXNlcjpwYXNz"));
    }

    #[test]
    fn invalid_version_fails_before_body_encoding() {
        let ctx = RequestContext::post("http://x/")
            .version("3.0")
            .body(Body::file("/does/not/exist"));
        assert!(matches!(
            build_request(ctx),
            Err(HttpError::InvalidHttpVersion(v)) if v == "3.0"
        ));
    }

    #[test]
    fn version_and_timeout_are_applied() {
        let built = build(
            RequestContext::get("http://x/")
                .version("2.0")
                .timeout(Timeout::Millis(1200)),
        );
        assert_eq!(built.request.version(), http::Version::HTTP_2);
        assert_eq!(built.timeout, Some(Duration::from_millis(1200)));
    }

    #[test]
    fn negative_timeout_fails() {
        let err = build_request(RequestContext::get("http://x/").timeout(-5i64)).unwrap_err();
        assert!(matches!(err, HttpError::InvalidTimeoutType(v) if v == "-5"));
    }

    #[test]
    fn bad_content_type_and_accept_fail() {
        let err =
            build_request(RequestContext::get("http://x/").content_type("no good")).unwrap_err();
        assert!(matches!(err, HttpError::InvalidContentType(_)));
        let err = build_request(RequestContext::get("http://x/").accept("no good")).unwrap_err();
        assert!(matches!(err, HttpError::InvalidAcceptType(_)));
    }

    #[test]
    fn json_body_sets_content_length() {
        let built = build(RequestContext::post("http://x/").body(json!({"a": 1})));
        assert_eq!(built.header("content-length"), Some("7"));
        let body = built.request.into_body().into_bytes().unwrap();
        assert_eq!(body, br#"{"a":1}"#);
    }

    #[test]
    fn multipart_header_carries_the_stream_boundary() {
        let built = build(
            RequestContext::post("http://x/upload")
                .content_type("multipart")
                .body(vec![BodyPart::text("field", "value")]),
        );
        let header = built.header("content-type").unwrap().to_string();
        let boundary = header
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap()
            .to_string();
        assert!(built.header("content-length").is_none());
        let body = String::from_utf8(built.request.into_body().into_bytes().unwrap()).unwrap();
        assert_eq!(
            body,
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"field\"\r\n\r\nvalue\r\n--{boundary}--"
            )
        );
    }

    #[test]
    fn caller_boundary_is_replaced_by_the_framing_boundary() {
        let built = build(
            RequestContext::post("http://x/upload")
                .content_type("multipart/form-data; boundary=callerchosen; charset=utf-8")
                .body(vec![BodyPart::text("a", "1")]),
        );
        let header = built.header("content-type").unwrap().to_string();
        assert_eq!(header.matches("boundary=").count(), 1);
        let boundary = header
            .strip_prefix("multipart/form-data; charset=utf-8; boundary=")
            .unwrap()
            .to_string();
        assert_ne!(boundary, "callerchosen");

        let body = String::from_utf8(built.request.into_body().into_bytes().unwrap()).unwrap();
        assert!(body.starts_with(&format!("--{boundary}\r\n")));
        assert!(body.ends_with(&format!("\r\n--{boundary}--")));
    }

    #[test]
    fn with_boundary_drops_any_existing_boundary() {
        assert_eq!(with_boundary("multipart/form-data", "b1"), "multipart/form-data; boundary=b1");
        assert_eq!(
            with_boundary("multipart/mixed;BOUNDARY=\"old\";", "b2"),
            "multipart/mixed; boundary=b2"
        );
    }

    #[test]
    fn json_string_body_is_sent_as_text() {
        let built = build(
            RequestContext::post("http://x/")
                .content_type("text")
                .body(json!("hi")),
        );
        assert_eq!(built.header("content-length"), Some("2"));
        assert_eq!(built.request.into_body().into_bytes().unwrap(), b"hi");
    }

    #[test]
    fn form_body_is_encoded() {
        let built = build(
            RequestContext::post("http://x/")
                .content_type("form")
                .body(json!({"a": "1", "b": "x y"})),
        );
        assert_eq!(
            built.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
        let body = built.request.into_body().into_bytes().unwrap();
        assert_eq!(body, b"a=1&b=x%20y");
    }
}
