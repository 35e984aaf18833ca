//! Content-type registry: canonical MIME strings, shorthands and validators.

use std::fmt;
use std::str::FromStr;

use mime_guess::mime::{self, Mime};

use crate::error::{HttpError, Result};

/// Canonical MIME strings for the shorthands.
pub mod mimes {
    pub const JSON: &str = "application/json";
    pub const EDN: &str = "application/edn";
    pub const TEXT: &str = "text/plain";
    pub const MULTIPART: &str = "multipart/form-data";
    pub const FORM: &str = "application/x-www-form-urlencoded";
}

/// A content type or accept value: one of the shorthands, or a raw MIME string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    Json,
    Edn,
    Text,
    Multipart,
    Form,
    Mime(String),
}

impl ContentType {
    /// The MIME string sent on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Json => mimes::JSON,
            ContentType::Edn => mimes::EDN,
            ContentType::Text => mimes::TEXT,
            ContentType::Multipart => mimes::MULTIPART,
            ContentType::Form => mimes::FORM,
            ContentType::Mime(s) => s,
        }
    }

    /// Classify by media type essence, so parameters and `+json` suffixes
    /// land on the same serializer as the bare type.
    pub fn serialization(&self) -> Option<Serialization> {
        let parsed: Mime = self.as_str().parse().ok()?;
        let application = parsed.type_() == mime::APPLICATION;
        let subtype = parsed.subtype();
        let json_suffix = parsed.suffix().map(|s| s == mime::JSON).unwrap_or(false);
        if (application && subtype == mime::JSON) || json_suffix {
            Some(Serialization::Json)
        } else if application && subtype == mime::WWW_FORM_URLENCODED {
            Some(Serialization::Form)
        } else if parsed.type_() == mime::MULTIPART {
            Some(Serialization::Multipart)
        } else if application && subtype.as_str() == "edn" {
            Some(Serialization::Edn)
        } else {
            None
        }
    }
}

/// How a structured body is turned into bytes for a given content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Serialization {
    Json,
    Edn,
    Multipart,
    Form,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ContentType {
    fn from(s: &str) -> Self {
        match s {
            "json" | mimes::JSON => ContentType::Json,
            "edn" | mimes::EDN => ContentType::Edn,
            "text" | mimes::TEXT => ContentType::Text,
            "multipart" | mimes::MULTIPART => ContentType::Multipart,
            "form" | mimes::FORM => ContentType::Form,
            other => ContentType::Mime(other.to_string()),
        }
    }
}

impl From<String> for ContentType {
    fn from(s: String) -> Self {
        ContentType::from(s.as_str())
    }
}

impl FromStr for ContentType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(ContentType::from(s))
    }
}

/// Check that `value` is a single media type and return it unchanged.
pub fn validate_content_type(value: &str) -> Result<String> {
    match value.parse::<Mime>() {
        Ok(_) => Ok(value.to_string()),
        Err(_) => Err(HttpError::InvalidContentType(value.to_string())),
    }
}

/// Check that `value` is a comma-separated list of media ranges.
pub fn validate_accept(value: &str) -> Result<String> {
    let valid = !value.trim().is_empty()
        && value
            .split(',')
            .all(|range| range.trim().parse::<Mime>().is_ok());
    if valid {
        Ok(value.to_string())
    } else {
        Err(HttpError::InvalidAcceptType(value.to_string()))
    }
}
