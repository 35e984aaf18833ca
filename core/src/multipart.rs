//! Lazy multipart/form-data composition.
//!
//! # Design
//! Each part is a small header block followed by its content. The composed
//! stream keeps the parts in a queue and only turns the next one into a
//! reader once the previous one is exhausted, so a file part is opened when
//! the transport reaches it and read through in chunks. Header blocks are
//! rendered up front; they are small and rendering them eagerly means every
//! build-time error (missing name, non-file URI) surfaces before any I/O.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::body::{BodyPart, PartContent};
use crate::error::{HttpError, Result};

/// A fresh boundary token for one request.
pub fn generate_boundary() -> String {
    Uuid::new_v4().simple().to_string()
}

enum Source {
    Path(PathBuf),
    Reader(Box<dyn Read + Send>),
}

struct PreparedPart {
    header: Vec<u8>,
    source: Source,
}

/// One byte stream over all parts, framed with `boundary`.
pub struct MultipartStream {
    boundary: String,
    pending: VecDeque<PreparedPart>,
    current: Option<Box<dyn Read + Send>>,
    trailer_sent: bool,
}

impl MultipartStream {
    pub fn new(parts: Vec<BodyPart>, boundary: impl Into<String>) -> Result<Self> {
        let boundary = boundary.into();
        let pending = parts
            .into_iter()
            .enumerate()
            .map(|(i, part)| prepare(part, &boundary, i == 0))
            .collect::<Result<VecDeque<_>>>()?;
        Ok(Self {
            boundary,
            pending,
            current: None,
            trailer_sent: false,
        })
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Move to the next sub-stream; `false` once the trailer has been handed out.
    fn advance(&mut self) -> io::Result<bool> {
        if let Some(part) = self.pending.pop_front() {
            let content: Box<dyn Read + Send> = match part.source {
                Source::Reader(reader) => reader,
                Source::Path(path) => {
                    tracing::debug!("Opening multipart file part: {}", path.display());
                    Box::new(File::open(path)?)
                }
            };
            self.current = Some(Box::new(Cursor::new(part.header).chain(content)));
            return Ok(true);
        }
        if !self.trailer_sent {
            self.trailer_sent = true;
            let trailer = format!("\r\n--{}--", self.boundary).into_bytes();
            self.current = Some(Box::new(Cursor::new(trailer)));
            return Ok(true);
        }
        Ok(false)
    }
}

impl Read for MultipartStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if let Some(current) = self.current.as_mut() {
                let n = current.read(buf)?;
                if n > 0 {
                    return Ok(n);
                }
                self.current = None;
            }
            if !self.advance()? {
                return Ok(0);
            }
        }
    }
}

fn prepare(part: BodyPart, boundary: &str, first: bool) -> Result<PreparedPart> {
    if part.name.is_empty() {
        return Err(HttpError::InvalidBodyPart("part name is required".to_string()));
    }

    let (source, file_name, content_type) = match part.content {
        PartContent::File(file) => {
            let path = file.resolve()?;
            let file_name = part.file_name.or_else(|| base_name(&path));
            let content_type = part.content_type.or_else(|| probe_content_type(&path));
            (Source::Path(path), file_name, content_type)
        }
        PartContent::Stream(reader) => (Source::Reader(reader), part.file_name, part.content_type),
        PartContent::Bytes(bytes) => (
            Source::Reader(Box::new(Cursor::new(bytes))),
            part.file_name,
            part.content_type,
        ),
        PartContent::Text(text) => (
            Source::Reader(Box::new(Cursor::new(text.into_bytes()))),
            part.file_name,
            part.content_type,
        ),
    };

    if let Some(content_type) = &content_type {
        if content_type.contains(['\r', '\n']) {
            return Err(HttpError::InvalidBodyPart(format!(
                "content type of part {:?} contains a line break",
                part.name
            )));
        }
    }

    let mut header = String::new();
    if !first {
        header.push_str("\r\n");
    }
    header.push_str(&format!("--{boundary}\r\n"));
    header.push_str(&format!(
        "Content-Disposition: form-data; name=\"{}\"",
        escape_quoted(&part.name)
    ));
    if let Some(file_name) = &file_name {
        header.push_str(&format!("; filename=\"{}\"", escape_quoted(file_name)));
    }
    header.push_str("\r\n");
    if let Some(content_type) = &content_type {
        header.push_str(&format!("Content-Type: {content_type}\r\n"));
    }
    header.push_str("\r\n");

    Ok(PreparedPart {
        header: header.into_bytes(),
        source,
    })
}

/// Percent-escape the characters that would end a quoted parameter or the
/// header line, as browsers do for form-data names.
fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn base_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// Best-effort content type for a file part. A miss means no header.
fn probe_content_type(path: &Path) -> Option<String> {
    let guess = mime_guess::from_path(path).first().map(|m| m.to_string());
    if guess.is_none() {
        tracing::trace!("No content type probed for {}", path.display());
    }
    guess
}
