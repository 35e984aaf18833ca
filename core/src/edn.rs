//! EDN values, printer and incremental reader.
//!
//! # Design
//! EDN allows any number of top-level values back to back in one stream, so
//! the reader pulls one value at a time from a character source and reports
//! end of input separately from "no more forms in this collection". The
//! character source is a one-slot pushback reader: after a token ends on a
//! delimiter the delimiter is pushed back so the next read sees it.
//!
//! Bytes are decoded as UTF-8 one character at a time, so nothing past the
//! current value is buffered beyond the underlying `BufReader`.

use std::fmt;
use std::io::{self, BufReader, Read};

/// An EDN value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Char(char),
    Symbol(String),
    Keyword(String),
    List(Vec<Value>),
    Vector(Vec<Value>),
    /// Entries in read order.
    Map(Vec<(Value, Value)>),
    Set(Vec<Value>),
    Tagged(String, Box<Value>),
}

impl Value {
    /// A keyword, given without the leading colon.
    pub fn keyword(name: impl Into<String>) -> Self {
        Value::Keyword(name.into())
    }

    /// Look up a map entry by key.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

/// Errors from the EDN reader.
#[derive(Debug, thiserror::Error)]
pub enum EdnError {
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("unexpected character {0:?}")]
    Unexpected(char),

    #[error("invalid number {0:?}")]
    InvalidNumber(String),

    #[error("invalid string escape {0:?}")]
    InvalidEscape(String),

    #[error("invalid character literal {0:?}")]
    InvalidCharacter(String),

    #[error("map literal has an odd number of forms")]
    OddMap,

    #[error("input is not valid UTF-8")]
    InvalidUtf8,

    #[error("nesting deeper than {0} levels")]
    DepthLimitExceeded(usize),
}

// ---------------------------------------------------------------------------
// Printer
// ---------------------------------------------------------------------------

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) if x.is_nan() => f.write_str("##NaN"),
            Value::Float(x) if x.is_infinite() => {
                f.write_str(if *x > 0.0 { "##Inf" } else { "##-Inf" })
            }
            Value::Float(x) => write!(f, "{x:?}"),
            Value::String(s) => write_string(f, s),
            Value::Char(c) => match c {
                '\n' => f.write_str("\\newline"),
                ' ' => f.write_str("\\space"),
                '\t' => f.write_str("\\tab"),
                '\r' => f.write_str("\\return"),
                c => write!(f, "\\{c}"),
            },
            Value::Symbol(s) => f.write_str(s),
            Value::Keyword(k) => write!(f, ":{k}"),
            Value::List(items) => write_seq(f, "(", items, ")"),
            Value::Vector(items) => write_seq(f, "[", items, "]"),
            Value::Set(items) => write_seq(f, "#{", items, "}"),
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k} {v}")?;
                }
                f.write_str("}")
            }
            Value::Tagged(tag, value) => write!(f, "#{tag} {value}"),
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(close)
}

fn write_string(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Vector(items.iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (Value::String(k.clone()), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// A character source with room to push one character back.
pub struct PushbackReader<R> {
    inner: BufReader<R>,
    pushed: Option<char>,
}

impl<R: Read> PushbackReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            pushed: None,
        }
    }

    /// Next character, or `None` at end of input.
    pub fn next_char(&mut self) -> Result<Option<char>, EdnError> {
        if let Some(c) = self.pushed.take() {
            return Ok(Some(c));
        }
        let Some(first) = self.read_byte()? else {
            return Ok(None);
        };
        let width = utf8_width(first);
        if width == 0 {
            return Err(EdnError::InvalidUtf8);
        }
        let mut buf = [first, 0, 0, 0];
        for slot in buf.iter_mut().take(width).skip(1) {
            *slot = self.read_byte()?.ok_or(EdnError::InvalidUtf8)?;
        }
        let s = std::str::from_utf8(&buf[..width]).map_err(|_| EdnError::InvalidUtf8)?;
        Ok(s.chars().next())
    }

    /// Push `c` back; the next `next_char` returns it.
    pub fn unread(&mut self, c: char) {
        self.pushed = Some(c);
    }

    pub fn peek(&mut self) -> Result<Option<char>, EdnError> {
        let c = self.next_char()?;
        if let Some(c) = c {
            self.unread(c);
        }
        Ok(c)
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

fn utf8_width(first: u8) -> usize {
    match first {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

fn is_whitespace(c: char) -> bool {
    c.is_whitespace() || c == ','
}

fn is_delimiter(c: char) -> bool {
    is_whitespace(c) || matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | '"' | ';')
}

/// Outcome of dispatching on one leading character.
enum Form {
    Value(Value),
    Discarded,
    Close(char),
}

/// Deepest collection, tag or discard nesting the reader accepts.
pub const MAX_DEPTH: usize = 128;

/// Reads consecutive EDN values from a byte stream.
pub struct EdnReader<R> {
    input: PushbackReader<R>,
    depth: usize,
}

impl<R: Read> EdnReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: PushbackReader::new(input),
            depth: 0,
        }
    }

    /// Read the next top-level value; `None` once the input is exhausted.
    pub fn read(&mut self) -> Result<Option<Value>, EdnError> {
        loop {
            let Some(c) = self.skip_whitespace()? else {
                return Ok(None);
            };
            match self.dispatch(c)? {
                Form::Value(v) => return Ok(Some(v)),
                Form::Discarded => continue,
                Form::Close(c) => return Err(EdnError::Unexpected(c)),
            }
        }
    }

    /// Read the next top-level value, yielding a clone of `eof` at end of input.
    pub fn read_or(&mut self, eof: &Value) -> Result<Value, EdnError> {
        Ok(self.read()?.unwrap_or_else(|| eof.clone()))
    }

    fn skip_whitespace(&mut self) -> Result<Option<char>, EdnError> {
        loop {
            match self.input.next_char()? {
                None => return Ok(None),
                Some(';') => {
                    while let Some(c) = self.input.next_char()? {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some(c) if is_whitespace(c) => {}
                Some(c) => return Ok(Some(c)),
            }
        }
    }

    fn read_required(&mut self) -> Result<Value, EdnError> {
        loop {
            let c = self.skip_whitespace()?.ok_or(EdnError::UnexpectedEof)?;
            match self.dispatch(c)? {
                Form::Value(v) => return Ok(v),
                Form::Discarded => continue,
                Form::Close(c) => return Err(EdnError::Unexpected(c)),
            }
        }
    }

    fn dispatch(&mut self, c: char) -> Result<Form, EdnError> {
        let value = match c {
            '(' => Value::List(self.nested(|r| r.read_seq(')'))?),
            '[' => Value::Vector(self.nested(|r| r.read_seq(']'))?),
            '{' => self.nested(Self::read_map)?,
            ')' | ']' | '}' => return Ok(Form::Close(c)),
            '"' => Value::String(self.read_string()?),
            '\\' => Value::Char(self.read_char()?),
            ':' => {
                let name = self.read_token(None)?;
                if name.is_empty() {
                    return Err(EdnError::Unexpected(':'));
                }
                Value::Keyword(name)
            }
            '#' => return self.dispatch_hash(),
            c if c.is_ascii_digit() => parse_number(&self.read_token(Some(c))?)?,
            '+' | '-' => match self.input.peek()? {
                Some(next) if next.is_ascii_digit() => parse_number(&self.read_token(Some(c))?)?,
                _ => parse_symbol(self.read_token(Some(c))?),
            },
            c => parse_symbol(self.read_token(Some(c))?),
        };
        Ok(Form::Value(value))
    }

    fn dispatch_hash(&mut self) -> Result<Form, EdnError> {
        match self.input.next_char()? {
            None => Err(EdnError::UnexpectedEof),
            Some('{') => Ok(Form::Value(Value::Set(self.nested(|r| r.read_seq('}'))?))),
            Some('_') => {
                self.nested(Self::read_required)?;
                Ok(Form::Discarded)
            }
            Some('#') => {
                let token = self.read_token(None)?;
                match token.as_str() {
                    "Inf" => Ok(Form::Value(Value::Float(f64::INFINITY))),
                    "-Inf" => Ok(Form::Value(Value::Float(f64::NEG_INFINITY))),
                    "NaN" => Ok(Form::Value(Value::Float(f64::NAN))),
                    _ => Err(EdnError::InvalidNumber(format!("##{token}"))),
                }
            }
            Some(c) if c.is_alphabetic() => {
                let tag = self.read_token(Some(c))?;
                let value = self.nested(Self::read_required)?;
                Ok(Form::Value(Value::Tagged(tag, Box::new(value))))
            }
            Some(c) => Err(EdnError::Unexpected(c)),
        }
    }

    /// Run `read` one level deeper, failing instead of recursing past `MAX_DEPTH`.
    fn nested<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> Result<T, EdnError>,
    ) -> Result<T, EdnError> {
        if self.depth >= MAX_DEPTH {
            return Err(EdnError::DepthLimitExceeded(MAX_DEPTH));
        }
        self.depth += 1;
        let result = read(self);
        self.depth -= 1;
        result
    }

    fn read_seq(&mut self, close: char) -> Result<Vec<Value>, EdnError> {
        let mut items = Vec::new();
        loop {
            let c = self.skip_whitespace()?.ok_or(EdnError::UnexpectedEof)?;
            match self.dispatch(c)? {
                Form::Close(found) if found == close => return Ok(items),
                Form::Close(found) => return Err(EdnError::Unexpected(found)),
                Form::Value(v) => items.push(v),
                Form::Discarded => {}
            }
        }
    }

    fn read_map(&mut self) -> Result<Value, EdnError> {
        let items = self.read_seq('}')?;
        if items.len() % 2 != 0 {
            return Err(EdnError::OddMap);
        }
        let mut entries = Vec::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
            entries.push((k, v));
        }
        Ok(Value::Map(entries))
    }

    fn read_token(&mut self, first: Option<char>) -> Result<String, EdnError> {
        let mut token = String::new();
        if let Some(c) = first {
            token.push(c);
        }
        while let Some(c) = self.input.next_char()? {
            if is_delimiter(c) {
                self.input.unread(c);
                break;
            }
            token.push(c);
        }
        Ok(token)
    }

    fn read_string(&mut self) -> Result<String, EdnError> {
        let mut out = String::new();
        loop {
            match self.input.next_char()?.ok_or(EdnError::UnexpectedEof)? {
                '"' => return Ok(out),
                '\\' => {
                    let escaped = self.input.next_char()?.ok_or(EdnError::UnexpectedEof)?;
                    out.push(match escaped {
                        't' => '\t',
                        'r' => '\r',
                        'n' => '\n',
                        'b' => '\u{8}',
                        'f' => '\u{c}',
                        '\\' => '\\',
                        '"' => '"',
                        'u' => {
                            let mut hex = String::with_capacity(4);
                            for _ in 0..4 {
                                hex.push(self.input.next_char()?.ok_or(EdnError::UnexpectedEof)?);
                            }
                            unicode_escape(&hex)
                                .ok_or_else(|| EdnError::InvalidEscape(format!("\\u{hex}")))?
                        }
                        other => return Err(EdnError::InvalidEscape(format!("\\{other}"))),
                    });
                }
                c => out.push(c),
            }
        }
    }

    fn read_char(&mut self) -> Result<char, EdnError> {
        let first = self.input.next_char()?.ok_or(EdnError::UnexpectedEof)?;
        if !first.is_alphanumeric() {
            return Ok(first);
        }
        let token = self.read_token(Some(first))?;
        let mut chars = token.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Ok(c);
        }
        match token.as_str() {
            "newline" => Ok('\n'),
            "space" => Ok(' '),
            "tab" => Ok('\t'),
            "return" => Ok('\r'),
            "backspace" => Ok('\u{8}'),
            "formfeed" => Ok('\u{c}'),
            t if t.len() == 5 && t.starts_with('u') => {
                unicode_escape(&t[1..]).ok_or_else(|| EdnError::InvalidCharacter(token.clone()))
            }
            _ => Err(EdnError::InvalidCharacter(token)),
        }
    }
}

fn unicode_escape(hex: &str) -> Option<char> {
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

fn parse_number(token: &str) -> Result<Value, EdnError> {
    let invalid = || EdnError::InvalidNumber(token.to_string());
    if let Some(int) = token.strip_suffix('N') {
        return int.parse().map(Value::Integer).map_err(|_| invalid());
    }
    if let Some(dec) = token.strip_suffix('M') {
        return dec.parse().map(Value::Float).map_err(|_| invalid());
    }
    if token.contains(['.', 'e', 'E']) {
        return token.parse().map(Value::Float).map_err(|_| invalid());
    }
    token.parse().map(Value::Integer).map_err(|_| invalid())
}

fn parse_symbol(token: String) -> Value {
    match token.as_str() {
        "nil" => Value::Nil,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::Symbol(token),
    }
}

/// Read every value in `input`.
pub fn read_all(input: &str) -> Result<Vec<Value>, EdnError> {
    let mut reader = EdnReader::new(input.as_bytes());
    let mut values = Vec::new();
    while let Some(v) = reader.read()? {
        values.push(v);
    }
    Ok(values)
}
