use crate::{
    errors::ErrorKind,
    http::types::{self, Method, Version},
};
use memchr::{memchr, memmem};
use std::collections::HashMap;

/// A parsed HTTP request.
///
/// Immutable once handed to middleware and handlers, apart from `params`
/// which the router populates on a successful match. Header names are stored
/// lowercased; duplicate headers collapse last-wins (a deliberate departure
/// from RFC 9110 §5.2, kept for simplicity).
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) version: Version,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) params: HashMap<String, String>,
    pub(crate) body: Vec<u8>,
}

impl Request {
    #[inline(always)]
    pub(crate) fn new() -> Self {
        Request {
            method: Method::Get,
            path: String::new(),
            version: Version::Http11,
            headers: HashMap::new(),
            params: HashMap::new(),
            body: Vec::new(),
        }
    }

    #[inline(always)]
    pub(crate) fn reset(&mut self) {
        self.method = Method::Get;
        self.path.clear();
        self.version = Version::Http11;
        self.headers.clear();
        self.params.clear();
        self.body.clear();
    }
}

// Public API
impl Request {
    #[inline(always)]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Origin-form path as received, query string included.
    #[inline(always)]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline(always)]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Header value by name, case-insensitive.
    ///
    /// When a header was repeated, the last value wins.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        if name.bytes().any(|b| b.is_ascii_uppercase()) {
            self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
        } else {
            self.headers.get(name).map(String::as_str)
        }
    }

    /// All headers, keyed by lowercased name.
    #[inline(always)]
    pub const fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Path parameter captured by the matched route pattern.
    #[inline(always)]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// All path parameters of the matched route.
    #[inline(always)]
    pub const fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Fully buffered request body.
    #[inline(always)]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

// Head parsing.
//
// The input is exactly the header block up to and including the terminating
// `\r\n\r\n`; body bytes never reach this code.

const CRLF: &[u8] = b"\r\n";

pub(crate) fn parse_head(head: &[u8], req: &mut Request) -> Result<(), ErrorKind> {
    let line_end = memmem::find(head, CRLF).ok_or(ErrorKind::BadRequestLine)?;
    parse_request_line(&head[..line_end], req)?;

    let mut pos = line_end + 2;
    let mut scratch = Vec::new();

    while pos < head.len() {
        let rel = memmem::find(&head[pos..], CRLF).ok_or(ErrorKind::BadHeader)?;
        let line = &head[pos..pos + rel];
        pos += rel + 2;

        if trim(line).is_empty() {
            break;
        }

        parse_header_line(line, &mut scratch, &mut req.headers)?;
    }

    Ok(())
}

/// `<METHOD> <PATH> <VERSION>`: exactly three tokens, single spaces.
fn parse_request_line(line: &[u8], req: &mut Request) -> Result<(), ErrorKind> {
    let mut tokens = line.split(|&b| b == b' ');
    let (Some(method), Some(path), Some(version), None) =
        (tokens.next(), tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(ErrorKind::BadRequestLine);
    };

    if method.is_empty() || path.is_empty() || version.is_empty() {
        return Err(ErrorKind::BadRequestLine);
    }

    req.method = Method::from_token(method).ok_or(ErrorKind::UnknownMethod)?;
    req.path = std::str::from_utf8(path)
        .map_err(|_| ErrorKind::BadRequestLine)?
        .to_owned();
    req.version = Version::from_token(version).ok_or(ErrorKind::UnsupportedVersion)?;

    Ok(())
}

/// One `Name: value` line. Lines without a colon are skipped; the name is
/// lowercased in place through the scratch buffer before insertion.
fn parse_header_line(
    line: &[u8],
    scratch: &mut Vec<u8>,
    headers: &mut HashMap<String, String>,
) -> Result<(), ErrorKind> {
    let Some(colon) = memchr(b':', line) else {
        return Ok(());
    };

    let name = trim(&line[..colon]);
    if name.is_empty() {
        return Err(ErrorKind::BadHeader);
    }

    scratch.clear();
    scratch.extend_from_slice(name);
    types::to_lower_case(scratch);

    let name = std::str::from_utf8(scratch)
        .map_err(|_| ErrorKind::BadHeader)?
        .to_owned();
    let value = std::str::from_utf8(trim(&line[colon + 1..]))
        .map_err(|_| ErrorKind::BadHeader)?
        .to_owned();

    headers.insert(name, value);

    Ok(())
}

/// Strips space, tab, CR and LF from both ends.
fn trim(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        match first {
            b' ' | b'\t' | b'\r' | b'\n' => bytes = rest,
            _ => break,
        }
    }
    while let [rest @ .., last] = bytes {
        match last {
            b' ' | b'\t' | b'\r' | b'\n' => bytes = rest,
            _ => break,
        }
    }
    bytes
}
