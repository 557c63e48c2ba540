//! HTTP response builder and wire serializer

use crate::http::types::{self, Version};
use std::io::Write;

/// An HTTP response under construction.
///
/// Handlers and middleware mutate the response freely; once the connection
/// enters its write phase the content is frozen and serialized.
///
/// `Content-Length` and `Connection` are emitted by the server - do not set
/// them as user headers.
///
/// # Examples
/// ```
/// use ember_web::Response;
///
/// let mut res = Response::new();
/// res.status(201)
///     .set_header("Content-Type", "application/json");
/// res.send(r#"{"created":true}"#);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub(crate) status: u16,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Vec<u8>,
}

impl Response {
    #[inline(always)]
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    #[inline(always)]
    pub(crate) fn reset(&mut self) {
        self.status = 200;
        self.headers.clear();
        self.body.clear();
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

// Public API
impl Response {
    /// Sets the status code (default 200).
    #[inline]
    pub fn status(&mut self, code: u16) -> &mut Self {
        self.status = code;
        self
    }

    /// Current status code.
    #[inline(always)]
    pub const fn status_code(&self) -> u16 {
        self.status
    }

    /// Sets a header, preserving the casing as supplied.
    ///
    /// Headers are written in first-insertion order; setting the same name
    /// again replaces the value in place.
    #[inline]
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();

        match self.headers.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    /// Header value by exact name, as previously supplied.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets the response body.
    #[inline]
    pub fn send(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    /// Sets a JSON body together with its `Content-Type`.
    #[inline]
    pub fn send_json(&mut self, json: impl Into<Vec<u8>>) {
        self.set_header("Content-Type", "application/json");
        self.body = json.into();
    }

    /// Current body bytes.
    #[inline(always)]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

// Serialization
impl Response {
    /// Serializes the response into `out`: status line, `Content-Length`,
    /// `Connection`, user headers in insertion order, blank line, body.
    pub(crate) fn write_to(&self, out: &mut Vec<u8>, version: Version, keep_alive: bool) {
        // Write on Vec<u8> is infallible.
        let _ = write!(
            out,
            "{} {} {}\r\n",
            version.as_str(),
            self.status,
            types::status_text(self.status)
        );
        let _ = write!(out, "Content-Length: {}\r\n", self.body.len());
        let _ = write!(
            out,
            "Connection: {}\r\n",
            if keep_alive { "keep-alive" } else { "close" }
        );

        for (name, value) in &self.headers {
            let _ = write!(out, "{name}: {value}\r\n");
        }

        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
    }
}
