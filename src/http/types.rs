//! Core HTTP protocol scalar types and byte utilities

// TO LOWER CASE

#[rustfmt::skip]
const ASCII_TABLE: [u8; 256] = [
    //   x0    x1    x2    x3    x4    x5    x6    x7    x8    x9    xA    xB    xC    xD    xE    xF
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, // 0x
    0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1D, 0x1E, 0x1F, // 1x
    0x20, 0x21, 0x22, 0x23, 0x24, 0x25, 0x26, 0x27, 0x28, 0x29, 0x2A, 0x2B, 0x2C, 0x2D, 0x2E, 0x2F, // 2x
    0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3A, 0x3B, 0x3C, 0x3D, 0x3E, 0x3F, // 3x
    0x40, b'a', b'b', b'c', b'd', b'e', b'f', b'g', b'h', b'i', b'j', b'k', b'l', b'm', b'n', b'o', // 4x
    b'p', b'q', b'r', b's', b't', b'u', b'v', b'w', b'x', b'y', b'z', 0x5B, 0x5C, 0x5D, 0x5E, 0x5F, // 5x
    0x60, b'a', b'b', b'c', b'd', b'e', b'f', b'g', b'h', b'i', b'j', b'k', b'l', b'm', b'n', b'o', // 6x
    b'p', b'q', b'r', b's', b't', b'u', b'v', b'w', b'x', b'y', b'z', 0x7B, 0x7C, 0x7D, 0x7E, 0x7F, // 7x
    0x80, 0x81, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8A, 0x8B, 0x8C, 0x8D, 0x8E, 0x8F, // 8x
    0x90, 0x91, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9A, 0x9B, 0x9C, 0x9D, 0x9E, 0x9F, // 9x
    0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7, 0xA8, 0xA9, 0xAA, 0xAB, 0xAC, 0xAD, 0xAE, 0xAF, // Ax
    0xB0, 0xB1, 0xB2, 0xB3, 0xB4, 0xB5, 0xB6, 0xB7, 0xB8, 0xB9, 0xBA, 0xBB, 0xBC, 0xBD, 0xBE, 0xBF, // Bx
    0xC0, 0xC1, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7, 0xC8, 0xC9, 0xCA, 0xCB, 0xCC, 0xCD, 0xCE, 0xCF, // Cx
    0xD0, 0xD1, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA, 0xDB, 0xDC, 0xDD, 0xDE, 0xDF, // Dx
    0xE0, 0xE1, 0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9, 0xEA, 0xEB, 0xEC, 0xED, 0xEE, 0xEF, // Ex
    0xF0, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8, 0xF9, 0xFA, 0xFB, 0xFC, 0xFD, 0xFE, 0xFF, // Fx
];

#[inline(always)]
pub(crate) fn to_lower_case(src: &mut [u8]) {
    for byte in src.iter_mut() {
        *byte = ASCII_TABLE[*byte as usize];
    }
}

// NUMERIC PARSING

/// Strict unsigned decimal: every byte must be a digit, overflow rejected.
#[inline(always)]
pub(crate) fn slice_to_usize(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() {
        return None;
    }

    let mut result: usize = 0;
    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }

        result = result
            .checked_mul(10)?
            .checked_add((byte - b'0') as usize)?;
    }

    Some(result)
}

/// Hex value of the leading digit run; at least one digit is required.
/// Bytes after the run (chunk extensions) are ignored.
#[inline(always)]
pub(crate) fn hex_prefix_to_usize(bytes: &[u8]) -> Option<usize> {
    let mut result: usize = 0;
    let mut digits = 0;

    for &byte in bytes {
        let value = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            _ => break,
        };

        result = result.checked_mul(16)?.checked_add(value as usize)?;
        digits += 1;
    }

    match digits {
        0 => None,
        _ => Some(result),
    }
}

// METHOD

/// HTTP request methods accepted by the server.
///
/// The surface is deliberately small: `TRACE`, `CONNECT`, `HEAD`, `PATCH` and
/// `OPTIONS` are rejected at the parser with `400 Bad Request`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET method - transfer a current representation of the target resource
    Get,
    /// POST method - perform resource-specific processing on the request payload
    Post,
    /// PUT method - replace all current representations of the target resource
    Put,
    /// DELETE method - remove all current representations of the target resource
    Delete,
}

impl Method {
    #[inline(always)]
    pub(crate) fn from_token(src: &[u8]) -> Option<Self> {
        match src {
            b"GET" => Some(Method::Get),
            b"POST" => Some(Method::Post),
            b"PUT" => Some(Method::Put),
            b"DELETE" => Some(Method::Delete),
            _ => None,
        }
    }

    /// Canonical upper-case token.
    #[inline(always)]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Index into the per-method route tables.
    #[inline(always)]
    pub(crate) const fn index(&self) -> usize {
        match self {
            Method::Get => 0,
            Method::Post => 1,
            Method::Put => 2,
            Method::Delete => 3,
        }
    }
}

// VERSION

/// HTTP protocol version of a parsed request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    /// HTTP/1.0 - closes after each transaction unless keep-alive is requested
    Http10,
    /// HTTP/1.1 - persistent connections by default
    Http11,
}

impl Version {
    #[inline(always)]
    pub(crate) const fn from_token(src: &[u8]) -> Option<Self> {
        match src {
            b"HTTP/1.1" => Some(Self::Http11),
            b"HTTP/1.0" => Some(Self::Http10),
            _ => None,
        }
    }

    /// Wire form, e.g. `HTTP/1.1`.
    #[inline(always)]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }

    /// Keep-alive default before any `connection` header is considered.
    #[inline(always)]
    pub(crate) const fn keep_alive_default(&self) -> bool {
        matches!(self, Version::Http11)
    }
}

// STATUS TEXT

/// Reason phrase for a status code, `"Unknown"` when the code is not mapped.
pub(crate) const fn status_text(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        505 => "HTTP Version Not Supported",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_case_table() {
        let mut bytes = *b"Content-TYPE: x\r\n";
        to_lower_case(&mut bytes);
        assert_eq!(&bytes, b"content-type: x\r\n");
    }

    #[test]
    fn decimal_parsing() {
        #[rustfmt::skip]
        let cases: [(&[u8], Option<usize>); 8] = [
            (b"0",       Some(0)),
            (b"17",      Some(17)),
            (b"1048576", Some(1_048_576)),

            (b"",        None),
            (b"12a",     None),
            (b"-3",      None),
            (b"1.5",     None),
            (b"99999999999999999999999", None),
        ];

        for (input, expected) in cases {
            assert_eq!(slice_to_usize(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn hex_parsing() {
        #[rustfmt::skip]
        let cases: [(&[u8], Option<usize>); 8] = [
            (b"0",         Some(0)),
            (b"5",         Some(5)),
            (b"1a",        Some(26)),
            (b"FF",        Some(255)),
            (b"5;ext=1",   Some(5)),

            (b"",          None),
            (b"xyz",       None),
            (b";5",        None),
        ];

        for (input, expected) in cases {
            assert_eq!(hex_prefix_to_usize(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn method_tokens() {
        assert_eq!(Method::from_token(b"GET"), Some(Method::Get));
        assert_eq!(Method::from_token(b"POST"), Some(Method::Post));
        assert_eq!(Method::from_token(b"PUT"), Some(Method::Put));
        assert_eq!(Method::from_token(b"DELETE"), Some(Method::Delete));

        assert_eq!(Method::from_token(b"HEAD"), None);
        assert_eq!(Method::from_token(b"get"), None);
        assert_eq!(Method::from_token(b""), None);
    }

    #[test]
    fn version_tokens() {
        assert_eq!(Version::from_token(b"HTTP/1.1"), Some(Version::Http11));
        assert_eq!(Version::from_token(b"HTTP/1.0"), Some(Version::Http10));
        assert_eq!(Version::from_token(b"HTTP/2.0"), None);
        assert_eq!(Version::from_token(b"http/1.1"), None);

        assert!(Version::Http11.keep_alive_default());
        assert!(!Version::Http10.keep_alive_default());
    }

    #[test]
    fn reason_phrases() {
        assert_eq!(status_text(200), "OK");
        assert_eq!(status_text(404), "Not Found");
        assert_eq!(status_text(413), "Payload Too Large");
        assert_eq!(status_text(599), "Unknown");
        assert_eq!(status_text(218), "Unknown");
    }
}
