use crate::http::types::status_text;
use std::{error, fmt, io};

/// Protocol-level failure of one HTTP transaction.
///
/// Every variant except `Io` maps to a canned, self-closing error response;
/// `Io` is a transport failure and never reaches the wire.
#[derive(Debug, PartialEq)]
pub(crate) enum ErrorKind {
    BadRequestLine,
    UnknownMethod,
    UnsupportedVersion,
    BadHeader,
    MissingHost,

    InvalidContentLength,
    BodyMismatch,
    InvalidChunkSize,

    BodyTooLarge,
    HeadTooLarge,

    NoRoute,
    Handler,

    Io(IoError),
}

impl ErrorKind {
    pub(crate) const fn status(&self) -> u16 {
        match self {
            ErrorKind::BadRequestLine
            | ErrorKind::UnknownMethod
            | ErrorKind::UnsupportedVersion
            | ErrorKind::BadHeader
            | ErrorKind::MissingHost
            | ErrorKind::InvalidContentLength
            | ErrorKind::BodyMismatch
            | ErrorKind::InvalidChunkSize => 400,
            ErrorKind::BodyTooLarge => 413,
            ErrorKind::HeadTooLarge => 431,
            ErrorKind::NoRoute => 404,
            ErrorKind::Handler | ErrorKind::Io(_) => 500,
        }
    }

    /// Full wire response for this error: a self-contained HTML page with
    /// `Connection: close`. 404 keeps its fixed literal page.
    pub(crate) fn to_response(&self) -> Vec<u8> {
        match self {
            ErrorKind::NoRoute => not_found_page(),
            kind => error_page(kind.status()),
        }
    }
}

const NOT_FOUND_BODY: &str = "<html><body><h1>404 Not Found</h1></body></html>";

fn not_found_page() -> Vec<u8> {
    format!(
        "HTTP/1.1 404 Not Found\r\n\
         Content-Type: text/html\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n\
         {}",
        NOT_FOUND_BODY.len(),
        NOT_FOUND_BODY,
    )
    .into_bytes()
}

fn error_page(status: u16) -> Vec<u8> {
    let body = format!(
        "<html><body><h1>Error {status}</h1>\
         <p>An error occurred while processing your request.</p></body></html>"
    );

    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: text/html\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n\
         {}",
        status,
        status_text(status),
        body.len(),
        body,
    )
    .into_bytes()
}

impl error::Error for ErrorKind {}
impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        ErrorKind::Io(IoError(err))
    }
}

#[derive(Debug)]
pub(crate) struct IoError(pub(crate) io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ErrorKind::BadRequestLine.status(), 400);
        assert_eq!(ErrorKind::MissingHost.status(), 400);
        assert_eq!(ErrorKind::InvalidChunkSize.status(), 400);
        assert_eq!(ErrorKind::BodyTooLarge.status(), 413);
        assert_eq!(ErrorKind::HeadTooLarge.status(), 431);
        assert_eq!(ErrorKind::NoRoute.status(), 404);
        assert_eq!(ErrorKind::Handler.status(), 500);
    }

    #[test]
    fn not_found_uses_fixed_page() {
        let wire = String::from_utf8(ErrorKind::NoRoute.to_response()).unwrap();

        assert!(wire.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(wire.contains("Connection: close\r\n"));
        assert!(wire.contains(&format!("Content-Length: {}\r\n", NOT_FOUND_BODY.len())));
        assert!(wire.ends_with(NOT_FOUND_BODY));
    }

    #[test]
    fn generic_page_carries_status_and_close() {
        let wire = String::from_utf8(ErrorKind::BodyTooLarge.to_response()).unwrap();

        assert!(wire.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
        assert!(wire.contains("Connection: close\r\n"));
        assert!(wire.contains("<h1>Error 413</h1>"));

        // declared length matches the actual body
        let (head, body) = wire.split_once("\r\n\r\n").unwrap();
        let declared: usize = head
            .lines()
            .find_map(|l| l.strip_prefix("Content-Length: "))
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(declared, body.len());
    }
}
