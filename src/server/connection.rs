//! Per-socket HTTP/1.x state machine
//!
//! Each connection runs one transaction at a time: read the header block,
//! optionally acknowledge `Expect: 100-continue`, buffer the body
//! (Content-Length or chunked), dispatch through the middleware chain into
//! the router, serialize and write the response, then either loop for the
//! next keep-alive transaction or close. An idle watchdog bounds every I/O
//! suspension; protocol failures answer a canned error page and close.

use crate::{
    errors::ErrorKind,
    http::{
        request::{self, Request},
        response::Response,
        types,
    },
    server::{acceptor::ConnGuard, app::Shared},
};
use memchr::memmem;
use std::{io, mem, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

const HEAD_DELIMITER: &[u8] = b"\r\n\r\n";
const CRLF: &[u8] = b"\r\n";
const CONTINUE_LINE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";
const READ_CHUNK: usize = 4096;

enum KeepAlive {
    Yes,
    No,
}

pub(crate) struct Connection {
    stream: TcpStream,
    shared: Arc<Shared>,
    _guard: ConnGuard,

    buffer: Vec<u8>,
    req: Request,
    res: Response,
    out: Vec<u8>,
}

impl Connection {
    pub(crate) fn new(stream: TcpStream, shared: Arc<Shared>, guard: ConnGuard) -> Self {
        Self {
            stream,
            shared,
            _guard: guard,

            buffer: Vec::with_capacity(READ_CHUNK),
            req: Request::new(),
            res: Response::new(),
            out: Vec::new(),
        }
    }

    pub(crate) async fn serve(mut self) {
        loop {
            match self.transaction().await {
                Ok(KeepAlive::Yes) => self.reset(),
                Ok(KeepAlive::No) => break,
                Err(ErrorKind::Io(err)) => {
                    if !is_benign(&err.0) {
                        tracing::error!(error = %err.0, "transport error");
                    }
                    break;
                }
                Err(kind) => {
                    let _ = self.send_error(&kind).await;
                    break;
                }
            }
        }

        // Shutdown is reached exactly once per connection; the counter guard
        // is released by Drop on return.
        let _ = self.stream.shutdown().await;
    }

    /// Clears all transaction state for the next keep-alive request.
    /// Residual bytes in the read buffer are dropped: pipelining is
    /// unsupported and the next read starts only after this response.
    fn reset(&mut self) {
        self.buffer.clear();
        self.req.reset();
        self.res.reset();
        self.out.clear();
    }

    async fn transaction(&mut self) -> Result<KeepAlive, ErrorKind> {
        let Some(head_end) = self.read_head().await? else {
            return Ok(KeepAlive::No);
        };

        request::parse_head(&self.buffer[..head_end + HEAD_DELIMITER.len()], &mut self.req)?;
        self.buffer.drain(..head_end + HEAD_DELIMITER.len());

        if self.req.version.keep_alive_default() && self.req.header("host").is_none() {
            return Err(ErrorKind::MissingHost);
        }

        let mut keep_alive = self.req.version.keep_alive_default();
        if let Some(value) = self.req.header("connection") {
            if value.eq_ignore_ascii_case("close") {
                keep_alive = false;
            } else if value.eq_ignore_ascii_case("keep-alive") {
                keep_alive = true;
            }
        }

        if self
            .req
            .header("expect")
            .is_some_and(|v| v.eq_ignore_ascii_case("100-continue"))
        {
            Self::write_deadline(
                &mut self.stream,
                self.shared.conn_limits.idle_timeout,
                CONTINUE_LINE,
            )
            .await?;
        }

        self.read_body().await?;
        self.dispatch()?;

        self.out.clear();
        self.res.write_to(&mut self.out, self.req.version, keep_alive);
        Self::write_deadline(
            &mut self.stream,
            self.shared.conn_limits.idle_timeout,
            &self.out,
        )
        .await?;

        Ok(match keep_alive {
            true => KeepAlive::Yes,
            false => KeepAlive::No,
        })
    }
}

// Reading
impl Connection {
    /// Reads until the `\r\n\r\n` delimiter and returns its offset; bytes
    /// beyond the delimiter stay buffered as initial body bytes. `None`
    /// signals a clean close before any byte arrived.
    async fn read_head(&mut self) -> Result<Option<usize>, ErrorKind> {
        loop {
            if let Some(pos) = memmem::find(&self.buffer, HEAD_DELIMITER) {
                return Ok(Some(pos));
            }
            if self.buffer.len() > self.shared.conn_limits.max_head_size {
                return Err(ErrorKind::HeadTooLarge);
            }

            if self.read_some().await? == 0 {
                return match self.buffer.is_empty() {
                    true => Ok(None),
                    false => Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
                };
            }
        }
    }

    /// Buffers the request body according to the framing headers.
    /// `Content-Length` takes precedence over `Transfer-Encoding: chunked`.
    async fn read_body(&mut self) -> Result<(), ErrorKind> {
        if let Some(raw) = self.req.header("content-length") {
            let declared = types::slice_to_usize(raw.as_bytes())
                .ok_or(ErrorKind::InvalidContentLength)?;

            // cap enforced before any body allocation
            if declared > self.shared.conn_limits.max_body_size {
                return Err(ErrorKind::BodyTooLarge);
            }
            if self.buffer.len() > declared {
                return Err(ErrorKind::BodyMismatch);
            }

            self.read_body_exact(declared).await
        } else if self
            .req
            .header("transfer-encoding")
            .is_some_and(|v| v.eq_ignore_ascii_case("chunked"))
        {
            self.read_body_chunked().await
        } else {
            Ok(())
        }
    }

    /// Content-Length body: the buffered prefix plus exactly the missing
    /// bytes from the socket.
    async fn read_body_exact(&mut self, declared: usize) -> Result<(), ErrorKind> {
        let mut body = mem::take(&mut self.req.body);
        body.reserve(declared);
        body.extend_from_slice(&self.buffer);
        self.buffer.clear();

        let start = body.len();
        body.resize(declared, 0);

        let result = Self::read_exact_deadline(
            &mut self.stream,
            self.shared.conn_limits.idle_timeout,
            &mut body[start..],
        )
        .await;

        self.req.body = body;
        result
    }

    /// Chunked body: `size CRLF data CRLF` repeated, terminated by a zero
    /// chunk. Trailers are not parsed; the cumulative cap applies.
    async fn read_body_chunked(&mut self) -> Result<(), ErrorKind> {
        loop {
            let line_end = self.fill_until_crlf().await?;
            let size = types::hex_prefix_to_usize(&self.buffer[..line_end])
                .ok_or(ErrorKind::InvalidChunkSize)?;
            self.buffer.drain(..line_end + CRLF.len());

            if size == 0 {
                return Ok(());
            }
            if self.req.body.len() + size > self.shared.conn_limits.max_body_size {
                return Err(ErrorKind::BodyTooLarge);
            }

            self.fill_exact(size + CRLF.len()).await?;
            self.req.body.extend_from_slice(&self.buffer[..size]);
            self.buffer.drain(..size + CRLF.len());
        }
    }

    /// Ensures a `\r\n`-terminated line is buffered; returns the offset of
    /// its `\r`.
    async fn fill_until_crlf(&mut self) -> Result<usize, ErrorKind> {
        loop {
            if let Some(pos) = memmem::find(&self.buffer, CRLF) {
                return Ok(pos);
            }
            if self.buffer.len() > self.shared.conn_limits.max_head_size {
                return Err(ErrorKind::InvalidChunkSize);
            }
            if self.read_some().await? == 0 {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }
        }
    }

    /// Ensures at least `wanted` bytes are buffered.
    async fn fill_exact(&mut self, wanted: usize) -> Result<(), ErrorKind> {
        while self.buffer.len() < wanted {
            if self.read_some().await? == 0 {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }
        }
        Ok(())
    }

    async fn read_some(&mut self) -> Result<usize, ErrorKind> {
        let mut chunk = [0u8; READ_CHUNK];

        let read = timeout(
            self.shared.conn_limits.idle_timeout,
            self.stream.read(&mut chunk),
        )
        .await
        .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))??;

        self.buffer.extend_from_slice(&chunk[..read]);
        Ok(read)
    }

    async fn read_exact_deadline(
        stream: &mut TcpStream,
        deadline: Duration,
        buf: &mut [u8],
    ) -> Result<(), ErrorKind> {
        if buf.is_empty() {
            return Ok(());
        }

        timeout(deadline, stream.read_exact(buf))
            .await
            .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))??;
        Ok(())
    }

    async fn write_deadline(
        stream: &mut TcpStream,
        deadline: Duration,
        bytes: &[u8],
    ) -> Result<(), ErrorKind> {
        timeout(deadline, stream.write_all(bytes))
            .await
            .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))??;
        Ok(())
    }
}

// Dispatch
impl Connection {
    /// Runs the middleware chain with a tail that resolves the route and
    /// invokes its handler.
    fn dispatch(&mut self) -> Result<(), ErrorKind> {
        let shared = Arc::clone(&self.shared);

        let outcome = shared
            .chain
            .run(&mut self.req, &mut self.res, |req, res| {
                match shared.router.lookup(req) {
                    Some(handler) => {
                        handler(req, res);
                        true
                    }
                    None => false,
                }
            });

        match outcome {
            Ok(Some(true)) | Ok(None) => Ok(()),
            Ok(Some(false)) => Err(ErrorKind::NoRoute),
            Err(error) => {
                tracing::error!(%error, "unhandled handler failure");
                Err(ErrorKind::Handler)
            }
        }
    }

    async fn send_error(&mut self, kind: &ErrorKind) -> Result<(), ErrorKind> {
        let payload = kind.to_response();
        Self::write_deadline(
            &mut self.stream,
            self.shared.conn_limits.idle_timeout,
            &payload,
        )
        .await
    }
}

/// EOF, reset and aborted peers are part of normal operation and close
/// silently; so does the idle watchdog.
fn is_benign(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::TimedOut
    )
}
