//! Binary opcode side-channel ("NeuralDB" listener)
//!
//! Started via [`Server::neural`](crate::Server::neural): a parallel TCP
//! listener framing messages as
//! `opcode (1 byte) | length (u32, network order) | payload`. Every complete
//! frame invokes the user handler; a non-empty return value is written back
//! with the request opcode echoed and a network-order length prefix. Frame
//! semantics are entirely the handler's business - the opcodes below are
//! reserved names, not enforced behavior.
//!
//! There is no keep-alive negotiation: a socket stays open until either side
//! closes or errors.

use std::sync::Arc;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

/// Liveness probe.
pub const OP_PING: u8 = 0x01;
/// Query payload.
pub const OP_QUERY: u8 = 0x02;
/// Response payload.
pub const OP_RESPONSE: u8 = 0x03;
/// Error payload.
pub const OP_ERROR: u8 = 0xFF;

/// Callback invoked per frame: `(opcode, payload) -> response bytes`.
///
/// An empty return value suppresses the response frame.
pub type NeuralHandler = Arc<dyn Fn(u8, &[u8]) -> Vec<u8> + Send + Sync>;

pub(crate) async fn accept_loop(listener: TcpListener, handler: NeuralHandler, max_frame: usize) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(error = %err, "opcode accept failed");
                continue;
            }
        };

        tracing::debug!(%peer, "opcode client connected");
        tokio::spawn(serve_client(stream, Arc::clone(&handler), max_frame));
    }
}

/// Reads frames in a loop until the peer closes or a frame is oversized or
/// malformed; any read or write error closes the socket.
async fn serve_client(mut stream: TcpStream, handler: NeuralHandler, max_frame: usize) {
    loop {
        let opcode = match stream.read_u8().await {
            Ok(opcode) => opcode,
            Err(_) => break,
        };
        let length = match stream.read_u32().await {
            Ok(length) => length as usize,
            Err(_) => break,
        };

        if length > max_frame {
            tracing::warn!(opcode, length, "oversized opcode frame, closing");
            break;
        }

        let mut payload = vec![0u8; length];
        if length > 0 && stream.read_exact(&mut payload).await.is_err() {
            break;
        }

        let response = handler(opcode, &payload);
        if response.is_empty() {
            continue;
        }

        let mut frame = Vec::with_capacity(1 + 4 + response.len());
        frame.push(opcode);
        frame.extend_from_slice(&(response.len() as u32).to_be_bytes());
        frame.extend_from_slice(&response);

        if stream.write_all(&frame).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_opcodes() {
        assert_eq!(OP_PING, 0x01);
        assert_eq!(OP_QUERY, 0x02);
        assert_eq!(OP_RESPONSE, 0x03);
        assert_eq!(OP_ERROR, 0xFF);
    }

    #[test]
    fn frame_layout() {
        // the length prefix is network byte order
        let length = 0x0102_0304u32;
        assert_eq!(length.to_be_bytes(), [0x01, 0x02, 0x03, 0x04]);
    }
}
