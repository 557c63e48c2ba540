//! TCP acceptor with admission control

use crate::server::{app::Shared, connection::Connection};
use std::{
    io,
    net::SocketAddr,
    sync::{atomic::Ordering, Arc},
    time::Duration,
};
use tokio::net::{TcpListener, TcpSocket};

const BACKLOG: u32 = 1024;

/// Binds an IPv4 listener with `SO_REUSEADDR`.
pub(crate) fn bind(port: u16) -> io::Result<TcpListener> {
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(SocketAddr::from(([0, 0, 0, 0], port)))?;
    socket.listen(BACKLOG)
}

/// Accept loop: admits sockets subject to the connection cap and moves each
/// admitted socket into a fresh [`Connection`].
///
/// The cap comparison is best-effort; connections already in flight may
/// overshoot by a bounded amount.
pub(crate) async fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(error = %err, "accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };

        if shared.active.load(Ordering::Acquire) >= shared.server_limits.max_connections {
            tracing::warn!(%peer, "connection cap reached, closing socket");
            drop(stream);
            continue;
        }

        let guard = ConnGuard::new(Arc::clone(&shared));
        tracing::debug!(%peer, "connection admitted");
        tokio::spawn(Connection::new(stream, Arc::clone(&shared), guard).serve());
    }
}

/// Holds one slot of the active-connection counter.
///
/// Incremented on admission, decremented by `Drop`, so the cleanup runs
/// exactly once however the connection ends.
pub(crate) struct ConnGuard {
    shared: Arc<Shared>,
}

impl ConnGuard {
    fn new(shared: Arc<Shared>) -> Self {
        shared.active.fetch_add(1, Ordering::AcqRel);
        Self { shared }
    }
}

impl Drop for ConnGuard {
    fn drop(&mut self) {
        self.shared.active.fetch_sub(1, Ordering::AcqRel);
    }
}
