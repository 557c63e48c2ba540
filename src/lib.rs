//! ember_web - embeddable HTTP/1.x application server with a binary side-channel
//!
//! A library-first server: the embedding program registers route handlers and
//! middleware on a [`Server`], then calls [`Server::run`] to start accepting
//! HTTP connections. A second, length-prefixed binary listener
//! ([`Server::neural`]) demultiplexes one-byte opcodes to a user callback on a
//! separate port.
//!
//! # Protocol Support
//!
//! - **HTTP/1.1**: persistent connections, chunked request bodies,
//!   `Expect: 100-continue`
//! - **HTTP/1.0**: one transaction per connection unless the client asks for
//!   `Connection: keep-alive`
//! - **Opcode frames**: `opcode (1 byte) | length (u32, network order) | payload`
//!
//! # Features
//!
//! - **Express-style routing** - literal, `:param` (with optional `(regex)`
//!   constraints) and trailing `*wildcard` segments, matched in registration
//!   order.
//! - **Continuation middleware** - every middleware receives a [`Next`] handle;
//!   `next.ok()` advances the chain, `next.err(..)` switches to the error lane.
//! - **Bounded resources** - connection cap, idle watchdog, request body and
//!   header-block limits, all configurable through [`limits`].
//!
//! # Quick Start
//!
//! ```no_run
//! use ember_web::Server;
//!
//! let server = Server::new();
//!
//! server.get("/", |_req, res| {
//!     res.send("Hello from ember_web!");
//! });
//!
//! server.get("/users/:id", |req, res| {
//!     let id = req.param("id").unwrap_or("");
//!     res.send(format!("User {id}"));
//! });
//!
//! server.run(3000).expect("server failed to start");
//! ```
//!
//! # Concurrency Model
//!
//! Handlers run on reactor worker threads and are expected not to block; a
//! handler that must block should offload to its own pool. Within one
//! connection the request lifecycle is strictly sequential; different
//! connections interleave freely.
pub(crate) mod http {
    pub(crate) mod middleware;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod router;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod acceptor;
    pub(crate) mod app;
    pub(crate) mod connection;
    pub(crate) mod executor;
}
pub(crate) mod errors;
pub mod limits;
pub(crate) mod neural;

pub use crate::{
    http::{
        middleware::{ErrorHandler, HandlerError, Middleware, Next},
        request::Request,
        response::Response,
        router::{PatternError, RouteHandler},
        types::{Method, Version},
    },
    neural::{NeuralHandler, OP_ERROR, OP_PING, OP_QUERY, OP_RESPONSE},
    server::app::Server,
};
