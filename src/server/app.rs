//! Public server facade
//!
//! Owns the executor, the route tables, the middleware chain and the
//! listeners. Registration methods are callable before `run()`; the router
//! mutex makes late registration safe but it is not recommended.

use crate::{
    http::{
        middleware::{ErrorHandler, HandlerError, Middleware, MiddlewareChain, Next},
        request::Request,
        response::Response,
        router::{Pattern, RouteHandler, Router},
        types::Method,
    },
    limits::{ConnLimits, ServerLimits},
    neural::{self, NeuralHandler},
    server::{acceptor, executor::Executor},
};
use std::{
    io,
    path::PathBuf,
    sync::{atomic::AtomicUsize, Arc, Mutex},
};

/// State shared between the facade and every connection task.
pub(crate) struct Shared {
    pub(crate) router: Router,
    pub(crate) chain: MiddlewareChain,
    pub(crate) server_limits: ServerLimits,
    pub(crate) conn_limits: ConnLimits,
    pub(crate) active: AtomicUsize,
}

impl Shared {
    fn new(server_limits: ServerLimits, conn_limits: ConnLimits) -> Self {
        Self {
            router: Router::new(),
            chain: MiddlewareChain::new(),
            server_limits,
            conn_limits,
            active: AtomicUsize::new(0),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::new(ServerLimits::default(), ConnLimits::default())
    }
}

/// An embeddable application server.
///
/// Register handlers and middleware, then call [`Server::run`] (blocking) and
/// optionally [`Server::neural`] for the binary opcode listener.
///
/// # Examples
///
/// ```no_run
/// use ember_web::Server;
///
/// let server = Server::new();
///
/// server.use_mw(|req, _res, next| {
///     tracing::debug!(path = req.path(), "request");
///     next.ok();
/// });
///
/// server.get("/", |_req, res| res.send("Hello!"));
/// server.post("/items", |req, res| {
///     res.status(201);
///     res.send(req.body().to_vec());
/// });
///
/// server.run(8080).expect("bind failed");
/// ```
pub struct Server {
    shared: Arc<Shared>,
    executor: Executor,
    views_dir: Mutex<Option<PathBuf>>,
}

impl Server {
    /// Creates a server with default [`limits`](crate::limits).
    pub fn new() -> Self {
        Self::with_limits(ServerLimits::default(), ConnLimits::default())
    }

    /// Creates a server with explicit limits.
    pub fn with_limits(server_limits: ServerLimits, conn_limits: ConnLimits) -> Self {
        let executor = Executor::new(server_limits.workers);

        Self {
            shared: Arc::new(Shared::new(server_limits, conn_limits)),
            executor,
            views_dir: Mutex::new(None),
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

// Registration
impl Server {
    /// Registers a GET route.
    ///
    /// Patterns mix literal segments, `:name` parameters (optionally
    /// constrained with `:name(regex)`) and a trailing `*` wildcard. Routes
    /// are matched in registration order.
    ///
    /// # Panics
    ///
    /// Panics on an invalid pattern: a wildcard before the last segment or a
    /// regex constraint that fails to compile.
    #[track_caller]
    pub fn get<H>(&self, pattern: &str, handler: H)
    where
        H: Fn(&Request, &mut Response) + Send + Sync + 'static,
    {
        self.route(Method::Get, pattern, handler);
    }

    /// Registers a POST route. See [`Server::get`] for pattern syntax.
    #[track_caller]
    pub fn post<H>(&self, pattern: &str, handler: H)
    where
        H: Fn(&Request, &mut Response) + Send + Sync + 'static,
    {
        self.route(Method::Post, pattern, handler);
    }

    /// Registers a PUT route. See [`Server::get`] for pattern syntax.
    #[track_caller]
    pub fn put<H>(&self, pattern: &str, handler: H)
    where
        H: Fn(&Request, &mut Response) + Send + Sync + 'static,
    {
        self.route(Method::Put, pattern, handler);
    }

    /// Registers a DELETE route. See [`Server::get`] for pattern syntax.
    #[track_caller]
    pub fn del<H>(&self, pattern: &str, handler: H)
    where
        H: Fn(&Request, &mut Response) + Send + Sync + 'static,
    {
        self.route(Method::Delete, pattern, handler);
    }

    #[track_caller]
    fn route<H>(&self, method: Method, pattern: &str, handler: H)
    where
        H: Fn(&Request, &mut Response) + Send + Sync + 'static,
    {
        let compiled = Pattern::parse(pattern)
            .unwrap_or_else(|err| panic!("invalid route pattern {pattern:?}: {err}"));

        let handler: RouteHandler = Arc::new(handler);
        self.shared.router.register(method, compiled, handler);
    }

    /// Appends a middleware to the chain.
    ///
    /// Middleware run in registration order ahead of the route handler; call
    /// `next.ok()` to advance, `next.err(..)` to switch to the error lane,
    /// or neither to finish the response yourself.
    pub fn use_mw<M>(&self, middleware: M)
    where
        M: Fn(&Request, &mut Response, &mut Next) + Send + Sync + 'static,
    {
        let middleware: Middleware = Arc::new(middleware);
        self.shared.chain.push(middleware);
    }

    /// Appends an error handler to the error lane.
    ///
    /// The first registered handler receives errors raised by middleware or
    /// route handlers; completing without re-raising settles the error.
    pub fn use_err<H>(&self, handler: H)
    where
        H: Fn(&HandlerError, &Request, &mut Response, &mut Next) + Send + Sync + 'static,
    {
        let handler: ErrorHandler = Arc::new(handler);
        self.shared.chain.push_error(handler);
    }

    /// Records the template folder made visible to a renderer collaborator.
    pub fn views(&self, folder: impl Into<PathBuf>) {
        *self.views_dir.lock().expect("views lock poisoned") = Some(folder.into());
    }

    /// The folder registered via [`Server::views`], if any.
    pub fn views_dir(&self) -> Option<PathBuf> {
        self.views_dir.lock().expect("views lock poisoned").clone()
    }
}

// Lifecycle
impl Server {
    /// Binds the HTTP listener on `port`, starts accepting and blocks the
    /// calling thread until [`Server::stop`].
    ///
    /// # Errors
    ///
    /// Returns the bind error when the port is unavailable.
    pub fn run(&self, port: u16) -> io::Result<()> {
        self.executor.ensure_started();
        let handle = self
            .executor
            .handle()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "executor is stopped"))?;

        let listener = {
            let _reactor = handle.enter();
            acceptor::bind(port)?
        };
        tracing::info!(port, "http listener bound");

        self.executor
            .submit(acceptor::accept_loop(listener, Arc::clone(&self.shared)));
        self.executor.run_blocking();
        Ok(())
    }

    /// Starts the binary opcode listener on the configured default port.
    /// See [`Server::neural_on`].
    pub fn neural<H>(&self, handler: H) -> io::Result<()>
    where
        H: Fn(u8, &[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        self.neural_on(self.shared.server_limits.neural_port, handler)
    }

    /// Starts the binary opcode listener on `port` and returns immediately.
    ///
    /// Each frame is `opcode (1 byte) | length (u32, network order) |
    /// payload`; the handler's non-empty return value is written back with
    /// the request opcode echoed.
    ///
    /// # Errors
    ///
    /// Returns the bind error when the port is unavailable.
    pub fn neural_on<H>(&self, port: u16, handler: H) -> io::Result<()>
    where
        H: Fn(u8, &[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        self.executor.ensure_started();
        let handle = self
            .executor
            .handle()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "executor is stopped"))?;

        let listener = {
            let _reactor = handle.enter();
            acceptor::bind(port)?
        };
        tracing::info!(port, "opcode listener bound");

        let handler: NeuralHandler = Arc::new(handler);
        let max_frame = self.shared.conn_limits.max_body_size;
        self.executor
            .submit(neural::accept_loop(listener, handler, max_frame));
        Ok(())
    }

    /// Stops the worker pool; a blocked [`Server::run`] returns.
    pub fn stop(&self) {
        self.executor.stop();
    }
}
