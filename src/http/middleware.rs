//! Continuation-style middleware pipeline with an error lane
//!
//! Middleware run in registration order; each receives the request, the
//! response and a [`Next`] continuation. Calling [`Next::ok`] advances to the
//! following middleware (after the last one, to the route handler); calling
//! [`Next::err`] switches the pipeline onto the error lane; calling neither
//! terminates the chain with whatever response has been built so far.
//!
//! On the error lane, error handlers run in registration order. A handler
//! that completes without re-raising settles the error; re-raising via
//! [`Next::err`] (or panicking) passes it on. Once on the error lane the
//! normal lane is never re-entered. An error that falls off the end of the
//! lane is unhandled: the connection answers 500 and closes.
//!
//! Both lanes advance by an explicit cursor, so arbitrarily long chains use
//! constant stack.

use crate::http::{request::Request, response::Response};
use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, RwLock},
};

/// Error value traveling the error lane.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A middleware: `(req, res, next)`.
pub type Middleware = Arc<dyn Fn(&Request, &mut Response, &mut Next) + Send + Sync>;

/// An error-lane handler: `(err, req, res, next)`.
pub type ErrorHandler = Arc<dyn Fn(&HandlerError, &Request, &mut Response, &mut Next) + Send + Sync>;

/// Continuation handle passed to middleware and error handlers.
///
/// The default, when neither method is called, is to stop the chain. When
/// both are called, the last call wins.
pub struct Next {
    state: NextState,
}

enum NextState {
    Stop,
    Advance,
    Fail(HandlerError),
}

impl Next {
    #[inline(always)]
    fn new() -> Self {
        Self {
            state: NextState::Stop,
        }
    }

    /// Advances the pipeline.
    ///
    /// In the error lane this is equivalent to not calling anything: the
    /// error counts as settled and the chain terminates.
    #[inline]
    pub fn ok(&mut self) {
        self.state = NextState::Advance;
    }

    /// Reports an error, switching to (or staying on) the error lane.
    #[inline]
    pub fn err(&mut self, error: impl Into<HandlerError>) {
        self.state = NextState::Fail(error.into());
    }
}

/// The registered middleware of a server.
///
/// Both lists are append-only before `run()` and read-only thereafter; the
/// chain holds no per-request state.
pub(crate) struct MiddlewareChain {
    stack: RwLock<Vec<Middleware>>,
    error_stack: RwLock<Vec<ErrorHandler>>,
}

impl MiddlewareChain {
    pub(crate) fn new() -> Self {
        Self {
            stack: RwLock::new(Vec::new()),
            error_stack: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn push(&self, middleware: Middleware) {
        self.stack
            .write()
            .expect("middleware lock poisoned")
            .push(middleware);
    }

    pub(crate) fn push_error(&self, handler: ErrorHandler) {
        self.error_stack
            .write()
            .expect("middleware lock poisoned")
            .push(handler);
    }

    /// Runs the normal lane, terminating in `tail` (the route dispatch).
    ///
    /// Returns `Ok(Some(value))` when the tail ran, `Ok(None)` when a
    /// middleware or the error lane produced the response, `Err` when an
    /// error fell off the error lane unhandled. Panics in middleware, tail
    /// or error handlers are captured and travel the lane as errors.
    pub(crate) fn run<T>(
        &self,
        req: &mut Request,
        res: &mut Response,
        tail: impl FnOnce(&mut Request, &mut Response) -> T,
    ) -> Result<Option<T>, HandlerError> {
        // Snapshot so no lock is held while user code runs.
        let stack: Vec<Middleware> = self
            .stack
            .read()
            .expect("middleware lock poisoned")
            .clone();

        let mut cursor = 0;
        loop {
            if cursor == stack.len() {
                let outcome = {
                    let (r, s) = (&mut *req, &mut *res);
                    catch_unwind(AssertUnwindSafe(move || tail(r, s)))
                };
                return match outcome {
                    Ok(value) => Ok(Some(value)),
                    Err(payload) => self.error_lane(panic_error(payload), req, res).map(|()| None),
                };
            }

            let mut next = Next::new();
            let outcome = {
                let (r, s) = (&*req, &mut *res);
                catch_unwind(AssertUnwindSafe(|| stack[cursor](r, s, &mut next)))
            };

            match outcome {
                Err(payload) => {
                    return self.error_lane(panic_error(payload), req, res).map(|()| None);
                }
                Ok(()) => match next.state {
                    NextState::Stop => return Ok(None),
                    NextState::Advance => cursor += 1,
                    NextState::Fail(error) => {
                        return self.error_lane(error, req, res).map(|()| None);
                    }
                },
            }
        }
    }

    /// Runs the error lane to completion. `Ok(())` when some handler settled
    /// the error, `Err` with the final error when none did.
    fn error_lane(
        &self,
        mut error: HandlerError,
        req: &mut Request,
        res: &mut Response,
    ) -> Result<(), HandlerError> {
        let handlers: Vec<ErrorHandler> = self
            .error_stack
            .read()
            .expect("middleware lock poisoned")
            .clone();

        let mut cursor = 0;
        while cursor < handlers.len() {
            let mut next = Next::new();
            let outcome = {
                let (e, r, s) = (&error, &*req, &mut *res);
                catch_unwind(AssertUnwindSafe(|| handlers[cursor](e, r, s, &mut next)))
            };

            match outcome {
                Err(payload) => {
                    error = panic_error(payload);
                    cursor += 1;
                }
                Ok(()) => match next.state {
                    NextState::Fail(replacement) => {
                        error = replacement;
                        cursor += 1;
                    }
                    _ => return Ok(()),
                },
            }
        }

        Err(error)
    }
}

fn panic_error(payload: Box<dyn Any + Send>) -> HandlerError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_owned());
    message.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fixtures() -> (Request, Response) {
        (Request::new(), Response::new())
    }

    #[test]
    fn empty_chain_runs_tail() {
        let chain = MiddlewareChain::new();
        let (mut req, mut res) = fixtures();

        let result = chain.run(&mut req, &mut res, |_req, res| {
            res.send("tail");
            true
        });

        assert!(matches!(result, Ok(Some(true))));
        assert_eq!(res.body(), b"tail");
    }

    #[test]
    fn middleware_run_in_registration_order() {
        let chain = MiddlewareChain::new();
        chain.push(Arc::new(|_req, res: &mut Response, next: &mut Next| {
            res.set_header("X-Trace", "a");
            next.ok();
        }));
        chain.push(Arc::new(|_req, res: &mut Response, next: &mut Next| {
            let trace = res.header("X-Trace").unwrap_or("").to_owned();
            res.set_header("X-Trace", trace + "b");
            next.ok();
        }));

        let (mut req, mut res) = fixtures();
        let result = chain.run(&mut req, &mut res, |_req, _res| ());

        assert!(matches!(result, Ok(Some(()))));
        assert_eq!(res.header("X-Trace"), Some("ab"));
    }

    #[test]
    fn not_calling_next_terminates_the_chain() {
        let chain = MiddlewareChain::new();
        chain.push(Arc::new(|_req, res: &mut Response, _next: &mut Next| {
            res.status(401);
            res.send("denied");
        }));
        chain.push(Arc::new(|_req, _res: &mut Response, _next: &mut Next| {
            panic!("must not run");
        }));

        let (mut req, mut res) = fixtures();
        let result = chain.run(&mut req, &mut res, |_req, _res| panic!("must not run"));

        assert!(matches!(result, Ok(None)));
        assert_eq!(res.status_code(), 401);
        assert_eq!(res.body(), b"denied");
    }

    #[test]
    fn error_switches_to_error_lane() {
        let chain = MiddlewareChain::new();
        chain.push(Arc::new(|_req, _res: &mut Response, next: &mut Next| {
            next.err("boom");
        }));
        chain.push(Arc::new(|_req, _res: &mut Response, _next: &mut Next| {
            panic!("normal lane must not continue");
        }));
        chain.push_error(Arc::new(
            |err: &HandlerError, _req, res: &mut Response, _next: &mut Next| {
                res.status(500);
                res.send(format!("caught: {err}"));
            },
        ));

        let (mut req, mut res) = fixtures();
        let result = chain.run(&mut req, &mut res, |_req, _res| panic!("tail must not run"));

        assert!(matches!(result, Ok(None)));
        assert_eq!(res.body(), b"caught: boom");
    }

    #[test]
    fn rethrown_errors_reach_the_next_handler() {
        let seen = Arc::new(AtomicUsize::new(0));

        let chain = MiddlewareChain::new();
        chain.push(Arc::new(|_req, _res: &mut Response, next: &mut Next| {
            next.err("first");
        }));
        {
            let seen = seen.clone();
            chain.push_error(Arc::new(
                move |_err: &HandlerError, _req, _res: &mut Response, next: &mut Next| {
                    seen.fetch_add(1, Ordering::SeqCst);
                    next.err("second");
                },
            ));
        }
        {
            let seen = seen.clone();
            chain.push_error(Arc::new(
                move |err: &HandlerError, _req, res: &mut Response, _next: &mut Next| {
                    seen.fetch_add(1, Ordering::SeqCst);
                    res.send(format!("settled: {err}"));
                },
            ));
        }

        let (mut req, mut res) = fixtures();
        let result = chain.run(&mut req, &mut res, |_req, _res| ());

        assert!(matches!(result, Ok(None)));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        // the re-raised error replaces the original
        assert_eq!(res.body(), b"settled: second");
    }

    #[test]
    fn unhandled_error_is_returned() {
        let chain = MiddlewareChain::new();
        chain.push(Arc::new(|_req, _res: &mut Response, next: &mut Next| {
            next.err("nobody listens");
        }));

        let (mut req, mut res) = fixtures();
        let result = chain.run(&mut req, &mut res, |_req, _res| ());

        assert_eq!(result.unwrap_err().to_string(), "nobody listens");
    }

    #[test]
    fn panics_travel_the_error_lane() {
        let chain = MiddlewareChain::new();
        chain.push(Arc::new(|_req, _res: &mut Response, _next: &mut Next| {
            panic!("middleware exploded");
        }));
        chain.push_error(Arc::new(
            |err: &HandlerError, _req, res: &mut Response, _next: &mut Next| {
                res.send(err.to_string());
            },
        ));

        let (mut req, mut res) = fixtures();
        let result = chain.run(&mut req, &mut res, |_req, _res| ());

        assert!(matches!(result, Ok(None)));
        assert_eq!(res.body(), b"middleware exploded");
    }

    #[test]
    fn tail_panic_is_an_error_too() {
        let chain = MiddlewareChain::new();

        let (mut req, mut res) = fixtures();
        let result = chain.run(&mut req, &mut res, |_req, _res| -> () {
            panic!("handler exploded");
        });

        assert_eq!(result.unwrap_err().to_string(), "handler exploded");
    }

    #[test]
    fn long_chains_use_constant_stack() {
        let chain = MiddlewareChain::new();
        for _ in 0..10_000 {
            chain.push(Arc::new(|_req, _res: &mut Response, next: &mut Next| {
                next.ok();
            }));
        }

        let (mut req, mut res) = fixtures();
        let result = chain.run(&mut req, &mut res, |_req, _res| 7usize);

        assert!(matches!(result, Ok(Some(7))));
    }
}
