//! Middleware layer.
//!
//! A middleware is any async function shaped like
//!
//! ```text
//! async fn name(req: Request, res: Response, next: Next) -> impl IntoResponse
//! ```
//!
//! It runs before the route handler and decides whether the request goes any
//! further: call [`Next::run`] to continue down the chain, or return a
//! response of its own to short-circuit it.
//!
//! ```rust
//! use tether::{Request, Response, Status};
//! use tether::middleware::Next;
//!
//! async fn require_token(req: Request, res: Response, next: Next) -> Response {
//!     if req.header("authorization").is_none() {
//!         return Response::status(Status::Unauthorized);
//!     }
//!     next.run(req, res).await
//! }
//! ```
//!
//! Middleware applies to routes registered after it, in registration order,
//! and is inherited by groups and subdomains declared below it.
//!
//! Built-in middleware:
//! - [`trace`]: per-request span with method, path, status, latency

mod trace;

pub use trace::trace;

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

#[doc(hidden)]
pub trait ErasedMiddleware {
    fn call(&self, req: Request, res: Response, next: Next) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedMiddleware = Arc<dyn ErasedMiddleware + Send + Sync + 'static>;

/// Implemented for every valid middleware function. Sealed, like
/// [`Handler`](crate::Handler).
pub trait Middleware: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_middleware(self) -> BoxedMiddleware;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Middleware for F
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_middleware(self) -> BoxedMiddleware {
        Arc::new(FnMiddleware(self))
    }
}

struct FnMiddleware<F>(F);

impl<F, Fut, R> ErasedMiddleware for FnMiddleware<F>
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request, res: Response, next: Next) -> BoxFuture {
        let fut = (self.0)(req, res, next);
        Box::pin(async move { fut.await.into_response() })
    }
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The rest of the chain: remaining middleware, then the route handler.
pub struct Next {
    chain: Arc<[BoxedMiddleware]>,
    index: usize,
    handler: BoxedHandler,
}

impl Next {
    pub(crate) fn new(chain: Arc<[BoxedMiddleware]>, handler: BoxedHandler) -> Self {
        Self { chain, index: 0, handler }
    }

    /// Passes the request to the next link and returns whatever it produced.
    pub async fn run(self, req: Request, res: Response) -> Response {
        match self.chain.get(self.index) {
            Some(mw) => {
                let next = Next {
                    chain: Arc::clone(&self.chain),
                    index: self.index + 1,
                    handler: Arc::clone(&self.handler),
                };
                mw.call(req, res, next).await
            }
            None => self.handler.call(req, res).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::handler::Handler;
    use crate::{Method, Status};

    fn chain(mws: Vec<BoxedMiddleware>, handler: impl Handler) -> Next {
        Next::new(mws.into(), handler.into_boxed_handler())
    }

    #[tokio::test]
    async fn runs_in_registration_order_then_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let log = Arc::clone(&log);
            move |req: Request, res: Response, next: Next| {
                let log = Arc::clone(&log);
                async move {
                    log.lock().unwrap().push("first");
                    next.run(req, res).await
                }
            }
        };
        let second = {
            let log = Arc::clone(&log);
            move |req: Request, res: Response, next: Next| {
                let log = Arc::clone(&log);
                async move {
                    log.lock().unwrap().push("second");
                    next.run(req, res).await
                }
            }
        };
        let handler = {
            let log = Arc::clone(&log);
            move |_req: Request, res: Response| {
                log.lock().unwrap().push("handler");
                async move { res.with_status(Status::Accepted) }
            }
        };

        let res = chain(
            vec![first.into_boxed_middleware(), second.into_boxed_middleware()],
            handler,
        )
        .run(Request::new(Method::Get, "/"), Response::new())
        .await;

        assert_eq!(res.status_code(), 202);
        assert_eq!(*log.lock().unwrap(), ["first", "second", "handler"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_the_handler() {
        async fn deny(_req: Request, _res: Response, _next: Next) -> Status {
            Status::Forbidden
        }
        async fn unreachable_handler(_req: Request, _res: Response) -> Status {
            Status::Ok
        }

        let res = chain(vec![deny.into_boxed_middleware()], unreachable_handler)
            .run(Request::new(Method::Get, "/"), Response::new())
            .await;

        assert_eq!(res.status_code(), 403);
    }

    #[tokio::test]
    async fn middleware_can_decorate_the_response() {
        async fn stamp(req: Request, res: Response, next: Next) -> Response {
            next.run(req, res).await.with_header("x-served-by", "tether")
        }
        async fn ok(_req: Request, _res: Response) -> &'static str {
            "ok"
        }

        let res = chain(vec![stamp.into_boxed_middleware()], ok)
            .run(Request::new(Method::Get, "/"), Response::new())
            .await;

        assert_eq!(res.headers().get("X-Served-By"), Some("tether"));
        assert_eq!(res.body(), b"ok");
    }

    #[tokio::test]
    async fn middleware_sees_request_headers_and_host() {
        async fn tenant_only(req: Request, res: Response, next: Next) -> Response {
            match (req.host(), req.header("authorization")) {
                ("acme.tracker.com", Some(_)) => next.run(req, res).await,
                _ => Response::status(Status::Unauthorized),
            }
        }
        async fn ok(_req: Request, res: Response) -> Response {
            res
        }

        let run = |req: Request| {
            chain(vec![tenant_only.into_boxed_middleware()], ok).run(req, Response::new())
        };
        let allowed = Request::new(Method::Get, "/")
            .with_header("host", "acme.tracker.com")
            .with_header("authorization", "Bearer t");
        assert_eq!(run(allowed).await.status_code(), 200);

        let anonymous = Request::new(Method::Get, "/").with_header("host", "acme.tracker.com");
        assert_eq!(run(anonymous).await.status_code(), 401);
    }
}
