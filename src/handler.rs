//! Handler traits and type erasure.
//!
//! # How handlers are stored
//!
//! A route table holds handlers of many concrete types in one `Vec`, so every
//! handler is erased behind a trait object at registration time:
//!
//! ```text
//! async fn show(req: Request, res: Response) -> Response { … }  ← user writes this
//!        ↓ router.get("users/{id}", show)
//! show.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(show))                       ← stored as BoxedHandler
//!        ↓
//! handler.call(req, res)  at request time         ← one vtable dispatch
//!        ↓
//! Box::pin(async { show(req, res).await.into_response() })
//! ```
//!
//! WebSocket handlers are plain synchronous functions: they receive the
//! upgraded [`WebSocket`] and register callbacks on it, nothing more.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::websocket::WebSocket;

/// A heap-allocated, type-erased future that resolves to a [`Response`].
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request, res: Response) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// A type-erased WebSocket handler.
pub(crate) type BoxedWsHandler = Arc<dyn Fn(Request, WebSocket) + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// Automatically satisfied for any `async fn` with the signature:
///
/// ```text
/// async fn name(req: Request, res: Response) -> impl IntoResponse
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request, Response) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request, res: Response) -> BoxFuture {
        let fut = (self.0)(req, res);
        Box::pin(async move { fut.await.into_response() })
    }
}

/// Terminal link of a WebSocket route's chain.
///
/// Reaching it means every middleware let the request through; the request
/// rides back to the server in the response bag so the upgrade can proceed.
pub(crate) struct UpgradeHandler;

impl ErasedHandler for UpgradeHandler {
    fn call(&self, req: Request, mut res: Response) -> BoxFuture {
        res.bag.upgrade = Some(Box::new(req));
        Box::pin(async move { res })
    }
}
