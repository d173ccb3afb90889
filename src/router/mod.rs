//! Request router.
//!
//! Routes are matched in registration order: the first one whose method,
//! subdomain, and path all fit wins. Patterns are `/`-separated segments,
//! each a literal, a `{name}` parameter, or a `*` wildcard that swallows the
//! rest of the path.
//!
//! [`Router`] is a builder. [`Router::build`] freezes it into [`Routes`],
//! which the server shares across every connection without locking.

mod pattern;
mod table;

pub use table::{Route, RouteMatch, Routes};

use std::sync::Arc;

use crate::handler::{BoxedWsHandler, Handler};
use crate::method::Method;
use crate::middleware::{BoxedMiddleware, Middleware};
use crate::request::Request;
use crate::websocket::WebSocket;

use pattern::{Pattern, join};
use table::Target;

pub(crate) use table::DEFAULT_SUBDOMAIN_OFFSET;

/// The application router.
///
/// Each registration returns `self`, so routes chain naturally:
///
/// ```rust,no_run
/// # use tether::{Method, Request, Response, Router};
/// # async fn show(_: Request, res: Response) -> Response { res }
/// # async fn create(_: Request, res: Response) -> Response { res }
/// # async fn tenant_home(_: Request, res: Response) -> Response { res }
/// Router::new()
///     .get("api/products/{id}", show)
///     .group("api/admin", |admin| admin.post("products", create))
///     .subdomain("{company}", |r| r.get("/", tenant_home));
/// ```
pub struct Router {
    prefix: String,
    subdomain: Option<String>,
    middleware: Vec<BoxedMiddleware>,
    http: Vec<Route>,
    websocket: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            prefix: String::new(),
            subdomain: None,
            middleware: Vec::new(),
            http: Vec::new(),
            websocket: Vec::new(),
        }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.add(method, path, Target::Http(handler.into_boxed_handler()))
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Get, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Post, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Put, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Patch, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Delete, path, handler)
    }

    /// Register a WebSocket endpoint.
    ///
    /// `handler` runs once per upgraded connection and should register its
    /// callbacks (at least [`WebSocket::on_ready`]) before returning.
    pub fn ws<F>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request, WebSocket) + Send + Sync + 'static,
    {
        let handler: BoxedWsHandler = Arc::new(handler);
        self.add(Method::Get, path, Target::WebSocket(handler))
    }

    /// Append a middleware. It wraps every route registered after this call
    /// in this scope and in groups declared below it.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(middleware.into_boxed_middleware());
        self
    }

    /// Register routes under a shared path prefix.
    ///
    /// The group starts with this router's middleware and subdomain. Middleware
    /// added inside the group stays inside it.
    pub fn group(self, prefix: &str, routes: impl FnOnce(Router) -> Router) -> Self {
        let child = self.child(join(&self.prefix, prefix), self.subdomain.clone());
        self.adopt(routes(child))
    }

    /// Register routes that only match hosts whose subdomain fits `pattern`.
    ///
    /// `{name}` labels capture into the request's parameters alongside path
    /// parameters: with `"{company}"`, host `grpc.tracker.com` yields
    /// `company = "grpc"` while bare `tracker.com` matches nothing.
    pub fn subdomain(self, pattern: &str, routes: impl FnOnce(Router) -> Router) -> Self {
        let child = self.child(self.prefix.clone(), Some(pattern.to_owned()));
        self.adopt(routes(child))
    }

    /// Freeze the router into an immutable table.
    pub fn build(self) -> Routes {
        Routes {
            http: self.http,
            websocket: self.websocket,
            subdomain_offset: DEFAULT_SUBDOMAIN_OFFSET,
        }
    }

    fn child(&self, prefix: String, subdomain: Option<String>) -> Router {
        Router {
            prefix,
            subdomain,
            middleware: self.middleware.clone(),
            http: Vec::new(),
            websocket: Vec::new(),
        }
    }

    fn adopt(mut self, child: Router) -> Self {
        self.http.extend(child.http);
        self.websocket.extend(child.websocket);
        self
    }

    fn add(mut self, method: Method, path: &str, target: Target) -> Self {
        let upgrade = matches!(target, Target::WebSocket(_));
        let route = Route {
            method,
            pattern: Pattern::path(&join(&self.prefix, path)),
            subdomain: self.subdomain.as_deref().map(Pattern::host),
            middleware: self.middleware.clone().into(),
            target,
        };
        if upgrade {
            self.websocket.push(route);
        } else {
            self.http.push(route);
        }
        self
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
