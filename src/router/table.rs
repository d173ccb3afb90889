//! Immutable route snapshot consulted on every request.

use std::collections::HashMap;
use std::sync::Arc;

use super::pattern::{Pattern, subdomain_labels};
use crate::handler::{BoxedHandler, BoxedWsHandler, UpgradeHandler};
use crate::method::Method;
use crate::middleware::{BoxedMiddleware, Next};

/// Default number of trailing host labels that make up the site's own domain.
pub(crate) const DEFAULT_SUBDOMAIN_OFFSET: usize = 2;

pub(crate) enum Target {
    Http(BoxedHandler),
    WebSocket(BoxedWsHandler),
}

/// One registered route.
pub struct Route {
    pub(crate) method: Method,
    pub(crate) pattern: Pattern,
    pub(crate) subdomain: Option<Pattern>,
    pub(crate) middleware: Arc<[BoxedMiddleware]>,
    pub(crate) target: Target,
}

impl Route {
    pub fn method(&self) -> Method { self.method }

    /// Full path pattern, group prefixes included, without surrounding slashes.
    pub fn pattern(&self) -> &str { self.pattern.as_str() }

    pub fn subdomain(&self) -> Option<&str> { self.subdomain.as_ref().map(Pattern::as_str) }

    pub fn is_websocket(&self) -> bool { matches!(self.target, Target::WebSocket(_)) }

    /// Middleware chain ending in this route's handler. WebSocket routes end
    /// in the upgrade marker instead.
    pub(crate) fn chain(&self) -> Next {
        let terminal: BoxedHandler = match &self.target {
            Target::Http(handler) => Arc::clone(handler),
            Target::WebSocket(_) => Arc::new(UpgradeHandler),
        };
        Next::new(Arc::clone(&self.middleware), terminal)
    }

    pub(crate) fn websocket_handler(&self) -> Option<&BoxedWsHandler> {
        match &self.target {
            Target::WebSocket(handler) => Some(handler),
            Target::Http(_) => None,
        }
    }

    fn matches(
        &self,
        host_labels: &[&str],
        path: &[&str],
        params: &mut HashMap<String, String>,
    ) -> bool {
        let mut captured = HashMap::new();
        if let Some(subdomain) = &self.subdomain {
            if !subdomain.matches(host_labels, &mut captured) {
                return false;
            }
        }
        if !self.pattern.matches(path, &mut captured) {
            return false;
        }
        params.extend(captured);
        true
    }
}

/// A successful lookup.
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: HashMap<String, String>,
}

/// The frozen route table produced by [`Router::build`](crate::Router::build).
///
/// Holds two sets, ordinary request routes and WebSocket upgrade routes, each
/// searched in registration order. Shared read-only across connections.
pub struct Routes {
    pub(crate) http: Vec<Route>,
    pub(crate) websocket: Vec<Route>,
    pub(crate) subdomain_offset: usize,
}

impl Routes {
    /// Number of trailing host labels treated as the site domain when
    /// extracting subdomains. Defaults to 2 (`tracker.com`).
    pub fn with_subdomain_offset(mut self, offset: usize) -> Self {
        self.subdomain_offset = offset;
        self
    }

    /// First request route matching `method`, `host`, and `path`.
    pub fn lookup(&self, method: Method, host: &str, path: &str) -> Option<RouteMatch<'_>> {
        self.search(&self.http, method, host, path)
    }

    /// First WebSocket route matching `method`, `host` and `path`. WebSocket
    /// routes are registered for `GET` only.
    pub fn lookup_websocket(&self, method: Method, host: &str, path: &str) -> Option<RouteMatch<'_>> {
        self.search(&self.websocket, method, host, path)
    }

    pub fn len(&self) -> usize {
        self.http.len() + self.websocket.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn search<'a>(
        &self,
        routes: &'a [Route],
        method: Method,
        host: &str,
        path: &str,
    ) -> Option<RouteMatch<'a>> {
        let host_labels = subdomain_labels(host, self.subdomain_offset);
        let path: Vec<&str> = path.trim_matches('/').split('/').collect();

        routes
            .iter()
            .filter(|route| route.method == method)
            .find_map(|route| {
                let mut params = HashMap::new();
                route
                    .matches(&host_labels, &path, &mut params)
                    .then_some(RouteMatch { route, params })
            })
    }
}
