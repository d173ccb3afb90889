//! Accept loop, per-connection dispatch, and graceful shutdown.
//!
//! # Connection lifecycle
//!
//! Every accepted socket gets a [`Connection`] whose read loop feeds a
//! [`RequestDecoder`] until one full request is buffered. The request is then
//! routed:
//!
//! - an upgrade request matching a WebSocket route runs that route's
//!   middleware; if the chain lets it through, the server answers `101` and
//!   the socket becomes a [`WebSocket`] session until either side closes;
//! - anything else runs the matching route's chain (or gets `404`), the
//!   response is serialized, written, and the connection is closed. There is
//!   no keep-alive.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **Ctrl-C** the server stops accepting, lets every
//! in-flight connection task run to completion, then returns from
//! [`Server::serve`]. Open WebSocket sessions count as in-flight.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, error, info, warn};

use crate::codec::{ParseError, RequestDecoder, encode_response};
use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::Error;
use crate::request::Request;
use crate::response::{ContentType, Response};
use crate::router::{RouteMatch, Router, Routes};
use crate::status::Status;
use crate::view::ViewRenderer;
use crate::websocket::{WebSocket, handshake_response, is_upgrade_request};

/// The HTTP/WebSocket server.
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    views: Option<Arc<dyn ViewRenderer>>,
}

/// Everything a connection task needs, shared read-only.
struct App {
    routes: Routes,
    config: ServerConfig,
    views: Option<Arc<dyn ViewRenderer>>,
}

impl Server {
    /// Binds `addr` right away. Port `0` picks a free port; read it back
    /// with [`local_addr`](Server::local_addr).
    ///
    /// ```rust,no_run
    /// # async fn run() -> Result<(), tether::Error> {
    /// let server = tether::Server::bind("127.0.0.1:0").await?;
    /// println!("listening on {}", server.local_addr()?);
    /// # Ok(()) }
    /// ```
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, Error> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, config: ServerConfig::default(), views: None })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Renders [`Response::view`] annotations before responses are written.
    pub fn with_views(mut self, views: impl ViewRenderer) -> Self {
        self.views = Some(Arc::new(views));
        self
    }

    /// Serves `router` until SIGTERM or Ctrl-C, then drains in-flight
    /// connections.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but stops accepting when `signal`
    /// resolves.
    pub async fn serve_with_shutdown(
        self,
        router: Router,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let addr = self.listener.local_addr()?;
        let app = Arc::new(App {
            routes: router.build().with_subdomain_offset(self.config.subdomain_offset),
            config: self.config,
            views: self.views,
        });

        info!(%addr, routes = app.routes.len(), "tether listening");

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Shutdown wins over queued connections.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = self.listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };
                    tasks.spawn(handle_connection(Arc::clone(&app), stream, peer));
                }

                // Reap finished tasks so the set stays small.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("tether stopped");
        Ok(())
    }
}

// ── Per-connection flow ───────────────────────────────────────────────────────

async fn handle_connection(app: Arc<App>, stream: TcpStream, peer: SocketAddr) {
    let conn = Connection::new(stream, app.config.max_chunk_size);
    let mut chunks = conn.subscribe();
    tokio::spawn({
        let conn = Arc::clone(&conn);
        async move { conn.listen().await }
    });

    let mut decoder = RequestDecoder::new(app.config.max_request_size);
    let mut req = loop {
        let Some(chunk) = chunks.recv().await else {
            debug!(%peer, "connection closed before a full request arrived");
            conn.close().await;
            return;
        };
        match decoder.feed(&chunk) {
            Ok(Some(req)) => break req,
            Ok(None) => {}
            Err(e) => {
                reject(&conn, peer, e).await;
                return;
            }
        }
    };

    if is_upgrade_request(&req) {
        let found = app.routes.lookup_websocket(req.method(), req.host(), req.path());
        if let Some(RouteMatch { route, params }) = found {
            for (key, value) in params {
                req.set_param(key, value);
            }
            let res = Response::for_request(&req);
            let mut res = route.chain().run(req, res).await;

            let Some(upgrade) = res.bag.upgrade.take() else {
                // A middleware answered instead of letting the upgrade through.
                write_response(&conn, peer, res).await;
                return;
            };
            match handshake_response(&upgrade) {
                Ok(handshake) => {
                    if let Err(e) = conn.write(&encode_response(&handshake)).await {
                        error!(%peer, "handshake write failed: {e}");
                        conn.close().await;
                        return;
                    }
                    debug!(%peer, path = upgrade.path(), "websocket upgraded");
                    let ws = WebSocket::new(Arc::clone(&conn), app.config.max_frame_size);
                    if let Some(handler) = route.websocket_handler() {
                        handler(*upgrade, ws.clone());
                    }
                    ws.run(decoder.into_remaining(), chunks).await;
                    return;
                }
                Err(e) => {
                    debug!(%peer, "upgrade refused, serving as plain http: {e}");
                    req = *upgrade;
                }
            }
        }
    }

    let res = dispatch(&app, req).await;
    write_response(&conn, peer, res).await;
}

/// Routes one ordinary request and produces its response.
async fn dispatch(app: &App, mut req: Request) -> Response {
    let method = req.method();
    let path = req.path().to_owned();

    let res = match app.routes.lookup(method, req.host(), req.path()) {
        Some(RouteMatch { route, params }) => {
            for (key, value) in params {
                req.set_param(key, value);
            }
            let res = Response::for_request(&req);
            let res = route.chain().run(req, res).await;
            render_view(app.views.as_deref(), res)
        }
        None => Response::for_request(&req).with_status(Status::NotFound),
    };

    debug!(%method, %path, status = res.status_code(), "dispatched");
    res
}

/// Replaces the body with the rendered view, if both a renderer and a view
/// annotation are present.
fn render_view(views: Option<&dyn ViewRenderer>, res: Response) -> Response {
    let (Some(views), Some(view)) = (views, res.bag.view.as_ref()) else {
        return res;
    };
    match views.render(&view.name, &view.data) {
        Ok(body) => res.with_body(ContentType::Html, body),
        Err(e) => {
            error!("{}", Error::from(e));
            let mut failed = Response::status(Status::InternalServerError);
            failed.version = res.version;
            failed
        }
    }
}

/// Answers a request that could not be decoded. Only an unknown method and an
/// oversized request get a response; anything else is dropped silently.
async fn reject(conn: &Connection, peer: SocketAddr, err: ParseError) {
    let status = match &err {
        ParseError::UnknownMethod(_) => Some(Status::MethodNotAllowed),
        ParseError::TooLarge { .. } => Some(Status::ContentTooLarge),
        _ => None,
    };
    warn!(%peer, "rejecting request: {err}");
    match status {
        Some(status) => write_response(conn, peer, Response::status(status)).await,
        None => conn.close().await,
    }
}

async fn write_response(conn: &Connection, peer: SocketAddr, res: Response) {
    if let Err(e) = conn.write(&encode_response(&res)).await {
        error!(%peer, "write failed: {e}");
    }
    conn.close().await;
    debug!(%peer, "connection closed");
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM (Unix) or Ctrl-C.
///
/// A handler that fails to install is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = sigterm => {}
    }
}
