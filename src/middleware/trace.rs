use std::time::Instant;

use tracing::{Instrument, field, info, info_span};

use super::Next;
use crate::request::Request;
use crate::response::Response;

/// Wraps the rest of the chain in a `request` span and logs one line when
/// the response is ready.
///
/// ```rust,no_run
/// use tether::{Router, middleware};
///
/// let app = Router::new().middleware(middleware::trace);
/// ```
pub async fn trace(req: Request, res: Response, next: Next) -> Response {
    let span = info_span!(
        "request",
        method = %req.method(),
        path = %req.path(),
        status = field::Empty,
        latency_ms = field::Empty,
    );
    let start = Instant::now();

    let res = next.run(req, res).instrument(span.clone()).await;

    let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    span.record("status", res.status_code());
    span.record("latency_ms", latency_ms);
    info!(parent: &span, status = res.status_code(), latency_ms, "request completed");
    res
}
