//! Template rendering hook.
//!
//! tether ships no template engine. A handler returns
//! [`Response::view`](crate::Response::view); when the server was given a
//! renderer through [`Server::with_views`](crate::Server::with_views), the
//! named view is rendered into a `text/html` body before the response is
//! written.

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("view `{0}` not found")]
    NotFound(String),

    #[error("rendering `{name}` failed: {reason}")]
    Failed { name: String, reason: String },
}

pub trait ViewRenderer: Send + Sync + 'static {
    fn render(&self, name: &str, data: &Value) -> Result<Vec<u8>, RenderError>;
}

impl<F> ViewRenderer for F
where
    F: Fn(&str, &Value) -> Result<Vec<u8>, RenderError> + Send + Sync + 'static,
{
    fn render(&self, name: &str, data: &Value) -> Result<Vec<u8>, RenderError> {
        self(name, data)
    }
}
