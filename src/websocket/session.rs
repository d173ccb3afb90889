//! Upgraded connection: frame loop plus event callbacks.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use super::frame::{self, Frame, FrameError, Opcode};
use crate::connection::{Connection, lock};
use crate::error::Error;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Callback = Arc<dyn Fn(WebSocket, Event) -> BoxFuture + Send + Sync>;
type ReadyCallback = Box<dyn FnOnce(WebSocket) -> BoxFuture + Send>;

/// A complete data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Bytes),
}

/// Something that happened on a session.
#[derive(Debug, Clone)]
pub enum Event {
    Ready,
    Message(Message),
    Ping(Bytes),
    Pong(Bytes),
    Close,
    Error(Arc<Error>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    Message,
    Ping,
    Pong,
    Close,
    Error,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Ready => EventKind::Ready,
            Self::Message(_) => EventKind::Message,
            Self::Ping(_) => EventKind::Ping,
            Self::Pong(_) => EventKind::Pong,
            Self::Close => EventKind::Close,
            Self::Error(_) => EventKind::Error,
        }
    }
}

/// Handle to an upgraded connection.
///
/// Cheap to clone; every clone drives the same session. A route handler
/// receives one, registers callbacks, and returns:
///
/// ```rust,no_run
/// # use tether::{Request, Router, WebSocket, Message};
/// Router::new().ws("echo", |_req: Request, ws: WebSocket| {
///     ws.on_ready(|ws| async move {
///         let _ = ws.send_text("welcome").await;
///     });
///     ws.on_message(|ws, msg| async move {
///         if let Message::Text(text) = msg {
///             let _ = ws.send_text(text).await;
///         }
///     });
/// });
/// ```
#[derive(Clone)]
pub struct WebSocket {
    inner: Arc<Inner>,
}

struct Inner {
    conn: Arc<Connection>,
    alive: AtomicBool,
    max_frame_size: usize,
    ready: Mutex<Vec<ReadyCallback>>,
    callbacks: Mutex<HashMap<EventKind, Vec<Callback>>>,
}

impl WebSocket {
    pub(crate) fn new(conn: Arc<Connection>, max_frame_size: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                conn,
                alive: AtomicBool::new(true),
                max_frame_size,
                ready: Mutex::new(Vec::new()),
                callbacks: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::Acquire) && self.inner.conn.is_alive()
    }

    // ── Callback registration ────────────────────────────────────────────────

    /// Runs once, on its own task, when the session starts.
    pub fn on_ready<F, Fut>(&self, callback: F)
    where
        F: FnOnce(WebSocket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: ReadyCallback = Box::new(move |ws: WebSocket| -> BoxFuture { Box::pin(callback(ws)) });
        lock(&self.inner.ready).push(callback);
    }

    pub fn on_message<F, Fut>(&self, callback: F)
    where
        F: Fn(WebSocket, Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.subscribe(EventKind::Message, move |ws, event| match event {
            Event::Message(msg) => Some(callback(ws, msg)),
            _ => None,
        });
    }

    pub fn on_ping<F, Fut>(&self, callback: F)
    where
        F: Fn(WebSocket, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.subscribe(EventKind::Ping, move |ws, event| match event {
            Event::Ping(payload) => Some(callback(ws, payload)),
            _ => None,
        });
    }

    pub fn on_pong<F, Fut>(&self, callback: F)
    where
        F: Fn(WebSocket, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.subscribe(EventKind::Pong, move |ws, event| match event {
            Event::Pong(payload) => Some(callback(ws, payload)),
            _ => None,
        });
    }

    pub fn on_close<F, Fut>(&self, callback: F)
    where
        F: Fn(WebSocket) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.subscribe(EventKind::Close, move |ws, event| match event {
            Event::Close => Some(callback(ws)),
            _ => None,
        });
    }

    pub fn on_error<F, Fut>(&self, callback: F)
    where
        F: Fn(WebSocket, Arc<Error>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.subscribe(EventKind::Error, move |ws, event| match event {
            Event::Error(err) => Some(callback(ws, err)),
            _ => None,
        });
    }

    fn subscribe<F, Fut>(&self, kind: EventKind, callback: F)
    where
        F: Fn(WebSocket, Event) -> Option<Fut> + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: Callback = Arc::new(move |ws: WebSocket, event: Event| -> BoxFuture {
            let fut = callback(ws, event);
            Box::pin(async move {
                if let Some(fut) = fut {
                    fut.await;
                }
            })
        });
        lock(&self.inner.callbacks).entry(kind).or_default().push(callback);
    }

    /// Delivers `event` to its callbacks.
    ///
    /// Ready callbacks are drained and each spawned as its own task. Every
    /// other kind runs its callbacks one after another in registration order.
    pub async fn emit(&self, event: Event) {
        if let Event::Ready = event {
            let ready = std::mem::take(&mut *lock(&self.inner.ready));
            for callback in ready {
                tokio::spawn(callback(self.clone()));
            }
            return;
        }

        let callbacks = lock(&self.inner.callbacks)
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();
        for callback in callbacks {
            callback(self.clone(), event.clone()).await;
        }
    }

    // ── Sending ──────────────────────────────────────────────────────────────

    pub async fn send(&self, frame: Frame) -> Result<(), Error> {
        if !self.inner.alive.load(Ordering::Acquire) {
            return Err(Error::ConnectionClosed);
        }
        self.inner.conn.write(&frame.encode()).await.inspect_err(|e| {
            tracing::error!(peer = ?self.inner.conn.peer_addr(), "websocket write failed: {e}");
        })
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), Error> {
        self.send(Frame::text(text)).await
    }

    pub async fn send_binary(&self, data: impl Into<Bytes>) -> Result<(), Error> {
        self.send(Frame::binary(data)).await
    }

    pub async fn ping(&self, payload: impl Into<Bytes>) -> Result<(), Error> {
        self.send(Frame::new(Opcode::Ping, payload)).await
    }

    /// Sends a close frame and shuts the connection down. The frame loop then
    /// ends without emitting `error`.
    pub async fn close(&self) {
        self.shutdown(Bytes::new()).await;
    }

    async fn shutdown(&self, payload: Bytes) {
        if !self.inner.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        let close = Frame::new(Opcode::Close, payload).encode();
        if let Err(e) = self.inner.conn.write(&close).await {
            debug!("close frame not delivered: {e}");
        }
        self.inner.conn.close().await;
        debug!(peer = ?self.inner.conn.peer_addr(), "websocket closed");
    }

    // ── Frame loop ───────────────────────────────────────────────────────────

    /// Emits `ready`, then decodes frames from `buf` and every later chunk
    /// until the peer closes, the socket fails, or the session is closed.
    pub(crate) async fn run(self, mut buf: BytesMut, mut chunks: UnboundedReceiver<Bytes>) {
        self.emit(Event::Ready).await;

        loop {
            loop {
                // A local close() drops whatever is still buffered.
                if !self.inner.alive.load(Ordering::Acquire) {
                    return;
                }
                match frame::decode(&mut buf, self.inner.max_frame_size) {
                    Ok(Some(frame)) => {
                        if !self.dispatch(frame).await {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(e @ FrameError::TooLarge { .. }) => {
                        warn!("closing websocket: {e}");
                        self.fail(e.into()).await;
                        self.shutdown(Bytes::new()).await;
                        return;
                    }
                    Err(e) => warn!("skipping websocket frame: {e}"),
                }
            }

            match chunks.recv().await {
                Some(chunk) => buf.extend_from_slice(&chunk),
                None => {
                    if self.inner.alive.swap(false, Ordering::AcqRel) {
                        self.fail(Error::ConnectionClosed).await;
                    }
                    return;
                }
            }
        }
    }

    /// Handles one frame. Returns false once the session is over.
    async fn dispatch(&self, frame: Frame) -> bool {
        match frame.opcode {
            Opcode::Text => match String::from_utf8(frame.payload.to_vec()) {
                Ok(text) => self.emit(Event::Message(Message::Text(text))).await,
                Err(_) => warn!("skipping websocket frame: {}", FrameError::InvalidUtf8),
            },
            Opcode::Binary => self.emit(Event::Message(Message::Binary(frame.payload))).await,
            Opcode::Ping => {
                self.emit(Event::Ping(frame.payload.clone())).await;
                if let Err(e) = self.send(Frame::new(Opcode::Pong, frame.payload)).await {
                    debug!("pong not delivered: {e}");
                }
            }
            Opcode::Pong => self.emit(Event::Pong(frame.payload)).await,
            Opcode::Close => {
                self.emit(Event::Close).await;
                self.shutdown(frame.payload).await;
                return false;
            }
            Opcode::Continuation => warn!("skipping continuation frame: fragmentation unsupported"),
        }
        true
    }

    async fn fail(&self, err: Error) {
        self.emit(Event::Error(Arc::new(err))).await;
    }
}
