//! Per-socket connection manager.
//!
//! A [`Connection`] owns one accepted TCP stream. [`listen`](Connection::listen)
//! reads it chunk by chunk and hands every chunk to every observer. Each
//! observer has its own FIFO queue drained by its own task, so a slow
//! observer never holds up the others, and one observer always sees chunks in
//! the order they were read.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex as AsyncMutex, Notify, mpsc};
use tracing::debug;

use crate::error::Error;

/// One accepted TCP stream, shared behind an `Arc` by the read loop, the
/// request handler and any WebSocket session built on top of it.
pub struct Connection {
    peer: Option<SocketAddr>,
    max_chunk_size: usize,
    alive: AtomicBool,
    closed: AtomicBool,
    shutdown: Notify,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: AsyncMutex<OwnedWriteHalf>,
    observers: Mutex<Vec<mpsc::UnboundedSender<Bytes>>>,
}

impl Connection {
    /// Wraps an accepted stream. Reads are at most `max_chunk_size` bytes.
    pub fn new(stream: TcpStream, max_chunk_size: usize) -> Arc<Self> {
        let peer = stream.peer_addr().ok();
        let (reader, writer) = stream.into_split();
        Arc::new(Self {
            peer,
            max_chunk_size: max_chunk_size.max(1),
            alive: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            shutdown: Notify::new(),
            reader: Mutex::new(Some(reader)),
            writer: AsyncMutex::new(writer),
            observers: Mutex::new(Vec::new()),
        })
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// False once a read or write failed, the peer hung up, or
    /// [`close`](Self::close) ran.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Writes all of `bytes`. A failure marks the connection dead.
    pub async fn write(&self, bytes: &[u8]) -> Result<(), Error> {
        if !self.is_alive() {
            return Err(Error::ConnectionClosed);
        }
        let mut writer = self.writer.lock().await;
        let result = async {
            writer.write_all(bytes).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = result {
            self.alive.store(false, Ordering::Release);
            return Err(e.into());
        }
        Ok(())
    }

    /// A queue receiving every chunk read from now on. It ends when the read
    /// loop stops.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Bytes> {
        let (tx, rx) = mpsc::unbounded_channel();
        // Checked under the lock so `listen` cannot clear the list in between.
        let mut observers = lock(&self.observers);
        if self.is_alive() {
            observers.push(tx);
        }
        rx
    }

    /// Registers `observer`, called once per chunk on a dedicated task.
    pub fn observe<F, Fut>(&self, mut observer: F)
    where
        F: FnMut(Bytes) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut chunks = self.subscribe();
        tokio::spawn(async move {
            while let Some(chunk) = chunks.recv().await {
                observer(chunk).await;
            }
        });
    }

    /// Reads until EOF, a read error, or [`close`](Self::close).
    ///
    /// Only the first call reads; later calls return immediately.
    pub async fn listen(&self) {
        let Some(mut reader) = lock(&self.reader).take() else {
            return;
        };
        let mut buf = vec![0u8; self.max_chunk_size];

        loop {
            tokio::select! {
                read = reader.read(&mut buf) => match read {
                    Ok(0) => {
                        debug!(peer = ?self.peer, "peer closed connection");
                        break;
                    }
                    Ok(n) => self.fan_out(Bytes::copy_from_slice(&buf[..n])),
                    Err(e) => {
                        debug!(peer = ?self.peer, "read error: {e}");
                        break;
                    }
                },
                () = self.shutdown.notified() => break,
            }
        }

        self.alive.store(false, Ordering::Release);
        // Dropping the senders ends every observer queue.
        lock(&self.observers).clear();
    }

    /// Stops the read loop and shuts the socket down. Safe to call repeatedly.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.alive.store(false, Ordering::Release);
        self.shutdown.notify_one();
        if let Err(e) = self.writer.lock().await.shutdown().await {
            debug!(peer = ?self.peer, "shutdown error: {e}");
        }
    }

    fn fan_out(&self, chunk: Bytes) {
        lock(&self.observers).retain(|tx| tx.send(chunk.clone()).is_ok());
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
