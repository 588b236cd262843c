//! TCP listener lifecycle and the per-connection loop.
//!
//! One accept loop, one spawned task per connection. Each task reads a
//! single complete request (headers, then exactly `Content-Length` body
//! bytes), drives the pipeline, writes the response, and closes.

use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use memchr::memmem;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::error::{RavelError, RavelResult};
use crate::pipeline::Engine;

/// Cap on accumulated bytes before the header terminator shows up.
const MAX_HEAD_BYTES: usize = 1024 * 1024;
/// Hard cap on a whole request message.
const MAX_REQUEST_BYTES: usize = 64 * 1024 * 1024;

/// Guards against installing the shutdown signal handler more than once
/// across repeated server instantiations.
static SIGNAL_HANDLER_INSTALLED: AtomicBool = AtomicBool::new(false);

/// A configured server. Starts at most once; closing is idempotent and a
/// no-op before `listen`.
pub struct Server {
    engine: Arc<Engine>,
    started: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    local_addr: OnceLock<std::net::SocketAddr>,
}

impl Server {
    /// Build a server around a finished engine. Ports outside 1-65535 are
    /// rejected here, before any socket work.
    pub fn new(engine: Engine) -> RavelResult<Self> {
        if engine.config.port == 0 {
            return Err(RavelError::InvalidPort);
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Server {
            engine: Arc::new(engine),
            started: AtomicBool::new(false),
            shutdown_tx,
            shutdown_rx,
            local_addr: OnceLock::new(),
        })
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn listen(&self) -> RavelResult<()> {
        let addr = self.engine.config.server_addr();
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("ravel listening on http://{addr}");
        self.serve_on(listener).await
    }

    /// Serve on an already-bound listener. Used by `listen` and by the
    /// test harness, which binds an ephemeral port itself.
    pub(crate) async fn serve_on(&self, listener: TcpListener) -> RavelResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(RavelError::AlreadyListening);
        }
        let mut shutdown = self.shutdown_rx.clone();
        let _ = self.local_addr.set(listener.local_addr()?);

        if self.engine.config.auto_graceful_shutdown
            && !SIGNAL_HANDLER_INSTALLED.swap(true, Ordering::SeqCst)
        {
            let tx = self.shutdown_tx.clone();
            tokio::spawn(async move {
                wait_for_signal().await;
                tracing::info!("shutdown signal received, closing ravel server");
                let _ = tx.send(true);
            });
        }

        // A close() racing the startup sequence may have already flipped
        // the flag; honor it instead of waiting for the next change.
        if *shutdown.borrow_and_update() {
            return Ok(());
        }

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    tracing::info!("ravel server shutting down");
                    break;
                }
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let _ = stream.set_nodelay(true);
                            let engine = self.engine.clone();
                            tokio::spawn(async move {
                                handle_connection(engine, stream, peer).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!("TCP accept error: {e}");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Signal the accept loop to stop. Safe to call repeatedly; before
    /// `listen` it does nothing.
    pub fn close(&self) {
        if self.started.load(Ordering::SeqCst) {
            let _ = self.shutdown_tx.send(true);
        }
    }

    /// The bound address, available once serving has started.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.local_addr.get().copied()
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(term) => term,
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Read one request, respond, close. A client that disappears mid-write
/// just ends the task; the pipeline itself never aborts a response.
async fn handle_connection(engine: Arc<Engine>, mut stream: TcpStream, peer: std::net::SocketAddr) {
    let raw = match read_request(&mut stream).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!("connection read error from {peer}: {e}");
            return;
        }
    };
    if raw.is_empty() {
        return;
    }

    tracing::debug!(peer = %peer, bytes = raw.len(), "request received");
    let response = engine.handle_bytes(&raw, Some(peer.ip())).await;

    if let Err(e) = stream.write_all(&response).await {
        tracing::debug!("response write to {peer} failed: {e}");
        return;
    }
    let _ = stream.shutdown().await;
}

/// Accumulate bytes until the header block is complete, then read exactly
/// `Content-Length` more. An early EOF returns whatever arrived; the
/// parser degrades from there.
async fn read_request(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];

    // Phase one: the header block.
    let head_end = loop {
        if let Some(i) = memmem::find(&buf, b"\r\n\r\n") {
            break i;
        }
        if buf.len() >= MAX_HEAD_BYTES {
            return Ok(buf);
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(buf);
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    // Phase two: exactly Content-Length body bytes.
    let content_length = parse_content_length(&buf[..head_end]).unwrap_or(0);
    let total = (head_end + 4)
        .saturating_add(content_length)
        .min(MAX_REQUEST_BYTES);
    while buf.len() < total {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    buf.truncate(total);
    Ok(buf)
}

/// Scan the raw head for a Content-Length line without running the full
/// header parser.
fn parse_content_length(head: &[u8]) -> Option<usize> {
    for line in head.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.len() >= 15 && line[..15].eq_ignore_ascii_case(b"content-length:") {
            return std::str::from_utf8(&line[15..]).ok()?.trim().parse().ok();
        }
    }
    None
}
