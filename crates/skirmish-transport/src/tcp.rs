//! TCP transport: the listen socket and the per-connection [`TcpLink`].

use std::net::SocketAddr;
use std::sync::Arc;

use skirmish_protocol::SessionId;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Handle;
use tokio::sync::{Mutex, watch};

use crate::{Completion, CompletionSender, IoOp, Link, TransportError};

/// Listens for incoming TCP connections.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Binds a listener to `addr` (use port 0 for an ephemeral port).
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self { listener })
    }

    /// Waits for the next connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        // Snapshots are small and latency-sensitive.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%addr, error = %e, "set_nodelay failed");
        }
        Ok((stream, addr))
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener.local_addr().map_err(TransportError::LocalAddr)
    }
}

/// A [`Link`] over one TCP connection.
///
/// Every operation is spawned onto the runtime behind `runtime` and reports
/// back through the completion port, so the methods can be called from any
/// thread (reactor workers and the game loop are plain OS threads).
pub struct TcpLink {
    session: SessionId,
    reader: Arc<Mutex<OwnedReadHalf>>,
    writer: Arc<Mutex<OwnedWriteHalf>>,
    port: CompletionSender,
    runtime: Handle,
    /// Flips to `true` on close; pending receives watch it and bail out.
    closed: watch::Sender<bool>,
}

impl TcpLink {
    /// Wraps an accepted stream for `session`.
    pub fn new(session: SessionId, stream: TcpStream, port: CompletionSender, runtime: Handle) -> Self {
        let (reader, writer) = stream.into_split();
        let (closed, _) = watch::channel(false);
        Self {
            session,
            reader: Arc::new(Mutex::new(reader)),
            writer: Arc::new(Mutex::new(writer)),
            port,
            runtime,
            closed,
        }
    }
}

impl Link for TcpLink {
    fn arm_receive(&self, max_len: usize) {
        let session = self.session;
        let reader = Arc::clone(&self.reader);
        let port = self.port.clone();
        let mut closed = self.closed.subscribe();

        self.runtime.spawn(async move {
            if *closed.borrow() {
                return;
            }
            let mut buf = vec![0u8; max_len];
            let mut reader = reader.lock().await;
            tokio::select! {
                result = reader.read(&mut buf) => {
                    let completion = match result {
                        Ok(n) => {
                            buf.truncate(n);
                            Completion::Received { session, data: buf }
                        }
                        Err(error) => Completion::Failed { session, op: IoOp::Receive, error },
                    };
                    port.post(completion);
                }
                // Closed locally (or the link was dropped): nothing to report.
                _ = closed.changed() => {}
            }
        });
    }

    fn begin_send(&self, frame: Vec<u8>) {
        let session = self.session;
        let writer = Arc::clone(&self.writer);
        let port = self.port.clone();

        self.runtime.spawn(async move {
            let result = writer.lock().await.write_all(&frame).await;
            let completion = match result {
                Ok(()) => Completion::Sent {
                    session,
                    bytes: frame.len(),
                },
                Err(error) => Completion::Failed {
                    session,
                    op: IoOp::Send,
                    error,
                },
            };
            port.post(completion);
        });
    }

    fn close(&self) {
        self.closed.send_replace(true);
        let writer = Arc::clone(&self.writer);
        let session = self.session;
        self.runtime.spawn(async move {
            if let Err(e) = writer.lock().await.shutdown().await {
                tracing::trace!(%session, error = %e, "shutdown of write half failed");
            }
        });
    }
}
