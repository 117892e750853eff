// SPDX-License-Identifier: MIT OR Apache-2.0
//! The core agent socket connection: one `AgentConnection` per engine.

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot};

use scout_protocol::{AgentRequest, AgentResponse, FramedCodec};

use crate::error::TransportError;
use crate::socket::SocketTarget;

/// Connection lifecycle events surfaced to subscribers.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The socket was opened successfully.
    Connected,
    /// The socket was closed, by either side.
    Disconnected,
    /// A send or receive failed; the connection may still be usable.
    ErrorReceived(String),
}

enum Command {
    Send(AgentRequest, oneshot::Sender<Result<AgentResponse, TransportError>>),
    SendAsync(AgentRequest),
    Disconnect(oneshot::Sender<()>),
}

/// One socket connection (Unix-domain or TCP) to the core agent.
///
/// Concurrent [`AgentConnection::send`] callers are serialized: each
/// request occupies the connection, half-duplex, until its response
/// arrives, queued in the order [`Command`]s reach the background task.
pub struct AgentConnection {
    cmd_tx: mpsc::Sender<Command>,
    events: broadcast::Sender<ConnectionEvent>,
    allow_shutdown: bool,
}

impl AgentConnection {
    /// Open a connection to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionFailed`] if the endpoint is
    /// unreachable.
    pub async fn connect(
        target: SocketTarget,
        allow_shutdown: bool,
    ) -> Result<Self, TransportError> {
        match target {
            SocketTarget::Unix(path) => {
                let stream = UnixStream::connect(&path).await.map_err(|source| {
                    TransportError::ConnectionFailed {
                        endpoint: path.display().to_string(),
                        source,
                    }
                })?;
                Ok(Self::spawn_with_stream(stream, allow_shutdown))
            }
            SocketTarget::Tcp(addr) => {
                let stream = TcpStream::connect(addr).await.map_err(|source| {
                    TransportError::ConnectionFailed {
                        endpoint: addr.to_string(),
                        source,
                    }
                })?;
                Ok(Self::spawn_with_stream(stream, allow_shutdown))
            }
        }
    }

    fn spawn_with_stream<S>(stream: S, allow_shutdown: bool) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let framed = tokio_util::codec::Framed::new(stream, FramedCodec::default());
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (event_tx, _) = broadcast::channel(64);

        let task_events = event_tx.clone();
        tokio::spawn(run(framed, cmd_rx, task_events));
        let _ = event_tx.send(ConnectionEvent::Connected);

        Self {
            cmd_tx,
            events: event_tx,
            allow_shutdown,
        }
    }

    /// Serialize `request`, send it, and await the matching response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionTaskGone`] if the connection's
    /// background task has already ended.
    pub async fn send(&self, request: AgentRequest) -> Result<AgentResponse, TransportError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Send(request, tx))
            .await
            .map_err(|_| TransportError::ConnectionTaskGone)?;
        rx.await.map_err(|_| TransportError::ConnectionTaskGone)?
    }

    /// Enqueue `request` for fire-and-forget delivery. Delivery order is
    /// preserved; failures are logged but not surfaced to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionTaskGone`] if the connection's
    /// background task has already ended.
    pub async fn send_async(&self, request: AgentRequest) -> Result<(), TransportError> {
        self.cmd_tx
            .send(Command::SendAsync(request))
            .await
            .map_err(|_| TransportError::ConnectionTaskGone)
    }

    /// Drain any in-flight send, then close the connection.
    pub async fn disconnect(&self) -> Result<(), TransportError> {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Disconnect(tx)).await.is_ok() {
            let _ = rx.await;
        }
        Ok(())
    }

    /// Ask the agent process to exit.
    ///
    /// The wire protocol has no dedicated "stop" request (see spec §4.C);
    /// closing the socket is how the core agent binary is told its caller
    /// is gone, so this closes the connection the same way
    /// [`Self::disconnect`] does, but only when shutdown is permitted.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ShutdownNotAllowed`] if `allowShutdown`
    /// was not enabled for this connection.
    pub async fn stop_process(&self) -> Result<(), TransportError> {
        if !self.allow_shutdown {
            return Err(TransportError::ShutdownNotAllowed);
        }
        self.disconnect().await
    }

    /// Subscribe to [`ConnectionEvent`]s: `Connected`, `Disconnected`,
    /// `ErrorReceived`.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }
}

async fn run<S>(
    mut framed: tokio_util::codec::Framed<S, FramedCodec>,
    mut cmd_rx: mpsc::Receiver<Command>,
    events: broadcast::Sender<ConnectionEvent>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            Command::Send(request, reply) => {
                if let Err(e) = framed.send(request).await {
                    let _ = events.send(ConnectionEvent::ErrorReceived(e.to_string()));
                    let _ = reply.send(Err(e.into()));
                    continue;
                }
                match framed.next().await {
                    Some(Ok(response)) => {
                        let _ = reply.send(Ok(response));
                    }
                    Some(Err(e)) => {
                        let _ = events.send(ConnectionEvent::ErrorReceived(e.to_string()));
                        let _ = reply.send(Err(e.into()));
                    }
                    None => {
                        let _ = reply.send(Err(TransportError::Disconnected));
                        let _ = events.send(ConnectionEvent::Disconnected);
                        return;
                    }
                }
            }
            Command::SendAsync(request) => {
                if let Err(e) = framed.send(request).await {
                    tracing::warn!(error = %e, "send_async delivery failed");
                    let _ = events.send(ConnectionEvent::ErrorReceived(e.to_string()));
                }
            }
            Command::Disconnect(ack) => {
                let _ = ack.send(());
                break;
            }
        }
    }
    let _ = events.send(ConnectionEvent::Disconnected);
}
