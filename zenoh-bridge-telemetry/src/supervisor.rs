//! Connection supervision for one telemetry source.
//!
//! A [`Supervisor`] owns its socket and partial-frame buffer and loops
//! through `Disconnected -> Connecting -> Connected -> Disconnected` until
//! shutdown. In listen mode, Connecting waits for the next inbound peer; in
//! dial mode it connects out, pausing for the reconnect delay between
//! attempts. Transport failures are never fatal.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time;

use crate::buffer::FrameBuffer;
use crate::codec::FrameError;
use crate::config::{ConnectionConfig, SourceConfig};
use crate::pipeline::FramePipeline;

/// Pause between attempts when none is configured.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Upper bound on a single outbound connect.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Frames read per syscall, at most.
const READ_FRAMES: usize = 64;

/// Connection lifecycle of a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// How a source reaches the data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// Wait for the data source to connect to us.
    Listen { bind: String },
    /// Connect to the data source.
    Dial { addr: String },
}

impl Transport {
    pub fn is_dial(&self) -> bool {
        matches!(self, Transport::Dial { .. })
    }
}

impl From<&ConnectionConfig> for Transport {
    fn from(config: &ConnectionConfig) -> Self {
        match config {
            ConnectionConfig::Listen { host, port } => Transport::Listen {
                bind: format!("{}:{}", host, port),
            },
            ConnectionConfig::Dial { host, port, .. } => Transport::Dial {
                addr: format!("{}:{}", host, port),
            },
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Listen { bind } => write!(f, "listen://{}", bind),
            Transport::Dial { addr } => write!(f, "dial://{}", addr),
        }
    }
}

/// Why a connected stream stopped producing frames.
#[derive(Debug)]
pub enum DisconnectReason {
    /// Clean end of stream on a frame boundary.
    PeerClosed,
    /// End of stream with an incomplete frame buffered.
    PeerClosedMidFrame { buffered: usize },
    /// Read failed (reset, aborted, ...).
    Io(io::Error),
    /// Nothing arrived within the idle timeout.
    IdleTimeout,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::PeerClosed => write!(f, "peer closed the connection"),
            DisconnectReason::PeerClosedMidFrame { buffered } => write!(
                f,
                "peer closed the connection with {} bytes of an incomplete frame",
                buffered
            ),
            DisconnectReason::Io(e) => write!(f, "read error: {}", e),
            DisconnectReason::IdleTimeout => write!(f, "idle timeout"),
        }
    }
}

/// Read frames from `reader` into `pipeline` until the stream ends or fails.
///
/// Reads may split or merge frames arbitrarily; only complete frames reach
/// the pipeline.
pub async fn pump_frames<R>(
    reader: &mut R,
    pipeline: &FramePipeline,
    idle_timeout: Option<Duration>,
) -> DisconnectReason
where
    R: AsyncRead + Unpin,
{
    let frame_len = pipeline.frame_len();
    let mut buffer = FrameBuffer::new(frame_len);
    let mut chunk = vec![0u8; frame_len * READ_FRAMES];

    loop {
        let read = match idle_timeout {
            Some(limit) => match time::timeout(limit, reader.read(&mut chunk)).await {
                Ok(read) => read,
                Err(_) => return DisconnectReason::IdleTimeout,
            },
            None => reader.read(&mut chunk).await,
        };

        match read {
            Ok(0) => {
                let buffered = buffer.pending();
                if buffered == 0 {
                    return DisconnectReason::PeerClosed;
                }
                let error = FrameError::Framing {
                    expected: frame_len,
                    actual: buffered,
                };
                pipeline.events().on_frame_error(pipeline.source(), &error);
                return DisconnectReason::PeerClosedMidFrame { buffered };
            }
            Ok(n) => {
                buffer.extend(&chunk[..n]);
                while let Some(frame) = buffer.next_frame() {
                    pipeline.process(frame);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return DisconnectReason::Io(e),
        }
    }
}

/// Resolves once shutdown is signalled or the signal's sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Reconnecting reader for one source.
pub struct Supervisor {
    name: String,
    transport: Transport,
    reconnect_delay: Duration,
    idle_timeout: Option<Duration>,
    listener: Option<TcpListener>,
    pipeline: FramePipeline,
    state: ConnectionState,
}

impl Supervisor {
    /// Create a supervisor for `source`, feeding frames into `pipeline`.
    pub fn new(source: &SourceConfig, pipeline: &FramePipeline) -> Self {
        let reconnect_delay = match &source.connection {
            ConnectionConfig::Dial {
                reconnect_delay_secs: Some(secs),
                ..
            } => Duration::from_secs(*secs),
            _ => DEFAULT_RECONNECT_DELAY,
        };

        Self {
            name: source.name.clone(),
            transport: Transport::from(&source.connection),
            reconnect_delay,
            idle_timeout: source.idle_timeout(),
            listener: None,
            pipeline: pipeline.for_source(&source.name),
            state: ConnectionState::Disconnected,
        }
    }

    /// Serve inbound connections from an already bound listener.
    pub fn with_listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Supervise the source until `shutdown` flips to `true`.
    ///
    /// Always returns in [`ConnectionState::Disconnected`], dropping any live
    /// socket and listener.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(source = %self.name, transport = %self.transport, "Supervisor started");

        loop {
            self.transition(ConnectionState::Connecting);

            let attempt = tokio::select! {
                _ = shutdown_requested(&mut shutdown) => None,
                result = self.establish() => Some(result),
            };
            let Some(attempt) = attempt else {
                break;
            };

            let (mut stream, peer) = match attempt {
                Ok(connection) => connection,
                Err(e) => {
                    tracing::warn!(
                        source = %self.name,
                        transport = %self.transport,
                        error = %e,
                        "Connection attempt failed"
                    );
                    self.transition(ConnectionState::Disconnected);
                    if !self.backoff(&mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };

            self.transition(ConnectionState::Connected);
            tracing::info!(source = %self.name, peer = %peer, "Data source connected");

            let reason = tokio::select! {
                _ = shutdown_requested(&mut shutdown) => None,
                reason = pump_frames(&mut stream, &self.pipeline, self.idle_timeout) => Some(reason),
            };
            drop(stream);
            self.transition(ConnectionState::Disconnected);

            let Some(reason) = reason else {
                break;
            };
            match reason {
                DisconnectReason::PeerClosed => {
                    tracing::info!(source = %self.name, peer = %peer, "Data source disconnected");
                }
                reason => {
                    tracing::warn!(source = %self.name, peer = %peer, reason = %reason, "Connection lost");
                }
            }

            if self.transport.is_dial() && !self.backoff(&mut shutdown).await {
                break;
            }
        }

        self.transition(ConnectionState::Disconnected);
        tracing::info!(source = %self.name, "Supervisor stopped");
    }

    /// Accept or dial one connection.
    async fn establish(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        match &self.transport {
            Transport::Listen { bind } => {
                let listener = match self.listener.take() {
                    Some(listener) => listener,
                    None => {
                        let listener = TcpListener::bind(bind.as_str()).await?;
                        tracing::info!(source = %self.name, bind = %bind, "Listening for data source");
                        listener
                    }
                };
                let accepted = listener.accept().await;
                self.listener = Some(listener);
                accepted
            }
            Transport::Dial { addr } => {
                let stream = time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr.as_str()))
                    .await
                    .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
                let peer = stream.peer_addr()?;
                Ok((stream, peer))
            }
        }
    }

    /// Sleep for the reconnect delay. Returns `false` if shutdown came first.
    async fn backoff(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tracing::debug!(
            source = %self.name,
            delay_ms = self.reconnect_delay.as_millis() as u64,
            "Waiting before reconnecting"
        );
        tokio::select! {
            _ = shutdown_requested(shutdown) => false,
            _ = time::sleep(self.reconnect_delay) => true,
        }
    }

    fn transition(&mut self, to: ConnectionState) {
        if self.state == to {
            return;
        }
        let from = std::mem::replace(&mut self.state, to);
        self.pipeline
            .events()
            .on_connection_state_change(&self.name, from, to);
    }
}
