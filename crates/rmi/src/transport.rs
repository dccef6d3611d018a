//! # Invocation Transport
//!
//! Moves one encoded call to a skeleton and brings one encoded outcome back.
//!
//! ## Philosophy
//!
//! - **Byte-Oriented**: a transport knows nothing about frames or values. It
//!   moves opaque buffers.
//! - **Request-Response**: "send bytes, await bytes". The TCP transport opens
//!   a fresh connection per call and closes it when the call is done, so
//!   concurrent calls never share transport state.
//!
//! On the stream, every buffer is preceded by its length as a little-endian
//! `u32`.

use std::fmt;
use std::io;

use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::address::RemoteAddress;
use crate::config::StubConfig;
use crate::fault::FailureKind;
use crate::fault::Fault;

/// Errors that occur at the network/transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No connection could be made (refused, unreachable, unresolvable).
    Connect(String),
    /// The connection broke or ended before a whole frame arrived.
    ConnectionLost(String),
    /// The operation timed out before a response was received.
    Timeout,
    /// A frame exceeded the configured limit.
    PayloadTooLarge(usize),
    /// Generic I/O error.
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(msg) => write!(f, "Connection failed: {}", msg),
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::Timeout => write!(f, "Request timed out"),
            Self::PayloadTooLarge(len) => write!(f, "Frame of {} bytes is too large", len),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::ConnectionLost(e.to_string()),
            io::ErrorKind::TimedOut => Self::Timeout,
            _ => Self::Io(e.to_string()),
        }
    }
}

/// Transport trouble always reaches the caller as a remote failure.
impl From<TransportError> for Fault {
    fn from(e: TransportError) -> Self {
        let kind = match e {
            TransportError::Connect(_) => FailureKind::Connect,
            TransportError::Timeout => FailureKind::Timeout,
            _ => FailureKind::Transport,
        };
        Fault::remote(kind, e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// A mechanism to send a byte buffer and receive a reply.
///
/// This trait is designed to be object-safe (`Arc<dyn Transport>`).
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends a payload and waits for the reply.
    ///
    /// # invariants
    /// - Must return `Ok(vec)` with the raw reply bytes on success.
    /// - Must return `Err` if the network fails; never an empty reply.
    /// - Should not interpret the payload content.
    async fn call(&self, payload: &[u8]) -> Result<Vec<u8>>;
}

/// One TCP connection per call.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    address: RemoteAddress,
    config: StubConfig,
}

impl TcpTransport {
    pub fn new(address: RemoteAddress, config: StubConfig) -> Self {
        Self { address, config }
    }

    async fn connect(&self) -> Result<TcpStream> {
        let dial = TcpStream::connect((self.address.host(), self.address.port()));
        let stream = timeout(self.config.connect_timeout, dial)
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::Connect(format!("{}: {}", self.address, e)))?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    async fn exchange(&self, stream: &mut TcpStream, payload: &[u8]) -> Result<Vec<u8>> {
        write_frame(stream, payload, self.config.max_frame_len).await?;
        read_frame(stream, self.config.max_frame_len).await
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn call(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut stream = self.connect().await?;
        let reply = match self.config.call_timeout {
            Some(limit) => timeout(limit, self.exchange(&mut stream, payload))
                .await
                .map_err(|_| TransportError::Timeout)?,
            None => self.exchange(&mut stream, payload).await,
        };
        // Best effort; the stream is closed on drop either way.
        let _ = stream.shutdown().await;
        reply
    }
}

/// Reads one length-prefixed frame.
pub(crate) async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32_le().await? as usize;
    if len > max_len {
        return Err(TransportError::PayloadTooLarge(len));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Writes one length-prefixed frame.
pub(crate) async fn write_frame<W>(writer: &mut W, payload: &[u8], max_len: usize) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > max_len {
        return Err(TransportError::PayloadTooLarge(payload.len()));
    }
    let len = u32::try_from(payload.len()).map_err(|_| TransportError::PayloadTooLarge(payload.len()))?;
    writer.write_u32_le(len).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
