//! Hooks a skeleton reports to.

use std::fmt;
use std::io;
use std::net::SocketAddr;

use crate::transport::TransportError;

/// Why one connection was abandoned.
#[derive(Debug)]
pub enum ServiceError {
    /// The call frame never arrived whole (timeout, truncation, oversize).
    Read { peer: SocketAddr, error: TransportError },
    /// The call frame did not decode.
    Decode { peer: SocketAddr, error: rmiwire::Error },
    /// The peer sent an Outcome frame where a Call was expected.
    UnexpectedFrame { peer: SocketAddr },
    /// The outcome could not be encoded.
    Encode { peer: SocketAddr, error: rmiwire::Error },
    /// The outcome could not be written back.
    Write { peer: SocketAddr, error: TransportError },
}

impl ServiceError {
    pub fn peer(&self) -> SocketAddr {
        match self {
            Self::Read { peer, .. }
            | Self::Decode { peer, .. }
            | Self::UnexpectedFrame { peer }
            | Self::Encode { peer, .. }
            | Self::Write { peer, .. } => *peer,
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { peer, error } => write!(f, "reading call from {}: {}", peer, error),
            Self::Decode { peer, error } => write!(f, "decoding call from {}: {}", peer, error),
            Self::UnexpectedFrame { peer } => write!(f, "{} sent an Outcome frame", peer),
            Self::Encode { peer, error } => write!(f, "encoding outcome for {}: {}", peer, error),
            Self::Write { peer, error } => write!(f, "writing outcome to {}: {}", peer, error),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { error, .. } | Self::Write { error, .. } => Some(error),
            Self::Decode { error, .. } | Self::Encode { error, .. } => Some(error),
            Self::UnexpectedFrame { .. } => None,
        }
    }
}

/// Receives failures a skeleton cannot hand back to a caller.
///
/// Hooks run on the skeleton's tasks and should return quickly.
pub trait SkeletonListener: Send + Sync + 'static {
    /// Accepting a connection failed for a reason other than `stop()`.
    /// Return `true` to keep accepting; `false` stops the skeleton.
    fn listen_error(&self, error: &io::Error) -> bool {
        let _ = error;
        false
    }

    /// One connection was abandoned. The skeleton keeps running.
    fn service_error(&self, error: &ServiceError) {
        let _ = error;
    }

    /// The skeleton reached `Stopped`, with the accept failure that caused it
    /// if there was one.
    fn stopped(&self, cause: Option<&io::Error>) {
        let _ = cause;
    }
}

/// Keeps every default: the first accept failure stops the skeleton.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultListener;

impl SkeletonListener for DefaultListener {}
