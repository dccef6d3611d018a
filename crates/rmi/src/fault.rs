//! # Call-Time Failures
//!
//! Everything a remote call can fail with. `RemoteFailure` is the framework's
//! declared failure kind: transport trouble, protocol trouble, and any fault
//! whose identity the caller cannot reconstruct. `ApplicationFault` is a
//! failure raised by the service object itself, identified by a name both
//! sides declare in the method's failure set.
//!
//! ## Failure registry
//!
//! A method's declared failure set is the registry. An application fault is
//! re-raised as itself only when its identity is declared by the method that
//! was called; anything else is folded into `RemoteFailure`.

use std::fmt;

use rmiwire::FaultDescriptor;
use rmiwire::FaultKind;

/// Identity of the remote-failure kind. Every method must declare it.
pub const REMOTE_FAILURE: &str = "rmi.RemoteFailure";

/// What went wrong with a remote call, as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The connection could not be established (refused, unreachable).
    Connect,
    /// Connecting or waiting for the outcome took too long.
    Timeout,
    /// The stream broke, was truncated, or exceeded the frame limit.
    Transport,
    /// A frame could not be decoded, or did not answer the call it should.
    Protocol,
    /// The skeleton has no method with this identifier.
    MethodNotFound,
    /// The arguments do not match the declared parameter types.
    BadArguments,
    /// The service object panicked while handling the call.
    Panicked,
    /// The remote side failed with something the caller cannot reconstruct.
    Remote,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::MethodNotFound => "no such method",
            Self::BadArguments => "bad arguments",
            Self::Panicked => "panicked",
            Self::Remote => "remote",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl RemoteFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", REMOTE_FAILURE, self.kind, self.message)
    }
}

impl std::error::Error for RemoteFailure {}

/// A failure raised by a service object, carried across by identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationFault {
    pub identity: String,
    pub message: String,
}

impl fmt::Display for ApplicationFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.identity, self.message)
    }
}

impl std::error::Error for ApplicationFault {}

/// The error half of every remote method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    Remote(RemoteFailure),
    Application(ApplicationFault),
}

impl Fault {
    pub fn remote(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Remote(RemoteFailure::new(kind, message))
    }

    /// An application failure with the given identity. The identity should
    /// appear in the failure set of the method raising it, or the caller will
    /// only see a `RemoteFailure`.
    pub fn application(identity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Application(ApplicationFault {
            identity: identity.into(),
            message: message.into(),
        })
    }

    pub fn no_such_method(message: impl Into<String>) -> Self {
        Self::remote(FailureKind::MethodNotFound, message)
    }

    pub fn bad_arguments(message: impl Into<String>) -> Self {
        Self::remote(FailureKind::BadArguments, message)
    }

    /// The remote-failure kind, if this is one.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::Remote(failure) => Some(failure.kind),
            Self::Application(_) => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Remote(failure) => &failure.message,
            Self::Application(fault) => &fault.message,
        }
    }

    /// Describes this fault for an Outcome frame.
    ///
    /// Client-side kinds (connect, timeout, ...) that reach a skeleton through
    /// a service object's own outgoing calls travel as plain remote failures.
    pub fn to_descriptor(&self) -> FaultDescriptor {
        match self {
            Self::Application(fault) => {
                FaultDescriptor::application(fault.identity.clone(), fault.message.clone())
            }
            Self::Remote(failure) => match failure.kind {
                FailureKind::MethodNotFound => {
                    FaultDescriptor::new(FaultKind::MethodNotFound, failure.message.clone())
                }
                FailureKind::BadArguments => {
                    FaultDescriptor::new(FaultKind::BadArguments, failure.message.clone())
                }
                FailureKind::Panicked => {
                    FaultDescriptor::new(FaultKind::Panicked, failure.message.clone())
                }
                FailureKind::Remote => {
                    FaultDescriptor::new(FaultKind::Remote, failure.message.clone())
                }
                other => FaultDescriptor::new(FaultKind::Remote, format!("{}: {}", other, failure.message)),
            },
        }
    }

    /// Rebuilds a fault received for a method declaring `throws`.
    pub fn from_descriptor(desc: FaultDescriptor, throws: &[String]) -> Self {
        match desc.kind {
            FaultKind::Application => match desc.identity {
                Some(identity) if identity != REMOTE_FAILURE && throws.contains(&identity) => {
                    Self::application(identity, desc.message)
                }
                Some(identity) => {
                    Self::remote(FailureKind::Remote, format!("{}: {}", identity, desc.message))
                }
                None => Self::remote(FailureKind::Remote, desc.message),
            },
            FaultKind::Remote => Self::remote(FailureKind::Remote, desc.message),
            FaultKind::MethodNotFound => Self::remote(FailureKind::MethodNotFound, desc.message),
            FaultKind::BadArguments => Self::remote(FailureKind::BadArguments, desc.message),
            FaultKind::Panicked => Self::remote(FailureKind::Panicked, desc.message),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(failure) => failure.fmt(f),
            Self::Application(fault) => fault.fmt(f),
        }
    }
}

impl std::error::Error for Fault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Remote(failure) => Some(failure),
            Self::Application(fault) => Some(fault),
        }
    }
}

impl From<RemoteFailure> for Fault {
    fn from(failure: RemoteFailure) -> Self { Self::Remote(failure) }
}

impl From<ApplicationFault> for Fault {
    fn from(fault: ApplicationFault) -> Self { Self::Application(fault) }
}

/// A frame that does not decode is a protocol failure.
impl From<rmiwire::Error> for Fault {
    fn from(e: rmiwire::Error) -> Self { Self::remote(FailureKind::Protocol, e.to_string()) }
}

impl From<rmipack::Error> for Fault {
    fn from(e: rmipack::Error) -> Self { Self::remote(FailureKind::Protocol, e.to_string()) }
}
