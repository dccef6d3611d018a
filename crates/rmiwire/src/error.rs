//! # Error Definitions
//!
//! Failures of the codec layer: malformed bytes, unexpected shapes, and values
//! that do not match the type they are being read as.

use rmipack::Error as PackError;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The underlying rmipack encoding or decoding failed.
    Pack(PackError),
    /// A value did not have the expected type.
    TypeMismatch { expected: String, found: String },
    /// A record was missing a required field.
    MissingField(String),
    /// An unknown frame, fault or type tag was encountered.
    UnknownVariant(String),
    /// The frame structure was wrong (missing header field, wrong frame kind).
    ProtocolViolation(String),
    /// The value nesting exceeded the decoder's depth bound.
    RecursionLimitExceeded,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pack(e) => write!(f, "encoding error: {}", e),
            Self::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
            Self::MissingField(name) => write!(f, "missing field '{}'", name),
            Self::UnknownVariant(name) => write!(f, "unknown variant '{}'", name),
            Self::ProtocolViolation(msg) => write!(f, "protocol violation: {}", msg),
            Self::RecursionLimitExceeded => write!(f, "value nesting exceeds the recursion limit"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Pack(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PackError> for Error {
    fn from(e: PackError) -> Self { Self::Pack(e) }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a call did not produce a value (the fault side of an outcome).
///
/// These describe the *remote* side failing. Transport failures never reach
/// the wire; they are raised locally by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// The framework's remote-failure kind raised on the server side.
    Remote,
    /// No method on the bound contract matched the call identifier.
    MethodNotFound,
    /// Arguments did not match the resolved method's parameter types.
    BadArguments,
    /// The service object panicked while handling the call.
    Panicked,
    /// The service object returned an application-level failure.
    Application,
}

impl FaultKind {
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Remote => "Remote",
            Self::MethodNotFound => "NoMethod",
            Self::BadArguments => "BadArgs",
            Self::Panicked => "Panicked",
            Self::Application => "Application",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self> {
        Ok(match tag {
            "Remote" => Self::Remote,
            "NoMethod" => Self::MethodNotFound,
            "BadArgs" => Self::BadArguments,
            "Panicked" => Self::Panicked,
            "Application" => Self::Application,
            other => return Err(Error::UnknownVariant(format!("fault kind: {}", other))),
        })
    }
}
