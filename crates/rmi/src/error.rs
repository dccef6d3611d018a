//! Construction and lifecycle errors.
//!
//! These never happen at call time: a contract is validated when a stub or
//! skeleton is built, and lifecycle misuse is reported by the operation that
//! attempted it. Call-time failures are `crate::fault::Fault`.

use std::fmt;
use std::io;

/// Reasons a `ServiceContract` (or a construction argument) is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    /// A method carries a body, so the contract is not a pure interface.
    NotAnInterface { contract: String, method: String },
    /// A method does not declare the remote-failure kind.
    MissingRemoteFailure { contract: String, method: String },
    /// Two methods share a name and parameter descriptors.
    DuplicateMethod { contract: String, method: String },
    /// The contract or one of its methods has an empty name.
    EmptyName,
    /// A required construction argument was absent.
    MissingArgument(&'static str),
    /// A stub's contract is not the one a typed interface expects.
    Mismatch { expected: String, found: String },
}

impl fmt::Display for ContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnInterface { contract, method } => {
                write!(f, "{} is not a pure interface: {} has a body", contract, method)
            }
            Self::MissingRemoteFailure { contract, method } => {
                write!(f, "{}.{} does not declare {}", contract, method, crate::fault::REMOTE_FAILURE)
            }
            Self::DuplicateMethod { contract, method } => {
                write!(f, "{} declares {} twice", contract, method)
            }
            Self::EmptyName => write!(f, "contract and method names must not be empty"),
            Self::MissingArgument(what) => write!(f, "missing required argument: {}", what),
            Self::Mismatch { expected, found } => {
                write!(f, "expected a stub for {}, got one for {}", expected, found)
            }
        }
    }
}

impl std::error::Error for ContractError {}

/// Errors raised while building stubs and skeletons or driving a skeleton's
/// lifecycle.
#[derive(Debug)]
pub enum Error {
    Contract(ContractError),
    /// The operation is not valid in the current lifecycle state.
    State(String),
    /// A wildcard host has no concrete advertisable address.
    AddressResolution(String),
    /// The listening socket could not be bound.
    Bind(io::Error),
    /// A stub or contract could not be encoded or decoded.
    Wire(rmiwire::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contract(e) => write!(f, "Contract validation failed: {}", e),
            Self::State(msg) => write!(f, "Invalid state: {}", msg),
            Self::AddressResolution(msg) => write!(f, "Address resolution failed: {}", msg),
            Self::Bind(e) => write!(f, "Bind failed: {}", e),
            Self::Wire(e) => write!(f, "Wire error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Contract(e) => Some(e),
            Self::Bind(e) => Some(e),
            Self::Wire(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ContractError> for Error {
    fn from(e: ContractError) -> Self { Self::Contract(e) }
}

impl From<rmiwire::Error> for Error {
    fn from(e: rmiwire::Error) -> Self { Self::Wire(e) }
}

impl From<rmipack::Error> for Error {
    fn from(e: rmipack::Error) -> Self { Self::Wire(rmiwire::Error::from(e)) }
}

pub type Result<T> = std::result::Result<T, Error>;
