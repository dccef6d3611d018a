use crate::tag::Scope;

/// Encoding and decoding failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Byte is not a known `Tag`.
    InvalidTag(u8),
    /// Found a valid tag, but not the one the reader asked for.
    UnexpectedTag { expected: &'static str, found: u8 },
    /// String payload is not valid UTF-8.
    InvalidUtf8,
    /// Buffer exhausted while reading.
    UnexpectedEnd,
    /// Bytes remain after the reader expected the view to be exhausted.
    TrailingBytes(usize),
    /// Blob or container body exceeds `u32::MAX`.
    TooLarge(usize),
    /// Closing a scope that is not the innermost open scope.
    ScopeMismatch { expected: Scope, actual: Scope },
    /// Closing a scope when only the root remains.
    ScopeUnderflow,
    /// Finalizing with scopes still open.
    ScopeStillOpen,
    /// More than one item written into an Option/Result/Variant.
    TooManyItems(Scope),
    /// Option/Result/Variant closed without its single item.
    EmptyAdt(Scope),
    /// Something other than a Variant written directly into a Map.
    InvalidMapEntry,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTag(b) => write!(f, "invalid tag byte {:#04x}", b),
            Self::UnexpectedTag { expected, found } => {
                write!(f, "expected {}, found tag byte {:#04x}", expected, found)
            }
            Self::InvalidUtf8 => write!(f, "string is not valid utf-8"),
            Self::UnexpectedEnd => write!(f, "unexpected end of buffer"),
            Self::TrailingBytes(n) => write!(f, "{} trailing bytes after value", n),
            Self::TooLarge(n) => write!(f, "item of {} bytes exceeds the u32 length limit", n),
            Self::ScopeMismatch { expected, actual } => {
                write!(f, "scope mismatch: closing {:?} but {:?} is open", expected, actual)
            }
            Self::ScopeUnderflow => write!(f, "no open scope to close"),
            Self::ScopeStillOpen => write!(f, "encoder finalized with open scopes"),
            Self::TooManyItems(s) => write!(f, "scope {:?} holds exactly one item", s),
            Self::EmptyAdt(s) => write!(f, "scope {:?} closed without its item", s),
            Self::InvalidMapEntry => write!(f, "map entries must be variants"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
