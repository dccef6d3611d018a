//! # Values and Type Descriptors
//!
//! `Value` is the dynamic form of every argument and return value that crosses
//! the wire. `ValueType` describes what a parameter or return slot accepts; its
//! `Display` form is the parameter type descriptor carried in call frames.

use std::fmt;

/// The declared type of a parameter or return slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Unit,
    Bool,
    S32,
    S64,
    U32,
    U64,
    F64,
    String,
    Bytes,
    /// Nullable slot.
    Option(Box<ValueType>),
    List(Box<ValueType>),
    /// Named fields, in declaration order.
    Record(Vec<(String, ValueType)>),
    /// Accepts any value.
    Any,
}

impl ValueType {
    pub fn option(inner: ValueType) -> Self { Self::Option(Box::new(inner)) }
    pub fn list(inner: ValueType) -> Self { Self::List(Box::new(inner)) }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => write!(f, "unit"),
            Self::Bool => write!(f, "bool"),
            Self::S32 => write!(f, "s32"),
            Self::S64 => write!(f, "s64"),
            Self::U32 => write!(f, "u32"),
            Self::U64 => write!(f, "u64"),
            Self::F64 => write!(f, "f64"),
            Self::String => write!(f, "string"),
            Self::Bytes => write!(f, "bytes"),
            Self::Option(inner) => write!(f, "option<{}>", inner),
            Self::List(inner) => write!(f, "list<{}>", inner),
            Self::Record(fields) => {
                write!(f, "record{{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                write!(f, "}}")
            }
            Self::Any => write!(f, "any"),
        }
    }
}

/// A dynamically typed wire value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    S32(i32),
    S64(i64),
    U32(u32),
    U64(u64),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Option(Option<Box<Value>>),
    List(Vec<Value>),
    Record(Vec<(String, Value)>),
}

impl Value {
    /// The null value of a nullable slot.
    pub fn none() -> Self { Self::Option(None) }

    pub fn some(inner: Value) -> Self { Self::Option(Some(Box::new(inner))) }

    /// Short name of this value's shape, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Bool(_) => "bool",
            Self::S32(_) => "s32",
            Self::S64(_) => "s64",
            Self::U32(_) => "u32",
            Self::U64(_) => "u64",
            Self::F64(_) => "f64",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Option(_) => "option",
            Self::List(_) => "list",
            Self::Record(_) => "record",
        }
    }

    /// Checks this value against a declared type.
    ///
    /// Records must carry exactly the declared fields, in any order.
    pub fn conforms_to(&self, ty: &ValueType) -> bool {
        match (self, ty) {
            (_, ValueType::Any) => true,
            (Self::Unit, ValueType::Unit) => true,
            (Self::Bool(_), ValueType::Bool) => true,
            (Self::S32(_), ValueType::S32) => true,
            (Self::S64(_), ValueType::S64) => true,
            (Self::U32(_), ValueType::U32) => true,
            (Self::U64(_), ValueType::U64) => true,
            (Self::F64(_), ValueType::F64) => true,
            (Self::String(_), ValueType::String) => true,
            (Self::Bytes(_), ValueType::Bytes) => true,
            (Self::Option(None), ValueType::Option(_)) => true,
            (Self::Option(Some(v)), ValueType::Option(inner)) => v.conforms_to(inner),
            (Self::List(items), ValueType::List(inner)) => items.iter().all(|v| v.conforms_to(inner)),
            (Self::Record(fields), ValueType::Record(decl)) => {
                fields.len() == decl.len()
                    && decl.iter().all(|(name, ty)| {
                        fields.iter().any(|(n, v)| n == name && v.conforms_to(ty))
                    })
            }
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Self::String(s.to_string()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Self::String(s) }
}
