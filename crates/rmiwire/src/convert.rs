//! Conversions between Rust types and wire `Value`s.
//!
//! Typed interfaces declare their parameters and return values with Rust types;
//! `RemoteValue` supplies both the descriptor for the contract and the
//! conversion used on each call.

use crate::error::Error;
use crate::error::Result;
use crate::value::Value;
use crate::value::ValueType;

/// A Rust type that can cross the wire.
pub trait RemoteValue: Sized + Send + 'static {
    /// Descriptor used in the contract for slots of this type.
    fn value_type() -> ValueType;

    fn into_value(self) -> Value;

    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch<T>(expected: ValueType, found: &Value) -> Result<T> {
    Err(Error::TypeMismatch {
        expected: expected.to_string(),
        found: found.kind().to_string(),
    })
}

macro_rules! impl_scalar {
    ($ty:ty, $variant:ident) => {
        impl RemoteValue for $ty {
            fn value_type() -> ValueType { ValueType::$variant }

            fn into_value(self) -> Value { Value::$variant(self) }

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => mismatch(ValueType::$variant, &other),
                }
            }
        }
    };
}

impl_scalar!(bool, Bool);
impl_scalar!(i32, S32);
impl_scalar!(i64, S64);
impl_scalar!(u32, U32);
impl_scalar!(u64, U64);
impl_scalar!(f64, F64);
impl_scalar!(String, String);

impl RemoteValue for () {
    fn value_type() -> ValueType { ValueType::Unit }

    fn into_value(self) -> Value { Value::Unit }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Unit => Ok(()),
            other => mismatch(ValueType::Unit, &other),
        }
    }
}

impl<T: RemoteValue> RemoteValue for Option<T> {
    fn value_type() -> ValueType { ValueType::option(T::value_type()) }

    fn into_value(self) -> Value {
        match self {
            Some(v) => Value::some(v.into_value()),
            None => Value::none(),
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Option(Some(inner)) => Ok(Some(T::from_value(*inner)?)),
            Value::Option(None) => Ok(None),
            other => mismatch(Self::value_type(), &other),
        }
    }
}

impl<T: RemoteValue> RemoteValue for Vec<T> {
    fn value_type() -> ValueType { ValueType::list(T::value_type()) }

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(RemoteValue::into_value).collect())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => mismatch(Self::value_type(), &other),
        }
    }
}

/// Passes values through untouched; the slot accepts anything.
impl RemoteValue for Value {
    fn value_type() -> ValueType { ValueType::Any }

    fn into_value(self) -> Value { self }

    fn from_value(value: Value) -> Result<Self> { Ok(value) }
}
