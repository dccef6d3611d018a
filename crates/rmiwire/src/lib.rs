//! # rmiwire
//!
//! The wire codec for remote method invocation.
//!
//! ## Architecture
//!
//! - `value`: dynamic `Value`s and the `ValueType` descriptors of contract slots.
//! - `codec`: self-describing value encoding and structural type encoding on rmipack.
//! - `convert`: the `RemoteValue` bridge between Rust types and `Value`.
//! - `frame`: Call and Outcome frames, one pair per invocation.

pub mod codec;
pub mod convert;
pub mod error;
pub mod frame;
pub mod value;

#[cfg(test)]
mod tests;

pub use codec::decode_type;
pub use codec::decode_value;
pub use codec::decode_values;
pub use codec::encode_type;
pub use codec::encode_value;
pub use codec::encode_values;
pub use convert::RemoteValue;
pub use error::Error;
pub use error::FaultKind;
pub use error::Result;
pub use frame::CallFrame;
pub use frame::FaultDescriptor;
pub use frame::Frame;
pub use frame::MethodId;
pub use frame::OutcomeFrame;
pub use value::Value;
pub use value::ValueType;
