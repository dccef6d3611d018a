//! # rmipack
//!
//! A small, bounded, self-describing binary format for the rmi wire protocol.
//!
//! ## Format
//!
//! - **Scalars**: `[Tag: 1b][Data: N]`
//! - **Blobs**: `[Tag: 1b][Len: 4b][Data: Len]`
//! - **Containers**: `[Tag: 1b][Len: 4b][Body: Len]`
//!
//! All integers are little-endian. Every item starts with a tag, so a reader
//! can walk or skip any value without knowing its schema. That property is what
//! lets the call frame carry arbitrary argument lists.

mod decoder;
mod encoder;
mod error;
mod tag;


pub use decoder::Decoder;
pub use decoder::ListIter;
pub use decoder::MapIter;
pub use encoder::Encoder;
pub use error::Error;
pub use error::Result;
pub use tag::Scope;
pub use tag::Tag;
