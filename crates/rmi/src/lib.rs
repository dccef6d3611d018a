//! # rmi
//!
//! Remote method invocation over TCP: call a method on an object living in
//! another process through an ordinary interface-shaped call site.
//!
//! ## Architecture
//!
//! - `contract`: `ServiceContract`s, their validation, and the dispatch table.
//! - `stub`: the client-side handle; forwards calls through a `Transport`.
//! - `skeleton`: listener and dispatcher serving a `RemoteObject`.
//! - `proxy`: stateless marshalling of one call and its outcome.
//! - `transport`: the byte-moving seam, with a per-call TCP implementation.
//! - `fault`: what a call can fail with, and the failure registry rule.
//! - `interface`: `remote_interface!`, typed traits, stubs and dispatchers.
//!
//! ## Flow
//!
//! A caller holds a stub and calls a method. The stub encodes a Call frame,
//! opens a connection to the skeleton's address, and waits. The skeleton
//! resolves the method against its contract, invokes the bound object, and
//! writes back an Outcome frame carrying either the value or a fault.

pub mod address;
pub mod config;
pub mod contract;
pub mod error;
pub mod fault;
pub mod interface;
pub mod listener;
pub mod proxy;
pub mod service;
pub mod skeleton;
pub mod stub;
pub mod transport;


pub use address::RemoteAddress;
pub use config::SkeletonConfig;
pub use config::StubConfig;
pub use contract::MethodSignature;
pub use contract::MethodTable;
pub use contract::ServiceContract;
pub use error::ContractError;
pub use error::Error;
pub use error::Result;
pub use fault::ApplicationFault;
pub use fault::FailureKind;
pub use fault::Fault;
pub use fault::REMOTE_FAILURE;
pub use fault::RemoteFailure;
pub use interface::RemoteInterface;
pub use listener::DefaultListener;
pub use listener::ServiceError;
pub use listener::SkeletonListener;
pub use proxy::Proxy;
pub use service::RemoteObject;
pub use skeleton::Skeleton;
pub use skeleton::SkeletonState;
pub use stub::Stub;
pub use transport::TcpTransport;
pub use transport::Transport;
pub use transport::TransportError;

pub use async_trait::async_trait;
pub use rmiwire::RemoteValue;
pub use rmiwire::Value;
pub use rmiwire::ValueType;
