//! The seam between a skeleton and the object it serves.

use std::sync::Arc;

use rmiwire::Value;

use crate::contract::MethodSignature;
use crate::fault::Fault;

/// A service object reachable through a skeleton.
///
/// The skeleton resolves the method and checks the arguments against its
/// signature before `dispatch` is called. Calls arrive concurrently from
/// independent connections; implementations that need exclusive access must
/// serialize internally.
#[async_trait::async_trait]
pub trait RemoteObject: Send + Sync + 'static {
    async fn dispatch(&self, method: &MethodSignature, args: Vec<Value>) -> Result<Value, Fault>;
}

#[async_trait::async_trait]
impl<T: RemoteObject + ?Sized> RemoteObject for Arc<T> {
    async fn dispatch(&self, method: &MethodSignature, args: Vec<Value>) -> Result<Value, Fault> {
        (**self).dispatch(method, args).await
    }
}
