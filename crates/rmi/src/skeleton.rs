//! # Skeleton
//!
//! The server side of a contract: binds a listening socket, accepts
//! connections, and for each one decodes a call, dispatches it to the bound
//! `RemoteObject`, and writes the outcome back.
//!
//! ## Lifecycle
//!
//! `Stopped -> Starting -> Running -> Stopping -> Stopped`
//!
//! - `start()` is valid only from `Stopped`. It binds the assigned address
//!   (or an ephemeral port, which then stays fixed across restarts). A
//!   `start()` dropped before it finishes leaves the skeleton `Stopped`.
//! - `stop()` signals the accept loop and waits for it to exit, which closes
//!   the listening socket. Connections already accepted run to completion.
//!   Stopping a stopped skeleton does nothing. The accept loop itself
//!   completes the move to `Stopped`, so a `stop()` dropped while waiting
//!   still lands there.
//!
//! ## Concurrency
//!
//! The accept loop runs as its own task and hands every connection to a
//! fresh task. With `max_in_flight` set, a permit from a fair semaphore is
//! taken before each accept, so waiting connections are handed off in the
//! order they were accepted.
//!
//! A failing connection never takes the skeleton down. Accept failures go to
//! the `SkeletonListener`, whose default is to stop.

use std::any::Any;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use futures::FutureExt;
use rmiwire::CallFrame;
use rmiwire::Frame;
use rmiwire::OutcomeFrame;
use rmiwire::Value;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::Semaphore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::address::RemoteAddress;
use crate::config::SkeletonConfig;
use crate::contract::MethodTable;
use crate::contract::ServiceContract;
use crate::error::Error;
use crate::error::Result;
use crate::fault::FailureKind;
use crate::fault::Fault;
use crate::listener::DefaultListener;
use crate::listener::ServiceError;
use crate::listener::SkeletonListener;
use crate::service::RemoteObject;
use crate::transport::TransportError;
use crate::transport::read_frame;
use crate::transport::write_frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkeletonState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for SkeletonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Lifecycle state, shared with the accept loop.
struct Inner {
    state: SkeletonState,
    address: Option<RemoteAddress>,
    shutdown: Option<watch::Sender<bool>>,
    accept_task: Option<JoinHandle<()>>,
}

pub struct Skeleton {
    contract: Arc<ServiceContract>,
    table: Arc<MethodTable>,
    object: Arc<dyn RemoteObject>,
    config: SkeletonConfig,
    listener: Arc<dyn SkeletonListener>,
    inner: Arc<Mutex<Inner>>,
    connections: Arc<DashMap<u64, SocketAddr>>,
}

impl Skeleton {
    /// Binds `object` to `contract`. Nothing is opened until `start()`.
    ///
    /// The contract is validated here. Without an address the skeleton
    /// listens on `127.0.0.1` at an ephemeral port, so its stubs only reach
    /// it from this host. Use [`Skeleton::at`] with a wildcard host to accept
    /// remote callers.
    pub fn new(contract: ServiceContract, object: impl RemoteObject) -> Result<Self> {
        Self::build(contract, object, None)
    }

    /// Like [`Skeleton::new`], listening on `address`. Port 0 picks an
    /// ephemeral port at the first `start()`. The address cannot change
    /// afterwards.
    pub fn at(
        contract: ServiceContract,
        object: impl RemoteObject,
        address: RemoteAddress,
    ) -> Result<Self> {
        Self::build(contract, object, Some(address))
    }

    fn build(
        contract: ServiceContract,
        object: impl RemoteObject,
        address: Option<RemoteAddress>,
    ) -> Result<Self> {
        contract.validate()?;
        let table = Arc::new(MethodTable::new(&contract));
        Ok(Self {
            contract: Arc::new(contract),
            table,
            object: Arc::new(object),
            config: SkeletonConfig::default(),
            listener: Arc::new(DefaultListener),
            inner: Arc::new(Mutex::new(Inner {
                state: SkeletonState::Stopped,
                address,
                shutdown: None,
                accept_task: None,
            })),
            connections: Arc::new(DashMap::new()),
        })
    }

    pub fn with_config(mut self, config: SkeletonConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_listener(mut self, listener: impl SkeletonListener) -> Self {
        self.listener = Arc::new(listener);
        self
    }

    pub fn contract(&self) -> &ServiceContract {
        &self.contract
    }

    pub(crate) fn contract_parts(&self) -> (Arc<ServiceContract>, Arc<MethodTable>) {
        (self.contract.clone(), self.table.clone())
    }

    /// The assigned address, once fixed or bound.
    pub fn address(&self) -> Option<RemoteAddress> {
        self.lock().address.clone()
    }

    pub fn state(&self) -> SkeletonState {
        self.lock().state
    }

    /// Connections currently being served.
    pub fn in_flight(&self) -> usize {
        self.connections.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    pub async fn start(&self) -> Result<()> {
        let requested = {
            let mut inner = self.lock();
            if inner.state != SkeletonState::Stopped {
                return Err(Error::State(format!("cannot start a {} skeleton", inner.state)));
            }
            inner.state = SkeletonState::Starting;
            inner.address.clone().unwrap_or_else(RemoteAddress::localhost)
        };
        let _rollback = StartGuard { inner: &self.inner };

        let socket = bind(&requested).await.map_err(Error::Bind)?;
        let local = socket.local_addr().map_err(Error::Bind)?;
        let address = requested.with_port(local.port());

        let (shutdown, signal) = watch::channel(false);
        let dispatch = Arc::new(Dispatch {
            contract: self.contract.clone(),
            table: self.table.clone(),
            object: self.object.clone(),
            config: self.config.clone(),
            listener: self.listener.clone(),
            connections: self.connections.clone(),
            next_conn: AtomicU64::new(0),
            pool: self.config.max_in_flight.map(|n| Arc::new(Semaphore::new(n))),
        });

        // Spawned under the lock so the loop cannot observe `Starting`.
        let mut inner = self.lock();
        inner.address = Some(address.clone());
        inner.shutdown = Some(shutdown);
        inner.accept_task = Some(tokio::spawn(accept_loop(
            dispatch,
            socket,
            signal,
            self.inner.clone(),
        )));
        inner.state = SkeletonState::Running;
        drop(inner);

        info!(contract = self.contract.name(), %address, "skeleton listening");
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        let (shutdown, accept_task) = {
            let mut inner = self.lock();
            match inner.state {
                SkeletonState::Stopped => return Ok(()),
                SkeletonState::Running => {}
                other => return Err(Error::State(format!("cannot stop a {} skeleton", other))),
            }
            inner.state = SkeletonState::Stopping;
            (inner.shutdown.take(), inner.accept_task.take())
        };

        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(true);
        }
        if let Some(task) = accept_task {
            if let Err(e) = task.await {
                warn!(contract = self.contract.name(), error = %e, "accept loop ended abnormally");
            }
        }

        // Normally done by the accept loop on its way out.
        if finish_stop(&self.inner) {
            info!(contract = self.contract.name(), in_flight = self.in_flight(), "skeleton stopped");
            self.listener.stopped(None);
        }
        Ok(())
    }

    /// Runs the accept-failure policy against this skeleton, as the accept
    /// loop does when `accept` errors.
    #[cfg(test)]
    pub(crate) fn accept_failed(&self, error: &io::Error) -> AcceptFailure {
        accept_failed(self.listener.as_ref(), self.contract.name(), &self.inner, error)
    }
}

/// Rolls a `start()` that did not reach `Running` back to `Stopped`.
struct StartGuard<'a> {
    inner: &'a Mutex<Inner>,
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        let mut inner = lock(self.inner);
        if inner.state == SkeletonState::Starting {
            inner.state = SkeletonState::Stopped;
        }
    }
}

impl Drop for Skeleton {
    fn drop(&mut self) {
        if let Some(shutdown) = self.lock().shutdown.take() {
            let _ = shutdown.send(true);
        }
    }
}

impl fmt::Debug for Skeleton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Skeleton")
            .field("contract", &self.contract.name())
            .field("state", &inner.state)
            .field("address", &inner.address)
            .finish()
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn bind(address: &RemoteAddress) -> io::Result<TcpListener> {
    let host = match address.host() {
        "" | "*" => "0.0.0.0",
        host => host,
    };
    TcpListener::bind((host, address.port())).await
}

/// Everything a connection task needs, shared across one run.
struct Dispatch {
    contract: Arc<ServiceContract>,
    table: Arc<MethodTable>,
    object: Arc<dyn RemoteObject>,
    config: SkeletonConfig,
    listener: Arc<dyn SkeletonListener>,
    connections: Arc<DashMap<u64, SocketAddr>>,
    next_conn: AtomicU64,
    pool: Option<Arc<Semaphore>>,
}

async fn accept_loop(
    dispatch: Arc<Dispatch>,
    socket: TcpListener,
    mut shutdown: watch::Receiver<bool>,
    inner: Arc<Mutex<Inner>>,
) {
    loop {
        let permit = match &dispatch.pool {
            Some(pool) => tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                permit = pool.clone().acquire_owned() => match permit {
                    Ok(permit) => Some(permit),
                    Err(_) => break,
                },
            },
            None => None,
        };

        let accepted = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            accepted = socket.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                let conn = dispatch.next_conn.fetch_add(1, Ordering::Relaxed);
                debug!(conn, %peer, "accepted connection");
                tokio::spawn(dispatch.clone().serve(conn, stream, peer, permit));
            }
            Err(e) => {
                let contract = dispatch.contract.name();
                match accept_failed(dispatch.listener.as_ref(), contract, &inner, &e) {
                    AcceptFailure::Continue => continue,
                    AcceptFailure::Stop => break,
                }
            }
        }
    }

    drop(socket);
    debug!(contract = dispatch.contract.name(), "accept loop exited");
    if finish_stop(&inner) {
        info!(
            contract = dispatch.contract.name(),
            in_flight = dispatch.connections.len(),
            "skeleton stopped"
        );
        dispatch.listener.stopped(None);
    }
}

/// What the accept loop does after `accept` fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AcceptFailure {
    Continue,
    Stop,
}

/// Asks the listener whether to keep accepting. If not, the skeleton is
/// stopped and the listener told why.
fn accept_failed(
    listener: &dyn SkeletonListener,
    contract: &str,
    inner: &Mutex<Inner>,
    error: &io::Error,
) -> AcceptFailure {
    if listener.listen_error(error) {
        warn!(contract, %error, "accept failed, continuing");
        return AcceptFailure::Continue;
    }
    error!(contract, %error, "accept failed, stopping skeleton");
    if fail_stop(inner) {
        listener.stopped(Some(error));
    }
    AcceptFailure::Stop
}

/// Completes a requested stop once the listening socket is closed. Returns
/// false unless the skeleton was `Stopping`, so the hook fires once.
fn finish_stop(inner: &Mutex<Inner>) -> bool {
    let mut inner = lock(inner);
    if inner.state != SkeletonState::Stopping {
        return false;
    }
    inner.state = SkeletonState::Stopped;
    true
}

/// Moves a running skeleton straight to `Stopped` after an accept failure.
/// Dropping the shutdown sender ends the accept loop. Returns false if a
/// `stop()` got there first.
fn fail_stop(inner: &Mutex<Inner>) -> bool {
    let mut inner = lock(inner);
    if inner.state != SkeletonState::Running {
        return false;
    }
    inner.state = SkeletonState::Stopped;
    inner.shutdown = None;
    inner.accept_task = None;
    true
}

/// Removes a connection from the in-flight map on every exit path.
struct ConnectionGuard<'a> {
    connections: &'a DashMap<u64, SocketAddr>,
    conn: u64,
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.connections.remove(&self.conn);
    }
}

impl Dispatch {
    async fn serve(
        self: Arc<Self>,
        conn: u64,
        mut stream: TcpStream,
        peer: SocketAddr,
        permit: Option<OwnedSemaphorePermit>,
    ) {
        self.connections.insert(conn, peer);
        let _guard = ConnectionGuard { connections: &self.connections, conn };
        let _permit = permit;

        if let Err(e) = self.serve_connection(&mut stream, peer).await {
            warn!(conn, error = %e, "abandoning connection");
            self.listener.service_error(&e);
        }
    }

    async fn serve_connection(
        &self,
        stream: &mut TcpStream,
        peer: SocketAddr,
    ) -> std::result::Result<(), ServiceError> {
        let max_len = self.config.max_frame_len;
        let payload = timeout(self.config.read_timeout, read_frame(stream, max_len))
            .await
            .unwrap_or(Err(TransportError::Timeout))
            .map_err(|error| ServiceError::Read { peer, error })?;

        let call = match Frame::decode(&payload) {
            Ok(Frame::Call(call)) => call,
            Ok(Frame::Outcome(_)) => return Err(ServiceError::UnexpectedFrame { peer }),
            Err(error) => return Err(ServiceError::Decode { peer, error }),
        };

        let seq = call.seq;
        let outcome = match self.invoke(call).await {
            Ok(value) => OutcomeFrame::success(seq, value),
            Err(fault) => OutcomeFrame::fault(seq, fault.to_descriptor()),
        };

        let bytes = outcome
            .to_bytes()
            .map_err(|error| ServiceError::Encode { peer, error })?;
        write_frame(stream, &bytes, max_len)
            .await
            .map_err(|error| ServiceError::Write { peer, error })
    }

    /// Resolves, checks and runs one call. Panics in the service object
    /// become `Panicked` faults.
    async fn invoke(&self, call: CallFrame) -> std::result::Result<Value, Fault> {
        let sig = self
            .table
            .resolve(&call.id)
            .ok_or_else(|| Fault::no_such_method(format!("no such method: {}", call.id)))?;
        sig.check_args(&call.args).map_err(Fault::bad_arguments)?;

        debug!(seq = call.seq, method = %call.id, "dispatching");
        match AssertUnwindSafe(self.object.dispatch(sig, call.args)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(&*panic);
                error!(seq = call.seq, method = %call.id, %message, "service object panicked");
                Err(Fault::remote(FailureKind::Panicked, message))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "service object panicked".to_string()
    }
}
