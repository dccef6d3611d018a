//! # Stub
//!
//! The client-side handle to a remote object: a validated contract, its
//! dispatch table, and the address of the skeleton serving it.
//!
//! Calls made through a stub are forwarded by name; the stub resolves the
//! signature locally, opens a transport for that one call, and hands the
//! exchange to the `Proxy`. Typed access is layered on top by
//! `remote_interface!`.
//!
//! ## Identity
//!
//! Two stubs are equal iff they carry equal contracts and equal addresses.
//! Hashing follows the same two fields; configuration is not part of
//! identity.

use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use rmipack::Decoder;
use rmipack::Encoder;
use rmiwire::Value;
use tracing::debug;

use crate::address::RemoteAddress;
use crate::config::StubConfig;
use crate::contract::MethodTable;
use crate::contract::ServiceContract;
use crate::error::ContractError;
use crate::error::Error;
use crate::error::Result;
use crate::fault::Fault;
use crate::proxy::Proxy;
use crate::skeleton::Skeleton;
use crate::transport::TcpTransport;

/// Sequence numbers are process-wide so concurrent stubs never reuse one.
static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

#[derive(Clone)]
pub struct Stub {
    contract: Arc<ServiceContract>,
    table: Arc<MethodTable>,
    address: RemoteAddress,
    config: StubConfig,
}

impl Stub {
    /// Builds a stub for `contract` dialling `address`.
    ///
    /// The contract is validated here, never at call time.
    pub fn new(contract: ServiceContract, address: RemoteAddress) -> Result<Self> {
        contract.validate()?;
        let table = Arc::new(MethodTable::new(&contract));
        Self::assemble(Arc::new(contract), table, address)
    }

    /// Builds a stub for a skeleton's contract at the skeleton's address.
    ///
    /// The skeleton must be running or have a fixed port. A wildcard host is
    /// replaced by a concrete advertisable address.
    pub async fn from_skeleton(skeleton: &Skeleton) -> Result<Self> {
        let address = Self::skeleton_address(skeleton)?.advertisable().await?;
        let (contract, table) = skeleton.contract_parts();
        Self::assemble(contract, table, address)
    }

    /// Like `from_skeleton`, dialling `host` at the skeleton's port.
    pub async fn from_skeleton_with_host(skeleton: &Skeleton, host: &str) -> Result<Self> {
        if host.is_empty() {
            return Err(ContractError::MissingArgument("hostname").into());
        }
        let address = Self::skeleton_address(skeleton)?.with_host(host).advertisable().await?;
        let (contract, table) = skeleton.contract_parts();
        Self::assemble(contract, table, address)
    }

    fn skeleton_address(skeleton: &Skeleton) -> Result<RemoteAddress> {
        match skeleton.address() {
            Some(address) if address.port() != 0 => Ok(address),
            _ => Err(Error::State(format!(
                "skeleton for {} has no fixed address and is not running",
                skeleton.contract().name()
            ))),
        }
    }

    fn assemble(
        contract: Arc<ServiceContract>,
        table: Arc<MethodTable>,
        address: RemoteAddress,
    ) -> Result<Self> {
        if address.host().is_empty() {
            return Err(ContractError::MissingArgument("address").into());
        }
        Ok(Self { contract, table, address, config: StubConfig::default() })
    }

    pub fn with_config(mut self, config: StubConfig) -> Self {
        self.config = config;
        self
    }

    pub fn contract(&self) -> &ServiceContract {
        &self.contract
    }

    pub fn address(&self) -> &RemoteAddress {
        &self.address
    }

    pub fn config(&self) -> &StubConfig {
        &self.config
    }

    /// Calls `method` on the remote object and waits for its outcome.
    ///
    /// Every failure comes back as a `Fault`: an unknown method or
    /// ill-typed arguments fail before a connection is opened, transport and
    /// protocol trouble as a `RemoteFailure`.
    pub async fn invoke(&self, method: &str, args: Vec<Value>) -> std::result::Result<Value, Fault> {
        let sig = self.table.lookup(method, &args)?;

        let seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
        debug!(
            contract = self.contract.name(),
            method,
            seq,
            address = %self.address,
            "invoking remote method"
        );

        let transport = TcpTransport::new(self.address.clone(), self.config.clone());
        let result = Proxy::invoke(&transport, &self.contract, sig, seq, args).await;
        if let Err(fault) = &result {
            debug!(seq, %fault, "remote call failed");
        }
        result
    }

    /// Encodes the contract and address so another process can dial the
    /// same skeleton.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut enc = Encoder::new();
        enc.variant_begin("Stub")?;
        enc.map_begin()?;

        enc.variant_begin("contract")?;
        self.contract.encode(&mut enc)?;
        enc.variant_end()?;

        enc.variant_begin("host")?;
        enc.str(self.address.host())?;
        enc.variant_end()?;

        enc.variant_begin("port")?;
        enc.u32(u32::from(self.address.port()))?;
        enc.variant_end()?;

        enc.map_end()?;
        enc.variant_end()?;
        Ok(enc.into_bytes()?)
    }

    /// Decodes a stub produced by `to_bytes`. The contract is validated
    /// again; configuration starts from the defaults.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(bytes);
        let (tag, mut body) = dec.variant()?;
        if tag != "Stub" {
            return Err(rmiwire::Error::UnknownVariant(format!("expected Stub, got {}", tag)).into());
        }

        let mut contract = None;
        let mut host = None;
        let mut port = None;
        for entry in body.map()? {
            let (key, mut val) = entry?;
            match key {
                "contract" => contract = Some(ServiceContract::decode(&mut val)?),
                "host" => host = Some(val.str()?.to_string()),
                "port" => port = Some(val.u32()?),
                _ => val.skip()?,
            }
        }
        dec.finish()?;

        let contract = contract.ok_or_else(|| missing("contract"))?;
        let host = host.ok_or_else(|| missing("host"))?;
        let port = port.ok_or_else(|| missing("port"))?;
        let port = u16::try_from(port)
            .map_err(|_| rmiwire::Error::ProtocolViolation(format!("port {} out of range", port)))?;

        Self::new(contract, RemoteAddress::new(host, port))
    }
}

fn missing(field: &str) -> Error {
    Error::Wire(rmiwire::Error::MissingField(field.to_string()))
}

impl PartialEq for Stub {
    fn eq(&self, other: &Self) -> bool {
        self.contract == other.contract && self.address == other.address
    }
}

impl Eq for Stub {}

impl Hash for Stub {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.contract.hash(state);
        self.address.hash(state);
    }
}

impl fmt::Display for Stub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stub<{}>@{}", self.contract.name(), self.address)
    }
}

impl fmt::Debug for Stub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stub")
            .field("contract", &self.contract.name())
            .field("address", &self.address)
            .finish()
    }
}
