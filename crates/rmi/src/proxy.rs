//! # Remote Invocation Proxy
//!
//! Marshals one call across a transport and turns the answer into a value or
//! a `Fault`.
//!
//! The proxy is stateless: a pure function from
//! `(Transport, ServiceContract, MethodSignature, seq, args)` to a result.
//! Sequence generation and transport lifecycle are the stub's concern.
//!
//! ## Invariants
//!
//! - Arguments are checked before anything is sent
//! - Returned values conform to the declared return type, or the call fails
//! - Outcome sequence numbers must match call sequence numbers
//! - Only Outcome frames are accepted; a Call frame is a protocol violation

use rmiwire::CallFrame;
use rmiwire::Frame;
use rmiwire::Value;
use tracing::trace;

use crate::contract::MethodSignature;
use crate::contract::ServiceContract;
use crate::fault::FailureKind;
use crate::fault::Fault;
use crate::transport::Transport;

/// Stateless RPC invocation.
pub struct Proxy;

impl Proxy {
    /// Executes one remote call.
    ///
    /// Returns `BadArguments` before any network work if `args` do not fit
    /// the signature, a transport-derived failure if the exchange breaks,
    /// `Protocol` if the reply is malformed or answers a different call, and
    /// otherwise whatever the remote side produced.
    pub async fn invoke(
        transport: &dyn Transport,
        contract: &ServiceContract,
        sig: &MethodSignature,
        seq: u64,
        args: Vec<Value>,
    ) -> Result<Value, Fault> {
        sig.check_args(&args).map_err(Fault::bad_arguments)?;

        // Marshal and send
        let call = CallFrame::new(seq, contract.method_id(sig), args);
        let payload = call.to_bytes()?;
        trace!(seq, method = %call.id, bytes = payload.len(), "sending call");
        let reply = transport.call(&payload).await?;

        // Decode and validate frame type
        let outcome = match Frame::decode(&reply)? {
            Frame::Outcome(outcome) => outcome,
            Frame::Call(_) => {
                return Err(Fault::remote(
                    FailureKind::Protocol,
                    "received Call frame while waiting for Outcome",
                ));
            }
        };

        if outcome.seq != seq {
            return Err(Fault::remote(
                FailureKind::Protocol,
                format!("sequence mismatch: sent {}, received {}", seq, outcome.seq),
            ));
        }

        match outcome.outcome {
            Ok(value) if value.conforms_to(sig.return_type()) => Ok(value),
            Ok(value) => Err(Fault::remote(
                FailureKind::Protocol,
                format!(
                    "{} returned {}, declared {}",
                    sig.name(),
                    value.kind(),
                    sig.return_type()
                ),
            )),
            Err(desc) => Err(Fault::from_descriptor(desc, sig.failures())),
        }
    }
}
