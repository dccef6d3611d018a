//! # Protocol Frames
//!
//! The envelope of one invocation: a Call frame from stub to skeleton and an
//! Outcome frame back. Baseline protocol is one of each per connection.
//!
//! ## Invariants
//! - **Panic Safety**: all decoding paths return `Result`, never panicking on unknown data.
//! - **Forward Compatibility**: unknown header fields are skipped.
//! - **Correlation**: an Outcome echoes the `seq` of the Call it answers.

use std::fmt;

use rmipack::Decoder;
use rmipack::Encoder;

use crate::codec::decode_value;
use crate::codec::decode_values;
use crate::codec::encode_value;
use crate::codec::encode_values;
use crate::error::Error;
use crate::error::FaultKind;
use crate::error::Result;
use crate::value::Value;

/// Fully qualified method identifier: interface, method name and the ordered
/// parameter type descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodId {
    pub interface: String,
    pub method: String,
    pub params: Vec<String>,
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}({})", self.interface, self.method, self.params.join(", "))
    }
}

/// One invocation on its way to a skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct CallFrame {
    pub seq: u64,
    pub id: MethodId,
    pub args: Vec<Value>,
}

impl CallFrame {
    pub fn new(seq: u64, id: MethodId, args: Vec<Value>) -> Self {
        Self { seq, id, args }
    }

    pub fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.variant_begin("Call")?;
        enc.map_begin()?;

        write_map_u64(enc, "seq", self.seq)?;
        write_map_str(enc, "interface", &self.id.interface)?;
        write_map_str(enc, "method", &self.id.method)?;

        enc.variant_begin("params")?;
        enc.list_begin()?;
        for param in &self.id.params {
            enc.str(param)?;
        }
        enc.list_end()?;
        enc.variant_end()?;

        enc.variant_begin("args")?;
        encode_values(enc, &self.args)?;
        enc.variant_end()?;

        enc.map_end()?;
        enc.variant_end()?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut enc = Encoder::new();
        self.encode(&mut enc)?;
        Ok(enc.into_bytes()?)
    }

    fn decode_body(mut body: Decoder) -> Result<Self> {
        let mut seq = None;
        let mut interface = None;
        let mut method = None;
        let mut params = None;
        let mut args = None;

        for entry in body.map()? {
            let (key, mut val) = entry?;
            match key {
                "seq" => seq = Some(val.u64()?),
                "interface" => interface = Some(val.str()?.to_string()),
                "method" => method = Some(val.str()?.to_string()),
                "params" => {
                    let mut list = Vec::new();
                    for item in val.list()? {
                        let mut item = item?;
                        list.push(item.str()?.to_string());
                        item.finish()?;
                    }
                    params = Some(list);
                }
                "args" => args = Some(decode_values(&mut val)?),
                _ => val.skip()?,
            }
            val.finish()?;
        }

        body.finish()?;

        Ok(CallFrame {
            seq: seq.ok_or(missing("seq"))?,
            id: MethodId {
                interface: interface.ok_or(missing("interface"))?,
                method: method.ok_or(missing("method"))?,
                params: params.ok_or(missing("params"))?,
            },
            args: args.ok_or(missing("args"))?,
        })
    }
}

/// The failure side of an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultDescriptor {
    pub kind: FaultKind,
    pub message: String,
    /// Identity of an application failure, so a peer that knows the same
    /// failure kind can raise it again.
    pub identity: Option<String>,
}

impl FaultDescriptor {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), identity: None }
    }

    pub fn application(identity: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Application,
            message: message.into(),
            identity: Some(identity.into()),
        }
    }
}

/// The answer to one call.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeFrame {
    pub seq: u64,
    pub outcome: std::result::Result<Value, FaultDescriptor>,
}

impl OutcomeFrame {
    pub fn success(seq: u64, value: Value) -> Self {
        Self { seq, outcome: Ok(value) }
    }

    pub fn fault(seq: u64, fault: FaultDescriptor) -> Self {
        Self { seq, outcome: Err(fault) }
    }

    pub fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.variant_begin("Outcome")?;
        match &self.outcome {
            Ok(value) => {
                enc.result_ok_begin()?;
                enc.map_begin()?;
                write_map_u64(enc, "seq", self.seq)?;
                enc.variant_begin("value")?;
                encode_value(enc, value)?;
                enc.variant_end()?;
                enc.map_end()?;
                enc.result_ok_end()?;
            }
            Err(fault) => {
                enc.result_err_begin()?;
                enc.map_begin()?;
                write_map_u64(enc, "seq", self.seq)?;

                enc.variant_begin("kind")?;
                encode_unit_variant(enc, fault.kind.as_tag())?;
                enc.variant_end()?;

                write_map_str(enc, "message", &fault.message)?;

                enc.variant_begin("identity")?;
                match &fault.identity {
                    Some(identity) => {
                        enc.option_some_begin()?;
                        enc.str(identity)?;
                        enc.option_some_end()?;
                    }
                    None => enc.option_none()?,
                }
                enc.variant_end()?;

                enc.map_end()?;
                enc.result_err_end()?;
            }
        }
        enc.variant_end()?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut enc = Encoder::new();
        self.encode(&mut enc)?;
        Ok(enc.into_bytes()?)
    }

    fn decode_body(mut body: Decoder) -> Result<Self> {
        let frame = match body.result()? {
            Ok(ok_body) => Self::decode_success(ok_body)?,
            Err(err_body) => Self::decode_fault(err_body)?,
        };
        body.finish()?;
        Ok(frame)
    }

    fn decode_success(mut body: Decoder) -> Result<Self> {
        let mut seq = None;
        let mut value = None;

        for entry in body.map()? {
            let (key, mut val) = entry?;
            match key {
                "seq" => seq = Some(val.u64()?),
                "value" => value = Some(decode_value(&mut val)?),
                _ => val.skip()?,
            }
            val.finish()?;
        }

        body.finish()?;

        Ok(OutcomeFrame {
            seq: seq.ok_or(missing("seq"))?,
            outcome: Ok(value.ok_or(missing("value"))?),
        })
    }

    fn decode_fault(mut body: Decoder) -> Result<Self> {
        let mut seq = None;
        let mut kind = None;
        let mut message = None;
        let mut identity = None;

        for entry in body.map()? {
            let (key, mut val) = entry?;
            match key {
                "seq" => seq = Some(val.u64()?),
                "kind" => kind = Some(FaultKind::from_tag(decode_unit_variant(&mut val)?)?),
                "message" => message = Some(val.str()?.to_string()),
                "identity" => {
                    identity = match val.option()? {
                        Some(mut inner) => {
                            let identity = inner.str()?.to_string();
                            inner.finish()?;
                            Some(identity)
                        }
                        None => None,
                    }
                }
                _ => val.skip()?,
            }
            val.finish()?;
        }

        body.finish()?;

        Ok(OutcomeFrame {
            seq: seq.ok_or(missing("seq"))?,
            outcome: Err(FaultDescriptor {
                kind: kind.ok_or(missing("kind"))?,
                message: message.ok_or(missing("message"))?,
                identity,
            }),
        })
    }
}

/// Top-level frame decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Call(CallFrame),
    Outcome(OutcomeFrame),
}

impl Frame {
    /// Decodes exactly one frame; trailing bytes are a protocol violation.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(bytes);
        let (frame_type, body) = dec.variant()?;
        let frame = match frame_type {
            "Call" => Frame::Call(CallFrame::decode_body(body)?),
            "Outcome" => Frame::Outcome(OutcomeFrame::decode_body(body)?),
            other => return Err(Error::UnknownVariant(format!("top-level frame: {}", other))),
        };
        dec.finish()?;
        Ok(frame)
    }
}

fn missing(field: &str) -> Error {
    Error::ProtocolViolation(format!("missing {}", field))
}

fn write_map_u64(enc: &mut Encoder, key: &str, val: u64) -> Result<()> {
    enc.variant_begin(key)?;
    enc.u64(val)?;
    enc.variant_end()?;
    Ok(())
}

fn write_map_str(enc: &mut Encoder, key: &str, val: &str) -> Result<()> {
    enc.variant_begin(key)?;
    enc.str(val)?;
    enc.variant_end()?;
    Ok(())
}

fn encode_unit_variant(enc: &mut Encoder, tag: &str) -> Result<()> {
    enc.variant_begin(tag)?;
    enc.unit()?;
    enc.variant_end()?;
    Ok(())
}

fn decode_unit_variant<'a>(dec: &mut Decoder<'a>) -> Result<&'a str> {
    let (tag, mut body) = dec.variant()?;
    body.unit()?;
    body.finish()?;
    Ok(tag)
}
