//! # Codec
//!
//! Translation between `Value`/`ValueType` and the rmipack wire format.
//!
//! ## Invariants
//! - **Recursion Safety**: all recursive walks are bounded by `MAX_RECURSION_DEPTH`.
//! - **Self-Describing**: values decode without a schema; checking a value
//!   against its declared type is a separate step (`Value::conforms_to`).

use rmipack::Decoder;
use rmipack::Encoder;
use rmipack::Tag;

use crate::error::Error;
use crate::error::Result;
use crate::value::Value;
use crate::value::ValueType;

/// The maximum nesting depth for values and type descriptors.
const MAX_RECURSION_DEPTH: usize = 64;

/// Encodes a single value.
pub fn encode_value(enc: &mut Encoder, val: &Value) -> Result<()> {
    encode_value_impl(enc, val, 0)
}

fn encode_value_impl(enc: &mut Encoder, val: &Value, depth: usize) -> Result<()> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(Error::RecursionLimitExceeded);
    }

    match val {
        Value::Unit => enc.unit()?,
        Value::Bool(b) => enc.bool(*b)?,
        Value::S32(v) => enc.s32(*v)?,
        Value::S64(v) => enc.s64(*v)?,
        Value::U32(v) => enc.u32(*v)?,
        Value::U64(v) => enc.u64(*v)?,
        Value::F64(v) => enc.f64(*v)?,
        Value::String(s) => enc.str(s)?,
        Value::Bytes(b) => enc.bytes(b)?,
        Value::Option(None) => enc.option_none()?,
        Value::Option(Some(inner)) => {
            enc.option_some_begin()?;
            encode_value_impl(enc, inner, depth + 1)?;
            enc.option_some_end()?;
        }
        Value::List(items) => {
            enc.list_begin()?;
            for item in items {
                encode_value_impl(enc, item, depth + 1)?;
            }
            enc.list_end()?;
        }
        Value::Record(fields) => {
            enc.map_begin()?;
            for (name, field) in fields {
                enc.variant_begin(name)?;
                encode_value_impl(enc, field, depth + 1)?;
                enc.variant_end()?;
            }
            enc.map_end()?;
        }
    }
    Ok(())
}

/// Encodes an ordered list of values (argument lists).
pub fn encode_values(enc: &mut Encoder, vals: &[Value]) -> Result<()> {
    enc.list_begin()?;
    for val in vals {
        encode_value_impl(enc, val, 1)?;
    }
    enc.list_end()?;
    Ok(())
}

/// Decodes the next value, whatever its shape.
pub fn decode_value(dec: &mut Decoder) -> Result<Value> {
    decode_value_impl(dec, 0)
}

fn decode_value_impl(dec: &mut Decoder, depth: usize) -> Result<Value> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(Error::RecursionLimitExceeded);
    }

    Ok(match dec.peek_tag()? {
        Tag::Unit => { dec.unit()?; Value::Unit }
        Tag::BoolTrue | Tag::BoolFalse => Value::Bool(dec.bool()?),
        Tag::S32 => Value::S32(dec.s32()?),
        Tag::S64 => Value::S64(dec.s64()?),
        Tag::U32 => Value::U32(dec.u32()?),
        Tag::U64 => Value::U64(dec.u64()?),
        Tag::F64 => Value::F64(dec.f64()?),
        Tag::String => Value::String(dec.str()?.to_string()),
        Tag::Bytes => Value::Bytes(dec.bytes()?.to_vec()),
        Tag::OptionNone | Tag::OptionSome => match dec.option()? {
            Some(mut inner) => {
                let val = decode_value_impl(&mut inner, depth + 1)?;
                inner.finish()?;
                Value::some(val)
            }
            None => Value::none(),
        },
        Tag::List => {
            let mut items = Vec::new();
            for item in dec.list()? {
                let mut item = item?;
                items.push(decode_value_impl(&mut item, depth + 1)?);
                item.finish()?;
            }
            Value::List(items)
        }
        Tag::Map => {
            let mut fields = Vec::new();
            for entry in dec.map()? {
                let (name, mut field) = entry?;
                fields.push((name.to_string(), decode_value_impl(&mut field, depth + 1)?));
                field.finish()?;
            }
            Value::Record(fields)
        }
        other @ (Tag::ResultOk | Tag::ResultErr | Tag::Variant) => {
            return Err(Error::ProtocolViolation(format!("{:?} is not a value", other)));
        }
    })
}

/// Decodes an argument or result list.
pub fn decode_values(dec: &mut Decoder) -> Result<Vec<Value>> {
    let mut vals = Vec::new();
    for item in dec.list()? {
        let mut item = item?;
        vals.push(decode_value_impl(&mut item, 1)?);
        item.finish()?;
    }
    Ok(vals)
}

/// Encodes a type descriptor structurally.
///
/// Call frames carry the `Display` form of descriptors; the structural form is
/// used where a full contract must travel, such as a serialized stub.
pub fn encode_type(enc: &mut Encoder, ty: &ValueType) -> Result<()> {
    encode_type_impl(enc, ty, 0)
}

fn encode_type_impl(enc: &mut Encoder, ty: &ValueType, depth: usize) -> Result<()> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(Error::RecursionLimitExceeded);
    }

    let tag = type_tag(ty);
    enc.variant_begin(tag)?;
    match ty {
        ValueType::Option(inner) | ValueType::List(inner) => {
            encode_type_impl(enc, inner, depth + 1)?;
        }
        ValueType::Record(fields) => {
            enc.map_begin()?;
            for (name, field) in fields {
                enc.variant_begin(name)?;
                encode_type_impl(enc, field, depth + 1)?;
                enc.variant_end()?;
            }
            enc.map_end()?;
        }
        _ => enc.unit()?,
    }
    enc.variant_end()?;
    Ok(())
}

fn type_tag(ty: &ValueType) -> &'static str {
    match ty {
        ValueType::Unit => "unit",
        ValueType::Bool => "bool",
        ValueType::S32 => "s32",
        ValueType::S64 => "s64",
        ValueType::U32 => "u32",
        ValueType::U64 => "u64",
        ValueType::F64 => "f64",
        ValueType::String => "string",
        ValueType::Bytes => "bytes",
        ValueType::Option(_) => "option",
        ValueType::List(_) => "list",
        ValueType::Record(_) => "record",
        ValueType::Any => "any",
    }
}

/// Decodes a structurally encoded type descriptor.
pub fn decode_type(dec: &mut Decoder) -> Result<ValueType> {
    decode_type_impl(dec, 0)
}

fn decode_type_impl(dec: &mut Decoder, depth: usize) -> Result<ValueType> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(Error::RecursionLimitExceeded);
    }

    let (tag, mut body) = dec.variant()?;
    let ty = match tag {
        "option" => ValueType::option(decode_type_impl(&mut body, depth + 1)?),
        "list" => ValueType::list(decode_type_impl(&mut body, depth + 1)?),
        "record" => {
            let mut fields = Vec::new();
            for entry in body.map()? {
                let (name, mut field) = entry?;
                fields.push((name.to_string(), decode_type_impl(&mut field, depth + 1)?));
                field.finish()?;
            }
            ValueType::Record(fields)
        }
        scalar => {
            body.unit()?;
            match scalar {
                "unit" => ValueType::Unit,
                "bool" => ValueType::Bool,
                "s32" => ValueType::S32,
                "s64" => ValueType::S64,
                "u32" => ValueType::U32,
                "u64" => ValueType::U64,
                "f64" => ValueType::F64,
                "string" => ValueType::String,
                "bytes" => ValueType::Bytes,
                "any" => ValueType::Any,
                other => return Err(Error::UnknownVariant(format!("type: {}", other))),
            }
        }
    };
    body.finish()?;
    Ok(ty)
}
