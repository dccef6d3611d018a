use rmipack::Decoder;
use rmipack::Encoder;

use crate::*;

fn echo_id() -> MethodId {
    MethodId {
        interface: "demo.Echo".into(),
        method: "echo".into(),
        params: vec![ValueType::option(ValueType::String).to_string()],
    }
}

// ============================================================================
//  VALUES
// ============================================================================

#[test]
fn test_nested_value_survives_the_wire() -> anyhow::Result<()> {
    let val = Value::Record(vec![
        ("name".into(), Value::from("grace")),
        ("tags".into(), Value::List(vec![Value::U32(1), Value::U32(2)])),
        ("nick".into(), Value::none()),
        ("blob".into(), Value::Bytes(vec![0, 255])),
    ]);

    let mut enc = Encoder::new();
    encode_value(&mut enc, &val)?;
    let bytes = enc.into_bytes()?;

    let mut dec = Decoder::new(&bytes);
    assert_eq!(decode_value(&mut dec)?, val);
    dec.finish()?;
    Ok(())
}

#[test]
fn test_recursion_limit() {
    let mut deep = Value::Unit;
    for _ in 0..100 {
        deep = Value::some(deep);
    }
    let mut enc = Encoder::new();
    assert_eq!(encode_value(&mut enc, &deep), Err(Error::RecursionLimitExceeded));
}

#[test]
fn test_conformance() {
    let ty = ValueType::Record(vec![
        ("id".into(), ValueType::U64),
        ("alias".into(), ValueType::option(ValueType::String)),
    ]);

    let ok = Value::Record(vec![
        ("alias".into(), Value::none()),
        ("id".into(), Value::U64(7)),
    ]);
    assert!(ok.conforms_to(&ty));

    let missing = Value::Record(vec![("id".into(), Value::U64(7))]);
    assert!(!missing.conforms_to(&ty));

    let wrong = Value::Record(vec![
        ("id".into(), Value::S64(7)),
        ("alias".into(), Value::none()),
    ]);
    assert!(!wrong.conforms_to(&ty));

    assert!(Value::List(vec![]).conforms_to(&ValueType::list(ValueType::Bool)));
    assert!(!Value::List(vec![Value::U32(1)]).conforms_to(&ValueType::list(ValueType::Bool)));
    assert!(Value::F64(1.0).conforms_to(&ValueType::Any));
}

#[test]
fn test_descriptor_strings() {
    let ty = ValueType::list(ValueType::Record(vec![
        ("k".into(), ValueType::String),
        ("v".into(), ValueType::option(ValueType::S64)),
    ]));
    assert_eq!(ty.to_string(), "list<record{k: string, v: option<s64>}>");
}

#[test]
fn test_structural_type_encoding() -> anyhow::Result<()> {
    let ty = ValueType::option(ValueType::Record(vec![
        ("xs".into(), ValueType::list(ValueType::F64)),
        ("any".into(), ValueType::Any),
    ]));

    let mut enc = Encoder::new();
    encode_type(&mut enc, &ty)?;
    let bytes = enc.into_bytes()?;
    assert_eq!(decode_type(&mut Decoder::new(&bytes))?, ty);
    Ok(())
}

// ============================================================================
//  CONVERSIONS
// ============================================================================

#[test]
fn test_remote_value_conversions() -> Result<()> {
    assert_eq!(<Option<String>>::value_type(), ValueType::option(ValueType::String));
    assert_eq!(<Vec<u64>>::value_type(), ValueType::list(ValueType::U64));

    let v = Some("ping".to_string()).into_value();
    assert_eq!(<Option<String>>::from_value(v)?, Some("ping".to_string()));
    assert_eq!(<Option<String>>::from_value(Value::none())?, None);
    assert_eq!(<Vec<i32>>::from_value(vec![1i32, -2].into_value())?, vec![1, -2]);

    match u64::from_value(Value::from("nope")) {
        Err(Error::TypeMismatch { expected, found }) => {
            assert_eq!(expected, "u64");
            assert_eq!(found, "string");
        }
        other => panic!("expected type mismatch, got {:?}", other),
    }
    Ok(())
}

// ============================================================================
//  FRAMES
// ============================================================================

#[test]
fn test_call_frame() -> anyhow::Result<()> {
    let call = CallFrame::new(42, echo_id(), vec![Value::some(Value::from("ping"))]);
    let bytes = call.to_bytes()?;

    match Frame::decode(&bytes)? {
        Frame::Call(decoded) => assert_eq!(decoded, call),
        other => panic!("expected call, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_outcome_frames() -> anyhow::Result<()> {
    let ok = OutcomeFrame::success(3, Value::S64(-1));
    assert_eq!(Frame::decode(&ok.to_bytes()?)?, Frame::Outcome(ok));

    let fault = OutcomeFrame::fault(4, FaultDescriptor::application("demo.Overflow", "too big"));
    assert_eq!(Frame::decode(&fault.to_bytes()?)?, Frame::Outcome(fault));

    let plain = OutcomeFrame::fault(5, FaultDescriptor::new(FaultKind::MethodNotFound, "no such method"));
    assert_eq!(Frame::decode(&plain.to_bytes()?)?, Frame::Outcome(plain));
    Ok(())
}

#[test]
fn test_unknown_header_fields_are_skipped() -> anyhow::Result<()> {
    let mut enc = Encoder::new();
    enc.variant_begin("Outcome")?;
    enc.result_ok_begin()?;
    enc.map_begin()?;
    enc.variant_begin("trace-id")?;
    enc.str("abc")?;
    enc.variant_end()?;
    enc.variant_begin("seq")?;
    enc.u64(9)?;
    enc.variant_end()?;
    enc.variant_begin("value")?;
    enc.bool(true)?;
    enc.variant_end()?;
    enc.map_end()?;
    enc.result_ok_end()?;
    enc.variant_end()?;

    let frame = Frame::decode(&enc.into_bytes()?)?;
    assert_eq!(frame, Frame::Outcome(OutcomeFrame::success(9, Value::Bool(true))));
    Ok(())
}

#[test]
fn test_missing_header_is_a_protocol_violation() -> anyhow::Result<()> {
    let mut enc = Encoder::new();
    enc.variant_begin("Call")?;
    enc.map_begin()?;
    enc.variant_begin("seq")?;
    enc.u64(1)?;
    enc.variant_end()?;
    enc.map_end()?;
    enc.variant_end()?;

    match Frame::decode(&enc.into_bytes()?) {
        Err(Error::ProtocolViolation(msg)) => assert!(msg.contains("interface")),
        other => panic!("expected protocol violation, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_garbage_and_trailing_bytes() -> anyhow::Result<()> {
    assert!(Frame::decode(&[0xFF, 0x00, 0x13]).is_err());
    assert!(Frame::decode(&[]).is_err());

    let mut bytes = OutcomeFrame::success(1, Value::Unit).to_bytes()?;
    bytes.push(rmipack::Tag::Unit as u8);
    assert!(matches!(Frame::decode(&bytes), Err(Error::Pack(rmipack::Error::TrailingBytes(1)))));
    Ok(())
}

/// Raw container: tag, u32 LE body length, body.
fn raw(tag: rmipack::Tag, body: &[u8]) -> Vec<u8> {
    let mut out = vec![tag as u8];
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    out
}

/// Raw variant whose body holds `items` after the name, however many.
fn raw_variant(name: &str, items: &[Vec<u8>]) -> Vec<u8> {
    let mut body = raw(rmipack::Tag::String, name.as_bytes());
    for item in items {
        body.extend_from_slice(item);
    }
    raw(rmipack::Tag::Variant, &body)
}

fn raw_s32(v: i32) -> Vec<u8> {
    let mut out = vec![rmipack::Tag::S32 as u8];
    out.extend_from_slice(&v.to_le_bytes());
    out
}

fn raw_u64(v: u64) -> Vec<u8> {
    let mut out = vec![rmipack::Tag::U64 as u8];
    out.extend_from_slice(&v.to_le_bytes());
    out
}

fn raw_outcome(value_items: &[Vec<u8>]) -> Vec<u8> {
    let mut entries = raw_variant("seq", &[raw_u64(7)]);
    entries.extend(raw_variant("value", value_items));
    let map = raw(rmipack::Tag::Map, &entries);
    raw_variant("Outcome", &[raw(rmipack::Tag::ResultOk, &map)])
}

#[test]
fn test_extra_items_inside_a_frame_are_rejected() -> anyhow::Result<()> {
    let good = raw_outcome(&[raw_s32(1)]);
    assert_eq!(
        Frame::decode(&good)?,
        Frame::Outcome(OutcomeFrame::success(7, Value::S32(1)))
    );

    let smuggled = raw_outcome(&[raw_s32(1), raw_s32(2)]);
    assert!(matches!(
        Frame::decode(&smuggled),
        Err(Error::Pack(rmipack::Error::TrailingBytes(5)))
    ));

    // an extra item inside a record field
    let record = raw(rmipack::Tag::Map, &raw_variant("x", &[raw_s32(1), raw_s32(2)]));
    assert!(matches!(
        decode_value(&mut Decoder::new(&record)),
        Err(Error::Pack(rmipack::Error::TrailingBytes(5)))
    ));
    Ok(())
}

#[test]
fn test_unknown_fault_kind() -> anyhow::Result<()> {
    let mut enc = Encoder::new();
    enc.variant_begin("Outcome")?;
    enc.result_err_begin()?;
    enc.map_begin()?;
    enc.variant_begin("kind")?;
    enc.variant_begin("Meteor")?;
    enc.unit()?;
    enc.variant_end()?;
    enc.variant_end()?;
    enc.map_end()?;
    enc.result_err_end()?;
    enc.variant_end()?;

    assert!(matches!(Frame::decode(&enc.into_bytes()?), Err(Error::UnknownVariant(_))));
    Ok(())
}
