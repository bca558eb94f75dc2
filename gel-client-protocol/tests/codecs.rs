use std::error::Error;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use pretty_assertions::assert_eq;
use uuid::Uuid;

use gel_client_protocol::codec::{self, build_codec, Codec};
use gel_client_protocol::common::Cardinality;
use gel_client_protocol::descriptors::{
    ArrayTypeDescriptor, BaseScalarTypeDescriptor, Descriptor, EnumerationTypeDescriptor,
    ObjectShapeDescriptor, RangeTypeDescriptor, SetDescriptor, ShapeElement, TypePos,
};
use gel_client_protocol::errors::DecodeError;
use gel_client_protocol::model::{BigInt, Range};
use gel_client_protocol::queryable::{Decoder, DescriptorContext, Queryable};
use gel_client_protocol::value::Value;

mod base;

fn base_scalar(id: Uuid) -> Descriptor {
    Descriptor::BaseScalar(BaseScalarTypeDescriptor { id: id.into() })
}

fn shape_element(name: &str, cardinality: Cardinality, type_pos: u16) -> ShapeElement {
    ShapeElement {
        flag_implicit: false,
        flag_link_property: false,
        flag_link: false,
        cardinality: Some(cardinality),
        name: name.into(),
        type_pos: TypePos(type_pos),
        source_type_pos: None,
    }
}

fn build(descriptors: &[Descriptor]) -> Arc<dyn Codec> {
    build_codec(Some(TypePos(descriptors.len() as u16 - 1)), descriptors).unwrap()
}

fn encode(codec: &Arc<dyn Codec>, value: &Value) -> Bytes {
    let mut buf = BytesMut::new();
    codec.encode(&mut buf, value).unwrap();
    buf.freeze()
}

#[test]
fn int32_round_trip() -> Result<(), Box<dyn Error>> {
    let codec = build(&[base_scalar(codec::STD_INT32)]);
    assert_eq!(codec.decode(b"\0\0\0\x07")?, Value::Int32(7));
    assert_eq!(&encode(&codec, &Value::Int32(7))[..], b"\0\0\0\x07");
    assert_eq!(codec.descriptor_id(), codec::STD_INT32);
    Ok(())
}

#[test]
fn int32_argument_slot() -> Result<(), Box<dyn Error>> {
    use gel_client_protocol::descriptors::Typedesc;
    use gel_client_protocol::features::ProtocolVersion;
    use gel_client_protocol::query_arg::{Encoder, QueryArg};

    let typedesc = Typedesc::nothing(&ProtocolVersion::current());
    let ctx = typedesc.as_query_arg_context();
    let mut buf = BytesMut::new();
    QueryArg::encode_slot(&7i32, &mut Encoder::new(&ctx, &mut buf))?;
    assert_eq!(&buf[..], b"\0\0\0\x04\0\0\0\x07");
    Ok(())
}

#[test]
fn array_of_int64() -> Result<(), Box<dyn Error>> {
    let descriptors = [
        base_scalar(codec::STD_INT64),
        Descriptor::Array(ArrayTypeDescriptor {
            id: Uuid::from_u128(0xAB).into(),
            type_pos: TypePos(0),
            dimensions: vec![None],
            name: None,
            schema_defined: None,
            ancestors: vec![],
        }),
    ];
    let codec = build(&descriptors);
    let wire = bconcat!(
        b"\0\0\0\x01\0\0\0\0\0\0\0\0\0\0\0\x03\0\0\0\x01"
        b"\0\0\0\x08\0\0\0\0\0\0\0\x03"
        b"\0\0\0\x08\0\0\0\0\0\0\0\x05"
        b"\0\0\0\x08\0\0\0\0\0\0\0\x08"
    );
    let value = Value::Array(vec![Value::Int64(3), Value::Int64(5), Value::Int64(8)]);
    assert_eq!(codec.decode(wire)?, value);
    assert_eq!(&encode(&codec, &value)[..], &wire[..]);
    assert_eq!(codec.descriptor_id(), Uuid::from_u128(0xAB));
    Ok(())
}

#[test]
fn array_length_follows_bounds() -> Result<(), Box<dyn Error>> {
    let descriptors = [
        base_scalar(codec::STD_INT32),
        Descriptor::Array(ArrayTypeDescriptor {
            id: Uuid::from_u128(0xAB).into(),
            type_pos: TypePos(0),
            dimensions: vec![None],
            name: None,
            schema_defined: None,
            ancestors: vec![],
        }),
    ];
    let codec = build(&descriptors);
    // bounds [2, 3] declare exactly two elements
    let wire = bconcat!(
        b"\0\0\0\x01\0\0\0\0\0\0\0\0\0\0\0\x03\0\0\0\x02"
        b"\0\0\0\x04\0\0\0\x09"
        b"\0\0\0\x04\0\0\0\x0a"
    );
    match codec.decode(wire)? {
        Value::Array(items) => assert_eq!(items.len(), 2),
        other => panic!("unexpected value {other:?}"),
    }
    // an empty array has zero dimensions
    assert_eq!(
        codec.decode(b"\0\0\0\0\0\0\0\0\0\0\0\0")?,
        Value::Array(vec![])
    );
    Ok(())
}

#[test_case::test_case(codec::STD_INT16, Value::Int16(-2), b"\xff\xfe"; "int16")]
#[test_case::test_case(codec::STD_INT64, Value::Int64(1), b"\0\0\0\0\0\0\0\x01"; "int64")]
#[test_case::test_case(codec::STD_BOOL, Value::Bool(true), b"\x01"; "bool")]
#[test_case::test_case(codec::STD_STR, Value::Str("hi".into()), b"hi"; "str")]
fn scalar_round_trip(id: Uuid, value: Value, wire: &[u8]) {
    let codec = build(&[base_scalar(id)]);
    assert_eq!(codec.decode(wire).unwrap(), value);
    assert_eq!(&encode(&codec, &value)[..], wire);
    assert_eq!(codec.descriptor_id(), id);
}

#[test]
fn bigint_random_round_trip() {
    use rand::Rng;
    let codec = build(&[base_scalar(codec::STD_BIGINT)]);
    let mut rng = rand::rng();
    for _ in 0..200 {
        let n: i64 = rng.random();
        let value = Value::BigInt(BigInt::from(n));
        let decoded = codec.decode(&encode(&codec, &value)).unwrap();
        match decoded {
            Value::BigInt(big) => assert_eq!(i64::try_from(&big).unwrap(), n),
            other => panic!("unexpected value {other:?}"),
        }
    }
}

#[test]
fn bigint() -> Result<(), Box<dyn Error>> {
    let codec = build(&[base_scalar(codec::STD_BIGINT)]);
    let wire = b"\x00\x02\x00\x01\x40\x00\x00\x00\x00\x01\x09\x29";
    let value = codec.decode(wire)?;
    match &value {
        Value::BigInt(big) => {
            assert!(big.is_negative());
            assert_eq!(big.digits(), &[1, 2345]);
            assert_eq!(i64::try_from(big)?, -12345);
        }
        other => panic!("unexpected value {other:?}"),
    }
    assert_eq!(
        &encode(&codec, &Value::BigInt(BigInt::from(-12345i64)))[..],
        wire
    );
    Ok(())
}

#[test]
fn range_of_int32() -> Result<(), Box<dyn Error>> {
    let descriptors = [
        base_scalar(codec::STD_INT32),
        Descriptor::Range(RangeTypeDescriptor {
            id: Uuid::from_u128(0xAB).into(),
            type_pos: TypePos(0),
            name: None,
            schema_defined: None,
            ancestors: vec![],
        }),
    ];
    let codec = build(&descriptors);
    let wire = bconcat!(b"\x02" b"\0\0\0\x04\0\0\0\x01" b"\0\0\0\x04\0\0\0\x05");
    let value = codec.decode(wire)?;
    match &value {
        Value::Range(range) => {
            assert_eq!(range.lower(), Some(&Box::new(Value::Int32(1))));
            assert_eq!(range.upper(), Some(&Box::new(Value::Int32(5))));
            assert!(range.inc_lower());
            assert!(!range.inc_upper());
            assert!(!range.is_empty());
        }
        other => panic!("unexpected value {other:?}"),
    }
    assert_eq!(&encode(&codec, &value)[..], &wire[..]);

    assert_eq!(
        codec.decode(b"\x01")?,
        Value::Range(Range::empty().map(Box::new))
    );
    Ok(())
}

#[test]
fn object_shape_optional_fields() -> Result<(), Box<dyn Error>> {
    let descriptors = [
        base_scalar(codec::STD_STR),
        Descriptor::ObjectShape(ObjectShapeDescriptor {
            id: Uuid::from_u128(0xAB).into(),
            ephemeral_free_shape: false,
            type_pos: None,
            elements: vec![
                shape_element("name", Cardinality::One, 0),
                shape_element("nickname", Cardinality::AtMostOne, 0),
            ],
        }),
    ];
    let codec = build(&descriptors);

    let wire = bconcat!(
        b"\0\0\0\x02"
        b"\0\0\0\0\0\0\0\x05Alice"
        b"\0\0\0\0\xff\xff\xff\xff"
    );
    match codec.decode(wire)? {
        Value::Object { fields, .. } => {
            assert_eq!(
                fields,
                vec![Some(Value::Str("Alice".into())), None]
            );
        }
        other => panic!("unexpected value {other:?}"),
    }

    // a missing required field is an error, not a silent null
    let wire = bconcat!(
        b"\0\0\0\x02"
        b"\0\0\0\0\xff\xff\xff\xff"
        b"\0\0\0\0\xff\xff\xff\xff"
    );
    let err = codec.decode(wire).unwrap_err();
    assert!(matches!(err, DecodeError::MissingRequiredElement { .. }));
    Ok(())
}

#[test]
fn set_of_arrays_envelope() -> Result<(), Box<dyn Error>> {
    let descriptors = [
        base_scalar(codec::STD_INT32),
        Descriptor::Array(ArrayTypeDescriptor {
            id: Uuid::from_u128(0xAB).into(),
            type_pos: TypePos(0),
            dimensions: vec![None],
            name: None,
            schema_defined: None,
            ancestors: vec![],
        }),
        Descriptor::Set(SetDescriptor {
            id: Uuid::from_u128(0xAC).into(),
            type_pos: TypePos(1),
        }),
    ];
    let codec = build(&descriptors);

    let mut inner = BytesMut::new();
    inner.put_u32(1); // ndims
    inner.put_u32(0);
    inner.put_u32(0);
    inner.put_u32(1); // upper
    inner.put_u32(1); // lower
    inner.put_u32(4);
    inner.put_i32(7);

    let mut wire = BytesMut::new();
    wire.put_u32(1); // ndims
    wire.put_u32(0);
    wire.put_u32(0);
    wire.put_u32(1); // upper
    wire.put_u32(1); // lower
    wire.extend_from_slice(&[0u8; 12]); // per-element envelope
    wire.put_u32(inner.len() as u32);
    wire.extend_from_slice(&inner);

    assert_eq!(
        codec.decode(&wire)?,
        Value::Set(vec![Value::Array(vec![Value::Int32(7)])])
    );

    // an empty set is dimensionless
    assert_eq!(
        codec.decode(b"\0\0\0\0\0\0\0\0\0\0\0\0")?,
        Value::Set(vec![])
    );
    Ok(())
}

#[test]
fn enum_membership() -> Result<(), Box<dyn Error>> {
    let codec = build(&[Descriptor::Enumeration(EnumerationTypeDescriptor {
        id: Uuid::from_u128(0xAB).into(),
        members: vec!["red".into(), "green".into()],
        name: None,
        schema_defined: None,
        ancestors: vec![],
    })]);
    match codec.decode(b"red")? {
        Value::Enum(member) => assert_eq!(&*member, "red"),
        other => panic!("unexpected value {other:?}"),
    }
    let err = codec.decode(b"blue").unwrap_err();
    assert!(matches!(err, DecodeError::ExtraEnumValue { .. }));

    let mut buf = BytesMut::new();
    assert!(codec.encode(&mut buf, &Value::Str("blue".into())).is_err());
    codec.encode(&mut buf, &Value::Str("green".into()))?;
    assert_eq!(&buf[..], b"green");
    Ok(())
}

#[test]
fn nothing_codec() -> Result<(), Box<dyn Error>> {
    let codec = build_codec(None, &[])?;
    assert_eq!(codec.decode(b"")?, Value::Nothing);
    assert_eq!(codec.descriptor_id(), Uuid::from_u128(0));
    Ok(())
}

#[test]
fn queryable_scalars_and_optional() -> Result<(), Box<dyn Error>> {
    use gel_client_protocol::descriptors::TupleTypeDescriptor;

    let descriptors = [
        base_scalar(codec::STD_STR),
        Descriptor::Tuple(TupleTypeDescriptor {
            id: Uuid::from_u128(0xAB).into(),
            element_types: vec![TypePos(0)],
            name: None,
            schema_defined: None,
            ancestors: vec![],
        }),
    ];
    let ctx = DescriptorContext::new(&descriptors);
    let decoder = Decoder::default();

    // present value keeps its content
    let args = <(Option<String>,)>::check_descriptor(&ctx, TypePos(1))?;
    let wire = bconcat!(b"\0\0\0\x01" b"\0\0\0\0\0\0\0\x02hi");
    let (title,) = <(Option<String>,)>::decode(&decoder, &args, wire)?;
    assert_eq!(title, Some("hi".into()));

    // a missing element leaves the optional unset and zeroed
    let wire = bconcat!(b"\0\0\0\x01" b"\0\0\0\0\xff\xff\xff\xff");
    let (title,) = <(Option<String>,)>::decode(&decoder, &args, wire)?;
    assert_eq!(title, None);

    // a tuple element of the wrong scalar fails the compile step
    assert!(<(i64,)>::check_descriptor(&ctx, TypePos(1)).is_err());
    Ok(())
}

#[test]
fn queryable_sequences() -> Result<(), Box<dyn Error>> {
    let descriptors = [
        base_scalar(codec::STD_INT64),
        Descriptor::Set(SetDescriptor {
            id: Uuid::from_u128(0xAB).into(),
            type_pos: TypePos(0),
        }),
    ];
    let ctx = DescriptorContext::new(&descriptors);
    let decoder = Decoder::default();
    let args = <Vec<i64>>::check_descriptor(&ctx, TypePos(1))?;
    let wire = bconcat!(
        b"\0\0\0\x01\0\0\0\0\0\0\0\0\0\0\0\x02\0\0\0\x01"
        b"\0\0\0\x08\0\0\0\0\0\0\0\x03"
        b"\0\0\0\x08\0\0\0\0\0\0\0\x05"
    );
    assert_eq!(<Vec<i64>>::decode(&decoder, &args, wire)?, vec![3, 5]);
    Ok(())
}

#[test]
fn queryable_range() -> Result<(), Box<dyn Error>> {
    let descriptors = [
        base_scalar(codec::STD_INT32),
        Descriptor::Range(RangeTypeDescriptor {
            id: Uuid::from_u128(0xAB).into(),
            type_pos: TypePos(0),
            name: None,
            schema_defined: None,
            ancestors: vec![],
        }),
    ];
    let ctx = DescriptorContext::new(&descriptors);
    let decoder = Decoder::default();
    let args = <Range<i32>>::check_descriptor(&ctx, TypePos(1))?;
    let wire = bconcat!(b"\x02" b"\0\0\0\x04\0\0\0\x01" b"\0\0\0\x04\0\0\0\x05");
    let range = <Range<i32>>::decode(&decoder, &args, wire)?;
    assert_eq!(range.lower(), Some(&1));
    assert_eq!(range.upper(), Some(&5));
    assert!(range.inc_lower());
    assert!(!range.inc_upper());
    Ok(())
}
