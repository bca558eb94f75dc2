use bytes::{Buf, Bytes};
use std::error::Error;

use gel_client_protocol::descriptors::ScalarTypeDescriptor;
use gel_client_protocol::descriptors::{BaseScalarTypeDescriptor, SetDescriptor};
use gel_client_protocol::descriptors::{Descriptor, TypePos, Typedesc};
use gel_client_protocol::encoding::Input;
use gel_client_protocol::errors::DecodeError;
use gel_client_protocol::features::ProtocolVersion;
use uuid::Uuid;

mod base;

fn decode(pv: ProtocolVersion, bytes: &[u8]) -> Result<Vec<Descriptor>, DecodeError> {
    let bytes = Bytes::copy_from_slice(bytes);
    let mut input = Input::new(pv, bytes);
    let mut result = Vec::new();
    while input.remaining() > 0 {
        result.push(Descriptor::decode(&mut input)?);
    }
    assert!(input.remaining() == 0);
    Ok(result)
}

fn decode_0_13(bytes: &[u8]) -> Result<Vec<Descriptor>, DecodeError> {
    decode(ProtocolVersion::new(0, 13), bytes)
}

fn decode_2_0(bytes: &[u8]) -> Result<Vec<Descriptor>, DecodeError> {
    decode(ProtocolVersion::new(2, 0), bytes)
}

#[test]
fn set_of_int_legacy() -> Result<(), Box<dyn Error>> {
    assert_eq!(
        decode_0_13(bconcat!(
            b"\x02\0\0\0\0\0\0\0\0\0\0\0\0\0\0\x01\x05"
            b"\x00\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\xab\0\0"
        ))?,
        vec![
            Descriptor::BaseScalar(BaseScalarTypeDescriptor {
                id: "00000000-0000-0000-0000-000000000105"
                    .parse::<Uuid>()?
                    .into(),
            }),
            Descriptor::Set(SetDescriptor {
                id: "00000000-0000-0000-0000-0000000000ab"
                    .parse::<Uuid>()?
                    .into(),
                type_pos: TypePos(0),
            }),
        ]
    );
    Ok(())
}

#[test]
fn scalar_alias_legacy() -> Result<(), Box<dyn Error>> {
    // user-defined scalar deriving from std::int64
    assert_eq!(
        decode_0_13(bconcat!(
            b"\x02\0\0\0\0\0\0\0\0\0\0\0\0\0\0\x01\x05"
            b"\x03\x91\x76\xff\x8c\x95\xb6\x11\xef\x9c\x20\x5b\x0e\x8c\x3d\xaa\xc8\0\0"
        ))?,
        vec![
            Descriptor::BaseScalar(BaseScalarTypeDescriptor {
                id: "00000000-0000-0000-0000-000000000105"
                    .parse::<Uuid>()?
                    .into(),
            }),
            Descriptor::Scalar(ScalarTypeDescriptor {
                id: "9176ff8c-95b6-11ef-9c20-5b0e8c3daac8"
                    .parse::<Uuid>()?
                    .into(),
                base_type_pos: Some(TypePos(0)),
                name: None,
                schema_defined: None,
                ancestors: vec![],
            }),
        ]
    );
    Ok(())
}

#[test]
fn single_int_2_0() -> Result<(), Box<dyn Error>> {
    assert_eq!(
        decode_2_0(b"\0\0\0\"\x03\0\0\0\0\0\0\0\0\0\0\0\0\0\0\x01\x05\0\0\0\nstd::int64\x01\0\0")?,
        vec![Descriptor::Scalar(ScalarTypeDescriptor {
            id: "00000000-0000-0000-0000-000000000105"
                .parse::<Uuid>()?
                .into(),
            name: Some(String::from("std::int64")),
            schema_defined: Some(true),
            ancestors: vec![],
            base_type_pos: None,
        })]
    );
    Ok(())
}

#[test]
fn single_derived_int_2_0() -> Result<(), Box<dyn Error>> {
    assert_eq!(
        decode_2_0(bconcat!(
            b"\0\0\0\"\x03\0\0\0\0\0\0\0\0\0\0\0\0\0\0\x01\x05\0\0\0\n"
            b"std::int64\x01\0\0\0\0\0)\x03\x91v\xff\x8c\x95\xb6\x11\xef\x9c"
            b" [\x0e\x8c=\xaa\xc8\0\0\0\x0fdefault::my_int\x01\0\x01\0\0\0\0\0"
            b"-\x03J\xa0\x08{\x95\xb7\x11\xef\xbd\xe2?\xfa\xe3\r\x13\xe9\0\0\0"
            b"\x11default::my_int_2\x01\0\x02\0\x01\0\0"
        ))?,
        vec![
            Descriptor::Scalar(ScalarTypeDescriptor {
                id: "00000000-0000-0000-0000-000000000105"
                    .parse::<Uuid>()?
                    .into(),
                name: Some(String::from("std::int64")),
                schema_defined: Some(true),
                ancestors: vec![],
                base_type_pos: None,
            }),
            Descriptor::Scalar(ScalarTypeDescriptor {
                id: "9176ff8c-95b6-11ef-9c20-5b0e8c3daac8"
                    .parse::<Uuid>()?
                    .into(),
                name: Some(String::from("default::my_int")),
                schema_defined: Some(true),
                ancestors: vec![TypePos(0)],
                base_type_pos: Some(TypePos(0)),
            }),
            Descriptor::Scalar(ScalarTypeDescriptor {
                id: "4aa0087b-95b7-11ef-bde2-3ffae30d13e9"
                    .parse::<Uuid>()?
                    .into(),
                name: Some(String::from("default::my_int_2")),
                schema_defined: Some(true),
                ancestors: vec![TypePos(1), TypePos(0)],
                base_type_pos: Some(TypePos(0)),
            }),
        ]
    );
    Ok(())
}

#[test]
fn annotations_are_skipped() -> Result<(), Box<dyn Error>> {
    // an annotation block precedes the base scalar; the tree keeps
    // only the real descriptor and the root still resolves
    let bytes = bconcat!(
        b"\x81\x0e\x38\xacn\0\0\0\0\0\0\0\0\0\0\0\x01\0\0\0\x04note"
        b"\x02\0\0\0\0\0\0\0\0\0\0\0\0\0\0\x01\x05"
    );
    let root_id: Uuid = "00000000-0000-0000-0000-000000000105".parse()?;
    let mut input = Input::new(ProtocolVersion::new(0, 13), Bytes::copy_from_slice(bytes));
    let typedesc = Typedesc::decode_with_id(root_id, &mut input)?;
    assert_eq!(typedesc.descriptors().len(), 1);
    assert_eq!(typedesc.root_pos(), Some(TypePos(0)));
    assert_eq!(*typedesc.id(), root_id);
    Ok(())
}

#[test]
fn unknown_kind_fails() {
    // 0x5E is not a descriptor kind and not in the annotation range
    let err = decode_0_13(b"\x5e\0\0\0\0\0\0\0\0\0\0\0\0\0\0\x01\x05").unwrap_err();
    assert!(matches!(err, DecodeError::InvalidTypeDescriptor { .. }));
}
