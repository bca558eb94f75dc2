#![cfg(feature = "derive")]

use bytes::{BufMut, BytesMut};

use gel_client_protocol::model::Uuid;

use gel_client_protocol::codec::{STD_STR, STD_UUID};
use gel_client_protocol::common::Cardinality;
use gel_client_protocol::descriptors::{
    BaseScalarTypeDescriptor, Descriptor, ObjectShapeDescriptor, ShapeElement, TypePos,
};
use gel_client_protocol::queryable::{Decoder, DescriptorContext, Queryable as _};
use gel_client_tokio::Queryable;

#[derive(Queryable, Debug, PartialEq)]
struct User {
    name: String,
    #[gel(rename = "email_address")]
    email: Option<String>,
}

fn shape_element(
    name: &str,
    cardinality: Cardinality,
    type_pos: u16,
    implicit: bool,
) -> ShapeElement {
    ShapeElement {
        flag_implicit: implicit,
        flag_link_property: false,
        flag_link: false,
        cardinality: Some(cardinality),
        name: name.into(),
        type_pos: TypePos(type_pos),
        source_type_pos: None,
    }
}

fn user_descriptors() -> Vec<Descriptor> {
    vec![
        Descriptor::BaseScalar(BaseScalarTypeDescriptor {
            id: STD_UUID.into(),
        }),
        Descriptor::BaseScalar(BaseScalarTypeDescriptor { id: STD_STR.into() }),
        Descriptor::ObjectShape(ObjectShapeDescriptor {
            id: Uuid::from_u128(0xAB).into(),
            ephemeral_free_shape: false,
            type_pos: None,
            elements: vec![
                shape_element("__tid__", Cardinality::One, 0, true),
                shape_element("name", Cardinality::One, 1, false),
                shape_element("email_address", Cardinality::AtMostOne, 1, false),
            ],
        }),
    ]
}

fn wire_row(name: &str, email: Option<&str>) -> BytesMut {
    let mut buf = BytesMut::new();
    buf.put_u32(3);
    buf.put_u32(0); // reserved
    buf.put_u32(16);
    buf.extend_from_slice(Uuid::from_u128(0x1234).as_bytes());
    buf.put_u32(0); // reserved
    buf.put_u32(name.len() as u32);
    buf.extend_from_slice(name.as_bytes());
    buf.put_u32(0); // reserved
    match email {
        Some(email) => {
            buf.put_u32(email.len() as u32);
            buf.extend_from_slice(email.as_bytes());
        }
        None => buf.put_i32(-1),
    }
    buf
}

#[test]
fn decodes_shape_with_rename_and_implicit_fields() {
    let descriptors = user_descriptors();
    let ctx = DescriptorContext::new(&descriptors);
    let args = User::check_descriptor(&ctx, TypePos(2)).unwrap();
    let decoder = Decoder::default();

    let user = User::decode(&decoder, &args, &wire_row("Ann", Some("ann@example.com"))).unwrap();
    assert_eq!(
        user,
        User {
            name: "Ann".into(),
            email: Some("ann@example.com".into()),
        }
    );

    let user = User::decode(&decoder, &args, &wire_row("Bob", None)).unwrap();
    assert_eq!(
        user,
        User {
            name: "Bob".into(),
            email: None,
        }
    );
}

#[test]
fn rejects_wrong_field_names() {
    #[derive(Queryable, Debug)]
    struct Mismatched {
        #[allow(dead_code)]
        title: String,
    }
    let descriptors = user_descriptors();
    let ctx = DescriptorContext::new(&descriptors);
    assert!(Mismatched::check_descriptor(&ctx, TypePos(2)).is_err());
}

#[test]
fn rejects_non_optional_target_for_optional_field() {
    #[derive(Queryable, Debug)]
    struct Strict {
        #[allow(dead_code)]
        name: String,
        #[allow(dead_code)]
        email_address: String,
    }
    let descriptors = user_descriptors();
    let ctx = DescriptorContext::new(&descriptors);
    assert!(Strict::check_descriptor(&ctx, TypePos(2)).is_err());
}
