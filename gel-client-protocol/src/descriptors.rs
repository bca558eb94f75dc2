/*!
Types for the [Descriptor] enum.

The type descriptor stream is a list of blocks; each block encodes one
type and may reference earlier blocks by positional index. While parsing
the blocks a driver assembles an encoder or a decoder of the binary data
format.

Two block encodings exist: the legacy one and the v2 one negotiated with
protocol 2.0, where every block is length-prefixed and scalar-like
descriptors carry names and ancestor chains.
*/

use std::convert::{TryFrom, TryInto};
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;

use bytes::Buf;
use snafu::{ensure, OptionExt};
use uuid::Uuid;

use crate::codec::{build_codec, uuid_to_known_name, Codec};
use crate::common::Cardinality;
use crate::encoding::{Decode, Input};
use crate::errors::{self, CodecError, DecodeError};
use crate::errors::{InvalidTypeDescriptor, UnexpectedTypePos};
use crate::features::ProtocolVersion;
use crate::query_arg;
use crate::queryable;

pub use crate::common::RawTypedesc;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TypePos(pub u16);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    Set(SetDescriptor),
    ObjectShape(ObjectShapeDescriptor),
    BaseScalar(BaseScalarTypeDescriptor),
    Scalar(ScalarTypeDescriptor),
    Tuple(TupleTypeDescriptor),
    NamedTuple(NamedTupleTypeDescriptor),
    Array(ArrayTypeDescriptor),
    Enumeration(EnumerationTypeDescriptor),
    Range(RangeTypeDescriptor),
    MultiRange(MultiRangeTypeDescriptor),
    Object(ObjectTypeDescriptor),
    SQLRecord(SQLRecordDescriptor),
    TypeAnnotation(TypeAnnotationDescriptor),
}

/// Descriptor id that renders well-known ids by name in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct DescriptorUuid(Uuid);

impl Debug for DescriptorUuid {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match uuid_to_known_name(&self.0) {
            Some(known_name) => write!(f, "{known_name}"),
            None => write!(f, "{}", &self.0),
        }
    }
}

impl Deref for DescriptorUuid {
    type Target = Uuid;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Uuid> for DescriptorUuid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl PartialEq<Uuid> for DescriptorUuid {
    fn eq(&self, other: &Uuid) -> bool {
        self.0 == *other
    }
}

/// A parsed descriptor tree: the positional block array plus the root.
#[derive(Debug)]
pub struct Typedesc {
    pub(crate) proto: ProtocolVersion,
    pub(crate) array: Vec<Descriptor>,
    pub(crate) root_id: Uuid,
    pub(crate) root_pos: Option<TypePos>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetDescriptor {
    pub id: DescriptorUuid,
    pub type_pos: TypePos,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectShapeDescriptor {
    pub id: DescriptorUuid,
    pub ephemeral_free_shape: bool,
    pub type_pos: Option<TypePos>,
    pub elements: Vec<ShapeElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeElement {
    pub flag_implicit: bool,
    pub flag_link_property: bool,
    pub flag_link: bool,
    pub cardinality: Option<Cardinality>,
    pub name: String,
    pub type_pos: TypePos,
    pub source_type_pos: Option<TypePos>,
}

impl ShapeElement {
    /// A field that must carry a value in every row.
    pub fn required(&self) -> bool {
        !matches!(
            self.cardinality,
            Some(Cardinality::AtMostOne) | Some(Cardinality::NoResult)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseScalarTypeDescriptor {
    pub id: DescriptorUuid,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScalarTypeDescriptor {
    pub id: DescriptorUuid,
    pub base_type_pos: Option<TypePos>,
    pub name: Option<String>,
    pub schema_defined: Option<bool>,
    pub ancestors: Vec<TypePos>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TupleTypeDescriptor {
    pub id: DescriptorUuid,
    pub element_types: Vec<TypePos>,
    pub name: Option<String>,
    pub schema_defined: Option<bool>,
    pub ancestors: Vec<TypePos>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedTupleTypeDescriptor {
    pub id: DescriptorUuid,
    pub elements: Vec<TupleElement>,
    pub name: Option<String>,
    pub schema_defined: Option<bool>,
    pub ancestors: Vec<TypePos>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleElement {
    pub name: String,
    pub type_pos: TypePos,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayTypeDescriptor {
    pub id: DescriptorUuid,
    pub type_pos: TypePos,
    pub dimensions: Vec<Option<u32>>,
    pub name: Option<String>,
    pub schema_defined: Option<bool>,
    pub ancestors: Vec<TypePos>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumerationTypeDescriptor {
    pub id: DescriptorUuid,
    pub members: Vec<String>,
    pub name: Option<String>,
    pub schema_defined: Option<bool>,
    pub ancestors: Vec<TypePos>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeTypeDescriptor {
    pub id: DescriptorUuid,
    pub type_pos: TypePos,
    pub name: Option<String>,
    pub schema_defined: Option<bool>,
    pub ancestors: Vec<TypePos>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiRangeTypeDescriptor {
    pub id: DescriptorUuid,
    pub type_pos: TypePos,
    pub name: Option<String>,
    pub schema_defined: Option<bool>,
    pub ancestors: Vec<TypePos>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectTypeDescriptor {
    pub id: DescriptorUuid,
    pub name: Option<String>,
    pub schema_defined: Option<bool>,
}

/// A row shape of an SQL-over-the-protocol result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SQLRecordDescriptor {
    pub id: DescriptorUuid,
    pub elements: Vec<TupleElement>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeAnnotationDescriptor {
    pub annotated_type: u8,
    pub id: DescriptorUuid,
    pub annotation: String,
}

impl Typedesc {
    pub fn id(&self) -> &Uuid {
        &self.root_id
    }
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.array
    }
    pub fn root_pos(&self) -> Option<TypePos> {
        self.root_pos
    }
    pub fn root(&self) -> Option<&Descriptor> {
        self.root_pos.and_then(|pos| self.array.get(pos.0 as usize))
    }
    pub fn build_codec(&self) -> Result<Arc<dyn Codec>, CodecError> {
        build_codec(self.root_pos(), self.descriptors())
    }
    pub fn get(&self, type_pos: TypePos) -> Result<&Descriptor, CodecError> {
        self.array
            .get(type_pos.0 as usize)
            .context(UnexpectedTypePos {
                position: type_pos.0,
            })
    }
    /// The descriptor of "no meaningful value": the all-zero id.
    pub fn nothing(protocol: &ProtocolVersion) -> Typedesc {
        Typedesc {
            proto: protocol.clone(),
            array: Vec::new(),
            root_id: Uuid::from_u128(0),
            root_pos: None,
        }
    }
    pub fn is_empty_tuple(&self) -> bool {
        match self.root() {
            Some(Descriptor::Tuple(t)) => {
                *t.id == Uuid::from_u128(0xFF) && t.element_types.is_empty()
            }
            _ => false,
        }
    }
    pub fn decode_with_id(root_id: Uuid, buf: &mut Input) -> Result<Self, DecodeError> {
        let mut descriptors = Vec::new();
        while buf.remaining() > 0 {
            match Descriptor::decode(buf)? {
                Descriptor::TypeAnnotation(_) => {}
                item => descriptors.push(item),
            }
        }
        let root_pos = if root_id == Uuid::from_u128(0) {
            None
        } else {
            let idx = descriptors
                .iter()
                .position(|x| *x.id() == root_id)
                .context(errors::UuidNotFound { uuid: root_id })?;
            let pos = idx
                .try_into()
                .ok()
                .context(errors::TooManyDescriptors { index: idx })?;
            Some(TypePos(pos))
        };
        Ok(Typedesc {
            proto: buf.proto().clone(),
            array: descriptors,
            root_id,
            root_pos,
        })
    }
    pub fn as_query_arg_context(&self) -> query_arg::DescriptorContext {
        query_arg::DescriptorContext {
            proto: &self.proto,
            descriptors: self.descriptors(),
            root_pos: self.root_pos,
        }
    }
    pub fn as_queryable_context(&self) -> queryable::DescriptorContext {
        let mut ctx = queryable::DescriptorContext::new(self.descriptors());
        ctx.has_implicit_id = self.proto.has_implicit_id();
        ctx.has_implicit_tid = self.proto.has_implicit_tid();
        ctx
    }
    pub fn proto(&self) -> &ProtocolVersion {
        &self.proto
    }
}

impl Descriptor {
    pub fn id(&self) -> &Uuid {
        use Descriptor::*;
        match self {
            Set(i) => &i.id,
            ObjectShape(i) => &i.id,
            BaseScalar(i) => &i.id,
            Scalar(i) => &i.id,
            Tuple(i) => &i.id,
            NamedTuple(i) => &i.id,
            Array(i) => &i.id,
            Enumeration(i) => &i.id,
            Range(i) => &i.id,
            MultiRange(i) => &i.id,
            Object(i) => &i.id,
            SQLRecord(i) => &i.id,
            TypeAnnotation(i) => &i.id,
        }
    }
    pub fn decode(buf: &mut Input) -> Result<Descriptor, DecodeError> {
        <Descriptor as Decode>::decode(buf)
    }
    /// Resolve a scalar alias chain down to the base descriptor it
    /// inherits from.
    pub fn normalize_to_base(
        &self,
        ctx: &query_arg::DescriptorContext,
    ) -> Result<Descriptor, gel_client_errors::Error> {
        let norm = match self {
            Descriptor::Scalar(d) if d.base_type_pos.is_some() => {
                match ctx.get(d.base_type_pos.unwrap())? {
                    Descriptor::Scalar(d) => {
                        Descriptor::BaseScalar(BaseScalarTypeDescriptor { id: d.id.clone() })
                    }
                    desc => desc.clone(),
                }
            }
            Descriptor::Scalar(d) => {
                Descriptor::BaseScalar(BaseScalarTypeDescriptor { id: d.id.clone() })
            }
            desc => desc.clone(),
        };

        Ok(norm)
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 2, errors::Underflow);
        let element_count = buf.get_u16();
        let mut elements = Vec::with_capacity(element_count as usize);
        for _ in 0..element_count {
            elements.push(T::decode(buf)?);
        }
        Ok(elements)
    }
}

impl Decode for Option<u32> {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 4, errors::Underflow);

        let val = match buf.get_i32() {
            -1 => None,
            n if n > 0 => Some(n as u32),
            _ => errors::InvalidOptionU32.fail()?,
        };

        Ok(val)
    }
}

impl Decode for TypePos {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 2, errors::Underflow);
        Ok(Self(buf.get_u16()))
    }
}

impl Decode for Descriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        use Descriptor as D;
        if buf.proto().is_2() {
            ensure!(buf.remaining() >= 4, errors::Underflow);
            let desc_len = buf.get_u32() as u64;
            ensure!((buf.remaining() as u64) >= desc_len, errors::Underflow);
        }
        ensure!(buf.remaining() >= 1, errors::Underflow);
        match buf.chunk()[0] {
            0x00 => SetDescriptor::decode(buf).map(D::Set),
            0x01 => ObjectShapeDescriptor::decode(buf).map(D::ObjectShape),
            0x02 => BaseScalarTypeDescriptor::decode(buf).map(D::BaseScalar),
            0x03 => ScalarTypeDescriptor::decode(buf).map(D::Scalar),
            0x04 => TupleTypeDescriptor::decode(buf).map(D::Tuple),
            0x05 => NamedTupleTypeDescriptor::decode(buf).map(D::NamedTuple),
            0x06 => ArrayTypeDescriptor::decode(buf).map(D::Array),
            0x07 => EnumerationTypeDescriptor::decode(buf).map(D::Enumeration),
            0x09 => RangeTypeDescriptor::decode(buf).map(D::Range),
            0x0A => ObjectTypeDescriptor::decode(buf).map(D::Object),
            0x0C => MultiRangeTypeDescriptor::decode(buf).map(D::MultiRange),
            0x0D => SQLRecordDescriptor::decode(buf).map(D::SQLRecord),
            0x80..=0xFF => TypeAnnotationDescriptor::decode(buf).map(D::TypeAnnotation),
            descriptor => InvalidTypeDescriptor { descriptor }.fail()?,
        }
    }
}

impl Decode for SetDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 19, errors::Underflow);
        assert!(buf.get_u8() == 0);
        let id = Uuid::decode(buf)?.into();
        let type_pos = TypePos(buf.get_u16());
        Ok(SetDescriptor { id, type_pos })
    }
}

impl Decode for ObjectShapeDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 19, errors::Underflow);
        assert!(buf.get_u8() == 1);
        let id = Uuid::decode(buf)?.into();
        let type_desc = if buf.proto().is_2() {
            let ephemeral_free_shape = bool::decode(buf)?;
            let type_pos = Some(TypePos::decode(buf)?);
            let elements = Vec::<ShapeElement>::decode(buf)?;
            ObjectShapeDescriptor {
                id,
                elements,
                ephemeral_free_shape,
                type_pos,
            }
        } else {
            let elements = Vec::<ShapeElement>::decode(buf)?;
            ObjectShapeDescriptor {
                id,
                elements,
                ephemeral_free_shape: false,
                type_pos: None,
            }
        };
        Ok(type_desc)
    }
}

impl Decode for ShapeElement {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 7, errors::Underflow);
        let (flags, cardinality) = if buf.proto().is_at_least(0, 11) {
            let flags = buf.get_u32();
            let cardinality = TryFrom::try_from(buf.get_u8())?;
            (flags, Some(cardinality))
        } else {
            (buf.get_u8() as u32, None)
        };
        let name = String::decode(buf)?;
        let type_pos = TypePos::decode(buf)?;
        let source_type_pos = if buf.proto().is_2() {
            Some(TypePos::decode(buf)?)
        } else {
            None
        };
        Ok(ShapeElement {
            flag_implicit: flags & 0b001 != 0,
            flag_link_property: flags & 0b010 != 0,
            flag_link: flags & 0b100 != 0,
            cardinality,
            name,
            type_pos,
            source_type_pos,
        })
    }
}

impl Decode for BaseScalarTypeDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let desc_byte = buf.get_u8();
        assert!(desc_byte == 2);
        ensure!(
            !buf.proto().is_2(),
            InvalidTypeDescriptor {
                descriptor: desc_byte
            }
        );
        let id = Uuid::decode(buf)?.into();
        Ok(BaseScalarTypeDescriptor { id })
    }
}

impl Decode for ScalarTypeDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 19, errors::Underflow);
        assert!(buf.get_u8() == 3);
        let id = Uuid::decode(buf)?.into();
        let type_desc = if buf.proto().is_2() {
            let name = Some(String::decode(buf)?);
            let schema_defined = Some(bool::decode(buf)?);
            let ancestors = Vec::<TypePos>::decode(buf)?;
            let base_type_pos = ancestors.last().copied();
            ScalarTypeDescriptor {
                id,
                base_type_pos,
                name,
                schema_defined,
                ancestors,
            }
        } else {
            let base_type_pos = Some(TypePos(buf.get_u16()));
            ScalarTypeDescriptor {
                id,
                base_type_pos,
                name: None,
                schema_defined: None,
                ancestors: vec![],
            }
        };
        Ok(type_desc)
    }
}

impl Decode for TupleTypeDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 19, errors::Underflow);
        assert!(buf.get_u8() == 4);
        let id = Uuid::decode(buf)?.into();

        let type_desc = if buf.proto().is_2() {
            let name = Some(String::decode(buf)?);
            let schema_defined = Some(bool::decode(buf)?);
            let ancestors = Vec::<TypePos>::decode(buf)?;
            let element_types = Vec::<TypePos>::decode(buf)?;
            TupleTypeDescriptor {
                id,
                element_types,
                name,
                schema_defined,
                ancestors,
            }
        } else {
            let element_types = Vec::<TypePos>::decode(buf)?;
            TupleTypeDescriptor {
                id,
                element_types,
                name: None,
                schema_defined: None,
                ancestors: vec![],
            }
        };
        Ok(type_desc)
    }
}

impl Decode for NamedTupleTypeDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 19, errors::Underflow);
        assert!(buf.get_u8() == 5);
        let id = Uuid::decode(buf)?.into();

        let type_desc = if buf.proto().is_2() {
            let name = Some(String::decode(buf)?);
            let schema_defined = Some(bool::decode(buf)?);
            let ancestors = Vec::<TypePos>::decode(buf)?;
            let elements = Vec::<TupleElement>::decode(buf)?;
            NamedTupleTypeDescriptor {
                id,
                elements,
                name,
                schema_defined,
                ancestors,
            }
        } else {
            let elements = Vec::<TupleElement>::decode(buf)?;
            NamedTupleTypeDescriptor {
                id,
                elements,
                name: None,
                schema_defined: None,
                ancestors: vec![],
            }
        };

        Ok(type_desc)
    }
}

impl Decode for TupleElement {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let name = String::decode(buf)?;
        let type_pos = TypePos::decode(buf)?;
        Ok(TupleElement { name, type_pos })
    }
}

impl Decode for ArrayTypeDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 21, errors::Underflow);
        assert!(buf.get_u8() == 6);
        let id = Uuid::decode(buf)?.into();
        let type_desc = if buf.proto().is_2() {
            let name = Some(String::decode(buf)?);
            let schema_defined = Some(bool::decode(buf)?);
            let ancestors = Vec::<TypePos>::decode(buf)?;
            let type_pos = TypePos::decode(buf)?;
            let dimensions = Vec::<Option<u32>>::decode(buf)?;
            ArrayTypeDescriptor {
                id,
                type_pos,
                dimensions,
                name,
                schema_defined,
                ancestors,
            }
        } else {
            let type_pos = TypePos::decode(buf)?;
            let dimensions = Vec::<Option<u32>>::decode(buf)?;
            ArrayTypeDescriptor {
                id,
                type_pos,
                dimensions,
                name: None,
                schema_defined: None,
                ancestors: vec![],
            }
        };

        Ok(type_desc)
    }
}

impl Decode for EnumerationTypeDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 19, errors::Underflow);
        assert!(buf.get_u8() == 7);
        let id = Uuid::decode(buf)?.into();
        let type_desc = if buf.proto().is_2() {
            let name = Some(String::decode(buf)?);
            let schema_defined = Some(bool::decode(buf)?);
            let ancestors = Vec::<TypePos>::decode(buf)?;
            let members = Vec::<String>::decode(buf)?;
            EnumerationTypeDescriptor {
                id,
                members,
                name,
                schema_defined,
                ancestors,
            }
        } else {
            let members = Vec::<String>::decode(buf)?;
            EnumerationTypeDescriptor {
                id,
                members,
                name: None,
                schema_defined: None,
                ancestors: vec![],
            }
        };

        Ok(type_desc)
    }
}

impl Decode for RangeTypeDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 19, errors::Underflow);
        assert!(buf.get_u8() == 9);
        let id = Uuid::decode(buf)?.into();
        let type_desc = if buf.proto().is_2() {
            let name = Some(String::decode(buf)?);
            let schema_defined = Some(bool::decode(buf)?);
            let ancestors = Vec::<TypePos>::decode(buf)?;
            let type_pos = TypePos::decode(buf)?;
            RangeTypeDescriptor {
                id,
                type_pos,
                name,
                schema_defined,
                ancestors,
            }
        } else {
            let type_pos = TypePos::decode(buf)?;
            RangeTypeDescriptor {
                id,
                type_pos,
                name: None,
                schema_defined: None,
                ancestors: vec![],
            }
        };

        Ok(type_desc)
    }
}

impl Decode for MultiRangeTypeDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 19, errors::Underflow);
        assert!(buf.get_u8() == 0x0C);
        let id = Uuid::decode(buf)?.into();
        let type_desc = if buf.proto().is_2() {
            let name = Some(String::decode(buf)?);
            let schema_defined = Some(bool::decode(buf)?);
            let ancestors = Vec::<TypePos>::decode(buf)?;
            let type_pos = TypePos::decode(buf)?;
            MultiRangeTypeDescriptor {
                id,
                type_pos,
                name,
                schema_defined,
                ancestors,
            }
        } else {
            let type_pos = TypePos::decode(buf)?;
            MultiRangeTypeDescriptor {
                id,
                type_pos,
                name: None,
                schema_defined: None,
                ancestors: vec![],
            }
        };

        Ok(type_desc)
    }
}

impl Decode for ObjectTypeDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 19, errors::Underflow);
        assert!(buf.get_u8() == 0x0A);
        let id = Uuid::decode(buf)?.into();
        let name = Some(String::decode(buf)?);
        let schema_defined = Some(bool::decode(buf)?);
        Ok(ObjectTypeDescriptor {
            id,
            name,
            schema_defined,
        })
    }
}

impl Decode for SQLRecordDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 19, errors::Underflow);
        assert!(buf.get_u8() == 0x0D);
        let id = Uuid::decode(buf)?.into();
        let elements = Vec::<TupleElement>::decode(buf)?;
        Ok(SQLRecordDescriptor { id, elements })
    }
}

impl Decode for TypeAnnotationDescriptor {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 21, errors::Underflow);
        let annotated_type = buf.get_u8();
        assert!(annotated_type >= 0x80);
        let id = Uuid::decode(buf)?.into();
        let annotation = String::decode(buf)?;
        Ok(TypeAnnotationDescriptor {
            annotated_type,
            id,
            annotation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{BaseScalarTypeDescriptor, Descriptor, DescriptorUuid, SetDescriptor, TypePos};
    use uuid::Uuid;

    #[test]
    fn descriptor_uuid_debug_outputs() {
        let float_32: Uuid = "00000000-0000-0000-0000-000000000106".parse().unwrap();
        let descriptor_id = DescriptorUuid::from(float_32);
        assert_eq!(format!("{descriptor_id:?}"), "BaseScalar(float32)");

        let random_uuid: Uuid = "7cc7e050-ef76-4ae9-b8a6-053ca9baa3d5".parse().unwrap();
        let descriptor_id = DescriptorUuid::from(random_uuid);
        assert_eq!(
            format!("{descriptor_id:?}"),
            "7cc7e050-ef76-4ae9-b8a6-053ca9baa3d5"
        );

        let base_scalar = Descriptor::BaseScalar(BaseScalarTypeDescriptor {
            id: "00000000-0000-0000-0000-000000000106"
                .parse::<Uuid>()
                .unwrap()
                .into(),
        });
        assert_eq!(
            format!("{base_scalar:?}"),
            "BaseScalar(BaseScalarTypeDescriptor { id: BaseScalar(float32) })"
        );

        let set_descriptor_with_float32 = Descriptor::Set(SetDescriptor {
            id: "00000000-0000-0000-0000-000000000106"
                .parse::<Uuid>()
                .unwrap()
                .into(),
            type_pos: TypePos(0),
        });
        assert_eq!(
            format!("{set_descriptor_with_float32:?}"),
            "Set(SetDescriptor { id: BaseScalar(float32), type_pos: TypePos(0) })"
        );
    }
}
