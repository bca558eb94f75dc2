/*!
Codecs compiled from type descriptors.

A [Codec] is built once per descriptor tree by [build_codec] and is
immutable and freely shareable afterwards. Decoding produces the dynamic
[Value]; encoding consumes one. The byte layouts here are the protocol's
value formats: scalar codecs see exactly the value bytes (length
prefixes are handled by the enclosing container or argument slot).
*/

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use snafu::{ensure, OptionExt};
use uuid::Uuid;

use crate::common::Cardinality;
use crate::descriptors::{self, Descriptor, TypePos};
use crate::errors::{self, invalid_value, CodecError, DecodeError, EncodeError};
use crate::errors::{UndefinedBaseScalar, UnexpectedDescriptor, UnexpectedTypePos};
use crate::model::Range;
use crate::queryable::{decode_array_envelope, next_shape_element, read_child};
use crate::serialization::decode::RawCodec;
use crate::value::Value;

pub const STD_UUID: Uuid = Uuid::from_u128(0x100);
pub const STD_STR: Uuid = Uuid::from_u128(0x101);
pub const STD_BYTES: Uuid = Uuid::from_u128(0x102);
pub const STD_INT16: Uuid = Uuid::from_u128(0x103);
pub const STD_INT32: Uuid = Uuid::from_u128(0x104);
pub const STD_INT64: Uuid = Uuid::from_u128(0x105);
pub const STD_FLOAT32: Uuid = Uuid::from_u128(0x106);
pub const STD_FLOAT64: Uuid = Uuid::from_u128(0x107);
pub const STD_DECIMAL: Uuid = Uuid::from_u128(0x108);
pub const STD_BOOL: Uuid = Uuid::from_u128(0x109);
pub const STD_DATETIME: Uuid = Uuid::from_u128(0x10a);
pub const CAL_LOCAL_DATETIME: Uuid = Uuid::from_u128(0x10b);
pub const CAL_LOCAL_DATE: Uuid = Uuid::from_u128(0x10c);
pub const CAL_LOCAL_TIME: Uuid = Uuid::from_u128(0x10d);
pub const STD_DURATION: Uuid = Uuid::from_u128(0x10e);
pub const STD_JSON: Uuid = Uuid::from_u128(0x10f);
pub const STD_BIGINT: Uuid = Uuid::from_u128(0x110);
pub const CAL_RELATIVE_DURATION: Uuid = Uuid::from_u128(0x111);
pub const CAL_DATE_DURATION: Uuid = Uuid::from_u128(0x112);
pub const CFG_MEMORY: Uuid = Uuid::from_u128(0x130);
/// The descriptor id of the empty input tuple.
pub const PSEUDO_EMPTY_TUPLE: Uuid = Uuid::from_u128(0xFF);
/// The all-zero id: no meaningful value.
pub const NOTHING_ID: Uuid = Uuid::from_u128(0);

pub fn uuid_to_known_name(uuid: &Uuid) -> Option<&'static str> {
    match *uuid {
        STD_UUID => Some("BaseScalar(uuid)"),
        STD_STR => Some("BaseScalar(str)"),
        STD_BYTES => Some("BaseScalar(bytes)"),
        STD_INT16 => Some("BaseScalar(int16)"),
        STD_INT32 => Some("BaseScalar(int32)"),
        STD_INT64 => Some("BaseScalar(int64)"),
        STD_FLOAT32 => Some("BaseScalar(float32)"),
        STD_FLOAT64 => Some("BaseScalar(float64)"),
        STD_DECIMAL => Some("BaseScalar(decimal)"),
        STD_BOOL => Some("BaseScalar(bool)"),
        STD_DATETIME => Some("BaseScalar(datetime)"),
        CAL_LOCAL_DATETIME => Some("BaseScalar(cal::local_datetime)"),
        CAL_LOCAL_DATE => Some("BaseScalar(cal::local_date)"),
        CAL_LOCAL_TIME => Some("BaseScalar(cal::local_time)"),
        STD_DURATION => Some("BaseScalar(duration)"),
        STD_JSON => Some("BaseScalar(json)"),
        STD_BIGINT => Some("BaseScalar(bigint)"),
        CAL_RELATIVE_DURATION => Some("BaseScalar(cal::relative_duration)"),
        CAL_DATE_DURATION => Some("BaseScalar(cal::date_duration)"),
        CFG_MEMORY => Some("BaseScalar(cfg::memory)"),
        _ => None,
    }
}

/// A compiled encoder/decoder pair for one descriptor.
pub trait Codec: fmt::Debug + Send + Sync {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError>;
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError>;
    /// The id of the descriptor this codec was built from.
    fn descriptor_id(&self) -> Uuid;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectShape(pub(crate) Arc<ObjectShapeInfo>);

#[derive(Debug, PartialEq, Eq)]
pub struct ObjectShapeInfo {
    pub elements: Vec<ShapeElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeElement {
    pub flag_implicit: bool,
    pub flag_link_property: bool,
    pub flag_link: bool,
    pub cardinality: Option<Cardinality>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedTupleShape(Arc<NamedTupleShapeInfo>);

#[derive(Debug, PartialEq, Eq)]
pub struct NamedTupleShapeInfo {
    pub elements: Vec<TupleElement>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct TupleElement {
    pub name: String,
}

/// A value of some enum type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue(Arc<str>);

impl ObjectShape {
    pub fn new(elements: Vec<ShapeElement>) -> ObjectShape {
        ObjectShape(Arc::new(ObjectShapeInfo { elements }))
    }
    pub fn elements(&self) -> &[ShapeElement] {
        &self.0.elements
    }
}

impl Deref for ObjectShape {
    type Target = ObjectShapeInfo;
    fn deref(&self) -> &ObjectShapeInfo {
        &self.0
    }
}

impl NamedTupleShape {
    pub fn elements(&self) -> &[TupleElement] {
        &self.0.elements
    }
}

impl Deref for NamedTupleShape {
    type Target = NamedTupleShapeInfo;
    fn deref(&self) -> &NamedTupleShapeInfo {
        &self.0
    }
}

impl ShapeElement {
    pub fn required(&self) -> bool {
        !matches!(
            self.cardinality,
            Some(Cardinality::AtMostOne) | Some(Cardinality::NoResult)
        )
    }
}

impl From<&[descriptors::ShapeElement]> for ObjectShape {
    fn from(elements: &[descriptors::ShapeElement]) -> ObjectShape {
        ObjectShape::new(
            elements
                .iter()
                .map(|e| ShapeElement {
                    flag_implicit: e.flag_implicit,
                    flag_link_property: e.flag_link_property,
                    flag_link: e.flag_link,
                    cardinality: e.cardinality,
                    name: e.name.clone(),
                })
                .collect(),
        )
    }
}

impl From<&[descriptors::TupleElement]> for NamedTupleShape {
    fn from(elements: &[descriptors::TupleElement]) -> NamedTupleShape {
        NamedTupleShape(Arc::new(NamedTupleShapeInfo {
            elements: elements
                .iter()
                .map(|e| TupleElement {
                    name: e.name.clone(),
                })
                .collect(),
        }))
    }
}

impl EnumValue {
    pub fn new(value: &str) -> EnumValue {
        EnumValue(value.into())
    }
}

impl Deref for EnumValue {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EnumValue {
    fn from(value: &str) -> EnumValue {
        EnumValue(value.into())
    }
}

/// Build the codec tree for `root_pos` over `descriptors`.
pub fn build_codec(
    root_pos: Option<TypePos>,
    descriptors: &[Descriptor],
) -> Result<Arc<dyn Codec>, CodecError> {
    let builder = CodecBuilder { descriptors };
    match root_pos {
        Some(pos) => builder.build(pos),
        None => Ok(Arc::new(NothingCodec {})),
    }
}

struct CodecBuilder<'a> {
    descriptors: &'a [Descriptor],
}

impl CodecBuilder<'_> {
    fn get(&self, pos: TypePos) -> Result<&Descriptor, CodecError> {
        self.descriptors
            .get(pos.0 as usize)
            .context(UnexpectedTypePos { position: pos.0 })
    }
    fn build(&self, pos: TypePos) -> Result<Arc<dyn Codec>, CodecError> {
        use Descriptor as D;
        match self.get(pos)? {
            D::BaseScalar(base) => scalar_codec(&base.id),
            D::Scalar(scalar) => match scalar.base_type_pos {
                Some(base_pos) => Ok(Arc::new(ScalarCodec {
                    id: *scalar.id,
                    inner: self.build(base_pos)?,
                })),
                // v2 encodes well-known scalars without an ancestor chain
                None => scalar_codec(&scalar.id),
            },
            D::Enumeration(d) => Ok(Arc::new(EnumCodec {
                id: *d.id,
                members: d.members.iter().map(|x| x[..].into()).collect(),
            })),
            D::ObjectShape(d) => Ok(Arc::new(ObjectCodec {
                id: *d.id,
                shape: d.elements.as_slice().into(),
                codecs: d
                    .elements
                    .iter()
                    .map(|e| self.build(e.type_pos))
                    .collect::<Result<_, _>>()?,
            })),
            D::Set(d) => Ok(Arc::new(SetCodec {
                id: *d.id,
                element_is_array: matches!(self.get(d.type_pos)?, D::Array(_)),
                element: self.build(d.type_pos)?,
            })),
            D::Array(d) => Ok(Arc::new(ArrayCodec {
                id: *d.id,
                element: self.build(d.type_pos)?,
            })),
            D::Tuple(d) => Ok(Arc::new(TupleCodec {
                id: *d.id,
                elements: d
                    .element_types
                    .iter()
                    .map(|&p| self.build(p))
                    .collect::<Result<_, _>>()?,
            })),
            D::NamedTuple(d) => Ok(Arc::new(NamedTupleCodec {
                id: *d.id,
                shape: d.elements.as_slice().into(),
                codecs: d
                    .elements
                    .iter()
                    .map(|e| self.build(e.type_pos))
                    .collect::<Result<_, _>>()?,
            })),
            D::Range(d) => Ok(Arc::new(RangeCodec {
                id: *d.id,
                element: self.build(d.type_pos)?,
            })),
            D::MultiRange(d) => Ok(Arc::new(MultiRangeCodec {
                id: *d.id,
                element: self.build(d.type_pos)?,
            })),
            D::SQLRecord(d) => Ok(Arc::new(ObjectCodec {
                id: *d.id,
                shape: ObjectShape::new(
                    d.elements
                        .iter()
                        .map(|e| ShapeElement {
                            flag_implicit: false,
                            flag_link_property: false,
                            flag_link: false,
                            cardinality: Some(Cardinality::One),
                            name: e.name.clone(),
                        })
                        .collect(),
                ),
                codecs: d
                    .elements
                    .iter()
                    .map(|e| self.build(e.type_pos))
                    .collect::<Result<_, _>>()?,
            })),
            D::Object(_) | D::TypeAnnotation(_) => UnexpectedDescriptor.fail(),
        }
    }
}

pub(crate) fn scalar_codec(uuid: &Uuid) -> Result<Arc<dyn Codec>, CodecError> {
    match *uuid {
        STD_UUID => Ok(Arc::new(UuidCodec {})),
        STD_STR => Ok(Arc::new(StrCodec {})),
        STD_BYTES => Ok(Arc::new(BytesCodec {})),
        STD_INT16 => Ok(Arc::new(Int16Codec {})),
        STD_INT32 => Ok(Arc::new(Int32Codec {})),
        STD_INT64 => Ok(Arc::new(Int64Codec {})),
        STD_FLOAT32 => Ok(Arc::new(Float32Codec {})),
        STD_FLOAT64 => Ok(Arc::new(Float64Codec {})),
        STD_DECIMAL => Ok(Arc::new(DecimalCodec {})),
        STD_BOOL => Ok(Arc::new(BoolCodec {})),
        STD_DATETIME => Ok(Arc::new(DatetimeCodec {})),
        CAL_LOCAL_DATETIME => Ok(Arc::new(LocalDatetimeCodec {})),
        CAL_LOCAL_DATE => Ok(Arc::new(LocalDateCodec {})),
        CAL_LOCAL_TIME => Ok(Arc::new(LocalTimeCodec {})),
        STD_DURATION => Ok(Arc::new(DurationCodec {})),
        STD_JSON => Ok(Arc::new(JsonCodec {})),
        STD_BIGINT => Ok(Arc::new(BigIntCodec {})),
        CAL_RELATIVE_DURATION => Ok(Arc::new(RelativeDurationCodec {})),
        CAL_DATE_DURATION => Ok(Arc::new(DateDurationCodec {})),
        CFG_MEMORY => Ok(Arc::new(ConfigMemoryCodec {})),
        _ => UndefinedBaseScalar { uuid: *uuid }.fail(),
    }
}

#[derive(Debug)]
struct NothingCodec {}

#[derive(Debug)]
struct UuidCodec {}
#[derive(Debug)]
struct StrCodec {}
#[derive(Debug)]
struct BytesCodec {}
#[derive(Debug)]
struct Int16Codec {}
#[derive(Debug)]
struct Int32Codec {}
#[derive(Debug)]
struct Int64Codec {}
#[derive(Debug)]
struct Float32Codec {}
#[derive(Debug)]
struct Float64Codec {}
#[derive(Debug)]
struct DecimalCodec {}
#[derive(Debug)]
struct BoolCodec {}
#[derive(Debug)]
struct DatetimeCodec {}
#[derive(Debug)]
struct LocalDatetimeCodec {}
#[derive(Debug)]
struct LocalDateCodec {}
#[derive(Debug)]
struct LocalTimeCodec {}
#[derive(Debug)]
struct DurationCodec {}
#[derive(Debug)]
struct JsonCodec {}
#[derive(Debug)]
struct BigIntCodec {}
#[derive(Debug)]
struct RelativeDurationCodec {}
#[derive(Debug)]
struct DateDurationCodec {}
#[derive(Debug)]
struct ConfigMemoryCodec {}

/// A user-defined scalar: delegates to its base codec but keeps its own
/// descriptor identity.
#[derive(Debug)]
struct ScalarCodec {
    id: Uuid,
    inner: Arc<dyn Codec>,
}

#[derive(Debug)]
struct EnumCodec {
    id: Uuid,
    members: Vec<Arc<str>>,
}

#[derive(Debug)]
struct ObjectCodec {
    id: Uuid,
    shape: ObjectShape,
    codecs: Vec<Arc<dyn Codec>>,
}

#[derive(Debug)]
struct TupleCodec {
    id: Uuid,
    elements: Vec<Arc<dyn Codec>>,
}

#[derive(Debug)]
struct NamedTupleCodec {
    id: Uuid,
    shape: NamedTupleShape,
    codecs: Vec<Arc<dyn Codec>>,
}

#[derive(Debug)]
struct ArrayCodec {
    id: Uuid,
    element: Arc<dyn Codec>,
}

#[derive(Debug)]
struct SetCodec {
    id: Uuid,
    element: Arc<dyn Codec>,
    element_is_array: bool,
}

#[derive(Debug)]
struct RangeCodec {
    id: Uuid,
    element: Arc<dyn Codec>,
}

#[derive(Debug)]
struct MultiRangeCodec {
    id: Uuid,
    element: Arc<dyn Codec>,
}

fn write_length_prefixed(
    buf: &mut BytesMut,
    f: impl FnOnce(&mut BytesMut) -> Result<(), EncodeError>,
) -> Result<(), EncodeError> {
    buf.reserve(4);
    let pos = buf.len();
    buf.put_u32(0); // replaced after serializing the value
    f(buf)?;
    let len = i32::try_from(buf.len() - pos - 4)
        .ok()
        .context(errors::ElementTooLong)?;
    buf[pos..pos + 4].copy_from_slice(&len.to_be_bytes());
    Ok(())
}

impl Codec for NothingCodec {
    fn decode(&self, _buf: &[u8]) -> Result<Value, DecodeError> {
        Ok(Value::Nothing)
    }
    fn encode(&self, _buf: &mut BytesMut, _value: &Value) -> Result<(), EncodeError> {
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        NOTHING_ID
    }
}

impl Codec for UuidCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        RawCodec::decode(buf).map(Value::Uuid)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let val = match value {
            Value::Uuid(val) => val,
            _ => Err(invalid_value("uuid", value))?,
        };
        buf.extend_from_slice(val.as_bytes());
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        STD_UUID
    }
}

impl Codec for StrCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        RawCodec::decode(buf).map(Value::Str)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let val = match value {
            Value::Str(val) => val,
            _ => Err(invalid_value("str", value))?,
        };
        buf.extend_from_slice(val.as_bytes());
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        STD_STR
    }
}

impl Codec for BytesCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        RawCodec::decode(buf).map(Value::Bytes)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let val = match value {
            Value::Bytes(val) => val,
            _ => Err(invalid_value("bytes", value))?,
        };
        buf.extend_from_slice(val);
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        STD_BYTES
    }
}

impl Codec for Int16Codec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        RawCodec::decode(buf).map(Value::Int16)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let &val = match value {
            Value::Int16(val) => val,
            _ => Err(invalid_value("int16", value))?,
        };
        buf.reserve(2);
        buf.put_i16(val);
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        STD_INT16
    }
}

impl Codec for Int32Codec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        RawCodec::decode(buf).map(Value::Int32)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let &val = match value {
            Value::Int32(val) => val,
            _ => Err(invalid_value("int32", value))?,
        };
        buf.reserve(4);
        buf.put_i32(val);
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        STD_INT32
    }
}

impl Codec for Int64Codec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        RawCodec::decode(buf).map(Value::Int64)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let &val = match value {
            Value::Int64(val) => val,
            _ => Err(invalid_value("int64", value))?,
        };
        buf.reserve(8);
        buf.put_i64(val);
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        STD_INT64
    }
}

impl Codec for Float32Codec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        RawCodec::decode(buf).map(Value::Float32)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let &val = match value {
            Value::Float32(val) => val,
            _ => Err(invalid_value("float32", value))?,
        };
        buf.reserve(4);
        buf.put_f32(val);
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        STD_FLOAT32
    }
}

impl Codec for Float64Codec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        RawCodec::decode(buf).map(Value::Float64)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let &val = match value {
            Value::Float64(val) => val,
            _ => Err(invalid_value("float64", value))?,
        };
        buf.reserve(8);
        buf.put_f64(val);
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        STD_FLOAT64
    }
}

impl Codec for BoolCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        RawCodec::decode(buf).map(Value::Bool)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let &val = match value {
            Value::Bool(val) => val,
            _ => Err(invalid_value("bool", value))?,
        };
        buf.reserve(1);
        buf.put_u8(val as u8);
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        STD_BOOL
    }
}

impl Codec for DatetimeCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        RawCodec::decode(buf).map(Value::Datetime)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let &val = match value {
            Value::Datetime(val) => val,
            _ => Err(invalid_value("datetime", value))?,
        };
        buf.reserve(8);
        buf.put_i64(val.postgres_micros());
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        STD_DATETIME
    }
}

impl Codec for LocalDatetimeCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        RawCodec::decode(buf).map(Value::LocalDatetime)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let &val = match value {
            Value::LocalDatetime(val) => val,
            _ => Err(invalid_value("cal::local_datetime", value))?,
        };
        buf.reserve(8);
        buf.put_i64(val.postgres_micros());
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        CAL_LOCAL_DATETIME
    }
}

impl Codec for LocalDateCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        RawCodec::decode(buf).map(Value::LocalDate)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let &val = match value {
            Value::LocalDate(val) => val,
            _ => Err(invalid_value("cal::local_date", value))?,
        };
        buf.reserve(4);
        buf.put_i32(val.days());
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        CAL_LOCAL_DATE
    }
}

impl Codec for LocalTimeCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        RawCodec::decode(buf).map(Value::LocalTime)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let &val = match value {
            Value::LocalTime(val) => val,
            _ => Err(invalid_value("cal::local_time", value))?,
        };
        buf.reserve(8);
        buf.put_i64(val.micros() as i64);
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        CAL_LOCAL_TIME
    }
}

impl Codec for DurationCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        RawCodec::decode(buf).map(Value::Duration)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let &val = match value {
            Value::Duration(val) => val,
            _ => Err(invalid_value("duration", value))?,
        };
        buf.reserve(16);
        buf.put_i64(val.micros());
        buf.put_u32(0); // reserved
        buf.put_u32(0); // reserved
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        STD_DURATION
    }
}

impl Codec for RelativeDurationCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        RawCodec::decode(buf).map(Value::RelativeDuration)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let &val = match value {
            Value::RelativeDuration(val) => val,
            _ => Err(invalid_value("cal::relative_duration", value))?,
        };
        buf.reserve(16);
        buf.put_i64(val.micros());
        buf.put_i32(val.days());
        buf.put_i32(val.months());
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        CAL_RELATIVE_DURATION
    }
}

impl Codec for DateDurationCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        RawCodec::decode(buf).map(Value::DateDuration)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let &val = match value {
            Value::DateDuration(val) => val,
            _ => Err(invalid_value("cal::date_duration", value))?,
        };
        buf.reserve(16);
        buf.put_i64(0); // reserved
        buf.put_i32(val.days());
        buf.put_i32(val.months());
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        CAL_DATE_DURATION
    }
}

impl Codec for JsonCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        RawCodec::decode(buf).map(Value::Json)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let val = match value {
            Value::Json(val) => val,
            _ => Err(invalid_value("json", value))?,
        };
        buf.reserve(1 + val.len());
        buf.put_u8(1); // format version
        buf.extend_from_slice(val.as_bytes());
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        STD_JSON
    }
}

impl Codec for BigIntCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        RawCodec::decode(buf).map(Value::BigInt)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let val = match value {
            Value::BigInt(val) => val,
            _ => Err(invalid_value("bigint", value))?,
        };
        encode_digit_header(buf, val.digits(), val.weight(), val.is_negative(), 0)?;
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        STD_BIGINT
    }
}

impl Codec for DecimalCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        RawCodec::decode(buf).map(Value::Decimal)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let val = match value {
            Value::Decimal(val) => val,
            _ => Err(invalid_value("decimal", value))?,
        };
        encode_digit_header(
            buf,
            val.digits(),
            val.weight(),
            val.is_negative(),
            val.decimal_digits(),
        )?;
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        STD_DECIMAL
    }
}

fn encode_digit_header(
    buf: &mut BytesMut,
    digits: &[u16],
    weight: i16,
    negative: bool,
    decimal_digits: u16,
) -> Result<(), EncodeError> {
    let ndigits = u16::try_from(digits.len())
        .ok()
        .context(errors::BigIntTooLong)?;
    buf.reserve(8 + digits.len() * 2);
    buf.put_u16(ndigits);
    buf.put_i16(weight);
    buf.put_u16(if negative { 0x4000 } else { 0x0000 });
    buf.put_u16(decimal_digits);
    for &digit in digits {
        buf.put_u16(digit);
    }
    Ok(())
}

impl Codec for ConfigMemoryCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        RawCodec::decode(buf).map(Value::ConfigMemory)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let &val = match value {
            Value::ConfigMemory(val) => val,
            _ => Err(invalid_value("cfg::memory", value))?,
        };
        buf.reserve(8);
        buf.put_i64(val.bytes());
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        CFG_MEMORY
    }
}

impl Codec for ScalarCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        self.inner.decode(buf)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        self.inner.encode(buf, value)
    }
    fn descriptor_id(&self) -> Uuid {
        self.id
    }
}

impl Codec for EnumCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        let val = <&str as RawCodec>::decode(buf)?;
        let val = self
            .members
            .iter()
            .find(|m| &***m == val)
            .context(errors::ExtraEnumValue)?;
        Ok(Value::Enum(EnumValue(val.clone())))
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let val = match value {
            Value::Enum(val) => &**val,
            Value::Str(val) => &val[..],
            _ => Err(invalid_value("enum", value))?,
        };
        ensure!(
            self.members.iter().any(|m| &**m == val),
            errors::MissingEnumValue
        );
        buf.extend_from_slice(val.as_bytes());
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        self.id
    }
}

impl Codec for ObjectCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        ensure!(buf.len() >= 4, errors::Underflow);
        let size = u32::from_be_bytes(buf[..4].try_into().unwrap()) as usize;
        ensure!(size == self.codecs.len(), errors::ObjectSizeMismatch);
        let mut off = 4;
        let mut fields = Vec::with_capacity(size);
        for (codec, element) in self.codecs.iter().zip(self.shape.elements()) {
            match next_shape_element(buf, &mut off)? {
                Some(data) => fields.push(Some(codec.decode(data)?)),
                None => {
                    ensure!(!element.required(), errors::MissingRequiredElement);
                    fields.push(None);
                }
            }
        }
        ensure!(off == buf.len(), errors::ExtraData);
        Ok(Value::Object {
            shape: self.shape.clone(),
            fields,
        })
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let (shape, fields) = match value {
            Value::Object { shape, fields } => (shape, fields),
            _ => Err(invalid_value("object", value))?,
        };
        ensure!(shape == &self.shape, errors::ObjectShapeMismatch);
        ensure!(fields.len() == self.codecs.len(), errors::ObjectShapeMismatch);
        buf.reserve(4 + 8 * self.codecs.len());
        buf.put_u32(
            u32::try_from(self.codecs.len())
                .ok()
                .context(errors::TooManyElements)?,
        );
        for ((codec, field), element) in
            self.codecs.iter().zip(fields).zip(self.shape.elements())
        {
            buf.reserve(8);
            buf.put_u32(0); // reserved
            match field {
                Some(v) => write_length_prefixed(buf, |buf| codec.encode(buf, v))?,
                None => {
                    ensure!(!element.required(), errors::RequiredElementMissing);
                    buf.put_i32(-1);
                }
            }
        }
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        self.id
    }
}

impl Codec for TupleCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        ensure!(buf.len() >= 4, errors::Underflow);
        let size = u32::from_be_bytes(buf[..4].try_into().unwrap()) as usize;
        ensure!(size == self.elements.len(), errors::TupleSizeMismatch);
        let mut off = 4;
        let mut items = Vec::with_capacity(size);
        for codec in &self.elements {
            let data = next_shape_element(buf, &mut off)?
                .context(errors::MissingRequiredElement)?;
            items.push(codec.decode(data)?);
        }
        ensure!(off == buf.len(), errors::ExtraData);
        Ok(Value::Tuple(items))
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let items = match value {
            Value::Tuple(items) => items,
            _ => Err(invalid_value("tuple", value))?,
        };
        ensure!(items.len() == self.elements.len(), errors::TupleShapeMismatch);
        buf.reserve(4 + 8 * items.len());
        buf.put_u32(
            u32::try_from(items.len())
                .ok()
                .context(errors::TooManyElements)?,
        );
        for (codec, item) in self.elements.iter().zip(items) {
            buf.reserve(8);
            buf.put_u32(0); // reserved
            write_length_prefixed(buf, |buf| codec.encode(buf, item))?;
        }
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        self.id
    }
}

impl Codec for NamedTupleCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        ensure!(buf.len() >= 4, errors::Underflow);
        let size = u32::from_be_bytes(buf[..4].try_into().unwrap()) as usize;
        ensure!(size == self.codecs.len(), errors::TupleSizeMismatch);
        let mut off = 4;
        let mut fields = Vec::with_capacity(size);
        for codec in &self.codecs {
            let data = next_shape_element(buf, &mut off)?
                .context(errors::MissingRequiredElement)?;
            fields.push(codec.decode(data)?);
        }
        ensure!(off == buf.len(), errors::ExtraData);
        Ok(Value::NamedTuple {
            shape: self.shape.clone(),
            fields,
        })
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let (shape, fields) = match value {
            Value::NamedTuple { shape, fields } => (shape, fields),
            _ => Err(invalid_value("named_tuple", value))?,
        };
        ensure!(shape == &self.shape, errors::TupleShapeMismatch);
        ensure!(fields.len() == self.codecs.len(), errors::TupleShapeMismatch);
        buf.reserve(4 + 8 * fields.len());
        buf.put_u32(
            u32::try_from(fields.len())
                .ok()
                .context(errors::TooManyElements)?,
        );
        for (codec, field) in self.codecs.iter().zip(fields) {
            buf.reserve(8);
            buf.put_u32(0); // reserved
            write_length_prefixed(buf, |buf| codec.encode(buf, field))?;
        }
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        self.id
    }
}

fn encode_array_envelope(buf: &mut BytesMut, len: usize) -> Result<(), EncodeError> {
    if len == 0 {
        buf.reserve(12);
        buf.put_u32(0); // ndims
        buf.put_u32(0); // reserved
        buf.put_u32(0); // reserved
        return Ok(());
    }
    buf.reserve(20);
    buf.put_u32(1); // ndims
    buf.put_u32(0); // reserved
    buf.put_u32(0); // reserved
    buf.put_u32(u32::try_from(len).ok().context(errors::ArrayTooLong)?);
    buf.put_u32(1); // lower
    Ok(())
}

impl Codec for ArrayCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        let Some((count, mut off)) = decode_array_envelope(buf)? else {
            return Ok(Value::Array(Vec::new()));
        };
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            let data = read_child(buf, &mut off)?
                .context(errors::MissingRequiredElement)?;
            items.push(self.element.decode(data)?);
        }
        ensure!(off == buf.len(), errors::ExtraData);
        Ok(Value::Array(items))
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let items = match value {
            Value::Array(items) => items,
            _ => Err(invalid_value("array", value))?,
        };
        encode_array_envelope(buf, items.len())?;
        for item in items {
            write_length_prefixed(buf, |buf| self.element.encode(buf, item))?;
        }
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        self.id
    }
}

impl Codec for SetCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        let Some((count, mut off)) = decode_array_envelope(buf)? else {
            return Ok(Value::Set(Vec::new()));
        };
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            // sets of arrays wrap each element in an extra
            // single-element envelope of twelve bytes
            if self.element_is_array {
                ensure!(buf.len() >= off + 12, errors::InvalidSetShape);
                off += 12;
            }
            let data = read_child(buf, &mut off)?
                .context(errors::MissingRequiredElement)?;
            items.push(self.element.decode(data)?);
        }
        ensure!(off == buf.len(), errors::ExtraData);
        Ok(Value::Set(items))
    }
    fn encode(&self, _buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        Err(invalid_value("set", value))
    }
    fn descriptor_id(&self) -> Uuid {
        self.id
    }
}

fn decode_range(buf: &[u8], element: &dyn Codec) -> Result<Range<Box<Value>>, DecodeError> {
    use crate::model::range;
    ensure!(!buf.is_empty(), errors::Underflow);
    let flags = buf[0];
    let mut off = 1;
    if flags & range::EMPTY != 0 {
        ensure!(off == buf.len(), errors::ExtraData);
        return Ok(Range::empty());
    }
    let lower = if flags & range::LB_INF == 0 {
        let data = read_child(buf, &mut off)?.context(errors::MissingRequiredElement)?;
        Some(Box::new(element.decode(data)?))
    } else {
        None
    };
    let upper = if flags & range::UB_INF == 0 {
        let data = read_child(buf, &mut off)?.context(errors::MissingRequiredElement)?;
        Some(Box::new(element.decode(data)?))
    } else {
        None
    };
    ensure!(off == buf.len(), errors::ExtraData);
    Ok(Range::with_inclusivity(
        lower,
        upper,
        flags & range::LB_INC != 0,
        flags & range::UB_INC != 0,
    ))
}

impl Codec for RangeCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        decode_range(buf, &*self.element).map(Value::Range)
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let range = match value {
            Value::Range(range) => range,
            _ => Err(invalid_value("range", value))?,
        };
        encode_range(buf, range, &*self.element)
    }
    fn descriptor_id(&self) -> Uuid {
        self.id
    }
}

fn encode_range(
    buf: &mut BytesMut,
    range: &Range<Box<Value>>,
    element: &dyn Codec,
) -> Result<(), EncodeError> {
    buf.reserve(1);
    buf.put_u8(range.flags());
    if range.is_empty() {
        return Ok(());
    }
    if let Some(lower) = range.lower() {
        write_length_prefixed(buf, |buf| element.encode(buf, lower))?;
    }
    if let Some(upper) = range.upper() {
        write_length_prefixed(buf, |buf| element.encode(buf, upper))?;
    }
    Ok(())
}

impl Codec for MultiRangeCodec {
    fn decode(&self, buf: &[u8]) -> Result<Value, DecodeError> {
        ensure!(buf.len() >= 4, errors::Underflow);
        let count = u32::from_be_bytes(buf[..4].try_into().unwrap()) as usize;
        let mut off = 4;
        let mut ranges = Vec::with_capacity(count);
        for _ in 0..count {
            let data = read_child(buf, &mut off)?
                .context(errors::MissingRequiredElement)?;
            ranges.push(decode_range(data, &*self.element)?);
        }
        ensure!(off == buf.len(), errors::ExtraData);
        Ok(Value::MultiRange(ranges))
    }
    fn encode(&self, buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
        let ranges = match value {
            Value::MultiRange(ranges) => ranges,
            _ => Err(invalid_value("multirange", value))?,
        };
        buf.reserve(4);
        buf.put_u32(
            u32::try_from(ranges.len())
                .ok()
                .context(errors::TooManyElements)?,
        );
        for range in ranges {
            write_length_prefixed(buf, |buf| encode_range(buf, range, &*self.element))?;
        }
        Ok(())
    }
    fn descriptor_id(&self) -> Uuid {
        self.id
    }
}
