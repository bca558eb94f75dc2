/*!
Contains the [QueryArg] and [QueryArgs] traits: encoding of
caller-supplied query arguments against the server's input descriptor.

Only a subset of descriptors is legal on the input side: base scalars
(and their aliases), enums, arrays, ranges, multi-ranges and the
synthetic argument shape. The shape's first field name decides between
positional (`"0"`/`"1"`) and keyword arguments.
*/

use std::convert::{TryFrom, TryInto};
use std::ops::Deref;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use uuid::Uuid;

use gel_client_errors::{ClientEncodingError, DescriptorMismatch, ProtocolError};
use gel_client_errors::{Error, ErrorKind, InvalidReferenceError, MissingArgumentError};
use gel_client_errors::{ParameterTypeMismatchError, UnknownArgumentError};

use crate::codec::{self, build_codec, Codec, ObjectShape, ShapeElement};
use crate::common::Cardinality;
use crate::descriptors::{Descriptor, EnumerationTypeDescriptor, TypePos};
use crate::features::ProtocolVersion;
use crate::model::Range;
use crate::value::Value;

pub struct Encoder<'a> {
    pub ctx: &'a DescriptorContext<'a>,
    pub buf: &'a mut BytesMut,
}

/// A single argument for a query.
pub trait QueryArg: Send + Sync + Sized {
    fn encode_slot(&self, encoder: &mut Encoder) -> Result<(), Error>;
    fn check_descriptor(&self, ctx: &DescriptorContext, pos: TypePos) -> Result<(), Error>;
    fn to_value(&self) -> Result<Value, Error>;
}

/// A scalar that can encode itself as a query argument.
///
/// A user type implementing this is preferred over the built-in codec
/// for the same scalar.
pub trait ScalarArg: Send + Sync + Sized {
    fn encode(&self, encoder: &mut Encoder) -> Result<(), Error>;
    fn check_descriptor(ctx: &DescriptorContext, pos: TypePos) -> Result<(), Error>;
    fn to_value(&self) -> Result<Value, Error>;
}

/// The whole argument pack of one query.
///
/// This trait is implemented for tuples of sizes up to twelve
/// (positional arguments) and for [Value] objects (keyword arguments).
pub trait QueryArgs: Send + Sync {
    fn encode(&self, encoder: &mut Encoder) -> Result<(), Error>;
}

pub struct DescriptorContext<'a> {
    pub(crate) proto: &'a ProtocolVersion,
    pub(crate) root_pos: Option<TypePos>,
    pub(crate) descriptors: &'a [Descriptor],
}

impl<'a> Encoder<'a> {
    pub fn new(ctx: &'a DescriptorContext<'a>, buf: &'a mut BytesMut) -> Encoder<'a> {
        Encoder { ctx, buf }
    }
    /// Write a 32-bit length placeholder, run `f`, patch the length in.
    /// Nesting is supported.
    pub fn length_prefixed(
        &mut self,
        f: impl FnOnce(&mut Encoder) -> Result<(), Error>,
    ) -> Result<(), Error> {
        self.buf.reserve(4);
        let pos = self.buf.len();
        self.buf.put_u32(0); // replaced after serializing a value

        f(self)?;

        let len = self.buf.len() - pos - 4;
        self.buf[pos..pos + 4].copy_from_slice(
            &u32::try_from(len)
                .map_err(|_| ClientEncodingError::with_message("encoded value is too long"))?
                .to_be_bytes(),
        );

        Ok(())
    }
}

impl DescriptorContext<'_> {
    pub fn get(&self, type_pos: TypePos) -> Result<&Descriptor, Error> {
        self.descriptors
            .get(type_pos.0 as usize)
            .ok_or_else(|| ProtocolError::with_message("invalid type descriptor"))
    }
    pub fn build_codec(&self) -> Result<Arc<dyn Codec>, Error> {
        build_codec(self.root_pos, self.descriptors)
            .map_err(|e| ProtocolError::with_source(e).context("error building input codec"))
    }
    pub fn wrong_type(&self, descriptor: &Descriptor, expected: &str) -> Error {
        DescriptorMismatch::with_message(format!(
            "server expected {descriptor:?}, client encodes {expected}"
        ))
    }
    pub fn field_number(&self, expected: usize, unexpected: usize) -> Error {
        DescriptorMismatch::with_message(format!(
            "expected {expected} arguments, got {unexpected}"
        ))
    }
}

fn resolve_scalar<'t>(
    ctx: &'t DescriptorContext,
    pos: TypePos,
) -> Result<&'t Descriptor, Error> {
    let mut desc = ctx.get(pos)?;
    while let Descriptor::Scalar(scalar) = desc {
        match scalar.base_type_pos {
            Some(base) => desc = ctx.get(base)?,
            None => break,
        }
    }
    Ok(desc)
}

fn check_scalar_arg(
    ctx: &DescriptorContext,
    pos: TypePos,
    wanted: Uuid,
    expected: &str,
) -> Result<(), Error> {
    match resolve_scalar(ctx, pos)? {
        Descriptor::BaseScalar(base) if *base.id == wanted => Ok(()),
        Descriptor::Scalar(scalar) if *scalar.id == wanted => Ok(()),
        desc => Err(ctx.wrong_type(desc, expected)),
    }
}

impl<T: ScalarArg> ScalarArg for &T {
    fn encode(&self, encoder: &mut Encoder) -> Result<(), Error> {
        (*self).encode(encoder)
    }
    fn check_descriptor(ctx: &DescriptorContext, pos: TypePos) -> Result<(), Error> {
        T::check_descriptor(ctx, pos)
    }
    fn to_value(&self) -> Result<Value, Error> {
        (*self).to_value()
    }
}

macro_rules! implement_scalar_arg {
    ($type: ty, $id: expr, $name: expr, $variant: ident) => {
        impl ScalarArg for $type {
            fn encode(&self, encoder: &mut Encoder) -> Result<(), Error> {
                let codec = codec::scalar_codec(&$id)
                    .map_err(ClientEncodingError::with_source)?;
                codec
                    .encode(encoder.buf, &Value::$variant(self.clone()))
                    .map_err(ClientEncodingError::with_source)
            }
            fn check_descriptor(ctx: &DescriptorContext, pos: TypePos) -> Result<(), Error> {
                check_scalar_arg(ctx, pos, $id, $name)
            }
            fn to_value(&self) -> Result<Value, Error> {
                Ok(Value::$variant(self.clone()))
            }
        }
    };
}

implement_scalar_arg!(String, codec::STD_STR, "std::str", Str);
implement_scalar_arg!(i16, codec::STD_INT16, "std::int16", Int16);
implement_scalar_arg!(i32, codec::STD_INT32, "std::int32", Int32);
implement_scalar_arg!(i64, codec::STD_INT64, "std::int64", Int64);
implement_scalar_arg!(f32, codec::STD_FLOAT32, "std::float32", Float32);
implement_scalar_arg!(f64, codec::STD_FLOAT64, "std::float64", Float64);
implement_scalar_arg!(bool, codec::STD_BOOL, "std::bool", Bool);
implement_scalar_arg!(Uuid, codec::STD_UUID, "std::uuid", Uuid);
implement_scalar_arg!(crate::model::Json, codec::STD_JSON, "std::json", Json);
implement_scalar_arg!(crate::model::BigInt, codec::STD_BIGINT, "std::bigint", BigInt);
implement_scalar_arg!(
    crate::model::Datetime,
    codec::STD_DATETIME,
    "std::datetime",
    Datetime
);
implement_scalar_arg!(
    crate::model::Duration,
    codec::STD_DURATION,
    "std::duration",
    Duration
);
implement_scalar_arg!(
    crate::model::LocalDatetime,
    codec::CAL_LOCAL_DATETIME,
    "cal::local_datetime",
    LocalDatetime
);
implement_scalar_arg!(
    crate::model::LocalDate,
    codec::CAL_LOCAL_DATE,
    "cal::local_date",
    LocalDate
);
implement_scalar_arg!(
    crate::model::LocalTime,
    codec::CAL_LOCAL_TIME,
    "cal::local_time",
    LocalTime
);
implement_scalar_arg!(
    crate::model::ConfigMemory,
    codec::CFG_MEMORY,
    "cfg::memory",
    ConfigMemory
);

impl ScalarArg for &str {
    fn encode(&self, encoder: &mut Encoder) -> Result<(), Error> {
        encoder.buf.extend_from_slice(self.as_bytes());
        Ok(())
    }
    fn check_descriptor(ctx: &DescriptorContext, pos: TypePos) -> Result<(), Error> {
        check_scalar_arg(ctx, pos, codec::STD_STR, "std::str")
    }
    fn to_value(&self) -> Result<Value, Error> {
        Ok(Value::Str(self.to_string()))
    }
}

impl QueryArgs for () {
    fn encode(&self, enc: &mut Encoder) -> Result<(), Error> {
        if enc.ctx.root_pos.is_some() {
            let root = enc.ctx.root_pos.and_then(|p| enc.ctx.get(p).ok());
            let empty = matches!(
                root,
                Some(Descriptor::Tuple(t))
                    if *t.id == Uuid::from_u128(0xFF) && t.element_types.is_empty()
            ) || matches!(
                root,
                Some(Descriptor::ObjectShape(s)) if s.elements.is_empty()
            );
            if !empty {
                return Err(ParameterTypeMismatchError::with_message(
                    "query arguments expected",
                ));
            }
        }
        if enc.ctx.proto.is_at_most(0, 11) {
            enc.buf.reserve(4);
            enc.buf.put_u32(0);
        }
        Ok(())
    }
}

impl QueryArg for Value {
    fn encode_slot(&self, enc: &mut Encoder) -> Result<(), Error> {
        if let Value::Nothing = self {
            enc.buf.reserve(4);
            enc.buf.put_i32(-1);
            return Ok(());
        }
        enc.length_prefixed(|enc| {
            let codec = match self {
                Value::Array(_) => return encode_array_slot(enc, self),
                Value::Range(_) => return encode_range_slot(enc, self),
                Value::Enum(v) => {
                    enc.buf.extend_from_slice(v.as_bytes());
                    return Ok(());
                }
                other => scalar_codec_for(other)?,
            };
            codec
                .encode(enc.buf, self)
                .map_err(ClientEncodingError::with_source)
        })
    }
    fn check_descriptor(&self, ctx: &DescriptorContext, pos: TypePos) -> Result<(), Error> {
        use Descriptor::*;
        use Value::*;
        let desc = resolve_scalar(ctx, pos)?;
        match (self, desc) {
            (Nothing, _) => Ok(()), // any descriptor accepts an absent value
            (BigInt(_), BaseScalar(d)) if d.id == codec::STD_BIGINT => Ok(()),
            (Bool(_), BaseScalar(d)) if d.id == codec::STD_BOOL => Ok(()),
            (Bytes(_), BaseScalar(d)) if d.id == codec::STD_BYTES => Ok(()),
            (ConfigMemory(_), BaseScalar(d)) if d.id == codec::CFG_MEMORY => Ok(()),
            (DateDuration(_), BaseScalar(d)) if d.id == codec::CAL_DATE_DURATION => Ok(()),
            (Datetime(_), BaseScalar(d)) if d.id == codec::STD_DATETIME => Ok(()),
            (Decimal(_), BaseScalar(d)) if d.id == codec::STD_DECIMAL => Ok(()),
            (Duration(_), BaseScalar(d)) if d.id == codec::STD_DURATION => Ok(()),
            (Float32(_), BaseScalar(d)) if d.id == codec::STD_FLOAT32 => Ok(()),
            (Float64(_), BaseScalar(d)) if d.id == codec::STD_FLOAT64 => Ok(()),
            (Int16(_), BaseScalar(d)) if d.id == codec::STD_INT16 => Ok(()),
            (Int32(_), BaseScalar(d)) if d.id == codec::STD_INT32 => Ok(()),
            (Int64(_), BaseScalar(d)) if d.id == codec::STD_INT64 => Ok(()),
            (Json(_), BaseScalar(d)) if d.id == codec::STD_JSON => Ok(()),
            (LocalDate(_), BaseScalar(d)) if d.id == codec::CAL_LOCAL_DATE => Ok(()),
            (LocalDatetime(_), BaseScalar(d)) if d.id == codec::CAL_LOCAL_DATETIME => Ok(()),
            (LocalTime(_), BaseScalar(d)) if d.id == codec::CAL_LOCAL_TIME => Ok(()),
            (RelativeDuration(_), BaseScalar(d)) if d.id == codec::CAL_RELATIVE_DURATION => Ok(()),
            (Str(_), BaseScalar(d)) if d.id == codec::STD_STR => Ok(()),
            (Uuid(_), BaseScalar(d)) if d.id == codec::STD_UUID => Ok(()),
            (Value::Array(items), Descriptor::Array(arr)) => {
                for item in items {
                    item.check_descriptor(ctx, arr.type_pos)?;
                }
                Ok(())
            }
            (Value::Range(rng), Descriptor::Range(desc)) => {
                if let Some(lower) = rng.lower() {
                    lower.check_descriptor(ctx, desc.type_pos)?;
                }
                if let Some(upper) = rng.upper() {
                    upper.check_descriptor(ctx, desc.type_pos)?;
                }
                Ok(())
            }
            (Enum(val), Enumeration(EnumerationTypeDescriptor { members, .. })) => {
                let val = val.deref();
                if members.iter().any(|c| c == val) {
                    Ok(())
                } else {
                    let members = {
                        let mut members =
                            members.iter().map(|c| format!("'{c}'")).collect::<Vec<_>>();
                        members.sort_unstable();
                        members.join(", ")
                    };
                    Err(InvalidReferenceError::with_message(format!(
                        "expected one of: {members}, while enum value '{val}' was provided"
                    )))
                }
            }
            (_, desc) => Err(ctx.wrong_type(desc, self.kind())),
        }
    }
    fn to_value(&self) -> Result<Value, Error> {
        Ok(self.clone())
    }
}

fn scalar_codec_for(value: &Value) -> Result<Arc<dyn Codec>, Error> {
    use Value::*;
    let id = match value {
        BigInt(_) => codec::STD_BIGINT,
        Bool(_) => codec::STD_BOOL,
        Bytes(_) => codec::STD_BYTES,
        ConfigMemory(_) => codec::CFG_MEMORY,
        DateDuration(_) => codec::CAL_DATE_DURATION,
        Datetime(_) => codec::STD_DATETIME,
        Decimal(_) => codec::STD_DECIMAL,
        Duration(_) => codec::STD_DURATION,
        Float32(_) => codec::STD_FLOAT32,
        Float64(_) => codec::STD_FLOAT64,
        Int16(_) => codec::STD_INT16,
        Int32(_) => codec::STD_INT32,
        Int64(_) => codec::STD_INT64,
        Json(_) => codec::STD_JSON,
        LocalDate(_) => codec::CAL_LOCAL_DATE,
        LocalDatetime(_) => codec::CAL_LOCAL_DATETIME,
        LocalTime(_) => codec::CAL_LOCAL_TIME,
        RelativeDuration(_) => codec::CAL_RELATIVE_DURATION,
        Str(_) => codec::STD_STR,
        Uuid(_) => codec::STD_UUID,
        other => {
            return Err(ClientEncodingError::with_message(format!(
                "{} cannot be a query argument",
                other.kind()
            )))
        }
    };
    codec::scalar_codec(&id).map_err(ClientEncodingError::with_source)
}

fn encode_array_slot(enc: &mut Encoder, value: &Value) -> Result<(), Error> {
    let Value::Array(items) = value else {
        unreachable!("checked by caller");
    };
    if items.is_empty() {
        enc.buf.reserve(12);
        enc.buf.put_u32(0); // ndims
        enc.buf.put_u32(0); // reserved
        enc.buf.put_u32(0); // reserved
        return Ok(());
    }
    enc.buf.reserve(20);
    enc.buf.put_u32(1); // ndims
    enc.buf.put_u32(0); // reserved
    enc.buf.put_u32(0); // reserved
    enc.buf.put_u32(
        items
            .len()
            .try_into()
            .map_err(|_| ClientEncodingError::with_message("array is too long"))?,
    );
    enc.buf.put_u32(1); // lower
    for item in items {
        item.encode_slot(enc)?;
    }
    Ok(())
}

fn encode_range_slot(enc: &mut Encoder, value: &Value) -> Result<(), Error> {
    let Value::Range(range) = value else {
        unreachable!("checked by caller");
    };
    enc.buf.reserve(1);
    enc.buf.put_u8(range.flags());
    if range.is_empty() {
        return Ok(());
    }
    if let Some(lower) = range.lower() {
        Value::encode_slot(lower, enc)?;
    }
    if let Some(upper) = range.upper() {
        Value::encode_slot(upper, enc)?;
    }
    Ok(())
}

impl<T: ScalarArg> QueryArg for T {
    fn encode_slot(&self, enc: &mut Encoder) -> Result<(), Error> {
        enc.length_prefixed(|enc| ScalarArg::encode(self, enc))
    }
    fn check_descriptor(&self, ctx: &DescriptorContext, pos: TypePos) -> Result<(), Error> {
        T::check_descriptor(ctx, pos)
    }
    fn to_value(&self) -> Result<Value, Error> {
        ScalarArg::to_value(self)
    }
}

impl<T: ScalarArg> QueryArg for Option<T> {
    fn encode_slot(&self, enc: &mut Encoder) -> Result<(), Error> {
        if let Some(val) = self {
            QueryArg::encode_slot(val, enc)
        } else {
            enc.buf.reserve(4);
            enc.buf.put_i32(-1);
            Ok(())
        }
    }
    fn check_descriptor(&self, ctx: &DescriptorContext, pos: TypePos) -> Result<(), Error> {
        T::check_descriptor(ctx, pos)
    }
    fn to_value(&self) -> Result<Value, Error> {
        match self.as_ref() {
            Some(v) => ScalarArg::to_value(v),
            None => Ok(Value::Nothing),
        }
    }
}

impl<T: ScalarArg> QueryArg for Vec<T> {
    fn encode_slot(&self, enc: &mut Encoder) -> Result<(), Error> {
        enc.length_prefixed(|enc| {
            if self.is_empty() {
                enc.buf.reserve(12);
                enc.buf.put_u32(0); // ndims
                enc.buf.put_u32(0); // reserved
                enc.buf.put_u32(0); // reserved
                return Ok(());
            }
            enc.buf.reserve(20);
            enc.buf.put_u32(1); // ndims
            enc.buf.put_u32(0); // reserved
            enc.buf.put_u32(0); // reserved
            enc.buf.put_u32(
                self.len()
                    .try_into()
                    .map_err(|_| ClientEncodingError::with_message("array is too long"))?,
            );
            enc.buf.put_u32(1); // lower
            for item in self {
                enc.length_prefixed(|enc| item.encode(enc))?;
            }
            Ok(())
        })
    }
    fn check_descriptor(&self, ctx: &DescriptorContext, pos: TypePos) -> Result<(), Error> {
        let desc = ctx.get(pos)?;
        if let Descriptor::Array(arr) = desc {
            T::check_descriptor(ctx, arr.type_pos)
        } else {
            Err(ctx.wrong_type(desc, "array"))
        }
    }
    fn to_value(&self) -> Result<Value, Error> {
        Ok(Value::Array(
            self.iter()
                .map(|v| ScalarArg::to_value(v))
                .collect::<Result<_, _>>()?,
        ))
    }
}

impl<T: ScalarArg> QueryArg for Range<T> {
    fn encode_slot(&self, enc: &mut Encoder) -> Result<(), Error> {
        enc.length_prefixed(|enc| {
            enc.buf.reserve(1);
            enc.buf.put_u8(self.flags());
            if self.is_empty() {
                return Ok(());
            }
            if let Some(lower) = self.lower() {
                enc.length_prefixed(|enc| lower.encode(enc))?;
            }
            if let Some(upper) = self.upper() {
                enc.length_prefixed(|enc| upper.encode(enc))?;
            }
            Ok(())
        })
    }
    fn check_descriptor(&self, ctx: &DescriptorContext, pos: TypePos) -> Result<(), Error> {
        let desc = ctx.get(pos)?;
        if let Descriptor::Range(rng) = desc {
            T::check_descriptor(ctx, rng.type_pos)
        } else {
            Err(ctx.wrong_type(desc, "range"))
        }
    }
    fn to_value(&self) -> Result<Value, Error> {
        let map_bound = |bound: Option<&T>| -> Result<Option<Box<Value>>, Error> {
            bound
                .map(|b| ScalarArg::to_value(b).map(Box::new))
                .transpose()
        };
        Ok(Value::Range(Range {
            lower: map_bound(self.lower())?,
            upper: map_bound(self.upper())?,
            inc_lower: self.inc_lower(),
            inc_upper: self.inc_upper(),
            empty: self.is_empty(),
        }))
    }
}

/// Keyword arguments: a [Value::Object] whose shape names the keys.
impl QueryArgs for Value {
    fn encode(&self, enc: &mut Encoder) -> Result<(), Error> {
        let (shape, fields) = match self {
            Value::Object { shape, fields } => (shape, fields),
            Value::Nothing => return ().encode(enc),
            _ => {
                return Err(ClientEncodingError::with_message(
                    "only objects can be encoded as keyword arguments",
                ))
            }
        };
        let root_pos = enc.ctx.root_pos.ok_or_else(|| {
            ParameterTypeMismatchError::with_message(
                "keyword arguments provided, but no arguments expected by the server",
            )
        })?;
        let desc = enc.ctx.get(root_pos)?;
        let elements = match desc {
            Descriptor::ObjectShape(desc) => &desc.elements,
            _ => return Err(enc.ctx.wrong_type(desc, "argument object")),
        };

        enc.buf.reserve(4 + 8 * elements.len());
        enc.buf.put_u32(
            elements
                .len()
                .try_into()
                .map_err(|_| ClientEncodingError::with_message("too many arguments"))?,
        );
        let mut used = 0;
        for (idx, element) in elements.iter().enumerate() {
            enc.buf.reserve(8);
            enc.buf.put_u32(idx as u32);
            let field = shape
                .elements()
                .iter()
                .position(|e| e.name == element.name)
                .and_then(|pos| fields.get(pos))
                .and_then(|f| f.as_ref());
            match field {
                Some(value) => {
                    used += 1;
                    value.check_descriptor(enc.ctx, element.type_pos)?;
                    value.encode_slot(enc)?;
                }
                None if element.required() => {
                    return Err(MissingArgumentError::with_message(format!(
                        "argument {} is required, but not specified",
                        display_arg_name(&element.name)
                    )));
                }
                None => {
                    enc.buf.put_i32(-1);
                }
            }
        }
        let supplied = fields.iter().filter(|f| f.is_some()).count();
        if supplied != used {
            let unknown = shape
                .elements()
                .iter()
                .zip(fields)
                .filter(|(_, f)| f.is_some())
                .map(|(e, _)| &e.name)
                .filter(|name| !elements.iter().any(|e| &&e.name == name))
                .map(|name| display_arg_name(name))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(UnknownArgumentError::with_message(format!(
                "unknown arguments: {unknown}"
            )));
        }
        Ok(())
    }
}

fn display_arg_name(name: &str) -> String {
    format!("${name}")
}

/// Build a keyword-argument object from name/value pairs.
pub fn object_from_pairs<K, V>(iter: impl IntoIterator<Item = (K, V)>) -> Value
where
    K: ToString,
    V: Into<ValueOpt>,
{
    let mut elements = Vec::new();
    let mut fields: Vec<Option<Value>> = Vec::new();
    for (key, arg) in iter.into_iter() {
        let ValueOpt(value) = arg.into();
        elements.push(ShapeElement {
            name: key.to_string(),
            cardinality: Some(if value.is_some() {
                Cardinality::One
            } else {
                Cardinality::AtMostOne
            }),
            flag_link: false,
            flag_link_property: false,
            flag_implicit: false,
        });
        fields.push(value);
    }
    Value::Object {
        shape: ObjectShape::new(elements),
        fields,
    }
}

/// A possibly-absent value in a keyword-argument pack.
pub struct ValueOpt(Option<Value>);

impl<V: Into<Value>> From<V> for ValueOpt {
    fn from(value: V) -> ValueOpt {
        ValueOpt(Some(value.into()))
    }
}

impl<V> From<Option<V>> for ValueOpt
where
    Value: From<V>,
{
    fn from(value: Option<V>) -> ValueOpt {
        ValueOpt(value.map(Value::from))
    }
}

macro_rules! implement_positional {
    ( $count:expr, $($name:ident,)+ ) => {
        impl<$($name:QueryArg),+> QueryArgs for ($($name,)+) {
            fn encode(&self, enc: &mut Encoder)
                -> Result<(), Error>
            {
                #![allow(non_snake_case)]
                let root_pos = enc.ctx.root_pos
                    .ok_or_else(|| DescriptorMismatch::with_message(
                        format!(
                            "provided {} positional arguments, \
                             but no arguments expected by the server",
                             $count)))?;
                let desc = enc.ctx.get(root_pos)?;
                match desc {
                    Descriptor::ObjectShape(desc) => {
                        if desc.elements.len() != $count {
                            return Err(enc.ctx.field_number(
                                desc.elements.len(), $count));
                        }
                        // the server numbers positional arguments from
                        // zero or one depending on its dialect
                        let base: usize = match desc.elements.first() {
                            Some(e) if e.name == "1" => 1,
                            _ => 0,
                        };
                        let mut els = desc.elements.iter().enumerate();
                        let ($(ref $name,)+) = self;
                        $(
                            let (idx, el) = els.next().unwrap();
                            if el.name.parse() != Ok(idx + base) {
                                return Err(DescriptorMismatch::with_message(
                                    format!("expected positional arguments, \
                                             got {} instead of {}",
                                             el.name, idx + base)));
                            }
                            $name.check_descriptor(enc.ctx, el.type_pos)?;
                        )+
                    }
                    Descriptor::Tuple(desc) if enc.ctx.proto.is_at_most(0, 11)
                    => {
                        if desc.element_types.len() != $count {
                            return Err(enc.ctx.field_number(
                                desc.element_types.len(), $count));
                        }
                        let mut els = desc.element_types.iter();
                        let ($(ref $name,)+) = self;
                        $(
                            let type_pos = els.next().unwrap();
                            $name.check_descriptor(enc.ctx, *type_pos)?;
                        )+
                    }
                    _ => return Err(enc.ctx.wrong_type(desc, "argument object"))
                }

                enc.buf.reserve(4 + 8*$count);
                enc.buf.put_u32($count);
                let ($(ref $name,)+) = self;
                $(
                    enc.buf.reserve(8);
                    enc.buf.put_u32(0);
                    QueryArg::encode_slot($name, enc)?;
                )*
                Ok(())
            }
        }
    }
}

implement_positional! {1, T0, }
implement_positional! {2, T0, T1, }
implement_positional! {3, T0, T1, T2, }
implement_positional! {4, T0, T1, T2, T3, }
implement_positional! {5, T0, T1, T2, T3, T4, }
implement_positional! {6, T0, T1, T2, T3, T4, T5, }
implement_positional! {7, T0, T1, T2, T3, T4, T5, T6, }
implement_positional! {8, T0, T1, T2, T3, T4, T5, T6, T7, }
implement_positional! {9, T0, T1, T2, T3, T4, T5, T6, T7, T8, }
implement_positional! {10, T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, }
implement_positional! {11, T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, }
implement_positional! {12, T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, }
