/*!
Typed decoding: the [Queryable] trait compiles a decode plan against the
server's descriptor tree and then fills values of the target type
directly from row bytes.

A target type opts into optional fields by being decodable from a
missing element ([Queryable::decode_missing]); `Option<T>` does this for
any scalar `T`. A type may also supply its own decoding for any scalar
by implementing this trait itself, which takes precedence over the
built-in codecs by construction.
*/

use bytes::Bytes;
use snafu::{ensure, Snafu};
use uuid::Uuid;

use crate::codec;
use crate::descriptors::{Descriptor, TypePos};
use crate::errors::{self, DecodeError};
use crate::model::{BigInt, ConfigMemory, Decimal, Json};
use crate::model::{DateDuration, Datetime, Duration, LocalDate, LocalDatetime, LocalTime};
use crate::model::RelativeDuration;
use crate::serialization::decode::RawCodec;

/// Mismatch between the descriptor the server sent and the target type.
#[derive(Snafu, Debug)]
#[non_exhaustive]
pub enum DescriptorMismatch {
    #[snafu(display("unexpected type {unexpected}, client expected {expected}"))]
    WrongType { unexpected: String, expected: String },
    #[snafu(display("unexpected field {unexpected}, client expected {expected}"))]
    WrongField { unexpected: String, expected: String },
    #[snafu(display("expected {expected} fields, got {unexpected}"))]
    FieldNumber { expected: usize, unexpected: usize },
    #[snafu(display("expected {expected}"))]
    Expected { expected: String },
    #[snafu(display("field {field} is not optional in the target type"))]
    NotOptional { field: String },
    #[snafu(display("invalid type descriptor"))]
    InvalidDescriptor,
}

/// Run-time state shared by a whole decode pass.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    pub has_implicit_id: bool,
    pub has_implicit_tid: bool,
    pub has_implicit_tname: bool,
}

/// Descriptor lookup context used while compiling a decode plan.
pub struct DescriptorContext<'t> {
    pub(crate) descriptors: &'t [Descriptor],
    pub has_implicit_id: bool,
    pub has_implicit_tid: bool,
    pub has_implicit_tname: bool,
}

impl<'t> DescriptorContext<'t> {
    pub fn new(descriptors: &'t [Descriptor]) -> Self {
        DescriptorContext {
            descriptors,
            has_implicit_id: false,
            has_implicit_tid: false,
            has_implicit_tname: false,
        }
    }
    pub fn get(&self, type_pos: TypePos) -> Result<&'t Descriptor, DescriptorMismatch> {
        self.descriptors
            .get(type_pos.0 as usize)
            .ok_or(DescriptorMismatch::InvalidDescriptor)
    }
    pub fn build_decoder(&self) -> Decoder {
        Decoder {
            has_implicit_id: self.has_implicit_id,
            has_implicit_tid: self.has_implicit_tid,
            has_implicit_tname: self.has_implicit_tname,
        }
    }
    pub fn wrong_type(&self, descriptor: &Descriptor, expected: &str) -> DescriptorMismatch {
        DescriptorMismatch::WrongType {
            unexpected: format!("{descriptor:?}"),
            expected: expected.into(),
        }
    }
    pub fn field_number(&self, expected: usize, unexpected: usize) -> DescriptorMismatch {
        DescriptorMismatch::FieldNumber {
            expected,
            unexpected,
        }
    }
    pub fn expected(&self, expected: impl Into<String>) -> DescriptorMismatch {
        DescriptorMismatch::Expected {
            expected: expected.into(),
        }
    }
}

/// A type that rows (or row elements) decode into.
pub trait Queryable: Sized {
    /// The plan compiled by [check_descriptor](Queryable::check_descriptor),
    /// threaded back into [decode](Queryable::decode).
    type Args: Send + Sync;

    fn decode(decoder: &Decoder, args: &Self::Args, buf: &[u8]) -> Result<Self, DecodeError>;
    fn check_descriptor(
        ctx: &DescriptorContext,
        type_pos: TypePos,
    ) -> Result<Self::Args, DescriptorMismatch>;

    /// Fill the target from a missing (`-1` length) element.
    ///
    /// The default is an error: most targets require a value. Optional
    /// targets override this.
    fn decode_missing(_decoder: &Decoder, _args: &Self::Args) -> Result<Self, DecodeError> {
        errors::MissingRequiredElement.fail()
    }

    /// Whether this target can absorb a missing element. Shape fields
    /// that the descriptor marks non-required must decode into a target
    /// for which this is true.
    fn accepts_missing() -> bool {
        false
    }
}

/// Match a descriptor position against a well-known scalar id,
/// following scalar alias chains. Used by scalar impls and derived
/// code.
pub fn check_scalar(
    ctx: &DescriptorContext,
    type_pos: TypePos,
    wanted: Uuid,
    expected: &str,
) -> Result<(), DescriptorMismatch> {
    let mut desc = ctx.get(type_pos)?;
    loop {
        match desc {
            Descriptor::Scalar(scalar) if *scalar.id == wanted => return Ok(()),
            Descriptor::Scalar(scalar) if scalar.base_type_pos.is_some() => {
                desc = ctx.get(scalar.base_type_pos.unwrap())?;
            }
            Descriptor::BaseScalar(base) if *base.id == wanted => return Ok(()),
            _ => return Err(ctx.wrong_type(desc, expected)),
        }
    }
}

macro_rules! implement_scalar {
    ($type: ty, $id: expr, $name: expr) => {
        impl Queryable for $type {
            type Args = ();
            fn decode(_decoder: &Decoder, _args: &(), buf: &[u8]) -> Result<Self, DecodeError> {
                RawCodec::decode(buf)
            }
            fn check_descriptor(
                ctx: &DescriptorContext,
                type_pos: TypePos,
            ) -> Result<(), DescriptorMismatch> {
                check_scalar(ctx, type_pos, $id, $name)
            }
        }
    };
}

implement_scalar!(String, codec::STD_STR, "std::str");
implement_scalar!(Json, codec::STD_JSON, "std::json");
implement_scalar!(Uuid, codec::STD_UUID, "std::uuid");
implement_scalar!(bool, codec::STD_BOOL, "std::bool");
implement_scalar!(i16, codec::STD_INT16, "std::int16");
implement_scalar!(i32, codec::STD_INT32, "std::int32");
implement_scalar!(i64, codec::STD_INT64, "std::int64");
implement_scalar!(f32, codec::STD_FLOAT32, "std::float32");
implement_scalar!(f64, codec::STD_FLOAT64, "std::float64");
implement_scalar!(Bytes, codec::STD_BYTES, "std::bytes");
implement_scalar!(BigInt, codec::STD_BIGINT, "std::bigint");
implement_scalar!(Decimal, codec::STD_DECIMAL, "std::decimal");
implement_scalar!(ConfigMemory, codec::CFG_MEMORY, "cfg::memory");
implement_scalar!(Datetime, codec::STD_DATETIME, "std::datetime");
implement_scalar!(Duration, codec::STD_DURATION, "std::duration");
implement_scalar!(LocalDatetime, codec::CAL_LOCAL_DATETIME, "cal::local_datetime");
implement_scalar!(LocalDate, codec::CAL_LOCAL_DATE, "cal::local_date");
implement_scalar!(LocalTime, codec::CAL_LOCAL_TIME, "cal::local_time");
implement_scalar!(
    RelativeDuration,
    codec::CAL_RELATIVE_DURATION,
    "cal::relative_duration"
);
implement_scalar!(DateDuration, codec::CAL_DATE_DURATION, "cal::date_duration");

#[cfg(feature = "with-chrono")]
mod chrono_queryable {
    use super::*;

    implement_scalar!(
        chrono::DateTime<chrono::Utc>,
        codec::STD_DATETIME,
        "std::datetime"
    );
    implement_scalar!(
        chrono::naive::NaiveDateTime,
        codec::CAL_LOCAL_DATETIME,
        "cal::local_datetime"
    );
    implement_scalar!(
        chrono::naive::NaiveDate,
        codec::CAL_LOCAL_DATE,
        "cal::local_date"
    );
    implement_scalar!(
        chrono::naive::NaiveTime,
        codec::CAL_LOCAL_TIME,
        "cal::local_time"
    );
}

impl<T: Queryable> Queryable for Option<T> {
    type Args = T::Args;
    fn decode(decoder: &Decoder, args: &Self::Args, buf: &[u8]) -> Result<Self, DecodeError> {
        T::decode(decoder, args, buf).map(Some)
    }
    fn check_descriptor(
        ctx: &DescriptorContext,
        type_pos: TypePos,
    ) -> Result<Self::Args, DescriptorMismatch> {
        T::check_descriptor(ctx, type_pos)
    }
    fn decode_missing(_decoder: &Decoder, _args: &Self::Args) -> Result<Self, DecodeError> {
        Ok(None)
    }
    fn accepts_missing() -> bool {
        true
    }
}

/// Plan of a sequence target: the element plan plus the wire framing
/// the sequence was described with.
pub struct SequenceArgs<A> {
    pub(crate) element: A,
    pub(crate) kind: SequenceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SequenceKind {
    Array,
    /// A set whose elements are arrays: every element carries an extra
    /// twelve-byte envelope on the wire.
    SetOfArrays,
    MultiRange,
}

impl<T: Queryable> Queryable for Vec<T> {
    type Args = SequenceArgs<T::Args>;
    fn decode(decoder: &Decoder, args: &Self::Args, buf: &[u8]) -> Result<Self, DecodeError> {
        let (count, mut off) = match args.kind {
            SequenceKind::MultiRange => {
                ensure!(buf.len() >= 4, errors::Underflow);
                let count = u32::from_be_bytes(buf[..4].try_into().unwrap()) as usize;
                (count, 4)
            }
            _ => match decode_array_envelope(buf)? {
                Some(pair) => pair,
                None => return Ok(Vec::new()),
            },
        };
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            if args.kind == SequenceKind::SetOfArrays {
                ensure!(buf.len() >= off + 12, errors::InvalidSetShape);
                off += 12;
            }
            let data = read_child(buf, &mut off)?
                .ok_or_else(|| errors::MissingRequiredElement.build())?;
            items.push(T::decode(decoder, &args.element, data)?);
        }
        ensure!(off == buf.len(), errors::ExtraData);
        Ok(items)
    }
    fn check_descriptor(
        ctx: &DescriptorContext,
        type_pos: TypePos,
    ) -> Result<Self::Args, DescriptorMismatch> {
        match ctx.get(type_pos)? {
            Descriptor::Array(arr) => Ok(SequenceArgs {
                element: T::check_descriptor(ctx, arr.type_pos)?,
                kind: SequenceKind::Array,
            }),
            Descriptor::Set(set) => Ok(SequenceArgs {
                element: T::check_descriptor(ctx, set.type_pos)?,
                kind: if matches!(ctx.get(set.type_pos)?, Descriptor::Array(_)) {
                    SequenceKind::SetOfArrays
                } else {
                    SequenceKind::Array
                },
            }),
            // the element type sees the same position and resolves the
            // point type itself (see Range below)
            Descriptor::MultiRange(_) => Ok(SequenceArgs {
                element: T::check_descriptor(ctx, type_pos)?,
                kind: SequenceKind::MultiRange,
            }),
            desc => Err(ctx.wrong_type(desc, "array or set")),
        }
    }
    /// An absent set is the empty set.
    fn decode_missing(_decoder: &Decoder, _args: &Self::Args) -> Result<Self, DecodeError> {
        Ok(Vec::new())
    }
    fn accepts_missing() -> bool {
        true
    }
}

impl<T: Queryable> Queryable for crate::model::Range<T> {
    type Args = T::Args;
    fn decode(decoder: &Decoder, args: &Self::Args, buf: &[u8]) -> Result<Self, DecodeError> {
        use crate::model::range;
        ensure!(!buf.is_empty(), errors::Underflow);
        let flags = buf[0];
        let mut off = 1;
        if flags & range::EMPTY != 0 {
            ensure!(off == buf.len(), errors::ExtraData);
            return Ok(crate::model::Range::empty());
        }
        let lower = if flags & range::LB_INF == 0 {
            let data =
                read_child(buf, &mut off)?.ok_or_else(|| errors::MissingRequiredElement.build())?;
            Some(T::decode(decoder, args, data)?)
        } else {
            None
        };
        let upper = if flags & range::UB_INF == 0 {
            let data =
                read_child(buf, &mut off)?.ok_or_else(|| errors::MissingRequiredElement.build())?;
            Some(T::decode(decoder, args, data)?)
        } else {
            None
        };
        ensure!(off == buf.len(), errors::ExtraData);
        Ok(crate::model::Range::with_inclusivity(
            lower,
            upper,
            flags & range::LB_INC != 0,
            flags & range::UB_INC != 0,
        ))
    }
    fn check_descriptor(
        ctx: &DescriptorContext,
        type_pos: TypePos,
    ) -> Result<Self::Args, DescriptorMismatch> {
        match ctx.get(type_pos)? {
            Descriptor::Range(rng) => T::check_descriptor(ctx, rng.type_pos),
            // a multirange element is a range over the same point type
            Descriptor::MultiRange(mr) => T::check_descriptor(ctx, mr.type_pos),
            desc => Err(ctx.wrong_type(desc, "range")),
        }
    }
}

/// Read the element-count header of a shape value and check it against
/// the compiled plan. Returns the offset of the first element entry.
///
/// Low-level entry point for derived [Queryable] impls.
pub fn decode_shape_header(buf: &[u8], expected_elements: usize) -> Result<usize, DecodeError> {
    ensure!(buf.len() >= 4, errors::Underflow);
    let size = u32::from_be_bytes(buf[..4].try_into().unwrap()) as usize;
    ensure!(size == expected_elements, errors::ObjectSizeMismatch);
    Ok(4)
}

/// Read one shape element entry: the reserved word, the signed length,
/// and the element bytes. `None` means the element is missing.
///
/// Low-level entry point for derived [Queryable] impls.
pub fn next_shape_element<'t>(
    buf: &'t [u8],
    off: &mut usize,
) -> Result<Option<&'t [u8]>, DecodeError> {
    ensure!(buf.len() >= *off + 4, errors::Underflow);
    *off += 4; // reserved
    read_child(buf, off)
}

/// Check that a shape value was fully consumed.
///
/// Low-level entry point for derived [Queryable] impls.
pub fn finish_shape(buf: &[u8], off: usize) -> Result<(), DecodeError> {
    ensure!(off == buf.len(), errors::ExtraData);
    Ok(())
}

/// Decode a `std::json` element into any deserializable type.
///
/// Used by derived impls for `json`-annotated fields.
#[cfg(feature = "with-serde")]
pub fn decode_json<T: serde::de::DeserializeOwned>(buf: &[u8]) -> Result<T, DecodeError> {
    let json: Json = RawCodec::decode(buf)?;
    serde_json::from_str(&json).map_err(errors::decode_error)
}

pub(crate) fn decode_array_envelope(buf: &[u8]) -> Result<Option<(usize, usize)>, DecodeError> {
    ensure!(buf.len() >= 12, errors::Underflow);
    let ndims = u32::from_be_bytes(buf[..4].try_into().unwrap());
    if ndims == 0 {
        ensure!(buf.len() == 12, errors::ExtraData);
        return Ok(None);
    }
    ensure!(ndims == 1, errors::InvalidArrayShape);
    ensure!(buf.len() >= 20, errors::Underflow);
    let upper = i32::from_be_bytes(buf[12..16].try_into().unwrap());
    let lower = i32::from_be_bytes(buf[16..20].try_into().unwrap());
    let count = (upper as i64) - (lower as i64) + 1;
    ensure!(count >= 0, errors::InvalidArrayShape);
    Ok(Some((count as usize, 20)))
}

pub(crate) fn read_child<'t>(
    buf: &'t [u8],
    off: &mut usize,
) -> Result<Option<&'t [u8]>, DecodeError> {
    ensure!(buf.len() >= *off + 4, errors::Underflow);
    let len = i32::from_be_bytes(buf[*off..*off + 4].try_into().unwrap());
    *off += 4;
    if len < 0 {
        ensure!(len == -1, errors::InvalidMarker);
        return Ok(None);
    }
    let len = len as usize;
    ensure!(buf.len() >= *off + len, errors::Underflow);
    let data = &buf[*off..*off + len];
    *off += len;
    Ok(Some(data))
}

macro_rules! implement_tuple {
    ( $count:expr, $($name:ident at $idx:tt,)+ ) => {
        impl<$($name: Queryable),+> Queryable for ($($name,)+) {
            type Args = ($($name::Args,)+);
            fn decode(decoder: &Decoder, args: &Self::Args, buf: &[u8])
                -> Result<Self, DecodeError>
            {
                ensure!(buf.len() >= 4, errors::Underflow);
                let size = u32::from_be_bytes(buf[..4].try_into().unwrap()) as usize;
                ensure!(size == $count, errors::TupleSizeMismatch);
                let mut off = 4;
                let result = ($({
                    ensure!(buf.len() >= off + 4, errors::Underflow);
                    off += 4; // reserved
                    match read_child(buf, &mut off)? {
                        Some(data) => $name::decode(decoder, &args.$idx, data)?,
                        None => $name::decode_missing(decoder, &args.$idx)?,
                    }
                },)+);
                ensure!(off == buf.len(), errors::ExtraData);
                Ok(result)
            }
            fn check_descriptor(ctx: &DescriptorContext, type_pos: TypePos)
                -> Result<Self::Args, DescriptorMismatch>
            {
                let desc = ctx.get(type_pos)?;
                match desc {
                    Descriptor::Tuple(tuple) => {
                        if tuple.element_types.len() != $count {
                            return Err(ctx.field_number(
                                $count, tuple.element_types.len()));
                        }
                        let mut els = tuple.element_types.iter();
                        Ok(($({
                            let pos = els.next().unwrap();
                            $name::check_descriptor(ctx, *pos)?
                        },)+))
                    }
                    _ => Err(ctx.wrong_type(desc, "tuple")),
                }
            }
        }
    }
}

implement_tuple! {1, T0 at 0,}
implement_tuple! {2, T0 at 0, T1 at 1,}
implement_tuple! {3, T0 at 0, T1 at 1, T2 at 2,}
implement_tuple! {4, T0 at 0, T1 at 1, T2 at 2, T3 at 3,}
implement_tuple! {5, T0 at 0, T1 at 1, T2 at 2, T3 at 3, T4 at 4,}
implement_tuple! {6, T0 at 0, T1 at 1, T2 at 2, T3 at 3, T4 at 4, T5 at 5,}
implement_tuple! {7, T0 at 0, T1 at 1, T2 at 2, T3 at 3, T4 at 4, T5 at 5, T6 at 6,}
implement_tuple! {8, T0 at 0, T1 at 1, T2 at 2, T3 at 3, T4 at 4, T5 at 5, T6 at 6, T7 at 7,}
