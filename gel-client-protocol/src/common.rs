/*!
Capabilities, compilation flags, cardinality and I/O format enums shared
by the prepare/execute messages.
*/

use bytes::Bytes;
use uuid::Uuid;

use crate::descriptors::Typedesc;
use crate::encoding::Input;
use crate::errors::{self, DecodeError};
use crate::features::ProtocolVersion;

bitflags::bitflags! {
    /// 64-bit mask gating server operations.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Capabilities: u64 {
        const MODIFICATIONS =       0b00000001;
        const SESSION_CONFIG =      0b00000010;
        const TRANSACTION =         0b00000100;
        const DDL =                 0b00001000;
        const PERSISTENT_CONFIG =   0b00010000;
        const ALL =                 0b00011111;
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CompilationFlags: u64 {
        const INJECT_OUTPUT_TYPE_IDS =       0b00000001;
        const INJECT_OUTPUT_TYPE_NAMES =     0b00000010;
        const INJECT_OUTPUT_OBJECT_IDS =     0b00000100;
    }
}

/// Expected result cardinality of a query.
///
/// `AtMostOne` has no byte of its own on the legacy wire: it is sent as
/// `One` and policed on the client. Newer servers report it distinctly
/// and the value is accepted on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cardinality {
    NoResult = 0x6e,
    One = 0x6f,
    Many = 0x6d,
    AtMostOne = 0x41,
    AtLeastOne = 0x4d,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IoFormat {
    Binary = 0x62,
    Json = 0x6a,
    JsonElements = 0x4a,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DescribeAspect {
    DataDescription = 0x54,
}

impl Cardinality {
    /// The byte sent on the wire for this cardinality.
    pub fn to_wire(self) -> u8 {
        match self {
            Cardinality::AtMostOne => Cardinality::One as u8,
            card => card as u8,
        }
    }
    /// Whether the caller asked for at most a single row.
    pub fn is_single(self) -> bool {
        matches!(self, Cardinality::One | Cardinality::AtMostOne)
    }
}

impl TryFrom<u8> for Cardinality {
    type Error = DecodeError;
    fn try_from(cardinality: u8) -> Result<Cardinality, DecodeError> {
        match cardinality {
            0x6e => Ok(Cardinality::NoResult),
            0x6f => Ok(Cardinality::One),
            0x6d => Ok(Cardinality::Many),
            0x41 => Ok(Cardinality::AtMostOne),
            0x4d => Ok(Cardinality::AtLeastOne),
            _ => errors::InvalidCardinality { cardinality }.fail(),
        }
    }
}

impl TryFrom<u8> for IoFormat {
    type Error = DecodeError;
    fn try_from(io_format: u8) -> Result<IoFormat, DecodeError> {
        match io_format {
            0x62 => Ok(IoFormat::Binary),
            0x6a => Ok(IoFormat::Json),
            0x4a => Ok(IoFormat::JsonElements),
            _ => errors::InvalidIoFormat { io_format }.fail(),
        }
    }
}

impl TryFrom<u8> for DescribeAspect {
    type Error = DecodeError;
    fn try_from(aspect: u8) -> Result<DescribeAspect, DecodeError> {
        match aspect {
            0x54 => Ok(DescribeAspect::DataDescription),
            _ => errors::InvalidAspect { aspect }.fail(),
        }
    }
}

/// Options a query is compiled with; turned into headers on the legacy
/// wire.
#[derive(Debug, Clone)]
pub struct CompilationOptions {
    pub implicit_limit: Option<u64>,
    pub implicit_typenames: bool,
    pub implicit_typeids: bool,
    pub allow_capabilities: Capabilities,
    pub explicit_objectids: bool,
    pub io_format: IoFormat,
    pub expected_cardinality: Cardinality,
}

impl CompilationOptions {
    pub fn flags(&self) -> CompilationFlags {
        let mut cflags = CompilationFlags::empty();
        if self.implicit_typenames {
            cflags |= CompilationFlags::INJECT_OUTPUT_TYPE_NAMES;
        }
        if self.implicit_typeids {
            cflags |= CompilationFlags::INJECT_OUTPUT_TYPE_IDS;
        }
        cflags
    }
}

/// An undecoded type-descriptor block as received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTypedesc {
    pub proto: ProtocolVersion,
    pub id: Uuid,
    pub data: Bytes,
}

impl RawTypedesc {
    pub fn uninitialized() -> RawTypedesc {
        RawTypedesc {
            proto: ProtocolVersion::current(),
            id: Uuid::from_u128(0),
            data: Bytes::new(),
        }
    }
    pub fn decode(&self) -> Result<Typedesc, DecodeError> {
        let cur = &mut Input::new(self.proto.clone(), self.data.clone());
        Typedesc::decode_with_id(self.id, cur)
    }
}
