/*!
Message framing primitives: the [Input] and [Output] buffers and the
[Encode]/[Decode] traits implemented by every message and message field.

All multi-byte integers are big-endian. Strings and byte strings are
32-bit length-prefixed. A whole message is a one-octet tag followed by a
32-bit length that covers everything after the tag, including the length
field itself.
*/

use std::collections::HashMap;
use std::convert::TryFrom;
use std::ops::Deref;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use snafu::{ensure, OptionExt, ResultExt};
use uuid::Uuid;

use crate::errors::{self, DecodeError, EncodeError};
use crate::features::ProtocolVersion;

/// Legacy message headers: numeric code to raw value.
pub type KeyValues = HashMap<u16, Bytes>;
/// Named annotations used by newer protocol revisions.
pub type Annotations = HashMap<String, String>;

/// A received frame payload being decoded.
///
/// Holds a cheap refcounted view into the read buffer; the underlying
/// slab is freed when every `Input` and `Bytes` sliced from it is
/// dropped.
pub struct Input {
    proto: ProtocolVersion,
    bytes: Bytes,
}

/// The write buffer a message is encoded into.
pub struct Output<'a> {
    proto: &'a ProtocolVersion,
    buf: &'a mut BytesMut,
}

impl Input {
    pub fn new(proto: ProtocolVersion, bytes: Bytes) -> Input {
        Input { proto, bytes }
    }
    pub fn proto(&self) -> &ProtocolVersion {
        &self.proto
    }
    pub fn slice(&self, range: impl std::ops::RangeBounds<usize>) -> Input {
        Input {
            proto: self.proto.clone(),
            bytes: self.bytes.slice(range),
        }
    }
}

impl Deref for Input {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl Buf for Input {
    fn remaining(&self) -> usize {
        self.bytes.remaining()
    }
    fn chunk(&self) -> &[u8] {
        self.bytes.chunk()
    }
    fn advance(&mut self, cnt: usize) {
        self.bytes.advance(cnt)
    }
    fn copy_to_bytes(&mut self, len: usize) -> Bytes {
        self.bytes.copy_to_bytes(len)
    }
}

impl<'a> Output<'a> {
    pub fn new(proto: &'a ProtocolVersion, buf: &'a mut BytesMut) -> Output<'a> {
        Output { proto, buf }
    }
    pub fn proto(&self) -> &ProtocolVersion {
        self.proto
    }
    pub fn reserve(&mut self, additional: usize) {
        self.buf.reserve(additional)
    }
    pub fn extend(&mut self, slice: &[u8]) {
        self.buf.extend_from_slice(slice)
    }
    pub fn len(&self) -> usize {
        self.buf.len()
    }
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

unsafe impl BufMut for Output<'_> {
    fn remaining_mut(&self) -> usize {
        self.buf.remaining_mut()
    }
    unsafe fn advance_mut(&mut self, cnt: usize) {
        self.buf.advance_mut(cnt)
    }
    fn chunk_mut(&mut self) -> &mut bytes::buf::UninitSlice {
        self.buf.chunk_mut()
    }
}

pub trait Encode {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError>;
}

pub trait Decode: Sized {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError>;
}

/// Encode one full frame: tag, back-patched length, body.
pub fn encode<T: Encode>(buf: &mut Output, tag: u8, msg: &T) -> Result<(), EncodeError> {
    buf.reserve(5);
    buf.put_u8(tag);
    let base = buf.buf.len();
    buf.put_u32(0); // replaced after encoding the body
    msg.encode(buf)?;

    let size = u32::try_from(buf.buf.len() - base)
        .ok()
        .context(errors::MessageTooLong)?;
    buf.buf[base..base + 4].copy_from_slice(&size.to_be_bytes());
    Ok(())
}

impl Encode for String {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        self.as_str().encode(buf)
    }
}

impl Encode for &str {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.reserve(4 + self.len());
        buf.put_u32(
            u32::try_from(self.len())
                .ok()
                .context(errors::ElementTooLong)?,
        );
        buf.extend(self.as_bytes());
        Ok(())
    }
}

impl Decode for String {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 4, errors::Underflow);
        let len = buf.get_u32() as usize;
        ensure!(buf.remaining() >= len, errors::Underflow);
        let data = buf.copy_to_bytes(len);
        let result = std::str::from_utf8(&data)
            .context(errors::InvalidUtf8)?
            .to_owned();
        Ok(result)
    }
}

impl Encode for Bytes {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.reserve(4 + self.len());
        buf.put_u32(
            u32::try_from(self.len())
                .ok()
                .context(errors::ElementTooLong)?,
        );
        buf.extend(self);
        Ok(())
    }
}

impl Decode for Bytes {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 4, errors::Underflow);
        let len = buf.get_u32() as usize;
        ensure!(buf.remaining() >= len, errors::Underflow);
        Ok(buf.copy_to_bytes(len))
    }
}

impl Encode for Uuid {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.reserve(16);
        buf.extend(self.as_bytes());
        Ok(())
    }
}

impl Decode for Uuid {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 16, errors::Underflow);
        let mut bytes = [0u8; 16];
        buf.copy_to_slice(&mut bytes);
        Ok(Uuid::from_bytes(bytes))
    }
}

impl Decode for bool {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 1, errors::Underflow);
        match buf.get_u8() {
            0x00 => Ok(false),
            0x01 => Ok(true),
            val => errors::InvalidBool { val }.fail(),
        }
    }
}

impl Encode for KeyValues {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.reserve(2);
        buf.put_u16(
            u16::try_from(self.len())
                .ok()
                .context(errors::TooManyHeaders)?,
        );
        for (&code, value) in self {
            buf.reserve(2);
            buf.put_u16(code);
            value.encode(buf)?;
        }
        Ok(())
    }
}

impl Decode for KeyValues {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 2, errors::Underflow);
        let count = buf.get_u16();
        let mut headers = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            ensure!(buf.remaining() >= 2, errors::Underflow);
            let code = buf.get_u16();
            headers.insert(code, Bytes::decode(buf)?);
        }
        Ok(headers)
    }
}

impl Encode for Annotations {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.reserve(2);
        buf.put_u16(
            u16::try_from(self.len())
                .ok()
                .context(errors::TooManyAttributes)?,
        );
        for (name, value) in self {
            name.encode(buf)?;
            value.encode(buf)?;
        }
        Ok(())
    }
}

impl Decode for Annotations {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 2, errors::Underflow);
        let count = buf.get_u16();
        let mut annotations = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            annotations.insert(String::decode(buf)?, String::decode(buf)?);
        }
        Ok(annotations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_length_covers_itself() {
        struct Probe;
        impl Encode for Probe {
            fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
                "user".encode(buf)
            }
        }
        let proto = ProtocolVersion::current();
        let mut bytes = BytesMut::new();
        encode(&mut Output::new(&proto, &mut bytes), 0x01, &Probe).unwrap();
        assert_eq!(
            &bytes[..],
            b"\x01\x00\x00\x00\x0c\x00\x00\x00\x04user"
        );
    }

    #[test]
    fn empty_payload_is_valid() {
        struct Empty;
        impl Encode for Empty {
            fn encode(&self, _buf: &mut Output) -> Result<(), EncodeError> {
                Ok(())
            }
        }
        let proto = ProtocolVersion::current();
        let mut bytes = BytesMut::new();
        encode(&mut Output::new(&proto, &mut bytes), 0x53, &Empty).unwrap();
        assert_eq!(&bytes[..], b"\x53\x00\x00\x00\x04");
    }
}
