/*!
The [ClientMessage] enum and related types.

```rust,ignore
pub enum ClientMessage {
    ClientHandshake(ClientHandshake),
    AuthenticationSaslInitialResponse(SaslInitialResponse),
    AuthenticationSaslResponse(SaslResponse),
    ExecuteScript(ExecuteScript),
    Prepare(Prepare),
    DescribeStatement(DescribeStatement),
    Execute(Execute),
    OptimisticExecute(OptimisticExecute),
    UnknownMessage(u8, Bytes),
    Sync,
    Flush,
    Terminate,
}
```
*/

use std::collections::HashMap;
use std::convert::TryFrom;

use bytes::{Buf, BufMut, Bytes};
use snafu::{ensure, OptionExt};
use uuid::Uuid;

pub use crate::common::{
    Capabilities, Cardinality, CompilationFlags, CompilationOptions, DescribeAspect, IoFormat,
};
use crate::encoding::{encode, Annotations, Decode, Encode, Input, KeyValues, Output};
use crate::errors::{self, DecodeError, EncodeError};

pub const HEADER_IMPLICIT_LIMIT: u16 = 0xFF01;
pub const HEADER_IMPLICIT_TYPENAMES: u16 = 0xFF02;
pub const HEADER_IMPLICIT_TYPEIDS: u16 = 0xFF03;
pub const HEADER_ALLOW_CAPABILITIES: u16 = 0xFF04;
pub const HEADER_EXPLICIT_OBJECTIDS: u16 = 0xFF05;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClientMessage {
    ClientHandshake(ClientHandshake),
    AuthenticationSaslInitialResponse(SaslInitialResponse),
    AuthenticationSaslResponse(SaslResponse),
    ExecuteScript(ExecuteScript),
    Prepare(Prepare),
    DescribeStatement(DescribeStatement),
    Execute(Execute),
    OptimisticExecute(OptimisticExecute),
    UnknownMessage(u8, Bytes),
    Sync,
    Flush,
    Terminate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHandshake {
    pub major_ver: u16,
    pub minor_ver: u16,
    pub params: HashMap<String, String>,
    pub extensions: HashMap<String, Annotations>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslInitialResponse {
    pub method: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslResponse {
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteScript {
    pub headers: KeyValues,
    pub script_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepare {
    pub headers: KeyValues,
    pub io_format: IoFormat,
    pub expected_cardinality: Cardinality,
    pub statement_name: Bytes,
    pub command_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeStatement {
    pub headers: KeyValues,
    pub aspect: DescribeAspect,
    pub statement_name: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execute {
    pub headers: KeyValues,
    pub statement_name: Bytes,
    pub arguments: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimisticExecute {
    pub headers: KeyValues,
    pub io_format: IoFormat,
    pub expected_cardinality: Cardinality,
    pub command_text: String,
    pub input_typedesc_id: Uuid,
    pub output_typedesc_id: Uuid,
    pub arguments: Bytes,
}

struct Empty;

impl ClientMessage {
    pub fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        use ClientMessage::*;
        match self {
            ClientHandshake(h) => encode(buf, 0x56, h),
            AuthenticationSaslInitialResponse(h) => encode(buf, 0x70, h),
            AuthenticationSaslResponse(h) => encode(buf, 0x72, h),
            ExecuteScript(h) => encode(buf, 0x51, h),
            Prepare(h) => encode(buf, 0x50, h),
            DescribeStatement(h) => encode(buf, 0x44, h),
            Execute(h) => encode(buf, 0x45, h),
            OptimisticExecute(h) => encode(buf, 0x4f, h),
            Sync => encode(buf, 0x53, &Empty),
            Flush => encode(buf, 0x48, &Empty),
            Terminate => encode(buf, 0x58, &Empty),

            UnknownMessage(_, _) => errors::UnknownMessageCantBeEncoded.fail()?,
        }
    }

    /// Decode exactly one frame from the buffer.
    ///
    /// This expects a full frame to already be in the buffer. It can
    /// return an arbitrary error or be silent if a message is only
    /// partially present in the buffer or if extra data is present.
    pub fn decode(buf: &mut Input) -> Result<ClientMessage, DecodeError> {
        use self::ClientMessage as M;
        ensure!(buf.remaining() >= 5, errors::Underflow);
        let tag = buf[0];
        buf.advance(5);
        let result = match tag {
            0x56 => ClientHandshake::decode(buf).map(M::ClientHandshake)?,
            0x70 => SaslInitialResponse::decode(buf).map(M::AuthenticationSaslInitialResponse)?,
            0x72 => SaslResponse::decode(buf).map(M::AuthenticationSaslResponse)?,
            0x51 => ExecuteScript::decode(buf).map(M::ExecuteScript)?,
            0x50 => Prepare::decode(buf).map(M::Prepare)?,
            0x44 => DescribeStatement::decode(buf).map(M::DescribeStatement)?,
            0x45 => Execute::decode(buf).map(M::Execute)?,
            0x4f => OptimisticExecute::decode(buf).map(M::OptimisticExecute)?,
            0x53 => M::Sync,
            0x48 => M::Flush,
            0x58 => M::Terminate,
            code => M::UnknownMessage(code, buf.copy_to_bytes(buf.remaining())),
        };
        Ok(result)
    }
}

impl Encode for Empty {
    fn encode(&self, _buf: &mut Output) -> Result<(), EncodeError> {
        Ok(())
    }
}

impl Encode for ClientHandshake {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.reserve(6);
        buf.put_u16(self.major_ver);
        buf.put_u16(self.minor_ver);
        buf.put_u16(
            u16::try_from(self.params.len())
                .ok()
                .context(errors::TooManyParams)?,
        );
        for (k, v) in &self.params {
            k.encode(buf)?;
            v.encode(buf)?;
        }
        buf.reserve(2);
        buf.put_u16(
            u16::try_from(self.extensions.len())
                .ok()
                .context(errors::TooManyExtensions)?,
        );
        for (name, annotations) in &self.extensions {
            name.encode(buf)?;
            annotations.encode(buf)?;
        }
        Ok(())
    }
}

impl Decode for ClientHandshake {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 8, errors::Underflow);
        let major_ver = buf.get_u16();
        let minor_ver = buf.get_u16();
        let num_params = buf.get_u16();
        let mut params = HashMap::with_capacity(num_params as usize);
        for _ in 0..num_params {
            params.insert(String::decode(buf)?, String::decode(buf)?);
        }
        ensure!(buf.remaining() >= 2, errors::Underflow);
        let num_ext = buf.get_u16();
        let mut extensions = HashMap::with_capacity(num_ext as usize);
        for _ in 0..num_ext {
            extensions.insert(String::decode(buf)?, Annotations::decode(buf)?);
        }
        Ok(ClientHandshake {
            major_ver,
            minor_ver,
            params,
            extensions,
        })
    }
}

impl Encode for SaslInitialResponse {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        self.method.encode(buf)?;
        self.data.encode(buf)?;
        Ok(())
    }
}

impl Decode for SaslInitialResponse {
    fn decode(buf: &mut Input) -> Result<SaslInitialResponse, DecodeError> {
        let method = String::decode(buf)?;
        let data = Bytes::decode(buf)?;
        Ok(SaslInitialResponse { method, data })
    }
}

impl Encode for SaslResponse {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        self.data.encode(buf)?;
        Ok(())
    }
}

impl Decode for SaslResponse {
    fn decode(buf: &mut Input) -> Result<SaslResponse, DecodeError> {
        let data = Bytes::decode(buf)?;
        Ok(SaslResponse { data })
    }
}

impl Encode for ExecuteScript {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        self.headers.encode(buf)?;
        self.script_text.encode(buf)?;
        Ok(())
    }
}

impl Decode for ExecuteScript {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = KeyValues::decode(buf)?;
        let script_text = String::decode(buf)?;
        Ok(ExecuteScript {
            headers,
            script_text,
        })
    }
}

impl Prepare {
    pub fn new(flags: &CompilationOptions, query: &str) -> Prepare {
        Prepare {
            headers: flags.to_headers(),
            io_format: flags.io_format,
            expected_cardinality: flags.expected_cardinality,
            statement_name: Bytes::from(""),
            command_text: query.into(),
        }
    }
}

impl CompilationOptions {
    /// Header form of the options, as the legacy wire carries them.
    pub fn to_headers(&self) -> KeyValues {
        let mut headers = KeyValues::new();
        if let Some(limit) = self.implicit_limit {
            headers.insert(HEADER_IMPLICIT_LIMIT, Bytes::from(limit.to_string()));
        }
        if self.implicit_typenames {
            headers.insert(HEADER_IMPLICIT_TYPENAMES, "true".into());
        }
        if self.implicit_typeids {
            headers.insert(HEADER_IMPLICIT_TYPEIDS, "true".into());
        }
        let caps = self.allow_capabilities.bits().to_be_bytes();
        headers.insert(HEADER_ALLOW_CAPABILITIES, caps[..].to_vec().into());
        if self.explicit_objectids {
            headers.insert(HEADER_EXPLICIT_OBJECTIDS, Bytes::from_static(b"\x01"));
        }
        headers
    }
}

impl Encode for Prepare {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        self.headers.encode(buf)?;
        buf.reserve(2);
        buf.put_u8(self.io_format as u8);
        buf.put_u8(self.expected_cardinality.to_wire());
        self.statement_name.encode(buf)?;
        self.command_text.encode(buf)?;
        Ok(())
    }
}

impl Decode for Prepare {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = KeyValues::decode(buf)?;
        ensure!(buf.remaining() >= 2, errors::Underflow);
        let io_format = TryFrom::try_from(buf.get_u8())?;
        let expected_cardinality = TryFrom::try_from(buf.get_u8())?;
        let statement_name = Bytes::decode(buf)?;
        let command_text = String::decode(buf)?;
        Ok(Prepare {
            headers,
            io_format,
            expected_cardinality,
            statement_name,
            command_text,
        })
    }
}

impl Encode for DescribeStatement {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        self.headers.encode(buf)?;
        buf.reserve(1);
        buf.put_u8(self.aspect as u8);
        self.statement_name.encode(buf)?;
        Ok(())
    }
}

impl Decode for DescribeStatement {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = KeyValues::decode(buf)?;
        ensure!(buf.remaining() >= 1, errors::Underflow);
        let aspect = TryFrom::try_from(buf.get_u8())?;
        let statement_name = Bytes::decode(buf)?;
        Ok(DescribeStatement {
            headers,
            aspect,
            statement_name,
        })
    }
}

impl Encode for Execute {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        self.headers.encode(buf)?;
        self.statement_name.encode(buf)?;
        self.arguments.encode(buf)?;
        Ok(())
    }
}

impl Decode for Execute {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = KeyValues::decode(buf)?;
        let statement_name = Bytes::decode(buf)?;
        let arguments = Bytes::decode(buf)?;
        Ok(Execute {
            headers,
            statement_name,
            arguments,
        })
    }
}

impl OptimisticExecute {
    pub fn new(
        flags: &CompilationOptions,
        query: &str,
        arguments: impl Into<Bytes>,
        input_typedesc_id: Uuid,
        output_typedesc_id: Uuid,
    ) -> OptimisticExecute {
        OptimisticExecute {
            headers: flags.to_headers(),
            io_format: flags.io_format,
            expected_cardinality: flags.expected_cardinality,
            command_text: query.into(),
            input_typedesc_id,
            output_typedesc_id,
            arguments: arguments.into(),
        }
    }
}

impl Encode for OptimisticExecute {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        self.headers.encode(buf)?;
        buf.reserve(1 + 1 + 4 + 16 + 16 + 4);
        buf.put_u8(self.io_format as u8);
        buf.put_u8(self.expected_cardinality.to_wire());
        self.command_text.encode(buf)?;
        self.input_typedesc_id.encode(buf)?;
        self.output_typedesc_id.encode(buf)?;
        self.arguments.encode(buf)?;
        Ok(())
    }
}

impl Decode for OptimisticExecute {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = KeyValues::decode(buf)?;
        ensure!(buf.remaining() >= 2, errors::Underflow);
        let io_format = TryFrom::try_from(buf.get_u8())?;
        let expected_cardinality = TryFrom::try_from(buf.get_u8())?;
        let command_text = String::decode(buf)?;
        let input_typedesc_id = Uuid::decode(buf)?;
        let output_typedesc_id = Uuid::decode(buf)?;
        let arguments = Bytes::decode(buf)?;
        Ok(OptimisticExecute {
            headers,
            io_format,
            expected_cardinality,
            command_text,
            input_typedesc_id,
            output_typedesc_id,
            arguments,
        })
    }
}
