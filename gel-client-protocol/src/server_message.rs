/*!
The [ServerMessage] enum and related types.

```rust,ignore
pub enum ServerMessage {
    Authentication(Authentication),
    ServerHandshake(ServerHandshake),
    ServerKeyData(ServerKeyData),
    ParameterStatus(ParameterStatus),
    ReadyForCommand(ReadyForCommand),
    PrepareComplete(PrepareComplete),
    CommandDataDescription(CommandDataDescription),
    Data(Data),
    CommandComplete(CommandComplete),
    ErrorResponse(ErrorResponse),
    LogMessage(LogMessage),
    UnknownMessage(u8, Bytes),
}
```
*/

use std::convert::TryFrom;

use bytes::{Buf, BufMut, Bytes};
use snafu::{ensure, OptionExt, ResultExt};
use uuid::Uuid;

use crate::common::Capabilities;
pub use crate::common::{Cardinality, RawTypedesc};
use crate::descriptors::Typedesc;
use crate::encoding::{encode, Decode, Encode, Input, KeyValues, Output};
use crate::errors::{self, DecodeError, EncodeError};

/// Header carrying the capabilities actually used by a prepared query.
pub const HEADER_CAPABILITIES: u16 = 0x1001;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ServerMessage {
    Authentication(Authentication),
    ServerHandshake(ServerHandshake),
    ServerKeyData(ServerKeyData),
    ParameterStatus(ParameterStatus),
    ReadyForCommand(ReadyForCommand),
    PrepareComplete(PrepareComplete),
    CommandDataDescription(CommandDataDescription),
    Data(Data),
    CommandComplete(CommandComplete),
    ErrorResponse(ErrorResponse),
    LogMessage(LogMessage),
    UnknownMessage(u8, Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    Ok,
    Sasl { methods: Vec<String> },
    SaslContinue { data: Bytes },
    SaslFinal { data: Bytes },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Not in a transaction block.
    NotInTransaction = 0x49,
    /// In a transaction block.
    InTransaction = 0x54,
    /// In a failed transaction block; queries are rejected until the
    /// block is rolled back.
    InFailedTransaction = 0x45,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHandshake {
    pub major_ver: u16,
    pub minor_ver: u16,
    pub extensions: std::collections::HashMap<String, crate::encoding::Annotations>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerKeyData {
    pub data: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterStatus {
    pub proto: crate::features::ProtocolVersion,
    pub name: Bytes,
    pub value: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyForCommand {
    pub headers: KeyValues,
    pub transaction_state: TransactionState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareComplete {
    pub headers: KeyValues,
    pub cardinality: Cardinality,
    pub input_typedesc_id: Uuid,
    pub output_typedesc_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDataDescription {
    pub headers: KeyValues,
    pub result_cardinality: Cardinality,
    pub input: RawTypedesc,
    pub output: RawTypedesc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    pub data: Vec<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandComplete {
    pub headers: KeyValues,
    pub status_data: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Error,
    Fatal,
    Panic,
    Unknown(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Debug,
    Info,
    Notice,
    Warning,
    Unknown(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub severity: ErrorSeverity,
    pub code: u32,
    pub message: String,
    pub attributes: KeyValues,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub severity: MessageSeverity,
    pub code: u32,
    pub text: String,
    pub attributes: KeyValues,
}

impl ServerMessage {
    pub fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        use ServerMessage::*;
        match self {
            Authentication(h) => encode(buf, 0x52, h),
            ServerHandshake(h) => encode(buf, 0x76, h),
            ServerKeyData(h) => encode(buf, 0x4b, h),
            ParameterStatus(h) => encode(buf, 0x53, h),
            ReadyForCommand(h) => encode(buf, 0x5a, h),
            PrepareComplete(h) => encode(buf, 0x31, h),
            CommandDataDescription(h) => encode(buf, 0x54, h),
            Data(h) => encode(buf, 0x44, h),
            CommandComplete(h) => encode(buf, 0x43, h),
            ErrorResponse(h) => encode(buf, 0x45, h),
            LogMessage(h) => encode(buf, 0x4c, h),

            UnknownMessage(_, _) => errors::UnknownMessageCantBeEncoded.fail()?,
        }
    }

    /// Decode exactly one frame from the buffer.
    ///
    /// This expects a full frame to already be in the buffer. It can
    /// return an arbitrary error or be silent if a message is only
    /// partially present in the buffer or if extra data is present.
    pub fn decode(buf: &mut Input) -> Result<ServerMessage, DecodeError> {
        use self::ServerMessage as M;
        ensure!(buf.remaining() >= 5, errors::Underflow);
        let tag = buf[0];
        let frame_len = u32::from_be_bytes(buf[1..5].try_into().unwrap()) as usize;
        ensure!(frame_len >= 4, errors::Underflow);
        ensure!(buf.remaining() >= frame_len + 1, errors::Underflow);
        let mut next = buf.slice(5..frame_len + 1);
        buf.advance(frame_len + 1);
        let buf = &mut next;

        let result = match tag {
            0x52 => Authentication::decode(buf).map(M::Authentication)?,
            0x76 => ServerHandshake::decode(buf).map(M::ServerHandshake)?,
            0x4b => ServerKeyData::decode(buf).map(M::ServerKeyData)?,
            0x53 => ParameterStatus::decode(buf).map(M::ParameterStatus)?,
            0x5a => ReadyForCommand::decode(buf).map(M::ReadyForCommand)?,
            0x31 => PrepareComplete::decode(buf).map(M::PrepareComplete)?,
            0x54 => CommandDataDescription::decode(buf).map(M::CommandDataDescription)?,
            0x44 => Data::decode(buf).map(M::Data)?,
            0x43 => CommandComplete::decode(buf).map(M::CommandComplete)?,
            0x45 => ErrorResponse::decode(buf).map(M::ErrorResponse)?,
            0x4c => LogMessage::decode(buf).map(M::LogMessage)?,
            code => M::UnknownMessage(code, buf.copy_to_bytes(buf.remaining())),
        };
        Ok(result)
    }
}

impl Encode for Authentication {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.reserve(4);
        match self {
            Authentication::Ok => buf.put_u32(0),
            Authentication::Sasl { methods } => {
                buf.put_u32(0x0A);
                buf.reserve(4);
                buf.put_u32(
                    u32::try_from(methods.len())
                        .ok()
                        .context(errors::TooManyMethods)?,
                );
                for meth in methods {
                    meth.encode(buf)?;
                }
            }
            Authentication::SaslContinue { data } => {
                buf.put_u32(0x0B);
                data.encode(buf)?;
            }
            Authentication::SaslFinal { data } => {
                buf.put_u32(0x0C);
                data.encode(buf)?;
            }
        }
        Ok(())
    }
}

impl Decode for Authentication {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 4, errors::Underflow);
        match buf.get_u32() {
            0x00 => Ok(Authentication::Ok),
            0x0A => {
                ensure!(buf.remaining() >= 4, errors::Underflow);
                let num_methods = buf.get_u32() as usize;
                let mut methods = Vec::with_capacity(num_methods);
                for _ in 0..num_methods {
                    methods.push(String::decode(buf)?);
                }
                Ok(Authentication::Sasl { methods })
            }
            0x0B => {
                let data = Bytes::decode(buf)?;
                Ok(Authentication::SaslContinue { data })
            }
            0x0C => {
                let data = Bytes::decode(buf)?;
                Ok(Authentication::SaslFinal { data })
            }
            auth_status => errors::AuthStatusInvalid { auth_status }.fail(),
        }
    }
}

impl Encode for ServerHandshake {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.reserve(6);
        buf.put_u16(self.major_ver);
        buf.put_u16(self.minor_ver);
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

impl Decode for ServerHandshake {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 6, errors::Underflow);
        let major_ver = buf.get_u16();
        let minor_ver = buf.get_u16();
        let num_ext = buf.get_u16();
        let mut extensions = std::collections::HashMap::with_capacity(num_ext as usize);
        for _ in 0..num_ext {
            extensions.insert(
                String::decode(buf)?,
                crate::encoding::Annotations::decode(buf)?,
            );
        }
        Ok(ServerHandshake {
            major_ver,
            minor_ver,
            extensions,
        })
    }
}

impl Encode for ServerKeyData {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.extend(&self.data);
        Ok(())
    }
}

impl Decode for ServerKeyData {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 32, errors::Underflow);
        let mut data = [0u8; 32];
        buf.copy_to_slice(&mut data);
        Ok(ServerKeyData { data })
    }
}

impl Encode for ParameterStatus {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        self.name.encode(buf)?;
        self.value.encode(buf)?;
        Ok(())
    }
}

impl Decode for ParameterStatus {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let proto = buf.proto().clone();
        let name = Bytes::decode(buf)?;
        let value = Bytes::decode(buf)?;
        Ok(ParameterStatus { proto, name, value })
    }
}

impl ParameterStatus {
    /// Split a `system_config` status into its typedesc and value parts.
    pub fn parse_system_config(self) -> Result<(Typedesc, Bytes), DecodeError> {
        let cur = &mut Input::new(self.proto.clone(), self.value);
        let typedesc_data = Bytes::decode(cur)?;
        let data = Bytes::decode(cur)?;

        let typedesc_buf = &mut Input::new(self.proto, typedesc_data);
        let typedesc_id = Uuid::decode(typedesc_buf)?;
        let typedesc = Typedesc::decode_with_id(typedesc_id, typedesc_buf)?;
        Ok((typedesc, data))
    }
}

impl Encode for ReadyForCommand {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        self.headers.encode(buf)?;
        buf.reserve(1);
        buf.put_u8(self.transaction_state as u8);
        Ok(())
    }
}

impl Decode for ReadyForCommand {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = KeyValues::decode(buf)?;
        ensure!(buf.remaining() >= 1, errors::Underflow);
        let transaction_state = TryFrom::try_from(buf.get_u8())?;
        Ok(ReadyForCommand {
            headers,
            transaction_state,
        })
    }
}

impl TryFrom<u8> for TransactionState {
    type Error = DecodeError;
    fn try_from(transaction_state: u8) -> Result<TransactionState, DecodeError> {
        match transaction_state {
            0x49 => Ok(TransactionState::NotInTransaction),
            0x54 => Ok(TransactionState::InTransaction),
            0x45 => Ok(TransactionState::InFailedTransaction),
            _ => errors::InvalidTransactionState { transaction_state }.fail(),
        }
    }
}

fn capabilities_header(headers: &KeyValues) -> Option<Capabilities> {
    headers
        .get(&HEADER_CAPABILITIES)
        .and_then(|bytes| <[u8; 8]>::try_from(&bytes[..]).ok())
        .map(u64::from_be_bytes)
        .map(Capabilities::from_bits_truncate)
}

impl PrepareComplete {
    /// Capabilities the server determined the query to use.
    ///
    /// Absent on very old servers; callers treat absence as ALL.
    pub fn get_capabilities(&self) -> Option<Capabilities> {
        capabilities_header(&self.headers)
    }
}

impl Encode for PrepareComplete {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        self.headers.encode(buf)?;
        buf.reserve(33);
        buf.put_u8(self.cardinality as u8);
        self.input_typedesc_id.encode(buf)?;
        self.output_typedesc_id.encode(buf)?;
        Ok(())
    }
}

impl Decode for PrepareComplete {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = KeyValues::decode(buf)?;
        ensure!(buf.remaining() >= 33, errors::Underflow);
        let cardinality = TryFrom::try_from(buf.get_u8())?;
        let input_typedesc_id = Uuid::decode(buf)?;
        let output_typedesc_id = Uuid::decode(buf)?;
        Ok(PrepareComplete {
            headers,
            cardinality,
            input_typedesc_id,
            output_typedesc_id,
        })
    }
}

impl CommandDataDescription {
    pub fn get_capabilities(&self) -> Option<Capabilities> {
        capabilities_header(&self.headers)
    }
    pub fn output(&self) -> Result<Typedesc, DecodeError> {
        self.output.decode()
    }
    pub fn input(&self) -> Result<Typedesc, DecodeError> {
        self.input.decode()
    }
}

impl Encode for CommandDataDescription {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        self.headers.encode(buf)?;
        buf.reserve(41);
        buf.put_u8(self.result_cardinality as u8);
        self.input.id.encode(buf)?;
        self.input.data.encode(buf)?;
        self.output.id.encode(buf)?;
        self.output.data.encode(buf)?;
        Ok(())
    }
}

impl Decode for CommandDataDescription {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let proto = buf.proto().clone();
        let headers = KeyValues::decode(buf)?;
        ensure!(buf.remaining() >= 41, errors::Underflow);
        let result_cardinality = TryFrom::try_from(buf.get_u8())?;
        let input_typedesc_id = Uuid::decode(buf)?;
        let input_typedesc = Bytes::decode(buf)?;
        let output_typedesc_id = Uuid::decode(buf)?;
        let output_typedesc = Bytes::decode(buf)?;
        Ok(CommandDataDescription {
            headers,
            result_cardinality,
            input: RawTypedesc {
                proto: proto.clone(),
                id: input_typedesc_id,
                data: input_typedesc,
            },
            output: RawTypedesc {
                proto,
                id: output_typedesc_id,
                data: output_typedesc,
            },
        })
    }
}

impl Encode for Data {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.reserve(2);
        buf.put_u16(
            u16::try_from(self.data.len())
                .ok()
                .context(errors::TooManyHeaders)?,
        );
        for chunk in &self.data {
            chunk.encode(buf)?;
        }
        Ok(())
    }
}

impl Decode for Data {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 2, errors::Underflow);
        let num_chunks = buf.get_u16() as usize;
        let mut data = Vec::with_capacity(num_chunks);
        for _ in 0..num_chunks {
            data.push(Bytes::decode(buf)?);
        }
        Ok(Data { data })
    }
}

impl CommandComplete {
    /// Status tag of the completed command, e.g. `CREATE DATABASE`.
    pub fn status(&self) -> Result<&str, DecodeError> {
        std::str::from_utf8(&self.status_data).context(errors::InvalidUtf8)
    }
}

impl Encode for CommandComplete {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        self.headers.encode(buf)?;
        self.status_data.encode(buf)?;
        Ok(())
    }
}

impl Decode for CommandComplete {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = KeyValues::decode(buf)?;
        let status_data = Bytes::decode(buf)?;
        Ok(CommandComplete {
            headers,
            status_data,
        })
    }
}

impl ErrorSeverity {
    fn to_u8(self) -> u8 {
        use ErrorSeverity::*;
        match self {
            Error => 120,
            Fatal => 200,
            Panic => 255,
            Unknown(severity) => severity,
        }
    }
    fn from_u8(code: u8) -> ErrorSeverity {
        use ErrorSeverity::*;
        match code {
            120 => Error,
            200 => Fatal,
            255 => Panic,
            _ => Unknown(code),
        }
    }
}

impl MessageSeverity {
    fn to_u8(self) -> u8 {
        use MessageSeverity::*;
        match self {
            Debug => 20,
            Info => 40,
            Notice => 60,
            Warning => 80,
            Unknown(severity) => severity,
        }
    }
    fn from_u8(code: u8) -> MessageSeverity {
        use MessageSeverity::*;
        match code {
            20 => Debug,
            40 => Info,
            60 => Notice,
            80 => Warning,
            _ => Unknown(code),
        }
    }
}

impl Encode for ErrorResponse {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.reserve(5);
        buf.put_u8(self.severity.to_u8());
        buf.put_u32(self.code);
        self.message.encode(buf)?;
        self.attributes.encode(buf)?;
        Ok(())
    }
}

impl Decode for ErrorResponse {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 5, errors::Underflow);
        let severity = ErrorSeverity::from_u8(buf.get_u8());
        let code = buf.get_u32();
        let message = String::decode(buf)?;
        let attributes = KeyValues::decode(buf)?;
        Ok(ErrorResponse {
            severity,
            code,
            message,
            attributes,
        })
    }
}

impl Encode for LogMessage {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.reserve(5);
        buf.put_u8(self.severity.to_u8());
        buf.put_u32(self.code);
        self.text.encode(buf)?;
        self.attributes.encode(buf)?;
        Ok(())
    }
}

impl Decode for LogMessage {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        ensure!(buf.remaining() >= 5, errors::Underflow);
        let severity = MessageSeverity::from_u8(buf.get_u8());
        let code = buf.get_u32();
        let text = String::decode(buf)?;
        let attributes = KeyValues::decode(buf)?;
        Ok(LogMessage {
            severity,
            code,
            text,
            attributes,
        })
    }
}

impl From<ErrorResponse> for gel_client_errors::Error {
    fn from(val: ErrorResponse) -> Self {
        gel_client_errors::Error::from_code(val.code)
            .context(val.message)
            .with_headers(val.attributes.into_iter().collect())
    }
}
