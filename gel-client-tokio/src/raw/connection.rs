use std::collections::HashMap;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};

use gel_client_protocol::model::Uuid;

use gel_client_errors::{
    AuthenticationError, ClientConnectionError, ClientConnectionEosError,
    ClientConnectionFailedError, ClientConnectionTimeoutError, ClientEncodingError, Error,
    ErrorKind, PasswordRequired, ProtocolEncodingError, ProtocolOutOfOrderError,
    UnsupportedProtocolVersionError,
};
use gel_client_protocol::client_message::{ClientHandshake, ClientMessage};
use gel_client_protocol::client_message::{SaslInitialResponse, SaslResponse};
use gel_client_protocol::descriptors::Typedesc;
use gel_client_protocol::encoding::{Input, Output};
use gel_client_protocol::features::ProtocolVersion;
use gel_client_protocol::server_message::{
    Authentication, MessageSeverity, ServerMessage, TransactionState,
};

use crate::builder::Config;
use crate::raw::scram::{decode_utf8, ScramClient};
use crate::server_params::ServerParams;

/// One frame header: tag plus 32-bit length.
const FRAME_HEADER: usize = 5;
/// Read chunk size; also the slab size of the input buffer.
const BUFFER_SIZE: usize = 8192;

#[derive(Debug)]
pub(crate) enum Mode {
    Normal { idle_since: Instant },
    Dirty,
    Terminated,
}

#[derive(Debug)]
pub(crate) struct QueryGist {
    pub input_id: Uuid,
    pub output_id: Uuid,
    pub capabilities: gel_client_protocol::common::Capabilities,
}

/// A single established connection.
///
/// All request methods take `&mut self`: one request/response exchange
/// holds the connection exclusively, and a new request may only start
/// once the previous one has observed `ReadyForCommand`.
#[derive(Debug)]
pub struct Connection<S = TcpStream> {
    pub(crate) stream: S,
    pub(crate) in_buf: BytesMut,
    pub(crate) out_buf: BytesMut,
    pub(crate) proto: ProtocolVersion,
    pub(crate) mode: Mode,
    pub(crate) transaction_state: TransactionState,
    pub(crate) key_data: Option<[u8; 32]>,
    pub(crate) server_params: ServerParams,
    pub(crate) typedesc_cache: HashMap<Uuid, Arc<Typedesc>>,
    pub(crate) query_cache: HashMap<(String, u8, u8), QueryGist>,
}

impl Connection<TcpStream> {
    /// Open a TCP connection and run the handshake.
    pub async fn connect(config: &Config) -> Result<Connection<TcpStream>, Error> {
        let addr = (&config.host[..], config.port);
        let stream = timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                ClientConnectionTimeoutError::with_message(format!(
                    "connecting to {}:{} timed out",
                    config.host, config.port
                ))
            })?
            .map_err(ClientConnectionFailedError::with_source)?;
        Connection::handshake(stream, config).await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    /// Run the protocol handshake over an established stream.
    pub async fn handshake(stream: S, config: &Config) -> Result<Connection<S>, Error> {
        let mut conn = Connection {
            stream,
            in_buf: BytesMut::with_capacity(BUFFER_SIZE),
            out_buf: BytesMut::with_capacity(BUFFER_SIZE),
            proto: ProtocolVersion::current(),
            mode: Mode::Dirty,
            transaction_state: TransactionState::NotInTransaction,
            key_data: None,
            server_params: ServerParams::default(),
            typedesc_cache: HashMap::new(),
            query_cache: HashMap::new(),
        };
        let (major_ver, minor_ver) = conn.proto.version_tuple();
        conn.send_messages(&[ClientMessage::ClientHandshake(ClientHandshake {
            major_ver,
            minor_ver,
            params: config.handshake_params(),
            extensions: HashMap::new(),
        })])
        .await?;

        let mut msg = conn.message().await?;
        if let ServerMessage::ServerHandshake(handshake) = msg {
            let (min_major, min_minor) = ProtocolVersion::minimum().version_tuple();
            let proposed = ProtocolVersion::new(handshake.major_ver, handshake.minor_ver);
            if proposed.is_at_least(min_major, min_minor)
                && proposed.is_at_most(major_ver, minor_ver)
            {
                conn.proto = proposed;
            } else {
                return Err(UnsupportedProtocolVersionError::with_message(format!(
                    "server requires protocol {}.{}, client supports {}.{} through {}.{}",
                    handshake.major_ver,
                    handshake.minor_ver,
                    min_major,
                    min_minor,
                    major_ver,
                    minor_ver,
                )));
            }
            msg = conn.message().await?;
        }

        match msg {
            ServerMessage::Authentication(Authentication::Ok) => {}
            ServerMessage::Authentication(Authentication::Sasl { methods }) => {
                conn.sasl_auth(config, &methods).await?;
            }
            ServerMessage::Authentication(_) => {
                return Err(AuthenticationError::with_message(
                    "unsupported authentication challenge",
                ));
            }
            ServerMessage::ErrorResponse(err) => return Err(err.into()),
            msg => {
                return Err(ProtocolOutOfOrderError::with_message(format!(
                    "unsolicited message {msg:?}"
                )))
            }
        }

        loop {
            match conn.message().await? {
                ServerMessage::ServerKeyData(key_data) => {
                    conn.key_data = Some(key_data.data);
                }
                ServerMessage::ReadyForCommand(ready) => {
                    conn.transaction_state = ready.transaction_state;
                    conn.mode = Mode::Normal {
                        idle_since: Instant::now(),
                    };
                    return Ok(conn);
                }
                ServerMessage::ErrorResponse(err) => return Err(err.into()),
                msg => {
                    return Err(ProtocolOutOfOrderError::with_message(format!(
                        "unsolicited message {msg:?}"
                    )))
                }
            }
        }
    }

    async fn sasl_auth(&mut self, config: &Config, methods: &[String]) -> Result<(), Error> {
        if !methods.iter().any(|m| m == "SCRAM-SHA-256") {
            return Err(AuthenticationError::with_message(format!(
                "server requests one of {methods:?}, only SCRAM-SHA-256 is supported"
            )));
        }
        let password = config
            .password
            .as_deref()
            .ok_or_else(|| PasswordRequired::with_message("password required"))?;

        let scram = ScramClient::new(&config.user, password);
        self.send_messages(&[ClientMessage::AuthenticationSaslInitialResponse(
            SaslInitialResponse {
                method: "SCRAM-SHA-256".into(),
                data: Bytes::from(scram.client_first()),
            },
        )])
        .await?;

        let data = match self.message().await? {
            ServerMessage::Authentication(Authentication::SaslContinue { data }) => data,
            ServerMessage::ErrorResponse(err) => return Err(err.into()),
            msg => {
                return Err(ProtocolOutOfOrderError::with_message(format!(
                    "unsolicited message {msg:?}"
                )))
            }
        };
        let pending = scram.handle_server_first(decode_utf8(&data)?)?;
        self.send_messages(&[ClientMessage::AuthenticationSaslResponse(SaslResponse {
            data: Bytes::from(pending.client_final().to_owned()),
        })])
        .await?;

        let data = match self.message().await? {
            ServerMessage::Authentication(Authentication::SaslFinal { data }) => data,
            ServerMessage::ErrorResponse(err) => return Err(err.into()),
            msg => {
                return Err(ProtocolOutOfOrderError::with_message(format!(
                    "unsolicited message {msg:?}"
                )))
            }
        };
        pending.handle_server_final(decode_utf8(&data)?)?;

        match self.message().await? {
            ServerMessage::Authentication(Authentication::Ok) => Ok(()),
            ServerMessage::ErrorResponse(err) => Err(err.into()),
            msg => Err(ProtocolOutOfOrderError::with_message(format!(
                "unsolicited message {msg:?}"
            ))),
        }
    }

    /// Read one server message, transparently handling the
    /// housekeeping messages that may arrive at any time.
    pub(crate) async fn message(&mut self) -> Result<ServerMessage, Error> {
        loop {
            match self.read_message().await? {
                ServerMessage::LogMessage(msg) => {
                    match msg.severity {
                        MessageSeverity::Debug => log::debug!("server: {}", msg.text),
                        MessageSeverity::Info | MessageSeverity::Notice => {
                            log::info!("server: {}", msg.text)
                        }
                        _ => log::warn!("server: {}", msg.text),
                    }
                    continue;
                }
                ServerMessage::ParameterStatus(status) => {
                    self.server_params.set(status);
                    continue;
                }
                ServerMessage::UnknownMessage(tag, _) if (0x80..=0xFF).contains(&tag) => {
                    // annotation range, skipped
                    log::debug!("ignoring annotation message {tag:#x}");
                    continue;
                }
                ServerMessage::UnknownMessage(tag, _) => {
                    self.mode = Mode::Terminated;
                    return Err(ProtocolEncodingError::with_message(format!(
                        "unexpected message tag {tag:#x}"
                    )));
                }
                msg => return Ok(msg),
            }
        }
    }

    async fn read_message(&mut self) -> Result<ServerMessage, Error> {
        loop {
            if let Some(frame) = self.try_take_frame()? {
                let mut input = Input::new(self.proto.clone(), frame);
                return ServerMessage::decode(&mut input).map_err(|e| {
                    self.mode = Mode::Terminated;
                    ProtocolEncodingError::with_source(e)
                });
            }
            self.in_buf.reserve(BUFFER_SIZE);
            let read = self
                .stream
                .read_buf(&mut self.in_buf)
                .await
                .map_err(|e| {
                    self.mode = Mode::Terminated;
                    ClientConnectionError::with_source(e)
                })?;
            if read == 0 {
                self.mode = Mode::Terminated;
                return Err(ClientConnectionEosError::with_message(
                    "connection closed by server",
                ));
            }
        }
    }

    /// Split one complete frame off the input buffer, if present.
    ///
    /// The returned `Bytes` is a view into the current slab; the slab
    /// is recycled once all views into it are dropped.
    fn try_take_frame(&mut self) -> Result<Option<Bytes>, Error> {
        if self.in_buf.len() < FRAME_HEADER {
            return Ok(None);
        }
        let declared = u32::from_be_bytes(self.in_buf[1..5].try_into().unwrap()) as usize;
        if declared < 4 {
            self.mode = Mode::Terminated;
            return Err(ProtocolEncodingError::with_message(format!(
                "invalid frame length {declared}"
            )));
        }
        let total = declared + 1;
        if self.in_buf.len() < total {
            return Ok(None);
        }
        Ok(Some(self.in_buf.split_to(total).freeze()))
    }

    pub(crate) async fn send_messages(&mut self, messages: &[ClientMessage]) -> Result<(), Error> {
        self.out_buf.clear();
        {
            let mut out = Output::new(&self.proto, &mut self.out_buf);
            for message in messages {
                message
                    .encode(&mut out)
                    .map_err(ClientEncodingError::with_source)?;
            }
        }
        self.stream
            .write_all(&self.out_buf)
            .await
            .map_err(|e| {
                self.mode = Mode::Terminated;
                ClientConnectionError::with_source(e)
            })?;
        self.stream.flush().await.map_err(|e| {
            self.mode = Mode::Terminated;
            ClientConnectionError::with_source(e)
        })?;
        Ok(())
    }

    /// Whether the connection can accept a new request.
    pub fn is_consistent(&self) -> bool {
        matches!(self.mode, Mode::Normal { .. })
    }
    /// When the connection last became idle, if it is idle now.
    pub fn idle_since(&self) -> Option<Instant> {
        match self.mode {
            Mode::Normal { idle_since } => Some(idle_since),
            _ => None,
        }
    }
    pub fn transaction_state(&self) -> TransactionState {
        self.transaction_state
    }
    pub fn proto(&self) -> &ProtocolVersion {
        &self.proto
    }
    pub fn server_params(&self) -> &ServerParams {
        &self.server_params
    }
    pub fn key_data(&self) -> Option<&[u8; 32]> {
        self.key_data.as_ref()
    }

    /// Send `Terminate` best-effort and drop the connection.
    pub async fn terminate(mut self) {
        if self.send_messages(&[ClientMessage::Terminate]).await.is_err() {
            log::debug!("could not send Terminate on close");
        }
    }
}
