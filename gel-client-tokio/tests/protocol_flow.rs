//! Drives a connection against a scripted in-memory server.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use hmac::{Hmac, Mac};
use pretty_assertions::assert_eq;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use gel_client_protocol::model::Uuid;

use gel_client_errors::{
    AuthenticationError, ClientConnectionError, InvalidReferenceError, NoDataError,
    ResultCardinalityMismatchError,
};
use gel_client_protocol::client_message::ClientMessage;
use gel_client_protocol::common::{Cardinality, RawTypedesc};
use gel_client_protocol::encoding::{Input, KeyValues, Output};
use gel_client_protocol::features::ProtocolVersion;
use gel_client_protocol::server_message::{
    Authentication, CommandComplete, CommandDataDescription, Data, ErrorResponse, ErrorSeverity,
    ParameterStatus, ReadyForCommand, ServerKeyData, ServerMessage, TransactionState,
};
use gel_client_tokio::{Config, Connection, QueryOptions};

const STR_ID: Uuid = Uuid::from_u128(0x101);

struct MockServer {
    stream: DuplexStream,
    buf: BytesMut,
    proto: ProtocolVersion,
}

impl MockServer {
    fn new(stream: DuplexStream) -> MockServer {
        MockServer {
            stream,
            buf: BytesMut::new(),
            proto: ProtocolVersion::current(),
        }
    }

    async fn recv(&mut self) -> ClientMessage {
        loop {
            if self.buf.len() >= 5 {
                let len = u32::from_be_bytes(self.buf[1..5].try_into().unwrap()) as usize;
                if self.buf.len() >= len + 1 {
                    let frame = self.buf.split_to(len + 1).freeze();
                    return ClientMessage::decode(&mut Input::new(self.proto.clone(), frame))
                        .expect("valid client message");
                }
            }
            let read = self.stream.read_buf(&mut self.buf).await.unwrap();
            assert!(read > 0, "client closed unexpectedly");
        }
    }

    async fn send(&mut self, messages: &[ServerMessage]) {
        let mut out = BytesMut::new();
        for message in messages {
            message
                .encode(&mut Output::new(&self.proto, &mut out))
                .unwrap();
        }
        self.stream.write_all(&out).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    fn ready() -> ServerMessage {
        ServerMessage::ReadyForCommand(ReadyForCommand {
            headers: KeyValues::new(),
            transaction_state: TransactionState::NotInTransaction,
        })
    }

    fn complete(status: &str) -> ServerMessage {
        ServerMessage::CommandComplete(CommandComplete {
            headers: KeyValues::new(),
            status_data: Bytes::copy_from_slice(status.as_bytes()),
        })
    }

    fn str_row(text: &str) -> ServerMessage {
        ServerMessage::Data(Data {
            data: vec![Bytes::copy_from_slice(text.as_bytes())],
        })
    }

    /// Descriptor pair of a statement returning a set of `std::str`
    /// with no arguments.
    fn str_descriptors(&self) -> CommandDataDescription {
        CommandDataDescription {
            headers: KeyValues::new(),
            result_cardinality: Cardinality::Many,
            input: RawTypedesc {
                proto: self.proto.clone(),
                id: Uuid::from_u128(0),
                data: Bytes::new(),
            },
            output: RawTypedesc {
                proto: self.proto.clone(),
                id: STR_ID,
                data: Bytes::from_static(b"\x02\0\0\0\0\0\0\0\0\0\0\0\0\0\0\x01\x01"),
            },
        }
    }

    async fn session(&mut self) {
        let handshake = self.recv().await;
        match handshake {
            ClientMessage::ClientHandshake(hs) => {
                assert_eq!(hs.params.get("user").map(|s| &s[..]), Some("edgedb"));
                assert_eq!(hs.params.get("database").map(|s| &s[..]), Some("main"));
            }
            other => panic!("expected handshake, got {other:?}"),
        }
        self.send(&[
            ServerMessage::Authentication(Authentication::Ok),
            ServerMessage::ServerKeyData(ServerKeyData { data: [7u8; 32] }),
            ServerMessage::ParameterStatus(ParameterStatus {
                proto: self.proto.clone(),
                name: Bytes::from_static(b"suggested_pool_concurrency"),
                value: Bytes::from_static(b"10"),
            }),
            Self::ready(),
        ])
        .await;
    }

    async fn expect_prepare(&mut self) -> String {
        let prepare = match self.recv().await {
            ClientMessage::Prepare(prepare) => prepare,
            other => panic!("expected Prepare, got {other:?}"),
        };
        assert!(matches!(self.recv().await, ClientMessage::Flush));
        prepare.command_text
    }

    async fn expect_describe(&mut self) {
        assert!(matches!(
            self.recv().await,
            ClientMessage::DescribeStatement(_)
        ));
        assert!(matches!(self.recv().await, ClientMessage::Flush));
    }

    async fn expect_execute(&mut self) {
        assert!(matches!(self.recv().await, ClientMessage::Execute(_)));
        assert!(matches!(self.recv().await, ClientMessage::Sync));
    }
}

fn test_config() -> Config {
    Config::new("localhost", 5656, "edgedb", "main")
}

async fn established() -> (Connection<DuplexStream>, MockServer) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (client, server) = tokio::io::duplex(1 << 16);
    let mut mock = MockServer::new(server);
    let config = test_config();
    let (conn, ()) = tokio::join!(Connection::handshake(client, &config), mock.session());
    (conn.expect("handshake succeeds"), mock)
}

#[tokio::test]
async fn handshake_stores_session_state() {
    let (conn, _mock) = established().await;
    assert!(conn.is_consistent());
    assert_eq!(conn.transaction_state(), TransactionState::NotInTransaction);
    assert_eq!(conn.server_params().suggested_pool_concurrency(), Some(10));
    assert_eq!(conn.key_data(), Some(&[7u8; 32]));
}

#[tokio::test]
async fn no_result_statement() {
    let (mut conn, mut mock) = established().await;
    let script = async {
        let text = mock.expect_prepare().await;
        assert_eq!(text, "CREATE DATABASE foo;");
        mock.send(&[ServerMessage::PrepareComplete(
            gel_client_protocol::server_message::PrepareComplete {
                headers: KeyValues::new(),
                cardinality: Cardinality::NoResult,
                input_typedesc_id: Uuid::from_u128(0),
                output_typedesc_id: Uuid::from_u128(0),
            },
        )])
        .await;
        mock.expect_execute().await;
        mock.send(&[MockServer::complete("CREATE DATABASE"), MockServer::ready()])
            .await;
    };
    let (response, ()) = tokio::join!(
        conn.execute("CREATE DATABASE foo;", &(), QueryOptions::default()),
        script
    );
    let response = response.unwrap();
    assert_eq!(response.status, "CREATE DATABASE");
    assert!(conn.is_consistent());
}

#[tokio::test]
async fn cardinality_policing_and_optimistic_retry() {
    let (mut conn, mut mock) = established().await;

    // first run: two rows against a single-row query
    let script = async {
        mock.expect_prepare().await;
        let desc = mock.str_descriptors();
        mock.send(&[ServerMessage::PrepareComplete(
            gel_client_protocol::server_message::PrepareComplete {
                headers: KeyValues::new(),
                cardinality: Cardinality::Many,
                input_typedesc_id: Uuid::from_u128(0),
                output_typedesc_id: STR_ID,
            },
        )])
        .await;
        mock.expect_describe().await;
        mock.send(&[ServerMessage::CommandDataDescription(desc)]).await;
        mock.expect_execute().await;
        mock.send(&[
            MockServer::str_row("a"),
            MockServer::str_row("b"),
            MockServer::complete("SELECT"),
            MockServer::ready(),
        ])
        .await;
    };
    let (result, ()) = tokio::join!(
        conn.query_single::<String, _>("SELECT User.name", &(), QueryOptions::default()),
        script
    );
    let err = result.unwrap_err();
    assert!(err.is::<ResultCardinalityMismatchError>());
    assert!(conn.is_consistent());

    // second run of the same query goes through the optimistic path
    let script = async {
        match mock.recv().await {
            ClientMessage::OptimisticExecute(oe) => {
                assert_eq!(oe.input_typedesc_id, Uuid::from_u128(0));
                assert_eq!(oe.output_typedesc_id, STR_ID);
            }
            other => panic!("expected OptimisticExecute, got {other:?}"),
        }
        assert!(matches!(mock.recv().await, ClientMessage::Sync));
        mock.send(&[
            MockServer::str_row("a"),
            MockServer::complete("SELECT"),
            MockServer::ready(),
        ])
        .await;
    };
    let (result, ()) = tokio::join!(
        conn.query_single::<String, _>("SELECT User.name", &(), QueryOptions::default()),
        script
    );
    assert_eq!(result.unwrap(), Some("a".into()));
}

#[tokio::test]
async fn zero_rows_for_required_single() {
    let (mut conn, mut mock) = established().await;
    let script = async {
        mock.expect_prepare().await;
        let desc = mock.str_descriptors();
        mock.send(&[ServerMessage::PrepareComplete(
            gel_client_protocol::server_message::PrepareComplete {
                headers: KeyValues::new(),
                cardinality: Cardinality::Many,
                input_typedesc_id: Uuid::from_u128(0),
                output_typedesc_id: STR_ID,
            },
        )])
        .await;
        mock.expect_describe().await;
        mock.send(&[ServerMessage::CommandDataDescription(desc)]).await;
        mock.expect_execute().await;
        mock.send(&[MockServer::complete("SELECT"), MockServer::ready()])
            .await;
    };
    let (result, ()) = tokio::join!(
        conn.query_required_single::<String, _>("SELECT User.name", &(), QueryOptions::default()),
        script
    );
    assert!(result.unwrap_err().is::<NoDataError>());
    assert!(conn.is_consistent());
}

#[tokio::test]
async fn server_error_resynchronizes() {
    let (mut conn, mut mock) = established().await;
    let script = async {
        assert!(matches!(mock.recv().await, ClientMessage::ExecuteScript(_)));
        mock.send(&[
            ServerMessage::ErrorResponse(ErrorResponse {
                severity: ErrorSeverity::Error,
                code: 0x04030000,
                message: "object type does not exist".into(),
                attributes: HashMap::new(),
            }),
            MockServer::ready(),
        ])
        .await;
    };
    let (result, ()) = tokio::join!(conn.execute_script("SELECT Missing;"), script);
    let err = result.unwrap_err();
    assert!(err.is::<InvalidReferenceError>());

    // the connection stays usable after the error
    assert!(conn.is_consistent());
    let script = async {
        assert!(matches!(mock.recv().await, ClientMessage::ExecuteScript(_)));
        mock.send(&[MockServer::complete("SELECT"), MockServer::ready()])
            .await;
    };
    let (result, ()) = tokio::join!(conn.execute_script("SELECT 1;"), script);
    assert_eq!(result.unwrap(), "SELECT");
}

#[tokio::test]
async fn eof_marks_connection_unusable() {
    let (mut conn, mock) = established().await;
    drop(mock);
    let result = conn
        .execute_script("SELECT 1;")
        .await
        .expect_err("closed connection");
    assert!(result.is::<ClientConnectionError>());
    assert!(!conn.is_consistent());

    let result = conn.execute_script("SELECT 1;").await.unwrap_err();
    assert!(result.is::<ClientConnectionError>());
}

#[tokio::test]
async fn scram_authentication() {
    type HmacSha256 = Hmac<Sha256>;
    fn mac(key: &[u8], data: &[u8]) -> [u8; 32] {
        let mut mac = HmacSha256::new_from_slice(key).unwrap();
        mac.update(data);
        mac.finalize().into_bytes().into()
    }
    fn hi(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
        let mut salted = salt.to_vec();
        salted.extend_from_slice(&1u32.to_be_bytes());
        let mut block = mac(password, &salted);
        let mut result = block;
        for _ in 1..iterations {
            block = mac(password, &block);
            for (r, b) in result.iter_mut().zip(block.iter()) {
                *r ^= b;
            }
        }
        result
    }

    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    let (client, server) = tokio::io::duplex(1 << 16);
    let mut mock = MockServer::new(server);
    let config = test_config().with_password("secret");

    let script = async {
        assert!(matches!(
            mock.recv().await,
            ClientMessage::ClientHandshake(_)
        ));
        mock.send(&[ServerMessage::Authentication(Authentication::Sasl {
            methods: vec!["SCRAM-SHA-256".into()],
        })])
        .await;

        let initial = match mock.recv().await {
            ClientMessage::AuthenticationSaslInitialResponse(initial) => initial,
            other => panic!("expected SASL initial response, got {other:?}"),
        };
        assert_eq!(initial.method, "SCRAM-SHA-256");
        let client_first = std::str::from_utf8(&initial.data).unwrap();
        let client_first_bare = client_first.strip_prefix("n,,").unwrap().to_owned();
        let client_nonce = client_first_bare.split_once(",r=").unwrap().1.to_owned();

        let salt = b"0123456789abcdef";
        let iterations = 512;
        let server_nonce = format!("{client_nonce}serverpart");
        let server_first = format!(
            "r={server_nonce},s={},i={iterations}",
            BASE64.encode(salt)
        );
        mock.send(&[ServerMessage::Authentication(Authentication::SaslContinue {
            data: Bytes::from(server_first.clone()),
        })])
        .await;

        let response = match mock.recv().await {
            ClientMessage::AuthenticationSaslResponse(response) => response,
            other => panic!("expected SASL response, got {other:?}"),
        };
        let client_final = std::str::from_utf8(&response.data).unwrap();
        let (client_final_bare, proof_b64) = client_final.rsplit_once(",p=").unwrap();
        assert_eq!(
            client_final_bare,
            format!("c=biws,r={server_nonce}")
        );

        // verify the client proof against the known password
        let salted = hi(b"secret", salt, iterations);
        let client_key = mac(&salted, b"Client Key");
        let stored_key = Sha256::digest(client_key);
        let auth_message =
            format!("{client_first_bare},{server_first},{client_final_bare}");
        let signature = mac(&stored_key, auth_message.as_bytes());
        let proof: Vec<u8> = BASE64.decode(proof_b64).unwrap();
        let expected: Vec<u8> = client_key
            .iter()
            .zip(signature.iter())
            .map(|(a, b)| a ^ b)
            .collect();
        assert_eq!(proof, expected, "client proof mismatch");

        let server_key = mac(&salted, b"Server Key");
        let server_signature = mac(&server_key, auth_message.as_bytes());
        mock.send(&[ServerMessage::Authentication(Authentication::SaslFinal {
            data: Bytes::from(format!("v={}", BASE64.encode(server_signature))),
        })])
        .await;
        mock.send(&[
            ServerMessage::Authentication(Authentication::Ok),
            MockServer::ready(),
        ])
        .await;
    };
    let (conn, ()) = tokio::join!(Connection::handshake(client, &config), script);
    assert!(conn.unwrap().is_consistent());
}

#[tokio::test]
async fn unsupported_auth_method_fails() {
    let (client, server) = tokio::io::duplex(1 << 16);
    let mut mock = MockServer::new(server);
    let script = async {
        assert!(matches!(
            mock.recv().await,
            ClientMessage::ClientHandshake(_)
        ));
        mock.send(&[ServerMessage::Authentication(Authentication::Sasl {
            methods: vec!["EXTERNAL".into()],
        })])
        .await;
    };
    let config = test_config().with_password("secret");
    let (conn, ()) = tokio::join!(
        Connection::handshake(client, &config),
        script
    );
    assert!(conn.unwrap_err().is::<AuthenticationError>());
}
