use std::collections::HashMap;
use std::error::Error;

use bytes::{Bytes, BytesMut};
use uuid::Uuid;

use gel_client_errors::InvalidReferenceError;
use gel_client_protocol::common::{Capabilities, Cardinality, RawTypedesc};
use gel_client_protocol::encoding::{Input, KeyValues, Output};
use gel_client_protocol::features::ProtocolVersion;
use gel_client_protocol::server_message::{
    Authentication, CommandComplete, CommandDataDescription, Data, ErrorResponse, ErrorSeverity,
    PrepareComplete, ReadyForCommand, ServerKeyData, ServerMessage, TransactionState,
};

mod base;

macro_rules! encoding_eq {
    ($message: expr, $bytes: expr) => {
        let proto = ProtocolVersion::current();
        let data: &[u8] = $bytes;
        let mut bytes = BytesMut::new();
        $message.encode(&mut Output::new(&proto, &mut bytes))?;
        println!("Serialized bytes {:?}", bytes);
        let bytes = bytes.freeze();
        assert_eq!(&bytes[..], data);
        assert_eq!(
            ServerMessage::decode(&mut Input::new(proto, Bytes::copy_from_slice(data)))?,
            $message,
        );
    };
}

#[test]
fn ready_for_command() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ServerMessage::ReadyForCommand(ReadyForCommand {
            headers: KeyValues::new(),
            transaction_state: TransactionState::NotInTransaction,
        }),
        b"Z\0\0\0\x07\0\0I"
    );
    encoding_eq!(
        ServerMessage::ReadyForCommand(ReadyForCommand {
            headers: KeyValues::new(),
            transaction_state: TransactionState::InFailedTransaction,
        }),
        b"Z\0\0\0\x07\0\0E"
    );
    Ok(())
}

#[test]
fn authentication() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ServerMessage::Authentication(Authentication::Ok),
        b"R\0\0\0\x08\0\0\0\0"
    );
    encoding_eq!(
        ServerMessage::Authentication(Authentication::Sasl {
            methods: vec!["SCRAM-SHA-256".into()],
        }),
        b"R\0\0\0\x1d\0\0\0\x0a\0\0\0\x01\0\0\0\rSCRAM-SHA-256"
    );
    Ok(())
}

#[test]
fn server_key_data() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ServerMessage::ServerKeyData(ServerKeyData { data: [0u8; 32] }),
        bconcat!(b"K\0\0\0\x24"
                 b"\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0"
                 b"\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0")
    );
    Ok(())
}

#[test]
fn prepare_complete() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ServerMessage::PrepareComplete(PrepareComplete {
            headers: KeyValues::new(),
            cardinality: Cardinality::One,
            input_typedesc_id: Uuid::from_u128(0),
            output_typedesc_id: Uuid::from_u128(0),
        }),
        bconcat!(b"1\0\0\0\x27\0\0o"
                 b"\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0"
                 b"\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0")
    );
    Ok(())
}

#[test]
fn capabilities_header() -> Result<(), Box<dyn Error>> {
    let complete = PrepareComplete {
        headers: KeyValues::from([(
            0x1001,
            Bytes::from_static(b"\x00\x00\x00\x00\x00\x00\x00\x04"),
        )]),
        cardinality: Cardinality::Many,
        input_typedesc_id: Uuid::from_u128(0),
        output_typedesc_id: Uuid::from_u128(0),
    };
    assert_eq!(complete.get_capabilities(), Some(Capabilities::TRANSACTION));

    let complete = PrepareComplete {
        headers: KeyValues::new(),
        ..complete
    };
    assert_eq!(complete.get_capabilities(), None);
    Ok(())
}

#[test]
fn command_data_description() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ServerMessage::CommandDataDescription(CommandDataDescription {
            headers: KeyValues::new(),
            result_cardinality: Cardinality::Many,
            input: RawTypedesc {
                proto: ProtocolVersion::current(),
                id: Uuid::from_u128(0xFF),
                data: Bytes::from_static(b"\x04\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\xff\0\0"),
            },
            output: RawTypedesc {
                proto: ProtocolVersion::current(),
                id: Uuid::from_u128(0x105),
                data: Bytes::from_static(b"\x02\0\0\0\0\0\0\0\0\0\0\0\0\0\0\x01\x05"),
            },
        }),
        bconcat!(b"T\0\0\0\x53\0\0m"
                 b"\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\xff"
                 b"\0\0\0\x13\x04\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\xff\0\0"
                 b"\0\0\0\0\0\0\0\0\0\0\0\0\0\0\x01\x05"
                 b"\0\0\0\x11\x02\0\0\0\0\0\0\0\0\0\0\0\0\0\0\x01\x05")
    );
    Ok(())
}

#[test]
fn data() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ServerMessage::Data(Data {
            data: vec![Bytes::from_static(b"\0\0\0\x07")],
        }),
        b"D\0\0\0\x0e\0\x01\0\0\0\x04\0\0\0\x07"
    );
    Ok(())
}

#[test]
fn command_complete() -> Result<(), Box<dyn Error>> {
    let msg = CommandComplete {
        headers: KeyValues::new(),
        status_data: Bytes::from_static(b"CREATE DATABASE"),
    };
    assert_eq!(msg.status()?, "CREATE DATABASE");
    encoding_eq!(
        ServerMessage::CommandComplete(msg.clone()),
        b"C\0\0\0\x19\0\0\0\0\0\x0fCREATE DATABASE"
    );
    Ok(())
}

#[test]
fn error_response() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ServerMessage::ErrorResponse(ErrorResponse {
            severity: ErrorSeverity::Error,
            code: 0x04030000,
            message: "test".into(),
            attributes: HashMap::new(),
        }),
        b"E\0\0\0\x13\x78\x04\x03\0\0\0\0\0\x04test\0\0"
    );
    Ok(())
}

#[test]
fn error_response_to_error() {
    let err: gel_client_errors::Error = ErrorResponse {
        severity: ErrorSeverity::Error,
        code: 0x04030000,
        message: "name does not exist".into(),
        attributes: HashMap::new(),
    }
    .into();
    assert!(err.is::<InvalidReferenceError>());
    assert_eq!(err.kind_name(), "InvalidReferenceError");
    assert_eq!(err.initial_message(), Some("name does not exist"));
}
