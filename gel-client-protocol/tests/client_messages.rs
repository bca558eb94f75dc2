use std::collections::HashMap;
use std::error::Error;

use bytes::{Bytes, BytesMut};
use uuid::Uuid;

use gel_client_protocol::client_message::{Cardinality, IoFormat, Prepare};
use gel_client_protocol::client_message::{ClientHandshake, ClientMessage};
use gel_client_protocol::client_message::{DescribeStatement, Execute, OptimisticExecute};
use gel_client_protocol::client_message::{SaslInitialResponse, SaslResponse};
use gel_client_protocol::common::DescribeAspect;
use gel_client_protocol::encoding::{Input, KeyValues, Output};
use gel_client_protocol::features::ProtocolVersion;

mod base;

macro_rules! encoding_eq_ver {
    ($major: expr, $minor: expr, $message: expr, $bytes: expr) => {
        let proto = ProtocolVersion::new($major, $minor);
        let data: &[u8] = $bytes;
        let mut bytes = BytesMut::new();
        $message.encode(&mut Output::new(&proto, &mut bytes))?;
        println!("Serialized bytes {:?}", bytes);
        let bytes = bytes.freeze();
        assert_eq!(&bytes[..], data);
        assert_eq!(
            ClientMessage::decode(&mut Input::new(proto, Bytes::copy_from_slice(data)))?,
            $message,
        );
    };
}

macro_rules! encoding_eq {
    ($message: expr, $bytes: expr) => {
        let (major, minor) = ProtocolVersion::current().version_tuple();
        encoding_eq_ver!(major, minor, $message, $bytes);
    };
}

#[test]
fn client_handshake() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ClientMessage::ClientHandshake(ClientHandshake {
            major_ver: 1,
            minor_ver: 0,
            params: HashMap::new(),
            extensions: HashMap::new(),
        }),
        b"\x56\x00\x00\x00\x0C\x00\x01\x00\x00\x00\x00\x00\x00"
    );
    encoding_eq!(
        ClientMessage::ClientHandshake(ClientHandshake {
            major_ver: 1,
            minor_ver: 0,
            params: HashMap::from([(String::from("user"), String::from("edgedb"))]),
            extensions: HashMap::new(),
        }),
        bconcat!(b"\x56\x00\x00\x00\x1E\x00\x01\x00\x00\x00\x01"
                 b"\x00\x00\x00\x04user\x00\x00\x00\x06edgedb\x00\x00")
    );
    Ok(())
}

#[test]
fn prepare() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ClientMessage::Prepare(Prepare {
            headers: KeyValues::new(),
            io_format: IoFormat::Binary,
            expected_cardinality: Cardinality::Many,
            statement_name: Bytes::from(""),
            command_text: String::from("SELECT 1;"),
        }),
        b"P\0\0\0\x19\0\0bm\0\0\0\0\0\0\0\tSELECT 1;"
    );
    encoding_eq!(
        ClientMessage::Prepare(Prepare {
            headers: KeyValues::from([(
                0xFF04,
                Bytes::from_static(b"\x00\x00\x00\x00\x00\x00\x00\x1f")
            )]),
            io_format: IoFormat::Binary,
            expected_cardinality: Cardinality::One,
            statement_name: Bytes::from(""),
            command_text: String::from("SELECT 7;"),
        }),
        bconcat!(b"P\0\0\0\x27\0\x01\xff\x04\0\0\0\x08\0\0\0\0\0\0\0\x1f"
                 b"bo\0\0\0\0\0\0\0\tSELECT 7;")
    );
    Ok(())
}

#[test]
fn describe_statement() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ClientMessage::DescribeStatement(DescribeStatement {
            headers: KeyValues::new(),
            aspect: DescribeAspect::DataDescription,
            statement_name: Bytes::from(""),
        }),
        b"D\0\0\0\x0b\0\0T\0\0\0\0"
    );
    Ok(())
}

#[test]
fn execute() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ClientMessage::Execute(Execute {
            headers: KeyValues::new(),
            statement_name: Bytes::from(""),
            arguments: Bytes::new(),
        }),
        b"E\0\0\0\x0e\0\0\0\0\0\0\0\0\0\0"
    );
    Ok(())
}

#[test]
fn optimistic_execute() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ClientMessage::OptimisticExecute(OptimisticExecute {
            headers: KeyValues::new(),
            io_format: IoFormat::Binary,
            expected_cardinality: Cardinality::One,
            command_text: String::from("SELECT 7;"),
            input_typedesc_id: Uuid::from_u128(0xFF),
            output_typedesc_id: Uuid::from_u128(0x105),
            arguments: Bytes::new(),
        }),
        bconcat!(b"O\0\0\09\0\0bo\0\0\0\tSELECT 7;"
                 b"\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\xff"
                 b"\0\0\0\0\0\0\0\0\0\0\0\0\0\0\x01\x05"
                 b"\0\0\0\0")
    );
    Ok(())
}

#[test]
fn sync() -> Result<(), Box<dyn Error>> {
    encoding_eq!(ClientMessage::Sync, b"S\0\0\0\x04");
    Ok(())
}

#[test]
fn flush() -> Result<(), Box<dyn Error>> {
    encoding_eq!(ClientMessage::Flush, b"H\0\0\0\x04");
    Ok(())
}

#[test]
fn terminate() -> Result<(), Box<dyn Error>> {
    encoding_eq!(ClientMessage::Terminate, b"X\0\0\0\x04");
    Ok(())
}

#[test]
fn authentication() -> Result<(), Box<dyn Error>> {
    encoding_eq!(
        ClientMessage::AuthenticationSaslInitialResponse(SaslInitialResponse {
            method: "SCRAM-SHA-256".into(),
            data: "n,,n=tutorial,r=%NR65>7bQ2S3jzl^k$G&b1^A".into(),
        }),
        bconcat!(b"p\0\0\0A\0\0\0\rSCRAM-SHA-256"
                 b"\0\0\0(n,,n=tutorial,"
                 b"r=%NR65>7bQ2S3jzl^k$G&b1^A")
    );
    encoding_eq!(
        ClientMessage::AuthenticationSaslResponse(SaslResponse {
            data: bconcat!(b"c=biws,"
                           b"r=%NR65>7bQ2S3jzl^k$G&b1^A"
                           b"YsykYKRbp/Gli53UEElsGb4I,"
                           b"p=UNQQkuQ0m5RRy24Ovzj/"
                           b"sCevUB36WTDbGXIWbCIsJmo=")
            .clone()
            .freeze(),
        }),
        bconcat!(b"r\0\0\0p"
                 b"\0\0\0hc=biws,"
                 b"r=%NR65>7bQ2S3jzl^k$G&b1^A"
                 b"YsykYKRbp/Gli53UEElsGb4I,"
                 b"p=UNQQkuQ0m5RRy24Ovzj/"
                 b"sCevUB36WTDbGXIWbCIsJmo=")
    );
    Ok(())
}
