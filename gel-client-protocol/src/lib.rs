/*!
Low-level protocol implementation for the Gel database client core.
For applications, use the `gel-client-tokio` crate.

This crate contains:

* The [ClientMessage](crate::client_message::ClientMessage) and
  [ServerMessage](crate::server_message::ServerMessage) enums with their
  binary encodings;
* The type-descriptor parser ([descriptors](crate::descriptors));
* The codec set compiled from descriptors ([codec](crate::codec)) and the
  dynamic [Value](crate::value::Value) it produces;
* Typed decoding into user types via
  [Queryable](crate::queryable::Queryable) and
  [QueryResult](crate::query_result::QueryResult);
* Query argument encoding via [QueryArgs](crate::query_arg::QueryArgs);
* The binary layout contracts of the scalar model types
  ([model](crate::model)).
*/

pub mod annotations;
pub mod client_message;
pub mod codec;
pub mod common;
pub mod descriptors;
pub mod encoding;
pub mod errors;
pub mod features;
pub mod model;
pub mod query_arg;
pub mod query_result;
pub mod queryable;
pub mod serialization;
pub mod server_message;
pub mod value;

pub use query_result::QueryResult;
