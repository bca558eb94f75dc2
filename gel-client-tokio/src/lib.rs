/*!
Single-connection Gel client core for tokio.

This crate drives one connection through its whole life cycle: the
handshake with protocol version negotiation, SCRAM-SHA-256
authentication, the prepare/describe/execute flow with its optimistic
fast path, cardinality policing, and error resynchronization.

DSN parsing, TLS, pooling and the high-level query API live in other
crates; this one consumes ready-made [Config] values and arbitrary
`AsyncRead + AsyncWrite` streams.

```rust,no_run
# async fn example() -> Result<(), gel_client_errors::Error> {
use gel_client_tokio::{Config, Connection};

let config = Config::new("localhost", 5656, "edgedb", "edgedb");
let mut conn = Connection::connect(&config).await?;
let names: Vec<String> = conn
    .query("SELECT sys::Database.name", &(), Default::default())
    .await?
    .data;
# Ok(())
# }
```
*/

mod builder;
pub mod raw;
mod server_params;

pub use builder::{Config, RetryOptions};
pub use gel_client_errors::Error;
pub use raw::{Connection, Response};
pub use server_params::{ServerParams, SystemConfig};

#[cfg(feature = "derive")]
pub use gel_client_derive::Queryable;

/// Options applied to every query of a connection unless overridden.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub allow_capabilities: gel_client_protocol::common::Capabilities,
    pub io_format: gel_client_protocol::common::IoFormat,
    pub implicit_limit: Option<u64>,
}

impl Default for QueryOptions {
    fn default() -> QueryOptions {
        QueryOptions {
            allow_capabilities: gel_client_protocol::common::Capabilities::ALL,
            io_format: gel_client_protocol::common::IoFormat::Binary,
            implicit_limit: None,
        }
    }
}
