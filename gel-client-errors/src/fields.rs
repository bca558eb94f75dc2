//! Typed out-of-band data attached to an [`Error`](crate::Error).

mod seal {
    pub trait Sealed {}
}

pub use seal::Sealed as FieldName;

/// A typed slot that can be attached to an error with
/// [`Error::set`](crate::Error::set).
pub trait Field: seal::Sealed {
    const NAME: &'static str;
    type Value: Send + Sync + 'static;
}

/// The query text the failing request was compiled from.
pub struct QueryText;

impl seal::Sealed for QueryText {}
impl Field for QueryText {
    const NAME: &'static str = "query_text";
    type Value = String;
}

/// Traceback string reported by the server, if any.
pub struct ServerTraceback;

impl seal::Sealed for ServerTraceback {}
impl Field for ServerTraceback {
    const NAME: &'static str = "server_traceback";
    type Value = String;
}
