/*!
The raw connection: framing, handshake, authentication and the
prepare/execute state machine over any byte stream.
*/

mod connection;
mod queries;
mod scram;

use gel_client_protocol::annotations::Warning;

pub use connection::Connection;
pub use queries::Guard;

/// Outcome of one executed command.
#[derive(Debug)]
pub struct Response<T> {
    pub status: String,
    pub warnings: Vec<Warning>,
    pub data: T,
}

impl<T> Response<T> {
    pub(crate) fn new(status: String, data: T) -> Response<T> {
        Response {
            status,
            warnings: Vec::new(),
            data,
        }
    }
    pub fn map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Response<U>, E> {
        let Response {
            status,
            warnings,
            data,
        } = self;
        Ok(Response {
            status,
            warnings,
            data: f(data)?,
        })
    }
    pub fn log_warnings(&self) {
        for warning in &self.warnings {
            log::warn!("server warning: {}", warning.message);
        }
    }
}
