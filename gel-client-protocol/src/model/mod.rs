/*!
Value types of the data model, with their binary layout contracts.

Only the wire representation is authoritative here; richer calendar and
arithmetic behavior is delegated to `chrono`/`num-bigint`/`bigdecimal`
behind the corresponding cargo features.
*/

mod bigint;
mod json;
mod memory;
pub mod range;
mod time;

pub use bigint::{BigInt, Decimal};
pub use json::Json;
pub use memory::ConfigMemory;
pub use range::Range;
pub use time::{
    DateDuration, Datetime, Duration, LocalDate, LocalDatetime, LocalTime, RelativeDuration,
};

pub use uuid::Uuid;

/// Error converting to or from a model type when the value does not fit
/// the wire representation.
#[derive(Debug, PartialEq, derive_more::Display, derive_more::Error)]
#[display("value is out of range")]
pub struct OutOfRangeError;

impl From<std::num::TryFromIntError> for OutOfRangeError {
    fn from(_: std::num::TryFromIntError) -> OutOfRangeError {
        OutOfRangeError
    }
}
