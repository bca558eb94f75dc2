pub mod raw_scalar;

#[cfg(feature = "with-chrono")]
mod chrono;

pub use raw_scalar::RawCodec;
