pub mod decode;

pub use decode::raw_scalar::RawCodec;
