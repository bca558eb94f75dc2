use std::borrow::Cow;
use std::collections::HashMap;
use std::error::Error as StdError;

use crate::error::{Error, Inner};

pub trait Sealed {
    const CODE: u32;
    const NAME: &'static str;
    const TAGS: u32;

    /// True if `code` belongs to this kind or any of its subcategories.
    ///
    /// The server's error codes form a hierarchy on byte prefixes: the
    /// trailing zero bytes of a category code are wildcards.
    fn is_superclass_of(code: u32) -> bool {
        let mask = if Self::CODE & 0x00_FF_FF_FF == 0 {
            0xFF_00_00_00
        } else if Self::CODE & 0x00_00_FF_FF == 0 {
            0xFF_FF_00_00
        } else if Self::CODE & 0x00_00_00_FF == 0 {
            0xFF_FF_FF_00
        } else {
            0xFF_FF_FF_FF
        };
        code & mask == Self::CODE
    }
}

pub trait ErrorKind: Sealed {
    fn build() -> Error {
        Error(Box::new(Inner {
            code: Self::CODE,
            messages: Vec::new(),
            error: None,
            headers: HashMap::new(),
            fields: HashMap::new(),
        }))
    }
    fn with_message<S: Into<Cow<'static, str>>>(message: S) -> Error {
        let mut err = Self::build();
        err.0.messages.push(message.into());
        err
    }
    fn with_source<E: StdError + Send + Sync + 'static>(source: E) -> Error {
        let mut err = Self::build();
        err.0.error = Some(Box::new(source));
        err
    }
    fn with_source_box(source: Box<dyn StdError + Send + Sync + 'static>) -> Error {
        let mut err = Self::build();
        err.0.error = Some(source);
        err
    }
}

/// Convenience conversions mirroring `Error::context`.
pub trait ResultExt<T> {
    fn context<S: Into<Cow<'static, str>>>(self, message: S) -> Result<T, Error>;
}

impl<T> ResultExt<T> for Result<T, Error> {
    fn context<S: Into<Cow<'static, str>>>(self, message: S) -> Result<T, Error> {
        self.map_err(|e| e.context(message))
    }
}
