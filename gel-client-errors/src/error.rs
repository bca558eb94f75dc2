use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::str;

use bytes::Bytes;

use crate::fields::Field;
use crate::kinds::{error_name, tag_check};
use crate::traits::{ErrorKind, Sealed};

/// Header code carrying the server-side traceback, when enabled.
const FIELD_SERVER_TRACEBACK: u16 = 0x0101;

// Upcoming in the protocol, not yet documented on the errors page.
const FIELD_POSITION_START: u16 = 0xFFF1;
const FIELD_POSITION_END: u16 = 0xFFF2;
const FIELD_LINE: u16 = 0xFFF3;
const FIELD_COLUMN: u16 = 0xFFF4;

/// Error object returned by all client methods.
///
/// Testing for a concrete kind or a category is done with
/// [`Error::is`]; retriability hints with [`Error::has_tag`].
pub struct Error(pub(crate) Box<Inner>);

/// A marker bit attached to a family of error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub(crate) bit: u32,
}

pub(crate) struct Inner {
    pub code: u32,
    pub messages: Vec<Cow<'static, str>>,
    pub error: Option<Box<dyn StdError + Send + Sync + 'static>>,
    pub headers: HashMap<u16, Bytes>,
    pub fields: HashMap<(&'static str, TypeId), Box<dyn Any + Send + Sync>>,
}

impl Error {
    pub fn is<T: ErrorKind>(&self) -> bool {
        T::is_superclass_of(self.0.code)
    }
    pub fn has_tag(&self, tag: Tag) -> bool {
        tag_check(self.0.code, tag.bit)
    }
    pub fn context<S: Into<Cow<'static, str>>>(mut self, msg: S) -> Error {
        self.0.messages.push(msg.into());
        self
    }
    pub fn code(&self) -> u32 {
        self.0.code
    }
    pub fn kind_name(&self) -> &'static str {
        error_name(self.0.code)
    }
    /// The message this error was originally constructed with, before
    /// any `context` wrapping.
    pub fn initial_message(&self) -> Option<&str> {
        self.0.messages.first().map(|m| &m[..])
    }
    pub fn headers(&self) -> &HashMap<u16, Bytes> {
        &self.0.headers
    }
    pub fn with_headers(mut self, headers: HashMap<u16, Bytes>) -> Error {
        self.0.headers = headers;
        self
    }
    pub fn server_traceback(&self) -> Option<&str> {
        self.0
            .headers
            .get(&FIELD_SERVER_TRACEBACK)
            .and_then(|x| str::from_utf8(x).ok())
    }
    pub fn position_start(&self) -> Option<usize> {
        self.usize_header(FIELD_POSITION_START)
    }
    pub fn position_end(&self) -> Option<usize> {
        self.usize_header(FIELD_POSITION_END)
    }
    pub fn line(&self) -> Option<usize> {
        self.usize_header(FIELD_LINE)
    }
    pub fn column(&self) -> Option<usize> {
        self.usize_header(FIELD_COLUMN)
    }
    fn usize_header(&self, name: u16) -> Option<usize> {
        self.0
            .headers
            .get(&name)
            .and_then(|x| str::from_utf8(x).ok())
            .and_then(|x| x.parse().ok())
    }
    /// Attach a typed field to the error.
    pub fn set<F: Field>(mut self, value: impl Into<F::Value>) -> Error {
        self.0
            .fields
            .insert((F::NAME, TypeId::of::<F::Value>()), Box::new(value.into()));
        self
    }
    pub fn get<F: Field>(&self) -> Option<&F::Value> {
        self.0
            .fields
            .get(&(F::NAME, TypeId::of::<F::Value>()))
            .and_then(|bx| bx.downcast_ref())
    }
    /// Construct an error directly from a wire code, as received in an
    /// `ErrorResponse`.
    pub fn from_code(code: u32) -> Error {
        Error(Box::new(Inner {
            code,
            messages: Vec::new(),
            error: None,
            headers: HashMap::new(),
            fields: HashMap::new(),
        }))
    }
    /// Narrow an error's code to `T` if it currently belongs to one of
    /// `T`'s ancestor categories, keeping messages and headers.
    pub fn refine_kind<T: ErrorKind>(mut self) -> Error {
        debug_assert!(Self::is_compatible::<T>(self.0.code));
        self.0.code = T::CODE;
        self
    }
    fn is_compatible<T: Sealed>(code: u32) -> bool {
        T::CODE & code == code
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind_name())?;
        let mut colon = false;
        for msg in self.0.messages.iter().rev() {
            write!(f, "{} {}", if colon { "," } else { ":" }, msg)?;
            colon = true;
        }
        if let Some(src) = &self.0.error {
            write!(f, "{} {}", if colon { "," } else { ":" }, src)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Error({:#x}: {})", self.0.code, self)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.error.as_ref().map(|b| &**b as &dyn StdError)
    }
}
