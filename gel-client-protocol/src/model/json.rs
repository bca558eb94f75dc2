use std::fmt;
use std::ops::Deref;

/// A string that is known to contain valid JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Json(String);

impl Json {
    /// Wrap a string without checking that it is valid JSON.
    ///
    /// The caller is responsible for validity; the server rejects
    /// malformed documents.
    pub fn new_unchecked(value: String) -> Json {
        Json(value)
    }
}

#[cfg(feature = "with-serde")]
impl Json {
    pub fn from_serialize<T: serde::Serialize>(value: &T) -> Result<Json, serde_json::Error> {
        Ok(Json(serde_json::to_string(value)?))
    }
}

impl Deref for Json {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Json {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Json> for String {
    fn from(value: Json) -> String {
        value.0
    }
}

impl fmt::Display for Json {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}
