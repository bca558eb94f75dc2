//! Out-of-band data attached to messages via headers.

use bytes::Bytes;

use gel_client_errors::{Error, ErrorKind, ProtocolEncodingError};

use crate::encoding::KeyValues;

/// Header carrying the log/warning severity on a `LogMessage`-style
/// attachment.
pub const HEADER_WARNINGS: u16 = 0x1002;

/// A non-fatal warning issued by the server for a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub message: String,
    pub code: Option<u64>,
}

/// Extract warnings from a message's headers, if the server attached
/// any.
pub fn decode_warnings(headers: &KeyValues) -> Result<Vec<Warning>, Error> {
    match headers.get(&HEADER_WARNINGS) {
        Some(raw) => parse_warnings(raw),
        None => Ok(Vec::new()),
    }
}

fn parse_warnings(raw: &Bytes) -> Result<Vec<Warning>, Error> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| ProtocolEncodingError::with_source(e).context("invalid warning header"))?;
    // one warning per line, optionally prefixed with a numeric code
    Ok(text
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once(':') {
            Some((code, rest)) if code.chars().all(|c| c.is_ascii_digit()) => Warning {
                message: rest.trim_start().to_string(),
                code: code.parse().ok(),
            },
            _ => Warning {
                message: line.to_string(),
                code: None,
            },
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_parse() {
        let headers = KeyValues::new();
        assert_eq!(decode_warnings(&headers).unwrap(), Vec::new());

        let mut headers = KeyValues::new();
        headers.insert(
            HEADER_WARNINGS,
            Bytes::from_static(b"16777216: implicit limit applied\nplain warning"),
        );
        let warnings = decode_warnings(&headers).unwrap();
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].code, Some(16777216));
        assert_eq!(warnings[0].message, "implicit limit applied");
        assert_eq!(warnings[1].code, None);
    }
}
