//! Session-scoped settings reported by the server via
//! `ParameterStatus` messages.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use bytes::Bytes;

use gel_client_protocol::server_message::ParameterStatus;
use gel_client_protocol::value::Value;

/// Values extracted from the `system_config` parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemConfig {
    pub session_idle_timeout: Option<Duration>,
}

#[derive(Debug, Default)]
struct Inner {
    suggested_pool_concurrency: Option<usize>,
    system_config: SystemConfig,
    raw: HashMap<String, Bytes>,
}

/// A read-mostly map of session settings.
///
/// Reads take a shared lock and may run concurrently from any number of
/// tasks; the writer (the connection's message loop) takes the lock
/// exclusively per update.
#[derive(Debug, Default)]
pub struct ServerParams {
    inner: RwLock<Inner>,
}

impl ServerParams {
    pub fn suggested_pool_concurrency(&self) -> Option<usize> {
        self.inner.read().expect("params lock").suggested_pool_concurrency
    }
    pub fn session_idle_timeout(&self) -> Option<Duration> {
        self.inner
            .read()
            .expect("params lock")
            .system_config
            .session_idle_timeout
    }
    /// The stored raw value of a parameter the client does not
    /// interpret.
    pub fn raw(&self, name: &str) -> Option<Bytes> {
        self.inner.read().expect("params lock").raw.get(name).cloned()
    }

    /// Apply one `ParameterStatus` message.
    ///
    /// Unknown keys are accepted and stored raw; parse failures of
    /// known keys are logged and otherwise ignored, since settings are
    /// advisory.
    pub(crate) fn set(&self, status: ParameterStatus) {
        let name = String::from_utf8_lossy(&status.name).into_owned();
        match &name[..] {
            "suggested_pool_concurrency" => {
                let parsed = std::str::from_utf8(&status.value)
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok());
                match parsed {
                    Some(value) => {
                        self.inner.write().expect("params lock").suggested_pool_concurrency =
                            Some(value);
                    }
                    None => log::warn!("unparsable suggested_pool_concurrency setting"),
                }
            }
            "system_config" => match decode_system_config(status) {
                Ok(config) => {
                    self.inner.write().expect("params lock").system_config = config;
                }
                Err(e) => log::warn!("cannot decode system_config: {e:#}"),
            },
            _ => {
                self.inner
                    .write()
                    .expect("params lock")
                    .raw
                    .insert(name, status.value);
            }
        }
    }
}

/// Decode `system_config` with a one-shot codec built for the type the
/// server described inline.
fn decode_system_config(status: ParameterStatus) -> Result<SystemConfig, gel_client_errors::Error> {
    use gel_client_errors::{ErrorKind, ProtocolEncodingError};

    let (typedesc, data) = status
        .parse_system_config()
        .map_err(ProtocolEncodingError::with_source)?;
    let codec = typedesc
        .build_codec()
        .map_err(ProtocolEncodingError::with_source)?;
    let value = codec
        .decode(&data)
        .map_err(ProtocolEncodingError::with_source)?;

    let mut config = SystemConfig::default();
    if let Value::Object { shape, fields } = value {
        for (element, field) in shape.elements().iter().zip(fields) {
            if element.name == "session_idle_timeout" {
                match field {
                    Some(Value::Duration(timeout)) if !timeout.is_negative() => {
                        config.session_idle_timeout =
                            Some(Duration::from_micros(timeout.micros() as u64));
                    }
                    Some(other) => {
                        log::warn!("unexpected session_idle_timeout value {other:?}");
                    }
                    None => {}
                }
            }
        }
    } else {
        log::warn!("system_config is not an object: {value:?}");
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_are_kept_raw() {
        use gel_client_protocol::features::ProtocolVersion;
        let params = ServerParams::default();
        params.set(ParameterStatus {
            proto: ProtocolVersion::current(),
            name: Bytes::from_static(b"pgaddr"),
            value: Bytes::from_static(b"/run/pg.sock"),
        });
        assert_eq!(params.raw("pgaddr"), Some(Bytes::from_static(b"/run/pg.sock")));
        assert_eq!(params.raw("other"), None);
    }

    #[test]
    fn pool_concurrency_parses() {
        use gel_client_protocol::features::ProtocolVersion;
        let params = ServerParams::default();
        params.set(ParameterStatus {
            proto: ProtocolVersion::current(),
            name: Bytes::from_static(b"suggested_pool_concurrency"),
            value: Bytes::from_static(b"24"),
        });
        assert_eq!(params.suggested_pool_concurrency(), Some(24));
    }
}
