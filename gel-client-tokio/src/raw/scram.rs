//! Client side of SCRAM-SHA-256 (RFC 7677), without channel binding.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use gel_client_errors::{AuthenticationError, Error, ErrorKind, ProtocolEncodingError};

type HmacSha256 = Hmac<Sha256>;

const NONCE_LENGTH: usize = 18;
const GS2_HEADER: &str = "n,,";
/// base64("n,,")
const CHANNEL_BINDING: &str = "biws";

pub struct ScramClient {
    password: String,
    client_nonce: String,
    client_first_bare: String,
}

#[derive(Debug)]
pub struct ScramPending {
    salted_password: [u8; 32],
    auth_message: String,
    client_final: String,
}

impl ScramClient {
    pub fn new(user: &str, password: &str) -> ScramClient {
        let client_nonce = generate_nonce();
        let client_first_bare = format!("n={},r={}", escape_username(user), client_nonce);
        ScramClient {
            password: password.into(),
            client_nonce,
            client_first_bare,
        }
    }

    /// The `client-first-message` sent in SASLInitialResponse.
    pub fn client_first(&self) -> String {
        format!("{}{}", GS2_HEADER, self.client_first_bare)
    }

    /// Process `server-first-message`, producing the final response to
    /// send and the state needed to verify the server signature.
    pub fn handle_server_first(self, server_first: &str) -> Result<ScramPending, Error> {
        let mut nonce = None;
        let mut salt = None;
        let mut iterations = None;
        for item in server_first.split(',') {
            match item.split_once('=') {
                Some(("r", value)) => nonce = Some(value.to_string()),
                Some(("s", value)) => {
                    salt = Some(BASE64.decode(value).map_err(|_| {
                        AuthenticationError::with_message("invalid salt in SCRAM exchange")
                    })?)
                }
                Some(("i", value)) => iterations = Some(value.parse::<u32>().map_err(|_| {
                    AuthenticationError::with_message("invalid iteration count in SCRAM exchange")
                })?),
                _ => {} // extensions are ignored
            }
        }
        let (nonce, salt, iterations) = match (nonce, salt, iterations) {
            (Some(n), Some(s), Some(i)) => (n, s, i),
            _ => {
                return Err(AuthenticationError::with_message(
                    "incomplete server-first SCRAM message",
                ))
            }
        };
        if !nonce.starts_with(&self.client_nonce) {
            return Err(AuthenticationError::with_message(
                "server nonce does not extend client nonce",
            ));
        }
        if iterations < 1 {
            return Err(AuthenticationError::with_message(
                "invalid iteration count in SCRAM exchange",
            ));
        }

        let normalized = saslprep(&self.password);
        let salted_password = hi(normalized.as_bytes(), &salt, iterations);

        let client_final_bare = format!("c={CHANNEL_BINDING},r={nonce}");
        let auth_message = format!(
            "{},{},{}",
            self.client_first_bare, server_first, client_final_bare
        );

        let client_key = mac(&salted_password, b"Client Key");
        let stored_key = Sha256::digest(client_key);
        let client_signature = mac(&stored_key, auth_message.as_bytes());
        let proof: Vec<u8> = client_key
            .iter()
            .zip(client_signature.iter())
            .map(|(a, b)| a ^ b)
            .collect();

        let client_final = format!("{},p={}", client_final_bare, BASE64.encode(proof));
        Ok(ScramPending {
            salted_password,
            auth_message,
            client_final,
        })
    }
}

impl ScramPending {
    pub fn client_final(&self) -> &str {
        &self.client_final
    }

    /// Verify the `server-final-message` signature.
    pub fn handle_server_final(&self, server_final: &str) -> Result<(), Error> {
        let signature = server_final
            .split(',')
            .find_map(|item| item.strip_prefix("v="))
            .ok_or_else(|| {
                AuthenticationError::with_message("missing signature in server-final message")
            })?;
        let signature = BASE64
            .decode(signature)
            .map_err(|_| AuthenticationError::with_message("invalid server signature encoding"))?;
        let server_key = mac(&self.salted_password, b"Server Key");
        let expected = mac(&server_key, self.auth_message.as_bytes());
        if !constant_time_eq::constant_time_eq(&signature, &expected) {
            return Err(AuthenticationError::with_message(
                "server signature verification failed",
            ));
        }
        Ok(())
    }
}

fn generate_nonce() -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..NONCE_LENGTH).map(|_| rng.random()).collect();
    BASE64.encode(bytes)
}

/// Stringprep profile for SASL: normalization form KC plus mapping of
/// non-ASCII spaces. Prohibited code points are left to the server to
/// reject.
fn saslprep(password: &str) -> String {
    password
        .chars()
        .map(|c| if c.is_whitespace() && !c.is_ascii() { ' ' } else { c })
        .nfkc()
        .collect()
}

fn escape_username(user: &str) -> String {
    user.replace('=', "=3D").replace(',', "=2C")
}

fn mac(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// `Hi()` from the RFC: PBKDF2-HMAC-SHA-256.
fn hi(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut salted = salt.to_vec();
    salted.extend_from_slice(&1u32.to_be_bytes());
    let mut block = mac(password, &salted);
    let mut result = block;
    for _ in 1..iterations {
        block = mac(password, &block);
        for (r, b) in result.iter_mut().zip(block.iter()) {
            *r ^= b;
        }
    }
    result
}

pub(crate) fn decode_utf8(data: &bytes::Bytes) -> Result<&str, Error> {
    std::str::from_utf8(data)
        .map_err(|e| ProtocolEncodingError::with_source(e).context("invalid SASL message"))
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 7677 test vector
    #[test]
    fn rfc_exchange() {
        let mut client = ScramClient::new("user", "pencil");
        client.client_nonce = "rOprNGfwEbeRWgbNEkqO".into();
        client.client_first_bare = format!("n=user,r={}", client.client_nonce);
        assert_eq!(client.client_first(), "n,,n=user,r=rOprNGfwEbeRWgbNEkqO");

        let server_first = "r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,\
                            s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096";
        let pending = client.handle_server_first(server_first).unwrap();
        assert_eq!(
            pending.client_final(),
            "c=biws,r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,\
             p=dHzbZapWIk4jUhN+Ute9ytag9zjfMHgsqmmiz7AndVQ="
        );
        pending
            .handle_server_final("v=6rriTRBi23WpRR/wtup+mMhUZUn/dB5nLTJRsjl95G4=")
            .unwrap();
    }

    #[test]
    fn rejects_tampered_signature() {
        let client = ScramClient::new("user", "pencil");
        let server_first = format!(
            "r={}ext,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096",
            client.client_nonce
        );
        let pending = client.handle_server_first(&server_first).unwrap();
        assert!(pending
            .handle_server_final("v=AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=")
            .is_err());
    }

    #[test]
    fn rejects_foreign_nonce() {
        let client = ScramClient::new("user", "pencil");
        let err = client
            .handle_server_first("r=somebodyelse,s=AAAA,i=4096")
            .unwrap_err();
        assert!(err.is::<AuthenticationError>());
    }
}
