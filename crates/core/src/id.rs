//! Session identifier codec.
//!
//! A session id is the hex encoding of an encrypted plaintext of five
//! `-`-joined hex fields:
//!
//! ```text
//! <owner node>-<client host bytes>-<unix seconds>-<scaled micros>-<random u32>
//! ```
//!
//! The owning node is always the first field, so any node holding the key
//! can route a request without asking anyone.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::cipher::{Aes128Ecb, IdCipher};
use crate::error::{Error, Result};

/// Number of fields in a decrypted identifier.
const ID_FIELDS: usize = 5;

/// Sub-second precision is stored as a fraction of this base.
const MICRO_SCALE: u64 = 65_536;

/// An opaque, hex-encoded session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// Fields recovered from a session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDetail {
    /// Node that owns the session
    pub node_id: u32,
    /// Client address the session was minted for
    pub client_host: String,
    /// Creation time, whole seconds
    pub created_secs: u64,
    /// Creation time, sub-second part in microseconds (approximate)
    pub created_micros: u32,
}

impl SessionDetail {
    /// Returns the creation timestamp.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.created_secs).ok()?;
        Utc.timestamp_opt(secs, self.created_micros * 1_000).single()
    }
}

/// Encodes and decodes session identifiers.
#[derive(Clone)]
pub struct IdCodec {
    cipher: Arc<dyn IdCipher>,
}

impl IdCodec {
    pub fn new(cipher: Arc<dyn IdCipher>) -> Self {
        Self { cipher }
    }

    /// Creates a codec using the default AES cipher keyed by `secret`.
    pub fn from_secret(secret: &str) -> Self {
        Self::new(Arc::new(Aes128Ecb::new(secret.as_bytes())))
    }

    /// Mints a new identifier owned by `node_id` for a client at `client_host`.
    pub fn generate(&self, node_id: u32, client_host: &str) -> SessionId {
        let now = Utc::now();
        let secs = now.timestamp().max(0) as u64;
        let scaled = u64::from(now.timestamp_subsec_micros()) * MICRO_SCALE / 1_000_000;
        let nonce: u32 = rand::random();

        let plaintext = format!(
            "{:04x}-{}-{:08x}-{:04x}-{:08x}",
            node_id,
            hex::encode(client_host.as_bytes()),
            secs,
            scaled,
            nonce
        );

        SessionId(hex::encode(self.cipher.encrypt(plaintext.as_bytes())))
    }

    /// Recovers the fields of an identifier.
    ///
    /// Fails with [`Error::InvalidIdentifier`] unless every field parses;
    /// a partially decoded tuple is never returned.
    pub fn decode(&self, id: &str) -> Result<SessionDetail> {
        let ciphertext =
            hex::decode(id).map_err(|e| Error::invalid_identifier(format!("not hex: {e}")))?;
        let plaintext = self.cipher.decrypt(&ciphertext)?;
        let plaintext = String::from_utf8(plaintext)
            .map_err(|_| Error::invalid_identifier("plaintext is not utf-8"))?;

        let fields: Vec<&str> = plaintext.split('-').collect();
        if fields.len() != ID_FIELDS {
            return Err(Error::invalid_identifier(format!(
                "expected {} fields, found {}",
                ID_FIELDS,
                fields.len()
            )));
        }

        let node_id = parse_hex_u64(fields[0], "node")?;
        let node_id = u32::try_from(node_id)
            .map_err(|_| Error::invalid_identifier("node id out of range"))?;
        let host_bytes = hex::decode(fields[1])
            .map_err(|_| Error::invalid_identifier("client host is not hex"))?;
        let client_host = String::from_utf8(host_bytes)
            .map_err(|_| Error::invalid_identifier("client host is not utf-8"))?;
        let created_secs = parse_hex_u64(fields[2], "seconds")?;
        let scaled = parse_hex_u64(fields[3], "micros")?;
        if scaled >= MICRO_SCALE {
            return Err(Error::invalid_identifier("micros out of range"));
        }
        parse_hex_u64(fields[4], "nonce")?;

        Ok(SessionDetail {
            node_id,
            client_host,
            created_secs,
            created_micros: (scaled * 1_000_000 / MICRO_SCALE) as u32,
        })
    }

    /// Returns the owning node of an identifier. Pure; never touches the network.
    pub fn owner_of(&self, id: &str) -> Result<u32> {
        self.decode(id).map(|detail| detail.node_id)
    }
}

fn parse_hex_u64(field: &str, name: &str) -> Result<u64> {
    if field.is_empty() {
        return Err(Error::invalid_identifier(format!("empty {name} field")));
    }
    u64::from_str_radix(field, 16)
        .map_err(|_| Error::invalid_identifier(format!("{name} field is not hex")))
}
