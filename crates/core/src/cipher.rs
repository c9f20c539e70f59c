//! Symmetric ciphers used to obscure session identifiers.
//!
//! The identifier cipher only hides the plaintext fields from the browser;
//! it is not an authentication boundary. Swap in a different [`IdCipher`]
//! if that ever needs to change.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// AES block size in bytes.
const BLOCK_SIZE: usize = 16;

/// A reversible transformation over identifier plaintext.
pub trait IdCipher: Send + Sync {
    /// Encrypts plaintext into ciphertext bytes.
    fn encrypt(&self, plaintext: &[u8]) -> Vec<u8>;

    /// Decrypts ciphertext, failing when it cannot be a valid encryption.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// AES-128 applied block by block with PKCS#7 padding.
///
/// Each identifier is encrypted on its own, so identical blocks across ids
/// are not a concern for routing.
pub struct Aes128Ecb {
    cipher: Aes128,
}

impl Aes128Ecb {
    /// Derives the 128-bit key from arbitrary secret material.
    pub fn new(secret: &[u8]) -> Self {
        let digest = Sha256::digest(secret);
        let cipher = Aes128::new(GenericArray::from_slice(&digest[..BLOCK_SIZE]));
        Self { cipher }
    }
}

impl IdCipher for Aes128Ecb {
    fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let pad = BLOCK_SIZE - plaintext.len() % BLOCK_SIZE;
        let mut buf = Vec::with_capacity(plaintext.len() + pad);
        buf.extend_from_slice(plaintext);
        buf.resize(plaintext.len() + pad, pad as u8);

        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            self.cipher.encrypt_block(GenericArray::from_mut_slice(block));
        }
        buf
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(Error::invalid_identifier(format!(
                "ciphertext length {} is not a whole number of blocks",
                ciphertext.len()
            )));
        }

        let mut buf = ciphertext.to_vec();
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            self.cipher.decrypt_block(GenericArray::from_mut_slice(block));
        }

        let pad = buf[buf.len() - 1] as usize;
        if pad == 0 || pad > BLOCK_SIZE || buf[buf.len() - pad..].iter().any(|&b| b as usize != pad) {
            return Err(Error::invalid_identifier("bad padding"));
        }

        buf.truncate(buf.len() - pad);
        Ok(buf)
    }
}
