//! Module `cipher`
//!
//! Wraps the single process-wide session key and exposes symmetric
//! encrypt/decrypt over AES-256-GCM.
//!
//! Ciphertext layout on the wire:
//!
//! ```text
//! [nonce(12)] [ciphertext + auth_tag(16)]
//! ```

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;

use crate::error::CipherError;

/// Session key size in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// Nonce size for AES-GCM (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag appended by AES-GCM.
pub const TAG_SIZE: usize = 16;

/// Symmetric cipher bound to one session key.
///
/// The key never changes after construction, so the service can be shared
/// read-only across every connection task behind an `Arc`.
#[derive(Clone)]
pub struct CipherService {
    key: [u8; KEY_SIZE],
    cipher: Aes256Gcm,
}

impl CipherService {
    /// Generates a fresh random session key from the OS RNG.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self::with_key(key)
    }

    /// Builds the service from key bytes received over the handshake.
    pub fn from_key(key: &[u8]) -> Result<Self, CipherError> {
        let key: [u8; KEY_SIZE] = key.try_into().map_err(|_| CipherError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: key.len(),
        })?;
        Ok(Self::with_key(key))
    }

    fn with_key(key: [u8; KEY_SIZE]) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        Self { key, cipher }
    }

    /// Raw session key, as sent during the handshake.
    pub fn key_bytes(&self) -> &[u8] {
        &self.key
    }

    /// Encrypts `plaintext` under the session key with a fresh random nonce.
    ///
    /// Two calls with the same plaintext produce different ciphertexts.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| CipherError::Encryption)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Decrypts and authenticates `ciphertext`.
    ///
    /// Fails with [`CipherError::Decryption`] for truncated input, tampered
    /// bytes, or anything sealed under a different key.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CipherError::Decryption);
        }

        let (nonce, sealed) = ciphertext.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CipherError::Decryption)
    }
}

impl fmt::Debug for CipherService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherService").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let cipher = CipherService::generate();
        for msg in ["hi", "", "olá, mundo", "a longer message with some punctuation!"] {
            let sealed = cipher.encrypt(msg.as_bytes()).unwrap();
            assert_eq!(cipher.decrypt(&sealed).unwrap(), msg.as_bytes());
        }
    }

    #[test]
    fn test_fresh_nonce_per_encryption() {
        let cipher = CipherService::generate();
        let a = cipher.encrypt(b"same").unwrap();
        let b = cipher.encrypt(b"same").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), NONCE_SIZE + 4 + TAG_SIZE);
    }

    #[test]
    fn test_key_isolation() {
        let k1 = CipherService::generate();
        let k2 = CipherService::generate();
        let sealed = k1.encrypt(b"secret").unwrap();
        assert_eq!(k2.decrypt(&sealed), Err(CipherError::Decryption));
    }

    #[test]
    fn test_tampered_and_truncated_rejected() {
        let cipher = CipherService::generate();
        let mut sealed = cipher.encrypt(b"hello").unwrap();

        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert_eq!(cipher.decrypt(&sealed), Err(CipherError::Decryption));

        assert_eq!(cipher.decrypt(&[0u8; 5]), Err(CipherError::Decryption));
        assert_eq!(cipher.decrypt(b""), Err(CipherError::Decryption));
    }

    #[test]
    fn test_from_key_shares_session() {
        let server = CipherService::generate();
        let client = CipherService::from_key(server.key_bytes()).unwrap();
        let sealed = client.encrypt(b"hi").unwrap();
        assert_eq!(server.decrypt(&sealed).unwrap(), b"hi");
    }

    #[test]
    fn test_from_key_rejects_bad_length() {
        let err = CipherService::from_key(&[0u8; 16]).unwrap_err();
        assert_eq!(
            err,
            CipherError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: 16
            }
        );
    }
}
