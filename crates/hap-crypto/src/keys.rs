//! Zeroizing key containers and session key derivation.

use hap_core::error::CryptoError;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::hkdf;

/// Shared secret from SRP or X25519. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret(Vec<u8>);

/// A 32-byte symmetric key. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; 32]);

/// Directional session keys returned by Pair-Verify.
///
/// Direction is fixed at derivation time: the write key encrypts
/// controller-to-accessory traffic, the read key decrypts
/// accessory-to-controller traffic.
#[derive(ZeroizeOnDrop)]
pub struct SessionKeys {
    pub write_key: EncryptionKey,
    pub read_key: EncryptionKey,
}

impl SharedSecret {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl EncryptionKey {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl SessionKeys {
    /// Derive the directional session keys from a verify shared secret.
    pub fn derive_control_keys(shared_secret: &SharedSecret) -> Result<Self, CryptoError> {
        let write_key = hkdf::derive_control_write_key(shared_secret.as_bytes())?;
        let read_key = hkdf::derive_control_read_key(shared_secret.as_bytes())?;

        Ok(Self {
            write_key: EncryptionKey(write_key),
            read_key: EncryptionKey(read_key),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_keys_are_directional() {
        let secret = SharedSecret::new(vec![0xABu8; 32]);
        let keys = SessionKeys::derive_control_keys(&secret).unwrap();
        assert_ne!(keys.write_key.as_bytes(), keys.read_key.as_bytes());
    }

    #[test]
    fn derivation_is_deterministic() {
        let secret = SharedSecret::new(vec![0xABu8; 32]);
        let k1 = SessionKeys::derive_control_keys(&secret).unwrap();
        let k2 = SessionKeys::derive_control_keys(&secret).unwrap();
        assert_eq!(k1.write_key.as_bytes(), k2.write_key.as_bytes());
        assert_eq!(k1.read_key.as_bytes(), k2.read_key.as_bytes());
    }

    #[test]
    fn different_secrets_produce_different_keys() {
        let k1 = SessionKeys::derive_control_keys(&SharedSecret::new(vec![0x01u8; 32])).unwrap();
        let k2 = SessionKeys::derive_control_keys(&SharedSecret::new(vec![0x02u8; 32])).unwrap();
        assert_ne!(k1.write_key.as_bytes(), k2.write_key.as_bytes());
        assert_ne!(k1.read_key.as_bytes(), k2.read_key.as_bytes());
    }
}
