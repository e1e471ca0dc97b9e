//! X25519 ephemeral key agreement for Pair-Verify.
//!
//! A fresh key pair is generated for every verify call and consumed by the
//! exchange, so the secret exists only inside that call's activation record.

use hap_core::error::CryptoError;
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::ZeroizeOnDrop;

use crate::keys::SharedSecret;

/// Ephemeral X25519 key pair.
#[derive(ZeroizeOnDrop)]
pub struct EcdhKeyPair {
    #[zeroize(skip)]
    public: [u8; 32],
    secret: [u8; 32],
}

impl EcdhKeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self {
            public: public.to_bytes(),
            secret: secret.to_bytes(),
        }
    }

    /// Create from existing secret key bytes (tests only).
    #[cfg(test)]
    pub fn from_secret(secret: &[u8; 32]) -> Self {
        let static_secret = StaticSecret::from(*secret);
        let public = PublicKey::from(&static_secret);
        Self {
            public: public.to_bytes(),
            secret: *secret,
        }
    }

    /// The public key (32 bytes).
    pub fn public_key(&self) -> [u8; 32] {
        self.public
    }

    /// Perform the key exchange, consuming the key pair.
    ///
    /// Rejects the all-zero public key and any low-order point (both would
    /// yield an all-zero shared secret).
    pub fn diffie_hellman(self, peer_public: &[u8; 32]) -> Result<SharedSecret, CryptoError> {
        if peer_public.iter().all(|&b| b == 0) {
            return Err(CryptoError::KeyDerivation(
                "invalid peer public key: all zeros".to_string(),
            ));
        }

        let static_secret = StaticSecret::from(self.secret);
        let their_public = PublicKey::from(*peer_public);
        let shared = static_secret.diffie_hellman(&their_public);

        let shared_bytes = shared.to_bytes();
        if shared_bytes.iter().all(|&b| b == 0) {
            return Err(CryptoError::KeyDerivation(
                "weak ECDH result: low-order peer point".to_string(),
            ));
        }

        Ok(SharedSecret::new(shared_bytes.to_vec()))
    }
}
