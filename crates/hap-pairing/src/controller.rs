//! Controller identity: the stable pairing identifier plus the long-term
//! Ed25519 key pair.
//!
//! The identity is created once at first Pair-Setup and must be presented
//! unchanged in every later Pair-Verify, otherwise the accessory will not
//! recognize the controller. Persistence of the identifier and key seed is
//! the caller's responsibility.

use std::fmt;

use hap_core::error::{PairingError, Result};
use hap_crypto::ed25519::IdentityKeyPair;
use rand::{rngs::OsRng, RngCore};

/// Required length of a controller pairing identifier.
pub const PAIRING_ID_LEN: usize = 8;

/// Opaque 8-byte controller pairing identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingId([u8; PAIRING_ID_LEN]);

impl PairingId {
    /// Create from raw bytes; anything other than exactly 8 bytes is an
    /// `InvalidArgument` error.
    pub fn new(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PAIRING_ID_LEN {
            return Err(PairingError::InvalidArgument(format!(
                "pairing identifier must be exactly {} bytes, got {}",
                PAIRING_ID_LEN,
                bytes.len()
            ))
            .into());
        }
        let mut id = [0u8; PAIRING_ID_LEN];
        id.copy_from_slice(bytes);
        Ok(Self(id))
    }

    /// Generate a random identifier.
    pub fn random() -> Self {
        let mut id = [0u8; PAIRING_ID_LEN];
        OsRng.fill_bytes(&mut id);
        Self(id)
    }

    pub fn as_bytes(&self) -> &[u8; PAIRING_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for PairingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// A controller's long-term identity: pairing identifier plus Ed25519 keys.
#[derive(Clone)]
pub struct ControllerIdentity {
    id: PairingId,
    keypair: IdentityKeyPair,
}

impl ControllerIdentity {
    /// Generate a fresh identity with a random identifier and key pair.
    pub fn generate() -> Self {
        Self {
            id: PairingId::random(),
            keypair: IdentityKeyPair::generate(),
        }
    }

    /// Assemble an identity from its parts.
    pub fn new(id: PairingId, keypair: IdentityKeyPair) -> Self {
        Self { id, keypair }
    }

    /// Restore a persisted identity from its identifier and key seed.
    pub fn from_seed(id: PairingId, seed: &[u8; 32]) -> Self {
        Self {
            id,
            keypair: IdentityKeyPair::from_seed(seed),
        }
    }

    pub fn id(&self) -> &PairingId {
        &self.id
    }

    pub fn keypair(&self) -> &IdentityKeyPair {
        &self.keypair
    }

    /// The long-term public key (LTPK).
    pub fn public_key(&self) -> [u8; 32] {
        self.keypair.public_key()
    }

    /// Sign with the long-term private key.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.keypair.sign(message)
    }
}
