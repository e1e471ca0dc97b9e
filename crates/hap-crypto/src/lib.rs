//! # hap-crypto
//!
//! TLV8 codec and cryptographic building blocks for HAP pairing:
//! - TLV8 encoding/decoding with per-tag fragmentation
//! - SRP-6a (3072-bit, SHA-512) client for Pair-Setup
//! - Ed25519 long-term identity keys
//! - X25519 ephemeral key agreement for Pair-Verify
//! - ChaCha20-Poly1305 AEAD with protocol string nonces
//! - HKDF-SHA512 with the protocol's fixed salt/info labels
//!
//! All secret material is zeroized on drop.

pub mod chacha;
pub mod ed25519;
pub mod hkdf;
pub mod keys;
pub mod srp;
pub mod tlv;
pub mod x25519;

pub use keys::{EncryptionKey, SessionKeys, SharedSecret};
pub use tlv::{Tlv8, TlvType};
