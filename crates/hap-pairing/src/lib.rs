//! # hap-pairing
//!
//! The pairing and secure-session engines of the HomeKit Accessory Protocol:
//! - Pair-Setup (SRP-6a, M1-M6): bootstraps a long-term shared identity
//! - Pair-Verify (X25519 + Ed25519, M1-M4): derives fresh session keys
//! - Pair-Remove (M1-M2): revokes a controller's pairing
//!
//! The engines drive their fixed message sequences over a caller-supplied
//! [`Transport`] and validate every inbound TLV structure before reading it.
//! Per-call session material lives only inside one engine call and is
//! zeroized when the call returns.

mod controller;
mod pair_remove;
mod pair_setup;
mod pair_verify;
mod traits;
pub mod validator;

pub use controller::{ControllerIdentity, PairingId, PAIRING_ID_LEN};
pub use pair_remove::PairRemoveClient;
pub use pair_setup::PairSetupClient;
pub use pair_verify::PairVerifyClient;
pub use traits::{
    Transport, CONTENT_TYPE_PAIRING_TLV8, ENDPOINT_PAIRINGS, ENDPOINT_PAIR_SETUP,
    ENDPOINT_PAIR_VERIFY,
};
pub use validator::Method;
