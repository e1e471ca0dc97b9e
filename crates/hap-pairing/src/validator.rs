//! Structural validation of inbound pairing messages.
//!
//! One table-driven validator covers all three protocols: for a given
//! (method, state) the table lists the TLV types that must be present.
//! Every inbound TLV map goes through [`validate`] before any field is
//! read; the Pair-Remove engine also runs its own outbound M1 through it.

use hap_core::error::{ErrorCode, PairingError};
use hap_crypto::tlv::{Tlv8, TlvType};

/// Pairing method, as carried in the method TLV (tag 0x00).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    PairSetup,
    PairSetupWithAuth,
    PairVerify,
    RemovePairing,
}

impl Method {
    /// Wire byte for the method TLV.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::PairSetup => 0x00,
            Self::PairSetupWithAuth => 0x01,
            Self::PairVerify => 0x02,
            Self::RemovePairing => 0x04,
        }
    }
}

/// Required tags per state for Pair-Setup (states M1..M6).
const SETUP_REQUIRED: [&[TlvType]; 6] = [
    &[TlvType::State, TlvType::Method],
    &[TlvType::State, TlvType::Salt, TlvType::PublicKey],
    &[TlvType::State, TlvType::PublicKey, TlvType::Proof],
    &[TlvType::State, TlvType::Proof],
    &[TlvType::State, TlvType::EncryptedData],
    &[TlvType::State, TlvType::EncryptedData],
];

/// Required tags per state for Pair-Verify (states M1..M4).
const VERIFY_REQUIRED: [&[TlvType]; 4] = [
    &[TlvType::State, TlvType::PublicKey],
    &[TlvType::State, TlvType::PublicKey, TlvType::EncryptedData],
    &[TlvType::State, TlvType::EncryptedData],
    &[TlvType::State],
];

/// Required tags per state for Pair-Remove (states M1..M2).
const REMOVE_REQUIRED: [&[TlvType]; 2] = [
    &[TlvType::State, TlvType::Method, TlvType::Identifier],
    &[TlvType::State],
];

/// The required-tag set for (method, state), or `None` if the state byte is
/// not defined for that method.
pub fn required_tags(method: Method, state: u8) -> Option<&'static [TlvType]> {
    let table: &[&'static [TlvType]] = match method {
        Method::PairSetup | Method::PairSetupWithAuth => &SETUP_REQUIRED,
        Method::PairVerify => &VERIFY_REQUIRED,
        Method::RemovePairing => &REMOVE_REQUIRED,
    };
    table.get((state as usize).checked_sub(1)?).copied()
}

/// Validate one message of the given method against the expected state.
///
/// Checks, in order:
/// 1. an error TLV fails with `RemoteRejected`, code preserved verbatim;
/// 2. the state TLV must be present with exactly one byte (`MalformedState`);
/// 3. the declared state must be the expected next state (`UnexpectedState`);
/// 4. every tag required for (method, state) must be present (`MissingTlv`).
///
/// Pure function of its inputs.
pub fn validate(method: Method, expected_state: u8, tlv: &Tlv8) -> Result<(), PairingError> {
    if let Some(code) = tlv.error() {
        return Err(PairingError::RemoteRejected(ErrorCode::from_byte(code)));
    }

    let state = match tlv.state_value() {
        Some(value) if value.len() == 1 => value[0],
        _ => return Err(PairingError::MalformedState),
    };

    if state != expected_state {
        return Err(PairingError::UnexpectedState {
            expected: expected_state,
            actual: state,
        });
    }

    let required = required_tags(method, state).ok_or(PairingError::UnexpectedState {
        expected: expected_state,
        actual: state,
    })?;

    for tag in required {
        if !tlv.contains(*tag) {
            return Err(PairingError::MissingTlv(*tag as u8));
        }
    }

    Ok(())
}
