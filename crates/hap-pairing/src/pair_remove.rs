//! Pair-Remove client (M1-M2).
//!
//! Revokes a controller's pairing via the pairings endpoint. The 2-message
//! protocol is the same over both transports: the in-session form seals the
//! bodies with the established session keys, the plain form posts bare TLV8
//! (local network re-pairing). The caller picks the variant explicitly.

use hap_core::error::{PairingError, Result};
use hap_crypto::{
    chacha::{decrypt_with_nonce, encrypt_with_nonce, nonce_from_string},
    keys::SessionKeys,
    tlv::{Tlv8, TlvType},
};
use tracing::debug;

use crate::controller::PairingId;
use crate::traits::{Transport, CONTENT_TYPE_PAIRING_TLV8, ENDPOINT_PAIRINGS};
use crate::validator::{self, Method};

/// Nonce for the encrypted request body.
///
/// The in-session form continues the verify-channel nonce labels; these two
/// values are what accessories expect on the pairings endpoint.
const REMOVE_REQUEST_NONCE: &[u8] = b"PV-Msg05";
/// Nonce for the encrypted response body.
const REMOVE_RESPONSE_NONCE: &[u8] = b"PV-Msg06";

/// One Pair-Remove exchange for a single controller pairing.
pub struct PairRemoveClient<'a, T: Transport> {
    transport: &'a mut T,
    identifier: PairingId,
    session: Option<&'a SessionKeys>,
}

impl<'a, T: Transport> PairRemoveClient<'a, T> {
    /// Remove over a plain TLV8 POST (local re-pairing form).
    pub fn new_plain(transport: &'a mut T, identifier: PairingId) -> Self {
        Self {
            transport,
            identifier,
            session: None,
        }
    }

    /// Remove over an established encrypted session from Pair-Verify.
    pub fn new_encrypted(
        transport: &'a mut T,
        identifier: PairingId,
        session: &'a SessionKeys,
    ) -> Self {
        Self {
            transport,
            identifier,
            session: Some(session),
        }
    }

    /// Run the M1-M2 exchange. Success has no payload beyond the validated
    /// state; any validation or decrypt failure surfaces as `RemoveFailed`.
    pub async fn remove(self) -> Result<()> {
        let Self {
            transport,
            identifier,
            session,
        } = self;

        let mut m1 = Tlv8::new();
        m1.set(TlvType::State, vec![0x01]);
        m1.set(TlvType::Method, vec![Method::RemovePairing.as_byte()]);
        m1.set(TlvType::Identifier, identifier.as_bytes().to_vec());

        // Check our own request before it goes out.
        validator::validate(Method::RemovePairing, 0x01, &m1)
            .map_err(|e| PairingError::RemoveFailed(e.to_string()))?;

        let mut body = m1.encode();
        if let Some(keys) = session {
            body = encrypt_with_nonce(
                keys.write_key.as_bytes(),
                &nonce_from_string(REMOVE_REQUEST_NONCE),
                &body,
            )
            .map_err(|e| PairingError::RemoveFailed(e.to_string()))?;
        }

        debug!(
            "pair-remove M1: requesting removal of pairing {} ({})",
            identifier,
            if session.is_some() { "in-session" } else { "plain" },
        );
        // Transport errors pass through unchanged.
        let mut response = transport
            .post(ENDPOINT_PAIRINGS, CONTENT_TYPE_PAIRING_TLV8, &body)
            .await?;

        if let Some(keys) = session {
            response = decrypt_with_nonce(
                keys.read_key.as_bytes(),
                &nonce_from_string(REMOVE_RESPONSE_NONCE),
                &response,
            )
            .map_err(|e| PairingError::RemoveFailed(e.to_string()))?;
        }

        let m2 =
            Tlv8::parse(&response).map_err(|e| PairingError::RemoveFailed(e.to_string()))?;
        validator::validate(Method::RemovePairing, 0x02, &m2)
            .map_err(|e| PairingError::RemoveFailed(e.to_string()))?;

        debug!("pair-remove M2: pairing removed");
        Ok(())
    }
}
