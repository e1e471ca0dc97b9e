//! Pair-Verify client (M1-M4).
//!
//! Establishes a fresh, forward-secret, mutually authenticated session from
//! the long-term keys exchanged during Pair-Setup. A new X25519 key pair is
//! generated for every call and consumed by the exchange; only the derived
//! directional session keys outlive the call.
//!
//! Long-term keys are read-only here, so any number of verify calls may run
//! concurrently against different accessories without coordination.

use hap_core::error::{PairingError, ParseError, Result};
use hap_crypto::{
    chacha::{decrypt_with_nonce, encrypt_with_nonce, nonce_from_string},
    ed25519, hkdf,
    keys::{EncryptionKey, SessionKeys},
    tlv::{Tlv8, TlvType},
    x25519::EcdhKeyPair,
};
use tracing::debug;
use zeroize::Zeroizing;

use crate::controller::ControllerIdentity;
use crate::traits::{Transport, CONTENT_TYPE_PAIRING_TLV8, ENDPOINT_PAIR_VERIFY};
use crate::validator::{self, Method};

/// Nonce for M2 decryption.
const PV_MSG02_NONCE: &[u8] = b"PV-Msg02";
/// Nonce for M3 encryption.
const PV_MSG03_NONCE: &[u8] = b"PV-Msg03";

/// One Pair-Verify exchange against a single accessory.
pub struct PairVerifyClient<'a, T: Transport> {
    transport: &'a mut T,
    controller: &'a ControllerIdentity,
    accessory_ltpk: [u8; 32],
}

impl<'a, T: Transport> PairVerifyClient<'a, T> {
    /// Create a client from the controller identity and the accessory's
    /// long-term public key returned by a previous Pair-Setup.
    pub fn new(
        transport: &'a mut T,
        controller: &'a ControllerIdentity,
        accessory_ltpk: [u8; 32],
    ) -> Self {
        Self {
            transport,
            controller,
            accessory_ltpk,
        }
    }

    /// Run the full M1-M4 exchange and return the directional session keys.
    ///
    /// Any validation, decrypt, or signature failure aborts the call. The
    /// long-term keys are untouched, so a retry starts over from M1 with a
    /// fresh ephemeral pair.
    pub async fn verify(self) -> Result<SessionKeys> {
        let Self {
            transport,
            controller,
            accessory_ltpk,
        } = self;

        // M1: fresh ephemeral key for this call only.
        let ecdh = EcdhKeyPair::generate();
        let client_public = ecdh.public_key();

        let mut m1 = Tlv8::new();
        m1.set(TlvType::State, vec![0x01]);
        m1.set(TlvType::PublicKey, client_public.to_vec());
        debug!("pair-verify M1: sending ephemeral public key");
        let response = transport
            .post(ENDPOINT_PAIR_VERIFY, CONTENT_TYPE_PAIRING_TLV8, &m1.encode())
            .await?;

        // M2: key agreement, then confirm the accessory's identity before
        // revealing anything of ours.
        let m2 = Tlv8::parse(&response)?;
        validator::validate(Method::PairVerify, 0x02, &m2)?;

        let server_public = m2
            .get(TlvType::PublicKey)
            .ok_or(PairingError::MissingTlv(TlvType::PublicKey as u8))?;
        if server_public.len() != 32 {
            return Err(ParseError::MalformedTlv(format!(
                "M2 server public key must be 32 bytes, got {}",
                server_public.len()
            ))
            .into());
        }
        let mut server_public_arr = [0u8; 32];
        server_public_arr.copy_from_slice(server_public);

        let encrypted_data = m2
            .get(TlvType::EncryptedData)
            .ok_or(PairingError::MissingTlv(TlvType::EncryptedData as u8))?;

        let shared_secret = ecdh.diffie_hellman(&server_public_arr)?;
        let session_key =
            EncryptionKey::new(hkdf::derive_pair_verify_key(shared_secret.as_bytes())?);

        let plaintext = Zeroizing::new(decrypt_with_nonce(
            session_key.as_bytes(),
            &nonce_from_string(PV_MSG02_NONCE),
            encrypted_data,
        )?);
        let accessory_tlv = Tlv8::parse(&plaintext)?;

        let accessory_id = accessory_tlv
            .get(TlvType::Identifier)
            .ok_or(PairingError::MissingTlv(TlvType::Identifier as u8))?;
        let signature = accessory_tlv
            .get(TlvType::Signature)
            .ok_or(PairingError::MissingTlv(TlvType::Signature as u8))?;
        if signature.len() != 64 {
            return Err(ParseError::MalformedTlv(format!(
                "M2 signature must be 64 bytes, got {}",
                signature.len()
            ))
            .into());
        }
        let mut sig_arr = [0u8; 64];
        sig_arr.copy_from_slice(signature);

        // The accessory binds its identity to both ephemeral keys.
        let mut signed = Vec::with_capacity(64 + accessory_id.len());
        signed.extend_from_slice(&server_public_arr);
        signed.extend_from_slice(accessory_id);
        signed.extend_from_slice(&client_public);

        ed25519::verify(&accessory_ltpk, &signed, &sig_arr)
            .map_err(|_| PairingError::AuthenticationFailed("accessory signature rejected"))?;
        debug!("pair-verify M2: accessory identity confirmed");

        // M3: our own identity proof, encrypted under the verify session key.
        let controller_x = Zeroizing::new(hkdf::derive_verify_controller_sign_key(
            shared_secret.as_bytes(),
        )?);
        let mut signed = Vec::with_capacity(32 + 8 + 32);
        signed.extend_from_slice(&controller_x[..]);
        signed.extend_from_slice(controller.id().as_bytes());
        signed.extend_from_slice(&controller.public_key());
        let signature = controller.sign(&signed);

        let mut identity_tlv = Tlv8::new();
        identity_tlv.set(TlvType::Identifier, controller.id().as_bytes().to_vec());
        identity_tlv.set(TlvType::PublicKey, controller.public_key().to_vec());
        identity_tlv.set(TlvType::Signature, signature.to_vec());

        let encrypted = encrypt_with_nonce(
            session_key.as_bytes(),
            &nonce_from_string(PV_MSG03_NONCE),
            &identity_tlv.encode(),
        )?;

        let mut m3 = Tlv8::new();
        m3.set(TlvType::State, vec![0x03]);
        m3.set(TlvType::EncryptedData, encrypted);
        debug!("pair-verify M3: sending encrypted controller identity");
        let response = transport
            .post(ENDPOINT_PAIR_VERIFY, CONTENT_TYPE_PAIRING_TLV8, &m3.encode())
            .await?;

        // M4: bare state confirmation, then derive the session keys.
        let m4 = Tlv8::parse(&response)?;
        validator::validate(Method::PairVerify, 0x04, &m4)?;

        let keys = SessionKeys::derive_control_keys(&shared_secret)?;
        debug!("pair-verify M4: session established");
        Ok(keys)
    }
}
