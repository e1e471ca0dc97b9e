//! Pair-Setup client (M1-M6).
//!
//! The SRP-6a based exchange that bootstraps a long-term shared identity
//! between controller and accessory. One call drives the fixed six-message
//! sequence against the transport and returns the accessory's long-term
//! Ed25519 public key; the caller persists it for future Pair-Verify calls.
//!
//! All session-scoped material (SRP state, sub-session key, signing keys)
//! lives inside the single `pair()` activation and is zeroized when the call
//! returns, successful or not.

use hap_core::error::{PairingError, ParseError, Result};
use hap_crypto::{
    chacha::{decrypt_with_nonce, encrypt_with_nonce, nonce_from_string},
    ed25519, hkdf,
    keys::EncryptionKey,
    srp::{SrpChallenge, SrpClient},
    tlv::{Tlv8, TlvType},
};
use tracing::debug;
use zeroize::Zeroizing;

use crate::controller::ControllerIdentity;
use crate::traits::{Transport, CONTENT_TYPE_PAIRING_TLV8, ENDPOINT_PAIR_SETUP};
use crate::validator::{self, Method};

/// SRP identity fixed by the protocol.
const SRP_IDENTITY: &[u8] = b"Pair-Setup";
/// Nonce for M5 encryption.
const PS_MSG05_NONCE: &[u8] = b"PS-Msg05";
/// Nonce for M6 decryption.
const PS_MSG06_NONCE: &[u8] = b"PS-Msg06";

/// SRP server public key size for the 3072-bit group.
const SRP_PUBLIC_KEY_LEN: usize = 384;

/// One Pair-Setup exchange against a single accessory.
pub struct PairSetupClient<'a, T: Transport> {
    transport: &'a mut T,
    controller: &'a ControllerIdentity,
    setup_code: Zeroizing<String>,
    method: Method,
}

impl<'a, T: Transport> PairSetupClient<'a, T> {
    /// Create a client for the plain Pair-Setup method.
    ///
    /// The setup code is the accessory's password (typically XXX-XX-XXX);
    /// an empty code is rejected with `InvalidArgument`.
    pub fn new(
        transport: &'a mut T,
        controller: &'a ControllerIdentity,
        setup_code: &str,
    ) -> Result<Self> {
        Self::with_method(transport, controller, setup_code, Method::PairSetup)
    }

    /// Create a client using Pair-Setup with external authentication
    /// (method 0x01), for accessories that demand app-mediated auth.
    pub fn with_auth(
        transport: &'a mut T,
        controller: &'a ControllerIdentity,
        setup_code: &str,
    ) -> Result<Self> {
        Self::with_method(transport, controller, setup_code, Method::PairSetupWithAuth)
    }

    fn with_method(
        transport: &'a mut T,
        controller: &'a ControllerIdentity,
        setup_code: &str,
        method: Method,
    ) -> Result<Self> {
        if setup_code.is_empty() {
            return Err(
                PairingError::InvalidArgument("setup code must not be empty".to_string()).into(),
            );
        }
        Ok(Self {
            transport,
            controller,
            setup_code: Zeroizing::new(setup_code.to_string()),
            method,
        })
    }

    /// Run the full M1-M6 exchange.
    ///
    /// Returns the accessory's long-term Ed25519 public key. Any transport
    /// error, validation failure, or proof/signature mismatch aborts the
    /// whole sequence; no retries are performed here.
    pub async fn pair(self) -> Result<[u8; 32]> {
        let Self {
            transport,
            controller,
            setup_code,
            method,
        } = self;

        // M1: announce the method, no crypto yet.
        let mut m1 = Tlv8::new();
        m1.set(TlvType::State, vec![0x01]);
        m1.set(TlvType::Method, vec![method.as_byte()]);
        debug!("pair-setup M1: requesting SRP start");
        let response = transport
            .post(ENDPOINT_PAIR_SETUP, CONTENT_TYPE_PAIRING_TLV8, &m1.encode())
            .await?;

        // M2: salt and server public key.
        let m2 = Tlv8::parse(&response)?;
        validator::validate(method, 0x02, &m2)?;

        let salt = m2
            .get(TlvType::Salt)
            .ok_or(PairingError::MissingTlv(TlvType::Salt as u8))?;
        if salt.len() != 16 {
            return Err(ParseError::MalformedTlv(format!(
                "M2 salt must be 16 bytes, got {}",
                salt.len()
            ))
            .into());
        }
        let mut salt_arr = [0u8; 16];
        salt_arr.copy_from_slice(salt);

        let server_pk = m2
            .get(TlvType::PublicKey)
            .ok_or(PairingError::MissingTlv(TlvType::PublicKey as u8))?;
        if server_pk.len() > SRP_PUBLIC_KEY_LEN {
            return Err(ParseError::MalformedTlv(format!(
                "M2 server public key too long: {} bytes",
                server_pk.len()
            ))
            .into());
        }
        // Accessories may strip leading zero bytes; restore the fixed width.
        let mut server_public_key = vec![0u8; SRP_PUBLIC_KEY_LEN - server_pk.len()];
        server_public_key.extend_from_slice(server_pk);

        let srp = SrpClient::new(SRP_IDENTITY, setup_code.as_bytes());
        let proof = srp.process_challenge(&SrpChallenge {
            salt: salt_arr,
            server_public_key,
        })?;
        debug!("pair-setup M2: SRP challenge processed");

        // M3: client public key and evidence.
        let mut m3 = Tlv8::new();
        m3.set(TlvType::State, vec![0x03]);
        m3.set(TlvType::PublicKey, srp.public_key());
        m3.set(TlvType::Proof, proof.client_proof.clone());
        debug!("pair-setup M3: sending client evidence");
        let response = transport
            .post(ENDPOINT_PAIR_SETUP, CONTENT_TYPE_PAIRING_TLV8, &m3.encode())
            .await?;

        // M4: the accessory's evidence must match our expectation exactly.
        let m4 = Tlv8::parse(&response)?;
        validator::validate(method, 0x04, &m4)?;
        let server_proof = m4
            .get(TlvType::Proof)
            .ok_or(PairingError::MissingTlv(TlvType::Proof as u8))?;
        if !srp.verify_server_proof(server_proof, &proof.expected_server_proof) {
            return Err(PairingError::AuthenticationFailed(
                "SRP proof mismatch (wrong setup code?)",
            )
            .into());
        }
        debug!("pair-setup M4: accessory proof verified");

        // M5: encrypted controller identity, signed with the long-term key.
        let session_key = EncryptionKey::new(hkdf::derive_pair_setup_key(&proof.shared_secret)?);
        let controller_x = Zeroizing::new(hkdf::derive_setup_controller_sign_key(
            &proof.shared_secret,
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
            &nonce_from_string(PS_MSG05_NONCE),
            &identity_tlv.encode(),
        )?;

        let mut m5 = Tlv8::new();
        m5.set(TlvType::State, vec![0x05]);
        m5.set(TlvType::EncryptedData, encrypted);
        debug!("pair-setup M5: sending encrypted controller identity");
        let response = transport
            .post(ENDPOINT_PAIR_SETUP, CONTENT_TYPE_PAIRING_TLV8, &m5.encode())
            .await?;

        // M6: decrypt and verify the accessory's identity.
        let m6 = Tlv8::parse(&response)?;
        validator::validate(method, 0x06, &m6)?;
        let encrypted_data = m6
            .get(TlvType::EncryptedData)
            .ok_or(PairingError::MissingTlv(TlvType::EncryptedData as u8))?;

        let plaintext = Zeroizing::new(decrypt_with_nonce(
            session_key.as_bytes(),
            &nonce_from_string(PS_MSG06_NONCE),
            encrypted_data,
        )?);
        let accessory_tlv = Tlv8::parse(&plaintext)?;

        let accessory_id = accessory_tlv
            .get(TlvType::Identifier)
            .ok_or(PairingError::MissingTlv(TlvType::Identifier as u8))?;
        let accessory_pk = accessory_tlv
            .get(TlvType::PublicKey)
            .ok_or(PairingError::MissingTlv(TlvType::PublicKey as u8))?;
        let accessory_sig = accessory_tlv
            .get(TlvType::Signature)
            .ok_or(PairingError::MissingTlv(TlvType::Signature as u8))?;

        if accessory_pk.len() != 32 {
            return Err(ParseError::MalformedTlv(format!(
                "M6 accessory public key must be 32 bytes, got {}",
                accessory_pk.len()
            ))
            .into());
        }
        if accessory_sig.len() != 64 {
            return Err(ParseError::MalformedTlv(format!(
                "M6 accessory signature must be 64 bytes, got {}",
                accessory_sig.len()
            ))
            .into());
        }

        let accessory_x = Zeroizing::new(hkdf::derive_setup_accessory_sign_key(
            &proof.shared_secret,
        )?);
        let mut signed = Vec::with_capacity(32 + accessory_id.len() + 32);
        signed.extend_from_slice(&accessory_x[..]);
        signed.extend_from_slice(accessory_id);
        signed.extend_from_slice(accessory_pk);

        let mut pk_arr = [0u8; 32];
        pk_arr.copy_from_slice(accessory_pk);
        let mut sig_arr = [0u8; 64];
        sig_arr.copy_from_slice(accessory_sig);

        ed25519::verify(&pk_arr, &signed, &sig_arr)
            .map_err(|_| PairingError::AuthenticationFailed("accessory signature rejected"))?;

        debug!("pair-setup M6: accessory identity verified, pairing complete");
        Ok(pk_arr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hap_core::error::{Error, ErrorCode};
    use hap_crypto::ed25519::IdentityKeyPair;
    use num_bigint::{BigUint, RandBigInt};
    use rand::{rngs::OsRng, RngCore};
    use sha2::{Digest, Sha512};

    const ACCESSORY_ID: &[u8] = b"11:22:33:44:55:66";
    const SETUP_CODE: &str = "031-45-154";

    fn sha512(data: &[u8]) -> Vec<u8> {
        let mut hasher = Sha512::new();
        hasher.update(data);
        hasher.finalize().to_vec()
    }

    fn pad384(value: &BigUint) -> Vec<u8> {
        let bytes = value.to_bytes_be();
        if bytes.len() >= 384 {
            bytes[bytes.len() - 384..].to_vec()
        } else {
            let mut padded = vec![0u8; 384 - bytes.len()];
            padded.extend_from_slice(&bytes);
            padded
        }
    }

    /// Accessory-side SRP verifier math for the mock.
    struct SrpServer {
        n: BigUint,
        salt: [u8; 16],
        verifier: BigUint,
        private_key: BigUint,
        public_key: BigUint,
        shared_secret: Option<Vec<u8>>,
    }

    impl SrpServer {
        fn new(setup_code: &str, salt: [u8; 16]) -> Self {
            let params = hap_crypto::srp::SrpParams::default();
            let (n, g) = (params.n, params.g);

            // x = H(salt || H("Pair-Setup" || ":" || code)), v = g^x
            let mut inner = Vec::from(SRP_IDENTITY);
            inner.push(b':');
            inner.extend_from_slice(setup_code.as_bytes());
            let mut salted = salt.to_vec();
            salted.extend_from_slice(&sha512(&inner));
            let x = BigUint::from_bytes_be(&sha512(&salted));
            let verifier = g.modpow(&x, &n);

            let b = OsRng.gen_biguint(256);
            let k = {
                let mut data = pad384(&n);
                data.extend_from_slice(&pad384(&g));
                BigUint::from_bytes_be(&sha512(&data))
            };
            let public_key = ((&k * &verifier) % &n + g.modpow(&b, &n)) % &n;

            Self {
                n,
                salt,
                verifier,
                private_key: b,
                public_key,
                shared_secret: None,
            }
        }

        /// Compute (K, M2) from the client's public key and proof.
        fn accept(&mut self, client_public: &[u8], client_proof: &[u8]) -> (Vec<u8>, Vec<u8>) {
            let a = BigUint::from_bytes_be(client_public);

            let mut data = pad384(&a);
            data.extend_from_slice(&pad384(&self.public_key));
            let u = BigUint::from_bytes_be(&sha512(&data));

            let v_u = self.verifier.modpow(&u, &self.n);
            let s = ((&a * &v_u) % &self.n).modpow(&self.private_key, &self.n);
            let shared_secret = sha512(&pad384(&s));

            // M2 = H(PAD(A) || M1 || K), echoing the client's M1
            let mut data = pad384(&a);
            data.extend_from_slice(client_proof);
            data.extend_from_slice(&shared_secret);
            let server_proof = sha512(&data);

            self.shared_secret = Some(shared_secret.clone());
            (shared_secret, server_proof)
        }
    }

    /// Mock accessory driving the server side of Pair-Setup over Transport.
    struct MockAccessory {
        identity: IdentityKeyPair,
        srp: SrpServer,
        session_key: Option<[u8; 32]>,
        controller_ltpk: Option<[u8; 32]>,
        /// Respond to the given inbound state with an error TLV.
        reject_state_with: Option<(u8, u8)>,
        tamper_m6_signature: bool,
        states_seen: Vec<u8>,
    }

    impl MockAccessory {
        fn new(setup_code: &str) -> Self {
            let mut salt = [0u8; 16];
            OsRng.fill_bytes(&mut salt);
            Self {
                identity: IdentityKeyPair::generate(),
                srp: SrpServer::new(setup_code, salt),
                session_key: None,
                controller_ltpk: None,
                reject_state_with: None,
                tamper_m6_signature: false,
                states_seen: Vec::new(),
            }
        }

        fn expecting_controller(mut self, controller: &ControllerIdentity) -> Self {
            self.controller_ltpk = Some(controller.public_key());
            self
        }

        fn error_tlv(state: u8, code: u8) -> Vec<u8> {
            let mut tlv = Tlv8::new();
            tlv.set(TlvType::State, vec![state]);
            tlv.set(TlvType::Error, vec![code]);
            tlv.encode()
        }

        fn handle_m1(&self) -> Vec<u8> {
            let mut tlv = Tlv8::new();
            tlv.set(TlvType::State, vec![0x02]);
            tlv.set(TlvType::Salt, self.srp.salt.to_vec());
            tlv.set(TlvType::PublicKey, pad384(&self.srp.public_key));
            tlv.encode()
        }

        fn handle_m3(&mut self, request: &Tlv8) -> Vec<u8> {
            let client_public = request.get(TlvType::PublicKey).expect("M3 public key");
            let client_proof = request.get(TlvType::Proof).expect("M3 proof");

            let (shared_secret, server_proof) = self.srp.accept(client_public, client_proof);
            self.session_key = Some(hkdf::derive_pair_setup_key(&shared_secret).unwrap());

            let mut tlv = Tlv8::new();
            tlv.set(TlvType::State, vec![0x04]);
            tlv.set(TlvType::Proof, server_proof);
            tlv.encode()
        }

        fn handle_m5(&mut self, request: &Tlv8) -> Vec<u8> {
            let session_key = self.session_key.expect("session key after M4");
            let shared_secret = self.srp.shared_secret.clone().expect("shared secret");

            // Verify the controller's identity proof before answering.
            let encrypted = request.get(TlvType::EncryptedData).expect("M5 payload");
            let plaintext =
                decrypt_with_nonce(&session_key, &nonce_from_string(PS_MSG05_NONCE), encrypted)
                    .expect("M5 decrypts");
            let inner = Tlv8::parse(&plaintext).unwrap();
            let id = inner.get(TlvType::Identifier).expect("controller id");
            let ltpk = inner.get(TlvType::PublicKey).expect("controller LTPK");
            let sig = inner.get(TlvType::Signature).expect("controller signature");

            if let Some(expected) = self.controller_ltpk {
                assert_eq!(ltpk, expected, "controller LTPK mismatch in M5");
            }

            let controller_x = hkdf::derive_setup_controller_sign_key(&shared_secret).unwrap();
            let mut signed = controller_x.to_vec();
            signed.extend_from_slice(id);
            signed.extend_from_slice(ltpk);
            let mut ltpk_arr = [0u8; 32];
            ltpk_arr.copy_from_slice(ltpk);
            let mut sig_arr = [0u8; 64];
            sig_arr.copy_from_slice(sig);
            ed25519::verify(&ltpk_arr, &signed, &sig_arr).expect("controller signature valid");

            // Answer with our own signed identity.
            let accessory_x = hkdf::derive_setup_accessory_sign_key(&shared_secret).unwrap();
            let mut signed = accessory_x.to_vec();
            signed.extend_from_slice(ACCESSORY_ID);
            signed.extend_from_slice(&self.identity.public_key());
            let mut signature = self.identity.sign(&signed);
            if self.tamper_m6_signature {
                signature[0] ^= 0x01;
            }

            let mut inner = Tlv8::new();
            inner.set(TlvType::Identifier, ACCESSORY_ID.to_vec());
            inner.set(TlvType::PublicKey, self.identity.public_key().to_vec());
            inner.set(TlvType::Signature, signature.to_vec());

            let encrypted = encrypt_with_nonce(
                &session_key,
                &nonce_from_string(PS_MSG06_NONCE),
                &inner.encode(),
            )
            .unwrap();

            let mut tlv = Tlv8::new();
            tlv.set(TlvType::State, vec![0x06]);
            tlv.set(TlvType::EncryptedData, encrypted);
            tlv.encode()
        }
    }

    #[async_trait]
    impl Transport for MockAccessory {
        async fn post(
            &mut self,
            endpoint: &str,
            content_type: &str,
            body: &[u8],
        ) -> Result<Vec<u8>> {
            assert_eq!(endpoint, ENDPOINT_PAIR_SETUP);
            assert_eq!(content_type, CONTENT_TYPE_PAIRING_TLV8);

            let request = Tlv8::parse(body).expect("request is valid TLV8");
            let state = request.state().expect("request has a state");
            self.states_seen.push(state);

            if let Some((reject_state, code)) = self.reject_state_with {
                if state == reject_state {
                    return Ok(Self::error_tlv(state + 1, code));
                }
            }

            Ok(match state {
                0x01 => self.handle_m1(),
                0x03 => self.handle_m3(&request),
                0x05 => self.handle_m5(&request),
                other => panic!("unexpected pair-setup request state {other}"),
            })
        }
    }

    #[tokio::test]
    async fn happy_path_returns_accessory_public_key() {
        let controller = ControllerIdentity::generate();
        let mut accessory = MockAccessory::new(SETUP_CODE).expecting_controller(&controller);
        let expected = accessory.identity.public_key();

        let client = PairSetupClient::new(&mut accessory, &controller, SETUP_CODE).unwrap();
        let ltpk = client.pair().await.unwrap();

        assert_eq!(ltpk, expected);
        assert_eq!(accessory.states_seen, vec![0x01, 0x03, 0x05]);
    }

    #[tokio::test]
    async fn wrong_setup_code_fails_at_m4_and_never_sends_m5() {
        let controller = ControllerIdentity::generate();
        let mut accessory = MockAccessory::new(SETUP_CODE);

        let client = PairSetupClient::new(&mut accessory, &controller, "222-22-222").unwrap();
        let result = client.pair().await;

        assert!(matches!(
            result,
            Err(Error::Pairing(PairingError::AuthenticationFailed(_)))
        ));
        assert_eq!(accessory.states_seen, vec![0x01, 0x03]);
    }

    #[tokio::test]
    async fn accessory_rejection_is_surfaced_verbatim() {
        let controller = ControllerIdentity::generate();
        let mut accessory = MockAccessory::new(SETUP_CODE);
        accessory.reject_state_with = Some((0x01, 0x06)); // unavailable

        let client = PairSetupClient::new(&mut accessory, &controller, SETUP_CODE).unwrap();
        let result = client.pair().await;

        assert!(matches!(
            result,
            Err(Error::Pairing(PairingError::RemoteRejected(
                ErrorCode::Unavailable
            )))
        ));
    }

    #[tokio::test]
    async fn tampered_m6_signature_fails_authentication() {
        let controller = ControllerIdentity::generate();
        let mut accessory = MockAccessory::new(SETUP_CODE);
        accessory.tamper_m6_signature = true;

        let client = PairSetupClient::new(&mut accessory, &controller, SETUP_CODE).unwrap();
        let result = client.pair().await;

        assert!(matches!(
            result,
            Err(Error::Pairing(PairingError::AuthenticationFailed(_)))
        ));
    }

    #[tokio::test]
    async fn empty_setup_code_is_rejected_up_front() {
        let controller = ControllerIdentity::generate();
        let mut accessory = MockAccessory::new(SETUP_CODE);

        let result = PairSetupClient::new(&mut accessory, &controller, "");
        assert!(matches!(
            result,
            Err(Error::Pairing(PairingError::InvalidArgument(_)))
        ));
        assert!(accessory.states_seen.is_empty());
    }

    #[tokio::test]
    async fn with_auth_announces_method_1() {
        struct CaptureM1 {
            method_byte: Option<u8>,
        }

        #[async_trait]
        impl Transport for CaptureM1 {
            async fn post(&mut self, _: &str, _: &str, body: &[u8]) -> Result<Vec<u8>> {
                let request = Tlv8::parse(body).unwrap();
                self.method_byte = request.get(TlvType::Method).map(|m| m[0]);
                // Cut the exchange short with an accessory error.
                let mut tlv = Tlv8::new();
                tlv.set(TlvType::State, vec![0x02]);
                tlv.set(TlvType::Error, vec![0x07]);
                Ok(tlv.encode())
            }
        }

        let controller = ControllerIdentity::generate();
        let mut transport = CaptureM1 { method_byte: None };
        let client = PairSetupClient::with_auth(&mut transport, &controller, SETUP_CODE).unwrap();
        let _ = client.pair().await;

        assert_eq!(transport.method_byte, Some(0x01));
    }
}
