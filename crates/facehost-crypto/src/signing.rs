//! ECDSA (P-256) pairing: the host proves its operational public key with a
//! signature from a separately-provisioned bootstrap key, and persists
//! whatever public key the device replies with.

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand_core::OsRng;

use crate::error::{CryptoError, Result};

/// Uncompressed SEC1 point encoding of a P-256 public key.
pub const PUBLIC_KEY_SIZE: usize = 65;
/// Fixed-size (r, s) ECDSA signature encoding.
pub const SIGNATURE_SIZE: usize = 64;

/// A long-lived ECDSA keypair, used both for the factory-provisioned
/// bootstrap identity and for the per-pairing operational identity.
pub struct SigningKeyPair {
    signing_key: SigningKey,
}

impl SigningKeyPair {
    /// Generate a fresh keypair. Used for the operational identity created
    /// at pairing time; the bootstrap keypair is provisioned out of band.
    #[must_use]
    pub fn generate() -> Self {
        Self { signing_key: SigningKey::random(&mut OsRng) }
    }

    /// Reconstruct a keypair from a raw 32-byte scalar, e.g. one loaded
    /// from persisted bootstrap key material.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let signing_key = SigningKey::from_bytes(bytes.into()).map_err(|_| CryptoError::KeyEncoding)?;
        Ok(Self { signing_key })
    }

    #[must_use]
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_SIZE] {
        encode_public_key(self.signing_key.verifying_key())
    }

    /// The raw signing key, for callers that need to seal [`crate::SecureFrame`]s directly.
    #[must_use]
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Sign an arbitrary message with this keypair.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        let signature: Signature = self.signing_key.sign(message);
        signature.to_bytes().into()
    }
}

fn encode_public_key(key: &VerifyingKey) -> [u8; PUBLIC_KEY_SIZE] {
    let point = key.to_encoded_point(false);
    let mut out = [0u8; PUBLIC_KEY_SIZE];
    out.copy_from_slice(point.as_bytes());
    out
}

fn decode_public_key(bytes: &[u8]) -> Result<VerifyingKey> {
    VerifyingKey::from_sec1_bytes(bytes).map_err(|_| CryptoError::KeyEncoding)
}

/// Parse a raw uncompressed SEC1 public key, e.g. the device's pairing
/// reply or the plain (unsigned) public key the device sends back.
pub fn parse_verifying_key(bytes: &[u8; PUBLIC_KEY_SIZE]) -> Result<VerifyingKey> {
    decode_public_key(bytes)
}

/// The host's operational public key together with the bootstrap
/// signature vouching for it, sent once during pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingEnvelope {
    /// The host's freshly generated operational public key.
    pub public_key: [u8; PUBLIC_KEY_SIZE],
    /// Bootstrap-key signature over `public_key`.
    pub signature: [u8; SIGNATURE_SIZE],
}

/// Build the envelope the host sends during pairing: its freshly generated
/// operational public key, signed by the bootstrap key.
#[must_use]
pub fn sign_pairing_envelope(bootstrap_key: &SigningKeyPair, operational: &SigningKeyPair) -> PairingEnvelope {
    let public_key = operational.public_key();
    let signature = bootstrap_key.sign(&public_key);
    PairingEnvelope { public_key, signature }
}

/// Verify a pairing envelope against a known bootstrap public key, returning
/// the operational [`VerifyingKey`] to persist on success.
pub fn verify_pairing_envelope(
    bootstrap_public_key: &[u8; PUBLIC_KEY_SIZE],
    envelope: &PairingEnvelope,
) -> Result<VerifyingKey> {
    let bootstrap = decode_public_key(bootstrap_public_key)?;
    let signature =
        Signature::from_slice(&envelope.signature).map_err(|_| CryptoError::PairingSignatureInvalid)?;
    bootstrap
        .verify(&envelope.public_key, &signature)
        .map_err(|_| CryptoError::PairingSignatureInvalid)?;
    decode_public_key(&envelope.public_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairing_envelope_round_trip() {
        let bootstrap = SigningKeyPair::generate();
        let operational = SigningKeyPair::generate();

        let envelope = sign_pairing_envelope(&bootstrap, &operational);
        let verified = verify_pairing_envelope(&bootstrap.public_key(), &envelope).unwrap();

        assert_eq!(verified.to_encoded_point(false).as_bytes(), operational.public_key());
    }

    #[test]
    fn tampered_public_key_fails_verification() {
        let bootstrap = SigningKeyPair::generate();
        let operational = SigningKeyPair::generate();

        let mut envelope = sign_pairing_envelope(&bootstrap, &operational);
        envelope.public_key[10] ^= 0xFF;

        assert_eq!(
            verify_pairing_envelope(&bootstrap.public_key(), &envelope),
            Err(CryptoError::PairingSignatureInvalid)
        );
    }

    #[test]
    fn wrong_bootstrap_key_fails_verification() {
        let bootstrap = SigningKeyPair::generate();
        let impostor = SigningKeyPair::generate();
        let operational = SigningKeyPair::generate();

        let envelope = sign_pairing_envelope(&impostor, &operational);
        let result = verify_pairing_envelope(&bootstrap.public_key(), &envelope);
        assert!(result.is_err());
    }
}
