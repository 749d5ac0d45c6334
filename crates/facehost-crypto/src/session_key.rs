//! Ephemeral ECDH key agreement and HKDF session-key derivation for the
//! session-start handshake.

use hkdf::Hkdf;
use p256::ecdh::EphemeralSecret;
use p256::{EncodedPoint, PublicKey};
use rand_core::OsRng;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{CryptoError, Result};
use crate::signing::PUBLIC_KEY_SIZE;

/// Label distinguishing session-key derivation from any other HKDF use of
/// the same shared secret.
const SESSION_KEY_LABEL: &[u8] = b"facehost-session-v1";

/// One half of an ephemeral ECDH exchange. Consumed on use: a session key is
/// derived exactly once, then the secret is dropped.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
}

impl EphemeralKeyPair {
    #[must_use]
    pub fn generate() -> Self {
        Self { secret: EphemeralSecret::random(&mut OsRng) }
    }

    #[must_use]
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_SIZE] {
        let point = EncodedPoint::from(self.secret.public_key());
        let mut out = [0u8; PUBLIC_KEY_SIZE];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Complete the exchange with the peer's ephemeral public key, deriving
    /// a 32-byte symmetric session key via HKDF-SHA256 over the ECDH shared
    /// secret. Both sides must pass the same two public keys in the same
    /// order (e.g. host-then-device) so they derive an identical key.
    pub fn derive_session_key(
        self,
        peer_public: &[u8; PUBLIC_KEY_SIZE],
        transcript: &[u8],
    ) -> Result<[u8; 32]> {
        let peer_key = PublicKey::from_sec1_bytes(peer_public).map_err(|_| CryptoError::KeyEncoding)?;

        let shared = self.secret.diffie_hellman(&peer_key);
        let mut shared_bytes = [0u8; 32];
        shared_bytes.copy_from_slice(shared.raw_secret_bytes().as_slice());
        if shared_bytes.iter().all(|&b| b == 0) {
            return Err(CryptoError::WeakSharedSecret);
        }

        let mut info = Vec::with_capacity(SESSION_KEY_LABEL.len() + transcript.len());
        info.extend_from_slice(SESSION_KEY_LABEL);
        info.extend_from_slice(transcript);

        let hkdf = Hkdf::<Sha256>::new(None, &shared_bytes);
        let mut key = [0u8; 32];
        let result = hkdf.expand(&info, &mut key).map_err(|_| CryptoError::KeyEncoding);
        shared_bytes.zeroize();
        result?;
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_sides_derive_the_same_session_key() {
        let host = EphemeralKeyPair::generate();
        let device = EphemeralKeyPair::generate();

        let host_pub = host.public_key();
        let device_pub = device.public_key();
        let transcript = b"pairing-transcript";

        let host_key = host.derive_session_key(&device_pub, transcript).unwrap();
        let device_key = device.derive_session_key(&host_pub, transcript).unwrap();

        assert_eq!(host_key, device_key);
    }

    #[test]
    fn different_transcripts_produce_different_keys() {
        let host = EphemeralKeyPair::generate();
        let device_pub = EphemeralKeyPair::generate().public_key();

        let host2 = EphemeralKeyPair::generate();
        let host2_pub = host2.public_key();

        let key_a = host.derive_session_key(&device_pub, b"transcript-a").unwrap();
        let key_b = host2.derive_session_key(&device_pub, b"transcript-b").unwrap();

        assert_ne!(key_a, key_b);
    }

    #[test]
    fn malformed_peer_key_is_rejected() {
        let host = EphemeralKeyPair::generate();
        let bogus = [0u8; PUBLIC_KEY_SIZE];
        assert_eq!(host.derive_session_key(&bogus, b""), Err(CryptoError::KeyEncoding));
    }
}
