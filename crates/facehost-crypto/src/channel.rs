//! Authenticated, encrypted framing for the secure session: every outbound
//! payload is encrypted under the ECDH session key and signed with the
//! paired ECDSA key; every inbound payload is verified then decrypted.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use zeroize::Zeroize;

use crate::error::{CryptoError, Result};

/// A sealed frame ready to place in a packet payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureFrame {
    /// Monotonic send counter at the time of sealing; doubles as the
    /// AEAD nonce source and part of the signed transcript.
    pub counter: u64,
    /// `ChaCha20Poly1305` output (ciphertext || tag).
    pub ciphertext: Vec<u8>,
    /// ECDSA signature over `counter || ciphertext`.
    pub signature: [u8; 64],
}

/// One direction's worth of replay-protected AEAD state, keyed by the
/// session key derived at session start. Hold one `SecureChannel` per
/// direction (send counter and receive counter are tracked independently
/// by the two peers).
pub struct SecureChannel {
    key: [u8; 32],
    send_counter: u64,
    recv_counter: u64,
}

impl SecureChannel {
    #[must_use]
    pub fn new(session_key: [u8; 32]) -> Self {
        Self { key: session_key, send_counter: 0, recv_counter: 0 }
    }

    /// Encrypt then sign `plaintext`, consuming the next send counter
    /// value. The counter is folded into both the AEAD nonce and the
    /// signed transcript so replays and reorderings are rejected by the
    /// peer.
    pub fn seal(&mut self, signing_key: &SigningKey, plaintext: &[u8]) -> Result<SecureFrame> {
        let counter = self.send_counter;
        self.send_counter = self.send_counter.checked_add(1).ok_or(CryptoError::CounterExhausted)?;

        let cipher = ChaCha20Poly1305::new((&self.key).into());
        let nonce = counter_nonce(counter);
        let ciphertext =
            cipher.encrypt(Nonce::from_slice(&nonce), plaintext).map_err(|_| CryptoError::DecryptionFailed)?;

        let signature: Signature = signing_key.sign(&signed_transcript(counter, &ciphertext));
        Ok(SecureFrame { counter, ciphertext, signature: signature.to_bytes().into() })
    }

    /// Verify then decrypt an inbound frame. Rejects non-monotonic
    /// counters (replay/reorder) and bad signatures before ever touching
    /// the AEAD key; a failed verification is fatal to the session rather
    /// than recoverable per-frame.
    pub fn open(&mut self, verifying_key: &VerifyingKey, frame: &SecureFrame) -> Result<Vec<u8>> {
        if frame.counter < self.recv_counter {
            return Err(CryptoError::ReplayDetected { expected: self.recv_counter, got: frame.counter });
        }

        let signature = Signature::from_slice(&frame.signature).map_err(|_| CryptoError::FrameSignatureInvalid)?;
        verifying_key
            .verify(&signed_transcript(frame.counter, &frame.ciphertext), &signature)
            .map_err(|_| CryptoError::FrameSignatureInvalid)?;

        let cipher = ChaCha20Poly1305::new((&self.key).into());
        let nonce = counter_nonce(frame.counter);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce), frame.ciphertext.as_slice())
            .map_err(|_| CryptoError::DecryptionFailed)?;

        self.recv_counter = frame.counter + 1;
        Ok(plaintext)
    }
}

impl Drop for SecureChannel {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// 12-byte `ChaCha20Poly1305` nonce built from the monotonic counter;
/// uniqueness comes from the counter rather than randomness, since both
/// sides keep independent monotonic counters for the life of the session.
fn counter_nonce(counter: u64) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[4..].copy_from_slice(&counter.to_be_bytes());
    nonce
}

fn signed_transcript(counter: u64, ciphertext: &[u8]) -> Vec<u8> {
    let mut transcript = Vec::with_capacity(8 + ciphertext.len());
    transcript.extend_from_slice(&counter.to_be_bytes());
    transcript.extend_from_slice(ciphertext);
    transcript
}

/// Fixed prefix size of a [`SecureFrame`] wire encoding: 8-byte counter +
/// 64-byte signature, followed by the variable-length ciphertext.
const FRAME_PREFIX_SIZE: usize = 8 + 64;

impl SecureFrame {
    /// Serialize to `counter(8, LE) || signature(64) || ciphertext`, the
    /// form carried in a packet's payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FRAME_PREFIX_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.counter.to_le_bytes());
        out.extend_from_slice(&self.signature);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse a [`SecureFrame`] from its wire encoding.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FRAME_PREFIX_SIZE {
            return Err(CryptoError::KeyEncoding);
        }
        let counter = u64::from_le_bytes(bytes[0..8].try_into().unwrap_or([0; 8]));
        let mut signature = [0u8; 64];
        signature.copy_from_slice(&bytes[8..FRAME_PREFIX_SIZE]);
        let ciphertext = bytes[FRAME_PREFIX_SIZE..].to_vec();
        Ok(Self { counter, ciphertext, signature })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::SigningKey;
    use rand_core::OsRng;

    #[test]
    fn seal_open_round_trip() {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = *signing_key.verifying_key();
        let mut sender = SecureChannel::new([0x11; 32]);
        let mut receiver = SecureChannel::new([0x11; 32]);

        let frame = sender.seal(&signing_key, b"authenticate request").unwrap();
        let plaintext = receiver.open(&verifying_key, &frame).unwrap();

        assert_eq!(plaintext, b"authenticate request");
    }

    #[test]
    fn replayed_frame_is_rejected() {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = *signing_key.verifying_key();
        let mut sender = SecureChannel::new([0x22; 32]);
        let mut receiver = SecureChannel::new([0x22; 32]);

        let frame = sender.seal(&signing_key, b"ping").unwrap();
        receiver.open(&verifying_key, &frame).unwrap();

        let replay = receiver.open(&verifying_key, &frame);
        assert!(matches!(replay, Err(CryptoError::ReplayDetected { .. })));
    }

    #[test]
    fn tampered_ciphertext_fails_signature_check() {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = *signing_key.verifying_key();
        let mut sender = SecureChannel::new([0x33; 32]);
        let mut receiver = SecureChannel::new([0x33; 32]);

        let mut frame = sender.seal(&signing_key, b"command").unwrap();
        frame.ciphertext[0] ^= 0xFF;

        assert_eq!(
            receiver.open(&verifying_key, &frame),
            Err(CryptoError::FrameSignatureInvalid)
        );
    }

    #[test]
    fn wrong_verifying_key_is_rejected() {
        let signing_key = SigningKey::random(&mut OsRng);
        let impostor_key = SigningKey::random(&mut OsRng);
        let mut sender = SecureChannel::new([0x44; 32]);
        let mut receiver = SecureChannel::new([0x44; 32]);

        let frame = sender.seal(&signing_key, b"cancel").unwrap();
        let result = receiver.open(impostor_key.verifying_key(), &frame);
        assert_eq!(result, Err(CryptoError::FrameSignatureInvalid));
    }

    #[test]
    fn frame_wire_encoding_round_trips() {
        let signing_key = SigningKey::random(&mut OsRng);
        let mut sender = SecureChannel::new([0x66; 32]);
        let frame = sender.seal(&signing_key, b"dlinit RECOG sz=4096").unwrap();

        let bytes = frame.encode();
        let decoded = SecureFrame::decode(&bytes).unwrap();

        assert_eq!(decoded, frame);
    }

    #[test]
    fn out_of_order_frames_are_accepted_once_each() {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = *signing_key.verifying_key();
        let mut sender = SecureChannel::new([0x55; 32]);
        let mut receiver = SecureChannel::new([0x55; 32]);

        let first = sender.seal(&signing_key, b"one").unwrap();
        let second = sender.seal(&signing_key, b"two").unwrap();

        receiver.open(&verifying_key, &second).unwrap();
        // First frame's counter is now behind recv_counter: rejected.
        assert!(matches!(
            receiver.open(&verifying_key, &first),
            Err(CryptoError::ReplayDetected { .. })
        ));
    }
}
