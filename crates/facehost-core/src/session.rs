//! Session state machine: non-secure sessions pass packets
//! through verbatim, secure sessions pair once then derive a fresh
//! ECDH session key per connection and encrypt+sign every payload.
//!
//! Kept as a pure state machine: every method takes its input as a
//! parameter and returns either a value for the caller to send or an
//! error. No I/O happens here; callers own the transport.

use bytes::Bytes;
use facehost_crypto::{
    parse_verifying_key, sign_pairing_envelope, verify_pairing_envelope, CryptoError,
    EphemeralKeyPair, PairingEnvelope, SecureChannel, SecureFrame, SigningKeyPair, VerifyingKey,
    PUBLIC_KEY_SIZE,
};
use facehost_proto::{Packet, PacketKind};

use crate::error::{Result, SessionError};

/// Where a session currently stands. Secure sessions pass through
/// `AwaitingPairing` and `AwaitingSessionStart` once; non-secure sessions
/// go straight to `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingPairing,
    AwaitingSessionStart,
    Ready,
    Closed,
}

enum Mode {
    Insecure,
    Secure(SecureMode),
}

enum SecureMode {
    AwaitingPairing { bootstrap_key: SigningKeyPair },
    AwaitingDeviceKey { operational_key: SigningKeyPair },
    AwaitingSessionStart { operational_key: SigningKeyPair, peer_verifying_key: VerifyingKey },
    Ready { channel: Established },
    Closed,
}

struct Established {
    operational_key: SigningKeyPair,
    peer_verifying_key: VerifyingKey,
    tx: SecureChannel,
    rx: SecureChannel,
}

/// A single serial session: either a verbatim pass-through, or a paired
/// and key-established secure channel.
pub struct Session {
    mode: Mode,
    next_seq: u16,
}

impl Session {
    /// A non-secure session: packets are framed but never encrypted.
    #[must_use]
    pub fn insecure() -> Self {
        Self { mode: Mode::Insecure, next_seq: 0 }
    }

    /// A secure session awaiting its one-time pairing handshake.
    #[must_use]
    pub fn secure(bootstrap_key: SigningKeyPair) -> Self {
        Self { mode: Mode::Secure(SecureMode::AwaitingPairing { bootstrap_key }), next_seq: 0 }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        match &self.mode {
            Mode::Insecure => SessionState::Ready,
            Mode::Secure(SecureMode::AwaitingPairing { .. } | SecureMode::AwaitingDeviceKey { .. }) => {
                SessionState::AwaitingPairing
            },
            Mode::Secure(SecureMode::AwaitingSessionStart { .. }) => SessionState::AwaitingSessionStart,
            Mode::Secure(SecureMode::Ready { .. }) => SessionState::Ready,
            Mode::Secure(SecureMode::Closed) => SessionState::Closed,
        }
    }

    /// Begin pairing: generates this session's operational ECDSA keypair
    /// and signs its public key with the bootstrap key. The returned
    /// envelope bytes are the payload of the `Pair` command packet.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidState`] if pairing already happened, or this
    /// is a non-secure session.
    pub fn begin_pairing(&mut self) -> Result<Vec<u8>> {
        let state = self.state();
        let Mode::Secure(SecureMode::AwaitingPairing { bootstrap_key }) =
            std::mem::replace(&mut self.mode, Mode::Secure(SecureMode::Closed))
        else {
            return Err(SessionError::InvalidState { state, operation: "begin_pairing" });
        };

        let operational_key = SigningKeyPair::generate();
        let envelope = sign_pairing_envelope(&bootstrap_key, &operational_key);
        let bytes = encode_envelope(&envelope);

        self.mode = Mode::Secure(SecureMode::AwaitingDeviceKey { operational_key });
        Ok(bytes)
    }

    /// Complete pairing once the device's reply (its raw ECDSA public key)
    /// arrives, persisting it for the lifetime of this session.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidState`] if called out of order; propagates
    /// [`facehost_crypto::CryptoError`] if the device's key is malformed.
    pub fn complete_pairing(&mut self, device_public_key: &[u8]) -> Result<()> {
        let state = self.state();
        let Mode::Secure(SecureMode::AwaitingDeviceKey { operational_key }) =
            std::mem::replace(&mut self.mode, Mode::Secure(SecureMode::Closed))
        else {
            return Err(SessionError::InvalidState { state, operation: "complete_pairing" });
        };

        let key_bytes: [u8; PUBLIC_KEY_SIZE] =
            device_public_key.try_into().map_err(|_| SessionError::Security(CryptoError::KeyEncoding))?;
        let peer_verifying_key = parse_verifying_key(&key_bytes)?;

        self.mode =
            Mode::Secure(SecureMode::AwaitingSessionStart { operational_key, peer_verifying_key });
        Ok(())
    }

    /// Start an ephemeral ECDH exchange, returning this side's ephemeral
    /// keypair (needed to finish the derivation) and its public key bytes
    /// to send as the `SessionStart` payload.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidState`] if pairing has not completed.
    pub fn start_session(&mut self) -> Result<(EphemeralKeyPair, Vec<u8>)> {
        match &self.mode {
            Mode::Secure(SecureMode::AwaitingSessionStart { .. }) => {
                let ephemeral = EphemeralKeyPair::generate();
                let public_bytes = ephemeral.public_key().to_vec();
                Ok((ephemeral, public_bytes))
            },
            _ => Err(SessionError::InvalidState { state: self.state(), operation: "start_session" }),
        }
    }

    /// Finish session start: derive the symmetric session key from this
    /// side's ephemeral secret and the device's ephemeral public key,
    /// transitioning to [`SessionState::Ready`].
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidState`] out of order; crypto errors on a
    /// malformed or degenerate peer key.
    pub fn complete_session_start(
        &mut self,
        ephemeral: EphemeralKeyPair,
        device_ephemeral_public: &[u8],
        transcript: &[u8],
    ) -> Result<()> {
        let state = self.state();
        let Mode::Secure(SecureMode::AwaitingSessionStart { operational_key, peer_verifying_key }) =
            std::mem::replace(&mut self.mode, Mode::Secure(SecureMode::Closed))
        else {
            return Err(SessionError::InvalidState { state, operation: "complete_session_start" });
        };

        let peer_key: [u8; PUBLIC_KEY_SIZE] = device_ephemeral_public
            .try_into()
            .map_err(|_| SessionError::Security(CryptoError::KeyEncoding))?;
        let session_key = ephemeral.derive_session_key(&peer_key, transcript)?;

        self.mode = Mode::Secure(SecureMode::Ready {
            channel: Established {
                operational_key,
                peer_verifying_key,
                tx: SecureChannel::new(session_key),
                rx: SecureChannel::new(session_key),
            },
        });
        Ok(())
    }

    /// Reset device-side key state: a dedicated `Unpair` drops the peer's
    /// verified key and the session key, returning to
    /// [`SessionState::AwaitingPairing`] with a fresh bootstrap key.
    pub fn unpair(&mut self, bootstrap_key: SigningKeyPair) {
        if matches!(self.mode, Mode::Secure(_)) {
            self.mode = Mode::Secure(SecureMode::AwaitingPairing { bootstrap_key });
        }
    }

    /// Frame (and, in secure mode, encrypt+sign) an outbound payload into a
    /// wire [`Packet`].
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidState`] if the session is not
    /// [`SessionState::Ready`].
    pub fn seal(&mut self, kind: PacketKind, payload: &[u8]) -> Result<Packet> {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        let wire_payload = match &mut self.mode {
            Mode::Insecure => Bytes::copy_from_slice(payload),
            Mode::Secure(SecureMode::Ready { channel }) => {
                let frame = channel.tx.seal(channel.operational_key.signing_key(), payload)?;
                Bytes::from(frame.encode())
            },
            _ => return Err(SessionError::InvalidState { state: self.state(), operation: "seal" }),
        };

        Ok(Packet::new(kind, seq, wire_payload))
    }

    /// Unframe (and, in secure mode, verify+decrypt) an inbound [`Packet`].
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidState`] if the session is not
    /// [`SessionState::Ready`]; [`SessionError::Security`] on a failed
    /// verification or decryption, which is fatal to the session — callers
    /// should treat it as equivalent to a `Close`.
    pub fn open(&mut self, packet: &Packet) -> Result<Vec<u8>> {
        match &mut self.mode {
            Mode::Insecure => Ok(packet.payload.to_vec()),
            Mode::Secure(SecureMode::Ready { channel }) => {
                let frame = SecureFrame::decode(&packet.payload)?;
                let plaintext = channel.rx.open(&channel.peer_verifying_key, &frame)?;
                Ok(plaintext)
            },
            _ => Err(SessionError::InvalidState { state: self.state(), operation: "open" }),
        }
    }
}

fn encode_envelope(envelope: &PairingEnvelope) -> Vec<u8> {
    let mut out = Vec::with_capacity(PUBLIC_KEY_SIZE + 64);
    out.extend_from_slice(&envelope.public_key);
    out.extend_from_slice(&envelope.signature);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pairs a host and a stand-in "device" session against each other,
    /// each holding the other's operational public key, ready to start the
    /// ECDH session-key exchange.
    fn paired_pair() -> (Session, Session) {
        let host_bootstrap = SigningKeyPair::generate();
        let host_bootstrap_public = host_bootstrap.public_key();
        let device_bootstrap = SigningKeyPair::generate();
        let device_bootstrap_public = device_bootstrap.public_key();

        let mut host = Session::secure(host_bootstrap);
        let host_envelope_bytes = host.begin_pairing().unwrap();

        let mut device = Session::secure(device_bootstrap);
        let device_envelope_bytes = device.begin_pairing().unwrap();

        let host_envelope = decode_envelope(&host_envelope_bytes);
        let device_envelope = decode_envelope(&device_envelope_bytes);

        let host_operational = verify_pairing_envelope(&host_bootstrap_public, &host_envelope).unwrap();
        let device_operational =
            verify_pairing_envelope(&device_bootstrap_public, &device_envelope).unwrap();

        device.complete_pairing(host_operational.to_encoded_point(false).as_bytes()).unwrap();
        host.complete_pairing(device_operational.to_encoded_point(false).as_bytes()).unwrap();

        (host, device)
    }

    fn decode_envelope(bytes: &[u8]) -> PairingEnvelope {
        PairingEnvelope {
            public_key: bytes[..PUBLIC_KEY_SIZE].try_into().unwrap(),
            signature: bytes[PUBLIC_KEY_SIZE..].try_into().unwrap(),
        }
    }

    #[test]
    fn pairing_then_session_start_reaches_ready() {
        let (mut host, mut device) = paired_pair();
        assert_eq!(host.state(), SessionState::AwaitingSessionStart);

        let (host_ephemeral, host_pub) = host.start_session().unwrap();
        let (device_ephemeral, device_pub) = device.start_session().unwrap();

        host.complete_session_start(host_ephemeral, &device_pub, b"transcript").unwrap();
        device.complete_session_start(device_ephemeral, &host_pub, b"transcript").unwrap();

        assert_eq!(host.state(), SessionState::Ready);
        assert_eq!(device.state(), SessionState::Ready);
    }

    #[test]
    fn sealed_packet_round_trips_through_paired_session() {
        let (mut host, mut device) = paired_pair();
        let (host_ephemeral, host_pub) = host.start_session().unwrap();
        let (device_ephemeral, device_pub) = device.start_session().unwrap();
        host.complete_session_start(host_ephemeral, &device_pub, b"transcript").unwrap();
        device.complete_session_start(device_ephemeral, &host_pub, b"transcript").unwrap();

        let packet = host.seal(PacketKind::Cmd, b"Authenticate").unwrap();
        let plaintext = device.open(&packet).unwrap();
        assert_eq!(plaintext, b"Authenticate");
    }

    #[test]
    fn insecure_session_passes_payload_through() {
        let mut session = Session::insecure();
        let packet = session.seal(PacketKind::Cmd, b"ping").unwrap();
        let payload = session.open(&packet).unwrap();
        assert_eq!(payload, b"ping");
    }

    #[test]
    fn seal_before_ready_is_rejected() {
        let mut session = Session::secure(SigningKeyPair::generate());
        assert!(matches!(session.seal(PacketKind::Cmd, b"x"), Err(SessionError::InvalidState { .. })));
    }

    #[test]
    fn unpair_returns_to_awaiting_pairing() {
        let (mut host, _device) = paired_pair();
        host.unpair(SigningKeyPair::generate());
        assert_eq!(host.state(), SessionState::AwaitingPairing);
    }
}
