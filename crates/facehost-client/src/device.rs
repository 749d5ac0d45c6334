//! `Device`: the public command dispatcher. One command
//! packet per operation, a loop pumping inbound event packets to user
//! callbacks, terminating on a `Result` packet, a fatal error, or a set
//! cancel flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use facehost_core::{Session, SessionState};
use facehost_crypto::SigningKeyPair;
use facehost_license::{LicenseClient, LicenseKeyStore, LicenseRequest};
use facehost_proto::{Packet, PacketKind};
use facehost_transport::SerialTransport;

use crate::callbacks::{FacesDetected, Hint, OperationCallbacks, OperationResult, Pose};
use crate::config::DeviceConfig;
use crate::error::{ClientError, Result, StatusKind};
use crate::link::PacketLink;
use crate::profile::LoopIntervals;
use crate::timeouts;
use crate::wire;

enum Mode {
    Insecure,
    /// The bootstrap key bytes, kept outside `Session` so `Unpair` can hand
    /// the session a fresh keypair built from the same long-term secret.
    Secure { bootstrap_key_bytes: [u8; 32] },
}

/// One connected (or not-yet-connected) device.
pub struct Device {
    mode: Mode,
    session: Session,
    link: Option<PacketLink>,
    cancel: Arc<AtomicBool>,
    intervals: LoopIntervals,
    license_client: Option<LicenseClient>,
    license_store: LicenseKeyStore,
}

impl Device {
    /// A device reached over a non-secure (unencrypted) session.
    #[must_use]
    pub fn insecure(license_store: LicenseKeyStore) -> Self {
        Self {
            mode: Mode::Insecure,
            session: Session::insecure(),
            link: None,
            cancel: Arc::new(AtomicBool::new(false)),
            intervals: LoopIntervals::non_secure(),
            license_client: None,
            license_store,
        }
    }

    /// A device reached over a paired, encrypted session.
    #[must_use]
    pub fn secure(bootstrap_key_bytes: [u8; 32], license_store: LicenseKeyStore) -> Result<Self> {
        let bootstrap_key = SigningKeyPair::from_bytes(&bootstrap_key_bytes)?;
        Ok(Self {
            mode: Mode::Secure { bootstrap_key_bytes },
            session: Session::secure(bootstrap_key),
            link: None,
            cancel: Arc::new(AtomicBool::new(false)),
            intervals: LoopIntervals::secure(),
            license_client: None,
            license_store,
        })
    }

    /// Attach a license client; without one, `LicenseRequest` events
    /// terminate the in-flight operation with [`StatusKind::LicenseError`].
    pub fn with_license_client(&mut self, client: LicenseClient) {
        self.license_client = Some(client);
    }

    /// A clone of the cancel flag, for a writer thread to call
    /// [`Device::cancel`] while the main thread is blocked in a read.
    #[must_use]
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Open the transport and probe the device with a ping. Idempotent.
    pub fn connect(&mut self, port_name: &str) -> Result<()> {
        if self.link.is_some() {
            return Ok(());
        }
        let transport = SerialTransport::open(port_name)?;
        self.attach(transport)
    }

    /// As [`Device::connect`], but over an already-built transport rather
    /// than one opened by OS port name. Lets a test harness hand in a
    /// simulated transport in place of a real serial port.
    pub fn attach(&mut self, transport: SerialTransport) -> Result<()> {
        if self.link.is_some() {
            return Ok(());
        }
        let link = PacketLink::new(transport);
        let deadline = Instant::now() + timeouts::CONNECT_PROBE;
        let ping = Packet::new(PacketKind::DataRequest, 0, wire::opcode_only_body(wire::Opcode::Ping));
        link.send(&ping, deadline)?;
        let reply = link.recv(deadline)?;
        self.link = Some(link);
        match wire::decode_result(&reply.payload) {
            Some(result) if result.status == StatusKind::Ok => Ok(()),
            Some(result) => Err(ClientError::DeviceResult(result.status)),
            None => Ok(()),
        }
    }

    /// Close the transport. Safe to call when never connected.
    pub fn disconnect(&mut self) {
        self.link = None;
    }

    /// The underlying transport, for callers that need to hand it to
    /// another protocol layer (the firmware updater takes the port over
    /// exclusively for the duration of an update).
    #[must_use]
    pub fn transport(&self) -> Option<&SerialTransport> {
        self.link.as_ref().map(PacketLink::transport)
    }

    fn link(&self) -> Result<&PacketLink> {
        self.link.as_ref().ok_or(ClientError::NotConnected)
    }

    /// One-time pairing handshake (secure mode only): exchange operational
    /// keys, then perform the ephemeral ECDH session-key exchange.
    pub fn pair(&mut self) -> Result<()> {
        let deadline = Instant::now() + timeouts::SIMPLE_REPLY;

        let envelope_bytes = self.session.begin_pairing()?;
        let envelope_packet = Packet::new(PacketKind::DataRequest, 0, envelope_bytes);
        self.link()?.send(&envelope_packet, deadline)?;
        let device_envelope = self.link.as_mut().ok_or(ClientError::NotConnected)?.recv(deadline)?;
        self.session.complete_pairing(&device_envelope.payload)?;

        let (ephemeral, public_bytes) = self.session.start_session()?;
        let start_packet = Packet::new(PacketKind::DataRequest, 1, public_bytes.clone());
        self.link()?.send(&start_packet, deadline)?;
        let device_ephemeral = self.link.as_mut().ok_or(ClientError::NotConnected)?.recv(deadline)?;
        self.session.complete_session_start(ephemeral, &device_ephemeral.payload, &public_bytes)?;

        Ok(())
    }

    /// Reset device-side key state and return this side to
    /// `AwaitingPairing`.
    pub fn unpair(&mut self) -> Result<()> {
        let Mode::Secure { bootstrap_key_bytes } = &self.mode else {
            return Ok(());
        };
        let bootstrap_key = SigningKeyPair::from_bytes(bootstrap_key_bytes)?;
        self.run_simple(wire::opcode_only_body(wire::Opcode::Unpair), timeouts::SIMPLE_REPLY)?;
        self.session.unpair(bootstrap_key);
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Set the cancel flag and send an out-of-band `Cancel` packet.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
        if let Ok(link) = self.link() {
            let packet = Packet::new(PacketKind::Cancel, 0, Vec::new());
            let _ = link.send(&packet, Instant::now() + timeouts::SIMPLE_REPLY);
        }
    }

    fn clear_cancel(&self) {
        self.cancel.store(false, Ordering::Release);
    }

    /// Drive one command through to its terminal `Result`, surfacing every
    /// intervening event to `callbacks` and transparently answering
    /// `LicenseRequest` events along the way.
    fn run_operation<C: OperationCallbacks>(
        &mut self,
        body: Vec<u8>,
        callbacks: &mut C,
        step_timeout: Duration,
    ) -> Result<OperationResult> {
        let deadline = Instant::now() + step_timeout;
        let request = self.session.seal(PacketKind::DataRequest, &body)?;
        self.link()?.send(&request, deadline)?;

        loop {
            if self.cancel.load(Ordering::Acquire) {
                let cancel_packet = Packet::new(PacketKind::Cancel, 0, Vec::new());
                self.link()?.send(&cancel_packet, deadline)?;
            }

            let step_deadline = Instant::now() + step_timeout;
            let packet = self.link.as_mut().ok_or(ClientError::NotConnected)?.recv(step_deadline)?;
            let plaintext = self.session.open(&packet)?;

            match packet.kind {
                PacketKind::Progress => {
                    if let Some(pose) = wire::decode_progress(&plaintext) {
                        callbacks.on_progress(pose);
                    }
                },
                PacketKind::Hint => {
                    if let Some(hint) = wire::decode_hint(&plaintext) {
                        callbacks.on_hint(hint);
                    }
                },
                PacketKind::FaceDetected => {
                    if let Some(faces) = wire::decode_faces_detected(&plaintext) {
                        callbacks.on_faces_detected(&faces);
                    }
                },
                PacketKind::LicenseRequest => {
                    self.answer_license_request(&plaintext, deadline)?;
                },
                PacketKind::Result | PacketKind::DataReply => {
                    let result = wire::decode_result(&plaintext)
                        .ok_or_else(|| ClientError::InvalidArgument("malformed Result payload".into()))?;
                    callbacks.on_result(&result);
                    return Ok(result);
                },
                _ => {},
            }
        }
    }

    fn answer_license_request(&mut self, body: &[u8], deadline: Instant) -> Result<()> {
        let request = LicenseRequest::parse(body)
            .ok_or_else(|| ClientError::InvalidArgument("malformed LicenseRequest".into()))?;
        let client = self
            .license_client
            .as_ref()
            .ok_or_else(|| ClientError::DeviceResult(StatusKind::LicenseError))?;
        let key = self.license_store.load_key()?;
        let checked = client.check_license(&key, &request)?;
        let reply = self.session.seal(PacketKind::LicenseReply, &checked.payload)?;
        self.link()?.send(&reply, deadline)?;
        Ok(())
    }

    fn run_simple(&mut self, body: Vec<u8>, timeout: Duration) -> Result<OperationResult> {
        struct Silent;
        impl OperationCallbacks for Silent {}
        self.clear_cancel();
        self.run_operation(body, &mut Silent, timeout)
    }

    /// Stream the device's enrollment events for `user_id` until a
    /// terminal `Result`.
    pub fn enroll<C: OperationCallbacks>(&mut self, user_id: &str, callbacks: &mut C) -> Result<OperationResult> {
        validate_user_id(user_id)?;
        self.clear_cancel();
        self.run_operation(wire::user_id_body(wire::Opcode::Enroll, user_id), callbacks, timeouts::ENROLLMENT_STEP)
    }

    /// As [`Device::enroll`], but the host streams the image bytes itself.
    pub fn enroll_image<C: OperationCallbacks>(
        &mut self,
        user_id: &str,
        rgb: &[u8],
        width: u16,
        height: u16,
        callbacks: &mut C,
    ) -> Result<OperationResult> {
        validate_user_id(user_id)?;
        self.clear_cancel();
        let body = wire::enroll_image_body(user_id, width, height, rgb);
        self.run_operation(body, callbacks, timeouts::ENROLLMENT_STEP)
    }

    /// Run one authentication attempt.
    pub fn authenticate<C: OperationCallbacks>(&mut self, callbacks: &mut C) -> Result<OperationResult> {
        self.clear_cancel();
        self.run_operation(
            wire::opcode_only_body(wire::Opcode::Authenticate),
            callbacks,
            timeouts::AUTHENTICATION_STEP,
        )
    }

    /// Repeat [`Device::authenticate`] until [`Device::cancel`] is called.
    /// Sleeps between attempts according to whether the last attempt saw a
    /// face, polling the cancel flag at least every 100 ms.
    pub fn authenticate_loop<C: OperationCallbacks>(&mut self, callbacks: &mut C) -> Result<OperationResult> {
        self.clear_cancel();
        let mut last_result = OperationResult { status: StatusKind::Ok, user_id: None };
        loop {
            if self.cancel.load(Ordering::Acquire) {
                return Ok(last_result);
            }

            let mut tracker = FaceTracker { inner: callbacks, saw_face: false };
            let attempt = self.run_operation(
                wire::opcode_only_body(wire::Opcode::Authenticate),
                &mut tracker,
                timeouts::AUTHENTICATION_STEP,
            );
            let saw_face = tracker.saw_face;

            match attempt {
                Ok(result) => last_result = result,
                Err(e) if e.status_kind() == StatusKind::SerialError => return Err(e),
                Err(_) => {},
            }

            if self.cancel.load(Ordering::Acquire) {
                return Ok(last_result);
            }

            let sleep_for = if saw_face { self.intervals.with_face } else { self.intervals.no_face };
            self.sleep_cancellable(sleep_for);
        }
    }

    fn sleep_cancellable(&self, duration: Duration) {
        let poll = self.intervals.cancel_poll_interval();
        let mut remaining = duration;
        while remaining > Duration::ZERO {
            if self.cancel.load(Ordering::Acquire) {
                return;
            }
            let step = poll.min(remaining);
            std::thread::sleep(step);
            remaining -= step;
        }
    }

    pub fn remove_user<C: OperationCallbacks>(&mut self, user_id: &str, callbacks: &mut C) -> Result<OperationResult> {
        validate_user_id(user_id)?;
        self.clear_cancel();
        self.run_operation(wire::user_id_body(wire::Opcode::RemoveUser, user_id), callbacks, timeouts::SIMPLE_REPLY)
    }

    pub fn remove_all(&mut self) -> Result<OperationResult> {
        self.run_simple(wire::opcode_only_body(wire::Opcode::RemoveAll), timeouts::SIMPLE_REPLY)
    }

    pub fn set_device_config(&mut self, config: &DeviceConfig) -> Result<OperationResult> {
        self.run_simple(wire::device_config_body(config), timeouts::SIMPLE_REPLY)
    }

    /// Query the device's effective configuration. `QueryDeviceConfig`
    /// answers with a single `DataReply` carrying the config body directly,
    /// rather than going through the generic `Result`-terminated loop.
    pub fn query_device_config(&mut self) -> Result<DeviceConfig> {
        let deadline = Instant::now() + timeouts::SIMPLE_REPLY;
        self.clear_cancel();
        let request =
            self.session.seal(PacketKind::DataRequest, &wire::opcode_only_body(wire::Opcode::QueryDeviceConfig))?;
        self.link()?.send(&request, deadline)?;
        let reply = self.link.as_mut().ok_or(ClientError::NotConnected)?.recv(deadline)?;
        let plaintext = self.session.open(&reply)?;
        wire::decode_device_config(&plaintext)
            .ok_or_else(|| ClientError::InvalidArgument("malformed DeviceConfig reply".into()))
    }

    /// Enrolled user ids, in device-reported order.
    pub fn query_user_ids(&mut self) -> Result<Vec<String>> {
        let deadline = Instant::now() + timeouts::SIMPLE_REPLY;
        self.clear_cancel();
        let request =
            self.session.seal(PacketKind::DataRequest, &wire::opcode_only_body(wire::Opcode::QueryUserIds))?;
        self.link()?.send(&request, deadline)?;
        let reply = self.link.as_mut().ok_or(ClientError::NotConnected)?.recv(deadline)?;
        let plaintext = self.session.open(&reply)?;
        Ok(wire::decode_user_ids(&plaintext))
    }

    /// Count of enrolled users.
    pub fn query_number_of_users(&mut self) -> Result<u32> {
        let deadline = Instant::now() + timeouts::SIMPLE_REPLY;
        self.clear_cancel();
        let request = self
            .session
            .seal(PacketKind::DataRequest, &wire::opcode_only_body(wire::Opcode::QueryNumberOfUsers))?;
        self.link()?.send(&request, deadline)?;
        let reply = self.link.as_mut().ok_or(ClientError::NotConnected)?.recv(deadline)?;
        let plaintext = self.session.open(&reply)?;
        wire::decode_user_count(&plaintext)
            .ok_or_else(|| ClientError::InvalidArgument("malformed user-count reply".into()))
    }

    /// Host-matching variant of [`Device::enroll`]: the device returns a
    /// [`facehost_matcher::Faceprints`] payload instead of performing the
    /// match itself.
    pub fn extract_faceprints_for_enroll<C: OperationCallbacks>(
        &mut self,
        user_id: &str,
        callbacks: &mut C,
    ) -> Result<facehost_matcher::Faceprints> {
        validate_user_id(user_id)?;
        self.clear_cancel();
        self.run_operation(
            wire::user_id_body(wire::Opcode::ExtractFaceprintsForEnroll, user_id),
            callbacks,
            timeouts::ENROLLMENT_STEP,
        )?;
        self.fetch_faceprints_reply()
    }

    /// Host-matching variant of [`Device::authenticate`].
    pub fn extract_faceprints_for_auth<C: OperationCallbacks>(
        &mut self,
        callbacks: &mut C,
    ) -> Result<facehost_matcher::Faceprints> {
        self.clear_cancel();
        self.run_operation(
            wire::opcode_only_body(wire::Opcode::ExtractFaceprintsForAuth),
            callbacks,
            timeouts::AUTHENTICATION_STEP,
        )?;
        self.fetch_faceprints_reply()
    }

    /// Host-matching variant of [`Device::authenticate_loop`]: returns the
    /// feature vector from the first attempt in which the device reports a
    /// detected face, or stops early when cancelled.
    pub fn extract_faceprints_for_auth_loop<C: OperationCallbacks>(
        &mut self,
        callbacks: &mut C,
    ) -> Result<Option<facehost_matcher::Faceprints>> {
        self.clear_cancel();
        loop {
            if self.cancel.load(Ordering::Acquire) {
                return Ok(None);
            }
            let mut tracker = FaceTracker { inner: callbacks, saw_face: false };
            let attempt = self.run_operation(
                wire::opcode_only_body(wire::Opcode::ExtractFaceprintsForAuth),
                &mut tracker,
                timeouts::AUTHENTICATION_STEP,
            );
            let saw_face = tracker.saw_face;
            if let Ok(_result) = attempt {
                if saw_face {
                    return Ok(Some(self.fetch_faceprints_reply()?));
                }
            }
            if self.cancel.load(Ordering::Acquire) {
                return Ok(None);
            }
            let sleep_for = if saw_face { self.intervals.with_face } else { self.intervals.no_face };
            self.sleep_cancellable(sleep_for);
        }
    }

    /// Reads one more `DataReply` carrying the feature vector the prior
    /// `Result` promised, used by the `ExtractFaceprintsFor*` family.
    fn fetch_faceprints_reply(&mut self) -> Result<facehost_matcher::Faceprints> {
        let deadline = Instant::now() + timeouts::SIMPLE_REPLY;
        let reply = self.link.as_mut().ok_or(ClientError::NotConnected)?.recv(deadline)?;
        let plaintext = self.session.open(&reply)?;
        wire::decode_faceprints(&plaintext)
            .ok_or_else(|| ClientError::InvalidArgument("malformed Faceprints reply".into()))
    }

    /// Read back a user's stored faceprints.
    pub fn get_users_faceprints(&mut self, user_id: &str) -> Result<facehost_matcher::Faceprints> {
        validate_user_id(user_id)?;
        let deadline = Instant::now() + timeouts::SIMPLE_REPLY;
        self.clear_cancel();
        let request = self
            .session
            .seal(PacketKind::DataRequest, &wire::user_id_body(wire::Opcode::GetUsersFaceprints, user_id))?;
        self.link()?.send(&request, deadline)?;
        self.fetch_faceprints_reply()
    }

    /// Push host-computed faceprints to the device, e.g. after host-side
    /// matching decided to update the gallery.
    pub fn set_users_faceprints(
        &mut self,
        user_id: &str,
        faceprints: &facehost_matcher::Faceprints,
    ) -> Result<OperationResult> {
        validate_user_id(user_id)?;
        let body = wire::encode_faceprints(user_id, faceprints);
        self.run_simple(body, timeouts::SIMPLE_REPLY)
    }

    pub fn standby(&mut self) -> Result<OperationResult> {
        self.run_simple(wire::opcode_only_body(wire::Opcode::Standby), timeouts::SIMPLE_REPLY)
    }

    pub fn hibernate(&mut self) -> Result<OperationResult> {
        self.run_simple(wire::opcode_only_body(wire::Opcode::Hibernate), timeouts::SIMPLE_REPLY)
    }

    pub fn unlock(&mut self) -> Result<OperationResult> {
        self.run_simple(wire::opcode_only_body(wire::Opcode::Unlock), timeouts::SIMPLE_REPLY)
    }
}

/// Forwards every callback to `inner` while additionally noting whether a
/// face was seen, for `AuthenticateLoop`'s sleep-interval choice.
struct FaceTracker<'a, C: OperationCallbacks> {
    inner: &'a mut C,
    saw_face: bool,
}

impl<C: OperationCallbacks> OperationCallbacks for FaceTracker<'_, C> {
    fn on_progress(&mut self, pose: Pose) {
        self.inner.on_progress(pose);
    }

    fn on_hint(&mut self, hint: Hint) {
        self.inner.on_hint(hint);
    }

    fn on_faces_detected(&mut self, faces: &FacesDetected) {
        self.saw_face = true;
        self.inner.on_faces_detected(faces);
    }

    fn on_result(&mut self, result: &OperationResult) {
        self.inner.on_result(result);
    }
}

fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.is_empty() || user_id.len() > 30 {
        return Err(ClientError::InvalidArgument("user_id must be 1..=30 bytes".into()));
    }
    if user_id.chars().any(char::is_control) {
        return Err(ClientError::InvalidArgument("user_id must not contain control characters".into()));
    }
    Ok(())
}
