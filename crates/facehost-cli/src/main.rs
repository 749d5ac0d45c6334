//! Command-line demo driver for the face-authentication SDK: wires
//! [`facehost_client::Device`] to a real serial port and a handful of
//! subcommands, one per dispatcher operation a human would drive by hand.

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use facehost_client::{Device, Hint, NoopCallbacks, OperationCallbacks, OperationResult, Pose};
use facehost_firmware::{parse_package, FirmwareUpdateEngine, SerialUpdateChannel};
use facehost_license::{LicenseClient, LicenseKeyStore};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Demo driver for the face-authentication host SDK.
#[derive(Parser, Debug)]
#[command(name = "facehost-cli")]
#[command(about = "Drive a face-auth module over a serial port")]
#[command(version)]
struct Args {
    /// Serial port the module is attached to.
    #[arg(short, long)]
    port: String,

    /// Run over a paired, encrypted session instead of plaintext.
    #[arg(long)]
    secure: bool,

    /// 32-byte bootstrap signing key, hex-encoded. Required with `--secure`.
    #[arg(long)]
    bootstrap_key: Option<String>,

    /// License-store vendor directory name.
    #[arg(long, default_value = "facehost")]
    vendor: String,

    /// License server endpoint; when set, `LicenseRequest` events are
    /// answered automatically.
    #[arg(long)]
    license_endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the port and probe the device.
    Connect,
    /// Pair with a fresh device (secure mode only).
    Pair,
    /// Reset pairing state (secure mode only).
    Unpair,
    /// Run one authentication attempt.
    Authenticate,
    /// Authenticate repeatedly until Ctrl-C.
    AuthenticateLoop,
    /// Enroll a new user id.
    Enroll {
        user_id: String,
    },
    /// Remove one enrolled user.
    RemoveUser {
        user_id: String,
    },
    /// Remove every enrolled user.
    RemoveAll,
    /// List enrolled user ids.
    QueryUserIds,
    /// Count enrolled users.
    QueryNumberOfUsers,
    /// Print the device's effective configuration.
    QueryDeviceConfig,
    Standby,
    Hibernate,
    Unlock,
    /// Persist a license key for future runs.
    SetLicenseKey {
        key: String,
    },
    /// Push a firmware package, burning only modules that differ.
    FirmwareUpdate {
        package_path: String,
        #[arg(long)]
        force_full: bool,
        #[arg(long)]
        raise_baud: Option<u32>,
    },
}

struct LoggingCallbacks;

impl OperationCallbacks for LoggingCallbacks {
    fn on_progress(&mut self, pose: Pose) {
        info!(?pose, "progress");
    }

    fn on_hint(&mut self, hint: Hint) {
        info!(code = hint.0, "hint");
    }

    fn on_faces_detected(&mut self, faces: &facehost_client::FacesDetected) {
        info!(count = faces.rects.len(), timestamp_ms = faces.timestamp_ms, "faces detected");
    }

    fn on_result(&mut self, result: &OperationResult) {
        info!(status = ?result.status, user_id = ?result.user_id, "result");
    }
}

fn bootstrap_key_bytes(hex_key: &str) -> Result<[u8; 32], Box<dyn std::error::Error>> {
    let bytes = hex::decode(hex_key)?;
    bytes.try_into().map_err(|v: Vec<u8>| format!("bootstrap key must be 32 bytes, got {}", v.len()).into())
}

fn build_device(args: &Args) -> Result<Device, Box<dyn std::error::Error>> {
    let license_store = LicenseKeyStore::new(args.vendor.clone());
    let mut device = if args.secure {
        let key_hex = args.bootstrap_key.as_deref().ok_or("--secure requires --bootstrap-key")?;
        Device::secure(bootstrap_key_bytes(key_hex)?, license_store)?
    } else {
        Device::insecure(license_store)
    };
    if let Some(endpoint) = &args.license_endpoint {
        device.with_license_client(LicenseClient::new(endpoint.clone()));
    }
    Ok(device)
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    if let Command::SetLicenseKey { key } = &args.command {
        let mut license_store = LicenseKeyStore::new(args.vendor.clone());
        license_store.set_key(key, true)?;
        info!("license key saved");
        return Ok(());
    }

    let mut device = build_device(&args)?;
    device.connect(&args.port)?;
    if args.secure && matches!(device.state(), facehost_core::SessionState::AwaitingPairing) {
        device.pair()?;
    }

    match args.command {
        Command::Connect => info!("connected"),
        Command::Pair => {
            device.pair()?;
            info!("paired");
        },
        Command::Unpair => {
            device.unpair()?;
            info!("unpaired");
        },
        Command::Authenticate => {
            let result = device.authenticate(&mut LoggingCallbacks)?;
            info!(?result, "authenticate finished");
        },
        Command::AuthenticateLoop => {
            install_ctrlc_handler(device.cancel_handle());
            let result = device.authenticate_loop(&mut LoggingCallbacks)?;
            info!(?result, "authenticate loop finished");
        },
        Command::Enroll { user_id } => {
            let result = device.enroll(&user_id, &mut LoggingCallbacks)?;
            info!(?result, "enroll finished");
        },
        Command::RemoveUser { user_id } => {
            let result = device.remove_user(&user_id, &mut NoopCallbacks)?;
            info!(?result, "remove user finished");
        },
        Command::RemoveAll => {
            let result = device.remove_all()?;
            info!(?result, "remove all finished");
        },
        Command::QueryUserIds => {
            let ids = device.query_user_ids()?;
            info!(?ids, "enrolled users");
        },
        Command::QueryNumberOfUsers => {
            let count = device.query_number_of_users()?;
            info!(count, "enrolled user count");
        },
        Command::QueryDeviceConfig => {
            let config = device.query_device_config()?;
            info!(?config, "device config");
        },
        Command::Standby => {
            let result = device.standby()?;
            info!(?result, "standby finished");
        },
        Command::Hibernate => {
            let result = device.hibernate()?;
            info!(?result, "hibernate finished");
        },
        Command::Unlock => {
            let result = device.unlock()?;
            info!(?result, "unlock finished");
        },
        Command::SetLicenseKey { .. } => unreachable!("handled before connecting"),
        Command::FirmwareUpdate { package_path, force_full, raise_baud } => {
            run_firmware_update(&device, &package_path, force_full, raise_baud)?;
        },
    }

    Ok(())
}

fn run_firmware_update(
    device: &Device,
    package_path: &str,
    force_full: bool,
    raise_baud: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(package_path)?;
    let modules = parse_package(&bytes)?;
    let transport = device.transport().ok_or("device not connected")?;
    let mut engine = FirmwareUpdateEngine::new(modules).force_full(force_full);
    if let Some(rate) = raise_baud {
        engine = engine.raise_baud_rate(rate);
    }
    let mut channel = SerialUpdateChannel::new(transport);
    let reports = engine.burn_modules(&mut channel)?;
    for report in reports {
        info!(
            module = report.module_name,
            burned = report.blocks_burned,
            skipped = report.blocks_skipped,
            "module burned"
        );
    }
    Ok(())
}

fn install_ctrlc_handler(cancel_handle: Arc<AtomicBool>) {
    let _ = ctrlc::set_handler(move || {
        cancel_handle.store(true, Ordering::Release);
    });
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "facehost_cli=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    run(Args::parse())
}
