//! License key persistence: `~/.<vendor>/visionplatform/license.json` (user)
//! or `/etc/<vendor>/visionplatform/license.json` (system), plus an
//! in-memory override that takes precedence until cleared.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LicenseError, Result};

/// A 36-character license key (UUID-shaped, but opaque to this crate).
pub const LICENSE_KEY_LEN: usize = 36;

#[derive(Debug, Serialize, Deserialize)]
struct LicenseFile {
    license_key: String,
}

/// Reads and optionally persists the license key, honoring an in-memory
/// override set via [`LicenseKeyStore::set_key`].
pub struct LicenseKeyStore {
    vendor: String,
    override_key: Option<String>,
}

impl LicenseKeyStore {
    /// `vendor` is the directory component used in both the user and
    /// system store paths.
    #[must_use]
    pub fn new(vendor: impl Into<String>) -> Self {
        Self { vendor: vendor.into(), override_key: None }
    }

    /// Set an in-memory key, optionally persisting it to the user store.
    /// The in-memory value always takes precedence over the on-disk store
    /// until [`LicenseKeyStore::clear_override`] is called.
    pub fn set_key(&mut self, key: &str, persist: bool) -> Result<()> {
        if persist {
            self.write_user_store(key)?;
        }
        self.override_key = Some(key.to_string());
        Ok(())
    }

    /// Drop the in-memory override, reverting to whatever the on-disk
    /// stores report.
    pub fn clear_override(&mut self) {
        self.override_key = None;
    }

    /// Resolve the effective license key: in-memory override first, then
    /// the user store, then the system store.
    pub fn load_key(&self) -> Result<String> {
        if let Some(key) = &self.override_key {
            return Ok(key.clone());
        }
        if let Some(key) = read_store(&self.user_store_path())? {
            return Ok(key);
        }
        if let Some(key) = read_store(&self.system_store_path())? {
            return Ok(key);
        }
        Err(LicenseError::MissingKey)
    }

    fn write_user_store(&self, key: &str) -> Result<()> {
        let path = self.user_store_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&LicenseFile { license_key: key.to_string() })
            .unwrap_or_default();
        fs::write(path, contents)?;
        Ok(())
    }

    fn user_store_path(&self) -> PathBuf {
        let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(PathBuf::new);
        home.join(format!(".{}", self.vendor)).join("visionplatform").join("license.json")
    }

    fn system_store_path(&self) -> PathBuf {
        Path::new("/etc").join(&self.vendor).join("visionplatform").join("license.json")
    }
}

fn read_store(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let parsed: LicenseFile = serde_json::from_str(&contents)?;
            Ok(Some(parsed.license_key))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_takes_precedence_over_missing_store() {
        let mut store = LicenseKeyStore::new("facehost-test-vendor-does-not-exist");
        assert!(store.load_key().is_err());
        store.set_key("0123456789abcdef0123456789abcdef0123", false).unwrap();
        assert_eq!(store.load_key().unwrap(), "0123456789abcdef0123456789abcdef0123");
        store.clear_override();
        assert!(store.load_key().is_err());
    }
}
