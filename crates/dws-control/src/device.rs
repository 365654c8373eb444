//! Local device collaborators: configuration writes and hardware identity.

use std::collections::BTreeMap;
use std::path::PathBuf;

use dws_core::{CoreError, DeviceIdentity};
use parking_lot::RwLock;

use crate::error::Result;

/// One-shot configuration writes and commands on the local device.
///
/// Entry actions use this for role-specific side effects such as muting a
/// microphone or disabling standby.
pub trait DeviceControl: Send + Sync {
    /// Set a configuration value.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Device` if the device rejects the write.
    fn configure(&self, setting: &str, value: &str) -> Result<()>;

    /// Run a device command.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Device` if the command fails.
    fn execute(&self, command: &str) -> Result<()>;

    /// Last known value of a status such as `Audio.Volume`, if reported.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Device` if the status cannot be read.
    fn status(&self, path: &str) -> Result<Option<String>>;
}

/// A device that keeps configuration in memory and logs every write.
#[derive(Debug, Default)]
pub struct InMemoryDevice {
    settings: RwLock<BTreeMap<String, String>>,
    commands: RwLock<Vec<String>>,
    status: RwLock<BTreeMap<String, String>>,
}

impl InMemoryDevice {
    /// Create a device with no settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a setting.
    #[must_use]
    pub fn setting(&self, setting: &str) -> Option<String> {
        self.settings.read().get(setting).cloned()
    }

    /// All settings written so far.
    #[must_use]
    pub fn settings(&self) -> BTreeMap<String, String> {
        self.settings.read().clone()
    }

    /// Commands executed so far, oldest first.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.commands.read().clone()
    }

    /// All statuses reported so far.
    #[must_use]
    pub fn statuses(&self) -> BTreeMap<String, String> {
        self.status.read().clone()
    }

    /// Record the current value of a status.
    pub fn set_status(&self, path: &str, value: &str) {
        tracing::debug!(path, value, "Device status");
        self.status
            .write()
            .insert(path.to_string(), value.to_string());
    }
}

impl DeviceControl for InMemoryDevice {
    fn configure(&self, setting: &str, value: &str) -> Result<()> {
        tracing::info!(setting, value, "Device configuration");
        self.settings
            .write()
            .insert(setting.to_string(), value.to_string());
        Ok(())
    }

    fn execute(&self, command: &str) -> Result<()> {
        tracing::info!(command, "Device command");
        self.commands.write().push(command.to_string());
        Ok(())
    }

    fn status(&self, path: &str) -> Result<Option<String>> {
        Ok(self.status.read().get(path).cloned())
    }
}

/// Source of the local hardware identity.
pub trait IdentityProvider: Send + Sync {
    /// Read the identity.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` if the identity cannot be read or is
    /// not a valid identity.
    fn identity(&self) -> dws_core::Result<DeviceIdentity>;
}

/// A fixed identity, typically from the environment.
#[derive(Debug, Clone)]
pub struct StaticIdentity(DeviceIdentity);

impl StaticIdentity {
    /// Wrap an identity.
    #[must_use]
    pub const fn new(identity: DeviceIdentity) -> Self {
        Self(identity)
    }
}

impl IdentityProvider for StaticIdentity {
    fn identity(&self) -> dws_core::Result<DeviceIdentity> {
        Ok(self.0.clone())
    }
}

/// Reads the identity from a file holding the serial number.
#[derive(Debug, Clone)]
pub struct FileIdentity {
    path: PathBuf,
}

impl FileIdentity {
    /// Read from `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IdentityProvider for FileIdentity {
    fn identity(&self) -> dws_core::Result<DeviceIdentity> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            CoreError::Configuration(format!(
                "cannot read identity file {}: {e}",
                self.path.display()
            ))
        })?;
        raw.parse::<DeviceIdentity>().map_err(|e| {
            CoreError::Configuration(format!(
                "identity file {} is invalid: {e}",
                self.path.display()
            ))
        })
    }
}
