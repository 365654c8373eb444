//! Pairing roster and local role resolution.
//!
//! A [`Roster`] lists every device in a pairing. At startup the node resolves
//! its own entry by hardware identity; everything else in the roster becomes
//! its peers. Resolution failure is a configuration error and the node must
//! not start.

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddrV4};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::{DeviceIdentity, Role};

/// A single device in the pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Logical role of the device.
    pub role: Role,
    /// Network address (`a.b.c.d` or `a.b.c.d:port`).
    pub address: String,
    /// Hardware identity used to recognise the local device.
    pub identity: DeviceIdentity,
}

impl DeviceDescriptor {
    /// Build a descriptor from raw strings, validating every field.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` if the address is not an IPv4
    /// address (with optional port), or `CoreError::InvalidId` for a bad role
    /// or identity.
    pub fn parse(role: &str, address: &str, identity: &str) -> Result<Self> {
        let descriptor = Self {
            role: Role::new(role)?,
            address: address.to_string(),
            identity: DeviceIdentity::new(identity)?,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Validate the network address.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` if the address is malformed.
    pub fn validate(&self) -> Result<()> {
        let valid = self.address.parse::<Ipv4Addr>().is_ok()
            || self.address.parse::<SocketAddrV4>().is_ok();
        if valid {
            Ok(())
        } else {
            Err(CoreError::Configuration(format!(
                "device {} has an invalid address {:?}",
                self.role, self.address
            )))
        }
    }
}

/// The ordered set of devices forming a pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    devices: Vec<DeviceDescriptor>,
}

impl Roster {
    /// Create a roster, rejecting empty rosters and duplicate identities.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` if the roster is empty, an address is
    /// malformed, or two devices share an identity.
    pub fn new(devices: Vec<DeviceDescriptor>) -> Result<Self> {
        if devices.is_empty() {
            return Err(CoreError::Configuration("roster has no devices".into()));
        }

        let mut seen = HashSet::new();
        for device in &devices {
            device.validate()?;
            if !seen.insert(device.identity.clone()) {
                return Err(CoreError::Configuration(format!(
                    "identity {} appears more than once in the roster",
                    device.identity
                )));
            }
        }

        Ok(Self { devices })
    }

    /// All devices in configuration order.
    #[must_use]
    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    /// Partition the roster into the local device and its peers.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::UnknownIdentity` if no device carries `identity`.
    pub fn resolve(&self, identity: &DeviceIdentity) -> Result<Resolved> {
        let local = self
            .devices
            .iter()
            .find(|d| &d.identity == identity)
            .cloned()
            .ok_or_else(|| CoreError::UnknownIdentity(identity.clone()))?;

        let peers = self
            .devices
            .iter()
            .filter(|d| &d.identity != identity)
            .cloned()
            .collect();

        tracing::info!(
            role = %local.role,
            identity = %identity,
            "Resolved local device role"
        );

        Ok(Resolved { local, peers })
    }
}

/// The result of resolving a roster against the local identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    local: DeviceDescriptor,
    peers: Vec<DeviceDescriptor>,
}

impl Resolved {
    /// The local device.
    #[must_use]
    pub const fn local(&self) -> &DeviceDescriptor {
        &self.local
    }

    /// The local device's role.
    #[must_use]
    pub const fn role(&self) -> &Role {
        &self.local.role
    }

    /// Every other device in the roster, in configuration order.
    #[must_use]
    pub fn peers(&self) -> &[DeviceDescriptor] {
        &self.peers
    }

    /// The peers holding `role`.
    pub fn peers_with_role<'a>(
        &'a self,
        role: &'a Role,
    ) -> impl Iterator<Item = &'a DeviceDescriptor> + 'a {
        self.peers.iter().filter(move |d| &d.role == role)
    }
}
