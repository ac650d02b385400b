//! # Device Models
//!
//! A device moves through three shapes on its way to a warranty row:
//!
//! * [`DirectoryEntry`]: a bare name returned by the directory search.
//! * [`Device`]: a name that resolved to an address and answered the liveness probe.
//! * [`IdentifiedDevice`]: a live device whose BIOS serial number was read and validated.
//!
//! Every way a device can fall out of that sequence is a [`DeviceErrorKind`].

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::serial::SerialNumber;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
}

impl DirectoryEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub name: String,
    pub ip_address: IpAddr,
}

impl Device {
    pub fn new(name: impl Into<String>, ip_address: IpAddr) -> Self {
        Self {
            name: name.into(),
            ip_address,
        }
    }

    pub fn with_serial(self, serial_number: SerialNumber) -> IdentifiedDevice {
        IdentifiedDevice {
            device: self,
            serial_number,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifiedDevice {
    pub device: Device,
    pub serial_number: SerialNumber,
}

impl IdentifiedDevice {
    pub fn name(&self) -> &str {
        &self.device.name
    }

    /// Consumes the device and produces the row persisted for it.
    pub fn into_record(self, warranty_info: impl Into<String>) -> WarrantyRecord {
        WarrantyRecord {
            device_name: self.device.name,
            ip_address: self.device.ip_address.to_string(),
            serial_number: self.serial_number.into_string(),
            warranty_info: warranty_info.into(),
        }
    }
}

/// One row of `warranty_info.csv`. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarrantyRecord {
    pub device_name: String,
    pub ip_address: String,
    pub serial_number: String,
    pub warranty_info: String,
}

/// Why a device was dropped from the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceErrorKind {
    /// The device name did not resolve to an address.
    DnsResolutionFailed,
    /// The address did not accept a connection on the management port in time.
    Offline,
    /// A remote session could not be opened, or the command could not be executed.
    RemoteExecFailed,
    /// The inventory command ran but reported failure.
    RemoteExecNonZeroExit,
    /// The command output was not valid UTF-8.
    SerialDecodeFailed,
    /// The extracted token is not a 7 or 8 character serial.
    InvalidSerialFormat,
    /// The vendor portal did not render the expected element in time.
    WarrantyLookupTimeout,
    /// The vendor portal interaction failed for any other reason.
    WarrantyLookupFailed,
}

impl DeviceErrorKind {
    pub const ALL: [DeviceErrorKind; 8] = [
        DeviceErrorKind::DnsResolutionFailed,
        DeviceErrorKind::Offline,
        DeviceErrorKind::RemoteExecFailed,
        DeviceErrorKind::RemoteExecNonZeroExit,
        DeviceErrorKind::SerialDecodeFailed,
        DeviceErrorKind::InvalidSerialFormat,
        DeviceErrorKind::WarrantyLookupTimeout,
        DeviceErrorKind::WarrantyLookupFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceErrorKind::DnsResolutionFailed => "DnsResolutionFailed",
            DeviceErrorKind::Offline => "Offline",
            DeviceErrorKind::RemoteExecFailed => "RemoteExecFailed",
            DeviceErrorKind::RemoteExecNonZeroExit => "RemoteExecNonZeroExit",
            DeviceErrorKind::SerialDecodeFailed => "SerialDecodeFailed",
            DeviceErrorKind::InvalidSerialFormat => "InvalidSerialFormat",
            DeviceErrorKind::WarrantyLookupTimeout => "WarrantyLookupTimeout",
            DeviceErrorKind::WarrantyLookupFailed => "WarrantyLookupFailed",
        }
    }
}

impl fmt::Display for DeviceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceErrorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown error type: {s}"))
    }
}

impl Serialize for DeviceErrorKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One row of `errors.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ErrorEvent {
    pub device_name: String,
    pub error_type: DeviceErrorKind,
}

impl ErrorEvent {
    pub fn new(device_name: impl Into<String>, error_type: DeviceErrorKind) -> Self {
        Self {
            device_name: device_name.into(),
            error_type,
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
