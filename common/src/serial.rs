use std::fmt;

use crate::device::DeviceErrorKind;

const SERIAL_LENGTHS: [usize; 2] = [7, 8];

/// A BIOS serial number that passed shape validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SerialNumber(String);

impl SerialNumber {
    /// Accepts exactly 7 or 8 characters.
    pub fn parse(token: &str) -> Result<Self, DeviceErrorKind> {
        if SERIAL_LENGTHS.contains(&token.chars().count()) {
            Ok(Self(token.to_string()))
        } else {
            Err(DeviceErrorKind::InvalidSerialFormat)
        }
    }

    /// Extracts the serial from raw inventory command output.
    ///
    /// The serial is the last whitespace-delimited token of the last non-blank
    /// line, which is where a `Select-Object SerialNumber` table puts it.
    pub fn from_inventory_output(stdout: &[u8]) -> Result<Self, DeviceErrorKind> {
        let text: &str =
            std::str::from_utf8(stdout).map_err(|_| DeviceErrorKind::SerialDecodeFailed)?;

        let token: &str = text
            .trim()
            .lines()
            .last()
            .and_then(|line| line.split_whitespace().last())
            .unwrap_or("");

        Self::parse(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
