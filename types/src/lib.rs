#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt::Formatter;
use strum::{Display, EnumCount, EnumIter, EnumString};

mod parameter;
pub mod table;

pub use parameter::*;
pub use table::{ParameterTable, TableError};

#[derive(
    Copy, Clone, Debug, Default, Display, EnumIter, EnumCount, EnumString, PartialEq, Eq, Hash,
)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

// A device which only exposes a single interface has rebooted into the XMOS DFU loader, and
// will not answer parameter requests until it's been reset back into its runtime firmware.
#[derive(Copy, Clone, Debug, Display, EnumIter, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DeviceMode {
    Runtime,
    Dfu,
}

/// Identifies one physically attached unit. The bus number and address pair is the identity,
/// the remaining fields are informational and may be missing if the string descriptors
/// couldn't be read (usually a permissions problem).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    pub bus_number: u8,
    pub address: u8,
    pub serial: Option<String>,
    pub name: String,
    pub mode: DeviceMode,
}

impl DeviceDescriptor {
    pub fn location(&self) -> (u8, u8) {
        (self.bus_number, self.address)
    }

    /// Returns true if both descriptors refer to the same physical attachment.
    pub fn same_device(&self, other: &DeviceDescriptor) -> bool {
        self.location() == other.location()
            && self.vendor_id == other.vendor_id
            && self.product_id == other.product_id
    }
}

impl std::fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({:04x}:{:04x}) on bus {} address {}",
            self.name, self.vendor_id, self.product_id, self.bus_number, self.address
        )?;
        if let Some(serial) = &self.serial {
            write!(f, " [{}]", serial)?;
        }
        if self.mode == DeviceMode::Dfu {
            write!(f, " (DFU)")?;
        }
        Ok(())
    }
}

/// A point in time copy of a session's status, safe to hand to any number of consumers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StatusSnapshot {
    pub state: SessionState,
    pub device: Option<DeviceDescriptor>,
    pub last_error: Option<String>,
}

impl StatusSnapshot {
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }
}

impl std::fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (&self.state, &self.device) {
            (SessionState::Error, _) => write!(
                f,
                "Error: {}",
                self.last_error.as_deref().unwrap_or("Unknown Error")
            ),
            (state, Some(device)) => {
                write!(f, "{}: {}", state, device.name)?;
                if let Some(serial) = &device.serial {
                    write!(f, " [{}]", serial)?;
                }
                Ok(())
            }
            (state, None) => write!(f, "{}", state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> DeviceDescriptor {
        DeviceDescriptor {
            vendor_id: 0x2886,
            product_id: 0x0018,
            bus_number: 1,
            address: 4,
            serial: Some("ABC123".into()),
            name: "ReSpeaker 4 Mic Array".into(),
            mode: DeviceMode::Runtime,
        }
    }

    #[test]
    fn snapshot_display() {
        let mut snapshot = StatusSnapshot::default();
        assert_eq!(snapshot.to_string(), "Disconnected");

        snapshot.state = SessionState::Connected;
        snapshot.device = Some(descriptor());
        assert_eq!(
            snapshot.to_string(),
            "Connected: ReSpeaker 4 Mic Array [ABC123]"
        );

        snapshot.state = SessionState::Error;
        snapshot.last_error = Some("USB error: Operation timed out".into());
        assert_eq!(snapshot.to_string(), "Error: USB error: Operation timed out");
    }

    #[test]
    fn same_device_ignores_strings() {
        let first = descriptor();
        let mut second = descriptor();
        second.serial = None;
        assert!(first.same_device(&second));

        second.address = 5;
        assert!(!first.same_device(&second));
    }

    #[test]
    fn state_parses_from_name() {
        assert_eq!(
            "Connected".parse::<SessionState>().unwrap(),
            SessionState::Connected
        );
    }
}
