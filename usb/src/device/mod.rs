// This file primarily wraps USB information into some 'Plain Old Rust Structs' which can be used
// by other modules to interrogate devices. The idea here is that they shouldn't be aware of what
// goes on 'Under the Hood' of the ReSpeaker, nor the communication layer (they shouldn't need
// to poll USB directly).
use crate::device::base::{DeviceBus, FullRespeakerDevice};
use crate::error::ConnectError;
use respeaker_types::DeviceDescriptor;
use std::time::Duration;

pub mod base;
mod libusb;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

pub fn find_devices() -> Result<Vec<DeviceDescriptor>, ConnectError> {
    libusb::device::find_devices()
}

/// The libusb backed bus, every control transfer issued through devices opened here is bounded
/// by `timeout`.
#[derive(Debug, Clone)]
pub struct LibUsbBus {
    timeout: Duration,
}

impl LibUsbBus {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for LibUsbBus {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl DeviceBus for LibUsbBus {
    fn scan(&self) -> Result<Vec<DeviceDescriptor>, ConnectError> {
        find_devices()
    }

    fn open(
        &self,
        descriptor: &DeviceDescriptor,
    ) -> Result<Box<dyn FullRespeakerDevice>, ConnectError> {
        let device = libusb::device::RespeakerUSB::from_device(descriptor, self.timeout)?;
        Ok(Box::new(device))
    }

    fn leave_dfu(&self, descriptor: &DeviceDescriptor) -> Result<(), ConnectError> {
        libusb::device::RespeakerUSB::leave_dfu(descriptor, self.timeout)
    }
}
