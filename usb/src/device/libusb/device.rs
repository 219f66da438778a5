use crate::commands::{
    DeviceControl, RegisterRequest, DFU_INTERFACE_CLASS, DFU_INTERFACE_SUBCLASS,
};
use crate::device::base::{AttachDevice, ExecutableDevice, FullRespeakerDevice, RespeakerCommands};
use crate::error::{CommandError, ConnectError};
use crate::{DEFAULT_PRODUCT_NAME, PID_RESPEAKER_V2, VID_RESPEAKER};
use log::{debug, info, warn};
use respeaker_types::{DeviceDescriptor, DeviceMode};
use rusb::{Device, DeviceHandle, Direction, GlobalContext, Recipient, RequestType};
use std::time::Duration;

// String descriptors are only informational, don't let a slow device hold up a scan.
const STRING_TIMEOUT: Duration = Duration::from_millis(100);
const CONTROL_INTERFACE: u8 = 0;

pub struct RespeakerUSB {
    handle: DeviceHandle<GlobalContext>,
    descriptor: DeviceDescriptor,
    device_is_claimed: bool,
    dfu_interface: Option<u8>,
    closed: bool,
    timeout: Duration,
}

impl RespeakerUSB {
    fn find_device(
        descriptor: &DeviceDescriptor,
    ) -> Result<(Device<GlobalContext>, rusb::DeviceDescriptor), ConnectError> {
        for usb_device in rusb::devices()?.iter() {
            if usb_device.bus_number() == descriptor.bus_number
                && usb_device.address() == descriptor.address
            {
                let usb_descriptor = usb_device.device_descriptor()?;
                if usb_descriptor.vendor_id() == descriptor.vendor_id
                    && usb_descriptor.product_id() == descriptor.product_id
                {
                    return Ok((usb_device, usb_descriptor));
                }
            }
        }
        Err(ConnectError::DeviceNotFound)
    }

    pub fn from_device(
        descriptor: &DeviceDescriptor,
        timeout: Duration,
    ) -> Result<Self, ConnectError> {
        if descriptor.mode == DeviceMode::Dfu {
            return Err(ConnectError::DeviceInDfuMode);
        }

        // Firstly, we need to locate the USB device based on the location..
        let (device, _) = RespeakerUSB::find_device(descriptor)?;
        let mut handle = device.open()?;
        info!("Connected to possible ReSpeaker device at {:?}", device);

        // Parameter requests are addressed to the device rather than an interface, so a failed
        // claim (usually the audio driver holding it) isn't fatal.
        let device_is_claimed = handle.claim_interface(CONTROL_INTERFACE).is_ok();
        debug!("Control interface claimed: {}", device_is_claimed);

        let dfu_interface = find_dfu_interface(&device);
        debug!("DFU interface: {:?}", dfu_interface);

        Ok(Self {
            handle,
            descriptor: descriptor.clone(),
            device_is_claimed,
            dfu_interface,
            closed: false,
            timeout,
        })
    }

    /// Sends `LeaveDfu` to a device running its DFU loader, which then reboots into the runtime
    /// firmware and re-enumerates.
    pub fn leave_dfu(descriptor: &DeviceDescriptor, timeout: Duration) -> Result<(), ConnectError> {
        if descriptor.mode != DeviceMode::Dfu {
            return Err(ConnectError::DeviceNotInDfuMode);
        }

        let (device, _) = RespeakerUSB::find_device(descriptor)?;
        let interface = find_dfu_interface(&device).ok_or(CommandError::NoDfuInterface)?;
        let mut handle = device.open()?;
        if let Err(error) = handle.claim_interface(interface) {
            debug!("Unable to claim DFU interface {}: {}", interface, error);
        }

        info!("Asking {} to leave DFU mode", descriptor);
        handle.write_control(
            rusb::request_type(Direction::Out, RequestType::Class, Recipient::Interface),
            DeviceControl::LeaveDfu.request(),
            0,
            interface as u16,
            &[],
            timeout,
        )?;
        Ok(())
    }

    pub(crate) fn write_class_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<(), rusb::Error> {
        self.handle.write_control(
            rusb::request_type(Direction::Out, RequestType::Class, Recipient::Interface),
            request,
            value,
            index,
            data,
            self.timeout,
        )?;

        Ok(())
    }

    pub(crate) fn write_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<(), rusb::Error> {
        self.handle.write_control(
            rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Device),
            request,
            value,
            index,
            data,
            self.timeout,
        )?;

        Ok(())
    }

    pub(crate) fn read_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        length: usize,
    ) -> Result<Vec<u8>, rusb::Error> {
        let mut buf = vec![0; length];
        let response_length = self.handle.read_control(
            rusb::request_type(Direction::In, RequestType::Vendor, Recipient::Device),
            request,
            value,
            index,
            &mut buf,
            self.timeout,
        )?;
        buf.truncate(response_length);
        Ok(buf)
    }
}

impl AttachDevice for RespeakerUSB {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn is_connected(&mut self) -> bool {
        if self.closed {
            return false;
        }
        debug!("Checking Disconnect for device: {}", self.descriptor);
        self.handle.active_configuration().is_ok()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if self.device_is_claimed {
            if let Err(error) = self.handle.release_interface(CONTROL_INTERFACE) {
                debug!("Unable to release control interface: {}", error);
            }
        }
        info!("Closed ReSpeaker device at {}", self.descriptor);
    }
}

impl ExecutableDevice for RespeakerUSB {
    fn read_request(
        &mut self,
        request: RegisterRequest,
        length: usize,
    ) -> Result<Vec<u8>, CommandError> {
        if self.closed {
            return Err(CommandError::UsbError(rusb::Error::NoDevice));
        }

        let response = self.read_control(request.request, request.value, request.index, length);
        if let Err(error) = &response {
            warn!("Read of {:?} failed: {}", request, error);
        }
        Ok(response?)
    }

    fn write_request(
        &mut self,
        request: RegisterRequest,
        data: &[u8],
    ) -> Result<(), CommandError> {
        if self.closed {
            return Err(CommandError::UsbError(rusb::Error::NoDevice));
        }

        let result = self.write_control(request.request, request.value, request.index, data);
        if let Err(error) = &result {
            warn!("Write of {:?} failed: {}", request, error);
        }
        Ok(result?)
    }

    fn control_request(&mut self, request: u8) -> Result<(), CommandError> {
        if self.closed {
            return Err(CommandError::UsbError(rusb::Error::NoDevice));
        }
        let interface = self.dfu_interface.ok_or(CommandError::NoDfuInterface)?;

        let result = self.write_class_control(request, 0, interface as u16, &[]);
        if let Err(error) = &result {
            warn!("Control request {:#x} failed: {}", request, error);
        }
        Ok(result?)
    }
}

impl Drop for RespeakerUSB {
    fn drop(&mut self) {
        self.close();
    }
}

impl RespeakerCommands for RespeakerUSB {}
impl FullRespeakerDevice for RespeakerUSB {}

fn device_mode(device: &Device<GlobalContext>) -> DeviceMode {
    // The runtime firmware exposes audio and control interfaces, the DFU loader exposes one.
    let interfaces = device
        .active_config_descriptor()
        .or_else(|_| device.config_descriptor(0))
        .map(|config| config.num_interfaces());

    match interfaces {
        Ok(1) => DeviceMode::Dfu,
        Ok(_) => DeviceMode::Runtime,
        Err(error) => {
            debug!("Unable to read configuration of {:?}: {}", device, error);
            DeviceMode::Runtime
        }
    }
}

fn find_dfu_interface(device: &Device<GlobalContext>) -> Option<u8> {
    let config = device
        .active_config_descriptor()
        .or_else(|_| device.config_descriptor(0))
        .ok()?;

    config
        .interfaces()
        .flat_map(|interface| interface.descriptors())
        .find(|descriptor| {
            descriptor.class_code() == DFU_INTERFACE_CLASS
                && descriptor.sub_class_code() == DFU_INTERFACE_SUBCLASS
        })
        .map(|descriptor| descriptor.interface_number())
}

fn read_strings(
    device: &Device<GlobalContext>,
    usb_descriptor: &rusb::DeviceDescriptor,
) -> (Option<String>, String) {
    let handle = match device.open() {
        Ok(handle) => handle,
        Err(error) => {
            debug!("Unable to open {:?} for string descriptors: {}", device, error);
            return (None, DEFAULT_PRODUCT_NAME.to_string());
        }
    };

    let language = handle
        .read_languages(STRING_TIMEOUT)
        .ok()
        .and_then(|languages| languages.first().copied());

    let Some(language) = language else {
        return (None, DEFAULT_PRODUCT_NAME.to_string());
    };

    let serial = handle
        .read_serial_number_string(language, usb_descriptor, STRING_TIMEOUT)
        .ok()
        .filter(|serial| !serial.is_empty());
    let name = handle
        .read_product_string(language, usb_descriptor, STRING_TIMEOUT)
        .unwrap_or_else(|_| DEFAULT_PRODUCT_NAME.to_string());

    (serial, name)
}

pub fn find_devices() -> Result<Vec<DeviceDescriptor>, ConnectError> {
    let mut found_devices: Vec<DeviceDescriptor> = Vec::new();

    // If libusb can't give us a device list at all, there's nothing we can do about it here.
    let devices = rusb::devices()?;
    for device in devices.iter() {
        if let Ok(descriptor) = device.device_descriptor() {
            if descriptor.vendor_id() == VID_RESPEAKER
                && descriptor.product_id() == PID_RESPEAKER_V2
            {
                let (serial, name) = read_strings(&device, &descriptor);
                found_devices.push(DeviceDescriptor {
                    vendor_id: descriptor.vendor_id(),
                    product_id: descriptor.product_id(),
                    bus_number: device.bus_number(),
                    address: device.address(),
                    serial,
                    name,
                    mode: device_mode(&device),
                });
            }
        }
    }

    Ok(found_devices)
}
