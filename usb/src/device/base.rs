use crate::commands::{
    decode_parameter, encode_parameter, encode_pixel_ring, Command, DeviceControl,
    RegisterRequest, PARAMETER_RESPONSE_LENGTH,
};
use crate::error::{CommandError, ConnectError};
use crate::pixelring::PixelRingCommand;
use log::debug;
use respeaker_types::{DeviceDescriptor, ParameterSpec, ParameterValue};

// This is a basic SuperTrait which defines all the 'Parts' of the ReSpeaker for use.
pub trait FullRespeakerDevice: AttachDevice + RespeakerCommands + Send {}

pub trait AttachDevice {
    fn descriptor(&self) -> &DeviceDescriptor;
    fn is_connected(&mut self) -> bool;

    /// Releases anything claimed on the device, further requests will fail.
    fn close(&mut self);
}

/// The raw transport, an addressed read or write of a vendor register.
pub trait ExecutableDevice {
    fn read_request(
        &mut self,
        request: RegisterRequest,
        length: usize,
    ) -> Result<Vec<u8>, CommandError>;

    fn write_request(&mut self, request: RegisterRequest, data: &[u8])
        -> Result<(), CommandError>;

    /// An empty class request to the DFU interface.
    fn control_request(&mut self, request: u8) -> Result<(), CommandError>;
}

// These are commands that can be executed, but read_request / write_request must be implemented..
pub trait RespeakerCommands: ExecutableDevice {
    fn read_parameter(&mut self, spec: &ParameterSpec) -> Result<ParameterValue, CommandError> {
        let request = Command::read(spec).request();
        let response = self.read_request(request, PARAMETER_RESPONSE_LENGTH)?;
        debug!("Read {}: {:x?}", spec.name, response);
        decode_parameter(spec, &response)
    }

    fn write_parameter(
        &mut self,
        spec: &ParameterSpec,
        value: ParameterValue,
    ) -> Result<(), CommandError> {
        let request = Command::WriteParameter(spec.register).request();
        let payload = encode_parameter(spec, value);
        debug!("Write {} = {}: {:x?}", spec.name, value, payload);
        self.write_request(request, &payload)
    }

    fn set_pixel_ring(&mut self, command: &PixelRingCommand) -> Result<(), CommandError> {
        let (request, payload) = encode_pixel_ring(command);
        self.write_request(request, &payload)
    }

    fn device_control(&mut self, control: DeviceControl) -> Result<(), CommandError> {
        debug!("Device control {} ({:#x})", control, control.request());
        self.control_request(control.request())
    }
}

/// Enumerates and opens devices. The libusb implementation is the real one, anything else is
/// generally a test double.
pub trait DeviceBus: Send + Sync {
    fn scan(&self) -> Result<Vec<DeviceDescriptor>, ConnectError>;
    fn open(
        &self,
        descriptor: &DeviceDescriptor,
    ) -> Result<Box<dyn FullRespeakerDevice>, ConnectError>;

    /// Reboots a device sitting in DFU mode back into its runtime firmware. A device in DFU mode
    /// can't be opened, so this goes straight to the bus.
    fn leave_dfu(&self, descriptor: &DeviceDescriptor) -> Result<(), ConnectError>;
}
