use crate::error::CommandError;
use crate::pixelring::PixelRingCommand;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use respeaker_types::{ParameterSpec, ParameterValue, RegisterAddress};
use std::io::Cursor;
use strum::{Display, EnumString};

// All parameter and LED requests go through vendor request 0, the target is selected by the
// value / index fields.
const VENDOR_REQUEST: u8 = 0;

const READ_FLAG: u16 = 0x80;
const READ_INTEGER_FLAG: u16 = 0x40;

const WRITE_TYPE_FLOAT: i32 = 0;
const WRITE_TYPE_INTEGER: i32 = 1;

pub const PIXEL_RING_RESOURCE: u16 = 0x1C;
pub const PARAMETER_RESPONSE_LENGTH: usize = 8;
pub const PARAMETER_PAYLOAD_LENGTH: usize = 12;

// The DFU interface's class code and subclass, present in both runtime and DFU modes.
pub const DFU_INTERFACE_CLASS: u8 = 0xFE;
pub const DFU_INTERFACE_SUBCLASS: u8 = 0x01;

/// The addressing fields of a single vendor control transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegisterRequest {
    pub request: u8,
    pub value: u16,
    pub index: u16,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    ReadParameter(RegisterAddress, bool),
    WriteParameter(RegisterAddress),
    PixelRing(u8),
}

impl Command {
    pub fn read(spec: &ParameterSpec) -> Self {
        Command::ReadParameter(spec.register, spec.kind.is_integer())
    }

    pub fn request(&self) -> RegisterRequest {
        match self {
            Command::ReadParameter(address, integer) => {
                let mut value = READ_FLAG | address.offset;
                if *integer {
                    value |= READ_INTEGER_FLAG;
                }
                RegisterRequest {
                    request: VENDOR_REQUEST,
                    value,
                    index: address.resource_id,
                }
            }
            Command::WriteParameter(address) => RegisterRequest {
                request: VENDOR_REQUEST,
                value: 0,
                index: address.resource_id,
            },
            Command::PixelRing(command) => RegisterRequest {
                request: VENDOR_REQUEST,
                value: *command as u16,
                index: PIXEL_RING_RESOURCE,
            },
        }
    }
}

/// Single request XMOS extensions, sent as empty class requests to the DFU interface.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum DeviceControl {
    /// Reboots the device.
    ResetDevice,

    /// Drops any upgraded firmware image, the factory image runs from the next boot.
    RevertFactory,

    /// Reboots a device in DFU mode back into its runtime firmware.
    LeaveDfu,

    /// Stores the current parameter values in flash, they survive a power cycle.
    SaveState,

    /// Reloads the values last stored with `SaveState`.
    RestoreState,
}

impl DeviceControl {
    pub fn request(&self) -> u8 {
        match self {
            DeviceControl::ResetDevice => 0xF0,
            DeviceControl::RevertFactory => 0xF1,
            DeviceControl::LeaveDfu => 0xF3,
            DeviceControl::SaveState => 0xF5,
            DeviceControl::RestoreState => 0xF6,
        }
    }

    /// The device drops off the bus and re-enumerates after these.
    pub fn reboots(&self) -> bool {
        matches!(self, DeviceControl::ResetDevice | DeviceControl::LeaveDfu)
    }

    /// Parameter values on the device may no longer match what was last read or written.
    pub fn changes_parameters(&self) -> bool {
        matches!(self, DeviceControl::RestoreState)
    }
}

/// Builds the body of a parameter write: offset, value, then a type marker (1 for integer
/// values, 0 for floats).
pub fn encode_parameter(
    spec: &ParameterSpec,
    value: ParameterValue,
) -> [u8; PARAMETER_PAYLOAD_LENGTH] {
    let mut payload = [0; PARAMETER_PAYLOAD_LENGTH];
    LittleEndian::write_i32(&mut payload[0..4], spec.register.offset as i32);
    if spec.kind.is_integer() {
        LittleEndian::write_i32(&mut payload[4..8], value.as_i32());
        LittleEndian::write_i32(&mut payload[8..12], WRITE_TYPE_INTEGER);
    } else {
        LittleEndian::write_f32(&mut payload[4..8], value.as_f32());
        LittleEndian::write_i32(&mut payload[8..12], WRITE_TYPE_FLOAT);
    }
    payload
}

/// The firmware answers a read with two i32s. Integer parameters only use the first, floats are
/// sent as a mantissa and a power of two exponent.
pub fn decode_parameter(
    spec: &ParameterSpec,
    response: &[u8],
) -> Result<ParameterValue, CommandError> {
    let mut cursor = Cursor::new(response);
    let mantissa = cursor.read_i32::<LittleEndian>()?;
    let exponent = cursor.read_i32::<LittleEndian>()?;

    let float = (mantissa as f64 * 2f64.powi(exponent)) as f32;
    Ok(spec.value_from_raw(mantissa, float))
}

pub fn encode_pixel_ring(command: &PixelRingCommand) -> (RegisterRequest, Vec<u8>) {
    (
        Command::PixelRing(command.id()).request(),
        command.payload(),
    )
}
