// An in memory ReSpeaker, speaking the same register protocol as the real thing.

use crate::session::CancelToken;
use byteorder::{ByteOrder, LittleEndian};
use respeaker_types::{
    Access, DeviceDescriptor, DeviceMode, EnumOption, ParameterSpec, ParameterTable,
    ParameterValue,
};
use respeaker_usb::commands::{DeviceControl, RegisterRequest, PIXEL_RING_RESOURCE};
use respeaker_usb::device::base::{
    AttachDevice, DeviceBus, ExecutableDevice, FullRespeakerDevice, RespeakerCommands,
};
use respeaker_usb::error::{CommandError, ConnectError};
use respeaker_usb::rusb;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const HPF_OPTIONS: &[EnumOption] = &[
    EnumOption { code: 0, label: "off" },
    EnumOption { code: 1, label: "70hz" },
    EnumOption { code: 2, label: "125hz" },
    EnumOption { code: 3, label: "180hz" },
];

#[rustfmt::skip]
pub static SCENARIO: &[ParameterSpec] = &[
    ParameterSpec::integer("mic_gain", "MICGAIN", 19, 3, 0, 64, 16, Access::ReadWrite, "Microphone gain"),
    ParameterSpec::flag("agc_enabled", "AGCONOFF", 19, 0, Access::ReadWrite, ""),
    ParameterSpec::choice("hpf_mode", "HPFONOFF", 18, 27, HPF_OPTIONS, ""),
    ParameterSpec::float("aec_norm", "AECNORM", 18, 19, 0.25, 16.0, 0.25, Access::ReadWrite, ""),
    ParameterSpec::flag("voice_activity", "VOICEACTIVITY", 19, 32, Access::ReadOnly, ""),
];

pub fn scenario_descriptor() -> DeviceDescriptor {
    DeviceDescriptor {
        vendor_id: 0x2886,
        product_id: 0x0018,
        bus_number: 1,
        address: 4,
        serial: Some("ABC123".into()),
        name: "ReSpeaker 4 Mic Array (UAC1.0)".into(),
        mode: DeviceMode::Runtime,
    }
}

#[derive(Clone, Debug, Default)]
pub struct MockState {
    /// Raw (mantissa, exponent) pairs, keyed by (resource, offset).
    pub registers: HashMap<(u16, u16), (i32, i32)>,
    pub pixel_ring: Vec<(u8, Vec<u8>)>,
    /// Every device control request id, in the order they arrived.
    pub controls: Vec<u8>,
    pub reads: usize,
    pub writes: usize,
    pub opens: usize,
    pub closed: bool,
    pub unplugged: bool,

    devices: Vec<DeviceDescriptor>,
    saved: Option<HashMap<(u16, u16), (i32, i32)>>,
    no_dfu_interface: bool,
    fail_open: bool,
    open_delay: Option<Duration>,
    fail_reads: Option<(usize, rusb::Error)>,
    fail_writes: Option<rusb::Error>,
    cancel_on_open: Option<CancelToken>,
}

pub struct MockBus {
    table: ParameterTable,
    state: Arc<Mutex<MockState>>,
}

impl MockBus {
    pub fn new(table: ParameterTable) -> Self {
        let mut state = MockState {
            devices: vec![scenario_descriptor()],
            ..Default::default()
        };
        for spec in table.iter() {
            let key = (spec.register.resource_id, spec.register.offset);
            state.registers.insert(key, to_raw(spec.default));
        }

        Self {
            table,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn state(&self) -> MockState {
        self.state.lock().unwrap().clone()
    }

    /// Changes a value behind the session's back, as the firmware does for status registers.
    pub fn poke(&self, name: &str, value: ParameterValue) {
        let spec = self.table.lookup(name).unwrap();
        let key = (spec.register.resource_id, spec.register.offset);
        self.state.lock().unwrap().registers.insert(key, to_raw(value));
    }

    pub fn set_devices(&self, devices: Vec<DeviceDescriptor>) {
        self.state.lock().unwrap().devices = devices;
    }

    pub fn fail_open(&self, fail: bool) {
        self.state.lock().unwrap().fail_open = fail;
    }

    pub fn fail_reads_after(&self, successful: usize, error: rusb::Error) {
        self.state.lock().unwrap().fail_reads = Some((successful, error));
    }

    pub fn fail_writes(&self, error: rusb::Error) {
        self.state.lock().unwrap().fail_writes = Some(error);
    }

    pub fn without_dfu_interface(&self) {
        self.state.lock().unwrap().no_dfu_interface = true;
    }

    /// Opening blocks for this long, like a device that's slow to answer.
    pub fn delay_open(&self, delay: Duration) {
        self.state.lock().unwrap().open_delay = Some(delay);
    }

    pub fn cancel_on_open(&self, token: CancelToken) {
        self.state.lock().unwrap().cancel_on_open = Some(token);
    }

    /// The cable is gone, but the host reports it as a stalled pipe rather than a missing device.
    pub fn unplug(&self) {
        let mut state = self.state.lock().unwrap();
        state.unplugged = true;
        state.fail_writes = Some(rusb::Error::Pipe);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_open = false;
        state.no_dfu_interface = false;
        state.unplugged = false;
        state.fail_reads = None;
        state.fail_writes = None;
    }
}

impl DeviceBus for MockBus {
    fn scan(&self) -> Result<Vec<DeviceDescriptor>, ConnectError> {
        Ok(self.state.lock().unwrap().devices.clone())
    }

    fn open(
        &self,
        descriptor: &DeviceDescriptor,
    ) -> Result<Box<dyn FullRespeakerDevice>, ConnectError> {
        let delay = self.state.lock().unwrap().open_delay;
        if let Some(delay) = delay {
            thread::sleep(delay);
        }

        let mut state = self.state.lock().unwrap();
        if state.fail_open {
            return Err(ConnectError::UsbError(rusb::Error::Access));
        }
        if let Some(token) = &state.cancel_on_open {
            token.cancel();
        }
        state.opens += 1;
        state.closed = false;

        Ok(Box::new(MockDevice {
            descriptor: descriptor.clone(),
            state: self.state.clone(),
            closed: false,
        }))
    }

    fn leave_dfu(&self, descriptor: &DeviceDescriptor) -> Result<(), ConnectError> {
        if descriptor.mode != DeviceMode::Dfu {
            return Err(ConnectError::DeviceNotInDfuMode);
        }
        let mut state = self.state.lock().unwrap();
        let device = state
            .devices
            .iter_mut()
            .find(|device| device.same_device(descriptor))
            .ok_or(ConnectError::DeviceNotFound)?;

        device.mode = DeviceMode::Runtime;
        state.controls.push(DeviceControl::LeaveDfu.request());
        Ok(())
    }
}

struct MockDevice {
    descriptor: DeviceDescriptor,
    state: Arc<Mutex<MockState>>,
    closed: bool,
}

impl AttachDevice for MockDevice {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn is_connected(&mut self) -> bool {
        !self.closed && !self.state.lock().unwrap().unplugged
    }

    fn close(&mut self) {
        self.closed = true;
        self.state.lock().unwrap().closed = true;
    }
}

impl ExecutableDevice for MockDevice {
    fn read_request(
        &mut self,
        request: RegisterRequest,
        length: usize,
    ) -> Result<Vec<u8>, CommandError> {
        if self.closed {
            return Err(rusb::Error::NoDevice.into());
        }
        let mut state = self.state.lock().unwrap();
        if let Some((remaining, error)) = state.fail_reads.as_mut() {
            if *remaining == 0 {
                return Err((*error).into());
            }
            *remaining -= 1;
        }
        state.reads += 1;

        let offset = request.value & 0x3F;
        let (mantissa, exponent) = state
            .registers
            .get(&(request.index, offset))
            .copied()
            .unwrap_or_default();

        let mut response = vec![0; length];
        LittleEndian::write_i32(&mut response[0..4], mantissa);
        LittleEndian::write_i32(&mut response[4..8], exponent);
        Ok(response)
    }

    fn write_request(&mut self, request: RegisterRequest, data: &[u8]) -> Result<(), CommandError> {
        if self.closed {
            return Err(rusb::Error::NoDevice.into());
        }
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.fail_writes {
            return Err(error.into());
        }
        state.writes += 1;

        if request.index == PIXEL_RING_RESOURCE {
            state.pixel_ring.push((request.value as u8, data.to_vec()));
            return Ok(());
        }

        let offset = LittleEndian::read_i32(&data[0..4]) as u16;
        let raw = if LittleEndian::read_i32(&data[8..12]) == 1 {
            (LittleEndian::read_i32(&data[4..8]), 0)
        } else {
            to_raw(ParameterValue::Float(LittleEndian::read_f32(&data[4..8])))
        };
        state.registers.insert((request.index, offset), raw);
        Ok(())
    }

    fn control_request(&mut self, request: u8) -> Result<(), CommandError> {
        if self.closed {
            return Err(rusb::Error::NoDevice.into());
        }
        let mut state = self.state.lock().unwrap();
        if state.no_dfu_interface {
            return Err(CommandError::NoDfuInterface);
        }
        if let Some(error) = state.fail_writes {
            return Err(error.into());
        }
        state.controls.push(request);

        if request == DeviceControl::SaveState.request() {
            state.saved = Some(state.registers.clone());
        } else if request == DeviceControl::RestoreState.request() {
            if let Some(saved) = state.saved.clone() {
                state.registers = saved;
            }
        }
        Ok(())
    }
}

impl RespeakerCommands for MockDevice {}
impl FullRespeakerDevice for MockDevice {}

// Floats are stored as an exact mantissa / power of two pair, the same way the firmware
// reports them.
fn to_raw(value: ParameterValue) -> (i32, i32) {
    match value {
        ParameterValue::Float(value) => {
            let mut mantissa = value as f64;
            let mut exponent = 0;
            while mantissa.fract() != 0.0 {
                mantissa *= 2.0;
                exponent -= 1;
            }
            (mantissa as i32, exponent)
        }
        other => (other.as_i32(), 0),
    }
}
