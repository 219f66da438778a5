use crate::error::SessionError;
use crate::status::{project, SessionStatus};
use log::{debug, info, warn};
use respeaker_types::{
    DeviceDescriptor, ParameterTable, ParameterValue, SessionState, StatusSnapshot,
};
use respeaker_usb::commands::DeviceControl;
use respeaker_usb::device::base::{DeviceBus, FullRespeakerDevice};
use respeaker_usb::error::CommandError;
use respeaker_usb::pixelring::PixelRingCommand;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Parameter values in table order.
pub type ParameterValues = Vec<(&'static str, ParameterValue)>;

type StateCallback = Box<dyn Fn(&StateChange) + Send>;

/// Emitted once for every state transition, in the order the transitions happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateChange {
    pub sequence: u64,
    pub from: SessionState,
    pub to: SessionState,
    pub snapshot: StatusSnapshot,
}

/// Cooperative cancellation for an in-flight connect.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
struct Notifier {
    sequence: u64,
    subscribers: Vec<mpsc::UnboundedSender<StateChange>>,
    callbacks: Vec<StateCallback>,
}

impl Notifier {
    fn publish(&mut self, from: SessionState, to: SessionState, snapshot: StatusSnapshot) {
        self.sequence += 1;
        let change = StateChange {
            sequence: self.sequence,
            from,
            to,
            snapshot,
        };

        // Receivers which have gone away are simply dropped from the list.
        self.subscribers
            .retain(|subscriber| subscriber.send(change.clone()).is_ok());
        for callback in &self.callbacks {
            callback(&change);
        }
    }
}

struct SessionInner {
    status: SessionStatus,
    device: Option<Box<dyn FullRespeakerDevice>>,
    values: HashMap<&'static str, ParameterValue>,
    notifier: Notifier,
}

/// A connection to a single ReSpeaker. Every operation takes the session lock for its whole
/// duration (including any transfer and the resulting state change), so operations on one
/// session never interleave.
///
/// The device handle only exists while the session is `Connected`, as do cached values.
pub struct Session {
    bus: Arc<dyn DeviceBus>,
    table: ParameterTable,
    inner: Mutex<SessionInner>,
}

impl Session {
    pub fn new(bus: Arc<dyn DeviceBus>, table: ParameterTable) -> Self {
        Self {
            bus,
            table,
            inner: Mutex::new(SessionInner {
                status: SessionStatus::default(),
                device: None,
                values: HashMap::new(),
                notifier: Notifier::default(),
            }),
        }
    }

    pub fn table(&self) -> &ParameterTable {
        &self.table
    }

    pub fn bus(&self) -> &Arc<dyn DeviceBus> {
        &self.bus
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        // A panicking state callback shouldn't take the whole session down with it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, inner: &mut SessionInner, to: SessionState) {
        let from = inner.status.state;
        inner.status.state = to;

        if to != SessionState::Connected {
            inner.values.clear();
            if let Some(mut device) = inner.device.take() {
                device.close();
            }
        }
        match to {
            SessionState::Disconnected => inner.status.descriptor = None,
            SessionState::Connected => inner.status.last_error = None,
            _ => {}
        }

        info!("Session state changed: {} -> {}", from, to);
        let snapshot = project(&inner.status);
        inner.notifier.publish(from, to, snapshot);
    }

    fn fail_io(&self, inner: &mut SessionInner, error: CommandError) -> SessionError {
        inner.status.last_error = Some(error.to_string());

        // Some hosts report a pulled cable as a pipe or IO error, so double check the device.
        let vanished = error.is_disconnect()
            || inner
                .device
                .as_mut()
                .is_some_and(|device| !device.is_connected());
        if vanished {
            warn!("Device has gone away: {}", error);
            self.transition(inner, SessionState::Disconnected);
        } else {
            warn!("Device I/O failed: {}", error);
            self.transition(inner, SessionState::Error);
        }
        SessionError::IoError(error)
    }

    pub fn connect(&self, descriptor: &DeviceDescriptor) -> Result<(), SessionError> {
        self.connect_with_cancel(descriptor, &CancelToken::new())
    }

    pub fn connect_with_cancel(
        &self,
        descriptor: &DeviceDescriptor,
        cancel: &CancelToken,
    ) -> Result<(), SessionError> {
        let mut inner = self.lock();

        let state = inner.status.state;
        match state {
            SessionState::Connected => {
                let current = inner.status.descriptor.as_ref();
                if current.is_some_and(|current| current.same_device(descriptor)) {
                    debug!("Already connected to {}", descriptor);
                    return Ok(());
                }
                let current = current.map(|current| current.to_string()).unwrap_or_default();
                return Err(SessionError::AlreadyConnected(current));
            }

            // A retry after a failure starts from a clean slate.
            SessionState::Error | SessionState::Connecting => {
                self.transition(&mut inner, SessionState::Disconnected)
            }
            SessionState::Disconnected => {}
        }

        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }

        inner.status.descriptor = Some(descriptor.clone());
        self.transition(&mut inner, SessionState::Connecting);

        let mut device = match self.bus.open(descriptor) {
            Ok(device) => device,
            Err(error) => {
                warn!("Unable to open {}: {}", descriptor, error);
                inner.status.last_error = Some(error.to_string());
                self.transition(&mut inner, SessionState::Error);
                return Err(SessionError::TransportUnavailable(error));
            }
        };

        debug!("Opened {}", device.descriptor());
        if cancel.is_cancelled() {
            device.close();
            self.transition(&mut inner, SessionState::Disconnected);
            return Err(SessionError::Cancelled);
        }

        // Make sure the vendor control pipe actually answers before calling this connected.
        let handshake = self.table.first();
        if let Err(error) = device.read_parameter(handshake) {
            warn!("Handshake with {} failed: {}", descriptor, error);
            device.close();
            inner.status.last_error = Some(error.to_string());
            self.transition(&mut inner, SessionState::Error);
            return Err(SessionError::IoError(error));
        }

        if cancel.is_cancelled() {
            device.close();
            self.transition(&mut inner, SessionState::Disconnected);
            return Err(SessionError::Cancelled);
        }

        inner.device = Some(device);
        self.transition(&mut inner, SessionState::Connected);
        Ok(())
    }

    pub fn disconnect(&self) {
        let mut inner = self.lock();
        if inner.status.state != SessionState::Disconnected {
            self.transition(&mut inner, SessionState::Disconnected);
        }
    }

    /// Acknowledges an error, returning the session to `Disconnected`. From any other state this
    /// behaves as `disconnect`.
    pub fn reset(&self) {
        self.disconnect();
    }

    pub fn get(&self, name: &str) -> Result<ParameterValue, SessionError> {
        let mut inner = self.lock();
        if inner.status.state != SessionState::Connected {
            return Err(SessionError::NotConnected);
        }
        let spec = self.table.lookup(name)?;

        // Writable values only change through us (or a full refresh), so the cache is
        // authoritative. Read only values are live status and always come from the device.
        if spec.is_writable() {
            if let Some(value) = inner.values.get(spec.name) {
                return Ok(*value);
            }
        }

        let result = match inner.device.as_mut() {
            Some(device) => device.read_parameter(spec),
            None => return Err(SessionError::NotConnected),
        };

        match result {
            Ok(value) => {
                inner.values.insert(spec.name, value);
                Ok(value)
            }
            Err(error) => Err(self.fail_io(&mut inner, error)),
        }
    }

    pub fn set(&self, name: &str, value: ParameterValue) -> Result<(), SessionError> {
        let mut inner = self.lock();
        if inner.status.state != SessionState::Connected {
            return Err(SessionError::NotConnected);
        }

        let spec = self.table.lookup(name)?;
        if !spec.is_writable() {
            return Err(SessionError::ReadOnly(spec.name.to_string()));
        }
        let value = spec.validate(value)?;

        let result = match inner.device.as_mut() {
            Some(device) => device.write_parameter(spec, value),
            None => return Err(SessionError::NotConnected),
        };

        match result {
            Ok(()) => {
                inner.values.insert(spec.name, value);
                Ok(())
            }
            Err(error) => Err(self.fail_io(&mut inner, error)),
        }
    }

    /// Re-reads every parameter in table order. Either every read succeeds and the cache is
    /// replaced as a whole, or nothing read here is kept.
    pub fn refresh_all(&self) -> Result<ParameterValues, SessionError> {
        let mut inner = self.lock();
        if inner.status.state != SessionState::Connected {
            return Err(SessionError::NotConnected);
        }

        let mut values = Vec::with_capacity(self.table.len());
        let mut failure = None;
        match inner.device.as_mut() {
            Some(device) => {
                for spec in self.table.iter() {
                    match device.read_parameter(spec) {
                        Ok(value) => values.push((spec.name, value)),
                        Err(error) => {
                            debug!("Refresh failed reading {}", spec.name);
                            failure = Some(error);
                            break;
                        }
                    }
                }
            }
            None => return Err(SessionError::NotConnected),
        }

        if let Some(error) = failure {
            return Err(self.fail_io(&mut inner, error));
        }

        inner.values = values.iter().copied().collect();
        Ok(values)
    }

    /// A copy of everything currently cached, in table order.
    pub fn cached_values(&self) -> ParameterValues {
        let inner = self.lock();
        self.table
            .iter()
            .filter_map(|spec| inner.values.get(spec.name).map(|value| (spec.name, *value)))
            .collect()
    }

    pub fn pixel_ring(&self, command: &PixelRingCommand) -> Result<(), SessionError> {
        let mut inner = self.lock();
        if inner.status.state != SessionState::Connected {
            return Err(SessionError::NotConnected);
        }

        let result = match inner.device.as_mut() {
            Some(device) => device.set_pixel_ring(command),
            None => return Err(SessionError::NotConnected),
        };
        result.map_err(|error| self.fail_io(&mut inner, error))
    }

    /// Sends one of the device's control requests. A reboot ends the session, the device will
    /// come back as a new attachment.
    pub fn device_control(&self, control: DeviceControl) -> Result<(), SessionError> {
        let mut inner = self.lock();
        if inner.status.state != SessionState::Connected {
            return Err(SessionError::NotConnected);
        }

        let result = match inner.device.as_mut() {
            Some(device) => device.device_control(control),
            None => return Err(SessionError::NotConnected),
        };
        match result {
            Ok(()) => {}
            // Nothing went over the wire, the session is as healthy as it was.
            Err(CommandError::NoDfuInterface) => {
                return Err(SessionError::IoError(CommandError::NoDfuInterface))
            }
            Err(error) => return Err(self.fail_io(&mut inner, error)),
        }

        info!("Sent {} to {}", control, describe(&inner.status.descriptor));
        if control.reboots() {
            self.transition(&mut inner, SessionState::Disconnected);
        } else if control.changes_parameters() {
            inner.values.clear();
        }
        Ok(())
    }

    /// Reboots a device out of DFU mode. Such a device can never be the session's own, so this
    /// leaves the session state alone.
    pub fn leave_dfu(&self, descriptor: &DeviceDescriptor) -> Result<(), SessionError> {
        let _inner = self.lock();
        self.bus.leave_dfu(descriptor).map_err(|error| {
            warn!("Unable to take {} out of DFU mode: {}", descriptor, error);
            SessionError::TransportUnavailable(error)
        })
    }

    pub fn state(&self) -> SessionState {
        self.lock().status.state
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status.clone()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        project(&self.lock().status)
    }

    /// Returns a receiver which will get every future state change, in order.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StateChange> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock().notifier.subscribers.push(sender);
        receiver
    }

    /// Registers a callback for every future state change. Callbacks run on whichever thread
    /// performed the transition, while the session is still locked, so they must not call back
    /// into the session.
    pub fn on_state_change<F>(&self, callback: F)
    where
        F: Fn(&StateChange) + Send + 'static,
    {
        self.lock().notifier.callbacks.push(Box::new(callback));
    }
}

fn describe(descriptor: &Option<DeviceDescriptor>) -> String {
    descriptor
        .as_ref()
        .map(|descriptor| descriptor.to_string())
        .unwrap_or_default()
}

impl Drop for Session {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut device) = inner.device.take() {
            device.close();
        }
    }
}
