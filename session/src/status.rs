use respeaker_types::{DeviceDescriptor, SessionState, StatusSnapshot};

/// The parts of a session a front end is allowed to see.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub descriptor: Option<DeviceDescriptor>,
    pub last_error: Option<String>,
}

/// Derives a presentation snapshot from a session's status. The result owns all of its data, so
/// holders are unaffected by anything the session does afterwards.
pub fn project(status: &SessionStatus) -> StatusSnapshot {
    StatusSnapshot {
        state: status.state,
        device: status.descriptor.clone(),
        last_error: status.last_error.clone(),
    }
}
