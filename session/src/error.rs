use respeaker_types::ValueError;
use respeaker_usb::error::{CommandError, ConnectError};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("USB transport unavailable: {0}")]
    TransportUnavailable(#[source] ConnectError),

    #[error("Session is not connected")]
    NotConnected,

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Parameter {0} is read only")]
    ReadOnly(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Device I/O error: {0}")]
    IoError(#[source] CommandError),

    #[error("Session is already connected to {0}")]
    AlreadyConnected(String),

    #[error("Connection attempt cancelled")]
    Cancelled,

    #[error("Connection attempt timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

impl From<ValueError> for SessionError {
    fn from(error: ValueError) -> Self {
        match error {
            ValueError::UnknownParameter(name) => SessionError::UnknownParameter(name),
            ValueError::ReadOnly(name) => SessionError::ReadOnly(name),
            ValueError::InvalidValue { name, reason } => SessionError::InvalidValue { name, reason },
        }
    }
}

impl SessionError {
    /// Errors caused by the caller (bad names, values or ordering) rather than the device.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            SessionError::NotConnected
                | SessionError::UnknownParameter(_)
                | SessionError::ReadOnly(_)
                | SessionError::InvalidValue { .. }
                | SessionError::AlreadyConnected(_)
        )
    }
}
