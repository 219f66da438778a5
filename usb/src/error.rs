#[derive(thiserror::Error, Debug)]
pub enum ConnectError {
    #[error("No ReSpeaker device was found")]
    DeviceNotFound,

    #[error("USB error: {0}")]
    UsbError(#[from] rusb::Error),

    #[error("Device is in DFU mode, and cannot be configured")]
    DeviceInDfuMode,

    #[error("Device is not in DFU mode")]
    DeviceNotInDfuMode,

    #[error("Command failed: {0}")]
    CommandFailed(#[from] CommandError),
}

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("USB error: {0}")]
    UsbError(#[from] rusb::Error),

    #[error("Malformed response from ReSpeaker")]
    MalformedResponse(#[from] std::io::Error),

    #[error("Device has no DFU interface")]
    NoDfuInterface,
}

impl CommandError {
    /// True if the device has gone away entirely, rather than simply failing this request.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, CommandError::UsbError(rusb::Error::NoDevice))
    }
}
