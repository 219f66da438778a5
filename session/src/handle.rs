use crate::error::SessionError;
use crate::session::{CancelToken, ParameterValues, Session, StateChange};
use respeaker_types::{DeviceDescriptor, ParameterValue, StatusSnapshot};
use respeaker_usb::commands::DeviceControl;
use respeaker_usb::pixelring::PixelRingCommand;
use log::warn;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Runs session operations on tokio's blocking pool, so USB transfers never stall the caller's
/// event loop.
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<Session>,
}

/// A connect running in the background.
pub struct ConnectTask {
    cancel: CancelToken,
    task: JoinHandle<Result<(), SessionError>>,
}

impl ConnectTask {
    /// Asks the connect to stop at its next checkpoint, the session ends up `Disconnected`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn wait(self) -> Result<(), SessionError> {
        self.task.await?
    }
}

impl SessionHandle {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    async fn run<T, F>(&self, operation: F) -> Result<T, SessionError>
    where
        T: Send + 'static,
        F: FnOnce(&Session) -> Result<T, SessionError> + Send + 'static,
    {
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || operation(&session)).await?
    }

    pub fn connect(&self, descriptor: DeviceDescriptor) -> ConnectTask {
        self.connect_with_cancel(descriptor, CancelToken::new())
    }

    pub fn connect_with_cancel(
        &self,
        descriptor: DeviceDescriptor,
        cancel: CancelToken,
    ) -> ConnectTask {
        let session = self.session.clone();
        let token = cancel.clone();
        let task = tokio::task::spawn_blocking(move || {
            session.connect_with_cancel(&descriptor, &token)
        });
        ConnectTask { cancel, task }
    }

    /// Connects, giving up after `timeout`. An abandoned connect is cancelled rather than left
    /// running, so the session still settles on `Disconnected` once the device answers.
    pub async fn connect_timeout(
        &self,
        descriptor: DeviceDescriptor,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        let cancel = CancelToken::new();
        let task = self.connect_with_cancel(descriptor, cancel.clone());
        match tokio::time::timeout(timeout, task.wait()).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Connect timed out after {:?}, cancelling", timeout);
                cancel.cancel();
                Err(SessionError::TimedOut(timeout))
            }
        }
    }

    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.run(|session| {
            session.disconnect();
            Ok(())
        })
        .await
    }

    pub async fn reset(&self) -> Result<(), SessionError> {
        self.run(|session| {
            session.reset();
            Ok(())
        })
        .await
    }

    pub async fn get(&self, name: &str) -> Result<ParameterValue, SessionError> {
        let name = name.to_string();
        self.run(move |session| session.get(&name)).await
    }

    pub async fn set(&self, name: &str, value: ParameterValue) -> Result<(), SessionError> {
        let name = name.to_string();
        self.run(move |session| session.set(&name, value)).await
    }

    pub async fn refresh_all(&self) -> Result<ParameterValues, SessionError> {
        self.run(|session| session.refresh_all()).await
    }

    pub async fn pixel_ring(&self, command: PixelRingCommand) -> Result<(), SessionError> {
        self.run(move |session| session.pixel_ring(&command)).await
    }

    pub async fn device_control(&self, control: DeviceControl) -> Result<(), SessionError> {
        self.run(move |session| session.device_control(control)).await
    }

    pub async fn leave_dfu(&self, descriptor: DeviceDescriptor) -> Result<(), SessionError> {
        self.run(move |session| session.leave_dfu(&descriptor)).await
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.session.snapshot()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StateChange> {
        self.session.subscribe()
    }
}
