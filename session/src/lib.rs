pub mod discovery;
pub mod error;
pub mod handle;
pub mod poller;
pub mod session;
pub mod shutdown;
pub mod status;

#[cfg(test)]
mod mock;

pub use error::SessionError;
pub use session::{CancelToken, ParameterValues, Session, StateChange};
pub use status::{project, SessionStatus};
