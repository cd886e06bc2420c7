//! The client session as a two-state machine.
//!
//! [`SessionState`] is either [`Disconnected`] or [`Connected`]. Transitions
//! consume the current state and hand back the next one together with the
//! operation's result, so the facade simply stores whatever comes back.

pub mod connected;
pub mod disconnected;

pub use connected::Connected;
pub use disconnected::Disconnected;

use crate::constants::DEFAULT_LOCK_WAIT_SECS;
use crate::core_directory::DirId;
use crate::core_network::{ControlChannel, Endpoint};
use crate::error::{FtpError, FtpResult};
use crate::events::EventSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Session behaviour fixed at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub case_sensitive: bool,
    pub lock_wait: Duration,
    pub preserve_timestamps: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            lock_wait: Duration::from_secs(DEFAULT_LOCK_WAIT_SECS),
            preserve_timestamps: true,
        }
    }
}

#[derive(Debug)]
pub enum SessionState {
    Disconnected(Disconnected),
    Connected(Box<Connected>),
}

fn not_connected(what: &str) -> FtpError {
    FtpError::invalid_operation(format!("{} requires a connected session", what))
}

impl SessionState {
    pub fn new(endpoint: Endpoint) -> Self {
        SessionState::Disconnected(Disconnected::new(endpoint))
    }

    pub fn endpoint(&self) -> &Endpoint {
        match self {
            SessionState::Disconnected(d) => d.endpoint(),
            SessionState::Connected(c) => c.endpoint(),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected(_))
    }

    pub fn connected(&self) -> FtpResult<&Connected> {
        match self {
            SessionState::Connected(c) => Ok(c),
            SessionState::Disconnected(_) => Err(not_connected("this operation")),
        }
    }

    pub fn connected_mut(&mut self) -> FtpResult<&mut Connected> {
        match self {
            SessionState::Connected(c) => Ok(c),
            SessionState::Disconnected(_) => Err(not_connected("this operation")),
        }
    }

    pub fn disconnected_mut(&mut self) -> FtpResult<&mut Disconnected> {
        match self {
            SessionState::Disconnected(d) => Ok(d),
            SessionState::Connected(_) => Err(FtpError::invalid_operation(
                "connection parameters cannot change while connected",
            )),
        }
    }

    pub fn current_directory(&self) -> FtpResult<DirId> {
        match self {
            SessionState::Connected(c) => Ok(c.current_directory()),
            SessionState::Disconnected(_) => Err(not_connected("CurrentDirectory")),
        }
    }

    pub async fn set_current_directory(&mut self, dir: DirId) -> FtpResult<()> {
        match self {
            SessionState::Connected(c) => c.set_current_directory(dir).await,
            SessionState::Disconnected(_) => Err(not_connected("CurrentDirectory")),
        }
    }

    pub fn root_directory(&self) -> FtpResult<DirId> {
        match self {
            SessionState::Connected(c) => Ok(c.root_directory()),
            SessionState::Disconnected(_) => Err(not_connected("RootDirectory")),
        }
    }

    pub fn control_channel(&self) -> FtpResult<Arc<Mutex<ControlChannel>>> {
        match self {
            SessionState::Connected(c) => Ok(c.control_channel()),
            SessionState::Disconnected(_) => Err(not_connected("ControlChannel")),
        }
    }

    pub fn is_busy(&self) -> FtpResult<bool> {
        match self {
            SessionState::Connected(c) => Ok(c.is_busy()),
            SessionState::Disconnected(_) => Err(not_connected("IsBusy")),
        }
    }

    /// Disconnected → Connected on a successful login. On failure the state
    /// stays disconnected.
    pub async fn connect(
        self,
        user: &str,
        password: &str,
        options: SessionOptions,
        events: EventSink,
    ) -> (SessionState, FtpResult<()>) {
        match self {
            SessionState::Disconnected(d) => {
                let result = d.connect(user, password, options, events).await;
                match result {
                    Ok(connected) => (SessionState::Connected(Box::new(connected)), Ok(())),
                    Err(e) => (SessionState::Disconnected(d), Err(e)),
                }
            }
            connected @ SessionState::Connected(_) => (
                connected,
                Err(FtpError::invalid_operation("already connected")),
            ),
        }
    }

    /// Connected → Disconnected, keeping server, port and timeout. Closing a
    /// disconnected session does nothing.
    pub async fn close(self) -> (SessionState, FtpResult<()>) {
        match self {
            SessionState::Connected(c) => {
                let (disconnected, result) = c.close().await;
                (SessionState::Disconnected(disconnected), result)
            }
            disconnected @ SessionState::Disconnected(_) => (disconnected, Ok(())),
        }
    }
}
