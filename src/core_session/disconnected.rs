use crate::constants::{REPLY_LOGGED_IN, REPLY_NEED_PASSWORD};
use crate::core_ftpcommand::FtpCommand;
use crate::core_network::{ControlChannel, Endpoint};
use crate::core_session::connected::Connected;
use crate::core_session::SessionOptions;
use crate::error::{FtpError, FtpResult};
use crate::events::EventSink;
use log::{info, warn};
use std::time::Duration;

/// No control connection; only the parameters for the next one.
#[derive(Debug, Clone)]
pub struct Disconnected {
    endpoint: Endpoint,
}

impl Disconnected {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn set_server(&mut self, server: impl Into<String>) {
        self.endpoint.server = server.into();
    }

    pub fn set_port(&mut self, port: u16) {
        self.endpoint.port = port;
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.endpoint.timeout = timeout;
    }

    /// Opens a control connection, logs in and establishes the root
    /// directory. The connection is dropped again if any step fails.
    pub async fn connect(
        &self,
        user: &str,
        password: &str,
        options: SessionOptions,
        events: EventSink,
    ) -> FtpResult<Connected> {
        if self.endpoint.server.is_empty() {
            return Err(FtpError::invalid_operation("no server configured"));
        }
        let mut control = ControlChannel::connect(self.endpoint.clone(), events.clone()).await?;
        login(&mut control, user, password).await?;
        Connected::establish(control, options, events).await
    }
}

async fn login(control: &mut ControlChannel, user: &str, password: &str) -> FtpResult<()> {
    let mut resp = control.command(&FtpCommand::User(user.to_string())).await?;
    if resp.code() == REPLY_NEED_PASSWORD {
        resp = control
            .command(&FtpCommand::Pass(password.to_string()))
            .await?;
    }
    if resp.code() != REPLY_LOGGED_IN {
        warn!("Login as {} refused: {}", user, resp);
        return Err(FtpError::AuthenticationFailed(resp));
    }
    info!("Logged in as {}", user);
    Ok(())
}
