use crate::core_network::control::ControlChannel;
use crate::core_reply::FtpResponse;
use crate::core_transfer::registry::TransferRegistration;
use crate::error::{FtpError, FtpResult};
use crate::events::TransferDirection;
use log::{debug, warn};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// A passive-mode data connection bound to one transfer direction.
///
/// The stream holds the session's [`TransferRegistration`], so at most one of
/// them exists per session. Reads are only legal on download streams and
/// writes only on upload streams. Every read or write also watches the
/// registration's abort flag and fails with [`FtpError::UserAbort`] as soon
/// as it is raised.
#[derive(Debug)]
pub struct DataStream {
    socket: TcpStream,
    direction: TransferDirection,
    registration: TransferRegistration,
    timeout: Duration,
    started: bool,
}

impl DataStream {
    pub(crate) fn new(
        socket: TcpStream,
        direction: TransferDirection,
        registration: TransferRegistration,
        timeout: Duration,
    ) -> Self {
        Self {
            socket,
            direction,
            registration,
            timeout,
            started: false,
        }
    }

    pub fn direction(&self) -> TransferDirection {
        self.direction
    }

    /// Records that the server accepted the transfer verb, so a completion
    /// reply is owed on the control connection.
    pub fn mark_started(&mut self) {
        self.started = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.registration.is_aborted()
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> FtpResult<usize> {
        if self.direction != TransferDirection::Download {
            return Err(FtpError::NotSupported("reading from an upload stream"));
        }
        if self.registration.is_aborted() {
            return Err(FtpError::UserAbort);
        }
        let limit = self.timeout;
        let socket = &mut self.socket;
        let registration = &mut self.registration;
        tokio::select! {
            biased;
            _ = registration.aborted() => Err(FtpError::UserAbort),
            read = timeout(limit, socket.read(buf)) => {
                let n = read.map_err(|_| FtpError::Timeout("reading the data connection".into()))??;
                Ok(n)
            }
        }
    }

    pub async fn write_all(&mut self, buf: &[u8]) -> FtpResult<()> {
        if self.direction != TransferDirection::Upload {
            return Err(FtpError::NotSupported("writing to a download stream"));
        }
        if self.registration.is_aborted() {
            return Err(FtpError::UserAbort);
        }
        let limit = self.timeout;
        let socket = &mut self.socket;
        let registration = &mut self.registration;
        tokio::select! {
            biased;
            _ = registration.aborted() => Err(FtpError::UserAbort),
            written = timeout(limit, socket.write_all(buf)) => {
                written.map_err(|_| FtpError::Timeout("writing the data connection".into()))??;
                Ok(())
            }
        }
    }

    /// Closes the data connection and gives the registration back.
    ///
    /// When the transfer verb was accepted, the completion reply is read from
    /// the control connection and returned. After an error that read is best
    /// effort: its failure is logged and `None` is returned.
    pub async fn close(
        self,
        control: &mut ControlChannel,
        error: bool,
    ) -> FtpResult<Option<FtpResponse>> {
        let DataStream {
            mut socket,
            registration,
            started,
            direction,
            ..
        } = self;

        if let Err(e) = socket.shutdown().await {
            debug!("Data connection shutdown for {:?}: {}", direction, e);
        }
        drop(socket);

        let reply = if !started {
            None
        } else if error {
            match control.read_response().await {
                Ok(resp) => Some(resp),
                Err(e) => {
                    warn!("No completion reply after failed {:?}: {}", direction, e);
                    None
                }
            }
        } else {
            Some(control.read_response().await?)
        };

        drop(registration);
        Ok(reply)
    }
}
