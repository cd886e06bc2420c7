use crate::constants::{REPLY_CLOSING_DATA, REPLY_FILE_ACTION_OK, REPLY_SERVICE_READY};
use crate::core_ftpcommand::{FtpCommand, TransferMode};
use crate::core_network::{pasv, DataStream, Endpoint};
use crate::core_reply::{self, FtpResponse};
use crate::core_transfer::registry::TransferRegistration;
use crate::error::{FtpError, FtpResult};
use crate::events::{EventSink, FtpEvent, TransferDirection};
use lazy_static::lazy_static;
use log::{debug, info, trace, warn};
use regex::Regex;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

lazy_static! {
    static ref QUOTED_PATH: Regex = Regex::new(r#""((?:[^"]|"")*)""#).expect("static PWD pattern");
}

/// The control connection: one command in flight at a time, each followed by
/// exactly one reply.
#[derive(Debug)]
pub struct ControlChannel {
    endpoint: Endpoint,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    response: Option<FtpResponse>,
    transfer_mode: TransferMode,
    events: EventSink,
}

impl ControlChannel {
    /// Opens the control connection and consumes the server greeting, which
    /// must be a 220.
    pub async fn connect(endpoint: Endpoint, events: EventSink) -> FtpResult<Self> {
        let addr = format!("{}:{}", endpoint.server, endpoint.port);
        let socket = timeout(endpoint.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| FtpError::Timeout(format!("connecting to {}", addr)))??;
        socket.set_nodelay(true).ok();
        debug!("Control connection established with {}", addr);

        let (rd, wr) = socket.into_split();
        let mut channel = Self {
            endpoint,
            reader: BufReader::new(rd),
            writer: wr,
            response: None,
            transfer_mode: TransferMode::Unknown,
            events,
        };

        let greeting = channel.read_response().await?;
        if greeting.code() != REPLY_SERVICE_READY {
            warn!("Server {} not ready: {}", addr, greeting);
            return Err(FtpError::ServerDown(greeting));
        }
        info!("Connected to {}: {}", addr, greeting);
        Ok(channel)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The last reply read on this connection.
    pub fn response(&self) -> Option<&FtpResponse> {
        self.response.as_ref()
    }

    pub fn transfer_mode(&self) -> TransferMode {
        self.transfer_mode
    }

    /// Sends one command and waits for its reply, whatever its code.
    pub async fn command(&mut self, cmd: &FtpCommand) -> FtpResult<FtpResponse> {
        let line = format!("{}\r\n", cmd);
        timeout(self.endpoint.timeout, self.writer.write_all(line.as_bytes()))
            .await
            .map_err(|_| FtpError::Timeout(format!("sending {}", cmd.verb())))??;

        let shown = cmd.redacted();
        trace!(">>> {}", shown);
        self.events.emit(FtpEvent::CommandSent(shown));
        self.read_response().await
    }

    /// Reads the next reply; used directly for replies not triggered by a
    /// command, such as the end of a data transfer.
    pub async fn read_response(&mut self) -> FtpResult<FtpResponse> {
        let result = core_reply::read_response(&mut self.reader, self.endpoint.timeout).await;
        match &result {
            Ok(resp) | Err(FtpError::ServerDown(resp)) => {
                self.response = Some(resp.clone());
                self.events.emit(FtpEvent::ResponseReceived(resp.clone()));
            }
            Err(_) => {}
        }
        result
    }

    /// Sends `cmd` and fails unless the reply code is one it accepts.
    async fn expect(&mut self, cmd: FtpCommand) -> FtpResult<FtpResponse> {
        let response = self.command(&cmd).await?;
        if !response.is_any(cmd.expected_codes()) {
            return Err(FtpError::CommandFailed {
                command: cmd.redacted(),
                response,
            });
        }
        Ok(response)
    }

    pub async fn store(&mut self, name: &str) -> FtpResult<FtpResponse> {
        self.expect(FtpCommand::Stor(name.to_string())).await
    }

    pub async fn retrieve(&mut self, name: &str) -> FtpResult<FtpResponse> {
        self.expect(FtpCommand::Retr(name.to_string())).await
    }

    pub async fn delete(&mut self, name: &str) -> FtpResult<()> {
        self.expect(FtpCommand::Dele(name.to_string())).await?;
        Ok(())
    }

    pub async fn remove_directory(&mut self, name: &str) -> FtpResult<()> {
        self.expect(FtpCommand::Rmd(name.to_string())).await?;
        Ok(())
    }

    /// `MKD`; returns the path the server reports for the new directory.
    pub async fn make_directory(&mut self, name: &str) -> FtpResult<String> {
        let resp = self.expect(FtpCommand::Mkd(name.to_string())).await?;
        Ok(parse_quoted_path(&resp).unwrap_or_else(|_| name.to_string()))
    }

    pub async fn print_working_directory(&mut self) -> FtpResult<String> {
        let resp = self.expect(FtpCommand::Pwd).await?;
        parse_quoted_path(&resp)
    }

    pub async fn change_working_directory(&mut self, path: &str) -> FtpResult<()> {
        self.expect(FtpCommand::Cwd(path.to_string())).await?;
        Ok(())
    }

    pub async fn change_to_parent(&mut self) -> FtpResult<()> {
        self.expect(FtpCommand::Cdup).await?;
        Ok(())
    }

    /// `REST`: the next `RETR`/`STOR` starts at `offset`.
    pub async fn restart(&mut self, offset: u64) -> FtpResult<()> {
        match self.expect(FtpCommand::Rest(offset)).await {
            Err(FtpError::CommandFailed { response, .. }) => {
                Err(FtpError::ResumeNotSupported(response))
            }
            other => other.map(|_| ()),
        }
    }

    pub async fn rename(&mut self, from: &str, to: &str) -> FtpResult<()> {
        self.expect(FtpCommand::Rnfr(from.to_string())).await?;
        self.expect(FtpCommand::Rnto(to.to_string())).await?;
        Ok(())
    }

    /// Sends `TYPE` only when `mode` differs from the mode last set. The reply
    /// is not checked.
    pub async fn set_transfer_mode(&mut self, mode: TransferMode) -> FtpResult<()> {
        if mode == self.transfer_mode || mode == TransferMode::Unknown {
            return Ok(());
        }
        self.command(&FtpCommand::Type(mode)).await?;
        self.transfer_mode = mode;
        Ok(())
    }

    /// Negotiates passive mode and connects to the advertised port on the
    /// control connection's host.
    pub async fn open_passive_socket(&mut self) -> FtpResult<TcpStream> {
        let resp = self.expect(FtpCommand::Pasv).await?;
        let (_, port) = pasv::parse_pasv_reply(&resp)?;
        let addr = format!("{}:{}", self.endpoint.server, port);
        let socket = timeout(self.endpoint.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| FtpError::Timeout(format!("opening data connection to {}", addr)))??;
        debug!("Data connection opened to {}", addr);
        Ok(socket)
    }

    /// Opens a data stream restricted to `direction`. The registration proves
    /// no other stream is live on the session.
    pub async fn passive_data_stream(
        &mut self,
        direction: TransferDirection,
        registration: TransferRegistration,
    ) -> FtpResult<DataStream> {
        let socket = self.open_passive_socket().await?;
        Ok(DataStream::new(
            socket,
            direction,
            registration,
            self.endpoint.timeout,
        ))
    }

    /// `LIST` of the working directory, one entry per returned line.
    pub async fn list(&mut self) -> FtpResult<Vec<String>> {
        self.set_transfer_mode(TransferMode::Ascii).await?;
        let socket = self.open_passive_socket().await?;
        self.expect(FtpCommand::List).await?;

        let lines = match self.read_listing(socket).await {
            Ok(lines) => lines,
            Err(e) => {
                // The server still owes the completion reply for this LIST.
                if let Err(reply_err) = self.read_response().await {
                    warn!("No completion reply after failed LIST: {}", reply_err);
                }
                return Err(FtpError::Listing(e));
            }
        };

        let done = self.read_response().await?;
        if !done.is_any(&[REPLY_CLOSING_DATA, REPLY_FILE_ACTION_OK]) {
            return Err(FtpError::CommandFailed {
                command: FtpCommand::List.to_string(),
                response: done,
            });
        }
        debug!("LIST returned {} lines", lines.len());
        Ok(lines)
    }

    async fn read_listing(&self, socket: TcpStream) -> io::Result<Vec<String>> {
        let mut reader = BufReader::new(socket);
        let mut lines = Vec::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let n = timeout(self.endpoint.timeout, reader.read_until(b'\n', &mut buf))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "listing data timed out"))??;
            if n == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf)
                .trim_end_matches(['\r', '\n'])
                .to_string();
            if line.is_empty() {
                continue;
            }
            self.events.emit(FtpEvent::ListingLine(line.clone()));
            lines.push(line);
        }
        Ok(lines)
    }

    /// Sends `QUIT` and closes the connection, even when `QUIT` fails.
    pub async fn quit(&mut self) -> FtpResult<()> {
        let result = self.command(&FtpCommand::Quit).await.map(|_| ());
        if let Err(e) = self.writer.shutdown().await {
            debug!("Control connection shutdown: {}", e);
        }
        info!("Disconnected from {}", self.endpoint.server);
        result
    }
}

/// Extracts the path from a 257 reply, un-doubling embedded quotes.
fn parse_quoted_path(response: &FtpResponse) -> FtpResult<String> {
    QUOTED_PATH
        .captures(response.message())
        .map(|caps| caps[1].replace("\"\"", "\""))
        .ok_or_else(|| FtpError::InvalidResponse {
            line: response.message().to_string(),
        })
}
