use crate::constants::*;
use crate::core_ftpcommand::TransferMode;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FtpCommand {
    User(String),
    Pass(String),
    Pwd,
    Cwd(String),
    Cdup,
    Type(TransferMode),
    Pasv,
    List,
    Stor(String),
    Retr(String),
    Dele(String),
    Rmd(String),
    Mkd(String),
    Rest(u64),
    Rnfr(String),
    Rnto(String),
    Quit,
}

impl FtpCommand {
    pub fn verb(&self) -> &'static str {
        match self {
            FtpCommand::User(_) => "USER",
            FtpCommand::Pass(_) => "PASS",
            FtpCommand::Pwd => "PWD",
            FtpCommand::Cwd(_) => "CWD",
            FtpCommand::Cdup => "CDUP",
            FtpCommand::Type(_) => "TYPE",
            FtpCommand::Pasv => "PASV",
            FtpCommand::List => "LIST",
            FtpCommand::Stor(_) => "STOR",
            FtpCommand::Retr(_) => "RETR",
            FtpCommand::Dele(_) => "DELE",
            FtpCommand::Rmd(_) => "RMD",
            FtpCommand::Mkd(_) => "MKD",
            FtpCommand::Rest(_) => "REST",
            FtpCommand::Rnfr(_) => "RNFR",
            FtpCommand::Rnto(_) => "RNTO",
            FtpCommand::Quit => "QUIT",
        }
    }

    /// Reply codes that mean the command was accepted. Empty when the caller
    /// inspects the reply itself (login, `TYPE`, `QUIT`).
    pub fn expected_codes(&self) -> &'static [u16] {
        match self {
            FtpCommand::Stor(_) | FtpCommand::Retr(_) | FtpCommand::List => {
                &[REPLY_DATA_ALREADY_OPEN, REPLY_OPENING_DATA]
            }
            FtpCommand::Cwd(_)
            | FtpCommand::Cdup
            | FtpCommand::Dele(_)
            | FtpCommand::Rmd(_)
            | FtpCommand::Rnto(_) => &[REPLY_FILE_ACTION_OK],
            FtpCommand::Pwd | FtpCommand::Mkd(_) => &[REPLY_PATH_CREATED],
            FtpCommand::Pasv => &[REPLY_PASSIVE_MODE],
            FtpCommand::Rest(_) | FtpCommand::Rnfr(_) => &[REPLY_PENDING_INFO],
            FtpCommand::User(_) | FtpCommand::Pass(_) | FtpCommand::Type(_) | FtpCommand::Quit => {
                &[]
            }
        }
    }

    /// The command line as it may appear in logs and events.
    pub fn redacted(&self) -> String {
        match self {
            FtpCommand::Pass(_) => "PASS ****".to_string(),
            other => other.to_string(),
        }
    }
}

/// The command line as sent on the wire, without the CRLF terminator.
impl fmt::Display for FtpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = self.verb();
        match self {
            FtpCommand::User(arg)
            | FtpCommand::Pass(arg)
            | FtpCommand::Cwd(arg)
            | FtpCommand::Stor(arg)
            | FtpCommand::Retr(arg)
            | FtpCommand::Dele(arg)
            | FtpCommand::Rmd(arg)
            | FtpCommand::Mkd(arg)
            | FtpCommand::Rnfr(arg)
            | FtpCommand::Rnto(arg) => write!(f, "{} {}", verb, arg),
            FtpCommand::Type(mode) => write!(f, "{} {}", verb, mode),
            FtpCommand::Rest(offset) => write!(f, "{} {}", verb, offset),
            FtpCommand::Pwd
            | FtpCommand::Cdup
            | FtpCommand::Pasv
            | FtpCommand::List
            | FtpCommand::Quit => f.write_str(verb),
        }
    }
}
