use crate::core_reply::FtpResponse;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FtpError {
    #[error("Invalid response from server: {line:?}")]
    InvalidResponse { line: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(FtpResponse),

    #[error("Server down: {0}")]
    ServerDown(FtpResponse),

    #[error("{command} failed: {response}")]
    CommandFailed {
        command: String,
        response: FtpResponse,
    },

    #[error("Resume not supported: {0}")]
    ResumeNotSupported(FtpResponse),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Data transfer error: previous transfer not finished")]
    TransferConflict,

    #[error("Failed to transfer file: {0}")]
    TransferFailed(FtpResponse),

    #[error("User abort")]
    UserAbort,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Operation not supported: {0}")]
    NotSupported(&'static str),

    #[error("Directory listing failed: {0}")]
    Listing(#[source] std::io::Error),

    #[error("Unrecognized listing line {line:?}: {reason}")]
    ListingLine { line: String, reason: String },

    #[error("Timed out while {0}")]
    Timeout(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type FtpResult<T> = Result<T, FtpError>;

impl FtpError {
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        FtpError::InvalidOperation(msg.into())
    }

    /// Protocol-level failures are the ones a background transfer reports
    /// through its notification instead of only through the join handle.
    pub fn is_protocol(&self) -> bool {
        !matches!(self, FtpError::Io(_) | FtpError::InvalidOperation(_))
    }

    /// The server reply attached to this error, if any.
    pub fn response(&self) -> Option<&FtpResponse> {
        match self {
            FtpError::AuthenticationFailed(r)
            | FtpError::ServerDown(r)
            | FtpError::ResumeNotSupported(r)
            | FtpError::TransferFailed(r) => Some(r),
            FtpError::CommandFailed { response, .. } => Some(response),
            _ => None,
        }
    }
}
