//! A passive-mode FTP client engine.
//!
//! [`FtpClient`] drives one control connection at a time, keeps a cache of
//! the remote directory tree, and moves files over passive data connections
//! either in the foreground or on a background task. Activity is reported as
//! [`FtpEvent`]s to whoever called [`FtpClient::subscribe`].

pub mod client;
pub mod config;
pub mod constants;
pub mod core_cli;
pub mod core_directory;
pub mod core_ftpcommand;
pub mod core_network;
pub mod core_reply;
pub mod core_session;
pub mod core_transfer;
pub mod error;
pub mod events;

pub use client::FtpClient;
pub use config::{ClientConfig, Config};
pub use core_directory::{DirId, Directory, RemoteFile};
pub use core_network::Endpoint;
pub use core_reply::FtpResponse;
pub use core_session::SessionOptions;
pub use core_transfer::{AbortHandle, TransferHandle};
pub use error::{FtpError, FtpResult};
pub use events::{AsyncOutcome, FtpAsyncResult, FtpEvent, TransferDirection};
