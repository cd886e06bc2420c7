// Commands the client emits, with the replies that count as success.
pub mod ftpcommand;
pub mod type_;

pub use ftpcommand::FtpCommand;
pub use type_::TransferMode;
