pub mod reader;
pub mod response;

pub use reader::read_response;
pub use response::FtpResponse;
