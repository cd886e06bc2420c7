pub mod lock_wait;
pub mod progress;
pub mod registry;
pub mod transferer;

pub use registry::{AbortHandle, TransferRegistration, TransferRegistry};
pub use transferer::{FileTransferer, TransferHandle, TransferRequest};
