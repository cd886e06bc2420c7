// src/constants.rs

pub const DEFAULT_PORT: u16 = 21;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOCK_WAIT_SECS: u64 = 10;

/// Size of one copy step between the local file and the data connection.
pub const TRANSFER_CHUNK_SIZE: usize = 4096;

/// Interval between two attempts to open a local file that is still locked.
pub const LOCK_RETRY_INTERVAL_MS: u64 = 100;

// Reply codes the client validates (RFC 959 §4.2).
pub const REPLY_DATA_ALREADY_OPEN: u16 = 125;
pub const REPLY_OPENING_DATA: u16 = 150;
pub const REPLY_SERVICE_READY: u16 = 220;
pub const REPLY_CLOSING_DATA: u16 = 226;
pub const REPLY_PASSIVE_MODE: u16 = 227;
pub const REPLY_LOGGED_IN: u16 = 230;
pub const REPLY_FILE_ACTION_OK: u16 = 250;
pub const REPLY_PATH_CREATED: u16 = 257;
pub const REPLY_NEED_PASSWORD: u16 = 331;
pub const REPLY_PENDING_INFO: u16 = 350;
pub const REPLY_SERVICE_UNAVAILABLE: u16 = 421;
