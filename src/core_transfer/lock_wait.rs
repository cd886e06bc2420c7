use crate::constants::LOCK_RETRY_INTERVAL_MS;
use crate::error::FtpResult;
use log::debug;
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

/// Waits until `path` can be opened for reading, for at most `limit`.
///
/// A file another process still holds exclusively (a sharing or lock
/// violation on Windows, `WouldBlock` elsewhere) is retried; any other open
/// error is returned at once.
pub async fn wait_for_read_access(path: &Path, limit: Duration) -> FtpResult<()> {
    let deadline = Instant::now() + limit;
    loop {
        match tokio::fs::File::open(path).await {
            Ok(_) => return Ok(()),
            Err(e) if is_locked(&e) && Instant::now() < deadline => {
                debug!("{} is locked, retrying: {}", path.display(), e);
                tokio::time::sleep(Duration::from_millis(LOCK_RETRY_INTERVAL_MS)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn is_locked(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    cfg!(windows) && matches!(e.raw_os_error(), Some(32) | Some(33))
}
