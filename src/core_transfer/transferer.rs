use crate::constants::{REPLY_CLOSING_DATA, REPLY_FILE_ACTION_OK, TRANSFER_CHUNK_SIZE};
use crate::core_ftpcommand::TransferMode;
use crate::core_network::{ControlChannel, DataStream};
use crate::core_transfer::lock_wait::wait_for_read_access;
use crate::core_transfer::progress::ProgressTracker;
use crate::core_transfer::registry::TransferRegistration;
use crate::error::{FtpError, FtpResult};
use crate::events::{
    AsyncOutcome, EventSink, FtpAsyncResult, FtpEvent, TransferDirection, TransferInfo,
};
use chrono::NaiveDateTime;
use filetime::FileTime;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;

/// Everything needed to move one file.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub direction: TransferDirection,
    pub local_path: PathBuf,
    pub remote_name: String,
    /// Expected size of the whole file.
    pub total_bytes: u64,
    /// Downloads only: bytes already present locally, sent with `REST`.
    pub resume_offset: u64,
    /// Uploads only: how long to wait for the source file to become readable.
    pub lock_wait: Duration,
    /// Downloads only: modification time to stamp on the local copy.
    pub remote_timestamp: Option<NaiveDateTime>,
}

/// Runs a single upload or download over the session's control channel.
#[derive(Debug)]
pub struct FileTransferer {
    request: TransferRequest,
    transferred: Arc<AtomicU64>,
    events: EventSink,
}

impl FileTransferer {
    pub fn new(request: TransferRequest, events: EventSink) -> Self {
        Self {
            request,
            transferred: Arc::new(AtomicU64::new(0)),
            events,
        }
    }

    pub fn request(&self) -> &TransferRequest {
        &self.request
    }

    pub fn transferred_bytes(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    fn info(&self) -> TransferInfo {
        TransferInfo {
            direction: self.request.direction,
            local_path: self.request.local_path.clone(),
            remote_name: self.request.remote_name.clone(),
            total_bytes: self.request.total_bytes,
            transferred_bytes: self.transferred_bytes(),
        }
    }

    /// Performs the transfer and returns the number of bytes the local file
    /// now covers (resumed bytes included).
    pub async fn start_transfer(
        &self,
        control: &mut ControlChannel,
        registration: TransferRegistration,
    ) -> FtpResult<u64> {
        let req = &self.request;
        if req.direction == TransferDirection::Upload {
            wait_for_read_access(&req.local_path, req.lock_wait).await?;
        }

        info!(
            "{:?} of {} ({} bytes) started",
            req.direction, req.remote_name, req.total_bytes
        );
        self.events.emit(FtpEvent::BeginTransfer(self.info()));

        let result = self.run(control, registration).await;

        self.events.emit(FtpEvent::EndTransfer(self.info()));
        match &result {
            Ok(n) => info!("{:?} of {} finished: {} bytes", req.direction, req.remote_name, n),
            Err(e) => error!("{:?} of {} failed: {}", req.direction, req.remote_name, e),
        }
        result
    }

    async fn run(
        &self,
        control: &mut ControlChannel,
        registration: TransferRegistration,
    ) -> FtpResult<u64> {
        let req = &self.request;
        control.set_transfer_mode(TransferMode::Binary).await?;
        let mut stream = control
            .passive_data_stream(req.direction, registration)
            .await?;

        if let Err(e) = self.send_verb(control).await {
            if let Err(close_err) = stream.close(control, true).await {
                warn!(
                    "Closing the data connection after a refused {:?}: {}",
                    req.direction, close_err
                );
            }
            return Err(e);
        }
        stream.mark_started();

        let copied = match req.direction {
            TransferDirection::Download => self.copy_download(&mut stream).await,
            TransferDirection::Upload => self.copy_upload(&mut stream).await,
        };

        // The data connection goes first: the completion reply only follows it.
        let closed = stream.close(control, copied.is_err()).await;
        let copied = copied?;
        let reply = closed?.ok_or_else(|| {
            FtpError::invalid_operation("data connection closed without a completion reply")
        })?;

        if !reply.is_any(&[REPLY_CLOSING_DATA, REPLY_FILE_ACTION_OK]) {
            return Err(FtpError::TransferFailed(reply));
        }

        if req.direction == TransferDirection::Download {
            self.stamp_local_file();
        }
        Ok(copied)
    }

    async fn send_verb(&self, control: &mut ControlChannel) -> FtpResult<()> {
        let req = &self.request;
        match req.direction {
            TransferDirection::Download => {
                if req.resume_offset > 0 {
                    control.restart(req.resume_offset).await?;
                }
                control.retrieve(&req.remote_name).await?;
            }
            TransferDirection::Upload => {
                control.store(&req.remote_name).await?;
            }
        }
        Ok(())
    }

    async fn copy_download(&self, stream: &mut DataStream) -> FtpResult<u64> {
        let req = &self.request;
        let mut file = if req.resume_offset > 0 {
            OpenOptions::new()
                .append(true)
                .open(&req.local_path)
                .await?
        } else {
            File::create(&req.local_path).await?
        };

        let mut tracker = ProgressTracker::new(
            req.direction,
            req.total_bytes,
            req.resume_offset,
            Arc::clone(&self.transferred),
        );
        let mut buf = vec![0u8; TRANSFER_CHUNK_SIZE];
        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).await?;
            self.advance(&mut tracker, n);
        }
        file.flush().await?;
        Ok(tracker.transferred())
    }

    async fn copy_upload(&self, stream: &mut DataStream) -> FtpResult<u64> {
        let req = &self.request;
        let mut file = File::open(&req.local_path).await?;

        let mut tracker = ProgressTracker::new(
            req.direction,
            req.total_bytes,
            0,
            Arc::clone(&self.transferred),
        );
        let mut buf = vec![0u8; TRANSFER_CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            stream.write_all(&buf[..n]).await?;
            self.advance(&mut tracker, n);
        }
        Ok(tracker.transferred())
    }

    fn advance(&self, tracker: &mut ProgressTracker, n: usize) {
        if let Some(progress) = tracker.advance(n as u64) {
            debug!(
                "{:?} {}: {}/{} bytes ({:.1}%)",
                progress.direction,
                self.request.remote_name,
                progress.transferred_bytes,
                progress.total_bytes,
                progress.percent
            );
            self.events.emit(FtpEvent::TransferProgress(progress));
        }
    }

    fn stamp_local_file(&self) {
        let Some(ts) = self.request.remote_timestamp else {
            return;
        };
        let mtime = FileTime::from_unix_time(ts.and_utc().timestamp(), 0);
        if let Err(e) = filetime::set_file_mtime(&self.request.local_path, mtime) {
            warn!(
                "Could not set modification time of {}: {}",
                self.request.local_path.display(),
                e
            );
        }
    }

    /// Runs the transfer on a background task. The outcome is published as a
    /// [`FtpEvent::TransferNotification`]; the handle yields the same result.
    ///
    /// The caller passes the control channel already locked, so any command
    /// issued after this returns waits for the transfer to finish.
    pub fn start_transfer_async(
        self,
        mut control: OwnedMutexGuard<ControlChannel>,
        registration: TransferRegistration,
    ) -> TransferHandle {
        let transferred = Arc::clone(&self.transferred);
        let direction = self.request.direction;
        let remote_name = self.request.remote_name.clone();

        let join = tokio::spawn(async move {
            let result = self.start_transfer(&mut control, registration).await;
            drop(control);
            self.notify(&result);
            result
        });

        TransferHandle {
            join,
            transferred,
            direction,
            remote_name,
        }
    }

    fn notify(&self, result: &FtpResult<u64>) {
        let (outcome, message) = match result {
            Ok(n) => (AsyncOutcome::Complete, format!("{} bytes transferred", n)),
            Err(FtpError::UserAbort) => (AsyncOutcome::Abort, FtpError::UserAbort.to_string()),
            Err(e) if e.is_protocol() => (AsyncOutcome::Fail, e.to_string()),
            // Local faults only surface through the join handle.
            Err(_) => return,
        };
        self.events
            .emit(FtpEvent::TransferNotification(FtpAsyncResult {
                outcome,
                message,
                direction: self.request.direction,
                remote_name: self.request.remote_name.clone(),
            }));
    }
}

/// A transfer running in the background.
#[derive(Debug)]
pub struct TransferHandle {
    join: JoinHandle<FtpResult<u64>>,
    transferred: Arc<AtomicU64>,
    direction: TransferDirection,
    remote_name: String,
}

impl TransferHandle {
    pub fn direction(&self) -> TransferDirection {
        self.direction
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    pub fn transferred_bytes(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the transfer to end and returns its result.
    pub async fn join(self) -> FtpResult<u64> {
        match self.join.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(FtpError::UserAbort),
        }
    }
}
