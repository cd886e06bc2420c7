//! Observable notifications published by the client.
//!
//! Subscribers receive [`FtpEvent`]s over an unbounded tokio channel. Every
//! component holds a clone of the same [`EventSink`], so one subscription sees
//! control-channel traffic and transfer activity alike.

use crate::core_reply::FtpResponse;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferDirection {
    Download,
    Upload,
}

/// Parameters of a transfer as announced at its start and end.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferInfo {
    pub direction: TransferDirection,
    pub local_path: PathBuf,
    pub remote_name: String,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferProgress {
    pub direction: TransferDirection,
    pub transferred_bytes: u64,
    pub total_bytes: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncOutcome {
    Complete,
    Fail,
    Abort,
}

/// Final word on a background transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct FtpAsyncResult {
    pub outcome: AsyncOutcome,
    pub message: String,
    pub direction: TransferDirection,
    pub remote_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FtpEvent {
    CommandSent(String),
    ResponseReceived(FtpResponse),
    BeginTransfer(TransferInfo),
    EndTransfer(TransferInfo),
    TransferProgress(TransferProgress),
    TransferNotification(FtpAsyncResult),
    /// One raw line of a directory listing.
    ListingLine(String),
    /// A listing line that matched a format but could not be turned into an entry.
    ListingLineRejected { line: String, reason: String },
}

#[derive(Clone, Default)]
pub struct EventSink {
    tx: Arc<Mutex<Option<UnboundedSender<FtpEvent>>>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a fresh channel, replacing any previous subscriber.
    pub fn subscribe(&self) -> UnboundedReceiver<FtpEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.tx.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    pub fn emit(&self, event: FtpEvent) {
        let mut guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = guard.as_ref() {
            if tx.send(event).is_err() {
                *guard = None;
            }
        }
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}
