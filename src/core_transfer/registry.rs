//! Per-session bookkeeping of the single live data transfer.
//!
//! A [`TransferRegistration`] is the right to own the session's data
//! connection. It is handed out by [`TransferRegistry::begin`] and returned
//! when dropped. The registry also carries the cooperative abort signal: the
//! aborting side flips a watch flag, the transfer observes it inside its next
//! data read or write, unwinds, and releases the registration, which wakes
//! the aborter.

use crate::error::{FtpError, FtpResult};
use log::{debug, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

#[derive(Debug, Default)]
pub struct TransferRegistry {
    active: Mutex<Option<ActiveTransfer>>,
    next_id: AtomicU64,
}

#[derive(Debug)]
struct ActiveTransfer {
    id: u64,
    abort_tx: watch::Sender<bool>,
    closed_rx: watch::Receiver<bool>,
}

impl TransferRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn slot(&self) -> MutexGuard<'_, Option<ActiveTransfer>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims the session's data connection.
    pub fn begin(self: &Arc<Self>) -> FtpResult<TransferRegistration> {
        let mut slot = self.slot();
        if slot.is_some() {
            return Err(FtpError::TransferConflict);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (abort_tx, abort_rx) = watch::channel(false);
        let (closed_tx, closed_rx) = watch::channel(false);
        *slot = Some(ActiveTransfer {
            id,
            abort_tx,
            closed_rx,
        });
        debug!("Data transfer #{} registered", id);
        Ok(TransferRegistration {
            registry: Arc::clone(self),
            id,
            abort_rx,
            closed_tx,
        })
    }

    fn end(&self, id: u64) {
        let mut slot = self.slot();
        if slot.as_ref().map(|a| a.id) == Some(id) {
            *slot = None;
            debug!("Data transfer #{} released", id);
        }
    }

    pub fn is_busy(&self) -> bool {
        self.slot().is_some()
    }

    /// Signals the live transfer to stop and waits until it has released its
    /// data connection. Does nothing when no transfer is registered.
    pub async fn abort(&self) {
        let mut closed = {
            let slot = self.slot();
            match slot.as_ref() {
                Some(active) => {
                    info!("Aborting data transfer #{}", active.id);
                    active.abort_tx.send_replace(true);
                    active.closed_rx.clone()
                }
                None => return,
            }
        };
        // A dropped sender means the registration is already gone.
        let _ = closed.wait_for(|closed| *closed).await;
    }
}

/// Stops the session's live transfer from outside the call that runs it,
/// including a foreground transfer that holds the client mutably.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    registry: Arc<TransferRegistry>,
}

impl AbortHandle {
    pub(crate) fn new(registry: Arc<TransferRegistry>) -> Self {
        Self { registry }
    }

    pub fn is_busy(&self) -> bool {
        self.registry.is_busy()
    }

    /// Same as [`TransferRegistry::abort`].
    pub async fn abort(&self) {
        self.registry.abort().await;
    }
}

/// Ownership of the session's data connection; released on drop.
#[derive(Debug)]
pub struct TransferRegistration {
    registry: Arc<TransferRegistry>,
    id: u64,
    abort_rx: watch::Receiver<bool>,
    closed_tx: watch::Sender<bool>,
}

impl TransferRegistration {
    pub fn is_aborted(&self) -> bool {
        *self.abort_rx.borrow()
    }

    /// Resolves once an abort has been requested.
    pub async fn aborted(&mut self) {
        if self.abort_rx.wait_for(|aborted| *aborted).await.is_err() {
            // Registry dropped: nobody can ask for an abort any more.
            std::future::pending::<()>().await;
        }
    }
}

impl Drop for TransferRegistration {
    fn drop(&mut self) {
        self.registry.end(self.id);
        self.closed_tx.send_replace(true);
    }
}
