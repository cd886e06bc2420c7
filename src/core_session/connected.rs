use crate::core_directory::{
    parse_listing_line, path, DirId, Directory, DirectoryTree, RemoteFile,
};
use crate::core_network::{ControlChannel, Endpoint};
use crate::core_session::disconnected::Disconnected;
use crate::core_session::SessionOptions;
use crate::core_transfer::{
    AbortHandle, FileTransferer, TransferHandle, TransferRegistration, TransferRegistry,
    TransferRequest,
};
use crate::error::{FtpError, FtpResult};
use crate::events::{EventSink, FtpEvent, TransferDirection};
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

fn outside_root(full_path: &str) -> FtpError {
    FtpError::invalid_operation(format!("{} is outside the root directory", full_path))
}

/// A logged-in session.
///
/// Owns the control channel, the directory cache and the transfer registry.
/// The cache only ever lists the current directory; asking for the items of
/// any other directory is an invalid operation.
#[derive(Debug)]
pub struct Connected {
    endpoint: Endpoint,
    control: Arc<Mutex<ControlChannel>>,
    tree: DirectoryTree,
    root: DirId,
    current: DirId,
    transfers: Arc<TransferRegistry>,
    events: EventSink,
    options: SessionOptions,
}

impl Connected {
    /// Wraps a freshly authenticated channel; `PWD` fixes both the root and
    /// the current directory.
    pub(crate) async fn establish(
        mut control: ControlChannel,
        options: SessionOptions,
        events: EventSink,
    ) -> FtpResult<Self> {
        let pwd = control.print_working_directory().await?;
        let mut tree = DirectoryTree::new(options.case_sensitive);
        let root = tree.insert_path(&pwd, None);
        info!("Root directory is {}", pwd);

        Ok(Self {
            endpoint: control.endpoint().clone(),
            control: Arc::new(Mutex::new(control)),
            tree,
            root,
            current: root,
            transfers: TransferRegistry::new(),
            events,
            options,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    pub fn root_directory(&self) -> DirId {
        self.root
    }

    pub fn current_directory(&self) -> DirId {
        self.current
    }

    pub fn control_channel(&self) -> Arc<Mutex<ControlChannel>> {
        Arc::clone(&self.control)
    }

    pub fn tree(&self) -> &DirectoryTree {
        &self.tree
    }

    pub fn directory(&self, id: DirId) -> FtpResult<&Directory> {
        self.tree
            .get(id)
            .ok_or_else(|| FtpError::invalid_operation("unknown directory"))
    }

    pub fn is_busy(&self) -> bool {
        self.transfers.is_busy()
    }

    /// `CWD` into a directory already known to the cache. Its items are
    /// dropped so the next access lists it again.
    pub async fn set_current_directory(&mut self, dir: DirId) -> FtpResult<()> {
        let full_path = self.directory(dir)?.full_path().to_string();
        if !self.tree.is_within(self.root, &full_path) {
            return Err(outside_root(&full_path));
        }
        self.control
            .lock()
            .await
            .change_working_directory(path::without_trailing_slash(&full_path))
            .await?;
        self.current = dir;
        self.tree.clear_items(dir);
        info!("Current directory is now {}", full_path);
        Ok(())
    }

    /// `CWD` to an arbitrary path, absolute or relative to the current
    /// directory. The server's `PWD` answer decides where we ended up; a
    /// directory outside the root is refused and the server sent back.
    pub async fn change_directory(&mut self, target: &str) -> FtpResult<DirId> {
        let control = Arc::clone(&self.control);
        let mut control = control.lock().await;
        control.change_working_directory(target).await?;
        let pwd = control.print_working_directory().await?;
        self.enter(&mut control, &pwd).await
    }

    /// `CDUP`, then `PWD`. Refused at the root.
    pub async fn change_to_parent(&mut self) -> FtpResult<DirId> {
        let control = Arc::clone(&self.control);
        let mut control = control.lock().await;
        control.change_to_parent().await?;
        let pwd = control.print_working_directory().await?;
        self.enter(&mut control, &pwd).await
    }

    async fn enter(&mut self, control: &mut ControlChannel, pwd: &str) -> FtpResult<DirId> {
        if !self.tree.is_within(self.root, pwd) {
            let previous = self.directory(self.current)?.full_path().to_string();
            warn!("{} is outside the root directory, returning to {}", pwd, previous);
            control
                .change_working_directory(path::without_trailing_slash(&previous))
                .await?;
            return Err(outside_root(pwd));
        }
        let id = self.tree.insert_path(pwd, None);
        self.tree.resolve_parent(id);
        self.tree.clear_items(id);
        self.current = id;
        info!("Current directory is now {}", pwd);
        Ok(id)
    }

    /// Parent of `dir`, `None` at the top of the server's tree.
    pub fn parent(&mut self, dir: DirId) -> FtpResult<Option<DirId>> {
        self.directory(dir)?;
        Ok(self.tree.resolve_parent(dir))
    }

    fn check_current(&self, dir: DirId) -> FtpResult<()> {
        if dir != self.current {
            let name = self
                .tree
                .get(dir)
                .map(|d| d.full_path().to_string())
                .unwrap_or_default();
            return Err(FtpError::invalid_operation(format!(
                "{} is not the current directory",
                name
            )));
        }
        Ok(())
    }

    async fn init_items(&mut self, dir: DirId) -> FtpResult<()> {
        self.check_current(dir)?;
        if self.directory(dir)?.is_loaded() {
            return Ok(());
        }
        self.load_items(dir).await
    }

    async fn load_items(&mut self, dir: DirId) -> FtpResult<()> {
        let parent_path = self.directory(dir)?.full_path().to_string();
        let lines = self.control.lock().await.list().await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            match parse_listing_line(line, &parent_path) {
                Ok(Some(item)) => items.push(item),
                Ok(None) => debug!("Skipping listing line {:?}", line),
                Err(e) => {
                    warn!("Rejected listing line {:?}: {}", line, e);
                    let reason = match e {
                        FtpError::ListingLine { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    self.events.emit(FtpEvent::ListingLineRejected {
                        line: line.clone(),
                        reason,
                    });
                }
            }
        }
        debug!("{} entries cached for {}", items.len(), parent_path);
        self.tree.populate(dir, items);
        Ok(())
    }

    pub async fn subdirectories(&mut self, dir: DirId) -> FtpResult<Vec<DirId>> {
        self.init_items(dir).await?;
        Ok(self.tree.subdirectories(dir).unwrap_or_default())
    }

    pub async fn files(&mut self, dir: DirId) -> FtpResult<Vec<RemoteFile>> {
        self.init_items(dir).await?;
        Ok(self
            .tree
            .files(dir)
            .map(|files| files.into_iter().cloned().collect())
            .unwrap_or_default())
    }

    pub async fn find_file(&mut self, dir: DirId, name: &str) -> FtpResult<Option<RemoteFile>> {
        self.init_items(dir).await?;
        Ok(self.tree.find_file(dir, name).cloned())
    }

    pub async fn find_subdirectory(&mut self, dir: DirId, name: &str) -> FtpResult<Option<DirId>> {
        self.init_items(dir).await?;
        Ok(self.tree.find_subdirectory(dir, name))
    }

    /// Drops and immediately relists the items of `dir`.
    pub async fn refresh(&mut self, dir: DirId) -> FtpResult<()> {
        self.check_current(dir)?;
        self.tree.clear_items(dir);
        self.load_items(dir).await
    }

    pub fn clear_items(&mut self, dir: DirId) {
        self.tree.clear_items(dir);
    }

    pub async fn delete_file(&mut self, name: &str) -> FtpResult<()> {
        self.control.lock().await.delete(name).await?;
        self.tree.clear_items(self.current);
        Ok(())
    }

    pub async fn remove_directory(&mut self, name: &str) -> FtpResult<()> {
        self.control.lock().await.remove_directory(name).await?;
        self.tree.clear_items(self.current);
        Ok(())
    }

    /// Returns the path the server reports for the new directory.
    pub async fn make_directory(&mut self, name: &str) -> FtpResult<String> {
        let created = self.control.lock().await.make_directory(name).await?;
        self.tree.clear_items(self.current);
        Ok(created)
    }

    pub async fn rename(&mut self, from: &str, to: &str) -> FtpResult<()> {
        self.control.lock().await.rename(from, to).await?;
        self.tree.clear_items(self.current);
        Ok(())
    }

    /// Uploads `local_path` into the current directory as `remote_name`.
    pub async fn upload(&mut self, local_path: &Path, remote_name: &str) -> FtpResult<u64> {
        let (transferer, registration) = self.prepare_upload(local_path, remote_name).await?;
        let result = {
            let mut control = self.control.lock().await;
            transferer.start_transfer(&mut control, registration).await
        };
        self.tree.clear_items(self.current);
        result
    }

    /// Downloads `remote_name` from the current directory. With `resume`,
    /// an existing local file is continued from its current length.
    pub async fn download(
        &mut self,
        remote_name: &str,
        local_path: &Path,
        resume: bool,
    ) -> FtpResult<u64> {
        let (transferer, registration) =
            self.prepare_download(remote_name, local_path, resume).await?;
        let mut control = self.control.lock().await;
        transferer.start_transfer(&mut control, registration).await
    }

    pub async fn upload_async(
        &mut self,
        local_path: &Path,
        remote_name: &str,
    ) -> FtpResult<TransferHandle> {
        let (transferer, registration) = self.prepare_upload(local_path, remote_name).await?;
        let control = self.control_channel().lock_owned().await;
        self.tree.clear_items(self.current);
        Ok(transferer.start_transfer_async(control, registration))
    }

    pub async fn download_async(
        &mut self,
        remote_name: &str,
        local_path: &Path,
        resume: bool,
    ) -> FtpResult<TransferHandle> {
        let (transferer, registration) =
            self.prepare_download(remote_name, local_path, resume).await?;
        let control = self.control_channel().lock_owned().await;
        Ok(transferer.start_transfer_async(control, registration))
    }

    async fn prepare_upload(
        &mut self,
        local_path: &Path,
        remote_name: &str,
    ) -> FtpResult<(FileTransferer, TransferRegistration)> {
        let registration = self.transfers.begin()?;
        let total_bytes = tokio::fs::metadata(local_path).await?.len();
        let request = TransferRequest {
            direction: TransferDirection::Upload,
            local_path: local_path.to_path_buf(),
            remote_name: remote_name.to_string(),
            total_bytes,
            resume_offset: 0,
            lock_wait: self.options.lock_wait,
            remote_timestamp: None,
        };
        Ok((FileTransferer::new(request, self.events.clone()), registration))
    }

    async fn prepare_download(
        &mut self,
        remote_name: &str,
        local_path: &Path,
        resume: bool,
    ) -> FtpResult<(FileTransferer, TransferRegistration)> {
        let registration = self.transfers.begin()?;
        let current = self.current;
        let file = self
            .find_file(current, remote_name)
            .await?
            .ok_or_else(|| FtpError::FileNotFound(remote_name.to_string()))?;

        let resume_offset = if resume {
            match tokio::fs::metadata(local_path).await {
                Ok(meta) => meta.len(),
                Err(_) => 0,
            }
        } else {
            0
        };
        let request = TransferRequest {
            direction: TransferDirection::Download,
            local_path: local_path.to_path_buf(),
            remote_name: file.name().to_string(),
            total_bytes: file.size(),
            resume_offset,
            lock_wait: self.options.lock_wait,
            remote_timestamp: if self.options.preserve_timestamps {
                file.timestamp()
            } else {
                None
            },
        };
        Ok((FileTransferer::new(request, self.events.clone()), registration))
    }

    /// Stops the running transfer and waits for it to unwind. Does nothing
    /// when no transfer is running.
    pub async fn abort_transfer(&self) {
        self.transfers.abort().await;
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle::new(Arc::clone(&self.transfers))
    }

    /// Aborts any transfer, sends `QUIT` and closes the socket. The
    /// connection parameters survive in the returned state even when `QUIT`
    /// fails.
    pub async fn close(self: Box<Self>) -> (Disconnected, FtpResult<()>) {
        self.transfers.abort().await;
        let disconnected = Disconnected::new(self.endpoint.clone());
        let result = self.control.lock().await.quit().await;
        (disconnected, result)
    }
}
