//! The public entry point: [`FtpClient`].
//!
//! The client owns exactly one [`SessionState`] and forwards every call to
//! it. `connect` and `close` hand the state to the transition and store
//! whatever state comes back, so a failed login leaves the client
//! disconnected with its parameters intact.

use crate::config::ClientConfig;
use crate::core_directory::{DirId, Directory, RemoteFile};
use crate::core_network::{ControlChannel, Endpoint};
use crate::core_reply::FtpResponse;
use crate::core_session::{SessionOptions, SessionState};
use crate::core_transfer::{AbortHandle, TransferHandle};
use crate::error::FtpResult;
use crate::events::{EventSink, FtpEvent};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Mutex;

#[derive(Debug)]
pub struct FtpClient {
    state: SessionState,
    events: EventSink,
    options: SessionOptions,
}

impl FtpClient {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            state: SessionState::new(endpoint),
            events: EventSink::new(),
            options: SessionOptions::default(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let mut client = Self::new(config.endpoint());
        client.options = config.session_options();
        client
    }

    /// Starts delivering events to the returned receiver. A later call
    /// replaces the earlier subscriber.
    pub fn subscribe(&self) -> UnboundedReceiver<FtpEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn server(&self) -> &str {
        &self.state.endpoint().server
    }

    pub fn set_server(&mut self, server: impl Into<String>) -> FtpResult<()> {
        self.state.disconnected_mut()?.set_server(server);
        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.state.endpoint().port
    }

    pub fn set_port(&mut self, port: u16) -> FtpResult<()> {
        self.state.disconnected_mut()?.set_port(port);
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        self.state.endpoint().timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> FtpResult<()> {
        self.state.disconnected_mut()?.set_timeout(timeout);
        Ok(())
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    /// Takes effect on the next `connect`.
    pub fn set_options(&mut self, options: SessionOptions) {
        self.options = options;
    }

    fn take_state(&mut self) -> SessionState {
        let placeholder = SessionState::new(self.state.endpoint().clone());
        std::mem::replace(&mut self.state, placeholder)
    }

    pub async fn connect(&mut self, user: &str, password: &str) -> FtpResult<()> {
        let state = self.take_state();
        let (state, result) = state
            .connect(user, password, self.options, self.events.clone())
            .await;
        self.state = state;
        result
    }

    pub async fn close(&mut self) -> FtpResult<()> {
        let state = self.take_state();
        let (state, result) = state.close().await;
        self.state = state;
        result
    }

    pub fn control_channel(&self) -> FtpResult<Arc<Mutex<ControlChannel>>> {
        self.state.control_channel()
    }

    /// The last reply read on the control channel.
    pub async fn last_response(&self) -> FtpResult<Option<FtpResponse>> {
        let control = self.state.control_channel()?;
        let control = control.lock().await;
        Ok(control.response().cloned())
    }

    pub fn root_directory(&self) -> FtpResult<DirId> {
        self.state.root_directory()
    }

    pub fn current_directory(&self) -> FtpResult<DirId> {
        self.state.current_directory()
    }

    pub async fn set_current_directory(&mut self, dir: DirId) -> FtpResult<()> {
        self.state.set_current_directory(dir).await
    }

    pub fn directory(&self, dir: DirId) -> FtpResult<&Directory> {
        self.state.connected()?.directory(dir)
    }

    pub async fn change_directory(&mut self, path: &str) -> FtpResult<DirId> {
        self.state.connected_mut()?.change_directory(path).await
    }

    pub async fn change_to_parent(&mut self) -> FtpResult<DirId> {
        self.state.connected_mut()?.change_to_parent().await
    }

    pub fn parent(&mut self, dir: DirId) -> FtpResult<Option<DirId>> {
        self.state.connected_mut()?.parent(dir)
    }

    pub async fn subdirectories(&mut self, dir: DirId) -> FtpResult<Vec<DirId>> {
        self.state.connected_mut()?.subdirectories(dir).await
    }

    pub async fn files(&mut self, dir: DirId) -> FtpResult<Vec<RemoteFile>> {
        self.state.connected_mut()?.files(dir).await
    }

    pub async fn find_file(&mut self, dir: DirId, name: &str) -> FtpResult<Option<RemoteFile>> {
        self.state.connected_mut()?.find_file(dir, name).await
    }

    pub async fn find_subdirectory(&mut self, dir: DirId, name: &str) -> FtpResult<Option<DirId>> {
        self.state.connected_mut()?.find_subdirectory(dir, name).await
    }

    pub async fn refresh(&mut self, dir: DirId) -> FtpResult<()> {
        self.state.connected_mut()?.refresh(dir).await
    }

    pub fn clear_items(&mut self, dir: DirId) -> FtpResult<()> {
        self.state.connected_mut()?.clear_items(dir);
        Ok(())
    }

    pub async fn delete_file(&mut self, name: &str) -> FtpResult<()> {
        self.state.connected_mut()?.delete_file(name).await
    }

    pub async fn remove_directory(&mut self, name: &str) -> FtpResult<()> {
        self.state.connected_mut()?.remove_directory(name).await
    }

    pub async fn make_directory(&mut self, name: &str) -> FtpResult<String> {
        self.state.connected_mut()?.make_directory(name).await
    }

    pub async fn rename(&mut self, from: &str, to: &str) -> FtpResult<()> {
        self.state.connected_mut()?.rename(from, to).await
    }

    pub async fn upload(&mut self, local_path: &Path, remote_name: &str) -> FtpResult<u64> {
        self.state.connected_mut()?.upload(local_path, remote_name).await
    }

    pub async fn download(
        &mut self,
        remote_name: &str,
        local_path: &Path,
        resume: bool,
    ) -> FtpResult<u64> {
        self.state
            .connected_mut()?
            .download(remote_name, local_path, resume)
            .await
    }

    pub async fn upload_async(
        &mut self,
        local_path: &Path,
        remote_name: &str,
    ) -> FtpResult<TransferHandle> {
        self.state
            .connected_mut()?
            .upload_async(local_path, remote_name)
            .await
    }

    pub async fn download_async(
        &mut self,
        remote_name: &str,
        local_path: &Path,
        resume: bool,
    ) -> FtpResult<TransferHandle> {
        self.state
            .connected_mut()?
            .download_async(remote_name, local_path, resume)
            .await
    }

    /// No-op unless a transfer is running.
    pub async fn abort_transfer(&self) -> FtpResult<()> {
        self.state.connected()?.abort_transfer().await;
        Ok(())
    }

    /// A handle that can abort this session's transfers from another task,
    /// while `upload` or `download` is still running.
    pub fn abort_handle(&self) -> FtpResult<AbortHandle> {
        Ok(self.state.connected()?.abort_handle())
    }

    pub fn is_busy(&self) -> FtpResult<bool> {
        self.state.is_busy()
    }
}
