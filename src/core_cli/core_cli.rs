use crate::config::ClientConfig;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use url::Url;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "rouilleftp", about = "A passive-mode FTP client written in Rust.")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "")]
    pub config: String,

    /// Enable verbose mode
    #[arg(short, long)]
    pub verbose: bool,

    /// Server to use, as ftp://[user[:password]@]host[:port][/path]
    #[arg(short, long)]
    pub url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List a remote directory
    Ls { path: Option<String> },
    /// Print the remote working directory
    Pwd,
    /// Download a file
    Get {
        remote: String,
        local: Option<PathBuf>,
        /// Continue a partial local copy
        #[arg(long)]
        resume: bool,
    },
    /// Upload a file
    Put {
        local: PathBuf,
        remote: Option<String>,
    },
    /// Delete a remote file
    Rm { name: String },
    /// Remove a remote directory
    Rmdir { name: String },
    /// Create a remote directory
    Mkdir { name: String },
    /// Rename a remote file or directory
    Mv { from: String, to: String },
}

/// Overrides `config` with the parts present in an `ftp://` URL and returns
/// the path to start in, if the URL names one.
pub fn apply_url(config: &mut ClientConfig, raw: &str) -> Result<Option<String>> {
    let url = Url::parse(raw).with_context(|| format!("Invalid URL: {}", raw))?;
    if url.scheme() != "ftp" {
        bail!("Unsupported URL scheme: {}", url.scheme());
    }
    let host = url
        .host_str()
        .with_context(|| format!("URL has no host: {}", raw))?;
    config.server = host.to_string();
    if let Some(port) = url.port() {
        config.port = port;
    }
    if !url.username().is_empty() {
        config.username = url.username().to_string();
    }
    if let Some(password) = url.password() {
        config.password = password.to_string();
    }
    let path = url.path();
    if path.is_empty() || path == "/" {
        Ok(None)
    } else {
        Ok(Some(path.to_string()))
    }
}
