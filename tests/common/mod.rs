//! A scripted in-process FTP server for the integration tests.
//!
//! It keeps a small in-memory tree, speaks just enough RFC 959 for the
//! client, and records every command line it receives.

#![allow(dead_code)]

use rouilleftp::{Endpoint, FtpClient, FtpEvent};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;

pub const USER: &str = "alice";
pub const PASSWORD: &str = "wonderland";

/// Downloading this file sends a first chunk, then waits for the client to
/// hang up and answers 426.
pub const STALLING_FILE: &str = "stall.bin";
pub const STALL_FIRST_CHUNK: usize = 1024;

/// Downloading this file sends all of it and then reports a 451.
pub const FAILING_FILE: &str = "broken.bin";

/// Listing this directory sends one line, keeps the data connection open
/// until the client drops it, then answers 226. Tests create it on demand.
pub const STALLING_DIR: &str = "/stuck";

pub const README: &[u8] = b"hello ftp\n";
pub const DATA_LEN: usize = 10_000;

pub fn data_bytes() -> Vec<u8> {
    (0..DATA_LEN).map(|i| (i % 251) as u8).collect()
}

#[derive(Debug, Default)]
pub struct MockFs {
    /// Absolute paths without trailing `/`; the root is `/`.
    pub dirs: BTreeSet<String>,
    pub files: BTreeMap<String, Vec<u8>>,
    /// Raw lines appended to every listing of the given directory.
    pub extra_listing: BTreeMap<String, Vec<String>>,
    pub commands: Vec<String>,
}

impl MockFs {
    fn with_tree() -> Self {
        let mut fs = MockFs::default();
        for dir in ["/", "/pub", "/pub/docs"] {
            fs.dirs.insert(dir.to_string());
        }
        fs.files.insert("/readme.txt".into(), README.to_vec());
        fs.files.insert("/stall.bin".into(), vec![7u8; 65_536]);
        fs.files.insert("/pub/data.bin".into(), data_bytes());
        fs.files.insert("/pub/empty.dat".into(), Vec::new());
        fs
    }

    fn listing(&self, cwd: &str) -> String {
        let mut out = String::from("total 4\r\n");
        for dir in self.dirs.iter().filter(|d| parent_of(d) == cwd && *d != "/") {
            out.push_str(&format!(
                "drwxr-xr-x   2 owner group     4096 Jan 10 2020 {}\r\n",
                name_of(dir)
            ));
        }
        for (file, content) in self.files.iter().filter(|(f, _)| parent_of(f) == cwd) {
            out.push_str(&format!(
                "-rw-r--r--   1 owner group {:>8} Jan 10 2020 {}\r\n",
                content.len(),
                name_of(file)
            ));
        }
        for line in self.extra_listing.get(cwd).into_iter().flatten() {
            out.push_str(line);
            out.push_str("\r\n");
        }
        out
    }

    fn has_children(&self, dir: &str) -> bool {
        self.dirs.iter().any(|d| d != "/" && parent_of(d) == dir)
            || self.files.keys().any(|f| parent_of(f) == dir)
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn resolve(cwd: &str, arg: &str) -> String {
    let joined = if arg.starts_with('/') {
        arg.to_string()
    } else {
        format!("{}/{}", cwd, arg)
    };
    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

pub struct MockServer {
    pub port: u16,
    pub fs: Arc<Mutex<MockFs>>,
}

impl MockServer {
    pub async fn start() -> Self {
        Self::start_with_greeting("220 mock FTP service ready").await
    }

    pub async fn start_with_greeting(greeting: &'static str) -> Self {
        Self::launch(greeting, "/").await
    }

    /// A server whose sessions start in `home` instead of `/`.
    pub async fn start_at(home: &'static str) -> Self {
        Self::launch("220 mock FTP service ready", home).await
    }

    async fn launch(greeting: &'static str, home: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let fs = Arc::new(Mutex::new(MockFs::with_tree()));
        let shared = Arc::clone(&fs);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(socket, Arc::clone(&shared), greeting, home));
            }
        });
        Self { port, fs }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new("127.0.0.1")
            .with_port(self.port)
            .with_timeout(Duration::from_secs(5))
    }

    pub fn client(&self) -> FtpClient {
        FtpClient::new(self.endpoint())
    }

    pub async fn logged_in_client(&self) -> FtpClient {
        let mut client = self.client();
        client.connect(USER, PASSWORD).await.unwrap();
        client
    }

    pub fn commands(&self) -> Vec<String> {
        self.fs.lock().unwrap().commands.clone()
    }

    pub fn count(&self, verb: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.split(' ').next() == Some(verb))
            .count()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.fs.lock().unwrap().files.get(path).cloned()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.fs.lock().unwrap().dirs.contains(path)
    }
}

/// Everything already delivered to `rx`.
pub fn drain(rx: &mut UnboundedReceiver<FtpEvent>) -> Vec<FtpEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

struct Session {
    cwd: String,
    user: String,
    logged_in: bool,
    passive: Option<TcpListener>,
    rest: usize,
    rename_from: Option<String>,
}

async fn reply(wr: &mut OwnedWriteHalf, line: &str) -> std::io::Result<()> {
    wr.write_all(format!("{}\r\n", line).as_bytes()).await
}

async fn serve(
    socket: TcpStream,
    fs: Arc<Mutex<MockFs>>,
    greeting: &'static str,
    home: &'static str,
) {
    let (rd, mut wr) = socket.into_split();
    let mut lines = BufReader::new(rd).lines();
    if reply(&mut wr, greeting).await.is_err() || !greeting.starts_with("220") {
        return;
    }

    let mut session = Session {
        cwd: home.into(),
        user: String::new(),
        logged_in: false,
        passive: None,
        rest: 0,
        rename_from: None,
    };
    while let Ok(Some(line)) = lines.next_line().await {
        fs.lock().unwrap().commands.push(line.clone());
        let (verb, arg) = match line.split_once(' ') {
            Some((verb, arg)) => (verb.to_ascii_uppercase(), arg.to_string()),
            None => (line.to_ascii_uppercase(), String::new()),
        };
        match handle(&verb, &arg, &mut session, &fs, &mut wr).await {
            Ok(true) | Err(_) => break,
            Ok(false) => {}
        }
    }
}

/// Returns `Ok(true)` once the session should end.
async fn handle(
    verb: &str,
    arg: &str,
    s: &mut Session,
    fs: &Arc<Mutex<MockFs>>,
    wr: &mut OwnedWriteHalf,
) -> std::io::Result<bool> {
    match verb {
        "USER" => {
            s.user = arg.to_string();
            reply(wr, "331 Password required").await?;
        }
        "PASS" => {
            if s.user == USER && arg == PASSWORD {
                s.logged_in = true;
                reply(wr, "230 User logged in").await?;
            } else {
                reply(wr, "530 Login incorrect.").await?;
            }
        }
        "QUIT" => {
            reply(wr, "221 Goodbye.").await?;
            return Ok(true);
        }
        _ if !s.logged_in => reply(wr, "530 Please login with USER and PASS.").await?,
        "PWD" => {
            let line = format!("257 \"{}\" is the current directory", s.cwd);
            reply(wr, &line).await?;
        }
        "CWD" => {
            let target = resolve(&s.cwd, arg);
            let exists = fs.lock().unwrap().dirs.contains(&target);
            if exists {
                s.cwd = target;
                reply(wr, "250 CWD command successful.").await?;
            } else {
                reply(wr, "550 No such directory.").await?;
            }
        }
        "CDUP" => {
            s.cwd = parent_of(&s.cwd).to_string();
            reply(wr, "250 CDUP command successful.").await?;
        }
        "TYPE" => reply(wr, "200 Type set.").await?,
        "PASV" => {
            let listener = TcpListener::bind("127.0.0.1:0").await?;
            let port = listener.local_addr()?.port();
            let line = format!(
                "227 Entering Passive Mode (127,0,0,1,{},{}).",
                port / 256,
                port % 256
            );
            s.passive = Some(listener);
            reply(wr, &line).await?;
        }
        "REST" => match arg.parse::<usize>() {
            Ok(offset) => {
                s.rest = offset;
                reply(wr, &format!("350 Restarting at {}.", offset)).await?;
            }
            Err(_) => reply(wr, "501 Bad offset.").await?,
        },
        "LIST" => {
            let Some(listener) = s.passive.take() else {
                reply(wr, "425 Use PASV first.").await?;
                return Ok(false);
            };
            let listing = fs.lock().unwrap().listing(&s.cwd);
            reply(wr, "150 Here comes the directory listing.").await?;
            let (mut data, _) = listener.accept().await?;
            if s.cwd == STALLING_DIR {
                data.write_all(b"-rw-r--r--   1 owner group 1 Jan 10 2020 partial\r\n")
                    .await?;
                let mut buf = [0u8; 64];
                while matches!(data.read(&mut buf).await, Ok(n) if n > 0) {}
            } else {
                data.write_all(listing.as_bytes()).await?;
            }
            drop(data);
            reply(wr, "226 Directory send OK.").await?;
        }
        "RETR" => {
            let target = resolve(&s.cwd, arg);
            let offset = std::mem::take(&mut s.rest);
            let content = fs.lock().unwrap().files.get(&target).cloned();
            let (Some(content), Some(listener)) = (content, s.passive.take()) else {
                reply(wr, "550 Failed to open file.").await?;
                return Ok(false);
            };
            reply(wr, "150 Opening BINARY mode data connection.").await?;
            let (mut data, _) = listener.accept().await?;
            if name_of(&target) == STALLING_FILE {
                data.write_all(&content[..STALL_FIRST_CHUNK]).await?;
                let mut buf = [0u8; 64];
                while matches!(data.read(&mut buf).await, Ok(n) if n > 0) {}
                drop(data);
                reply(wr, "426 Connection closed; transfer aborted.").await?;
            } else {
                let start = offset.min(content.len());
                data.write_all(&content[start..]).await?;
                drop(data);
                if name_of(&target) == FAILING_FILE {
                    reply(wr, "451 Requested action aborted: local error in processing.").await?;
                } else {
                    reply(wr, "226 Transfer complete.").await?;
                }
            }
        }
        "STOR" => {
            let target = resolve(&s.cwd, arg);
            let Some(listener) = s.passive.take() else {
                reply(wr, "425 Use PASV first.").await?;
                return Ok(false);
            };
            reply(wr, "150 Ok to send data.").await?;
            let (mut data, _) = listener.accept().await?;
            let mut content = Vec::new();
            data.read_to_end(&mut content).await?;
            fs.lock().unwrap().files.insert(target, content);
            reply(wr, "226 Transfer complete.").await?;
        }
        "DELE" => {
            let target = resolve(&s.cwd, arg);
            let removed = fs.lock().unwrap().files.remove(&target).is_some();
            if removed {
                reply(wr, "250 Delete operation successful.").await?;
            } else {
                reply(wr, "550 Delete operation failed.").await?;
            }
        }
        "RMD" => {
            let target = resolve(&s.cwd, arg);
            let removed = {
                let mut fs = fs.lock().unwrap();
                !fs.has_children(&target) && fs.dirs.remove(&target)
            };
            if removed {
                reply(wr, "250 Remove directory operation successful.").await?;
            } else {
                reply(wr, "550 Remove directory operation failed.").await?;
            }
        }
        "MKD" => {
            let target = resolve(&s.cwd, arg);
            let created = fs.lock().unwrap().dirs.insert(target.clone());
            if created {
                reply(wr, &format!("257 \"{}\" created", target)).await?;
            } else {
                reply(wr, "550 Create directory operation failed.").await?;
            }
        }
        "RNFR" => {
            let target = resolve(&s.cwd, arg);
            let exists = {
                let fs = fs.lock().unwrap();
                fs.files.contains_key(&target) || fs.dirs.contains(&target)
            };
            if exists {
                s.rename_from = Some(target);
                reply(wr, "350 Ready for RNTO.").await?;
            } else {
                reply(wr, "550 RNFR command failed.").await?;
            }
        }
        "RNTO" => {
            let target = resolve(&s.cwd, arg);
            let Some(from) = s.rename_from.take() else {
                reply(wr, "503 RNFR required first.").await?;
                return Ok(false);
            };
            {
                let mut fs = fs.lock().unwrap();
                if let Some(content) = fs.files.remove(&from) {
                    fs.files.insert(target, content);
                } else if fs.dirs.remove(&from) {
                    fs.dirs.insert(target);
                }
            }
            reply(wr, "250 Rename successful.").await?;
        }
        _ => reply(wr, "502 Command not implemented.").await?,
    }
    Ok(false)
}
