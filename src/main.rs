use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use env_logger::{Builder, Env};
use log::warn;
use rouilleftp::core_cli::{apply_url, Cli, Command};
use rouilleftp::core_directory::path;
use rouilleftp::{Config, FtpClient};
use std::io::Write;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Cli::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_filter))
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            writeln!(
                buf,
                "[{}] [{}] {}",
                timestamp,
                record.level(),
                record.args()
            )
        })
        .init();

    let mut config = if args.config.is_empty() {
        Config::default()
    } else {
        Config::load_from_file(&args.config)?
    };
    let start_path = match &args.url {
        Some(url) => apply_url(&mut config.client, url)?,
        None => None,
    };

    let mut client = FtpClient::from_config(&config.client);
    client
        .connect(&config.client.username, &config.client.password)
        .await
        .with_context(|| format!("Failed to log in to {}", config.client.server))?;

    let result = match start_path {
        Some(start) => match client.change_directory(&start).await {
            Ok(_) => run(&mut client, args.command).await,
            Err(e) => Err(e.into()),
        },
        None => run(&mut client, args.command).await,
    };

    if let Err(e) = client.close().await {
        warn!("QUIT failed: {}", e);
    }
    result
}

/// Moves into the directory part of `remote` and returns the bare name.
async fn enter_parent<'a>(client: &mut FtpClient, remote: &'a str) -> Result<&'a str> {
    if let Some(dir) = path::parent(remote) {
        client
            .change_directory(path::without_trailing_slash(&dir))
            .await
            .with_context(|| format!("Cannot change to {}", dir))?;
    }
    Ok(path::file_name(remote))
}

async fn run(client: &mut FtpClient, command: Command) -> Result<()> {
    match command {
        Command::Ls { path: dir } => {
            if let Some(dir) = dir {
                client.change_directory(&dir).await?;
            }
            list(client).await?;
        }
        Command::Pwd => {
            let current = client.current_directory()?;
            println!("{}", client.directory(current)?.full_path());
        }
        Command::Get {
            remote,
            local,
            resume,
        } => {
            let name = enter_parent(client, &remote).await?;
            let local = local.unwrap_or_else(|| PathBuf::from(name));
            let bytes = client.download(name, &local, resume).await?;
            println!("{} -> {} ({} bytes)", remote, local.display(), bytes);
        }
        Command::Put { local, remote } => {
            let remote = match remote {
                Some(remote) => remote,
                None => local
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .with_context(|| format!("No file name in {}", local.display()))?,
            };
            let name = enter_parent(client, &remote).await?;
            let bytes = client.upload(&local, name).await?;
            println!("{} -> {} ({} bytes)", local.display(), remote, bytes);
        }
        Command::Rm { name } => {
            let name = enter_parent(client, &name).await?;
            client.delete_file(name).await?;
        }
        Command::Rmdir { name } => {
            let name = enter_parent(client, &name).await?;
            client.remove_directory(name).await?;
        }
        Command::Mkdir { name } => {
            let name = enter_parent(client, &name).await?;
            let created = client.make_directory(name).await?;
            println!("{}", created);
        }
        Command::Mv { from, to } => {
            client.rename(&from, &to).await?;
        }
    }
    Ok(())
}

async fn list(client: &mut FtpClient) -> Result<()> {
    let current = client.current_directory()?;
    for id in client.subdirectories(current).await? {
        let dir = client.directory(id)?;
        let stamp = dir
            .timestamp()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{:<11} {:>12} {:<16} {}",
            dir.permission(),
            "",
            stamp,
            format!("{}/", dir.name()).blue().bold()
        );
    }
    for file in client.files(current).await? {
        let stamp = file
            .timestamp()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{:<11} {:>12} {:<16} {}",
            file.permission(),
            file.size().to_string().green(),
            stamp,
            file.name()
        );
    }
    Ok(())
}
